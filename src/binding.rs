use std::fmt;

use ahash::AHashMap;
use serde::de::{
    self,
    value::{MapDeserializer, SeqDeserializer, StringDeserializer},
    DeserializeOwned, IntoDeserializer, Visitor,
};
#[cfg(feature = "tracing_debug")]
use tracing::debug;

use crate::{
    automaton::Label,
    error::{Error, MatchError, MatchErrorKind},
    matcher::Step,
    model::{ArgumentSpec, OptionSpec, ValueKind},
    synonym::SynonymMap,
};

/// A bound value.
///
/// Scalars are bound for non-repeatable options and arguments, lists of
/// scalars for repeatable ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// The boolean, or `false` for any other value.
    pub fn as_bool(&self) -> bool {
        matches!(*self, Value::Bool(true))
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// The string, or `""` for any other value.
    pub fn as_str(&self) -> &str {
        match *self {
            Value::Str(ref s) => s,
            _ => "",
        }
    }

    /// The list items, or nothing for a scalar.
    pub fn as_list(&self) -> &[Value] {
        match *self {
            Value::List(ref items) => items,
            _ => &[],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(ref s) => write!(f, "{s}"),
            Value::List(ref items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Int(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Value {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Where a bound value came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// The command line.
    Argv,
    /// The named environment variable.
    Env(String),
    /// The declared default.
    Default,
    /// Nothing: the value is the zero value of its kind.
    Unset,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Slot {
    value:  Value,
    source: Source,
    field:  String,
}

/// The values of every option and argument of one container, after a
/// successful match.
///
/// Options are looked up by any of their flags (`-f` or `--force`),
/// arguments by name (`SRC`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    slots: SynonymMap<String, Slot>,
}

impl Binding {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slot(name).map(|s| &s.value)
    }

    /// `false` if `name` is unknown or not a boolean.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).map_or(false, Value::as_bool)
    }

    /// `0` if `name` is unknown or not an integer.
    pub fn get_int(&self, name: &str) -> i64 {
        self.get(name).and_then(Value::as_int).unwrap_or(0)
    }

    /// `""` if `name` is unknown or not a string.
    pub fn get_str(&self, name: &str) -> &str {
        self.get(name).map_or("", Value::as_str)
    }

    /// The strings of a repeatable string option or argument.
    pub fn get_vec(&self, name: &str) -> Vec<&str> {
        match self.get(name) {
            Some(v) => v.as_list().iter().map(Value::as_str).collect(),
            None => vec![],
        }
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.slot(name).map(|s| &s.source)
    }

    /// Whether `name` was given on the command line.
    pub fn is_seen(&self, name: &str) -> bool {
        self.source(name) == Some(&Source::Argv)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }

    /// Decodes the binding into `T`.
    ///
    /// Options map to fields named `flag_<name>` (the first long name if
    /// there is one, with `-` replaced by `_`), arguments to `arg_<NAME>`.
    /// `Option<T>` fields are `None` when no source provided a value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        decode(self.fields())
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = (String, ValueDeserializer)> + '_ {
        self.slots.iter().map(|(_, slot)| {
            let de = ValueDeserializer {
                value:   slot.value.clone(),
                present: slot.source != Source::Unset,
            };
            (slot.field.clone(), de)
        })
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.find(&name.to_string())
    }
}

pub(crate) fn decode<T, I>(fields: I) -> Result<T, Error>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = (String, ValueDeserializer)>,
{
    T::deserialize(MapDeserializer::<_, Error>::new(fields.into_iter()))
}

/// Writes the steps of a successful match into a fresh [`Binding`], then
/// fills in everything the command line did not mention.
pub(crate) struct Binder<'a> {
    pub(crate) options:   &'a [OptionSpec],
    pub(crate) arguments: &'a [ArgumentSpec],
    pub(crate) command:   &'a str,
}

impl<'a> Binder<'a> {
    pub(crate) fn bind<F>(&self, steps: &[Step], env: F) -> Result<Binding, MatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts: Vec<Option<Value>> = vec![None; self.options.len()];
        let mut args: Vec<Option<Value>> = vec![None; self.arguments.len()];

        for step in steps {
            let (slot, name, kind, repeated) = match step.label {
                Label::Option(id) => {
                    let o = &self.options[id];
                    (&mut opts[id], o.display(), o.kind(), o.is_repeated())
                }
                Label::Argument(id) => {
                    let a = &self.arguments[id];
                    (&mut args[id], a.name().to_string(), a.kind(), a.is_repeated())
                }
                Label::Epsilon => continue,
            };
            let value = match step.value {
                Some(ref raw) => self.coerce(&name, raw, kind)?,
                // A flag without `=value`.
                None => Value::Bool(true),
            };
            if repeated {
                match *slot {
                    Some(Value::List(ref mut items)) => items.push(value),
                    _ => *slot = Some(Value::List(vec![value])),
                }
            } else {
                *slot = Some(value);
            }
        }

        let mut slots = SynonymMap::new();
        for (o, seen) in self.options.iter().zip(opts) {
            let (value, source) = self.resolve(
                &o.display(),
                seen,
                o.kind(),
                o.is_repeated(),
                o.env_vars(),
                o.default_value(),
                &env,
            )?;
            let mut flags = o.flags().into_iter();
            let canonical = flags.next().unwrap_or_default();
            slots.insert(canonical.clone(), Slot {
                value,
                source,
                field: o.field_name(),
            });
            for flag in flags {
                slots.insert_synonym(flag, canonical.clone());
            }
        }
        for (a, seen) in self.arguments.iter().zip(args) {
            let (value, source) = self.resolve(
                a.name(),
                seen,
                a.kind(),
                a.is_repeated(),
                a.env_vars(),
                a.default_value(),
                &env,
            )?;
            slots.insert(a.name().to_string(), Slot {
                value,
                source,
                field: a.field_name(),
            });
        }
        Ok(Binding { slots })
    }

    // Argv first, then the environment, then the declared default, then the
    // zero value.
    #[allow(clippy::too_many_arguments)]
    fn resolve<F>(
        &self,
        name: &str,
        seen: Option<Value>,
        kind: ValueKind,
        repeated: bool,
        vars: &[String],
        default: Option<&Value>,
        env: &F,
    ) -> Result<(Value, Source), MatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = seen {
            return Ok((value, Source::Argv));
        }
        for var in vars {
            let Some(raw) = env(var).filter(|v| !v.is_empty()) else {
                continue;
            };
            #[cfg(feature = "tracing_debug")]
            {
                debug!("Binding '{name}' from environment variable '{var}'.");
            }
            let value = if repeated {
                let items: Result<Vec<Value>, MatchError> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| self.coerce(name, s, kind))
                    .collect();
                Value::List(items?)
            } else {
                self.coerce(name, &raw, kind)?
            };
            return Ok((value, Source::Env(var.clone())));
        }
        if let Some(value) = default {
            return Ok((value.clone(), Source::Default));
        }
        let zero = if repeated {
            Value::List(vec![])
        } else {
            kind.zero()
        };
        Ok((zero, Source::Unset))
    }

    fn coerce(&self, name: &str, raw: &str, kind: ValueKind) -> Result<Value, MatchError> {
        let value = match kind {
            ValueKind::Str => Some(Value::Str(raw.to_string())),
            ValueKind::Int => raw.parse::<i64>().ok().map(Value::Int),
            ValueKind::Bool => parse_bool(raw).map(Value::Bool),
        };
        value.ok_or_else(|| {
            MatchError::new(self.command, MatchErrorKind::InvalidValue {
                name:  name.to_string(),
                value: raw.to_string(),
                kind,
            })
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Feeds one bound value to serde.
pub(crate) struct ValueDeserializer {
    pub(crate) value:   Value,
    pub(crate) present: bool,
}

impl ValueDeserializer {
    fn item(value: Value) -> ValueDeserializer {
        ValueDeserializer {
            value,
            present: true,
        }
    }
}

impl<'de> IntoDeserializer<'de, Error> for ValueDeserializer {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> ValueDeserializer {
        self
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.value {
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::Str(s) => visitor.visit_string(s),
            Value::List(items) => {
                let mut seq =
                    SeqDeserializer::<_, Error>::new(items.into_iter().map(ValueDeserializer::item));
                let out = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(out)
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if self.present {
            visitor.visit_some(self)
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if let Value::Str(ref s) = self.value {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return visitor.visit_char(c);
            }
        }
        self.deserialize_any(visitor)
    }

    // Unit variants only: `--emit=ir` into `enum Emit { Ir, Asm }`.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        match self.value {
            Value::Str(s) => visitor.visit_enum(StringDeserializer::<Error>::new(s)),
            other => ValueDeserializer::item(other).deserialize_any(visitor),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 str string
        bytes byte_buf unit unit_struct newtype_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

/// Collects the fields of several bindings; later entries replace earlier
/// ones with the same field name.
pub(crate) fn merge_fields<I>(fields: I) -> Vec<(String, ValueDeserializer)>
where
    I: IntoIterator<Item = (String, ValueDeserializer)>,
{
    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut out: Vec<(String, ValueDeserializer)> = vec![];
    for (field, de) in fields {
        match index.get(&field) {
            Some(&i) => out[i].1 = de,
            None => {
                index.insert(field.clone(), out.len());
                out.push((field, de));
            }
        }
    }
    out
}
