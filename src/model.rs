use std::fmt;

use ahash::{AHashMap, AHashSet};
use strsim::levenshtein;

use crate::binding::Value;
use crate::error::ConfigError;
use crate::synonym::SynonymMap;

/// The scalar type that the tokens of an option or argument coerce to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `true`/`false`. Options of this kind take no value on the command line.
    Bool,
    /// A signed 64 bit integer.
    Int,
    /// Any text.
    Str,
}

impl ValueKind {
    pub(crate) const fn takes_value(self) -> bool {
        !matches!(self, ValueKind::Bool)
    }

    pub(crate) fn zero(self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Str => Value::Str(String::new()),
        }
    }

    fn admits(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueKind::Bool, Value::Bool(_))
                | (ValueKind::Int, Value::Int(_))
                | (ValueKind::Str, Value::Str(_))
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ValueKind::Bool => write!(f, "a boolean"),
            ValueKind::Int => write!(f, "an integer"),
            ValueKind::Str => write!(f, "a string"),
        }
    }
}

/// A declared option, e.g. `-f, --force`.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionSpec {
    names:    Vec<String>,
    kind:     ValueKind,
    repeated: bool,
    default:  Option<Value>,
    env:      Vec<String>,
}

impl OptionSpec {
    /// Declares an option from a space separated list of names without
    /// dashes: single letters are short names, anything longer is a long name.
    ///
    /// ```
    /// use specopt::{OptionSpec, ValueKind};
    ///
    /// let recursive = OptionSpec::new("R recursive", ValueKind::Bool);
    /// assert_eq!(recursive.names(), ["R", "recursive"]);
    /// ```
    pub fn new(names: &str, kind: ValueKind) -> OptionSpec {
        OptionSpec {
            names: names.split_whitespace().map(str::to_owned).collect(),
            kind,
            repeated: false,
            default: None,
            env: vec![],
        }
    }

    /// A flag.
    pub fn bool(names: &str) -> OptionSpec {
        OptionSpec::new(names, ValueKind::Bool)
    }

    /// An option taking a string value.
    pub fn string(names: &str) -> OptionSpec {
        OptionSpec::new(names, ValueKind::Str)
    }

    /// An option taking an integer value.
    pub fn int(names: &str) -> OptionSpec {
        OptionSpec::new(names, ValueKind::Int)
    }

    /// Accumulate every occurrence instead of keeping the last one.
    pub fn repeated(mut self) -> OptionSpec {
        self.repeated = true;
        self
    }

    /// Value bound when neither argv nor the environment provide one.
    pub fn default<V: Into<Value>>(mut self, value: V) -> OptionSpec {
        self.default = Some(value.into());
        self
    }

    /// Space separated environment variables consulted, in order, when the
    /// option is absent from argv.
    pub fn env(mut self, vars: &str) -> OptionSpec {
        self.env = vars.split_whitespace().map(str::to_owned).collect();
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub(crate) fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub(crate) fn env_vars(&self) -> &[String] {
        &self.env
    }

    pub(crate) fn short_names(&self) -> impl Iterator<Item = char> + '_ {
        self.names
            .iter()
            .filter(|n| n.chars().count() == 1)
            .filter_map(|n| n.chars().next())
    }

    pub(crate) fn long_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names
            .iter()
            .filter(|n| n.chars().count() > 1)
            .map(String::as_str)
    }

    /// Every name with its dashes, short names first.
    pub(crate) fn flags(&self) -> Vec<String> {
        let shorts = self.short_names().map(|c| format!("-{c}"));
        let longs = self.long_names().map(|l| format!("--{l}"));
        shorts.chain(longs).collect()
    }

    /// How the option is shown in messages: its first declared name.
    pub(crate) fn display(&self) -> String {
        match self.names.first() {
            Some(n) if n.chars().count() == 1 => format!("-{n}"),
            Some(n) => format!("--{n}"),
            None => String::new(),
        }
    }

    /// The key used for struct decoding, e.g. `flag_dry_run`.
    pub(crate) fn field_name(&self) -> String {
        let name = self
            .long_names()
            .next()
            .or_else(|| self.names.first().map(String::as_str))
            .unwrap_or_default();
        format!("flag_{}", name.replace('-', "_"))
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        decl_regex! {
            SHORT: r"^[A-Za-z]$";
            LONG: r"^[A-Za-z][A-Za-z0-9_-]*$";
        }
        if self.names.is_empty() {
            return Err(ConfigError::InvalidName {
                name:   String::new(),
                reason: "an option needs at least one name",
            });
        }
        for name in &self.names {
            let ok = if name.chars().count() == 1 {
                SHORT.is_match(name)
            } else {
                LONG.is_match(name)
            };
            if !ok {
                return Err(ConfigError::InvalidName {
                    name:   name.clone(),
                    reason: "option names are letters, digits, '-' or '_' and start with a letter",
                });
            }
        }
        check_default(&self.display(), self.kind, self.repeated, &self.default)
    }
}

/// A declared positional argument, e.g. `SRC`.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgumentSpec {
    name:     String,
    kind:     ValueKind,
    repeated: bool,
    default:  Option<Value>,
    env:      Vec<String>,
}

impl ArgumentSpec {
    /// Declares an argument. The name must be an upper case word.
    pub fn new(name: &str, kind: ValueKind) -> ArgumentSpec {
        ArgumentSpec {
            name: name.to_string(),
            kind,
            repeated: false,
            default: None,
            env: vec![],
        }
    }

    pub fn bool(name: &str) -> ArgumentSpec {
        ArgumentSpec::new(name, ValueKind::Bool)
    }

    pub fn string(name: &str) -> ArgumentSpec {
        ArgumentSpec::new(name, ValueKind::Str)
    }

    pub fn int(name: &str) -> ArgumentSpec {
        ArgumentSpec::new(name, ValueKind::Int)
    }

    /// Accumulate every matched token instead of keeping the last one.
    pub fn repeated(mut self) -> ArgumentSpec {
        self.repeated = true;
        self
    }

    pub fn default<V: Into<Value>>(mut self, value: V) -> ArgumentSpec {
        self.default = Some(value.into());
        self
    }

    pub fn env(mut self, vars: &str) -> ArgumentSpec {
        self.env = vars.split_whitespace().map(str::to_owned).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub(crate) fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub(crate) fn env_vars(&self) -> &[String] {
        &self.env
    }

    pub(crate) fn field_name(&self) -> String {
        format!("arg_{}", self.name)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !is_argument_name(&self.name) {
            return Err(ConfigError::InvalidName {
                name:   self.name.clone(),
                reason: "argument names are upper case words",
            });
        }
        check_default(&self.name, self.kind, self.repeated, &self.default)
    }
}

/// An application or a sub-command: its options, its arguments in
/// declaration order, an optional explicit spec and its own sub-commands.
#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    name:      String,
    options:   Vec<OptionSpec>,
    arguments: Vec<ArgumentSpec>,
    spec:      Option<String>,
    commands:  Vec<Container>,
}

impl Container {
    pub fn new(name: &str) -> Container {
        Container {
            name:      name.to_string(),
            options:   vec![],
            arguments: vec![],
            spec:      None,
            commands:  vec![],
        }
    }

    pub fn option(mut self, option: OptionSpec) -> Container {
        self.options.push(option);
        self
    }

    pub fn argument(mut self, argument: ArgumentSpec) -> Container {
        self.arguments.push(argument);
        self
    }

    /// Sets the spec string. Without one, a spec is derived from the
    /// declarations (see [`Container::effective_spec`]).
    pub fn spec(mut self, spec: &str) -> Container {
        self.spec = Some(spec.to_string());
        self
    }

    pub fn command(mut self, command: Container) -> Container {
        self.commands.push(command);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    pub fn commands(&self) -> &[Container] {
        &self.commands
    }

    /// The explicit spec if one was set, otherwise `[OPTIONS]` (when any
    /// option is declared) followed by every argument in declaration order.
    ///
    /// ```
    /// use specopt::{ArgumentSpec, Container, OptionSpec};
    ///
    /// let run = Container::new("run")
    ///     .option(OptionSpec::bool("d detach"))
    ///     .argument(ArgumentSpec::string("IMAGE"))
    ///     .argument(ArgumentSpec::string("ARG").repeated());
    /// assert_eq!(run.effective_spec(), "[OPTIONS] IMAGE ARG...");
    /// ```
    pub fn effective_spec(&self) -> String {
        if let Some(ref spec) = self.spec {
            return spec.clone();
        }
        let mut parts = vec![];
        if !self.options.is_empty() {
            parts.push("[OPTIONS]".to_string());
        }
        for arg in &self.arguments {
            if arg.is_repeated() {
                parts.push(format!("{}...", arg.name()));
            } else {
                parts.push(arg.name().to_string());
            }
        }
        parts.join(" ")
    }
}

pub(crate) fn is_argument_name(s: &str) -> bool {
    decl_regex! {
        ARGUMENT: r"^[A-Z][A-Z0-9_]*$";
    }
    ARGUMENT.is_match(s)
}

fn check_default(
    name: &str,
    kind: ValueKind,
    repeated: bool,
    default: &Option<Value>,
) -> Result<(), ConfigError> {
    let ok = match (default, repeated) {
        (None, _) => true,
        (Some(Value::List(ref items)), true) => items.iter().all(|v| kind.admits(v)),
        (Some(v), false) => kind.admits(v),
        (Some(_), true) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ConfigError::DefaultKind {
            name:     name.to_string(),
            expected: kind,
        })
    }
}

/// Name lookup for one container: every option flag (`-f`, `--force`)
/// resolves to the option's index, every argument name to the argument's.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Names {
    options:   SynonymMap<String, usize>,
    arguments: AHashMap<String, usize>,
}

impl Names {
    pub(crate) fn new(container: &Container) -> Result<Names, ConfigError> {
        let mut raw = AHashSet::new();
        let mut options = SynonymMap::new();
        for (i, opt) in container.options().iter().enumerate() {
            opt.validate()?;
            for name in opt.names() {
                if !raw.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateName(name.clone()));
                }
            }
            let mut flags = opt.flags().into_iter();
            if let Some(canonical) = flags.next() {
                options.insert(canonical.clone(), i);
                for flag in flags {
                    options.insert_synonym(flag, canonical.clone());
                }
            }
        }

        let mut arguments = AHashMap::new();
        for (i, arg) in container.arguments().iter().enumerate() {
            arg.validate()?;
            if !raw.insert(arg.name()) {
                return Err(ConfigError::DuplicateName(arg.name().to_string()));
            }
            arguments.insert(arg.name().to_string(), i);
        }
        Ok(Names { options, arguments })
    }

    /// Looks up an option by flag, dashes included.
    pub(crate) fn option(&self, flag: &str) -> Option<usize> {
        self.options.find(&flag.to_string()).copied()
    }

    pub(crate) fn argument(&self, name: &str) -> Option<usize> {
        self.arguments.get(name).copied()
    }

    pub(crate) fn suggest_option(&self, flag: &str, options: &[OptionSpec]) -> Option<String> {
        closest(flag, options.iter().flat_map(OptionSpec::flags))
    }

    pub(crate) fn suggest_argument(&self, name: &str) -> Option<String> {
        closest(name, self.arguments.keys().cloned())
    }
}

// Only long names are worth suggesting: every single letter is one edit away
// from every other.
fn closest<I: Iterator<Item = String>>(name: &str, candidates: I) -> Option<String> {
    let mut best = None;
    let mut min = usize::MAX;
    for candidate in candidates {
        if candidate.chars().count() <= 2 {
            continue;
        }
        let dist = levenshtein(name, &candidate);
        if dist < 3 && dist < min {
            min = dist;
            best = Some(candidate);
        }
    }
    best
}
