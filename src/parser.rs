use ahash::AHashSet;
use serde::de::DeserializeOwned;
#[cfg(feature = "tracing_debug")]
use tracing::debug;

use crate::{
    automaton::Automaton,
    binding::{decode, merge_fields, Binder, Binding, Value, ValueDeserializer},
    error::{ConfigError, Error, MatchError, MatchErrorKind},
    matcher::Matcher,
    model::{ArgumentSpec, Container, Names, OptionSpec},
    parse::{parse_spec, SpecNode},
};

/// A compiled container, ready to match argument vectors.
///
/// A `Parser` is immutable once built, so it can be shared between threads
/// and used for any number of matches.
#[derive(Clone, Debug)]
pub struct Parser {
    name:      String,
    spec:      String,
    options:   Vec<OptionSpec>,
    arguments: Vec<ArgumentSpec>,
    names:     Names,
    ast:       SpecNode,
    automaton: Automaton,
    commands:  Vec<Parser>,
}

impl Container {
    /// Validates the declarations and compiles this container and every
    /// sub-command below it.
    pub fn compile(&self) -> Result<Parser, ConfigError> {
        Parser::new(self)
    }
}

impl Parser {
    pub fn new(container: &Container) -> Result<Parser, ConfigError> {
        let names = Names::new(container)?;
        let spec = container.effective_spec();
        let ast = parse_spec(&spec, &names, container.options())?;
        let automaton = Automaton::compile(&ast, container.options().len());

        let mut seen = AHashSet::new();
        let mut commands = Vec::with_capacity(container.commands().len());
        for sub in container.commands() {
            if !seen.insert(sub.name()) {
                return Err(ConfigError::DuplicateCommand(sub.name().to_string()));
            }
            commands.push(Parser::new(sub)?);
        }

        #[cfg(feature = "tracing_debug")]
        {
            debug!(
                "Compiled '{}' from spec '{}': {} states, {} transitions.",
                container.name(),
                spec,
                automaton.len(),
                automaton.transitions()
            );
        }
        Ok(Parser {
            name: container.name().to_string(),
            spec,
            options: container.options().to_vec(),
            arguments: container.arguments().to_vec(),
            names,
            ast,
            automaton,
            commands,
        })
    }

    /// Matches `argv` (without the program name) and binds the result,
    /// falling back to the process environment for values argv omits.
    pub fn parse<I, S>(&self, argv: I) -> Result<Invocation, MatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parse_with_env(argv, |var: &str| std::env::var(var).ok())
    }

    /// Like [`Parser::parse`], but environment variables are looked up with
    /// `env` instead.
    pub fn parse_with_env<I, S, F>(&self, argv: I, env: F) -> Result<Invocation, MatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> Option<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        self.parse_at(&self.name, &argv, &env)
    }

    fn parse_at(
        &self,
        path: &str,
        argv: &[String],
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Invocation, MatchError> {
        let commands: Vec<&str> = self.commands.iter().map(|c| c.name.as_str()).collect();
        let m = Matcher {
            automaton: &self.automaton,
            names:     &self.names,
            options:   &self.options,
            arguments: &self.arguments,
            commands:  &commands,
            command:   path,
            argv,
        }
        .run()?;
        let binding = Binder {
            options:   &self.options,
            arguments: &self.arguments,
            command:   path,
        }
        .bind(&m.steps, env)?;

        // The matcher only stops early at a token naming a sub-command.
        let command = match argv.get(m.rest) {
            None => None,
            Some(name) => {
                let sub = self
                    .commands
                    .iter()
                    .find(|c| c.name == *name)
                    .ok_or_else(|| {
                        MatchError::new(path, MatchErrorKind::UnexpectedArgument(name.clone()))
                    })?;
                #[cfg(feature = "tracing_debug")]
                {
                    debug!("Handing {} tokens to sub-command '{}'.", argv.len() - m.rest - 1, name);
                }
                let sub_path = format!("{path} {name}");
                Some(Box::new(sub.parse_at(&sub_path, &argv[m.rest + 1..], env)?))
            }
        };
        Ok(Invocation {
            name: self.name.clone(),
            binding,
            command,
            available: commands.iter().map(|c| c.to_string()).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The spec this parser was compiled from, derived if none was given.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn ast(&self) -> &SpecNode {
        &self.ast
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn commands(&self) -> &[Parser] {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&Parser> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// The result of a successful parse: the binding of the top-level
/// container and, if a sub-command was selected, its invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub name:    String,
    pub binding: Binding,
    pub command: Option<Box<Invocation>>,
    available:   Vec<String>,
}

impl Invocation {
    /// Names of the selected sub-commands, outermost first. Empty when no
    /// sub-command was selected.
    pub fn command_path(&self) -> Vec<&str> {
        let mut path = vec![];
        let mut cur = self.command.as_deref();
        while let Some(inv) = cur {
            path.push(inv.name.as_str());
            cur = inv.command.as_deref();
        }
        path
    }

    /// The innermost selected invocation.
    pub fn leaf(&self) -> &Invocation {
        let mut cur = self;
        while let Some(ref next) = cur.command {
            cur = next;
        }
        cur
    }

    /// Decodes every level into one `T`.
    ///
    /// Fields are named as for [`Binding::deserialize`]. Each selected
    /// sub-command sets `cmd_<name>` to `true` and its unselected siblings
    /// to `false`. Where two levels share a field the inner level wins.
    ///
    /// ```
    /// use serde::Deserialize;
    /// use specopt::{ArgumentSpec, Container, OptionSpec};
    ///
    /// #[allow(non_snake_case)]
    /// #[derive(Deserialize)]
    /// struct Args {
    ///     flag_verbose: bool,
    ///     cmd_run:      bool,
    ///     arg_IMAGE:    String,
    /// }
    ///
    /// let parser = Container::new("docker")
    ///     .option(OptionSpec::bool("v verbose"))
    ///     .command(Container::new("run").argument(ArgumentSpec::string("IMAGE")))
    ///     .compile()
    ///     .unwrap();
    /// let args: Args = parser
    ///     .parse(vec!["-v", "run", "ubuntu"])
    ///     .unwrap()
    ///     .deserialize()
    ///     .unwrap();
    /// assert!(args.flag_verbose && args.cmd_run);
    /// assert_eq!(args.arg_IMAGE, "ubuntu");
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let mut fields: Vec<(String, ValueDeserializer)> = vec![];
        let mut cur = Some(self);
        while let Some(inv) = cur {
            fields.extend(inv.binding.fields());
            let chosen = inv.command.as_ref().map(|sub| sub.name.as_str());
            for name in &inv.available {
                fields.push((command_field(name), ValueDeserializer {
                    value:   Value::Bool(chosen == Some(name.as_str())),
                    present: true,
                }));
            }
            cur = inv.command.as_deref();
        }
        decode(merge_fields(fields))
    }
}

fn command_field(name: &str) -> String {
    format!("cmd_{}", name.replace('-', "_"))
}
