use std::fmt;

use serde::de;
use thiserror::Error;

use crate::model::ValueKind;

/// A mistake in how a container was declared.
///
/// These are detected by [`Container::compile`](crate::Container::compile)
/// before any argument vector is looked at. No command line can fix them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The spec string does not follow the grammar.
    #[error("Invalid spec '{spec}' at offset {position}: {message}")]
    Syntax {
        /// The offending spec string.
        spec:     String,
        /// Byte offset of the token where parsing stopped.
        position: usize,
        /// What went wrong.
        message:  String,
    },

    /// The spec references an option that the container never declared.
    #[error("Spec references undeclared option '{name}'.{}", did_you_mean(.suggestion))]
    UndeclaredOption {
        /// The option as written in the spec (`-x` or `--xyz`).
        name:       String,
        /// The closest declared option, if any is close.
        suggestion: Option<String>,
    },

    /// The spec references an argument that the container never declared.
    #[error("Spec references undeclared argument '{name}'.{}", did_you_mean(.suggestion))]
    UndeclaredArgument {
        /// The argument name as written in the spec.
        name:       String,
        /// The closest declared argument, if any is close.
        suggestion: Option<String>,
    },

    /// Two options, or an option and an argument, share a name.
    #[error("The name '{0}' is declared more than once.")]
    DuplicateName(String),

    /// Two sub-commands of the same container share a name.
    #[error("The command '{0}' is declared more than once.")]
    DuplicateCommand(String),

    /// An argument appears more than once in one spec string.
    #[error("Argument '{0}' may only appear once in a spec.")]
    DuplicateArgumentReference(String),

    /// A declared name does not have the required shape.
    #[error("Invalid name '{name}': {reason}.")]
    InvalidName {
        /// The rejected name.
        name:   String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A declared default value does not fit the declared kind.
    #[error("Default value for '{name}' must be {expected}.")]
    DefaultKind {
        /// The option or argument carrying the default.
        name:     String,
        /// The kind it was declared with.
        expected: ValueKind,
    },
}

/// What kind of invocation failure occurred.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchErrorKind {
    /// A token looked like an option but no such option is declared.
    #[error("Unknown option '{token}'.{}", did_you_mean(.suggestion))]
    UnknownOption {
        /// The option as typed, e.g. `--forse` or `-q`.
        token:      String,
        /// The closest declared long option.
        suggestion: Option<String>,
    },
    /// A declared option appeared where the spec does not allow it.
    #[error("Unexpected option '{0}'.")]
    UnexpectedOption(String),
    /// A positional token appeared where the spec does not allow it.
    #[error("Unexpected argument '{0}'.")]
    UnexpectedArgument(String),
    /// An option that takes a value was the last token.
    #[error("Option '{0}' requires a value.")]
    MissingValue(String),
    /// The input ended while the spec still required more.
    #[error("Not enough arguments.")]
    Missing,
    /// A value could not be coerced to the declared kind.
    #[error("Invalid value '{value}' for '{name}': expected {kind}.")]
    InvalidValue {
        /// The option or argument being bound.
        name:  String,
        /// The rejected text.
        value: String,
        /// The kind the text had to parse as.
        kind:  ValueKind,
    },
}

/// A command line that the compiled spec rejects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}{} (command: {command})", expected_one_of(.expected))]
pub struct MatchError {
    /// Space separated path of the command that failed, starting at the application.
    pub command:  String,
    /// The failure itself.
    pub kind:     MatchErrorKind,
    /// Elements the spec would have accepted at the point of failure.
    pub expected: Vec<String>,
}

impl MatchError {
    pub(crate) fn new(command: &str, kind: MatchErrorKind) -> MatchError {
        MatchError {
            command: command.to_string(),
            kind,
            expected: vec![],
        }
    }
}

/// Every failure this crate can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The declarations are broken. Fatal at startup.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The command line does not fit the declarations.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// Decoding a binding into a user type failed.
    #[error("Could not decode arguments: {0}")]
    Deserialize(String),
}

impl Error {
    /// Whether this is a programmer mistake rather than a bad command line.
    pub fn is_config(&self) -> bool {
        matches!(*self, Error::Config(_))
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Deserialize(msg.to_string())
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match *suggestion {
        Some(ref best) => format!(" Did you mean '{best}'?"),
        None => String::new(),
    }
}

fn expected_one_of(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(" Expected one of: {}.", expected.join(", "))
    }
}
