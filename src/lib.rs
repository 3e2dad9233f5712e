//! Command line parsing driven by a spec string.
//!
//! An application declares its options and positional arguments on a
//! [`Container`], then writes a short spec describing how they may be
//! combined. The spec is compiled once into a state graph, and each command
//! line is matched against that graph.
//!
//! # Spec syntax
//!
//! * `-f`, `--force`: a declared option.
//! * `SRC`: a declared argument. Argument names are upper case.
//! * `[ ... ]`: the enclosed elements are optional.
//! * `( ... )`: grouping.
//! * `a | b`: exactly one of `a` or `b`. Binds tighter than juxtaposition.
//! * `x...`: one or more `x`.
//! * `-abc`: one of `-a`, `-b` or `-c`.
//! * `[OPTIONS]`: any of the declared options, in any order, any number of
//!   times.
//!
//! When a container has no spec, it is `[OPTIONS]` followed by every
//! argument in declaration order.
//!
//! # Example
//!
//! This is a `cp`-like command that copies one or more files into a
//! destination:
//!
//! ```rust
//! use specopt::{ArgumentSpec, Container, OptionSpec, Source};
//!
//! let parser = Container::new("cp")
//!     .option(OptionSpec::bool("a archive"))
//!     .option(OptionSpec::bool("f force").env("CP_FORCE"))
//!     .argument(ArgumentSpec::string("SRC").repeated())
//!     .argument(ArgumentSpec::string("DST"))
//!     .spec("[-a] [-f] SRC... DST")
//!     .compile()
//!     .unwrap();
//!
//! let inv = parser
//!     .parse_with_env(vec!["-a", "one", "two", "dir/"], |_: &str| None)
//!     .unwrap();
//! let args = &inv.binding;
//! assert!(args.get_bool("--archive"));
//! assert!(!args.get_bool("-f"));
//! assert_eq!(args.source("-f"), Some(&Source::Unset));
//! assert_eq!(args.get_vec("SRC"), vec!["one", "two"]);
//! assert_eq!(args.get_str("DST"), "dir/");
//! ```
//!
//! # Decoding into a struct
//!
//! A binding can be decoded into any type implementing `Deserialize`. Field
//! names follow the convention `flag_<long name>`, `arg_<NAME>` and
//! `cmd_<name>`:
//!
//! ```rust
//! use serde::Deserialize;
//! use specopt::{ArgumentSpec, Container, OptionSpec};
//!
//! #[allow(non_snake_case)]
//! #[derive(Debug, Deserialize)]
//! struct Args {
//!     flag_archive: bool,
//!     flag_force:   bool,
//!     arg_SRC:      Vec<String>,
//!     arg_DST:      String,
//! }
//!
//! let parser = Container::new("cp")
//!     .option(OptionSpec::bool("a archive"))
//!     .option(OptionSpec::bool("f force"))
//!     .argument(ArgumentSpec::string("SRC").repeated())
//!     .argument(ArgumentSpec::string("DST"))
//!     .compile()
//!     .unwrap();
//!
//! let args: Args = parser
//!     .parse_with_env(vec!["-af", "a.txt", "b.txt"], |_: &str| None)
//!     .unwrap()
//!     .deserialize()
//!     .unwrap();
//! assert!(args.flag_archive && args.flag_force);
//! assert_eq!(args.arg_SRC, vec!["a.txt"]);
//! assert_eq!(args.arg_DST, "b.txt");
//! ```
//!
//! # Debugging
//!
//! With the `tracing_debug` feature, compilation, matching and binding emit
//! `tracing` events at debug level.

#![deny(missing_debug_implementations)]

macro_rules! decl_regex {
    ($($name:ident: $re:expr;)*) => {
        $(
            static $name: ::std::sync::LazyLock<::regex::Regex> =
                ::std::sync::LazyLock::new(|| ::regex::Regex::new($re).unwrap());
        )*
    }
}

pub use crate::{
    automaton::{Automaton, Label},
    binding::{Binding, Source, Value},
    error::{ConfigError, Error, MatchError, MatchErrorKind},
    model::{ArgumentSpec, Container, OptionSpec, ValueKind},
    parse::SpecNode,
    parser::{Invocation, Parser},
};

mod automaton;
mod binding;
mod error;
mod matcher;
mod model;
mod parse;
mod parser;
mod synonym;

#[cfg(test)]
mod test;
