// The spec language is tiny, so the parser is a plain recursive descent over
// a token list. Tokens are pulled out of the spec string with one regex and
// keep their byte offsets so that errors can point at the culprit.
//
// Grammar:
//
//   spec         -> sequence
//   sequence     -> choice*
//   req_sequence -> choice+
//   choice       -> atom ('|' atom)*
//   atom         -> (shortOpt | longOpt | optSeq | allOpts | group | optional | ARGUMENT) rep?
//   shortOpt     -> '-' [A-Za-z]
//   longOpt      -> '--' [A-Za-z][A-Za-z0-9_-]*
//   optSeq       -> '-' [A-Za-z]+
//   allOpts      -> '[OPTIONS]'
//   group        -> '(' req_sequence ')'
//   optional     -> '[' req_sequence ']'
//   rep          -> '...'
//
// Note that '|' binds tighter than juxtaposition: `-a -b | -c` is `-a` followed
// by a choice between `-b` and `-c`.

use ahash::AHashSet;

use self::SpecNode::{AllOptions, ArgumentRef, Choice, OptionRef, Optional, Repeated, Sequence};
use crate::{
    error::ConfigError,
    model::{Names, OptionSpec},
};

/// The syntax tree of a spec string. Option and argument references are
/// indices into the owning container's declarations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecNode {
    OptionRef(usize),
    ArgumentRef(usize),
    /// `[OPTIONS]`: any number of any declared options, in any order.
    AllOptions,
    Sequence(Vec<SpecNode>),
    Choice(Vec<SpecNode>),
    Optional(Box<SpecNode>),
    Repeated(Box<SpecNode>),
}

impl SpecNode {
    fn sequence(mut items: Vec<SpecNode>) -> SpecNode {
        if items.len() == 1 {
            items.pop().unwrap_or(Sequence(vec![]))
        } else {
            Sequence(items)
        }
    }

    fn choice(mut alts: Vec<SpecNode>) -> SpecNode {
        if alts.len() == 1 {
            alts.pop().unwrap_or(Choice(vec![]))
        } else {
            Choice(alts)
        }
    }
}

/// Parses `spec`, resolving every reference against `names`.
pub(crate) fn parse_spec(
    spec: &str,
    names: &Names,
    options: &[OptionSpec],
) -> Result<SpecNode, ConfigError> {
    SpecParser::new(spec, names, options).parse()
}

struct SpecParser<'a> {
    spec:      &'a str,
    names:     &'a Names,
    options:   &'a [OptionSpec],
    tokens:    Vec<(usize, &'a str)>,
    curi:      usize,
    seen_args: AHashSet<usize>,
}

impl<'a> SpecParser<'a> {
    fn new(spec: &'a str, names: &'a Names, options: &'a [OptionSpec]) -> SpecParser<'a> {
        SpecParser {
            spec,
            names,
            options,
            tokens: spec_tokens(spec),
            curi: 0,
            seen_args: AHashSet::new(),
        }
    }

    fn parse(&mut self) -> Result<SpecNode, ConfigError> {
        let node = self.sequence()?;
        if !self.is_eof() {
            // `sequence` only stops early at a closing bracket.
            return self.syntax(format!("Unexpected '{}'. No open bracket found.", self.cur()));
        }
        Ok(node)
    }

    fn sequence(&mut self) -> Result<SpecNode, ConfigError> {
        let mut seq = vec![];
        while !self.is_eof() && !self.at_closer() {
            seq.push(self.choice()?);
        }
        Ok(SpecNode::sequence(seq))
    }

    fn req_sequence(&mut self, open: &str, close: &str) -> Result<SpecNode, ConfigError> {
        let seq = self.sequence()?;
        if self.is_eof() {
            return self.syntax(format!("Unclosed '{open}'. Expected '{close}'."));
        }
        if self.cur() != close {
            return self.syntax(format!("Expected '{close}' but got '{}'.", self.cur()));
        }
        if seq == Sequence(vec![]) {
            return self.syntax(format!("Empty '{open}{close}' groups are not allowed."));
        }
        self.next();
        Ok(seq)
    }

    fn choice(&mut self) -> Result<SpecNode, ConfigError> {
        let mut alts = vec![self.atom()?];
        while self.atis(0, "|") {
            self.next();
            if self.is_eof() || self.at_closer() || self.atis(0, "|") {
                return self.syntax("Unexpected '|'. Not in form 'a | b | c'.".to_string());
            }
            alts.push(self.atom()?);
        }
        Ok(SpecNode::choice(alts))
    }

    fn atom(&mut self) -> Result<SpecNode, ConfigError> {
        let node = match self.cur() {
            "..." => {
                return self.syntax(
                    "'...' must appear directly after a group, argument or option.".to_string(),
                )
            }
            "|" => return self.syntax("Unexpected '|'. Not in form 'a | b | c'.".to_string()),
            "(" => {
                self.next();
                self.req_sequence("(", ")")?
            }
            "[" => {
                // `[OPTIONS]` is a shortcut, not an optional argument.
                if self.atis(1, "OPTIONS") {
                    if !self.atis(2, "]") {
                        return self.syntax("Unclosed '[OPTIONS'. Expected ']'.".to_string());
                    }
                    self.next();
                    self.next();
                    self.next();
                    AllOptions
                } else {
                    self.next();
                    Optional(Box::new(self.req_sequence("[", "]")?))
                }
            }
            _ => self.word()?,
        };
        Ok(self.maybe_repeat(node))
    }

    fn word(&mut self) -> Result<SpecNode, ConfigError> {
        decl_regex! {
            LONG: r"^--[A-Za-z][A-Za-z0-9_-]*$";
            SHORTS: r"^-[A-Za-z]+$";
        }
        let word = self.cur();
        let node = if LONG.is_match(word) {
            OptionRef(self.option(word)?)
        } else if SHORTS.is_match(word) {
            // `-abc` is a choice between `-a`, `-b` and `-c`.
            let mut alts = vec![];
            for c in word[1..].chars() {
                alts.push(OptionRef(self.option(&format!("-{c}"))?));
            }
            SpecNode::choice(alts)
        } else if crate::model::is_argument_name(word) {
            ArgumentRef(self.argument(word)?)
        } else {
            return self.syntax(format!("Unknown token type '{word}'."));
        };
        self.next();
        Ok(node)
    }

    fn option(&self, flag: &str) -> Result<usize, ConfigError> {
        self.names
            .option(flag)
            .ok_or_else(|| ConfigError::UndeclaredOption {
                name:       flag.to_string(),
                suggestion: self.names.suggest_option(flag, self.options),
            })
    }

    fn argument(&mut self, name: &str) -> Result<usize, ConfigError> {
        let id = self
            .names
            .argument(name)
            .ok_or_else(|| ConfigError::UndeclaredArgument {
                name:       name.to_string(),
                suggestion: self.names.suggest_argument(name),
            })?;
        if !self.seen_args.insert(id) {
            return Err(ConfigError::DuplicateArgumentReference(name.to_string()));
        }
        Ok(id)
    }

    fn maybe_repeat(&mut self, node: SpecNode) -> SpecNode {
        if self.atis(0, "...") {
            self.next();
            Repeated(Box::new(node))
        } else {
            node
        }
    }

    fn syntax<T>(&self, message: String) -> Result<T, ConfigError> {
        let position = match self.tokens.get(self.curi) {
            Some(&(pos, _)) => pos,
            None => self.spec.len(),
        };
        Err(ConfigError::Syntax {
            spec: self.spec.to_string(),
            position,
            message,
        })
    }

    fn at_closer(&self) -> bool {
        self.atis(0, ")") || self.atis(0, "]")
    }

    fn is_eof(&self) -> bool {
        self.curi == self.tokens.len()
    }
    fn next(&mut self) {
        if self.curi == self.tokens.len() {
            return;
        }
        self.curi += 1;
    }
    fn cur(&self) -> &'a str {
        self.tokens[self.curi].1
    }
    fn atis(&self, offset: usize, is: &str) -> bool {
        let i = self.curi + offset;
        i < self.tokens.len() && self.tokens[i].1 == is
    }
}

// Tokenizes a spec string into `(offset, token)` pairs. Brackets, parens, `|`
// and `...` are always tokens of their own, whether or not they are padded
// with whitespace. A stray character that fits nowhere becomes a one
// character token so that the parser can reject it.
fn spec_tokens(spec: &str) -> Vec<(usize, &str)> {
    decl_regex! {
        TOKEN: r"\.\.\.|[\[\]()|]|[^\s\[\]()|.]+|\S";
    }
    TOKEN
        .find_iter(spec)
        .map(|m| (m.start(), m.as_str()))
        .collect()
}
