// Matching runs a depth first search over (state, cursor) pairs of the
// compiled automaton. The search is iterative so that long argument vectors
// (think `SRC...` after shell globbing) cannot exhaust the call stack.
//
// Tokens are decoded lazily, at the cursor, because what a token means depends
// on the declarations: `-Ifoo` is `-I foo` if `-I` takes a value but `-I -f
// -o -o` if it does not. Decoding never depends on the automaton state, only
// on where in argv the cursor is.
//
// A (state, cursor) pair either leads to an accepting configuration or it
// does not, no matter how it was reached. So every pair is explored at most
// once. This also cuts the epsilon cycles that `[x]...` produces.

use ahash::AHashSet;
#[cfg(feature = "tracing_debug")]
use tracing::debug;

use crate::{
    automaton::{Automaton, Label, StateId},
    error::{MatchError, MatchErrorKind},
    model::{ArgumentSpec, Names, OptionSpec},
};

/// A position in argv. `offset` is non-zero only inside a cluster of short
/// options such as `-it`, where it is the byte offset of the next letter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct Cursor {
    index:   usize,
    offset:  usize,
    /// Set once `--` has been passed: every later token is positional.
    literal: bool,
}

impl Cursor {
    fn at(index: usize, literal: bool) -> Cursor {
        Cursor {
            index,
            offset: 0,
            literal,
        }
    }

    /// Where in argv the cursor points, regardless of literal mode.
    fn position(self) -> (usize, usize) {
        (self.index, self.offset)
    }
}

/// One argv element (or one letter of a short option cluster), decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum MatchToken<'a> {
    /// Nothing left.
    End,
    Positional(&'a str),
    /// A declared option. `value` is the attached or following value, if any;
    /// `next` is where matching resumes.
    Option {
        id:    usize,
        value: Option<String>,
        next:  Cursor,
    },
    /// Looks like an option but nothing by that name is declared.
    Unknown(String),
    /// An option that needs a value ended the command line.
    MissingValue(usize),
}

/// A consumed transition: which spec it binds and the text it consumed.
/// `value` is `None` only for a flag given without `=value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) label: Label,
    pub(crate) value: Option<String>,
}

/// A successful match: the steps in consumption order and the index of the
/// first argv element left for a sub-command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Match {
    pub(crate) steps: Vec<Step>,
    pub(crate) rest:  usize,
}

pub(crate) struct Matcher<'a> {
    pub(crate) automaton: &'a Automaton,
    pub(crate) names:     &'a Names,
    pub(crate) options:   &'a [OptionSpec],
    pub(crate) arguments: &'a [ArgumentSpec],
    /// Names of sub-commands: a whole token naming one ends this container's
    /// portion of argv.
    pub(crate) commands:  &'a [&'a str],
    pub(crate) command:   &'a str,
    pub(crate) argv:      &'a [String],
}

struct Frame {
    state:  StateId,
    cursor: Cursor,
    edge:   usize,
    depth:  usize,
}

/// The furthest cursor any path reached, and what would have been accepted
/// there. This is what gets reported when every path fails.
struct Furthest {
    cursor:   Cursor,
    expected: Vec<Label>,
}

impl Furthest {
    fn reach(&mut self, cursor: Cursor) {
        if cursor.position() > self.cursor.position() {
            self.cursor = cursor;
            self.expected.clear();
        }
    }

    fn expect(&mut self, cursor: Cursor, label: Label) {
        self.reach(cursor);
        if cursor.position() == self.cursor.position() && !self.expected.contains(&label) {
            self.expected.push(label);
        }
    }
}

impl<'a> Matcher<'a> {
    pub(crate) fn run(&self) -> Result<Match, MatchError> {
        let automaton = self.automaton;
        let start = self.settle(Cursor::default());
        let mut furthest = Furthest {
            cursor:   start,
            expected: vec![],
        };
        let mut visited = AHashSet::new();
        let mut path: Vec<Step> = vec![];

        visited.insert((automaton.start(), start));
        if let Some(rest) = self.accepts(automaton.start(), start) {
            return Ok(self.matched(path, rest));
        }
        let mut stack = vec![Frame {
            state:  automaton.start(),
            cursor: start,
            edge:   0,
            depth:  0,
        }];

        while let Some(frame) = stack.last_mut() {
            let transitions = &automaton.state(frame.state).transitions;
            if frame.edge == transitions.len() {
                #[cfg(feature = "tracing_debug")]
                {
                    debug!(
                        "Backtracking from state {} at token {}.",
                        frame.state, frame.cursor.index
                    );
                }
                stack.pop();
                continue;
            }
            let transition = transitions[frame.edge];
            frame.edge += 1;
            let cursor = frame.cursor;
            path.truncate(frame.depth);

            let next = match transition.label {
                Label::Epsilon => cursor,
                label => match self.step(label, cursor) {
                    Some((step, next)) => {
                        path.push(step);
                        next
                    }
                    None => {
                        furthest.expect(cursor, label);
                        continue;
                    }
                },
            };
            if !visited.insert((transition.target, next)) {
                continue;
            }
            furthest.reach(next);
            if let Some(rest) = self.accepts(transition.target, next) {
                return Ok(self.matched(path, rest));
            }
            stack.push(Frame {
                state:  transition.target,
                cursor: next,
                edge:   0,
                depth:  path.len(),
            });
        }

        #[cfg(feature = "tracing_debug")]
        {
            debug!(
                "No path through '{}' ({} configurations explored).",
                self.command,
                visited.len()
            );
        }
        Err(self.failure(furthest))
    }

    fn matched(&self, steps: Vec<Step>, rest: usize) -> Match {
        #[cfg(feature = "tracing_debug")]
        {
            debug!(
                "Matched '{}' with {} steps, {} of {} tokens consumed.",
                self.command,
                steps.len(),
                rest,
                self.argv.len()
            );
        }
        Match { steps, rest }
    }

    /// Tries to consume `label` at `cursor`.
    fn step(&self, label: Label, cursor: Cursor) -> Option<(Step, Cursor)> {
        match (label, self.decode(cursor)) {
            (Label::Option(want), MatchToken::Option { id, value, next }) if want == id => {
                Some((Step { label, value }, self.settle(next)))
            }
            // A sub-command name ends this container's portion of argv.
            (Label::Argument(_), MatchToken::Positional(token))
                if cursor.literal || !self.commands.contains(&token) =>
            {
                let step = Step {
                    label,
                    value: Some(token.to_string()),
                };
                Some((step, self.settle(Cursor::at(cursor.index + 1, cursor.literal))))
            }
            _ => None,
        }
    }

    /// Whether matching may stop in `state` with the cursor at `cursor`, and
    /// if so, the index of the first token left over.
    fn accepts(&self, state: StateId, cursor: Cursor) -> Option<usize> {
        if !self.automaton.state(state).accepting || cursor.offset != 0 {
            return None;
        }
        if cursor.index == self.argv.len() {
            return Some(cursor.index);
        }
        let token = self.argv[cursor.index].as_str();
        if !cursor.literal && self.commands.contains(&token) {
            return Some(cursor.index);
        }
        None
    }

    /// Skips a `--` separator at the cursor, switching to literal mode.
    fn settle(&self, mut cursor: Cursor) -> Cursor {
        if !cursor.literal
            && cursor.offset == 0
            && self.argv.get(cursor.index).map(String::as_str) == Some("--")
        {
            cursor.index += 1;
            cursor.literal = true;
        }
        cursor
    }

    pub(crate) fn decode(&self, cursor: Cursor) -> MatchToken<'a> {
        let argv = self.argv;
        let Some(token) = argv.get(cursor.index) else {
            return MatchToken::End;
        };
        if cursor.offset > 0 {
            return self.decode_short(cursor, token);
        }
        if cursor.literal || token == "-" || !token.starts_with('-') {
            return MatchToken::Positional(token);
        }
        match token.strip_prefix("--") {
            Some(long) => self.decode_long(cursor, long),
            None => self.decode_short(Cursor { offset: 1, ..cursor }, token),
        }
    }

    // --name, --name=value, --name value
    fn decode_long(&self, cursor: Cursor, long: &str) -> MatchToken<'a> {
        let (name, attached) = match long.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (long, None),
        };
        let flag = format!("--{name}");
        let Some(id) = self.names.option(&flag) else {
            return MatchToken::Unknown(flag);
        };
        let after = Cursor::at(cursor.index + 1, cursor.literal);
        if !self.options[id].kind().takes_value() {
            return MatchToken::Option {
                id,
                value: attached.map(str::to_owned),
                next: after,
            };
        }
        match attached {
            Some(value) => MatchToken::Option {
                id,
                value: Some(value.to_string()),
                next: after,
            },
            None => self.following_value(id, cursor),
        }
    }

    // -f, -it, -Ivalue, -I value, -e=value, -ite=value
    fn decode_short(&self, cursor: Cursor, token: &'a str) -> MatchToken<'a> {
        let rest = &token[cursor.offset..];
        let Some(c) = rest.chars().next() else {
            return MatchToken::End;
        };
        let Some(id) = self.names.option(&format!("-{c}")) else {
            return MatchToken::Unknown(format!("-{c}"));
        };
        let after = &rest[c.len_utf8()..];
        let next_token = Cursor::at(cursor.index + 1, cursor.literal);
        if !self.options[id].kind().takes_value() {
            return if after.is_empty() {
                MatchToken::Option {
                    id,
                    value: None,
                    next: next_token,
                }
            } else if let Some(value) = after.strip_prefix('=') {
                MatchToken::Option {
                    id,
                    value: Some(value.to_string()),
                    next: next_token,
                }
            } else {
                MatchToken::Option {
                    id,
                    value: None,
                    next: Cursor {
                        offset: cursor.offset + c.len_utf8(),
                        ..cursor
                    },
                }
            };
        }
        if after.is_empty() {
            return self.following_value(id, cursor);
        }
        let value = after.strip_prefix('=').unwrap_or(after);
        MatchToken::Option {
            id,
            value: Some(value.to_string()),
            next: next_token,
        }
    }

    fn following_value(&self, id: usize, cursor: Cursor) -> MatchToken<'a> {
        match self.argv.get(cursor.index + 1) {
            Some(value) => MatchToken::Option {
                id,
                value: Some(value.clone()),
                next: Cursor::at(cursor.index + 2, cursor.literal),
            },
            None => MatchToken::MissingValue(id),
        }
    }

    fn failure(&self, furthest: Furthest) -> MatchError {
        let kind = match self.decode(furthest.cursor) {
            MatchToken::End => MatchErrorKind::Missing,
            MatchToken::Positional(token) => MatchErrorKind::UnexpectedArgument(token.to_string()),
            MatchToken::Option { id, .. } => {
                MatchErrorKind::UnexpectedOption(self.options[id].display())
            }
            MatchToken::MissingValue(id) => MatchErrorKind::MissingValue(self.options[id].display()),
            MatchToken::Unknown(token) => MatchErrorKind::UnknownOption {
                suggestion: self.names.suggest_option(&token, self.options),
                token,
            },
        };
        let mut err = MatchError::new(self.command, kind);
        err.expected = furthest
            .expected
            .iter()
            .filter_map(|&label| self.display(label))
            .collect();
        err
    }

    fn display(&self, label: Label) -> Option<String> {
        match label {
            Label::Epsilon => None,
            Label::Option(id) => Some(self.options[id].display()),
            Label::Argument(id) => Some(self.arguments[id].name().to_string()),
        }
    }
}
