//! The compiled form of a spec: a nondeterministic state graph.
//!
//! States live in an arena and transitions refer to them by index, so a
//! compiled automaton is plain data that can be shared freely between
//! matches (and threads).
//!
//! Every spec node compiles to a fragment with one entry and one exit:
//!
//! * an option or argument reference is a single labelled transition,
//! * a sequence chains its fragments,
//! * a choice fans out from the entry with one epsilon edge per
//!   alternative and joins the alternatives into a shared exit,
//! * an optional fragment gets an extra epsilon edge from its entry straight
//!   to its exit,
//! * a repeated fragment gets an epsilon edge from its exit back to its entry.
//!
//! The order in which edges are added is significant: the matcher tries them
//! in that order. Alternatives are tried left to right, the repeat edge
//! before the exit edge (so repetition is greedy) and the optional bypass
//! last (so optional elements are preferred).

use crate::parse::SpecNode;

pub(crate) type StateId = usize;

/// What a transition consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    /// Nothing.
    Epsilon,
    /// One occurrence of the option with this index.
    Option(usize),
    /// One positional token, bound to the argument with this index.
    Argument(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) label:  Label,
    pub(crate) target: StateId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct State {
    pub(crate) transitions: Vec<Transition>,
    pub(crate) accepting:   bool,
}

/// A compiled spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Automaton {
    states: Vec<State>,
    start:  StateId,
}

impl Automaton {
    /// Compiles `node`. `options` is the number of declared options, which is
    /// what `[OPTIONS]` expands to.
    pub(crate) fn compile(node: &SpecNode, options: usize) -> Automaton {
        let mut c = Compiler {
            states: vec![],
            options,
        };
        let start = c.state();
        let exit = c.compile(node, start);
        c.states[exit].accepting = true;
        Automaton {
            states: c.states,
            start,
        }
    }

    pub(crate) fn start(&self) -> StateId {
        self.start
    }

    pub(crate) fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Number of transitions, epsilon edges included.
    pub fn transitions(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }
}

struct Compiler {
    states:  Vec<State>,
    options: usize,
}

impl Compiler {
    fn state(&mut self) -> StateId {
        self.states.push(State::default());
        self.states.len() - 1
    }

    fn edge(&mut self, from: StateId, label: Label, target: StateId) {
        self.states[from]
            .transitions
            .push(Transition { label, target });
    }

    /// Compiles `node` starting at `from` and returns its exit state.
    fn compile(&mut self, node: &SpecNode, from: StateId) -> StateId {
        match *node {
            SpecNode::OptionRef(id) => self.labelled(from, Label::Option(id)),
            SpecNode::ArgumentRef(id) => self.labelled(from, Label::Argument(id)),
            SpecNode::AllOptions => {
                if self.options == 0 {
                    return from;
                }
                let all = SpecNode::Choice((0..self.options).map(SpecNode::OptionRef).collect());
                let expanded = SpecNode::Repeated(Box::new(SpecNode::Optional(Box::new(all))));
                self.compile(&expanded, from)
            }
            SpecNode::Sequence(ref items) => items
                .iter()
                .fold(from, |exit, item| self.compile(item, exit)),
            SpecNode::Choice(ref alts) => {
                let exit = self.state();
                for alt in alts {
                    let entry = self.state();
                    self.edge(from, Label::Epsilon, entry);
                    let alt_exit = self.compile(alt, entry);
                    self.edge(alt_exit, Label::Epsilon, exit);
                }
                exit
            }
            SpecNode::Optional(ref inner) => {
                let entry = self.state();
                self.edge(from, Label::Epsilon, entry);
                let inner_exit = self.compile(inner, entry);
                let exit = self.state();
                self.edge(inner_exit, Label::Epsilon, exit);
                self.edge(entry, Label::Epsilon, exit);
                exit
            }
            SpecNode::Repeated(ref inner) => {
                // A fresh entry keeps the back edge from reaching whatever
                // precedes this fragment.
                let entry = self.state();
                self.edge(from, Label::Epsilon, entry);
                let inner_exit = self.compile(inner, entry);
                let exit = self.state();
                self.edge(inner_exit, Label::Epsilon, entry);
                self.edge(inner_exit, Label::Epsilon, exit);
                exit
            }
        }
    }

    fn labelled(&mut self, from: StateId, label: Label) -> StateId {
        let target = self.state();
        self.edge(from, label, target);
        target
    }
}
