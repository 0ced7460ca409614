//! The nondeterministic half of the automaton engine.
//!
//! A token pattern compiles into a graph of [`State`]s by recursive descent
//! over the pattern syntax. Kleene operators make the graph cyclic, so the
//! states live in an id-indexed arena owned by the [`Nfa`] rather than in a
//! nested ownership tree; a [`Fragment`] is just a start/end pair of ids.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::matcher::Matcher;
use crate::tokenizer::TokenId;

/// Stable id of an NFA state. Ids are handed out in creation order, which
/// is also the canonical order used to key DFA states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u32);

/// A start/end pair delimiting one compiled sub-pattern. Fragments compose
/// by pushing epsilon edges between their endpoint states, never by
/// aliasing their contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub start: StateId,
    pub end: StateId,
}

/// One automaton state. A state without a matcher is an epsilon node; its
/// successors are reached without consuming a symbol.
#[derive(Debug)]
pub struct State {
    pub matcher: Option<Matcher>,
    pub next: Vec<StateId>,
    pub accept: Option<TokenId>,
    /// Pass marker for epsilon-closure traversal; a state is visited at
    /// most once per closure pass even on cyclic graphs.
    last_pass: u64,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            Some(m) => write!(f, "ch={}", m)?,
            None => write!(f, "eps")?,
        }
        if let Some(accept) = &self.accept {
            write!(f, " accept={:?}", accept)?;
        }
        write!(f, " -> {:?}", self.next)
    }
}

/// An error raised while compiling a token pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternError {
    /// A `(` with no matching `)`.
    UnclosedGroup,
    /// A `[` with no matching `]`.
    UnclosedRange,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::UnclosedGroup => write!(f, "expected ')'"),
            PatternError::UnclosedRange => write!(f, "expected ']'"),
        }
    }
}

impl std::error::Error for PatternError {}

/// The state arena plus the closure pass counter.
#[derive(Debug, Default)]
pub struct Nfa {
    states: Vec<State>,
    pass: u64,
}

impl Nfa {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fresh state and return its id.
    pub fn state(&mut self, matcher: Option<Matcher>) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(State {
            matcher,
            next: Vec::new(),
            accept: None,
            last_pass: 0,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Compile a regex-like pattern into a fragment of this automaton.
    ///
    /// The pattern syntax: literal characters, `\n \r \t`, `\d` digit
    /// class, `\<other>` escapes, `.` wildcard, `$`/`^` line boundaries,
    /// `[...]`/`[^...]` ranges, `(...)` grouping, postfix `* + ?`, and
    /// `|` alternation.
    pub fn compile(&mut self, pattern: &str) -> Result<Fragment, PatternError> {
        let mut parser = PatternParser {
            nfa: self,
            chars: pattern.chars().collect(),
            index: 0,
        };
        parser.alternation()
    }

    /// Stamp an accept tag on the end state of a compiled fragment.
    pub fn accept(&mut self, fragment: Fragment, id: TokenId) {
        self[fragment.end].accept = Some(id);
    }

    /// Begin a new epsilon-closure pass. Each determinization step calls
    /// this once so `closure` can dedupe visits with a plain counter.
    pub(crate) fn begin_pass(&mut self) {
        self.pass += 1;
    }

    /// Collect the epsilon-closure of `id` into `list`, gathering accept
    /// tags in traversal order. Traversal stops at matcher-bearing states:
    /// they join the closure but their successors are only reachable by
    /// consuming a symbol.
    pub(crate) fn closure(
        &mut self,
        list: &mut Vec<StateId>,
        accepts: &mut Vec<TokenId>,
        id: StateId,
    ) {
        if self[id].last_pass == self.pass {
            return;
        }
        if let Some(accept) = self[id].accept.clone() {
            accepts.push(accept);
        }
        let pass = self.pass;
        self[id].last_pass = pass;
        list.push(id);

        if self[id].matcher.is_none() {
            for i in 0..self[id].next.len() {
                let next = self[id].next[i];
                self.closure(list, accepts, next);
            }
        }
    }

    /// Render the states reachable from `start`, for trace output.
    pub fn dump(&self, start: StateId) -> String {
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![start];
        let mut out = String::new();
        while let Some(id) = stack.pop() {
            if seen[id.0 as usize] {
                continue;
            }
            seen[id.0 as usize] = true;
            out.push_str(&format!("[{}] {}\n", id.0, self[id]));
            for &next in &self[id].next {
                stack.push(next);
            }
        }
        out
    }
}

impl Index<StateId> for Nfa {
    type Output = State;

    fn index(&self, id: StateId) -> &State {
        &self.states[id.0 as usize]
    }
}

impl IndexMut<StateId> for Nfa {
    fn index_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.0 as usize]
    }
}

/// One atom of a pattern, as produced by the escape-aware character
/// reader. `Nothing` stands for a read past the end of the pattern (a
/// trailing backslash); it compiles to a matcher that never matches.
enum Atom {
    Char(char),
    Digit,
    Any,
    PreNewline,
    PostNewline,
    Nothing,
}

impl Atom {
    fn into_matcher(self) -> Matcher {
        match self {
            Atom::Char(c) => Matcher::Char(c),
            Atom::Digit => Matcher::Digit,
            Atom::Any => Matcher::Any,
            Atom::PreNewline => Matcher::PreNewline,
            Atom::PostNewline => Matcher::PostNewline,
            Atom::Nothing => Matcher::Range {
                ranges: Vec::new(),
                include: true,
            },
        }
    }
}

/// Single forward-scanning cursor over a pattern, no backtracking.
struct PatternParser<'a> {
    nfa: &'a mut Nfa,
    chars: Vec<char>,
    index: usize,
}

impl PatternParser<'_> {
    fn eof(&self) -> bool {
        self.index == self.chars.len()
    }

    fn match_char(&mut self, ch: char) -> bool {
        if self.peek(ch) {
            self.index += 1;
            return true;
        }
        false
    }

    fn peek(&self, ch: char) -> bool {
        self.chars.get(self.index) == Some(&ch)
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.chars.get(self.index).copied();
        if ch.is_some() {
            self.index += 1;
        }
        ch
    }

    fn atom(&mut self) -> Atom {
        if self.match_char('\\') {
            if self.match_char('n') {
                Atom::Char('\n')
            } else if self.match_char('r') {
                Atom::Char('\r')
            } else if self.match_char('t') {
                Atom::Char('\t')
            } else if self.match_char('d') {
                Atom::Digit
            } else {
                match self.next_char() {
                    Some(ch) => Atom::Char(ch),
                    None => Atom::Nothing,
                }
            }
        } else if self.match_char('.') {
            Atom::Any
        } else if self.match_char('$') {
            Atom::PreNewline
        } else if self.match_char('^') {
            Atom::PostNewline
        } else {
            match self.next_char() {
                Some(ch) => Atom::Char(ch),
                None => Atom::Nothing,
            }
        }
    }

    fn range(&mut self) -> Fragment {
        let mut include = true;
        let mut ranges = Vec::new();

        while !self.eof() && !self.peek(']') {
            if self.match_char('^') {
                include = false;
            }
            let first = self.atom();
            if self.match_char('-') {
                let last = self.atom();
                match (first, last) {
                    (Atom::Digit, _) => ranges.push(('0', '9')),
                    (Atom::Char(lo), Atom::Char(hi)) => ranges.push((lo, hi)),
                    // Class atoms inside a range pair can never match a
                    // concrete character; leaving them out is equivalent.
                    _ => {}
                }
            } else {
                match first {
                    Atom::Digit => ranges.push(('0', '9')),
                    Atom::Char(ch) => ranges.push((ch, ch)),
                    _ => {}
                }
            }
        }

        let state = self.nfa.state(Some(Matcher::Range { ranges, include }));
        Fragment {
            start: state,
            end: state,
        }
    }

    fn basic(&mut self) -> Result<Fragment, PatternError> {
        if self.match_char('(') {
            let fragment = self.alternation()?;
            if !self.match_char(')') {
                return Err(PatternError::UnclosedGroup);
            }
            Ok(fragment)
        } else if self.match_char('[') {
            let fragment = self.range();
            if !self.match_char(']') {
                return Err(PatternError::UnclosedRange);
            }
            Ok(fragment)
        } else {
            let matcher = self.atom().into_matcher();
            let state = self.nfa.state(Some(matcher));
            Ok(Fragment {
                start: state,
                end: state,
            })
        }
    }

    fn kleene(&mut self) -> Result<Fragment, PatternError> {
        let mut fragment = self.basic()?;
        if self.match_char('+') {
            // Backward epsilon loop through a fresh end state.
            let splitter = self.nfa.state(None);
            self.nfa[fragment.end].next.push(splitter);
            self.nfa[splitter].next.push(fragment.start);
            fragment.end = splitter;
        } else if self.match_char('*') {
            // One splitter is both the bypass and the loop head.
            let splitter = self.nfa.state(None);
            self.nfa[splitter].next.push(fragment.start);
            self.nfa[fragment.end].next.push(splitter);
            fragment.start = splitter;
            fragment.end = splitter;
        } else if self.match_char('?') {
            // Parallel bypass, no loop.
            let start = self.nfa.state(None);
            let end = self.nfa.state(None);
            self.nfa[start].next.push(fragment.start);
            self.nfa[start].next.push(end);
            self.nfa[fragment.end].next.push(end);
            fragment.start = start;
            fragment.end = end;
        }
        Ok(fragment)
    }

    fn concat(&mut self) -> Result<Fragment, PatternError> {
        let start = self.nfa.state(None);
        let mut end = start;
        loop {
            if self.peek('|') || self.peek(')') || self.eof() {
                break;
            }
            let fragment = self.kleene()?;
            self.nfa[end].next.push(fragment.start);
            end = fragment.end;
        }
        Ok(Fragment { start, end })
    }

    fn alternation(&mut self) -> Result<Fragment, PatternError> {
        let start = self.nfa.state(None);
        let end = self.nfa.state(None);
        loop {
            let fragment = self.concat()?;
            self.nfa[start].next.push(fragment.start);
            self.nfa[fragment.end].next.push(end);
            if !self.match_char('|') {
                break;
            }
        }
        Ok(Fragment { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclosed_group_is_an_error() {
        let mut nfa = Nfa::new();
        assert_eq!(nfa.compile("(ab"), Err(PatternError::UnclosedGroup));
        assert_eq!(nfa.compile("[ab"), Err(PatternError::UnclosedRange));
    }

    #[test]
    fn compile_wraps_fragments_in_epsilon_endpoints() {
        let mut nfa = Nfa::new();
        let fragment = nfa.compile("a").unwrap();
        assert!(nfa[fragment.start].matcher.is_none());
        assert!(nfa[fragment.end].matcher.is_none());
    }

    #[test]
    fn closure_terminates_on_kleene_cycles() {
        let mut nfa = Nfa::new();
        let fragment = nfa.compile("a*").unwrap();
        nfa.begin_pass();
        let mut list = Vec::new();
        let mut accepts = Vec::new();
        nfa.closure(&mut list, &mut accepts, fragment.start);
        assert!(!list.is_empty());
    }
}
