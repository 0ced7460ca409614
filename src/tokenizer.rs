//! Longest-match tokenization over the lazily determinized automaton.

use std::fmt;
use std::rc::Rc;

use crate::dfa::{Dfa, DfaId};
use crate::matcher::ScanSymbol;
use crate::nfa::{Nfa, PatternError, StateId};
use crate::DebugSink;

/// The reserved terminal pattern standing for end of input. The grammar
/// registers it like any other terminal; the tokenizer synthesizes its
/// token at end of text without consulting the automaton.
pub const EOF_PATTERN: &str = "!EOF";

/// A position in the source text. Stored 0-based; rendered 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// The terminal tag carried by a token and by NFA accept states.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenId {
    /// Matches are silently skipped (whitespace and the like).
    Ignore,
    /// A grammar terminal, identified by its pattern body.
    Terminal(Rc<str>),
}

/// One matched token: tag, matched text, and where it started.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: TokenId,
    pub text: Rc<str>,
    pub location: Location,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.text)
    }
}

/// Scanner over one composite automaton holding every registered terminal
/// pattern. Priority is registration order: when several patterns accept
/// the same longest prefix, the earliest-registered one wins.
pub struct Tokenizer {
    nfa: Nfa,
    root: StateId,
    dfa: Dfa,
    root_dfa: Option<DfaId>,
    text: Vec<char>,
    /// Character offset of the start of each line.
    line_starts: Vec<usize>,
    /// Set once the end-of-input token has been produced.
    pub finished: bool,
    /// Where the most recent scan started; the error position when the
    /// scan fails to match any token.
    pub last_start: Location,
    /// The tag reported at end of text. Redefinable by the host.
    pub eof_token: TokenId,
    pub debug: bool,
    dbg: Rc<dyn DebugSink>,
}

impl Tokenizer {
    pub fn new(dbg: Rc<dyn DebugSink>) -> Self {
        let mut nfa = Nfa::new();
        let root = nfa.state(None);
        Self {
            nfa,
            root,
            dfa: Dfa::new(),
            root_dfa: None,
            text: Vec::new(),
            line_starts: Vec::new(),
            finished: true,
            last_start: Location::default(),
            eof_token: TokenId::Terminal(EOF_PATTERN.into()),
            debug: false,
            dbg,
        }
    }

    /// Register one terminal pattern under the given tag.
    pub fn add_token(&mut self, id: TokenId, pattern: &str) -> Result<(), PatternError> {
        let fragment = self.nfa.compile(pattern)?;
        self.nfa[self.root].next.push(fragment.start);
        self.nfa.accept(fragment, id.clone());
        if self.debug {
            self.dbg.printf(format_args!(
                "token {:?} = '{}'\n{}",
                id,
                pattern,
                self.nfa.dump(fragment.start)
            ));
        }
        Ok(())
    }

    /// Register a pattern whose matches are skipped.
    pub fn ignore(&mut self, pattern: &str) -> Result<(), PatternError> {
        self.add_token(TokenId::Ignore, pattern)
    }

    /// Load the text to scan and record line-start offsets.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.line_starts.clear();
        self.line_starts.push(0);
        self.finished = false;

        for (i, &ch) in self.text.iter().enumerate() {
            if ch == '\n' {
                self.line_starts.push(i + 1);
            }
        }
    }

    /// The source text of one line, for diagnostics.
    pub fn get_line(&self, line: usize) -> String {
        let start = self.line_starts[line];
        let end = match self.line_starts.get(line + 1) {
            Some(&next) => next - 1,
            None => self.text.len(),
        };
        self.text[start..end].iter().collect()
    }

    /// The next non-ignored token at the given position, or `None` when
    /// the scan dies without ever recording an accept (a bad token).
    pub fn next_token(&mut self, mut line: usize, mut column: usize) -> Option<Token> {
        loop {
            let token = self.next_token_internal(line, column)?;
            if token.id != TokenId::Ignore {
                return Some(token);
            }
            line = token.location.line;
            column = token.location.column + token.text.chars().count();
        }
    }

    /// One longest-match scan from the given position.
    ///
    /// The DFA is walked one symbol at a time; every time a transition
    /// lands in an accepting state the tentative match is overwritten, so
    /// the last accept recorded is the longest. A pre-newline boundary
    /// symbol is synthesized immediately before each literal `'\n'` and a
    /// post-newline symbol at start of text and immediately after `'\n'`;
    /// both are zero-width and do not advance the scan position.
    fn next_token_internal(&mut self, mut line: usize, column: usize) -> Option<Token> {
        let root_dfa = match self.root_dfa {
            Some(id) => id,
            None => {
                self.nfa.begin_pass();
                let id = self.dfa.start(&mut self.nfa, self.root);
                self.root_dfa = Some(id);
                id
            }
        };

        self.last_start = Location::new(line, column);
        let start = self.line_starts[line] + column;
        if start == self.text.len() {
            self.finished = true;
            return Some(Token {
                id: self.eof_token.clone(),
                text: EOF_PATTERN.into(),
                location: Location::new(line, column),
            });
        }

        let mut state = root_dfa;
        let mut last = if start > 0 {
            Some(ScanSymbol::Char(self.text[start - 1]))
        } else {
            None
        };
        let mut accept = None;

        let mut i = start as isize;
        while i < self.text.len() as isize {
            let ch = self.text[i as usize];
            let mut symbol = ScanSymbol::Char(ch);
            if ch == '\n' && last != Some(ScanSymbol::PreNewline) {
                symbol = ScanSymbol::PreNewline;
                i -= 1;
            } else if last == Some(ScanSymbol::Char('\n')) || last.is_none() {
                symbol = ScanSymbol::PostNewline;
                i -= 1;
            }
            if last == Some(ScanSymbol::Char('\n')) {
                line += 1;
            }
            last = Some(symbol);

            state = self.dfa.advance(&mut self.nfa, state, symbol);

            let dfa_state = self.dfa.state(state);
            if !dfa_state.accepts.is_empty() {
                let end = (i + 1) as usize;
                let text: String = self.text[start..end].iter().collect();
                accept = Some(Token {
                    id: dfa_state.accepts[0].clone(),
                    text: text.into(),
                    location: Location::new(line, start.saturating_sub(self.line_starts[line])),
                });
            }

            if dfa_state.is_dead() {
                break;
            }
            i += 1;
        }

        if self.debug {
            match &accept {
                Some(token) => self.dbg.printf(format_args!(
                    "match {:?} at {} text={}\n",
                    token.id, token.location, token.text
                )),
                None => self.dbg.printf(format_args!(
                    "bad token at '{}'\n",
                    self.text[start..self.text.len().min(start + 10)]
                        .iter()
                        .collect::<String>()
                )),
            }
        }

        accept
    }
}
