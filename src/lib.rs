#![doc = include_str!("../README.md")]

use std::fmt;

mod dfa;
mod earley;
mod grammar;
mod matcher;
mod nfa;
mod rule_parser;
mod tokenizer;
mod value;

pub use dfa::{Dfa, DfaId, DfaState};
pub use earley::{Child, EarleyParser, Item, ItemRef};
pub use grammar::{Action, Rule, RuleSet, Symbol, Term};
pub use matcher::{Matcher, ScanSymbol};
pub use nfa::{Fragment, Nfa, PatternError, State, StateId};
pub use rule_parser::RuleParser;
pub use tokenizer::{Location, Token, TokenId, Tokenizer, EOF_PATTERN};
pub use value::{SemValue, Value};

/// Where debug traces go. The engine formats lazily, so a sink that drops
/// everything costs only the trace call itself.
pub trait DebugSink {
    fn printf(&self, args: fmt::Arguments<'_>);
}

/// Discards all traces.
pub struct NullSink;

impl DebugSink for NullSink {
    fn printf(&self, _args: fmt::Arguments<'_>) {}
}

/// Writes traces to standard output.
pub struct StdoutSink;

impl DebugSink for StdoutSink {
    fn printf(&self, args: fmt::Arguments<'_>) {
        print!("{}", args);
    }
}
