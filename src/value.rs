//! Semantic values produced by reduction actions.
//!
//! The engine itself never inspects the values it threads through a parse;
//! it only needs to make one from a matched token, make the two degenerate
//! values the EBNF desugarer synthesizes (`null`, empty list), and fold an
//! item onto a list. [`SemValue`] is that seam: implement it for your own
//! AST type, or use the ready-made [`Value`] enum.

use std::rc::Rc;

/// What the evaluator and the rule desugarer need from a semantic value.
pub trait SemValue: Clone {
    /// The value of a matched terminal: its source text.
    fn from_text(text: &str) -> Self;

    /// The value of an empty derivation with no action (also what `e?`
    /// yields when `e` is absent).
    fn null() -> Self;

    /// The seed of a synthesized list fold (`e*`, `[item, sep]`).
    fn empty_list() -> Self;

    /// Fold one more item onto a list value.
    fn push(self, item: Self) -> Self;
}

/// A ready-made dynamic value. This is also the value type the desugarer's
/// own meta-grammar runs on: rule names travel as [`Value::Text`] and
/// symbol sequences as [`Value::List`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(Rc<str>),
    List(Vec<Value>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl SemValue for Value {
    fn from_text(text: &str) -> Self {
        Value::Text(text.into())
    }

    fn null() -> Self {
        Value::Null
    }

    fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    fn push(self, item: Self) -> Self {
        match self {
            Value::List(mut items) => {
                items.push(item);
                Value::List(items)
            }
            other => Value::List(vec![other, item]),
        }
    }
}
