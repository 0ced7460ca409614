//! The grammar model: rules, terminal discovery, rule-set simplification,
//! and the FIRST/FOLLOW fixpoints consumed by the parser.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashlink::LinkedHashMap;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};

use crate::nfa::PatternError;
use crate::tokenizer::{Location, TokenId, Tokenizer, EOF_PATTERN};
use crate::DebugSink;

/// Insertion-ordered map: alternative order and rule-name order carry
/// priority, both in prediction and in first-match disambiguation.
pub(crate) type OrderedMap<K, V> = LinkedHashMap<K, V, FxBuildHasher>;

/// One symbol on the right-hand side of a rule, tagged once at
/// construction time instead of by inspecting a leading quote everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A quoted terminal; the payload is the regex body without quotes.
    Terminal(Rc<str>),
    /// A reference to another rule by name.
    NonTerminal(Rc<str>),
}

impl Symbol {
    /// Decode the quote convention of rule text: a leading `'` marks a
    /// terminal, anything else a nonterminal name.
    pub fn parse(text: &str) -> Symbol {
        match text.strip_prefix('\'') {
            Some(rest) => Symbol::Terminal(rest.strip_suffix('\'').unwrap_or(rest).into()),
            None => Symbol::NonTerminal(text.into()),
        }
    }

    pub fn terminal(pattern: &str) -> Symbol {
        Symbol::Terminal(pattern.into())
    }

    pub fn nonterminal(name: &str) -> Symbol {
        Symbol::NonTerminal(name.into())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Terminal(pattern) => write!(f, "'{}'", pattern),
            Symbol::NonTerminal(name) => write!(f, "{}", name),
        }
    }
}

/// An element of a FIRST or FOLLOW set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// The empty derivation marker (FIRST sets only).
    Epsilon,
    /// A terminal, identified by its pattern body.
    Terminal(Rc<str>),
}

/// A reduction action: ordered child values plus the location of the first
/// consumed token. A failing action panics through `parse` uncaught; the
/// engine neither wraps nor recovers it.
pub type Action<V> = Rc<dyn Fn(Vec<V>, Location) -> V>;

/// One production rule. Immutable after construction except for the
/// rule set's simplification pass, which splices symbol lists in place.
pub struct Rule<V> {
    pub id: u32,
    pub name: Rc<str>,
    pub symbols: RefCell<Vec<Symbol>>,
    pub action: Option<Action<V>>,
}

impl<V> fmt::Display for Rule<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for symbol in self.symbols.borrow().iter() {
            write!(f, " {}", symbol)?;
        }
        Ok(())
    }
}

/// A set of named rule alternatives plus everything derived from them:
/// discovered terminals in priority order and the FIRST/FOLLOW maps.
///
/// Every rule set implicitly contains the synthetic start rule
/// `_start -> start '!EOF'`.
pub struct RuleSet<V> {
    pub(crate) rules: OrderedMap<Rc<str>, Vec<Rc<Rule<V>>>>,
    /// Discovered terminal patterns, highest priority first.
    pub terminals: Vec<Rc<str>>,
    terminals_added: FxHashSet<Rc<str>>,
    pub first: FxHashMap<Rc<str>, FxHashSet<Term>>,
    pub follow: FxHashMap<Rc<str>, FxHashSet<Term>>,
    /// When set (the default), `create_tokenizer` registers an ignore
    /// pattern for spaces, tabs, carriage returns and 0x1a.
    pub eat_white_space: bool,
    next_rule_id: u32,
}

impl<V> Default for RuleSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RuleSet<V> {
    pub fn new() -> Self {
        let mut set = Self {
            rules: OrderedMap::default(),
            terminals: Vec::new(),
            terminals_added: FxHashSet::default(),
            first: FxHashMap::default(),
            follow: FxHashMap::default(),
            eat_white_space: true,
            next_rule_id: 0,
        };
        set.add_rule(
            "_start",
            vec![Symbol::nonterminal("start"), Symbol::terminal(EOF_PATTERN)],
            None,
        );
        set
    }

    /// Append one alternative for `name`, registering any new terminal
    /// patterns in first-seen order.
    pub fn add_rule(&mut self, name: &str, symbols: Vec<Symbol>, action: Option<Action<V>>) {
        for symbol in &symbols {
            if let Symbol::Terminal(pattern) = symbol {
                if self.terminals_added.insert(pattern.clone()) {
                    self.terminals.push(pattern.clone());
                }
            }
        }

        let name: Rc<str> = name.into();
        let rule = Rc::new(Rule {
            id: self.next_rule_id,
            name: name.clone(),
            symbols: RefCell::new(symbols),
            action,
        });
        self.next_rule_id += 1;
        self.rules.entry(name).or_insert_with(Vec::new).push(rule);
    }

    /// Sugar for a single-terminal rule.
    pub fn add_token(&mut self, name: &str, pattern: &str) {
        self.add_rule(name, vec![Symbol::terminal(pattern)], None);
    }

    pub fn alternatives(&self, name: &str) -> Option<&Vec<Rc<Rule<V>>>> {
        self.rules.get(name)
    }

    /// Verify rule consistency, appending human-readable messages to
    /// `errors`. Returns the number of errors found. Terminal regex
    /// syntax is not validated here; that surfaces at tokenizer build.
    pub fn check(&self, errors: &mut Vec<String>) -> usize {
        let size = errors.len();
        for (name, alternatives) in &self.rules {
            for rule in alternatives {
                for symbol in rule.symbols.borrow().iter() {
                    match symbol {
                        Symbol::NonTerminal(reference) => {
                            if reference.is_empty() {
                                errors.push(format!(
                                    "Error: Rule '{}' contains a zero length symbol",
                                    name
                                ));
                            } else if !self.rules.contains_key(reference.as_ref()) {
                                errors.push(format!(
                                    "Error: Rule '{}' contains an undefined symbol: {}",
                                    name, reference
                                ));
                            }
                        }
                        Symbol::Terminal(pattern) => {
                            if pattern.is_empty() {
                                errors.push(format!(
                                    "Error: Rule '{}' contains a zero length symbol",
                                    name
                                ));
                            }
                        }
                    }
                }
            }
        }
        errors.len() - size
    }

    /// Delete the named rule and splice its symbols into every reference.
    fn replace_rule(&mut self, name: &str, new_symbols: &[Symbol]) {
        self.rules.remove(name);
        for (_, alternatives) in self.rules.iter_mut() {
            for rule in alternatives {
                let mut symbols = rule.symbols.borrow_mut();
                let mut j = 0;
                while j < symbols.len() {
                    let hit = matches!(&symbols[j], Symbol::NonTerminal(n) if n.as_ref() == name);
                    if hit {
                        symbols.splice(j..=j, new_symbols.iter().cloned());
                        j += new_symbols.len();
                    } else {
                        j += 1;
                    }
                }
            }
        }
    }

    /// Shrink the rule set: repeatedly inline any nonterminal with exactly
    /// one action-less alternative (other than `_start`) into its
    /// references, to a fixpoint. Must run before FIRST/FOLLOW and before
    /// any parsing begins.
    pub fn optimize(&mut self) {
        loop {
            let mut target = None;
            for (name, alternatives) in &self.rules {
                if alternatives.len() == 1
                    && name.as_ref() != "_start"
                    && alternatives[0].action.is_none()
                {
                    target = Some((name.clone(), alternatives[0].symbols.borrow().clone()));
                    break;
                }
            }
            match target {
                Some((name, symbols)) => self.replace_rule(&name, &symbols),
                None => break,
            }
        }
    }

    /// Fixpoint computation of FIRST sets. An empty rule contributes
    /// EPSILON; a leading terminal contributes itself only; a leading
    /// nonterminal contributes its FIRST set, folding in later symbols
    /// only while every symbol so far is nullable.
    pub fn compute_first(&mut self) {
        self.first.clear();
        for name in self.rules.keys() {
            self.first.insert(name.clone(), FxHashSet::default());
        }

        let mut changed = true;
        while changed {
            changed = false;
            for (name, alternatives) in &self.rules {
                for rule in alternatives {
                    let symbols = rule.symbols.borrow();
                    if symbols.is_empty() {
                        if let Some(set) = self.first.get_mut(name) {
                            changed |= set.insert(Term::Epsilon);
                        }
                    }
                    for symbol in symbols.iter() {
                        match symbol {
                            Symbol::Terminal(pattern) => {
                                if let Some(set) = self.first.get_mut(name) {
                                    changed |= set.insert(Term::Terminal(pattern.clone()));
                                }
                                break;
                            }
                            Symbol::NonTerminal(reference) => {
                                let source: Vec<Term> = self
                                    .first
                                    .get(reference.as_ref())
                                    .map(|set| set.iter().cloned().collect())
                                    .unwrap_or_default();
                                let nullable = source.contains(&Term::Epsilon);
                                if let Some(set) = self.first.get_mut(name) {
                                    for term in source {
                                        changed |= set.insert(term);
                                    }
                                }
                                if !nullable {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Fixpoint computation of FOLLOW sets over the current FIRST sets.
    pub fn compute_follow(&mut self) {
        self.follow.clear();
        for name in self.rules.keys() {
            self.follow.insert(name.clone(), FxHashSet::default());
        }

        let mut changed = true;
        while changed {
            changed = false;
            for (name, alternatives) in &self.rules {
                for rule in alternatives {
                    let symbols = rule.symbols.borrow();
                    for j in 0..symbols.len() {
                        let Symbol::NonTerminal(current) = &symbols[j] else {
                            continue;
                        };
                        if j == symbols.len() - 1 {
                            // Final position: the nonterminal inherits the
                            // FOLLOW set of the enclosing rule's name.
                            if current != name {
                                let source: Vec<Term> = self
                                    .follow
                                    .get(name)
                                    .map(|set| set.iter().cloned().collect())
                                    .unwrap_or_default();
                                if let Some(set) = self.follow.get_mut(current.as_ref()) {
                                    for term in source {
                                        changed |= set.insert(term);
                                    }
                                }
                            }
                        } else {
                            match &symbols[j + 1] {
                                Symbol::Terminal(pattern) => {
                                    if let Some(set) = self.follow.get_mut(current.as_ref()) {
                                        changed |= set.insert(Term::Terminal(pattern.clone()));
                                    }
                                }
                                Symbol::NonTerminal(next) => {
                                    let source: Vec<Term> = self
                                        .first
                                        .get(next.as_ref())
                                        .map(|set| {
                                            set.iter()
                                                .filter(|term| **term != Term::Epsilon)
                                                .cloned()
                                                .collect()
                                        })
                                        .unwrap_or_default();
                                    if let Some(set) = self.follow.get_mut(current.as_ref()) {
                                        for term in source {
                                            changed |= set.insert(term);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Simplify the rule set and compute both fixpoints.
    pub fn finalize(&mut self) {
        self.optimize();
        self.compute_first();
        self.compute_follow();
    }

    /// Build a tokenizer holding every discovered terminal, highest
    /// priority first, preceded by the whitespace ignore pattern.
    pub fn create_tokenizer(&self, dbg: Rc<dyn DebugSink>) -> Result<Tokenizer, PatternError> {
        let mut tokenizer = Tokenizer::new(dbg);
        if self.eat_white_space {
            tokenizer.ignore("[ \t\r\u{1a}]+")?;
        }
        for pattern in &self.terminals {
            tokenizer.add_token(TokenId::Terminal(pattern.clone()), pattern)?;
        }
        Ok(tokenizer)
    }
}

impl<V> fmt::Display for RuleSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, alternatives) in &self.rules {
            for rule in alternatives {
                writeln!(f, "{}", rule)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn arith() -> RuleSet<Value> {
        let mut set = RuleSet::new();
        set.add_rule("start", vec![Symbol::nonterminal("expr")], None);
        set.add_rule(
            "expr",
            vec![
                Symbol::nonterminal("expr"),
                Symbol::terminal("\\+"),
                Symbol::nonterminal("term"),
            ],
            None,
        );
        set.add_rule("expr", vec![Symbol::nonterminal("term")], None);
        set.add_token("term", "\\d+");
        set
    }

    #[test]
    fn check_reports_undefined_symbols() {
        let mut set: RuleSet<Value> = RuleSet::new();
        set.add_rule("start", vec![Symbol::nonterminal("missing")], None);
        let mut errors = Vec::new();
        assert_eq!(set.check(&mut errors), 1);
        assert!(errors[0].contains("undefined symbol: missing"));
    }

    #[test]
    fn optimize_inlines_single_alternatives() {
        let mut set = arith();
        set.optimize();
        assert!(set.alternatives("start").is_none());
        assert!(set.alternatives("term").is_none());
        let expr = set.alternatives("expr").unwrap();
        assert_eq!(expr.len(), 2);
        assert_eq!(
            expr[0].symbols.borrow().clone(),
            vec![
                Symbol::nonterminal("expr"),
                Symbol::terminal("\\+"),
                Symbol::terminal("\\d+"),
            ]
        );
    }

    #[test]
    fn first_and_follow_fixpoints() {
        let mut set = arith();
        set.finalize();
        let first = &set.first["expr"];
        assert!(first.contains(&Term::Terminal("\\d+".into())));
        assert!(!first.contains(&Term::Epsilon));
        let follow = &set.follow["expr"];
        assert!(follow.contains(&Term::Terminal("\\+".into())));
        assert!(follow.contains(&Term::Terminal(EOF_PATTERN.into())));
    }

    #[test]
    fn empty_alternative_yields_epsilon_in_first() {
        let mut set: RuleSet<Value> = RuleSet::new();
        set.add_rule("start", vec![Symbol::nonterminal("opt")], None);
        set.add_rule("opt", vec![], None);
        set.add_rule("opt", vec![Symbol::terminal("x")], None);
        set.compute_first();
        let first = &set.first["opt"];
        assert!(first.contains(&Term::Epsilon));
        assert!(first.contains(&Term::Terminal("x".into())));
        assert!(set.first["start"].contains(&Term::Epsilon));
    }

    #[test]
    fn terminals_keep_first_seen_order() {
        let set = arith();
        let patterns: Vec<&str> = set.terminals.iter().map(|p| p.as_ref()).collect();
        assert_eq!(patterns, vec![EOF_PATTERN, "\\+", "\\d+"]);
    }
}
