//! The Earley chart parser and the back-pointer evaluation walk.

use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::grammar::{OrderedMap, Rule, RuleSet, Symbol, Term};
use crate::nfa::PatternError;
use crate::tokenizer::{Location, Token, TokenId, Tokenizer};
use crate::value::SemValue;
use crate::DebugSink;

/// Index of an item inside the chart: column number plus position within
/// that column. Items never move once pushed, so a reference stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRef {
    pub col: usize,
    pub idx: usize,
}

/// What an item consumed in its last step.
#[derive(Clone)]
pub enum Child {
    Token(Token),
    Item(ItemRef),
}

/// One Earley item: a dotted rule, the column it started in, and the
/// derivation chain behind it.
pub struct Item<V> {
    pub id: u32,
    pub rule: Rc<Rule<V>>,
    pub pos: usize,
    pub base: usize,
    pub child: Option<Child>,
    pub prev: Option<ItemRef>,
    pub location: Location,
}

impl<V> fmt::Display for Item<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.rule.name)?;
        let symbols = self.rule.symbols.borrow();
        for (j, symbol) in symbols.iter().enumerate() {
            if j == self.pos {
                write!(f, " .")?;
            }
            write!(f, " {}", symbol)?;
        }
        if self.pos == symbols.len() {
            write!(f, " .")?;
        }
        write!(f, " ({})", self.base)?;
        match &self.child {
            Some(Child::Token(token)) => write!(f, " {}", token)?,
            Some(Child::Item(item)) => write!(f, " Item({},{})", item.col, item.idx)?,
            None => {}
        }
        Ok(())
    }
}

/// An Earley parser over a finalized rule set. Prediction is pruned with
/// the rule set's FIRST sets; completion scans the base column with a
/// growing bound so that same-column completions are seen.
pub struct EarleyParser<V> {
    pub tokenizer: Tokenizer,
    rules: OrderedMap<Rc<str>, Vec<Rc<Rule<V>>>>,
    first: FxHashMap<Rc<str>, FxHashSet<Term>>,
    errors: Vec<String>,
    location: Location,
    pub debug: bool,
    dbg: Rc<dyn DebugSink>,
    next_item_id: u32,
}

impl<V: SemValue> EarleyParser<V> {
    /// Clone the rule set's tables and build the tokenizer from its
    /// terminals. FIRST sets are recomputed here so the parser always
    /// predicts against the rules as it sees them.
    pub fn new(rule_set: &mut RuleSet<V>, dbg: Rc<dyn DebugSink>) -> Result<Self, PatternError> {
        rule_set.compute_first();
        let tokenizer = rule_set.create_tokenizer(dbg.clone())?;
        Ok(Self {
            tokenizer,
            rules: rule_set.rules.clone(),
            first: rule_set.first.clone(),
            errors: Vec::new(),
            location: Location::new(0, 0),
            debug: false,
            dbg,
            next_item_id: 0,
        })
    }

    /// Messages from the most recent `parse` call; cleared on each call.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Parse `text` from the synthetic start rule and evaluate the
    /// derivation. Returns `None` after recording an error message when
    /// tokenization or recognition fails.
    pub fn parse(&mut self, text: &str) -> Option<V> {
        self.tokenizer.set_text(text);
        self.errors.clear();
        self.location = Location::new(0, 0);
        let mut chart: Vec<Vec<Item<V>>> = vec![Vec::new()];

        let start_rules = self
            .rules
            .get("_start")
            .expect("internal error: missing start rule")
            .clone();
        for rule in start_rules {
            let item = self.make_item(rule, 0, 0, None, None, Location::new(0, 0));
            chart[0].push(item);
        }

        let mut i = 0;
        loop {
            let token = match self.tokenizer.next_token(self.location.line, self.location.column) {
                Some(token) => token,
                None => {
                    self.errors
                        .push(format!("Bad token at {}", self.tokenizer.last_start));
                    return None;
                }
            };
            if self.debug {
                self.dbg.printf(format_args!("Got token {}\n", token));
            }

            chart.push(Vec::new());
            let mut processed = 0;
            while processed < chart[i].len() {
                let pos = chart[i][processed].pos;
                let symbols_len = chart[i][processed].rule.symbols.borrow().len();
                if pos < symbols_len {
                    let symbol = chart[i][processed].rule.symbols.borrow()[pos].clone();
                    if let Symbol::NonTerminal(name) = symbol {
                        self.predict(&mut chart, i, &name, &token);
                    }
                } else {
                    self.complete(&mut chart, i, processed);
                }
                processed += 1;
            }

            // Scan: shift items expecting this token into the next column.
            for j in 0..chart[i].len() {
                let item = &chart[i][j];
                if item.pos >= item.rule.symbols.borrow().len() {
                    continue;
                }
                let expects = matches!(
                    (&item.rule.symbols.borrow()[item.pos], &token.id),
                    (Symbol::Terminal(pattern), TokenId::Terminal(id)) if pattern == id
                );
                if !expects {
                    continue;
                }
                let advanced = self.make_item(
                    chart[i][j].rule.clone(),
                    chart[i][j].pos + 1,
                    chart[i][j].base,
                    Some(Child::Token(token.clone())),
                    Some(ItemRef { col: i, idx: j }),
                    chart[i][j].location,
                );
                push_unique(&mut chart, i + 1, advanced);
            }

            if self.debug {
                self.print_column(&chart, i);
            }

            if chart[i + 1].is_empty() && !self.tokenizer.finished {
                self.errors
                    .push(format!("Syntax error at {}: {}", token.location, token));
                self.dump_column(&chart, i);
                return None;
            }

            // The end-of-input token is zero-width; keep its own location
            // so the post-loop diagnostics point at end of input.
            self.location = token.location;
            i += 1;
            if self.tokenizer.finished {
                break;
            }
            self.location.column += token.text.chars().count();
        }

        // One more pass so completions triggered by the EOF shift land.
        let mut processed = 0;
        while processed < chart[i].len() {
            let pos = chart[i][processed].pos;
            let symbols_len = chart[i][processed].rule.symbols.borrow().len();
            if pos >= symbols_len {
                self.complete(&mut chart, i, processed);
            }
            processed += 1;
        }
        if self.debug {
            self.print_column(&chart, i);
        }

        let accepted = chart[i].iter().position(|item| {
            item.rule.name.as_ref() == "_start"
                && item.base == 0
                && item.pos == item.rule.symbols.borrow().len()
        });
        match accepted {
            Some(idx) => Some(self.evaluate(&chart, ItemRef { col: i, idx })),
            None => {
                self.errors.push(format!("Syntax error at {}", self.location));
                self.dump_column(&chart, i);
                None
            }
        }
    }

    /// Add fresh items for every alternative of `name`, pruned by FIRST:
    /// an alternative is predicted only when it could not possibly need a
    /// different current token.
    fn predict(&mut self, chart: &mut Vec<Vec<Item<V>>>, i: usize, name: &str, token: &Token) {
        let alternatives = match self.rules.get(name) {
            Some(alternatives) => alternatives.clone(),
            None => return,
        };
        for rule in alternatives {
            let admit = {
                let symbols = rule.symbols.borrow();
                match symbols.first() {
                    None => true,
                    Some(Symbol::Terminal(_)) => true,
                    Some(Symbol::NonTerminal(nt)) => {
                        self.first.get(nt.as_ref()).is_some_and(|first| {
                            first.contains(&Term::Epsilon)
                                || matches!(&token.id, TokenId::Terminal(id)
                                    if first.contains(&Term::Terminal(id.clone())))
                        })
                    }
                }
            };
            if !admit {
                continue;
            }
            let item = self.make_item(rule, 0, i, None, None, token.location);
            push_unique(chart, i, item);
        }
    }

    /// For a finished item, advance every item in its base column that was
    /// waiting on its rule name. The scan bound grows because completion
    /// in column `i` with base `i` can enqueue more base-column items.
    fn complete(&mut self, chart: &mut Vec<Vec<Item<V>>>, i: usize, idx: usize) {
        let name = chart[i][idx].rule.name.clone();
        let base = chart[i][idx].base;
        let mut j = 0;
        while j < chart[base].len() {
            let waiting = {
                let item = &chart[base][j];
                let symbols = item.rule.symbols.borrow();
                item.pos < symbols.len()
                    && matches!(&symbols[item.pos], Symbol::NonTerminal(nt) if *nt == name)
            };
            if waiting {
                let advanced = self.make_item(
                    chart[base][j].rule.clone(),
                    chart[base][j].pos + 1,
                    chart[base][j].base,
                    Some(Child::Item(ItemRef { col: i, idx })),
                    Some(ItemRef { col: base, idx: j }),
                    chart[base][j].location,
                );
                push_unique(chart, i, advanced);
            }
            j += 1;
        }
    }

    /// Evaluate a finished item: walk the back-pointer chain to recover the
    /// children in order, recurse, then apply the rule's action. A rule
    /// without an action yields its first child, or the null value when it
    /// consumed nothing.
    fn evaluate(&self, chart: &[Vec<Item<V>>], item: ItemRef) -> V {
        let mut args = Vec::new();
        let mut location = chart[item.col][item.idx].location;
        let mut current = Some(item);
        while let Some(at) = current {
            let entry = &chart[at.col][at.idx];
            location = entry.location;
            match &entry.child {
                Some(Child::Token(token)) => args.push(V::from_text(&token.text)),
                Some(Child::Item(child)) => {
                    let child = *child;
                    args.push(self.evaluate(chart, child));
                }
                None => {}
            }
            current = chart[at.col][at.idx].prev;
        }
        args.reverse();

        match &chart[item.col][item.idx].rule.action {
            Some(action) => action(args, location),
            None => args.into_iter().next().unwrap_or_else(V::null),
        }
    }

    fn make_item(
        &mut self,
        rule: Rc<Rule<V>>,
        pos: usize,
        base: usize,
        child: Option<Child>,
        prev: Option<ItemRef>,
        location: Location,
    ) -> Item<V> {
        let id = self.next_item_id;
        self.next_item_id += 1;
        Item {
            id,
            rule,
            pos,
            base,
            child,
            prev,
            location,
        }
    }

    fn print_column(&self, chart: &[Vec<Item<V>>], i: usize) {
        self.dbg.printf(format_args!("State {}\n", i));
        for item in &chart[i] {
            self.dbg.printf(format_args!("    {}\n", item));
        }
    }

    fn dump_column(&mut self, chart: &[Vec<Item<V>>], i: usize) {
        for item in &chart[i] {
            self.errors.push(format!("    {}", item));
        }
    }
}

/// Push an item unless an equivalent one (same rule, dot, base) is already
/// in the column.
fn push_unique<V>(chart: &mut [Vec<Item<V>>], col: usize, item: Item<V>) {
    let duplicate = chart[col]
        .iter()
        .any(|other| other.rule.id == item.rule.id && other.pos == item.pos && other.base == item.base);
    if !duplicate {
        chart[col].push(item);
    }
}
