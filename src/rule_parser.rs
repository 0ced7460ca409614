//! Rule text parsing: grammars written as text, with `|`, `*`, `+`, `?`,
//! grouping and `[item, separator]` sugar, desugared into primitive rules.
//!
//! The desugarer is bootstrapped on the engine itself: rule text is parsed
//! by an [`EarleyParser`] over a fixed meta-grammar whose actions append
//! rules to the set under construction.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::earley::EarleyParser;
use crate::grammar::{Action, RuleSet, Symbol};
use crate::nfa::PatternError;
use crate::value::{SemValue, Value};
use crate::DebugSink;

fn text_of(value: &Value) -> &str {
    value
        .as_text()
        .expect("internal error: expected a symbol name")
}

fn symbols_of(value: &Value) -> Vec<Symbol> {
    match value {
        Value::List(items) => items.iter().map(|item| Symbol::parse(text_of(item))).collect(),
        Value::Text(text) => vec![Symbol::parse(text)],
        Value::Null => Vec::new(),
    }
}

/// Builds a [`RuleSet`] from rule text. Each synthesized helper rule gets
/// a fresh `_N` name, so user rule names starting with `_` are best
/// avoided.
pub struct RuleParser<V> {
    build_set: Rc<RefCell<RuleSet<V>>>,
    action: Rc<RefCell<Option<Action<V>>>>,
    parser: EarleyParser<Value>,
}

impl<V: SemValue + 'static> RuleParser<V> {
    pub fn new(dbg: Rc<dyn DebugSink>) -> Self {
        let build_set = Rc::new(RefCell::new(RuleSet::new()));
        let action: Rc<RefCell<Option<Action<V>>>> = Rc::new(RefCell::new(None));
        let next_rule_id = Rc::new(Cell::new(0u32));

        let fresh_name = {
            let next_rule_id = next_rule_id.clone();
            move || {
                let id = next_rule_id.get();
                next_rule_id.set(id + 1);
                format!("_{}", id)
            }
        };

        let mut rules: RuleSet<Value> = RuleSet::new();
        rules.add_rule("start", vec![Symbol::nonterminal("rule")], None);
        rules.add_token("identifier", "[A-Za-z0-9_]+");
        rules.add_token("terminal", "'([^'\\\\]|\\\\.)*'");
        rules.add_rule("expr", vec![Symbol::nonterminal("or_expr")], None);

        // rule: name ':' body. The pending action slot is attached here,
        // never to synthesized helper rules.
        rules.add_rule(
            "rule",
            vec![
                Symbol::nonterminal("identifier"),
                Symbol::terminal(":"),
                Symbol::nonterminal("expr"),
            ],
            Some({
                let build_set = build_set.clone();
                let action = action.clone();
                Rc::new(move |args: Vec<Value>, _| {
                    let name = text_of(&args[0]).to_owned();
                    let symbols = symbols_of(&args[2]);
                    build_set
                        .borrow_mut()
                        .add_rule(&name, symbols, action.borrow().clone());
                    args.into_iter().next().expect("internal error: rule arity")
                })
            }),
        );
        rules.add_rule(
            "rule",
            vec![Symbol::nonterminal("identifier"), Symbol::terminal(":")],
            Some({
                let build_set = build_set.clone();
                let action = action.clone();
                Rc::new(move |args: Vec<Value>, _| {
                    let name = text_of(&args[0]).to_owned();
                    build_set
                        .borrow_mut()
                        .add_rule(&name, Vec::new(), action.borrow().clone());
                    args.into_iter().next().expect("internal error: rule arity")
                })
            }),
        );

        // Alternation desugars to a fresh rule with one alternative per arm.
        rules.add_rule(
            "or_expr",
            vec![
                Symbol::nonterminal("or_expr"),
                Symbol::terminal("\\|"),
                Symbol::nonterminal("cat_expr"),
            ],
            Some({
                let build_set = build_set.clone();
                let fresh_name = fresh_name.clone();
                Rc::new(move |args: Vec<Value>, _| {
                    let name = fresh_name();
                    let mut set = build_set.borrow_mut();
                    set.add_rule(&name, symbols_of(&args[0]), None);
                    set.add_rule(&name, symbols_of(&args[2]), None);
                    Value::List(vec![Value::Text(name.into())])
                })
            }),
        );
        rules.add_rule("or_expr", vec![Symbol::nonterminal("cat_expr")], None);

        // Concatenation folds symbols into a list.
        rules.add_rule(
            "cat_expr",
            vec![
                Symbol::nonterminal("cat_expr"),
                Symbol::nonterminal("list_expr"),
            ],
            Some(Rc::new(|mut args: Vec<Value>, _| {
                let item = args.pop().expect("internal error: cat arity");
                args.into_iter()
                    .next()
                    .expect("internal error: cat arity")
                    .push(item)
            })),
        );
        rules.add_rule(
            "cat_expr",
            vec![Symbol::nonterminal("list_expr")],
            Some(Rc::new(|args: Vec<Value>, _| Value::List(args))),
        );

        rules.add_rule("list_expr", vec![Symbol::nonterminal("kleene_expr")], None);

        // [item, separator]: a possibly-empty separated list whose value is
        // the item values with the separators dropped.
        rules.add_rule(
            "list_expr",
            vec![
                Symbol::terminal("\\["),
                Symbol::nonterminal("kleene_expr"),
                Symbol::terminal(","),
                Symbol::nonterminal("kleene_expr"),
                Symbol::terminal("\\]"),
            ],
            Some({
                let build_set = build_set.clone();
                let fresh_name = fresh_name.clone();
                Rc::new(move |args: Vec<Value>, _| {
                    let name_opt = fresh_name();
                    let name = fresh_name();
                    let item = Symbol::parse(text_of(&args[1]));
                    let separator = Symbol::parse(text_of(&args[3]));

                    let mut set = build_set.borrow_mut();
                    set.add_rule(&name_opt, vec![Symbol::nonterminal(&name)], None);
                    set.add_rule(
                        &name_opt,
                        Vec::new(),
                        Some(Rc::new(|_: Vec<V>, _| V::empty_list())),
                    );
                    set.add_rule(
                        &name,
                        vec![item.clone()],
                        Some(Rc::new(|args: Vec<V>, _| {
                            let item = args
                                .into_iter()
                                .next()
                                .expect("internal error: list arity");
                            V::empty_list().push(item)
                        })),
                    );
                    set.add_rule(
                        &name,
                        vec![Symbol::nonterminal(&name), separator, item],
                        Some(Rc::new(|mut args: Vec<V>, _| {
                            let item = args.pop().expect("internal error: list arity");
                            args.into_iter()
                                .next()
                                .expect("internal error: list arity")
                                .push(item)
                        })),
                    );
                    Value::Text(name_opt.into())
                })
            }),
        );

        // Postfix repetition operators, each simulated with extra rules.
        rules.add_rule(
            "kleene_expr",
            vec![
                Symbol::nonterminal("basic_expr"),
                Symbol::terminal("[\\+\\*\\?]"),
            ],
            Some({
                let build_set = build_set.clone();
                let fresh_name = fresh_name.clone();
                Rc::new(move |args: Vec<Value>, _| {
                    let name = fresh_name();
                    let inner = Symbol::parse(text_of(&args[0]));
                    let mut set = build_set.borrow_mut();
                    match text_of(&args[1]) {
                        "*" => {
                            set.add_rule(
                                &name,
                                vec![Symbol::nonterminal(&name), inner],
                                Some(Rc::new(|mut args: Vec<V>, _| {
                                    let item =
                                        args.pop().expect("internal error: star arity");
                                    args.into_iter()
                                        .next()
                                        .expect("internal error: star arity")
                                        .push(item)
                                })),
                            );
                            set.add_rule(
                                &name,
                                Vec::new(),
                                Some(Rc::new(|_: Vec<V>, _| V::empty_list())),
                            );
                        }
                        "?" => {
                            set.add_rule(&name, vec![inner], None);
                            set.add_rule(
                                &name,
                                Vec::new(),
                                Some(Rc::new(|_: Vec<V>, _| V::null())),
                            );
                        }
                        _ => {
                            let name2 = fresh_name();
                            set.add_rule(
                                &name,
                                vec![Symbol::nonterminal(&name2), inner.clone()],
                                None,
                            );
                            set.add_rule(
                                &name2,
                                vec![Symbol::nonterminal(&name2), inner],
                                None,
                            );
                            set.add_rule(&name2, Vec::new(), None);
                        }
                    }
                    Value::Text(name.into())
                })
            }),
        );
        rules.add_rule("kleene_expr", vec![Symbol::nonterminal("basic_expr")], None);

        rules.add_rule("basic_expr", vec![Symbol::nonterminal("identifier")], None);
        rules.add_rule(
            "basic_expr",
            vec![
                Symbol::terminal("\\("),
                Symbol::nonterminal("expr"),
                Symbol::terminal("\\)"),
            ],
            Some({
                let build_set = build_set.clone();
                let fresh_name = fresh_name.clone();
                Rc::new(move |args: Vec<Value>, _| {
                    let name = fresh_name();
                    build_set
                        .borrow_mut()
                        .add_rule(&name, symbols_of(&args[1]), None);
                    Value::Text(name.into())
                })
            }),
        );
        rules.add_rule("basic_expr", vec![Symbol::nonterminal("terminal")], None);

        rules.finalize();

        let parser = EarleyParser::new(&mut rules, dbg)
            .expect("internal error: meta grammar pattern");

        Self {
            build_set,
            action,
            parser,
        }
    }

    /// Register a named token rule. See [`RuleSet::add_token`].
    pub fn add_token(&mut self, name: &str, pattern: &str) {
        self.build_set.borrow_mut().add_token(name, pattern);
    }

    /// Parse one rule in extended syntax and append it (plus whatever
    /// helper rules its sugar needs) to the set under construction. The
    /// action attaches to the named rule itself.
    pub fn add_rule(&mut self, text: &str, action: Option<Action<V>>) {
        *self.action.borrow_mut() = action;
        self.parser.parse(text);
        *self.action.borrow_mut() = None;
    }

    /// Check the accumulated rule set. See [`RuleSet::check`].
    pub fn check(&self, errors: &mut Vec<String>) -> usize {
        self.build_set.borrow().check(errors)
    }

    /// Messages from rule text that failed to parse.
    pub fn errors(&self) -> &[String] {
        self.parser.errors()
    }

    /// Shared handle to the rule set being built.
    pub fn rule_set(&self) -> Rc<RefCell<RuleSet<V>>> {
        self.build_set.clone()
    }

    /// Finalize the accumulated rules and build a parser over them.
    pub fn into_parser(self, dbg: Rc<dyn DebugSink>) -> Result<EarleyParser<V>, PatternError> {
        let mut set = self.build_set.borrow_mut();
        set.finalize();
        EarleyParser::new(&mut set, dbg)
    }
}
