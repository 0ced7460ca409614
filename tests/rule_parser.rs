//! The extended rule syntax, exercised end to end: rule text in, parses
//! and semantic values out.

use std::rc::Rc;

use earley_it::{EarleyParser, NullSink, RuleParser, Value};

fn parser_for(rules: &[&str]) -> EarleyParser<Value> {
    let mut rule_parser: RuleParser<Value> = RuleParser::new(Rc::new(NullSink));
    for rule in rules {
        rule_parser.add_rule(rule, None);
    }
    assert!(
        rule_parser.errors().is_empty(),
        "rule text rejected: {:?}",
        rule_parser.errors()
    );
    rule_parser.into_parser(Rc::new(NullSink)).unwrap()
}

fn text(value: &Value) -> &str {
    value.as_text().unwrap()
}

#[test]
fn separated_list() {
    let mut parser = parser_for(&["start: ['[a-z]+', ',']"]);

    assert_eq!(parser.parse(""), Some(Value::List(vec![])));

    let one = parser.parse("a").unwrap();
    assert_eq!(one.as_list().unwrap().len(), 1);

    let three = parser.parse("foo, bar, baz").unwrap();
    let items: Vec<&str> = three.as_list().unwrap().iter().map(text).collect();
    assert_eq!(items, vec!["foo", "bar", "baz"]);

    assert!(parser.parse(",a").is_none());
    assert!(parser.parse("a,").is_none());
}

#[test]
fn kleene_star() {
    let mut parser = parser_for(&["start: 'a'*"]);
    assert_eq!(parser.parse(""), Some(Value::List(vec![])));
    let many = parser.parse("aaa").unwrap();
    assert_eq!(many.as_list().unwrap().len(), 3);
}

#[test]
fn optional() {
    let mut parser = parser_for(&["start: 'a'? 'b'"]);
    assert!(parser.parse("ab").is_some());
    assert!(parser.parse("b").is_some());
    assert!(parser.parse("aab").is_none());
}

#[test]
fn one_or_more_requires_at_least_one() {
    // '+' desugars through a nullable helper rule, but the wrapper rule
    // still consumes one trailing item itself.
    let mut parser = parser_for(&["start: 'a'+ 'b'"]);
    assert!(parser.parse("ab").is_some());
    assert!(parser.parse("aaab").is_some());
    assert!(parser.parse("b").is_none());
}

#[test]
fn alternation_and_grouping() {
    let mut parser = parser_for(&["start: ('a' | 'b') 'c'"]);
    assert!(parser.parse("ac").is_some());
    assert!(parser.parse("bc").is_some());
    assert!(parser.parse("cc").is_none());
    assert!(parser.parse("abc").is_none());
}

#[test]
fn multiple_rules_and_references() {
    let mut parser = parser_for(&[
        "start: item*",
        "item: word | number",
        "word: '[a-z]+'",
        "number: '[0-9]+'",
    ]);
    assert!(parser.parse("abc 123 def").is_some());
    assert!(parser.parse("").is_some());
    assert!(parser.parse("abc !").is_none());
}

#[test]
fn empty_rule_body() {
    let mut parser = parser_for(&["start: nothing 'x'", "nothing:"]);
    assert!(parser.parse("x").is_some());
}

#[test]
fn escaped_quote_in_terminal() {
    let mut parser = parser_for(&["start: '\\'' '[a-z]+' '\\''"]);
    assert!(parser.parse("'hello'").is_some());
    assert!(parser.parse("hello").is_none());
}

#[test]
fn actions_attach_to_named_rules() {
    let mut rule_parser: RuleParser<Value> = RuleParser::new(Rc::new(NullSink));
    rule_parser.add_rule("start: list", None);
    rule_parser.add_rule(
        "list: ['[0-9]+', ',']",
        Some(Rc::new(|args: Vec<Value>, _| {
            let total: i64 = args[0]
                .as_list()
                .unwrap()
                .iter()
                .map(|v| v.as_text().unwrap().parse::<i64>().unwrap())
                .sum();
            Value::Text(total.to_string().into())
        })),
    );
    let mut parser = rule_parser.into_parser(Rc::new(NullSink)).unwrap();
    assert_eq!(parser.parse("1, 2, 3"), Some(Value::Text("6".into())));
}

#[test]
fn add_token_names_a_pattern() {
    let mut rule_parser: RuleParser<Value> = RuleParser::new(Rc::new(NullSink));
    rule_parser.add_token("word", "[a-z]+");
    rule_parser.add_rule("start: word word", None);
    let mut parser = rule_parser.into_parser(Rc::new(NullSink)).unwrap();
    assert!(parser.parse("foo bar").is_some());
    assert!(parser.parse("foo").is_none());
}

#[test]
fn malformed_rule_text_is_reported() {
    let mut rule_parser: RuleParser<Value> = RuleParser::new(Rc::new(NullSink));
    rule_parser.add_rule("start %", None);
    assert!(!rule_parser.errors().is_empty());
}

#[test]
fn check_finds_undefined_references() {
    let mut rule_parser: RuleParser<Value> = RuleParser::new(Rc::new(NullSink));
    rule_parser.add_rule("start: missing", None);
    let mut errors = Vec::new();
    assert_eq!(rule_parser.check(&mut errors), 1);
    assert!(errors[0].contains("undefined symbol: missing"));
}
