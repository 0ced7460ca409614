//! A four-function calculator built from rule text. Run with:
//!
//! ```text
//! cargo run --example calc -- "1+5*3*4+2"
//! ```

use std::rc::Rc;

use earley_it::{NullSink, RuleParser, Value};

fn number(value: &Value) -> f64 {
    value
        .as_text()
        .and_then(|text| text.parse().ok())
        .unwrap_or(0.0)
}

fn binary(args: Vec<Value>, op: impl Fn(f64, f64) -> f64) -> Value {
    let result = op(number(&args[0]), number(&args[2]));
    Value::Text(result.to_string().into())
}

fn main() {
    let input = std::env::args().nth(1).unwrap_or_else(|| "1+5*3*4+2".into());

    let mut rules: RuleParser<Value> = RuleParser::new(Rc::new(NullSink));
    rules.add_rule("start: expr", None);
    rules.add_rule(
        "expr: expr '\\+' term",
        Some(Rc::new(|args, _| binary(args, |a, b| a + b))),
    );
    rules.add_rule(
        "expr: expr '-' term",
        Some(Rc::new(|args, _| binary(args, |a, b| a - b))),
    );
    rules.add_rule("expr: term", None);
    rules.add_rule(
        "term: term '\\*' factor",
        Some(Rc::new(|args, _| binary(args, |a, b| a * b))),
    );
    rules.add_rule(
        "term: term '/' factor",
        Some(Rc::new(|args, _| binary(args, |a, b| a / b))),
    );
    rules.add_rule("term: factor", None);
    rules.add_rule("factor: '\\d+(\\.\\d+)?'", None);
    rules.add_rule(
        "factor: '\\(' expr '\\)'",
        Some(Rc::new(|args: Vec<Value>, _| args[1].clone())),
    );

    let mut errors = Vec::new();
    if rules.check(&mut errors) > 0 {
        for error in &errors {
            eprintln!("{}", error);
        }
        std::process::exit(1);
    }

    let mut parser = match rules.into_parser(Rc::new(NullSink)) {
        Ok(parser) => parser,
        Err(error) => {
            eprintln!("bad token pattern: {}", error);
            std::process::exit(1);
        }
    };

    match parser.parse(&input) {
        Some(value) => println!("{} = {}", input, value.as_text().unwrap_or("?")),
        None => {
            for error in parser.errors() {
                eprintln!("{}", error);
            }
            std::process::exit(1);
        }
    }
}
