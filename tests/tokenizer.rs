//! Scanning behavior: longest match, ignore patterns, line boundaries,
//! and location bookkeeping.

use std::rc::Rc;

use proptest::prelude::*;

use earley_it::{NullSink, Token, TokenId, Tokenizer};

fn tokenizer() -> Tokenizer {
    Tokenizer::new(Rc::new(NullSink))
}

fn id(name: &str) -> TokenId {
    TokenId::Terminal(name.into())
}

/// Drain the tokenizer, panicking on a scan failure.
fn all_tokens(tokenizer: &mut Tokenizer) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line = 0;
    let mut column = 0;
    while !tokenizer.finished {
        let token = tokenizer
            .next_token(line, column)
            .expect("scan failed");
        line = token.location.line;
        column = token.location.column + token.text.chars().count();
        tokens.push(token);
    }
    tokens
}

#[test]
fn longest_match_wins() {
    let mut t = tokenizer();
    t.add_token(id("kw"), "if").unwrap();
    t.add_token(id("word"), "[a-z]+").unwrap();
    t.set_text("iffy");

    let token = t.next_token(0, 0).unwrap();
    assert_eq!(token.text.as_ref(), "iffy");
    assert_eq!(token.id, id("word"));
}

#[test]
fn ignore_patterns_are_skipped() {
    let mut t = tokenizer();
    t.add_token(id("word"), "[a-z]+").unwrap();
    t.ignore("[ \t]+").unwrap();
    t.set_text("foo   bar");

    let tokens = all_tokens(&mut t);
    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_ref()).collect();
    assert_eq!(texts, vec!["foo", "bar", "!EOF"]);
}

#[test]
fn unmatched_input_is_a_bad_token() {
    let mut t = tokenizer();
    t.add_token(id("digits"), "\\d+").unwrap();
    t.set_text("12x");

    let token = t.next_token(0, 0).unwrap();
    assert_eq!(token.text.as_ref(), "12");
    assert!(t.next_token(0, 2).is_none());
}

#[test]
fn start_of_line_anchor() {
    let mut t = tokenizer();
    t.add_token(id("head"), "^x+").unwrap();
    t.add_token(id("tail"), "y+").unwrap();
    t.add_token(id("nl"), "\\n").unwrap();
    t.ignore("[ ]+").unwrap();

    t.set_text("xx yy\nxx");
    let tokens = all_tokens(&mut t);
    let ids: Vec<TokenId> = tokens.iter().map(|t| t.id.clone()).collect();
    assert_eq!(
        ids,
        vec![id("head"), id("tail"), id("nl"), id("head"), id("!EOF")]
    );

    // The anchored pattern must not match mid-line.
    t.set_text("yy xx");
    assert!(t.next_token(0, 0).is_some());
    assert!(t.next_token(0, 3).is_none());
}

#[test]
fn end_of_line_anchor() {
    let mut t = tokenizer();
    t.add_token(id("eol"), "x+$").unwrap();
    t.add_token(id("plain"), "y+").unwrap();
    t.add_token(id("nl"), "\\n").unwrap();

    t.set_text("xx\nyy");
    let token = t.next_token(0, 0).unwrap();
    assert_eq!(token.id, id("eol"));
    assert_eq!(token.text.as_ref(), "xx");

    t.set_text("xxyy");
    assert!(t.next_token(0, 0).is_none());
}

#[test]
fn both_anchors_pin_a_token_to_its_line() {
    let mut t = tokenizer();
    t.add_token(id("line"), "^foo$").unwrap();
    t.add_token(id("nl"), "\\n").unwrap();

    t.set_text("foo\nfoo\n");
    let tokens = all_tokens(&mut t);
    let ids: Vec<TokenId> = tokens.iter().map(|t| t.id.clone()).collect();
    assert_eq!(
        ids,
        vec![id("line"), id("nl"), id("line"), id("nl"), id("!EOF")]
    );

    // Anything before or after on the same line breaks the match.
    t.set_text("foo bar\n");
    assert!(t.next_token(0, 0).is_none());
}

#[test]
fn locations_track_lines_and_columns() {
    let mut t = tokenizer();
    t.add_token(id("word"), "[a-z]+").unwrap();
    t.add_token(id("nl"), "\\n").unwrap();
    t.ignore("[ ]+").unwrap();
    t.set_text("ab cd\nef");

    let tokens = all_tokens(&mut t);
    assert_eq!(tokens[0].location.to_string(), "1:1");
    assert_eq!(tokens[1].location.to_string(), "1:4");
    assert_eq!(tokens[3].location.to_string(), "2:1");
    assert_eq!(tokens[3].text.as_ref(), "ef");
}

#[test]
fn get_line_returns_source_lines() {
    let mut t = tokenizer();
    t.add_token(id("word"), "[a-z]+").unwrap();
    t.set_text("foo\nbar\nbaz");
    assert_eq!(t.get_line(0), "foo");
    assert_eq!(t.get_line(1), "bar");
    assert_eq!(t.get_line(2), "baz");
}

#[test]
fn eof_token_carries_end_location() {
    let mut t = tokenizer();
    t.add_token(id("word"), "[a-z]+").unwrap();
    t.set_text("abc");

    let word = t.next_token(0, 0).unwrap();
    assert_eq!(word.text.as_ref(), "abc");
    let eof = t.next_token(0, 3).unwrap();
    assert_eq!(eof.text.as_ref(), "!EOF");
    assert!(t.finished);
}

#[test]
fn character_classes() {
    let mut t = tokenizer();
    t.add_token(id("num"), "[0-9]+\\.[0-9]+").unwrap();
    t.add_token(id("other"), "[^0-9.]+").unwrap();
    t.set_text("3.14abc");

    let tokens = all_tokens(&mut t);
    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_ref()).collect();
    assert_eq!(texts, vec!["3.14", "abc", "!EOF"]);
}

proptest! {
    /// Token texts partition the input: concatenating them in order
    /// reconstructs the text exactly.
    #[test]
    fn token_texts_partition_the_input(text in "[abc]{0,40}") {
        let mut t = tokenizer();
        t.add_token(id("a"), "a+").unwrap();
        t.add_token(id("b"), "b").unwrap();
        t.add_token(id("c"), "c").unwrap();
        t.set_text(&text);

        let tokens = all_tokens(&mut t);
        let rebuilt: String = tokens
            .iter()
            .filter(|t| t.text.as_ref() != "!EOF")
            .map(|t| t.text.as_ref())
            .collect();
        prop_assert_eq!(rebuilt, text);

        // Maximal munch: a run of a's is never split across two tokens.
        for pair in tokens.windows(2) {
            prop_assert!(!(pair[0].id == id("a") && pair[1].id == id("a")));
        }
    }

    /// Two tokenizers built from the same patterns agree on every input,
    /// and rescanning with a warm DFA cache changes nothing.
    #[test]
    fn determinization_is_reproducible(text in "[a-z ]{0,30}") {
        let build = || {
            let mut t = tokenizer();
            t.add_token(id("word"), "[a-z]+").unwrap();
            t.ignore("[ ]+").unwrap();
            t
        };
        let stream = |t: &mut Tokenizer| -> Vec<String> {
            all_tokens(t).iter().map(|t| t.text.to_string()).collect()
        };

        let mut a = build();
        let mut b = build();
        a.set_text(&text);
        b.set_text(&text);
        prop_assert_eq!(stream(&mut a), stream(&mut b));

        a.set_text(&text);
        b.set_text(&text);
        prop_assert_eq!(stream(&mut a), stream(&mut b));
    }
}
