//! Character predicates used as edge labels in the automaton.

use std::fmt;

/// A symbol of the scan alphabet: a concrete character, or one of the
/// zero-width boundary sentinels the tokenizer synthesizes around `'\n'`
/// so that `^`/`$` anchors can match without consuming input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanSymbol {
    Char(char),
    /// Synthesized immediately before a literal newline.
    PreNewline,
    /// Synthesized at start of text and immediately after a newline.
    PostNewline,
}

/// An atomic matcher attached to an NFA state. Immutable once built;
/// `matches` is a pure predicate over one scan symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Exactly one character.
    Char(char),
    /// `\d`, the ASCII digit class.
    Digit,
    /// `.`: any character except a newline or a boundary sentinel.
    Any,
    /// `$`, matched against the pre-newline sentinel.
    PreNewline,
    /// `^`, matched against the post-newline sentinel.
    PostNewline,
    /// `[...]` / `[^...]`: inclusive ranges with an include/exclude flag.
    Range {
        ranges: Vec<(char, char)>,
        include: bool,
    },
}

impl Matcher {
    pub fn matches(&self, symbol: ScanSymbol) -> bool {
        match (self, symbol) {
            (Matcher::Char(c), ScanSymbol::Char(ch)) => ch == *c,
            (Matcher::Digit, ScanSymbol::Char(ch)) => ch.is_ascii_digit(),
            (Matcher::Any, ScanSymbol::Char(ch)) => ch != '\n',
            (Matcher::PreNewline, ScanSymbol::PreNewline) => true,
            (Matcher::PostNewline, ScanSymbol::PostNewline) => true,
            (Matcher::Range { ranges, include }, ScanSymbol::Char(ch)) => {
                for &(lo, hi) in ranges {
                    if ch >= lo && ch <= hi {
                        return *include;
                    }
                }
                !*include
            }
            // A boundary sentinel is never a member of a range, so an
            // exclusion set admits it and an inclusion set does not.
            (Matcher::Range { include, .. }, _) => !*include,
            _ => false,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Char(c) => write!(f, "{}", c.escape_debug()),
            Matcher::Digit => write!(f, "\\d"),
            Matcher::Any => write!(f, "."),
            Matcher::PreNewline => write!(f, "$"),
            Matcher::PostNewline => write!(f, "^"),
            Matcher::Range { ranges, include } => {
                write!(f, "[")?;
                if !include {
                    write!(f, "^")?;
                }
                for &(lo, hi) in ranges {
                    if lo == hi {
                        write!(f, "{}", lo.escape_debug())?;
                    } else {
                        write!(f, "{}-{}", lo.escape_debug(), hi.escape_debug())?;
                    }
                }
                write!(f, "]")
            }
        }
    }
}
