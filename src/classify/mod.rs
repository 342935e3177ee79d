//! Script classification of vocabulary content
//!
//! Labels the combined text of a vocabulary by the dominant character class
//! (Cyrillic, Latin, digits, symbols, or a mixture). Used purely as display
//! metadata during moderation; classification never affects aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dominance threshold: a class above this share of characters wins outright
const DOMINANT: f64 = 0.7;

/// Script label for vocabulary content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Cyrillic,
    Latin,
    /// Both Cyrillic and Latin present with no dominant script
    Mixed,
    Digits,
    DigitsWithSymbols,
    Symbols,
    /// Symbol-dominated text whose letters are Cyrillic
    SymbolsCyrillic,
    /// Symbol-dominated text whose letters are Latin
    SymbolsLatin,
    /// No non-whitespace characters at all
    Empty,
    Unknown,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cyrillic => "cyrillic",
            Self::Latin => "latin",
            Self::Mixed => "mixed",
            Self::Digits => "digits",
            Self::DigitsWithSymbols => "digits+symbols",
            Self::Symbols => "symbols",
            Self::SymbolsCyrillic => "symbols (cyrillic)",
            Self::SymbolsLatin => "symbols (latin)",
            Self::Empty => "empty",
            Self::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

/// Classify text by its dominant character class
pub fn classify(text: &str) -> Label {
    let mut cyrillic = 0usize;
    let mut latin = 0usize;
    let mut digits = 0usize;
    let mut symbols = 0usize;
    let mut total = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;

        if is_cyrillic(c) {
            cyrillic += 1;
        } else if c.is_ascii_alphabetic() {
            latin += 1;
        } else if c.is_ascii_digit() {
            digits += 1;
        } else if !c.is_alphanumeric() {
            symbols += 1;
        }
    }

    if total == 0 {
        return Label::Empty;
    }

    let pct = |count: usize| count as f64 / total as f64;

    if pct(digits) > DOMINANT {
        if pct(symbols) > 0.15 {
            return Label::DigitsWithSymbols;
        }
        return Label::Digits;
    }

    if pct(symbols) > DOMINANT {
        if cyrillic > 0 && cyrillic >= latin {
            return Label::SymbolsCyrillic;
        }
        if latin > 0 {
            return Label::SymbolsLatin;
        }
        return Label::Symbols;
    }

    if pct(digits) > 0.3 && pct(symbols) > 0.2 {
        return Label::DigitsWithSymbols;
    }

    if pct(cyrillic) > DOMINANT {
        Label::Cyrillic
    } else if pct(latin) > DOMINANT {
        Label::Latin
    } else if cyrillic > 0 && latin > 0 {
        Label::Mixed
    } else if cyrillic > 0 {
        Label::Cyrillic
    } else if latin > 0 {
        Label::Latin
    } else if digits > 0 && symbols > 0 {
        Label::DigitsWithSymbols
    } else if digits > 0 {
        Label::Digits
    } else if symbols > 0 {
        Label::Symbols
    } else {
        Label::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyrillic_text() {
        assert_eq!(classify("привет мир как дела"), Label::Cyrillic);
    }

    #[test]
    fn test_latin_text() {
        assert_eq!(classify("the quick brown fox"), Label::Latin);
    }

    #[test]
    fn test_mixed_scripts() {
        assert_eq!(classify("привет world привет world"), Label::Mixed);
    }

    #[test]
    fn test_digits() {
        assert_eq!(classify("123 456 789 000"), Label::Digits);
    }

    #[test]
    fn test_digits_with_symbols() {
        assert_eq!(classify("12+34 56*78 90/12 34-56"), Label::DigitsWithSymbols);
    }

    #[test]
    fn test_symbols_only() {
        assert_eq!(classify("!@# $%^ &*( )_+"), Label::Symbols);
    }

    #[test]
    fn test_symbol_dominated_with_cyrillic_letters() {
        assert_eq!(classify("!@#$%^& аб"), Label::SymbolsCyrillic);
    }

    #[test]
    fn test_symbol_dominated_with_latin_letters() {
        assert_eq!(classify("!@#$%^& ab"), Label::SymbolsLatin);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(classify(""), Label::Empty);
        assert_eq!(classify("   \n\t  "), Label::Empty);
    }

    #[test]
    fn test_minority_script_still_labels() {
        // Cyrillic mixed heavily with digits but no Latin at all
        assert_eq!(classify("абв 123 где 456"), Label::Cyrillic);
    }
}
