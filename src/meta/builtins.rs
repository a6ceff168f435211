//! Built-in rules
//!
//! Every built-in identifier expands to an ordinary [`Expr`]. The interpreter
//! evaluates that expansion in place of a rule call, and the inlining pass
//! substitutes it into the tree, so both see the same semantics.
//!
//! Unicode property classes are configuration data: a table of names to
//! regex property patterns. Extending it does not touch the parsing model.

use super::expr::{Expr, RegexTerm};

/// User-definable rules that drive implicit trivia skipping
pub const TRIVIA_RULES: [&str; 2] = ["WHITESPACE", "COMMENT"];

/// Name of the silent rule synthesized from the trivia rules
pub const SKIP_RULE: &str = "SKIP";

/// Unicode property classes: built-in name and regex pattern
pub const UNICODE_CLASSES: &[(&str, &str)] = &[
    ("LETTER", r"\p{L}"),
    ("CASED_LETTER", r"\p{LC}"),
    ("UPPERCASE_LETTER", r"\p{Lu}"),
    ("LOWERCASE_LETTER", r"\p{Ll}"),
    ("TITLECASE_LETTER", r"\p{Lt}"),
    ("MODIFIER_LETTER", r"\p{Lm}"),
    ("OTHER_LETTER", r"\p{Lo}"),
    ("MARK", r"\p{M}"),
    ("NONSPACING_MARK", r"\p{Mn}"),
    ("SPACING_MARK", r"\p{Mc}"),
    ("ENCLOSING_MARK", r"\p{Me}"),
    ("NUMBER", r"\p{N}"),
    ("DECIMAL_NUMBER", r"\p{Nd}"),
    ("LETTER_NUMBER", r"\p{Nl}"),
    ("OTHER_NUMBER", r"\p{No}"),
    ("PUNCTUATION", r"\p{P}"),
    ("CONNECTOR_PUNCTUATION", r"\p{Pc}"),
    ("DASH_PUNCTUATION", r"\p{Pd}"),
    ("OPEN_PUNCTUATION", r"\p{Ps}"),
    ("CLOSE_PUNCTUATION", r"\p{Pe}"),
    ("INITIAL_PUNCTUATION", r"\p{Pi}"),
    ("FINAL_PUNCTUATION", r"\p{Pf}"),
    ("OTHER_PUNCTUATION", r"\p{Po}"),
    ("SYMBOL", r"\p{S}"),
    ("MATH_SYMBOL", r"\p{Sm}"),
    ("CURRENCY_SYMBOL", r"\p{Sc}"),
    ("MODIFIER_SYMBOL", r"\p{Sk}"),
    ("OTHER_SYMBOL", r"\p{So}"),
    ("SEPARATOR", r"\p{Z}"),
    ("SPACE_SEPARATOR", r"\p{Zs}"),
    ("LINE_SEPARATOR", r"\p{Zl}"),
    ("PARAGRAPH_SEPARATOR", r"\p{Zp}"),
    ("OTHER", r"\p{C}"),
    ("CONTROL", r"\p{Cc}"),
    ("FORMAT", r"\p{Cf}"),
    ("PRIVATE_USE", r"\p{Co}"),
    ("UNASSIGNED", r"\p{Cn}"),
    ("ALPHABETIC", r"\p{Alphabetic}"),
    ("WHITE_SPACE", r"\p{White_Space}"),
    ("XID_START", r"\p{XID_Start}"),
    ("XID_CONTINUE", r"\p{XID_Continue}"),
    ("EMOJI", r"\p{Emoji}"),
];

const ASCII_AND_SPECIAL: &[&str] = &[
    "ANY",
    "SOI",
    "EOI",
    "NEWLINE",
    "ASCII_DIGIT",
    "ASCII_NONZERO_DIGIT",
    "ASCII_BIN_DIGIT",
    "ASCII_OCT_DIGIT",
    "ASCII_HEX_DIGIT",
    "ASCII_ALPHA_LOWER",
    "ASCII_ALPHA_UPPER",
    "ASCII_ALPHA",
    "ASCII_ALPHANUMERIC",
    "ASCII",
    "PEEK",
    "PEEK_ALL",
    "POP",
    "POP_ALL",
    "DROP",
];

/// Names handled by the grammar parser as call syntax rather than identifiers
pub const KEYWORDS: [&str; 2] = ["PUSH", "PUSH_LITERAL"];

/// True when `name` is a built-in and therefore cannot be redefined
pub fn is_builtin(name: &str) -> bool {
    ASCII_AND_SPECIAL.contains(&name)
        || KEYWORDS.contains(&name)
        || UNICODE_CLASSES.iter().any(|(n, _)| *n == name)
}

/// True for `WHITESPACE` and `COMMENT`
pub fn is_trivia_rule(name: &str) -> bool {
    TRIVIA_RULES.contains(&name)
}

/// Expansion of a built-in identifier
pub fn expand(name: &str) -> Option<Expr> {
    let range = |a, b| Expr::Range(a, b);
    let expr = match name {
        "ANY" => Expr::Any,
        "SOI" => Expr::Soi,
        "EOI" => Expr::Eoi,
        "NEWLINE" => Expr::Choice(vec![
            Expr::Str("\n".into()),
            Expr::Str("\r\n".into()),
            Expr::Str("\r".into()),
        ]),
        "ASCII_DIGIT" => range('0', '9'),
        "ASCII_NONZERO_DIGIT" => range('1', '9'),
        "ASCII_BIN_DIGIT" => range('0', '1'),
        "ASCII_OCT_DIGIT" => range('0', '7'),
        "ASCII_HEX_DIGIT" => Expr::Choice(vec![range('0', '9'), range('a', 'f'), range('A', 'F')]),
        "ASCII_ALPHA_LOWER" => range('a', 'z'),
        "ASCII_ALPHA_UPPER" => range('A', 'Z'),
        "ASCII_ALPHA" => Expr::Choice(vec![range('a', 'z'), range('A', 'Z')]),
        "ASCII_ALPHANUMERIC" => {
            Expr::Choice(vec![range('a', 'z'), range('A', 'Z'), range('0', '9')])
        }
        "ASCII" => range('\0', '\x7f'),
        "PEEK" => Expr::Peek,
        "PEEK_ALL" => Expr::PeekSlice(0, None),
        "POP" => Expr::Pop,
        "POP_ALL" => Expr::PopAll,
        "DROP" => Expr::Drop,
        _ => {
            let (name, pattern) = UNICODE_CLASSES.iter().find(|(n, _)| *n == name)?;
            Expr::Regex(RegexTerm::new(*name, *pattern))
        }
    };
    Some(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex_cache;

    #[test]
    fn test_expand_ascii() {
        assert_eq!(expand("ASCII_DIGIT"), Some(Expr::Range('0', '9')));
        assert!(matches!(expand("ASCII_HEX_DIGIT"), Some(Expr::Choice(v)) if v.len() == 3));
        assert_eq!(expand("EOI"), Some(Expr::Eoi));
    }

    #[test]
    fn test_expand_unknown() {
        assert_eq!(expand("NOT_A_BUILTIN"), None);
        assert!(!is_builtin("expr"));
    }

    #[test]
    fn test_trivia_rules_are_not_builtins() {
        assert!(!is_builtin("WHITESPACE"));
        assert!(!is_builtin("COMMENT"));
        assert!(is_trivia_rule("COMMENT"));
        assert!(is_builtin("PUSH"));
    }

    #[test]
    fn test_every_unicode_class_compiles() {
        for (name, pattern) in UNICODE_CLASSES {
            assert!(
                regex_cache::get_or_compile(pattern).is_some(),
                "{} does not compile",
                name
            );
        }
    }

    #[test]
    fn test_unicode_class_matches() {
        let Some(Expr::Regex(term)) = expand("LETTER") else {
            panic!("LETTER should expand to a pattern");
        };
        assert_eq!(regex_cache::match_len(&term.pattern, "é1"), Ok(Some(2)));
        assert_eq!(regex_cache::match_len(&term.pattern, "1é"), Ok(None));
    }
}
