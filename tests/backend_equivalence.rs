//! Tests for ensuring every backend produces the same result
//!
//! Each grammar is run through the interpreter without optimization, the
//! interpreter over the optimized grammar, and the compiled program built
//! from both. Trees and errors must be identical.

use pestle::{OptimizerConfig, ParseError, Pairs, PegParser};

struct Backends {
    plain: PegParser,
    optimized: PegParser,
}

impl Backends {
    fn new(source: &str) -> Self {
        Self {
            plain: PegParser::builder(source)
                .optimizer(OptimizerConfig::Disabled)
                .build()
                .unwrap(),
            optimized: PegParser::new(source).unwrap(),
        }
    }

    /// Runs all four backends and returns the shared result
    fn parse<'i>(&self, rule: &str, input: &'i str) -> Result<Pairs<'i>, ParseError> {
        let reference = self.plain.parse(rule, input);
        let results = [
            ("plain compiled", self.plain.parse_compiled(rule, input, 0)),
            ("optimized", self.optimized.parse(rule, input)),
            ("optimized compiled", self.optimized.parse_compiled(rule, input, 0)),
        ];
        for (backend, result) in results {
            assert_eq!(
                result, reference,
                "{} backend disagrees on {:?}\noptimized grammar:\n{}",
                backend,
                input,
                self.optimized.grammar()
            );
        }
        reference
    }

    fn check(&self, rule: &str, valid: &[&str], invalid: &[&str]) {
        for input in valid {
            assert!(self.parse(rule, input).is_ok(), "should accept {:?}", input);
        }
        for input in invalid {
            assert!(self.parse(rule, input).is_err(), "should reject {:?}", input);
        }
    }
}

// ============================================================================
// Grammars
// ============================================================================

const JSON: &str = r#"
    WHITESPACE = _{ " " | "\t" | "\r" | "\n" }

    json = { SOI ~ value ~ EOI }
    value = _{ object | array | string | number | boolean | null }
    object = { "{" ~ "}" | "{" ~ pair ~ ("," ~ pair)* ~ "}" }
    pair = { string ~ ":" ~ value }
    array = { "[" ~ "]" | "[" ~ value ~ ("," ~ value)* ~ "]" }
    boolean = { "true" | "false" }
    null = { "null" }
    string = ${ "\"" ~ inner ~ "\"" }
    inner = @{ char* }
    char = {
        !("\"" | "\\") ~ ANY
        | "\\" ~ ("\"" | "\\" | "/" | "b" | "f" | "n" | "r" | "t")
        | "\\" ~ ("u" ~ ASCII_HEX_DIGIT{4})
    }
    number = @{
        "-"? ~ ("0" | ASCII_NONZERO_DIGIT ~ ASCII_DIGIT*)
        ~ ("." ~ ASCII_DIGIT+)?
        ~ (^"e" ~ ("+" | "-")? ~ ASCII_DIGIT+)?
    }
"#;

const CALCULATOR: &str = r#"
    WHITESPACE = _{ " " }

    program = { SOI ~ expr ~ EOI }
    expr = { term ~ (add_op ~ term)* }
    term = { factor ~ (mul_op ~ factor)* }
    factor = _{ number | "(" ~ expr ~ ")" | neg }
    neg = { "-" ~ factor }
    add_op = { "+" | "-" }
    mul_op = { "*" | "/" | "%" }
    number = @{ ASCII_DIGIT+ ~ ("." ~ ASCII_DIGIT{1,4})? }
"#;

const INI: &str = r##"
    WHITESPACE = _{ " " | "\t" }
    COMMENT = _{ (";" | "#") ~ (!NEWLINE ~ ANY)* }

    file = { SOI ~ (NEWLINE* ~ (section | property))* ~ NEWLINE* ~ EOI }
    section = { "[" ~ name ~ "]" }
    property = { name ~ "=" ~ value }
    name = @{ (ASCII_ALPHANUMERIC | "_" | ".")+ }
    value = @{ (!NEWLINE ~ ANY)* }
"##;

const RAW_STRING: &str = r##"
    raw = { "r" ~ PUSH("#"*) ~ "\"" ~ body ~ "\"" ~ POP }
    body = { (!("\"" ~ PEEK) ~ ANY)* }
"##;

const KEYWORDS: &str = r#"
    WHITESPACE = _{ " " }

    stmts = { SOI ~ stmt* ~ EOI }
    stmt = { ^"let" ~ ident ~ "=" ~ ident ~ ";" | ^"print" ~ ident ~ ";" }
    ident = @{ !keyword ~ (ASCII_ALPHA | "_") ~ (ASCII_ALPHANUMERIC | "_")* }
    keyword = @{ (^"let" | ^"print" | ^"if") ~ !(ASCII_ALPHANUMERIC | "_") }
"#;

const REPETITION: &str = r#"
    codes = { SOI ~ code ~ ("," ~ code)* ~ EOI }
    code = @{ ASCII_ALPHA_UPPER{2} ~ ASCII_DIGIT{2,4} ~ "x"{,2} ~ "!"{1,} }
"#;

const STACK: &str = r#"
    doc = { SOI ~ block* ~ EOI }
    block = { indent ~ "-" ~ NEWLINE }
    indent = @{ PUSH(" "*) ~ DROP | PUSH_LITERAL("") ~ POP }
"#;

// ============================================================================
// Equivalence
// ============================================================================

#[test]
fn test_json_equivalence() {
    let backends = Backends::new(JSON);
    backends.check(
        "json",
        &[
            "{}",
            "[]",
            r#"{"a": 1, "b": [true, false, null], "c": {"d": "e\n"}}"#,
            "[-0.5e+10, 12, 3.25E2]",
            r#"  ["é", "tab\tstop"]  "#,
        ],
        &[
            "",
            "{",
            r#"{"a" 1}"#,
            "[1,]",
            "[01]",
            r#""\x""#,
            "[1] 2",
        ],
    );
}

#[test]
fn test_json_tree_shape() {
    let backends = Backends::new(JSON);
    let pairs = backends.parse("json", r#"{"k": [1]}"#).unwrap();
    let rules: Vec<&str> = pairs.flatten().iter().map(|p| p.rule()).collect();
    // `string` is compound, so its contents leave no pairs
    assert_eq!(rules, vec!["json", "object", "pair", "string", "array", "number"]);
}

#[test]
fn test_calculator_equivalence() {
    let backends = Backends::new(CALCULATOR);
    backends.check(
        "program",
        &["1", "1 + 2 * 3", "(1 + 2) * -3 % 4", "  2.5/ 0.125 ", "--1"],
        &["", "1 +", "(1", "1 2", "1.23456", "* 2"],
    );
}

#[test]
fn test_ini_equivalence() {
    let backends = Backends::new(INI);
    backends.check(
        "file",
        &[
            "",
            "[main]\nkey = value\n",
            "; leading comment\n[a.b]\n  x=1 ; not a comment\n\n# tail\n",
            "name = some value with spaces",
        ],
        &["[open\n", "= value\n", "[a] b\n"],
    );
}

#[test]
fn test_raw_string_equivalence() {
    let backends = Backends::new(RAW_STRING);
    backends.check(
        "raw",
        &["r\"abc\"", "r##\"a\"#b\"##", "r#\"\"\"#"],
        &["r\"abc", "r##\"a\"#", "x"],
    );
}

#[test]
fn test_keyword_equivalence() {
    let backends = Backends::new(KEYWORDS);
    backends.check(
        "stmts",
        &["", "let a = b;", "LET letter = print_me; Print x;", "print iffy;"],
        &["let if = b;", "print let;", "let a = b", "let 1 = b;"],
    );
}

#[test]
fn test_bounded_repetition_equivalence() {
    let backends = Backends::new(REPETITION);
    backends.check(
        "codes",
        &["AB12!", "XY1234xx!!!", "AB12!,CD345x!"],
        &["A12!", "AB1!", "AB12345!", "AB12xxx!", "AB12", "AB12!,"],
    );
}

#[test]
fn test_stack_equivalence() {
    let backends = Backends::new(STACK);
    backends.check("doc", &["", "-\n", "  -\n-\n    -\n"], &["-", "  x\n"]);
}

#[test]
fn test_errors_are_identical() {
    // every failure carries positives, negatives and a rule stack; all must agree
    let backends = Backends::new(JSON);
    for input in ["{\"a\": tru}", "[1, 2", "{\"a\":\n  [\"b\" \"c\"]}"] {
        match backends.parse("json", input) {
            Err(ParseError::Failed(err)) => assert!(!err.positives.is_empty() || !err.negatives.is_empty()),
            other => panic!("expected failure for {:?}, got {:?}", input, other),
        }
    }
}

#[test]
fn test_start_offsets_agree() {
    let backends = Backends::new(CALCULATOR);
    let input = "xx1 + 2";
    let reference = backends.plain.parse_at("expr", input, 2);
    assert_eq!(backends.optimized.parse_at("expr", input, 2), reference);
    assert_eq!(backends.optimized.parse_compiled("expr", input, 2), reference);
    assert_eq!(reference.unwrap().as_str(), "1 + 2");
}
