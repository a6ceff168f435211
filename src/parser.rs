//! Parser facade
//!
//! [`PegParser`] ties the pipeline together: grammar source is parsed and
//! validated, run through the optimizer, then handed to both the
//! interpreter and the closure compiler.
//!
//! ```rust
//! use pestle::parser::PegParser;
//!
//! let parser = PegParser::new(r#"
//!     WHITESPACE = _{ " " }
//!     list = { num ~ ("," ~ num)* }
//!     num = @{ ASCII_DIGIT+ }
//! "#).unwrap();
//!
//! let pairs = parser.parse("list", "1, 2, 3").unwrap();
//! let nums: Vec<&str> = pairs.first().unwrap().children().iter().map(|p| p.as_str()).collect();
//! assert_eq!(nums, ["1", "2", "3"]);
//! ```

use crate::codegen::{self, Program};
use crate::debug::GrammarVisualizer;
use crate::error::{GrammarError, ParseError};
use crate::meta::analysis::{GrammarAnalyzer, GrammarWarning};
use crate::meta::grammar::Grammar;
use crate::optimizer::{self, OptimizationLog, PassList};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::pairs::Pairs;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default maximum input size: 100 MiB
pub const DEFAULT_MAX_INPUT_SIZE: usize = 100 * 1024 * 1024;

/// Default maximum rule nesting depth
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 512;

/// Runtime limits for a parse
///
/// ```rust
/// use pestle::parser::ParserConfig;
///
/// let config = ParserConfig::new()
///     .with_max_input_size(1024 * 1024)
///     .with_max_recursion_depth(128);
/// assert_eq!(config.max_recursion_depth, 128);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum allowed input size in bytes
    pub max_input_size: usize,

    /// Maximum number of nested rule calls
    pub max_recursion_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum input size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Set the maximum recursion depth
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}

/// Which optimizer passes to run before parsing
#[derive(Debug, Clone, Default)]
pub enum OptimizerConfig {
    /// Use the grammar as written
    Disabled,
    /// [`PassList::default_passes`]
    #[default]
    Default,
    /// A caller-supplied pass list
    Custom(PassList),
}

impl OptimizerConfig {
    fn passes(&self) -> Option<PassList> {
        match self {
            Self::Disabled => None,
            Self::Default => Some(PassList::default_passes()),
            Self::Custom(passes) => Some(passes.clone()),
        }
    }
}

enum Source<'s> {
    Text(&'s str),
    Grammar(Grammar),
}

/// Builder for [`PegParser`]
pub struct PegParserBuilder<'s> {
    source: Source<'s>,
    optimizer: OptimizerConfig,
    debug: bool,
    config: ParserConfig,
}

impl<'s> PegParserBuilder<'s> {
    /// Choose the optimizer passes
    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Collect the optimization log
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set runtime limits
    pub fn config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse, validate, optimize and compile the grammar
    pub fn build(self) -> Result<PegParser, GrammarError> {
        let raw = match self.source {
            Source::Text(text) => Grammar::from_source(text)?,
            Source::Grammar(grammar) => {
                grammar.validate()?;
                grammar
            }
        };

        let (grammar, log) = match self.optimizer.passes() {
            None => (raw.clone(), None),
            Some(passes) if self.debug => {
                let (grammar, log) = optimizer::optimize_with_log(&raw, &passes);
                (grammar, Some(log))
            }
            Some(passes) => (optimizer::optimize(&raw, &passes), None),
        };

        let program = Program::compile(&grammar, self.config)?;
        log_debug!(
            "built parser: {} rules, {} after optimization",
            raw.len(),
            grammar.len()
        );

        Ok(PegParser {
            raw,
            interpreter: Interpreter::new(grammar, self.config),
            program,
            log,
        })
    }
}

/// A parser built from a grammar
#[derive(Debug)]
pub struct PegParser {
    raw: Grammar,
    interpreter: Interpreter,
    program: Program,
    log: Option<OptimizationLog>,
}

impl PegParser {
    /// Build a parser with the default optimizer and limits
    pub fn new(source: &str) -> Result<Self, GrammarError> {
        Self::builder(source).build()
    }

    /// Start configuring a parser for grammar source text
    pub fn builder(source: &str) -> PegParserBuilder<'_> {
        PegParserBuilder {
            source: Source::Text(source),
            optimizer: OptimizerConfig::Default,
            debug: false,
            config: ParserConfig::default(),
        }
    }

    /// Start configuring a parser for an already-built grammar
    pub fn from_grammar(grammar: Grammar) -> PegParserBuilder<'static> {
        PegParserBuilder {
            source: Source::Grammar(grammar),
            optimizer: OptimizerConfig::Default,
            debug: false,
            config: ParserConfig::default(),
        }
    }

    /// Parse `input` with the interpreter
    pub fn parse<'i>(&self, rule: &str, input: &'i str) -> Result<Pairs<'i>, ParseError> {
        self.parse_at(rule, input, 0)
    }

    /// Parse `input` from byte offset `start` with the interpreter
    pub fn parse_at<'i>(
        &self,
        rule: &str,
        input: &'i str,
        start: usize,
    ) -> Result<Pairs<'i>, ParseError> {
        log_debug!("parse {} ({} bytes from {})", rule, input.len(), start);
        let result = self.interpreter.parse(rule, input, start);
        log_debug!("parse {} => {}", rule, if result.is_ok() { "ok" } else { "error" });
        result
    }

    /// Parse `input` from byte offset `start` with the compiled program
    pub fn parse_compiled<'i>(
        &self,
        rule: &str,
        input: &'i str,
        start: usize,
    ) -> Result<Pairs<'i>, ParseError> {
        log_debug!("parse_compiled {} ({} bytes from {})", rule, input.len(), start);
        let result = self.program.parse(rule, input, start);
        log_debug!(
            "parse_compiled {} => {}",
            rule,
            if result.is_ok() { "ok" } else { "error" }
        );
        result
    }

    /// Parse each input independently
    ///
    /// Results come back in input order. With the `parallel` feature the
    /// inputs are spread over the rayon thread pool.
    pub fn parse_batch<'i>(
        &self,
        rule: &str,
        inputs: &[&'i str],
    ) -> Vec<Result<Pairs<'i>, ParseError>> {
        log_debug!("parse_batch {} ({} inputs)", rule, inputs.len());
        #[cfg(feature = "parallel")]
        {
            inputs
                .par_iter()
                .map(|&input| self.program.parse(rule, input, 0))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            inputs
                .iter()
                .map(|&input| self.program.parse(rule, input, 0))
                .collect()
        }
    }

    /// The compiled program
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Standalone Rust source for the optimized grammar
    pub fn generate_source(&self) -> String {
        codegen::generate(self.grammar())
    }

    /// The optimized grammar
    pub fn grammar(&self) -> &Grammar {
        self.interpreter.grammar()
    }

    /// The grammar as written
    pub fn raw_grammar(&self) -> &Grammar {
        &self.raw
    }

    /// Rewrites applied by the optimizer, when built with `debug(true)`
    pub fn optimization_log(&self) -> Option<&OptimizationLog> {
        self.log.as_ref()
    }

    /// Runtime limits
    pub fn config(&self) -> ParserConfig {
        self.interpreter.config()
    }

    /// Indented expression tree of the optimized grammar
    pub fn tree_view(&self) -> String {
        GrammarVisualizer::new(self.grammar()).tree_view()
    }

    /// Analyzer warnings for the grammar as written
    pub fn warnings(&self) -> Vec<GrammarWarning> {
        GrammarAnalyzer::new(&self.raw).analyze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::expr::Expr;

    const CSV: &str = r#"
        file = { SOI ~ (row ~ NEWLINE)* ~ row? ~ EOI }
        row = { field ~ ("," ~ field)* }
        field = @{ (!("," | NEWLINE) ~ ANY)* }
    "#;

    // === ParserConfig Tests ===

    #[test]
    fn test_config_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.max_input_size, 100 * 1024 * 1024);
        assert_eq!(config.max_recursion_depth, 512);
        assert_eq!(ParserConfig::new(), config);
    }

    // === PegParser Tests ===

    #[test]
    fn test_parse_csv() {
        let parser = PegParser::new(CSV).unwrap();
        let pairs = parser.parse("file", "a,b\nc,d").unwrap();
        let file = pairs.first().unwrap();
        assert_eq!(file.children().len(), 2);
        assert_eq!(file.children()[1].children()[1].as_str(), "d");
    }

    #[test]
    fn test_backends_agree() {
        let parser = PegParser::new(CSV).unwrap();
        for input in ["", "a", "a,b\nc", "x,,y\n\n"] {
            let interpreted = parser.parse_at("file", input, 0);
            let compiled = parser.parse_compiled("file", input, 0);
            assert_eq!(interpreted, compiled, "input {:?}", input);
        }
    }

    #[test]
    fn test_optimizer_disabled_keeps_grammar() {
        let parser = PegParser::builder(CSV)
            .optimizer(OptimizerConfig::Disabled)
            .build()
            .unwrap();
        assert_eq!(parser.grammar(), parser.raw_grammar());
        assert!(parser.optimization_log().is_none());
    }

    #[test]
    fn test_debug_collects_log() {
        let parser = PegParser::builder(r#"r = { (!"," ~ ANY)* }"#)
            .debug(true)
            .build()
            .unwrap();
        let log = parser.optimization_log().unwrap();
        assert!(log.by_pass("skip_until").count() > 0);
        assert_eq!(
            parser.grammar().get("r").map(|r| r.expr.clone()),
            Some(Expr::SkipUntil(vec![",".to_string()]))
        );
    }

    #[test]
    fn test_custom_pass_list() {
        let parser = PegParser::builder(r#"r = { "a" | "b" }"#)
            .optimizer(OptimizerConfig::Custom(PassList::new()))
            .build()
            .unwrap();
        assert_eq!(parser.grammar(), parser.raw_grammar());
    }

    #[test]
    fn test_grammar_errors_surface_at_build() {
        assert!(matches!(
            PegParser::new("r = { missing }"),
            Err(GrammarError::UnresolvedRule { .. })
        ));
        assert!(matches!(
            PegParser::new("r = { \"a\" "),
            Err(GrammarError::Syntax { .. })
        ));
    }

    #[test]
    fn test_parse_batch_keeps_order() {
        let parser = PegParser::new("num = @{ ASCII_DIGIT+ }").unwrap();
        let results = parser.parse_batch("num", &["1", "x", "234"]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().map(|p| p.as_str()), Ok("1"));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().map(|p| p.as_str()), Ok("234"));
    }

    #[test]
    fn test_recursion_limit_from_config() {
        let parser = PegParser::builder("nest = { \"(\" ~ nest? ~ \")\" }")
            .config(ParserConfig::new().with_max_recursion_depth(4))
            .build()
            .unwrap();
        assert!(parser.parse("nest", "(())").is_ok());
        assert!(matches!(
            parser.parse("nest", "(((((())))))"),
            Err(ParseError::RecursionLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_generate_source_and_tree_view() {
        let parser = PegParser::new("num = @{ ASCII_DIGIT+ }").unwrap();
        assert!(parser.generate_source().contains("pub fn rule_num("));
        assert!(parser.tree_view().starts_with("num = @{ }\n"));
    }

    #[test]
    fn test_from_grammar_validates() {
        let grammar = Grammar::from_source("a = { \"x\" }").unwrap();
        let parser = PegParser::from_grammar(grammar).build().unwrap();
        assert!(parser.parse("a", "x").is_ok());
        assert!(matches!(
            parser.parse("b", "x"),
            Err(ParseError::UnknownRule { .. })
        ));
    }
}
