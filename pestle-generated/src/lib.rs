//! Parsers produced by pestle's source emitter
//!
//! The build script renders every grammar under `grammars/` twice: as
//! written (`<name>_plain`) and after the default optimizer passes
//! (`<name>_optimized`). Each module exposes the emitted
//! `parse(rule, input, start)` entry point.

#![allow(missing_docs)]

include!(concat!(env!("OUT_DIR"), "/generated.rs"));

/// Grammar sources the modules were generated from
pub mod sources {
    pub const JSON: &str = include_str!("../grammars/json.pest");
    pub const CALCULATOR: &str = include_str!("../grammars/calculator.pest");
    pub const INI: &str = include_str!("../grammars/ini.pest");
    pub const RAW_STRING: &str = include_str!("../grammars/raw_string.pest");
    pub const KEYWORDS: &str = include_str!("../grammars/keywords.pest");
    pub const REPETITION: &str = include_str!("../grammars/repetition.pest");
    pub const STACK: &str = include_str!("../grammars/stack.pest");
}
