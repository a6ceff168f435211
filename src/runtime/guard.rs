//! Stack sizing for parses
//!
//! Rule nesting is bounded by [`ParserConfig::max_recursion_depth`], but
//! each level costs several native frames, and far more in unoptimized
//! builds. A parse therefore runs on a scoped thread whose stack is sized
//! from the nesting limit, so the limit is always reached before the
//! native stack is exhausted.

use crate::parser::ParserConfig;
use std::panic;
use std::thread;

/// Stack reserved per permitted level of rule nesting
const STACK_PER_RULE: usize = 64 * 1024;

/// Stack reserved on top of the per-rule share
const STACK_BASE: usize = 1024 * 1024;

/// Upper bound on a parse thread's stack
const STACK_MAX: usize = 1024 * 1024 * 1024;

/// Nesting limits this low are safe on any caller's thread
const INLINE_DEPTH: usize = 16;

/// Stack size for a parse under `config`
pub fn stack_size(config: &ParserConfig) -> usize {
    config
        .max_recursion_depth
        .saturating_mul(STACK_PER_RULE)
        .saturating_add(STACK_BASE)
        .min(STACK_MAX)
}

/// Run `parse` on a thread with a stack large enough for `config`
///
/// Panics in `parse` are resumed on the caller. When no thread can be
/// spawned the parse runs on the caller's thread.
pub fn with_parse_stack<R, F>(config: &ParserConfig, parse: F) -> R
where
    F: Fn() -> R + Sync,
    R: Send,
{
    if config.max_recursion_depth <= INLINE_DEPTH {
        return parse();
    }
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("pestle-parse".to_string())
            .stack_size(stack_size(config))
            .spawn_scoped(scope, &parse);
        match worker {
            Ok(handle) => handle
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload)),
            Err(_err) => {
                log_debug!("cannot spawn parse thread ({}), parsing inline", _err);
                parse()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Sizing Tests ===

    #[test]
    fn test_stack_grows_with_limit() {
        let small = stack_size(&ParserConfig::new().with_max_recursion_depth(32));
        let large = stack_size(&ParserConfig::new().with_max_recursion_depth(512));
        assert!(small < large);
        assert_eq!(large, 512 * STACK_PER_RULE + STACK_BASE);
    }

    #[test]
    fn test_stack_is_capped() {
        let config = ParserConfig::new().with_max_recursion_depth(usize::MAX);
        assert_eq!(stack_size(&config), STACK_MAX);
    }

    // === Execution Tests ===

    #[test]
    fn test_result_comes_back() {
        let config = ParserConfig::default();
        let input = String::from("borrowed");
        assert_eq!(with_parse_stack(&config, || input.len()), 8);
    }

    #[test]
    fn test_low_limit_runs_inline() {
        let config = ParserConfig::new().with_max_recursion_depth(INLINE_DEPTH);
        let caller = thread::current().id();
        assert_eq!(with_parse_stack(&config, || thread::current().id()), caller);
    }

    #[test]
    #[should_panic(expected = "inside parse")]
    fn test_panics_are_resumed() {
        with_parse_stack(&ParserConfig::default(), || -> usize { panic!("inside parse") });
    }
}
