use rhai::{Dynamic, Engine};
use std::time::Instant;
use tracing::debug;

use super::bindings::{register_stats, register_tables};
use super::libs::resolver;
use crate::constants::{
    SANDBOX_MAX_ARRAY_SIZE, SANDBOX_MAX_CALL_LEVELS, SANDBOX_MAX_EXPR_DEPTH, SANDBOX_MAX_FN_EXPR_DEPTH,
    SANDBOX_MAX_MAP_SIZE, SANDBOX_MAX_STRING_SIZE,
};

/// How often (in operations) the deadline is checked
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Marker carried by `ErrorTerminated` when the wall clock runs out
pub(crate) const DEADLINE_MARKER: &str = "deadline";

/// Engine with the language locked down but no host surfaces registered.
/// Enough to compile candidates.
pub(crate) fn base_engine() -> Engine {
    let mut engine = Engine::new();

    engine.disable_symbol("eval");
    engine.set_module_resolver(resolver());
    engine.set_max_call_levels(SANDBOX_MAX_CALL_LEVELS);
    engine.set_max_expr_depths(SANDBOX_MAX_EXPR_DEPTH, SANDBOX_MAX_FN_EXPR_DEPTH);
    engine.set_max_string_size(SANDBOX_MAX_STRING_SIZE);
    engine.set_max_array_size(SANDBOX_MAX_ARRAY_SIZE);
    engine.set_max_map_size(SANDBOX_MAX_MAP_SIZE);
    engine.set_max_modules(super::libs::ALLOWED_MODULES.len());

    engine.on_print(|text| debug!("script print: {}", text));
    engine.on_debug(|text, source, pos| debug!("script debug {:?} @ {}: {}", source, pos, text));

    engine
}

/// Engine for one script run: the `stats`/`tables` surfaces plus an operation
/// budget and a wall-clock deadline.
pub(crate) fn build_engine(max_operations: u64, deadline: Instant) -> Engine {
    let mut engine = base_engine();

    engine.set_max_operations(max_operations);
    engine.on_progress(move |ops| {
        if ops % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
            Some(Dynamic::from(DEADLINE_MARKER))
        } else {
            None
        }
    });

    register_stats(&mut engine);
    register_tables(&mut engine);

    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::EvalAltResult;
    use std::time::Duration;

    #[test]
    fn test_eval_is_disabled() {
        assert!(base_engine().compile(r#"eval("40 + 2")"#).is_err());
    }

    #[test]
    fn test_operation_budget_enforced() {
        let engine = build_engine(10_000, Instant::now() + Duration::from_secs(60));
        let err = engine.run("let x = 0; loop { x += 1; }").unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorTooManyOperations(..)));
    }

    #[test]
    fn test_deadline_terminates_script() {
        let engine = build_engine(u64::MAX, Instant::now());
        let err = engine.run("let x = 0; loop { x += 1; }").unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorTerminated(..)));
    }

    #[test]
    fn test_host_filesystem_modules_unavailable() {
        assert!(base_engine().run(r#"import "std/fs" as fs;"#).is_err());
    }
}
