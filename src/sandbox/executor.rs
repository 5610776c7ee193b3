use async_trait::async_trait;
use rhai::{Dynamic, EvalAltResult, Scope, INT};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::bindings::{StatsHandle, TablesHandle};
use super::engine::{build_engine, DEADLINE_MARKER};
use super::libs::to_json;
use super::types::ExecutionResult;
use crate::app::SandboxConfig;
use crate::stats::StatsService;

/// Runs validated scripts. The seam the repair loop drives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, code: &str, season: i32, question: &str) -> ExecutionResult;
}

/// Rhai-backed executor with a capability-limited scope
pub struct Sandbox {
    stats: StatsService,
    timeout: Duration,
    max_operations: u64,
}

impl Sandbox {
    pub fn new(stats: StatsService, config: &SandboxConfig) -> Self {
        Self {
            stats,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_operations: config.max_operations,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

enum Outcome {
    Value(Dynamic),
    Failed(String),
    OutOfTime(String),
}

fn run_script(
    code: String,
    season: i32,
    question: String,
    stats: StatsHandle,
    max_operations: u64,
    deadline: Instant,
) -> Outcome {
    let engine = build_engine(max_operations, deadline);

    let mut scope = Scope::new();
    scope.push("stats", stats);
    scope.push("tables", TablesHandle);
    scope.push("season", season as INT);
    scope.push("question", question);
    scope.push("result", Dynamic::UNIT);

    match engine.run_with_scope(&mut scope, &code) {
        Ok(()) => Outcome::Value(scope.get_value::<Dynamic>("result").unwrap_or(Dynamic::UNIT)),
        Err(err) if hit_limit(&err) => Outcome::OutOfTime(err.to_string()),
        Err(err) => Outcome::Failed(err.to_string()),
    }
}

/// Operation budget and wall-clock deadline both count as timeouts,
/// even when raised from inside a function or module
fn hit_limit(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorTooManyOperations(..) => true,
        EvalAltResult::ErrorTerminated(token, ..) => {
            token.clone().into_string().map_or(true, |t| t == DEADLINE_MARKER)
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) | EvalAltResult::ErrorInModule(_, inner, _) => {
            hit_limit(inner)
        }
        _ => false,
    }
}

/// Check the script's `result` map against the contract
fn interpret_result(result: &Dynamic) -> Result<(Value, Option<String>), String> {
    if result.is_unit() {
        return Err("script did not assign `result`".to_string());
    }

    let value = to_json(result).map_err(|e| format!("`result` is not serializable: {}", e))?;
    let Some(map) = value.as_object() else {
        return Err(format!("`result` must be a map, got {}", value));
    };

    match map.get("success").and_then(Value::as_bool) {
        None => Err("`result` has no boolean `success` entry".to_string()),
        Some(false) => Err(map
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("script reported failure without an error message")
            .to_string()),
        Some(true) => {
            let data = map.get("data").filter(|d| !d.is_null());
            let answer = map.get("answer").and_then(Value::as_str).map(str::to_string);
            if data.is_none() && answer.is_none() {
                return Err("successful `result` carries neither `data` nor `answer`".to_string());
            }
            Ok((value, answer))
        }
    }
}

#[async_trait]
impl Executor for Sandbox {
    async fn execute(&self, code: &str, season: i32, question: &str) -> ExecutionResult {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let stats = StatsHandle::new(self.stats.clone(), Handle::current());
        let (code, question, max_operations) = (code.to_string(), question.to_string(), self.max_operations);

        let task = tokio::task::spawn_blocking(move || {
            run_script(code, season, question, stats, max_operations, deadline)
        });

        // the engine checks the deadline itself; the outer timeout covers host calls that hang
        let outcome = tokio::time::timeout(self.timeout + Duration::from_secs(1), task).await;
        let elapsed = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Err(_) => ExecutionResult::timeout(
                format!("script exceeded the {}s time limit", self.timeout.as_secs_f32()),
                elapsed,
            ),
            Ok(Err(join_err)) => ExecutionResult::runtime_error(format!("script task failed: {}", join_err), elapsed),
            Ok(Ok(Outcome::OutOfTime(detail))) => ExecutionResult::timeout(
                format!("script exceeded its execution limits: {}", detail),
                elapsed,
            ),
            Ok(Ok(Outcome::Failed(message))) => ExecutionResult::runtime_error(message, elapsed),
            Ok(Ok(Outcome::Value(value))) => match interpret_result(&value) {
                Ok((value, answer)) => ExecutionResult::success(value, answer, elapsed),
                Err(message) => ExecutionResult::runtime_error(message, elapsed),
            },
        };

        if result.is_success() {
            debug!("Script finished in {}ms", elapsed);
        } else {
            warn!(
                "Script failed ({:?}) after {}ms: {}",
                result.status,
                elapsed,
                result.error_message.as_deref().unwrap_or_default()
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::ExecutionStatus;
    use crate::stats::FakeSource;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn sandbox(fake: FakeSource) -> Sandbox {
        Sandbox::new(StatsService::new(Arc::new(fake)), &SandboxConfig::default())
    }

    fn leaders_fake() -> FakeSource {
        FakeSource::new().route(
            "stats/leaders",
            json!({"leagueLeaders": [{"leaders": [
                {"rank": 1, "value": "58", "person": {"id": 592450, "fullName": "Aaron Judge"}, "team": {"id": 147, "name": "New York Yankees"}},
                {"rank": 2, "value": "54", "person": {"id": 660271, "fullName": "Shohei Ohtani"}, "team": {"id": 119, "name": "Los Angeles Dodgers"}}
            ]}]}),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_success_with_stats_and_tables() {
        let code = r#"
import "table" as table;
let rows = tables.leaders(stats.leaders("homeRuns", season, 10));
let best = table::top(rows, 1);
result = #{ success: true, data: best, answer: `${best[0].name} leads with ${best[0].value}` };
"#;
        let result = sandbox(leaders_fake()).execute(code, 2024, "who leads in home runs").await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.answer.as_deref(), Some("Aaron Judge leads with 58"));
        assert_eq!(result.data().unwrap()[0]["player_id"], json!(592450));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_script_reported_failure() {
        let code = r#"result = #{ success: false, error: "player not found" };"#;
        let result = sandbox(FakeSource::new()).execute(code, 2024, "q").await;

        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.error_message.as_deref(), Some("player not found"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_success_without_payload_is_an_error() {
        let result = sandbox(FakeSource::new())
            .execute("result = #{ success: true };", 2024, "q")
            .await;
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.error_message.unwrap().contains("neither"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_result_is_an_error() {
        let result = sandbox(FakeSource::new()).execute("let x = 1;", 2024, "q").await;
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.error_message.unwrap().contains("did not assign"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upstream_failure_surfaces_as_runtime_error() {
        let code = r#"let p = stats.standings(103, season); result = #{ success: true, data: p };"#;
        let result = sandbox(FakeSource::new()).execute(code, 2024, "q").await;
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.error_message.unwrap().contains("404"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_infinite_loop_times_out() {
        let sandbox = Sandbox::new(
            StatsService::new(Arc::new(FakeSource::new())),
            &SandboxConfig {
                max_operations: u64::MAX,
                ..SandboxConfig::default()
            },
        )
        .with_timeout(Duration::from_millis(200));

        let result = sandbox.execute("loop { }", 2024, "q").await;
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(result.duration_ms < 5_000);
    }

    #[test]
    fn test_interpret_result_rejects_non_map() {
        assert!(interpret_result(&Dynamic::from(42 as INT)).is_err());
        assert!(interpret_result(&Dynamic::UNIT).is_err());
    }
}
