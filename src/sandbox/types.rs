use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::constants::MAX_ERROR_MESSAGE_CHARS;
use crate::utils::truncate_message;

/// Static rule a candidate script can break
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    ImportNotAllowed,
    DynamicImport,
    DynamicEval,
    FilesystemAccess,
    ProcessSpawn,
    NetworkAccess,
    AmbientCapability,
    SyntaxError,
    EmptyCandidate,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::ImportNotAllowed => "import-not-allowed",
            RuleId::DynamicImport => "dynamic-import",
            RuleId::DynamicEval => "dynamic-eval",
            RuleId::FilesystemAccess => "filesystem-access",
            RuleId::ProcessSpawn => "process-spawn",
            RuleId::NetworkAccess => "network-access",
            RuleId::AmbientCapability => "ambient-capability",
            RuleId::SyntaxError => "syntax-error",
            RuleId::EmptyCandidate => "empty-candidate",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: RuleId,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule_id, self.detail)
    }
}

/// Outcome of static inspection. Produced fresh for every candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub ok: bool,
    pub violations: Vec<Violation>,
}

impl ValidationVerdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            ok: violations.is_empty(),
            violations,
        }
    }

    /// All violations on separate lines, for repair prompts and error messages
    pub fn describe(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    RuntimeError,
    Timeout,
}

/// What one sandboxed run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// The full `result` map on success
    pub value: Option<Value>,
    pub answer: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(value: Value, answer: Option<String>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Success,
            value: Some(value),
            answer,
            error_message: None,
            duration_ms,
        }
    }

    pub fn runtime_error(message: impl AsRef<str>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::RuntimeError,
            value: None,
            answer: None,
            error_message: Some(truncate_message(message.as_ref(), MAX_ERROR_MESSAGE_CHARS)),
            duration_ms,
        }
    }

    pub fn timeout(message: impl AsRef<str>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Timeout,
            value: None,
            answer: None,
            error_message: Some(truncate_message(message.as_ref(), MAX_ERROR_MESSAGE_CHARS)),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// The `data` entry of a successful result
    pub fn data(&self) -> Option<&Value> {
        self.value.as_ref().and_then(|v| v.get("data"))
    }
}
