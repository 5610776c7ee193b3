use tracing::{debug, info, warn};

use crate::cache::{CodeCache, NewCodeEntry};
use crate::codegen::{CodeGenerator, GenerationRequest, RepairContext};
use crate::sandbox::{ExecutionResult, ExecutionStatus, Executor, Validator};
use crate::utils::{ErrorKind, GeneratorError};

/// Callback receiving `(step, detail)` as a resolution progresses
pub type ProgressCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Human-readable trail of what a resolution did
pub struct Progress<'a> {
    steps: Vec<String>,
    callback: Option<&'a (dyn Fn(&str, &str) + Send + Sync)>,
}

impl<'a> Progress<'a> {
    pub fn new(callback: Option<&'a (dyn Fn(&str, &str) + Send + Sync)>) -> Self {
        Self {
            steps: Vec::new(),
            callback,
        }
    }

    pub fn record(&mut self, step: &str, detail: impl Into<String>) {
        let detail = detail.into();
        if let Some(callback) = self.callback {
            callback(step, &detail);
        }
        self.steps.push(if detail.is_empty() {
            step.to_string()
        } else {
            format!("{}: {}", step, detail)
        });
    }

    pub fn into_steps(self) -> Vec<String> {
        self.steps
    }
}

/// The question being worked on and where its code is cached
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub question: &'a str,
    pub normalized: &'a str,
    pub season: i32,
    pub key: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    Resolved {
        code: String,
        execution: ExecutionResult,
        attempts: u32,
    },
    Failed {
        failure: Failure,
        attempts: u32,
    },
}

enum State {
    Generate { repair: Option<RepairContext> },
    Validate { code: String },
    Execute { code: String },
    Done(LoopOutcome),
}

/// Generate → validate → execute, retrying with the failure as context
pub struct RepairLoop<'a> {
    pub generator: &'a dyn CodeGenerator,
    pub validator: &'a Validator,
    pub executor: &'a dyn Executor,
    pub cache: &'a CodeCache,
    pub max_attempts: u32,
}

impl RepairLoop<'_> {
    pub async fn run(&self, job: Job<'_>, initial: Option<RepairContext>, progress: &mut Progress<'_>) -> LoopOutcome {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0u32;
        let mut last_failure: Option<Failure> = None;
        let mut state = State::Generate { repair: initial };

        loop {
            state = match state {
                State::Generate { repair } => {
                    if attempts >= max_attempts {
                        State::Done(exhausted(last_failure.take(), attempts))
                    } else {
                        attempts += 1;
                        self.generate(job, repair, attempts, &mut last_failure, progress).await
                    }
                }
                State::Validate { code } => {
                    let verdict = self.validator.validate(&code);
                    if verdict.ok {
                        progress.record("validated", "");
                        State::Execute { code }
                    } else {
                        let failure = verdict.describe();
                        warn!("Attempt {} rejected by validator:\n{}", attempts, failure);
                        progress.record("rejected", format!("{} violation(s)", verdict.violations.len()));
                        last_failure = Some(Failure {
                            kind: ErrorKind::Validation,
                            message: format!("Generated code failed validation:\n{}", failure),
                            code: Some(code.clone()),
                        });
                        State::Generate {
                            repair: Some(RepairContext {
                                previous_code: code,
                                failure,
                            }),
                        }
                    }
                }
                State::Execute { code } => {
                    progress.record("executing", format!("attempt {}", attempts));
                    let execution = self.executor.execute(&code, job.season, job.question).await;
                    if execution.is_success() {
                        self.persist(job, &code, &execution);
                        progress.record("resolved", format!("in {}ms", execution.duration_ms));
                        State::Done(LoopOutcome::Resolved {
                            code,
                            execution,
                            attempts,
                        })
                    } else {
                        let message = execution.error_message.clone().unwrap_or_default();
                        warn!("Attempt {} failed during execution: {}", attempts, message);
                        progress.record("execution failed", message.clone());
                        last_failure = Some(execution_failure(&execution, &code));
                        State::Generate {
                            repair: Some(RepairContext {
                                previous_code: code,
                                failure: message,
                            }),
                        }
                    }
                }
                State::Done(outcome) => return outcome,
            };
        }
    }

    async fn generate(
        &self,
        job: Job<'_>,
        repair: Option<RepairContext>,
        attempt: u32,
        last_failure: &mut Option<Failure>,
        progress: &mut Progress<'_>,
    ) -> State {
        let label = if repair.is_some() { "repairing" } else { "generating" };
        progress.record(label, format!("attempt {} of {}", attempt, self.max_attempts.max(1)));
        debug!("Repair loop: {} (attempt {})", label, attempt);

        let request = match &repair {
            Some(context) => GenerationRequest::new(job.question, job.season).with_repair(context.clone()),
            None => GenerationRequest::new(job.question, job.season),
        };

        match self.generator.generate(&request).await {
            Ok(code) => State::Validate { code },
            Err(GeneratorError::Unavailable(message)) => {
                warn!("Code generator unavailable: {}", message);
                State::Done(LoopOutcome::Failed {
                    failure: Failure {
                        kind: ErrorKind::GeneratorUnavailable,
                        message,
                        code: None,
                    },
                    attempts: attempt,
                })
            }
            Err(err @ GeneratorError::BadResponse(_)) => {
                warn!("Attempt {} produced no usable reply: {}", attempt, err);
                *last_failure = Some(Failure {
                    kind: ErrorKind::Unresolved,
                    message: err.to_string(),
                    code: None,
                });
                // nothing new to repair; keep the previous context
                State::Generate { repair }
            }
        }
    }

    fn persist(&self, job: Job<'_>, code: &str, execution: &ExecutionResult) {
        let stored = self.cache.record(NewCodeEntry {
            key: job.key,
            question: job.question,
            normalized_question: job.normalized,
            season: job.season,
            code_text: code,
            execution_ms: execution.duration_ms,
        });
        match stored {
            Ok(()) => info!("Cached working code for {:?}", job.normalized),
            Err(e) => warn!("Could not cache working code: {}", e),
        }
    }
}

pub(crate) fn execution_failure(execution: &ExecutionResult, code: &str) -> Failure {
    let kind = if execution.status == ExecutionStatus::Timeout {
        ErrorKind::ExecutionTimeout
    } else {
        ErrorKind::Execution
    };
    Failure {
        kind,
        message: execution.error_message.clone().unwrap_or_default(),
        code: Some(code.to_string()),
    }
}

fn exhausted(last: Option<Failure>, attempts: u32) -> LoopOutcome {
    let failure = match last {
        Some(last) => Failure {
            kind: last.kind,
            message: format!("Could not resolve the question after {} attempts: {}", attempts, last.message),
            code: last.code,
        },
        None => Failure {
            kind: ErrorKind::Unresolved,
            message: format!("Could not resolve the question after {} attempts", attempts),
            code: None,
        },
    };
    LoopOutcome::Failed { failure, attempts }
}
