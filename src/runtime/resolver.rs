use anyhow::{Context as _, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::direct::DirectExecutor;
use super::repair::{execution_failure, Job, LoopOutcome, Progress, ProgressCallback, RepairLoop};
use crate::app::{cache_root, Config};
use crate::cache::{CacheError, CodeCache, CodeCacheStats, ResponseCache};
use crate::codegen::{CodeGenerator, LlmCodeGenerator, RepairContext};
use crate::constants::DEFAULT_MAX_ATTEMPTS;
use crate::query::{normalize, parse, route, ParsedQuery, Route};
use crate::sandbox::{ExecutionResult, Executor, Sandbox, Validator};
use crate::stats::{CachedSource, StatsApiClient, StatsService};
use crate::utils::{current_season, ErrorKind};

/// What the presentation layer gets back for one question
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resolution {
    Standard {
        parsed_query: ParsedQuery,
        data: Value,
    },
    AiResolved {
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code_text: Option<String>,
        cached: bool,
        attempts: u32,
        steps: Vec<String>,
    },
    Error {
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code_text: Option<String>,
    },
}

impl Resolution {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Resolution::Error {
            kind,
            message: message.into(),
            code_text: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Resolution::Error { .. })
    }

    /// Whether offering "regenerate" makes sense for this outcome
    pub fn can_regenerate(&self) -> bool {
        match self {
            Resolution::Error { kind, .. } => kind.can_regenerate(),
            Resolution::AiResolved { .. } => true,
            Resolution::Standard { .. } => false,
        }
    }
}

/// The two persisted stores, owned by the process entry point
pub struct Stores {
    pub code: Arc<CodeCache>,
    pub responses: Arc<ResponseCache>,
}

impl Stores {
    pub fn open(config: &Config) -> Result<Self> {
        let root = cache_root(config)?;
        let code = CodeCache::open(
            root.join("code"),
            Duration::from_secs(config.cache.code_ttl_days.saturating_mul(24 * 3600)),
        )
        .context("Failed to open code cache")?;
        let responses = ResponseCache::open(
            root.join("responses"),
            Duration::from_secs(config.cache.response_ttl_hours.saturating_mul(3600)),
        )
        .context("Failed to open response cache")?;

        Ok(Self {
            code: Arc::new(code),
            responses: Arc::new(responses),
        })
    }
}

/// Turns questions into resolutions: direct lookups where the parser
/// understands the question, sandboxed generated code where it does not
pub struct Resolver {
    direct: DirectExecutor,
    validator: Validator,
    executor: Arc<dyn Executor>,
    generator: Option<Arc<dyn CodeGenerator>>,
    code_cache: Arc<CodeCache>,
    max_attempts: u32,
    default_season: Option<i32>,
    progress: Option<ProgressCallback>,
}

impl Resolver {
    pub fn new(
        stats: StatsService,
        executor: Arc<dyn Executor>,
        generator: Option<Arc<dyn CodeGenerator>>,
        code_cache: Arc<CodeCache>,
    ) -> Self {
        Self {
            direct: DirectExecutor::new(stats),
            validator: Validator::new(),
            executor,
            generator,
            code_cache,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_season: None,
            progress: None,
        }
    }

    /// Wire the live stats client, sandbox and generator from configuration
    pub fn from_config(config: &Config, stores: &Stores) -> Result<Self> {
        let client = StatsApiClient::new(&config.stats_api)?;
        let source = CachedSource::new(Arc::new(client), stores.responses.clone());
        let stats = StatsService::new(Arc::new(source));

        let executor: Arc<dyn Executor> = Arc::new(Sandbox::new(stats.clone(), &config.sandbox));
        let generator: Option<Arc<dyn CodeGenerator>> = if config.model.enabled {
            Some(Arc::new(LlmCodeGenerator::new(&config.model)?))
        } else {
            None
        };

        Ok(Self::new(stats, executor, generator, stores.code.clone())
            .with_max_attempts(config.sandbox.max_attempts)
            .with_default_season(config.default_season))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_default_season(mut self, season: Option<i32>) -> Self {
        self.default_season = season;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn generator(&self) -> Option<&Arc<dyn CodeGenerator>> {
        self.generator.as_ref()
    }

    /// Normalized key text and the parse of a question, without any I/O
    pub fn analyze(&self, question: &str) -> (String, ParsedQuery) {
        let default_year = self.default_season.unwrap_or_else(current_season);
        (normalize(question), parse(question, Some(default_year)))
    }

    fn season_of(&self, parsed: &ParsedQuery) -> i32 {
        parsed
            .year
            .or(self.default_season)
            .unwrap_or_else(current_season)
    }

    pub async fn resolve(&self, question: &str) -> Resolution {
        let (normalized, parsed) = self.analyze(question);
        let season = self.season_of(&parsed);
        let route = route(&parsed);
        info!("Routing {:?} via {} ({})", question, route, parsed.summary());

        match route {
            Route::Direct => match self.direct.execute(&parsed, season).await {
                Ok(data) => Resolution::Standard {
                    parsed_query: parsed,
                    data,
                },
                Err(e) => Resolution::error(e.kind(), e.to_string()),
            },
            Route::Ai => self.resolve_with_code(question, &normalized, season).await,
        }
    }

    /// Drop any cached code for the question, then resolve it from scratch
    pub async fn regenerate(&self, question: &str) -> Resolution {
        let (normalized, parsed) = self.analyze(question);
        let season = self.season_of(&parsed);
        let key = CodeCache::key_for(&normalized, season);
        if self.code_cache.invalidate(&key) {
            info!("Invalidated cached code for {:?}", normalized);
        }
        self.resolve(question).await
    }

    pub fn code_cache_stats(&self) -> Result<CodeCacheStats, CacheError> {
        self.code_cache.stats()
    }

    pub fn clear_code_cache(&self) -> Result<usize, CacheError> {
        self.code_cache.clear()
    }

    async fn resolve_with_code(&self, question: &str, normalized: &str, season: i32) -> Resolution {
        let Some(generator) = &self.generator else {
            return Resolution::error(
                ErrorKind::GeneratorUnavailable,
                "This question needs generated code, but no code generator is configured",
            );
        };

        let mut progress = Progress::new(self.progress.as_deref());
        let key = CodeCache::key_for(normalized, season);
        let job = Job {
            question,
            normalized,
            season,
            key: &key,
        };

        let mut initial = None;
        if let Some(entry) = self.code_cache.get(&key) {
            progress.record("cache hit", format!("used {} times", entry.hit_count));
            match self.run_cached(job, &entry.code_text, &mut progress).await {
                Ok(execution) => {
                    return Resolution::AiResolved {
                        data: execution.data().cloned().unwrap_or(Value::Null),
                        answer: execution.answer,
                        code_text: Some(entry.code_text),
                        cached: true,
                        attempts: 0,
                        steps: progress.into_steps(),
                    }
                }
                Err(context) => initial = Some(context),
            }
        }

        let repair = RepairLoop {
            generator: generator.as_ref(),
            validator: &self.validator,
            executor: self.executor.as_ref(),
            cache: &self.code_cache,
            max_attempts: self.max_attempts,
        };

        match repair.run(job, initial, &mut progress).await {
            LoopOutcome::Resolved {
                code,
                execution,
                attempts,
            } => Resolution::AiResolved {
                data: execution.data().cloned().unwrap_or(Value::Null),
                answer: execution.answer,
                code_text: Some(code),
                cached: false,
                attempts,
                steps: progress.into_steps(),
            },
            LoopOutcome::Failed { failure, .. } => Resolution::Error {
                kind: failure.kind,
                message: failure.message,
                code_text: failure.code,
            },
        }
    }

    /// Cached code is re-checked and re-run; on failure it is evicted and its
    /// failure becomes the first repair context
    async fn run_cached(&self, job: Job<'_>, code: &str, progress: &mut Progress<'_>) -> Result<ExecutionResult, RepairContext> {
        let verdict = self.validator.validate(code);
        if !verdict.ok {
            warn!("Cached code for {:?} no longer validates; evicting", job.normalized);
            self.code_cache.invalidate(job.key);
            return Err(RepairContext {
                previous_code: code.to_string(),
                failure: verdict.describe(),
            });
        }

        let execution = self.executor.execute(code, job.season, job.question).await;
        if !execution.is_success() {
            let failure = execution_failure(&execution, code);
            warn!("Cached code for {:?} failed ({}); evicting", job.normalized, failure.kind);
            progress.record("cached code failed", failure.message.clone());
            self.code_cache.invalidate(job.key);
            return Err(RepairContext {
                previous_code: code.to_string(),
                failure: failure.message,
            });
        }

        progress.record("resolved", format!("from cache in {}ms", execution.duration_ms));
        Ok(execution)
    }
}
