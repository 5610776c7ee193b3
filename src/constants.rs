/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_STATS_API_URL: &str = "https://statsapi.mlb.com/api/v1";
pub const DEFAULT_LITELLM_PROXY_URL: &str = "http://localhost:4000";
pub const DEFAULT_MODEL_PROVIDER: &str = "ollama";
pub const DEFAULT_MODEL_NAME: &str = "llama3.2";

// Timeouts
pub const STATS_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const MODEL_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 3;
pub const SANDBOX_TIMEOUT_SECS: u64 = 30;

// Upstream retry policy (connection and timeout failures only)
pub const STATS_MAX_RETRIES: u32 = 3;
pub const STATS_BACKOFF_BASE_MS: u64 = 250;
pub const STATS_BACKOFF_MAX_MS: u64 = 2_000;

// Cache lifetimes
pub const RESPONSE_CACHE_TTL_HOURS: u64 = 24;
pub const CODE_CACHE_TTL_DAYS: u64 = 30;
pub const CACHE_STATS_TOP_QUESTIONS: usize = 20;

// Code generation
pub const GENERATION_TEMPERATURE: f32 = 0.2;
pub const GENERATION_MAX_TOKENS: usize = 2000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

// Sandbox limits
pub const SANDBOX_MAX_OPERATIONS: u64 = 5_000_000;
pub const SANDBOX_MAX_CALL_LEVELS: usize = 32;
pub const SANDBOX_MAX_EXPR_DEPTH: usize = 64;
pub const SANDBOX_MAX_FN_EXPR_DEPTH: usize = 32;
pub const SANDBOX_MAX_STRING_SIZE: usize = 1_000_000;
pub const SANDBOX_MAX_ARRAY_SIZE: usize = 100_000;
pub const SANDBOX_MAX_MAP_SIZE: usize = 10_000;
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

// Query defaults
pub const DEFAULT_LEADERS_LIMIT: u32 = 10;
pub const LEADERS_FETCH_LIMIT: u32 = 50;
pub const RANKING_FETCH_LIMIT: u32 = 500;
pub const MIN_QUESTION_CHARS: usize = 3;

// Season calendar: regular season starts in April
pub const SEASON_START_MONTH: u32 = 4;

// League identifiers used by the stats API
pub const AMERICAN_LEAGUE_ID: u32 = 103;
pub const NATIONAL_LEAGUE_ID: u32 = 104;
pub const MLB_SPORT_ID: u32 = 1;
