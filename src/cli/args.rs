use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dugout")]
#[command(version)]
#[command(about = "Ask baseball statistics questions in plain English", long_about = None)]
pub struct Cli {
    /// Model used for generated code (e.g., ollama/qwen2.5-coder, openai/gpt-4o-mini)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Never fall back to generated code
    #[arg(long, global = true)]
    pub no_ai: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question
    Ask(AskArgs),
    /// Discard any cached code for a question and answer it again
    Regenerate(AskArgs),
    /// Show how a question is parsed and routed, without fetching anything
    Parse {
        question: String,
        /// Season used when the question names none
        #[arg(long)]
        season: Option<i32>,
    },
    /// Run the static validator over a script file
    Validate { file: PathBuf },
    /// Inspect or clear the on-disk caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Check the code generator connection and cache state
    Status,
    /// Initialize configuration
    Init,
}

#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question, e.g. "Top 10 home runs in 2024"
    pub question: String,

    /// Season used when the question names none
    #[arg(long)]
    pub season: Option<i32>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Include the generated code and resolution steps
    #[arg(long)]
    pub show_code: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,
    /// Remove cached entries (both stores unless one is named)
    Clear {
        /// Only the generated-code store
        #[arg(long)]
        code: bool,
        /// Only the API response store
        #[arg(long)]
        responses: bool,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
    /// Markdown formatted output
    Markdown,
}
