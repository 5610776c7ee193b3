use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::Path;

use crate::{
    app::{init_config, load_config, load_config_from, Config},
    query::{normalize, parse, route},
    runtime::{format_resolution, Resolver, Stores},
    sandbox::Validator,
    utils::{current_season, log_progress},
};

use super::{AskArgs, CacheAction, Cli, Commands};

/// Load configuration and apply command-line overrides
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if let Some(model) = &cli.model {
        match model.split_once('/') {
            Some((provider, name)) => {
                config.model.provider = provider.to_string();
                config.model.name = name.to_string();
            }
            None => config.model.name = model.clone(),
        }
    }
    if cli.no_ai {
        config.model.enabled = false;
    }

    Ok(config)
}

/// Handle CLI subcommands. Returns the process exit code.
pub async fn handle_command(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::Ask(args) => ask(cli, args, false).await,
        Commands::Regenerate(args) => ask(cli, args, true).await,
        Commands::Parse { question, season } => {
            show_parse(question, *season)?;
            Ok(0)
        }
        Commands::Validate { file } => validate_file(file),
        Commands::Cache { action } => {
            let config = resolve_config(cli)?;
            let stores = Stores::open(&config)?;
            manage_cache(&stores, action)?;
            Ok(0)
        }
        Commands::Status => {
            show_status(cli).await?;
            Ok(0)
        }
        Commands::Init => {
            println!("Initializing Dugout configuration...");
            let path = init_config()?;
            println!("Configuration written to {}", path.display());
            Ok(0)
        }
    }
}

async fn ask(cli: &Cli, args: &AskArgs, regenerate: bool) -> Result<i32> {
    let mut config = resolve_config(cli)?;
    if args.season.is_some() {
        config.default_season = args.season;
    }

    let stores = Stores::open(&config)?;
    let mut resolver = Resolver::from_config(&config, &stores)?;
    if cli.verbose {
        resolver = resolver.with_progress(Box::new(|step: &str, detail: &str| log_progress(step, detail)));
    }

    let resolution = if regenerate {
        resolver.regenerate(&args.question).await
    } else {
        resolver.resolve(&args.question).await
    };

    println!("{}", format_resolution(&resolution, &args.format, args.show_code));
    Ok(if resolution.is_error() { 1 } else { 0 })
}

fn show_parse(question: &str, season: Option<i32>) -> Result<()> {
    let parsed = parse(question, Some(season.unwrap_or_else(current_season)));

    println!("{} {}", "Normalized:".bold(), normalize(question));
    println!("{} {}", "Route:".bold(), route(&parsed));
    println!(
        "{}\n{}",
        "Parsed query:".bold(),
        serde_json::to_string_pretty(&parsed).context("Failed to serialize parsed query")?
    );
    Ok(())
}

fn validate_file(file: &Path) -> Result<i32> {
    let code = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let verdict = Validator::new().validate(&code);

    if verdict.ok {
        println!("  [OK] {} passes validation", file.display());
        Ok(0)
    } else {
        println!("  [ERROR] {} has {} violation(s):", file.display(), verdict.violations.len());
        for violation in &verdict.violations {
            println!("    • {}", violation);
        }
        Ok(1)
    }
}

fn manage_cache(stores: &Stores, action: &CacheAction) -> Result<()> {
    match action {
        CacheAction::Stats => {
            println!("{}", stores.code.stats()?.format());
            println!("{}", stores.responses.stats()?.format());
        }
        CacheAction::Clear { code, responses } => {
            // no flag means both
            let both = !code && !responses;
            if *code || both {
                let removed = stores.code.clear()?;
                println!("Removed {} cached code entries", removed);
            }
            if *responses || both {
                let removed = stores.responses.clear()?;
                println!("Removed {} cached API responses", removed);
            }
        }
    }
    Ok(())
}

/// Show the code generator connection and cache state
async fn show_status(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let stores = Stores::open(&config)?;
    let resolver = Resolver::from_config(&config, &stores)?;

    println!("Dugout Status:");
    println!();

    match resolver.generator() {
        Some(generator) => {
            if generator.check_connection().await {
                println!("  [OK] Code generator: {}", generator.describe());
            } else {
                println!("  [ERROR] Code generator: {} (unreachable)", generator.describe());
            }
        }
        None => println!("  [WARNING] Code generator: disabled (direct answers only)"),
    }

    println!("  [OK] Stats API: {}", config.stats_api.base_url);
    println!("  [OK] Default season: {}", config.default_season.unwrap_or_else(current_season));

    let config_path = crate::app::get_config_dir()?.join("config.toml");
    if config_path.exists() {
        println!("  [OK] Configuration: {}", config_path.display());
    } else {
        println!("  [WARNING] Configuration: Not found (using defaults)");
    }

    println!();
    println!("{}", resolver.code_cache_stats()?.format());
    println!("{}", stores.responses.stats()?.format());
    Ok(())
}
