use std::path::{Path, PathBuf};

use pagesift::cli::{Cli, Commands, ConfigAction};
use pagesift::config::{Config, ConfigValidator};
use pagesift::error::{Result, SiftError};
use pagesift::pipeline::{CancelToken, Pipeline, PipelineOutcome, RunReport, Stage};

/// Overrides given on the `run` command line
struct RunOverrides {
    budget: Option<i64>,
    backend: Option<pagesift::cli::BackendArg>,
    extractor: Option<pagesift::cli::ExtractorArg>,
    threshold: Option<f32>,
    strategy: Option<pagesift::cli::StrategyArg>,
    tie_break: Option<pagesift::cli::TieBreakArg>,
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            files,
            budget,
            backend,
            extractor,
            threshold,
            strategy,
            tie_break,
            profile,
            json,
            output,
        } => {
            let overrides = RunOverrides {
                budget,
                backend,
                extractor,
                threshold,
                strategy,
                tie_break,
            };
            cmd_run(cli.config, profile, overrides, &files, json, output)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "pagesift=debug"
    } else {
        "pagesift=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    overrides: RunOverrides,
    files: &[PathBuf],
    json: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path, profile)?;

    if let Some(budget) = overrides.budget {
        config.budget.max_tokens = budget;
    }
    if let Some(backend) = overrides.backend {
        config.vectorizer.backend = backend.into();
    }
    if let Some(extractor) = overrides.extractor {
        config.extraction.backend = extractor.into();
    }
    if let Some(threshold) = overrides.threshold {
        config.similarity.threshold = Some(threshold);
    }
    if let Some(strategy) = overrides.strategy {
        config.clustering.strategy = strategy.into();
    }
    if let Some(tie_break) = overrides.tie_break {
        config.clustering.tie_break = tie_break.into();
    }

    let pipeline = Pipeline::from_config(&config)?;
    tracing::info!(
        "Running over {} files (threshold {})",
        files.len(),
        pipeline.threshold()
    );

    let mut progress = |stage: Stage| tracing::info!("Stage: {}", stage);
    let outcome = pipeline.run(files, &mut progress, &CancelToken::new())?;
    let report = RunReport::from_outcome(&outcome);

    for path in report.skipped_files() {
        eprintln!("⚠ Skipped {}", path.display());
    }

    if json {
        let report = report.with_excerpt(&outcome);
        println!("{}", report.to_json()?);
        return Ok(());
    }

    match &outcome {
        PipelineOutcome::Completed(result) => {
            match output {
                Some(path) => {
                    write_excerpt(&path, &result.aggregation.text)?;
                    eprintln!("✓ Excerpt written to {}", path.display());
                }
                None => println!("{}", result.aggregation.text),
            }

            let counters = &result.counters;
            eprintln!("Pages:     {}", counters.total_pages);
            eprintln!("Selected:  {}", counters.selected);
            eprintln!("Duplicate: {}", counters.discarded_by_similarity);
            eprintln!("Unusable:  {}", counters.discarded_unintelligible);
            eprintln!(
                "Tokens:    {} of {} (budget {})",
                result.aggregation.tokens_after_truncation,
                result.aggregation.tokens_before_truncation,
                config.budget.max_tokens
            );
            if let Some(usage) = result.usage {
                eprintln!(
                    "Embedding: {} requests, {} tokens, cost {:.6}",
                    usage.requests, usage.tokens, usage.cost
                );
            }
        }
        PipelineOutcome::NoContent { reason, .. } => {
            eprintln!("✗ No content: {}", reason);
        }
    }

    Ok(())
}

fn write_excerpt(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).map_err(|e| SiftError::Io {
        source: e,
        context: format!("Failed to write excerpt: {:?}", path),
    })
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!(
                "  Backend: {:?} (threshold {})",
                config.vectorizer.backend,
                config.similarity_threshold()
            );
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SiftError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'pagesift config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides()?;
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, &profile),
        None => Config::load(&path),
    }
}
