//! CLI command definitions and parsing
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::clustering::{ClusterStrategy, TieBreak};
use crate::embedding::VectorizerBackend;
use crate::extraction::ExtractorKind;

#[derive(Parser, Debug)]
#[command(
    name = "pagesift",
    version,
    author = "neur0map",
    about = "Reduce multi-page documents to a deduplicated, token-bounded excerpt",
    long_about = "Pagesift extracts pages from a batch of documents, drops unintelligible and \
                  near-duplicate pages, ranks the rest by lexical relevance and packs them into \
                  a single excerpt that fits a language model's token budget."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/pagesift/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an excerpt from the given files, in order
    Run {
        /// Input documents
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Token budget for the excerpt
        #[arg(short, long)]
        budget: Option<i64>,

        /// Vectorization backend
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,

        /// Page extraction backend
        #[arg(long, value_enum)]
        extractor: Option<ExtractorArg>,

        /// Similarity threshold, overriding the backend default
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Duplicate clustering strategy
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Representative tie-break policy
        #[arg(long, value_enum)]
        tie_break: Option<TieBreakArg>,

        /// Named profile from the config file
        #[arg(short, long)]
        profile: Option<String>,

        /// Print the run report as JSON, excerpt included
        #[arg(long)]
        json: bool,

        /// Write the excerpt to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendArg {
    Lexical,
    Local,
    Hosted,
}

impl From<BackendArg> for VectorizerBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Lexical => VectorizerBackend::Lexical,
            BackendArg::Local => VectorizerBackend::Local,
            BackendArg::Hosted => VectorizerBackend::Hosted,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractorArg {
    Pdfium,
    PdfExtract,
    Lopdf,
    PlainText,
}

impl From<ExtractorArg> for ExtractorKind {
    fn from(arg: ExtractorArg) -> Self {
        match arg {
            ExtractorArg::Pdfium => ExtractorKind::Pdfium,
            ExtractorArg::PdfExtract => ExtractorKind::PdfExtract,
            ExtractorArg::Lopdf => ExtractorKind::Lopdf,
            ExtractorArg::PlainText => ExtractorKind::PlainText,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    ConnectedComponents,
    GreedyLeader,
    Star,
    CompleteLinkage,
}

impl From<StrategyArg> for ClusterStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::ConnectedComponents => ClusterStrategy::ConnectedComponents,
            StrategyArg::GreedyLeader => ClusterStrategy::GreedyLeader,
            StrategyArg::Star => ClusterStrategy::Star,
            StrategyArg::CompleteLinkage => ClusterStrategy::CompleteLinkage,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TieBreakArg {
    LargestContent,
    HighestRelevance,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::LargestContent => TieBreak::LargestContent,
            TieBreakArg::HighestRelevance => TieBreak::HighestRelevance,
        }
    }
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "pagesift",
            "run",
            "a.pdf",
            "b.pdf",
            "--budget",
            "500",
            "--backend",
            "hosted",
            "--strategy",
            "greedy-leader",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                files,
                budget,
                backend,
                strategy,
                json,
                ..
            } => {
                assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
                assert_eq!(budget, Some(500));
                assert_eq!(backend.map(VectorizerBackend::from), Some(VectorizerBackend::Hosted));
                assert_eq!(
                    strategy.map(ClusterStrategy::from),
                    Some(ClusterStrategy::GreedyLeader)
                );
                assert!(json);
            }
            other => panic!("Expected run command, got {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_files() {
        assert!(Cli::try_parse_from(["pagesift", "run"]).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["pagesift", "run", "a.pdf", "--backend", "magic"]).is_err());
    }
}
