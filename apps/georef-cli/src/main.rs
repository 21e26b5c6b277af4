//! Memorial verification CLI
//!
//! Verifies batches of memorial text files against a tolerance table and
//! compares two versions of the same memorial.

mod batch;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use georef_engine::{RuleTable, ToleranceTable, Verifier};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "georef-cli")]
#[command(
    version,
    about = "Verify georeferenced property descriptions (memoriais descritivos)"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify one or more memorial text files
    Verify {
        /// Extracted text of each memorial
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tolerance table (TOML)
        #[arg(short, long)]
        tolerances: PathBuf,

        /// Rule table (TOML); built-in defaults when omitted
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Precision class overriding the one stated in each document
        #[arg(short, long)]
        class: Option<String>,

        /// Documents verified at the same time
        #[arg(short, long, default_value = "4")]
        jobs: usize,

        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Compare a reference memorial with a candidate version
    Compare {
        reference: PathBuf,
        candidate: PathBuf,

        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Reports go to stdout, logs to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("georef-cli v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Verify {
            files,
            tolerances,
            rules,
            class,
            jobs,
            format,
        } => {
            let mut verifier = Verifier::new(ToleranceTable::from_file(&tolerances)?);
            if let Some(rules) = rules {
                verifier = verifier.with_rules(RuleTable::from_file(&rules)?);
            }
            tracing::info!(documents = files.len(), jobs, "Starting batch");

            let documents = batch::run(verifier, files, class, jobs).await?;
            let report = batch::BatchReport::new(documents);
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                Format::Text => print!("{}", report.to_text()),
            }
        }
        Command::Compare {
            reference,
            candidate,
            format,
        } => {
            let a = read_text(&reference)?;
            let b = read_text(&candidate)?;
            let comparison = georef_engine::compare::compare_memorials(&a, &b)
                .context("Cannot compare memorials")?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&comparison)?),
                Format::Text => print!("{}", comparison.to_text()),
            }
        }
    }

    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_verify_defaults() {
        let args = Args::try_parse_from([
            "georef-cli",
            "verify",
            "a.txt",
            "b.txt",
            "--tolerances",
            "config/tolerances.example.toml",
        ])
        .unwrap();
        match args.command {
            Command::Verify {
                files,
                rules,
                class,
                jobs,
                format,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert!(rules.is_none());
                assert!(class.is_none());
                assert_eq!(jobs, 4);
                assert_eq!(format, Format::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verify_requires_tolerances() {
        assert!(Args::try_parse_from(["georef-cli", "verify", "a.txt"]).is_err());
    }

    #[test]
    fn test_compare_text_format() {
        let args =
            Args::try_parse_from(["georef-cli", "compare", "a.txt", "b.txt", "-f", "text"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Compare {
                format: Format::Text,
                ..
            }
        ));
    }
}
