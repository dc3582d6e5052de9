//! Judgebox CLI
//!
//! A command-line tool for test-running submissions in sandbox containers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use judgebox::{
    CodeTestReport, Config, DirectoryStore, DockerBackend, EXAMPLE_CONFIG, LANGUAGES, Language,
    Problem, SubmissionType, TestRunner,
};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "judgebox")]
#[command(about = "Compile and test submissions in disposable sandbox containers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding templates and build files as <bucket>/<key>
    #[arg(short, long, global = true, default_value = ".")]
    storage: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: judgebox.toml)
        #[arg(short, long, default_value = "judgebox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Test a single source file against a problem's samples
    Test {
        /// Source file to test
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language (c, cpp, java, python)
        #[arg(short, long)]
        language: Language,

        /// Problem definition (TOML); without one only custom input is run
        #[arg(short, long)]
        problem: Option<PathBuf>,

        /// Custom input file, replacing the samples
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Test a ZIP archive against a multi-file problem's samples
    TestArchive {
        /// ZIP archive to test
        #[arg(value_name = "ZIP")]
        archive: PathBuf,

        /// Language (c, cpp, java, python)
        #[arg(short, long)]
        language: Language,

        /// Problem definition (TOML); must be MULTI_FILE
        #[arg(short, long)]
        problem: Option<PathBuf>,

        /// Custom input file, replacing the samples
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// List supported languages
    Languages,

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // Logs go to stderr; stdout carries the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init { output, force } = &cli.command {
        return init_config(output, *force).await;
    }

    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Test {
            source,
            language,
            problem,
            input,
        } => {
            let problem = load_problem(problem.as_deref(), SubmissionType::SingleFile)?;
            let source = tokio::fs::read_to_string(&source)
                .await
                .with_context(|| format!("failed to read source file '{}'", source.display()))?;
            let input = read_input(input.as_deref()).await?;

            info!(problem = %problem.id, %language, "testing source");
            let runner = build_runner(config, &cli.storage);
            let report = runner
                .test_code(&problem, language, &source, input.as_deref())
                .await
                .context("test run failed")?;
            finish(&report)
        }
        Commands::TestArchive {
            archive,
            language,
            problem,
            input,
        } => {
            let problem = load_problem(problem.as_deref(), SubmissionType::MultiFile)?;
            let archive = tokio::fs::read(&archive)
                .await
                .with_context(|| format!("failed to read archive '{}'", archive.display()))?;
            let input = read_input(input.as_deref()).await?;

            info!(problem = %problem.id, %language, "testing archive");
            let runner = build_runner(config, &cli.storage);
            let report = runner
                .test_archive(&problem, language, &archive, input.as_deref())
                .await
                .context("test run failed")?;
            finish(&report)
        }
        Commands::Languages => {
            list_languages();
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

fn build_runner(config: Config, storage: &Path) -> TestRunner<DockerBackend, DirectoryStore> {
    let backend = DockerBackend::from_config(&config);
    TestRunner::new(config, backend, DirectoryStore::new(storage))
}

/// Load a problem file, or make an ad-hoc problem accepting any language
fn load_problem(path: Option<&Path>, fallback: SubmissionType) -> Result<Problem> {
    match path {
        Some(path) => Problem::from_file(path)
            .with_context(|| format!("failed to load problem '{}'", path.display())),
        None => Ok(Problem::new("adhoc").with_submission_type(fallback)),
    }
}

async fn read_input(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => {
            let input = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read input file '{}'", path.display()))?;
            Ok(Some(input))
        }
        None => Ok(None),
    }
}

/// Print the report and exit non-zero unless everything was accepted
fn finish(report: &CodeTestReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    println!("{json}");

    info!(
        compile_status = ?report.compile_status,
        cases = report.results.len(),
        "test run finished"
    );

    let judge_errors = report
        .results
        .iter()
        .filter(|result| result.status.is_infrastructure())
        .count();
    if judge_errors > 0 {
        warn!(judge_errors, "some cases failed for reasons outside the submission");
    }

    if report.all_accepted() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_languages() {
    println!("Supported languages:\n");
    for spec in &LANGUAGES {
        println!(
            "  {:<8} {:<6} {}",
            spec.sandbox_tag, spec.name, spec.file_name
        );
    }
}

fn show_config(config: &Config) {
    println!("Sandbox image: {}", config.sandbox_image);
    println!("Docker binary: {}", config.docker_binary().display());
    println!("Job root: {}", config.job_root.display());
    println!("Mount point: {}", config.mount_point);
    println!("Container prefix: {}", config.container_prefix);
    println!("Parallel cases: {}", config.max_parallel_cases);
    println!();

    for (label, limits) in [
        ("Compile", config.compile_limits(false)),
        ("Compile (make)", config.compile_limits(true)),
        ("Run", config.run_limits(None)),
    ] {
        println!("{label} limits:");
        println!("  Time limit: {:?} ms", limits.time_limit_ms);
        println!("  Memory limit: {:?} KB", limits.memory_limit_kb);
        println!("  Container memory: {:?} MB", limits.container_memory_mb);
        println!("  Timeout: {:?} ms", limits.timeout_ms);
        println!("  Max processes: {:?}", limits.pids_limit);
    }
    println!("  Run overhead: {} ms", config.run_overhead_ms);
    println!();
    println!(
        "Buckets: templates '{}', build files '{}'",
        config.template_bucket, config.build_file_bucket
    );
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
