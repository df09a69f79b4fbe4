//! PinGuard CLI - GPIO pin checks for ESPHome configs from the command line.

mod watcher;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pinguard::pinouts::{render_tree, verify_tree, write_tree, Catalog, PinoutSourceConfig};
use pinguard::{
    discover_config_files, CheckOptions, CheckResult, DocumentId, Finding, PinGuardCore,
    PinoutResolver, Session, Severity,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::watcher::{ConfigWatcher, WatchEvent};

#[derive(Parser)]
#[command(name = "pinguard")]
#[command(about = "GPIO pin usage and hazard checks for ESPHome YAML configs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pinout tree directory (index.json, soc/, boards/)
    #[arg(long, global = true, env = "PINGUARD_PINOUTS", value_name = "DIR")]
    pinouts: Option<PathBuf>,

    /// Base URL of a hosted pinout tree; wins over --pinouts
    #[arg(long, global = true, env = "PINGUARD_PINOUTS_URL", value_name = "URL")]
    pinouts_url: Option<String>,

    /// Log filter, e.g. `info` or `pinguard=debug`
    #[arg(long, global = true, env = "PINGUARD_LOG", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a single ESPHome config
    Check {
        /// Path to a .yaml or .yml file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if findings exist at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,
    },

    /// Check every YAML file in a directory
    Project {
        /// Path to the config directory
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if findings exist at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,

        /// Leave files that are not ESPHome configs out of the report
        #[arg(long)]
        configs_only: bool,
    },

    /// List boards, aliases, and SoC grids of the active pinout source
    Boards {
        /// Show display names and rule counts
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build or verify a pinout tree
    Pinouts {
        #[command(subcommand)]
        action: PinoutsAction,
    },

    /// Re-check YAML files whenever they change
    Watch {
        /// File or directory to watch
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Quiet period before a changed file is checked, in milliseconds
        #[arg(long, default_value_t = 250)]
        debounce_ms: u64,
    },
}

#[derive(Subcommand)]
enum PinoutsAction {
    /// Render the catalog into a pinout tree
    Build {
        /// Output directory
        #[arg(long, value_name = "DIR")]
        out: PathBuf,

        /// Catalog directory to render instead of the built-in one
        #[arg(long, value_name = "DIR")]
        catalog: Option<PathBuf>,
    },
    /// Verify a checked-in tree against the catalog
    Check {
        /// Tree root
        #[arg(long, value_name = "DIR")]
        root: PathBuf,

        /// Catalog directory to verify against instead of the built-in one
        #[arg(long, value_name = "DIR")]
        catalog: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
    /// GitLab CI format
    Gitlab,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Danger,
    Warn,
    Info,
}

impl From<&FailOnSeverity> for Severity {
    fn from(value: &FailOnSeverity) -> Self {
        match value {
            FailOnSeverity::Danger => Severity::Danger,
            FailOnSeverity::Warn => Severity::Warn,
            FailOnSeverity::Info => Severity::Info,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let pinouts = PinoutSourceConfig::from_options(cli.pinouts, cli.pinouts_url);

    let outcome = match cli.command {
        Commands::Check {
            file,
            format,
            fail_on,
        } => handle_check(&file, pinouts, format, fail_on).await,
        Commands::Project {
            dir,
            format,
            fail_on,
            configs_only,
        } => handle_project(&dir, pinouts, configs_only, format, fail_on).await,
        Commands::Boards { verbose } => handle_boards(pinouts, verbose).await,
        Commands::Pinouts { action } => handle_pinouts(action),
        Commands::Watch { path, debounce_ms } => {
            handle_watch(&path, pinouts, Duration::from_millis(debounce_ms)).await
        }
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn handle_check(
    file: &Path,
    pinouts: PinoutSourceConfig,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
) -> Result<i32> {
    let options = CheckOptions {
        pinouts,
        configs_only: false,
    };
    let result = PinGuardCore::check_file(file, options)
        .await
        .with_context(|| format!("Failed to check {}", file.display()))?;

    let results = [result];
    output_results(&results, &format);
    Ok(exit_code_for(&results, fail_on.as_ref()))
}

async fn handle_project(
    dir: &Path,
    pinouts: PinoutSourceConfig,
    configs_only: bool,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
) -> Result<i32> {
    let options = CheckOptions {
        pinouts,
        configs_only,
    };
    let results = PinGuardCore::check_project(dir, options)
        .await
        .with_context(|| format!("Failed to check project {}", dir.display()))?;

    output_results(&results, &format);
    Ok(exit_code_for(&results, fail_on.as_ref()))
}

fn exit_code_for(results: &[CheckResult], fail_on: Option<&FailOnSeverity>) -> i32 {
    match fail_on {
        Some(threshold) if results.iter().any(|r| should_fail(r, threshold)) => 1,
        _ => 0,
    }
}

fn should_fail(result: &CheckResult, threshold: &FailOnSeverity) -> bool {
    result.has_findings_at_or_above(threshold.into())
}

fn output_results(results: &[CheckResult], format: &OutputFormat) {
    match format {
        OutputFormat::Human => output_human(results),
        OutputFormat::Json => output_json(results),
        OutputFormat::Github => output_github(results),
        OutputFormat::Gitlab => output_gitlab(results),
    }
}

fn output_human(results: &[CheckResult]) {
    for result in results {
        print_human(result);
    }
}

fn print_human(result: &CheckResult) {
    println!("\nFile: {}", result.file);
    println!("{}", "─".repeat(60));

    if !result.is_config() {
        println!(
            "  Not an ESPHome config: {}",
            result.config.reason.as_deref().unwrap_or("skipped")
        );
        return;
    }

    let board = result.config.board.as_deref().unwrap_or("(none)");
    match &result.layout {
        Some(layout) if layout.kind != "unknown" => {
            println!("  Board: {} -> {} ({})", board, layout.display_name, layout.kind);
        }
        _ => {
            println!("  Board: {}", board);
            println!("  No layout available");
        }
    }
    if let Some(mode) = &result.config.psram_mode {
        println!("  PSRAM: {}", mode);
    }

    let gpios: Vec<String> = result
        .config
        .used_pins
        .keys()
        .map(|g| format!("GPIO{}", g))
        .collect();
    if gpios.is_empty() {
        println!("  No pins used");
    } else {
        println!("  Pins used: {}", gpios.join(", "));
    }

    for (severity, title) in [
        (Severity::Danger, "DANGER"),
        (Severity::Warn, "WARN"),
        (Severity::Info, "INFO"),
    ] {
        let findings: Vec<&Finding> = result
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .collect();
        if findings.is_empty() {
            continue;
        }
        println!("\n  {}:", title);
        for finding in findings {
            match finding.line {
                Some(line) => println!("    - {} (line {})", finding.message, line),
                None => println!("    - {}", finding.message),
            }
            if let Some(ref comp) = finding.component {
                println!("      Component: {}", comp);
            }
        }
    }

    if !result.config.unresolved.is_empty() {
        println!("\n  UNRESOLVED:");
        for unresolved in &result.config.unresolved {
            println!(
                "    - line {}: {}: {}",
                unresolved.line, unresolved.key, unresolved.raw_value
            );
        }
    }

    println!("\n  Summary:");
    println!("    Danger:     {}", result.stats.danger);
    println!("    Warn:       {}", result.stats.warn);
    println!("    Info:       {}", result.stats.info);
    println!("    Unresolved: {}", result.stats.unresolved);
}

fn output_json(results: &[CheckResult]) {
    let output = serde_json::json!({
        "results": results,
        "summary": {
            "totalFiles": results.len(),
            "configs": results.iter().filter(|r| r.is_config()).count(),
            "totalFindings": results.iter().map(|r| r.total_findings()).sum::<usize>(),
            "danger": results.iter().map(|r| r.stats.danger).sum::<usize>(),
            "warn": results.iter().map(|r| r.stats.warn).sum::<usize>(),
            "info": results.iter().map(|r| r.stats.info).sum::<usize>(),
        }
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to encode results: {}", e),
    }
}

fn severity_to_github(finding: &Finding) -> &'static str {
    match finding.severity {
        Severity::Danger => "error",
        Severity::Warn => "warning",
        Severity::Info => "notice",
    }
}

fn output_github(results: &[CheckResult]) {
    for result in results {
        for finding in &result.findings {
            let level = severity_to_github(finding);
            let location = match finding.line {
                Some(line) => format!("file={},line={}", result.file, line),
                None => format!("file={}", result.file),
            };
            println!(
                "::{} {}::{}",
                level,
                location,
                finding.message.replace('\n', " ")
            );
        }
    }
}

fn severity_to_gitlab(finding: &Finding) -> &'static str {
    match finding.severity {
        Severity::Danger => "critical",
        Severity::Warn => "major",
        Severity::Info => "info",
    }
}

fn output_gitlab(results: &[CheckResult]) {
    let mut reports = Vec::new();
    for result in results {
        for finding in &result.findings {
            reports.push(serde_json::json!({
                "description": finding.message,
                "check_name": finding.rule_id,
                "severity": severity_to_gitlab(finding),
                "location": {
                    "path": result.file,
                    "lines": { "begin": finding.line.unwrap_or(1) },
                }
            }));
        }
    }
    match serde_json::to_string_pretty(&reports) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to encode report: {}", e),
    }
}

async fn handle_boards(pinouts: PinoutSourceConfig, verbose: bool) -> Result<i32> {
    let source = pinouts.build().context("Failed to open pinout source")?;
    let resolver = PinoutResolver::new(source);
    let index = resolver
        .index()
        .await
        .with_context(|| format!("Failed to load index from {}", resolver.source().describe()))?;

    println!("Pinouts from {}\n", resolver.source().describe());

    println!("Boards:");
    for (id, rel_path) in &index.boards {
        println!("  {}", id);
        if verbose {
            match resolver.definition(rel_path).await {
                Ok(def) => println!(
                    "    {} ({}, {} GPIOs, {} rules)",
                    def.display_name(),
                    def.kind(),
                    def.available_gpios().len(),
                    def.pin_issues().len()
                ),
                Err(e) => println!("    unavailable: {}", e),
            }
        }
    }

    println!("\nBoards mapped to a SoC grid:");
    for (id, alias) in &index.board_soc_aliases {
        println!("  {} -> {}", id, alias.soc);
        if verbose {
            println!(
                "    {} ({} board rules)",
                alias.display_name,
                alias.pin_issues.len()
            );
        }
    }

    println!("\nSoC grids:");
    for (id, rel_path) in &index.soc {
        println!("  {}", id);
        if verbose {
            if let Ok(def) = resolver.definition(rel_path).await {
                println!(
                    "    {} ({} GPIOs, {} rules)",
                    def.display_name(),
                    def.available_gpios().len(),
                    def.pin_issues().len()
                );
            }
        }
    }

    println!("\nAliases:");
    for (alt, target) in &index.aliases {
        println!("  {} -> {}", alt, target);
    }

    Ok(0)
}

fn load_catalog(dir: Option<&Path>) -> Result<Catalog> {
    match dir {
        Some(dir) => Catalog::from_directory(dir)
            .with_context(|| format!("Failed to load catalog from {}", dir.display())),
        None => Catalog::builtin().context("Failed to load built-in catalog"),
    }
}

fn handle_pinouts(action: PinoutsAction) -> Result<i32> {
    match action {
        PinoutsAction::Build { out, catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let tree = render_tree(&catalog, chrono::Utc::now())?;
            let written = write_tree(&tree, &out)
                .with_context(|| format!("Failed to write pinout tree to {}", out.display()))?;
            println!("Wrote {} files to {}", written.len(), out.display());
            Ok(0)
        }
        PinoutsAction::Check { root, catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let tree = verify_tree(&catalog, &root)
                .with_context(|| format!("Pinout tree at {} failed verification", root.display()))?;
            println!(
                "Pinout tree at {} is up to date ({} files)",
                root.display(),
                tree.managed_files().len()
            );
            Ok(0)
        }
    }
}

async fn handle_watch(path: &Path, pinouts: PinoutSourceConfig, debounce: Duration) -> Result<i32> {
    let options = CheckOptions {
        pinouts,
        ..CheckOptions::default()
    };
    let resolver = options.resolver().context("Failed to open pinout source")?;

    let files = if path.is_dir() {
        discover_config_files(path)?
    } else {
        vec![path.to_path_buf()]
    };
    let mut initial = Vec::with_capacity(files.len());
    for file in &files {
        let result = PinGuardCore::check_path(file, &resolver)
            .await
            .with_context(|| format!("Failed to check {}", file.display()))?;
        if result.is_config() {
            initial.push(result);
        }
    }
    output_human(&initial);

    let session = Session::with_debounce(Arc::clone(&resolver), debounce);
    let mut analyses = session.subscribe();

    let mut watcher = ConfigWatcher::new(Duration::from_millis(100));
    watcher.watch(path)?;
    let mut events = watcher.subscribe();
    println!("\nWatching {} (Ctrl+C to stop)", path.display());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(WatchEvent::Changed(file)) => match tokio::fs::read_to_string(&file).await {
                    Ok(text) => session.schedule(DocumentId::from(file.as_path()), text),
                    Err(e) => tracing::warn!("cannot read {}: {}", file.display(), e),
                },
                Ok(WatchEvent::Removed(file)) => {
                    session.cancel(&DocumentId::from(file.as_path()));
                    println!("\nRemoved: {}", file.display());
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("dropped {} watch events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            analysis = analyses.recv() => {
                if let Ok(analysis) = analysis {
                    if analysis.result.is_config() {
                        print_human(&analysis.result);
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher.unwatch();
    Ok(0)
}
