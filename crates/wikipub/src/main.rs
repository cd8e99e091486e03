use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wikipub_core::config::{WikiPubConfig, load_config};
use wikipub_core::executor::{SyncOutcome, SyncReport};
use wikipub_core::host::{HttpWikiHost, WikiHostConfig};
use wikipub_core::indexer::{self, ScanOptions};
use wikipub_core::mapper::{map_directory_structure, map_path};
use wikipub_core::orchestrator::{SyncOptions, WikiSyncOrchestrator};
use wikipub_core::status::read_status;
use wikipub_core::vcs::GitWikiRepository;

const DEFAULT_CONFIG_PATH: &str = "wikipub.toml";
const DEFAULT_STATE_DIR: &str = ".wikipub";

#[derive(Debug, Parser)]
#[command(
    name = "wikipub",
    version,
    about = "Publish a local markdown documentation tree to a project wiki"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "Override the documentation root")]
    docs_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "Directory for lock and status files")]
    state_dir: Option<PathBuf>,
    #[arg(long, global = true, value_name = "URL", help = "Override the wiki repository URL")]
    remote: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: Option<PathBuf>,
    docs_root: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    remote: Option<String>,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            docs_root: cli.docs_root.clone(),
            state_dir: cli.state_dir.clone(),
            remote: cli.remote.clone(),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run a full sync pass against the remote wiki")]
    Sync(SyncArgs),
    #[command(about = "Compute and print the plan without mutating anything")]
    Plan(PlanArgs),
    #[command(about = "Print the status artifact from the last pass")]
    Status(StatusArgs),
    #[command(about = "Show the page identifier mapping for the docs tree or one path")]
    Map(MapArgs),
}

#[derive(Debug, Args)]
struct SyncArgs {
    #[arg(long, help = "Compute the plan but do not write, commit, or push")]
    dry_run: bool,
    #[arg(long, help = "Emit the report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct PlanArgs {
    #[arg(long, help = "Emit the report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long, help = "Emit the artifact as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct MapArgs {
    #[arg(value_name = "RELATIVE_PATH", help = "Map one relative path instead of the whole tree")]
    path: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Sync(args)) => run_sync(&runtime, args.dry_run, args.json),
        Some(Commands::Plan(args)) => run_sync(&runtime, true, args.json),
        Some(Commands::Status(args)) => run_status(&runtime, args.json),
        Some(Commands::Map(args)) => run_map(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_sync(runtime: &RuntimeOptions, dry_run: bool, json: bool) -> Result<()> {
    let config = load_runtime_config(runtime)?;
    let mut options = SyncOptions::from_config(&config, dry_run);
    if let Some(docs_root) = &runtime.docs_root {
        options.document_root = docs_root.clone();
    }

    let api_url = config.api_url()?;
    let repository_url = match &runtime.remote {
        Some(url) => url.clone(),
        None => config.repository_url()?,
    };
    let host = HttpWikiHost::new(WikiHostConfig::new(&api_url, config.user_agent()))?;
    let repository = GitWikiRepository::new(&repository_url, config.branch());

    let mut orchestrator = WikiSyncOrchestrator::new(host, repository, runtime.state_dir());
    let report = orchestrator.sync(&options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.success {
        bail!("sync pass finished with outcome {:?}; retry with a fresh pass", report.outcome);
    }
    Ok(())
}

fn run_status(runtime: &RuntimeOptions, json: bool) -> Result<()> {
    let state_dir = runtime.state_dir();
    let Some(artifact) = read_status(&state_dir)? else {
        println!("status: <no pass recorded> ({})", state_dir.display());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
    } else {
        print!("{}", artifact.render_text());
        println!("updated_at_unix: {}", artifact.updated_at_unix);
    }
    Ok(())
}

fn run_map(runtime: &RuntimeOptions, args: MapArgs) -> Result<()> {
    if let Some(path) = args.path {
        let identifier = map_path(&path)?;
        println!("path: {path}");
        println!("identifier: {identifier}");
        return Ok(());
    }

    let config = load_runtime_config(runtime)?;
    let docs_root = runtime
        .docs_root
        .clone()
        .unwrap_or_else(|| PathBuf::from(config.docs_root()));
    let scan = indexer::scan(
        &docs_root,
        &ScanOptions {
            ignore_patterns: config.docs.ignore.clone(),
        },
    )?;
    let structure =
        map_directory_structure(scan.documents.iter().map(|doc| doc.relative_path.as_str()))?;

    println!("docs_root: {}", docs_root.display());
    println!("documents: {}", scan.documents.len());
    println!("directories: {}", structure.len());
    for (directory, pages) in &structure {
        let label = if directory.is_empty() { "<root>" } else { directory };
        println!("directory: {label}");
        for page in pages {
            println!("  page: {page}");
        }
    }
    for warning in &scan.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn load_runtime_config(runtime: &RuntimeOptions) -> Result<WikiPubConfig> {
    let path = runtime.config_path();
    load_config(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

fn print_report(report: &SyncReport) {
    println!("sync report");
    println!("outcome: {}", outcome_label(report.outcome));
    println!("dry_run: {}", report.dry_run);
    println!("added: {}", report.added);
    println!("updated: {}", report.updated);
    println!("deleted: {}", report.deleted);
    println!("unchanged: {}", report.unchanged);
    for page in &report.pages {
        match &page.detail {
            Some(detail) => println!("page: {} {} ({detail})", page.action, page.identifier),
            None => println!("page: {} {}", page.action, page.identifier),
        }
    }
    if !report.warnings.is_empty() {
        println!("warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
    if !report.errors.is_empty() {
        println!("errors:");
        for error in &report.errors {
            println!("  - [{}] {}: {}", error_kind_label(error.kind), error.identifier, error.detail);
        }
    }
}

fn outcome_label(outcome: SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Preview => "preview",
        SyncOutcome::NoChanges => "no-changes",
        SyncOutcome::Applied => "applied",
        SyncOutcome::PushFailed => "push-failed",
        SyncOutcome::PartialApplication => "partial-application",
    }
}

fn error_kind_label(kind: wikipub_core::error::ErrorKind) -> &'static str {
    match kind {
        wikipub_core::error::ErrorKind::InvalidPath => "invalid-path",
        wikipub_core::error::ErrorKind::MappingCollision => "mapping-collision",
        wikipub_core::error::ErrorKind::Filesystem => "filesystem",
        wikipub_core::error::ErrorKind::RemoteUnavailable => "remote-unavailable",
        wikipub_core::error::ErrorKind::Push => "push",
        wikipub_core::error::ErrorKind::PartialApplication => "partial-application",
        wikipub_core::error::ErrorKind::ConcurrentPass => "concurrent-pass",
        wikipub_core::error::ErrorKind::Config => "config",
    }
}
