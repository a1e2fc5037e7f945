//! pdf-ws-ctl - Run and inspect PDF generation jobs against a storage root.

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_ws_core::job::{FAIL_FILE, create_store};
use pdf_ws_core::{
    AppConfig, JobParams, JobStateStore, JobStatus, Submission, WorkspacePath, job_status,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "pdf-ws-ctl")]
#[command(author, version, about = "Run and inspect PDF generation jobs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, env = "PDFWS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Storage root for job workspaces
    #[arg(long, env = "PDFWS_STORAGE_ROOT", global = true)]
    storage_root: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a PDF and wait for it to finish
    Generate {
        #[command(flatten)]
        job: JobArgs,

        /// Comma-separated page ids to include (requires --token)
        #[arg(long)]
        pages: Option<String>,
    },
    /// Print the status of a job
    Status {
        #[command(flatten)]
        job: JobArgs,
    },
    /// Delete a job workspace
    Delete {
        #[command(flatten)]
        job: JobArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct JobArgs {
    /// Object identifier
    pid: String,

    /// Restrict to one unit of the object
    #[arg(long)]
    unit: Option<String>,

    /// Workspace token handed back by an earlier request
    #[arg(long)]
    token: Option<String>,
}

impl JobArgs {
    fn params(self, pages: Option<String>) -> (String, JobParams) {
        let params = JobParams {
            unit: self.unit,
            pages,
            token: self.token,
            embed: Some("1".to_string()),
        };
        (self.pid, params)
    }
}

/// Numeric value of a `"<n>%"` progress marker.
fn parse_percent(text: &str) -> Option<u64> {
    text.trim().trim_end_matches('%').parse().ok()
}

async fn generate(config: &AppConfig, job: JobArgs, pages: Option<String>) -> Result<()> {
    let controller = pdf_ws_core::build_controller(config)
        .context("Failed to initialize job controller")?;
    let (pid, params) = job.params(pages);

    let outcome = controller
        .generate(&pid, &params)
        .await
        .with_context(|| format!("Failed to submit {pid}"))?;
    if outcome.submission == Submission::AlreadySubmitted {
        info!("Job for {} was already submitted; following it", outcome.workspace);
    }

    let pb = ProgressBar::new(100);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(pid.clone());

    let store = controller.store();
    let ready = loop {
        match job_status(store.as_ref(), &outcome.workspace).await {
            JobStatus::Ready => break true,
            JobStatus::Failed => break false,
            JobStatus::Progress(text) => {
                if let Some(pct) = parse_percent(&text) {
                    pb.set_position(pct);
                }
            }
            JobStatus::Processing => {}
            JobStatus::NotFound => {
                pb.abandon();
                bail!("Workspace {} disappeared", outcome.workspace);
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    // Let the assembler finish its own cleanup before exiting
    controller.wait_idle().await;

    let dir = store.workspace_dir(&outcome.workspace);
    if !ready {
        pb.abandon_with_message("failed");
        bail!(
            "PDF generation failed; see {}",
            dir.join(FAIL_FILE).display()
        );
    }

    pb.finish_with_message("done");
    let output = finished_output(store.as_ref(), &outcome.workspace).await?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("PDF saved to: {}", output.display());
    }

    Ok(())
}

/// Path of the finished PDF recorded for a workspace.
async fn finished_output(store: &dyn JobStateStore, ws: &WorkspacePath) -> Result<PathBuf> {
    store.read_output(ws).await.with_context(|| {
        format!(
            "No output recorded in {}",
            store.workspace_dir(ws).display()
        )
    })
}

async fn status(config: &AppConfig, job: JobArgs) -> Result<()> {
    let store = create_store(&config.storage);
    let (pid, params) = job.params(None);
    let ws = params.workspace(&pid)?;

    let status = job_status(store.as_ref(), &ws).await;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("{}: {}", ws, status.as_str());
    }

    Ok(())
}

async fn delete(config: &AppConfig, job: JobArgs) -> Result<()> {
    let store = create_store(&config.storage);
    let (pid, params) = job.params(None);
    let ws = params.workspace(&pid)?;

    store
        .remove(&ws, config.cleanup.delete_policy())
        .await
        .with_context(|| format!("Failed to delete {ws}"))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("DELETED {ws}");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let mut config = if let Some(path) = &args.config {
        AppConfig::from_file(path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };
    if let Some(root) = args.storage_root {
        config.storage.root = Some(root);
    }
    if config.storage.root.is_none() {
        bail!("No storage root configured (use --storage-root or PDFWS_STORAGE_ROOT)");
    }

    match args.command {
        Command::Generate { job, pages } => generate(&config, job, pages).await,
        Command::Status { job } => status(&config, job).await,
        Command::Delete { job } => delete(&config, job).await,
    }
}
