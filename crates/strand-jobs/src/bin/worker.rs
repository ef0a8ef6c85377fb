//! strand-worker: command-line driver for a file-backed job queue.
//!
//! Useful for inspecting and draining the on-disk queue outside the app.
//! Every job type is served by a no-op processor, so `run` exercises the
//! queue mechanics without doing real generation work.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use strand_db::FileJobStore;
use strand_jobs::{
    EnqueueOptions, JobScheduler, JobStatus, JobType, NoOpProcessor, SchedulerBuilder,
    SchedulerConfig, WithTimeout,
};

#[derive(Parser)]
#[command(name = "strand-worker")]
#[command(author, version, about = "Inspect and drain the strand job queue")]
#[command(propagate_version = true)]
struct Cli {
    /// Job store directory (default: $JOB_STORE_DIR or .strand/jobs)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a job to the queue
    Enqueue {
        /// Job type, e.g. flashcard-generation
        job_type: JobType,

        /// JSON payload
        #[arg(default_value = "{}")]
        payload: String,

        /// Enqueue even if an identical job is already active
        #[arg(long)]
        allow_duplicates: bool,
    },

    /// List stored jobs, newest first
    List {
        /// Only show jobs with this status
        #[arg(short, long)]
        status: Option<JobStatus>,
    },

    /// Process every pending job, printing events as JSON lines
    Run {
        /// Per-job deadline in seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },

    /// Cancel a pending job
    Cancel { job_id: String },

    /// Delete every completed, failed or cancelled job
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // RUST_LOG - standard env filter (default: "strand_jobs=info")
    // LOG_FORMAT - "json" or "text" (default: "text")
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "strand_jobs=info,strand_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();

    let store = match cli.dir {
        Some(dir) => FileJobStore::open(dir).await,
        None => FileJobStore::from_env().await,
    }
    .context("Failed to open job store")?;
    info!(dir = %store.dir().display(), "Job store opened");

    let timeout = match cli.command {
        Commands::Run { timeout_secs } => Duration::from_secs(timeout_secs),
        _ => Duration::from_secs(300),
    };
    let scheduler = build_scheduler(store, timeout);
    scheduler
        .restore()
        .await
        .context("Failed to restore jobs")?;

    match cli.command {
        Commands::Enqueue {
            job_type,
            payload,
            allow_duplicates,
        } => {
            let payload = serde_json::from_str(&payload).context("Payload is not valid JSON")?;
            let options = EnqueueOptions { allow_duplicates };
            match scheduler.enqueue(job_type, payload, options).await {
                Some(job_id) => println!("{job_id}"),
                None => anyhow::bail!("An identical {job_type} job is already queued"),
            }
        }
        Commands::List { status } => {
            let jobs = match status {
                Some(status) => scheduler.get_jobs_by_status(&[status]),
                None => scheduler.get_jobs(),
            };
            for job in jobs {
                println!("{}", serde_json::to_string(&job)?);
            }
        }
        Commands::Run { .. } => {
            if !scheduler.config().enabled {
                anyhow::bail!("Job processing is disabled (JOB_SCHEDULER_ENABLED)");
            }
            let _events = scheduler.subscribe(|event| {
                if let Ok(line) = serde_json::to_string(event) {
                    println!("{line}");
                }
            });
            info!(
                job_types = ?scheduler.registry().registered_types(),
                "Draining queue with no-op processors"
            );
            scheduler.start_processing()?;
            while scheduler.queue_stats().active() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            scheduler.stop_processing();
            eprintln!("{}", serde_json::to_string(&scheduler.queue_stats())?);
        }
        Commands::Cancel { job_id } => {
            if !scheduler.cancel(&job_id).await {
                anyhow::bail!("Job {job_id} is unknown or already finished");
            }
        }
        Commands::Clear => {
            let removed = scheduler.clear_terminal_jobs().await;
            println!("{removed}");
        }
    }

    Ok(())
}

fn build_scheduler(store: FileJobStore, timeout: Duration) -> JobScheduler {
    let builder = SchedulerBuilder::new()
        .with_config(SchedulerConfig::from_env())
        .with_persistence(Arc::new(store));
    JobType::ALL
        .into_iter()
        .fold(builder, |builder, job_type| {
            builder.with_processor(job_type, WithTimeout::new(NoOpProcessor, timeout))
        })
        .build()
}
