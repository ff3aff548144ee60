//! Run command - drives a chain of simulated requests
//!
//! Each `--outcome` becomes one request that waits `--delay-ms` and then
//! succeeds or fails accordingly.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::domain::{ChainManager, ExecutionMode, RunSummary};
use crate::infrastructure::TaskRequest;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Execution mode: sequential_stop, sequential_continue or parallel
    /// (defaults to the configured mode)
    #[arg(long)]
    pub mode: Option<ExecutionMode>,

    /// Outcome of each simulated request, in chain order
    #[arg(
        long = "outcome",
        value_name = "BOOL",
        required = true,
        num_args = 1..,
        value_delimiter = ','
    )]
    pub outcomes: Vec<bool>,

    /// Simulated work duration of every request
    #[arg(long, default_value_t = 100)]
    pub delay_ms: u64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    #[serde(flatten)]
    summary: RunSummary,
    started: Vec<String>,
}

/// Run the chain; returns the aggregate success flag
pub async fn run(args: RunArgs) -> anyhow::Result<bool> {
    let config = super::init();
    let mode = args.mode.unwrap_or(config.chain.mode);

    let report = execute(&args, mode).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.summary.success == Some(true))
}

async fn execute(args: &RunArgs, mode: ExecutionMode) -> anyhow::Result<RunReport> {
    let started = Arc::new(Mutex::new(Vec::new()));
    let delay = Duration::from_millis(args.delay_ms);

    let mut manager = ChainManager::new().with_mode(mode);

    for (index, succeed) in args.outcomes.iter().copied().enumerate() {
        let name = format!("request-{}", index);
        manager.add_request(Arc::new(simulated_request(
            name,
            succeed,
            delay,
            started.clone(),
        )));
    }

    manager.add_chain_completion_subscriber(Arc::new(|success| {
        info!(success, "Chain completion reported");
    }));

    let run = manager.run_request_chain()?;
    run.wait().await?;

    let report = RunReport {
        summary: run.summary(),
        started: started.lock().clone(),
    };
    Ok(report)
}

fn simulated_request(
    name: String,
    succeed: bool,
    delay: Duration,
    started: Arc<Mutex<Vec<String>>>,
) -> TaskRequest<()> {
    let job_name = name.clone();

    TaskRequest::new(name, move || {
        let name = job_name.clone();
        let started = started.clone();
        async move {
            started.lock().push(name.clone());
            tokio::time::sleep(delay).await;

            if succeed {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{} failed (simulated)", name))
            }
        }
    })
}

fn print_report(report: &RunReport) {
    let summary = &report.summary;
    let result = match summary.success {
        Some(true) => "success",
        Some(false) => "failure",
        None => "pending",
    };

    println!("run:       {}", summary.run_id);
    println!("mode:      {}", summary.mode);
    println!("completed: {}/{}", summary.completed, summary.total);
    println!("started:   {}", report.started.join(", "));
    println!("result:    {}", result);
}
