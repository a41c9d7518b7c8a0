//! Run FX conversion and rolling stdev jobs described by a JSON file.
//!
//! Usage: `ratevol [job.json]` (defaults to `ratevol.json`).

use anyhow::{anyhow, Context, Result};
use ratevol_pipeline::{failure_kind, init_logging, run_job, JobConfig, LogConfig};
use tracing::{error, info};

const DEFAULT_JOB_PATH: &str = "ratevol.json";

fn main() -> Result<()> {
    init_logging(&LogConfig::from_env()).map_err(|e| anyhow!(e))?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_JOB_PATH.to_string());
    let job = JobConfig::from_json_file(&path)
        .with_context(|| format!("reading job description {}", path))?;

    info!(path = %path, "Starting ratevol");
    if let Err(err) = run_job(&job) {
        error!(kind = failure_kind(&err), "{:#}", err);
        return Err(err);
    }
    Ok(())
}
