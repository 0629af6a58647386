//! Submission processing.
//!
//! Turns a validated request into a running analysis: job directory, sequence
//! files, command line, detached launch. A failure part-way removes the job
//! directory again so nothing half-prepared is left behind.

use crate::config::AppConfig;
use crate::launcher::{self, JobPaths, LaunchedJob};
use crate::model::JobRequest;
use crate::sequences::{write_sequences, SeqRole};
use anyhow::Result;
use std::path::Path;
use tokio::runtime::Handle;
use tracing::{info, warn};

pub(crate) fn submit_job(cfg: &AppConfig, req: &JobRequest, runtime: &Handle) -> Result<LaunchedJob> {
    let (job_id, job_dir) = launcher::create_job_dir(&cfg.results_dir, req.analysis)?;

    match prepare_and_launch(cfg, req, runtime, &job_id, &job_dir) {
        Ok(pid) => {
            let job = LaunchedJob {
                job_id,
                job_dir,
                pid,
            };
            info!(
                job_id = %job.job_id,
                dir = %job.job_dir.display(),
                pid = ?job.pid,
                analysis = req.analysis.as_str(),
                target = req.target.method_name(),
                background = req.background.method_name(),
                "job submitted"
            );
            Ok(job)
        }
        Err(e) => {
            if let Err(rm) = std::fs::remove_dir_all(&job_dir) {
                warn!(dir = %job_dir.display(), "could not remove failed job directory: {rm}");
            }
            Err(e)
        }
    }
}

fn prepare_and_launch(
    cfg: &AppConfig,
    req: &JobRequest,
    runtime: &Handle,
    job_id: &str,
    job_dir: &Path,
) -> Result<Option<u32>> {
    let t_seq_file = write_sequences(SeqRole::Target, &req.target, &cfg.bg_seq_sets, job_dir)?;
    let bg_seq_file =
        write_sequences(SeqRole::Background, &req.background, &cfg.bg_seq_sets, job_dir)?;

    let paths = JobPaths {
        job_id: job_id.to_string(),
        job_dir: job_dir.to_path_buf(),
        t_seq_file,
        bg_seq_file,
    };
    let cmd = launcher::build_command(cfg.script_for(req.analysis), req, &paths);
    launcher::launch(&cmd, job_dir, runtime)
}
