//! Job launcher: job directories, analysis command lines and detached launches.

use crate::model::{Analysis, ClusterFilter, JobRequest, ResultSelection, SeqSource};
use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub const JOB_LOG: &str = "job.log";

/// Program plus argument vector for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl AnalysisCommand {
    /// Shell-quoted rendering for logs.
    pub fn to_shell_string(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|a| shell_quote(&a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Files of a job that exist before the analysis starts.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub job_id: String,
    pub job_dir: PathBuf,
    pub t_seq_file: PathBuf,
    pub bg_seq_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LaunchedJob {
    pub job_id: String,
    pub job_dir: PathBuf,
    pub pid: Option<u32>,
}

/// Create a fresh, empty job directory under `results_dir`.
/// Returns the directory name (the job id) and its path.
pub fn create_job_dir(results_dir: &Path, analysis: Analysis) -> Result<(String, PathBuf)> {
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;
    let dir = tempfile::Builder::new()
        .prefix(analysis.job_prefix())
        .rand_bytes(8)
        .tempdir_in(results_dir)
        .with_context(|| format!("create job directory in {}", results_dir.display()))?
        .keep();
    let job_id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("job directory has no name")?;
    Ok((job_id, dir))
}

/// Build the analysis command line. Optional parameters the user left out get no flag.
pub fn build_command(program: &Path, req: &JobRequest, paths: &JobPaths) -> AnalysisCommand {
    let mut args: Vec<String> = Vec::new();
    let mut flag = |name: &str, value: String| {
        args.push(name.to_string());
        args.push(value);
    };

    flag("-j", paths.job_id.clone());
    flag("-d", paths.job_dir.display().to_string());
    flag("-s", paths.t_seq_file.display().to_string());
    flag("-b", paths.bg_seq_file.display().to_string());

    if let SeqSource::Uploaded { filename, .. } = &req.target {
        flag("-tsf", filename.clone());
    }
    match &req.background {
        SeqSource::Uploaded { filename, .. } => flag("-bsf", filename.clone()),
        SeqSource::DefaultSet(name) => flag("-bss", name.clone()),
        SeqSource::Pasted(_) => {}
    }

    for c in &req.collections {
        flag("-co", c.clone());
    }
    for t in &req.tax_groups {
        flag("-tax", t.clone());
    }
    if let Some(ic) = req.min_ic {
        flag("-ic", ic.to_string());
    }
    if let ClusterFilter::Families(families) = &req.cluster_filter {
        for f in families {
            flag("-fam", f.clone());
        }
    }
    flag("-th", format!("{}%", req.threshold));

    if req.analysis.is_anchored() {
        if let Some(anchor) = &req.anchor_tf {
            flag("-a", anchor.clone());
        }
        if let Some(dist) = req.max_site_dist {
            flag("-dist", dist.to_string());
        }
    }

    match &req.selection {
        Some(ResultSelection::TopN(n)) => flag("-n", n.to_string()),
        Some(ResultSelection::Significant {
            zscore_cutoff,
            fisher_cutoff,
        }) => {
            if let Some(z) = zscore_cutoff {
                flag("-zcutoff", z.to_string());
            }
            if let Some(f) = fisher_cutoff {
                flag("-fcutoff", f.to_string());
            }
        }
        None => {}
    }
    if let Some(sort) = req.sort_by {
        flag("-sr", sort.as_str().to_string());
    }
    flag("-m", req.email.clone());
    args.push("-web".to_string());

    AnalysisCommand {
        program: program.to_path_buf(),
        args,
    }
}

/// Start the analysis detached from the request. Output goes to `job.log` in
/// the job directory; the exit status is only ever logged.
pub fn launch(cmd: &AnalysisCommand, job_dir: &Path, runtime: &Handle) -> Result<Option<u32>> {
    let log_path = job_dir.join(JOB_LOG);
    let log = File::create(&log_path)
        .with_context(|| format!("create job log {}", log_path.display()))?;
    let log_err = log.try_clone().context("duplicate job log handle")?;

    let mut command = std::process::Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .current_dir(job_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    // Own process group, so the web server's signals don't reach the analysis.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let _guard = runtime.enter();
    let mut child = tokio::process::Command::from(command)
        .spawn()
        .with_context(|| format!("launch {}", cmd.program.display()))?;
    let pid = child.id();
    info!(pid, command = %cmd.to_shell_string(), "launched analysis");

    let job = job_dir.display().to_string();
    runtime.spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(%job, %status, "analysis exited"),
            Err(e) => warn!(%job, "waiting on analysis failed: {e}"),
        }
    });
    Ok(pid)
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./%@,:=+".contains(&b));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r#"'\''"#))
    }
}
