use crate::config::AppConfig;
use crate::model::Analysis;
use crate::session::SESSION_PREFIX;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

impl SweepReport {
    fn merge(self, other: SweepReport) -> SweepReport {
        SweepReport {
            removed: self.removed + other.removed,
            failed: self.failed + other.failed,
        }
    }
}

/// Remove entries of `dir` whose name passes `owned` and whose last
/// modification is older than `max_age` relative to `now`.
pub fn sweep_dir(
    dir: &Path,
    max_age: Duration,
    now: SystemTime,
    owned: impl Fn(&str) -> bool,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !owned(name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }

        let path = entry.path();
        let res = if meta.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match res {
            Ok(()) => {
                debug!(path = %path.display(), "removed stale entry");
                report.removed += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), "could not remove stale entry: {e}");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

fn is_job_dir(name: &str) -> bool {
    [Analysis::Tca, Analysis::Actca]
        .iter()
        .any(|a| name.starts_with(a.job_prefix()))
}

fn is_session_file(name: &str) -> bool {
    name.starts_with(SESSION_PREFIX) && name.ends_with(".json")
}

/// Sweep the results and session directories. Failures are logged only.
pub fn sweep(cfg: &AppConfig) -> SweepReport {
    let now = SystemTime::now();
    let mut total = SweepReport::default();
    let targets: [(&Path, fn(&str) -> bool); 2] = [
        (cfg.results_dir.as_path(), is_job_dir),
        (cfg.session_dir.as_path(), is_session_file),
    ];
    for (dir, owned) in targets {
        match sweep_dir(dir, cfg.sweep_max_age, now, owned) {
            Ok(r) => total = total.merge(r),
            Err(e) => warn!("sweep failed: {e:#}"),
        }
    }
    if total.removed > 0 {
        debug!(removed = total.removed, failed = total.failed, "sweep finished");
    }
    total
}
