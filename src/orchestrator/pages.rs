//! Template variables for the rendered pages.

use crate::config::AppConfig;
use crate::launcher::LaunchedJob;
use crate::model::{Analysis, JobRequest, SessionState};
use crate::template::{Value, Vars};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

fn set(vars: &mut Vars, key: &str, value: impl Into<Value>) {
    vars.insert(key.to_string(), value.into());
}

/// Variables every page gets: session strings plus deployment info.
pub(crate) fn session_vars(cfg: &AppConfig, session: &SessionState) -> Vars {
    let mut vars = Vars::new();
    set(&mut vars, "title", session.title.as_str());
    set(&mut vars, "heading", session.heading.as_str());
    set(&mut vars, "bg_color_class", session.bg_color_class.as_str());
    set(&mut vars, "sid", session.sid.as_str());
    set(&mut vars, "analysis", session.analysis.as_str());
    set(&mut vars, "action", format!("/{}", session.analysis.as_str()));
    set(&mut vars, "errors", session.errors.clone());
    set(&mut vars, "warnings", session.warnings.clone());
    set(&mut vars, "devel", cfg.is_devel());
    set(&mut vars, "user", cfg.user.clone().unwrap_or_default());
    vars
}

pub(crate) fn input_vars(cfg: &AppConfig, analysis: Analysis) -> Vars {
    let d = &cfg.defaults;
    let mut vars = Vars::new();
    set(&mut vars, "anchored", analysis.is_anchored());
    set(&mut vars, "collections", cfg.collections.clone());
    set(&mut vars, "tax_groups", cfg.tax_groups.clone());
    set(&mut vars, "tf_families", cfg.tf_families.clone());
    set(
        &mut vars,
        "bg_seq_sets",
        cfg.bg_seq_sets.keys().cloned().collect::<Vec<_>>(),
    );
    set(&mut vars, "default_threshold", d.threshold.to_string());
    set(&mut vars, "default_min_ic", d.min_ic.to_string());
    set(&mut vars, "default_num_results", d.num_results.to_string());
    set(&mut vars, "default_zscore_cutoff", d.zscore_cutoff.to_string());
    set(&mut vars, "default_fisher_cutoff", d.fisher_cutoff.to_string());
    set(
        &mut vars,
        "default_site_dist",
        d.site_dist.min(cfg.max_site_dist).to_string(),
    );
    set(&mut vars, "max_site_dist", cfg.max_site_dist.to_string());
    vars
}

pub(crate) fn submitted_vars(cfg: &AppConfig, req: &JobRequest, job: &LaunchedJob) -> Vars {
    let mut vars = Vars::new();
    set(&mut vars, "job_id", job.job_id.as_str());
    set(&mut vars, "email", req.email.as_str());
    set(
        &mut vars,
        "submitted_utc",
        OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    );
    let results_url = cfg
        .results_url
        .as_deref()
        .map(|base| format!("{}/{}/", base.trim_end_matches('/'), job.job_id))
        .unwrap_or_default();
    set(&mut vars, "results_url", results_url);
    vars
}
