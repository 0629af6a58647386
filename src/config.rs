//! Deployment configuration.
//!
//! Defaults live here; a JSON file given with `--config` overrides them and
//! CLI flags override both. The `USER` environment variable picks the log file
//! and marks a "devel" deployment.

use crate::model::Analysis;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "opossum-web";
const DEVEL_USER: &str = "devel";

/// Initial values shown on the input forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDefaults {
    pub threshold: f64,
    pub min_ic: f64,
    pub num_results: u32,
    pub zscore_cutoff: f64,
    pub fisher_cutoff: f64,
    pub site_dist: u32,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            threshold: 85.0,
            min_ic: 8.0,
            num_results: 20,
            zscore_cutoff: 10.0,
            fisher_cutoff: 0.01,
            site_dist: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Job directories are created here, one per submission.
    pub results_dir: PathBuf,
    pub session_dir: PathBuf,
    /// Overrides for the built-in templates (`<name>.html`).
    pub templates_dir: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub tca_script: PathBuf,
    pub actca_script: PathBuf,
    /// Public URL under which job directories are served, if any.
    pub results_url: Option<String>,
    pub collections: Vec<String>,
    pub tax_groups: Vec<String>,
    pub tf_families: Vec<String>,
    /// Pre-shipped background sequence sets, by display name.
    pub bg_seq_sets: BTreeMap<String, PathBuf>,
    /// Largest inter-binding distance (bp) accepted for anchored analyses.
    pub max_site_dist: u32,
    pub defaults: FormDefaults,
    #[serde(with = "humantime_serde")]
    pub sweep_max_age: Duration,
    #[serde(skip)]
    pub user: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);
        Self {
            results_dir: base.join("results"),
            session_dir: base.join("sessions"),
            templates_dir: None,
            log_dir: base.join("logs"),
            tca_script: PathBuf::from("opossum_seq_tca.pl"),
            actca_script: PathBuf::from("opossum_seq_actca.pl"),
            results_url: None,
            collections: vec!["CORE".into(), "PBM".into(), "PENDING".into()],
            tax_groups: vec![
                "vertebrates".into(),
                "insects".into(),
                "nematodes".into(),
                "plants".into(),
                "fungi".into(),
                "urochordates".into(),
            ],
            tf_families: Vec::new(),
            bg_seq_sets: BTreeMap::new(),
            max_site_dist: 100,
            defaults: FormDefaults::default(),
            sweep_max_age: Duration::from_secs(3 * 24 * 60 * 60),
            user: None,
        }
    }
}

impl AppConfig {
    /// Load the configuration file if one is given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("read config file {}", p.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parse config file {}", p.display()))?
            }
            None => AppConfig::default(),
        };
        Ok(cfg.with_user(std::env::var("USER").ok()))
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn is_devel(&self) -> bool {
        self.user.as_deref() == Some(DEVEL_USER)
    }

    /// Log file for the current deployment user.
    pub fn log_file(&self) -> PathBuf {
        let user = self.user.as_deref().unwrap_or("default");
        self.log_dir.join(format!("opossum_seq_web.{user}.log"))
    }

    pub fn script_for(&self, analysis: Analysis) -> &Path {
        match analysis {
            Analysis::Tca => &self.tca_script,
            Analysis::Actca => &self.actca_script,
        }
    }

    /// Create the results and session directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.results_dir, &self.session_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create directory {}", dir.display()))?;
        }
        Ok(())
    }
}
