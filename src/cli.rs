use crate::config::AppConfig;
use crate::orchestrator::Controller;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "opossum-web",
    version,
    about = "Web front-end for the oPOSSUM sequence-based TFBS cluster analyses"
)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory where job directories are created
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// Directory holding session state files
    #[arg(long, global = true)]
    pub session_dir: Option<PathBuf>,

    /// Directory with template overrides (<name>.html)
    #[arg(long, global = true)]
    pub templates_dir: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the standalone HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Handle a single CGI request from the environment and stdin
    Cgi,
    /// Remove stale job directories and session files, then exit
    Sweep {
        /// Override the configured maximum age (e.g. "12h", "3days")
        #[arg(long)]
        max_age: Option<humantime::Duration>,
    },
    /// Print the effective configuration as JSON
    CheckConfig,
}

impl Cli {
    pub fn is_cgi(&self) -> bool {
        matches!(self.command, Command::Cgi)
    }
}

/// Build an `AppConfig` from the config file and CLI overrides.
pub fn build_config(args: &Cli) -> Result<AppConfig> {
    let mut cfg = AppConfig::load(args.config.as_deref())?;
    if let Some(p) = &args.results_dir {
        cfg.results_dir = p.clone();
    }
    if let Some(p) = &args.session_dir {
        cfg.session_dir = p.clone();
    }
    if let Some(p) = &args.templates_dir {
        cfg.templates_dir = Some(p.clone());
    }
    if let Some(p) = &args.log_dir {
        cfg.log_dir = p.clone();
    }
    Ok(cfg)
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;

    if let Command::CheckConfig = args.command {
        let out = serde_json::to_string_pretty(&cfg)?;
        println!("{out}");
        return Ok(());
    }

    crate::logging::init(&cfg);
    cfg.ensure_dirs()?;

    match args.command {
        Command::Serve { bind } => {
            let app = Arc::new(Controller::new(cfg, Handle::current()));
            info!(
                results = %app.config().results_dir.display(),
                sessions = %app.config().session_dir.display(),
                "starting server"
            );
            crate::server::serve(app, &bind).await
        }
        Command::Cgi => {
            let app = Controller::new(cfg, Handle::current());
            tokio::task::spawn_blocking(move || crate::server::run_cgi(&app))
                .await
                .context("CGI handler panicked")?
        }
        Command::Sweep { max_age } => {
            let mut cfg = cfg;
            if let Some(age) = max_age {
                cfg.sweep_max_age = Duration::from(age);
            }
            let report = crate::sweep::sweep(&cfg);
            info!(removed = report.removed, failed = report.failed, "sweep finished");
            eprintln!("Removed {} stale entries ({} failed)", report.removed, report.failed);
            Ok(())
        }
        Command::CheckConfig => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Cli::try_parse_from([
            "opossum-web",
            "--results-dir",
            "/srv/results",
            "sweep",
            "--max-age",
            "12h",
        ])
        .unwrap();
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.results_dir, PathBuf::from("/srv/results"));
        match args.command {
            Command::Sweep { max_age } => {
                assert_eq!(max_age.map(Duration::from), Some(Duration::from_secs(12 * 3600)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_serve_default_bind() {
        let args = Cli::try_parse_from(["opossum-web", "serve"]).unwrap();
        assert!(!args.is_cgi());
        assert!(matches!(args.command, Command::Serve { ref bind } if bind == "127.0.0.1:8080"));
    }
}
