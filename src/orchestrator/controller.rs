//! Request controller.
//!
//! Owns the flow of one request: load or create the session, dispatch the run
//! mode, save the session and sweep stale files on the way out.

use super::{pages, submit};
use crate::config::AppConfig;
use crate::form::FormData;
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::model::{Analysis, SessionState};
use crate::sequences::SequenceError;
use crate::session::SessionStore;
use crate::sweep;
use crate::template::{TemplateRenderer, Vars};
use crate::validate::validate;
use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

/// Why a run mode did not produce its page.
enum Failure {
    /// Shown to the user on the error page.
    Rejected(Vec<String>),
    /// Aborts the request with a 500.
    Fatal(anyhow::Error),
}

pub(crate) struct Controller {
    cfg: AppConfig,
    sessions: SessionStore,
    renderer: TemplateRenderer,
    runtime: Handle,
}

impl Controller {
    pub(crate) fn new(cfg: AppConfig, runtime: Handle) -> Self {
        let sessions = SessionStore::new(cfg.session_dir.clone());
        let renderer = TemplateRenderer::new(cfg.templates_dir.clone());
        Self {
            cfg,
            sessions,
            renderer,
            runtime,
        }
    }

    pub(crate) fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub(crate) fn handle(&self, req: &HttpRequest) -> HttpResponse {
        debug!(method = ?req.method, path = %req.path, "request");
        if req.path == "/" {
            return HttpResponse::redirect("/actca");
        }
        let Some(analysis) = Analysis::from_path(&req.path) else {
            return HttpResponse::not_found();
        };
        if req.method == Method::Other {
            return HttpResponse::method_not_allowed();
        }

        let (form, form_error) =
            match FormData::from_request(req.query.as_deref(), req.content_type.as_deref(), &req.body) {
                Ok(f) => (f, None),
                Err(e) => (FormData::new(), Some(e)),
            };

        let mut session = self
            .sessions
            .load_or_create(form.get_nonempty("sid"), analysis);
        session.errors.clear();
        session.warnings.clear();

        let outcome = match form_error {
            Some(e) => {
                warn!("undecodable form: {e}");
                Err(Failure::Rejected(vec![format!(
                    "Could not read the submitted form: {e}"
                )]))
            }
            None => self.dispatch(&form, analysis, &mut session),
        };

        let response = match outcome {
            Ok(html) => HttpResponse::html(html),
            Err(Failure::Rejected(errors)) => {
                session.errors = errors;
                match self.render_page("error", &session, Vars::new()) {
                    Ok(html) => HttpResponse::html(html),
                    Err(e) => fatal(e),
                }
            }
            Err(Failure::Fatal(e)) => fatal(e),
        };

        if let Err(e) = self.sessions.save(&session) {
            warn!("could not save session {}: {e:#}", session.sid);
        }
        sweep::sweep(&self.cfg);
        response
    }

    fn dispatch(
        &self,
        form: &FormData,
        analysis: Analysis,
        session: &mut SessionState,
    ) -> Result<String, Failure> {
        match form.get_nonempty("rm").unwrap_or("input") {
            "input" => self
                .render_page("input", session, pages::input_vars(&self.cfg, analysis))
                .map_err(Failure::Fatal),
            "process" => self.process(form, analysis, session),
            other => Err(Failure::Rejected(vec![format!("Unknown run mode '{other}'")])),
        }
    }

    fn process(
        &self,
        form: &FormData,
        analysis: Analysis,
        session: &mut SessionState,
    ) -> Result<String, Failure> {
        let request = validate(form, analysis, &self.cfg).map_err(|errors| {
            warn!(sid = %session.sid, "submission rejected: {}", errors.join("; "));
            Failure::Rejected(errors)
        })?;

        let job = submit::submit_job(&self.cfg, &request, &self.runtime).map_err(|e| {
            error!(sid = %session.sid, "submission failed: {e:#}");
            let message = match e.downcast_ref::<SequenceError>() {
                Some(seq) => seq.to_string(),
                None => format!("Could not start the analysis: {e}"),
            };
            Failure::Rejected(vec![message])
        })?;

        session.last_job_id = Some(job.job_id.clone());
        self.render_page(
            "submitted",
            session,
            pages::submitted_vars(&self.cfg, &request, &job),
        )
        .map_err(Failure::Fatal)
    }

    fn render_page(&self, name: &str, session: &SessionState, extra: Vars) -> Result<String> {
        let mut vars = pages::session_vars(&self.cfg, session);
        vars.extend(extra);
        self.renderer
            .render(name, &vars)
            .with_context(|| format!("render template '{name}'"))
    }
}

fn fatal(e: anyhow::Error) -> HttpResponse {
    error!("{e:#}");
    HttpResponse::internal_error("Internal server error")
}
