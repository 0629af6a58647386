use crate::model::{Analysis, SessionState};
use anyhow::{Context, Result};
use rand::RngCore;
use std::io::Write;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

pub const SESSION_PREFIX: &str = "sess_";

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, sid: &str) -> PathBuf {
        self.dir.join(format!("{SESSION_PREFIX}{sid}.json"))
    }

    /// Start a fresh session with a new random id. Nothing is written yet.
    pub fn create(&self, analysis: Analysis) -> SessionState {
        let created = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        SessionState::new(generate_sid(), analysis, created)
    }

    /// Load a session by id. Unknown ids yield `Ok(None)`.
    pub fn load(&self, sid: &str) -> Result<Option<SessionState>> {
        if !is_valid_sid(sid) {
            return Ok(None);
        }
        let path = self.path_for(sid);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read session {}", path.display())),
        };
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("parse session {}", path.display()))?;
        Ok(Some(state))
    }

    /// Resume the session named by `sid`, or start a new one.
    pub fn load_or_create(&self, sid: Option<&str>, analysis: Analysis) -> SessionState {
        let Some(sid) = sid else {
            return self.create(analysis);
        };
        match self.load(sid) {
            Ok(Some(mut state)) => {
                debug!(sid, "resumed session");
                if state.analysis != analysis {
                    state.set_analysis(analysis);
                }
                state
            }
            Ok(None) => self.create(analysis),
            Err(e) => {
                warn!("{e:#}; starting a new session");
                self.create(analysis)
            }
        }
    }

    /// Persist a session; the file is replaced atomically.
    pub fn save(&self, state: &SessionState) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create session dir {}", self.dir.display()))?;
        let path = self.path_for(&state.sid);
        let json = serde_json::to_vec_pretty(state)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("create temp file in {}", self.dir.display()))?;
        tmp.write_all(&json)?;
        tmp.persist(&path)
            .with_context(|| format!("write session {}", path.display()))?;
        Ok(path)
    }
}

/// 128 random bits, hex encoded.
pub fn generate_sid() -> String {
    let mut b = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut b);
    b.iter().map(|x| format!("{x:02x}")).collect()
}

pub fn is_valid_sid(sid: &str) -> bool {
    sid.len() == 32 && sid.bytes().all(|b| b.is_ascii_hexdigit())
}
