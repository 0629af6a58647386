use serde::{Deserialize, Serialize};

/// Which external analysis a page or submission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analysis {
    /// Sequence-based TFBS cluster analysis.
    Tca,
    /// Sequence-based anchored combinatorial TFBS cluster analysis.
    Actca,
}

impl Analysis {
    /// Map a request path (`/tca`, `/actca`) to an analysis.
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/tca" => Some(Analysis::Tca),
            "/actca" => Some(Analysis::Actca),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Analysis::Tca => "tca",
            Analysis::Actca => "actca",
        }
    }

    /// Prefix of the job directory names created for this analysis.
    pub fn job_prefix(self) -> &'static str {
        match self {
            Analysis::Tca => "TCA_",
            Analysis::Actca => "ACTCA_",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Analysis::Tca => "oPOSSUM Sequence-Based TFBS Cluster Analysis",
            Analysis::Actca => "oPOSSUM Sequence-Based Anchored Combination TFBS Cluster Analysis",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            Analysis::Tca => "Sequence-Based TFBS Cluster Analysis",
            Analysis::Actca => "Sequence-Based Anchored Combination TFBS Cluster Analysis",
        }
    }

    /// CSS class used for the page background.
    pub fn color_class(self) -> &'static str {
        match self {
            Analysis::Tca => "bgc_seq_tca",
            Analysis::Actca => "bgc_seq_actca",
        }
    }

    pub fn is_anchored(self) -> bool {
        matches!(self, Analysis::Actca)
    }
}

/// Where a sequence set comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqSource {
    /// Text pasted into the form.
    Pasted(String),
    /// A file uploaded through the form, with the client-side file name.
    Uploaded { filename: String, data: Vec<u8> },
    /// A named pre-shipped background set.
    DefaultSet(String),
}

impl SeqSource {
    pub fn method_name(&self) -> &'static str {
        match self {
            SeqSource::Pasted(_) => "paste",
            SeqSource::Uploaded { .. } => "upload",
            SeqSource::DefaultSet(_) => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterFilter {
    All,
    Families(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultSelection {
    /// Report the N highest-scoring clusters.
    TopN(u32),
    /// Report every cluster passing the given cutoffs.
    Significant {
        zscore_cutoff: Option<f64>,
        fisher_cutoff: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Zscore,
    Fisher,
}

impl SortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zscore" | "z_score" => Some(SortBy::Zscore),
            "fisher" | "fisher_p_value" => Some(SortBy::Fisher),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Zscore => "zscore",
            SortBy::Fisher => "fisher",
        }
    }
}

/// A fully validated submission, ready to be turned into an analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub analysis: Analysis,
    pub email: String,
    /// Score threshold as a percentage (0..=100).
    pub threshold: f64,
    pub collections: Vec<String>,
    pub tax_groups: Vec<String>,
    pub min_ic: Option<f64>,
    pub cluster_filter: ClusterFilter,
    pub anchor_tf: Option<String>,
    pub max_site_dist: Option<u32>,
    pub target: SeqSource,
    pub background: SeqSource,
    pub selection: Option<ResultSelection>,
    pub sort_by: Option<SortBy>,
}

/// Per-session page state, persisted between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub sid: String,
    pub analysis: Analysis,
    pub title: String,
    pub heading: String,
    pub bg_color_class: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub created_utc: String,
    #[serde(default)]
    pub last_job_id: Option<String>,
}

impl SessionState {
    pub fn new(sid: String, analysis: Analysis, created_utc: String) -> Self {
        Self {
            sid,
            analysis,
            title: analysis.title().to_string(),
            heading: analysis.heading().to_string(),
            bg_color_class: analysis.color_class().to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
            created_utc,
            last_job_id: None,
        }
    }

    /// Switch the page strings over to another analysis, keeping the id.
    pub fn set_analysis(&mut self, analysis: Analysis) {
        self.analysis = analysis;
        self.title = analysis.title().to_string();
        self.heading = analysis.heading().to_string();
        self.bg_color_class = analysis.color_class().to_string();
    }
}
