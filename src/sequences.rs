//! Sequence acquisition: turn a form's sequence input into a FASTA file.
//!
//! Pasted and uploaded content is written unchanged; named background sets are
//! copied from their configured location.

use crate::form::FormData;
use crate::model::SeqSource;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqRole {
    Target,
    Background,
}

impl SeqRole {
    /// File name used inside the job directory.
    pub fn file_name(self) -> &'static str {
        match self {
            SeqRole::Target => "t_seq.fa",
            SeqRole::Background => "bg_seq.fa",
        }
    }

    /// Prefix of the form fields belonging to this role.
    fn field_prefix(self) -> &'static str {
        match self {
            SeqRole::Target => "",
            SeqRole::Background => "bg_",
        }
    }

    pub fn method_field(self) -> String {
        format!("{}seq_input_method", self.field_prefix())
    }

    pub fn paste_field(self) -> String {
        format!("{}seq_paste", self.field_prefix())
    }

    pub fn file_field(self) -> String {
        format!("{}seq_file", self.field_prefix())
    }

    fn label(self) -> &'static str {
        match self {
            SeqRole::Target => "target",
            SeqRole::Background => "background",
        }
    }

    fn capitalized(self) -> &'static str {
        match self {
            SeqRole::Target => "Target",
            SeqRole::Background => "Background",
        }
    }
}

impl std::fmt::Display for SeqRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("No {0} sequence input method specified")]
    NoMethod(SeqRole),
    #[error("Unknown {role} sequence input method '{method}'")]
    UnknownMethod { role: SeqRole, method: String },
    #[error("No {0} sequences pasted")]
    NothingPasted(SeqRole),
    #[error("No {0} sequence file uploaded")]
    NothingUploaded(SeqRole),
    #[error("{0} sequences are empty")]
    Empty(&'static str),
    #[error("{0} sequences are not in FASTA format (no '>' header line)")]
    NotFasta(&'static str),
    #[error("Default sequence sets are only available for background sequences")]
    DefaultNotAllowed,
    #[error("No default background sequence set selected")]
    NoDefaultSet,
    #[error("Unknown background sequence set '{0}'")]
    UnknownSet(String),
    #[error("could not write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not read background sequence set {}: {source}", .path.display())]
    ReadSet {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Work out where a role's sequences come from, from the submitted form.
///
/// Pasted and uploaded content is checked for a FASTA header; nothing touches
/// the disk.
pub fn source_from_form(
    form: &FormData,
    role: SeqRole,
    bg_sets: &BTreeMap<String, PathBuf>,
) -> Result<SeqSource, SequenceError> {
    let method = form
        .get_nonempty(&role.method_field())
        .ok_or(SequenceError::NoMethod(role))?;

    match method {
        "paste" => {
            let text = form
                .get(&role.paste_field())
                .filter(|t| !t.trim().is_empty())
                .ok_or(SequenceError::NothingPasted(role))?;
            check_fasta(role, text.as_bytes())?;
            Ok(SeqSource::Pasted(text.to_string()))
        }
        "upload" => {
            let upload = form
                .upload(&role.file_field())
                .filter(|u| !u.data.is_empty())
                .ok_or(SequenceError::NothingUploaded(role))?;
            check_fasta(role, &upload.data)?;
            Ok(SeqSource::Uploaded {
                filename: upload.filename.clone(),
                data: upload.data.clone(),
            })
        }
        "default" => {
            if role != SeqRole::Background {
                return Err(SequenceError::DefaultNotAllowed);
            }
            let name = form
                .get_nonempty("bg_seq_set_name")
                .ok_or(SequenceError::NoDefaultSet)?;
            if !bg_sets.contains_key(name) {
                return Err(SequenceError::UnknownSet(name.to_string()));
            }
            Ok(SeqSource::DefaultSet(name.to_string()))
        }
        other => Err(SequenceError::UnknownMethod {
            role,
            method: other.to_string(),
        }),
    }
}

/// Write a role's sequences into `dest_dir` and return the file path.
pub fn write_sequences(
    role: SeqRole,
    source: &SeqSource,
    bg_sets: &BTreeMap<String, PathBuf>,
    dest_dir: &Path,
) -> Result<PathBuf, SequenceError> {
    let path = dest_dir.join(role.file_name());
    match source {
        SeqSource::Pasted(text) => write_fasta(role, text.as_bytes(), &path)?,
        SeqSource::Uploaded { data, .. } => write_fasta(role, data, &path)?,
        SeqSource::DefaultSet(name) => {
            if role != SeqRole::Background {
                return Err(SequenceError::DefaultNotAllowed);
            }
            let set_path = bg_sets
                .get(name)
                .ok_or_else(|| SequenceError::UnknownSet(name.clone()))?;
            let data = std::fs::read(set_path).map_err(|source| SequenceError::ReadSet {
                path: set_path.clone(),
                source,
            })?;
            write_fasta(role, &data, &path)?;
        }
    }
    Ok(path)
}

fn write_fasta(role: SeqRole, data: &[u8], path: &Path) -> Result<(), SequenceError> {
    check_fasta(role, data)?;
    std::fs::write(path, data).map_err(|source| SequenceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// The first non-blank character must open a FASTA header.
fn check_fasta(role: SeqRole, data: &[u8]) -> Result<(), SequenceError> {
    match data.iter().find(|b| !b.is_ascii_whitespace()) {
        None => Err(SequenceError::Empty(role.capitalized())),
        Some(b'>') => Ok(()),
        Some(_) => Err(SequenceError::NotFasta(role.capitalized())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Upload;

    fn sets(dir: &Path) -> BTreeMap<String, PathBuf> {
        let path = dir.join("human_bg.fa");
        std::fs::write(&path, ">bg1\nACGTACGT\n>bg2\nTTTT\n").unwrap();
        BTreeMap::from([("Human 3000bp".to_string(), path)])
    }

    #[test]
    fn test_pasted_sequences_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let text = ">seq1 promoter\r\nACGTNNacgt\r\n>seq2\r\nGGGC\r\n";
        let mut form = FormData::new();
        form.insert("seq_input_method", "paste");
        form.insert("seq_paste", text);

        let src = source_from_form(&form, SeqRole::Target, &BTreeMap::new()).unwrap();
        let path = write_sequences(SeqRole::Target, &src, &BTreeMap::new(), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("t_seq.fa"));
        assert_eq!(std::fs::read(&path).unwrap(), text.as_bytes());
    }

    #[test]
    fn test_uploaded_sequences_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let data = b">bgA\nACGT\nACGT\n\n>bgB\nTT\n".to_vec();
        let mut form = FormData::new();
        form.insert("bg_seq_input_method", "upload");
        form.insert_upload(
            "bg_seq_file",
            Upload {
                filename: "bg.fa".into(),
                content_type: None,
                data: data.clone(),
            },
        );

        let src = source_from_form(&form, SeqRole::Background, &BTreeMap::new()).unwrap();
        assert_eq!(src.method_name(), "upload");
        let path =
            write_sequences(SeqRole::Background, &src, &BTreeMap::new(), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("bg_seq.fa"));
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[test]
    fn test_default_background_set_copied() {
        let dir = tempfile::tempdir().unwrap();
        let job = tempfile::tempdir().unwrap();
        let bg_sets = sets(dir.path());
        let mut form = FormData::new();
        form.insert("bg_seq_input_method", "default");
        form.insert("bg_seq_set_name", "Human 3000bp");

        let src = source_from_form(&form, SeqRole::Background, &bg_sets).unwrap();
        let path = write_sequences(SeqRole::Background, &src, &bg_sets, job.path()).unwrap();
        assert_eq!(
            std::fs::read(&path).unwrap(),
            std::fs::read(&bg_sets["Human 3000bp"]).unwrap()
        );
    }

    #[test]
    fn test_source_errors() {
        let bg_sets = BTreeMap::new();
        let mut form = FormData::new();
        assert!(matches!(
            source_from_form(&form, SeqRole::Target, &bg_sets),
            Err(SequenceError::NoMethod(SeqRole::Target))
        ));

        form.insert("seq_input_method", "fax");
        let err = source_from_form(&form, SeqRole::Target, &bg_sets).unwrap_err();
        assert_eq!(err.to_string(), "Unknown target sequence input method 'fax'");

        let mut form = FormData::new();
        form.insert("seq_input_method", "paste");
        form.insert("seq_paste", "   \n");
        let err = source_from_form(&form, SeqRole::Target, &bg_sets).unwrap_err();
        assert_eq!(err.to_string(), "No target sequences pasted");

        let mut form = FormData::new();
        form.insert("seq_input_method", "paste");
        form.insert("seq_paste", "ACGTACGT");
        let err = source_from_form(&form, SeqRole::Target, &bg_sets).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Target sequences are not in FASTA format (no '>' header line)"
        );

        let mut form = FormData::new();
        form.insert("seq_input_method", "default");
        assert!(matches!(
            source_from_form(&form, SeqRole::Target, &bg_sets),
            Err(SequenceError::DefaultNotAllowed)
        ));

        let mut form = FormData::new();
        form.insert("bg_seq_input_method", "default");
        form.insert("bg_seq_set_name", "Zebrafish");
        let err = source_from_form(&form, SeqRole::Background, &bg_sets).unwrap_err();
        assert_eq!(err.to_string(), "Unknown background sequence set 'Zebrafish'");
    }

    #[test]
    fn test_non_fasta_content_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let src = SeqSource::Pasted("ACGTACGT\n".into());
        let err = write_sequences(SeqRole::Target, &src, &BTreeMap::new(), dir.path()).unwrap_err();
        assert!(matches!(err, SequenceError::NotFasta("Target")));
        assert!(!dir.path().join("t_seq.fa").exists());
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does").join("not").join("exist");
        let src = SeqSource::Pasted(">a\nACGT\n".into());
        let err = write_sequences(SeqRole::Target, &src, &BTreeMap::new(), &missing).unwrap_err();
        assert!(matches!(err, SequenceError::Write { .. }));
    }
}
