//! Resume rendering for file-upload fields.
//!
//! Application forms want a file, not a string. The renderer writes the
//! tailored resume to a temp file and hands back a path that stays valid
//! for the lifetime of the artifact.

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use thiserror::Error;

use crate::analysis::TailoredResume;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered resume on disk. The file is deleted when the artifact drops,
/// so it must outlive the upload step that references it.
pub struct ResumeArtifact {
    path: PathBuf,
    _cleanup: TempPath,
}

impl ResumeArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub trait ResumeRenderer: Send + Sync {
    fn render(&self, resume: &TailoredResume) -> Result<ResumeArtifact, RenderError>;
}

/// Renders the resume as plain UTF-8 text. Every upload field accepts .txt;
/// richer formats can slot in behind the same trait later.
pub struct PlainTextRenderer;

impl ResumeRenderer for PlainTextRenderer {
    fn render(&self, resume: &TailoredResume) -> Result<ResumeArtifact, RenderError> {
        use std::io::Write;

        let mut file = tempfile::Builder::new()
            .prefix("resume-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(resume.content.as_bytes())?;
        file.flush()?;

        let cleanup = file.into_temp_path();
        let path = cleanup.to_path_buf();
        Ok(ResumeArtifact {
            path,
            _cleanup: cleanup,
        })
    }
}
