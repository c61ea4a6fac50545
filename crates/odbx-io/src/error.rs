//! Error types for odbx-io

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// The three interchange artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Mesh,
    Steps,
    Buckets,
}

impl Artifact {
    /// Default file name inside an export directory
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Mesh => "mesh.json",
            Artifact::Steps => "steps.json",
            Artifact::Buckets => "nt11.jsonl",
        }
    }
}

impl Display for Artifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A malformed or schema-invalid artifact
#[derive(Debug, Clone, PartialEq)]
pub struct FormatError {
    pub artifact: Artifact,
    /// 1-based line number, when the artifact is line oriented or the
    /// JSON parser reported one
    pub line: Option<usize>,
    /// Offending field, as a dotted path
    pub field: Option<String>,
    pub message: String,
}

impl FormatError {
    pub fn new(artifact: Artifact, message: impl Into<String>) -> Self {
        Self {
            artifact,
            line: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub(crate) fn from_json(artifact: Artifact, err: &serde_json::Error) -> Self {
        let err_line = err.line();
        let error = Self::new(artifact, err.to_string());
        if err_line > 0 { error.at_line(err_line) } else { error }
    }
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact)?;
        if let Some(line) = self.line {
            write!(f, " line {line}")?;
        }
        if let Some(field) = &self.field {
            write!(f, ", field `{field}`")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for FormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_line_and_field() {
        let err = FormatError::new(Artifact::Buckets, "unknown position kind: CENTROID")
            .at_line(3)
            .in_field("position");
        assert_eq!(
            err.to_string(),
            "nt11.jsonl line 3, field `position`: unknown position kind: CENTROID"
        );
        let bare = FormatError::new(Artifact::Steps, "boom");
        assert_eq!(bare.to_string(), "steps.json: boom");
    }
}
