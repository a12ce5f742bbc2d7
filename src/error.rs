//! Typed failures that callers branch on

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the CSV pipeline.
///
/// Configuration mistakes (a missing column, a malformed date threshold) are
/// kept apart from I/O failures so the CLI can map them to distinct exit codes.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("column '{column}' not found. available columns: {available:?}")]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    #[error("invalid date '{value}', expected YYYY-MM-DD (e.g. 2015-10-05)")]
    InvalidDate { value: String },

    #[error("invalid delimiter '{0}': expected a single ASCII character, '\\t' or 'tab'")]
    InvalidDelimiter(String),

    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),

    #[error("output {} is also an input", path.display())]
    OutputIsInput { path: PathBuf },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Build a `ColumnNotFound` listing the header that was searched.
    pub fn column_not_found(column: &str, available: &[String]) -> Self {
        PipelineError::ColumnNotFound {
            column: column.to_string(),
            available: available.to_vec(),
        }
    }

    /// True for mistakes in the invocation rather than in the data or disk.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::ColumnNotFound { .. }
                | PipelineError::InvalidDate { .. }
                | PipelineError::InvalidDelimiter(_)
                | PipelineError::UnknownEncoding(_)
                | PipelineError::OutputIsInput { .. }
        )
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        if self.is_configuration() {
            2
        } else {
            1
        }
    }
}

/// Map an arbitrary error chain to the CLI exit code.
///
/// The first `PipelineError` found in the chain decides; anything else is
/// treated as a runtime failure (exit 1).
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map(PipelineError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        let missing = PipelineError::FileNotFound {
            path: PathBuf::from("/nope.csv"),
        };
        assert_eq!(missing.exit_code(), 1);

        let column = PipelineError::column_not_found("pref", &["id".to_string()]);
        assert_eq!(column.exit_code(), 2);
        assert!(column.to_string().contains("\"id\""));

        let date = PipelineError::InvalidDate {
            value: "2020/01/01".into(),
        };
        assert_eq!(date.exit_code(), 2);

        let clobber = PipelineError::OutputIsInput {
            path: PathBuf::from("new.csv"),
        };
        assert_eq!(clobber.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_through_context() {
        let err: anyhow::Result<()> = Err(PipelineError::column_not_found("x", &[]).into());
        let err = err.context("while splitting").unwrap_err();
        assert_eq!(exit_code_for(&err), 2);

        let other = anyhow::anyhow!("disk full");
        assert_eq!(exit_code_for(&other), 1);
    }
}
