use std::path::PathBuf;

/// Errors produced by the pipeline. Every variant aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read {}: {reason}", path.display())]
    DataAccess { path: PathBuf, reason: String },

    #[error("{} is missing required column '{column}'", path.display())]
    Schema { path: PathBuf, column: String },

    #[error("training failed: {0}")]
    Training(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("scoring failed: {0}")]
    Scoring(String),

    #[error("failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub(crate) fn data_access(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::DataAccess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Name of the pipeline stage that produced the error.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::DataAccess { .. } | PipelineError::Schema { .. } => "load",
            PipelineError::Training(_) => "train",
            PipelineError::Evaluation(_) => "evaluate",
            PipelineError::Scoring(_) => "score",
            PipelineError::Persistence { .. } => "save",
            PipelineError::InvalidConfig(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_path_and_column() {
        let err = PipelineError::Schema {
            path: PathBuf::from("flights.csv"),
            column: "DEST".to_string(),
        };
        assert_eq!(err.to_string(), "flights.csv is missing required column 'DEST'");
        assert_eq!(err.stage(), "load");
    }

    #[test]
    fn persistence_keeps_io_source() {
        let err = PipelineError::Persistence {
            path: PathBuf::from("out.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.stage(), "save");
    }

    #[test]
    fn evaluation_and_scoring_report_their_own_stage() {
        assert_eq!(PipelineError::Evaluation("x".into()).stage(), "evaluate");
        let err = PipelineError::Scoring("duplicate column".into());
        assert_eq!(err.stage(), "score");
        assert_eq!(err.to_string(), "scoring failed: duplicate column");
    }
}
