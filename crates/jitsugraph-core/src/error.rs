use std::fmt;
use thiserror::Error;

/// Pipeline stage names, used to tag dependency failures with the step that
/// raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Hypothesize,
    Embed,
    Retrieve,
    Ground,
    Extract,
    LoadCatalog,
    Synthesize,
    Refine,
    Describe,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Hypothesize => "hypothesize",
            Stage::Embed => "embed",
            Stage::Retrieve => "retrieve",
            Stage::Ground => "ground",
            Stage::Extract => "extract",
            Stage::LoadCatalog => "load_catalog",
            Stage::Synthesize => "synthesize",
            Stage::Refine => "refine",
            Stage::Describe => "describe",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum JitsuGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("quota exceeded: used {used} of {limit}")]
    QuotaExceeded { used: u64, limit: u64 },

    #[error("invalid user identity: {0}")]
    InvalidIdentity(String),

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: Stage, message: String },

    #[error("synthesized graph has no nodes")]
    NoNodes,

    #[error("synthesized graph has no edges")]
    NoEdges,

    #[error("graph shape error: {0}")]
    Shape(String),
}

impl JitsuGraphError {
    /// Tag an arbitrary error with the stage that raised it.
    pub fn stage(stage: Stage, err: impl fmt::Display) -> Self {
        JitsuGraphError::Stage {
            stage,
            message: err.to_string(),
        }
    }

    /// The stage this error came from, if it is a stage dependency failure.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            JitsuGraphError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, JitsuGraphError>;
