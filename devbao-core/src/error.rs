use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Stage of a node operation, attached to errors so callers can tell which
/// step of a lifecycle transition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStage {
    Validate,
    Directory,
    Address,
    Arguments,
    InstanceConfig,
    Persist,
    Launch,
    Load,
    Kill,
    Clean,
}

impl fmt::Display for NodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStage::Validate => "validate",
            NodeStage::Directory => "directory",
            NodeStage::Address => "address resolution",
            NodeStage::Arguments => "argument build",
            NodeStage::InstanceConfig => "config build",
            NodeStage::Persist => "persistence",
            NodeStage::Launch => "launch",
            NodeStage::Load => "load",
            NodeStage::Kill => "kill",
            NodeStage::Clean => "clean",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DevbaoError {
    #[error("invalid node type (`{0}`): expected either empty (``), OpenBao (`bao`), or HashiCorp Vault (`vault`)")]
    InvalidProduct(String),

    #[error("invalid node name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("non-dev node requires at least one listener")]
    MissingListener,

    #[error("non-dev node requires a storage backend")]
    MissingStorage,

    #[error("unknown type of node configuration option at index {index}: {value}")]
    UnknownOption { index: usize, value: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{operation} failed for `{}`: {source}", path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot `{}`: {message}", path.display())]
    Snapshot { path: PathBuf, message: String },

    #[error("failed to render instance configuration: {0}")]
    Template(#[from] tera::Error),

    #[error("process operation '{operation}' failed: {details}")]
    ProcessError { operation: String, details: String },

    #[error("node `{0}` has no recorded running process")]
    NotRunning(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("admin API request to {path} failed with status {status}: {body}")]
    Api {
        path: String,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("node `{node}`: {stage} failed: {source}")]
    Stage {
        stage: NodeStage,
        node: String,
        #[source]
        source: Box<DevbaoError>,
    },
}

pub type DevbaoResult<T> = std::result::Result<T, DevbaoError>;

impl DevbaoError {
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DevbaoError::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Stage this error was raised in, if it was wrapped by a node operation.
    pub fn stage(&self) -> Option<NodeStage> {
        match self {
            DevbaoError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error beneath any stage wrappers.
    pub fn root(&self) -> &DevbaoError {
        match self {
            DevbaoError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for errors caused by an invalid node definition rather than I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.root(),
            DevbaoError::InvalidProduct(_)
                | DevbaoError::InvalidName { .. }
                | DevbaoError::MissingListener
                | DevbaoError::MissingStorage
                | DevbaoError::UnknownOption { .. }
                | DevbaoError::ConfigError(_)
        )
    }
}

/// Attach a [`NodeStage`] to the error side of a result.
pub(crate) trait StageContext<T> {
    fn stage(self, stage: NodeStage, node: &str) -> DevbaoResult<T>;
}

impl<T> StageContext<T> for DevbaoResult<T> {
    fn stage(self, stage: NodeStage, node: &str) -> DevbaoResult<T> {
        self.map_err(|source| DevbaoError::Stage {
            stage,
            node: node.to_string(),
            source: Box::new(source),
        })
    }
}
