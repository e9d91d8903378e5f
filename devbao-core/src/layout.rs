use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{DevbaoError, DevbaoResult};

/// Snapshot file of a node
pub const NODE_JSON_NAME: &str = "node.json";

/// Generated server configuration of a non-dev node
pub const INSTANCE_CONFIG_NAME: &str = "config.hcl";

/// On-disk layout of node directories beneath one base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
    base_dir: PathBuf,
}

impl NodeLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn node_dir(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        self.node_dir(name).join(NODE_JSON_NAME)
    }

    pub fn instance_config_path(&self, name: &str) -> PathBuf {
        self.node_dir(name).join(INSTANCE_CONFIG_NAME)
    }

    /// Names of all node directories, sorted. A missing base directory has no nodes.
    pub async fn list_nodes(&self) -> DevbaoResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DevbaoError::io("list node directory", &self.base_dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DevbaoError::io("list node directory", &self.base_dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if is_dir {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }
}
