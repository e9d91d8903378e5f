use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File in the node directory receiving the server's stdout and stderr
pub const SERVER_LOG_NAME: &str = "server.log";

/// A resolved, ready-to-launch server process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEnvironment {
    pub args: Vec<String>,
    pub directory: PathBuf,
    pub connect_address: String,
    /// Process id; 0 when not running from this handle
    #[serde(default)]
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl ExecEnvironment {
    pub fn new(args: Vec<String>, directory: PathBuf, connect_address: String) -> Self {
        Self {
            args,
            directory,
            connect_address,
            pid: 0,
            started_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pid != 0
    }

    pub fn log_path(&self) -> PathBuf {
        self.directory.join(SERVER_LOG_NAME)
    }

    pub fn mark_started(&mut self, pid: u32) {
        self.pid = pid;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_stopped(&mut self) {
        self.pid = 0;
        self.started_at = None;
    }
}
