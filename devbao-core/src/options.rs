//! Node configuration options
//!
//! Listener, storage, and dev-mode options are independent value objects.
//! A node is built from a flat sequence of them; each option is sorted into
//! its slot of [`NodeConfig`](crate::node::NodeConfig) by its own variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{DevbaoError, DevbaoResult};
use crate::instance_config::{hcl_bool, hcl_string, HclBlock};
use crate::persist::{decode_listener, decode_storage};

/// Address the dev server listens on when none is configured.
pub const DEFAULT_DEV_ADDRESS: &str = "127.0.0.1:8200";

/// Root token of a dev server when none is configured.
pub const DEFAULT_DEV_TOKEN: &str = "devroot";

/// One option supplied when building a node
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOption {
    Listener(Listener),
    Storage(Storage),
    Dev(DevConfig),
}

impl From<Listener> for ConfigOption {
    fn from(listener: Listener) -> Self {
        ConfigOption::Listener(listener)
    }
}

impl From<Storage> for ConfigOption {
    fn from(storage: Storage) -> Self {
        ConfigOption::Storage(storage)
    }
}

impl From<DevConfig> for ConfigOption {
    fn from(dev: DevConfig) -> Self {
        ConfigOption::Dev(dev)
    }
}

/// A network endpoint the server binds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpListener {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_key_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnixListener {
    /// Socket path; relative paths live in the node directory
    pub path: String,
}

impl TcpListener {
    pub fn is_tls(&self) -> bool {
        self.tls_cert_file.is_some() && self.tls_key_file.is_some()
    }
}

impl Listener {
    pub fn tcp(address: impl Into<String>) -> Self {
        Listener::Tcp(TcpListener {
            address: address.into(),
            tls_cert_file: None,
            tls_key_file: None,
        })
    }

    pub fn tcp_tls(
        address: impl Into<String>,
        cert_file: impl Into<String>,
        key_file: impl Into<String>,
    ) -> Self {
        Listener::Tcp(TcpListener {
            address: address.into(),
            tls_cert_file: Some(cert_file.into()),
            tls_key_file: Some(key_file.into()),
        })
    }

    pub fn unix(path: impl Into<String>) -> Self {
        Listener::Unix(UnixListener { path: path.into() })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Listener::Tcp(_) => "tcp",
            Listener::Unix(_) => "unix",
        }
    }

    pub(crate) fn hcl_block(&self, directory: &Path) -> HclBlock {
        let mut block = HclBlock::new(self.kind());
        match self {
            Listener::Tcp(tcp) => {
                block.attr("address", hcl_string(&tcp.address));
                match (&tcp.tls_cert_file, &tcp.tls_key_file) {
                    (Some(cert), Some(key)) => {
                        block.attr("tls_cert_file", hcl_string(&rooted(cert, directory)));
                        block.attr("tls_key_file", hcl_string(&rooted(key, directory)));
                    }
                    _ => block.attr("tls_disable", hcl_bool(true)),
                }
            }
            Listener::Unix(unix) => {
                block.attr("address", hcl_string(&rooted(&unix.path, directory)));
            }
        }
        block
    }
}

/// The durable backend the server persists its data to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    File(FileStorage),
    Raft(RaftStorage),
    Inmem(InmemStorage),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStorage {
    /// Data path, defaulting to `data` in the node directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaftStorage {
    /// Data path, defaulting to `raft` in the node directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Raft node id, defaulting to the node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InmemStorage {}

impl Storage {
    pub fn file() -> Self {
        Storage::File(FileStorage::default())
    }

    pub fn file_at(path: impl Into<String>) -> Self {
        Storage::File(FileStorage {
            path: Some(path.into()),
        })
    }

    pub fn raft() -> Self {
        Storage::Raft(RaftStorage::default())
    }

    pub fn inmem() -> Self {
        Storage::Inmem(InmemStorage {})
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Storage::File(_) => "file",
            Storage::Raft(_) => "raft",
            Storage::Inmem(_) => "inmem",
        }
    }

    /// Raft storage needs a cluster address next to the API address.
    pub fn needs_cluster_addr(&self) -> bool {
        matches!(self, Storage::Raft(_))
    }

    pub(crate) fn hcl_block(&self, directory: &Path) -> HclBlock {
        let mut block = HclBlock::new(self.kind());
        match self {
            Storage::File(file) => {
                let path = file.path.as_deref().unwrap_or("data");
                block.attr("path", hcl_string(&rooted(path, directory)));
            }
            Storage::Raft(raft) => {
                let path = raft.path.as_deref().unwrap_or("raft");
                block.attr("path", hcl_string(&rooted(path, directory)));

                let node_id = raft.node_id.clone().unwrap_or_else(|| {
                    directory
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "devbao".to_string())
                });
                block.attr("node_id", hcl_string(&node_id));
            }
            Storage::Inmem(_) => {}
        }
        block
    }
}

/// In-memory, auto-unsealed, single-node development mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl DevConfig {
    pub fn token(&self) -> &str {
        self.token
            .as_deref()
            .filter(|token| !token.is_empty())
            .unwrap_or(DEFAULT_DEV_TOKEN)
    }

    pub fn address(&self) -> &str {
        self.address
            .as_deref()
            .filter(|address| !address.is_empty())
            .unwrap_or(DEFAULT_DEV_ADDRESS)
    }
}

/// Decode options from untyped JSON.
///
/// Each element must be an object with exactly one of the keys `listener`,
/// `storage`, or `dev`. Anything else fails with the element's index.
pub fn decode_options(values: &[Value]) -> DevbaoResult<Vec<ConfigOption>> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| decode_option(index, value))
        .collect()
}

fn decode_option(index: usize, value: &Value) -> DevbaoResult<ConfigOption> {
    let unknown = |detail: Option<String>| DevbaoError::UnknownOption {
        index,
        value: match detail {
            Some(detail) => format!("{} ({})", value, detail),
            None => value.to_string(),
        },
    };

    let (key, body) = match value.as_object() {
        Some(object) if object.len() == 1 => object.iter().next().ok_or_else(|| unknown(None))?,
        _ => return Err(unknown(None)),
    };

    let decoded = match key.as_str() {
        "listener" => decode_listener(body).map(ConfigOption::Listener),
        "storage" => decode_storage(body).map(ConfigOption::Storage),
        "dev" => serde_json::from_value::<DevConfig>(body.clone())
            .map(ConfigOption::Dev)
            .map_err(DevbaoError::from),
        _ => return Err(unknown(None)),
    };

    decoded.map_err(|e| unknown(Some(e.to_string())))
}

/// Root a relative path in the node directory.
fn rooted(path: &str, directory: &Path) -> String {
    if Path::new(path).is_absolute() {
        path.to_string()
    } else {
        directory.join(path).to_string_lossy().into_owned()
    }
}
