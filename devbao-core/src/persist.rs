//! Node persistence.
//!
//! Two artifacts per node directory:
//! - `node.json`, the whole-node snapshot, rewritten after every launch
//! - `config.hcl`, the generated server configuration (non-dev nodes only)
//!
//! Listener and storage entries are decoded in two phases: the snapshot is
//! parsed into a [`Value`] tree, then each entry's `type` discriminator picks
//! the concrete variant it is deserialized into.

use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::error::{DevbaoError, DevbaoResult};
use crate::layout::NodeLayout;
use crate::node::{ExecEnvironment, Node, NodeConfig, Product};
use crate::options::{DevConfig, Listener, Storage};

/// Write the node snapshot, replacing any previous one.
pub async fn save_snapshot(layout: &NodeLayout, node: &Node) -> DevbaoResult<PathBuf> {
    let path = layout.snapshot_path(&node.name);
    let mut contents = serde_json::to_vec_pretty(node)?;
    contents.push(b'\n');

    fs::write(&path, contents)
        .await
        .map_err(|e| DevbaoError::io("write node snapshot", &path, e))?;

    debug!("Wrote snapshot for node '{}' to {}", node.name, path.display());
    Ok(path)
}

/// Read and decode the snapshot of node `name`.
pub async fn load_snapshot(layout: &NodeLayout, name: &str) -> DevbaoResult<Node> {
    let path = layout.snapshot_path(name);
    let contents = fs::read(&path)
        .await
        .map_err(|e| DevbaoError::io("read node snapshot", &path, e))?;

    let value: Value = serde_json::from_slice(&contents).map_err(|e| DevbaoError::Snapshot {
        path: path.clone(),
        message: format!("failed to parse JSON: {}", e),
    })?;

    decode_node(&value).map_err(|e| DevbaoError::Snapshot {
        path,
        message: e.to_string(),
    })
}

/// Write the generated server configuration and return its path.
pub async fn save_instance_config(
    layout: &NodeLayout,
    name: &str,
    body: &str,
) -> DevbaoResult<PathBuf> {
    let path = layout.instance_config_path(name);
    fs::write(&path, body)
        .await
        .map_err(|e| DevbaoError::io("write instance config", &path, e))?;

    Ok(path)
}

pub(crate) fn decode_node(value: &Value) -> DevbaoResult<Node> {
    let object = value
        .as_object()
        .ok_or_else(|| DevbaoError::ConfigError("snapshot is not an object".to_string()))?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let product: Product = object
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .parse()?;

    let exec = match object.get("exec") {
        None | Some(Value::Null) => None,
        Some(exec) => Some(serde_json::from_value::<ExecEnvironment>(exec.clone())?),
    };

    let config = match object.get("config") {
        None | Some(Value::Null) => NodeConfig::default(),
        Some(config) => decode_config(config)?,
    };

    Ok(Node {
        name,
        product,
        exec,
        config,
    })
}

fn decode_config(value: &Value) -> DevbaoResult<NodeConfig> {
    let object = value
        .as_object()
        .ok_or_else(|| DevbaoError::ConfigError("`config` is not an object".to_string()))?;

    let listeners = match object.get("listeners") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(decode_listener)
            .collect::<DevbaoResult<Vec<_>>>()?,
        Some(_) => {
            return Err(DevbaoError::ConfigError(
                "`config.listeners` is not an array".to_string(),
            ))
        }
    };

    let storage = match object.get("storage") {
        None | Some(Value::Null) => None,
        Some(storage) => Some(decode_storage(storage)?),
    };

    let dev = match object.get("dev") {
        None | Some(Value::Null) => None,
        Some(dev) => Some(serde_json::from_value::<DevConfig>(dev.clone())?),
    };

    Ok(NodeConfig {
        listeners,
        storage,
        dev,
    })
}

fn discriminator<'a>(value: &'a Value, what: &str) -> DevbaoResult<&'a str> {
    value.get("type").and_then(Value::as_str).ok_or_else(|| {
        DevbaoError::ConfigError(format!("{} entry is missing its `type` field: {}", what, value))
    })
}

pub(crate) fn decode_listener(value: &Value) -> DevbaoResult<Listener> {
    match discriminator(value, "listener")? {
        "tcp" => Ok(Listener::Tcp(serde_json::from_value(value.clone())?)),
        "unix" => Ok(Listener::Unix(serde_json::from_value(value.clone())?)),
        other => Err(DevbaoError::ConfigError(format!(
            "unknown listener type `{}`",
            other
        ))),
    }
}

pub(crate) fn decode_storage(value: &Value) -> DevbaoResult<Storage> {
    match discriminator(value, "storage")? {
        "file" => Ok(Storage::File(serde_json::from_value(value.clone())?)),
        "raft" => Ok(Storage::Raft(serde_json::from_value(value.clone())?)),
        "inmem" => Ok(Storage::Inmem(serde_json::from_value(value.clone())?)),
        other => Err(DevbaoError::ConfigError(format!(
            "unknown storage type `{}`",
            other
        ))),
    }
}
