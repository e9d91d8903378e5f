//! Instance configuration rendering
//!
//! Turns a non-dev [`NodeConfig`] into the HCL file handed to the server via
//! `-config=`. Each listener and storage variant contributes one block of
//! pre-rendered attributes; the document layout lives in an embedded template.

use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};

use crate::error::{DevbaoError, DevbaoResult};
use crate::node::NodeConfig;

const TEMPLATE_NAME: &str = "config.hcl";

/// A `kind "name" { ... }` block
#[derive(Debug, Clone, Serialize)]
pub(crate) struct HclBlock {
    pub kind: String,
    pub attrs: Vec<HclAttr>,
}

/// One `key = value` line; `value` is already an HCL literal
#[derive(Debug, Clone, Serialize)]
pub(crate) struct HclAttr {
    pub key: String,
    pub value: String,
}

impl HclBlock {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&mut self, key: &str, value: String) {
        self.attrs.push(HclAttr {
            key: key.to_string(),
            value,
        });
    }
}

pub(crate) fn hcl_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

pub(crate) fn hcl_bool(value: bool) -> String {
    value.to_string()
}

pub struct InstanceConfigRenderer {
    tera: Tera,
}

impl InstanceConfigRenderer {
    pub fn new() -> DevbaoResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, include_str!("../templates/config.hcl"))?;
        Ok(Self { tera })
    }

    /// Render the instance configuration for `config` rooted at `directory`.
    ///
    /// Returns an empty string for dev mode and for configurations with no
    /// listener or storage; callers decide whether that is acceptable.
    pub fn render(&self, config: &NodeConfig, directory: &Path) -> DevbaoResult<String> {
        if config.dev.is_some() || config.listeners.is_empty() {
            return Ok(String::new());
        }
        let Some(storage) = &config.storage else {
            return Ok(String::new());
        };

        let api_addr = config.connect_url()?;
        let cluster_addr = if storage.needs_cluster_addr() {
            hcl_string(&cluster_addr(&api_addr)?)
        } else {
            String::new()
        };

        let listeners: Vec<HclBlock> = config
            .listeners
            .iter()
            .map(|listener| listener.hcl_block(directory))
            .collect();

        let mut context = Context::new();
        context.insert("api_addr", &hcl_string(&api_addr));
        context.insert("cluster_addr", &cluster_addr);
        context.insert("listeners", &listeners);
        context.insert("storage", &storage.hcl_block(directory));

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

/// Cluster address for raft: the API URL with the port incremented by one.
fn cluster_addr(api_addr: &str) -> DevbaoResult<String> {
    let invalid = || {
        DevbaoError::ConfigError(format!(
            "cannot derive cluster address from `{}`: expected host:port",
            api_addr
        ))
    };

    let (prefix, port) = api_addr.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    let port = port.checked_add(1).ok_or_else(invalid)?;

    Ok(format!("{}:{}", prefix, port))
}
