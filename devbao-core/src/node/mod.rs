//! Node lifecycle
//!
//! A [`Node`] is one locally-run OpenBao or Vault server. It moves between
//! four states:
//!
//! - **Unstarted**: only a validated definition exists
//! - **Running**: `build_exec` produced an [`ExecEnvironment`], the launcher
//!   started it, and the snapshot records the pid
//! - **Stopped**: the process was terminated; the directory and snapshot remain
//! - **Cleaned**: the node directory was removed
//!
//! Nothing is shared in memory between supervisor invocations. A later
//! invocation reloads the node from its snapshot, which is how `kill` finds a
//! process started by a different invocation.

mod config;
mod exec;

pub use config::NodeConfig;
pub use exec::{ExecEnvironment, SERVER_LOG_NAME};

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{DevbaoError, DevbaoResult, NodeStage, StageContext};
use crate::launcher::Launcher;
use crate::layout::NodeLayout;
use crate::options::{decode_options, ConfigOption};
use crate::persist;

/// Server product a node runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Product {
    /// No explicit product; the configured default binary is used
    #[default]
    Default,
    Bao,
    Vault,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Default => "",
            Product::Bao => "bao",
            Product::Vault => "vault",
        }
    }

    /// Prefix of the client environment variables for this product.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Product::Bao => "BAO_",
            Product::Default | Product::Vault => "VAULT_",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = DevbaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Product::Default),
            "bao" => Ok(Product::Bao),
            "vault" => Ok(Product::Vault),
            other => Err(DevbaoError::InvalidProduct(other.to_string())),
        }
    }
}

impl Serialize for Product {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Observed state of a node's process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// No snapshot on disk
    Unstarted,
    /// Snapshot exists but records no live process
    Stopped,
    Running { pid: u32 },
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Unstarted => write!(f, "unstarted"),
            NodeStatus::Stopped => write!(f, "stopped"),
            NodeStatus::Running { pid } => write!(f, "running (pid {})", pid),
        }
    }
}

/// One managed server instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    #[serde(rename = "type")]
    pub product: Product,
    pub exec: Option<ExecEnvironment>,
    pub config: NodeConfig,
}

impl Node {
    /// Build a node from a name, a product (`""`, `"bao"` or `"vault"`) and
    /// a sequence of options.
    pub fn build(
        name: impl Into<String>,
        product: &str,
        options: impl IntoIterator<Item = ConfigOption>,
    ) -> DevbaoResult<Self> {
        let mut node = Node {
            name: name.into(),
            product: product.parse()?,
            exec: None,
            config: NodeConfig::default(),
        };

        for option in options {
            node.config.apply(option);
        }

        node.validate()?;
        Ok(node)
    }

    /// Build a node from options given as untyped JSON.
    pub fn build_from_values(
        name: impl Into<String>,
        product: &str,
        values: &[Value],
    ) -> DevbaoResult<Self> {
        let options = decode_options(values)?;
        Self::build(name, product, options)
    }

    /// Load node `name` from its snapshot.
    pub async fn load(layout: &NodeLayout, name: &str) -> DevbaoResult<Self> {
        let mut node = persist::load_snapshot(layout, name)
            .await
            .stage(NodeStage::Load, name)?;

        if node.name != name {
            warn!(
                "Snapshot in directory '{}' names node '{}'",
                name, node.name
            );
        }

        node.validate().stage(NodeStage::Load, name)?;
        Ok(node)
    }

    /// Default an empty name and check the definition. Idempotent.
    pub fn validate(&mut self) -> DevbaoResult<()> {
        if self.name.is_empty() {
            self.name = if self.config.dev.is_none() {
                "dev".to_string()
            } else {
                "prod".to_string()
            };
        }

        validate_name(&self.name)?;
        self.config.validate()
    }

    pub fn directory(&self, layout: &NodeLayout) -> PathBuf {
        layout.node_dir(&self.name)
    }

    /// Resolve everything needed to launch the server and write the
    /// instance configuration. Does not start a process.
    pub async fn build_exec(&mut self, layout: &NodeLayout) -> DevbaoResult<()> {
        self.validate().stage(NodeStage::Validate, &self.name)?;
        let name = self.name.clone();

        let directory = self.directory(layout);
        fs::create_dir_all(&directory)
            .await
            .map_err(|e| DevbaoError::io("create node directory", &directory, e))
            .stage(NodeStage::Directory, &name)?;

        let (address, _) = self
            .config
            .connect_addr()
            .stage(NodeStage::Address, &name)?;

        let mut args = self
            .config
            .args(&directory)
            .stage(NodeStage::Arguments, &name)?;

        let body = self
            .config
            .to_config(&directory)
            .and_then(|body| {
                if body.is_empty() && !self.config.is_dev() {
                    Err(DevbaoError::ConfigError(
                        "expected non-dev server to have non-empty configuration; are listeners or storage missing"
                            .to_string(),
                    ))
                } else {
                    Ok(body)
                }
            })
            .stage(NodeStage::InstanceConfig, &name)?;

        if !body.is_empty() {
            let path = persist::save_instance_config(layout, &name, &body)
                .await
                .stage(NodeStage::Persist, &name)?;
            args.push(format!("-config={}", path.display()));
        }

        debug!("Built exec environment for node '{}': {:?}", name, args);
        self.exec = Some(ExecEnvironment::new(args, directory, address));
        Ok(())
    }

    /// Launch the server reusing the existing directory and data.
    pub async fn resume(&mut self, layout: &NodeLayout, launcher: &dyn Launcher) -> DevbaoResult<()> {
        self.build_exec(layout).await?;
        let name = self.name.clone();

        let exec = self.exec.as_mut().ok_or_else(|| DevbaoError::Stage {
            stage: NodeStage::Launch,
            node: name.clone(),
            source: Box::new(DevbaoError::NotRunning(name.clone())),
        })?;

        let pid = launcher
            .launch(self.product, exec)
            .await
            .stage(NodeStage::Launch, &name)?;
        exec.mark_started(pid);
        info!("Started node '{}' with PID {}", name, pid);

        self.save(layout).await
    }

    /// Discard any previous run and its data, then launch fresh.
    pub async fn start(&mut self, layout: &NodeLayout, launcher: &dyn Launcher) -> DevbaoResult<()> {
        self.validate().stage(NodeStage::Validate, &self.name)?;

        // A node that was never running has nothing to kill.
        if let Err(e) = self.kill(layout, launcher).await {
            debug!("Ignoring kill failure before starting node '{}': {}", self.name, e);
        }

        self.clean(layout).await?;
        self.resume(layout, launcher).await
    }

    /// Terminate the node's process.
    ///
    /// Without a live pid in memory the node is reloaded from its snapshot and
    /// the reloaded copy's pid is used; `self` is left untouched in that case.
    pub async fn kill(&mut self, layout: &NodeLayout, launcher: &dyn Launcher) -> DevbaoResult<()> {
        self.validate().stage(NodeStage::Validate, &self.name)?;
        let name = self.name.clone();

        let has_live_handle = self.exec.as_ref().map_or(false, ExecEnvironment::is_running);
        if has_live_handle {
            return terminate(self, layout, launcher).await;
        }

        let mut disk = Node::load(layout, &name).await.stage(NodeStage::Kill, &name)?;
        terminate(&mut disk, layout, launcher).await
    }

    /// Remove the node directory. Removing a missing directory succeeds.
    pub async fn clean(&mut self, layout: &NodeLayout) -> DevbaoResult<()> {
        self.validate().stage(NodeStage::Validate, &self.name)?;

        let directory = self.directory(layout);
        match fs::remove_dir_all(&directory).await {
            Ok(()) => {
                info!("Removed directory of node '{}'", self.name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DevbaoError::io("remove node directory", &directory, e))
                .stage(NodeStage::Clean, &self.name),
        }
    }

    /// Validate and write the snapshot.
    pub async fn save(&mut self, layout: &NodeLayout) -> DevbaoResult<()> {
        self.validate().stage(NodeStage::Validate, &self.name)?;
        persist::save_snapshot(layout, self)
            .await
            .stage(NodeStage::Persist, &self.name)?;
        Ok(())
    }

    /// Process state according to the snapshot on disk.
    pub async fn status(&self, layout: &NodeLayout, launcher: &dyn Launcher) -> DevbaoResult<NodeStatus> {
        let snapshot = layout.snapshot_path(&self.name);
        let exists = fs::try_exists(&snapshot)
            .await
            .map_err(|e| DevbaoError::io("check node snapshot", &snapshot, e))?;
        if !exists {
            return Ok(NodeStatus::Unstarted);
        }

        let disk = persist::load_snapshot(layout, &self.name).await?;
        let Some(pid) = disk.exec.as_ref().map(|exec| exec.pid).filter(|pid| *pid != 0) else {
            return Ok(NodeStatus::Stopped);
        };

        if launcher.is_running(pid).await? {
            Ok(NodeStatus::Running { pid })
        } else {
            Ok(NodeStatus::Stopped)
        }
    }

    /// `scheme://address` clients should connect to.
    pub fn connect_addr(&self) -> DevbaoResult<String> {
        self.config.connect_url().map_err(|e| DevbaoError::Stage {
            stage: NodeStage::Address,
            node: self.name.clone(),
            source: Box::new(e),
        })
    }

    /// Root token, known only for dev nodes.
    pub fn token(&self) -> Option<String> {
        self.config.dev.as_ref().map(|dev| dev.token().to_string())
    }

    /// Client environment: `<PREFIX>ADDR` and `<PREFIX>TOKEN`.
    pub fn env(&self) -> DevbaoResult<BTreeMap<String, String>> {
        let prefix = self.product.env_prefix();
        let mut env = BTreeMap::new();

        env.insert(format!("{}ADDR", prefix), self.connect_addr()?);
        env.insert(format!("{}TOKEN", prefix), self.token().unwrap_or_default());

        Ok(env)
    }
}

async fn terminate(node: &mut Node, layout: &NodeLayout, launcher: &dyn Launcher) -> DevbaoResult<()> {
    let name = node.name.clone();
    let pid = node
        .exec
        .as_ref()
        .map(|exec| exec.pid)
        .filter(|pid| *pid != 0)
        .ok_or_else(|| DevbaoError::NotRunning(name.clone()))
        .stage(NodeStage::Kill, &name)?;

    launcher.terminate(pid).await.stage(NodeStage::Kill, &name)?;
    info!("Terminated node '{}' (PID {})", name, pid);

    if let Some(exec) = node.exec.as_mut() {
        exec.mark_stopped();
    }

    // Keep the snapshot from pointing at a pid the OS may hand out again.
    let snapshot = layout.snapshot_path(&name);
    let recorded = fs::try_exists(&snapshot)
        .await
        .map_err(|e| DevbaoError::io("check node snapshot", &snapshot, e))
        .stage(NodeStage::Persist, &name)?;
    if recorded {
        persist::save_snapshot(layout, node)
            .await
            .stage(NodeStage::Persist, &name)?;
    }

    Ok(())
}

fn validate_name(name: &str) -> DevbaoResult<()> {
    let invalid = |reason: &str| DevbaoError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name == "." || name == ".." {
        return Err(invalid("reserved directory name"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("must not contain path separators"));
    }

    Ok(())
}
