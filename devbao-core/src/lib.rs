//! Lifecycle management for locally-run OpenBao and Vault servers.
//!
//! A [`Node`] is built from [`ConfigOption`]s (or loaded from its snapshot),
//! derives an [`ExecEnvironment`], and hands it to a [`Launcher`]. Node state
//! lives under a [`NodeLayout`] base directory so later invocations can
//! reattach to a running server.

pub mod client;
pub mod config;
pub mod error;
pub mod instance_config;
pub mod launcher;
pub mod layout;
pub mod node;
pub mod options;
pub mod persist;

pub use client::AdminClient;
pub use config::{BinaryConfig, ConfigBuilder, DevbaoConfig, LoggingConfig};
pub use error::{DevbaoError, DevbaoResult, NodeStage};
pub use launcher::Launcher;
pub use layout::{NodeLayout, INSTANCE_CONFIG_NAME, NODE_JSON_NAME};
pub use node::{ExecEnvironment, Node, NodeConfig, NodeStatus, Product};
pub use options::{ConfigOption, DevConfig, Listener, Storage};
