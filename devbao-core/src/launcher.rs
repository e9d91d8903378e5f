use async_trait::async_trait;

use crate::error::DevbaoResult;
use crate::node::{ExecEnvironment, Product};

/// Launches and signals server processes.
///
/// The core decides *what* to run; implementations decide *how*. The process
/// backend crate provides the real implementation, tests provide mocks.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start the server for `product` described by `exec`, returning its pid.
    async fn launch(&self, product: Product, exec: &ExecEnvironment) -> DevbaoResult<u32>;

    /// Ask the process to shut down.
    async fn terminate(&self, pid: u32) -> DevbaoResult<()>;

    /// Whether a process with this pid is alive.
    async fn is_running(&self, pid: u32) -> DevbaoResult<bool>;
}
