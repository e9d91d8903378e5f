//! Process backend for devbao: spawns and signals real `bao`/`vault` servers.

pub mod process_manager;

pub use process_manager::{CommandExecutor, ServerLauncher, SystemCommandExecutor};

// Re-export core types for convenience
pub use devbao_core::{
    error::{DevbaoError, DevbaoResult},
    BinaryConfig, Launcher,
};
