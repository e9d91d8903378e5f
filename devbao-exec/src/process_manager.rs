use devbao_core::error::{DevbaoError, DevbaoResult};
use devbao_core::{BinaryConfig, ExecEnvironment, Launcher, Product};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Trait for spawning and signalling processes - allows mocking in tests
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Start `program` detached in `cwd`, appending its output to `log_path`
    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        log_path: &Path,
    ) -> Result<u32, std::io::Error>;

    /// Ask the process to shut down
    async fn kill(&self, pid: u32) -> Result<(), std::io::Error>;

    async fn process_exists(&self, pid: u32) -> Result<bool, std::io::Error>;
}

/// Default command executor that runs real commands
pub struct SystemCommandExecutor;

fn to_pid(pid: u32) -> Result<Pid, std::io::Error> {
    // 0 and negative values address process groups rather than one process
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid process id {}", pid),
        )),
    }
}

#[async_trait::async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        log_path: &Path,
    ) -> Result<u32, std::io::Error> {
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        let stderr = stdout.try_clone()?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // The child outlives this handle; the server keeps running after we exit
        let child = cmd.spawn()?;
        child.id().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "Failed to get process ID")
        })
    }

    async fn kill(&self, pid: u32) -> Result<(), std::io::Error> {
        signal::kill(to_pid(pid)?, Signal::SIGTERM)?;
        Ok(())
    }

    async fn process_exists(&self, pid: u32) -> Result<bool, std::io::Error> {
        match signal::kill(to_pid(pid)?, None) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            // Exists but belongs to someone else
            Err(Errno::EPERM) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}

/// Launches `bao`/`vault` server processes for nodes
pub struct ServerLauncher {
    binaries: BinaryConfig,
    command_executor: Box<dyn CommandExecutor>,
}

impl ServerLauncher {
    pub fn new(binaries: BinaryConfig) -> Self {
        Self {
            binaries,
            command_executor: Box::new(SystemCommandExecutor),
        }
    }

    /// Create a launcher with a custom command executor (for testing)
    pub fn with_executor(binaries: BinaryConfig, executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            binaries,
            command_executor: executor,
        }
    }

    pub fn binaries(&self) -> &BinaryConfig {
        &self.binaries
    }
}

#[async_trait::async_trait]
impl Launcher for ServerLauncher {
    async fn launch(&self, product: Product, exec: &ExecEnvironment) -> DevbaoResult<u32> {
        let program = self.binaries.binary_for(product);
        let log_path = exec.log_path();
        debug!(
            "Spawning {} {} in {}",
            program,
            exec.args.join(" "),
            exec.directory.display()
        );

        let pid = self
            .command_executor
            .spawn(program, &exec.args, &exec.directory, &log_path)
            .await
            .map_err(|e| DevbaoError::ProcessError {
                operation: "spawn".to_string(),
                details: format!("failed to start `{}`: {}", program, e),
            })?;

        info!(
            "Started {} (PID {}), output in {}",
            program,
            pid,
            log_path.display()
        );
        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> DevbaoResult<()> {
        self.command_executor
            .kill(pid)
            .await
            .map_err(|e| DevbaoError::ProcessError {
                operation: "terminate".to_string(),
                details: format!("failed to signal PID {}: {}", pid, e),
            })?;

        info!("Sent SIGTERM to PID {}", pid);
        Ok(())
    }

    async fn is_running(&self, pid: u32) -> DevbaoResult<bool> {
        if pid == 0 {
            return Ok(false);
        }
        self.command_executor
            .process_exists(pid)
            .await
            .map_err(|e| DevbaoError::ProcessError {
                operation: "probe".to_string(),
                details: format!("failed to check PID {}: {}", pid, e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct SpawnCall {
        program: String,
        args: Vec<String>,
        cwd: PathBuf,
        log_path: PathBuf,
    }

    /// Mock command executor for testing
    #[derive(Clone)]
    struct MockCommandExecutor {
        next_pid: Arc<AtomicU32>,
        spawned: Arc<Mutex<Vec<SpawnCall>>>,
        alive: Arc<Mutex<HashSet<u32>>>,
        spawn_should_fail: bool,
    }

    impl MockCommandExecutor {
        fn new() -> Self {
            Self {
                next_pid: Arc::new(AtomicU32::new(1000)),
                spawned: Arc::new(Mutex::new(Vec::new())),
                alive: Arc::new(Mutex::new(HashSet::new())),
                spawn_should_fail: false,
            }
        }

        fn failing_spawn() -> Self {
            Self {
                spawn_should_fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait::async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn spawn(
            &self,
            program: &str,
            args: &[String],
            cwd: &Path,
            log_path: &Path,
        ) -> Result<u32, std::io::Error> {
            if self.spawn_should_fail {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "No such file or directory",
                ));
            }

            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            self.spawned.lock().unwrap().push(SpawnCall {
                program: program.to_string(),
                args: args.to_vec(),
                cwd: cwd.to_path_buf(),
                log_path: log_path.to_path_buf(),
            });
            self.alive.lock().unwrap().insert(pid);
            Ok(pid)
        }

        async fn kill(&self, pid: u32) -> Result<(), std::io::Error> {
            if self.alive.lock().unwrap().remove(&pid) {
                Ok(())
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "No such process",
                ))
            }
        }

        async fn process_exists(&self, pid: u32) -> Result<bool, std::io::Error> {
            Ok(self.alive.lock().unwrap().contains(&pid))
        }
    }

    fn binaries() -> BinaryConfig {
        BinaryConfig {
            bao: "/opt/openbao/bin/bao".to_string(),
            vault: "/usr/local/bin/vault".to_string(),
            default: "bao".to_string(),
        }
    }

    fn exec() -> ExecEnvironment {
        ExecEnvironment::new(
            vec!["server".to_string(), "-dev".to_string()],
            PathBuf::from("/nodes/dev"),
            "127.0.0.1:8200".to_string(),
        )
    }

    #[tokio::test]
    async fn test_launch_uses_product_binary() {
        let executor = MockCommandExecutor::new();
        let launcher = ServerLauncher::with_executor(binaries(), Box::new(executor.clone()));

        let pid = launcher.launch(Product::Vault, &exec()).await.unwrap();
        assert_eq!(pid, 1000);

        let calls = executor.spawned.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "/usr/local/bin/vault");
        assert_eq!(calls[0].args, vec!["server", "-dev"]);
        assert_eq!(calls[0].cwd, PathBuf::from("/nodes/dev"));
        assert_eq!(calls[0].log_path, PathBuf::from("/nodes/dev/server.log"));
    }

    #[tokio::test]
    async fn test_default_product_binary() {
        let executor = MockCommandExecutor::new();
        let launcher = ServerLauncher::with_executor(binaries(), Box::new(executor.clone()));

        launcher.launch(Product::Default, &exec()).await.unwrap();
        assert_eq!(executor.spawned.lock().unwrap()[0].program, "bao");
    }

    #[tokio::test]
    async fn test_spawn_failure_maps_to_process_error() {
        let launcher =
            ServerLauncher::with_executor(binaries(), Box::new(MockCommandExecutor::failing_spawn()));

        let err = launcher.launch(Product::Bao, &exec()).await.unwrap_err();
        match err {
            DevbaoError::ProcessError { operation, details } => {
                assert_eq!(operation, "spawn");
                assert!(details.contains("/opt/openbao/bin/bao"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_and_probe() {
        let executor = MockCommandExecutor::new();
        let launcher = ServerLauncher::with_executor(binaries(), Box::new(executor));

        let pid = launcher.launch(Product::Bao, &exec()).await.unwrap();
        assert!(launcher.is_running(pid).await.unwrap());

        launcher.terminate(pid).await.unwrap();
        assert!(!launcher.is_running(pid).await.unwrap());

        let err = launcher.terminate(pid).await.unwrap_err();
        assert!(matches!(err, DevbaoError::ProcessError { .. }));
    }

    #[tokio::test]
    async fn test_zero_pid_is_never_running() {
        let launcher = ServerLauncher::new(binaries());
        assert!(!launcher.is_running(0).await.unwrap());
    }

    #[test]
    fn test_group_pids_rejected() {
        assert!(to_pid(0).is_err());
        assert!(to_pid(u32::MAX).is_err());
        assert_eq!(to_pid(42).unwrap(), Pid::from_raw(42));
    }
}
