// Shared helpers for devbao-core integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use devbao_core::{DevbaoError, DevbaoResult, ExecEnvironment, Launcher, NodeLayout, Product};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

/// What the mock saw when asked to launch
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub product: Product,
    pub exec: ExecEnvironment,
    /// File names in the node directory at launch time
    pub directory_entries: Vec<String>,
}

/// Launcher that never spawns anything
pub struct MockLauncher {
    next_pid: AtomicU32,
    pub launches: Mutex<Vec<LaunchRecord>>,
    pub terminated: Mutex<Vec<u32>>,
    running: Mutex<HashSet<u32>>,
    fail_launch: bool,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            launches: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            running: Mutex::new(HashSet::new()),
            fail_launch: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::new()
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn last_launch(&self) -> LaunchRecord {
        self.launches
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no launch recorded")
    }

    pub fn terminated_pids(&self) -> Vec<u32> {
        self.terminated.lock().unwrap().clone()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self, product: Product, exec: &ExecEnvironment) -> DevbaoResult<u32> {
        if self.fail_launch {
            return Err(DevbaoError::ProcessError {
                operation: "spawn".to_string(),
                details: "binary not found".to_string(),
            });
        }

        let mut directory_entries: Vec<String> = std::fs::read_dir(&exec.directory)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        directory_entries.sort();

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.running.lock().unwrap().insert(pid);
        self.launches.lock().unwrap().push(LaunchRecord {
            product,
            exec: exec.clone(),
            directory_entries,
        });
        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> DevbaoResult<()> {
        if !self.running.lock().unwrap().remove(&pid) {
            return Err(DevbaoError::ProcessError {
                operation: "terminate".to_string(),
                details: format!("no process with PID {}", pid),
            });
        }
        self.terminated.lock().unwrap().push(pid);
        Ok(())
    }

    async fn is_running(&self, pid: u32) -> DevbaoResult<bool> {
        Ok(self.running.lock().unwrap().contains(&pid))
    }
}

/// Layout rooted in a fresh temporary directory
pub fn temp_layout() -> (TempDir, NodeLayout) {
    let temp_dir = TempDir::new().unwrap();
    let layout = NodeLayout::new(temp_dir.path().join("nodes"));
    (temp_dir, layout)
}
