use serde::Serialize;
use std::path::Path;

use crate::error::{DevbaoError, DevbaoResult};
use crate::instance_config::InstanceConfigRenderer;
use crate::options::{ConfigOption, DevConfig, Listener, Storage};

/// Composed configuration of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeConfig {
    /// Listeners in configuration order; the first TCP listener is primary
    pub listeners: Vec<Listener>,
    pub storage: Option<Storage>,
    pub dev: Option<DevConfig>,
}

impl NodeConfig {
    /// Sort one option into its slot. Listeners append, storage and dev replace.
    pub fn apply(&mut self, option: ConfigOption) {
        match option {
            ConfigOption::Listener(listener) => self.listeners.push(listener),
            ConfigOption::Storage(storage) => self.storage = Some(storage),
            ConfigOption::Dev(dev) => self.dev = Some(dev),
        }
    }

    pub fn is_dev(&self) -> bool {
        self.dev.is_some()
    }

    pub fn validate(&self) -> DevbaoResult<()> {
        // Dev mode needs neither listeners nor storage and ignores any given
        if self.dev.is_some() {
            return Ok(());
        }

        if self.listeners.is_empty() {
            return Err(DevbaoError::MissingListener);
        }
        if self.storage.is_none() {
            return Err(DevbaoError::MissingStorage);
        }

        Ok(())
    }

    /// Address clients connect to and whether it speaks TLS.
    pub fn connect_addr(&self) -> DevbaoResult<(String, bool)> {
        if let Some(dev) = &self.dev {
            return Ok((dev.address().to_string(), false));
        }

        self.listeners
            .iter()
            .find_map(|listener| match listener {
                Listener::Tcp(tcp) => Some((tcp.address.clone(), tcp.is_tls())),
                Listener::Unix(_) => None,
            })
            .ok_or_else(|| {
                DevbaoError::ConfigError("no TCP listener available to connect to".to_string())
            })
    }

    pub fn connect_url(&self) -> DevbaoResult<String> {
        let (address, tls) = self.connect_addr()?;
        let scheme = if tls { "https" } else { "http" };
        Ok(format!("{}://{}", scheme, address))
    }

    /// Server arguments, excluding the `-config=` flag added once the
    /// instance configuration is on disk.
    pub fn args(&self, _directory: &Path) -> DevbaoResult<Vec<String>> {
        let mut args = vec!["server".to_string()];

        if let Some(dev) = &self.dev {
            args.push("-dev".to_string());
            args.push(format!("-dev-root-token-id={}", dev.token()));
            args.push(format!("-dev-listen-address={}", dev.address()));
        }

        Ok(args)
    }

    /// Instance configuration body; empty for dev mode.
    pub fn to_config(&self, directory: &Path) -> DevbaoResult<String> {
        if self.dev.is_some() {
            return Ok(String::new());
        }
        InstanceConfigRenderer::new()?.render(self, directory)
    }
}
