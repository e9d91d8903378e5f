// Command-line parsing of listener, storage, and dev options

use clap::Args;
use devbao_core::options::{decode_options, RaftStorage};
use devbao_core::{ConfigOption, DevConfig, Listener, Storage};
use std::path::PathBuf;

/// Listener given on the command line, before TLS files are attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerArg {
    Tcp(String),
    Unix(String),
}

/// `tcp:ADDR`, `unix:PATH`, or a bare `ADDR`
pub fn parse_listener(value: &str) -> Result<ListenerArg, String> {
    let arg = match value.split_once(':') {
        Some(("tcp", address)) => ListenerArg::Tcp(address.to_string()),
        Some(("unix", path)) => ListenerArg::Unix(path.to_string()),
        _ => ListenerArg::Tcp(value.to_string()),
    };

    match &arg {
        ListenerArg::Tcp(address) if address.is_empty() => {
            Err("tcp listener needs an address".to_string())
        }
        ListenerArg::Unix(path) if path.is_empty() => {
            Err("unix listener needs a socket path".to_string())
        }
        _ => Ok(arg),
    }
}

/// `file[:PATH]`, `raft[:PATH]`, or `inmem`
pub fn parse_storage(value: &str) -> Result<Storage, String> {
    let (kind, path) = match value.split_once(':') {
        Some((kind, path)) => (kind, Some(path.to_string()).filter(|p| !p.is_empty())),
        None => (value, None),
    };

    match (kind, path) {
        ("file", None) => Ok(Storage::file()),
        ("file", Some(path)) => Ok(Storage::file_at(path)),
        ("raft", path) => Ok(Storage::Raft(RaftStorage {
            path,
            node_id: None,
        })),
        ("inmem", None) => Ok(Storage::inmem()),
        ("inmem", Some(_)) => Err("inmem storage takes no path".to_string()),
        (other, _) => Err(format!(
            "unknown storage `{}` (expected file, raft, or inmem)",
            other
        )),
    }
}

/// Options accepted by `node start`
#[derive(Debug, Args)]
pub struct StartArgs {
    /// Node name; defaults to `dev` or `prod`
    #[arg(default_value = "")]
    pub name: String,

    /// Server product: bao or vault (empty uses the default binary)
    #[arg(long, default_value = "")]
    pub product: String,

    /// Run an in-memory development server
    #[arg(long)]
    pub dev: bool,

    /// Root token for dev mode
    #[arg(long, requires = "dev")]
    pub dev_token: Option<String>,

    /// Listen address for dev mode
    #[arg(long, requires = "dev")]
    pub dev_address: Option<String>,

    /// Listener: tcp:ADDR, unix:PATH, or ADDR (repeatable)
    #[arg(long = "listener", value_parser = parse_listener)]
    pub listeners: Vec<ListenerArg>,

    /// TLS certificate for TCP listeners
    #[arg(long, requires = "tls_key")]
    pub tls_cert: Option<String>,

    /// TLS key for TCP listeners
    #[arg(long, requires = "tls_cert")]
    pub tls_key: Option<String>,

    /// Storage: file[:PATH], raft[:PATH], or inmem
    #[arg(long, value_parser = parse_storage)]
    pub storage: Option<Storage>,

    /// JSON file holding an array of option objects
    #[arg(long)]
    pub options_file: Option<PathBuf>,
}

impl StartArgs {
    /// Flatten flags and the options file into node options. File options
    /// come first so flags override their storage and dev settings.
    pub fn options(&self) -> anyhow::Result<Vec<ConfigOption>> {
        let mut options = Vec::new();

        if let Some(path) = &self.options_file {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("failed to read options file {}: {}", path.display(), e)
            })?;
            let values: Vec<serde_json::Value> = serde_json::from_str(&contents).map_err(|e| {
                anyhow::anyhow!("options file {} is not a JSON array: {}", path.display(), e)
            })?;
            options.extend(decode_options(&values)?);
        }

        for arg in &self.listeners {
            let listener = match (arg, &self.tls_cert, &self.tls_key) {
                (ListenerArg::Tcp(address), Some(cert), Some(key)) => {
                    Listener::tcp_tls(address, cert, key)
                }
                (ListenerArg::Tcp(address), _, _) => Listener::tcp(address),
                (ListenerArg::Unix(path), _, _) => Listener::unix(path),
            };
            options.push(listener.into());
        }

        if let Some(storage) = &self.storage {
            options.push(storage.clone().into());
        }

        if self.dev {
            options.push(
                DevConfig {
                    token: self.dev_token.clone(),
                    address: self.dev_address.clone(),
                }
                .into(),
            );
        }

        Ok(options)
    }
}
