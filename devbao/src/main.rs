use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use devbao_core::{AdminClient, DevbaoConfig, Node, NodeLayout, NodeStatus};
use devbao_exec::ServerLauncher;

mod args;
mod logging;

use args::StartArgs;

#[derive(Parser)]
#[command(name = "devbao")]
#[command(about = "Run and manage local OpenBao and Vault servers", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding node state
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node operations
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },
}

#[derive(Subcommand)]
enum NodeCommands {
    /// Start a node from scratch, wiping any previous state
    Start(StartArgs),
    /// Start a stopped node again, keeping its data
    Resume {
        name: String,
    },
    /// Stop a running node
    Stop {
        name: String,
    },
    /// Stop a node if needed and delete its directory
    Clean {
        name: String,
    },
    /// List nodes and their state
    List,
    /// Print shell exports for talking to a node
    Env {
        name: String,
    },
    /// Show a node's stored definition
    Info {
        name: String,
    },
    /// Show whether a node's server is running
    Status {
        name: String,
    },
    /// Query the server health endpoint
    Health {
        name: String,
    },
    /// Initialize and unseal a fresh non-dev node
    Init {
        name: String,

        /// Number of unseal key shares
        #[arg(long, default_value_t = 1)]
        shares: u32,

        /// Shares required to unseal
        #[arg(long, default_value_t = 1)]
        threshold: u32,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<DevbaoConfig> {
    let mut config = match &cli.config {
        Some(path) => DevbaoConfig::from_file(path)?,
        None => {
            let mut config = DevbaoConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Some(base_dir) = &cli.base_dir {
        config.base_dir = base_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    if config.base_dir.as_os_str().is_empty() {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .context("HOME is not set; pass --base-dir")?;
        config.resolve_base_dir(&home);
    }

    config.validate()?;
    Ok(config)
}

fn print_env(node: &Node) -> anyhow::Result<()> {
    for (key, value) in node.env()? {
        println!("export {}='{}'", key, value.replace('\'', r"'\''"));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_logging(&config.logging)?;

    debug!("Using node directory {}", config.base_dir.display());
    let layout = NodeLayout::new(config.base_dir.clone());
    let launcher = ServerLauncher::new(config.binaries.clone());

    match cli.command {
        Commands::Node { command } => handle_node_command(command, &layout, &launcher).await,
    }
}

async fn handle_node_command(
    command: NodeCommands,
    layout: &NodeLayout,
    launcher: &ServerLauncher,
) -> anyhow::Result<()> {
    match command {
        NodeCommands::Start(start) => {
            let mut node = Node::build(start.name.clone(), &start.product, start.options()?)?;
            node.start(layout, launcher).await?;
            info!("Node '{}' is running in {}", node.name, node.directory(layout).display());
            print_env(&node)?;
        }
        NodeCommands::Resume { name } => {
            let mut node = Node::load(layout, &name).await?;
            if let NodeStatus::Running { pid } = node.status(layout, launcher).await? {
                anyhow::bail!("node '{}' is already running (PID {})", name, pid);
            }
            node.resume(layout, launcher).await?;
            print_env(&node)?;
        }
        NodeCommands::Stop { name } => {
            let mut node = Node::load(layout, &name).await?;
            node.kill(layout, launcher).await?;
            println!("Stopped node '{}'", name);
        }
        NodeCommands::Clean { name } => {
            let mut node = Node::load(layout, &name).await?;
            if let NodeStatus::Running { .. } = node.status(layout, launcher).await? {
                node.kill(layout, launcher).await?;
            }
            node.clean(layout).await?;
            println!("Removed node '{}'", name);
        }
        NodeCommands::List => {
            let names = layout.list_nodes().await?;
            if names.is_empty() {
                println!("No nodes found");
            }
            for name in names {
                match Node::load(layout, &name).await {
                    Ok(node) => {
                        let status = node.status(layout, launcher).await?;
                        let product = match node.product.as_str() {
                            "" => "default",
                            product => product,
                        };
                        println!("{}\t{}\t{}", name, product, status);
                    }
                    Err(e) => println!("{}\tinvalid\t{}", name, e),
                }
            }
        }
        NodeCommands::Env { name } => {
            let node = Node::load(layout, &name).await?;
            print_env(&node)?;
        }
        NodeCommands::Info { name } => {
            let node = Node::load(layout, &name).await?;
            println!("{}", serde_json::to_string_pretty(&node)?);
        }
        NodeCommands::Status { name } => {
            let node = Node::load(layout, &name).await?;
            println!("{}", node.status(layout, launcher).await?);
        }
        NodeCommands::Health { name } => {
            let node = Node::load(layout, &name).await?;
            let client = AdminClient::from_node(&node)?;
            let health = client
                .health()
                .await
                .with_context(|| format!("health check against {} failed", client.address()))?;

            println!("Node '{}' at {}:", name, client.address());
            println!("  Initialized: {}", health.initialized);
            println!("  Sealed: {}", health.sealed);
            println!("  Standby: {}", health.standby);
            if !health.version.is_empty() {
                println!("  Version: {}", health.version);
            }
        }
        NodeCommands::Init {
            name,
            shares,
            threshold,
        } => {
            if threshold == 0 || threshold > shares {
                anyhow::bail!("threshold must be between 1 and the number of shares");
            }

            let node = Node::load(layout, &name).await?;
            let mut client = AdminClient::from_node(&node)?;
            let init = client.init(shares, threshold).await?;
            client.set_token(init.root_token.clone());

            let mut sealed = true;
            for key in init.keys.iter().take(threshold as usize) {
                sealed = client.unseal(key).await?.sealed;
            }

            for (i, key) in init.keys.iter().enumerate() {
                println!("Unseal Key {}: {}", i + 1, key);
            }
            println!("Root Token: {}", init.root_token);
            println!("Sealed: {}", sealed);
        }
    }

    Ok(())
}
