//! Cluster controller CLI
//!
//! Command-line tool for managing nodes and pods on the simulated cluster,
//! triggering chaos, and inspecting logs, utilization and reports.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{cluster, nodes, pods};
use output::OutputFormat;

/// Cluster controller CLI
#[derive(Parser)]
#[command(name = "clusterctl")]
#[command(author, version, about = "CLI for the cluster simulator control plane", long_about = None)]
pub struct Cli {
    /// Controller URL (can also be set via CLUSTERCTL_API_URL or the config file)
    #[arg(long, env = "CLUSTERCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the config file setting, then table)
    #[arg(long, short)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage nodes
    #[command(subcommand)]
    Node(NodeCommands),

    /// Manage pods
    #[command(subcommand)]
    Pod(PodCommands),

    /// Kill a random node or pod
    Chaos,

    /// Show the recent event log
    Logs {
        /// Show only the newest N entries
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show cluster CPU utilization history
    Utilization,

    /// Show the per-node report
    Report {
        /// Write the report to a file (CSV for table format, JSON otherwise)
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Continuously print a cluster summary and new events
    Watch {
        /// Poll interval in seconds
        #[arg(long, short, default_value_t = 3)]
        interval: u64,

        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Register a new node
    Add {
        /// CPU cores
        #[arg(long)]
        cpu: u32,

        /// Memory in GB (controller default if omitted)
        #[arg(long)]
        memory: Option<u32>,

        /// Node type (balanced, high_cpu, high_mem)
        #[arg(long = "type")]
        node_type: Option<String>,

        /// Network group
        #[arg(long)]
        network_group: Option<String>,
    },

    /// Remove a node and reschedule its pods
    Remove {
        /// Node ID
        node_id: String,
    },

    /// List all nodes
    List,

    /// Send a heartbeat for a node
    Heartbeat {
        /// Node ID
        node_id: String,
    },

    /// Toggle simulated heartbeats for a node
    Simulate {
        /// Node ID
        node_id: String,

        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
pub enum PodCommands {
    /// Launch a pod
    Launch {
        /// CPU cores requested
        #[arg(long)]
        cpu: u32,

        /// Memory in GB (controller default if omitted)
        #[arg(long)]
        memory: Option<u32>,

        /// Placement policy (first_fit, best_fit, worst_fit)
        #[arg(long, default_value = "first_fit")]
        policy: String,

        /// Network group the pod must land in
        #[arg(long)]
        network_group: Option<String>,

        /// Required node type
        #[arg(long)]
        affinity: Option<String>,
    },

    /// List pods waiting for capacity
    Unplaced,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        if let Some(code) = e
            .downcast_ref::<client::ClientError>()
            .and_then(|err| err.code())
        {
            eprintln!("  code: {}", code);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;

    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(|f| OutputFormat::from_str(f, true).ok())
        })
        .unwrap_or_default();

    // Initialize client
    let client = client::ApiClient::new(&config.api_url(cli.api_url))?;

    // Execute command
    match cli.command {
        Commands::Node(node_cmd) => match node_cmd {
            NodeCommands::Add {
                cpu,
                memory,
                node_type,
                network_group,
            } => {
                let request = client::AddNodeRequest {
                    cpu,
                    memory,
                    node_type,
                    network_group,
                };
                nodes::add_node(&client, request, format).await?;
            }
            NodeCommands::Remove { node_id } => {
                nodes::remove_node(&client, &node_id, format).await?;
            }
            NodeCommands::List => {
                nodes::list_nodes(&client, format).await?;
            }
            NodeCommands::Heartbeat { node_id } => {
                nodes::heartbeat(&client, &node_id, format).await?;
            }
            NodeCommands::Simulate { node_id, off } => {
                nodes::set_simulation(&client, &node_id, !off, format).await?;
            }
        },
        Commands::Pod(pod_cmd) => match pod_cmd {
            PodCommands::Launch {
                cpu,
                memory,
                policy,
                network_group,
                affinity,
            } => {
                let request = client::LaunchPodRequest {
                    cpu,
                    memory,
                    policy,
                    network_group,
                    node_affinity: affinity,
                };
                pods::launch_pod(&client, request, format).await?;
            }
            PodCommands::Unplaced => {
                pods::list_unplaced(&client, format).await?;
            }
        },
        Commands::Chaos => {
            cluster::chaos(&client, format).await?;
        }
        Commands::Logs { limit } => {
            cluster::logs(&client, limit, format).await?;
        }
        Commands::Utilization => {
            cluster::utilization(&client, format).await?;
        }
        Commands::Report { output } => {
            cluster::report(&client, output, format).await?;
        }
        Commands::Watch { interval, count } => {
            cluster::watch(&client, interval, count).await?;
        }
    }

    Ok(())
}
