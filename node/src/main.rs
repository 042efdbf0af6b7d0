//! benor Node Binary

use anyhow::bail;
use benor_core::{ClusterConfig, NodeConfig, NodeId, Value};
use benor_node::{serve, HttpTransport, NodeRuntime};
use clap::{Parser, Subcommand};
use rand::Rng;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "benor-node")]
#[command(about = "benor - fault-tolerant randomized binary consensus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single node
    Run {
        /// This node's id, in [0, nodes)
        #[arg(long)]
        node_id: u32,

        /// Total number of nodes in the cluster (N)
        #[arg(long, default_value_t = 4)]
        nodes: usize,

        /// Fault bound (F); the cluster needs N > 3F
        #[arg(long, default_value_t = 1)]
        faults: usize,

        /// First HTTP port; node i listens on base_port + i
        #[arg(long, default_value_t = 3001)]
        base_port: u16,

        /// Initial binary value (0 or 1); random when omitted
        #[arg(long)]
        initial_value: Option<u8>,

        /// Run as a faulty node that never participates
        #[arg(long)]
        faulty: bool,
    },

    /// Launch a whole fleet of nodes in one process
    Fleet {
        /// Total number of nodes (N)
        #[arg(long, default_value_t = 4)]
        nodes: usize,

        /// Fault bound (F); the cluster needs N > 3F
        #[arg(long, default_value_t = 1)]
        faults: usize,

        /// First HTTP port; node i listens on base_port + i
        #[arg(long, default_value_t = 3001)]
        base_port: u16,

        /// Comma-separated initial values, one per node (e.g. 1,0,1,1);
        /// random when omitted
        #[arg(long, value_delimiter = ',')]
        initial_values: Vec<u8>,

        /// Comma-separated ids of nodes to run as faulty
        #[arg(long, value_delimiter = ',')]
        faulty_ids: Vec<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            node_id,
            nodes,
            faults,
            base_port,
            initial_value,
            faulty,
        } => {
            let cluster = ClusterConfig {
                nodes,
                faults,
                base_port,
            };
            run_node(NodeId::new(node_id), cluster, initial_value, faulty).await
        }

        Commands::Fleet {
            nodes,
            faults,
            base_port,
            initial_values,
            faulty_ids,
        } => {
            let cluster = ClusterConfig {
                nodes,
                faults,
                base_port,
            };
            run_fleet(cluster, initial_values, faulty_ids).await
        }
    }
}

fn pick_value(raw: Option<u8>) -> anyhow::Result<Value> {
    match raw {
        Some(raw) => Value::try_from(raw).map_err(anyhow::Error::msg),
        None => Ok(if rand::thread_rng().gen::<bool>() {
            Value::One
        } else {
            Value::Zero
        }),
    }
}

fn node_config(
    id: NodeId,
    cluster: &ClusterConfig,
    initial_value: Option<u8>,
    faulty: bool,
) -> anyhow::Result<NodeConfig> {
    if faulty {
        Ok(NodeConfig::faulty_node(id, cluster.clone()))
    } else {
        Ok(NodeConfig::new(id, cluster.clone(), pick_value(initial_value)?))
    }
}

async fn run_node(
    id: NodeId,
    cluster: ClusterConfig,
    initial_value: Option<u8>,
    faulty: bool,
) -> anyhow::Result<()> {
    let config = node_config(id, &cluster, initial_value, faulty)?;
    let transport = Arc::new(HttpTransport::new(id, cluster.clone())?);
    let (runtime, ready_rx) = NodeRuntime::new(config, transport)?;

    let addr = format!("127.0.0.1:{}", cluster.port_of(id));
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(runtime, &addr).await {
            error!("server error: {}", e);
        }
    });

    if ready_rx.await.is_err() {
        bail!("node exited before announcing ready");
    }
    info!("node {} ready on port {}", id, cluster.port_of(id));

    signal::ctrl_c().await?;
    handle.abort();
    info!("node stopped");

    Ok(())
}

async fn run_fleet(
    cluster: ClusterConfig,
    initial_values: Vec<u8>,
    faulty_ids: Vec<u32>,
) -> anyhow::Result<()> {
    cluster.validate()?;
    if faulty_ids.len() > cluster.faults {
        bail!(
            "{} faulty nodes exceed the fault bound F={}",
            faulty_ids.len(),
            cluster.faults
        );
    }
    if !initial_values.is_empty() && initial_values.len() != cluster.nodes {
        bail!(
            "expected {} initial values, got {}",
            cluster.nodes,
            initial_values.len()
        );
    }

    let mut handles = Vec::new();
    let mut ready_rxs = Vec::new();

    for i in 0..cluster.nodes {
        let id = NodeId::new(i as u32);
        let faulty = faulty_ids.contains(&id.as_u32());
        let config = node_config(id, &cluster, initial_values.get(i).copied(), faulty)?;

        let transport = Arc::new(HttpTransport::new(id, cluster.clone())?);
        let (runtime, ready_rx) = NodeRuntime::new(config, transport)?;
        ready_rxs.push(ready_rx);

        let addr = format!("127.0.0.1:{}", cluster.port_of(id));
        handles.push(tokio::spawn(async move {
            if let Err(e) = serve(runtime, &addr).await {
                error!(node = %id, "server error: {}", e);
            }
        }));
    }

    for ready_rx in ready_rxs {
        match ready_rx.await {
            Ok(id) => info!("node {} ready", id),
            Err(_) => bail!("a node exited before announcing ready"),
        }
    }
    info!(
        "fleet of {} nodes ready on ports {}..={}",
        cluster.nodes,
        cluster.base_port,
        cluster.base_port + cluster.nodes as u16 - 1
    );

    signal::ctrl_c().await?;
    for handle in handles {
        handle.abort();
    }
    info!("fleet stopped");

    Ok(())
}
