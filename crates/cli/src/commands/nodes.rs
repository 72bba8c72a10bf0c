//! Node-related CLI commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{
    AddNodeRequest, AddNodeResponse, ApiClient, HeartbeatResponse, MessageResponse, NodeList,
    NodeRequest, RemoveNodeResponse, ToggleSimulationRequest,
};
use crate::output::{
    color_status, format_timestamp, print_json, print_rows, print_success, print_warning,
    short_id, OutputFormat,
};

/// Row for nodes table
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    node_id: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory (GB)")]
    memory: String,
    #[tabled(rename = "Type")]
    node_type: String,
    #[tabled(rename = "Group")]
    network_group: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Simulated")]
    simulated: String,
    #[tabled(rename = "Pods")]
    pods: usize,
    #[tabled(rename = "Last Heartbeat")]
    last_heartbeat: String,
}

/// Register a node
pub async fn add_node(
    client: &ApiClient,
    request: AddNodeRequest,
    format: OutputFormat,
) -> Result<()> {
    let response: AddNodeResponse = client.post("add_node", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            print_success(&response.message);
            println!("Node ID: {}", response.node_id);
        }
    }
    Ok(())
}

/// Remove a node, reporting where its pods went
pub async fn remove_node(client: &ApiClient, node_id: &str, format: OutputFormat) -> Result<()> {
    let request = NodeRequest {
        node_id: node_id.to_string(),
    };
    let response: RemoveNodeResponse = client.post("remove_node", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            print_success(&response.message);
            println!("Pods rescheduled: {}", response.pods_rescheduled);
            if response.pods_unplaced > 0 {
                print_warning(&format!(
                    "{} pod(s) could not be placed; see `clusterctl pod unplaced`",
                    response.pods_unplaced
                ));
            }
        }
    }
    Ok(())
}

/// List every registered node
pub async fn list_nodes(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let list: NodeList = client.get("list_nodes").await?;

    let rows: Vec<NodeRow> = list
        .nodes
        .iter()
        .map(|n| NodeRow {
            node_id: short_id(&n.node_id),
            cpu: format!("{}/{}", n.cpu_available, n.cpu_total),
            memory: format!("{}/{}", n.memory_available, n.memory_total),
            node_type: n.node_type.clone(),
            network_group: n.network_group.clone(),
            status: color_status(&n.status),
            simulated: if n.simulate_heartbeat {
                "✓".to_string()
            } else {
                String::new()
            },
            pods: n.pods.len(),
            last_heartbeat: format_timestamp(&n.last_heartbeat),
        })
        .collect();

    print_rows(&rows, &list.nodes, format);
    if format == OutputFormat::Table && !rows.is_empty() {
        println!("\nTotal: {} nodes (available/total shown)", rows.len());
    }
    Ok(())
}

/// Send a heartbeat on behalf of a node
pub async fn heartbeat(client: &ApiClient, node_id: &str, format: OutputFormat) -> Result<()> {
    let request = NodeRequest {
        node_id: node_id.to_string(),
    };
    let response: HeartbeatResponse = client.post("heartbeat", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            if response.reactivated {
                print_success(&format!("Node {} reactivated", node_id));
            } else {
                print_success(&response.message);
            }
        }
    }
    Ok(())
}

/// Enable or disable simulated heartbeats for a node
pub async fn set_simulation(
    client: &ApiClient,
    node_id: &str,
    simulate: bool,
    format: OutputFormat,
) -> Result<()> {
    let request = ToggleSimulationRequest {
        node_id: node_id.to_string(),
        simulate,
    };
    let response: MessageResponse = client.post("toggle_simulation", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => print_success(&response.message),
    }
    Ok(())
}
