//! Pod-related CLI commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, LaunchPodRequest, LaunchPodResponse, PodList};
use crate::output::{print_json, print_rows, print_success, OutputFormat};

/// Row for unplaced pods table
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Pod")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: u32,
    #[tabled(rename = "Memory (GB)")]
    memory: u32,
    #[tabled(rename = "Group")]
    network_group: String,
    #[tabled(rename = "Affinity")]
    affinity: String,
}

/// Launch a pod with the given placement policy
pub async fn launch_pod(
    client: &ApiClient,
    request: LaunchPodRequest,
    format: OutputFormat,
) -> Result<()> {
    let response: LaunchPodResponse = client.post("launch_pod", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            print_success(&response.message);
            println!("Pod: pod-{}", response.pod_id);
            println!("Node: {}", response.assigned_node);
            println!("Policy: {}", response.scheduling_algorithm);
        }
    }
    Ok(())
}

/// List pods that failed rescheduling
pub async fn list_unplaced(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let list: PodList = client.get("unplaced_pods").await?;

    let rows: Vec<PodRow> = list
        .pods
        .iter()
        .map(|p| PodRow {
            name: format!("pod-{}", p.pod_id),
            cpu: p.cpu,
            memory: p.memory,
            network_group: p.network_group.clone(),
            affinity: p.node_affinity.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    print_rows(&rows, &list.pods, format);
    Ok(())
}
