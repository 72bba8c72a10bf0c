//! Cluster-wide CLI commands: chaos, logs, utilization, reports and watch

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use tabled::Tabled;

use crate::client::{
    ApiClient, ChaosResponse, LogEntry, LogList, Node, NodeList, Report, UtilizationHistory,
};
use crate::output::{
    color_status, color_utilization, format_timestamp, print_info, print_json, print_rows,
    print_success, print_warning, short_id, OutputFormat,
};

/// Row for event log table
#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Event")]
    message: String,
}

/// Row for utilization history table
#[derive(Tabled)]
struct UtilizationRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "CPU Utilization")]
    utilization: String,
}

/// Row for cluster report table
#[derive(Tabled)]
struct ReportTableRow {
    #[tabled(rename = "Node")]
    node_id: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory (GB)")]
    memory: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Type")]
    node_type: String,
    #[tabled(rename = "Group")]
    network_group: String,
    #[tabled(rename = "Pods")]
    pods: String,
}

/// Trigger one chaos event
pub async fn chaos(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: ChaosResponse = client.post("chaos_monkey", &serde_json::json!({})).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => match response.outcome.as_str() {
            "no_op" => print_info(&response.message),
            _ => {
                print_warning(&response.message);
                if let (Some(moved), Some(unplaced)) = (response.rescheduled, response.unplaced) {
                    println!("Pods rescheduled: {}, unplaced: {}", moved, unplaced);
                }
            }
        },
    }
    Ok(())
}

/// Show the bounded event log
pub async fn logs(client: &ApiClient, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let mut list: LogList = client.get("logs").await?;
    if let Some(limit) = limit {
        let skip = list.logs.len().saturating_sub(limit);
        list.logs.drain(..skip);
    }

    let rows: Vec<LogRow> = list
        .logs
        .iter()
        .map(|entry| LogRow {
            timestamp: format_timestamp(&entry.timestamp),
            message: entry.message.clone(),
        })
        .collect();

    print_rows(&rows, &list, format);
    Ok(())
}

/// Show the utilization history
pub async fn utilization(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let history: UtilizationHistory = client.get("utilization_history").await?;

    let rows: Vec<UtilizationRow> = history
        .history
        .iter()
        .map(|sample| UtilizationRow {
            timestamp: format_timestamp(&sample.timestamp),
            utilization: color_utilization(sample.utilization),
        })
        .collect();

    print_rows(&rows, &history, format);

    if format == OutputFormat::Table {
        if let Some(latest) = history.history.last() {
            println!("\nLatest: {}", color_utilization(latest.utilization));
        }
    }
    Ok(())
}

/// Show the per-node report, or save it to a file
pub async fn report(client: &ApiClient, output: Option<String>, format: OutputFormat) -> Result<()> {
    if let Some(output_path) = output {
        let content = match format {
            OutputFormat::Table => client.get_text("download_report").await?,
            OutputFormat::Json => {
                let report: Report = client.get("report").await?;
                serde_json::to_string_pretty(&report)?
            }
        };
        std::fs::write(&output_path, &content)?;
        print_success(&format!("Report written to {}", output_path));
        return Ok(());
    }

    let report: Report = client.get("report").await?;
    let rows: Vec<ReportTableRow> = report
        .rows
        .iter()
        .map(|r| ReportTableRow {
            node_id: short_id(&r.node_id),
            cpu: format!("{}/{}", r.cpu_available, r.cpu_total),
            memory: format!("{}/{}", r.memory_available, r.memory_total),
            status: color_status(&r.status),
            node_type: r.node_type.clone(),
            network_group: r.network_group.clone(),
            pods: if r.pods.is_empty() {
                "-".to_string()
            } else {
                r.pods.clone()
            },
        })
        .collect();

    print_rows(&rows, &report, format);
    Ok(())
}

/// Poll the controller and print a compact cluster summary each interval
pub async fn watch(client: &ApiClient, interval: u64, count: Option<u64>) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    let mut last_seen: Option<(DateTime<Utc>, String)> = None;
    let mut polls = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let nodes: NodeList = client.get("list_nodes").await?;
        let logs: LogList = client.get("logs").await?;

        let (used, total) = active_cpu(&nodes.nodes);
        let fraction = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64
        };
        let failed = nodes.nodes.iter().filter(|n| n.status == "failed").count();
        let pods: usize = nodes.nodes.iter().map(|n| n.pods.len()).sum();

        println!(
            "{} nodes: {} ({} failed)  pods: {}  utilization: {}",
            Utc::now().format("%H:%M:%S").to_string().dimmed(),
            nodes.nodes.len(),
            failed,
            pods,
            color_utilization(fraction)
        );

        for entry in fresh_entries(&logs.logs, last_seen.as_ref()) {
            println!("  {} {}", format_timestamp(&entry.timestamp).dimmed(), entry.message);
        }
        if let Some(newest) = logs.logs.last() {
            last_seen = Some((newest.timestamp, newest.message.clone()));
        }

        polls += 1;
        if count.is_some_and(|limit| polls >= limit) {
            break;
        }
    }

    Ok(())
}

/// Used and total cores across active nodes
fn active_cpu(nodes: &[Node]) -> (u64, u64) {
    nodes
        .iter()
        .filter(|n| n.status == "active")
        .fold((0u64, 0u64), |(used, total), n| {
            let in_use = u64::from(n.cpu_total.saturating_sub(n.cpu_available));
            (used + in_use, total + u64::from(n.cpu_total))
        })
}

/// Journal entries after `last_seen`, matched on timestamp and message.
///
/// When the last seen entry has rotated out of the journal, everything
/// stamped later than it is new.
fn fresh_entries<'a>(
    logs: &'a [LogEntry],
    last_seen: Option<&(DateTime<Utc>, String)>,
) -> &'a [LogEntry] {
    let Some((at, message)) = last_seen else {
        return logs;
    };
    match logs
        .iter()
        .rposition(|e| e.timestamp == *at && &e.message == message)
    {
        Some(idx) => &logs[idx + 1..],
        None => {
            let start = logs.partition_point(|e| e.timestamp <= *at);
            &logs[start..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(secs: i64, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            message: message.to_string(),
        }
    }

    fn node(status: &str, total: u32, available: u32) -> Node {
        Node {
            node_id: "n1".to_string(),
            cpu_total: total,
            cpu_available: available,
            memory_total: 16,
            memory_available: 16,
            node_type: "balanced".to_string(),
            network_group: "default".to_string(),
            status: status.to_string(),
            last_heartbeat: Utc::now(),
            simulate_heartbeat: true,
            pods: Vec::new(),
        }
    }

    #[test]
    fn test_repeated_message_is_still_printed() {
        let logs = vec![
            entry(0, "Pod 1 launched"),
            entry(5, "Chaos Monkey: no victim"),
            entry(10, "Chaos Monkey: no victim"),
        ];
        let seen = (logs[1].timestamp, logs[1].message.clone());

        let fresh = fresh_entries(&logs, Some(&seen));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].timestamp, logs[2].timestamp);
    }

    #[test]
    fn test_rotated_out_entry_falls_back_to_timestamp() {
        let logs = vec![entry(10, "b"), entry(20, "c")];
        let seen = (entry(5, "a").timestamp, "a".to_string());
        assert_eq!(fresh_entries(&logs, Some(&seen)).len(), 2);

        let seen = (entry(10, "gone").timestamp, "gone".to_string());
        let fresh = fresh_entries(&logs, Some(&seen));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].message, "c");
    }

    #[test]
    fn test_nothing_seen_prints_everything() {
        let logs = vec![entry(0, "a"), entry(1, "b")];
        assert_eq!(fresh_entries(&logs, None).len(), 2);
    }

    #[test]
    fn test_active_cpu_does_not_overflow() {
        let nodes = vec![
            node("active", u32::MAX, 0),
            node("active", u32::MAX, 0),
            node("failed", 8, 0),
        ];
        let (used, total) = active_cpu(&nodes);
        assert_eq!(used, 2 * u64::from(u32::MAX));
        assert_eq!(total, used);
    }
}
