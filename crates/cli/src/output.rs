//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of rows, or `raw` as JSON
pub fn print_rows<R: Tabled, T: Serialize + ?Sized>(rows: &[R], raw: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(raw),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to render JSON: {}", e)),
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a utilization fraction as a percentage
pub fn format_utilization(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Color a utilization fraction against the autoscale threshold
pub fn color_utilization(fraction: f64) -> String {
    let formatted = format_utilization(fraction);
    if fraction >= 0.8 {
        formatted.red().to_string()
    } else if fraction >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Shorten a node id to its first segment for tables
pub fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "active" | "healthy" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "failed" | "unhealthy" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_utilization() {
        assert_eq!(format_utilization(0.0), "0.0%");
        assert_eq!(format_utilization(0.825), "82.5%");
        assert_eq!(format_utilization(1.0), "100.0%");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("6f1c2a9e-1111-2222-3333-444455556666"), "6f1c2a9e");
        assert_eq!(short_id("plain"), "plain");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2024-01-02 03:04:05");
    }
}
