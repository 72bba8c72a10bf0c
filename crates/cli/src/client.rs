//! API client for communicating with the cluster controller

use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// Errors returned by [`ApiClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl ClientError {
    /// Machine-readable code reported by the controller, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// HTTP client for the cluster controller
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.client.get(url).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Make a GET request and return the raw body
    pub async fn get_text(&self, path: &str) -> ClientResult<String> {
        let url = self.base_url.join(path)?;
        let response = self.client.get(url).send().await?;
        Ok(Self::check(response).await?.text().await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let url = self.base_url.join(path)?;
        let response = self.client.post(url).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => (err.code, err.error),
            Err(_) => (None, body),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    pub pod_id: u64,
    pub cpu: u32,
    pub memory: u32,
    pub network_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<String>,
    #[serde(default)]
    pub cpu_usage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub cpu_total: u32,
    pub cpu_available: u32,
    pub memory_total: u32,
    pub memory_available: u32,
    pub node_type: String,
    pub network_group: String,
    pub status: String,
    pub last_heartbeat: DateTime<Utc>,
    pub simulate_heartbeat: bool,
    #[serde(default)]
    pub pods: Vec<Pod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeList {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodeRequest {
    pub cpu: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodeResponse {
    pub message: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveNodeResponse {
    pub message: String,
    pub pods_rescheduled: usize,
    pub pods_unplaced: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleSimulationRequest {
    pub node_id: String,
    pub simulate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub message: String,
    #[serde(default)]
    pub reactivated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPodRequest {
    pub cpu: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    pub policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPodResponse {
    pub message: String,
    pub pod_id: u64,
    pub assigned_node: String,
    pub scheduling_algorithm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosResponse {
    pub outcome: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unplaced: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogList {
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub timestamp: DateTime<Utc>,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationHistory {
    pub history: Vec<UtilizationSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodList {
    pub pods: Vec<Pod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub node_id: String,
    pub cpu_total: u32,
    pub cpu_available: u32,
    pub memory_total: u32,
    pub memory_available: u32,
    pub status: String,
    pub node_type: String,
    pub network_group: String,
    pub pods: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_get_list_nodes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/list_nodes")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"nodes":[{"node_id":"n1","cpu_total":8,"cpu_available":6,
                "memory_total":16,"memory_available":12,"node_type":"balanced",
                "network_group":"default","status":"active",
                "last_heartbeat":"2024-01-02T03:04:05Z","simulate_heartbeat":true,
                "pods":[{"pod_id":1,"cpu":2,"memory":4,"network_group":"default","cpu_usage":1.5}]}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let list: NodeList = client.get("list_nodes").await.unwrap();

        mock.assert_async().await;
        assert_eq!(list.nodes.len(), 1);
        assert_eq!(list.nodes[0].cpu_available, 6);
        assert_eq!(list.nodes[0].pods[0].cpu_usage, 1.5);
    }

    #[tokio::test]
    async fn test_post_launch_pod_sends_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/launch_pod")
            .match_body(Matcher::PartialJsonString(
                r#"{"cpu":2,"policy":"best_fit"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"message":"Pod launched successfully","pod_id":7,
                "assigned_node":"n1","scheduling_algorithm":"best_fit"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let request = LaunchPodRequest {
            cpu: 2,
            memory: None,
            policy: "best_fit".to_string(),
            network_group: None,
            node_affinity: None,
        };
        let response: LaunchPodResponse = client.post("launch_pod", &request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.pod_id, 7);
        assert_eq!(response.assigned_node, "n1");
    }

    #[tokio::test]
    async fn test_structured_error_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/heartbeat")
            .with_status(404)
            .with_body(r#"{"error":"node abc not found","code":"not_found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<HeartbeatResponse, _>(
                "heartbeat",
                &NodeRequest {
                    node_id: "abc".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some("not_found"));
        assert_eq!(err.to_string(), "API error (404): node abc not found");
    }

    #[tokio::test]
    async fn test_plain_error_body_is_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/download_report")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.get_text("download_report").await.unwrap_err();
        assert!(err.code().is_none());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ClientError::Url(_))
        ));
    }
}
