//! HTTP and WebSocket request surface

use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use controller_lib::{
    health::{ComponentStatus, HealthRegistry},
    render_csv, ChaosInjector, ChaosOutcome, ClusterError, ClusterEvent, ClusterMetrics,
    ClusterState, EventHub, NodeId, NodeSpec, NodeType, PodSpec, SchedulingPolicy,
};
use futures_util::{SinkExt, StreamExt};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cluster: ClusterState,
    pub chaos: Arc<ChaosInjector>,
    pub hub: EventHub,
    pub health_registry: HealthRegistry,
    pub metrics: ClusterMetrics,
}

impl AppState {
    pub fn new(
        cluster: ClusterState,
        chaos: Arc<ChaosInjector>,
        hub: EventHub,
        health_registry: HealthRegistry,
    ) -> Self {
        let metrics = cluster.metrics().clone();
        Self {
            cluster,
            chaos,
            hub,
            health_registry,
            metrics,
        }
    }
}

/// Error returned to HTTP callers as `{ "error": ..., "code": ... }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        let status = match err {
            ClusterError::NotFound(_) => StatusCode::NOT_FOUND,
            ClusterError::InvalidInput(_) | ClusterError::NoCapacity { .. } => {
                StatusCode::BAD_REQUEST
            }
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ClusterError::InvalidInput(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message, "code": self.code }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn invalid(message: &str) -> ApiError {
    ClusterError::InvalidInput(message.to_string()).into()
}

fn parse_node_id(raw: Option<&str>) -> Result<NodeId, ApiError> {
    let raw = raw.ok_or_else(|| invalid("missing node_id"))?;
    raw.trim()
        .parse()
        .map_err(|_| invalid(&format!("malformed node_id '{}'", raw)))
}

#[derive(Debug, Deserialize)]
pub struct AddNodeRequest {
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub node_type: Option<String>,
    pub network_group: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddNodeResponse {
    pub message: String,
    pub node_id: NodeId,
}

async fn add_node(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddNodeRequest>, JsonRejection>,
) -> ApiResult<AddNodeResponse> {
    let Json(req) = payload?;
    let cpu = req
        .cpu
        .ok_or_else(|| invalid("missing CPU core specification"))?;
    let memory = req.memory.unwrap_or(state.cluster.defaults().node_memory);

    let mut spec = NodeSpec::new(cpu, memory)?;
    if let Some(node_type) = req.node_type.as_deref() {
        spec = spec.with_node_type(node_type.parse::<NodeType>()?);
    }
    if let Some(group) = req.network_group {
        spec = spec.with_network_group(group);
    }

    let node_id = state.cluster.add_node(spec);
    state.cluster.publish_shape();
    Ok(Json(AddNodeResponse {
        message: "Node added successfully".to_string(),
        node_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct NodeRequest {
    pub node_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoveNodeResponse {
    pub message: String,
    pub pods_rescheduled: usize,
    pub pods_unplaced: usize,
}

async fn remove_node(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NodeRequest>, JsonRejection>,
) -> ApiResult<RemoveNodeResponse> {
    let Json(req) = payload?;
    let node_id = parse_node_id(req.node_id.as_deref())?;

    let report = state.cluster.remove_node(&node_id)?;
    state.cluster.publish_shape();
    Ok(Json(RemoveNodeResponse {
        message: format!("Node {} removed", node_id),
        pods_rescheduled: report.moved.len(),
        pods_unplaced: report.unplaced.len(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleSimulationRequest {
    pub node_id: Option<String>,
    pub simulate: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn toggle_simulation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToggleSimulationRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(req) = payload?;
    let node_id = parse_node_id(req.node_id.as_deref())?;
    let simulate = req.simulate.ok_or_else(|| invalid("missing simulate flag"))?;

    state.cluster.set_simulation(&node_id, simulate)?;
    Ok(Json(MessageResponse {
        message: format!("Node {} simulation set to {}", node_id, simulate),
    }))
}

async fn list_nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "nodes": state.cluster.list_nodes() }))
}

#[derive(Debug, Deserialize)]
pub struct LaunchPodRequest {
    #[serde(alias = "cpu_required")]
    pub cpu: Option<u32>,
    #[serde(alias = "memory_required")]
    pub memory: Option<u32>,
    #[serde(alias = "scheduling_algorithm")]
    pub policy: Option<String>,
    pub network_group: Option<String>,
    pub node_affinity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LaunchPodResponse {
    pub message: String,
    pub pod_id: u64,
    pub assigned_node: NodeId,
    pub scheduling_algorithm: SchedulingPolicy,
}

async fn launch_pod(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LaunchPodRequest>, JsonRejection>,
) -> ApiResult<LaunchPodResponse> {
    let Json(req) = payload?;
    let cpu = req.cpu.ok_or_else(|| invalid("missing pod CPU requirement"))?;
    let memory = req.memory.unwrap_or(state.cluster.defaults().pod_memory);
    let policy = req
        .policy
        .as_deref()
        .map(SchedulingPolicy::from_name)
        .unwrap_or_default();
    let affinity = match req.node_affinity.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(name.parse::<NodeType>()?),
    };

    let mut spec = PodSpec::new(cpu, memory)?.with_affinity(affinity);
    if let Some(group) = req.network_group {
        spec = spec.with_network_group(group);
    }

    let placement = state.cluster.launch_pod(spec, policy)?;
    state.cluster.publish_shape();
    Ok(Json(LaunchPodResponse {
        message: "Pod launched successfully".to_string(),
        pod_id: placement.pod_id,
        assigned_node: placement.node_id,
        scheduling_algorithm: placement.policy,
    }))
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub message: String,
    pub reactivated: bool,
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NodeRequest>, JsonRejection>,
) -> ApiResult<HeartbeatResponse> {
    let Json(req) = payload?;
    let node_id = parse_node_id(req.node_id.as_deref())?;

    let reactivated = state.cluster.set_heartbeat(&node_id)?;
    Ok(Json(HeartbeatResponse {
        message: "Heartbeat updated".to_string(),
        reactivated,
    }))
}

#[derive(Debug, Serialize)]
pub struct ChaosResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: ChaosOutcome,
}

async fn chaos_monkey(State(state): State<Arc<AppState>>) -> Json<ChaosResponse> {
    let outcome = state.chaos.unleash();
    state.cluster.publish_shape();
    Json(ChaosResponse {
        message: outcome.message(),
        outcome,
    })
}

async fn logs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "logs": state.cluster.logs() }))
}

async fn utilization_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "history": state.cluster.utilization_history() }))
}

async fn unplaced_pods(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "pods": state.cluster.unplaced_pods() }))
}

async fn report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "rows": state.cluster.report() }))
}

async fn download_report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let csv = render_csv(&state.cluster.report());
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"cluster_report.csv\"",
            ),
        ],
        csv,
    )
}

/// Upgrade to a WebSocket pushing snapshots and alerts as JSON text frames
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let events = state.hub.subscribe();
    let initial = ClusterEvent::Snapshot(Arc::new(state.cluster.snapshot()));
    ws.on_upgrade(move |socket| stream_events(socket, initial, events))
}

async fn stream_events(
    socket: WebSocket,
    initial: ClusterEvent,
    events: broadcast::Receiver<ClusterEvent>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(events);
    debug!("WebSocket subscriber connected");

    if send_event(&mut sender, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "WebSocket subscriber lagging, events dropped");
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("WebSocket subscriber disconnected");
}

async fn send_event<S>(sender: &mut S, event: &ClusterEvent) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to serialize cluster event");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

/// Health check response - returns 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once the control loops run
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    state.cluster.publish_shape();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/add_node", post(add_node))
        .route("/remove_node", post(remove_node))
        .route("/toggle_simulation", post(toggle_simulation))
        .route("/list_nodes", get(list_nodes))
        .route("/launch_pod", post(launch_pod))
        .route("/heartbeat", post(heartbeat))
        .route("/chaos_monkey", post(chaos_monkey))
        .route("/logs", get(logs))
        .route("/utilization_history", get(utilization_history))
        .route("/unplaced_pods", get(unplaced_pods))
        .route("/report", get(report))
        .route("/download_report", get(download_report))
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` fires
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    info!("API server stopped");
    Ok(())
}
