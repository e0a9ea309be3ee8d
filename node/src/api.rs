//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the airdrop node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                | Description                                  |
//! |--------|---------------------|----------------------------------------------|
//! | GET    | `/health`           | Liveness probe                               |
//! | GET    | `/status`           | Active and published roots, leaf count       |
//! | POST   | `/generate-merkle`  | Build a distribution, make it active         |
//! | POST   | `/update-merkle`    | Publish a root to the ledger                 |
//! | GET    | `/distribution`     | The active distribution's dump               |
//! | GET    | `/claims/:address`  | Allocation, proof and claim state            |
//! | POST   | `/claims/:address`  | Claim the unlocked amount for an address     |
//! | GET    | `/ws`               | WebSocket for live distribution events       |
//!
//! Errors are `{ "error": <message>, "kind": <ErrorKind> }` with the status
//! picked by [`status_for`].

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use airdrop_protocol::config::{chain_name, explorer_tx_url, BSC_TESTNET_CHAIN_ID};
use airdrop_protocol::error::ErrorKind;
use airdrop_protocol::merkle::{parse_allocations, AllocationInput, Dump, MerkleTree};
use airdrop_protocol::types::{hash_to_hex, parse_root, Address, U256};
use airdrop_protocol::{
    publish_root, AirdropError, ClaimReceipt, ClaimReconciler, ClaimState, Ledger, LedgerError,
    RootUpdate,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone. Everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Chain the ledger lives on.
    pub chain_id: u64,
    /// The distribution claims are served from. `None` until one is
    /// generated or loaded.
    pub distribution: Arc<RwLock<Option<Arc<MerkleTree>>>>,
    /// The ledger collaborator.
    pub ledger: Arc<dyn Ledger>,
    /// Upper bound on any single ledger call.
    pub ledger_timeout: Duration,
    /// Where generated dumps are saved, if anywhere.
    pub dump_path: Option<PathBuf>,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<NodeEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Replace the active distribution.
    pub async fn set_distribution(&self, tree: Arc<MerkleTree>) {
        self.metrics.active_leaves.set(tree.len() as i64);
        *self.distribution.write().await = Some(tree);
    }

    async fn active_tree(&self) -> Result<Arc<MerkleTree>, ApiError> {
        self.distribution.read().await.clone().ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "No merkle distribution has been generated or loaded",
            )
        })
    }

    fn emit(&self, event: NodeEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

/// Run a ledger-bound future under the configured timeout.
///
/// A timeout surfaces as [`LedgerError::Unavailable`]; whatever the
/// ledger did in the meantime is unknown, so nothing is assumed.
pub async fn with_ledger_timeout<T, F>(state: &AppState, fut: F) -> airdrop_protocol::Result<T>
where
    F: Future<Output = airdrop_protocol::Result<T>>,
{
    match tokio::time::timeout(state.ledger_timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            state.metrics.ledger_timeouts_total.inc();
            tracing::warn!(timeout = ?state.ledger_timeout, "ledger call timed out");
            Err(AirdropError::Ledger(LedgerError::Unavailable(format!(
                "no answer within {:?}",
                state.ledger_timeout
            ))))
        }
    }
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// A distribution was built and made active.
    TreeGenerated {
        root: String,
        leaves: usize,
        timestamp: i64,
    },
    /// The ledger accepted a new root.
    RootUpdated {
        root: String,
        tx_hash: String,
        timestamp: i64,
    },
    /// A claim was confirmed.
    TokensClaimed {
        address: String,
        unlocked: String,
        claimed: String,
        tx_hash: String,
        timestamp: i64,
    },
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/generate-merkle", post(generate_merkle_handler))
        .route("/update-merkle", post(update_merkle_handler))
        .route("/distribution", get(distribution_handler))
        .route(
            "/claims/:address",
            get(claim_lookup_handler).post(claim_submit_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An HTTP error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message.into() }),
        }
    }
}

/// HTTP status for a protocol error.
pub fn status_for(err: &AirdropError) -> StatusCode {
    if let AirdropError::StaleDistribution { .. } = err {
        return StatusCode::CONFLICT;
    }
    match err.kind() {
        ErrorKind::Validation | ErrorKind::FormatVersion => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Ambiguous | ErrorKind::AlreadyClaimed => StatusCode::CONFLICT,
        ErrorKind::Ledger => StatusCode::BAD_GATEWAY,
        ErrorKind::InconsistentState | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AirdropError> for ApiError {
    fn from(err: AirdropError) -> Self {
        Self {
            status: status_for(&err),
            body: serde_json::json!({
                "error": err.to_string(),
                "kind": err.kind().as_str(),
            }),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: serde_json::json!({
                "error": rejection.body_text(),
                "kind": ErrorKind::Validation.as_str(),
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /update-merkle`. The root is kept loose so a non-string
/// value gets the same message as a malformed one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMerkleRequest {
    pub merkle_root: Option<serde_json::Value>,
}

/// Pull the allocation list out of a `POST /generate-merkle` body.
///
/// Read field by field rather than through a typed extractor, so a wrong
/// type inside an entry is reported with that entry's index. A missing
/// field reads as empty and fails validation the same way.
fn allocation_inputs(body: &serde_json::Value) -> Result<Vec<AllocationInput>, ApiError> {
    let entries = body
        .get("allocations")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "Invalid request: allocations array is required",
            )
        })?;

    let mut inputs = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match entry_input(index, entry) {
            Ok(input) => inputs.push(input),
            Err(e) => {
                // A malformed value in an earlier entry is reported first.
                parse_allocations(&inputs)?;
                return Err(e.into());
            }
        }
    }
    Ok(inputs)
}

fn entry_input(index: usize, entry: &serde_json::Value) -> airdrop_protocol::Result<AllocationInput> {
    if !entry.is_object() {
        return Err(AirdropError::InvalidAllocation {
            index,
            reason: format!("entry must be an object, got {}", entry),
        });
    }
    let field = |name: &str| match entry.get(name) {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(AirdropError::InvalidAllocation {
            index,
            reason: format!("{} must be a string, got {}", name, other),
        }),
    };
    Ok(AllocationInput::new(field("address")?, field("amount")?))
}

/// `POST /generate-merkle`: validate, build, activate, and return the dump.
///
/// The whole batch is rejected on the first malformed entry.
async fn generate_merkle_handler(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<Dump>, ApiError> {
    let parsed = payload
        .map_err(ApiError::from)
        .and_then(|Json(body)| allocation_inputs(&body));
    let allocations = match parsed {
        Ok(allocations) => allocations,
        Err(e) => {
            state.metrics.generation_failures_total.inc();
            return Err(e);
        }
    };

    let started = Instant::now();
    let built = tokio::task::spawn_blocking(move || MerkleTree::from_strings(&allocations))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let tree = match built {
        Ok(tree) => tree,
        Err(e) => {
            state.metrics.generation_failures_total.inc();
            tracing::info!(error = %e, "allocation batch rejected");
            return Err(e.into());
        }
    };
    state
        .metrics
        .tree_generation_seconds
        .observe(started.elapsed().as_secs_f64());
    state.metrics.trees_generated_total.inc();
    state
        .metrics
        .allocations_processed_total
        .inc_by(tree.len() as u64);

    let dump = tree.dump();
    if let Some(path) = &state.dump_path {
        dump.save(path)?;
    }

    tracing::info!(
        root = %dump.root,
        leaves = tree.len(),
        depth = tree.depth(),
        "distribution generated"
    );
    state.emit(NodeEvent::TreeGenerated {
        root: dump.root.clone(),
        leaves: tree.len(),
        timestamp: now_millis(),
    });
    state.set_distribution(Arc::new(tree)).await;

    Ok(Json(dump))
}

/// `POST /update-merkle`: publish a root, skipping the transaction when
/// the ledger already holds it.
async fn update_merkle_handler(
    State(state): State<AppState>,
    payload: Result<Json<UpdateMerkleRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let root = match req.merkle_root {
        None | Some(serde_json::Value::Null) => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "Missing required parameter: merkleRoot",
            ))
        }
        Some(serde_json::Value::String(raw)) => parse_root(&raw)?,
        Some(other) => return Err(AirdropError::InvalidRoot(other.to_string()).into()),
    };

    let outcome = with_ledger_timeout(&state, publish_root(state.ledger.as_ref(), root)).await;
    match outcome {
        Ok(RootUpdate::Unchanged { current }) => {
            state.metrics.root_updates_unchanged_total.inc();
            Ok(Json(serde_json::json!({
                "message": "New merkle root is the same as current. No update needed.",
                "txHash": null,
                "currentMerkleRoot": hash_to_hex(&current),
            }))
            .into_response())
        }
        Ok(RootUpdate::Updated { tx_hash, updated }) => {
            state.metrics.root_updates_total.inc();
            state.emit(NodeEvent::RootUpdated {
                root: hash_to_hex(&updated),
                tx_hash: tx_hash.clone(),
                timestamp: now_millis(),
            });
            Ok(Json(serde_json::json!({
                "message": "Merkle root updated successfully",
                "txHash": tx_hash,
                "updatedMerkleRoot": hash_to_hex(&updated),
                "explorerUrl": explorer_tx_url(&tx_hash),
            }))
            .into_response())
        }
        Err(AirdropError::InconsistentState {
            requested,
            observed,
            tx_hash,
            ..
        }) => {
            state.metrics.inconsistent_readbacks_total.inc();
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Merkle root update failed - new value does not match requested value",
                    "kind": ErrorKind::InconsistentState.as_str(),
                    "txHash": tx_hash,
                    "requestedMerkleRoot": requested,
                    "updatedMerkleRoot": observed,
                })),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `GET /distribution`: the active dump, for claim front ends.
async fn distribution_handler(State(state): State<AppState>) -> Result<Json<Dump>, ApiError> {
    let tree = state.active_tree().await?;
    Ok(Json(tree.dump()))
}

/// `GET /claims/:address`: where an address stands in the active
/// distribution.
async fn claim_lookup_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ClaimLookupResponse>, ApiError> {
    let address = Address::parse(&address)?;
    let tree = state.active_tree().await?;
    let index = tree.find(&address)?;
    let amount = tree.allocation(index)?.amount;
    let proof = tree.proof_hex(index)?;

    let reconciler = ClaimReconciler::new(Arc::clone(&tree), Arc::clone(&state.ledger));
    let claim = with_ledger_timeout(&state, reconciler.status(&address)).await?;

    Ok(Json(ClaimLookupResponse {
        address,
        amount,
        tree_index: index,
        proof,
        root: tree.root_hex(),
        claim,
    }))
}

/// `POST /claims/:address`: claim everything currently unlocked.
async fn claim_submit_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ClaimSubmitResponse>, ApiError> {
    let address = Address::parse(&address)?;
    let tree = state.active_tree().await?;

    let reconciler = ClaimReconciler::new(tree, Arc::clone(&state.ledger));
    let receipt = match with_ledger_timeout(&state, reconciler.claim(&address)).await {
        Ok(receipt) => receipt,
        Err(e) => {
            state.metrics.claim_failures_total.inc();
            if let AirdropError::InconsistentState { .. } = e {
                state.metrics.inconsistent_readbacks_total.inc();
            }
            return Err(e.into());
        }
    };

    state.metrics.claims_total.inc();
    state.emit(NodeEvent::TokensClaimed {
        address: address.to_hex(),
        unlocked: receipt.unlocked.to_string(),
        claimed: receipt.claimed.to_string(),
        tx_hash: receipt.tx_hash.clone(),
        timestamp: now_millis(),
    });
    Ok(Json(ClaimSubmitResponse {
        explorer_url: explorer_tx_url(&receipt.tx_hash),
        receipt,
    }))
}

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`] messages. The connection is
/// push-only; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

/// Default chain for a freshly built state.
pub const DEFAULT_CHAIN_ID: u64 = BSC_TESTNET_CHAIN_ID;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
