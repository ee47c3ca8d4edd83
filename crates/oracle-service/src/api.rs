//! HTTP API: health, telemetry, bridging request status queries and the
//! ingest endpoints fed by the chain observers and the bridge.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use oracle_chains::ConfirmedBlock;
use oracle_core::{BatchEvent, CoreError, LifecycleState, ObservedTxs, Oracle};
use oracle_types::{ChainId, ChainType, TxHash, TxKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

type AppState = Arc<Oracle>;

pub fn router(oracle: Arc<Oracle>) -> Router {
	Router::new()
		.route("/health", get(health_check))
		.route("/metrics", get(get_metrics))
		.route(
			"/api/bridging-request-state/{chain_id}/{tx_hash}",
			get(get_bridging_request_state),
		)
		.route(
			"/api/bridging-request-state/{chain_id}",
			post(get_bridging_request_states),
		)
		.route("/api/batch-events", post(apply_batch_event))
		.route("/api/chains/{chain_id}/blocks", post(ingest_block))
		.with_state(oracle)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

pub async fn start_http_server(oracle: Arc<Oracle>, host: &str, port: u16) -> anyhow::Result<()> {
	let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
	info!("API server listening on {}:{}", host, port);

	axum::serve(listener, router(oracle)).await?;
	Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
	error: String,
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.0, Json(ErrorResponse { error: self.1 })).into_response()
	}
}

impl From<CoreError> for ApiError {
	fn from(e: CoreError) -> Self {
		let status = match &e {
			CoreError::UnknownChain(_) => StatusCode::NOT_FOUND,
			CoreError::ChainTypeMismatch { .. } => StatusCode::BAD_REQUEST,
			CoreError::State(_) => StatusCode::CONFLICT,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};
		Self(status, e.to_string())
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
	status: String,
	lifecycle: String,
}

async fn health_check(State(oracle): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
	let lifecycle = oracle.state().await;
	let (status, label) = if lifecycle == LifecycleState::Running {
		(StatusCode::OK, "healthy")
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
	};

	(
		status,
		Json(HealthResponse {
			status: label.to_string(),
			lifecycle: lifecycle.to_string(),
		}),
	)
}

async fn get_metrics(State(oracle): State<AppState>) -> impl IntoResponse {
	Json(oracle.telemetry().snapshot())
}

async fn get_bridging_request_state(
	State(oracle): State<AppState>,
	Path((chain_id, tx_hash)): Path<(String, String)>,
) -> Result<Response, ApiError> {
	let key = TxKey::new(chain_id, tx_hash);
	let state = oracle
		.states()
		.get(&key)
		.await
		.map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

	match state {
		Some(state) => Ok(Json(state).into_response()),
		None => Err(ApiError(
			StatusCode::NOT_FOUND,
			format!("Bridging request {} not found", key),
		)),
	}
}

#[derive(Debug, Deserialize)]
struct StatesRequest {
	tx_hashes: Vec<TxHash>,
}

async fn get_bridging_request_states(
	State(oracle): State<AppState>,
	Path(chain_id): Path<String>,
	Json(request): Json<StatesRequest>,
) -> Result<Response, ApiError> {
	let states = oracle
		.states()
		.get_multiple(&ChainId::from(chain_id), &request.tx_hashes)
		.await
		.map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

	Ok(Json(states).into_response())
}

async fn apply_batch_event(
	State(oracle): State<AppState>,
	Json(event): Json<BatchEvent>,
) -> Result<StatusCode, ApiError> {
	oracle.apply_batch_event(&event).await.map_err(|e| {
		warn!(batch_id = event.batch_id, error = %e, "Batch event rejected");
		ApiError::from(e)
	})?;

	Ok(StatusCode::NO_CONTENT)
}

/// A block as delivered by a chain observer. `txs` take the shape of the
/// chain's family.
#[derive(Debug, Deserialize)]
struct IngestBlockRequest {
	block: ConfirmedBlock,
	#[serde(default)]
	txs: Vec<serde_json::Value>,
}

async fn ingest_block(
	State(oracle): State<AppState>,
	Path(chain_id): Path<String>,
	Json(request): Json<IngestBlockRequest>,
) -> Result<StatusCode, ApiError> {
	let chain_id = ChainId::from(chain_id);
	let chain_type = oracle
		.config()
		.chain_type(&chain_id)
		.ok_or_else(|| ApiError::from(CoreError::UnknownChain(chain_id.clone())))?;

	let txs = serde_json::Value::Array(request.txs);
	let observed = match chain_type {
		ChainType::Cardano => serde_json::from_value(txs).map(ObservedTxs::Cardano),
		ChainType::Evm => serde_json::from_value(txs).map(ObservedTxs::Evm),
	}
	.map_err(|e| ApiError(StatusCode::BAD_REQUEST, format!("Invalid {} txs: {}", chain_type, e)))?;

	oracle
		.ingest_block(&chain_id, request.block, observed)
		.await
		.map_err(|e| {
			warn!(chain_id = %chain_id, error = %e, "Block ingest failed");
			ApiError::from(e)
		})?;

	Ok(StatusCode::ACCEPTED)
}
