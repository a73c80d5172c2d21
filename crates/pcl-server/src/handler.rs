use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use pcl_crypto::{Fingerprint, SignatureScheme};
use pcl_ledger::{ChainService, LedgerResult};
use pcl_types::{payload_from_value, ChainId, Payload};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChainService>,
    pub signer: SignerInfo,
}

/// Public description of how blocks are signed.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SignerInfo {
    pub scheme: SignatureScheme,
    /// Hex verifying key; only asymmetric schemes publish one.
    pub public_key: Option<String>,
}

impl AppState {
    pub fn new(service: ChainService, signer: SignerInfo) -> Self {
        Self {
            service: Arc::new(service),
            signer,
        }
    }
}

/// Ledger calls block on the store, so they run off the async workers.
async fn run_blocking<T, F>(state: &AppState, f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ChainService) -> LedgerResult<T> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| ServerError::Internal(format!("ledger task failed: {e}")))?;
    Ok(result?)
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn signer_handler(State(state): State<AppState>) -> Json<SignerInfo> {
    Json(state.signer)
}

pub async fn add_block(
    State(state): State<AppState>,
    chain: ChainId,
    body: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(body) = body.map_err(|r| ServerError::InvalidPayload(r.body_text()))?;
    let payload =
        payload_from_value(body).map_err(|e| ServerError::InvalidPayload(e.to_string()))?;
    let block = run_blocking(&state, move |svc| svc.add_block(chain, payload)).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{chain} block added"),
        "block": block,
    })))
}

pub async fn get_chain(State(state): State<AppState>, chain: ChainId) -> ServerResult<Json<Value>> {
    let blocks = run_blocking(&state, move |svc| svc.get_chain(chain)).await?;
    Ok(Json(json!({"success": true, "chain": blocks})))
}

pub async fn verify_chain(
    State(state): State<AppState>,
    chain: ChainId,
) -> ServerResult<Json<Value>> {
    let valid = run_blocking(&state, move |svc| svc.verify_chain(chain)).await?;
    Ok(Json(json!({"success": true, "valid": valid})))
}

pub async fn verify_chain_detailed(
    State(state): State<AppState>,
    chain: ChainId,
) -> ServerResult<Json<Value>> {
    let report = run_blocking(&state, move |svc| svc.verify_chain_detailed(chain)).await?;
    Ok(Json(json!({
        "success": true,
        "valid": report.valid,
        "broken_at_index": report.broken_at_index,
        "reason": report.reason,
    })))
}

pub async fn chain_summary(
    State(state): State<AppState>,
    chain: ChainId,
) -> ServerResult<Json<Value>> {
    let summary = run_blocking(&state, move |svc| svc.summary(chain)).await?;
    Ok(Json(json!({"success": true, "summary": summary})))
}

type ProofResponse = (StatusCode, Json<Value>);

fn bad_request(message: impl Into<String>) -> ProofResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "message": message.into()})),
    )
}

#[derive(Debug, Deserialize)]
pub struct ProofRequest {
    pub record: Payload,
    #[serde(default)]
    pub selected_fields: Vec<String>,
}

pub async fn generate_proof(
    req: Result<Json<ProofRequest>, JsonRejection>,
) -> Result<Json<Value>, ProofResponse> {
    let Json(req) = req.map_err(|r| bad_request(r.body_text()))?;
    let disclosure = Fingerprint::generate(&req.record, req.selected_fields.as_slice())
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(json!({
        "success": true,
        "proof": disclosure.proof,
        "hash": disclosure.hash,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyProofRequest {
    pub proof: Payload,
    pub hash: String,
}

pub async fn verify_proof(
    req: Result<Json<VerifyProofRequest>, JsonRejection>,
) -> ProofResponse {
    let Json(req) = match req {
        Ok(req) => req,
        Err(r) => return bad_request(r.body_text()),
    };
    if Fingerprint::matches(&req.proof, &req.hash) {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Proof verified",
                "proof": req.proof,
            })),
        )
    } else {
        bad_request("Invalid or tampered proof")
    }
}
