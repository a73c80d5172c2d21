use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use pcl_types::ChainId;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// URL prefix for a chain's endpoints.
pub fn chain_prefix(chain: ChainId) -> &'static str {
    match chain {
        ChainId::Fund => "/api/blockchain",
        ChainId::Project => "/api/blockchain/project",
    }
}

fn chain_routes(router: Router<AppState>, chain: ChainId) -> Router<AppState> {
    let base = chain_prefix(chain);
    router
        .route(
            &format!("{base}/add"),
            post(
                move |state: State<AppState>, body: Result<Json<Value>, JsonRejection>| {
                    handler::add_block(state, chain, body)
                },
            ),
        )
        .route(
            &format!("{base}/chain"),
            get(move |state: State<AppState>| handler::get_chain(state, chain)),
        )
        .route(
            &format!("{base}/verify"),
            get(move |state: State<AppState>| handler::verify_chain(state, chain)),
        )
        .route(
            &format!("{base}/verify-detail"),
            get(move |state: State<AppState>| handler::verify_chain_detailed(state, chain)),
        )
        .route(
            &format!("{base}/summary"),
            get(move |state: State<AppState>| handler::chain_summary(state, chain)),
        )
}

/// Build the axum router with all ledger endpoints.
pub fn build_router(state: AppState) -> Router {
    let router = ChainId::ALL
        .into_iter()
        .fold(Router::new(), chain_routes)
        .route("/api/health", get(handler::health_handler))
        .route("/api/signer", get(handler::signer_handler))
        .route("/api/zk/generate-proof", post(handler::generate_proof))
        .route("/api/zk/verify-proof", post(handler::verify_proof));

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
