use std::net::SocketAddr;
use std::sync::Arc;

use alloy::primitives::{I256, Sign};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::try_join;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use dashboard::config::LocalConfig;
use dashboard::snapshot_service::{PublishedSnapshot, SnapshotService};
use dashboard::utils;
use mock_ledger::amounts::human_to_base_units;
use mock_ledger::Ledger;

struct AppState {
    snapshot: Arc<RwLock<PublishedSnapshot>>,
    ledger: Option<Arc<RwLock<Ledger>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateRequest {
    action: String,
    asset: String,
    amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    version: u64,
}

async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<PublishedSnapshot> {
    Json(state.snapshot.read().await.clone())
}

/// Applies one user action to the simulated ledger. Amounts arrive as
/// human-readable token strings and are truncated to the asset's decimals.
async fn post_simulate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, (StatusCode, String)> {
    let Some(ledger) = &state.ledger else {
        return Err((
            StatusCode::CONFLICT,
            "simulation is only available in test mode".to_string(),
        ));
    };

    let mut ledger = ledger.write().await;

    let decimals = ledger
        .reserves
        .get(&request.asset.to_lowercase())
        .map(|reserve| reserve.decimals)
        .unwrap_or(18);
    let Some(units) = human_to_base_units(&request.amount, decimals) else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} is not a valid token amount", request.amount),
        ));
    };
    let Some(amount) = I256::checked_from_sign_and_abs(Sign::Positive, units) else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} does not fit a signed balance", request.amount),
        ));
    };

    let applied = match request.action.as_str() {
        "supply" => ledger.apply_supply(&request.asset, amount),
        "withdraw" => ledger.apply_withdraw(&request.asset, amount),
        "borrow" => ledger.apply_borrow(&request.asset, amount),
        "repay" => ledger.apply_repay(&request.asset, amount),
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("{} is not a valid action", other),
            ))
        }
    };

    match applied {
        Ok(()) => Ok(Json(SimulateResponse {
            version: ledger.version,
        })),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

async fn start_snapshot_api_server(state: Arc<AppState>) -> Result<()> {
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/snapshot", get(get_snapshot))
        .route("/simulate", post(post_simulate))
        .with_state(state);
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting snapshot API server on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

/// Main entry point for the Lending Dashboard Service
///
/// This function performs the following steps:
/// 1. Initializes the pre-run environment
/// 2. Seeds the simulated ledger when test mode is enabled
/// 3. Starts the snapshot service
/// 4. Starts the snapshot API server
/// 5. Handles if any of the services panics
#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    init_pre_run()?;

    info!("Starting the Lending Dashboard Service");

    let local_config = Arc::new(LocalConfig::load_from_env()?);

    let ledger = local_config
        .test_mode
        .then(|| Arc::new(RwLock::new(Ledger::seeded())));
    if ledger.is_some() {
        info!("Test mode enabled, projecting the simulated ledger");
    }

    let snapshot = Arc::new(RwLock::new(PublishedSnapshot::default()));

    let snapshot_service =
        SnapshotService::start_snapshot_service(&snapshot, &local_config, ledger.clone()).await?;

    let state = Arc::new(AppState { snapshot, ledger });
    let api_handle = tokio::spawn(start_snapshot_api_server(state));

    tokio::select! {
        result = async {
            match try_join!(snapshot_service, api_handle) {
                Ok((snapshot_result, api_result)) => {
                    if let Err(e) = snapshot_result {
                        let error_message = e.chain().map(|e| e.to_string()).collect::<Vec<String>>().join(" -> ");
                        error!("Snapshot service failed with error: {}", error_message);
                        return Err(anyhow::anyhow!("Snapshot service failed: {}", error_message));
                    }

                    if let Err(e) = api_result {
                        let error_message = e.chain().map(|e| e.to_string()).collect::<Vec<String>>().join(" -> ");
                        error!("Snapshot API server failed with error: {}", error_message);
                    }

                    info!("All services stopped");
                    Ok(())
                }
                Err(e) => {
                    error!("Service task panicked: {}", e);
                    Err(anyhow::anyhow!("Service task panicked: {}", e))
                }
            }
        } => {
            result
        }
    }?;

    Ok(())
}

/// Initializes the pre-run environment
///
/// This function performs the following steps:
/// 1. Loads environment variables from the `.env` file
/// 2. Sets up the logger
///
/// # Returns
/// * `Result<()>` - Success or error if any step fails
fn init_pre_run() -> Result<()> {
    dotenvy::dotenv().context("Failed to load environment variables")?;
    utils::logger::setup_logger().context("Failed to setup logger")?;
    Ok(())
}
