use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use mock_ledger::Ledger;

use crate::asset_lists::{build_borrow_list, build_supply_list};
use crate::config::LocalConfig;
use crate::eligibility::models::{BorrowRow, SupplyRow};
use crate::market_provider::models::DataFeeds;
use crate::market_provider::MarketDataProvider;
use crate::reserve_reconciler::{reconcile, AppSnapshot};

/// The derived asset lists, gated on loading so consumers never see rows
/// computed from half a cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub loading: bool,
    pub supply_rows: Vec<SupplyRow>,
    pub borrow_rows: Vec<BorrowRow>,
}

impl Default for DashboardView {
    fn default() -> Self {
        DashboardView {
            loading: true,
            supply_rows: Vec::new(),
            borrow_rows: Vec::new(),
        }
    }
}

/// What the HTTP surface serves: the reconciled application state plus the
/// derived lists, stamped with the refresh time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedSnapshot {
    pub refreshed_at: i64,
    pub app: AppSnapshot,
    pub dashboard: DashboardView,
}

impl Default for PublishedSnapshot {
    fn default() -> Self {
        PublishedSnapshot {
            refreshed_at: 0,
            app: AppSnapshot::default(),
            dashboard: DashboardView::default(),
        }
    }
}

/// Derives one published snapshot from one cycle's feeds.
///
/// The wallet feed joins the loading gate only when an account is
/// configured; without one the lists render with zero balances.
pub fn snapshot_from_feeds(feeds: &DataFeeds, local_config: &LocalConfig) -> PublishedSnapshot {
    let has_account = local_config.user_address.is_some();
    let app = reconcile(feeds, has_account, &local_config.market_address);

    let loading = app.loading || (has_account && feeds.wallet_balances.is_pending());
    let (supply_rows, borrow_rows) = if loading {
        (Vec::new(), Vec::new())
    } else {
        let wallet_balances = feeds.wallet_balances.value().cloned().unwrap_or_default();
        (
            build_supply_list(&app, &wallet_balances, local_config),
            build_borrow_list(&app, local_config),
        )
    };

    PublishedSnapshot {
        refreshed_at: Utc::now().timestamp(),
        app,
        dashboard: DashboardView {
            loading,
            supply_rows,
            borrow_rows,
        },
    }
}

pub struct SnapshotService;

impl SnapshotService {
    /// Starts the refresh loop. Each cycle loads every feed, reconciles
    /// them and swaps the published snapshot in one write; a cycle that
    /// fails leaves the previous snapshot in place with its error recorded.
    ///
    /// # Arguments
    /// * `snapshot` - Shared cell the HTTP surface reads from
    /// * `local_config` - The local configuration
    /// * `ledger` - Simulated ledger to project instead of the live API
    ///
    /// # Returns
    /// * `Result<JoinHandle<Result<()>>>` - Handle of the spawned loop
    #[instrument("SNAPSHOT_SERVICE", skip(snapshot, local_config, ledger))]
    pub async fn start_snapshot_service(
        snapshot: &Arc<RwLock<PublishedSnapshot>>,
        local_config: &Arc<LocalConfig>,
        ledger: Option<Arc<RwLock<Ledger>>>,
    ) -> Result<JoinHandle<Result<()>>> {
        let snapshot = snapshot.clone();
        let local_config = local_config.clone();

        let mut provider = match ledger {
            Some(ledger) => MarketDataProvider::simulated(local_config.clone(), ledger),
            None => MarketDataProvider::live(local_config.clone())?,
        };

        let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
            info!("Starting snapshot service");

            loop {
                let feeds = provider.load_feeds().await;
                let published = snapshot_from_feeds(&feeds, &local_config);
                match &published.app.error {
                    None => info!(
                        "Snapshot refreshed: {} supply rows, {} borrow rows",
                        published.dashboard.supply_rows.len(),
                        published.dashboard.borrow_rows.len()
                    ),
                    Some(error) => error!("Reserve feed failed: {}", error),
                }
                *snapshot.write().await = published;

                // Wait for the next update
                tokio::time::sleep(std::time::Duration::from_secs(
                    local_config.snapshot_update_frequency,
                ))
                .await;
            }
        });
        Ok(handle)
    }
}
