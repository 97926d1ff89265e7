mod api_client;
pub mod models;
pub mod test_feed;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use mock_ledger::Ledger;

use crate::config::LocalConfig;
use crate::reserve_formatter::FormattedReservesCache;

use api_client::SnapshotApiClient;
use models::{DataFeeds, FetchState};

/// Where a load cycle reads from. Live mode talks to the snapshot data
/// service over HTTP, simulated mode projects the in-process ledger.
enum FeedSource {
    Live(SnapshotApiClient),
    Simulated(Arc<RwLock<Ledger>>),
}

/// Owns the per-cycle data loading and the formatting memo that sits
/// between the raw reserve read and everything downstream.
pub struct MarketDataProvider {
    config: Arc<LocalConfig>,
    source: FeedSource,
    format_cache: FormattedReservesCache,
}

impl MarketDataProvider {
    pub fn live(config: Arc<LocalConfig>) -> Result<Self> {
        Ok(Self {
            source: FeedSource::Live(SnapshotApiClient::new(&config.api_url)?),
            config,
            format_cache: FormattedReservesCache::new(),
        })
    }

    pub fn simulated(config: Arc<LocalConfig>, ledger: Arc<RwLock<Ledger>>) -> Self {
        Self {
            source: FeedSource::Simulated(ledger),
            config,
            format_cache: FormattedReservesCache::new(),
        }
    }

    /// Runs one full refresh. Every slot that was fetched lands in a
    /// terminal state; the user trio stays pending when no account is
    /// configured so the reconciler can tell "not loaded" from "empty".
    pub async fn load_feeds(&mut self) -> DataFeeds {
        match &self.source {
            FeedSource::Simulated(ledger) => {
                let ledger = ledger.read().await;
                test_feed::feeds_from_ledger(&ledger, &self.config)
            }
            FeedSource::Live(client) => {
                Self::load_live(client, &self.config, &mut self.format_cache).await
            }
        }
    }

    async fn load_live(
        client: &SnapshotApiClient,
        config: &LocalConfig,
        cache: &mut FormattedReservesCache,
    ) -> DataFeeds {
        let user = config.user_address.as_deref();

        let (market, raw_reserves, incentives, emodes) = tokio::join!(
            client.get_markets(config.chain_id, user),
            client.get_reserves(&config.market_address),
            client.get_reserve_incentives(&config.market_address),
            client.get_emodes(&config.market_address),
        );

        let (user_reserves, user_summary, wallet_balances) = match user {
            Some(user) => {
                let (reserves, summary, balances) = tokio::join!(
                    client.get_user_reserves(&config.market_address, user),
                    client.get_user_summary(&config.market_address, user),
                    client.get_wallet_balances(user),
                );
                (
                    FetchState::from_result(reserves),
                    FetchState::from_result(summary),
                    FetchState::from_result(balances),
                )
            }
            None => (FetchState::Pending, FetchState::Pending, FetchState::Pending),
        };

        // Missing incentive or e-mode reads degrade the formatted rows
        // instead of failing them; only the raw reserve read is load-bearing.
        let raw_reserves = FetchState::from_result(raw_reserves);
        let formatted_reserves = match &raw_reserves {
            FetchState::Ready(raw) => FetchState::Ready(cache.get_or_format(
                raw,
                incentives.as_ref().map(Vec::as_slice).unwrap_or(&[]),
                emodes.as_ref().map(Vec::as_slice).unwrap_or(&[]),
                &config.wrapped_base_asset_symbol,
            )),
            FetchState::Failed(error) => FetchState::Failed(error.clone()),
            FetchState::Pending => FetchState::Pending,
        };

        DataFeeds {
            market: FetchState::from_result(market),
            raw_reserves,
            formatted_reserves,
            user_reserves,
            user_summary,
            wallet_balances,
        }
    }
}
