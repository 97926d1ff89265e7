use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use mock_ledger::projections::WalletBalance;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::info;

use super::models::{
    MarketSnapshot, RawEmode, RawReserveIncentives, RawReservesResponse, RawUserReservesResponse,
    UserSummary,
};

/// Thin typed client for the aggregation and data services.
///
/// The remote side's availability, caching and freshness are not part of this
/// crate's contract. The client retries transient failures a bounded number
/// of times and reports the last outcome; everything above it treats the
/// result as an independent feed state.
pub struct SnapshotApiClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl SnapshotApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut retries = 0;
        loop {
            match self.client.get(&url).query(query).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response.json().await?);
                    }
                    info!("Request to {} failed with status: {}", path, response.status());
                }
                Err(e) => info!("Request error on {}: {:?}", path, e),
            }

            retries += 1;
            if retries >= self.max_retries {
                return Err(anyhow!("max retries reached for {}", path));
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// Fetches the aggregated snapshot of every market on a chain.
    pub async fn get_markets(
        &self,
        chain_id: u64,
        user: Option<&str>,
    ) -> Result<Vec<MarketSnapshot>> {
        let mut query = vec![("chainId", chain_id.to_string())];
        if let Some(user) = user {
            query.push(("user", user.to_string()));
        }
        self.get_json("/markets", &query).await
    }

    /// Fetches the raw reserve reads plus the base currency block.
    pub async fn get_reserves(&self, market: &str) -> Result<RawReservesResponse> {
        self.get_json("/reserves", &[("market", market.to_string())])
            .await
    }

    pub async fn get_reserve_incentives(&self, market: &str) -> Result<Vec<RawReserveIncentives>> {
        self.get_json("/reserve-incentives", &[("market", market.to_string())])
            .await
    }

    pub async fn get_emodes(&self, market: &str) -> Result<Vec<RawEmode>> {
        self.get_json("/emodes", &[("market", market.to_string())])
            .await
    }

    pub async fn get_user_reserves(
        &self,
        market: &str,
        user: &str,
    ) -> Result<RawUserReservesResponse> {
        self.get_json(
            "/user-reserves",
            &[("market", market.to_string()), ("user", user.to_string())],
        )
        .await
    }

    pub async fn get_user_summary(&self, market: &str, user: &str) -> Result<UserSummary> {
        self.get_json(
            "/user-summary",
            &[("market", market.to_string()), ("user", user.to_string())],
        )
        .await
    }

    pub async fn get_wallet_balances(&self, user: &str) -> Result<BTreeMap<String, WalletBalance>> {
        self.get_json("/wallet-balances", &[("user", user.to_string())])
            .await
    }
}
