use alloy::primitives::Address;
use anyhow::{Context, Result};
use mock_ledger::MOCK_ACCOUNT;

use super::env_helper::{load_env_var, load_env_var_or};

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub api_url: String,
    pub market_address: String,
    pub chain_id: u64,
    pub base_asset_symbol: String,
    pub wrapped_base_asset_symbol: String,
    pub hidden_assets: Vec<String>,
    pub gho_mintable_markets: Vec<String>,
    pub user_address: Option<String>,
    pub snapshot_update_frequency: u64,
    pub test_mode: bool,
}

impl LocalConfig {
    pub fn load_from_env() -> Result<Self> {
        let test_mode: bool = load_env_var_or("TEST_MODE", false)?;

        // The API is never contacted in test mode, so its URL is only
        // required for a live run.
        let api_url = if test_mode {
            load_env_var_or("API_URL", String::new())?
        } else {
            load_env_var("API_URL")?
        };

        let market_address = normalize_address(&load_env_var::<String>("MARKET_ADDRESS")?)
            .context("MARKET_ADDRESS is not a valid address")?;

        let user_address = match load_env_var_or::<String>("USER_ADDRESS", String::new())? {
            var if var.is_empty() => test_mode.then(|| MOCK_ACCOUNT.to_string()),
            var => Some(normalize_address(&var).context("USER_ADDRESS is not a valid address")?),
        };

        Ok(Self {
            api_url,
            market_address,
            chain_id: load_env_var("CHAIN_ID")?,
            base_asset_symbol: load_env_var_or("BASE_ASSET_SYMBOL", "ETH".to_string())?,
            wrapped_base_asset_symbol: load_env_var_or(
                "WRAPPED_BASE_ASSET_SYMBOL",
                "WETH".to_string(),
            )?,
            hidden_assets: split_lowercased(&load_env_var_or::<String>(
                "HIDDEN_ASSETS",
                String::new(),
            )?),
            gho_mintable_markets: split_lowercased(&load_env_var_or::<String>(
                "GHO_MINTABLE_MARKETS",
                String::new(),
            )?),
            user_address,
            snapshot_update_frequency: load_env_var_or("SNAPSHOT_UPDATE_FREQUENCY", 15)?,
            test_mode,
        })
    }
}

/// Parses and re-renders an address so configured values always compare
/// equal to the lowercased addresses on the wire.
fn normalize_address(text: &str) -> Result<String> {
    let address: Address = text
        .parse()
        .map_err(|_| anyhow::anyhow!("{} is not a valid address", text))?;
    Ok(address.to_string().to_lowercase())
}

fn split_lowercased(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}
