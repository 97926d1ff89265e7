pub mod amounts;
pub mod projections;

use std::collections::BTreeMap;

use alloy::primitives::I256;
use tracing::debug;

/// Account that owns every simulated position.
pub const MOCK_ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

/// Pseudo-address used for the chain's native asset in wallet projections.
pub const NATIVE_ASSET_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

pub const USDX_ADDRESS: &str = "0x86ab95b81b1db338b3d97ab85a0751a4089a960a";
pub const WBTC_ADDRESS: &str = "0x23d022ad0e159490fdb72b73af7b5ede7d6d2ee6";
pub const WETH_ADDRESS: &str = "0x60616486c576eee50d0dbb2cf48a327ad00f82f4";

/// Errors a ledger transition can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    /// The amount was zero or negative. Transitions only move positive value.
    InvalidAmount,
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InvalidAmount => write!(f, "amount must be a positive base-unit integer"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Balance-sheet row for one simulated reserve. All balances are base-unit
/// integers; `available_liquidity` equals `total_liquidity - total_debt` at
/// every point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveState {
    pub underlying_asset: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub a_token_address: String,
    pub variable_debt_token_address: String,
    pub total_liquidity: I256,
    pub available_liquidity: I256,
    pub total_debt: I256,
    pub supply_apy: String,
    pub variable_borrow_apy: String,
    pub price_usd: f64,
    pub is_wrapped_base_asset: bool,
}

/// Balances of the single simulated account, keyed by lowercased asset
/// address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserAccounts {
    pub wallet: BTreeMap<String, I256>,
    pub a_tokens: BTreeMap<String, I256>,
    pub debts: BTreeMap<String, I256>,
}

/// Process-wide simulated balance sheet backing the dashboard's test mode.
///
/// The ledger is a plain state struct plus transition methods: the host owns
/// the mutable cell and serializes writers, readers see either the state
/// before a transition or after it, never between. Balances are signed so the
/// sheet stays consistent even when a caller skips the eligibility checks and
/// drives an account below zero.
///
/// `version` increments by exactly one per applied mutation and never on
/// reads, so it doubles as a cache key for derived views.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub reserves: BTreeMap<String, ReserveState>,
    pub user: UserAccounts,
    pub version: u64,
}

impl Ledger {
    /// Builds the fixed three-reserve seed the dashboard test mode starts
    /// from: USDX (6 decimals, $1), WBTC (8 decimals, $40000) and WETH
    /// (18 decimals, $2000, the wrapped base asset), with a funded wallet
    /// and no open positions.
    ///
    /// # Returns
    ///
    /// Returns the seeded ledger at version 0
    pub fn seeded() -> Self {
        let reserves = BTreeMap::from([
            (
                USDX_ADDRESS.to_string(),
                ReserveState {
                    underlying_asset: USDX_ADDRESS.to_string(),
                    symbol: "USDX".to_string(),
                    name: "USDX Stablecoin".to_string(),
                    decimals: 6,
                    a_token_address: "0xf76f5775b139c1b0a54c3751c35fef9904d6e9b4".to_string(),
                    variable_debt_token_address: "0x0000000000000000000000000000000000000001"
                        .to_string(),
                    total_liquidity: units("1000000000"),
                    available_liquidity: units("1000000000"),
                    total_debt: I256::ZERO,
                    supply_apy: "0.02".to_string(),
                    variable_borrow_apy: "0.05".to_string(),
                    price_usd: 1.0,
                    is_wrapped_base_asset: false,
                },
            ),
            (
                WBTC_ADDRESS.to_string(),
                ReserveState {
                    underlying_asset: WBTC_ADDRESS.to_string(),
                    symbol: "WBTC".to_string(),
                    name: "Wrapped BTC".to_string(),
                    decimals: 8,
                    a_token_address: "0x0000000000000000000000000000000000000002".to_string(),
                    variable_debt_token_address: "0x0000000000000000000000000000000000000003"
                        .to_string(),
                    total_liquidity: units("100000000"),
                    available_liquidity: units("100000000"),
                    total_debt: I256::ZERO,
                    supply_apy: "0.01".to_string(),
                    variable_borrow_apy: "0.06".to_string(),
                    price_usd: 40_000.0,
                    is_wrapped_base_asset: false,
                },
            ),
            (
                WETH_ADDRESS.to_string(),
                ReserveState {
                    underlying_asset: WETH_ADDRESS.to_string(),
                    symbol: "WETH".to_string(),
                    name: "Wrapped Ether".to_string(),
                    decimals: 18,
                    a_token_address: "0x0000000000000000000000000000000000000004".to_string(),
                    variable_debt_token_address: "0x0000000000000000000000000000000000000005"
                        .to_string(),
                    total_liquidity: units("10000000000000000000"),
                    available_liquidity: units("10000000000000000000"),
                    total_debt: I256::ZERO,
                    supply_apy: "0.015".to_string(),
                    variable_borrow_apy: "0.04".to_string(),
                    price_usd: 2_000.0,
                    is_wrapped_base_asset: true,
                },
            ),
        ]);

        let user = UserAccounts {
            wallet: BTreeMap::from([
                (USDX_ADDRESS.to_string(), units("5000000000")),
                (WBTC_ADDRESS.to_string(), units("200000000")),
                (WETH_ADDRESS.to_string(), units("5000000000000000000")),
            ]),
            a_tokens: BTreeMap::from([
                (USDX_ADDRESS.to_string(), I256::ZERO),
                (WBTC_ADDRESS.to_string(), I256::ZERO),
                (WETH_ADDRESS.to_string(), I256::ZERO),
            ]),
            debts: BTreeMap::from([
                (USDX_ADDRESS.to_string(), I256::ZERO),
                (WBTC_ADDRESS.to_string(), I256::ZERO),
                (WETH_ADDRESS.to_string(), I256::ZERO),
            ]),
        };

        Ledger {
            reserves,
            user,
            version: 0,
        }
    }

    /// Restores the seed state, version counter included.
    pub fn reset(&mut self) {
        *self = Ledger::seeded();
    }

    /// Moves `amount` base units of `asset` from the wallet into the pool.
    ///
    /// Grows the reserve's total and available liquidity and the user's
    /// aToken balance, and debits the wallet. Unknown assets are a silent
    /// no-op so a speculative call cannot corrupt the sheet, and the version
    /// counter moves only when state does.
    ///
    /// # Arguments
    ///
    /// * `asset` - The underlying asset address
    /// * `amount` - The amount in base units, must be positive
    ///
    /// # Returns
    ///
    /// Returns an error if the amount is zero or negative
    pub fn apply_supply(&mut self, asset: &str, amount: I256) -> Result<(), LedgerError> {
        let amount = positive(amount)?;
        let key = asset.to_lowercase();
        let Some(reserve) = self.reserves.get_mut(&key) else {
            return Ok(());
        };

        reserve.total_liquidity += amount;
        reserve.available_liquidity += amount;
        *self.user.wallet.entry(key.clone()).or_insert(I256::ZERO) -= amount;
        *self.user.a_tokens.entry(key).or_insert(I256::ZERO) += amount;
        self.bump("supply", asset);
        Ok(())
    }

    /// Exact inverse of [`Ledger::apply_supply`].
    ///
    /// Deliberately does not check the withdrawal against the user's aToken
    /// balance or the pool's available liquidity. That bound belongs to the
    /// eligibility layer; an out-of-contract call produces negative balances
    /// but never an inconsistent sheet.
    pub fn apply_withdraw(&mut self, asset: &str, amount: I256) -> Result<(), LedgerError> {
        let amount = positive(amount)?;
        let key = asset.to_lowercase();
        let Some(reserve) = self.reserves.get_mut(&key) else {
            return Ok(());
        };

        reserve.total_liquidity -= amount;
        reserve.available_liquidity -= amount;
        *self.user.wallet.entry(key.clone()).or_insert(I256::ZERO) += amount;
        *self.user.a_tokens.entry(key).or_insert(I256::ZERO) -= amount;
        self.bump("withdraw", asset);
        Ok(())
    }

    /// Draws `amount` base units of `asset` from the pool into the wallet,
    /// opening debt. Total liquidity is unchanged; available liquidity drops
    /// by exactly the new debt.
    pub fn apply_borrow(&mut self, asset: &str, amount: I256) -> Result<(), LedgerError> {
        let amount = positive(amount)?;
        let key = asset.to_lowercase();
        let Some(reserve) = self.reserves.get_mut(&key) else {
            return Ok(());
        };

        reserve.total_debt += amount;
        reserve.available_liquidity -= amount;
        *self.user.wallet.entry(key.clone()).or_insert(I256::ZERO) += amount;
        *self.user.debts.entry(key).or_insert(I256::ZERO) += amount;
        self.bump("borrow", asset);
        Ok(())
    }

    /// Exact inverse of [`Ledger::apply_borrow`].
    pub fn apply_repay(&mut self, asset: &str, amount: I256) -> Result<(), LedgerError> {
        let amount = positive(amount)?;
        let key = asset.to_lowercase();
        let Some(reserve) = self.reserves.get_mut(&key) else {
            return Ok(());
        };

        reserve.total_debt -= amount;
        reserve.available_liquidity += amount;
        *self.user.wallet.entry(key.clone()).or_insert(I256::ZERO) -= amount;
        *self.user.debts.entry(key).or_insert(I256::ZERO) -= amount;
        self.bump("repay", asset);
        Ok(())
    }

    fn bump(&mut self, op: &str, asset: &str) {
        self.version += 1;
        debug!(
            "ledger {} applied to {}, version is now {}",
            op, asset, self.version
        );
    }
}

fn positive(amount: I256) -> Result<I256, LedgerError> {
    if amount <= I256::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(amount)
}

fn units(text: &str) -> I256 {
    text.parse().expect("seed amounts are valid integers")
}
