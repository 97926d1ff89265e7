use std::collections::BTreeMap;

use mock_ledger::projections::{FormattedReserve, ReserveIncentive, WalletBalance};
use serde::{Deserialize, Serialize};

/// Tri-state of one asynchronous feed.
///
/// `Failed` carries the upstream error message. Reconciliation consumes
/// these as plain data; a failed or pending feed is an input, never a
/// control-flow event.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn from_result(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => FetchState::Ready(value),
            Err(e) => {
                let message = e
                    .chain()
                    .map(|cause| cause.to_string())
                    .collect::<Vec<String>>()
                    .join(" -> ");
                FetchState::Failed(message)
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// One load cycle's worth of feeds. Every slot resolves independently.
#[derive(Debug, Clone)]
pub struct DataFeeds {
    pub market: FetchState<Vec<MarketSnapshot>>,
    pub raw_reserves: FetchState<RawReservesResponse>,
    pub formatted_reserves: FetchState<Vec<FormattedReserve>>,
    pub user_reserves: FetchState<RawUserReservesResponse>,
    pub user_summary: FetchState<UserSummary>,
    pub wallet_balances: FetchState<BTreeMap<String, WalletBalance>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValue {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdValue {
    pub amount: TokenValue,
    pub usd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyInfo {
    pub apy: TokenValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowInfo {
    pub total: UsdValue,
    pub apy: TokenValue,
    pub borrowing_state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationModeConfig {
    pub can_be_collateral: bool,
}

/// Reserve as the remote aggregation service shapes it: nested token blocks
/// and pre-aggregated USD figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketReserve {
    pub underlying_token: TokenInfo,
    pub a_token: TokenRef,
    pub v_token: TokenRef,
    pub size: UsdValue,
    pub supply_info: SupplyInfo,
    pub borrow_info: Option<BorrowInfo>,
    #[serde(default)]
    pub incentives: Vec<ReserveIncentive>,
    pub is_frozen: bool,
    pub is_paused: bool,
    pub accepts_native: bool,
    pub isolation_mode_config: Option<IsolationModeConfig>,
}

/// Builds the aggregation-service reserve shape out of a locally formatted
/// reserve. Used both for the fallback lists and for the synthetic market
/// in test mode, so the two paths can never drift apart.
impl From<&FormattedReserve> for MarketReserve {
    fn from(reserve: &FormattedReserve) -> Self {
        MarketReserve {
            underlying_token: TokenInfo {
                address: reserve.underlying_asset.clone(),
                symbol: reserve.symbol.clone(),
                name: reserve.name.clone(),
            },
            a_token: TokenRef {
                address: reserve.a_token_address.clone(),
            },
            v_token: TokenRef {
                address: reserve.variable_debt_token_address.clone(),
            },
            size: UsdValue {
                amount: TokenValue {
                    value: reserve.total_liquidity.clone(),
                },
                usd: reserve.total_liquidity_usd.clone(),
            },
            supply_info: SupplyInfo {
                apy: TokenValue {
                    value: reserve.supply_apy.clone(),
                },
            },
            borrow_info: Some(BorrowInfo {
                total: UsdValue {
                    amount: TokenValue {
                        value: reserve.total_debt.clone(),
                    },
                    usd: reserve.total_debt_usd.clone(),
                },
                apy: TokenValue {
                    value: reserve.variable_borrow_apy.clone(),
                },
                borrowing_state: if reserve.borrowing_enabled {
                    "ENABLED".to_string()
                } else {
                    "DISABLED".to_string()
                },
            }),
            incentives: reserve.incentives.clone(),
            is_frozen: reserve.is_frozen,
            is_paused: reserve.is_paused,
            accepts_native: reserve.is_wrapped_base_asset,
            isolation_mode_config: reserve.is_isolated.then(|| IsolationModeConfig {
                can_be_collateral: reserve.usage_as_collateral_enabled,
            }),
        }
    }
}

/// E-mode category as the aggregation service lists them market-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EModeCategory {
    pub id: u8,
    pub label: String,
    pub ltv: String,
    pub liquidation_threshold: String,
}

/// Opaque per-user block the aggregation service attaches to a market.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketUserState {
    #[serde(default)]
    pub net_worth: Option<String>,
    #[serde(default)]
    pub health_factor: Option<String>,
    #[serde(default)]
    pub e_mode_category_id: Option<u8>,
}

/// One market as served by the remote aggregation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub address: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    pub total_market_size: String,
    pub total_available_liquidity: String,
    #[serde(default)]
    pub supply_reserves: Vec<MarketReserve>,
    #[serde(default)]
    pub borrow_reserves: Vec<MarketReserve>,
    #[serde(default)]
    pub e_mode_categories: Vec<EModeCategory>,
    #[serde(default)]
    pub user_state: Option<MarketUserState>,
}

/// A reserve re-keyed with the market-scoped composite id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveWithId {
    pub id: String,
    #[serde(flatten)]
    pub reserve: MarketReserve,
}

/// Raw on-chain reserve read, humanized field names, base-unit amounts and
/// ray rates as decimal strings. Input to the local formatting stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReserveData {
    pub underlying_asset: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub a_token_address: String,
    pub variable_debt_token_address: String,
    pub available_liquidity: String,
    pub total_scaled_variable_debt: String,
    pub liquidity_rate: String,
    pub variable_borrow_rate: String,
    pub variable_borrow_index: String,
    #[serde(rename = "baseLTVasCollateral")]
    pub base_ltv_as_collateral: String,
    pub reserve_liquidation_threshold: String,
    pub reserve_liquidation_bonus: String,
    pub reserve_factor: String,
    pub usage_as_collateral_enabled: bool,
    pub borrowing_enabled: bool,
    pub is_active: bool,
    pub is_frozen: bool,
    pub is_paused: bool,
    pub supply_cap: String,
    pub borrow_cap: String,
    pub debt_ceiling: String,
    pub debt_ceiling_decimals: u8,
    pub isolation_mode_total_debt: String,
    pub borrowable_in_isolation: bool,
    pub price_in_market_reference_currency: String,
    pub last_update_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCurrencyData {
    pub market_reference_currency_decimals: u8,
    pub market_reference_currency_price_in_usd: String,
    pub network_base_token_price_in_usd: String,
    pub network_base_token_price_decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReservesResponse {
    pub reserves_data: Vec<RawReserveData>,
    pub base_currency_data: BaseCurrencyData,
}

/// Incentives attached to one reserve, keyed by its underlying asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReserveIncentives {
    pub underlying_asset: String,
    #[serde(default)]
    pub incentives: Vec<ReserveIncentive>,
}

/// E-mode category with its member assets, as the data service reports it.
/// Risk figures are in basis points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEmode {
    pub id: u8,
    pub label: String,
    pub ltv: String,
    pub liquidation_threshold: String,
    #[serde(default)]
    pub collateral_assets: Vec<String>,
    #[serde(default)]
    pub borrowable_assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUserReserve {
    pub underlying_asset: String,
    pub scaled_a_token_balance: String,
    pub scaled_variable_debt: String,
    pub usage_as_collateral_enabled_on_user: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUserReservesResponse {
    pub user_reserves: Vec<RawUserReserve>,
    pub user_emode_category_id: u8,
}

/// Per-reserve slice of the extended user summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReserveSummary {
    pub underlying_asset: String,
    pub underlying_balance: String,
    #[serde(rename = "underlyingBalanceUSD")]
    pub underlying_balance_usd: String,
    pub variable_borrows: String,
    #[serde(rename = "variableBorrowsUSD")]
    pub variable_borrows_usd: String,
    pub usage_as_collateral_enabled_on_user: bool,
}

/// Extended user summary: aggregate borrowing power plus the isolation and
/// e-mode state the eligibility rules hinge on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_reserves_data: Vec<UserReserveSummary>,
    #[serde(rename = "totalCollateralUSD")]
    pub total_collateral_usd: String,
    #[serde(rename = "totalBorrowsUSD")]
    pub total_borrows_usd: String,
    #[serde(rename = "availableBorrowsUSD")]
    pub available_borrows_usd: String,
    pub available_borrows_market_reference_currency: String,
    pub health_factor: String,
    pub is_in_isolation_mode: bool,
    #[serde(default)]
    pub isolated_reserve_address: Option<String>,
    pub is_in_emode: bool,
    pub user_emode_category_id: u8,
}
