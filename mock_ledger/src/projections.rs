use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amounts::{signed_to_human, signed_to_usd};
use crate::{Ledger, NATIVE_ASSET_ADDRESS};

/// Per-reserve e-mode membership entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ReserveEmode {
    pub id: u8,
    pub label: String,
    pub ltv: String,
    pub liquidation_threshold: String,
    pub collateral_enabled: bool,
    pub borrowing_enabled: bool,
}

/// Incentive a formatting stage attaches to a reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ReserveIncentive {
    pub reward_token_symbol: String,
    pub reward_token_address: String,
    pub incentive_apr: String,
}

/// The flat per-reserve display record every source must produce: the ledger
/// projects it directly from raw state, the live path computes it from raw
/// on-chain reads. Consumers never know which one they got.
///
/// Amounts are human-readable decimal strings with USD mirrors; prices are in
/// the market reference currency, already normalized to human units. The
/// `"0"` sentinel on `supply_cap` and `borrow_cap` means uncapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedReserve {
    pub id: String,
    pub underlying_asset: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub a_token_address: String,
    pub variable_debt_token_address: String,
    pub total_liquidity: String,
    pub available_liquidity: String,
    pub total_debt: String,
    pub total_variable_debt: String,
    #[serde(rename = "totalLiquidityUSD")]
    pub total_liquidity_usd: String,
    #[serde(rename = "availableLiquidityUSD")]
    pub available_liquidity_usd: String,
    #[serde(rename = "totalDebtUSD")]
    pub total_debt_usd: String,
    #[serde(rename = "totalVariableDebtUSD")]
    pub total_variable_debt_usd: String,
    pub price_in_market_reference_currency: String,
    pub formatted_price_in_market_reference_currency: String,
    #[serde(rename = "priceInUSD")]
    pub price_in_usd: String,
    #[serde(rename = "supplyAPY")]
    pub supply_apy: String,
    #[serde(rename = "supplyAPR")]
    pub supply_apr: String,
    #[serde(rename = "variableBorrowAPY")]
    pub variable_borrow_apy: String,
    #[serde(rename = "variableBorrowAPR")]
    pub variable_borrow_apr: String,
    #[serde(rename = "baseLTVasCollateral")]
    pub base_ltv_as_collateral: String,
    pub reserve_liquidation_threshold: String,
    pub reserve_liquidation_bonus: String,
    pub reserve_factor: String,
    pub usage_as_collateral_enabled: bool,
    pub borrowing_enabled: bool,
    pub borrowable_in_isolation: bool,
    pub is_active: bool,
    pub is_frozen: bool,
    pub is_paused: bool,
    pub supply_cap: String,
    pub borrow_cap: String,
    pub debt_ceiling: String,
    pub debt_ceiling_decimals: u8,
    pub isolation_mode_total_debt: String,
    pub is_isolated: bool,
    pub e_modes: Vec<ReserveEmode>,
    pub is_wrapped_base_asset: bool,
    pub incentives: Vec<ReserveIncentive>,
}

/// One wallet entry of the balance projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub amount: String,
    #[serde(rename = "amountUSD")]
    pub amount_usd: String,
}

/// Market-wide USD totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTotals {
    pub total_market_size: String,
    pub total_available: String,
    pub total_borrows: String,
}

impl Ledger {
    /// Projects every reserve into the full display shape.
    ///
    /// Recomputed from raw state on each call so no derived figure can go
    /// stale. Risk parameters are the fixed simulation set: 50% LTV, 65%
    /// liquidation threshold, 5% bonus, 10% reserve factor, no caps, no
    /// isolation, no e-modes. The seeded rates are flat, so the APR mirrors
    /// repeat the APY figures.
    pub fn formatted_reserves(&self) -> Vec<FormattedReserve> {
        self.reserves
            .values()
            .map(|reserve| {
                let decimals = reserve.decimals;
                let price = reserve.price_usd;
                FormattedReserve {
                    id: reserve.underlying_asset.clone(),
                    underlying_asset: reserve.underlying_asset.clone(),
                    symbol: reserve.symbol.clone(),
                    name: reserve.name.clone(),
                    decimals,
                    a_token_address: reserve.a_token_address.clone(),
                    variable_debt_token_address: reserve.variable_debt_token_address.clone(),
                    total_liquidity: signed_to_human(reserve.total_liquidity, decimals),
                    available_liquidity: signed_to_human(reserve.available_liquidity, decimals),
                    total_debt: signed_to_human(reserve.total_debt, decimals),
                    total_variable_debt: signed_to_human(reserve.total_debt, decimals),
                    total_liquidity_usd: signed_to_usd(reserve.total_liquidity, decimals, price),
                    available_liquidity_usd: signed_to_usd(
                        reserve.available_liquidity,
                        decimals,
                        price,
                    ),
                    total_debt_usd: signed_to_usd(reserve.total_debt, decimals, price),
                    total_variable_debt_usd: signed_to_usd(reserve.total_debt, decimals, price),
                    price_in_market_reference_currency: format!("{}", price),
                    formatted_price_in_market_reference_currency: format!("{}", price),
                    price_in_usd: format!("{}", price),
                    supply_apy: reserve.supply_apy.clone(),
                    supply_apr: reserve.supply_apy.clone(),
                    variable_borrow_apy: reserve.variable_borrow_apy.clone(),
                    variable_borrow_apr: reserve.variable_borrow_apy.clone(),
                    base_ltv_as_collateral: "0.5".to_string(),
                    reserve_liquidation_threshold: "0.65".to_string(),
                    reserve_liquidation_bonus: "1.05".to_string(),
                    reserve_factor: "0.1".to_string(),
                    usage_as_collateral_enabled: true,
                    borrowing_enabled: true,
                    borrowable_in_isolation: false,
                    is_active: true,
                    is_frozen: false,
                    is_paused: false,
                    supply_cap: "0".to_string(),
                    borrow_cap: "0".to_string(),
                    debt_ceiling: "0".to_string(),
                    debt_ceiling_decimals: 2,
                    isolation_mode_total_debt: "0".to_string(),
                    is_isolated: false,
                    e_modes: Vec::new(),
                    is_wrapped_base_asset: reserve.is_wrapped_base_asset,
                    incentives: Vec::new(),
                }
            })
            .collect()
    }

    /// Wallet balances keyed by asset address.
    ///
    /// The simulated account also always holds one unit of the native asset,
    /// so the wrapped-base supply row has something to expand against.
    pub fn wallet_balances(&self) -> BTreeMap<String, WalletBalance> {
        let mut balances = BTreeMap::new();
        for (asset, amount) in &self.user.wallet {
            let Some(reserve) = self.reserves.get(asset) else {
                continue;
            };
            balances.insert(
                asset.clone(),
                WalletBalance {
                    amount: signed_to_human(*amount, reserve.decimals),
                    amount_usd: signed_to_usd(*amount, reserve.decimals, reserve.price_usd),
                },
            );
        }
        balances.insert(
            NATIVE_ASSET_ADDRESS.to_string(),
            WalletBalance {
                amount: "1".to_string(),
                amount_usd: "2000".to_string(),
            },
        );
        balances
    }

    /// Market-wide totals, summing exactly the per-reserve USD figures the
    /// display projection emits. Whatever a consumer sums from
    /// [`Ledger::formatted_reserves`] lands on the same numbers.
    pub fn market_totals(&self) -> MarketTotals {
        let mut total_market_size = 0.0;
        let mut total_available = 0.0;
        let mut total_borrows = 0.0;

        for reserve in self.reserves.values() {
            let decimals = reserve.decimals;
            let price = reserve.price_usd;
            total_market_size += parsed(signed_to_usd(reserve.total_liquidity, decimals, price));
            total_available += parsed(signed_to_usd(reserve.available_liquidity, decimals, price));
            total_borrows += parsed(signed_to_usd(reserve.total_debt, decimals, price));
        }

        MarketTotals {
            total_market_size: format!("{}", total_market_size),
            total_available: format!("{}", total_available),
            total_borrows: format!("{}", total_borrows),
        }
    }
}

fn parsed(value: String) -> f64 {
    value.parse().unwrap_or(0.0)
}
