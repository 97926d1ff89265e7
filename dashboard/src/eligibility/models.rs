use serde::Serialize;

/// One supply-side asset list row, ready for display.
///
/// `details_address` is the reserve the row routes to, which differs from
/// `underlying_asset` only on the synthetic native row of a wrapped base
/// asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyRow {
    pub id: String,
    pub underlying_asset: String,
    pub details_address: String,
    pub symbol: String,
    pub name: String,
    pub wallet_balance: String,
    #[serde(rename = "walletBalanceUSD")]
    pub wallet_balance_usd: String,
    pub available_to_deposit: String,
    #[serde(rename = "availableToDepositUSD")]
    pub available_to_deposit_usd: String,
    #[serde(rename = "supplyAPY")]
    pub supply_apy: String,
    pub usage_as_collateral_enabled_on_user: bool,
    pub is_isolated: bool,
}

/// One borrow-side asset list row. `variable_borrow_rate` is `-1` when the
/// reserve does not allow borrowing at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRow {
    pub id: String,
    pub underlying_asset: String,
    pub symbol: String,
    pub name: String,
    pub available_borrows: f64,
    #[serde(rename = "availableBorrowsInUSD")]
    pub available_borrows_in_usd: String,
    pub variable_borrow_rate: f64,
    #[serde(rename = "totalLiquidityUSD")]
    pub total_liquidity_usd: f64,
}
