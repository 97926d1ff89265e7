use alloy::primitives::I256;
use mock_ledger::amounts::{human_to_base_units, signed_to_human, signed_to_usd};
use mock_ledger::Ledger;

use crate::config::LocalConfig;
use crate::utils::num::parse_f64_or_zero;

use super::models::{
    BaseCurrencyData, DataFeeds, FetchState, MarketReserve, MarketSnapshot, MarketUserState,
    RawReserveData, RawReservesResponse, RawUserReserve, RawUserReservesResponse, UserReserveSummary,
    UserSummary,
};

/// Synthesizes one load cycle's worth of feeds from the simulated ledger,
/// shaped exactly like the live responses. Downstream code cannot tell the
/// two sources apart, which is the whole point.
pub fn feeds_from_ledger(ledger: &Ledger, config: &LocalConfig) -> DataFeeds {
    let formatted = ledger.formatted_reserves();
    let totals = ledger.market_totals();
    let summary = user_summary_from(ledger);

    let market = MarketSnapshot {
        address: config.market_address.clone(),
        chain_id: Some(config.chain_id),
        total_market_size: totals.total_market_size,
        total_available_liquidity: totals.total_available,
        supply_reserves: formatted.iter().map(MarketReserve::from).collect(),
        borrow_reserves: formatted.iter().map(MarketReserve::from).collect(),
        e_mode_categories: Vec::new(),
        user_state: Some(MarketUserState {
            net_worth: Some(format!(
                "{}",
                parse_f64_or_zero(&summary.total_collateral_usd)
                    - parse_f64_or_zero(&summary.total_borrows_usd)
            )),
            health_factor: Some(summary.health_factor.clone()),
            e_mode_category_id: None,
        }),
    };

    DataFeeds {
        market: FetchState::Ready(vec![market]),
        raw_reserves: FetchState::Ready(raw_reserves_from(ledger)),
        formatted_reserves: FetchState::Ready(formatted),
        user_reserves: FetchState::Ready(user_reserves_from(ledger)),
        user_summary: FetchState::Ready(summary),
        wallet_balances: FetchState::Ready(ledger.wallet_balances()),
    }
}

/// Raw-read synthesis. The formatting stage never runs over this in test
/// mode (the formatted feed short-circuits to the ledger projection), but
/// the base currency block and the reserve rows keep the same meaning the
/// live endpoint gives them.
fn raw_reserves_from(ledger: &Ledger) -> RawReservesResponse {
    let reserves_data = ledger
        .reserves
        .values()
        .map(|reserve| RawReserveData {
            underlying_asset: reserve.underlying_asset.clone(),
            symbol: reserve.symbol.clone(),
            name: reserve.name.clone(),
            decimals: reserve.decimals,
            a_token_address: reserve.a_token_address.clone(),
            variable_debt_token_address: reserve.variable_debt_token_address.clone(),
            available_liquidity: reserve.available_liquidity.to_string(),
            total_scaled_variable_debt: reserve.total_debt.to_string(),
            liquidity_rate: ray_of(&reserve.supply_apy),
            variable_borrow_rate: ray_of(&reserve.variable_borrow_apy),
            variable_borrow_index: ray_of("1"),
            base_ltv_as_collateral: "5000".to_string(),
            reserve_liquidation_threshold: "6500".to_string(),
            reserve_liquidation_bonus: "10500".to_string(),
            reserve_factor: "1000".to_string(),
            usage_as_collateral_enabled: true,
            borrowing_enabled: true,
            is_active: true,
            is_frozen: false,
            is_paused: false,
            supply_cap: "0".to_string(),
            borrow_cap: "0".to_string(),
            debt_ceiling: "0".to_string(),
            debt_ceiling_decimals: 2,
            isolation_mode_total_debt: "0".to_string(),
            borrowable_in_isolation: false,
            price_in_market_reference_currency: format!(
                "{}",
                (reserve.price_usd * 100_000_000.0) as u128
            ),
            last_update_timestamp: 0,
        })
        .collect();

    RawReservesResponse {
        reserves_data,
        base_currency_data: BaseCurrencyData {
            market_reference_currency_decimals: 8,
            market_reference_currency_price_in_usd: "100000000".to_string(),
            network_base_token_price_in_usd: "2000".to_string(),
            network_base_token_price_decimals: 8,
        },
    }
}

fn user_reserves_from(ledger: &Ledger) -> RawUserReservesResponse {
    let user_reserves = ledger
        .reserves
        .keys()
        .map(|asset| RawUserReserve {
            underlying_asset: asset.clone(),
            scaled_a_token_balance: balance_of(&ledger.user.a_tokens, asset).to_string(),
            scaled_variable_debt: balance_of(&ledger.user.debts, asset).to_string(),
            usage_as_collateral_enabled_on_user: balance_of(&ledger.user.a_tokens, asset)
                > I256::ZERO,
        })
        .collect();

    RawUserReservesResponse {
        user_reserves,
        user_emode_category_id: 0,
    }
}

/// Derives the extended summary the live data service would compute, using
/// the simulation's fixed risk parameters (50% LTV, 65% liquidation
/// threshold).
fn user_summary_from(ledger: &Ledger) -> UserSummary {
    let mut total_collateral_usd = 0.0;
    let mut total_borrows_usd = 0.0;
    let mut user_reserves = Vec::new();

    for (asset, reserve) in &ledger.reserves {
        let a_tokens = balance_of(&ledger.user.a_tokens, asset);
        let debts = balance_of(&ledger.user.debts, asset);

        let underlying_balance_usd = signed_to_usd(a_tokens, reserve.decimals, reserve.price_usd);
        let variable_borrows_usd = signed_to_usd(debts, reserve.decimals, reserve.price_usd);
        total_collateral_usd += parse_f64_or_zero(&underlying_balance_usd);
        total_borrows_usd += parse_f64_or_zero(&variable_borrows_usd);

        user_reserves.push(UserReserveSummary {
            underlying_asset: asset.clone(),
            underlying_balance: signed_to_human(a_tokens, reserve.decimals),
            underlying_balance_usd,
            variable_borrows: signed_to_human(debts, reserve.decimals),
            variable_borrows_usd,
            usage_as_collateral_enabled_on_user: a_tokens > I256::ZERO,
        });
    }

    let available_borrows_usd = (total_collateral_usd * 0.5 - total_borrows_usd).max(0.0);
    let health_factor = if total_borrows_usd > 0.0 {
        format!("{}", total_collateral_usd * 0.65 / total_borrows_usd)
    } else {
        "-1".to_string()
    };

    UserSummary {
        user_reserves_data: user_reserves,
        total_collateral_usd: format!("{}", total_collateral_usd),
        total_borrows_usd: format!("{}", total_borrows_usd),
        available_borrows_usd: format!("{}", available_borrows_usd),
        // The reference currency is the dollar here, so the two figures
        // coincide.
        available_borrows_market_reference_currency: format!("{}", available_borrows_usd),
        health_factor,
        is_in_isolation_mode: false,
        isolated_reserve_address: None,
        is_in_emode: false,
        user_emode_category_id: 0,
    }
}

fn balance_of(balances: &std::collections::BTreeMap<String, I256>, asset: &str) -> I256 {
    balances.get(asset).copied().unwrap_or(I256::ZERO)
}

/// Shifts a human-readable fraction 27 places, e.g. "0.02" into its ray
/// representation, without going through floats.
fn ray_of(fraction: &str) -> String {
    human_to_base_units(fraction, 27)
        .unwrap_or_default()
        .to_string()
}
