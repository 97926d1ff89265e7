mod cache;

pub use cache::FormattedReservesCache;

use alloy::primitives::U256;

use mock_ledger::amounts::{to_human, to_usd};
use mock_ledger::projections::{FormattedReserve, ReserveEmode};

use crate::market_provider::models::{
    BaseCurrencyData, RawEmode, RawReserveData, RawReserveIncentives, RawReservesResponse,
};
use crate::utils::num::parse_f64_or_zero;

const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Decimals of the USD figures the reference-currency price is quoted in.
const USD_DECIMALS: u8 = 8;

/// Derives the flat display rows from one raw reserve read.
///
/// Debt is reconstructed from the scaled balance and the current borrow
/// index, so total liquidity always equals available plus debt by
/// construction. Rates come in as ray APRs and leave as effective APYs.
/// Rows are sorted by symbol so consumers see a stable order regardless of
/// on-chain listing order.
pub fn format_reserves_and_incentives(
    raw: &RawReservesResponse,
    incentives: &[RawReserveIncentives],
    emodes: &[RawEmode],
    wrapped_base_asset_symbol: &str,
) -> Vec<FormattedReserve> {
    let base = &raw.base_currency_data;
    let reference_price_usd = parse_f64_or_zero(&to_human(
        units(&base.market_reference_currency_price_in_usd),
        USD_DECIMALS,
    ));

    let mut formatted: Vec<FormattedReserve> = raw
        .reserves_data
        .iter()
        .map(|reserve| {
            format_reserve(
                reserve,
                base,
                incentives,
                emodes,
                reference_price_usd,
                wrapped_base_asset_symbol,
            )
        })
        .collect();

    formatted.sort_by(|a, b| a.symbol.to_uppercase().cmp(&b.symbol.to_uppercase()));
    formatted
}

fn format_reserve(
    reserve: &RawReserveData,
    base: &BaseCurrencyData,
    incentives: &[RawReserveIncentives],
    emodes: &[RawEmode],
    reference_price_usd: f64,
    wrapped_base_asset_symbol: &str,
) -> FormattedReserve {
    let decimals = reserve.decimals;

    let available = units(&reserve.available_liquidity);
    let debt = ray_mul(
        units(&reserve.total_scaled_variable_debt),
        units(&reserve.variable_borrow_index),
    );
    let total = available.checked_add(debt).unwrap_or(U256::MAX);

    let formatted_price = to_human(
        units(&reserve.price_in_market_reference_currency),
        base.market_reference_currency_decimals,
    );
    let price_usd = parse_f64_or_zero(&formatted_price) * reference_price_usd;

    let reserve_incentives = incentives
        .iter()
        .find(|entry| entry.underlying_asset.eq_ignore_ascii_case(&reserve.underlying_asset))
        .map(|entry| entry.incentives.clone())
        .unwrap_or_default();

    FormattedReserve {
        id: reserve.underlying_asset.to_lowercase(),
        underlying_asset: reserve.underlying_asset.to_lowercase(),
        symbol: reserve.symbol.clone(),
        name: reserve.name.clone(),
        decimals,
        a_token_address: reserve.a_token_address.to_lowercase(),
        variable_debt_token_address: reserve.variable_debt_token_address.to_lowercase(),
        total_liquidity: to_human(total, decimals),
        available_liquidity: to_human(available, decimals),
        total_debt: to_human(debt, decimals),
        total_variable_debt: to_human(debt, decimals),
        total_liquidity_usd: to_usd(total, decimals, price_usd),
        available_liquidity_usd: to_usd(available, decimals, price_usd),
        total_debt_usd: to_usd(debt, decimals, price_usd),
        total_variable_debt_usd: to_usd(debt, decimals, price_usd),
        price_in_market_reference_currency: reserve.price_in_market_reference_currency.clone(),
        formatted_price_in_market_reference_currency: formatted_price,
        price_in_usd: format!("{}", price_usd),
        supply_apy: apy_from_ray_rate(&reserve.liquidity_rate),
        supply_apr: apr_from_ray_rate(&reserve.liquidity_rate),
        variable_borrow_apy: apy_from_ray_rate(&reserve.variable_borrow_rate),
        variable_borrow_apr: apr_from_ray_rate(&reserve.variable_borrow_rate),
        base_ltv_as_collateral: bps_to_fraction(&reserve.base_ltv_as_collateral),
        reserve_liquidation_threshold: bps_to_fraction(&reserve.reserve_liquidation_threshold),
        reserve_liquidation_bonus: bps_to_fraction(&reserve.reserve_liquidation_bonus),
        reserve_factor: bps_to_fraction(&reserve.reserve_factor),
        usage_as_collateral_enabled: reserve.usage_as_collateral_enabled,
        borrowing_enabled: reserve.borrowing_enabled,
        borrowable_in_isolation: reserve.borrowable_in_isolation,
        is_active: reserve.is_active,
        is_frozen: reserve.is_frozen,
        is_paused: reserve.is_paused,
        supply_cap: reserve.supply_cap.clone(),
        borrow_cap: reserve.borrow_cap.clone(),
        debt_ceiling: reserve.debt_ceiling.clone(),
        debt_ceiling_decimals: reserve.debt_ceiling_decimals,
        isolation_mode_total_debt: to_human(
            units(&reserve.isolation_mode_total_debt),
            reserve.debt_ceiling_decimals,
        ),
        is_isolated: reserve.debt_ceiling != "0",
        e_modes: emode_memberships(reserve, emodes),
        is_wrapped_base_asset: reserve.symbol.eq_ignore_ascii_case(wrapped_base_asset_symbol),
        incentives: reserve_incentives,
    }
}

/// Distributes the market-wide e-mode categories onto the reserves they
/// name, splitting membership into collateral and borrowable sides.
fn emode_memberships(reserve: &RawReserveData, emodes: &[RawEmode]) -> Vec<ReserveEmode> {
    emodes
        .iter()
        .filter_map(|category| {
            let collateral = contains_asset(&category.collateral_assets, &reserve.underlying_asset);
            let borrowable = contains_asset(&category.borrowable_assets, &reserve.underlying_asset);
            if !collateral && !borrowable {
                return None;
            }
            Some(ReserveEmode {
                id: category.id,
                label: category.label.clone(),
                ltv: bps_to_fraction(&category.ltv),
                liquidation_threshold: bps_to_fraction(&category.liquidation_threshold),
                collateral_enabled: collateral,
                borrowing_enabled: borrowable,
            })
        })
        .collect()
}

fn contains_asset(assets: &[String], underlying: &str) -> bool {
    assets.iter().any(|asset| asset.eq_ignore_ascii_case(underlying))
}

fn units(value: &str) -> U256 {
    U256::from_str_radix(value, 10).unwrap_or_default()
}

fn ray() -> U256 {
    U256::from(10).pow(U256::from(27))
}

/// Half-up ray multiplication, matching the on-chain wad-ray math.
fn ray_mul(a: U256, b: U256) -> U256 {
    let half = ray() / U256::from(2);
    a.checked_mul(b)
        .and_then(|product| product.checked_add(half))
        .map(|product| product / ray())
        .unwrap_or(U256::MAX)
}

/// Ray APR as a plain decimal fraction.
fn apr_from_ray_rate(rate: &str) -> String {
    to_human(units(rate), 27)
}

/// Ray APR to the effective APY of per-second compounding over a year.
fn apy_from_ray_rate(rate: &str) -> String {
    let apr = parse_f64_or_zero(&to_human(units(rate), 27));
    let apy = (1.0 + apr / SECONDS_PER_YEAR).powf(SECONDS_PER_YEAR) - 1.0;
    format!("{}", apy)
}

fn bps_to_fraction(value: &str) -> String {
    format!("{}", parse_f64_or_zero(value) / 10_000.0)
}
