use std::cmp::Ordering;
use std::collections::BTreeMap;

use mock_ledger::projections::WalletBalance;

use crate::config::LocalConfig;
use crate::eligibility::models::{BorrowRow, SupplyRow};
use crate::eligibility::{
    asset_can_be_borrowed_by_user, borrow_row_for, display_gho_for_mintable_market,
    supply_rows_for,
};
use crate::market_provider::models::ReserveWithId;
use crate::reserve_reconciler::AppSnapshot;
use crate::utils::num::parse_f64_or_zero;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    /// Larger values first.
    Descending,
}

/// Sortable columns of the market-wide reserve list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSortKey {
    Symbol,
    TotalSuppliedUsd,
    SupplyApy,
    TotalBorrowedUsd,
    BorrowApy,
}

/// Sortable columns of the supply asset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplySortKey {
    Symbol,
    WalletBalance,
    AvailableToDeposit,
    SupplyApy,
}

/// Sortable columns of the borrow asset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowSortKey {
    Symbol,
    AvailableBorrows,
    VariableBorrowRate,
}

/// Builds the supply asset list from the reconciled reserves: closed or
/// hidden reserves drop out, mintable GHO never shows on the supply side,
/// and wrapped base reserves expand into their two rows.
pub fn build_supply_list(
    app: &AppSnapshot,
    wallet_balances: &BTreeMap<String, WalletBalance>,
    config: &LocalConfig,
) -> Vec<SupplyRow> {
    app.reserves
        .iter()
        .filter(|reserve| !reserve.is_frozen && !reserve.is_paused)
        .filter(|reserve| !display_gho_for_mintable_market(&reserve.symbol, config))
        .filter(|reserve| !is_hidden(&reserve.underlying_asset, config))
        .flat_map(|reserve| {
            supply_rows_for(
                reserve,
                app.user.as_ref(),
                wallet_balances,
                &app.market_reference_price_in_usd,
                config,
            )
        })
        .collect()
}

/// Builds the borrow asset list. Reserves the user cannot borrow drop out,
/// and dead rows, with nothing to borrow and no liquidity at all, are
/// hidden unless they are the market's mintable GHO.
pub fn build_borrow_list(app: &AppSnapshot, config: &LocalConfig) -> Vec<BorrowRow> {
    app.reserves
        .iter()
        .filter(|reserve| asset_can_be_borrowed_by_user(reserve, app.user.as_ref()))
        .filter(|reserve| !is_hidden(&reserve.underlying_asset, config))
        .map(|reserve| {
            borrow_row_for(
                reserve,
                app.user.as_ref(),
                &app.market_reference_price_in_usd,
                config,
            )
        })
        .filter(|row| {
            display_gho_for_mintable_market(&row.symbol, config)
                || !(row.available_borrows == 0.0 && row.total_liquidity_usd == 0.0)
        })
        .collect()
}

pub fn sort_market_reserves(
    rows: &mut [ReserveWithId],
    key: MarketSortKey,
    direction: SortDirection,
) {
    rows.sort_by(|a, b| match key {
        MarketSortKey::Symbol => compare_strings(
            &a.reserve.underlying_token.symbol,
            &b.reserve.underlying_token.symbol,
            direction,
        ),
        MarketSortKey::TotalSuppliedUsd => {
            compare_numbers(supplied_usd(a), supplied_usd(b), direction)
        }
        MarketSortKey::SupplyApy => compare_numbers(
            parse_f64_or_zero(&a.reserve.supply_info.apy.value),
            parse_f64_or_zero(&b.reserve.supply_info.apy.value),
            direction,
        ),
        MarketSortKey::TotalBorrowedUsd => {
            compare_numbers(borrowed_usd(a), borrowed_usd(b), direction)
        }
        MarketSortKey::BorrowApy => compare_numbers(borrow_apy(a), borrow_apy(b), direction),
    });
}

pub fn sort_supply_rows(rows: &mut [SupplyRow], key: SupplySortKey, direction: SortDirection) {
    rows.sort_by(|a, b| match key {
        SupplySortKey::Symbol => compare_strings(&a.symbol, &b.symbol, direction),
        SupplySortKey::WalletBalance => compare_numbers(
            parse_f64_or_zero(&a.wallet_balance),
            parse_f64_or_zero(&b.wallet_balance),
            direction,
        ),
        SupplySortKey::AvailableToDeposit => compare_numbers(
            parse_f64_or_zero(&a.available_to_deposit),
            parse_f64_or_zero(&b.available_to_deposit),
            direction,
        ),
        SupplySortKey::SupplyApy => compare_numbers(
            parse_f64_or_zero(&a.supply_apy),
            parse_f64_or_zero(&b.supply_apy),
            direction,
        ),
    });
}

pub fn sort_borrow_rows(rows: &mut [BorrowRow], key: BorrowSortKey, direction: SortDirection) {
    rows.sort_by(|a, b| match key {
        BorrowSortKey::Symbol => compare_strings(&a.symbol, &b.symbol, direction),
        BorrowSortKey::AvailableBorrows => {
            compare_numbers(a.available_borrows, b.available_borrows, direction)
        }
        BorrowSortKey::VariableBorrowRate => {
            compare_numbers(a.variable_borrow_rate, b.variable_borrow_rate, direction)
        }
    });
}

fn is_hidden(underlying_asset: &str, config: &LocalConfig) -> bool {
    config
        .hidden_assets
        .iter()
        .any(|hidden| hidden.eq_ignore_ascii_case(underlying_asset))
}

fn supplied_usd(row: &ReserveWithId) -> f64 {
    parse_f64_or_zero(&row.reserve.size.usd)
}

fn borrowed_usd(row: &ReserveWithId) -> f64 {
    row.reserve
        .borrow_info
        .as_ref()
        .map(|info| parse_f64_or_zero(&info.total.usd))
        .unwrap_or(0.0)
}

fn borrow_apy(row: &ReserveWithId) -> f64 {
    row.reserve
        .borrow_info
        .as_ref()
        .map(|info| parse_f64_or_zero(&info.apy.value))
        .unwrap_or(0.0)
}

/// Case-insensitive string compare; ties keep their incoming order because
/// the underlying sort is stable.
fn compare_strings(a: &str, b: &str, direction: SortDirection) -> Ordering {
    apply_direction(a.to_uppercase().cmp(&b.to_uppercase()), direction)
}

fn compare_numbers(a: f64, b: f64, direction: SortDirection) -> Ordering {
    apply_direction(a.partial_cmp(&b).unwrap_or(Ordering::Equal), direction)
}

fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_provider::test_feed;
    use crate::reserve_reconciler::reconcile;
    use mock_ledger::{Ledger, USDX_ADDRESS};

    fn test_config() -> LocalConfig {
        LocalConfig {
            api_url: String::new(),
            market_address: "0x34913089bd5944a27b8ef8b1b3a25ff776dfce74".to_string(),
            chain_id: 42793,
            base_asset_symbol: "XTZ".to_string(),
            wrapped_base_asset_symbol: "WETH".to_string(),
            hidden_assets: Vec::new(),
            gho_mintable_markets: Vec::new(),
            user_address: Some(mock_ledger::MOCK_ACCOUNT.to_string()),
            snapshot_update_frequency: 1,
            test_mode: true,
        }
    }

    fn seeded_app(config: &LocalConfig) -> (AppSnapshot, BTreeMap<String, WalletBalance>) {
        let ledger = Ledger::seeded();
        let feeds = test_feed::feeds_from_ledger(&ledger, config);
        let app = reconcile(&feeds, true, &config.market_address);
        let wallet = feeds.wallet_balances.value().cloned().unwrap_or_default();
        (app, wallet)
    }

    #[test]
    fn supply_list_expands_the_wrapped_base_reserve() {
        let config = test_config();
        let (app, wallet) = seeded_app(&config);

        let rows = build_supply_list(&app, &wallet, &config);

        // Three reserves plus the synthetic native row.
        assert_eq!(rows.len(), 4);
        let native = rows.iter().find(|r| r.symbol == "XTZ").unwrap();
        assert!(native.id.ends_with("base"));
        assert_eq!(rows.iter().filter(|r| r.symbol == "WETH").count(), 1);
    }

    #[test]
    fn hidden_assets_drop_from_both_lists() {
        let mut config = test_config();
        config.hidden_assets = vec![USDX_ADDRESS.to_string()];
        let (app, wallet) = seeded_app(&config);

        let supply = build_supply_list(&app, &wallet, &config);
        let borrow = build_borrow_list(&app, &config);

        assert!(supply.iter().all(|r| r.underlying_asset != USDX_ADDRESS));
        assert!(borrow.iter().all(|r| r.underlying_asset != USDX_ADDRESS));
        assert_eq!(supply.len(), 3);
        assert_eq!(borrow.len(), 2);
    }

    #[test]
    fn closed_reserves_leave_the_lists() {
        let config = test_config();
        let (mut app, wallet) = seeded_app(&config);
        for reserve in &mut app.reserves {
            if reserve.underlying_asset == USDX_ADDRESS {
                reserve.is_frozen = true;
            }
        }

        let supply = build_supply_list(&app, &wallet, &config);
        let borrow = build_borrow_list(&app, &config);

        assert!(supply.iter().all(|r| r.underlying_asset != USDX_ADDRESS));
        assert!(borrow.iter().all(|r| r.underlying_asset != USDX_ADDRESS));
    }

    #[test]
    fn mintable_gho_skips_supply_but_survives_an_empty_borrow_row() {
        let mut config = test_config();
        config.gho_mintable_markets = vec![config.market_address.clone()];
        let (mut app, wallet) = seeded_app(&config);
        for reserve in &mut app.reserves {
            if reserve.underlying_asset == USDX_ADDRESS {
                reserve.symbol = "GHO".to_string();
                // Nothing to borrow and no liquidity, which would hide any
                // other reserve.
                reserve.available_liquidity = "0".to_string();
                reserve.total_liquidity_usd = "0".to_string();
            }
        }

        let supply = build_supply_list(&app, &wallet, &config);
        let borrow = build_borrow_list(&app, &config);

        assert!(supply.iter().all(|r| r.symbol != "GHO"));
        assert!(borrow.iter().any(|r| r.symbol == "GHO"));
    }

    #[test]
    fn dead_borrow_rows_are_hidden() {
        let config = test_config();
        let (mut app, _wallet) = seeded_app(&config);
        for reserve in &mut app.reserves {
            if reserve.underlying_asset == USDX_ADDRESS {
                reserve.available_liquidity = "0".to_string();
                reserve.total_liquidity_usd = "0".to_string();
            }
        }

        let borrow = build_borrow_list(&app, &config);
        assert!(borrow.iter().all(|r| r.underlying_asset != USDX_ADDRESS));
        assert_eq!(borrow.len(), 2);
    }

    #[test]
    fn market_rows_sort_by_total_supplied() {
        let config = test_config();
        let (app, _) = seeded_app(&config);
        let mut rows = app.supply_reserves.clone();

        sort_market_reserves(&mut rows, MarketSortKey::TotalSuppliedUsd, SortDirection::Descending);
        let symbols: Vec<&str> = rows
            .iter()
            .map(|r| r.reserve.underlying_token.symbol.as_str())
            .collect();
        // 40000, 20000 and 1000 dollars of supplied liquidity.
        assert_eq!(symbols, vec!["WBTC", "WETH", "USDX"]);

        sort_market_reserves(&mut rows, MarketSortKey::Symbol, SortDirection::Ascending);
        let symbols: Vec<&str> = rows
            .iter()
            .map(|r| r.reserve.underlying_token.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["USDX", "WBTC", "WETH"]);
    }

    #[test]
    fn supply_rows_sort_by_available_to_deposit() {
        let config = test_config();
        let (app, wallet) = seeded_app(&config);
        let mut rows = build_supply_list(&app, &wallet, &config);

        sort_supply_rows(&mut rows, SupplySortKey::AvailableToDeposit, SortDirection::Descending);
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        // 5000 USDX, 5 WETH, 2 WBTC, 1 native unit.
        assert_eq!(symbols, vec!["USDX", "WETH", "WBTC", "XTZ"]);
    }

    #[test]
    fn borrow_rows_sort_by_rate_in_both_directions() {
        let config = test_config();
        let (app, _) = seeded_app(&config);
        let mut rows = build_borrow_list(&app, &config);

        sort_borrow_rows(&mut rows, BorrowSortKey::VariableBorrowRate, SortDirection::Descending);
        let rates: Vec<f64> = rows.iter().map(|r| r.variable_borrow_rate).collect();
        assert_eq!(rates, vec![0.06, 0.05, 0.04]);

        sort_borrow_rows(&mut rows, BorrowSortKey::VariableBorrowRate, SortDirection::Ascending);
        let rates: Vec<f64> = rows.iter().map(|r| r.variable_borrow_rate).collect();
        assert_eq!(rates, vec![0.04, 0.05, 0.06]);
    }

    #[test]
    fn equal_keys_keep_their_incoming_order() {
        let config = test_config();
        let (app, _) = seeded_app(&config);
        let mut rows = build_borrow_list(&app, &config);
        for row in &mut rows {
            row.variable_borrow_rate = 0.05;
        }
        let before: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        sort_borrow_rows(&mut rows, BorrowSortKey::VariableBorrowRate, SortDirection::Descending);
        let after: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        assert_eq!(before, after);
    }
}
