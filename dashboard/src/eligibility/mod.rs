pub mod models;

use std::collections::BTreeMap;

use mock_ledger::projections::{FormattedReserve, WalletBalance};
use mock_ledger::NATIVE_ASSET_ADDRESS;

use crate::config::LocalConfig;
use crate::market_provider::models::UserSummary;
use crate::utils::num::parse_f64_or_zero;

use models::{BorrowRow, SupplyRow};

/// Headroom kept back from a supply cap so a deposit computed off a slightly
/// stale read cannot overshoot it.
const SUPPLY_CAP_BUFFER: f64 = 0.995;

/// Decimals the market reference price is quoted in.
const USD_DECIMALS: i32 = 8;

/// Whether the user can open a borrow against this reserve at all.
///
/// A user in isolation mode may only borrow assets the protocol marks
/// borrowable in isolation.
pub fn asset_can_be_borrowed_by_user(
    reserve: &FormattedReserve,
    user: Option<&UserSummary>,
) -> bool {
    let isolation_ok = match user {
        Some(user) if user.is_in_isolation_mode => reserve.borrowable_in_isolation,
        _ => true,
    };
    reserve.borrowing_enabled
        && reserve.is_active
        && !reserve.is_frozen
        && !reserve.is_paused
        && isolation_ok
}

/// Largest borrow the user could open right now, in tokens.
///
/// The binding constraint is whichever of these is smallest: what the
/// reserve has on hand, what the user's collateral supports, and what is
/// left under the borrow cap. A cap of `"0"` means uncapped.
pub fn max_amount_available_to_borrow(
    reserve: &FormattedReserve,
    user: Option<&UserSummary>,
) -> f64 {
    let available_liquidity = parse_f64_or_zero(&reserve.available_liquidity);

    let price = parse_f64_or_zero(&reserve.formatted_price_in_market_reference_currency);
    let borrowing_power = match user {
        Some(user) if price > 0.0 => {
            parse_f64_or_zero(&user.available_borrows_market_reference_currency) / price
        }
        _ => 0.0,
    };

    let cap_headroom = if reserve.borrow_cap == "0" {
        f64::INFINITY
    } else {
        (parse_f64_or_zero(&reserve.borrow_cap) - parse_f64_or_zero(&reserve.total_debt)).max(0.0)
    };

    available_liquidity.min(borrowing_power).min(cap_headroom)
}

/// Whether supplying this reserve would count as collateral for the user.
///
/// Isolated reserves are exclusive: they can back a position only when no
/// other collateral is enabled, and a user already in isolation mode can
/// use nothing but their isolated reserve. An active e-mode category can
/// grant collateral status to a member reserve whose base liquidation
/// threshold is zero.
pub fn usage_as_collateral_enabled_on_user(
    reserve: &FormattedReserve,
    user: Option<&UserSummary>,
) -> bool {
    let has_different_collateral = user
        .map(|user| {
            user.user_reserves_data.iter().any(|entry| {
                entry.usage_as_collateral_enabled_on_user
                    && !entry
                        .underlying_asset
                        .eq_ignore_ascii_case(&reserve.underlying_asset)
            })
        })
        .unwrap_or(false);

    let emode_collateral = user
        .filter(|user| user.is_in_emode)
        .and_then(|user| {
            reserve
                .e_modes
                .iter()
                .find(|membership| membership.id == user.user_emode_category_id)
        })
        .map(|membership| membership.collateral_enabled)
        .unwrap_or(false);
    let has_liquidation_threshold =
        reserve.reserve_liquidation_threshold != "0" || emode_collateral;

    match user {
        Some(user) if user.is_in_isolation_mode => {
            reserve.is_isolated && !has_different_collateral
        }
        _ => has_liquidation_threshold && (!reserve.is_isolated || !has_different_collateral),
    }
}

/// Largest deposit the wallet supports, in tokens. Capped reserves keep a
/// small buffer under the cap so the figure survives the next accrual.
pub fn available_to_deposit(reserve: &FormattedReserve, wallet_balance: f64) -> f64 {
    if reserve.supply_cap == "0" {
        return wallet_balance.max(0.0);
    }
    let headroom = (parse_f64_or_zero(&reserve.supply_cap)
        - parse_f64_or_zero(&reserve.total_liquidity))
        * SUPPLY_CAP_BUFFER;
    wallet_balance.min(headroom).max(0.0)
}

/// Token amount to dollars through the market reference currency.
pub fn usd_value(
    amount: f64,
    reserve: &FormattedReserve,
    market_reference_price_in_usd: &str,
) -> f64 {
    amount
        * parse_f64_or_zero(&reserve.formatted_price_in_market_reference_currency)
        * parse_f64_or_zero(market_reference_price_in_usd)
        * 10f64.powi(-USD_DECIMALS)
}

/// Supply rows for one reserve. A wrapped base asset yields two: a
/// synthetic native row that deposits the unwrapped balance into the
/// reserve, followed by the reserve itself.
pub fn supply_rows_for(
    reserve: &FormattedReserve,
    user: Option<&UserSummary>,
    wallet_balances: &BTreeMap<String, WalletBalance>,
    market_reference_price_in_usd: &str,
    config: &LocalConfig,
) -> Vec<SupplyRow> {
    let collateral = usage_as_collateral_enabled_on_user(reserve, user);

    let row = |id: String, underlying: String, symbol: String, balance: Option<&WalletBalance>| {
        let wallet_balance = balance.map(|b| b.amount.clone()).unwrap_or_else(|| "0".to_string());
        let wallet_balance_usd = balance
            .map(|b| b.amount_usd.clone())
            .unwrap_or_else(|| "0".to_string());
        let deposit = available_to_deposit(reserve, parse_f64_or_zero(&wallet_balance));
        SupplyRow {
            id,
            underlying_asset: underlying,
            details_address: reserve.underlying_asset.clone(),
            symbol,
            name: reserve.name.clone(),
            wallet_balance,
            wallet_balance_usd,
            available_to_deposit: format!("{}", deposit),
            available_to_deposit_usd: format!(
                "{}",
                usd_value(deposit, reserve, market_reference_price_in_usd)
            ),
            supply_apy: reserve.supply_apy.clone(),
            usage_as_collateral_enabled_on_user: collateral,
            is_isolated: reserve.is_isolated,
        }
    };

    let mut rows = Vec::with_capacity(2);

    // The native row leads; the wrapped reserve follows it.
    if reserve.is_wrapped_base_asset {
        rows.push(row(
            format!("{}base", reserve.id),
            NATIVE_ASSET_ADDRESS.to_string(),
            config.base_asset_symbol.clone(),
            wallet_balances.get(NATIVE_ASSET_ADDRESS),
        ));
    }

    rows.push(row(
        reserve.id.clone(),
        reserve.underlying_asset.clone(),
        reserve.symbol.clone(),
        wallet_balances.get(&reserve.underlying_asset),
    ));

    rows
}

/// Borrow row for one reserve. The wrapped base asset is shown under the
/// native symbol but stays a single row; unwrapping happens elsewhere.
pub fn borrow_row_for(
    reserve: &FormattedReserve,
    user: Option<&UserSummary>,
    market_reference_price_in_usd: &str,
    config: &LocalConfig,
) -> BorrowRow {
    let available = max_amount_available_to_borrow(reserve, user);
    let symbol = if reserve.is_wrapped_base_asset {
        config.base_asset_symbol.clone()
    } else {
        reserve.symbol.clone()
    };

    BorrowRow {
        id: reserve.id.clone(),
        underlying_asset: reserve.underlying_asset.clone(),
        symbol,
        name: reserve.name.clone(),
        available_borrows: available,
        available_borrows_in_usd: format!(
            "{:.2}",
            usd_value(available, reserve, market_reference_price_in_usd)
        ),
        variable_borrow_rate: if reserve.borrowing_enabled {
            parse_f64_or_zero(&reserve.variable_borrow_apy)
        } else {
            -1.0
        },
        total_liquidity_usd: parse_f64_or_zero(&reserve.total_liquidity_usd),
    }
}

/// GHO is minted, not supplied, so on markets that mint it the symbol is
/// kept out of the supply list and always shown in the borrow list.
pub fn display_gho_for_mintable_market(symbol: &str, config: &LocalConfig) -> bool {
    symbol == "GHO"
        && config
            .gho_mintable_markets
            .iter()
            .any(|market| market.eq_ignore_ascii_case(&config.market_address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_ledger::projections::ReserveEmode;
    use mock_ledger::{Ledger, WETH_ADDRESS};

    fn seeded_reserve(symbol: &str) -> FormattedReserve {
        Ledger::seeded()
            .formatted_reserves()
            .into_iter()
            .find(|r| r.symbol == symbol)
            .unwrap()
    }

    fn borrower(available_mrc: &str) -> UserSummary {
        UserSummary {
            user_reserves_data: Vec::new(),
            total_collateral_usd: "0".to_string(),
            total_borrows_usd: "0".to_string(),
            available_borrows_usd: available_mrc.to_string(),
            available_borrows_market_reference_currency: available_mrc.to_string(),
            health_factor: "-1".to_string(),
            is_in_isolation_mode: false,
            isolated_reserve_address: None,
            is_in_emode: false,
            user_emode_category_id: 0,
        }
    }

    fn test_config() -> LocalConfig {
        LocalConfig {
            api_url: String::new(),
            market_address: "0x34913089bd5944a27b8ef8b1b3a25ff776dfce74".to_string(),
            chain_id: 42793,
            base_asset_symbol: "XTZ".to_string(),
            wrapped_base_asset_symbol: "WETH".to_string(),
            hidden_assets: Vec::new(),
            gho_mintable_markets: Vec::new(),
            user_address: None,
            snapshot_update_frequency: 1,
            test_mode: true,
        }
    }

    #[test]
    fn borrowability_requires_an_open_active_reserve() {
        let mut reserve = seeded_reserve("USDX");
        assert!(asset_can_be_borrowed_by_user(&reserve, None));

        reserve.is_frozen = true;
        assert!(!asset_can_be_borrowed_by_user(&reserve, None));
        reserve.is_frozen = false;

        reserve.is_paused = true;
        assert!(!asset_can_be_borrowed_by_user(&reserve, None));
        reserve.is_paused = false;

        reserve.is_active = false;
        assert!(!asset_can_be_borrowed_by_user(&reserve, None));
        reserve.is_active = true;

        reserve.borrowing_enabled = false;
        assert!(!asset_can_be_borrowed_by_user(&reserve, None));
    }

    #[test]
    fn isolation_mode_narrows_borrowable_assets() {
        let mut reserve = seeded_reserve("USDX");
        let mut user = borrower("1000");
        user.is_in_isolation_mode = true;

        assert!(!asset_can_be_borrowed_by_user(&reserve, Some(&user)));
        reserve.borrowable_in_isolation = true;
        assert!(asset_can_be_borrowed_by_user(&reserve, Some(&user)));
    }

    #[test]
    fn max_borrow_is_the_binding_constraint() {
        let mut reserve = seeded_reserve("USDX");
        reserve.available_liquidity = "400".to_string();

        // Power constrains first: 1000 of reference currency at price 1.
        assert_eq!(
            max_amount_available_to_borrow(&reserve, Some(&borrower("300"))),
            300.0
        );
        // Then liquidity.
        assert_eq!(
            max_amount_available_to_borrow(&reserve, Some(&borrower("900"))),
            400.0
        );
        // No account, nothing to borrow against.
        assert_eq!(max_amount_available_to_borrow(&reserve, None), 0.0);
    }

    #[test]
    fn borrow_cap_headroom_clamps_the_maximum() {
        let mut reserve = seeded_reserve("USDX");
        reserve.available_liquidity = "1000000".to_string();
        reserve.borrow_cap = "100".to_string();
        reserve.total_debt = "99.602".to_string();

        let max = max_amount_available_to_borrow(&reserve, Some(&borrower("1000000")));
        assert!((max - 0.398).abs() < 1e-9, "max was {max}");

        // A cap already exceeded leaves nothing.
        reserve.total_debt = "150".to_string();
        assert_eq!(
            max_amount_available_to_borrow(&reserve, Some(&borrower("1000000"))),
            0.0
        );
    }

    #[test]
    fn collateral_needs_a_liquidation_threshold() {
        let mut reserve = seeded_reserve("USDX");
        assert!(usage_as_collateral_enabled_on_user(&reserve, None));

        reserve.reserve_liquidation_threshold = "0".to_string();
        assert!(!usage_as_collateral_enabled_on_user(&reserve, None));

        // The protocol-level flag does not gate the derivation; a nonzero
        // threshold qualifies on its own.
        reserve.usage_as_collateral_enabled = false;
        reserve.reserve_liquidation_threshold = "0.65".to_string();
        assert!(usage_as_collateral_enabled_on_user(&reserve, None));
    }

    #[test]
    fn an_active_emode_category_can_grant_collateral() {
        let mut reserve = seeded_reserve("USDX");
        reserve.reserve_liquidation_threshold = "0".to_string();
        reserve.e_modes.push(ReserveEmode {
            id: 1,
            label: "Stablecoins".to_string(),
            ltv: "0.93".to_string(),
            liquidation_threshold: "0.95".to_string(),
            collateral_enabled: true,
            borrowing_enabled: true,
        });

        let mut user = borrower("0");
        assert!(!usage_as_collateral_enabled_on_user(&reserve, Some(&user)));

        user.is_in_emode = true;
        user.user_emode_category_id = 1;
        assert!(usage_as_collateral_enabled_on_user(&reserve, Some(&user)));

        // Membership in a different category does not help.
        user.user_emode_category_id = 2;
        assert!(!usage_as_collateral_enabled_on_user(&reserve, Some(&user)));
    }

    #[test]
    fn isolated_collateral_is_exclusive() {
        use crate::market_provider::models::UserReserveSummary;

        let mut isolated = seeded_reserve("USDX");
        isolated.is_isolated = true;

        let mut user = borrower("0");
        assert!(usage_as_collateral_enabled_on_user(&isolated, Some(&user)));

        // Any other enabled collateral blocks the isolated reserve.
        user.user_reserves_data.push(UserReserveSummary {
            underlying_asset: WETH_ADDRESS.to_string(),
            underlying_balance: "1".to_string(),
            underlying_balance_usd: "2000".to_string(),
            variable_borrows: "0".to_string(),
            variable_borrows_usd: "0".to_string(),
            usage_as_collateral_enabled_on_user: true,
        });
        assert!(!usage_as_collateral_enabled_on_user(&isolated, Some(&user)));

        // In isolation mode only the isolated reserve itself qualifies.
        let mut isolation_user = borrower("0");
        isolation_user.is_in_isolation_mode = true;
        isolation_user.user_reserves_data.push(UserReserveSummary {
            underlying_asset: isolated.underlying_asset.clone(),
            underlying_balance: "100".to_string(),
            underlying_balance_usd: "100".to_string(),
            variable_borrows: "0".to_string(),
            variable_borrows_usd: "0".to_string(),
            usage_as_collateral_enabled_on_user: true,
        });
        assert!(usage_as_collateral_enabled_on_user(&isolated, Some(&isolation_user)));
        let plain = seeded_reserve("WBTC");
        assert!(!usage_as_collateral_enabled_on_user(&plain, Some(&isolation_user)));
    }

    #[test]
    fn supply_cap_keeps_a_safety_margin() {
        let mut reserve = seeded_reserve("USDX");
        assert_eq!(available_to_deposit(&reserve, 5000.0), 5000.0);

        reserve.supply_cap = "100".to_string();
        reserve.total_liquidity = "99.6".to_string();
        let amount = available_to_deposit(&reserve, 5000.0);
        assert!((amount - 0.398).abs() < 1e-9, "amount was {amount}");

        // Wallet smaller than the headroom wins.
        let amount = available_to_deposit(&reserve, 0.1);
        assert!((amount - 0.1).abs() < 1e-12);

        // Over-cap reserves accept nothing.
        reserve.total_liquidity = "101".to_string();
        assert_eq!(available_to_deposit(&reserve, 5000.0), 0.0);
    }

    #[test]
    fn wrapped_base_reserves_expand_into_two_supply_rows() {
        let ledger = Ledger::seeded();
        let weth = seeded_reserve("WETH");
        let rows = supply_rows_for(
            &weth,
            None,
            &ledger.wallet_balances(),
            "100000000",
            &test_config(),
        );

        assert_eq!(rows.len(), 2);
        // The native row comes first.
        let (native, wrapped) = (&rows[0], &rows[1]);

        assert_eq!(wrapped.symbol, "WETH");
        assert_eq!(wrapped.wallet_balance, "5");
        assert_eq!(wrapped.details_address, WETH_ADDRESS);

        assert_eq!(native.id, format!("{}base", weth.id));
        assert_eq!(native.symbol, "XTZ");
        assert_eq!(native.underlying_asset, NATIVE_ASSET_ADDRESS);
        assert_eq!(native.details_address, WETH_ADDRESS);
        assert_eq!(native.wallet_balance, "1");
        assert_eq!(native.wallet_balance_usd, "2000");
        assert_eq!(native.available_to_deposit, "1");
        assert_eq!(native.available_to_deposit_usd, "2000");
    }

    #[test]
    fn plain_reserves_stay_a_single_row() {
        let ledger = Ledger::seeded();
        let usdx = seeded_reserve("USDX");
        let rows = supply_rows_for(
            &usdx,
            None,
            &ledger.wallet_balances(),
            "100000000",
            &test_config(),
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].wallet_balance, "5000");
        assert_eq!(rows[0].available_to_deposit, "5000");
        assert_eq!(rows[0].available_to_deposit_usd, "5000");
    }

    #[test]
    fn borrow_rows_relabel_the_wrapped_base_asset() {
        let weth = seeded_reserve("WETH");
        let row = borrow_row_for(&weth, Some(&borrower("4000")), "100000000", &test_config());

        assert_eq!(row.symbol, "XTZ");
        assert_eq!(row.underlying_asset, WETH_ADDRESS);
        // 4000 of reference currency buys 2 WETH at 2000.
        assert_eq!(row.available_borrows, 2.0);
        assert_eq!(row.available_borrows_in_usd, "4000.00");
        assert_eq!(row.total_liquidity_usd, 20000.0);
    }

    #[test]
    fn disabled_borrowing_is_marked_with_a_sentinel_rate() {
        let mut reserve = seeded_reserve("USDX");
        reserve.borrowing_enabled = false;
        let row = borrow_row_for(&reserve, None, "100000000", &test_config());
        assert_eq!(row.variable_borrow_rate, -1.0);
        assert_eq!(row.available_borrows, 0.0);
    }

    #[test]
    fn gho_only_displays_on_its_mintable_markets() {
        let mut config = test_config();
        assert!(!display_gho_for_mintable_market("GHO", &config));

        config.gho_mintable_markets = vec![config.market_address.clone()];
        assert!(display_gho_for_mintable_market("GHO", &config));
        assert!(!display_gho_for_mintable_market("USDX", &config));
    }
}
