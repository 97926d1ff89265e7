use std::collections::BTreeMap;

use serde::Serialize;

use mock_ledger::projections::FormattedReserve;

use crate::market_provider::models::{
    DataFeeds, EModeCategory, MarketReserve, MarketSnapshot, MarketUserState, RawUserReserve,
    ReserveWithId, UserSummary,
};
use crate::utils::num::{parse_f64_or_nan, parse_f64_or_zero};

/// Headline market figures once a source has been chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    pub address: String,
    pub total_market_size: String,
    pub total_available_liquidity: String,
}

/// E-mode category with the symbols of its member reserves, grouped
/// market-wide for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmodeSummary {
    pub id: u8,
    pub label: String,
    pub ltv: String,
    pub liquidation_threshold: String,
    pub assets: Vec<String>,
}

/// The reconciled application state one refresh produces. Everything the
/// dashboard shows derives from this struct and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    pub loading: bool,
    pub error: Option<String>,
    pub market: Option<MarketOverview>,
    pub total_borrows: f64,
    pub supply_reserves: Vec<ReserveWithId>,
    pub borrow_reserves: Vec<ReserveWithId>,
    pub e_mode_categories: Vec<EModeCategory>,
    pub e_modes: BTreeMap<u8, EmodeSummary>,
    pub user_state: Option<MarketUserState>,
    pub reserves: Vec<FormattedReserve>,
    pub user: Option<UserSummary>,
    pub user_reserves: Vec<RawUserReserve>,
    pub market_reference_price_in_usd: String,
    pub market_reference_currency_decimals: u8,
}

impl Default for AppSnapshot {
    fn default() -> Self {
        AppSnapshot {
            loading: true,
            error: None,
            market: None,
            total_borrows: 0.0,
            supply_reserves: Vec::new(),
            borrow_reserves: Vec::new(),
            e_mode_categories: Vec::new(),
            e_modes: BTreeMap::new(),
            user_state: None,
            reserves: Vec::new(),
            user: None,
            user_reserves: Vec::new(),
            market_reference_price_in_usd: "100000000".to_string(),
            market_reference_currency_decimals: 8,
        }
    }
}

/// Folds one cycle's feeds into the application state.
///
/// The aggregation service is preferred for the display lists, but only
/// wholesale: if its market entry is missing or either of its lists comes
/// back empty, both lists are rebuilt from the locally formatted reserves.
/// Mixing sources inside one list is never allowed, otherwise the two
/// halves of the page could disagree about the same reserve.
///
/// The headline borrow total is chosen independently of the lists: a
/// non-finite remote sum (absent market, unparsable figures) falls back to
/// summing the local rows.
pub fn reconcile(feeds: &DataFeeds, has_account: bool, market_address: &str) -> AppSnapshot {
    let formatted = feeds
        .formatted_reserves
        .value()
        .cloned()
        .unwrap_or_default();

    let sdk_market = feeds
        .market
        .value()
        .and_then(|markets| find_market(markets, market_address));

    let fallback: Vec<MarketReserve> = formatted.iter().map(MarketReserve::from).collect();
    // A matched remote market keys the ids in its own casing, even when its
    // lists lose to the fallback.
    let market_key = sdk_market
        .map(|market| market.address.clone())
        .unwrap_or_else(|| market_address.to_lowercase());
    let (supply_reserves, borrow_reserves) = match sdk_market {
        Some(market)
            if !market.supply_reserves.is_empty() && !market.borrow_reserves.is_empty() =>
        {
            (
                with_ids(&market.supply_reserves, &market_key),
                with_ids(&market.borrow_reserves, &market_key),
            )
        }
        _ => (
            with_ids(&fallback, &market_key),
            with_ids(&fallback, &market_key),
        ),
    };

    let fallback_total_borrows: f64 = formatted
        .iter()
        .map(|reserve| parse_f64_or_zero(&reserve.total_debt_usd))
        .sum();
    let total_borrows = match sdk_market.map(sum_remote_borrows) {
        Some(total) if total.is_finite() => total,
        _ => fallback_total_borrows,
    };

    let market = market_overview(sdk_market, &formatted, market_address);

    let user_pending = feeds.user_reserves.is_pending() || feeds.user_summary.is_pending();
    let loading = feeds.market.is_pending()
        || feeds.raw_reserves.is_pending()
        || feeds.formatted_reserves.is_pending()
        || (has_account && user_pending);

    let base = feeds.raw_reserves.value().map(|raw| &raw.base_currency_data);

    AppSnapshot {
        loading,
        error: feeds.raw_reserves.error().map(str::to_string),
        market,
        total_borrows,
        supply_reserves,
        borrow_reserves,
        e_mode_categories: sdk_market
            .map(|market| market.e_mode_categories.clone())
            .unwrap_or_default(),
        e_modes: emode_summaries(&formatted),
        user_state: sdk_market.and_then(|market| market.user_state.clone()),
        reserves: formatted,
        user: feeds.user_summary.value().cloned(),
        user_reserves: feeds
            .user_reserves
            .value()
            .map(|response| response.user_reserves.clone())
            .unwrap_or_default(),
        market_reference_price_in_usd: base
            .map(|b| b.market_reference_currency_price_in_usd.clone())
            .unwrap_or_else(|| "100000000".to_string()),
        market_reference_currency_decimals: base
            .map(|b| b.market_reference_currency_decimals)
            .unwrap_or(8),
    }
}

fn find_market<'a>(markets: &'a [MarketSnapshot], address: &str) -> Option<&'a MarketSnapshot> {
    markets
        .iter()
        .find(|market| market.address.eq_ignore_ascii_case(address))
}

/// Re-keys reserves with the market-scoped composite id so rows stay
/// addressable across markets that list the same underlying.
fn with_ids(reserves: &[MarketReserve], market_key: &str) -> Vec<ReserveWithId> {
    reserves
        .iter()
        .map(|reserve| ReserveWithId {
            id: format!("{}-{}", market_key, reserve.underlying_token.address),
            reserve: reserve.clone(),
        })
        .collect()
}

/// Sums the remote borrow figures. Any unparsable figure poisons the sum
/// to NaN so the caller can tell "zero" from "unusable".
fn sum_remote_borrows(market: &MarketSnapshot) -> f64 {
    market
        .borrow_reserves
        .iter()
        .map(|reserve| {
            reserve
                .borrow_info
                .as_ref()
                .map(|info| parse_f64_or_nan(&info.total.usd))
                .unwrap_or(0.0)
        })
        .sum()
}

fn market_overview(
    sdk_market: Option<&MarketSnapshot>,
    formatted: &[FormattedReserve],
    market_address: &str,
) -> Option<MarketOverview> {
    if let Some(market) = sdk_market {
        let size = parse_f64_or_nan(&market.total_market_size);
        let available = parse_f64_or_nan(&market.total_available_liquidity);
        if size.is_finite() && available.is_finite() {
            return Some(MarketOverview {
                address: market.address.clone(),
                total_market_size: market.total_market_size.clone(),
                total_available_liquidity: market.total_available_liquidity.clone(),
            });
        }
    }

    if formatted.is_empty() {
        return None;
    }
    let total_market_size: f64 = formatted
        .iter()
        .map(|reserve| parse_f64_or_zero(&reserve.total_liquidity_usd))
        .sum();
    let total_available: f64 = formatted
        .iter()
        .map(|reserve| parse_f64_or_zero(&reserve.available_liquidity_usd))
        .sum();
    Some(MarketOverview {
        address: market_address.to_string(),
        total_market_size: format!("{}", total_market_size),
        total_available_liquidity: format!("{}", total_available),
    })
}

fn emode_summaries(formatted: &[FormattedReserve]) -> BTreeMap<u8, EmodeSummary> {
    let mut summaries = BTreeMap::new();
    for reserve in formatted {
        for emode in &reserve.e_modes {
            let entry = summaries.entry(emode.id).or_insert_with(|| EmodeSummary {
                id: emode.id,
                label: emode.label.clone(),
                ltv: emode.ltv.clone(),
                liquidation_threshold: emode.liquidation_threshold.clone(),
                assets: Vec::new(),
            });
            entry.assets.push(reserve.symbol.clone());
        }
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_provider::models::{BaseCurrencyData, FetchState, RawReservesResponse};
    use mock_ledger::Ledger;

    const MARKET: &str = "0x34913089bd5944a27b8ef8b1b3a25ff776dfce74";

    fn ready_feeds() -> DataFeeds {
        let ledger = Ledger::seeded();
        let formatted = ledger.formatted_reserves();
        let market = MarketSnapshot {
            address: MARKET.to_string(),
            chain_id: Some(42793),
            total_market_size: "999".to_string(),
            total_available_liquidity: "111".to_string(),
            supply_reserves: formatted.iter().take(1).map(MarketReserve::from).collect(),
            borrow_reserves: formatted.iter().take(1).map(MarketReserve::from).collect(),
            e_mode_categories: vec![EModeCategory {
                id: 1,
                label: "Stablecoins".to_string(),
                ltv: "0.93".to_string(),
                liquidation_threshold: "0.95".to_string(),
            }],
            user_state: Some(MarketUserState::default()),
        };

        DataFeeds {
            market: FetchState::Ready(vec![market]),
            raw_reserves: FetchState::Ready(RawReservesResponse {
                reserves_data: Vec::new(),
                base_currency_data: BaseCurrencyData {
                    market_reference_currency_decimals: 8,
                    market_reference_currency_price_in_usd: "100000000".to_string(),
                    network_base_token_price_in_usd: "2000".to_string(),
                    network_base_token_price_decimals: 8,
                },
            }),
            formatted_reserves: FetchState::Ready(formatted),
            user_reserves: FetchState::Pending,
            user_summary: FetchState::Pending,
            wallet_balances: FetchState::Pending,
        }
    }

    #[test]
    fn complete_remote_lists_win() {
        let feeds = ready_feeds();
        let snapshot = reconcile(&feeds, false, MARKET);

        assert_eq!(snapshot.supply_reserves.len(), 1);
        assert_eq!(snapshot.borrow_reserves.len(), 1);
        assert!(snapshot.supply_reserves[0].id.starts_with(MARKET));
        let overview = snapshot.market.unwrap();
        assert_eq!(overview.total_market_size, "999");
    }

    #[test]
    fn the_remote_market_keys_the_ids_with_its_own_address() {
        let checksummed = "0x34913089BD5944a27B8EF8b1b3A25Ff776dfce74";
        let mut feeds = ready_feeds();
        if let FetchState::Ready(markets) = &mut feeds.market {
            markets[0].address = checksummed.to_string();
        }

        let snapshot = reconcile(&feeds, false, MARKET);
        assert!(snapshot.supply_reserves[0].id.starts_with(checksummed));

        // The matched market still keys the rows when its empty lists lose
        // to the locally formatted fallback.
        if let FetchState::Ready(markets) = &mut feeds.market {
            markets[0].borrow_reserves.clear();
        }
        let snapshot = reconcile(&feeds, false, MARKET);
        assert_eq!(snapshot.supply_reserves.len(), 3);
        for row in &snapshot.supply_reserves {
            assert!(row.id.starts_with(checksummed));
        }
    }

    #[test]
    fn failed_market_feed_falls_back_to_local_rows() {
        let mut feeds = ready_feeds();
        feeds.market = FetchState::Failed("fetching /markets -> timeout".to_string());

        let snapshot = reconcile(&feeds, false, MARKET);

        // Seeded ledger projects three reserves.
        assert_eq!(snapshot.supply_reserves.len(), 3);
        assert_eq!(snapshot.borrow_reserves.len(), 3);
        for row in &snapshot.supply_reserves {
            assert!(row.id.starts_with(MARKET));
            assert!(row.id.contains('-'));
        }
        // Headline figures are synthesized from the same rows.
        let overview = snapshot.market.unwrap();
        assert_eq!(overview.address, MARKET);
        assert_eq!(
            overview.total_market_size.parse::<f64>().unwrap(),
            Ledger::seeded()
                .market_totals()
                .total_market_size
                .parse::<f64>()
                .unwrap()
        );
    }

    #[test]
    fn an_empty_remote_list_rejects_the_whole_market() {
        let mut feeds = ready_feeds();
        if let FetchState::Ready(markets) = &mut feeds.market {
            markets[0].borrow_reserves.clear();
        }

        let snapshot = reconcile(&feeds, false, MARKET);

        // Both lists come from the fallback, not just the empty one.
        assert_eq!(snapshot.supply_reserves.len(), 3);
        assert_eq!(snapshot.borrow_reserves.len(), 3);
    }

    #[test]
    fn unparsable_remote_borrows_poison_only_the_total() {
        let mut feeds = ready_feeds();
        if let FetchState::Ready(markets) = &mut feeds.market {
            let info = markets[0].borrow_reserves[0].borrow_info.as_mut().unwrap();
            info.total.usd = "n/a".to_string();
        }

        let snapshot = reconcile(&feeds, false, MARKET);

        // Lists still come from the remote market.
        assert_eq!(snapshot.supply_reserves.len(), 1);
        // The total does not: it is re-derived from the local rows.
        let local_total: f64 = Ledger::seeded()
            .market_totals()
            .total_borrows
            .parse()
            .unwrap();
        assert_eq!(snapshot.total_borrows, local_total);
    }

    #[test]
    fn a_mismatched_market_address_is_ignored() {
        let feeds = ready_feeds();
        let snapshot = reconcile(&feeds, false, "0x000000000000000000000000000000000000beef");

        assert_eq!(snapshot.supply_reserves.len(), 3);
        assert!(snapshot.e_mode_categories.is_empty());
        assert!(snapshot.user_state.is_none());
    }

    #[test]
    fn loading_tracks_the_account_sensitive_feeds() {
        let mut feeds = ready_feeds();
        assert!(!reconcile(&feeds, false, MARKET).loading);
        // With an account the pending user trio keeps the page loading.
        assert!(reconcile(&feeds, true, MARKET).loading);

        feeds.formatted_reserves = FetchState::Pending;
        assert!(reconcile(&feeds, false, MARKET).loading);
    }

    #[test]
    fn a_pending_raw_read_keeps_the_snapshot_loading() {
        let mut feeds = ready_feeds();
        feeds.raw_reserves = FetchState::Pending;

        assert!(reconcile(&feeds, false, MARKET).loading);
    }

    #[test]
    fn only_the_raw_reserve_failure_surfaces_as_the_error() {
        let mut feeds = ready_feeds();
        feeds.market = FetchState::Failed("fetching /markets -> timeout".to_string());
        assert!(reconcile(&feeds, false, MARKET).error.is_none());

        feeds.raw_reserves =
            FetchState::Failed("fetching /reserves -> connection refused".to_string());
        let snapshot = reconcile(&feeds, false, MARKET);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("fetching /reserves -> connection refused")
        );
    }

    #[test]
    fn emode_memberships_group_into_market_summaries() {
        use mock_ledger::projections::ReserveEmode;

        let mut feeds = ready_feeds();
        if let FetchState::Ready(formatted) = &mut feeds.formatted_reserves {
            let membership = ReserveEmode {
                id: 1,
                label: "Stablecoins".to_string(),
                ltv: "0.93".to_string(),
                liquidation_threshold: "0.95".to_string(),
                collateral_enabled: true,
                borrowing_enabled: true,
            };
            formatted[0].e_modes.push(membership.clone());
            formatted[1].e_modes.push(membership);
        }

        let snapshot = reconcile(&feeds, false, MARKET);
        let summary = &snapshot.e_modes[&1];
        assert_eq!(summary.label, "Stablecoins");
        assert_eq!(summary.assets.len(), 2);
    }
}
