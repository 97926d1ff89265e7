pub mod asset_lists;
pub mod config;
pub mod eligibility;
pub mod market_provider;
pub mod reserve_formatter;
pub mod reserve_reconciler;
pub mod snapshot_service;
pub mod utils;
