//! Live chart data for analysed coins

pub mod dexscreener;

pub use dexscreener::{DexScreenerClient, GraphData};
