//! Model input: column layout, feature vectors, and coin-data mapping

pub mod columns;
pub mod vector;
pub mod coin_data;

pub use columns::FeatureColumns;
pub use vector::{FeatureMatrix, FeatureVector};
pub use coin_data::{CoinData, CoinGeckoData, DexScreenerData, SocialData};
