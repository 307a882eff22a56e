//! Coin data submitted by the user and its mapping onto model features

use std::collections::BTreeMap;
use std::f64::consts::PI;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FeatureError;
use super::{FeatureColumns, FeatureVector};

const LIQUIDITY_SCALE: f64 = 1_000_000.0;
const MARKET_CAP_SCALE: f64 = 1_000_000.0;
const SOCIAL_SCALE: f64 = 10_000.0;

/// Accepts numbers, numeric strings (DexScreener quotes prices) and null.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Bool(b)) => Some(if b { 1.0 } else { 0.0 }),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CoinGeckoData {
    pub name: Option<String>,
    pub symbol: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price_usd: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub market_cap_rank: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub fdv: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub volume_24h: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub high_24h: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub low_24h: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price_change_24h: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub ath: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub atl: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DexScreenerData {
    pub name: Option<String>,
    pub symbol: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price_usd: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price_change_1h: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price_change_24h: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub volume_24h: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub liquidity_usd: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub fdv: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    pub pair_address: Option<String>,
    pub dex_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SocialData {
    #[serde(deserialize_with = "lenient_f64")]
    pub telegram_members: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub reddit_subscribers: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub twitter_followers: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub sentiment_score: Option<f64>,
}

/// A coin record as submitted through the analyzer form or API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CoinData {
    pub coingecko: Option<CoinGeckoData>,
    pub dexscreener: Option<DexScreenerData>,
    pub social: Option<SocialData>,
    /// Explicit values for model columns, applied last.
    pub features: BTreeMap<String, f64>,
}

impl CoinData {
    /// Sections that carry data, in submission order.
    pub fn sources(&self) -> Vec<&'static str> {
        let mut sources = Vec::new();
        if self.dexscreener.is_some() {
            sources.push("dexscreener");
        }
        if self.coingecko.is_some() {
            sources.push("coingecko");
        }
        if self.social.is_some() {
            sources.push("social");
        }
        if !self.features.is_empty() {
            sources.push("features");
        }
        sources
    }

    /// Derived features that have no model column are dropped; explicit
    /// `features` entries must name a model column.
    pub fn to_features(
        &self,
        columns: &FeatureColumns,
        now: NaiveDateTime,
    ) -> Result<FeatureVector, FeatureError> {
        let derived = self.derived_features(now);

        let mut dropped = 0usize;
        let known = derived.into_iter().filter(|(name, _)| {
            let keep = columns.position(name).is_some();
            if !keep {
                dropped += 1;
            }
            keep
        });

        let explicit = self.features.iter().map(|(k, v)| (k.as_str(), *v));
        let vector = FeatureVector::from_named(columns, known.chain(explicit))?;

        if dropped > 0 {
            debug!("Dropped {} derived features not present in the model", dropped);
        }
        Ok(vector)
    }

    fn derived_features(&self, now: NaiveDateTime) -> Vec<(&'static str, f64)> {
        let cg = self.coingecko.clone().unwrap_or_default();
        let dex = self.dexscreener.clone().unwrap_or_default();
        let social = self.social.clone().unwrap_or_default();
        let v = |x: Option<f64>| x.unwrap_or(0.0);

        let hour = now.hour() as f64;
        let dow = now.weekday().num_days_from_monday() as f64;

        vec![
            ("cg_price_usd", v(cg.price_usd)),
            ("cg_market_cap", v(cg.market_cap)),
            ("cg_market_cap_rank", v(cg.market_cap_rank)),
            ("cg_fdv", v(cg.fdv)),
            ("cg_total_volume_24h", v(cg.volume_24h)),
            ("cg_high_24h", v(cg.high_24h)),
            ("cg_low_24h", v(cg.low_24h)),
            ("cg_price_change_pct_24h", v(cg.price_change_24h)),
            ("cg_ath", v(cg.ath)),
            ("cg_atl", v(cg.atl)),
            ("pooled_sol_scaled", v(dex.liquidity_usd) / LIQUIDITY_SCALE),
            ("market_cap_scaled", v(dex.market_cap) / MARKET_CAP_SCALE),
            ("tg_subscribers_scaled", v(social.telegram_members) / SOCIAL_SCALE),
            ("reddit_subs_scaled", v(social.reddit_subscribers) / SOCIAL_SCALE),
            ("hour_of_day", hour),
            ("day_of_week", dow),
            ("hour_sin", (2.0 * PI * hour / 24.0).sin()),
            ("hour_cos", (2.0 * PI * hour / 24.0).cos()),
            ("dow_sin", (2.0 * PI * dow / 7.0).sin()),
            ("dow_cos", (2.0 * PI * dow / 7.0).cos()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn columns() -> FeatureColumns {
        FeatureColumns::new(
            [
                "cg_price_usd",
                "cg_market_cap_rank",
                "pooled_sol_scaled",
                "market_cap_scaled",
                "tg_subscribers_scaled",
                "hour_of_day",
                "day_of_week",
                "hour_sin",
                "dow_cos",
                "holders_scaled",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
        .unwrap()
    }

    fn wednesday_6am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_lenient_numbers() {
        let data: CoinData = serde_json::from_str(
            r#"{
                "coingecko": {"price_usd": "0.0042", "market_cap_rank": null, "name": "Bonk"},
                "dexscreener": {"liquidity_usd": 2500000, "market_cap": "not a number"},
                "social": {"telegram_members": 15000}
            }"#,
        )
        .unwrap();

        let cg = data.coingecko.as_ref().unwrap();
        assert_eq!(cg.price_usd, Some(0.0042));
        assert_eq!(cg.market_cap_rank, None);
        assert_eq!(data.dexscreener.as_ref().unwrap().market_cap, None);
        assert_eq!(data.sources(), vec!["dexscreener", "coingecko", "social"]);
    }

    #[test]
    fn test_feature_mapping() {
        let data: CoinData = serde_json::from_str(
            r#"{
                "coingecko": {"price_usd": 1.25, "market_cap_rank": 300},
                "dexscreener": {"liquidity_usd": 2500000, "market_cap": 7000000},
                "social": {"telegram_members": 15000}
            }"#,
        )
        .unwrap();

        let cols = columns();
        let vector = data.to_features(&cols, wednesday_6am()).unwrap();

        assert_eq!(vector.get(&cols, "cg_price_usd"), Some(1.25));
        assert_eq!(vector.get(&cols, "cg_market_cap_rank"), Some(300.0));
        assert_eq!(vector.get(&cols, "pooled_sol_scaled"), Some(2.5));
        assert_eq!(vector.get(&cols, "market_cap_scaled"), Some(7.0));
        assert_eq!(vector.get(&cols, "tg_subscribers_scaled"), Some(1.5));
        assert_eq!(vector.get(&cols, "hour_of_day"), Some(6.0));
        // 2025-01-01 is a Wednesday: Monday = 0
        assert_eq!(vector.get(&cols, "day_of_week"), Some(2.0));
        assert!((vector.get(&cols, "hour_sin").unwrap() - 1.0).abs() < 1e-12);
        let expected_dow_cos = (2.0 * PI * 2.0 / 7.0).cos();
        assert!((vector.get(&cols, "dow_cos").unwrap() - expected_dow_cos).abs() < 1e-12);
        assert_eq!(vector.get(&cols, "holders_scaled"), Some(0.0));
    }

    #[test]
    fn test_empty_submission_has_only_time_features() {
        let cols = columns();
        let vector = CoinData::default().to_features(&cols, wednesday_6am()).unwrap();
        assert_eq!(vector.get(&cols, "cg_price_usd"), Some(0.0));
        assert_eq!(vector.get(&cols, "hour_of_day"), Some(6.0));
        assert!(CoinData::default().sources().is_empty());
    }

    #[test]
    fn test_explicit_features_override_and_validate() {
        let cols = columns();
        let mut data = CoinData::default();
        data.features.insert("holders_scaled".into(), 0.8);
        data.features.insert("hour_of_day".into(), 23.0);

        let vector = data.to_features(&cols, wednesday_6am()).unwrap();
        assert_eq!(vector.get(&cols, "holders_scaled"), Some(0.8));
        assert_eq!(vector.get(&cols, "hour_of_day"), Some(23.0));

        data.features.insert("moon_factor".into(), 1.0);
        assert_eq!(
            data.to_features(&cols, wednesday_6am()).unwrap_err(),
            FeatureError::UnknownFeature("moon_factor".into())
        );
    }
}
