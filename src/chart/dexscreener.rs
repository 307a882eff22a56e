//! DexScreener API client for the live chart summary of an analysed coin

use std::time::{Duration, Instant};
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Chart as ChartConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(rename = "schemaVersion")]
    pub schema_version: Option<String>,
    pub pairs: Option<Vec<TokenPair>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    #[serde(rename = "chainId")]
    pub chain_id: Option<String>,
    #[serde(rename = "dexId")]
    pub dex_id: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "pairAddress")]
    pub pair_address: Option<String>,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    #[serde(rename = "priceChange")]
    pub price_change: Option<PriceChange>,
    pub volume: Option<Volume>,
    pub liquidity: Option<Liquidity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceChange {
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
}

/// Chart summary shown next to a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphData {
    pub fn no_pairs() -> Self {
        Self {
            available: false,
            message: Some("No chart data available".to_string()),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            available: false,
            message: Some("Chart lookups are disabled".to_string()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            available: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// Summarise the first pair of a token lookup.
    pub fn from_response(response: &DexScreenerResponse, chart_base: &str) -> Self {
        let Some(pair) = response.pairs.as_ref().and_then(|pairs| pairs.first()) else {
            return Self::no_pairs();
        };

        let pair_address = pair.pair_address.clone().unwrap_or_default();
        Self {
            available: true,
            chart_url: Some(format!("{}/{}", chart_base.trim_end_matches('/'), pair_address)),
            pair_address: Some(pair_address),
            dex: pair.dex_id.clone(),
            url: pair.url.clone(),
            price_usd: pair.price_usd.clone(),
            price_change_24h: pair.price_change.as_ref().and_then(|p| p.h24),
            volume_24h: pair.volume.as_ref().and_then(|v| v.h24),
            liquidity_usd: pair.liquidity.as_ref().and_then(|l| l.usd),
            message: None,
            error: None,
        }
    }
}

pub struct DexScreenerClient {
    client: Client,
    api_base: String,
    chart_base: String,
    cache_duration: Duration,
    cache: DashMap<String, (GraphData, Instant)>,
}

impl DexScreenerClient {
    pub fn new(config: &ChartConfig) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            chart_base: config.chart_base.clone(),
            cache_duration: Duration::from_secs(config.cache_secs),
            cache: DashMap::new(),
        })
    }

    /// Never fails: lookup errors are reported inside the returned summary.
    pub async fn get_graph_data(&self, contract_address: &str) -> GraphData {
        if let Some(cached) = self.get_cached(contract_address) {
            return cached;
        }

        if !is_token_address(contract_address) {
            warn!("Refusing DexScreener lookup for malformed address {:?}", contract_address);
            return GraphData::no_pairs();
        }

        match self.fetch_graph_data(contract_address).await {
            Ok(graph) => {
                self.store(contract_address, &graph);
                graph
            }
            Err(e) => {
                warn!("❌ DexScreener lookup failed for {}: {}", contract_address, e);
                GraphData::failed(e)
            }
        }
    }

    async fn fetch_graph_data(&self, contract_address: &str) -> anyhow::Result<GraphData> {
        let url = format!("{}/{}", self.api_base, contract_address);
        debug!("🌐 Fetching chart data from DexScreener: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            info!("⚠️ DexScreener answered {} for {}", response.status(), contract_address);
            return Ok(GraphData::no_pairs());
        }

        let data: DexScreenerResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse DexScreener response: {}", e))?;

        let graph = GraphData::from_response(&data, &self.chart_base);
        if graph.available {
            info!(
                "📊 DexScreener pair {} on {}",
                graph.pair_address.as_deref().unwrap_or("?"),
                graph.dex.as_deref().unwrap_or("?")
            );
        } else {
            info!("⚠️ DexScreener has no pairs for {}", contract_address);
        }
        Ok(graph)
    }

    /// Insert a fresh entry, evicting expired ones first.
    fn store(&self, contract_address: &str, graph: &GraphData) {
        if self.cache_duration.is_zero() {
            return;
        }
        let ttl = self.cache_duration;
        self.cache.retain(|_, (_, fetched_at)| fetched_at.elapsed() < ttl);
        self.cache
            .insert(contract_address.to_string(), (graph.clone(), Instant::now()));
    }

    fn get_cached(&self, contract_address: &str) -> Option<GraphData> {
        let entry = self.cache.get(contract_address)?;
        let (graph, fetched_at) = entry.value();
        if fetched_at.elapsed() < self.cache_duration {
            debug!("💾 Using cached DexScreener data for {}", contract_address);
            return Some(graph.clone());
        }
        None
    }
}

/// Token addresses are base58 (Solana) or hex (EVM): ASCII alphanumerics only.
fn is_token_address(address: &str) -> bool {
    !address.is_empty() && address.len() <= 64 && address.bytes().all(|b| b.is_ascii_alphanumeric())
}
