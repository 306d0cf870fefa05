//! Live BTC/ETH spot prices with caching and fallbacks
//!
//! The engine and the API never want a failed conversion, so the oracle
//! trait is infallible: implementations absorb upstream trouble and fall
//! back. Lookup order for the CoinGecko client is fresh cache, live
//! fetch, stale cache, configured fallback constants.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::errors::OracleError;
use crate::game::types::Currency;

/// USD spot prices for the supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Prices {
    pub btc_usd: f64,
    pub eth_usd: f64,
}

impl Prices {
    pub fn usd_price(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Btc => self.btc_usd,
            Currency::Eth => self.eth_usd,
        }
    }
}

/// Source of spot prices for stake conversion and payout display.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn prices(&self) -> Prices;
}

#[derive(Debug, Clone, Copy)]
struct CachedPrices {
    prices: Prices,
    fetched_at: Instant,
}

/// CoinGecko-backed price source with a TTL cache.
pub struct CoinGeckoOracle {
    client: reqwest::Client,
    endpoint: String,
    cache_ttl: Duration,
    fallback: Prices,
    cache: RwLock<Option<CachedPrices>>,
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: CoinPrice,
    ethereum: CoinPrice,
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    usd: f64,
}

impl CoinGeckoOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            cache_ttl: config.cache_ttl(),
            fallback: Prices {
                btc_usd: config.fallback_btc_usd,
                eth_usd: config.fallback_eth_usd,
            },
            cache: RwLock::new(None),
        })
    }

    async fn fetch(&self) -> Result<Prices, OracleError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?;
        let body: SimplePriceResponse = response.json().await?;

        let prices = Prices {
            btc_usd: body.bitcoin.usd,
            eth_usd: body.ethereum.usd,
        };
        if prices.btc_usd <= 0.0 || prices.eth_usd <= 0.0 {
            return Err(OracleError::MalformedResponse(format!(
                "non-positive price: BTC {} ETH {}",
                prices.btc_usd, prices.eth_usd
            )));
        }
        Ok(prices)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoOracle {
    async fn prices(&self) -> Prices {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                return cached.prices;
            }
        }

        match self.fetch().await {
            Ok(prices) => {
                debug!(btc = prices.btc_usd, eth = prices.eth_usd, "Fetched fresh prices");
                *self.cache.write().await = Some(CachedPrices {
                    prices,
                    fetched_at: Instant::now(),
                });
                prices
            }
            Err(e) => {
                // A stale quote beats a made-up one.
                let stale = self.cache.read().await.as_ref().map(|cached| cached.prices);
                match stale {
                    Some(prices) => {
                        warn!("Price fetch failed, serving stale cache: {}", e);
                        prices
                    }
                    None => {
                        warn!("Price fetch failed, serving fallback prices: {}", e);
                        self.fallback
                    }
                }
            }
        }
    }
}

/// Fixed prices for tests and offline runs.
pub struct StaticPrices(pub Prices);

#[async_trait]
impl PriceSource for StaticPrices {
    async fn prices(&self) -> Prices {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_oracle(cache_ttl_ms: u64) -> CoinGeckoOracle {
        let config = OracleConfig {
            // Port 9 (discard) is closed on loopback; connects fail fast.
            endpoint: "http://127.0.0.1:9/simple/price".to_string(),
            timeout_ms: 250,
            cache_ttl_ms,
            fallback_btc_usd: 95_000.0,
            fallback_eth_usd: 3_400.0,
        };
        CoinGeckoOracle::new(&config).unwrap()
    }

    #[test]
    fn test_usd_price_per_currency() {
        let prices = Prices {
            btc_usd: 95_000.0,
            eth_usd: 3_400.0,
        };
        assert_eq!(prices.usd_price(Currency::Btc), 95_000.0);
        assert_eq!(prices.usd_price(Currency::Eth), 3_400.0);
    }

    #[tokio::test]
    async fn test_fallback_when_unreachable_and_cold() {
        let oracle = unreachable_oracle(10_000);
        let prices = oracle.prices().await;
        assert_eq!(prices.btc_usd, 95_000.0);
        assert_eq!(prices.eth_usd, 3_400.0);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let oracle = unreachable_oracle(3_600_000);
        let cached = Prices {
            btc_usd: 101_000.0,
            eth_usd: 3_500.0,
        };
        *oracle.cache.write().await = Some(CachedPrices {
            prices: cached,
            fetched_at: Instant::now(),
        });

        // The endpoint is unreachable, so getting the cached quote back
        // proves no fetch was attempted.
        assert_eq!(oracle.prices().await, cached);
    }

    #[tokio::test]
    async fn test_stale_cache_preferred_over_fallback() {
        // Zero TTL makes every cached quote stale immediately.
        let oracle = unreachable_oracle(0);
        let stale = Prices {
            btc_usd: 99_000.0,
            eth_usd: 3_450.0,
        };
        *oracle.cache.write().await = Some(CachedPrices {
            prices: stale,
            fetched_at: Instant::now(),
        });

        assert_eq!(oracle.prices().await, stale);
    }

    #[tokio::test]
    async fn test_static_prices() {
        let source = StaticPrices(Prices {
            btc_usd: 50_000.0,
            eth_usd: 2_000.0,
        });
        assert_eq!(source.prices().await.usd_price(Currency::Btc), 50_000.0);
    }
}
