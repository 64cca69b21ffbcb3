use crate::domain::ports::ExchangeRateProvider;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(3600);

/// Returned, and cached, whenever the provider cannot produce a rate.
pub const FALLBACK_RATE: Decimal = Decimal::ONE;

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    fetched_at: Instant,
}

/// Exchange-rate lookup behind a process-wide, time-invalidated cache.
///
/// The cache is shared read/write-locked state keyed by `(base, target)`.
/// Provider failures never propagate: they are logged and replaced by
/// [`FALLBACK_RATE`], which is cached like a real rate, so a caller cannot tell
/// a failed lookup from genuine 1:1 parity.
pub struct CurrencyConverter {
    provider: Arc<dyn ExchangeRateProvider>,
    ttl: Duration,
    cache: RwLock<HashMap<(String, String), CachedRate>>,
}

impl CurrencyConverter {
    pub fn new(provider: Arc<dyn ExchangeRateProvider>) -> Self {
        Self::with_ttl(provider, DEFAULT_RATE_TTL)
    }

    pub fn with_ttl(provider: Arc<dyn ExchangeRateProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn rate(&self, base: &str, target: &str) -> Decimal {
        let key = (base.to_string(), target.to_string());
        if let Some(cached) = self.cache.read().await.get(&key)
            && cached.fetched_at.elapsed() < self.ttl
        {
            debug!(base, target, rate = %cached.rate, "exchange rate cache hit");
            return cached.rate;
        }

        let rate = match self.provider.fetch(base).await {
            Ok(rates) => match rates.get(target) {
                Some(rate) if *rate > Decimal::ZERO => *rate,
                Some(rate) => {
                    warn!(base, target, %rate, "Could not fetch exchange rate: non-positive rate");
                    FALLBACK_RATE
                }
                None => {
                    warn!(
                        base,
                        target, "Could not fetch exchange rate: target currency not in response"
                    );
                    FALLBACK_RATE
                }
            },
            Err(e) => {
                warn!(base, target, error = %e, "Could not fetch exchange rate");
                FALLBACK_RATE
            }
        };

        self.cache.write().await.insert(
            key,
            CachedRate {
                rate,
                fetched_at: Instant::now(),
            },
        );
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RateProviderError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        rates: Option<HashMap<String, Decimal>>,
    }

    impl CountingProvider {
        fn with_rates(pairs: &[(&str, Decimal)]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                rates: Some(pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                rates: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExchangeRateProvider for CountingProvider {
        async fn fetch(
            &self,
            _base: &str,
        ) -> Result<HashMap<String, Decimal>, RateProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates
                .clone()
                .ok_or_else(|| RateProviderError::Api("service down".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_within_ttl_calls_provider_once() {
        let provider = CountingProvider::with_rates(&[("EUR", dec!(0.92))]);
        let converter = CurrencyConverter::new(provider.clone());

        assert_eq!(converter.rate("USD", "EUR").await, dec!(0.92));
        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(converter.rate("USD", "EUR").await, dec!(0.92));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_ttl() {
        let provider = CountingProvider::with_rates(&[("EUR", dec!(0.92))]);
        let converter = CurrencyConverter::new(provider.clone());

        converter.rate("USD", "EUR").await;
        tokio::time::advance(Duration::from_secs(3600)).await;
        converter.rate("USD", "EUR").await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_falls_back_and_is_cached() {
        let provider = CountingProvider::failing();
        let converter = CurrencyConverter::new(provider.clone());

        assert_eq!(converter.rate("USD", "EUR").await, FALLBACK_RATE);
        assert_eq!(converter.rate("USD", "EUR").await, FALLBACK_RATE);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_target_currency_falls_back() {
        let provider = CountingProvider::with_rates(&[("EUR", dec!(0.92))]);
        let converter = CurrencyConverter::new(provider.clone());

        assert_eq!(converter.rate("USD", "KES").await, dec!(1.0));
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_pair() {
        let provider = CountingProvider::with_rates(&[("EUR", dec!(0.92)), ("GBP", dec!(0.79))]);
        let converter = CurrencyConverter::new(provider.clone());

        assert_eq!(converter.rate("USD", "EUR").await, dec!(0.92));
        assert_eq!(converter.rate("USD", "GBP").await, dec!(0.79));
        assert_eq!(provider.calls(), 2);
    }
}
