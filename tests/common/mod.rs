#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use settlement_engine::application::currency::CurrencyConverter;
use settlement_engine::application::effects::EffectDispatcher;
use settlement_engine::application::registry::Registry;
use settlement_engine::application::settlement::SettlementEngine;
use settlement_engine::application::sweeper::LoanSweeper;
use settlement_engine::domain::ids::HolderId;
use settlement_engine::domain::money::Amount;
use settlement_engine::domain::ports::{ExchangeRateProvider, LedgerStore, LedgerStoreRef};
use settlement_engine::error::RateProviderError;
use settlement_engine::infrastructure::audit::InMemoryAuditSink;
use settlement_engine::infrastructure::in_memory::InMemoryLedger;
use settlement_engine::infrastructure::notifications::{InAppNotifier, LogSmsGateway};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed rates keyed by base currency. Unknown bases fail like a dead API.
#[derive(Default)]
pub struct StaticRates {
    rates: HashMap<String, HashMap<String, Decimal>>,
    calls: AtomicUsize,
}

impl StaticRates {
    pub fn with(mut self, base: &str, target: &str, rate: Decimal) -> Self {
        self.rates
            .entry(base.to_string())
            .or_default()
            .insert(target.to_string(), rate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeRateProvider for StaticRates {
    async fn fetch(&self, base: &str) -> Result<HashMap<String, Decimal>, RateProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rates
            .get(base)
            .cloned()
            .ok_or_else(|| RateProviderError::Api("unsupported-code".to_string()))
    }
}

pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub engine: Arc<SettlementEngine>,
    pub registry: Registry,
    pub sweeper: LoanSweeper,
    pub notifier: Arc<InAppNotifier>,
    pub audit: Arc<InMemoryAuditSink>,
    pub rates: Arc<StaticRates>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_rates(StaticRates::default())
    }

    pub fn with_rates(rates: StaticRates) -> Self {
        let rates = Arc::new(rates);
        Self::build(rates.clone(), rates)
    }

    /// Wires the engine to a real provider; `rates` stays unused.
    pub fn with_provider(provider: Arc<dyn ExchangeRateProvider>) -> Self {
        Self::build(Arc::new(StaticRates::default()), provider)
    }

    fn build(rates: Arc<StaticRates>, provider: Arc<dyn ExchangeRateProvider>) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let store: LedgerStoreRef = ledger.clone();
        let notifier = Arc::new(InAppNotifier::new(
            store.clone(),
            Arc::new(LogSmsGateway::new(None)),
        ));
        let audit = Arc::new(InMemoryAuditSink::new());
        let effects = EffectDispatcher::new(notifier.clone(), audit.clone());
        let converter = Arc::new(CurrencyConverter::new(provider));

        Self {
            engine: Arc::new(SettlementEngine::new(
                store.clone(),
                converter,
                effects.clone(),
            )),
            registry: Registry::new(store.clone(), effects.clone()),
            sweeper: LoanSweeper::new(store, effects),
            ledger,
            notifier,
            audit,
            rates,
        }
    }

    /// Registers a holder and funds its wallet.
    pub async fn open(&self, phone: &str, name: &str, currency: &str, balance: Decimal) -> HolderId {
        let holder = self
            .registry
            .register_holder(phone, name, currency)
            .await
            .unwrap();
        if balance > Decimal::ZERO {
            self.engine
                .deposit_to_wallet(holder.id, amount(balance))
                .await
                .unwrap();
        }
        holder.id
    }

    pub async fn balance(&self, holder: HolderId) -> Decimal {
        self.ledger
            .account(holder)
            .await
            .unwrap()
            .unwrap()
            .balance
            .value()
    }

    pub async fn currency(&self, holder: HolderId) -> String {
        self.ledger.account(holder).await.unwrap().unwrap().currency
    }

    pub async fn score(&self, holder: HolderId) -> Decimal {
        self.ledger
            .holder(holder)
            .await
            .unwrap()
            .unwrap()
            .trust_score
            .value()
    }
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}
