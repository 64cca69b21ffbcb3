mod common;

use common::{Harness, amount};
use rust_decimal_macros::dec;
use settlement_engine::error::ErrorKind;
use settlement_engine::infrastructure::exchange_rates::HttpRateProvider;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn harness(server: &MockServer) -> Harness {
    let provider = HttpRateProvider::new(
        format!("{}/v6/latest/", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();
    Harness::with_provider(Arc::new(provider))
}

#[tokio::test]
async fn test_multicurrency_transfer_uses_cached_http_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v6/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": "success",
            "base_code": "USD",
            "rates": { "USD": 1, "EUR": 0.92 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server);
    let alice = h.open("+1001", "Alice", "USD", dec!(100)).await;
    let bob = h.open("+1002", "Bob", "USD", dec!(0)).await;
    let carol = h.open("+1003", "Carol", "USD", dec!(0)).await;

    h.engine
        .multicurrency_transfer(alice, "+1002", amount(dec!(10)), "EUR")
        .await
        .unwrap();
    h.engine
        .multicurrency_transfer(alice, "+1003", amount(dec!(10)), "EUR")
        .await
        .unwrap();

    assert_eq!(h.balance(bob).await, dec!(9.2));
    assert_eq!(h.balance(carol).await, dec!(9.2));
    assert_eq!(h.currency(carol).await, "EUR");
    assert_eq!(h.balance(alice).await, dec!(79.9));
}

#[tokio::test]
async fn test_provider_outage_rejects_transfer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(&server);
    let alice = h.open("+1001", "Alice", "USD", dec!(100)).await;
    let bob = h.open("+1002", "Bob", "USD", dec!(0)).await;

    let err = h
        .engine
        .multicurrency_transfer(alice, "+1002", amount(dec!(10)), "EUR")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidUsage);
    assert_eq!(h.balance(alice).await, dec!(100));
    assert_eq!(h.balance(bob).await, dec!(0));
    assert_eq!(h.currency(bob).await, "USD");
}
