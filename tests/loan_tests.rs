mod common;

use chrono::NaiveDate;
use common::{Harness, amount};
use rust_decimal_macros::dec;
use settlement_engine::domain::loan::LoanStatus;
use settlement_engine::domain::notification::NotificationKind;
use settlement_engine::domain::ports::LedgerStore;
use settlement_engine::error::ErrorKind;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

#[tokio::test]
async fn test_overdue_loan_is_defaulted_once() {
    let h = Harness::new();
    let lender = h.open("+1001", "Lena", "USD", dec!(500)).await;
    let borrower = h.open("+1002", "Bo", "USD", dec!(0)).await;

    let loan = h
        .registry
        .request_loan(borrower, "+1001", amount(dec!(100)), Some(dec!(5)), day(10))
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Requested);
    let inbox = h.notifier.notifications_for(lender).await.unwrap();
    assert_eq!(inbox[0].kind, NotificationKind::LoanRequest);

    // not active yet, nothing to sweep
    let report = h.sweeper.sweep_overdue(day(20)).await.unwrap();
    assert!(report.defaulted.is_empty());

    h.registry.activate_loan(lender, loan.id).await.unwrap();
    assert_eq!(h.balance(borrower).await, dec!(100));
    assert_eq!(h.balance(lender).await, dec!(400));

    // due date itself is not overdue
    let report = h.sweeper.sweep_overdue(day(10)).await.unwrap();
    assert!(report.defaulted.is_empty());

    let report = h.sweeper.sweep_overdue(day(11)).await.unwrap();
    assert_eq!(report.defaulted, vec![loan.id]);
    assert!(report.failed.is_empty());
    assert_eq!(
        h.ledger.loan(loan.id).await.unwrap().unwrap().status,
        LoanStatus::Defaulted
    );
    assert_eq!(h.score(borrower).await, dec!(0));
    assert_eq!(h.score(lender).await, dec!(45));
    assert!(
        h.notifier
            .notifications_for(borrower)
            .await
            .unwrap()
            .iter()
            .any(|n| n.kind == NotificationKind::LoanDefaulted)
    );
    assert!(h.audit.actions().await.contains(&"loan_defaulted".to_string()));

    let report = h.sweeper.sweep_overdue(day(12)).await.unwrap();
    assert!(report.defaulted.is_empty());

    // defaulted loans cannot be repaid
    let err = h.registry.repay_loan(borrower, loan.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUsage);
    assert_eq!(h.balance(borrower).await, dec!(100));
}
