//! Ordered, independently testable fraud heuristics.
//!
//! Rules are evaluated in order and the first match flags the transfer. New
//! rules are appended with [`FraudScreen::with_rule`].

use crate::domain::account::Account;
use crate::domain::money::Amount;
use crate::domain::trust::TrustScore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct TransferContext<'a> {
    pub sender_account: &'a Account,
    pub sender_trust_score: TrustScore,
    pub amount: Amount,
    pub is_new_counterparty: bool,
}

pub trait FraudRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, ctx: &TransferContext<'_>) -> bool;
}

/// High-value transfer from a holder with a low trust score.
pub struct LowTrustHighValue {
    pub amount_above: Decimal,
    pub score_below: Decimal,
}

impl Default for LowTrustHighValue {
    fn default() -> Self {
        Self {
            amount_above: dec!(500),
            score_below: dec!(100),
        }
    }
}

impl FraudRule for LowTrustHighValue {
    fn name(&self) -> &'static str {
        "low_trust_high_value"
    }

    fn matches(&self, ctx: &TransferContext<'_>) -> bool {
        ctx.amount.value() > self.amount_above && ctx.sender_trust_score.value() < self.score_below
    }
}

/// High-value transfer to a counterparty the sender never saved.
pub struct NewCounterpartyHighValue {
    pub amount_above: Decimal,
}

impl Default for NewCounterpartyHighValue {
    fn default() -> Self {
        Self {
            amount_above: dec!(200),
        }
    }
}

impl FraudRule for NewCounterpartyHighValue {
    fn name(&self) -> &'static str {
        "new_counterparty_high_value"
    }

    fn matches(&self, ctx: &TransferContext<'_>) -> bool {
        ctx.amount.value() > self.amount_above && ctx.is_new_counterparty
    }
}

pub struct FraudScreen {
    rules: Vec<Box<dyn FraudRule>>,
}

impl Default for FraudScreen {
    fn default() -> Self {
        Self::empty()
            .with_rule(LowTrustHighValue::default())
            .with_rule(NewCounterpartyHighValue::default())
    }
}

impl FraudScreen {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: impl FraudRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Name of the first matching rule, if any.
    pub fn first_match(&self, ctx: &TransferContext<'_>) -> Option<&'static str> {
        self.rules.iter().find(|r| r.matches(ctx)).map(|r| r.name())
    }

    /// Whether the transfer is suspicious. Advisory only.
    pub fn evaluate(&self, ctx: &TransferContext<'_>) -> bool {
        self.first_match(ctx).is_some()
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}
