//! The settlement engine.
//!
//! Every public operation runs inside exactly one unit of work: balance
//! mutations, ledger entries and trust adjustments commit together or not at
//! all. Notifications and audit records are collected while the unit runs and
//! dispatched only after it has committed.

use super::currency::{CurrencyConverter, FALLBACK_RATE};
use super::effects::{EffectDispatcher, SideEffects};
use super::fees;
use super::fraud::{FraudScreen, TransferContext};
use super::trust::{
    REASON_FRAUD_BLOCKED, REASON_TRANSFER_RECEIVED, REASON_TRANSFER_SENT, TrustScoreTracker,
};
use crate::domain::account::{Account, AccountStatus, SavingsGoal, currency_code};
use crate::domain::audit::AuditEvent;
use crate::domain::holder::Holder;
use crate::domain::ids::{GoalId, HolderId, ProductId};
use crate::domain::insurance::InsurancePolicy;
use crate::domain::ledger::{CATEGORY_GOODS_AND_SERVICES, EntryType, LedgerEntry};
use crate::domain::money::Amount;
use crate::domain::notification::{Notice, NotificationKind};
use crate::domain::ports::{LedgerStoreRef, UnitOfWork};
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const FRAUD_PENALTY: Decimal = dec!(-25);
const SENT_REWARD: Decimal = dec!(1.5);
const RECEIVED_REWARD: Decimal = dec!(1.0);

const FLAGGED_MESSAGE: &str = "This transaction has been flagged for a security review.";

/// Result of running the transfer primitive inside an open unit.
enum Settled {
    Completed(LedgerEntry),
    /// The named fraud rule matched; only the trust penalty was staged.
    Flagged(&'static str),
}

pub struct SettlementEngine {
    store: LedgerStoreRef,
    fraud: FraudScreen,
    trust: TrustScoreTracker,
    converter: Arc<CurrencyConverter>,
    effects: EffectDispatcher,
}

impl SettlementEngine {
    pub fn new(
        store: LedgerStoreRef,
        converter: Arc<CurrencyConverter>,
        effects: EffectDispatcher,
    ) -> Self {
        Self {
            trust: TrustScoreTracker::new(store.clone()),
            store,
            fraud: FraudScreen::default(),
            converter,
            effects,
        }
    }

    /// Replaces the default rule set.
    pub fn with_fraud_screen(mut self, fraud: FraudScreen) -> Self {
        self.fraud = fraud;
        self
    }

    pub fn store(&self) -> &LedgerStoreRef {
        &self.store
    }

    pub fn trust(&self) -> &TrustScoreTracker {
        &self.trust
    }

    /// Single-currency peer transfer.
    ///
    /// A fraud-flagged transfer commits the sender's trust penalty and then
    /// fails with `InvalidUsage`; no balance changes.
    pub async fn transfer(
        &self,
        sender_id: HolderId,
        receiver_phone: &str,
        amount: Amount,
    ) -> Result<LedgerEntry> {
        let (sender, receiver) = self.parties(sender_id, receiver_phone).await?;
        self.execute_transfer(&sender, &receiver, amount, EntryType::Transfer)
            .await
    }

    /// Pays a merchant from a customer's wallet, recorded as a merchant payment.
    pub async fn process_merchant_payment(
        &self,
        api_key: &str,
        customer_phone: &str,
        amount: Amount,
    ) -> Result<LedgerEntry> {
        let merchant = self
            .store
            .merchant_by_api_key(api_key)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| SettlementError::not_found("Invalid or inactive merchant API key."))?;
        let customer = self
            .store
            .holder_by_phone(customer_phone)
            .await?
            .ok_or_else(|| {
                SettlementError::not_found("Customer with this phone number not found.")
            })?;
        let merchant_holder = self
            .store
            .holder(merchant.holder)
            .await?
            .ok_or_else(|| SettlementError::not_found("Merchant holder not found."))?;
        if customer.id == merchant_holder.id {
            return Err(SettlementError::invalid("Cannot send money to yourself."));
        }

        self.execute_transfer(&customer, &merchant_holder, amount, EntryType::MerchantPayment)
            .await
    }

    /// Cross-currency transfer at the current exchange rate.
    ///
    /// The rate is resolved before any lock is taken. The receiver's wallet is
    /// redenominated to `target_currency`.
    pub async fn multicurrency_transfer(
        &self,
        sender_id: HolderId,
        receiver_phone: &str,
        send_amount: Amount,
        target_currency: &str,
    ) -> Result<LedgerEntry> {
        let (sender, receiver) = self.parties(sender_id, receiver_phone).await?;
        let target = currency_code(target_currency)?;

        let (Some(sender_account), Some(_)) = (
            self.store.account(sender.id).await?,
            self.store.account(receiver.id).await?,
        ) else {
            return Err(SettlementError::not_found(
                "Sender or receiver does not have a wallet.",
            ));
        };
        let base = sender_account.currency;
        if base == target {
            return Err(SettlementError::invalid(
                "For same-currency transfers, use the standard /transfer endpoint.",
            ));
        }

        let rate = self.converter.rate(&base, &target).await;
        if rate == FALLBACK_RATE {
            return Err(SettlementError::invalid(
                "Could not retrieve a valid exchange rate for the requested currencies.",
            ));
        }
        let received = send_amount.checked_times(rate)?;
        let fee = fees::fee(send_amount);
        let total = send_amount.checked_plus(fee)?;

        let mut unit = self.store.begin(&[sender.id, receiver.id]).await?;
        let locked = unit
            .account(sender.id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Sender does not have a wallet."))?;
        if locked.currency != base {
            return Err(SettlementError::invalid(
                "Sender wallet currency changed during the transfer; please retry.",
            ));
        }

        unit.debit(sender.id, total).await?;
        unit.credit(receiver.id, received).await?;
        unit.redenominate(receiver.id, &target).await?;
        let entry = unit
            .append_entry(
                LedgerEntry::completed(
                    EntryType::MulticurrencyTransfer,
                    sender.id,
                    receiver.id,
                    send_amount,
                    base.clone(),
                )
                .with_fee(fee),
            )
            .await?;
        unit.commit().await?;

        info!(
            entry = %entry.id,
            sender = %sender.id,
            receiver = %receiver.id,
            %send_amount,
            %received,
            %rate,
            "multicurrency transfer settled"
        );
        let mut effects = SideEffects::new();
        effects
            .notify(
                Notice::new(
                    receiver.id,
                    format!(
                        "You have received {received} {target} from {}.",
                        sender.first_name
                    ),
                    NotificationKind::TransferReceived,
                )
                .with_sms(),
            )
            .audit(AuditEvent::new(
                "multicurrency_transfer",
                Some(sender.id),
                json!({
                    "entry": entry.id.to_string(),
                    "receiver": receiver.id.to_string(),
                    "send_amount": send_amount.value().to_string(),
                    "received_amount": received.value().to_string(),
                    "base": base,
                    "target": target,
                    "rate": rate.to_string(),
                }),
            ));
        self.effects.dispatch(effects).await;
        Ok(entry)
    }

    pub async fn deposit_to_wallet(&self, holder: HolderId, amount: Amount) -> Result<Account> {
        let mut unit = self.store.begin(&[holder]).await?;
        let account = unit.credit(holder, amount).await?;
        let entry = unit
            .append_entry(LedgerEntry::internal(
                EntryType::Deposit,
                holder,
                amount,
                account.currency.clone(),
            ))
            .await?;
        unit.commit().await?;

        info!(%holder, %amount, "deposit settled");
        self.audit_only("deposit", holder, &entry).await;
        Ok(account)
    }

    pub async fn withdraw_from_wallet(&self, holder: HolderId, amount: Amount) -> Result<Account> {
        let mut unit = self.store.begin(&[holder]).await?;
        let current = wallet(unit.as_mut(), holder).await?;
        if !current.balance.covers(amount) {
            return Err(SettlementError::invalid("Insufficient funds for withdrawal."));
        }
        let account = unit.debit(holder, amount).await?;
        let entry = unit
            .append_entry(LedgerEntry::internal(
                EntryType::Withdrawal,
                holder,
                amount,
                account.currency.clone(),
            ))
            .await?;
        unit.commit().await?;

        info!(%holder, %amount, "withdrawal settled");
        self.audit_only("withdrawal", holder, &entry).await;
        Ok(account)
    }

    /// Moves money from the main wallet into one of the holder's goals.
    pub async fn contribute_to_savings_goal(
        &self,
        holder: HolderId,
        goal_id: GoalId,
        amount: Amount,
    ) -> Result<SavingsGoal> {
        let mut unit = self.store.begin(&[holder]).await?;
        let mut goal = unit
            .goal(goal_id)
            .await?
            .filter(|g| g.holder == holder)
            .ok_or_else(|| {
                SettlementError::not_found("Savings goal not found or does not belong to user.")
            })?;
        let current = wallet(unit.as_mut(), holder).await?;
        if !current.balance.covers(amount) {
            return Err(SettlementError::invalid("Insufficient funds in main wallet."));
        }

        unit.debit(holder, amount).await?;
        goal.contribute(amount)?;
        unit.put_goal(goal.clone()).await?;
        let entry = unit
            .append_entry(LedgerEntry::internal(
                EntryType::SavingsDeposit,
                holder,
                amount,
                current.currency,
            ))
            .await?;
        unit.commit().await?;

        info!(%holder, goal = %goal.id, %amount, reached = goal.is_reached(), "savings contribution settled");
        self.audit_only("savings_contribution", holder, &entry).await;
        Ok(goal)
    }

    /// Debits the product premium and opens a one-year policy.
    pub async fn purchase_insurance(
        &self,
        holder: HolderId,
        product_id: ProductId,
    ) -> Result<InsurancePolicy> {
        let product = self
            .store
            .insurance_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                SettlementError::not_found("Insurance product not found or is not active.")
            })?;

        let mut unit = self.store.begin(&[holder]).await?;
        let current = wallet(unit.as_mut(), holder).await?;
        let premium = product.premium_amount;
        if !current.balance.covers(premium) {
            return Err(SettlementError::invalid(
                "Insufficient funds to purchase insurance.",
            ));
        }

        unit.debit(holder, premium).await?;
        let entry = unit
            .append_entry(LedgerEntry::internal(
                EntryType::InsurancePurchase,
                holder,
                premium,
                current.currency,
            ))
            .await?;
        let policy = InsurancePolicy::start(holder, product.id);
        unit.insert_policy(policy.clone()).await?;
        unit.commit().await?;

        info!(%holder, product = %product.id, policy = %policy.id, "insurance purchased");
        self.audit_only("insurance_purchase", holder, &entry).await;
        Ok(policy)
    }

    pub async fn freeze_account(&self, holder: HolderId) -> Result<Account> {
        self.set_status(holder, AccountStatus::Frozen, "account_frozen")
            .await
    }

    pub async fn unfreeze_account(&self, holder: HolderId) -> Result<Account> {
        self.set_status(holder, AccountStatus::Active, "account_unfrozen")
            .await
    }

    async fn set_status(
        &self,
        holder: HolderId,
        status: AccountStatus,
        action: &str,
    ) -> Result<Account> {
        let mut unit = self.store.begin(&[holder]).await?;
        let account = unit.set_account_status(holder, status).await?;
        unit.commit().await?;

        info!(%holder, status = status.as_str(), "account status changed");
        let mut effects = SideEffects::new();
        effects.audit(AuditEvent::new(action, Some(holder), json!({})));
        self.effects.dispatch(effects).await;
        Ok(account)
    }

    /// Resolves sender by id and receiver by phone.
    async fn parties(&self, sender_id: HolderId, receiver_phone: &str) -> Result<(Holder, Holder)> {
        let sender = self.store.holder(sender_id).await?;
        let receiver = self.store.holder_by_phone(receiver_phone).await?;
        let (Some(sender), Some(receiver)) = (sender, receiver) else {
            return Err(SettlementError::not_found("Sender or receiver not found."));
        };
        if sender.id == receiver.id {
            return Err(SettlementError::invalid("Cannot send money to yourself."));
        }
        Ok((sender, receiver))
    }

    /// Runs the transfer primitive in its own unit and records it as `as_type`.
    async fn execute_transfer(
        &self,
        sender: &Holder,
        receiver: &Holder,
        amount: Amount,
        as_type: EntryType,
    ) -> Result<LedgerEntry> {
        let is_new_counterparty = !self.store.is_beneficiary(sender.id, receiver.id).await?;

        let mut effects = SideEffects::new();
        let mut unit = self.store.begin(&[sender.id, receiver.id]).await?;
        let settled = self
            .settle(
                unit.as_mut(),
                sender,
                receiver.id,
                amount,
                is_new_counterparty,
                &mut effects,
            )
            .await?;

        match settled {
            Settled::Flagged(rule) => {
                unit.commit().await?;
                warn!(sender = %sender.id, receiver = %receiver.id, %amount, rule, "transfer flagged for security review");
                effects.audit(AuditEvent::new(
                    "fraud_blocked",
                    Some(sender.id),
                    json!({
                        "rule": rule,
                        "receiver": receiver.id.to_string(),
                        "amount": amount.value().to_string(),
                    }),
                ));
                self.effects.dispatch(effects).await;
                Err(SettlementError::invalid(FLAGGED_MESSAGE))
            }
            Settled::Completed(mut entry) => {
                if as_type != EntryType::Transfer {
                    let category = match as_type {
                        EntryType::MerchantPayment => CATEGORY_GOODS_AND_SERVICES,
                        other => other.default_category(),
                    };
                    entry = unit.reclassify_entry(entry.id, as_type, category).await?;
                }
                unit.commit().await?;

                info!(
                    entry = %entry.id,
                    sender = %sender.id,
                    receiver = %receiver.id,
                    %amount,
                    fee = %entry.fee,
                    kind = ?entry.r#type,
                    "transfer settled"
                );
                let action = match as_type {
                    EntryType::MerchantPayment => "merchant_payment",
                    _ => "transfer",
                };
                effects.audit(AuditEvent::new(
                    action,
                    Some(sender.id),
                    json!({
                        "entry": entry.id.to_string(),
                        "receiver": receiver.id.to_string(),
                        "amount": amount.value().to_string(),
                        "fee": entry.fee.to_string(),
                    }),
                ));
                self.effects.dispatch(effects).await;
                Ok(entry)
            }
        }
    }

    /// Fraud screen, fee, balance movement, entry and trust rewards.
    ///
    /// Stages everything in `unit`; the caller decides whether to commit.
    async fn settle(
        &self,
        unit: &mut dyn UnitOfWork,
        sender: &Holder,
        receiver: HolderId,
        amount: Amount,
        is_new_counterparty: bool,
        effects: &mut SideEffects,
    ) -> Result<Settled> {
        let sender_account = unit.account(sender.id).await?;
        let receiver_account = unit.account(receiver).await?;
        let (Some(sender_account), Some(_)) = (sender_account, receiver_account) else {
            return Err(SettlementError::not_found(
                "One of the users does not have a wallet.",
            ));
        };
        let sender_trust_score = unit
            .holder(sender.id)
            .await?
            .map(|h| h.trust_score)
            .unwrap_or(sender.trust_score);

        let ctx = TransferContext {
            sender_account: &sender_account,
            sender_trust_score,
            amount,
            is_new_counterparty,
        };
        if let Some(rule) = self.fraud.first_match(&ctx) {
            self.trust
                .adjust(unit, sender.id, REASON_FRAUD_BLOCKED, FRAUD_PENALTY)
                .await?;
            return Ok(Settled::Flagged(rule));
        }

        let fee = fees::fee(amount);
        let total = amount.checked_plus(fee)?;
        unit.debit(sender.id, total).await?;
        unit.credit(receiver, amount).await?;
        let entry = unit
            .append_entry(
                LedgerEntry::completed(
                    EntryType::Transfer,
                    sender.id,
                    receiver,
                    amount,
                    sender_account.currency.clone(),
                )
                .with_fee(fee),
            )
            .await?;

        self.trust
            .adjust(unit, sender.id, REASON_TRANSFER_SENT, SENT_REWARD)
            .await?;
        self.trust
            .adjust(unit, receiver, REASON_TRANSFER_RECEIVED, RECEIVED_REWARD)
            .await?;

        effects.notify(
            Notice::new(
                receiver,
                format!(
                    "You have received {amount} {} from {}.",
                    sender_account.currency, sender.first_name
                ),
                NotificationKind::TransferReceived,
            )
            .with_sms(),
        );
        Ok(Settled::Completed(entry))
    }

    async fn audit_only(&self, action: &str, holder: HolderId, entry: &LedgerEntry) {
        let mut effects = SideEffects::new();
        effects.audit(AuditEvent::new(
            action,
            Some(holder),
            json!({
                "entry": entry.id.to_string(),
                "amount": entry.amount.value().to_string(),
                "currency": entry.currency,
            }),
        ));
        self.effects.dispatch(effects).await;
    }
}

async fn wallet(unit: &mut dyn UnitOfWork, holder: HolderId) -> Result<Account> {
    unit.account(holder)
        .await?
        .ok_or_else(|| SettlementError::not_found("User or wallet not found."))
}
