use super::account_writer::AccountRow;
use super::command_reader::{Command, CommandType};
use crate::application::registry::Registry;
use crate::application::settlement::SettlementEngine;
use crate::domain::account::DEFAULT_CURRENCY;
use crate::domain::holder::Holder;
use crate::domain::money::Amount;
use crate::domain::ports::LedgerStoreRef;
use crate::error::{Result, SettlementError};

/// Applies CLI commands to the settlement engine, addressing holders by phone.
pub struct CommandRunner {
    store: LedgerStoreRef,
    engine: SettlementEngine,
    registry: Registry,
}

impl CommandRunner {
    pub fn new(store: LedgerStoreRef, engine: SettlementEngine, registry: Registry) -> Self {
        Self {
            store,
            engine,
            registry,
        }
    }

    pub async fn run(&self, command: &Command) -> Result<()> {
        match command.r#type {
            CommandType::Open => {
                let first_name = command.party.as_deref().unwrap_or_default();
                let currency = command.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
                self.registry
                    .register_holder(&command.phone, first_name, currency)
                    .await?;
            }
            CommandType::Deposit => {
                let holder = self.holder(&command.phone).await?;
                self.engine
                    .deposit_to_wallet(holder.id, Amount::new(command.amount()?)?)
                    .await?;
            }
            CommandType::Withdrawal => {
                let holder = self.holder(&command.phone).await?;
                self.engine
                    .withdraw_from_wallet(holder.id, Amount::new(command.amount()?)?)
                    .await?;
            }
            CommandType::Transfer => {
                let sender = self.holder(&command.phone).await?;
                self.engine
                    .transfer(sender.id, command.party()?, Amount::new(command.amount()?)?)
                    .await?;
            }
            CommandType::FxTransfer => {
                let sender = self.holder(&command.phone).await?;
                let target = command
                    .currency
                    .as_deref()
                    .ok_or_else(|| SettlementError::invalid("FxTransfer requires a currency."))?;
                self.engine
                    .multicurrency_transfer(
                        sender.id,
                        command.party()?,
                        Amount::new(command.amount()?)?,
                        target,
                    )
                    .await?;
            }
            CommandType::Beneficiary => {
                let owner = self.holder(&command.phone).await?;
                let party = command.party()?;
                self.registry.add_beneficiary(owner.id, party, party).await?;
            }
        }
        Ok(())
    }

    /// Snapshot of every wallet, ordered by phone.
    pub async fn account_rows(&self) -> Result<Vec<AccountRow>> {
        let mut rows = Vec::new();
        for account in self.store.accounts().await? {
            let holder = self.store.holder(account.holder).await?.ok_or_else(|| {
                SettlementError::internal(format!("account without holder {}", account.holder))
            })?;
            rows.push(AccountRow::new(&holder, &account));
        }
        rows.sort_by(|a, b| a.phone.cmp(&b.phone));
        Ok(rows)
    }

    async fn holder(&self, phone: &str) -> Result<Holder> {
        self.store
            .holder_by_phone(phone)
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("No holder with phone {phone}.")))
    }
}
