use crate::domain::account::Account;
use crate::domain::holder::Holder;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Output row: `phone,currency,balance,trust_score,status`.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AccountRow {
    pub phone: String,
    pub currency: String,
    pub balance: String,
    pub trust_score: String,
    pub status: &'static str,
}

impl AccountRow {
    pub fn new(holder: &Holder, account: &Account) -> Self {
        Self {
            phone: holder.phone.clone(),
            currency: account.currency.clone(),
            balance: account.balance.to_string(),
            trust_score: holder.trust_score.to_string(),
            status: account.status.as_str(),
        }
    }
}

pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, rows: impl IntoIterator<Item = AccountRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountStatus;
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_normalized_values() {
        let holder = Holder::new("+254700000001", "Wanjiru");
        let mut account = Account::open(holder.id, "KES");
        account.credit(Amount::new(dec!(74.8750)).unwrap()).unwrap();
        account.status = AccountStatus::Frozen;

        let mut out = Vec::new();
        AccountWriter::new(&mut out)
            .write_accounts(vec![AccountRow::new(&holder, &account)])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "phone,currency,balance,trust_score,status\n+254700000001,KES,74.875,50,frozen\n"
        );
    }

    #[test]
    fn test_empty_snapshot_writes_nothing() {
        let mut out = Vec::new();
        AccountWriter::new(&mut out).write_accounts(Vec::new()).unwrap();
        assert!(out.is_empty());
    }
}
