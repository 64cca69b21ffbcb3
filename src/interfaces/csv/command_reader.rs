use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// Registers `phone` with first name `party` and a wallet in `currency`.
    Open,
    Deposit,
    Withdrawal,
    /// `phone` sends `amount` to the holder whose phone is `party`.
    Transfer,
    /// Like `Transfer`, converted into `currency`.
    FxTransfer,
    /// `phone` saves `party` as a beneficiary.
    Beneficiary,
}

/// One row of the command file: `type, phone, party, amount, currency`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub r#type: CommandType,
    pub phone: String,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Command {
    pub fn party(&self) -> Result<&str> {
        self.party
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SettlementError::invalid(format!("{:?} requires a party.", self.r#type)))
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.amount
            .ok_or_else(|| SettlementError::invalid(format!("{:?} requires an amount.", self.r#type)))
    }
}

/// Reads commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths, so
/// trailing optional columns may be omitted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands, one `Result` per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(SettlementError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "type, phone, party, amount, currency\n\
                    open, 100, Ada, , eur\n\
                    deposit, 100, , 10.5\n\
                    fx_transfer, 100, 200, 3, KES";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(results.len(), 3);
        let open = results[0].as_ref().unwrap();
        assert_eq!(open.r#type, CommandType::Open);
        assert_eq!(open.party.as_deref(), Some("Ada"));
        assert_eq!(open.amount, None);
        assert_eq!(open.currency.as_deref(), Some("eur"));

        let deposit = results[1].as_ref().unwrap();
        assert_eq!(deposit.amount().unwrap(), dec!(10.5));
        assert!(deposit.party().is_err());

        let fx = results[2].as_ref().unwrap();
        assert_eq!(fx.r#type, CommandType::FxTransfer);
        assert_eq!(fx.party().unwrap(), "200");
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "type, phone, party, amount, currency\n\
                    refund, 100, , 1.0\n\
                    deposit, 100, , lots";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<Command>> = reader.commands().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_err());
    }
}
