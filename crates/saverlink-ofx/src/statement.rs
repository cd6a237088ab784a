//! Bank statement aggregates.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::charset::decode_export;
use crate::datetime::parse_datetime;
use crate::lexer::{Lexer, Token};
use crate::{Error, Result};

/// OFX transaction type (`TRNTYPE`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Generic credit.
    Credit,
    /// Generic debit.
    Debit,
    /// Interest earned or paid.
    Interest,
    /// Dividend.
    Dividend,
    /// Fee.
    Fee,
    /// Service charge.
    ServiceCharge,
    /// Deposit.
    Deposit,
    /// ATM debit or credit.
    Atm,
    /// Point of sale debit or credit.
    PointOfSale,
    /// Transfer.
    Transfer,
    /// Check.
    Check,
    /// Electronic payment.
    Payment,
    /// Cash withdrawal.
    Cash,
    /// Direct deposit.
    DirectDeposit,
    /// Merchant initiated debit.
    DirectDebit,
    /// Repeating payment or standing order.
    RepeatPayment,
    /// Any other type code.
    Other(String),
}

impl TransactionKind {
    /// Parses a `TRNTYPE` code.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "CREDIT" => Self::Credit,
            "DEBIT" => Self::Debit,
            "INT" => Self::Interest,
            "DIV" => Self::Dividend,
            "FEE" => Self::Fee,
            "SRVCHG" => Self::ServiceCharge,
            "DEP" => Self::Deposit,
            "ATM" => Self::Atm,
            "POS" => Self::PointOfSale,
            "XFER" => Self::Transfer,
            "CHECK" => Self::Check,
            "PAYMENT" => Self::Payment,
            "CASH" => Self::Cash,
            "DIRECTDEP" => Self::DirectDeposit,
            "DIRECTDEBIT" => Self::DirectDebit,
            "REPEATPMT" => Self::RepeatPayment,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for types that always move money out of the account.
    ///
    /// `ATM`, `POS` and `XFER` can go either way and are not included.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(
            self,
            Self::Debit
                | Self::Fee
                | Self::ServiceCharge
                | Self::Check
                | Self::Payment
                | Self::Cash
                | Self::DirectDebit
                | Self::RepeatPayment
        )
    }
}

/// A single `STMTTRN` record as it appears in the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementTransaction {
    /// Transaction type.
    pub kind: TransactionKind,
    /// Posting date-time (`DTPOSTED`) in the bank's offset.
    pub posted: DateTime<FixedOffset>,
    /// Amount as exported (`TRNAMT`).
    pub amount: Decimal,
    /// Financial institution transaction ID (`FITID`).
    pub fitid: String,
    /// Payee name (`NAME`).
    pub name: Option<String>,
    /// Free-form memo (`MEMO`).
    pub memo: Option<String>,
}

/// A balance aggregate (`LEDGERBAL` or `AVAILBAL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Balance amount (`BALAMT`).
    pub amount: Decimal,
    /// Effective date (`DTASOF`).
    pub as_of: Option<DateTime<FixedOffset>>,
}

/// A parsed bank or credit card statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Account ID from `BANKACCTFROM`/`CCACCTFROM`.
    pub account_id: Option<String>,
    /// Default currency (`CURDEF`).
    pub currency: Option<String>,
    /// Transactions in export order.
    pub transactions: Vec<StatementTransaction>,
    /// Ledger balance.
    pub ledger_balance: Option<Balance>,
    /// Available balance.
    pub available_balance: Option<Balance>,
}

#[derive(Debug, Default)]
struct TransactionBuilder {
    kind: Option<String>,
    posted: Option<String>,
    amount: Option<String>,
    fitid: Option<String>,
    name: Option<String>,
    memo: Option<String>,
}

impl TransactionBuilder {
    fn set(&mut self, tag: &str, value: &str) {
        let slot = match tag {
            "TRNTYPE" => &mut self.kind,
            "DTPOSTED" => &mut self.posted,
            "TRNAMT" => &mut self.amount,
            "FITID" => &mut self.fitid,
            "NAME" => &mut self.name,
            "MEMO" => &mut self.memo,
            _ => return,
        };
        *slot = Some(value.to_string());
    }

    fn build(self) -> Result<StatementTransaction> {
        let missing = |field| Error::MissingField {
            aggregate: "STMTTRN",
            field,
        };
        let posted = self.posted.ok_or_else(|| missing("DTPOSTED"))?;
        let amount = self.amount.ok_or_else(|| missing("TRNAMT"))?;
        Ok(StatementTransaction {
            kind: TransactionKind::from_code(self.kind.as_deref().unwrap_or("OTHER")),
            posted: parse_datetime(&posted)?,
            amount: parse_amount(&amount)?,
            fitid: self.fitid.ok_or_else(|| missing("FITID"))?,
            name: self.name,
            memo: self.memo,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BalanceSlot {
    Ledger,
    Available,
}

#[derive(Debug, Default)]
struct BalanceBuilder {
    amount: Option<String>,
    as_of: Option<String>,
}

impl BalanceBuilder {
    fn build(self, aggregate: &'static str) -> Result<Balance> {
        let amount = self.amount.ok_or(Error::MissingField {
            aggregate,
            field: "BALAMT",
        })?;
        Ok(Balance {
            amount: parse_amount(&amount)?,
            as_of: self.as_of.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

impl Statement {
    /// Parses a raw export body, decoding it with its declared charset.
    ///
    /// # Errors
    ///
    /// Same as [`Self::parse`].
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(&decode_export(bytes))
    }

    /// Parses an OFX/QFX document.
    ///
    /// Only the first statement's account ID and balances are kept; transactions
    /// from every statement in the document are collected in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no `<OFX>` root, a transaction is
    /// missing a required field, or a date/amount is malformed.
    pub fn parse(input: &str) -> Result<Self> {
        let mut lexer = Lexer::new(input)?;
        let mut statement = Self::default();
        let mut stack: Vec<&str> = Vec::new();
        let mut transaction: Option<TransactionBuilder> = None;
        let mut balance: Option<(BalanceSlot, BalanceBuilder)> = None;

        while let Some(token) = lexer.next_token()? {
            match token {
                Token::Open(name) => {
                    match name {
                        "STMTTRN" => transaction = Some(TransactionBuilder::default()),
                        "LEDGERBAL" => balance = Some((BalanceSlot::Ledger, BalanceBuilder::default())),
                        "AVAILBAL" => {
                            balance = Some((BalanceSlot::Available, BalanceBuilder::default()));
                        }
                        _ => {}
                    }
                    stack.push(name);
                }
                Token::Close(name) => {
                    // Closes for leaf elements (OFX 2.x) never match the stack.
                    let Some(depth) = stack.iter().rposition(|open| *open == name) else {
                        continue;
                    };
                    for closed in stack.drain(depth..).rev() {
                        statement.close(closed, &mut transaction, &mut balance)?;
                    }
                }
                Token::Leaf(tag, value) => {
                    if let Some(builder) = transaction.as_mut() {
                        builder.set(tag, &value);
                    } else if let Some((_, builder)) = balance.as_mut() {
                        match tag {
                            "BALAMT" => builder.amount = Some(value.into_owned()),
                            "DTASOF" => builder.as_of = Some(value.into_owned()),
                            _ => {}
                        }
                    } else if tag == "ACCTID"
                        && statement.account_id.is_none()
                        && matches!(stack.last(), Some(&("BANKACCTFROM" | "CCACCTFROM")))
                    {
                        statement.account_id = Some(value.into_owned());
                    } else if tag == "CURDEF" && statement.currency.is_none() {
                        statement.currency = Some(value.into_owned());
                    }
                }
            }
        }

        // Unclosed aggregates at end of input (truncated SGML) still count.
        while let Some(closed) = stack.pop() {
            statement.close(closed, &mut transaction, &mut balance)?;
        }

        Ok(statement)
    }

    fn close(
        &mut self,
        name: &str,
        transaction: &mut Option<TransactionBuilder>,
        balance: &mut Option<(BalanceSlot, BalanceBuilder)>,
    ) -> Result<()> {
        match name {
            "STMTTRN" => {
                if let Some(builder) = transaction.take() {
                    self.transactions.push(builder.build()?);
                }
            }
            "LEDGERBAL" | "AVAILBAL" => {
                if let Some((slot, builder)) = balance.take() {
                    match slot {
                        BalanceSlot::Ledger if self.ledger_balance.is_none() => {
                            self.ledger_balance = Some(builder.build("LEDGERBAL")?);
                        }
                        BalanceSlot::Available if self.available_balance.is_none() => {
                            self.available_balance = Some(builder.build("AVAILBAL")?);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parses an OFX amount. Accepts a decimal comma when no point is present.
///
/// # Errors
///
/// Returns [`Error::InvalidAmount`] if the value is not a decimal number.
pub fn parse_amount(value: &str) -> Result<Decimal> {
    let trimmed = value.trim();
    let normalized = if trimmed.contains('.') {
        trimmed.to_string()
    } else {
        trimmed.replace(',', ".")
    };
    let normalized = normalized.strip_prefix('+').unwrap_or(&normalized);
    Decimal::from_str(normalized).map_err(|_| Error::InvalidAmount(value.to_string()))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    const SGML: &str = "OFXHEADER:100
DATA:OFXSGML
VERSION:102
SECURITY:NONE
ENCODING:USASCII

<OFX>
<SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS><DTSERVER>20200320</SONRS></SIGNONMSGSRSV1>
<BANKMSGSRSV1><STMTTRNRS><TRNUID>1<STMTRS>
<CURDEF>USD
<BANKACCTFROM><BANKID>031176110<ACCTID>12345678<ACCTTYPE>SAVINGS</BANKACCTFROM>
<BANKTRANLIST><DTSTART>20200301<DTEND>20200320
<STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20200315120000[-5:EST]<TRNAMT>-42.5<FITID>T-1<NAME>Coffee &amp; Co</STMTTRN>
<STMTTRN><TRNTYPE>INT<DTPOSTED>20200316<TRNAMT>1.07<FITID>T-2<MEMO>Interest</STMTTRN>
</BANKTRANLIST>
<LEDGERBAL><BALAMT>1234.56<DTASOF>20200320</LEDGERBAL>
<AVAILBAL><BALAMT>1200.00<DTASOF>20200320</AVAILBAL>
</STMTRS></STMTTRNRS></BANKMSGSRSV1>
</OFX>
";

    #[test]
    fn test_parse_sgml_statement() {
        let statement = Statement::parse(SGML).unwrap();
        assert_eq!(statement.account_id.as_deref(), Some("12345678"));
        assert_eq!(statement.currency.as_deref(), Some("USD"));
        assert_eq!(statement.transactions.len(), 2);

        let first = &statement.transactions[0];
        assert_eq!(first.kind, TransactionKind::Debit);
        assert_eq!(first.amount, Decimal::from_str("-42.5").unwrap());
        assert_eq!(first.fitid, "T-1");
        assert_eq!(first.name.as_deref(), Some("Coffee & Co"));
        assert_eq!(first.posted.to_rfc3339(), "2020-03-15T12:00:00-05:00");

        let second = &statement.transactions[1];
        assert_eq!(second.kind, TransactionKind::Interest);
        assert_eq!(second.memo.as_deref(), Some("Interest"));
        assert!(second.name.is_none());

        assert_eq!(
            statement.ledger_balance.unwrap().amount,
            Decimal::from_str("1234.56").unwrap()
        );
        assert_eq!(
            statement.available_balance.unwrap().amount,
            Decimal::from_str("1200.00").unwrap()
        );
    }

    #[test]
    fn test_parse_xml_statement() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<?OFX OFXHEADER="200" VERSION="211"?>
<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS>
<BANKACCTFROM><ACCTID>87654321</ACCTID></BANKACCTFROM>
<BANKTRANLIST>
<STMTTRN><TRNTYPE>CREDIT</TRNTYPE><DTPOSTED>20200101</DTPOSTED><TRNAMT>10.00</TRNAMT><FITID>X1</FITID><NAME>Deposit</NAME></STMTTRN>
</BANKTRANLIST>
<LEDGERBAL><BALAMT>10.00</BALAMT><DTASOF>20200101</DTASOF></LEDGERBAL>
</STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>"#;
        let statement = Statement::parse(xml).unwrap();
        assert_eq!(statement.account_id.as_deref(), Some("87654321"));
        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(statement.transactions[0].kind, TransactionKind::Credit);
        assert!(statement.available_balance.is_none());
    }

    #[test]
    fn test_parse_bytes_windows_1252() {
        let mut bytes = b"OFXHEADER:100\r\nDATA:OFXSGML\r\nENCODING:USASCII\r\nCHARSET:1252\r\n\r\n\
<OFX><BANKTRANLIST><STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20200315<TRNAMT>-4.50\
<FITID>1<NAME>Caf"
            .to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</STMTTRN></BANKTRANLIST></OFX>");

        let statement = Statement::parse_bytes(&bytes).unwrap();
        assert_eq!(statement.transactions[0].name.as_deref(), Some("Café"));
    }

    #[test]
    fn test_missing_fitid() {
        let doc = "<OFX><STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20200101<TRNAMT>-1</STMTTRN></OFX>";
        assert!(matches!(
            Statement::parse(doc),
            Err(Error::MissingField {
                aggregate: "STMTTRN",
                field: "FITID"
            })
        ));
    }

    #[test]
    fn test_empty_statement() {
        let statement = Statement::parse("<OFX></OFX>").unwrap();
        assert!(statement.transactions.is_empty());
        assert!(statement.ledger_balance.is_none());
    }

    #[test]
    fn test_truncated_document_keeps_open_transaction() {
        let doc = "<OFX><STMTTRN><DTPOSTED>20200101<TRNAMT>5<FITID>Z";
        let statement = Statement::parse(doc).unwrap();
        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(
            statement.transactions[0].kind,
            TransactionKind::Other("OTHER".into())
        );
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount("+12.30").unwrap(), Decimal::from_str("12.30").unwrap());
        assert_eq!(parse_amount("-7,5").unwrap(), Decimal::from_str("-7.5").unwrap());
        assert!(matches!(parse_amount("abc"), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_debit_kinds() {
        assert!(TransactionKind::from_code("debit").is_debit());
        assert!(TransactionKind::from_code("CHECK").is_debit());
        assert!(!TransactionKind::from_code("ATM").is_debit());
        assert!(!TransactionKind::from_code("CREDIT").is_debit());
    }
}
