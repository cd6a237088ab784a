//! Transaction export and normalization.
//!
//! Exports are requested as OFX/QFX downloads and parsed with
//! [`saverlink_ofx`]. Only the trailing-window (`STANDARD`) request has been
//! checked against the live site; explicit date ranges (`VARIABLE`) follow
//! the form's field layout but are unverified.

use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use saverlink_ofx::{Statement, StatementTransaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DateEncoding, SiteConfig, TIMEFRAME_STANDARD, TIMEFRAME_VARIABLE};
use crate::error::{Error, Result};
use crate::session::Session;

/// Default trailing window, in days.
pub const DEFAULT_DAYS: u32 = 30;

/// Which accounts an export covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccountSelector {
    /// Every account.
    #[default]
    All,
    /// One account, by number.
    Account(String),
}

impl AccountSelector {
    /// Selects one account.
    #[must_use]
    pub fn account(number: impl Into<String>) -> Self {
        Self::Account(number.into())
    }
}

/// Period an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    /// The last `days` days.
    Trailing {
        /// Window length, at least 1.
        days: u32,
    },
    /// An explicit inclusive range.
    Between {
        /// First day.
        from: NaiveDate,
        /// Last day.
        to: NaiveDate,
    },
}

impl Default for DateRange {
    fn default() -> Self {
        Self::Trailing { days: DEFAULT_DAYS }
    }
}

impl DateRange {
    /// Creates a trailing window.
    #[must_use]
    pub const fn trailing(days: u32) -> Self {
        Self::Trailing { days }
    }

    /// Creates an explicit range; open ends default to 2000-01-01 and
    /// 2038-01-01.
    #[must_use]
    pub fn between(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self::Between {
            from: from.unwrap_or_else(|| ymd(2000, 1, 1)),
            to: to.unwrap_or_else(|| ymd(2038, 1, 1)),
        }
    }

    /// Checks the range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRange`] for an empty window or `from > to`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Trailing { days: 0 } => Err(Error::InvalidRange(
                "trailing window must be at least one day".into(),
            )),
            Self::Between { from, to } if from > to => {
                Err(Error::InvalidRange(format!("{from} is after {to}")))
            }
            _ => Ok(()),
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// A normalized transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Bank-assigned transaction ID (FITID).
    pub id: String,
    /// Posting date, as a calendar day in the bank's own offset.
    pub date: NaiveDate,
    /// Payee or description.
    pub payee: String,
    /// Signed amount with two decimal places; debits are negative.
    pub amount: Decimal,
}

impl Transaction {
    /// Normalizes a statement transaction.
    #[must_use]
    pub fn from_statement(txn: &StatementTransaction) -> Self {
        let mut amount = txn.amount;
        if txn.kind.is_debit() && amount.is_sign_positive() && !amount.is_zero() {
            amount = -amount;
        }
        amount.rescale(2);

        let payee = txn
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(txn.memo.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string();

        Self {
            id: txn.fitid.clone(),
            date: txn.posted.date_naive(),
            payee,
            amount,
        }
    }
}

/// Requests exports for an authenticated session.
#[derive(Debug, Clone, Copy)]
pub struct TransactionRetriever<'a> {
    config: &'a SiteConfig,
}

impl<'a> TransactionRetriever<'a> {
    /// Creates a retriever for a site configuration.
    #[must_use]
    pub const fn new(config: &'a SiteConfig) -> Self {
        Self { config }
    }

    /// Builds the export form fields.
    #[must_use]
    pub fn build_form(&self, selector: &AccountSelector, range: &DateRange) -> Vec<(String, String)> {
        let form = &self.config.export;
        let mut fields = form.static_fields.clone();

        let account = match selector {
            AccountSelector::All => form.all_accounts.clone(),
            AccountSelector::Account(number) => number.clone(),
        };
        fields.push((form.account_field.clone(), account));

        match *range {
            DateRange::Trailing { days } => {
                fields.push((form.timeframe_field.clone(), TIMEFRAME_STANDARD.into()));
                fields.push((form.days_field.clone(), days.to_string()));
            }
            DateRange::Between { from, to } => {
                fields.push((form.timeframe_field.clone(), TIMEFRAME_VARIABLE.into()));
                match &form.date_encoding {
                    DateEncoding::Combined {
                        start_field,
                        end_field,
                    } => {
                        fields.push((start_field.clone(), from.format("%m/%d/%Y").to_string()));
                        fields.push((end_field.clone(), to.format("%m/%d/%Y").to_string()));
                    }
                    DateEncoding::Split {
                        start_prefix,
                        end_prefix,
                    } => {
                        push_split_date(&mut fields, start_prefix, from);
                        push_split_date(&mut fields, end_prefix, to);
                    }
                }
            }
        }
        fields
    }

    /// Downloads the raw export.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] before login,
    /// [`Error::InvalidRange`] for a bad range and
    /// [`Error::DownloadFailed`] for a non-success status.
    pub async fn export(
        &self,
        session: &Session,
        selector: &AccountSelector,
        range: &DateRange,
    ) -> Result<Bytes> {
        session.landing()?;
        range.validate()?;

        let fields = self.build_form(selector, range);
        let response = session.post_form(&self.config.export.path, &fields).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::DownloadFailed { status });
        }
        let body = response.bytes().await?;
        debug!("Export returned {} bytes", body.len());
        Ok(body)
    }

    /// Downloads and parses an export.
    ///
    /// # Errors
    ///
    /// Returns any [`Self::export`] error, or [`Error::Ofx`] if the body is
    /// not a statement.
    pub async fn statement(
        &self,
        session: &Session,
        selector: &AccountSelector,
        range: &DateRange,
    ) -> Result<Statement> {
        let body = self.export(session, selector, range).await?;
        Ok(Statement::parse_bytes(&body)?)
    }

    /// Downloads an export and returns its normalized transactions.
    ///
    /// # Errors
    ///
    /// Returns any [`Self::statement`] error.
    pub async fn transactions(
        &self,
        session: &Session,
        selector: &AccountSelector,
        range: &DateRange,
    ) -> Result<Vec<Transaction>> {
        let statement = self.statement(session, selector, range).await?;
        Ok(statement
            .transactions
            .iter()
            .map(Transaction::from_statement)
            .collect())
    }
}

fn push_split_date(fields: &mut Vec<(String, String)>, prefix: &str, date: NaiveDate) {
    fields.push((format!("{prefix}Day"), format!("{:02}", date.day())));
    fields.push((format!("{prefix}Month"), format!("{:02}", date.month())));
    fields.push((format!("{prefix}Year"), format!("{:04}", date.year())));
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
    use saverlink_ofx::TransactionKind;
    use std::str::FromStr;

    fn config() -> SiteConfig {
        SiteConfig::challenge_keypad("https://bank.example.com/myaccount/").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn field<'f>(fields: &'f [(String, String)], name: &str) -> Option<&'f str> {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn txn(kind: TransactionKind, amount: &str) -> StatementTransaction {
        StatementTransaction {
            kind,
            posted: saverlink_ofx::parse_datetime("20200315120000[-5:EST]").unwrap(),
            amount: Decimal::from_str(amount).unwrap(),
            fitid: "2020031501".into(),
            name: Some("Coffee Shop".into()),
            memo: Some("Card purchase".into()),
        }
    }

    #[test]
    fn test_trailing_form() {
        let config = config();
        let fields = TransactionRetriever::new(&config)
            .build_form(&AccountSelector::account("A1"), &DateRange::trailing(30));
        assert_eq!(field(&fields, "account"), Some("A1"));
        assert_eq!(field(&fields, "TIMEFRAME"), Some("STANDARD"));
        assert_eq!(field(&fields, "FREQ"), Some("30"));
        assert_eq!(field(&fields, "type"), Some("OFX"));
        assert_eq!(field(&fields, "startDate"), None);
    }

    #[test]
    fn test_all_accounts_sentinel() {
        let config = config();
        let fields =
            TransactionRetriever::new(&config).build_form(&AccountSelector::All, &DateRange::default());
        assert_eq!(field(&fields, "account"), Some("ALL"));
        assert_eq!(field(&fields, "FREQ"), Some("30"));
    }

    #[test]
    fn test_combined_date_form() {
        let config = config();
        let range = DateRange::between(Some(date(2020, 1, 1)), Some(date(2020, 2, 1)));
        let fields = TransactionRetriever::new(&config).build_form(&AccountSelector::All, &range);
        assert_eq!(field(&fields, "TIMEFRAME"), Some("VARIABLE"));
        assert_eq!(field(&fields, "startDate"), Some("01/01/2020"));
        assert_eq!(field(&fields, "endDate"), Some("02/01/2020"));
        assert_eq!(field(&fields, "FREQ"), None);
    }

    #[test]
    fn test_split_date_form() {
        let config = SiteConfig::direct_keypad("https://bank.example.com/").unwrap();
        let range = DateRange::between(Some(date(2020, 1, 1)), Some(date(2020, 2, 1)));
        let fields = TransactionRetriever::new(&config).build_form(&AccountSelector::All, &range);
        let DateEncoding::Split {
            start_prefix,
            end_prefix,
        } = &config.export.date_encoding
        else {
            panic!("direct keypad preset uses split dates");
        };
        assert_eq!(field(&fields, &format!("{start_prefix}Day")), Some("01"));
        assert_eq!(field(&fields, &format!("{start_prefix}Month")), Some("01"));
        assert_eq!(field(&fields, &format!("{start_prefix}Year")), Some("2020"));
        assert_eq!(field(&fields, &format!("{end_prefix}Day")), Some("01"));
        assert_eq!(field(&fields, &format!("{end_prefix}Month")), Some("02"));
        assert_eq!(field(&fields, &format!("{end_prefix}Year")), Some("2020"));
    }

    #[test]
    fn test_range_defaults_and_validation() {
        let DateRange::Between { from, to } = DateRange::between(None, None) else {
            panic!("expected explicit range");
        };
        assert_eq!(from, date(2000, 1, 1));
        assert_eq!(to, date(2038, 1, 1));

        assert!(DateRange::default().validate().is_ok());
        assert!(matches!(
            DateRange::trailing(0).validate(),
            Err(Error::InvalidRange(_))
        ));
        let backwards = DateRange::between(Some(date(2020, 2, 1)), Some(date(2020, 1, 1)));
        assert!(matches!(backwards.validate(), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_normalize_credit() {
        let t = Transaction::from_statement(&txn(TransactionKind::Credit, "-42.5"));
        assert_eq!(t.amount.to_string(), "-42.50");
        assert_eq!(t.date.to_string(), "2020-03-15");
        assert_eq!(t.payee, "Coffee Shop");
        assert_eq!(t.id, "2020031501");
    }

    #[test]
    fn test_normalize_positive_debit_is_negated() {
        let t = Transaction::from_statement(&txn(TransactionKind::Debit, "12.3"));
        assert_eq!(t.amount.to_string(), "-12.30");
        let t = Transaction::from_statement(&txn(TransactionKind::Fee, "-1"));
        assert_eq!(t.amount.to_string(), "-1.00");
    }

    #[test]
    fn test_evening_posting_keeps_bank_date() {
        let mut raw = txn(TransactionKind::Debit, "3.75");
        raw.posted = saverlink_ofx::parse_datetime("20200315200000[-5:EST]").unwrap();
        assert_eq!(Transaction::from_statement(&raw).date, date(2020, 3, 15));

        raw.posted = saverlink_ofx::parse_datetime("20200315233000[-5:EST]").unwrap();
        assert_eq!(Transaction::from_statement(&raw).date, date(2020, 3, 15));
    }

    #[test]
    fn test_payee_falls_back_to_memo() {
        let mut raw = txn(TransactionKind::Credit, "5");
        raw.name = None;
        assert_eq!(Transaction::from_statement(&raw).payee, "Card purchase");
        raw.memo = None;
        assert_eq!(Transaction::from_statement(&raw).payee, "");
    }

    #[tokio::test]
    async fn test_export_requires_login() {
        let config = config();
        let session = Session::new(&config).unwrap();
        let err = TransactionRetriever::new(&config)
            .export(&session, &AccountSelector::All, &DateRange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }
}
