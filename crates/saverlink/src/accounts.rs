//! Account catalog.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BalanceSource, SiteConfig};
use crate::error::{DecodeError, Result};
use crate::scrape::{HtmlScreenScraper, SummaryRow};
use crate::session::Session;
use crate::transactions::{AccountSelector, DateRange, TransactionRetriever};

/// One account as shown on the summary page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account number (unique).
    pub number: String,
    /// Account type label (e.g. "Orange Savings").
    pub kind: String,
    /// Nickname chosen by the account holder.
    pub nickname: String,
    /// Available balance.
    pub available: Decimal,
    /// Ledger (current) balance.
    pub ledger: Decimal,
}

impl Account {
    /// Builds an account from one summary row.
    ///
    /// The detail line is `<number> <nickname...> <ledger balance>`; the
    /// available line ends with the available balance.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if a line is missing fields or a balance is
    /// not money.
    pub fn from_row(row: &SummaryRow) -> Result<Self> {
        let fields: Vec<&str> = row.detail.split_whitespace().collect();
        let [number, nickname @ .., ledger] = fields.as_slice() else {
            return Err(DecodeError::MalformedAccountRow(row.detail.clone()).into());
        };
        let available = row
            .available
            .split_whitespace()
            .next_back()
            .ok_or_else(|| DecodeError::MalformedAccountRow(row.available.clone()))?;

        Ok(Self {
            number: (*number).to_string(),
            kind: row.label.trim().to_string(),
            nickname: nickname.join(" "),
            available: parse_money(available)?,
            ledger: parse_money(ledger)?,
        })
    }
}

/// Parses a displayed amount: `$1,234.56`, `-$5.00`, `($5.00)`, `12.5`.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidBalance`] if the text is not money.
pub fn parse_money(text: &str) -> Result<Decimal> {
    let trimmed = text.trim();
    let (negative, inner) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => match trimmed.strip_prefix('-') {
            Some(inner) => (true, inner),
            None => (false, trimmed),
        },
    };
    let digits: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    // A second sign inside the amount is not money.
    let amount = Decimal::from_str(&digits)
        .ok()
        .filter(|_| !digits.starts_with(['-', '+']))
        .ok_or_else(|| DecodeError::InvalidBalance(text.to_string()))?;
    Ok(if negative { -amount } else { amount })
}

/// Lists the accounts of an authenticated session.
#[derive(Debug)]
pub struct AccountCatalog<'a> {
    config: &'a SiteConfig,
    scraper: HtmlScreenScraper,
}

impl<'a> AccountCatalog<'a> {
    /// Creates a catalog for a site configuration.
    #[must_use]
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            config,
            scraper: HtmlScreenScraper::new(config.summary.row_marker.clone()),
        }
    }

    /// Parses the accounts on a summary page, keyed by account number.
    ///
    /// A page without account rows yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the rows are malformed.
    pub fn from_summary(&self, html: &str) -> Result<BTreeMap<String, Account>> {
        self.scraper
            .extract_rows(html)?
            .iter()
            .map(|row| Account::from_row(row).map(|account| (account.number.clone(), account)))
            .collect()
    }

    /// Lists the accounts, taking balances from the configured source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotAuthenticated`] if the session has no landing
    /// page, or any scraping or download error.
    pub async fn list(&self, session: &Session) -> Result<BTreeMap<String, Account>> {
        let mut accounts = self.from_summary(session.landing()?)?;
        debug!("Summary page lists {} account(s)", accounts.len());

        if let BalanceSource::Statement { days } = self.config.balance_source {
            let retriever = TransactionRetriever::new(self.config);
            for account in accounts.values_mut() {
                let selector = AccountSelector::Account(account.number.clone());
                let statement = retriever
                    .statement(session, &selector, &DateRange::Trailing { days })
                    .await?;
                if let Some(ledger) = statement.ledger_balance {
                    account.ledger = ledger.amount;
                }
                if let Some(available) = statement.available_balance {
                    account.available = available.amount;
                }
            }
        }

        Ok(accounts)
    }
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
    use crate::error::Error;

    const PAGE: &str = include_str!("../tests/fixtures/account_summary.html");

    fn config() -> SiteConfig {
        SiteConfig::challenge_keypad("https://bank.example.com/myaccount/").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_from_summary() {
        let config = config();
        let accounts = AccountCatalog::new(&config).from_summary(PAGE).unwrap();
        assert_eq!(accounts.len(), 3);

        let savings = &accounts["12345678"];
        assert_eq!(savings.kind, "Orange Savings");
        assert_eq!(savings.nickname, "Rainy Day Fund");
        assert_eq!(savings.ledger, dec("1234.56"));
        assert_eq!(savings.available, dec("1200.00"));

        let checking = &accounts["87654321"];
        assert_eq!(checking.kind, "Electric Orange");
        assert_eq!(checking.ledger, dec("-15.25"));

        for account in accounts.values() {
            assert!(!account.kind.is_empty());
            assert!(!account.nickname.is_empty());
        }
    }

    #[test]
    fn test_from_summary_is_idempotent() {
        let config = config();
        let catalog = AccountCatalog::new(&config);
        assert_eq!(catalog.from_summary(PAGE).unwrap(), catalog.from_summary(PAGE).unwrap());
    }

    #[test]
    fn test_from_summary_without_rows() {
        let config = config();
        let accounts = AccountCatalog::new(&config)
            .from_summary("<html><body>No accounts</body></html>")
            .unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_row_without_nickname() {
        let row = SummaryRow {
            label: "CD".into(),
            detail: "55555555 $10.00".into(),
            available: "$10.00".into(),
        };
        let account = Account::from_row(&row).unwrap();
        assert_eq!(account.number, "55555555");
        assert_eq!(account.nickname, "");
    }

    #[test]
    fn test_malformed_rows() {
        let row = SummaryRow {
            label: "CD".into(),
            detail: "55555555".into(),
            available: "$10.00".into(),
        };
        assert!(matches!(
            Account::from_row(&row),
            Err(Error::Decode(DecodeError::MalformedAccountRow(_)))
        ));

        let row = SummaryRow {
            label: "CD".into(),
            detail: "55555555 Savings lots".into(),
            available: "$10.00".into(),
        };
        assert!(matches!(
            Account::from_row(&row),
            Err(Error::Decode(DecodeError::InvalidBalance(_)))
        ));
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("$1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_money("-$5.00").unwrap(), dec("-5.00"));
        assert_eq!(parse_money("($5.00)").unwrap(), dec("-5.00"));
        assert_eq!(parse_money("12.5").unwrap(), dec("12.5"));
        assert!(parse_money("--5").is_err());
        assert!(parse_money("$").is_err());
        assert!(parse_money("N/A").is_err());
    }

    #[tokio::test]
    async fn test_list_requires_login() {
        let config = config();
        let session = Session::new(&config).unwrap();
        let err = AccountCatalog::new(&config).list(&session).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }
}
