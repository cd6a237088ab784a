//! Implementation for the authenticated state.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::Client;
use super::states::Authenticated;
use crate::Result;
use crate::accounts::{Account, AccountCatalog};
use crate::transactions::{AccountSelector, DateRange, Transaction, TransactionRetriever};

impl Client<Authenticated> {
    /// Returns the landing page cached at login.
    pub fn landing_page(&self) -> Result<&str> {
        self.session.landing()
    }

    /// Lists the accounts, keyed by account number.
    pub async fn accounts(&mut self) -> Result<BTreeMap<String, Account>> {
        AccountCatalog::new(&self.config).list(&self.session).await
    }

    /// Downloads a raw OFX/QFX export.
    pub async fn export(&mut self, selector: &AccountSelector, range: &DateRange) -> Result<Bytes> {
        TransactionRetriever::new(&self.config)
            .export(&self.session, selector, range)
            .await
    }

    /// Downloads and normalizes transactions.
    pub async fn transactions(
        &mut self,
        selector: &AccountSelector,
        range: &DateRange,
    ) -> Result<Vec<Transaction>> {
        TransactionRetriever::new(&self.config)
            .transactions(&self.session, selector, range)
            .await
    }

    /// Returns one account's transactions for the last `days` days.
    pub async fn recent_transactions(&mut self, account: &str, days: u32) -> Result<Vec<Transaction>> {
        self.transactions(&AccountSelector::account(account), &DateRange::trailing(days))
            .await
    }
}
