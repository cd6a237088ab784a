//! # saverlink
//!
//! Screen-scraping client for a retail bank's web interface: multi-step
//! login with challenge questions and a randomized PIN keypad, account
//! summaries scraped from the landing page, and OFX/QFX transaction exports.
//!
//! ## Features
//!
//! - **Type-state client**: accounts and exports only exist on a logged-in
//!   client (`NotAuthenticated` → `Authenticated`)
//! - **Configurable site versions**: login flow, paths and form fields are
//!   data in [`SiteConfig`], loadable from JSON
//! - **Keypad decoding**: PIN digits are sent as the per-visit keypad symbols,
//!   never as digits
//! - **Exact money**: balances and amounts are `rust_decimal::Decimal`
//! - **Redacted secrets**: PIN, answers and keypad tokens never appear in
//!   `Debug` output or logs
//!
//! ## Quick Start
//!
//! ```ignore
//! use saverlink::{Client, Credentials, DateRange, SiteConfig};
//!
//! #[tokio::main]
//! async fn main() -> saverlink::Result<()> {
//!     let config = SiteConfig::challenge_keypad("https://secure.bank.example/myaccount/")?;
//!     let credentials = Credentials::new("12345678", "987654", "2468")
//!         .with_answer("AnswerQ1.4", "1950")
//!         .with_answer("AnswerQ2.8", "Rex");
//!
//!     let mut client = Client::connect(config, &credentials).await?;
//!
//!     for (number, account) in client.accounts().await? {
//!         println!("{number} {} {}", account.nickname, account.available);
//!     }
//!
//!     for txn in client.recent_transactions("12345678", 30).await? {
//!         println!("{} {:>10} {}", txn.date, txn.amount, txn.payee);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Login Sequence
//!
//! ```text
//! ┌──────────────────┐
//! │ NotAuthenticated │ ─── login() ───→ Authenticated
//! └──────────────────┘
//!          │  Init → Identify → [Challenge] → Pin → Landing
//!          ▼
//! ┌──────────────────┐
//! │  Authenticated   │ ─── accounts() / export() / transactions()
//! └──────────────────┘
//! ```
//!
//! A failed stage is fatal and never retried.
//!
//! ## Modules
//!
//! - [`accounts`]: Account catalog built from the landing page
//! - [`client`]: Type-state client
//! - [`config`]: Site configuration and presets
//! - [`keypad`]: Randomized keypad decoding
//! - [`login`]: Login state machine
//! - [`scrape`]: Summary page scraping
//! - [`session`]: HTTP session and cookie store
//! - [`transactions`]: Export requests and normalization

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod accounts;
pub mod client;
pub mod config;
mod credentials;
mod error;
pub mod keypad;
pub mod login;
pub mod scrape;
pub mod session;
pub mod transactions;

pub use accounts::{Account, AccountCatalog};
pub use client::{Authenticated, Client, NotAuthenticated};
pub use config::{BalanceSource, DateEncoding, LoginFlow, SiteConfig};
pub use credentials::{Credentials, ValidationError};
pub use error::{DecodeError, Error, FailureReason, LoginStage, Result};
pub use keypad::{KeypadMapper, KeypadMapping, PinTokens};
pub use login::{QuestionScanner, SessionAuthenticator};
pub use scrape::{HtmlScreenScraper, SummaryRow};
pub use session::Session;
pub use transactions::{AccountSelector, DateRange, Transaction, TransactionRetriever};

pub use saverlink_ofx as ofx;
