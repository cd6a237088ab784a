//! # saverlink-ofx
//!
//! Parser for the OFX/QFX statement exports served by bank download endpoints.
//!
//! ## Features
//!
//! - **Both dialects**: OFX 1.x SGML (unclosed leaf elements) and OFX 2.x XML
//! - **Statement data**: transactions (`STMTTRN`), ledger and available
//!   balances, account ID and currency
//! - **OFX date-times**: `YYYYMMDDHHMMSS.XXX[-5:EST]` parsed with their offset
//! - **Exact money**: amounts are `rust_decimal::Decimal`, never floats
//! - **Declared charsets**: `CHARSET:1252` headers and XML `encoding`
//!   declarations are honoured by [`Statement::parse_bytes`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use saverlink_ofx::Statement;
//!
//! let statement = Statement::parse(&export_text)?;
//! for trn in &statement.transactions {
//!     println!("{} {} {}", trn.posted.date_naive(), trn.fitid, trn.amount);
//! }
//! if let Some(ledger) = statement.ledger_balance {
//!     println!("Ledger balance: {}", ledger.amount);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod charset;
mod datetime;
mod error;
mod lexer;
mod statement;

pub use charset::decode_export;
pub use datetime::parse_datetime;
pub use error::{Error, Result};
pub use lexer::{Lexer, Token};
pub use statement::{Balance, Statement, StatementTransaction, TransactionKind, parse_amount};
