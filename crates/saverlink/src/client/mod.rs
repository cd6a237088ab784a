//! Type-state bank client.
//!
//! Uses the type-state pattern to enforce valid state transitions at compile
//! time:
//!
//! - `NotAuthenticated`: a fresh session; only [`Client::login`] is available
//! - `Authenticated`: after a successful login sequence
//!
//! Each state only exposes methods that are valid for that state. A client
//! owns its session exclusively and every network method takes `&mut self`,
//! so requests on one client never overlap.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod states;

use std::marker::PhantomData;

pub use self::states::{Authenticated, NotAuthenticated};
use crate::config::SiteConfig;
use crate::session::Session;

/// Bank client with type-state.
///
/// The type parameter `State` tracks the login state at compile time.
#[derive(Debug)]
pub struct Client<State> {
    pub(crate) config: SiteConfig,
    pub(crate) session: Session,
    _state: PhantomData<State>,
}

/// Shared implementation for all states.
impl<State> Client<State> {
    /// Returns the site configuration.
    #[must_use]
    pub const fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Returns the underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the value of a named session cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.session.cookie(name)
    }

    fn into_state<Next>(self) -> Client<Next> {
        Client {
            config: self.config,
            session: self.session,
            _state: PhantomData,
        }
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

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_client_is_send_sync() {
        assert_send_sync::<Client<NotAuthenticated>>();
        assert_send_sync::<Client<Authenticated>>();
    }

    #[test]
    fn test_new_client_is_not_authenticated() {
        let config = SiteConfig::challenge_keypad("https://bank.example.com/myaccount/").unwrap();
        let client = Client::new(config).unwrap();
        assert!(!client.session().is_authenticated());
        assert_eq!(client.config().base_url.as_str(), "https://bank.example.com/myaccount/");
        assert_eq!(client.cookie("JSESSIONID"), None);
    }
}
