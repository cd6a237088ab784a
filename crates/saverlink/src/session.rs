//! HTTP session: client, cookie jar and the authenticated landing page.
//!
//! Redirects are never followed. Every login form post must answer with a
//! redirect, and that status is how the login sequence knows a step worked.

use std::fmt;
use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{Client as HttpClient, Response};
use tracing::debug;
use url::Url;

use crate::config::SiteConfig;
use crate::error::{Error, Result};

/// Cookie store and HTTP client for one logical login.
///
/// A session is owned by exactly one client. It never expires locally; when
/// the server times the session out, later requests simply fail.
pub struct Session {
    http: HttpClient,
    jar: Arc<Jar>,
    base_url: Url,
    landing: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.landing.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates an empty session for a site.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let mut builder = HttpClient::builder()
            .redirect(Policy::none())
            .cookie_provider(Arc::clone(&jar));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        Ok(Self {
            http: builder.build()?,
            jar,
            base_url: config.base_url.clone(),
            landing: None,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails to produce a response.
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = self.url(path)?;
        debug!("GET {}", url.path());
        Ok(self.http.get(url).send().await?)
    }

    /// Sends a url-encoded form POST.
    ///
    /// Field values are not logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails to produce a response.
    pub async fn post_form(&self, path: &str, fields: &[(String, String)]) -> Result<Response> {
        let url = self.url(path)?;
        debug!("POST {} ({} fields)", url.path(), fields.len());
        Ok(self.http.post(url).form(fields).send().await?)
    }

    /// Returns the value of a named cookie sent to the base URL.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookie_for(&self.base_url, name)
    }

    /// Returns the value of a named cookie sent to `path`.
    ///
    /// Cookies scoped to a sub-path are only visible from that path.
    #[must_use]
    pub fn cookie_at(&self, path: &str, name: &str) -> Option<String> {
        let url = self.url(path).ok()?;
        self.cookie_for(&url, name)
    }

    fn cookie_for(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.jar.cookies(url)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    /// Adds a cookie as if the server had set it on the base URL.
    pub fn add_cookie(&self, cookie: &str) {
        self.jar.add_cookie_str(cookie, &self.base_url);
    }

    /// Returns true once the login sequence has cached the landing page.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.landing.is_some()
    }

    /// Returns the cached landing page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] if login has not completed.
    pub fn landing(&self) -> Result<&str> {
        self.landing.as_deref().ok_or(Error::NotAuthenticated)
    }

    pub(crate) fn set_landing(&mut self, html: String) {
        self.landing = Some(html);
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

    fn session() -> Session {
        let config = SiteConfig::challenge_keypad("https://bank.example.com/myaccount/").unwrap();
        Session::new(&config).unwrap()
    }

    #[test]
    fn test_named_cookie_accessor() {
        let session = session();
        session.add_cookie("DeviceToken=abc123; Path=/");
        session.add_cookie("JSESSIONID=xyz; Path=/");
        assert_eq!(session.cookie("DeviceToken").as_deref(), Some("abc123"));
        assert_eq!(session.cookie("JSESSIONID").as_deref(), Some("xyz"));
        assert_eq!(session.cookie("Missing"), None);
    }

    #[test]
    fn test_cookie_name_must_match_exactly() {
        let session = session();
        session.add_cookie("DeviceTokenOld=stale; Path=/");
        assert_eq!(session.cookie("DeviceToken"), None);
    }

    #[test]
    fn test_landing_requires_login() {
        let mut session = session();
        assert!(!session.is_authenticated());
        assert!(matches!(session.landing(), Err(Error::NotAuthenticated)));

        session.set_landing("<html></html>".into());
        assert!(session.is_authenticated());
        assert_eq!(session.landing().unwrap(), "<html></html>");
    }

    #[test]
    fn test_debug_omits_page_content() {
        let mut session = session();
        session.set_landing("<secret balance>".into());
        let debug = format!("{session:?}");
        assert!(debug.contains("authenticated: true"));
        assert!(!debug.contains("secret balance"));
    }
}
