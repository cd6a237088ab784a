//! Site configuration.
//!
//! The site has changed its login flow, endpoint paths and form fields
//! several times. Everything that varies between versions lives here as
//! data, so a new site version is a new [`SiteConfig`] rather than new code.
//!
//! Paths are resolved against [`SiteConfig::base_url`] with URL join rules:
//! relative paths append to a base ending in `/`, paths starting with `/`
//! replace the base path.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Timeframe value for a trailing-window export.
pub const TIMEFRAME_STANDARD: &str = "STANDARD";

/// Timeframe value for an explicit date-range export.
pub const TIMEFRAME_VARIABLE: &str = "VARIABLE";

/// Login flow variant.
///
/// Each variant is one historical shape of the site's login sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFlow {
    /// Identify, answer challenge questions, enter PIN on the keypad.
    #[default]
    ChallengeKeypad,
    /// Identify (with customer number), enter PIN on the keypad.
    DirectKeypad,
}

/// Where account balances come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalanceSource {
    /// Scrape balances from the landing page.
    #[default]
    Summary,
    /// Request a statement export per account and use its
    /// ledger/available balances.
    Statement {
        /// Trailing window for the statement request.
        days: u32,
    },
}

/// How explicit export dates are encoded in the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateEncoding {
    /// One field per date, `MM/DD/YYYY`.
    Combined {
        /// Start date field name.
        start_field: String,
        /// End date field name.
        end_field: String,
    },
    /// Separate `<prefix>Day`, `<prefix>Month`, `<prefix>Year` fields.
    Split {
        /// Prefix for the start date fields.
        start_prefix: String,
        /// Prefix for the end date fields.
        end_prefix: String,
    },
}

impl Default for DateEncoding {
    fn default() -> Self {
        Self::Combined {
            start_field: "startDate".into(),
            end_field: "endDate".into(),
        }
    }
}

/// Identify step form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyForm {
    /// Endpoint path.
    pub path: String,
    /// Field carrying the saver ID.
    pub identifier_field: String,
    /// Field carrying the customer number, for flows that send it here.
    pub customer_field: Option<String>,
    /// Fixed fields sent with every request.
    pub static_fields: Vec<(String, String)>,
}

impl Default for IdentifyForm {
    fn default() -> Self {
        Self {
            path: "INGDirect/login.vm".into(),
            identifier_field: "publicUserId".into(),
            customer_field: None,
            static_fields: vec![
                ("command".into(), "customerIdentify".into()),
                ("AuthenticationType".into(), "Primary".into()),
            ],
        }
    }
}

/// Challenge questions step form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeForm {
    /// Endpoint path (GET page, POST answers).
    pub path: String,
    /// Regex whose first capture group is a question key.
    pub question_pattern: String,
    /// Number of questions the page must present.
    pub expected_questions: usize,
    /// Field carrying the customer number.
    pub customer_field: String,
    /// Field carrying the device token.
    pub device_token_field: String,
    /// Cookie the device token is read from.
    pub device_cookie: String,
    /// Fixed fields sent with every request.
    pub static_fields: Vec<(String, String)>,
}

impl Default for ChallengeForm {
    fn default() -> Self {
        Self {
            path: "INGDirect/security_questions.vm".into(),
            question_pattern: r#""(AnswerQ[0-9.]+)span""#.into(),
            expected_questions: 2,
            customer_field: "TLSearchNum".into(),
            device_token_field: "DeviceToken".into(),
            device_cookie: "DeviceToken".into(),
            static_fields: vec![("command".into(), "processChallengeResponse".into())],
        }
    }
}

/// PIN entry step form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinForm {
    /// Endpoint path (GET keypad page, POST tokens).
    pub path: String,
    /// Regex whose first capture group is one keypad button's symbol.
    pub keypad_pattern: String,
    /// Field carrying the joined keypad tokens.
    pub token_field: String,
    /// Separator between keypad tokens.
    pub separator: String,
    /// The visible PIN field, always sent with `masked_pin`.
    pub pin_field: String,
    /// Placeholder sent in `pin_field` instead of the digits.
    pub masked_pin: String,
    /// Field carrying the saver ID, if the form repeats it.
    pub identifier_field: Option<String>,
    /// Fixed fields sent with every request.
    pub static_fields: Vec<(String, String)>,
}

impl Default for PinForm {
    fn default() -> Self {
        Self {
            path: "INGDirect/login_pin.vm".into(),
            keypad_pattern: r"addClick\('([^']+)'\)".into(),
            token_field: "hashedPIN".into(),
            separator: ",".into(),
            pin_field: "customerAuthenticationResponse.PIN".into(),
            masked_pin: "****".into(),
            identifier_field: Some("publicUserId".into()),
            static_fields: vec![("command".into(), "customerAuthenticate".into())],
        }
    }
}

/// Account summary page layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryLayout {
    /// Substring that marks a line as part of an account row.
    pub row_marker: String,
}

impl Default for SummaryLayout {
    fn default() -> Self {
        Self {
            row_marker: "acctRow".into(),
        }
    }
}

/// Export (download) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportForm {
    /// Endpoint path.
    pub path: String,
    /// Field carrying the account selector.
    pub account_field: String,
    /// Value selecting every account.
    pub all_accounts: String,
    /// Field carrying the timeframe (`STANDARD`/`VARIABLE`).
    pub timeframe_field: String,
    /// Field carrying the trailing day count.
    pub days_field: String,
    /// Encoding of explicit date ranges.
    pub date_encoding: DateEncoding,
    /// Fixed fields sent with every request.
    pub static_fields: Vec<(String, String)>,
}

impl Default for ExportForm {
    fn default() -> Self {
        Self {
            path: "download.qfx".into(),
            account_field: "account".into(),
            all_accounts: "ALL".into(),
            timeframe_field: "TIMEFRAME".into(),
            days_field: "FREQ".into(),
            date_encoding: DateEncoding::default(),
            static_fields: vec![("type".into(), "OFX".into())],
        }
    }
}

/// Complete description of one site version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Name for logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Base URL every path is resolved against.
    pub base_url: Url,
    /// Login flow variant.
    #[serde(default)]
    pub flow: LoginFlow,
    /// Page fetched first to prime cookies.
    #[serde(default = "default_login_page")]
    pub login_page: String,
    /// Identify step.
    #[serde(default)]
    pub identify: IdentifyForm,
    /// Challenge questions step.
    #[serde(default)]
    pub challenge: ChallengeForm,
    /// PIN step.
    #[serde(default)]
    pub pin: PinForm,
    /// Authenticated landing page.
    #[serde(default = "default_landing_page")]
    pub landing_page: String,
    /// Account summary layout.
    #[serde(default)]
    pub summary: SummaryLayout,
    /// Export endpoint.
    #[serde(default)]
    pub export: ExportForm,
    /// Balance strategy for the account catalog.
    #[serde(default)]
    pub balance_source: BalanceSource,
    /// Request timeout (transport default when absent). Written as
    /// `timeout_ms` in JSON.
    #[serde(default, rename = "timeout_ms", with = "millis")]
    pub timeout: Option<Duration>,
    /// User-Agent header.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_name() -> String {
    "custom".into()
}

fn default_login_page() -> String {
    "INGDirect/login.vm".into()
}

fn default_landing_page() -> String {
    "INGDirect/account_summary.vm".into()
}

impl SiteConfig {
    /// Creates a configuration for the current site: challenge questions
    /// followed by keypad PIN entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn challenge_keypad(base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            name: "challenge-keypad".into(),
            base_url: Url::parse(base_url.as_ref())?,
            flow: LoginFlow::ChallengeKeypad,
            login_page: default_login_page(),
            identify: IdentifyForm::default(),
            challenge: ChallengeForm::default(),
            pin: PinForm::default(),
            landing_page: default_landing_page(),
            summary: SummaryLayout::default(),
            export: ExportForm::default(),
            balance_source: BalanceSource::Summary,
            timeout: None,
            user_agent: None,
        })
    }

    /// Creates a configuration for the earlier site: the customer number is
    /// sent with the identifier and there are no challenge questions.
    /// Exports take split day/month/year date fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn direct_keypad(base_url: impl AsRef<str>) -> Result<Self> {
        let mut config = Self::challenge_keypad(base_url)?;
        config.name = "direct-keypad".into();
        config.flow = LoginFlow::DirectKeypad;
        config.identify.customer_field = Some("TLSearchNum".into());
        config.export.date_encoding = DateEncoding::Split {
            start_prefix: "start".into(),
            end_prefix: "end".into(),
        };
        Ok(config)
    }

    /// Loads and validates a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the configuration is
    /// invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the login flow.
    #[must_use]
    pub const fn with_flow(mut self, flow: LoginFlow) -> Self {
        self.flow = flow;
        self
    }

    /// Sets the balance strategy.
    #[must_use]
    pub const fn with_balance_source(mut self, source: BalanceSource) -> Self {
        self.balance_source = source;
        self
    }

    /// Sets the export date encoding.
    #[must_use]
    pub fn with_date_encoding(mut self, encoding: DateEncoding) -> Self {
        self.export.date_encoding = encoding;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Returns the request timeout, if configured.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolves a path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let paths = [
            ("login_page", &self.login_page),
            ("identify.path", &self.identify.path),
            ("pin.path", &self.pin.path),
            ("landing_page", &self.landing_page),
            ("export.path", &self.export.path),
        ];
        for (name, path) in paths {
            if path.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{name} is empty")));
            }
            self.url(path)?;
        }

        compile_pattern("pin.keypad_pattern", &self.pin.keypad_pattern)?;

        if self.flow == LoginFlow::ChallengeKeypad {
            if self.challenge.path.trim().is_empty() {
                return Err(Error::InvalidConfig("challenge.path is empty".into()));
            }
            if self.challenge.expected_questions == 0 {
                return Err(Error::InvalidConfig(
                    "challenge.expected_questions must be at least 1".into(),
                ));
            }
            compile_pattern("challenge.question_pattern", &self.challenge.question_pattern)?;
        }

        if self.summary.row_marker.is_empty() {
            return Err(Error::InvalidConfig("summary.row_marker is empty".into()));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::InvalidConfig("timeout must be greater than zero".into()));
        }
        if let BalanceSource::Statement { days: 0 } = self.balance_source {
            return Err(Error::InvalidConfig(
                "balance_source.days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Optional durations as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Compiles a configured pattern that must have at least one capture group.
pub(crate) fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern)
        .map_err(|e| Error::InvalidConfig(format!("{name} is not a valid regex: {e}")))?;
    if regex.captures_len() < 2 {
        return Err(Error::InvalidConfig(format!(
            "{name} needs a capture group"
        )));
    }
    Ok(regex)
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

    #[test]
    fn test_challenge_keypad_preset() {
        let config = SiteConfig::challenge_keypad("https://bank.example.com/myaccount/").unwrap();
        assert_eq!(config.flow, LoginFlow::ChallengeKeypad);
        assert_eq!(config.challenge.expected_questions, 2);
        config.validate().unwrap();
        assert_eq!(
            config.url(&config.landing_page).unwrap().as_str(),
            "https://bank.example.com/myaccount/INGDirect/account_summary.vm"
        );
    }

    #[test]
    fn test_direct_keypad_preset() {
        let config = SiteConfig::direct_keypad("https://bank.example.com/myaccount/").unwrap();
        assert_eq!(config.flow, LoginFlow::DirectKeypad);
        assert_eq!(config.identify.customer_field.as_deref(), Some("TLSearchNum"));
        assert!(matches!(config.export.date_encoding, DateEncoding::Split { .. }));
        config.validate().unwrap();
    }

    #[test]
    fn test_from_json_minimal() {
        let config = SiteConfig::from_json(r#"{ "base_url": "https://bank.example.com/" }"#).unwrap();
        assert_eq!(config.name, "custom");
        assert_eq!(config.pin, PinForm::default());
        assert_eq!(config.balance_source, BalanceSource::Summary);
    }

    #[test]
    fn test_from_json_overrides() {
        let json = r#"{
            "base_url": "https://bank.example.com/",
            "flow": "direct_keypad",
            "balance_source": { "kind": "statement", "days": 7 },
            "export": {
                "path": "export.ofx",
                "date_encoding": { "kind": "split", "start_prefix": "from", "end_prefix": "to" }
            },
            "pin": { "separator": "" }
        }"#;
        let config = SiteConfig::from_json(json).unwrap();
        assert_eq!(config.flow, LoginFlow::DirectKeypad);
        assert_eq!(config.balance_source, BalanceSource::Statement { days: 7 });
        assert_eq!(config.export.path, "export.ofx");
        assert_eq!(config.export.days_field, "FREQ");
        assert_eq!(config.pin.separator, "");
        assert_eq!(config.pin.token_field, "hashedPIN");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut config = SiteConfig::challenge_keypad("https://bank.example.com/").unwrap();
        config.pin.keypad_pattern = "addClick".into();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.pin.keypad_pattern = "(unclosed".into();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_questions_rejected() {
        let mut config = SiteConfig::challenge_keypad("https://bank.example.com/").unwrap();
        config.challenge.expected_questions = 0;
        assert!(config.validate().is_err());

        // The direct flow never looks at the challenge form.
        let config = config.with_flow(LoginFlow::DirectKeypad);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_statement_days_must_be_positive() {
        let config = SiteConfig::challenge_keypad("https://bank.example.com/")
            .unwrap()
            .with_balance_source(BalanceSource::Statement { days: 0 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = SiteConfig::challenge_keypad("https://bank.example.com/")
            .unwrap()
            .with_timeout(Duration::from_secs(20))
            .with_user_agent("saverlink-test");
        assert_eq!(config.timeout(), Some(Duration::from_secs(20)));
        assert_eq!(config.user_agent.as_deref(), Some("saverlink-test"));
    }

    #[test]
    fn test_sub_second_timeout_is_kept() {
        let config = SiteConfig::challenge_keypad("https://bank.example.com/").unwrap();
        let short = config.clone().with_timeout(Duration::from_millis(500));
        assert_eq!(short.timeout(), Some(Duration::from_millis(500)));
        short.validate().unwrap();

        let long = config.with_timeout(Duration::from_millis(1500));
        assert_eq!(long.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_timeout_json() {
        let json = r#"{ "base_url": "https://bank.example.com/", "timeout_ms": 750 }"#;
        let config = SiteConfig::from_json(json).unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_millis(750)));

        let written = serde_json::to_string(&config).unwrap();
        assert!(written.contains("\"timeout_ms\":750"));
        assert_eq!(SiteConfig::from_json(&written).unwrap(), config);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let json = r#"{ "base_url": "https://bank.example.com/", "timeout_ms": 0 }"#;
        assert!(matches!(
            SiteConfig::from_json(json),
            Err(Error::InvalidConfig(_))
        ));
        let config = SiteConfig::challenge_keypad("https://bank.example.com/")
            .unwrap()
            .with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
