//! The login state machine.
//!
//! Login is a fixed, linear sequence of HTTP exchanges. Each stage consumes
//! what the previous one produced (cookies, the device token, a keypad layout
//! fetched on the PIN page itself), so stages run strictly in order and the
//! first failure aborts the whole sequence. Nothing is retried: repeated
//! attempts against a bank login risk locking the account.
//!
//! ```text
//! Init ──→ Identify ──→ Challenge ──→ Pin ──→ Landing      (ChallengeKeypad)
//! Init ──→ Identify ─────────────────→ Pin ──→ Landing      (DirectKeypad)
//! ```

mod challenge;

pub use challenge::QuestionScanner;

use reqwest::Response;
use tracing::{debug, info, warn};

use crate::config::{LoginFlow, SiteConfig};
use crate::credentials::Credentials;
use crate::error::{Error, FailureReason, LoginStage, Result};
use crate::keypad::KeypadMapper;
use crate::session::Session;

impl LoginFlow {
    /// Returns the stages this flow runs, in order.
    #[must_use]
    pub const fn stages(self) -> &'static [LoginStage] {
        match self {
            Self::ChallengeKeypad => &[
                LoginStage::Init,
                LoginStage::Identify,
                LoginStage::Challenge,
                LoginStage::Pin,
                LoginStage::Landing,
            ],
            Self::DirectKeypad => &[
                LoginStage::Init,
                LoginStage::Identify,
                LoginStage::Pin,
                LoginStage::Landing,
            ],
        }
    }
}

/// Runs the configured login flow against a session.
#[derive(Debug)]
pub struct SessionAuthenticator<'a> {
    config: &'a SiteConfig,
    keypad: KeypadMapper,
    questions: Option<QuestionScanner>,
}

impl<'a> SessionAuthenticator<'a> {
    /// Creates an authenticator for a site configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured pattern is invalid.
    pub fn new(config: &'a SiteConfig) -> Result<Self> {
        let questions = if config.flow.stages().contains(&LoginStage::Challenge) {
            Some(QuestionScanner::new(&config.challenge.question_pattern)?)
        } else {
            None
        };
        Ok(Self {
            config,
            keypad: KeypadMapper::new(&config.pin.keypad_pattern)?,
            questions,
        })
    }

    /// Logs in, caching the landing page in the session on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] before any request if the
    /// credentials are unusable, otherwise the first stage failure.
    pub async fn authenticate(&self, session: &mut Session, credentials: &Credentials) -> Result<()> {
        credentials.validate().map_err(Error::InvalidCredentials)?;

        info!("Logging in to {} ({:?} flow)", self.config.name, self.config.flow);
        for &stage in self.config.flow.stages() {
            debug!("Login stage: {stage}");
            if let Err(e) = self.run(stage, session, credentials).await {
                warn!("Login aborted at {stage} stage: {e}");
                return Err(e);
            }
        }
        info!("Logged in to {}", self.config.name);
        Ok(())
    }

    async fn run(&self, stage: LoginStage, session: &mut Session, credentials: &Credentials) -> Result<()> {
        match stage {
            LoginStage::Init => {
                self.init(session).await;
                Ok(())
            }
            LoginStage::Identify => self.identify(session, credentials).await,
            LoginStage::Challenge => self.answer_challenge(session, credentials).await,
            LoginStage::Pin => self.enter_pin(session, credentials).await,
            LoginStage::Landing => self.land(session).await,
        }
    }

    /// Primes cookies. Failure is only logged: if the cookies mattered,
    /// identify fails and reports it.
    async fn init(&self, session: &Session) {
        match session.get(&self.config.login_page).await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!("Login page returned {}", response.status()),
            Err(e) => warn!("Login page request failed: {e}"),
        }
    }

    async fn identify(&self, session: &Session, credentials: &Credentials) -> Result<()> {
        let form = &self.config.identify;
        let mut fields = form.static_fields.clone();
        fields.push((form.identifier_field.clone(), credentials.saver_id().to_string()));
        if let Some(customer_field) = &form.customer_field {
            fields.push((customer_field.clone(), credentials.customer_number().to_string()));
        }

        let response = session
            .post_form(&form.path, &fields)
            .await
            .map_err(at_stage(LoginStage::Identify))?;
        expect_redirect(LoginStage::Identify, &response)
    }

    async fn answer_challenge(&self, session: &Session, credentials: &Credentials) -> Result<()> {
        let form = &self.config.challenge;
        let Some(scanner) = &self.questions else {
            return Err(Error::InvalidConfig(
                "challenge stage without a question pattern".into(),
            ));
        };

        let page = fetch_page(session, LoginStage::Challenge, &form.path).await?;
        let keys = scanner.scan(&page);
        debug!("Challenge page presents {} question(s)", keys.len());
        let answers = challenge::answer_questions(&keys, form.expected_questions, credentials)?;

        let device_token = session.cookie_at(&form.path, &form.device_cookie);
        if device_token.is_none() {
            debug!("No {} cookie; sending an empty device token", form.device_cookie);
        }

        let mut fields = form.static_fields.clone();
        fields.extend(answers);
        fields.push((form.customer_field.clone(), credentials.customer_number().to_string()));
        fields.push((form.device_token_field.clone(), device_token.unwrap_or_default()));

        let response = session
            .post_form(&form.path, &fields)
            .await
            .map_err(at_stage(LoginStage::Challenge))?;
        expect_redirect(LoginStage::Challenge, &response)
    }

    async fn enter_pin(&self, session: &Session, credentials: &Credentials) -> Result<()> {
        let form = &self.config.pin;

        // The layout is shuffled per visit: decode from this page only.
        let page = fetch_page(session, LoginStage::Pin, &form.path).await?;
        let mapping = self.keypad.decode(&page).map_err(at_stage(LoginStage::Pin))?;
        let tokens = mapping
            .translate(credentials.pin())
            .map_err(at_stage(LoginStage::Pin))?;

        let mut fields = form.static_fields.clone();
        if let Some(identifier_field) = &form.identifier_field {
            fields.push((identifier_field.clone(), credentials.saver_id().to_string()));
        }
        fields.push((form.pin_field.clone(), form.masked_pin.clone()));
        fields.push((form.token_field.clone(), tokens.join(&form.separator)));

        let response = session
            .post_form(&form.path, &fields)
            .await
            .map_err(at_stage(LoginStage::Pin))?;
        expect_redirect(LoginStage::Pin, &response)
    }

    async fn land(&self, session: &mut Session) -> Result<()> {
        let page = fetch_page(session, LoginStage::Landing, &self.config.landing_page).await?;
        debug!("Landing page cached ({} bytes)", page.len());
        session.set_landing(page);
        Ok(())
    }
}

/// GETs a page that must answer with success and returns its body.
async fn fetch_page(session: &Session, stage: LoginStage, path: &str) -> Result<String> {
    let response = session.get(path).await.map_err(at_stage(stage))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::login_failed(stage, FailureReason::UnexpectedStatus(status)));
    }
    response
        .text()
        .await
        .map_err(|e| Error::login_failed(stage, FailureReason::Transport(e.to_string())))
}

fn expect_redirect(stage: LoginStage, response: &Response) -> Result<()> {
    let status = response.status();
    if status.is_redirection() {
        Ok(())
    } else {
        Err(Error::login_failed(stage, FailureReason::UnexpectedStatus(status)))
    }
}

/// Tags transport and decode errors with the stage they happened in.
fn at_stage(stage: LoginStage) -> impl FnOnce(Error) -> Error {
    move |err| match err {
        Error::Http(e) => Error::login_failed(stage, FailureReason::Transport(e.to_string())),
        Error::Decode(e) => Error::login_failed(stage, FailureReason::Decode(e)),
        other => other,
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
    use crate::error::DecodeError;

    #[test]
    fn test_flow_stages() {
        assert_eq!(LoginFlow::ChallengeKeypad.stages().len(), 5);
        assert!(!LoginFlow::DirectKeypad.stages().contains(&LoginStage::Challenge));
        for flow in [LoginFlow::ChallengeKeypad, LoginFlow::DirectKeypad] {
            assert_eq!(flow.stages().first(), Some(&LoginStage::Init));
            assert_eq!(flow.stages().last(), Some(&LoginStage::Landing));
        }
    }

    #[test]
    fn test_direct_flow_skips_question_scanner() {
        let mut config = SiteConfig::direct_keypad("https://bank.example.com/").unwrap();
        config.challenge.question_pattern = "(unclosed".into();
        assert!(SessionAuthenticator::new(&config).is_ok());

        let config = config.with_flow(LoginFlow::ChallengeKeypad);
        assert!(SessionAuthenticator::new(&config).is_err());
    }

    #[test]
    fn test_decode_errors_carry_stage() {
        let err = at_stage(LoginStage::Pin)(DecodeError::KeypadTooShort { found: 9 }.into());
        assert_eq!(err.stage(), Some(LoginStage::Pin));
        assert!(matches!(
            err,
            Error::LoginFailed {
                reason: FailureReason::Decode(DecodeError::KeypadTooShort { found: 9 }),
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Login failed at pin stage: keypad has 9 buttons, expected 10"
        );

        let err = at_stage(LoginStage::Pin)(Error::NotAuthenticated);
        assert_eq!(err.stage(), None);
    }

    #[tokio::test]
    async fn test_invalid_credentials_send_nothing() {
        // Unroutable base: any request would fail with a transport error.
        let config = SiteConfig::challenge_keypad("http://127.0.0.1:9/").unwrap();
        let mut session = Session::new(&config).unwrap();
        let authenticator = SessionAuthenticator::new(&config).unwrap();
        let creds = Credentials::new("12345678", "987654", "12ab");

        let err = authenticator.authenticate(&mut session, &creds).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)));
        assert!(!session.is_authenticated());
    }
}
