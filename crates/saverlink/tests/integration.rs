//! Integration tests for the site client.
//!
//! These tests run the full login sequence and exports against a mock HTTP
//! server serving canned pages from `tests/fixtures`.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::str::FromStr;

use rust_decimal::Decimal;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use saverlink::{
    AccountSelector, BalanceSource, Client, Credentials, DateRange, DecodeError, Error,
    FailureReason, LoginStage, SiteConfig,
};

const SECURITY_QUESTIONS: &str = include_str!("fixtures/security_questions.html");
const LOGIN_PIN: &str = include_str!("fixtures/login_pin.html");
const ACCOUNT_SUMMARY: &str = include_str!("fixtures/account_summary.html");
const STATEMENT: &str = include_str!("fixtures/statement.qfx");

const LOGIN: &str = "/myaccount/INGDirect/login.vm";
const CHALLENGE: &str = "/myaccount/INGDirect/security_questions.vm";
const PIN: &str = "/myaccount/INGDirect/login_pin.vm";
const LANDING: &str = "/myaccount/INGDirect/account_summary.vm";
const DOWNLOAD: &str = "/myaccount/download.qfx";

fn credentials() -> Credentials {
    Credentials::new("12345678", "987654", "2468")
        .with_answer("AnswerQ1.4", "1950")
        .with_answer("AnswerQ2.8", "Rex")
}

fn config(server: &MockServer) -> SiteConfig {
    SiteConfig::challenge_keypad(format!("{}/myaccount/", server.uri())).unwrap()
}

fn redirect() -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", "/myaccount/next")
}

fn page(html: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "text/html")
        .set_body_string(html)
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Mounts the login pages. The `failing` stage answers with a wrong status
/// and every later stage expects no requests. A failing init page still lets
/// the sequence continue.
async fn mount_login(server: &MockServer, failing: Option<LoginStage>) {
    let order = [
        LoginStage::Identify,
        LoginStage::Challenge,
        LoginStage::Pin,
        LoginStage::Landing,
    ];
    let failing_at = failing.and_then(|stage| order.iter().position(|s| *s == stage));
    let hits = |stage: LoginStage| {
        let index = order.iter().position(|s| *s == stage).unwrap();
        match failing_at {
            Some(at) if index > at => 0,
            _ => 1,
        }
    };
    let post_reply = |stage: LoginStage| {
        if failing == Some(stage) {
            page("<html>Please try again</html>")
        } else {
            redirect()
        }
    };

    let login_page = if failing == Some(LoginStage::Init) {
        ResponseTemplate::new(503)
    } else {
        page("<html>Sign in</html>").insert_header("Set-Cookie", "DeviceToken=dev-token-123; Path=/")
    };
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(login_page)
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(post_reply(LoginStage::Identify))
        .expect(hits(LoginStage::Identify))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(page(SECURITY_QUESTIONS))
        .expect(hits(LoginStage::Challenge))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(CHALLENGE))
        .respond_with(post_reply(LoginStage::Challenge))
        .expect(hits(LoginStage::Challenge))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(PIN))
        .respond_with(page(LOGIN_PIN))
        .expect(hits(LoginStage::Pin))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(PIN))
        .respond_with(post_reply(LoginStage::Pin))
        .expect(hits(LoginStage::Pin))
        .mount(server)
        .await;

    let landing = if failing == Some(LoginStage::Landing) {
        ResponseTemplate::new(500)
    } else {
        page(ACCOUNT_SUMMARY)
    };
    Mock::given(method("GET"))
        .and(path(LANDING))
        .respond_with(landing)
        .expect(hits(LoginStage::Landing))
        .mount(server)
        .await;
}

async fn body_of(server: &MockServer, verb: &str, target: &str) -> String {
    let requests = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .find(|r| r.method.as_str() == verb && r.url.path() == target)
        .unwrap();
    String::from_utf8(request.body.clone()).unwrap()
}

#[tokio::test]
async fn test_login_success() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;

    let client = Client::connect(config(&server), &credentials()).await.unwrap();
    assert!(client.session().is_authenticated());
    assert_eq!(client.cookie("DeviceToken").as_deref(), Some("dev-token-123"));
    assert!(client.landing_page().unwrap().contains("acctRow"));

    let identify = body_of(&server, "POST", LOGIN).await;
    assert!(identify.contains("command=customerIdentify"));
    assert!(identify.contains("publicUserId=12345678"));

    let challenge = body_of(&server, "POST", CHALLENGE).await;
    assert!(challenge.contains("AnswerQ1.4=1950"));
    assert!(challenge.contains("AnswerQ2.8=Rex"));
    assert!(challenge.contains("TLSearchNum=987654"));
    assert!(challenge.contains("DeviceToken=dev-token-123"));

    let pin = body_of(&server, "POST", PIN).await;
    assert!(pin.contains("hashedPIN=ZX%2CPL%2CRT%2CCD"));
    assert!(pin.contains("customerAuthenticationResponse.PIN=****"));
    assert!(!pin.contains("2468"));
}

#[tokio::test]
async fn test_each_stage_failure_stops_the_sequence() {
    for stage in [
        LoginStage::Identify,
        LoginStage::Challenge,
        LoginStage::Pin,
        LoginStage::Landing,
    ] {
        let server = MockServer::start().await;
        mount_login(&server, Some(stage)).await;

        let err = Client::connect(config(&server), &credentials())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(stage), "{err}");
        assert!(matches!(
            err,
            Error::LoginFailed {
                reason: FailureReason::UnexpectedStatus(_),
                ..
            }
        ));
        server.verify().await;
    }
}

#[tokio::test]
async fn test_init_failure_is_not_fatal() {
    let server = MockServer::start().await;
    mount_login(&server, Some(LoginStage::Init)).await;

    let client = Client::connect(config(&server), &credentials()).await.unwrap();
    assert!(client.session().is_authenticated());
    assert_eq!(client.cookie("DeviceToken"), None);
    let challenge = body_of(&server, "POST", CHALLENGE).await;
    assert!(challenge.ends_with("DeviceToken="));
}

#[tokio::test]
async fn test_question_mismatch() {
    let server = MockServer::start().await;
    let one_question = SECURITY_QUESTIONS
        .lines()
        .filter(|line| !line.contains("AnswerQ2.8"))
        .collect::<Vec<_>>()
        .join("\n");
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(page(&one_question))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(page("<html>Sign in</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(redirect())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHALLENGE))
        .respond_with(redirect())
        .expect(0)
        .mount(&server)
        .await;

    let err = Client::connect(config(&server), &credentials())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::LoginFailed {
            stage: LoginStage::Challenge,
            reason: FailureReason::QuestionMismatch {
                expected: 2,
                found: 1
            }
        }
    ));
}

#[tokio::test]
async fn test_short_keypad_stops_before_pin_post() {
    let server = MockServer::start().await;
    let nine_buttons = LOGIN_PIN
        .lines()
        .filter(|line| !line.contains("pinpad/0.gif"))
        .collect::<Vec<_>>()
        .join("\n");

    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(page("<html>Sign in</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(redirect())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(page(SECURITY_QUESTIONS))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHALLENGE))
        .respond_with(redirect())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PIN))
        .respond_with(page(&nine_buttons))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PIN))
        .respond_with(redirect())
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LANDING))
        .respond_with(page(ACCOUNT_SUMMARY))
        .expect(0)
        .mount(&server)
        .await;

    let err = Client::connect(config(&server), &credentials())
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(LoginStage::Pin), "{err}");
    assert!(matches!(
        err,
        Error::LoginFailed {
            reason: FailureReason::Decode(DecodeError::KeypadTooShort { found: 9 }),
            ..
        }
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_direct_keypad_flow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(page("<html>Sign in</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string_contains("TLSearchNum=987654"))
        .respond_with(redirect())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path(CHALLENGE))
        .respond_with(redirect())
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PIN))
        .respond_with(page(LOGIN_PIN))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PIN))
        .and(body_string_contains("hashedPIN=ZX%2CPL%2CRT%2CCD"))
        .respond_with(redirect())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LANDING))
        .respond_with(page(ACCOUNT_SUMMARY))
        .mount(&server)
        .await;

    let config = SiteConfig::direct_keypad(format!("{}/myaccount/", server.uri())).unwrap();
    let mut client = Client::connect(config, &Credentials::new("12345678", "987654", "2468"))
        .await
        .unwrap();
    assert_eq!(client.accounts().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_accounts_from_summary() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;

    let mut client = Client::connect(config(&server), &credentials()).await.unwrap();
    let accounts = client.accounts().await.unwrap();
    assert_eq!(
        accounts.keys().collect::<Vec<_>>(),
        ["12345678", "55550000", "87654321"]
    );
    assert_eq!(accounts["12345678"].ledger, dec("1234.56"));
    assert_eq!(accounts["87654321"].ledger, dec("-15.25"));
    assert_eq!(accounts["55550000"].nickname, "House Deposit");

    // The landing page is cached; listing again sends nothing.
    let again = client.accounts().await.unwrap();
    assert_eq!(accounts, again);
}

#[tokio::test]
async fn test_accounts_from_statements() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;
    Mock::given(method("POST"))
        .and(path(DOWNLOAD))
        .and(body_string_contains("TIMEFRAME=STANDARD"))
        .and(body_string_contains("FREQ=7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STATEMENT))
        .expect(3)
        .mount(&server)
        .await;

    let config = config(&server).with_balance_source(BalanceSource::Statement { days: 7 });
    let mut client = Client::connect(config, &credentials()).await.unwrap();
    let accounts = client.accounts().await.unwrap();
    assert_eq!(accounts.len(), 3);
    for account in accounts.values() {
        assert_eq!(account.ledger, dec("1192.57"));
        assert_eq!(account.available, dec("1150.00"));
    }
}

#[tokio::test]
async fn test_export_form_and_transactions() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;
    Mock::given(method("POST"))
        .and(path(DOWNLOAD))
        .and(body_string_contains("type=OFX"))
        .and(body_string_contains("account=12345678"))
        .and(body_string_contains("TIMEFRAME=STANDARD"))
        .and(body_string_contains("FREQ=30"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STATEMENT))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = Client::connect(config(&server), &credentials()).await.unwrap();
    let transactions = client.recent_transactions("12345678", 30).await.unwrap();
    assert_eq!(transactions.len(), 2);

    let coffee = &transactions[0];
    assert_eq!(coffee.id, "2020031501");
    assert_eq!(coffee.amount.to_string(), "-42.50");
    assert_eq!(coffee.date.to_string(), "2020-03-15");
    assert_eq!(coffee.payee, "Coffee Shop");

    let interest = &transactions[1];
    assert_eq!(interest.amount.to_string(), "1.07");
    assert_eq!(interest.payee, "Interest Paid");
}

#[tokio::test]
async fn test_export_in_declared_charset() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;
    let (head, tail) = STATEMENT.split_once("Coffee Shop").unwrap();
    let mut body = head.as_bytes().to_vec();
    body.extend_from_slice(b"Caf\xE9 Shop");
    body.extend_from_slice(tail.as_bytes());
    Mock::given(method("POST"))
        .and(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = Client::connect(config(&server), &credentials()).await.unwrap();
    let transactions = client.recent_transactions("12345678", 30).await.unwrap();
    assert_eq!(transactions[0].payee, "Café Shop");
}

#[tokio::test]
async fn test_export_date_range() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;
    Mock::given(method("POST"))
        .and(path(DOWNLOAD))
        .and(body_string_contains("account=ALL"))
        .and(body_string_contains("TIMEFRAME=VARIABLE"))
        .and(body_string_contains("startDate=01%2F01%2F2020"))
        .and(body_string_contains("endDate=02%2F01%2F2020"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STATEMENT))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = Client::connect(config(&server), &credentials()).await.unwrap();
    let range = DateRange::between(
        chrono::NaiveDate::from_ymd_opt(2020, 1, 1),
        chrono::NaiveDate::from_ymd_opt(2020, 2, 1),
    );
    let body = client.export(&AccountSelector::All, &range).await.unwrap();
    assert!(body.starts_with(b"OFXHEADER"));
}

#[tokio::test]
async fn test_export_failure_status() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;
    Mock::given(method("POST"))
        .and(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = Client::connect(config(&server), &credentials()).await.unwrap();
    let err = client
        .export(&AccountSelector::All, &DateRange::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DownloadFailed { status } if status.as_u16() == 500));
}

#[tokio::test]
async fn test_invalid_range_sends_nothing() {
    let server = MockServer::start().await;
    mount_login(&server, None).await;
    Mock::given(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = Client::connect(config(&server), &credentials()).await.unwrap();
    let err = client
        .transactions(&AccountSelector::All, &DateRange::trailing(0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRange(_)));
}
