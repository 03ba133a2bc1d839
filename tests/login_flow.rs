use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opaitokens::oauth::{generate_pkce_with, Authenticator, Identity, TokenCache};
use opaitokens::OpaiError;

mod common;

use common::http_mock::{self, callback_with, AUTH_CODE, STATE};

const EMAIL: &str = "user@example.com";

fn authenticator(server: &MockServer, identity: Identity) -> Authenticator {
    Authenticator::new(identity).with_endpoints(common::mock_endpoints(&server.uri()))
}

#[tokio::test]
async fn full_login_returns_token_and_refresh_token() {
    let server = MockServer::start().await;
    http_mock::mount_full_login(&server).await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let before = Utc::now();
    let cred = auth.access_token(true).await.unwrap();

    assert_eq!(cred.access_token, "tok");
    assert_eq!(cred.refresh_token, "ref");
    assert_eq!(auth.refresh_token(), "ref");

    let ttl = (cred.expires_at - before).num_seconds();
    assert!((86_000..=86_100).contains(&ttl), "unexpected ttl {ttl}");

    assert_eq!(
        http_mock::request_paths(&server).await,
        vec![
            "GET /auth/preauth",
            "GET /authorize",
            "GET /u/login/identifier",
            "POST /u/login/identifier",
            "POST /u/login/password",
            "GET /authorize/resume",
            "POST /oauth/token",
        ]
    );
}

#[tokio::test]
async fn hour_long_token_expires_five_minutes_early() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(&server, STATE, &callback_with(&format!("code={AUTH_CODE}"))).await;
    http_mock::mount_token(
        &server,
        200,
        serde_json::json!({
            "access_token": "tok",
            "refresh_token": "ref",
            "expires_in": 3600
        }),
    )
    .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let before = Utc::now();
    let cred = auth.access_token(false).await.unwrap();
    let after = Utc::now();

    assert!(cred.expires_at >= before + chrono::Duration::minutes(55));
    assert!(cred.expires_at <= after + chrono::Duration::minutes(55));
    assert!(!cred.is_expired());
}

#[tokio::test]
async fn extreme_expires_in_is_a_classified_error() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(&server, STATE, &callback_with(&format!("code={AUTH_CODE}"))).await;
    http_mock::mount_token(
        &server,
        200,
        serde_json::json!({ "access_token": "tok", "expires_in": i64::MAX }),
    )
    .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let err = auth.access_token(false).await.unwrap_err();
    assert!(matches!(err, OpaiError::DecodeFailed { .. }));
    assert!(auth.cache().get(EMAIL).is_none());
}

#[tokio::test]
async fn cached_token_skips_the_network() {
    let server = MockServer::start().await;
    http_mock::mount_full_login(&server).await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let first = auth.access_token(true).await.unwrap();
    let seen = http_mock::request_paths(&server).await.len();

    let second = auth.access_token(true).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(http_mock::request_paths(&server).await.len(), seen);
}

#[tokio::test]
async fn shared_cache_serves_other_authenticators() {
    let server = MockServer::start().await;
    http_mock::mount_full_login(&server).await;
    let cache = TokenCache::new();

    let mut first = authenticator(&server, Identity::new(EMAIL, "pw")).with_cache(cache.clone());
    first.access_token(true).await.unwrap();
    let seen = http_mock::request_paths(&server).await.len();

    let mut second = authenticator(&server, Identity::new(EMAIL, "pw")).with_cache(cache);
    let cred = second.access_token(true).await.unwrap();
    assert_eq!(cred.access_token, "tok");
    assert_eq!(http_mock::request_paths(&server).await.len(), seen);
}

#[tokio::test]
async fn disabling_the_cache_runs_a_fresh_flow() {
    let server = MockServer::start().await;
    http_mock::mount_full_login(&server).await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    auth.access_token(true).await.unwrap();
    let seen = http_mock::request_paths(&server).await.len();

    auth.access_token(false).await.unwrap();
    assert_eq!(http_mock::request_paths(&server).await.len(), seen * 2);
}

#[tokio::test]
async fn session_cookie_is_sent_on_later_steps() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/u/login/identifier"))
        .and(header("cookie", "auth0=sess1"))
        .respond_with(ResponseTemplate::new(302))
        .expect(1)
        .mount(&server)
        .await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(&server, STATE, &callback_with(&format!("code={AUTH_CODE}"))).await;
    http_mock::mount_token(&server, 200, http_mock::token_body()).await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    auth.access_token(false).await.unwrap();
}

#[tokio::test]
async fn authorize_request_carries_pkce_challenge() {
    let server = MockServer::start().await;
    let expected = generate_pkce_with(&mut StdRng::seed_from_u64(7));

    http_mock::mount_preauth(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .and(query_param("code_challenge", expected.code_challenge.as_str()))
        .and(query_param("code_challenge_method", "S256"))
        .and(query_param("prompt", "login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("/u/login/identifier?state={STATE}").as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(&server, STATE, &callback_with(&format!("code={AUTH_CODE}"))).await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains(format!("code_verifier={}", expected.code_verifier)))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(http_mock::token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"))
        .with_rng(StdRng::seed_from_u64(7));
    auth.access_token(false).await.unwrap();
}

#[tokio::test]
async fn auth_for_code_skips_token_exchange() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(&server, STATE, &callback_with(&format!("code={AUTH_CODE}"))).await;
    Mock::given(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let expected = generate_pkce_with(&mut StdRng::seed_from_u64(42));
    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"))
        .with_rng(StdRng::seed_from_u64(42));
    let code = auth.auth_for_code().await.unwrap();

    assert_eq!(code.code, AUTH_CODE);
    assert_eq!(code.to_string(), format!("{}|{AUTH_CODE}", expected.code_verifier));
}

#[tokio::test]
async fn wrong_password_stops_before_resume() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password(&server, ResponseTemplate::new(400)).await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "wrong"));
    let err = auth.access_token(false).await.unwrap_err();
    assert!(matches!(err, OpaiError::WrongCredentials));
    assert!(!err.is_retryable());

    let paths = http_mock::request_paths(&server).await;
    assert_eq!(paths.last().map(String::as_str), Some("POST /u/login/password"));
    assert!(!paths.iter().any(|p| p.contains("/authorize/resume") || p.contains("/oauth/token")));
}

#[tokio::test]
async fn unexpected_password_redirect_is_login_failure() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password(
        &server,
        ResponseTemplate::new(302).insert_header("Location", "/u/login/blocked"),
    )
    .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    match auth.access_token(false).await.unwrap_err() {
        OpaiError::LoginFailed { status, location } => {
            assert_eq!(status, 302);
            assert_eq!(location.as_deref(), Some("/u/login/blocked"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_identifier_reports_status() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 400).await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let err = auth.access_token(false).await.unwrap_err();
    assert!(matches!(err, OpaiError::IdentifierRejected { status: 400 }));
}

#[tokio::test]
async fn preauth_failure_is_retryable() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 500).await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let err = auth.access_token(false).await.unwrap_err();
    assert!(matches!(err, OpaiError::PreauthFailed { status: 500, .. }));
    assert!(err.is_retryable());
    assert_eq!(http_mock::request_paths(&server).await, vec!["GET /auth/preauth"]);
}

#[tokio::test]
async fn mfa_challenge_without_code_requires_mfa() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(&server, STATE, "/u/mfa-otp-challenge?state=mfa1").await;
    Mock::given(method("POST"))
        .and(path("/u/mfa-otp-challenge"))
        .respond_with(ResponseTemplate::new(302))
        .expect(0)
        .mount(&server)
        .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let err = auth.access_token(false).await.unwrap_err();
    assert!(matches!(err, OpaiError::MfaRequired));
    assert!(err.needs_mfa());
}

async fn mount_mfa_login(server: &MockServer, mfa_response: ResponseTemplate) {
    http_mock::mount_preauth(server, 200).await;
    http_mock::mount_login_page(server).await;
    http_mock::mount_identifier(server, 302).await;
    http_mock::mount_password_ok(server).await;
    http_mock::mount_resume(server, STATE, "/u/mfa-otp-challenge?state=mfa1").await;
    Mock::given(method("POST"))
        .and(path("/u/mfa-otp-challenge"))
        .and(query_param("state", "mfa1"))
        .and(body_string_contains("state=mfa1"))
        .and(body_string_contains("code=123456"))
        .respond_with(mfa_response)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn mfa_code_completes_login() {
    let server = MockServer::start().await;
    mount_mfa_login(
        &server,
        ResponseTemplate::new(302).insert_header("Location", "/authorize/resume?state=st2"),
    )
    .await;
    http_mock::mount_resume(&server, "st2", &callback_with(&format!("code={AUTH_CODE}"))).await;
    http_mock::mount_token(&server, 200, http_mock::token_body()).await;

    let identity = Identity::new(EMAIL, "pw").with_mfa_code("123456");
    let mut auth = authenticator(&server, identity);
    let cred = auth.access_token(false).await.unwrap();
    assert_eq!(cred.access_token, "tok");
}

#[tokio::test]
async fn wrong_mfa_code_is_reported() {
    let server = MockServer::start().await;
    mount_mfa_login(&server, ResponseTemplate::new(400)).await;

    let identity = Identity::new(EMAIL, "pw").with_mfa_code("123456");
    let mut auth = authenticator(&server, identity);
    let err = auth.access_token(false).await.unwrap_err();
    assert!(matches!(err, OpaiError::WrongMfaCode));
    assert!(err.needs_mfa());
}

#[tokio::test]
async fn repeated_mfa_challenge_fails_instead_of_looping() {
    let server = MockServer::start().await;
    mount_mfa_login(
        &server,
        ResponseTemplate::new(302).insert_header("Location", "/authorize/resume?state=st2"),
    )
    .await;
    http_mock::mount_resume(&server, "st2", "/u/mfa-otp-challenge?state=mfa2").await;

    let identity = Identity::new(EMAIL, "pw").with_mfa_code("123456");
    let mut auth = authenticator(&server, identity);
    let err = auth.access_token(false).await.unwrap_err();
    assert!(matches!(err, OpaiError::LoginCallbackFailed { status: 302, .. }));
}

#[tokio::test]
async fn provider_error_in_callback() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(
        &server,
        STATE,
        &callback_with("error=access_denied&error_description=consent%20required"),
    )
    .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    match auth.access_token(false).await.unwrap_err() {
        OpaiError::ProviderError { code, description } => {
            assert_eq!(code, "access_denied");
            assert_eq!(description, "consent required");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_code_exchange_surfaces_body() {
    let server = MockServer::start().await;
    http_mock::mount_preauth(&server, 200).await;
    http_mock::mount_login_page(&server).await;
    http_mock::mount_identifier(&server, 302).await;
    http_mock::mount_password_ok(&server).await;
    http_mock::mount_resume(&server, STATE, &callback_with(&format!("code={AUTH_CODE}"))).await;
    http_mock::mount_token(
        &server,
        403,
        serde_json::json!({ "error": "invalid_grant" }),
    )
    .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    match auth.access_token(false).await.unwrap_err() {
        OpaiError::TokenExchangeFailed { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(auth.cache().get(EMAIL).is_none());
}

#[tokio::test]
async fn refresh_keeps_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-ref"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = authenticator(&server, Identity::new(EMAIL, "pw"));
    let cred = auth.refresh_access_token("old-ref").await.unwrap();
    assert_eq!(cred.access_token, "fresh");
    assert_eq!(cred.refresh_token, "old-ref");
    assert_eq!(auth.cache().get_valid(EMAIL).unwrap().access_token, "fresh");
}

#[tokio::test]
async fn proxy_login_posts_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_string_contains("username=user%40example.com"))
        .and(body_string_contains("password=pw"))
        .and(body_string_contains("mfa_code=654321"))
        .respond_with(ResponseTemplate::new(200).set_body_json(http_mock::token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let identity = Identity::new(EMAIL, "pw").with_mfa_code("654321");
    let mut auth = authenticator(&server, identity);
    let cred = auth.authenticate_via_proxy(true).await.unwrap();
    assert_eq!(cred.access_token, "tok");

    // second call is served from the cache
    auth.authenticate_via_proxy(true).await.unwrap();
}
