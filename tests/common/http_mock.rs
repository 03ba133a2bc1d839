use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opaitokens::oauth::REDIRECT_URI;

pub const STATE: &str = "st1";
pub const PREAUTH_COOKIE: &str = "pc1";
pub const AUTH_CODE: &str = "abc123";

#[allow(dead_code)]
pub fn callback_with(query: &str) -> String {
    format!("{REDIRECT_URI}?{query}")
}

fn redirect(location: &str) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", location)
}

#[allow(dead_code)]
pub async fn mount_preauth(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/auth/preauth"))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(serde_json::json!({ "preauth_cookie": PREAUTH_COOKIE })),
        )
        .mount(server)
        .await;
}

/// `/authorize` redirects to the identifier page, which answers 200 and
/// drops a session cookie.
#[allow(dead_code)]
pub async fn mount_login_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .and(query_param("preauth_cookie", PREAUTH_COOKIE))
        .respond_with(redirect(&format!("/u/login/identifier?state={STATE}")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/u/login/identifier"))
        .and(query_param("state", STATE))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "auth0=sess1; Path=/")
                .set_body_string("<html>login</html>"),
        )
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn mount_identifier(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/u/login/identifier"))
        .respond_with(ResponseTemplate::new(status).insert_header(
            "Location",
            format!("/u/login/password?state={STATE}").as_str(),
        ))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn mount_password(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/u/login/password"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn mount_password_ok(server: &MockServer) {
    mount_password(server, redirect(&format!("/authorize/resume?state={STATE}"))).await;
}

/// `/authorize/resume?state=<state>` redirects to `location`.
#[allow(dead_code)]
pub async fn mount_resume(server: &MockServer, state: &str, location: &str) {
    Mock::given(method("GET"))
        .and(path("/authorize/resume"))
        .and(query_param("state", state))
        .respond_with(redirect(location))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn mount_token(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub fn token_body() -> serde_json::Value {
    serde_json::json!({
        "access_token": "tok",
        "refresh_token": "ref",
        "expires_in": 86400,
        "token_type": "Bearer"
    })
}

/// Mount every step of a login that needs no MFA.
#[allow(dead_code)]
pub async fn mount_full_login(server: &MockServer) {
    mount_preauth(server, 200).await;
    mount_login_page(server).await;
    mount_identifier(server, 302).await;
    mount_password_ok(server).await;
    mount_resume(server, STATE, &callback_with(&format!("code={AUTH_CODE}"))).await;
    mount_token(server, 200, token_body()).await;
}

/// Paths of every request the server has seen, in order.
#[allow(dead_code)]
pub async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}
