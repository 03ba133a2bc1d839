use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderName, LOCATION};
use reqwest::Method;

use crate::error::OpaiError;
use crate::oauth::discovery::BROWSER_USER_AGENT;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Whether a request may follow redirects or must hand the 3xx back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    Follow,
    Capture,
}

/// Transport policy shared by every request of a flow.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// One outgoing request of the login flow, described as data.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(HeaderName, String)>,
    pub form: Option<Vec<(&'static str, String)>>,
    pub redirect: RedirectPolicy,
}

impl StepRequest {
    pub fn get(url: impl Into<String>, redirect: RedirectPolicy) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            form: None,
            redirect,
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(&'static str, String)>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            form: Some(form),
            redirect: RedirectPolicy::Capture,
        }
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// What the flow needs to know about a response once its body is read.
#[derive(Debug, Clone)]
pub struct StepResponse {
    pub status: u16,
    pub location: Option<String>,
    /// URL of the last hop; differs from the request URL after followed redirects.
    pub final_url: String,
    pub body: String,
}

impl StepResponse {
    pub fn location_starts_with(&self, prefix: &str) -> bool {
        self.location.as_deref().is_some_and(|l| l.starts_with(prefix))
    }
}

/// Cookie-carrying HTTP session owned by a single login flow.
///
/// Both clients share one cookie jar, so switching redirect policy between
/// requests never loses session cookies.
#[derive(Debug)]
pub struct Session {
    follow: reqwest::Client,
    capture: reqwest::Client,
}

impl Session {
    pub fn new(settings: &HttpSettings) -> Result<Self, OpaiError> {
        let jar = Arc::new(Jar::default());
        Ok(Self {
            follow: build_client(settings, RedirectPolicy::Follow, Some(jar.clone()))?,
            capture: build_client(settings, RedirectPolicy::Capture, Some(jar))?,
        })
    }

    pub async fn send(&self, context: &str, req: StepRequest) -> Result<StepResponse, OpaiError> {
        let client = match req.redirect {
            RedirectPolicy::Follow => &self.follow,
            RedirectPolicy::Capture => &self.capture,
        };

        let mut builder = client.request(req.method, &req.url);
        for (name, value) in req.headers {
            builder = builder.header(name, value);
        }
        if let Some(form) = &req.form {
            builder = builder.form(form);
        }

        let resp = builder.send().await.map_err(|e| request_failed(context, e))?;

        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = resp.url().to_string();
        let body = resp.text().await.map_err(|e| request_failed(context, e))?;

        tracing::debug!(step = context, status, location = ?location, "received response");

        Ok(StepResponse {
            status,
            location,
            final_url,
            body,
        })
    }
}

pub(crate) fn build_client(
    settings: &HttpSettings,
    redirect: RedirectPolicy,
    jar: Option<Arc<Jar>>,
) -> Result<reqwest::Client, OpaiError> {
    let policy = match redirect {
        RedirectPolicy::Follow => reqwest::redirect::Policy::limited(10),
        RedirectPolicy::Capture => reqwest::redirect::Policy::none(),
    };

    let mut builder = reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.timeout)
        .redirect(policy)
        .danger_accept_invalid_certs(settings.accept_invalid_certs);
    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }

    builder.build().map_err(|e| request_failed("client setup", e))
}

pub(crate) fn request_failed(context: &str, source: reqwest::Error) -> OpaiError {
    OpaiError::RequestFailed {
        context: context.to_string(),
        source,
    }
}
