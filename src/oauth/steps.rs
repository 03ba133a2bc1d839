//! The login flow as an explicit state machine.
//!
//! Each [`Step`] describes exactly one HTTP exchange. [`Step::request`]
//! builds the request from the flow context and [`Step::transition`]
//! classifies the observed response into the next step, a finished
//! outcome, or a terminal error. Neither performs I/O.

use chrono::{DateTime, Utc};
use reqwest::header::{ORIGIN, REFERER};

use crate::error::OpaiError;
use crate::oauth::discovery::{
    is_callback, Endpoints, PreauthResponse, LOGIN_REFERER, MFA_CHALLENGE_PREFIX, RESUME_PREFIX,
};
use crate::oauth::identity::Identity;
use crate::oauth::pkce::PkceChallenge;
use crate::oauth::session::{RedirectPolicy, StepRequest, StepResponse};
use crate::oauth::token::{code_exchange_form, parse_token_response, AuthorizationCode, Credential};

/// What a flow produces when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// Exchange the authorization code for an access token.
    Token,
    /// Stop at the callback and hand back the verifier and code.
    AuthForCode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    Token(Credential),
    Code(AuthorizationCode),
}

impl FlowOutcome {
    /// The credential of a token-mode flow.
    pub fn into_credential(self) -> Result<Credential, OpaiError> {
        match self {
            FlowOutcome::Token(cred) => Ok(cred),
            FlowOutcome::Code(_) => Err(OpaiError::LoginCallbackFailed {
                status: 302,
                location: None,
            }),
        }
    }

    /// The verifier and code of an auth-for-code flow.
    pub fn into_code(self) -> Result<AuthorizationCode, OpaiError> {
        match self {
            FlowOutcome::Code(code) => Ok(code),
            FlowOutcome::Token(_) => Err(OpaiError::LoginCallbackFailed {
                status: 200,
                location: None,
            }),
        }
    }
}

/// Mutable state threaded through every step of one flow.
#[derive(Debug)]
pub struct FlowContext {
    pub identity: Identity,
    pub mode: FlowMode,
    pkce: PkceChallenge,
    authorize_state: Option<String>,
    mfa_submitted: bool,
}

impl FlowContext {
    pub fn new(identity: Identity, mode: FlowMode, pkce: PkceChallenge) -> Self {
        Self {
            identity,
            mode,
            pkce,
            authorize_state: None,
            mfa_submitted: false,
        }
    }

    pub fn code_verifier(&self) -> &str {
        &self.pkce.code_verifier
    }

    pub fn code_challenge(&self) -> &str {
        &self.pkce.code_challenge
    }

    pub fn authorize_state(&self) -> Option<&str> {
        self.authorize_state.as_deref()
    }

    fn require_state(&self) -> Result<&str, OpaiError> {
        self.authorize_state
            .as_deref()
            .ok_or_else(|| OpaiError::MissingAuthorizeState { url: String::new() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Preauth,
    LoginPage { authorize_url: String },
    SubmitIdentifier,
    SubmitPassword,
    Resume { location: String, referer: String },
    SubmitMfa { challenge_url: String },
    ExchangeToken { code: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Continue(Step),
    Finished(FlowOutcome),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Preauth => "preauth",
            Step::LoginPage { .. } => "login page",
            Step::SubmitIdentifier => "submit identifier",
            Step::SubmitPassword => "submit password",
            Step::Resume { .. } => "resume authorize",
            Step::SubmitMfa { .. } => "submit mfa",
            Step::ExchangeToken { .. } => "token exchange",
        }
    }

    pub fn request(&self, ctx: &FlowContext, endpoints: &Endpoints) -> Result<StepRequest, OpaiError> {
        let req = match self {
            Step::Preauth => StepRequest::get(endpoints.preauth_url(), RedirectPolicy::Capture),

            Step::LoginPage { authorize_url } => {
                StepRequest::get(authorize_url.as_str(), RedirectPolicy::Follow)
                    .header(REFERER, LOGIN_REFERER)
            }

            Step::SubmitIdentifier => {
                let state = ctx.require_state()?;
                let url = endpoints.identifier_url(state);
                let form = vec![
                    ("state", state.to_string()),
                    ("username", ctx.identity.email.clone()),
                    ("js-available", "true".to_string()),
                    ("webauthn-available", "true".to_string()),
                    ("is-brave", "false".to_string()),
                    ("webauthn-platform-available", "false".to_string()),
                    ("action", "default".to_string()),
                ];
                StepRequest::post_form(url.as_str(), form)
                    .header(REFERER, url.as_str())
                    .header(ORIGIN, endpoints.origin())
            }

            Step::SubmitPassword => {
                let state = ctx.require_state()?;
                let url = endpoints.password_url(state);
                let form = vec![
                    ("state", state.to_string()),
                    ("username", ctx.identity.email.clone()),
                    ("password", ctx.identity.password.clone()),
                    ("action", "default".to_string()),
                ];
                StepRequest::post_form(url.as_str(), form)
                    .header(REFERER, url.as_str())
                    .header(ORIGIN, endpoints.origin())
            }

            Step::Resume { location, referer } => {
                StepRequest::get(endpoints.absolute(location), RedirectPolicy::Capture)
                    .header(REFERER, referer.as_str())
            }

            Step::SubmitMfa { challenge_url } => {
                let state = query_param(challenge_url, "state").ok_or_else(|| {
                    OpaiError::MissingAuthorizeState {
                        url: challenge_url.clone(),
                    }
                })?;
                let code = ctx.identity.mfa_code.clone().ok_or(OpaiError::MfaRequired)?;
                let form = vec![
                    ("state", state),
                    ("code", code),
                    ("action", "default".to_string()),
                ];
                StepRequest::post_form(challenge_url.as_str(), form)
                    .header(REFERER, challenge_url.as_str())
                    .header(ORIGIN, endpoints.origin())
            }

            Step::ExchangeToken { code } => StepRequest::post_form(
                endpoints.token_url(),
                code_exchange_form(code, ctx.code_verifier()),
            ),
        };
        Ok(req)
    }

    /// Classify `resp` and decide where the flow goes next.
    pub fn transition(
        self,
        ctx: &mut FlowContext,
        resp: StepResponse,
        endpoints: &Endpoints,
        now: DateTime<Utc>,
    ) -> Result<Transition, OpaiError> {
        match self {
            Step::Preauth => {
                if resp.status != 200 {
                    return Err(OpaiError::PreauthFailed {
                        status: resp.status,
                        detail: "unexpected status from preauth endpoint".into(),
                    });
                }
                let preauth: PreauthResponse =
                    serde_json::from_str(&resp.body).map_err(|e| OpaiError::DecodeFailed {
                        context: "preauth".into(),
                        detail: e.to_string(),
                    })?;
                if preauth.preauth_cookie.is_empty() {
                    return Err(OpaiError::PreauthFailed {
                        status: resp.status,
                        detail: "response carried no preauth_cookie".into(),
                    });
                }
                let authorize_url =
                    endpoints.authorize_url(ctx.code_challenge(), &preauth.preauth_cookie);
                Ok(Transition::Continue(Step::LoginPage { authorize_url }))
            }

            Step::LoginPage { .. } => {
                if resp.status != 200 {
                    return Err(OpaiError::LoginFailed {
                        status: resp.status,
                        location: resp.location,
                    });
                }
                let state = query_param(&resp.final_url, "state")
                    .ok_or(OpaiError::MissingAuthorizeState {
                        url: resp.final_url,
                    })?;
                ctx.authorize_state = Some(state);
                Ok(Transition::Continue(Step::SubmitIdentifier))
            }

            Step::SubmitIdentifier => match resp.status {
                302 => Ok(Transition::Continue(Step::SubmitPassword)),
                status => Err(OpaiError::IdentifierRejected { status }),
            },

            Step::SubmitPassword => match resp.status {
                302 if resp.location_starts_with(RESUME_PREFIX) => {
                    let referer = endpoints.password_url(ctx.require_state()?);
                    Ok(Transition::Continue(Step::Resume {
                        location: resp.location.unwrap_or_default(),
                        referer,
                    }))
                }
                400 => Err(OpaiError::WrongCredentials),
                status => Err(OpaiError::LoginFailed {
                    status,
                    location: resp.location,
                }),
            },

            Step::Resume { .. } => {
                let location = match (resp.status, resp.location) {
                    (302, Some(location)) => location,
                    (status, location) => {
                        return Err(OpaiError::LoginCallbackFailed { status, location })
                    }
                };

                if location.starts_with(MFA_CHALLENGE_PREFIX) {
                    if ctx.identity.mfa_code.is_none() {
                        return Err(OpaiError::MfaRequired);
                    }
                    // The code has already been spent; asking again means it was not accepted.
                    if ctx.mfa_submitted {
                        return Err(OpaiError::LoginCallbackFailed {
                            status: 302,
                            location: Some(location),
                        });
                    }
                    return Ok(Transition::Continue(Step::SubmitMfa {
                        challenge_url: endpoints.absolute(&location),
                    }));
                }

                if is_callback(&location) {
                    return finish_at_callback(ctx, &location);
                }

                Err(OpaiError::LoginCallbackFailed {
                    status: 302,
                    location: Some(location),
                })
            }

            Step::SubmitMfa { challenge_url } => {
                ctx.mfa_submitted = true;
                match resp.status {
                    302 if resp.location_starts_with(RESUME_PREFIX) => {
                        Ok(Transition::Continue(Step::Resume {
                            location: resp.location.unwrap_or_default(),
                            referer: challenge_url,
                        }))
                    }
                    400 => Err(OpaiError::WrongMfaCode),
                    status => Err(OpaiError::LoginFailed {
                        status,
                        location: resp.location,
                    }),
                }
            }

            Step::ExchangeToken { .. } => {
                let credential =
                    parse_token_response("token exchange", resp.status, &resp.body, now)?;
                Ok(Transition::Finished(FlowOutcome::Token(credential)))
            }
        }
    }
}

/// Interpret the app callback URL that ends the browser part of the flow.
fn finish_at_callback(ctx: &FlowContext, callback: &str) -> Result<Transition, OpaiError> {
    if let Some(code) = query_param(callback, "error") {
        return Err(OpaiError::ProviderError {
            code,
            description: query_param(callback, "error_description").unwrap_or_default(),
        });
    }

    let code = query_param(callback, "code").ok_or_else(|| OpaiError::LoginCallbackFailed {
        status: 302,
        location: Some(callback.to_string()),
    })?;

    match ctx.mode {
        FlowMode::AuthForCode => Ok(Transition::Finished(FlowOutcome::Code(AuthorizationCode {
            code_verifier: ctx.code_verifier().to_string(),
            code,
        }))),
        FlowMode::Token => Ok(Transition::Continue(Step::ExchangeToken { code })),
    }
}

/// First non-empty value of `key` in the query string of `url`.
///
/// Works on custom-scheme and relative URLs alike, which `Url::parse`
/// does not.
fn query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}
