//! OAuth device authorization flow.
//!
//! Requests a device code, shows it to the user through an [`AuthPrompt`] and
//! polls the token endpoint until the user approves, denies, the code expires
//! or the prompt is dismissed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::services::http_transport::{HttpRequest, HttpTransport, Method};
use crate::types::auth::{DeviceCode, DeviceFlowOutcome, TokenResponse};
use crate::types::errors::AuthError;

pub const CLIENT_ID: &str = "Ov23liErbWGLzAKTlLFW";
pub const SCOPES: &str = "repo user notifications";
pub const DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: u64 = 5;

/// User-facing side of the device flow.
#[async_trait]
pub trait AuthPrompt: Send + Sync {
    /// Shows the user code and verification URL. Returning `false` cancels.
    async fn present_code(&self, code: &DeviceCode) -> bool;
    /// Polled once per iteration; `true` abandons the flow.
    fn is_cancelled(&self) -> bool;
    /// Reports a terminal failure to the user.
    fn notify_failure(&self, message: &str);
}

enum Poll {
    Token(String),
    Pending,
    SlowDown,
    Denied,
    Expired,
}

pub struct DeviceFlow {
    transport: Arc<dyn HttpTransport>,
    client_id: String,
    scopes: String,
    device_code_url: String,
    access_token_url: String,
}

impl DeviceFlow {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            client_id: CLIENT_ID.to_string(),
            scopes: SCOPES.to_string(),
            device_code_url: DEVICE_CODE_URL.to_string(),
            access_token_url: ACCESS_TOKEN_URL.to_string(),
        }
    }

    pub fn with_endpoints(mut self, device_code_url: &str, access_token_url: &str) -> Self {
        self.device_code_url = device_code_url.to_string();
        self.access_token_url = access_token_url.to_string();
        self
    }

    pub async fn request_device_code(&self) -> Result<DeviceCode, AuthError> {
        let request = HttpRequest::new(Method::Post, &self.device_code_url)
            .header("Accept", "application/json")
            .form(&[("client_id", self.client_id.as_str()), ("scope", self.scopes.as_str())]);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::DeviceCode(format!("HTTP {}", response.status)));
        }
        response
            .json()
            .map_err(|e| AuthError::DeviceCode(e.to_string()))
    }

    async fn poll_once(&self, device_code: &str) -> Result<Poll, AuthError> {
        let request = HttpRequest::new(Method::Post, &self.access_token_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_GRANT_TYPE),
            ]);
        let response = self.transport.send(request).await?;
        let reply: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Token(e.to_string()))?;

        if let Some(token) = reply.access_token.filter(|t| !t.is_empty()) {
            return Ok(Poll::Token(token));
        }
        match reply.error.as_deref() {
            Some("authorization_pending") => Ok(Poll::Pending),
            Some("slow_down") => Ok(Poll::SlowDown),
            Some("expired_token") => Ok(Poll::Expired),
            Some("access_denied") => Ok(Poll::Denied),
            Some(other) => Err(AuthError::Token(
                reply.error_description.unwrap_or_else(|| other.to_string()),
            )),
            None => Err(AuthError::Token(format!("unexpected reply (HTTP {})", response.status))),
        }
    }

    /// Runs the whole flow. Network errors while polling are retried until the
    /// code's lifetime runs out.
    pub async fn run(&self, prompt: &dyn AuthPrompt) -> DeviceFlowOutcome {
        let code = match self.request_device_code().await {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "device code request failed");
                prompt.notify_failure(&format!("Could not start sign-in: {}", e));
                return DeviceFlowOutcome::Failed(e.to_string());
            }
        };

        info!(user_code = %code.user_code, uri = %code.verification_uri, "device code issued");
        if !prompt.present_code(&code).await {
            return DeviceFlowOutcome::Cancelled;
        }

        let deadline = Instant::now() + Duration::from_secs(code.expires_in);
        let mut interval = code.interval.max(1);

        loop {
            if prompt.is_cancelled() {
                debug!("device flow cancelled");
                return DeviceFlowOutcome::Cancelled;
            }
            if Instant::now() >= deadline {
                prompt.notify_failure("Sign-in timed out. Please try again.");
                return DeviceFlowOutcome::Failed("timed out".to_string());
            }

            sleep(Duration::from_secs(interval)).await;

            if prompt.is_cancelled() {
                return DeviceFlowOutcome::Cancelled;
            }

            match self.poll_once(&code.device_code).await {
                Ok(Poll::Token(token)) => {
                    info!("device flow authorized");
                    return DeviceFlowOutcome::Authorized(token);
                }
                Ok(Poll::Pending) => {}
                Ok(Poll::SlowDown) => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval, "token endpoint asked to slow down");
                }
                Ok(Poll::Expired) => {
                    prompt.notify_failure("The sign-in code expired. Please try again.");
                    return DeviceFlowOutcome::Failed("expired_token".to_string());
                }
                Ok(Poll::Denied) => {
                    prompt.notify_failure("Sign-in was denied.");
                    return DeviceFlowOutcome::Failed("access_denied".to_string());
                }
                Err(AuthError::Api(e)) => {
                    warn!(error = %e, "token poll failed, retrying");
                }
                Err(e) => {
                    prompt.notify_failure(&e.to_string());
                    return DeviceFlowOutcome::Failed(e.to_string());
                }
            }
        }
    }
}
