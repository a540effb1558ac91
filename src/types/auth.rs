use serde::{Deserialize, Serialize};

/// Device code issued by the identity provider to start a device flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds until the device code expires.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    /// Minimum seconds between token polls.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_expires_in() -> u64 {
    900
}

fn default_interval() -> u64 {
    5
}

/// Raw token endpoint reply; exactly one of `access_token` or `error` is set.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// How a device-flow attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFlowOutcome {
    Authorized(String),
    /// The user dismissed the prompt.
    Cancelled,
    /// Denied, expired, timed out or the provider could not be reached.
    Failed(String),
}

/// Authentication state of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    NoCredential,
    AuthenticationPending,
    Verifying,
    Ready,
    Cancelled,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::NoCredential => "no_credential",
            AccountState::AuthenticationPending => "authentication_pending",
            AccountState::Verifying => "verifying",
            AccountState::Ready => "ready",
            AccountState::Cancelled => "cancelled",
        }
    }
}

/// Result of bringing an account to `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Ready,
    /// The user cancelled, or authorization was denied or expired.
    Cancelled,
    /// Verification failed for a reason other than a rejected credential.
    Failed(String),
}
