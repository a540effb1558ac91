use thiserror::Error;

// === CryptoError ===

/// Errors related to cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Failed to derive encryption key from passphrase.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    /// Encryption operation failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),
    /// Decryption operation failed.
    #[error("Decryption failed: {0}")]
    Decryption(String),
    /// Failed to generate random bytes.
    #[error("Random generation failed: {0}")]
    RandomGeneration(String),
    /// The provided key is invalid.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

// === ApiError ===

/// Errors raised by the REST client and its transport.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),
    /// The credential was rejected (HTTP 401).
    #[error("Unauthorized: credential rejected")]
    Unauthorized,
    /// The server answered with a status the operation does not accept.
    #[error("Unexpected status {status} for {path}")]
    Status { status: u16, path: String },
    /// The body could not be decoded into the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),
    /// Writing a streamed body to its destination failed.
    #[error("I/O error: {0}")]
    Io(String),
    /// No scripted response matched a request (test transport only).
    #[error("No response scripted for {method} {path}")]
    Unscripted { method: String, path: String },
}

impl ApiError {
    /// True when the failure means the stored credential is no longer valid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

// === AuthError ===

/// Errors raised while talking to the device-flow endpoints.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The device-code request could not be completed.
    #[error("Device code request failed: {0}")]
    DeviceCode(String),
    /// The token endpoint answered with something unexpected.
    #[error("Token request failed: {0}")]
    Token(String),
    /// Transport-level failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

// === CredentialStoreError ===

/// Errors related to per-slot credential storage.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    /// Filesystem failure creating, deleting or moving a slot directory.
    #[error("Credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// SQLite failure inside a slot database.
    #[error("Credential database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Encrypting or decrypting the stored token failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File system I/O error.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// JSON serialization/deserialization error.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The specified settings key does not exist.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided value is invalid for the setting.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === RegistryError ===

/// Errors related to session registry lifecycle operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested slot does not exist.
    #[error("Account slot {slot} out of range (registry holds {len})")]
    SlotOutOfRange { slot: usize, len: usize },
    /// A registry member still signs in through this slot.
    #[error("Account slot {0} is in use")]
    SlotInUse(usize),
    /// Deleting or relocating persisted credentials failed.
    #[error(transparent)]
    Storage(#[from] CredentialStoreError),
    /// Persisting the account count failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

// === DownloadError ===

/// Errors related to file download operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Download with the given ID was not found.
    #[error("Download not found: {0}")]
    NotFound(String),
    /// Network error during download.
    #[error("Download network error: {0}")]
    NetworkError(String),
    /// File system error (e.g., permission denied, disk full).
    #[error("Download filesystem error: {0}")]
    FileSystemError(String),
    /// The download is already completed.
    #[error("Download already completed: {0}")]
    AlreadyCompleted(String),
}

// === GitError ===

/// Errors related to launching git.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be started.
    #[error("Failed to start git: {0}")]
    Spawn(String),
    /// The clone/pull target is unusable.
    #[error("Invalid git target: {0}")]
    InvalidTarget(String),
}
