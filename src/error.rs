/// Errors that can occur during account, session and pickle operations.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// The operating system could not provide secure random bytes.
    ///
    /// This is never recoverable: the operation was aborted before any key
    /// material was produced. See [`Error::is_fatal`].
    #[error("Secure randomness is unavailable")]
    EntropyUnavailable,

    /// A pickle could not be authenticated, decrypted or decoded.
    #[error("Invalid pickle: {0}")]
    InvalidPickle(String),

    /// A pre-key message referenced a one-time key that is not in the store.
    #[error("Unknown one-time key: {0}")]
    UnknownOneTimeKey(String),

    /// A message or key was malformed or does not belong to this session.
    #[error("Bad message: {0}")]
    BadMessage(String),

    /// A message failed authentication.
    #[error("Message authentication failed")]
    MacFailure,

    /// A message with an already consumed counter was received again.
    #[error("Message with counter {counter} was already decrypted")]
    Replay {
        /// Counter of the replayed message.
        counter: u32,
    },

    /// A signature did not verify.
    #[error("Signature verification failed: {0}")]
    Signature(String),

    /// Public key material could not be converted to or from JSON.
    #[error("Serialization/deserialization failed: {0}")]
    Serde(String),

    /// A cryptographic primitive rejected its input.
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

impl Error {
    /// Returns `true` for conditions that must abort the caller, currently only
    /// [`Error::EntropyUnavailable`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EntropyUnavailable)
    }
}

impl From<aes_gcm_siv::Error> for Error {
    fn from(value: aes_gcm_siv::Error) -> Self {
        Self::Crypto(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(value: base64::DecodeError) -> Self {
        Self::BadMessage(format!("Invalid base64: {value}"))
    }
}
