use crate::messages::{MessageType, NormalMessage, PROTOCOL_VERSION, check_prefix};
use crate::session::SessionKeys;
use crate::{Error, X25519PublicKey};

/// The first message(s) of a session, carrying the handshake keys alongside
/// an ordinary ratchet message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreKeyMessage {
    pub(crate) session_keys: SessionKeys,
    pub(crate) message: NormalMessage,
}

impl PreKeyMessage {
    /// Length of the handshake header in bytes.
    pub const HEADER_LENGTH: usize = 2 + 3 * X25519PublicKey::LENGTH;

    pub(crate) fn new(session_keys: SessionKeys, message: NormalMessage) -> Self {
        Self {
            session_keys,
            message,
        }
    }

    /// The responder's one-time key this message was created with.
    pub fn one_time_key(&self) -> X25519PublicKey {
        self.session_keys.one_time_key
    }

    /// The initiator's ephemeral base key.
    pub fn base_key(&self) -> X25519PublicKey {
        self.session_keys.base_key
    }

    /// The initiator's identity key.
    pub fn identity_key(&self) -> X25519PublicKey {
        self.session_keys.identity_key
    }

    /// All handshake keys of the session this message belongs to.
    pub fn session_keys(&self) -> SessionKeys {
        self.session_keys
    }

    /// The wrapped ratchet message.
    pub fn message(&self) -> &NormalMessage {
        &self.message
    }

    pub(crate) fn header_bytes(&self) -> [u8; PreKeyMessage::HEADER_LENGTH] {
        Self::encode_header(&self.session_keys)
    }

    pub(crate) fn encode_header(session_keys: &SessionKeys) -> [u8; PreKeyMessage::HEADER_LENGTH] {
        let mut header = [0u8; PreKeyMessage::HEADER_LENGTH];
        header[0] = PROTOCOL_VERSION;
        header[1] = MessageType::PreKey.into();
        header[2..34].copy_from_slice(session_keys.one_time_key.as_bytes());
        header[34..66].copy_from_slice(session_keys.base_key.as_bytes());
        header[66..98].copy_from_slice(session_keys.identity_key.as_bytes());
        header
    }

    /// Serializes the message to its wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let inner = self.message.to_bytes();
        let mut bytes = Vec::with_capacity(Self::HEADER_LENGTH + inner.len());
        bytes.extend_from_slice(&self.header_bytes());
        bytes.extend_from_slice(&inner);
        bytes
    }

    /// Parses the wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::HEADER_LENGTH {
            return Err(Error::BadMessage(format!(
                "Pre-key message too short: {} bytes",
                bytes.len()
            )));
        }
        check_prefix(bytes, MessageType::PreKey)?;

        let key = |offset: usize| {
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes[offset..offset + 32]);
            X25519PublicKey::from(key)
        };
        let session_keys = SessionKeys {
            one_time_key: key(2),
            base_key: key(34),
            identity_key: key(66),
        };
        let message = NormalMessage::from_bytes(&bytes[Self::HEADER_LENGTH..])?;

        Ok(Self {
            session_keys,
            message,
        })
    }
}
