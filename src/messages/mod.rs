mod normal;
mod pre_key;

pub use normal::NormalMessage;
pub use pre_key::PreKeyMessage;

use crate::Error;
use crate::types::{base64_decode, base64_encode};

/// Version byte leading every message.
pub(crate) const PROTOCOL_VERSION: u8 = 1;

/// Kind of an encrypted message, as carried in its type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A message that also establishes the session on the receiving side.
    PreKey,
    /// A message on an established session.
    Normal,
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::PreKey => 0,
            MessageType::Normal => 1,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::PreKey),
            1 => Ok(Self::Normal),
            other => Err(Error::BadMessage(format!("Unknown message type {other}"))),
        }
    }
}

/// Checks the version byte and the type tag of a serialized message.
pub(crate) fn check_prefix(bytes: &[u8], expected: MessageType) -> Result<(), Error> {
    match bytes {
        [PROTOCOL_VERSION, tag, ..] => {
            let message_type = MessageType::try_from(*tag)?;
            if message_type != expected {
                return Err(Error::BadMessage(format!(
                    "Expected a {expected:?} message, got {message_type:?}"
                )));
            }
            Ok(())
        }
        [version, ..] => Err(Error::BadMessage(format!(
            "Unsupported message version {version}"
        ))),
        [] => Err(Error::BadMessage("Empty message".to_string())),
    }
}

/// An encrypted message of either kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    PreKey(PreKeyMessage),
    Normal(NormalMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::PreKey(_) => MessageType::PreKey,
            Self::Normal(_) => MessageType::Normal,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::PreKey(message) => message.to_bytes(),
            Self::Normal(message) => message.to_bytes(),
        }
    }

    /// Transport text of the message: unpadded base64 of its wire bytes.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Parses wire bytes, taking the kind from the type tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.get(1).copied().map(MessageType::try_from) {
            Some(Ok(MessageType::PreKey)) => PreKeyMessage::from_bytes(bytes).map(Self::PreKey),
            Some(Ok(MessageType::Normal)) => NormalMessage::from_bytes(bytes).map(Self::Normal),
            Some(Err(err)) => Err(err),
            None => Err(Error::BadMessage("Message too short".to_string())),
        }
    }

    /// Parses transport text that the sender labelled as `message_type`.
    pub fn from_parts(message_type: MessageType, ciphertext: &str) -> Result<Self, Error> {
        let bytes = base64_decode(ciphertext)?;
        match message_type {
            MessageType::PreKey => PreKeyMessage::from_bytes(&bytes).map(Self::PreKey),
            MessageType::Normal => NormalMessage::from_bytes(&bytes).map(Self::Normal),
        }
    }
}

impl From<PreKeyMessage> for Message {
    fn from(value: PreKeyMessage) -> Self {
        Self::PreKey(value)
    }
}

impl From<NormalMessage> for Message {
    fn from(value: NormalMessage) -> Self {
        Self::Normal(value)
    }
}
