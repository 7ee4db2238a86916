use crate::messages::{MessageType, PROTOCOL_VERSION, check_prefix};
use crate::{Error, X25519PublicKey};

/// Length of the authenticated tag appended by the AEAD.
pub(crate) const MAC_LENGTH: usize = 16;

/// A message encrypted with a ratchet message key.
///
/// The header (version, type, ratchet key and counter) is sent in the clear and
/// authenticated as associated data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalMessage {
    pub(crate) ratchet_key: X25519PublicKey,
    pub(crate) counter: u32,
    pub(crate) ciphertext: Vec<u8>,
}

impl NormalMessage {
    /// Length of the cleartext header in bytes.
    pub const HEADER_LENGTH: usize = 2 + X25519PublicKey::LENGTH + 4;

    /// The sender's ratchet key this message was encrypted under.
    pub fn ratchet_key(&self) -> X25519PublicKey {
        self.ratchet_key
    }

    /// Position of the message in its chain.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Encrypted payload followed by its authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub(crate) fn header_bytes(&self) -> [u8; NormalMessage::HEADER_LENGTH] {
        Self::encode_header(&self.ratchet_key, self.counter)
    }

    pub(crate) fn encode_header(
        ratchet_key: &X25519PublicKey,
        counter: u32,
    ) -> [u8; NormalMessage::HEADER_LENGTH] {
        let mut header = [0u8; NormalMessage::HEADER_LENGTH];
        header[0] = PROTOCOL_VERSION;
        header[1] = MessageType::Normal.into();
        header[2..34].copy_from_slice(ratchet_key.as_bytes());
        header[34..38].copy_from_slice(&counter.to_be_bytes());
        header
    }

    /// Serializes the message to its wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::HEADER_LENGTH + self.ciphertext.len());
        bytes.extend_from_slice(&self.header_bytes());
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parses the wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::HEADER_LENGTH + MAC_LENGTH {
            return Err(Error::BadMessage(format!(
                "Message too short: {} bytes",
                bytes.len()
            )));
        }
        check_prefix(bytes, MessageType::Normal)?;

        let mut ratchet_key = [0u8; 32];
        ratchet_key.copy_from_slice(&bytes[2..34]);
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&bytes[34..38]);

        Ok(Self {
            ratchet_key: X25519PublicKey::from(ratchet_key),
            counter: u32::from_be_bytes(counter),
            ciphertext: bytes[Self::HEADER_LENGTH..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> NormalMessage {
        NormalMessage {
            ratchet_key: X25519PublicKey::from([9u8; 32]),
            counter: 258,
            ciphertext: vec![0xAB; 21],
        }
    }

    #[test]
    fn test_wire_layout() {
        let bytes = message().to_bytes();

        assert_eq!(bytes.len(), NormalMessage::HEADER_LENGTH + 21);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], 1);
        assert_eq!(&bytes[2..34], &[9u8; 32]);
        assert_eq!(&bytes[34..38], &[0, 0, 1, 2]);
        assert_eq!(NormalMessage::from_bytes(&bytes).unwrap(), message());
    }

    #[test]
    fn test_truncated_message_is_rejected() {
        let bytes = message().to_bytes();
        let truncated = &bytes[..NormalMessage::HEADER_LENGTH + MAC_LENGTH - 1];
        assert!(matches!(
            NormalMessage::from_bytes(truncated),
            Err(Error::BadMessage(_))
        ));
    }

    #[test]
    fn test_wrong_version_or_type_is_rejected() {
        let mut bytes = message().to_bytes();
        bytes[0] = 2;
        assert!(matches!(
            NormalMessage::from_bytes(&bytes),
            Err(Error::BadMessage(_))
        ));

        let mut bytes = message().to_bytes();
        bytes[1] = 0;
        assert!(matches!(
            NormalMessage::from_bytes(&bytes),
            Err(Error::BadMessage(_))
        ));
    }
}
