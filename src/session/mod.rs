use crate::messages::{Message, PreKeyMessage};
use crate::ratchet::DoubleRatchet;
use crate::types::base64_encode;
use crate::{Error, X25519PublicKey};
use rand::rngs::OsRng;
use rand::{TryCryptoRng, TryRngCore};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

/// Length of the associated data binding a session to both identities.
pub(crate) const ASSOCIATED_DATA_LENGTH: usize = 2 * X25519PublicKey::LENGTH;

/// Which side of the handshake created a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Created the session from the peer's published keys.
    Initiator,
    /// Created the session from a received pre-key message.
    Responder,
}

/// The handshake keys identifying a session.
///
/// These are carried in every pre-key message, which lets the responder match
/// retransmitted pre-key messages to an existing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionKeys {
    /// The initiator's identity key.
    pub identity_key: X25519PublicKey,
    /// The initiator's ephemeral base key.
    pub base_key: X25519PublicKey,
    /// The responder's one-time key used by the handshake.
    pub one_time_key: X25519PublicKey,
}

impl SessionKeys {
    /// A stable identifier for the session: unpadded base64 of the SHA-256
    /// hash of the three handshake keys. Both sides compute the same id.
    pub fn session_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.identity_key.as_bytes());
        hasher.update(self.base_key.as_bytes());
        hasher.update(self.one_time_key.as_bytes());

        base64_encode(hasher.finalize())
    }
}

/// An end-to-end encrypted session with one peer.
pub struct Session {
    pub(crate) session_id: String,
    pub(crate) role: Role,
    pub(crate) session_keys: SessionKeys,
    pub(crate) associated_data: [u8; ASSOCIATED_DATA_LENGTH],
    pub(crate) ratchet: DoubleRatchet,
    pub(crate) received_message: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material is deliberately omitted.
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        role: Role,
        session_keys: SessionKeys,
        initiator_identity: &X25519PublicKey,
        responder_identity: &X25519PublicKey,
        ratchet: DoubleRatchet,
    ) -> Self {
        let mut associated_data = [0u8; ASSOCIATED_DATA_LENGTH];
        associated_data[0..32].copy_from_slice(initiator_identity.as_bytes());
        associated_data[32..64].copy_from_slice(responder_identity.as_bytes());

        let session_id = session_keys.session_id();
        debug!(target: "duet::session", session_id = %session_id, ?role, "created session");

        Self {
            session_id,
            role,
            session_keys,
            associated_data,
            ratchet,
            received_message: false,
        }
    }

    /// Returns the session id, identical on both sides.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_keys(&self) -> SessionKeys {
        self.session_keys
    }

    /// Whether a message from the peer has been decrypted on this session.
    pub fn has_received_message(&self) -> bool {
        self.received_message
    }

    /// Encrypts a message for the peer.
    ///
    /// Until the initiator has received a reply, its messages are pre-key
    /// messages so that the peer can establish the session from any of them.
    /// Only the first message after a new peer ratchet key needs randomness;
    /// if that fails the session is left unchanged.
    pub fn encrypt(&mut self, plaintext: impl AsRef<[u8]>) -> Result<Message, Error> {
        self.encrypt_with(&mut OsRng, plaintext.as_ref())
    }

    pub(crate) fn encrypt_with<R>(&mut self, rng: &mut R, plaintext: &[u8]) -> Result<Message, Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let message = if self.role == Role::Initiator && !self.received_message {
            let header = PreKeyMessage::encode_header(&self.session_keys);
            let ad = [self.associated_data.as_slice(), header.as_slice()].concat();
            let inner = self.ratchet.encrypt(rng, plaintext, &ad)?;
            Message::PreKey(PreKeyMessage::new(self.session_keys, inner))
        } else {
            Message::Normal(self.ratchet.encrypt(rng, plaintext, &self.associated_data)?)
        };

        trace!(
            target: "duet::session",
            session_id = %self.session_id,
            message_type = ?message.message_type(),
            "encrypted message"
        );

        Ok(message)
    }

    /// Decrypts a message from the peer.
    ///
    /// A pre-key message is only accepted by the responder session it
    /// belongs to. On failure the session is left unchanged.
    pub fn decrypt(&mut self, message: &Message) -> Result<Vec<u8>, Error> {
        let result = match message {
            Message::Normal(message) => self.ratchet.decrypt(message, &self.associated_data),
            Message::PreKey(message) => {
                if self.role != Role::Responder || !self.matches_inbound(message) {
                    return Err(Error::BadMessage(
                        "Pre-key message does not belong to this session".to_string(),
                    ));
                }

                let ad = [self.associated_data.as_slice(), message.header_bytes().as_slice()].concat();
                self.ratchet.decrypt(message.message(), &ad)
            }
        };

        let plaintext = result.inspect_err(|err| {
            debug!(
                target: "duet::session",
                session_id = %self.session_id,
                error = %err,
                "failed to decrypt message"
            );
        })?;
        self.received_message = true;

        Ok(plaintext)
    }

    /// Checks whether a pre-key message was created for this session.
    pub fn matches_inbound(&self, message: &PreKeyMessage) -> bool {
        message.session_keys() == self.session_keys
    }

    /// Like [`Session::matches_inbound`], additionally requiring the message
    /// to come from `their_identity_key`.
    pub fn matches_inbound_from(
        &self,
        their_identity_key: &X25519PublicKey,
        message: &PreKeyMessage,
    ) -> bool {
        message.identity_key() == *their_identity_key && self.matches_inbound(message)
    }
}
