mod config;
mod keys;

pub use config::AccountConfig;
pub use keys::{IdentityKeys, OneTimeKeys, PublicKeyBundle};

use crate::messages::PreKeyMessage;
use crate::ratchet::DoubleRatchet;
use crate::session::{Role, Session, SessionKeys};
use crate::x3dh::{IdentityKey, OneTimeKeyStore, X3DH};
use crate::{Ed25519PublicKey, Ed25519Signature, Error, X25519PublicKey, X25519Secret};
use keys::encode_key_map;
use rand::rngs::OsRng;
use rand::{TryCryptoRng, TryRngCore};
use tracing::{debug, warn};

/// A participant's long-term identity and its pool of one-time keys.
///
/// Creates sessions in either direction. Outbound sessions only need the
/// peer's identity key and one of its published one-time keys; inbound
/// sessions are created from the first pre-key message received, consuming
/// the one-time key it names.
pub struct Account {
    pub(crate) identity_key: IdentityKey,
    pub(crate) one_time_keys: OneTimeKeyStore,
    pub(crate) config: AccountConfig,
}

impl Account {
    /// Creates a new account with the given configuration.
    ///
    /// If no configuration is provided, default values are used. Fails with
    /// [`Error::EntropyUnavailable`] if the operating system cannot provide
    /// randomness.
    pub fn new(config: Option<AccountConfig>) -> Result<Self, Error> {
        Self::with_rng(config, &mut OsRng)
    }

    /// Creates a new account drawing its identity keys from `rng`.
    pub fn with_rng<R>(config: Option<AccountConfig>, rng: &mut R) -> Result<Self, Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let config = config.unwrap_or_default();
        let identity_key = IdentityKey::new_from(rng)?;

        debug!(
            target: "duet::account",
            curve25519 = %identity_key.dh_key_public().to_base64(),
            "created account"
        );

        Ok(Self {
            identity_key,
            one_time_keys: OneTimeKeyStore::default(),
            config,
        })
    }

    /// Returns the configuration for this account.
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Returns the public identity keys in their text form.
    pub fn identity_keys(&self) -> IdentityKeys {
        IdentityKeys {
            curve25519: self.curve25519_key().to_base64(),
            ed25519: self.ed25519_key().to_base64(),
        }
    }

    /// Returns the X25519 public key component of this account's identity key.
    #[inline]
    pub fn curve25519_key(&self) -> X25519PublicKey {
        self.identity_key.dh_key_public()
    }

    /// Returns the Ed25519 public key component of this account's identity key.
    #[inline]
    pub fn ed25519_key(&self) -> Ed25519PublicKey {
        self.identity_key.signing_key_public()
    }

    /// Signs `message` with the account's Ed25519 key. Signatures are
    /// deterministic.
    pub fn sign(&self, message: impl AsRef<[u8]>) -> Ed25519Signature {
        self.identity_key.sign(message.as_ref())
    }

    /// Generates `count` new one-time keys.
    ///
    /// New keys get fresh ascending ids and are unpublished. If randomness
    /// fails no key is added.
    pub fn generate_one_time_keys(&mut self, count: usize) -> Result<(), Error> {
        self.generate_one_time_keys_with_rng(count, &mut OsRng)
    }

    /// Generates `count` new one-time keys drawing their secrets from `rng`.
    pub fn generate_one_time_keys_with_rng<R>(&mut self, count: usize, rng: &mut R) -> Result<(), Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let ids = self.one_time_keys.generate_from(rng, count)?;

        let unpublished = self.one_time_keys.unpublished_count();
        debug!(
            target: "duet::account",
            count = ids.len(),
            unpublished,
            "generated one-time keys"
        );
        if unpublished > self.config.max_one_time_keys {
            warn!(
                target: "duet::account",
                unpublished,
                max = self.config.max_one_time_keys,
                "more unpublished one-time keys than the configured maximum"
            );
        }

        Ok(())
    }

    /// Returns the one-time keys that have not been published yet.
    pub fn one_time_keys(&self) -> OneTimeKeys {
        OneTimeKeys {
            curve25519: encode_key_map(&self.one_time_keys.unpublished_public_keys()),
        }
    }

    /// Marks every current one-time key as published.
    pub fn mark_keys_as_published(&mut self) {
        self.one_time_keys.mark_as_published();
    }

    /// The number of unpublished one-time keys the account is meant to hold.
    pub fn max_number_of_one_time_keys(&self) -> usize {
        self.config.max_one_time_keys
    }

    /// Returns the unpublished one-time keys together with the signing key.
    pub fn public_key_bundle(&self) -> PublicKeyBundle {
        PublicKeyBundle {
            agreement: encode_key_map(&self.one_time_keys.unpublished_public_keys()),
            signing: self.ed25519_key().to_base64(),
        }
    }

    /// Creates a session with a peer from its identity key and one of its
    /// published one-time keys.
    ///
    /// Messages encrypted on the new session are pre-key messages until the
    /// peer replies.
    pub fn create_outbound_session(
        &self,
        their_identity_key: X25519PublicKey,
        their_one_time_key: X25519PublicKey,
    ) -> Result<Session, Error> {
        self.create_outbound_session_with_rng(their_identity_key, their_one_time_key, &mut OsRng)
    }

    /// Like [`Account::create_outbound_session`], drawing the base key and
    /// the first ratchet key from `rng`.
    pub fn create_outbound_session_with_rng<R>(
        &self,
        their_identity_key: X25519PublicKey,
        their_one_time_key: X25519PublicKey,
        rng: &mut R,
    ) -> Result<Session, Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let base_key = X25519Secret::generate_from(rng)?;
        let ratchet_key = X25519Secret::generate_from(rng)?;

        let shared_secret = X3DH::new(&self.config.protocol_info).initiate_for_alice(
            &self.identity_key,
            &base_key,
            &their_identity_key,
            &their_one_time_key,
        )?;

        let session_keys = SessionKeys {
            identity_key: self.curve25519_key(),
            base_key: base_key.public_key(),
            one_time_key: their_one_time_key,
        };
        let ratchet = DoubleRatchet::initialize_for_alice(
            shared_secret,
            ratchet_key,
            self.config.ratchet_config(),
        );

        Ok(Session::new(
            Role::Initiator,
            session_keys,
            &self.curve25519_key(),
            &their_identity_key,
            ratchet,
        ))
    }

    /// Creates a session from a peer's pre-key message.
    ///
    /// The one-time key named by the message is consumed, whether or not the
    /// message later decrypts. The message itself is not decrypted here; pass
    /// it to [`Session::decrypt`].
    pub fn create_inbound_session(&mut self, message: &PreKeyMessage) -> Result<Session, Error> {
        let session_keys = message.session_keys();
        let one_time_key = self
            .one_time_keys
            .take(&session_keys.one_time_key)
            .ok_or_else(|| Error::UnknownOneTimeKey(session_keys.one_time_key.to_base64()))?;

        debug!(
            target: "duet::account",
            key_id = one_time_key.id.value(),
            "consumed one-time key"
        );

        let shared_secret = X3DH::new(&self.config.protocol_info).initiate_for_bob(
            &self.identity_key,
            &one_time_key.key,
            &session_keys.identity_key,
            &session_keys.base_key,
        )?;

        let ratchet = DoubleRatchet::initialize_for_bob(
            shared_secret,
            message.message().ratchet_key(),
            self.config.ratchet_config(),
        );

        Ok(Session::new(
            Role::Responder,
            session_keys,
            &session_keys.identity_key,
            &self.curve25519_key(),
            ratchet,
        ))
    }

    /// Like [`Account::create_inbound_session`], but only for messages from
    /// `their_identity_key`.
    pub fn create_inbound_session_from(
        &mut self,
        their_identity_key: &X25519PublicKey,
        message: &PreKeyMessage,
    ) -> Result<Session, Error> {
        if message.identity_key() != *their_identity_key {
            return Err(Error::BadMessage(
                "Pre-key message from an unexpected identity".to_string(),
            ));
        }

        self.create_inbound_session(message)
    }
}
