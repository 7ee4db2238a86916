mod chain;

pub(crate) use chain::{Chain, MessageKey, ReceivingChain, SendingChain, SkippedMessageKey};

use crate::error::Error;
use crate::messages::NormalMessage;
use crate::x3dh::X3DHSharedSecret;
use crate::{X25519PublicKey, X25519Secret};
use aes_gcm_siv::aead::{Aead, Payload};
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::{TryCryptoRng, TryRngCore};
use sha2::Sha256;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};
use x25519_dalek::SharedSecret;
use zeroize::Zeroize;

const NONCE_SIZE: usize = 12; // AES-GCM-SIV uses 12-byte (96-bit) nonces

const ROOT_INFO: &[u8] = b"Duet-E2E-Root";
const CHAIN_INFO: &[u8] = b"Duet-E2E-Chain";
const MESSAGE_KEYS_INFO: &[u8] = b"Duet-E2E-Keys";

/// Bounds on the state a ratchet keeps for out-of-order delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RatchetConfig {
    pub(crate) max_skipped_message_keys: usize,
    pub(crate) max_message_gap: u32,
    pub(crate) max_receiving_chains: usize,
}

/// Double Ratchet with a lazily created sending chain.
///
/// A new ratchet key is generated only when we send after having received a
/// new ratchet key from the peer, so decryption never needs randomness.
///
/// It manages:
/// - A root key that evolves with each DH ratchet step
/// - The current sending chain, if any
/// - The most recent receiving chains, one per peer ratchet key
/// - Skipped message keys for out-of-order message delivery
#[derive(Clone)]
pub(crate) struct DoubleRatchet {
    pub(crate) root_key: Box<[u8; 32]>,
    pub(crate) sending_chain: Option<SendingChain>,
    pub(crate) receiving_chains: VecDeque<ReceivingChain>,
    pub(crate) skipped_message_keys: VecDeque<SkippedMessageKey>,
    pub(crate) config: RatchetConfig,
}

impl Drop for DoubleRatchet {
    fn drop(&mut self) {
        self.root_key.zeroize();
    }
}

impl DoubleRatchet {
    /// Initializes the ratchet of the session initiator.
    ///
    /// The handshake's chain key becomes the first sending chain, under the
    /// freshly generated `ratchet_key`.
    pub(crate) fn initialize_for_alice(
        shared_secret: X3DHSharedSecret,
        ratchet_key: X25519Secret,
        config: RatchetConfig,
    ) -> Self {
        Self {
            root_key: shared_secret.root_key.clone(),
            sending_chain: Some(SendingChain {
                ratchet_key,
                chain: Chain::new(shared_secret.chain_key.clone()),
            }),
            receiving_chains: VecDeque::new(),
            skipped_message_keys: VecDeque::new(),
            config,
        }
    }

    /// Initializes the ratchet of the session responder.
    ///
    /// The handshake's chain key becomes the receiving chain for the
    /// initiator's first ratchet key.
    pub(crate) fn initialize_for_bob(
        shared_secret: X3DHSharedSecret,
        their_ratchet_key: X25519PublicKey,
        config: RatchetConfig,
    ) -> Self {
        let mut receiving_chains = VecDeque::with_capacity(1);
        receiving_chains.push_back(ReceivingChain {
            ratchet_key: their_ratchet_key,
            chain: Chain::new(shared_secret.chain_key.clone()),
        });

        Self {
            root_key: shared_secret.root_key.clone(),
            sending_chain: None,
            receiving_chains,
            skipped_message_keys: VecDeque::new(),
            config,
        }
    }

    /// Key derivation function for the root key ratchet.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// 1. The new root key
    /// 2. The new chain key
    fn kdf_rk(
        root_key: &[u8; 32],
        dh_output: SharedSecret,
    ) -> Result<(Box<[u8; 32]>, Box<[u8; 32]>), Error> {
        if !dh_output.was_contributory() {
            return Err(Error::BadMessage(
                "Ratchet step with a low-order key".to_string(),
            ));
        }

        let hkdf = Hkdf::<Sha256>::new(Some(root_key.as_slice()), dh_output.as_bytes());

        let mut new_root_key = Box::new([0u8; 32]);
        let mut chain_key = Box::new([0u8; 32]);

        hkdf.expand(ROOT_INFO, new_root_key.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed for root key".to_string()))?;
        hkdf.expand(CHAIN_INFO, chain_key.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed for chain key".to_string()))?;

        Ok((new_root_key, chain_key))
    }

    /// Creates a sending chain towards the newest peer ratchet key.
    ///
    /// The new ratchet key is drawn from `rng` before any state changes.
    fn ratchet_sending_chain<R>(&mut self, rng: &mut R) -> Result<(), Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let their_ratchet_key = self
            .receiving_chains
            .back()
            .map(|chain| chain.ratchet_key)
            .ok_or_else(|| Error::Crypto("No ratchet key to send to".to_string()))?;

        let ratchet_key = X25519Secret::generate_from(rng)?;
        let (root_key, chain_key) =
            Self::kdf_rk(&self.root_key, ratchet_key.dh(&their_ratchet_key))?;

        trace!(
            target: "duet::ratchet",
            ratchet_key = %ratchet_key.public_key().to_base64(),
            "advanced sending ratchet"
        );

        self.root_key = root_key;
        self.sending_chain = Some(SendingChain {
            ratchet_key,
            chain: Chain::new(chain_key),
        });

        Ok(())
    }

    /// Encrypts `plaintext` with the next key of the sending chain.
    ///
    /// `ad` is authenticated together with the message header. `rng` is only
    /// used when a new sending chain has to be created.
    pub(crate) fn encrypt<R>(&mut self, rng: &mut R, plaintext: &[u8], ad: &[u8]) -> Result<NormalMessage, Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        if self.sending_chain.is_none() {
            self.ratchet_sending_chain(rng)?;
        }
        let sending_chain = self
            .sending_chain
            .as_mut()
            .ok_or_else(|| Error::Crypto("No sending chain available".to_string()))?;

        let ratchet_key = sending_chain.ratchet_key.public_key();
        let message_key = sending_chain.chain.next()?;

        let header = NormalMessage::encode_header(&ratchet_key, message_key.index);
        let ciphertext = Self::encrypt_message(&message_key, plaintext, &[ad, header.as_slice()].concat())?;

        Ok(NormalMessage {
            ratchet_key,
            counter: message_key.index,
            ciphertext,
        })
    }

    /// Decrypts a message, committing the ratchet only if it authenticates.
    ///
    /// On any error the ratchet is left exactly as it was.
    pub(crate) fn decrypt(&mut self, message: &NormalMessage, ad: &[u8]) -> Result<Vec<u8>, Error> {
        let mut ratchet = self.clone();
        let plaintext = ratchet.decrypt_in_place(message, ad)?;
        *self = ratchet;

        Ok(plaintext)
    }

    fn decrypt_in_place(&mut self, message: &NormalMessage, ad: &[u8]) -> Result<Vec<u8>, Error> {
        let message_key = match self
            .receiving_chains
            .iter()
            .position(|chain| chain.ratchet_key == message.ratchet_key)
        {
            Some(position) => {
                let index = self.receiving_chains[position].chain.index;
                if message.counter < index {
                    self.take_skipped_message_key(message)?
                } else {
                    self.advance_receiving_chain(position, message.counter)?
                }
            }
            None => {
                let position = self.ratchet_receiving_chain(message.ratchet_key)?;
                self.advance_receiving_chain(position, message.counter)?
            }
        };

        let header = message.header_bytes();
        let aad = [ad, header.as_slice()].concat();
        Self::decrypt_message(&message_key, &message.ciphertext, &aad)
    }

    /// Performs the DH ratchet step for a new peer ratchet key and returns
    /// the position of the new receiving chain.
    fn ratchet_receiving_chain(&mut self, their_ratchet_key: X25519PublicKey) -> Result<usize, Error> {
        let sending_chain = self.sending_chain.as_ref().ok_or_else(|| {
            Error::BadMessage("Message with an unexpected ratchet key".to_string())
        })?;

        let (root_key, chain_key) =
            Self::kdf_rk(&self.root_key, sending_chain.ratchet_key.dh(&their_ratchet_key))?;

        self.root_key = root_key;
        self.sending_chain = None;
        self.receiving_chains.push_back(ReceivingChain {
            ratchet_key: their_ratchet_key,
            chain: Chain::new(chain_key),
        });
        while self.receiving_chains.len() > self.config.max_receiving_chains.max(1) {
            self.receiving_chains.pop_front();
        }

        trace!(
            target: "duet::ratchet",
            ratchet_key = %their_ratchet_key.to_base64(),
            "advanced receiving ratchet"
        );

        Ok(self.receiving_chains.len() - 1)
    }

    /// Advances a receiving chain up to `counter`, caching the keys of the
    /// messages in between.
    fn advance_receiving_chain(&mut self, position: usize, counter: u32) -> Result<MessageKey, Error> {
        let Self {
            receiving_chains,
            skipped_message_keys,
            config,
            ..
        } = self;
        let receiving_chain = receiving_chains
            .get_mut(position)
            .ok_or_else(|| Error::Crypto("Receiving chain disappeared".to_string()))?;

        let gap = counter - receiving_chain.chain.index;
        if gap > config.max_message_gap {
            warn!(target: "duet::ratchet", gap, max_gap = config.max_message_gap, "message gap too large");
            return Err(Error::BadMessage(format!(
                "Message gap of {gap} exceeds the maximum of {}",
                config.max_message_gap
            )));
        }

        while receiving_chain.chain.index < counter {
            let message_key = receiving_chain.chain.next()?;
            skipped_message_keys.push_back(SkippedMessageKey {
                ratchet_key: receiving_chain.ratchet_key,
                message_key,
            });
            while skipped_message_keys.len() > config.max_skipped_message_keys {
                skipped_message_keys.pop_front();
            }
        }
        if gap > 0 {
            debug!(target: "duet::ratchet", skipped = gap, "cached skipped message keys");
        }

        receiving_chain.chain.next()
    }

    fn take_skipped_message_key(&mut self, message: &NormalMessage) -> Result<MessageKey, Error> {
        let position = self
            .skipped_message_keys
            .iter()
            .position(|skipped| {
                skipped.ratchet_key == message.ratchet_key
                    && skipped.message_key.index == message.counter
            })
            .ok_or(Error::Replay {
                counter: message.counter,
            })?;

        self.skipped_message_keys
            .remove(position)
            .map(|skipped| skipped.message_key)
            .ok_or(Error::Replay {
                counter: message.counter,
            })
    }

    fn message_cipher(message_key: &MessageKey) -> Result<(Aes256GcmSiv, [u8; NONCE_SIZE]), Error> {
        // Derive encryption key and IV from the message key
        let hkdf = Hkdf::<Sha256>::new(None, message_key.key.as_slice());

        let mut derived_material = Box::new([0u8; 32 + NONCE_SIZE]);
        hkdf.expand(MESSAGE_KEYS_INFO, derived_material.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        let cipher = Aes256GcmSiv::new_from_slice(&derived_material[0..32])
            .map_err(|_| Error::Crypto("Invalid message key length".to_string()))?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&derived_material[32..]);
        derived_material.zeroize();

        Ok((cipher, nonce))
    }

    fn encrypt_message(message_key: &MessageKey, plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>, Error> {
        let (cipher, nonce) = Self::message_cipher(message_key)?;

        cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .map_err(|_| Error::Crypto("Message encryption failed".to_string()))
    }

    fn decrypt_message(message_key: &MessageKey, ciphertext: &[u8], ad: &[u8]) -> Result<Vec<u8>, Error> {
        let (cipher, nonce) = Self::message_cipher(message_key)?;

        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map_err(|_| Error::MacFailure)
    }
}
