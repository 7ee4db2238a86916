//! Encrypted, authenticated serialization of accounts and sessions.
//!
//! A pickle is the unpadded base64 of
//! `version (1) || salt (16) || AES-256-GCM-SIV ciphertext || HMAC-SHA-256 (32)`.
//! The caller's pickle key is stretched with HKDF over the random salt into
//! the cipher key, the nonce and the MAC key. The plaintext is a protobuf
//! message carrying its own schema version.

mod proto;

use crate::account::AccountConfig;
use crate::random::random_bytes;
use crate::ratchet::{
    Chain, DoubleRatchet, MessageKey, RatchetConfig, ReceivingChain, SendingChain,
    SkippedMessageKey,
};
use crate::session::{ASSOCIATED_DATA_LENGTH, Role, Session, SessionKeys};
use crate::types::{base64_decode, base64_encode};
use crate::x3dh::{IdentityKey, OneTimeKey, OneTimeKeyStore};
use crate::{Account, Error, KeyId, X25519PublicKey, X25519Secret};
use aes_gcm_siv::aead::{Aead, Payload};
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use proto::{
    AccountConfigProto, AccountProto, OneTimeKeyProto, RatchetProto, ReceivingChainProto,
    SendingChainProto, SessionProto, SkippedMessageKeyProto,
};
use prost::Message;
use sha2::Sha256;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

type HmacSha256 = Hmac<Sha256>;

const PICKLE_VERSION: u8 = 1;
const SALT_LENGTH: usize = 16;
const NONCE_SIZE: usize = 12;
const MAC_LENGTH: usize = 32;
const AEAD_TAG_LENGTH: usize = 16;
const HEADER_LENGTH: usize = 1 + SALT_LENGTH;
const PICKLE_INFO: &[u8] = b"Duet-Pickle";

const ACCOUNT_SCHEMA_VERSION: u32 = 1;
const SESSION_SCHEMA_VERSION: u32 = 1;

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidPickle(reason.into())
}

struct PickleKeys {
    cipher: Aes256GcmSiv,
    nonce: [u8; NONCE_SIZE],
    mac_key: Zeroizing<[u8; 32]>,
}

impl PickleKeys {
    fn derive(pickle_key: &[u8], salt: &[u8]) -> Result<Self, Error> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), pickle_key);

        let mut material = Zeroizing::new([0u8; 32 + NONCE_SIZE + 32]);
        hkdf.expand(PICKLE_INFO, material.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        let cipher = Aes256GcmSiv::new_from_slice(&material[0..32])
            .map_err(|_| Error::Crypto("Invalid pickle cipher key length".to_string()))?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&material[32..32 + NONCE_SIZE]);
        let mut mac_key = Zeroizing::new([0u8; 32]);
        mac_key.copy_from_slice(&material[32 + NONCE_SIZE..]);

        Ok(Self {
            cipher,
            nonce,
            mac_key,
        })
    }

    fn mac(&self) -> Result<HmacSha256, Error> {
        <HmacSha256 as Mac>::new_from_slice(self.mac_key.as_slice())
            .map_err(|_| Error::Crypto("HMAC initialization failed".to_string()))
    }
}

/// Encrypts and authenticates `payload` under `pickle_key`.
fn seal(pickle_key: &[u8], payload: &[u8]) -> Result<String, Error> {
    let salt = random_bytes::<SALT_LENGTH>()?;
    let keys = PickleKeys::derive(pickle_key, salt.as_slice())?;

    let mut blob = Vec::with_capacity(HEADER_LENGTH + payload.len() + AEAD_TAG_LENGTH + MAC_LENGTH);
    blob.push(PICKLE_VERSION);
    blob.extend_from_slice(salt.as_slice());

    let ciphertext = keys.cipher.encrypt(
        Nonce::from_slice(&keys.nonce),
        Payload {
            msg: payload,
            aad: &blob,
        },
    )?;
    blob.extend_from_slice(&ciphertext);

    let mut mac = keys.mac()?;
    mac.update(&blob);
    blob.extend_from_slice(&mac.finalize().into_bytes());

    Ok(base64_encode(blob))
}

/// Authenticates and decrypts a pickle, returning the protobuf payload.
fn open(pickle_key: &[u8], pickle: &str) -> Result<Zeroizing<Vec<u8>>, Error> {
    let blob = base64_decode(pickle).map_err(|err| invalid(format!("Invalid base64: {err}")))?;

    if blob.len() < HEADER_LENGTH + AEAD_TAG_LENGTH + MAC_LENGTH {
        return Err(invalid(format!("Pickle too short: {} bytes", blob.len())));
    }
    if blob[0] != PICKLE_VERSION {
        return Err(invalid(format!("Unsupported pickle version {}", blob[0])));
    }

    let (authenticated, tag) = blob.split_at(blob.len() - MAC_LENGTH);
    let (header, ciphertext) = authenticated.split_at(HEADER_LENGTH);
    let keys = PickleKeys::derive(pickle_key, &header[1..])?;

    let mut mac = keys.mac()?;
    mac.update(authenticated);
    mac.verify_slice(tag)
        .map_err(|_| invalid("Pickle authentication failed"))?;

    let payload = keys
        .cipher
        .decrypt(
            Nonce::from_slice(&keys.nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| invalid("Pickle decryption failed"))?;

    Ok(Zeroizing::new(payload))
}

fn key_bytes(bytes: &[u8], what: &str) -> Result<Box<[u8; 32]>, Error> {
    if bytes.len() != 32 {
        return Err(invalid(format!("Invalid {what} length: {} bytes", bytes.len())));
    }

    let mut key = Box::new([0u8; 32]);
    key.copy_from_slice(bytes);
    Ok(key)
}

fn public_key(bytes: &[u8], what: &str) -> Result<X25519PublicKey, Error> {
    key_bytes(bytes, what).map(|key| X25519PublicKey::from(*key))
}

fn limit(value: u64, what: &str) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| invalid(format!("Invalid {what}: {value}")))
}

impl Account {
    /// Serializes the account, encrypted and authenticated with `pickle_key`.
    ///
    /// The pickle holds the identity keys, every one-time key with its
    /// published flag, the next key id and the configuration.
    pub fn pickle(&self, pickle_key: &[u8]) -> Result<String, Error> {
        let mut identity_key = self.identity_key.to_bytes();

        let one_time_keys = self
            .one_time_keys
            .keys
            .values()
            .map(|key| OneTimeKeyProto {
                id: key.id.value(),
                key: key.key.to_bytes().to_vec(),
                published: key.published,
            })
            .collect();

        let config = AccountConfigProto {
            max_one_time_keys: self.config.max_one_time_keys as u64,
            max_skipped_message_keys: self.config.max_skipped_message_keys as u64,
            max_message_gap: self.config.max_message_gap,
            max_receiving_chains: self.config.max_receiving_chains as u64,
            protocol_info: self.config.protocol_info.clone(),
        };

        let mut account_proto = AccountProto {
            version: ACCOUNT_SCHEMA_VERSION,
            identity_key: identity_key.to_vec(),
            one_time_keys,
            next_one_time_key_id: self.one_time_keys.next_id,
            config: Some(config),
        };
        identity_key.zeroize();

        let payload = Zeroizing::new(account_proto.encode_to_vec());
        account_proto.identity_key.zeroize();
        for key in account_proto.one_time_keys.iter_mut() {
            key.key.zeroize();
        }

        seal(pickle_key, &payload)
    }

    /// Restores an account from a pickle created with the same `pickle_key`.
    ///
    /// Every failure is reported as [`Error::InvalidPickle`].
    pub fn from_pickle(pickle_key: &[u8], pickle: &str) -> Result<Self, Error> {
        let payload = open(pickle_key, pickle)?;
        let mut account_proto = AccountProto::decode(payload.as_slice())
            .map_err(|err| invalid(format!("Failed to decode account: {err}")))?;

        let account = Self::from_proto(&account_proto);
        account_proto.identity_key.zeroize();
        for key in account_proto.one_time_keys.iter_mut() {
            key.key.zeroize();
        }

        account.inspect_err(|err| debug!(target: "duet::pickle", error = %err, "rejected account pickle"))
    }

    fn from_proto(account_proto: &AccountProto) -> Result<Self, Error> {
        if account_proto.version != ACCOUNT_SCHEMA_VERSION {
            return Err(invalid(format!(
                "Unsupported account schema version: {}",
                account_proto.version
            )));
        }

        let identity_bytes = Zeroizing::new(
            <[u8; 64]>::try_from(account_proto.identity_key.as_slice())
                .map_err(|_| invalid("Invalid identity key length"))?,
        );
        let identity_key = IdentityKey::from(&*identity_bytes);

        let next_id = account_proto.next_one_time_key_id;
        let mut keys = BTreeMap::new();
        for key in &account_proto.one_time_keys {
            if key.id == 0 || key.id >= next_id {
                return Err(invalid(format!("One-time key id {} out of range", key.id)));
            }

            let id = KeyId(key.id);
            let one_time_key = OneTimeKey {
                id,
                key: X25519Secret::from(key_bytes(&key.key, "one-time key")?),
                published: key.published,
            };
            if keys.insert(id, one_time_key).is_some() {
                return Err(invalid(format!("Duplicate one-time key id {}", key.id)));
            }
        }

        let config_proto = account_proto
            .config
            .as_ref()
            .ok_or_else(|| invalid("Missing account configuration"))?;
        let config = AccountConfig {
            max_one_time_keys: limit(config_proto.max_one_time_keys, "max_one_time_keys")?,
            max_skipped_message_keys: limit(
                config_proto.max_skipped_message_keys,
                "max_skipped_message_keys",
            )?,
            max_message_gap: config_proto.max_message_gap,
            max_receiving_chains: limit(config_proto.max_receiving_chains, "max_receiving_chains")?,
            protocol_info: config_proto.protocol_info.clone(),
        };

        Ok(Self {
            identity_key,
            one_time_keys: OneTimeKeyStore { keys, next_id },
            config,
        })
    }
}

impl Session {
    /// Serializes the session, encrypted and authenticated with `pickle_key`.
    ///
    /// A restored session continues from the same chain positions.
    pub fn pickle(&self, pickle_key: &[u8]) -> Result<String, Error> {
        let ratchet = &self.ratchet;

        let sending_chain = ratchet.sending_chain.as_ref().map(|chain| SendingChainProto {
            ratchet_key: chain.ratchet_key.to_bytes().to_vec(),
            chain_key: chain.chain.chain_key.to_vec(),
            index: chain.chain.index,
        });
        let receiving_chains = ratchet
            .receiving_chains
            .iter()
            .map(|chain| ReceivingChainProto {
                ratchet_key: chain.ratchet_key.to_bytes().to_vec(),
                chain_key: chain.chain.chain_key.to_vec(),
                index: chain.chain.index,
            })
            .collect();
        let skipped_message_keys = ratchet
            .skipped_message_keys
            .iter()
            .map(|skipped| SkippedMessageKeyProto {
                ratchet_key: skipped.ratchet_key.to_bytes().to_vec(),
                index: skipped.message_key.index,
                message_key: skipped.message_key.key.to_vec(),
            })
            .collect();

        let mut session_proto = SessionProto {
            version: SESSION_SCHEMA_VERSION,
            initiator: self.role == Role::Initiator,
            identity_key: self.session_keys.identity_key.to_bytes().to_vec(),
            base_key: self.session_keys.base_key.to_bytes().to_vec(),
            one_time_key: self.session_keys.one_time_key.to_bytes().to_vec(),
            associated_data: self.associated_data.to_vec(),
            received_message: self.received_message,
            ratchet: Some(RatchetProto {
                root_key: ratchet.root_key.to_vec(),
                sending_chain,
                receiving_chains,
                skipped_message_keys,
                max_skipped_message_keys: ratchet.config.max_skipped_message_keys as u64,
                max_message_gap: ratchet.config.max_message_gap,
                max_receiving_chains: ratchet.config.max_receiving_chains as u64,
            }),
        };

        let payload = Zeroizing::new(session_proto.encode_to_vec());
        zeroize_ratchet_proto(&mut session_proto);

        seal(pickle_key, &payload)
    }

    /// Restores a session from a pickle created with the same `pickle_key`.
    ///
    /// Every failure is reported as [`Error::InvalidPickle`].
    pub fn from_pickle(pickle_key: &[u8], pickle: &str) -> Result<Self, Error> {
        let payload = open(pickle_key, pickle)?;
        let mut session_proto = SessionProto::decode(payload.as_slice())
            .map_err(|err| invalid(format!("Failed to decode session: {err}")))?;

        let session = Self::from_proto(&session_proto);
        zeroize_ratchet_proto(&mut session_proto);

        session.inspect_err(|err| debug!(target: "duet::pickle", error = %err, "rejected session pickle"))
    }

    fn from_proto(session_proto: &SessionProto) -> Result<Self, Error> {
        if session_proto.version != SESSION_SCHEMA_VERSION {
            return Err(invalid(format!(
                "Unsupported session schema version: {}",
                session_proto.version
            )));
        }

        let session_keys = SessionKeys {
            identity_key: public_key(&session_proto.identity_key, "identity key")?,
            base_key: public_key(&session_proto.base_key, "base key")?,
            one_time_key: public_key(&session_proto.one_time_key, "one-time key")?,
        };
        let associated_data = <[u8; ASSOCIATED_DATA_LENGTH]>::try_from(
            session_proto.associated_data.as_slice(),
        )
        .map_err(|_| invalid("Invalid associated data length"))?;

        let ratchet_proto = session_proto
            .ratchet
            .as_ref()
            .ok_or_else(|| invalid("Missing ratchet state"))?;
        let ratchet = ratchet_from_proto(ratchet_proto)?;

        let role = if session_proto.initiator {
            Role::Initiator
        } else {
            Role::Responder
        };

        Ok(Self {
            session_id: session_keys.session_id(),
            role,
            session_keys,
            associated_data,
            ratchet,
            received_message: session_proto.received_message,
        })
    }
}

fn ratchet_from_proto(ratchet_proto: &RatchetProto) -> Result<DoubleRatchet, Error> {
    let config = RatchetConfig {
        max_skipped_message_keys: limit(
            ratchet_proto.max_skipped_message_keys,
            "max_skipped_message_keys",
        )?,
        max_message_gap: ratchet_proto.max_message_gap,
        max_receiving_chains: limit(ratchet_proto.max_receiving_chains, "max_receiving_chains")?,
    };

    let sending_chain = ratchet_proto
        .sending_chain
        .as_ref()
        .map(|chain| -> Result<SendingChain, Error> {
            Ok(SendingChain {
                ratchet_key: X25519Secret::from(key_bytes(&chain.ratchet_key, "ratchet key")?),
                chain: Chain {
                    chain_key: key_bytes(&chain.chain_key, "chain key")?,
                    index: chain.index,
                },
            })
        })
        .transpose()?;

    let receiving_chains = ratchet_proto
        .receiving_chains
        .iter()
        .map(|chain| -> Result<ReceivingChain, Error> {
            Ok(ReceivingChain {
                ratchet_key: public_key(&chain.ratchet_key, "ratchet key")?,
                chain: Chain {
                    chain_key: key_bytes(&chain.chain_key, "chain key")?,
                    index: chain.index,
                },
            })
        })
        .collect::<Result<VecDeque<_>, _>>()?;

    if sending_chain.is_none() && receiving_chains.is_empty() {
        return Err(invalid("Ratchet has neither a sending nor a receiving chain"));
    }

    let skipped_message_keys = ratchet_proto
        .skipped_message_keys
        .iter()
        .map(|skipped| -> Result<SkippedMessageKey, Error> {
            Ok(SkippedMessageKey {
                ratchet_key: public_key(&skipped.ratchet_key, "ratchet key")?,
                message_key: MessageKey {
                    key: key_bytes(&skipped.message_key, "message key")?,
                    index: skipped.index,
                },
            })
        })
        .collect::<Result<VecDeque<_>, _>>()?;

    Ok(DoubleRatchet {
        root_key: key_bytes(&ratchet_proto.root_key, "root key")?,
        sending_chain,
        receiving_chains,
        skipped_message_keys,
        config,
    })
}

fn zeroize_ratchet_proto(session_proto: &mut SessionProto) {
    if let Some(ratchet) = session_proto.ratchet.as_mut() {
        ratchet.root_key.zeroize();
        if let Some(chain) = ratchet.sending_chain.as_mut() {
            chain.ratchet_key.zeroize();
            chain.chain_key.zeroize();
        }
        for chain in ratchet.receiving_chains.iter_mut() {
            chain.chain_key.zeroize();
        }
        for skipped in ratchet.skipped_message_keys.iter_mut() {
            skipped.message_key.zeroize();
        }
    }
}
