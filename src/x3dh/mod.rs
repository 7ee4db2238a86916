mod identity_key;
mod one_time_key;

pub(crate) use identity_key::IdentityKey;
pub(crate) use one_time_key::{OneTimeKey, OneTimeKeyStore};

use crate::{Error, X25519PublicKey, X25519Secret};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::SharedSecret;
use zeroize::{Zeroize, ZeroizeOnDrop};

const SALT: &[u8] = b"Duet-X3DH";

/// Root key and first chain key agreed on by the handshake.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct X3DHSharedSecret {
    pub(crate) root_key: Box<[u8; 32]>,
    pub(crate) chain_key: Box<[u8; 32]>,
}

/// Asynchronous key agreement between an initiator and the owner of a
/// published one-time key.
///
/// Four Diffie-Hellman results are mixed: both identity keys, the initiator's
/// base key and the responder's one-time key. The responder never has to be
/// online for the initiator to start a session.
pub(crate) struct X3DH {
    info: Vec<u8>,
}

impl X3DH {
    /// Creates a new handshake with the application `info` used as HKDF context.
    ///
    /// Both parties must use the same info to agree on a secret.
    pub(crate) fn new(info: &[u8]) -> Self {
        Self {
            info: info.to_vec(),
        }
    }

    /// The initiator's side of the agreement.
    pub(crate) fn initiate_for_alice(
        &self,
        a_identity: &IdentityKey,
        a_base_key: &X25519Secret,
        b_identity_public: &X25519PublicKey,
        b_one_time_public: &X25519PublicKey,
    ) -> Result<X3DHSharedSecret, Error> {
        // DH1 = DH(IKa, IKb)
        let dh1 = a_identity.dh(b_identity_public);
        // DH2 = DH(EKa, IKb)
        let dh2 = a_base_key.dh(b_identity_public);
        // DH3 = DH(EKa, OTKb)
        let dh3 = a_base_key.dh(b_one_time_public);
        // DH4 = DH(IKa, OTKb)
        let dh4 = a_identity.dh(b_one_time_public);

        self.calculate_shared_secret([dh1, dh2, dh3, dh4])
    }

    /// The responder's side of the agreement. Produces the same secret as
    /// [`X3DH::initiate_for_alice`] when the keys match.
    pub(crate) fn initiate_for_bob(
        &self,
        b_identity: &IdentityKey,
        b_one_time_key: &X25519Secret,
        a_identity_public: &X25519PublicKey,
        a_base_public: &X25519PublicKey,
    ) -> Result<X3DHSharedSecret, Error> {
        // DH1 = DH(IKb, IKa)
        let dh1 = b_identity.dh(a_identity_public);
        // DH2 = DH(IKb, EKa)
        let dh2 = b_identity.dh(a_base_public);
        // DH3 = DH(OTKb, EKa)
        let dh3 = b_one_time_key.dh(a_base_public);
        // DH4 = DH(OTKb, IKa)
        let dh4 = b_one_time_key.dh(a_identity_public);

        self.calculate_shared_secret([dh1, dh2, dh3, dh4])
    }

    fn calculate_shared_secret(&self, dhs: [SharedSecret; 4]) -> Result<X3DHSharedSecret, Error> {
        if dhs.iter().any(|dh| !dh.was_contributory()) {
            return Err(Error::BadMessage(
                "Key agreement with a low-order key".to_string(),
            ));
        }

        // IKM = DH1 || DH2 || DH3 || DH4
        let mut key_material = Box::new([0u8; 128]);
        for (i, dh) in dhs.iter().enumerate() {
            key_material[i * 32..(i + 1) * 32].copy_from_slice(dh.as_bytes());
        }

        let hkdf = Hkdf::<Sha256>::new(Some(SALT), key_material.as_slice());
        key_material.zeroize();

        let mut output = Box::new([0u8; 64]);
        hkdf.expand(&self.info, output.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        let mut root_key = Box::new([0u8; 32]);
        let mut chain_key = Box::new([0u8; 32]);
        root_key.copy_from_slice(&output[0..32]);
        chain_key.copy_from_slice(&output[32..64]);
        output.zeroize();

        Ok(X3DHSharedSecret {
            root_key,
            chain_key,
        })
    }
}
