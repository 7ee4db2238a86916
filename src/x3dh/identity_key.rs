use crate::random::random_bytes_from;
use crate::{Ed25519PublicKey, Ed25519Signature, Error, X25519PublicKey, X25519Secret};
use ed25519_dalek::{Signer, SigningKey};
use rand::{TryCryptoRng, TryRngCore};
use x25519_dalek::SharedSecret;
use zeroize::Zeroize;

/// Long-term identity of an account.
///
/// Holds an Ed25519 signing key for authentication and an independent X25519
/// key for Diffie-Hellman key agreement. Both are generated from separate seeds.
pub(crate) struct IdentityKey {
    signing_key: Box<SigningKey>,
    dh_key: X25519Secret,
}

impl IdentityKey {
    /// Creates a new identity key with randomly generated components.
    pub(crate) fn new_from<R>(rng: &mut R) -> Result<Self, Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let mut signing_seed = random_bytes_from::<R, 32>(rng)?;
        let signing_key = Box::new(SigningKey::from_bytes(&signing_seed));
        signing_seed.zeroize();

        let dh_key = X25519Secret::generate_from(rng)?;

        Ok(Self {
            signing_key,
            dh_key,
        })
    }

    /// Signs a message using the Ed25519 signing key.
    pub(crate) fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing_key.sign(message).into()
    }

    /// Returns the public Ed25519 signing key for this identity.
    pub(crate) fn signing_key_public(&self) -> Ed25519PublicKey {
        self.signing_key.verifying_key().into()
    }

    /// Returns the public X25519 key for Diffie-Hellman operations.
    pub(crate) fn dh_key_public(&self) -> X25519PublicKey {
        self.dh_key.public_key()
    }

    /// Performs Diffie-Hellman key agreement with another party's public key.
    pub(crate) fn dh(&self, public_key: &X25519PublicKey) -> SharedSecret {
        self.dh_key.dh(public_key)
    }

    /// Serializes the identity key to a 64-byte array.
    ///
    /// The first 32 bytes contain the Ed25519 private key,
    /// and the last 32 bytes contain the X25519 private key.
    pub(crate) fn to_bytes(&self) -> Box<[u8; 64]> {
        let mut bytes = Box::new([0u8; 64]);
        bytes[0..32].copy_from_slice(self.signing_key.as_bytes());
        bytes[32..64].copy_from_slice(&self.dh_key.to_bytes());

        bytes
    }
}

impl From<&[u8; 64]> for IdentityKey {
    /// Deserializes an identity key from a 64-byte array.
    fn from(bytes: &[u8; 64]) -> Self {
        let mut signing_bytes = Box::new([0u8; 32]);
        signing_bytes.copy_from_slice(&bytes[0..32]);
        let signing_key = Box::new(SigningKey::from_bytes(&signing_bytes));
        signing_bytes.zeroize();

        let mut dh_bytes = Box::new([0u8; 32]);
        dh_bytes.copy_from_slice(&bytes[32..64]);
        let dh_key = X25519Secret::from(dh_bytes);

        Self {
            signing_key,
            dh_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_signing_and_verification() {
        let identity_key = IdentityKey::new_from(&mut OsRng).unwrap();
        let message = b"This is a test message";

        let signature = identity_key.sign(message);
        let public = identity_key.signing_key_public();
        assert!(public.verify(message, &signature).is_ok());

        let modified_message = b"This is a modified message";
        assert!(public.verify(modified_message, &signature).is_err());
    }

    #[test]
    fn test_signing_and_agreement_keys_are_independent() {
        let identity_key = IdentityKey::new_from(&mut OsRng).unwrap();
        let bytes = identity_key.to_bytes();
        assert_ne!(bytes[0..32], bytes[32..64]);
    }

    #[test]
    fn test_serialization_deserialization() {
        let original_key = IdentityKey::new_from(&mut OsRng).unwrap();
        let serialized = original_key.to_bytes();
        let deserialized_key = IdentityKey::from(&*serialized);

        assert_eq!(
            original_key.signing_key_public(),
            deserialized_key.signing_key_public()
        );
        assert_eq!(original_key.dh_key_public(), deserialized_key.dh_key_public());
    }
}
