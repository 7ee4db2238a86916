use crate::Error;
use crate::random::random_bytes_from;
use crate::types::{base64_decode_array, base64_encode};
use rand::{TryCryptoRng, TryRngCore};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroize;

/// Public half of a Curve25519 key pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct X25519PublicKey(PublicKey);

impl X25519PublicKey {
    /// Length of the raw key in bytes.
    pub const LENGTH: usize = 32;

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Raw key bytes, copied.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Unpadded base64 text form, as published in key bundles.
    pub fn to_base64(&self) -> String {
        base64_encode(self.as_bytes())
    }

    /// Parses the unpadded base64 text form.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        let bytes = base64_decode_array::<32>(input, "Curve25519 key")?;
        Ok(Self::from(bytes))
    }
}

impl From<[u8; 32]> for X25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(PublicKey::from(bytes))
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(value: PublicKey) -> Self {
        Self(value)
    }
}

impl AsRef<PublicKey> for X25519PublicKey {
    fn as_ref(&self) -> &PublicKey {
        &self.0
    }
}

/// Secret half of a Curve25519 key pair. The inner secret zeroizes itself on drop.
#[derive(Clone)]
pub(crate) struct X25519Secret(Box<StaticSecret>);

impl X25519Secret {
    /// Generates a key pair from the given randomness source.
    pub(crate) fn generate_from<R>(rng: &mut R) -> Result<Self, Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let seed = random_bytes_from::<R, 32>(rng)?;
        Ok(Self::from(seed))
    }

    pub(crate) fn dh(&self, public_key: &X25519PublicKey) -> SharedSecret {
        self.0.diffie_hellman(public_key.as_ref())
    }

    pub(crate) fn public_key(&self) -> X25519PublicKey {
        let pub_key = PublicKey::from(self.0.as_ref());
        pub_key.into()
    }

    pub(crate) fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl From<Box<[u8; 32]>> for X25519Secret {
    fn from(mut bytes: Box<[u8; 32]>) -> Self {
        let secret = StaticSecret::from(*bytes);
        bytes.zeroize();
        Self(Box::new(secret))
    }
}
