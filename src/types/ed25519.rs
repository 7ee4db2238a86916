use crate::Error;
use crate::types::{base64_decode_array, base64_encode};
use ed25519_dalek::{Signature, VerifyingKey};

/// Public Ed25519 key used to verify an account's signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey(VerifyingKey);

impl Ed25519PublicKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Unpadded base64 text form.
    pub fn to_base64(&self) -> String {
        base64_encode(self.as_bytes())
    }

    /// Parses the unpadded base64 text form, rejecting invalid curve points.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        let bytes = base64_decode_array::<32>(input, "Ed25519 key")?;
        Self::from_bytes(&bytes)
    }

    /// Parses raw key bytes, rejecting invalid curve points.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, Error> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|err| Error::Signature(err.to_string()))
    }

    /// Strictly verifies `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), Error> {
        self.0
            .verify_strict(message, &signature.0)
            .map_err(|err| Error::Signature(err.to_string()))
    }
}

impl From<VerifyingKey> for Ed25519PublicKey {
    fn from(value: VerifyingKey) -> Self {
        Self(value)
    }
}

/// Detached Ed25519 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature(Signature);

impl Ed25519Signature {
    /// Raw signature bytes.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Unpadded base64 text form.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Parses the unpadded base64 text form.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        let bytes = base64_decode_array::<64>(input, "Ed25519 signature")?;
        Ok(Self(Signature::from_bytes(&bytes)))
    }
}

impl From<Signature> for Ed25519Signature {
    fn from(value: Signature) -> Self {
        Self(value)
    }
}
