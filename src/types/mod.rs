mod ed25519;
mod key_id;
mod x25519;

pub use ed25519::{Ed25519PublicKey, Ed25519Signature};
pub use key_id::KeyId;
pub use x25519::X25519PublicKey;
pub(crate) use x25519::X25519Secret;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;

/// Encodes bytes as unpadded standard base64, the text form of every key,
/// signature, message and pickle in this crate.
pub(crate) fn base64_encode(bytes: impl AsRef<[u8]>) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

pub(crate) fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD_NO_PAD.decode(input)
}

/// Decodes base64 text that must contain exactly `N` bytes.
pub(crate) fn base64_decode_array<const N: usize>(
    input: &str,
    what: &str,
) -> Result<[u8; N], crate::Error> {
    let bytes = base64_decode(input)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        crate::Error::BadMessage(format!(
            "Invalid {what} length: expected {N} bytes, got {}",
            bytes.len()
        ))
    })
}
