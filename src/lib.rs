mod account;
pub use account::{Account, AccountConfig, IdentityKeys, OneTimeKeys, PublicKeyBundle};

mod error;
pub use error::Error;

mod messages;
pub use messages::{Message, MessageType, NormalMessage, PreKeyMessage};

mod pickle;
mod random;
mod ratchet;

mod session;
pub use session::{Role, Session, SessionKeys};

mod types;
pub use types::{Ed25519PublicKey, Ed25519Signature, KeyId, X25519PublicKey};
pub(crate) use types::X25519Secret;

mod x3dh;

/// Version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Verifies an Ed25519 `signature` over `message`, both keys and signature
/// given in their unpadded base64 text form.
pub fn verify_signature(signing_key: &str, message: impl AsRef<[u8]>, signature: &str) -> Result<(), Error> {
    let signing_key = Ed25519PublicKey::from_base64(signing_key)?;
    let signature = Ed25519Signature::from_base64(signature)?;

    signing_key.verify(message.as_ref(), &signature)
}
