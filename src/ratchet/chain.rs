use crate::{Error, X25519PublicKey, X25519Secret};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

const MESSAGE_KEY_SEED: &[u8] = &[0x02];
const CHAIN_KEY_SEED: &[u8] = &[0x01];

/// Ratchet chain for deriving keys
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Chain {
    pub(crate) chain_key: Box<[u8; 32]>,
    pub(crate) index: u32,
}

/// Key for exactly one message, tagged with the chain index it was derived at.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct MessageKey {
    pub(crate) key: Box<[u8; 32]>,
    pub(crate) index: u32,
}

impl Chain {
    pub(crate) fn new(chain_key: Box<[u8; 32]>) -> Self {
        Self {
            chain_key,
            index: 0,
        }
    }

    /// Advances the chain and returns the message key for the current index.
    ///
    /// The previous chain key is overwritten, so earlier message keys can no
    /// longer be derived from this chain.
    pub(crate) fn next(&mut self) -> Result<MessageKey, Error> {
        let index = self.index;
        let next_index = index
            .checked_add(1)
            .ok_or_else(|| Error::Crypto("Chain index exhausted".to_string()))?;

        let message_key = hmac(&self.chain_key, MESSAGE_KEY_SEED)?;
        let mut chain_key = hmac(&self.chain_key, CHAIN_KEY_SEED)?;

        self.chain_key.copy_from_slice(chain_key.as_slice());
        chain_key.zeroize();
        self.index = next_index;

        Ok(MessageKey {
            key: message_key,
            index,
        })
    }
}

fn hmac(key: &[u8; 32], seed: &[u8]) -> Result<Box<[u8; 32]>, Error> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_slice())
        .map_err(|_| Error::Crypto("HMAC initialization failed".to_string()))?;
    mac.update(seed);

    let mut output = Box::new([0u8; 32]);
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

/// Our current sending chain and the ratchet secret it was created with.
#[derive(Clone)]
pub(crate) struct SendingChain {
    pub(crate) ratchet_key: X25519Secret,
    pub(crate) chain: Chain,
}

/// A chain for messages sent under one of the peer's ratchet keys.
#[derive(Clone)]
pub(crate) struct ReceivingChain {
    pub(crate) ratchet_key: X25519PublicKey,
    pub(crate) chain: Chain,
}

/// A message key derived ahead of time for a message not yet received.
#[derive(Clone)]
pub(crate) struct SkippedMessageKey {
    pub(crate) ratchet_key: X25519PublicKey,
    pub(crate) message_key: MessageKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_advances_irreversibly() {
        let mut chain = Chain::new(Box::new([7u8; 32]));
        let initial_chain_key = chain.chain_key.clone();

        let first = chain.next().unwrap();
        let second = chain.next().unwrap();

        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(chain.index, 2);
        assert_ne!(first.key, second.key);
        assert_ne!(chain.chain_key, initial_chain_key);
        // Neither message key is the chain key it was derived from.
        assert_ne!(*first.key, *initial_chain_key);
    }

    #[test]
    fn test_old_message_key_is_not_derivable_from_current_chain() {
        let mut chain = Chain::new(Box::new([5u8; 32]));
        for _ in 0..3 {
            chain.next().unwrap();
        }
        let previous = chain.next().unwrap();

        let mut forward = chain.clone();
        for _ in 0..100 {
            let key = forward.next().unwrap();
            assert_ne!(key.key, previous.key);
            assert_ne!(forward.chain_key, previous.key);
        }
        assert_ne!(chain.chain_key, previous.key);
    }

    #[test]
    fn test_chains_with_same_key_agree() {
        let mut a = Chain::new(Box::new([3u8; 32]));
        let mut b = Chain::new(Box::new([3u8; 32]));

        for _ in 0..5 {
            assert_eq!(a.next().unwrap().key, b.next().unwrap().key);
        }
    }

    #[test]
    fn test_exhausted_chain_is_an_error() {
        let mut chain = Chain::new(Box::new([1u8; 32]));
        chain.index = u32::MAX;
        let chain_key = chain.chain_key.clone();

        assert!(matches!(chain.next(), Err(Error::Crypto(_))));
        assert_eq!(chain.chain_key, chain_key);
    }
}
