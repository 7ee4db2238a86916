use crate::{Error, KeyId, X25519PublicKey, X25519Secret};
use rand::{TryCryptoRng, TryRngCore};
use std::collections::BTreeMap;

/// A one-time key as published for session establishment.
///
/// Each key is consumed by at most one inbound session. Consumed keys are
/// removed from the store, and their secret is zeroized when dropped.
#[derive(Clone)]
pub(crate) struct OneTimeKey {
    pub(crate) id: KeyId,
    pub(crate) key: X25519Secret,
    pub(crate) published: bool,
}

impl OneTimeKey {
    pub(crate) fn public_key(&self) -> X25519PublicKey {
        self.key.public_key()
    }
}

/// Ordered storage for one-time keys with monotonically allocated ids.
#[derive(Clone)]
pub(crate) struct OneTimeKeyStore {
    pub(crate) keys: BTreeMap<KeyId, OneTimeKey>,
    pub(crate) next_id: u32,
}

impl Default for OneTimeKeyStore {
    fn default() -> Self {
        Self {
            keys: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl OneTimeKeyStore {
    /// Generates `count` new keys.
    ///
    /// Either every key is added or, if randomness or ids run out, none is.
    pub(crate) fn generate_from<R>(&mut self, rng: &mut R, count: usize) -> Result<Vec<KeyId>, Error>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let mut next_id = self.next_id;
        let mut generated = Vec::with_capacity(count);

        for _ in 0..count {
            let id = KeyId(next_id);
            next_id = next_id
                .checked_add(1)
                .ok_or_else(|| Error::Crypto("One-time key ids exhausted".to_string()))?;
            generated.push(OneTimeKey {
                id,
                key: X25519Secret::generate_from(rng)?,
                published: false,
            });
        }

        self.next_id = next_id;
        let ids = generated.iter().map(|key| key.id).collect();
        for key in generated {
            self.keys.insert(key.id, key);
        }

        Ok(ids)
    }

    /// Public parts of the keys that have not been published yet.
    pub(crate) fn unpublished_public_keys(&self) -> BTreeMap<KeyId, X25519PublicKey> {
        self.keys
            .values()
            .filter(|key| !key.published)
            .map(|key| (key.id, key.public_key()))
            .collect()
    }

    pub(crate) fn unpublished_count(&self) -> usize {
        self.keys.values().filter(|key| !key.published).count()
    }

    pub(crate) fn mark_as_published(&mut self) {
        for key in self.keys.values_mut() {
            key.published = true;
        }
    }

    /// Removes and returns the key whose public part is `public_key`.
    pub(crate) fn take(&mut self, public_key: &X25519PublicKey) -> Option<OneTimeKey> {
        let id = self
            .keys
            .values()
            .find(|key| key.public_key() == *public_key)
            .map(|key| key.id)?;

        self.keys.remove(&id)
    }
}
