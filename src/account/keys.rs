use crate::{Error, KeyId, X25519PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Public identity keys of an account in their text form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityKeys {
    /// The Curve25519 key used for key agreement.
    pub curve25519: String,
    /// The Ed25519 key used to verify signatures.
    pub ed25519: String,
}

impl IdentityKeys {
    /// `{"curve25519": "...", "ed25519": "..."}`
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Unpublished one-time keys, keyed by the text form of their [`KeyId`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeKeys {
    pub curve25519: BTreeMap<String, String>,
}

impl OneTimeKeys {
    /// `{"curve25519": {"AAAAAQ": "...", ...}}`
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self.curve25519.is_empty()
    }

    /// Parses the keys back into typed form.
    pub fn keys(&self) -> Result<BTreeMap<KeyId, X25519PublicKey>, Error> {
        parse_key_map(&self.curve25519)
    }
}

/// The keys an account publishes so that peers can start sessions with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    /// Unpublished one-time keys, keyed by key id.
    pub agreement: BTreeMap<String, String>,
    /// The account's Ed25519 signing key.
    pub signing: String,
}

impl PublicKeyBundle {
    /// `{"agreement": {"<keyId>": "<key>"}, "signing": "<key>"}`
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses the agreement keys back into typed form.
    pub fn agreement_keys(&self) -> Result<BTreeMap<KeyId, X25519PublicKey>, Error> {
        parse_key_map(&self.agreement)
    }
}

pub(crate) fn encode_key_map(keys: &BTreeMap<KeyId, X25519PublicKey>) -> BTreeMap<String, String> {
    keys.iter()
        .map(|(id, key)| (id.to_base64(), key.to_base64()))
        .collect()
}

fn parse_key_map(keys: &BTreeMap<String, String>) -> Result<BTreeMap<KeyId, X25519PublicKey>, Error> {
    keys.iter()
        .map(|(id, key)| Ok::<_, Error>((KeyId::from_base64(id)?, X25519PublicKey::from_base64(key)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keys_json_shape() {
        let keys = IdentityKeys {
            curve25519: "curve".to_string(),
            ed25519: "ed".to_string(),
        };
        let json = keys.to_json().unwrap();

        assert_eq!(json, r#"{"curve25519":"curve","ed25519":"ed"}"#);
        assert_eq!(IdentityKeys::from_json(&json).unwrap(), keys);
    }

    #[test]
    fn test_bundle_json_shape() {
        let mut ids = BTreeMap::new();
        ids.insert(KeyId::from(1), X25519PublicKey::from([1u8; 32]));
        let bundle = PublicKeyBundle {
            agreement: encode_key_map(&ids),
            signing: "signing".to_string(),
        };

        let value: serde_json::Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
        assert_eq!(value["agreement"]["AAAAAQ"], X25519PublicKey::from([1u8; 32]).to_base64());
        assert_eq!(value["signing"], "signing");
        assert_eq!(bundle.agreement_keys().unwrap(), ids);
    }

    #[test]
    fn test_invalid_json_is_a_serde_error() {
        assert!(matches!(
            OneTimeKeys::from_json("{\"curve25519\": 3}"),
            Err(Error::Serde(_))
        ));
    }
}
