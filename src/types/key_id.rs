use crate::Error;
use crate::types::{base64_decode_array, base64_encode};

/// Identifier of a one-time key inside an account.
///
/// Ids are handed out in ascending order and never reused. The text form is
/// the unpadded base64 of the big-endian id, so id 1 renders as `AAAAAQ`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(pub(crate) u32);

impl KeyId {
    /// Numeric value of the id.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Text form used in published key maps.
    pub fn to_base64(&self) -> String {
        base64_encode(self.0.to_be_bytes())
    }

    /// Parses the text form.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        let bytes = base64_decode_array::<4>(input, "key id")?;
        Ok(Self(u32::from_be_bytes(bytes)))
    }
}

impl From<u32> for KeyId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
