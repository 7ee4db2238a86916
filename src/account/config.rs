use crate::ratchet::RatchetConfig;

/// Limits and protocol parameters of an account and the sessions it creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountConfig {
    /// Number of unpublished one-time keys the account is expected to hold.
    ///
    /// Advisory: generating more only logs a warning.
    pub max_one_time_keys: usize,
    /// Message keys cached per session for out-of-order delivery.
    pub max_skipped_message_keys: usize,
    /// Largest counter jump accepted within one chain.
    pub max_message_gap: u32,
    /// Receiving chains kept per session for late messages.
    pub max_receiving_chains: usize,
    /// Context of the handshake key derivation. Both parties must agree on it.
    pub protocol_info: Vec<u8>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            max_one_time_keys: 100,
            max_skipped_message_keys: 40,
            max_message_gap: 2000,
            max_receiving_chains: 5,
            protocol_info: b"Duet-E2E-v1".to_vec(),
        }
    }
}

impl AccountConfig {
    pub(crate) fn ratchet_config(&self) -> RatchetConfig {
        RatchetConfig {
            max_skipped_message_keys: self.max_skipped_message_keys,
            max_message_gap: self.max_message_gap,
            max_receiving_chains: self.max_receiving_chains,
        }
    }
}
