//! Schema of pickled state.

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct AccountProto {
    #[prost(uint32, tag = "1")]
    pub(crate) version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub(crate) identity_key: Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub(crate) one_time_keys: Vec<OneTimeKeyProto>,
    #[prost(uint32, tag = "4")]
    pub(crate) next_one_time_key_id: u32,
    #[prost(message, optional, tag = "5")]
    pub(crate) config: Option<AccountConfigProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct OneTimeKeyProto {
    #[prost(uint32, tag = "1")]
    pub(crate) id: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub(crate) key: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub(crate) published: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct AccountConfigProto {
    #[prost(uint64, tag = "1")]
    pub(crate) max_one_time_keys: u64,
    #[prost(uint64, tag = "2")]
    pub(crate) max_skipped_message_keys: u64,
    #[prost(uint32, tag = "3")]
    pub(crate) max_message_gap: u32,
    #[prost(uint64, tag = "4")]
    pub(crate) max_receiving_chains: u64,
    #[prost(bytes = "vec", tag = "5")]
    pub(crate) protocol_info: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct SessionProto {
    #[prost(uint32, tag = "1")]
    pub(crate) version: u32,
    #[prost(bool, tag = "2")]
    pub(crate) initiator: bool,
    #[prost(bytes = "vec", tag = "3")]
    pub(crate) identity_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub(crate) base_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub(crate) one_time_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub(crate) associated_data: Vec<u8>,
    #[prost(bool, tag = "7")]
    pub(crate) received_message: bool,
    #[prost(message, optional, tag = "8")]
    pub(crate) ratchet: Option<RatchetProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct RatchetProto {
    #[prost(bytes = "vec", tag = "1")]
    pub(crate) root_key: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub(crate) sending_chain: Option<SendingChainProto>,
    #[prost(message, repeated, tag = "3")]
    pub(crate) receiving_chains: Vec<ReceivingChainProto>,
    #[prost(message, repeated, tag = "4")]
    pub(crate) skipped_message_keys: Vec<SkippedMessageKeyProto>,
    #[prost(uint64, tag = "5")]
    pub(crate) max_skipped_message_keys: u64,
    #[prost(uint32, tag = "6")]
    pub(crate) max_message_gap: u32,
    #[prost(uint64, tag = "7")]
    pub(crate) max_receiving_chains: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct SendingChainProto {
    #[prost(bytes = "vec", tag = "1")]
    pub(crate) ratchet_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub(crate) chain_key: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub(crate) index: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct ReceivingChainProto {
    #[prost(bytes = "vec", tag = "1")]
    pub(crate) ratchet_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub(crate) chain_key: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub(crate) index: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct SkippedMessageKeyProto {
    #[prost(bytes = "vec", tag = "1")]
    pub(crate) ratchet_key: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub(crate) index: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub(crate) message_key: Vec<u8>,
}
