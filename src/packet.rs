use crate::protocol::{CommandKind, ReturnCode, TopicIdType};
use bytes::Bytes;

/// Topic reference carried in the two-byte topic id slot of PUBLISH.
///
/// A short topic puts its two-character name directly in the slot; the other
/// topic id types put a numeric id there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicId {
    Id(u16),
    Short(String),
}

/// One MQTT-SN message, keyed by command kind.
///
/// Each variant carries only the fields that kind defines on the wire. The
/// declared frame length and the parse cursor are decoder-local scratch and
/// deliberately not part of this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Advertise {
        gw_id: u8,
        duration: u16,
    },
    SearchGw {
        radius: u8,
    },
    GwInfo {
        gw_id: u8,
        /// Gateway address, present only when parsed in the client role.
        gw_add: Option<Bytes>,
    },
    Connect {
        will: bool,
        clean_session: bool,
        duration: u16,
        client_id: String,
    },
    ConnAck {
        return_code: ReturnCode,
    },
    WillTopicReq,
    WillTopic {
        qos: u8,
        retain: bool,
        /// `None` encodes the empty form used to delete the will.
        will_topic: Option<String>,
    },
    WillMsgReq,
    WillMsg {
        will_msg: String,
    },
    Register {
        topic_id: u16,
        msg_id: u16,
        topic_name: String,
    },
    RegAck {
        topic_id: u16,
        msg_id: u16,
        return_code: ReturnCode,
    },
    Publish {
        dup: bool,
        qos: u8,
        retain: bool,
        topic_id_type: TopicIdType,
        topic_id: TopicId,
        msg_id: u16,
        payload: Bytes,
    },
    PubAck {
        topic_id: u16,
        msg_id: u16,
        return_code: ReturnCode,
    },
    PubComp {
        msg_id: u16,
    },
    PubRec {
        msg_id: u16,
    },
    PubRel {
        msg_id: u16,
    },
    Subscribe {
        dup: bool,
        qos: u8,
        topic_id_type: TopicIdType,
        msg_id: u16,
        /// Set for the normal and short-topic id types.
        topic_name: Option<String>,
        /// Set for the pre-defined id type.
        topic_id: Option<u16>,
    },
    SubAck {
        qos: u8,
        topic_id: u16,
        msg_id: u16,
        return_code: ReturnCode,
    },
    Unsubscribe {
        topic_id_type: TopicIdType,
        msg_id: u16,
        topic_name: Option<String>,
        topic_id: Option<u16>,
    },
    UnsubAck {
        msg_id: u16,
    },
    PingReq {
        client_id: Option<String>,
    },
    PingResp,
    Disconnect {
        duration: Option<u16>,
    },
    WillTopicUpd {
        qos: u8,
        retain: bool,
        will_topic: Option<String>,
    },
    WillTopicResp {
        return_code: ReturnCode,
    },
    WillMsgUpd {
        will_msg: String,
    },
    WillMsgResp {
        return_code: ReturnCode,
    },
    /// Forwarding envelope: routing metadata plus one inner frame captured
    /// verbatim, not decoded.
    Encapsulated {
        radius: u8,
        wireless_node_id: String,
        message: Bytes,
    },
}

impl Packet {
    /// The command kind this packet encodes as.
    pub fn kind(&self) -> CommandKind {
        match self {
            Packet::Advertise { .. } => CommandKind::Advertise,
            Packet::SearchGw { .. } => CommandKind::SearchGw,
            Packet::GwInfo { .. } => CommandKind::GwInfo,
            Packet::Connect { .. } => CommandKind::Connect,
            Packet::ConnAck { .. } => CommandKind::ConnAck,
            Packet::WillTopicReq => CommandKind::WillTopicReq,
            Packet::WillTopic { .. } => CommandKind::WillTopic,
            Packet::WillMsgReq => CommandKind::WillMsgReq,
            Packet::WillMsg { .. } => CommandKind::WillMsg,
            Packet::Register { .. } => CommandKind::Register,
            Packet::RegAck { .. } => CommandKind::RegAck,
            Packet::Publish { .. } => CommandKind::Publish,
            Packet::PubAck { .. } => CommandKind::PubAck,
            Packet::PubComp { .. } => CommandKind::PubComp,
            Packet::PubRec { .. } => CommandKind::PubRec,
            Packet::PubRel { .. } => CommandKind::PubRel,
            Packet::Subscribe { .. } => CommandKind::Subscribe,
            Packet::SubAck { .. } => CommandKind::SubAck,
            Packet::Unsubscribe { .. } => CommandKind::Unsubscribe,
            Packet::UnsubAck { .. } => CommandKind::UnsubAck,
            Packet::PingReq { .. } => CommandKind::PingReq,
            Packet::PingResp => CommandKind::PingResp,
            Packet::Disconnect { .. } => CommandKind::Disconnect,
            Packet::WillTopicUpd { .. } => CommandKind::WillTopicUpd,
            Packet::WillTopicResp { .. } => CommandKind::WillTopicResp,
            Packet::WillMsgUpd { .. } => CommandKind::WillMsgUpd,
            Packet::WillMsgResp { .. } => CommandKind::WillMsgResp,
            Packet::Encapsulated { .. } => CommandKind::Encapsulated,
        }
    }
}
