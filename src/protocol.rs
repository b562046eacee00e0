use std::fmt;

/// Protocol ID carried in the CONNECT payload. MQTT-SN defines exactly one.
pub const PROTOCOL_ID: u8 = 0x01;

/// Length byte value that escapes to the 2-byte length form.
pub const LENGTH_ESCAPE: u8 = 0x01;

pub const DUP_MASK: u8 = 0x80;
pub const QOS_MASK: u8 = 0x60;
pub const QOS_SHIFT: u8 = 5;
pub const RETAIN_MASK: u8 = 0x10;
pub const WILL_MASK: u8 = 0x08;
pub const CLEAN_MASK: u8 = 0x04;
pub const TOPIC_ID_TYPE_MASK: u8 = 0x03;

/// Low two bits of the encapsulated-message control byte.
pub const RADIUS_MASK: u8 = 0x03;

/// Role of the endpoint owning a [`crate::Decoder`].
///
/// GWINFO is the one message whose layout depends on who is parsing it: a
/// client receives it with a trailing gateway address, a gateway without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Gateway,
}

/// MQTT-SN message kinds, one per defined command code.
///
/// Every code from 0 to 255 maps to a kind; the undefined ones collapse into
/// [`CommandKind::Reserved`], which is decode-only and carries no code of its
/// own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Advertise,
    SearchGw,
    GwInfo,
    Connect,
    ConnAck,
    WillTopicReq,
    WillTopic,
    WillMsgReq,
    WillMsg,
    Register,
    RegAck,
    Publish,
    PubAck,
    PubComp,
    PubRec,
    PubRel,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
    WillTopicUpd,
    WillTopicResp,
    WillMsgUpd,
    WillMsgResp,
    Encapsulated,
    Reserved,
}

impl CommandKind {
    /// Total mapping from command code to kind.
    pub fn from_code(code: u8) -> CommandKind {
        match code {
            0 => CommandKind::Advertise,
            1 => CommandKind::SearchGw,
            2 => CommandKind::GwInfo,
            4 => CommandKind::Connect,
            5 => CommandKind::ConnAck,
            6 => CommandKind::WillTopicReq,
            7 => CommandKind::WillTopic,
            8 => CommandKind::WillMsgReq,
            9 => CommandKind::WillMsg,
            10 => CommandKind::Register,
            11 => CommandKind::RegAck,
            12 => CommandKind::Publish,
            13 => CommandKind::PubAck,
            14 => CommandKind::PubComp,
            15 => CommandKind::PubRec,
            16 => CommandKind::PubRel,
            18 => CommandKind::Subscribe,
            19 => CommandKind::SubAck,
            20 => CommandKind::Unsubscribe,
            21 => CommandKind::UnsubAck,
            22 => CommandKind::PingReq,
            23 => CommandKind::PingResp,
            24 => CommandKind::Disconnect,
            26 => CommandKind::WillTopicUpd,
            27 => CommandKind::WillTopicResp,
            28 => CommandKind::WillMsgUpd,
            29 => CommandKind::WillMsgResp,
            254 => CommandKind::Encapsulated,
            _ => CommandKind::Reserved,
        }
    }

    /// Command code for this kind, `None` for [`CommandKind::Reserved`].
    pub fn code(self) -> Option<u8> {
        let code = match self {
            CommandKind::Advertise => 0,
            CommandKind::SearchGw => 1,
            CommandKind::GwInfo => 2,
            CommandKind::Connect => 4,
            CommandKind::ConnAck => 5,
            CommandKind::WillTopicReq => 6,
            CommandKind::WillTopic => 7,
            CommandKind::WillMsgReq => 8,
            CommandKind::WillMsg => 9,
            CommandKind::Register => 10,
            CommandKind::RegAck => 11,
            CommandKind::Publish => 12,
            CommandKind::PubAck => 13,
            CommandKind::PubComp => 14,
            CommandKind::PubRec => 15,
            CommandKind::PubRel => 16,
            CommandKind::Subscribe => 18,
            CommandKind::SubAck => 19,
            CommandKind::Unsubscribe => 20,
            CommandKind::UnsubAck => 21,
            CommandKind::PingReq => 22,
            CommandKind::PingResp => 23,
            CommandKind::Disconnect => 24,
            CommandKind::WillTopicUpd => 26,
            CommandKind::WillTopicResp => 27,
            CommandKind::WillMsgUpd => 28,
            CommandKind::WillMsgResp => 29,
            CommandKind::Encapsulated => 254,
            CommandKind::Reserved => return None,
        };
        Some(code)
    }

    /// Protocol mnemonic, as used in error messages and logs.
    pub fn mnemonic(self) -> &'static str {
        match self {
            CommandKind::Advertise => "advertise",
            CommandKind::SearchGw => "searchgw",
            CommandKind::GwInfo => "gwinfo",
            CommandKind::Connect => "connect",
            CommandKind::ConnAck => "connack",
            CommandKind::WillTopicReq => "willtopicreq",
            CommandKind::WillTopic => "willtopic",
            CommandKind::WillMsgReq => "willmsgreq",
            CommandKind::WillMsg => "willmsg",
            CommandKind::Register => "register",
            CommandKind::RegAck => "regack",
            CommandKind::Publish => "publish",
            CommandKind::PubAck => "puback",
            CommandKind::PubComp => "pubcomp",
            CommandKind::PubRec => "pubrec",
            CommandKind::PubRel => "pubrel",
            CommandKind::Subscribe => "subscribe",
            CommandKind::SubAck => "suback",
            CommandKind::Unsubscribe => "unsubscribe",
            CommandKind::UnsubAck => "unsuback",
            CommandKind::PingReq => "pingreq",
            CommandKind::PingResp => "pingresp",
            CommandKind::Disconnect => "disconnect",
            CommandKind::WillTopicUpd => "willtopicupd",
            CommandKind::WillTopicResp => "willtopicresp",
            CommandKind::WillMsgUpd => "willmsgupd",
            CommandKind::WillMsgResp => "willmsgresp",
            CommandKind::Encapsulated => "encapsulated message",
            CommandKind::Reserved => "reserved",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Return code carried by the ack-style messages.
///
/// Unknown numeric values decode to [`ReturnCode::Reserved`]; encoding
/// `Reserved` degrades to "not supported" so the mapping stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Accepted,
    RejectedCongestion,
    RejectedInvalidTopicId,
    RejectedNotSupported,
    Reserved,
}

impl ReturnCode {
    pub fn from_byte(byte: u8) -> ReturnCode {
        match byte {
            0x00 => ReturnCode::Accepted,
            0x01 => ReturnCode::RejectedCongestion,
            0x02 => ReturnCode::RejectedInvalidTopicId,
            0x03 => ReturnCode::RejectedNotSupported,
            _ => ReturnCode::Reserved,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ReturnCode::Accepted => 0x00,
            ReturnCode::RejectedCongestion => 0x01,
            ReturnCode::RejectedInvalidTopicId => 0x02,
            ReturnCode::RejectedNotSupported | ReturnCode::Reserved => 0x03,
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReturnCode::Accepted => "Accepted",
            ReturnCode::RejectedCongestion => "Rejected: congestion",
            ReturnCode::RejectedInvalidTopicId => "Rejected: invalid topic ID",
            ReturnCode::RejectedNotSupported => "Rejected: not supported",
            ReturnCode::Reserved => "reserved",
        };
        f.write_str(s)
    }
}

/// Selector for how a topic is referenced in PUBLISH/SUBSCRIBE/UNSUBSCRIBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicIdType {
    /// Numeric id obtained through registration.
    Normal,
    /// Numeric id agreed out of band.
    PreDefined,
    /// Two-character topic name carried inline in the id slot.
    ShortTopic,
}

impl TopicIdType {
    /// Decode the low two flag bits. The value 0x03 is not assigned.
    pub fn from_bits(bits: u8) -> Option<TopicIdType> {
        match bits & TOPIC_ID_TYPE_MASK {
            0x00 => Some(TopicIdType::Normal),
            0x01 => Some(TopicIdType::PreDefined),
            0x02 => Some(TopicIdType::ShortTopic),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            TopicIdType::Normal => 0x00,
            TopicIdType::PreDefined => 0x01,
            TopicIdType::ShortTopic => 0x02,
        }
    }
}
