use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::CodecError;
use crate::packet::{Packet, TopicId};
use crate::protocol::{
    CommandKind, ReturnCode, Role, TopicIdType, CLEAN_MASK, DUP_MASK, LENGTH_ESCAPE, PROTOCOL_ID,
    QOS_MASK, QOS_SHIFT, RADIUS_MASK, RETAIN_MASK, TOPIC_ID_TYPE_MASK, WILL_MASK,
};

/// One decode result, delivered in strict frame order.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    Packet(Packet),
    Error(CodecError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Header,
    Payload,
    Advance,
}

/// Decode-only scratch for the frame currently in flight. Never exposed.
#[derive(Debug)]
struct Frame {
    kind: CommandKind,
    code: u8,
    header_len: usize,
    payload_len: usize,
    /// Bytes to release at ADVANCE: header plus payload, plus the inner
    /// frame for an encapsulated envelope.
    total_len: usize,
    result: Option<Result<Packet, CodecError>>,
}

/// Incremental MQTT-SN frame decoder.
///
/// Bytes go in through [`Decoder::feed`] in chunks of any size; completed
/// packets and per-frame errors come out of [`Decoder::next_event`] in the
/// order their frames appeared on the wire. The decoder owns a single growing
/// buffer and never blocks: when a frame is incomplete, `feed` simply returns
/// with the bytes retained for the next call.
#[derive(Debug)]
pub struct Decoder {
    role: Role,
    buf: BytesMut,
    state: State,
    frame: Option<Frame>,
    events: VecDeque<DecodeEvent>,
}

impl Decoder {
    /// Creates a decoder for one logical connection.
    ///
    /// The role decides how GWINFO payloads are parsed: clients expect a
    /// trailing gateway address, gateways do not.
    pub fn new(role: Role) -> Self {
        Decoder {
            role,
            buf: BytesMut::new(),
            state: State::Header,
            frame: None,
            events: VecDeque::new(),
        }
    }

    /// Appends bytes and decodes as many complete frames as possible.
    ///
    /// Returns the number of buffered bytes not yet consumed by a fully
    /// parsed frame. Results are queued for [`Decoder::next_event`].
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        self.buf.extend_from_slice(bytes);
        loop {
            let done = match self.state {
                State::Header => self.parse_header(),
                State::Payload => self.parse_payload(),
                State::Advance => self.advance(),
            };
            if !done {
                break;
            }
            self.state = match self.state {
                State::Header => State::Payload,
                State::Payload => State::Advance,
                State::Advance => State::Header,
            };
        }
        self.buf.len()
    }

    /// Pops the next packet or error event, oldest first.
    pub fn next_event(&mut self) -> Option<DecodeEvent> {
        self.events.pop_front()
    }

    /// Number of buffered bytes not yet released to a parsed frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn parse_header(&mut self) -> bool {
        let Some((declared, header_len, code)) = peek_header(&self.buf, 0) else {
            return false;
        };
        let kind = CommandKind::from_code(code);
        self.frame = Some(if declared < header_len {
            // A frame shorter than its own header cannot carry a payload;
            // skip the header bytes and report the bogus length.
            Frame {
                kind,
                code,
                header_len,
                payload_len: 0,
                total_len: header_len,
                result: Some(Err(CodecError::LengthMismatch {
                    cmd: kind,
                    length: declared,
                })),
            }
        } else {
            Frame {
                kind,
                code,
                header_len,
                payload_len: declared - header_len,
                total_len: declared,
                result: None,
            }
        });
        true
    }

    fn parse_payload(&mut self) -> bool {
        let role = self.role;
        let Some(frame) = self.frame.as_mut() else {
            return true;
        };
        if frame.result.is_some() {
            return true;
        }

        let start = frame.header_len;
        let end = start + frame.payload_len;
        if self.buf.len() < end {
            return false;
        }

        if frame.kind == CommandKind::Encapsulated {
            if frame.payload_len < 1 {
                frame.result = Some(Err(CodecError::LengthMismatch {
                    cmd: frame.kind,
                    length: frame.payload_len,
                }));
                return true;
            }
            // The inner frame rides behind the envelope, outside its
            // declared length.
            let Some((inner_declared, inner_hdr, inner_code)) = peek_header(&self.buf, end) else {
                return false;
            };
            let inner_total = inner_declared.max(inner_hdr);
            if self.buf.len() < end + inner_total {
                return false;
            }
            frame.total_len = end + inner_total;
            if CommandKind::from_code(inner_code) == CommandKind::Encapsulated {
                frame.result = Some(Err(CodecError::NestedEncapsulation));
            } else {
                let radius = self.buf[start] & RADIUS_MASK;
                let wireless_node_id =
                    String::from_utf8_lossy(&self.buf[start + 1..end]).into_owned();
                let message = Bytes::copy_from_slice(&self.buf[end..end + inner_total]);
                frame.result = Some(Ok(Packet::Encapsulated {
                    radius,
                    wireless_node_id,
                    message,
                }));
            }
        } else {
            frame.result = Some(parse_body(
                role,
                frame.kind,
                frame.code,
                &self.buf[start..end],
            ));
        }
        true
    }

    fn advance(&mut self) -> bool {
        if let Some(frame) = self.frame.take() {
            self.buf.advance(frame.total_len);
            match frame.result {
                Some(Ok(packet)) => {
                    debug!(cmd = %packet.kind(), len = frame.total_len, "decoded packet");
                    self.events.push_back(DecodeEvent::Packet(packet));
                }
                Some(Err(e)) => {
                    warn!(cmd = %frame.kind, error = %e, "discarding malformed frame");
                    self.events.push_back(DecodeEvent::Error(e));
                }
                None => {}
            }
        }
        true
    }
}

/// Reads a frame header at `at` without consuming it.
///
/// Returns `(declared length, header length, command code)`, or `None` when
/// the buffered bytes cannot yet tell which header form is in play.
fn peek_header(buf: &[u8], at: usize) -> Option<(usize, usize, u8)> {
    if buf.len() < at + 2 {
        return None;
    }
    if buf[at] == LENGTH_ESCAPE {
        if buf.len() < at + 4 {
            return None;
        }
        let declared = u16::from_be_bytes([buf[at + 1], buf[at + 2]]) as usize;
        Some((declared, 4, buf[at + 3]))
    } else {
        Some((buf[at] as usize, 2, buf[at + 1]))
    }
}

fn parse_body(
    role: Role,
    kind: CommandKind,
    code: u8,
    payload: &[u8],
) -> Result<Packet, CodecError> {
    match kind {
        CommandKind::Advertise => parse_advertise(payload),
        CommandKind::SearchGw => parse_searchgw(payload),
        CommandKind::GwInfo => parse_gwinfo(role, payload),
        CommandKind::Connect => parse_connect(payload),
        CommandKind::ConnAck | CommandKind::WillTopicResp | CommandKind::WillMsgResp => {
            parse_resp_return_code(kind, payload)
        }
        CommandKind::WillTopic | CommandKind::WillTopicUpd => parse_will_topic(kind, payload),
        CommandKind::WillMsg => Ok(Packet::WillMsg {
            will_msg: String::from_utf8_lossy(payload).into_owned(),
        }),
        CommandKind::WillMsgUpd => Ok(Packet::WillMsgUpd {
            will_msg: String::from_utf8_lossy(payload).into_owned(),
        }),
        CommandKind::Register => parse_register(payload),
        CommandKind::RegAck => parse_regack(payload),
        CommandKind::Publish => parse_publish(payload),
        CommandKind::PubAck => parse_puback(payload),
        CommandKind::PubComp | CommandKind::PubRec | CommandKind::PubRel | CommandKind::UnsubAck => {
            parse_msg_id(kind, payload)
        }
        CommandKind::Subscribe | CommandKind::Unsubscribe => {
            parse_subscribe_unsubscribe(kind, payload)
        }
        CommandKind::SubAck => parse_suback(payload),
        CommandKind::PingReq => parse_pingreq(payload),
        CommandKind::PingResp => parse_empty(kind, payload, Packet::PingResp),
        CommandKind::WillTopicReq => parse_empty(kind, payload, Packet::WillTopicReq),
        CommandKind::WillMsgReq => parse_empty(kind, payload, Packet::WillMsgReq),
        CommandKind::Disconnect => parse_disconnect(payload),
        CommandKind::Encapsulated | CommandKind::Reserved => {
            Err(CodecError::UnsupportedCommand(code))
        }
    }
}

fn wrong_len(cmd: CommandKind, length: usize) -> CodecError {
    CodecError::LengthMismatch { cmd, length }
}

fn parse_advertise(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() != 3 {
        return Err(wrong_len(CommandKind::Advertise, p.len()));
    }
    Ok(Packet::Advertise {
        gw_id: p[0],
        duration: u16::from_be_bytes([p[1], p[2]]),
    })
}

fn parse_searchgw(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() != 1 {
        return Err(wrong_len(CommandKind::SearchGw, p.len()));
    }
    Ok(Packet::SearchGw { radius: p[0] })
}

fn parse_gwinfo(role: Role, p: &[u8]) -> Result<Packet, CodecError> {
    match role {
        Role::Gateway => {
            if p.len() != 1 {
                return Err(wrong_len(CommandKind::GwInfo, p.len()));
            }
            Ok(Packet::GwInfo {
                gw_id: p[0],
                gw_add: None,
            })
        }
        Role::Client => {
            if p.len() < 2 {
                return Err(wrong_len(CommandKind::GwInfo, p.len()));
            }
            let add_len = p[1] as usize;
            if p.len() != 2 + add_len {
                return Err(wrong_len(CommandKind::GwInfo, p.len()));
            }
            Ok(Packet::GwInfo {
                gw_id: p[0],
                gw_add: Some(Bytes::copy_from_slice(&p[2..])),
            })
        }
    }
}

fn parse_connect(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() < 5 {
        return Err(wrong_len(CommandKind::Connect, p.len()));
    }
    let flags = parse_flags(CommandKind::Connect, p[0])?;
    if p[1] != PROTOCOL_ID {
        return Err(CodecError::InvalidEnum {
            field: "protocol id",
            value: p[1],
        });
    }
    let mut pos = 2;
    let duration = read_u16(p, &mut pos, "duration")?;
    let client_id = read_prefixed_string(p, &mut pos, "client ID")?;
    Ok(Packet::Connect {
        will: flags.will,
        clean_session: flags.clean_session,
        duration,
        client_id,
    })
}

fn parse_resp_return_code(kind: CommandKind, p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() != 1 {
        return Err(wrong_len(kind, p.len()));
    }
    let return_code = ReturnCode::from_byte(p[0]);
    Ok(match kind {
        CommandKind::WillTopicResp => Packet::WillTopicResp { return_code },
        CommandKind::WillMsgResp => Packet::WillMsgResp { return_code },
        _ => Packet::ConnAck { return_code },
    })
}

fn parse_will_topic(kind: CommandKind, p: &[u8]) -> Result<Packet, CodecError> {
    let (qos, retain, will_topic) = if p.is_empty() {
        (0, false, None)
    } else {
        let flags = parse_flags(kind, p[0])?;
        let topic = String::from_utf8_lossy(&p[1..]).into_owned();
        (flags.qos, flags.retain, Some(topic))
    };
    Ok(match kind {
        CommandKind::WillTopicUpd => Packet::WillTopicUpd {
            qos,
            retain,
            will_topic,
        },
        _ => Packet::WillTopic {
            qos,
            retain,
            will_topic,
        },
    })
}

fn parse_register(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() < 4 {
        return Err(wrong_len(CommandKind::Register, p.len()));
    }
    Ok(Packet::Register {
        topic_id: u16::from_be_bytes([p[0], p[1]]),
        msg_id: u16::from_be_bytes([p[2], p[3]]),
        topic_name: String::from_utf8_lossy(&p[4..]).into_owned(),
    })
}

fn parse_regack(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() != 5 {
        return Err(wrong_len(CommandKind::RegAck, p.len()));
    }
    Ok(Packet::RegAck {
        topic_id: u16::from_be_bytes([p[0], p[1]]),
        msg_id: u16::from_be_bytes([p[2], p[3]]),
        return_code: ReturnCode::from_byte(p[4]),
    })
}

fn parse_publish(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() < 5 {
        return Err(wrong_len(CommandKind::Publish, p.len()));
    }
    let flags = parse_flags(CommandKind::Publish, p[0])?;
    let topic_id = match flags.topic_id_type {
        TopicIdType::ShortTopic => TopicId::Short(String::from_utf8_lossy(&p[1..3]).into_owned()),
        _ => TopicId::Id(u16::from_be_bytes([p[1], p[2]])),
    };
    Ok(Packet::Publish {
        dup: flags.dup,
        qos: flags.qos,
        retain: flags.retain,
        topic_id_type: flags.topic_id_type,
        topic_id,
        msg_id: u16::from_be_bytes([p[3], p[4]]),
        payload: Bytes::copy_from_slice(&p[5..]),
    })
}

fn parse_puback(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() != 5 {
        return Err(wrong_len(CommandKind::PubAck, p.len()));
    }
    Ok(Packet::PubAck {
        topic_id: u16::from_be_bytes([p[0], p[1]]),
        msg_id: u16::from_be_bytes([p[2], p[3]]),
        return_code: ReturnCode::from_byte(p[4]),
    })
}

fn parse_msg_id(kind: CommandKind, p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() != 2 {
        return Err(wrong_len(kind, p.len()));
    }
    let msg_id = u16::from_be_bytes([p[0], p[1]]);
    Ok(match kind {
        CommandKind::PubComp => Packet::PubComp { msg_id },
        CommandKind::PubRec => Packet::PubRec { msg_id },
        CommandKind::PubRel => Packet::PubRel { msg_id },
        _ => Packet::UnsubAck { msg_id },
    })
}

fn parse_subscribe_unsubscribe(kind: CommandKind, p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() < 3 {
        return Err(wrong_len(kind, p.len()));
    }
    let flags = parse_flags(kind, p[0])?;
    let msg_id = u16::from_be_bytes([p[1], p[2]]);
    let (topic_name, topic_id) = match flags.topic_id_type {
        TopicIdType::Normal | TopicIdType::ShortTopic => (
            Some(String::from_utf8_lossy(&p[3..]).into_owned()),
            None,
        ),
        TopicIdType::PreDefined => {
            if p.len() != 5 {
                return Err(wrong_len(kind, p.len()));
            }
            (None, Some(u16::from_be_bytes([p[3], p[4]])))
        }
    };
    Ok(match kind {
        CommandKind::Subscribe => Packet::Subscribe {
            dup: flags.dup,
            qos: flags.qos,
            topic_id_type: flags.topic_id_type,
            msg_id,
            topic_name,
            topic_id,
        },
        _ => Packet::Unsubscribe {
            topic_id_type: flags.topic_id_type,
            msg_id,
            topic_name,
            topic_id,
        },
    })
}

fn parse_suback(p: &[u8]) -> Result<Packet, CodecError> {
    if p.len() != 6 {
        return Err(wrong_len(CommandKind::SubAck, p.len()));
    }
    let flags = parse_flags(CommandKind::SubAck, p[0])?;
    Ok(Packet::SubAck {
        qos: flags.qos,
        topic_id: u16::from_be_bytes([p[1], p[2]]),
        msg_id: u16::from_be_bytes([p[3], p[4]]),
        return_code: ReturnCode::from_byte(p[5]),
    })
}

fn parse_pingreq(p: &[u8]) -> Result<Packet, CodecError> {
    let client_id = if p.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(p).into_owned())
    };
    Ok(Packet::PingReq { client_id })
}

fn parse_empty(kind: CommandKind, p: &[u8], packet: Packet) -> Result<Packet, CodecError> {
    if !p.is_empty() {
        return Err(wrong_len(kind, p.len()));
    }
    Ok(packet)
}

fn parse_disconnect(p: &[u8]) -> Result<Packet, CodecError> {
    match p.len() {
        0 => Ok(Packet::Disconnect { duration: None }),
        2 => Ok(Packet::Disconnect {
            duration: Some(u16::from_be_bytes([p[0], p[1]])),
        }),
        n => Err(wrong_len(CommandKind::Disconnect, n)),
    }
}

/// Flag byte fields, populated only where the command kind defines them.
#[derive(Debug)]
struct Flags {
    dup: bool,
    qos: u8,
    retain: bool,
    will: bool,
    clean_session: bool,
    topic_id_type: TopicIdType,
}

/// Shared flag-byte interpretation, keyed on command kind. Bits that a kind
/// does not define are left at their defaults.
fn parse_flags(kind: CommandKind, byte: u8) -> Result<Flags, CodecError> {
    let mut flags = Flags {
        dup: false,
        qos: 0,
        retain: false,
        will: false,
        clean_session: false,
        topic_id_type: TopicIdType::Normal,
    };

    if matches!(kind, CommandKind::Publish | CommandKind::Subscribe) {
        flags.dup = byte & DUP_MASK != 0;
    }
    if matches!(
        kind,
        CommandKind::WillTopic
            | CommandKind::WillTopicUpd
            | CommandKind::Publish
            | CommandKind::Subscribe
            | CommandKind::SubAck
    ) {
        flags.qos = (byte & QOS_MASK) >> QOS_SHIFT;
    }
    if matches!(
        kind,
        CommandKind::WillTopic | CommandKind::WillTopicUpd | CommandKind::Publish
    ) {
        flags.retain = byte & RETAIN_MASK != 0;
    }
    if kind == CommandKind::Connect {
        flags.will = byte & WILL_MASK != 0;
        flags.clean_session = byte & CLEAN_MASK != 0;
    }
    if matches!(
        kind,
        CommandKind::Publish | CommandKind::Subscribe | CommandKind::Unsubscribe
    ) {
        flags.topic_id_type =
            TopicIdType::from_bits(byte).ok_or(CodecError::InvalidEnum {
                field: "topic id type",
                value: byte & TOPIC_ID_TYPE_MASK,
            })?;
    }
    Ok(flags)
}

fn read_u16(data: &[u8], pos: &mut usize, what: &'static str) -> Result<u16, CodecError> {
    if *pos + 2 > data.len() {
        return Err(CodecError::TruncatedField(what));
    }
    let value = u16::from_be_bytes([data[*pos], data[*pos + 1]]);
    *pos += 2;
    Ok(value)
}

fn read_prefixed_string(
    data: &[u8],
    pos: &mut usize,
    what: &'static str,
) -> Result<String, CodecError> {
    let len = read_u16(data, pos, what)? as usize;
    if *pos + len > data.len() {
        return Err(CodecError::TruncatedField(what));
    }
    let s = String::from_utf8_lossy(&data[*pos..*pos + len]).into_owned();
    *pos += len;
    Ok(s)
}
