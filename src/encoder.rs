use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::packet::{Packet, TopicId};
use crate::protocol::{
    TopicIdType, CLEAN_MASK, DUP_MASK, LENGTH_ESCAPE, PROTOCOL_ID, QOS_MASK, QOS_SHIFT,
    RADIUS_MASK, RETAIN_MASK, WILL_MASK,
};

/// Encodes one packet to its exact wire bytes.
///
/// Pure and stateless; a returned error means the packet cannot be put on the
/// wire and the caller must discard the attempt, no partial output escapes.
pub fn encode(packet: &Packet) -> Result<Bytes, CodecError> {
    let code = packet
        .kind()
        .code()
        .ok_or(CodecError::EncodeInvalidField("reserved command kind"))?;
    let mut body = BytesMut::with_capacity(32);
    body.put_u8(code);

    match packet {
        Packet::Advertise { gw_id, duration } => {
            body.put_u8(*gw_id);
            body.put_u16(*duration);
        }
        Packet::SearchGw { radius } => {
            body.put_u8(*radius);
        }
        Packet::GwInfo { gw_id, gw_add } => {
            body.put_u8(*gw_id);
            if let Some(add) = gw_add {
                if add.len() > u8::MAX as usize {
                    return Err(CodecError::EncodeInvalidField(
                        "gateway address longer than 255 bytes",
                    ));
                }
                body.put_u8(add.len() as u8);
                body.put_slice(add);
            }
        }
        Packet::Connect {
            will,
            clean_session,
            duration,
            client_id,
        } => {
            let mut flags = 0u8;
            if *will {
                flags |= WILL_MASK;
            }
            if *clean_session {
                flags |= CLEAN_MASK;
            }
            body.put_u8(flags);
            body.put_u8(PROTOCOL_ID);
            body.put_u16(*duration);
            put_prefixed_string(&mut body, client_id)?;
        }
        Packet::ConnAck { return_code }
        | Packet::WillTopicResp { return_code }
        | Packet::WillMsgResp { return_code } => {
            body.put_u8(return_code.to_byte());
        }
        Packet::WillTopicReq | Packet::WillMsgReq | Packet::PingResp => {}
        Packet::WillTopic {
            qos,
            retain,
            will_topic,
        }
        | Packet::WillTopicUpd {
            qos,
            retain,
            will_topic,
        } => {
            if let Some(topic) = will_topic {
                body.put_u8(will_flags(*qos, *retain));
                body.put_slice(topic.as_bytes());
            }
        }
        Packet::WillMsg { will_msg } | Packet::WillMsgUpd { will_msg } => {
            body.put_slice(will_msg.as_bytes());
        }
        Packet::Register {
            topic_id,
            msg_id,
            topic_name,
        } => {
            body.put_u16(*topic_id);
            body.put_u16(*msg_id);
            body.put_slice(topic_name.as_bytes());
        }
        Packet::RegAck {
            topic_id,
            msg_id,
            return_code,
        } => {
            body.put_u16(*topic_id);
            body.put_u16(*msg_id);
            body.put_u8(return_code.to_byte());
        }
        Packet::Publish {
            dup,
            qos,
            retain,
            topic_id_type,
            topic_id,
            msg_id,
            payload,
        } => {
            let mut flags = topic_id_type.bits();
            if *dup {
                flags |= DUP_MASK;
            }
            flags |= (qos << QOS_SHIFT) & QOS_MASK;
            if *retain {
                flags |= RETAIN_MASK;
            }
            body.put_u8(flags);
            put_topic_id(&mut body, topic_id)?;
            body.put_u16(*msg_id);
            body.put_slice(payload);
        }
        Packet::PubAck {
            topic_id,
            msg_id,
            return_code,
        } => {
            body.put_u16(*topic_id);
            body.put_u16(*msg_id);
            body.put_u8(return_code.to_byte());
        }
        Packet::PubComp { msg_id }
        | Packet::PubRec { msg_id }
        | Packet::PubRel { msg_id }
        | Packet::UnsubAck { msg_id } => {
            body.put_u16(*msg_id);
        }
        Packet::Subscribe {
            dup,
            qos,
            topic_id_type,
            msg_id,
            topic_name,
            topic_id,
        } => {
            let mut flags = topic_id_type.bits();
            if *dup {
                flags |= DUP_MASK;
            }
            flags |= (qos << QOS_SHIFT) & QOS_MASK;
            body.put_u8(flags);
            body.put_u16(*msg_id);
            put_topic_target(&mut body, *topic_id_type, topic_name, topic_id)?;
        }
        Packet::Unsubscribe {
            topic_id_type,
            msg_id,
            topic_name,
            topic_id,
        } => {
            body.put_u8(topic_id_type.bits());
            body.put_u16(*msg_id);
            put_topic_target(&mut body, *topic_id_type, topic_name, topic_id)?;
        }
        Packet::SubAck {
            qos,
            topic_id,
            msg_id,
            return_code,
        } => {
            body.put_u8((qos << QOS_SHIFT) & QOS_MASK);
            body.put_u16(*topic_id);
            body.put_u16(*msg_id);
            body.put_u8(return_code.to_byte());
        }
        Packet::PingReq { client_id } => {
            if let Some(id) = client_id {
                body.put_slice(id.as_bytes());
            }
        }
        Packet::Disconnect { duration } => {
            if let Some(duration) = duration {
                body.put_u16(*duration);
            }
        }
        Packet::Encapsulated {
            radius,
            wireless_node_id,
            ..
        } => {
            body.put_u8(radius & RADIUS_MASK);
            body.put_slice(wireless_node_id.as_bytes());
        }
    }

    let mut out = finish(body)?;
    if let Packet::Encapsulated { message, .. } = packet {
        // The inner frame follows the envelope, outside its declared length.
        out.extend_from_slice(message);
    }
    Ok(out.freeze())
}

/// Prepends the length prefix: one byte when the total frame fits under 256,
/// otherwise the 0x01 escape plus a u16 length. The prefix counts itself.
fn finish(body: BytesMut) -> Result<BytesMut, CodecError> {
    let short_total = body.len() + 1;
    let mut out = BytesMut::with_capacity(body.len() + 3);
    if short_total < 256 {
        out.put_u8(short_total as u8);
    } else {
        let total = body.len() + 3;
        if total > u16::MAX as usize {
            return Err(CodecError::EncodeInvalidField("frame longer than 65535 bytes"));
        }
        out.put_u8(LENGTH_ESCAPE);
        out.put_u16(total as u16);
    }
    out.extend_from_slice(&body);
    Ok(out)
}

fn will_flags(qos: u8, retain: bool) -> u8 {
    let mut flags = (qos << QOS_SHIFT) & QOS_MASK;
    if retain {
        flags |= RETAIN_MASK;
    }
    flags
}

fn put_prefixed_string(body: &mut BytesMut, s: &str) -> Result<(), CodecError> {
    if s.len() > u16::MAX as usize {
        return Err(CodecError::EncodeInvalidField("string longer than 65535 bytes"));
    }
    body.put_u16(s.len() as u16);
    body.put_slice(s.as_bytes());
    Ok(())
}

/// Fills the two-byte topic id slot of PUBLISH.
fn put_topic_id(body: &mut BytesMut, topic_id: &TopicId) -> Result<(), CodecError> {
    match topic_id {
        TopicId::Id(id) => body.put_u16(*id),
        TopicId::Short(name) => {
            if name.len() != 2 {
                return Err(CodecError::EncodeInvalidField(
                    "short topic name must be exactly 2 bytes",
                ));
            }
            body.put_slice(name.as_bytes());
        }
    }
    Ok(())
}

fn put_topic_target(
    body: &mut BytesMut,
    topic_id_type: TopicIdType,
    topic_name: &Option<String>,
    topic_id: &Option<u16>,
) -> Result<(), CodecError> {
    match topic_id_type {
        TopicIdType::Normal => {
            body.put_slice(topic_name.as_deref().unwrap_or("").as_bytes());
        }
        TopicIdType::ShortTopic => {
            let name = topic_name.as_deref().unwrap_or("");
            if name.len() != 2 {
                return Err(CodecError::EncodeInvalidField(
                    "short topic name must be exactly 2 bytes",
                ));
            }
            body.put_slice(name.as_bytes());
        }
        TopicIdType::PreDefined => {
            body.put_u16(topic_id.unwrap_or(0));
        }
    }
    Ok(())
}
