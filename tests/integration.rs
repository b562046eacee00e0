use bytes::Bytes;
use mqttsn_codec::{
    encode, CodecError, CommandKind, DecodeEvent, Decoder, Packet, ReturnCode, Role, TopicId,
    TopicIdType,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn drain(decoder: &mut Decoder) -> Vec<DecodeEvent> {
    std::iter::from_fn(|| decoder.next_event()).collect()
}

fn round_trip(role: Role, packet: Packet) {
    let bytes = encode(&packet).unwrap();
    let mut decoder = Decoder::new(role);
    assert_eq!(decoder.feed(&bytes), 0, "leftover bytes for {:?}", packet);
    match decoder.next_event() {
        Some(DecodeEvent::Packet(decoded)) => assert_eq!(decoded, packet),
        other => panic!("expected {:?}, got {:?}", packet, other),
    }
    assert!(decoder.next_event().is_none());
}

#[test]
fn decode_advertise() {
    init_tracing();
    let mut decoder = Decoder::new(Role::Gateway);
    let remaining = decoder.feed(&[5, 0, 34, 14, 16]);
    assert_eq!(remaining, 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Packet(Packet::Advertise {
            gw_id: 34,
            duration: 3600
        })]
    );
}

#[test]
fn reserved_code_yields_error_without_packet() {
    let mut decoder = Decoder::new(Role::Gateway);
    assert_eq!(decoder.feed(&[2, 248]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Error(CodecError::UnsupportedCommand(248))]
    );
}

#[test]
fn encode_searchgw() {
    let bytes = encode(&Packet::SearchGw { radius: 85 }).unwrap();
    assert_eq!(&bytes[..], &[3, 1, 85]);
}

#[test]
fn gwinfo_gateway_role_has_no_address() {
    let mut decoder = Decoder::new(Role::Gateway);
    assert_eq!(decoder.feed(&[3, 2, 34]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Packet(Packet::GwInfo {
            gw_id: 34,
            gw_add: None
        })]
    );
}

#[test]
fn gwinfo_client_role_stalls_until_address_arrives() {
    let mut decoder = Decoder::new(Role::Client);
    assert_eq!(decoder.feed(&[7, 2, 34]), 3);
    assert!(decoder.next_event().is_none());
    assert_eq!(decoder.feed(&[3, 97, 98, 99]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Packet(Packet::GwInfo {
            gw_id: 34,
            gw_add: Some(Bytes::from_static(b"abc"))
        })]
    );
}

#[test]
fn encode_publish_packs_flags() {
    let payload = Bytes::from_static(&[0xaa; 19]);
    let bytes = encode(&Packet::Publish {
        dup: true,
        qos: 1,
        retain: true,
        topic_id_type: TopicIdType::Normal,
        topic_id: TopicId::Id(294),
        msg_id: 24,
        payload,
    })
    .unwrap();
    assert_eq!(bytes.len(), 26);
    assert_eq!(&bytes[..7], &[26, 12, 0xb0, 0x01, 0x26, 0, 24]);
}

#[test]
fn two_frames_in_one_feed_emit_in_order() {
    let mut decoder = Decoder::new(Role::Gateway);
    assert_eq!(decoder.feed(&[5, 0, 34, 14, 16, 3, 1, 85]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![
            DecodeEvent::Packet(Packet::Advertise {
                gw_id: 34,
                duration: 3600
            }),
            DecodeEvent::Packet(Packet::SearchGw { radius: 85 }),
        ]
    );
}

#[test]
fn escape_byte_always_selects_long_header() {
    let mut decoder = Decoder::new(Role::Gateway);
    // 0x01 alone cannot be a frame; the decoder must wait for the long form.
    assert_eq!(decoder.feed(&[1]), 1);
    assert!(decoder.next_event().is_none());
    assert_eq!(decoder.feed(&[0, 7, 0]), 4);
    assert!(decoder.next_event().is_none());
    assert_eq!(decoder.feed(&[34, 14, 16]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Packet(Packet::Advertise {
            gw_id: 34,
            duration: 3600
        })]
    );
}

#[test]
fn split_feed_equals_single_feed() {
    init_tracing();
    let mut stream = Vec::new();
    stream.extend_from_slice(&[5, 0, 34, 14, 16]);
    stream.extend_from_slice(&[2, 248]);
    stream.extend_from_slice(&encode(&Packet::SearchGw { radius: 2 }).unwrap());
    stream.extend_from_slice(
        &encode(&Packet::Register {
            topic_id: 9,
            msg_id: 10,
            topic_name: "kitchen/temp".to_string(),
        })
        .unwrap(),
    );

    let mut whole = Decoder::new(Role::Gateway);
    whole.feed(&stream);
    let expected = drain(&mut whole);
    assert_eq!(expected.len(), 4);

    let mut bytewise = Decoder::new(Role::Gateway);
    for byte in &stream {
        bytewise.feed(std::slice::from_ref(byte));
    }
    assert_eq!(drain(&mut bytewise), expected);
}

#[test]
fn remaining_counts_unparsed_bytes() {
    let mut decoder = Decoder::new(Role::Gateway);
    // A complete advertise frame plus the first two bytes of a publish.
    assert_eq!(decoder.feed(&[5, 0, 34, 14, 16, 26, 12]), 2);
    assert_eq!(decoder.buffered(), 2);
    assert_eq!(drain(&mut decoder).len(), 1);
}

#[test]
fn round_trips_every_kind() {
    init_tracing();
    round_trip(
        Role::Gateway,
        Packet::Advertise {
            gw_id: 34,
            duration: 3600,
        },
    );
    round_trip(Role::Gateway, Packet::SearchGw { radius: 85 });
    round_trip(
        Role::Gateway,
        Packet::GwInfo {
            gw_id: 1,
            gw_add: None,
        },
    );
    round_trip(
        Role::Client,
        Packet::GwInfo {
            gw_id: 1,
            gw_add: Some(Bytes::from_static(&[192, 168, 1, 1])),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Connect {
            will: true,
            clean_session: true,
            duration: 30,
            client_id: "sensor-7".to_string(),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::ConnAck {
            return_code: ReturnCode::Accepted,
        },
    );
    round_trip(Role::Gateway, Packet::WillTopicReq);
    round_trip(
        Role::Gateway,
        Packet::WillTopic {
            qos: 1,
            retain: true,
            will_topic: Some("alarm/will".to_string()),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::WillTopic {
            qos: 0,
            retain: false,
            will_topic: None,
        },
    );
    round_trip(Role::Gateway, Packet::WillMsgReq);
    round_trip(
        Role::Gateway,
        Packet::WillMsg {
            will_msg: "gone offline".to_string(),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Register {
            topic_id: 0x1234,
            msg_id: 7,
            topic_name: "sensors/1".to_string(),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::RegAck {
            topic_id: 1,
            msg_id: 2,
            return_code: ReturnCode::RejectedCongestion,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Publish {
            dup: false,
            qos: 2,
            retain: false,
            topic_id_type: TopicIdType::Normal,
            topic_id: TopicId::Id(294),
            msg_id: 24,
            payload: Bytes::from_static(b"21.5C"),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Publish {
            dup: false,
            qos: 0,
            retain: false,
            topic_id_type: TopicIdType::PreDefined,
            topic_id: TopicId::Id(7),
            msg_id: 0,
            payload: Bytes::new(),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Publish {
            dup: true,
            qos: 1,
            retain: true,
            topic_id_type: TopicIdType::ShortTopic,
            topic_id: TopicId::Short("ab".to_string()),
            msg_id: 3,
            payload: Bytes::from_static(b"x"),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::PubAck {
            topic_id: 294,
            msg_id: 24,
            return_code: ReturnCode::RejectedInvalidTopicId,
        },
    );
    round_trip(Role::Gateway, Packet::PubComp { msg_id: 9 });
    round_trip(Role::Gateway, Packet::PubRec { msg_id: 9 });
    round_trip(Role::Gateway, Packet::PubRel { msg_id: 9 });
    round_trip(
        Role::Gateway,
        Packet::Subscribe {
            dup: false,
            qos: 1,
            topic_id_type: TopicIdType::Normal,
            msg_id: 12,
            topic_name: Some("kitchen/temp".to_string()),
            topic_id: None,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Subscribe {
            dup: true,
            qos: 0,
            topic_id_type: TopicIdType::PreDefined,
            msg_id: 13,
            topic_name: None,
            topic_id: Some(7),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Subscribe {
            dup: false,
            qos: 0,
            topic_id_type: TopicIdType::ShortTopic,
            msg_id: 14,
            topic_name: Some("ab".to_string()),
            topic_id: None,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::SubAck {
            qos: 2,
            topic_id: 294,
            msg_id: 12,
            return_code: ReturnCode::Accepted,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Unsubscribe {
            topic_id_type: TopicIdType::Normal,
            msg_id: 15,
            topic_name: Some("kitchen/temp".to_string()),
            topic_id: None,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Unsubscribe {
            topic_id_type: TopicIdType::PreDefined,
            msg_id: 16,
            topic_name: None,
            topic_id: Some(7),
        },
    );
    round_trip(Role::Gateway, Packet::UnsubAck { msg_id: 15 });
    round_trip(Role::Gateway, Packet::PingReq { client_id: None });
    round_trip(
        Role::Gateway,
        Packet::PingReq {
            client_id: Some("sensor-7".to_string()),
        },
    );
    round_trip(Role::Gateway, Packet::PingResp);
    round_trip(Role::Gateway, Packet::Disconnect { duration: None });
    round_trip(
        Role::Gateway,
        Packet::Disconnect {
            duration: Some(60),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::WillTopicUpd {
            qos: 1,
            retain: false,
            will_topic: Some("alarm/will".to_string()),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::WillTopicUpd {
            qos: 0,
            retain: false,
            will_topic: None,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::WillTopicResp {
            return_code: ReturnCode::Accepted,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::WillMsgUpd {
            will_msg: "moved".to_string(),
        },
    );
    round_trip(
        Role::Gateway,
        Packet::WillMsgResp {
            return_code: ReturnCode::RejectedNotSupported,
        },
    );
    round_trip(
        Role::Gateway,
        Packet::Encapsulated {
            radius: 3,
            wireless_node_id: "node-1".to_string(),
            message: encode(&Packet::SearchGw { radius: 1 }).unwrap(),
        },
    );
}

#[test]
fn round_trips_escape_length_frame() {
    let packet = Packet::Publish {
        dup: false,
        qos: 0,
        retain: false,
        topic_id_type: TopicIdType::Normal,
        topic_id: TopicId::Id(1),
        msg_id: 2,
        payload: Bytes::from(vec![0x55; 300]),
    };
    let bytes = encode(&packet).unwrap();
    // 306 body bytes need the 0x01 escape form: 309 total.
    assert_eq!(&bytes[..4], &[0x01, 0x01, 0x35, 12]);
    round_trip(Role::Gateway, packet);
}

#[test]
fn connect_with_short_client_id_field_is_truncated() {
    // Declared payload of 5 leaves no room for the client ID length prefix.
    let mut decoder = Decoder::new(Role::Gateway);
    assert_eq!(decoder.feed(&[7, 4, 0x04, 0x01, 0, 30, 0]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Error(CodecError::TruncatedField("client ID"))]
    );
}

#[test]
fn connect_rejects_unknown_protocol_id() {
    let mut decoder = Decoder::new(Role::Gateway);
    decoder.feed(&[12, 4, 0x0c, 0x02, 0, 30, 0, 4, 116, 101, 115, 116]);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Error(CodecError::InvalidEnum {
            field: "protocol id",
            value: 0x02
        })]
    );
}

#[test]
fn publish_rejects_topic_id_type_three() {
    let mut decoder = Decoder::new(Role::Gateway);
    decoder.feed(&[8, 12, 0x03, 0, 1, 0, 2, 65]);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Error(CodecError::InvalidEnum {
            field: "topic id type",
            value: 0x03
        })]
    );
}

#[test]
fn stream_recovers_after_malformed_frame() {
    let mut decoder = Decoder::new(Role::Gateway);
    // Reserved command, then a wrong-length disconnect, then a good frame.
    assert_eq!(decoder.feed(&[2, 248, 3, 24, 9, 3, 1, 85]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![
            DecodeEvent::Error(CodecError::UnsupportedCommand(248)),
            DecodeEvent::Error(CodecError::LengthMismatch {
                cmd: CommandKind::Disconnect,
                length: 1
            }),
            DecodeEvent::Packet(Packet::SearchGw { radius: 85 }),
        ]
    );
}

#[test]
fn disconnect_lengths() {
    let mut decoder = Decoder::new(Role::Gateway);
    decoder.feed(&[2, 24, 4, 24, 0, 60]);
    assert_eq!(
        drain(&mut decoder),
        vec![
            DecodeEvent::Packet(Packet::Disconnect { duration: None }),
            DecodeEvent::Packet(Packet::Disconnect { duration: Some(60) }),
        ]
    );
}

#[test]
fn empty_kinds_reject_trailing_bytes() {
    let mut decoder = Decoder::new(Role::Gateway);
    decoder.feed(&[3, 23, 0]);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Error(CodecError::LengthMismatch {
            cmd: CommandKind::PingResp,
            length: 1
        })]
    );
}

#[test]
fn subscribe_predefined_requires_exact_length() {
    let mut decoder = Decoder::new(Role::Gateway);
    decoder.feed(&[8, 18, 0x01, 0, 5, 0, 3, 9]);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Error(CodecError::LengthMismatch {
            cmd: CommandKind::Subscribe,
            length: 6
        })]
    );
}

#[test]
fn unknown_return_code_decodes_as_reserved() {
    let mut decoder = Decoder::new(Role::Gateway);
    decoder.feed(&[3, 5, 9]);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Packet(Packet::ConnAck {
            return_code: ReturnCode::Reserved
        })]
    );
    // Encoding the reserved marker degrades to "not supported".
    let bytes = encode(&Packet::ConnAck {
        return_code: ReturnCode::Reserved,
    })
    .unwrap();
    assert_eq!(&bytes[..], &[3, 5, 3]);
}

#[test]
fn encapsulated_envelope_captures_inner_frame() {
    init_tracing();
    let mut decoder = Decoder::new(Role::Gateway);
    // Envelope declares only ctrl + node id; the inner frame follows it.
    assert_eq!(decoder.feed(&[5, 254, 1, 97, 98]), 5);
    assert!(decoder.next_event().is_none());
    assert_eq!(decoder.feed(&[3, 1]), 7);
    assert!(decoder.next_event().is_none());
    assert_eq!(decoder.feed(&[85]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Packet(Packet::Encapsulated {
            radius: 1,
            wireless_node_id: "ab".to_string(),
            message: Bytes::from_static(&[3, 1, 85]),
        })]
    );
}

#[test]
fn nested_encapsulation_is_rejected() {
    let mut decoder = Decoder::new(Role::Gateway);
    assert_eq!(decoder.feed(&[5, 254, 1, 97, 98, 2, 254]), 0);
    assert_eq!(
        drain(&mut decoder),
        vec![DecodeEvent::Error(CodecError::NestedEncapsulation)]
    );
}

#[test]
fn encode_rejects_malformed_short_topic() {
    let err = encode(&Packet::Publish {
        dup: false,
        qos: 0,
        retain: false,
        topic_id_type: TopicIdType::ShortTopic,
        topic_id: TopicId::Short("abc".to_string()),
        msg_id: 1,
        payload: Bytes::new(),
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::EncodeInvalidField(_)));

    let err = encode(&Packet::Subscribe {
        dup: false,
        qos: 0,
        topic_id_type: TopicIdType::ShortTopic,
        msg_id: 1,
        topic_name: Some("a".to_string()),
        topic_id: None,
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::EncodeInvalidField(_)));
}

#[test]
fn encode_rejects_oversized_gateway_address() {
    let err = encode(&Packet::GwInfo {
        gw_id: 1,
        gw_add: Some(Bytes::from(vec![0u8; 300])),
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::EncodeInvalidField(_)));
}

#[test]
fn degenerate_declared_length_is_skipped() {
    let mut decoder = Decoder::new(Role::Gateway);
    // Declared length 0 is smaller than the 2-byte header itself.
    assert_eq!(decoder.feed(&[0, 0, 3, 1, 85]), 0);
    let events = drain(&mut decoder);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        DecodeEvent::Error(CodecError::LengthMismatch { .. })
    ));
    assert_eq!(
        events[1],
        DecodeEvent::Packet(Packet::SearchGw { radius: 85 })
    );
}
