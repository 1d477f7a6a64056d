#[cfg(test)]
mod protocol_parsing_tests {
    use common::protocol::frame::{FrameHeader, FRAME_HEADER_SIZE};
    use common::protocol::{encode_publish_batches, FRAME_MAGIC, PROTOCOL_VERSION};
    use common::utils::calculate_checksum;
    use common::{CodecError, Location, Message, MessageKind, ServiceRegistrationInfo};

    fn info(name: &str, locations: &[(&str, u16)]) -> ServiceRegistrationInfo {
        ServiceRegistrationInfo::new(
            name,
            locations
                .iter()
                .map(|(host, port)| Location::new(*host, *port))
                .collect(),
        )
    }

    #[test]
    fn test_register_frame_layout() {
        let message = Message::Register(info("svc1", &[("h1", 9001)]));
        let datagram = message.encode(1024).unwrap();

        // 帧头
        assert_eq!(&datagram[0..2], &FRAME_MAGIC);
        assert_eq!(datagram[2], PROTOCOL_VERSION);
        assert_eq!(datagram[3], MessageKind::Register as u8);
        let body_length = u16::from_be_bytes([datagram[4], datagram[5]]) as usize;
        assert_eq!(body_length, datagram.len() - FRAME_HEADER_SIZE);

        // 负载: name, count, host, port
        let body = &datagram[FRAME_HEADER_SIZE..];
        assert_eq!(body, &[0, 4, b's', b'v', b'c', b'1', 0, 1, 0, 2, b'h', b'1', 0x23, 0x29]);

        // 校验和覆盖校验和字段清零后的帧头与负载
        let mut zeroed = datagram.clone();
        zeroed[6] = 0;
        zeroed[7] = 0;
        let checksum = u16::from_be_bytes([datagram[6], datagram[7]]);
        assert_eq!(checksum, calculate_checksum(&zeroed));
        assert_eq!(core::mem::size_of::<FrameHeader>(), 8);
    }

    #[test]
    fn test_every_kind_decodes_back() {
        let messages = [
            Message::Register(info("svc1", &[("h1", 9001), ("h1", 9001)])),
            Message::Unregister("svc1".to_string()),
            Message::Publish(vec![info("a", &[("h", 1)]), info("b", &[])]),
            Message::UnregisterNotice("svc1".to_string()),
        ];

        for message in messages {
            let decoded = Message::decode(&message.encode(1024).unwrap()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_unicode_and_ipv6_hosts_are_lossless() {
        let message = Message::Register(info("服务-α", &[("fe80::1", 65535), ("节点.local", 0)]));
        let decoded = Message::decode(&message.encode(1024).unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_corrupted_datagrams_are_rejected() {
        let datagram = Message::Unregister("svc1".to_string()).encode(1024).unwrap();

        let mut flipped = datagram.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xFF;
        assert!(matches!(
            Message::decode(&flipped),
            Err(CodecError::ChecksumMismatch { .. })
        ));

        let mut bad_magic = datagram.clone();
        bad_magic[0] = 0x00;
        assert!(matches!(Message::decode(&bad_magic), Err(CodecError::BadMagic(_))));

        assert!(matches!(
            Message::decode(&datagram[..datagram.len() - 1]),
            Err(CodecError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Message::decode(&datagram[..4]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_oversized_message_fails_at_encode() {
        let message = Message::Register(info("svc", &[("x".repeat(100).as_str(), 1)]));
        assert!(matches!(
            message.encode(64),
            Err(CodecError::Oversized { limit: 64, .. })
        ));
    }

    #[test]
    fn test_large_snapshot_is_split_into_full_batches() {
        let entries: Vec<_> = (0..100)
            .map(|i| info(&format!("service-{:03}", i), &[("10.0.0.1", 8000 + i)]))
            .collect();

        let datagrams = encode_publish_batches(&entries, 256).unwrap();
        assert!(datagrams.len() > 1);

        let mut seen = Vec::new();
        for datagram in &datagrams {
            assert!(datagram.len() <= 256);
            match Message::decode(datagram).unwrap() {
                Message::Publish(batch) => seen.extend(batch),
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert_eq!(seen, entries);
    }
}
