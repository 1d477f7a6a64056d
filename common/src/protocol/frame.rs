use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::error::CodecError;
use crate::protocol::{MessageKind, FRAME_MAGIC, PROTOCOL_VERSION};
use crate::utils::calculate_checksum_parts;

/// 数据报帧头部
///
/// 多字节字段一律按大端序存放在字节数组中，因此结构体没有对齐要求，
/// 可以直接从接收缓冲区的任意位置零拷贝解析。
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    /// 魔数，固定为 0xD15C
    pub magic: [u8; 2],
    /// 协议版本
    pub version: u8,
    /// 消息类型
    pub kind: u8,
    /// 负载长度
    pub body_length: [u8; 2],
    /// 校验和（计算时此字段置零）
    pub checksum: [u8; 2],
}

/// 帧头部长度
pub const FRAME_HEADER_SIZE: usize = core::mem::size_of::<FrameHeader>();

impl FrameHeader {
    fn new(kind: MessageKind, body_length: u16) -> Self {
        Self {
            magic: FRAME_MAGIC,
            version: PROTOCOL_VERSION,
            kind: kind as u8,
            body_length: body_length.to_be_bytes(),
            checksum: [0; 2],
        }
    }

    pub fn body_length(&self) -> usize {
        u16::from_be_bytes(self.body_length) as usize
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes(self.checksum)
    }

    /// 覆盖头部（校验和置零）与负载计算校验和
    fn compute_checksum(&self, body: &[u8]) -> u16 {
        let mut copy = *self;
        copy.checksum = [0; 2];
        calculate_checksum_parts(&[copy.as_bytes(), body])
    }
}

/// 封装数据报：写入头部并计算校验和
///
/// 超出 `max_size` 时返回 `Oversized`，绝不截断。
pub fn seal(kind: MessageKind, body: &[u8], max_size: usize) -> Result<Vec<u8>, CodecError> {
    let size = FRAME_HEADER_SIZE + body.len();
    if size > max_size {
        return Err(CodecError::Oversized {
            size,
            limit: max_size,
        });
    }

    let body_length = u16::try_from(body.len()).map_err(|_| CodecError::Oversized {
        size,
        limit: FRAME_HEADER_SIZE + u16::MAX as usize,
    })?;

    let mut header = FrameHeader::new(kind, body_length);
    header.checksum = header.compute_checksum(body).to_be_bytes();

    let mut datagram = Vec::with_capacity(size);
    datagram.extend_from_slice(header.as_bytes());
    datagram.extend_from_slice(body);
    Ok(datagram)
}

/// 解析数据报：依次校验魔数、版本、长度与校验和，返回消息类型和负载
pub fn open(datagram: &[u8]) -> Result<(MessageKind, &[u8]), CodecError> {
    let (header, body) = LayoutVerified::<_, FrameHeader>::new_unaligned_from_prefix(datagram)
        .ok_or(CodecError::Truncated {
            needed: FRAME_HEADER_SIZE,
            available: datagram.len(),
        })?;
    let header: FrameHeader = *header;

    if header.magic != FRAME_MAGIC {
        return Err(CodecError::BadMagic(header.magic));
    }

    if header.version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(header.version));
    }

    if header.body_length() != body.len() {
        return Err(CodecError::LengthMismatch {
            declared: header.body_length(),
            actual: body.len(),
        });
    }

    let actual = header.compute_checksum(body);
    if actual != header.checksum() {
        return Err(CodecError::ChecksumMismatch {
            expected: header.checksum(),
            actual,
        });
    }

    let kind = MessageKind::try_from(header.kind)?;
    Ok((kind, body))
}
