use crate::error::CodecError;
use crate::protocol::frame::{self, FRAME_HEADER_SIZE};
use crate::protocol::{Location, MessageKind, ServiceRegistrationInfo};

/// PUBLISH 负载中计数字段的长度
const COUNT_SIZE: usize = 2;

/// 目录协议消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// 客户端发往目录的注册命令
    Register(ServiceRegistrationInfo),
    /// 客户端发往目录的注销命令
    Unregister(String),
    /// 目录广播的注册表快照（可能只是完整快照的一部分）
    Publish(Vec<ServiceRegistrationInfo>),
    /// 目录在注销生效时立即广播的通知
    UnregisterNotice(String),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Register(_) => MessageKind::Register,
            Message::Unregister(_) => MessageKind::Unregister,
            Message::Publish(_) => MessageKind::Publish,
            Message::UnregisterNotice(_) => MessageKind::UnregisterNotice,
        }
    }

    /// 编码为一个完整的数据报
    pub fn encode(&self, max_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut writer = BodyWriter::default();
        match self {
            Message::Register(info) => writer.put_info(info)?,
            Message::Unregister(name) | Message::UnregisterNotice(name) => {
                writer.put_str("name", name)?
            }
            Message::Publish(entries) => {
                writer.put_count("entries", entries.len())?;
                for info in entries {
                    writer.put_info(info)?;
                }
            }
        }
        frame::seal(self.kind(), &writer.bytes, max_size)
    }

    /// 从数据报解码，负载必须被完整消费
    pub fn decode(datagram: &[u8]) -> Result<Self, CodecError> {
        let (kind, body) = frame::open(datagram)?;
        let mut reader = BodyReader::new(body);

        let message = match kind {
            MessageKind::Register => Message::Register(reader.info()?),
            MessageKind::Unregister => Message::Unregister(reader.string("name")?),
            MessageKind::UnregisterNotice => Message::UnregisterNotice(reader.string("name")?),
            MessageKind::Publish => {
                let count = reader.u16()? as usize;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(reader.info()?);
                }
                Message::Publish(entries)
            }
        };

        reader.finish()?;
        Ok(message)
    }
}

/// 单条注册信息放进只含它一条记录的 PUBLISH 时能否不超过上限
pub fn publish_fits(info: &ServiceRegistrationInfo, max_size: usize) -> bool {
    let mut writer = BodyWriter::default();
    match writer.put_info(info) {
        Ok(()) => FRAME_HEADER_SIZE + COUNT_SIZE + writer.bytes.len() <= max_size,
        Err(_) => false,
    }
}

/// 按数据报上限把快照切分为若干 PUBLISH 数据报
///
/// 每个数据报尽量装满；空快照也会生成一个不含记录的 PUBLISH。
/// 单条记录本身就放不下时返回 `Oversized`。
pub fn encode_publish_batches(
    entries: &[ServiceRegistrationInfo],
    max_size: usize,
) -> Result<Vec<Vec<u8>>, CodecError> {
    let body_limit = max_size.saturating_sub(FRAME_HEADER_SIZE);
    let mut datagrams = Vec::new();
    let mut batch = BodyWriter::default();
    let mut count: usize = 0;

    for info in entries {
        let mut encoded = BodyWriter::default();
        encoded.put_info(info)?;

        let single = COUNT_SIZE + encoded.bytes.len();
        if single > body_limit {
            return Err(CodecError::Oversized {
                size: FRAME_HEADER_SIZE + single,
                limit: max_size,
            });
        }

        let full = COUNT_SIZE + batch.bytes.len() + encoded.bytes.len() > body_limit
            || count == u16::MAX as usize;
        if full {
            datagrams.push(seal_publish(count, &batch.bytes, max_size)?);
            batch = BodyWriter::default();
            count = 0;
        }

        batch.bytes.extend_from_slice(&encoded.bytes);
        count += 1;
    }

    if count > 0 || datagrams.is_empty() {
        datagrams.push(seal_publish(count, &batch.bytes, max_size)?);
    }

    Ok(datagrams)
}

fn seal_publish(count: usize, entries: &[u8], max_size: usize) -> Result<Vec<u8>, CodecError> {
    let mut body = BodyWriter::default();
    body.put_count("entries", count)?;
    body.bytes.extend_from_slice(entries);
    frame::seal(MessageKind::Publish, &body.bytes, max_size)
}

/// 负载写入器，所有整数按大端序写入
#[derive(Default)]
struct BodyWriter {
    bytes: Vec<u8>,
}

impl BodyWriter {
    fn put_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn put_count(&mut self, field: &'static str, len: usize) -> Result<(), CodecError> {
        let len = u16::try_from(len).map_err(|_| CodecError::FieldTooLong { field, len })?;
        self.put_u16(len);
        Ok(())
    }

    fn put_str(&mut self, field: &'static str, value: &str) -> Result<(), CodecError> {
        self.put_count(field, value.len())?;
        self.bytes.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn put_location(&mut self, location: &Location) -> Result<(), CodecError> {
        self.put_str("host", location.host())?;
        self.put_u16(location.port());
        Ok(())
    }

    fn put_info(&mut self, info: &ServiceRegistrationInfo) -> Result<(), CodecError> {
        self.put_str("name", info.name())?;
        self.put_count("locations", info.locations().len())?;
        for location in info.locations() {
            self.put_location(location)?;
        }
        Ok(())
    }
}

/// 负载读取器
struct BodyReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BodyReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let available = self.bytes.len() - self.position;
        if len > available {
            return Err(CodecError::Truncated {
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        let value = core::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8(field))?;
        Ok(value.to_owned())
    }

    fn location(&mut self) -> Result<Location, CodecError> {
        let host = self.string("host")?;
        let port = self.u16()?;
        Ok(Location::new(host, port))
    }

    fn info(&mut self) -> Result<ServiceRegistrationInfo, CodecError> {
        let name = self.string("name")?;
        let count = self.u16()? as usize;
        let mut locations = Vec::with_capacity(count);
        for _ in 0..count {
            locations.push(self.location()?);
        }
        Ok(ServiceRegistrationInfo::new(name, locations))
    }

    fn finish(self) -> Result<(), CodecError> {
        match self.bytes.len() - self.position {
            0 => Ok(()),
            trailing => Err(CodecError::TrailingBytes(trailing)),
        }
    }
}
