//! 目录协议：数据报帧、消息类型与注册信息模型
//!
//! 每个数据报由 8 字节帧头和消息负载组成：
//!
//! ```text
//! ┌────────┬─────────┬──────┬─────────────┬──────────┬──────────────┐
//! │ magic  │ version │ kind │ body_length │ checksum │ body         │
//! │ 2 字节 │ 1 字节  │ 1    │ 2 (大端)    │ 2 (大端) │ body_length  │
//! └────────┴─────────┴──────┴─────────────┴──────────┴──────────────┘
//! ```
//!
//! 负载中的字符串为 `u16 长度 + UTF-8`，序列为 `u16 数量 + 元素`。

pub mod frame;
pub mod message;
pub mod registration;

pub use frame::{FrameHeader, FRAME_HEADER_SIZE};
pub use message::{encode_publish_batches, publish_fits, Message};
pub use registration::{Location, ParseLocationError, ServiceRegistrationInfo};

use crate::error::CodecError;

// 协议常量
pub const FRAME_MAGIC: [u8; 2] = [0xD1, 0x5C];
pub const PROTOCOL_VERSION: u8 = 1;

/// 数据报上限的允许范围
pub const MIN_DATAGRAM_SIZE: usize = 64;
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Register = 0x01,         // 注册命令
    Unregister = 0x02,       // 注销命令
    Publish = 0x03,          // 快照广播
    UnregisterNotice = 0x04, // 注销通知
}

impl MessageKind {
    /// 是否为客户端发往目录的命令
    pub fn is_command(self) -> bool {
        matches!(self, MessageKind::Register | MessageKind::Unregister)
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageKind::Register),
            0x02 => Ok(MessageKind::Unregister),
            0x03 => Ok(MessageKind::Publish),
            0x04 => Ok(MessageKind::UnregisterNotice),
            other => Err(CodecError::UnknownKind(other)),
        }
    }
}
