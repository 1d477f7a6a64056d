//! 错误类型定义

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// 编解码错误
///
/// 解码错误意味着收到了畸形数据报，接收方丢弃即可；
/// `Oversized` 与 `FieldTooLong` 出现在编码阶段，属于配置或调用错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("datagram truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("bad frame magic {0:02x?}")]
    BadMagic([u8; 2]),

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown message kind {0:#04x}")]
    UnknownKind(u8),

    #[error("declared body length {declared} does not match {actual} received bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("field `{0}` is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("{0} trailing bytes after message body")]
    TrailingBytes(usize),

    #[error("field `{field}` has length {len}, the wire limit is 65535")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("encoded message is {size} bytes, datagram cap is {limit}")]
    Oversized { size: usize, limit: usize },
}

/// 传输层错误
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("address {0} is already bound")]
    AddressInUse(SocketAddr),

    #[error("socket closed")]
    Closed,
}

/// 配置错误，在构造实例时发现
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("group address {0} is not an IPv4 multicast address")]
    NotMulticast(Ipv4Addr),

    #[error("max_message_size {size} is outside [{min}, {max}]")]
    MessageSize { size: usize, min: usize, max: usize },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("publish interval {publish:?} is shorter than check interval {check:?}")]
    PublishFasterThanCheck { publish: Duration, check: Duration },

    #[error("staleness multiplier {0} must be at least 2")]
    StalenessMultiplier(u32),
}

/// 顶层错误
#[derive(Debug, Error)]
pub enum Error {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to parse configuration: {0}")]
    ConfigFormat(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} has stopped")]
    Stopped(&'static str),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}
