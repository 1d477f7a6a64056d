//! 传输抽象层
//!
//! 目录与客户端只依赖这里的两个 trait，真实 UDP 与进程内模拟网络
//! 各自实现一份。

pub mod udp;

#[cfg(feature = "simulator")]
pub mod simulator;

use std::net::SocketAddr;

use crate::config::Group;
use crate::error::TransportError;

/// 数据报套接字
///
/// 发送与接收可以在不同线程同时进行，因此全部方法只借用 `&self`。
pub trait DatagramSocket: Send + Sync + 'static {
    /// 发送一个完整数据报到单播或组播地址
    fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), TransportError>;

    /// 等待至多一个轮询周期；期间没有数据时返回 `Ok(None)`。
    ///
    /// 数据报大于 `buf` 时截断，返回值是写入 `buf` 的字节数。
    /// 套接字关闭后返回 `TransportError::Closed`。
    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError>;

    fn local_addr(&self) -> Result<SocketAddr, TransportError>;

    /// 释放地址与组播成员资格，可重复调用
    fn close(&self);
}

/// 套接字工厂
pub trait Network: Send + Sync + 'static {
    type Socket: DatagramSocket;

    /// 绑定单播地址，端口为 0 时分配临时端口
    fn bind(&self, addr: SocketAddr) -> Result<Self::Socket, TransportError>;

    /// 绑定组播端口并加入组
    fn join_multicast(&self, group: &Group) -> Result<Self::Socket, TransportError>;
}
