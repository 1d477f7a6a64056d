//! 基于 `std::net::UdpSocket` 的传输实现
//!
//! 组播套接字通过 `socket2` 设置地址复用，同一主机上的多个客户端可以
//! 同时加入同一个组。

use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{RwLock, RwLockReadGuard};
use std::time::Duration;

use log::{debug, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::config::Group;
use crate::error::TransportError;
use crate::hal::{DatagramSocket, Network};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 操作系统 UDP 网络
#[derive(Debug, Clone, Copy)]
pub struct UdpNetwork {
    poll_interval: Duration,
}

impl UdpNetwork {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// 接收线程检查停止标志的频率
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    fn wrap(&self, socket: UdpSocket, group: Option<Ipv4Addr>) -> Result<UdpDatagramSocket, TransportError> {
        socket.set_read_timeout(Some(self.poll_interval))?;
        Ok(UdpDatagramSocket {
            socket: RwLock::new(Some(socket)),
            group,
        })
    }
}

impl Default for UdpNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn map_bind_error(addr: SocketAddr, e: io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::AddrInUse => TransportError::AddressInUse(addr),
        _ => TransportError::Io(e),
    }
}

/// 组播端口允许多个套接字同时绑定
fn bind_shared(addr: SocketAddr) -> Result<UdpSocket, TransportError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    socket
        .bind(&SockAddr::from(addr))
        .map_err(|e| map_bind_error(addr, e))?;
    Ok(socket.into())
}

impl Network for UdpNetwork {
    type Socket = UdpDatagramSocket;

    fn bind(&self, addr: SocketAddr) -> Result<Self::Socket, TransportError> {
        // 单播命令地址独占绑定，地址冲突必须暴露出来
        let socket = UdpSocket::bind(addr).map_err(|e| map_bind_error(addr, e))?;
        debug!("UDP 套接字已绑定 {}", addr);
        self.wrap(socket, None)
    }

    fn join_multicast(&self, group: &Group) -> Result<Self::Socket, TransportError> {
        let socket = bind_shared(SocketAddr::from((Ipv4Addr::UNSPECIFIED, group.port)))?;
        socket.join_multicast_v4(&group.address, &Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(true)?;
        debug!("已加入组播组 {}", group);
        self.wrap(socket, Some(group.address))
    }
}

/// UDP 数据报套接字
///
/// `close` 之后内部套接字被释放，端口立即可以重新绑定。
#[derive(Debug)]
pub struct UdpDatagramSocket {
    socket: RwLock<Option<UdpSocket>>,
    group: Option<Ipv4Addr>,
}

impl UdpDatagramSocket {
    fn open(&self) -> Result<RwLockReadGuard<'_, Option<UdpSocket>>, TransportError> {
        let guard = self.socket.read().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            return Err(TransportError::Closed);
        }
        Ok(guard)
    }

    pub fn is_closed(&self) -> bool {
        self.socket
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

impl DatagramSocket for UdpDatagramSocket {
    fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), TransportError> {
        let guard = self.open()?;
        if let Some(socket) = guard.as_ref() {
            socket.send_to(payload, target)?;
        }
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        let guard = self.open()?;
        let Some(socket) = guard.as_ref() else {
            return Err(TransportError::Closed);
        };
        match socket.recv_from(buf) {
            Ok((len, source)) => Ok(Some((len, source))),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        let guard = self.open()?;
        match guard.as_ref() {
            Some(socket) => Ok(socket.local_addr()?),
            None => Err(TransportError::Closed),
        }
    }

    /// 等待进行中的接收超时返回（至多一个轮询周期），然后关闭描述符
    fn close(&self) {
        let taken = self
            .socket
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(socket) = taken else {
            return;
        };
        if let Some(group) = self.group {
            if let Err(e) = socket.leave_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED) {
                warn!("退出组播组 {} 失败: {}", group, e);
            }
        }
        drop(socket);
    }
}
