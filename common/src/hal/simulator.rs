//! 进程内模拟网络
//!
//! 所有节点共享一张端点表，组播按成员列表扇出。测试可以静音某个
//! 端点来模拟丢包。

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::trace;

use crate::config::Group;
use crate::error::TransportError;
use crate::hal::{DatagramSocket, Network};

const FIRST_EPHEMERAL_PORT: u16 = 49152;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

type Datagram = (Vec<u8>, SocketAddr);

#[derive(Default)]
struct SimState {
    endpoints: HashMap<SocketAddr, Sender<Datagram>>,
    groups: HashMap<SocketAddr, Vec<SocketAddr>>,
    muted: HashSet<SocketAddr>,
    next_port: u16,
}

impl SimState {
    fn allocate_port(&mut self, ip: Ipv4Addr) -> u16 {
        loop {
            let port = self.next_port.max(FIRST_EPHEMERAL_PORT);
            self.next_port = port.checked_add(1).unwrap_or(FIRST_EPHEMERAL_PORT);
            if !self.endpoints.contains_key(&SocketAddr::from((ip, port))) {
                return port;
            }
        }
    }

    fn deliver(&self, target: SocketAddr, payload: &[u8], source: SocketAddr) {
        if self.muted.contains(&target) {
            trace!("丢弃发往静音端点 {} 的数据报", target);
            return;
        }
        if let Some(inbox) = self.endpoints.get(&target) {
            let _ = inbox.send((payload.to_vec(), source));
        }
    }
}

/// 共享的模拟网络，克隆后指向同一张端点表
#[derive(Clone)]
pub struct SimNetwork {
    state: Arc<Mutex<SimState>>,
    poll_interval: Duration,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock_state(&self.state)
    }

    /// 丢弃此后发往 `addr` 的全部数据报
    pub fn mute(&self, addr: SocketAddr) {
        self.lock().muted.insert(addr);
    }

    pub fn unmute(&self, addr: SocketAddr) {
        self.lock().muted.remove(&addr);
    }

    /// 组内当前成员
    pub fn members(&self, group: &Group) -> Vec<SocketAddr> {
        self.lock()
            .groups
            .get(&group.socket_addr())
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_bound(&self, addr: SocketAddr) -> bool {
        self.lock().endpoints.contains_key(&addr)
    }

    fn register(&self, requested: SocketAddr) -> Result<(SocketAddr, Receiver<Datagram>), TransportError> {
        let mut state = self.lock();
        let ip = match requested {
            SocketAddr::V4(v4) if !v4.ip().is_unspecified() => *v4.ip(),
            _ => Ipv4Addr::LOCALHOST,
        };
        let addr = if requested.port() == 0 {
            SocketAddr::from((ip, state.allocate_port(ip)))
        } else {
            SocketAddr::from((ip, requested.port()))
        };
        if state.endpoints.contains_key(&addr) {
            return Err(TransportError::AddressInUse(addr));
        }
        let (tx, rx) = channel::unbounded();
        state.endpoints.insert(addr, tx);
        Ok((addr, rx))
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_state(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl Network for SimNetwork {
    type Socket = SimSocket;

    fn bind(&self, addr: SocketAddr) -> Result<Self::Socket, TransportError> {
        let (local, inbox) = self.register(addr)?;
        Ok(SimSocket {
            state: Arc::clone(&self.state),
            local,
            group: None,
            inbox,
            poll_interval: self.poll_interval,
        })
    }

    fn join_multicast(&self, group: &Group) -> Result<Self::Socket, TransportError> {
        // 组播套接字各自拿一个临时地址作为接收端点
        let (local, inbox) = self.register(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
        self.lock()
            .groups
            .entry(group.socket_addr())
            .or_default()
            .push(local);
        Ok(SimSocket {
            state: Arc::clone(&self.state),
            local,
            group: Some(group.socket_addr()),
            inbox,
            poll_interval: self.poll_interval,
        })
    }
}

/// 模拟套接字
pub struct SimSocket {
    state: Arc<Mutex<SimState>>,
    local: SocketAddr,
    group: Option<SocketAddr>,
    inbox: Receiver<Datagram>,
    poll_interval: Duration,
}

impl DatagramSocket for SimSocket {
    fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), TransportError> {
        let state = lock_state(&self.state);
        if !state.endpoints.contains_key(&self.local) {
            return Err(TransportError::Closed);
        }
        match state.groups.get(&target) {
            Some(members) => {
                for member in members {
                    state.deliver(*member, payload, self.local);
                }
            }
            None => state.deliver(target, payload, self.local),
        }
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        match self.inbox.recv_timeout(self.poll_interval) {
            Ok((payload, source)) => {
                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload[..len]);
                Ok(Some((len, source)))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.local)
    }

    fn close(&self) {
        let mut state = lock_state(&self.state);
        state.endpoints.remove(&self.local);
        if let Some(group) = self.group {
            if let Some(members) = state.groups.get_mut(&group) {
                members.retain(|m| *m != self.local);
                if members.is_empty() {
                    state.groups.remove(&group);
                }
            }
        }
    }
}

impl Drop for SimSocket {
    fn drop(&mut self) {
        self.close();
    }
}
