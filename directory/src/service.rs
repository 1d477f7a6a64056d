//! 目录服务 actor
//!
//! 组合注册表、广播调度与领导权门控。所有状态只在 actor 线程上修改，
//! 外部通过邮箱发送控制消息与查询。

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{self, select, Receiver, Sender};
use log::{debug, error, info, warn};

use common::protocol::publish_fits;
use common::runtime::{spawn_receiver, ActorThreads, Inbound};
use common::{DatagramSocket, DirectoryConfig, Error, Message, Network, Result};

use crate::directory::{
    Applied, Leadership, LeadershipControl, Publisher, Registry, RegistryCommand, Snapshot,
};

const SERVICE_NAME: &str = "directory service";

enum Control {
    AssignLeadership,
    RelinquishLeadership,
    IsLeader(Sender<bool>),
    Snapshot(Sender<Snapshot>),
    Stop,
}

/// 目录服务句柄
///
/// 丢弃句柄等同于调用 [`DirectoryService::stop`]。
pub struct DirectoryService<S: DatagramSocket> {
    name: String,
    mailbox: Sender<Control>,
    socket: Arc<S>,
    local_addr: SocketAddr,
    threads: ActorThreads,
}

impl<S: DatagramSocket> DirectoryService<S> {
    /// 绑定命令地址并启动 actor，初始状态为非领导者
    pub fn start<N>(network: &N, config: DirectoryConfig) -> Result<Self>
    where
        N: Network<Socket = S>,
    {
        let socket = Arc::new(network.bind(config.bind_address)?);
        let local_addr = socket.local_addr()?;
        let name = config.node.name.clone();

        let running = Arc::new(AtomicBool::new(true));
        let (inbound_tx, inbound_rx) = channel::unbounded();
        let (mailbox, control_rx) = channel::unbounded();

        let receiver = spawn_receiver(
            &name,
            Arc::clone(&socket),
            config.network.max_message_size(),
            Arc::clone(&running),
            inbound_tx,
        )?;

        let actor = DirectoryActor::new(config, Arc::clone(&socket));
        let spawned = thread::Builder::new()
            .name(format!("{}-actor", name))
            .spawn(move || actor.run(control_rx, inbound_rx));
        let actor = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, std::sync::atomic::Ordering::Release);
                socket.close();
                let _ = receiver.join();
                return Err(e.into());
            }
        };

        info!("[{}] 目录服务已启动，命令地址 {}", name, local_addr);

        Ok(Self {
            name,
            mailbox,
            socket,
            local_addr,
            threads: ActorThreads::new(running, actor, receiver),
        })
    }

    /// 接收命令的单播地址
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_leader(&self) -> Result<bool> {
        self.query(Control::IsLeader)
    }

    /// actor 线程上取得的注册表快照
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.query(Control::Snapshot)
    }

    fn query<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(Sender<T>) -> Control,
    {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.mailbox
            .send(make(reply_tx))
            .map_err(|_| Error::Stopped(SERVICE_NAME))?;
        reply_rx.recv().map_err(|_| Error::Stopped(SERVICE_NAME))
    }

    fn control(&self, control: Control) {
        if self.mailbox.send(control).is_err() {
            warn!("[{}] 目录服务已停止，忽略领导权变更", self.name);
        }
    }

    /// 停止 actor、关闭套接字并等待线程退出，可重复调用
    pub fn stop(&mut self) {
        let _ = self.mailbox.send(Control::Stop);
        let socket = Arc::clone(&self.socket);
        if self.threads.shutdown(move || socket.close()) {
            info!("[{}] 目录服务已停止", self.name);
        }
    }
}

impl<S: DatagramSocket> LeadershipControl for DirectoryService<S> {
    fn assign_leadership(&self) {
        self.control(Control::AssignLeadership);
    }

    fn relinquish_leadership(&self) {
        self.control(Control::RelinquishLeadership);
    }
}

impl<S: DatagramSocket> Drop for DirectoryService<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct DirectoryActor<S> {
    config: DirectoryConfig,
    socket: Arc<S>,
    group: SocketAddr,
    leadership: Leadership,
    registry: Registry,
    publisher: Publisher,
}

impl<S: DatagramSocket> DirectoryActor<S> {
    fn new(config: DirectoryConfig, socket: Arc<S>) -> Self {
        let group = config.network.group().socket_addr();
        let publisher = Publisher::new(config.timing.publish_interval());
        Self {
            config,
            socket,
            group,
            leadership: Leadership::default(),
            registry: Registry::new(),
            publisher,
        }
    }

    fn name(&self) -> &str {
        &self.config.node.name
    }

    fn max_message_size(&self) -> usize {
        self.config.network.max_message_size()
    }

    fn run(mut self, control: Receiver<Control>, inbound: Receiver<Inbound>) {
        let ticker = channel::tick(self.config.timing.check_interval());
        loop {
            select! {
                recv(control) -> message => match message {
                    Ok(Control::Stop) | Err(_) => break,
                    Ok(message) => self.handle_control(message),
                },
                recv(inbound) -> datagram => match datagram {
                    Ok(datagram) => self.handle_datagram(datagram),
                    Err(_) => break,
                },
                recv(ticker) -> now => {
                    if let Ok(now) = now {
                        self.on_tick(now);
                    }
                }
            }
        }
        debug!("[{}] actor 退出，已完成 {} 次广播", self.name(), self.publisher.cycles());
    }

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::AssignLeadership => {
                if self.leadership.assign() {
                    info!("[{}] 成为领导者，注册表 {} 条", self.name(), self.registry.len());
                    self.publisher.start(Instant::now());
                }
            }
            Control::RelinquishLeadership => {
                if self.leadership.relinquish() {
                    info!("[{}] 放弃领导权，停止广播", self.name());
                    self.publisher.stop();
                }
            }
            Control::IsLeader(reply) => {
                let _ = reply.send(self.leadership.is_leader());
            }
            Control::Snapshot(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
            Control::Stop => {}
        }
    }

    fn handle_datagram(&mut self, datagram: Inbound) {
        let message = match Message::decode(&datagram.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("[{}] 丢弃来自 {} 的畸形数据报: {}", self.name(), datagram.source, e);
                return;
            }
        };
        // 组播回环会把自己的广播送回来
        if !message.kind().is_command() {
            debug!(
                "[{}] 忽略来自 {} 的 {:?} 消息",
                self.name(),
                datagram.source,
                message.kind()
            );
            return;
        }

        match message {
            Message::Register(info) => {
                if !publish_fits(&info, self.max_message_size()) {
                    error!(
                        "[{}] 拒绝注册 {}: 单条记录超过数据报上限 {} 字节",
                        self.name(),
                        info.name(),
                        self.max_message_size()
                    );
                    return;
                }
                let name = info.name().to_string();
                match self.registry.apply(RegistryCommand::Register(info), self.leadership) {
                    Applied::Inserted => info!("[{}] 注册服务 {}", self.name(), name),
                    Applied::Replaced => debug!("[{}] 更新服务 {}", self.name(), name),
                    Applied::NotLeader => debug!("[{}] 非领导者，丢弃注册 {}", self.name(), name),
                    _ => {}
                }
            }
            Message::Unregister(name) => {
                match self
                    .registry
                    .apply(RegistryCommand::Unregister(name.clone()), self.leadership)
                {
                    Applied::Removed(_) => {
                        info!("[{}] 注销服务 {}", self.name(), name);
                        self.broadcast_notice(name);
                    }
                    Applied::NotFound => debug!("[{}] 注销未知服务 {}", self.name(), name),
                    Applied::NotLeader => debug!("[{}] 非领导者，丢弃注销 {}", self.name(), name),
                    _ => {}
                }
            }
            Message::Publish(_) | Message::UnregisterNotice(_) => {}
        }
    }

    fn broadcast_notice(&self, name: String) {
        match Message::UnregisterNotice(name).encode(self.max_message_size()) {
            Ok(datagram) => self.send_to_group(&datagram),
            Err(e) => error!("[{}] 注销通知编码失败: {}", self.name(), e),
        }
    }

    fn on_tick(&mut self, now: Instant) {
        if !self.leadership.is_leader() || !self.publisher.poll(now) {
            return;
        }
        let snapshot = self.registry.snapshot();
        match self.publisher.prepare(&snapshot, self.max_message_size()) {
            Ok(datagrams) => {
                debug!(
                    "[{}] 广播快照: {} 条记录，{} 个数据报",
                    self.name(),
                    snapshot.len(),
                    datagrams.len()
                );
                for datagram in &datagrams {
                    self.send_to_group(datagram);
                }
            }
            Err(e) => error!("[{}] 快照编码失败: {}", self.name(), e),
        }
    }

    fn send_to_group(&self, datagram: &[u8]) {
        if let Err(e) = self.socket.send_to(datagram, self.group) {
            warn!("[{}] 发送到组播组 {} 失败: {}", self.name(), self.group, e);
        }
    }
}
