//! 目录客户端 actor
//!
//! 监听组播组上的快照与注销通知，维护本地缓存并把状态变化派发给
//! 事件消费者；注册与注销命令以单播发往目录。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{self, select, Receiver, Sender};
use log::{debug, info, warn};

use common::runtime::{spawn_receiver, ActorThreads, Inbound};
use common::{
    ClientConfig, DatagramSocket, Error, Message, Network, Result, ServiceRegistrationInfo,
};

use crate::cache::ClientCache;
use crate::interest::{DiscoveryEvent, ServiceDiscoveryInterest};

const CLIENT_NAME: &str = "directory client";

enum Control {
    Send(Vec<u8>),
    Redirect(SocketAddr),
    KnownServices(Sender<Vec<ServiceRegistrationInfo>>),
    Stop,
}

/// 目录客户端句柄
///
/// 丢弃句柄等同于调用 [`DirectoryClient::stop`]。
pub struct DirectoryClient<S: DatagramSocket> {
    name: String,
    mailbox: Sender<Control>,
    socket: Arc<S>,
    local_addr: SocketAddr,
    max_message_size: usize,
    threads: ActorThreads,
}

impl<S: DatagramSocket> DirectoryClient<S> {
    /// 加入组播组并启动 actor
    pub fn start<N, I>(network: &N, config: ClientConfig, interest: I) -> Result<Self>
    where
        N: Network<Socket = S>,
        I: ServiceDiscoveryInterest,
    {
        let group = config.network.group();
        let socket = Arc::new(network.join_multicast(&group)?);
        let local_addr = socket.local_addr()?;
        let name = format!("client-{}", local_addr.port());
        let max_message_size = config.network.max_message_size();

        let running = Arc::new(AtomicBool::new(true));
        let (inbound_tx, inbound_rx) = channel::unbounded();
        let (mailbox, control_rx) = channel::unbounded();

        let receiver = spawn_receiver(
            &name,
            Arc::clone(&socket),
            max_message_size,
            Arc::clone(&running),
            inbound_tx,
        )?;

        let actor = ClientActor {
            name: name.clone(),
            socket: Arc::clone(&socket),
            directory: config.directory_address,
            cache: ClientCache::new(config.staleness().threshold()),
            interest,
        };
        let processing_interval = config.processing_interval();
        let spawned = thread::Builder::new()
            .name(format!("{}-actor", name))
            .spawn(move || actor.run(processing_interval, control_rx, inbound_rx));
        let actor = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::Release);
                socket.close();
                let _ = receiver.join();
                return Err(e.into());
            }
        };

        info!(
            "[{}] 已加入组播组 {}，目录地址 {}",
            name, group, config.directory_address
        );

        Ok(Self {
            name,
            mailbox,
            socket,
            local_addr,
            max_message_size,
            threads: ActorThreads::new(running, actor, receiver),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 向目录发送注册命令，不影响本地缓存
    ///
    /// 编码在调用线程完成，超过数据报上限时直接返回错误。
    pub fn register(&self, info: &ServiceRegistrationInfo) -> Result<()> {
        let datagram = Message::Register(info.clone()).encode(self.max_message_size)?;
        self.submit(Control::Send(datagram))
    }

    /// 向目录发送注销命令，不影响本地缓存
    pub fn unregister(&self, name: &str) -> Result<()> {
        let datagram = Message::Unregister(name.to_string()).encode(self.max_message_size)?;
        self.submit(Control::Send(datagram))
    }

    /// 改变命令发往的目录地址
    pub fn redirect(&self, directory: SocketAddr) -> Result<()> {
        self.submit(Control::Redirect(directory))
    }

    /// 当前缓存中已发现的服务
    pub fn known_services(&self) -> Result<Vec<ServiceRegistrationInfo>> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.submit(Control::KnownServices(reply_tx))?;
        reply_rx.recv().map_err(|_| Error::Stopped(CLIENT_NAME))
    }

    fn submit(&self, control: Control) -> Result<()> {
        self.mailbox
            .send(control)
            .map_err(|_| Error::Stopped(CLIENT_NAME))
    }

    /// 停止 actor 并退出组播组；返回后不再有任何回调
    pub fn stop(&mut self) {
        let _ = self.mailbox.send(Control::Stop);
        let socket = Arc::clone(&self.socket);
        if self.threads.shutdown(move || socket.close()) {
            info!("[{}] 客户端已停止", self.name);
        }
    }
}

impl<S: DatagramSocket> Drop for DirectoryClient<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ClientActor<S, I> {
    name: String,
    socket: Arc<S>,
    directory: SocketAddr,
    cache: ClientCache,
    interest: I,
}

impl<S: DatagramSocket, I: ServiceDiscoveryInterest> ClientActor<S, I> {
    fn run(
        mut self,
        processing_interval: std::time::Duration,
        control: Receiver<Control>,
        inbound: Receiver<Inbound>,
    ) {
        let ticker = channel::tick(processing_interval);
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
                        let events = self.cache.expire(now);
                        self.dispatch(&events);
                    }
                }
            }
        }
        debug!("[{}] actor 退出", self.name);
    }

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::Send(datagram) => {
                if let Err(e) = self.socket.send_to(&datagram, self.directory) {
                    warn!("[{}] 发送到目录 {} 失败: {}", self.name, self.directory, e);
                }
            }
            Control::Redirect(directory) => {
                debug!("[{}] 目录地址改为 {}", self.name, directory);
                self.directory = directory;
            }
            Control::KnownServices(reply) => {
                let _ = reply.send(self.cache.discovered());
            }
            Control::Stop => {}
        }
    }

    fn handle_datagram(&mut self, datagram: Inbound) {
        let message = match Message::decode(&datagram.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("[{}] 丢弃来自 {} 的畸形数据报: {}", self.name, datagram.source, e);
                return;
            }
        };
        if message.kind().is_command() {
            debug!("[{}] 忽略 {:?} 命令", self.name, message.kind());
            return;
        }

        match message {
            Message::Publish(entries) => {
                let events = self.cache.reconcile(&entries, Instant::now());
                self.dispatch(&events);
            }
            Message::UnregisterNotice(name) => match self.cache.remove(&name) {
                Some(event) => self.dispatch(&[event]),
                None => debug!("[{}] 忽略未知服务 {} 的注销通知", self.name, name),
            },
            Message::Register(_) | Message::Unregister(_) => {}
        }
    }

    fn dispatch(&mut self, events: &[DiscoveryEvent]) {
        for event in events {
            event.dispatch(&mut self.interest);
        }
    }
}
