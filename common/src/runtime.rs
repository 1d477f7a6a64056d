//! Actor 线程骨架
//!
//! 每个实例两个线程：接收线程轮询套接字，把完整数据报转交 actor；
//! actor 线程独占全部可变状态，用 `select!` 等待邮箱、入站数据报与节拍。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Sender;
use log::{debug, error, warn};

use crate::error::{Result, TransportError};
use crate::hal::DatagramSocket;
use crate::utils::DatagramBuffer;

/// 接收线程交给 actor 的数据报
#[derive(Debug, Clone)]
pub struct Inbound {
    pub payload: Vec<u8>,
    pub source: SocketAddr,
}

/// 启动接收线程
///
/// 超过 `max_message_size` 的数据报整个丢弃。线程在 `running` 被清除、
/// 套接字关闭或 actor 一侧断开后退出。
pub fn spawn_receiver<S: DatagramSocket>(
    name: &str,
    socket: Arc<S>,
    max_message_size: usize,
    running: Arc<AtomicBool>,
    inbox: Sender<Inbound>,
) -> Result<JoinHandle<()>> {
    let thread_name = format!("{}-recv", name);
    let handle = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let mut buffer = DatagramBuffer::new(max_message_size);
            while running.load(Ordering::Acquire) {
                let (len, source) = match socket.recv_from(buffer.as_mut_slice()) {
                    Ok(Some(received)) => received,
                    Ok(None) => continue,
                    Err(TransportError::Closed) => break,
                    Err(e) => {
                        if running.load(Ordering::Acquire) {
                            error!("[{}] 接收失败: {}", thread_name, e);
                        }
                        continue;
                    }
                };

                buffer.set_len(len);
                if buffer.is_over_limit() {
                    warn!(
                        "[{}] 丢弃来自 {} 的超长数据报 (上限 {} 字节)",
                        thread_name,
                        source,
                        buffer.limit()
                    );
                    continue;
                }

                let inbound = Inbound {
                    payload: buffer.as_slice().to_vec(),
                    source,
                };
                if inbox.send(inbound).is_err() {
                    break;
                }
            }
            debug!("[{}] 接收线程退出", thread_name);
        })?;
    Ok(handle)
}

/// 一个实例的线程句柄
pub struct ActorThreads {
    running: Arc<AtomicBool>,
    actor: Option<JoinHandle<()>>,
    receiver: Option<JoinHandle<()>>,
}

impl ActorThreads {
    pub fn new(running: Arc<AtomicBool>, actor: JoinHandle<()>, receiver: JoinHandle<()>) -> Self {
        Self {
            running,
            actor: Some(actor),
            receiver: Some(receiver),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.actor.is_none()
    }

    /// 停止并等待两个线程退出
    ///
    /// 顺序固定：先等 actor 退出，再调用 `release` 关闭套接字，最后等接收线程。
    /// 返回 `false` 表示已经停止过，本次什么也没做。
    pub fn shutdown<F: FnOnce()>(&mut self, release: F) -> bool {
        let Some(actor) = self.actor.take() else {
            return false;
        };
        self.running.store(false, Ordering::Release);
        if actor.join().is_err() {
            error!("actor 线程异常退出");
        }
        release();
        if let Some(receiver) = self.receiver.take() {
            if receiver.join().is_err() {
                error!("接收线程异常退出");
            }
        }
        true
    }
}
