//! 发现事件与事件消费接口

use crossbeam::channel::Sender;
use log::info;

use common::ServiceRegistrationInfo;

/// 接收发现事件的一方
///
/// 回调在客户端 actor 线程上同步调用，实现不应长时间阻塞。
pub trait ServiceDiscoveryInterest: Send + 'static {
    fn interested_in(&mut self, name: &str);

    fn inform_discovered(&mut self, info: &ServiceRegistrationInfo);

    fn inform_unregistered(&mut self, name: &str);
}

/// 缓存状态变化产生的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    InterestedIn(String),
    Discovered(ServiceRegistrationInfo),
    Unregistered(String),
}

impl DiscoveryEvent {
    pub fn service_name(&self) -> &str {
        match self {
            DiscoveryEvent::InterestedIn(name) | DiscoveryEvent::Unregistered(name) => name,
            DiscoveryEvent::Discovered(info) => info.name(),
        }
    }

    pub fn dispatch<I: ServiceDiscoveryInterest + ?Sized>(&self, interest: &mut I) {
        match self {
            DiscoveryEvent::InterestedIn(name) => interest.interested_in(name),
            DiscoveryEvent::Discovered(info) => interest.inform_discovered(info),
            DiscoveryEvent::Unregistered(name) => interest.inform_unregistered(name),
        }
    }
}

/// 只写日志的消费者
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInterest;

impl ServiceDiscoveryInterest for LoggingInterest {
    fn interested_in(&mut self, name: &str) {
        info!("关注服务 {}", name);
    }

    fn inform_discovered(&mut self, info: &ServiceRegistrationInfo) {
        info!("发现服务 {}", info);
    }

    fn inform_unregistered(&mut self, name: &str) {
        info!("服务已注销 {}", name);
    }
}

/// 把事件转发到通道，接收端断开后事件被丢弃
impl ServiceDiscoveryInterest for Sender<DiscoveryEvent> {
    fn interested_in(&mut self, name: &str) {
        let _ = self.send(DiscoveryEvent::InterestedIn(name.to_string()));
    }

    fn inform_discovered(&mut self, info: &ServiceRegistrationInfo) {
        let _ = self.send(DiscoveryEvent::Discovered(info.clone()));
    }

    fn inform_unregistered(&mut self, name: &str) {
        let _ = self.send(DiscoveryEvent::Unregistered(name.to_string()));
    }
}
