//! 客户端软状态缓存
//!
//! 状态转换是纯函数：给定缓存、收到的记录和当前时间，得到新的缓存和
//! 需要派发的事件。网络与线程都不在这里。

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::debug;

use common::ServiceRegistrationInfo;

use crate::interest::DiscoveryEvent;

/// 单个服务名称在本客户端的状态
///
/// `Interested` 只存在于一次 `reconcile` 调用内部：新名称先进入该状态并
/// 派发 `InterestedIn`，随即携带注册信息进入 `Discovered`。因此
/// [`ClientCache::state_of`] 在调用之间只会看到 `Unknown` 或 `Discovered`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Unknown,
    Interested,
    Discovered,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub state: ServiceState,
    pub info: Option<ServiceRegistrationInfo>,
    pub last_seen_at: Instant,
}

impl CacheEntry {
    /// 首次看到某个名称时的条目，尚无注册信息
    pub fn interested(now: Instant) -> Self {
        Self {
            state: ServiceState::Interested,
            info: None,
            last_seen_at: now,
        }
    }

    /// 记录注册信息并进入 `Discovered`；内容未变化时返回 `false`
    pub fn discover(&mut self, info: &ServiceRegistrationInfo, now: Instant) -> bool {
        self.last_seen_at = now;
        if self.state == ServiceState::Discovered && self.info.as_ref() == Some(info) {
            return false;
        }
        self.state = ServiceState::Discovered;
        self.info = Some(info.clone());
        true
    }
}

/// 按名称索引的缓存，由单个客户端独占
#[derive(Debug)]
pub struct ClientCache {
    entries: BTreeMap<String, CacheEntry>,
    threshold: Duration,
}

impl ClientCache {
    /// `threshold` 内没有刷新的条目视为已注销
    pub fn new(threshold: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            threshold,
        }
    }

    /// 缓存中没有的名称处于 `Unknown`
    pub fn state_of(&self, name: &str) -> ServiceState {
        self.entries
            .get(name)
            .map(|entry| entry.state)
            .unwrap_or(ServiceState::Unknown)
    }

    pub fn get(&self, name: &str) -> Option<&CacheEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 合并一个 PUBLISH 中的记录
    pub fn reconcile(
        &mut self,
        published: &[ServiceRegistrationInfo],
        now: Instant,
    ) -> Vec<DiscoveryEvent> {
        let mut events = Vec::new();
        for info in published {
            let entry = self
                .entries
                .entry(info.name().to_string())
                .or_insert_with(|| {
                    events.push(DiscoveryEvent::InterestedIn(info.name().to_string()));
                    CacheEntry::interested(now)
                });
            // 内容变化时替换并重新通知，状态不回退
            if entry.discover(info, now) {
                events.push(DiscoveryEvent::Discovered(info.clone()));
            }
        }
        events
    }

    /// 处理注销通知；重复或迟到的通知不产生事件
    pub fn remove(&mut self, name: &str) -> Option<DiscoveryEvent> {
        self.entries
            .remove(name)
            .map(|_| DiscoveryEvent::Unregistered(name.to_string()))
    }

    /// 移除超过阈值未刷新的条目
    pub fn expire(&mut self, now: Instant) -> Vec<DiscoveryEvent> {
        let threshold = self.threshold;
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen_at) > threshold)
            .map(|(name, _)| name.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|name| {
                debug!("服务 {} 超过 {:?} 未刷新，视为注销", name, threshold);
                self.remove(&name)
            })
            .collect()
    }

    /// 当前已发现的服务，按名称排序
    pub fn discovered(&self) -> Vec<ServiceRegistrationInfo> {
        self.entries
            .values()
            .filter(|entry| entry.state == ServiceState::Discovered)
            .filter_map(|entry| entry.info.clone())
            .collect()
    }
}
