//! 快照广播调度

use std::time::{Duration, Instant};

use common::protocol::encode_publish_batches;
use common::CodecError;

use super::Snapshot;

/// 周期广播调度器，只在领导期间处于活动状态
///
/// 本身不做 I/O：`poll` 判断是否到期，`prepare` 生成数据报，
/// 发送由目录 actor 负责。
#[derive(Debug)]
pub struct Publisher {
    interval: Duration,
    next_due: Option<Instant>,
    cycles: u64,
}

impl Publisher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            cycles: 0,
        }
    }

    /// 开始新的周期，第一次广播立即到期
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// 到期则返回 `true` 并排定下一次
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                self.cycles += 1;
                true
            }
            _ => false,
        }
    }

    /// 已完成的广播周期数
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn prepare(&self, snapshot: &Snapshot, max_size: usize) -> Result<Vec<Vec<u8>>, CodecError> {
        encode_publish_batches(snapshot.entries(), max_size)
    }
}
