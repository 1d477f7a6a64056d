//! 受领导权门控的注册表

use std::collections::BTreeMap;
use std::sync::Arc;

use common::ServiceRegistrationInfo;

use super::Leadership;

/// 注册表命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCommand {
    Register(ServiceRegistrationInfo),
    Unregister(String),
}

/// 命令执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    /// 同名条目被替换（内容可能相同）
    Replaced,
    Removed(ServiceRegistrationInfo),
    NotFound,
    /// 非领导者，命令被丢弃
    NotLeader,
}

/// 名称到注册信息的映射，只由目录 actor 写入
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, ServiceRegistrationInfo>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, command: RegistryCommand, leadership: Leadership) -> Applied {
        if !leadership.is_leader() {
            return Applied::NotLeader;
        }
        match command {
            RegistryCommand::Register(info) => {
                match self.entries.insert(info.name().to_string(), info) {
                    Some(_) => Applied::Replaced,
                    None => Applied::Inserted,
                }
            }
            RegistryCommand::Unregister(name) => match self.entries.remove(&name) {
                Some(info) => Applied::Removed(info),
                None => Applied::NotFound,
            },
        }
    }

    /// 当前全部条目的不可变副本，按名称排序
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.values().cloned().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRegistrationInfo> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 注册表快照，可以跨线程共享
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entries: Arc<[ServiceRegistrationInfo]>,
}

impl Snapshot {
    pub fn entries(&self) -> &[ServiceRegistrationInfo] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|info| info.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRegistrationInfo> {
        self.entries.iter().find(|info| info.name() == name)
    }
}
