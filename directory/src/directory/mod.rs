pub mod leadership;
pub mod publisher;
pub mod registry;

pub use leadership::Leadership;
pub use publisher::Publisher;
pub use registry::{Applied, Registry, RegistryCommand, Snapshot};

/// 领导权控制接口，由选举协作方调用
pub trait LeadershipControl {
    /// 成为领导者：开始受理命令并广播快照
    fn assign_leadership(&self);

    /// 放弃领导权：停止广播，保留注册表
    fn relinquish_leadership(&self);
}
