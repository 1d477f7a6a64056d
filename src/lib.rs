//! 多播服务目录
//!
//! 领导者目录受理注册与注销命令，按固定周期把注册表快照广播到组播组；
//! 客户端据此维护软状态缓存，并把发现与注销事件派发给消费者。

pub use client;
pub use common;
pub use directory;
