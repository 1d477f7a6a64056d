pub mod directory;
pub mod service;

pub use directory::{Leadership, LeadershipControl, Registry, Snapshot};
pub use service::DirectoryService;
