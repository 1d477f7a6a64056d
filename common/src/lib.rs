pub mod config;
pub mod error;
pub mod hal;
pub mod protocol;
pub mod runtime;
pub mod utils;

// 重新导出核心模块
pub use config::{
    AppConfig, ClientConfig, DirectoryConfig, Group, NetworkConfig, NodeIdentity, Staleness,
    Timing,
};
pub use error::{CodecError, ConfigError, Error, Result, TransportError};
pub use hal::udp::UdpNetwork;
pub use hal::{DatagramSocket, Network};
pub use protocol::{Location, Message, MessageKind, ServiceRegistrationInfo};
pub use utils::{calculate_checksum, DatagramBuffer};

#[cfg(feature = "simulator")]
pub use hal::simulator::SimNetwork;
