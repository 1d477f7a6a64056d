//! 配置
//!
//! 从 TOML 文件加载，构造目录或客户端实例前统一校验。
//! 校验后的配置在实例生命周期内不可修改。

use std::fmt;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::protocol::{DEFAULT_MAX_MESSAGE_SIZE, MAX_DATAGRAM_SIZE, MIN_DATAGRAM_SIZE};

/// 组播组地址与端口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl Group {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// 目录与客户端共享的网络配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    group: Group,
    max_message_size: usize,
}

impl NetworkConfig {
    pub fn new(group: Group, max_message_size: usize) -> std::result::Result<Self, ConfigError> {
        if !group.address.is_multicast() {
            return Err(ConfigError::NotMulticast(group.address));
        }
        if !(MIN_DATAGRAM_SIZE..=MAX_DATAGRAM_SIZE).contains(&max_message_size) {
            return Err(ConfigError::MessageSize {
                size: max_message_size,
                min: MIN_DATAGRAM_SIZE,
                max: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(Self {
            group,
            max_message_size,
        })
    }

    pub fn group(&self) -> Group {
        self.group
    }

    /// 单个数据报的最大字节数
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

/// 目录的时间配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    check_interval: Duration,
    publish_interval: Duration,
}

impl Timing {
    pub fn new(
        check_interval: Duration,
        publish_interval: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        if check_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("check interval"));
        }
        if publish_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("publish interval"));
        }
        if publish_interval < check_interval {
            return Err(ConfigError::PublishFasterThanCheck {
                publish: publish_interval,
                check: check_interval,
            });
        }
        Ok(Self {
            check_interval,
            publish_interval,
        })
    }

    pub fn from_millis(check_ms: u64, publish_ms: u64) -> std::result::Result<Self, ConfigError> {
        Self::new(
            Duration::from_millis(check_ms),
            Duration::from_millis(publish_ms),
        )
    }

    /// 领导权检查（actor 节拍）周期
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// 快照广播周期
    pub fn publish_interval(&self) -> Duration {
        self.publish_interval
    }
}

/// 客户端判定服务陈旧的规则：发布周期的整数倍，至少 2 倍，
/// 以容忍一次广播丢失而不误判为注销
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staleness {
    publish_interval: Duration,
    multiplier: u32,
}

impl Staleness {
    pub fn new(publish_interval: Duration, multiplier: u32) -> std::result::Result<Self, ConfigError> {
        if publish_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("publish interval"));
        }
        if multiplier < 2 {
            return Err(ConfigError::StalenessMultiplier(multiplier));
        }
        Ok(Self {
            publish_interval,
            multiplier,
        })
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn threshold(&self) -> Duration {
        self.publish_interval * self.multiplier
    }
}

/// 节点标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub id: u16,
    pub name: String,
}

/// 目录服务实例配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub node: NodeIdentity,
    /// 接收单播命令的地址
    pub bind_address: SocketAddr,
    pub network: NetworkConfig,
    pub timing: Timing,
}

/// 目录客户端实例配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// 目录的单播地址
    pub directory_address: SocketAddr,
    pub network: NetworkConfig,
    processing_interval: Duration,
    staleness: Staleness,
}

impl ClientConfig {
    pub fn new(
        directory_address: SocketAddr,
        network: NetworkConfig,
        processing_interval: Duration,
        staleness: Staleness,
    ) -> std::result::Result<Self, ConfigError> {
        if processing_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("processing interval"));
        }
        Ok(Self {
            directory_address,
            network,
            processing_interval,
            staleness,
        })
    }

    /// 客户端 actor 节拍周期，用于检查陈旧条目
    pub fn processing_interval(&self) -> Duration {
        self.processing_interval
    }

    pub fn staleness(&self) -> Staleness {
        self.staleness
    }
}

// ---- TOML 文件格式 ----

/// 配置文件顶层结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub node: NodeSection,
    pub network: NetworkSection,
    pub timing: TimingSection,
    pub client: ClientSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSection {
    pub id: u16,
    pub name: String,
    /// 目录接收命令的地址，例如 `0.0.0.0:37371`
    pub bind_address: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSection {
    pub group_address: Ipv4Addr,
    pub group_port: u16,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSection {
    pub check_interval_ms: u64,
    pub publish_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    pub directory_address: SocketAddr,
    pub processing_interval_ms: u64,
    pub staleness_multiplier: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// 日志级别 (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

impl AppConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn network_config(&self) -> Result<NetworkConfig> {
        let group = Group::new(self.network.group_address, self.network.group_port);
        Ok(NetworkConfig::new(group, self.network.max_message_size)?)
    }

    pub fn timing(&self) -> Result<Timing> {
        Ok(Timing::from_millis(
            self.timing.check_interval_ms,
            self.timing.publish_interval_ms,
        )?)
    }

    pub fn directory_config(&self) -> Result<DirectoryConfig> {
        Ok(DirectoryConfig {
            node: NodeIdentity {
                id: self.node.id,
                name: self.node.name.clone(),
            },
            bind_address: self.node.bind_address,
            network: self.network_config()?,
            timing: self.timing()?,
        })
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        let staleness = Staleness::new(
            self.timing()?.publish_interval(),
            self.client.staleness_multiplier,
        )?;
        Ok(ClientConfig::new(
            self.client.directory_address,
            self.network_config()?,
            Duration::from_millis(self.client.processing_interval_ms),
            staleness,
        )?)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node: NodeSection {
                id: 1,
                name: "node1".to_string(),
                bind_address: SocketAddr::from(([0, 0, 0, 0], 37371)),
            },
            network: NetworkSection {
                group_address: Ipv4Addr::new(237, 37, 37, 1),
                group_port: 37370,
                max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            },
            timing: TimingSection {
                check_interval_ms: 10,
                publish_interval_ms: 100,
            },
            client: ClientSection {
                directory_address: SocketAddr::from(([127, 0, 0, 1], 37371)),
                processing_interval_ms: 10,
                staleness_multiplier: 3,
            },
            logging: LoggingSection::default(),
        }
    }
}
