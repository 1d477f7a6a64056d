use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// 服务实例的一个网络端点
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    host: String,
    port: u16,
}

impl Location {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// `HOST:PORT` 解析失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid location `{0}`, expected HOST:PORT")]
pub struct ParseLocationError(String);

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 以最后一个冒号分隔，主机部分可以包含冒号
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseLocationError(s.to_owned()))?;
        if host.is_empty() {
            return Err(ParseLocationError(s.to_owned()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ParseLocationError(s.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// 服务注册信息
///
/// 按名称和端点内容比较相等性。创建后不可修改，
/// 更新注册时构造新的实例并以相同名称重新注册。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRegistrationInfo {
    name: String,
    locations: Vec<Location>,
}

impl ServiceRegistrationInfo {
    pub fn new(name: impl Into<String>, locations: Vec<Location>) -> Self {
        Self {
            name: name.into(),
            locations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 按注册时的顺序返回端点
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }
}

impl fmt::Display for ServiceRegistrationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.name)?;
        for (index, location) in self.locations.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", location)?;
        }
        f.write_str("]")
    }
}
