pub mod cache;
pub mod directory_client;
pub mod interest;

pub use cache::{ClientCache, ServiceState};
pub use directory_client::DirectoryClient;
pub use interest::{DiscoveryEvent, LoggingInterest, ServiceDiscoveryInterest};
