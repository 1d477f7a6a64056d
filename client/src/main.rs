use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam::channel::{self, Receiver};
use log::info;

use client::{DirectoryClient, DiscoveryEvent, LoggingInterest};
use common::{AppConfig, ClientConfig, Error, Location, ServiceRegistrationInfo, UdpNetwork};

/// 多播服务目录客户端
#[derive(Parser, Debug)]
#[command(name = "aether-client", version)]
struct Args {
    /// TOML 配置文件，缺省时使用内置默认值
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 等待事件的超时（秒）
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 持续输出发现事件直到 Ctrl-C
    Watch,
    /// 注册服务并等待它出现在快照中
    Register {
        name: String,
        #[arg(required = true)]
        locations: Vec<Location>,
    },
    /// 注销服务并等待注销通知
    Unregister { name: String },
}

fn main() -> Result<(), Box<dyn StdError>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let client_config = config.client_config()?;
    let timeout = Duration::from_secs(args.timeout);

    match args.command {
        Command::Watch => watch(client_config)?,
        Command::Register { name, locations } => {
            let info = ServiceRegistrationInfo::new(name, locations);
            register(client_config, info, timeout)?;
        }
        Command::Unregister { name } => unregister(client_config, &name, timeout)?,
    }
    Ok(())
}

fn watch(config: ClientConfig) -> Result<(), Box<dyn StdError>> {
    let mut client = DirectoryClient::start(&UdpNetwork::new(), config, LoggingInterest)?;

    let (shutdown_tx, shutdown_rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    let _ = shutdown_rx.recv();
    info!("收到退出信号");
    client.stop();
    Ok(())
}

fn register(config: ClientConfig, info: ServiceRegistrationInfo, timeout: Duration) -> common::Result<()> {
    let (events_tx, events) = channel::unbounded();
    let client = DirectoryClient::start(&UdpNetwork::new(), config, events_tx)?;

    client.register(&info)?;
    info!("已发送注册 {}", info);

    let deadline = Instant::now() + timeout;
    wait_for(&events, deadline, &format!("discovery of {}", info.name()), |event| {
        matches!(event, DiscoveryEvent::Discovered(seen) if *seen == info)
    })?;
    info!("服务 {} 已出现在目录快照中", info.name());
    Ok(())
}

fn unregister(config: ClientConfig, name: &str, timeout: Duration) -> common::Result<()> {
    let (events_tx, events) = channel::unbounded();
    let client = DirectoryClient::start(&UdpNetwork::new(), config, events_tx)?;
    let deadline = Instant::now() + timeout;

    // 先等到服务被发现，注销通知才会产生事件
    wait_for(&events, deadline, &format!("discovery of {}", name), |event| {
        matches!(event, DiscoveryEvent::Discovered(info) if info.name() == name)
    })?;

    client.unregister(name)?;
    info!("已发送注销 {}", name);

    wait_for(&events, deadline, &format!("removal of {}", name), |event| {
        matches!(event, DiscoveryEvent::Unregistered(removed) if removed == name)
    })?;
    info!("服务 {} 已注销", name);
    Ok(())
}

fn wait_for<F>(events: &Receiver<DiscoveryEvent>, deadline: Instant, what: &str, matches: F) -> common::Result<()>
where
    F: Fn(&DiscoveryEvent) -> bool,
{
    loop {
        match events.recv_deadline(deadline) {
            Ok(event) if matches(&event) => return Ok(()),
            Ok(_) => continue,
            Err(_) => return Err(Error::Timeout(what.to_string())),
        }
    }
}
