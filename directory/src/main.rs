use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use crossbeam::channel;
use log::info;

use common::{AppConfig, UdpNetwork};
use directory::{DirectoryService, LeadershipControl};

/// 多播服务目录节点
#[derive(Parser, Debug)]
#[command(name = "aether-directory", version)]
struct Args {
    /// TOML 配置文件，缺省时使用内置默认值
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 启动后立即成为领导者
    #[arg(long)]
    leader: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    if let Some(path) = &args.config {
        info!("使用配置文件 {}", path.display());
    }

    let directory_config = config.directory_config()?;
    info!(
        "节点 {} (id {})，组播组 {}",
        directory_config.node.name,
        directory_config.node.id,
        directory_config.network.group()
    );

    let mut service = DirectoryService::start(&UdpNetwork::new(), directory_config)?;
    if args.leader {
        service.assign_leadership();
    }

    let (shutdown_tx, shutdown_rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    let _ = shutdown_rx.recv();
    info!("收到退出信号");
    service.stop();
    Ok(())
}
