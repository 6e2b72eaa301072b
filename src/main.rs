// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件服务器
//!
//! 启动流程：
//! 1. 读取配置（第一个命令行参数，默认 `config/development.toml`）。
//! 2. 初始化 log4rs；找不到 YAML 配置时退回到标准输出。
//! 3. 按 `worker_threads` 构建多线程运行时，绑定端口。
//! 4. 接受连接，每个连接一个任务；Ctrl-C 时停止接受新连接。

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::Arc,
};

use log::{debug, error, info, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{net::TcpListener, runtime::Builder};

use webserver::{server, App, Config};

const DEFAULT_CONFIG: &str = "config/development.toml";
const LOG_CONFIG: &str = "config/log4rs.yaml";

fn main() {
    init_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match Config::from_toml(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if config.debug() && std::env::var_os("RUST_BACKTRACE").is_none() {
        // 必须在运行时创建线程之前设置
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };
    info!("工作线程数：{}", config.worker_threads());

    if let Err(e) = runtime.block_on(run(config)) {
        error!("{}", e);
        process::exit(1);
    }
    info!("服务器已停止");
}

fn init_logging() {
    if log4rs::init_file(LOG_CONFIG, Default::default()).is_ok() {
        return;
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}",
        )))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("无法初始化日志系统：{}", e);
            }
        }
        Err(e) => eprintln!("日志配置无效：{}", e),
    }
}

async fn run(config: Config) -> Result<(), std::io::Error> {
    let app = match App::from_config(&config) {
        Ok(app) => Arc::new(app),
        Err(e) => {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };
    server::log_startup(&config);

    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, config.port());
    let listener = TcpListener::bind(socket).await.map_err(|e| {
        error!("无法绑定端口：{}，错误：{}", config.port(), e);
        e
    })?;
    info!("服务端将在{}上监听Socket连接", socket);

    let mut id: u128 = 0;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("接受连接失败：{}", e);
                        continue;
                    }
                };
                debug!("[ID{}]TCP连接已建立：{}", id, addr);
                tokio::spawn(Arc::clone(&app).serve(stream, addr.to_string(), id));
                id += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("收到停机信号，停止接受新连接");
                break;
            }
        }
    }
    Ok(())
}
