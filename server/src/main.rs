use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use common::config::ServerConfig;
use common::err::DbResult;
use common::log::tracing_factory::{TracingFactory, TracingFactoryOptions};
use common::server::Server;
use server::bootstrap;

#[derive(Parser, Debug, Clone)]
#[command(name = "dbserver")]
#[command(version = "0.1.0")]
#[command(about = "Small SQL database server", long_about = None)]
struct CliArgs {
    #[arg(short, long, help = "Path to loaded configuration file", value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, help = "TCP port to listen on", value_name = "port")]
    port: Option<u16>,

    #[arg(long = "storage-dir", help = "directory holding the table files", value_name = "DIR")]
    storage_dir: Option<String>,

    #[arg(long, help = "maximum concurrently served connections")]
    max_connections: Option<usize>,

    #[arg(long, help = "worker threads executing connection handlers")]
    workers: Option<usize>,

    /// enable debug info
    #[arg(short, long, help = "enable debug mode", default_value_t = false)]
    debug: bool,
}

fn load_config(args: &CliArgs) -> DbResult<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_toml_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.storage_dir {
        config.storage_directory = dir.clone();
    }
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }
    if let Some(workers) = args.workers {
        config.worker_pool_size = workers;
    }
    config.debug |= args.debug;
    Ok(config)
}

fn main() -> DbResult<()> {
    let args = CliArgs::parse();
    let config = load_config(&args)?;

    match &config.log_dir {
        Some(dir) => TracingFactory::init_log_with_options(
            TracingFactoryOptions::new_with_log_dir(config.debug, dir.clone()),
        ),
        None => TracingFactory::init_log(config.debug),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_pool_size.max(1))
        .thread_name("dbserver-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let mut dispatcher = bootstrap::build_dispatcher(config).await?;
        dispatcher.start().await?;
        info!("dbserver started");

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!("cannot listen for the shutdown signal: {}", e),
        }
        dispatcher.shutdown(true).await?;
        Ok(())
    })
}
