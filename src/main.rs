use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use duckchat_server::config::{Args, ServerConfig};
use duckchat_server::server::{bootstrap, ServerContext};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive("duckchat_server=info".parse()?);
    if args.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::from_args(args)?;
    tracing::info!(addr = %config.listen_addr, neighbors = config.neighbor_addrs.len(), "starting duckchat server");

    let mut ctx = ServerContext::new(config.listen_addr, config.neighbor_addrs);
    bootstrap(&mut ctx).await
}
