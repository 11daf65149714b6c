use std::time::Duration;

use clap::Parser;

use tokio::net::TcpListener;

use pest_control_coordinator::{run, Config};

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen_addr: String,

    #[arg(long, default_value = "pestcontrol.protohackers.com:20547")]
    authority_addr: String,

    #[arg(long, default_value_t = pest_control_coordinator::codec::DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    #[arg(long, default_value_t = 10)]
    authority_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = Config {
        listen_addr: args.listen_addr,
        authority_addr: args.authority_addr,
        max_frame_len: args.max_frame_len,
        authority_timeout: Duration::from_secs(args.authority_timeout_secs),
    };

    let listener = TcpListener::bind(&config.listen_addr).await?;

    run(listener, config).await?;

    Ok(())
}
