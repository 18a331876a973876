use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tokio::{runtime, signal};
use tracing::info;

use notifyc::{setup_tracing, AppResult, ClientConfig, LoggingTaskHandler, Poller};

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn main() -> AppResult<()> {
    dotenv().ok();

    let commandline: CommandLine = CommandLine::parse();
    setup_tracing(commandline.verbose)?;

    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("./");
            path.push("conf.toml");
            path
        },
        PathBuf::from,
    );
    let client_config = ClientConfig::set_up_config(config_path)?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        let mut poller = Poller::new();
        poller.start(client_config, Arc::new(LoggingTaskHandler))?;

        signal::ctrl_c().await?;
        info!("got shutdown signal");
        poller.stop().await;
        Ok(())
    })
}
