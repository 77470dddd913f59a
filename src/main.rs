use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sigfox_modem_lib::modem::Payload;
use sigfox_modem_lib::{DriverConfig, ModemDriver};

#[derive(Parser)]
#[command(name = "sigfox-modem", about = "Talk to a Sigfox AT modem over a serial port")]
struct Cli {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3
    port: String,

    #[arg(long)]
    baud: Option<u32>,

    /// JSON driver configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every command and received line
    #[arg(long)]
    trace: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Send `AT` and print the reply
    Alive,
    /// Print the radio status pair
    Radio,
    /// Print all module metadata as JSON
    Metadata,
    /// Send a hex-encoded frame of 1 to 12 bytes
    Send { hex: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DriverConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DriverConfig::default(),
    };
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    config.trace_lines |= cli.trace;

    let default_level = if config.trace_lines { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let driver = ModemDriver::open(&cli.port, config)?;
    let mut events = driver.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            log::debug!("Channel event: {:?}", event);
        }
    });

    driver.wait_port_ready().await?;
    let result = run(&driver, cli.action).await;
    driver.close().await?;
    result
}

async fn run(driver: &ModemDriver, action: Action) -> anyhow::Result<()> {
    match action {
        Action::Alive => println!("{}", driver.check_module_is_alive().await?),
        Action::Radio => {
            let info = driver.get_module_radio_information().await?;
            println!("{}", serde_json::to_string(&info)?);
        }
        Action::Metadata => {
            let metadata = driver.get_module_metadata().await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Action::Send { hex } => {
            let payload = Payload::from_hex(&hex)?;
            let sent = driver.send_bytes(payload.as_bytes()).await?;
            println!("{} bytes sent", sent);
        }
    }
    Ok(())
}
