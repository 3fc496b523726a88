use group_registry::config::ClientConfig;
use group_registry::console::{Console, OutputRouter};
use group_registry::recovery::RecoveryLog;
use group_registry::transport::UdpClient;
use std::io::{self, BufReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!(
            "Usage: group-registry-client [--server <addr:port>] [--timeout-ms <ms>] \
             [--recovery-log <path>] [--transcript <path>]"
        );
        return Ok(());
    }
    let config = ClientConfig::from_env()?.apply_args(&args)?;

    let transport = UdpClient::connect(config.server, config.timeout).await?;
    let router = OutputRouter::new(io::stdout(), Some(config.transcript.clone()));
    let log = RecoveryLog::new(&config.recovery_log);
    let mut console = Console::new(transport, BufReader::new(io::stdin()), router, log);

    println!("Connected to {}. Type 'help' for commands.", config.server);

    if !console.login().await? {
        return Ok(());
    }
    console.offer_resume().await?;
    console.run().await
}
