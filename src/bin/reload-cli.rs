use clap::{Parser, Subcommand};
use futures_util::StreamExt;

use reload_proxy::reload::notify::{events_url, notify_with};

#[derive(Parser)]
#[command(name = "reload-cli")]
#[command(about = "Talk to a running reload-proxy", long_about = None)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 7331)]
    port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tell every open browser tab to reload
    Notify,
    /// Print the raw event stream (Ctrl+C to stop)
    Listen,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Notify => {
            notify_with(&client, &cli.host, cli.port).await?;
            println!("Reload sent to {}", events_url(&cli.host, cli.port));
        }
        Commands::Listen => {
            let res = client.get(events_url(&cli.host, cli.port)).send().await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: proxy returned status {}", status);
                return Ok(());
            }

            let mut frames = res.bytes_stream();
            while let Some(chunk) = frames.next().await {
                print!("{}", String::from_utf8_lossy(&chunk?));
            }
        }
    }

    Ok(())
}
