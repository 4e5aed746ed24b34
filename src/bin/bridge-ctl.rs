use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "bridge-ctl")]
#[command(about = "Control CLI for a running scanner-bridge", long_about = None)]
struct Cli {
    /// Control API base URL.
    #[arg(short, long, default_value = "http://127.0.0.1:8765")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server state and active configuration
    Status,
    /// Start the proxy with the active configuration
    Start,
    /// Stop the proxy
    Stop,
    /// Restart the proxy with the active configuration
    Restart,
    /// Validate and apply a new configuration, restarting the proxy
    Configure {
        #[arg(long)]
        backend_url: String,
        #[arg(long)]
        allowed_origin: String,
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let base = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)),
        Commands::Start => client.post(format!("{}/start", base)),
        Commands::Stop => client.post(format!("{}/stop", base)),
        Commands::Restart => client.post(format!("{}/restart", base)),
        Commands::Configure {
            backend_url,
            allowed_origin,
            host,
            port,
        } => client.put(format!("{}/config", base)).json(&json!({
            "backend_base_url": backend_url,
            "allowed_origin": allowed_origin,
            "bind_host": host,
            "bind_port": port,
        })),
    };

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        eprintln!("Error: control API returned status {}", status);
        eprintln!("{}", serde_json::to_string_pretty(&body)?);
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
