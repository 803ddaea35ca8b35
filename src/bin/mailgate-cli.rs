use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "mailgate-cli")]
#[command(about = "Command-line client for the mailgate dispatch API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "MAILGATE_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch an email
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Idempotency key; a fresh UUID when omitted
        #[arg(long)]
        key: Option<String>,
    },
    /// Show the dispatch record for a key
    Status { key: String },
    /// List providers and their circuit state
    Providers,
    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Send { to, subject, body, key } => {
            let key = key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            eprintln!("Idempotency-Key: {}", key);
            client
                .post(format!("{}/send-email", base))
                .header("Idempotency-Key", key)
                .json(&json!({ "to": to, "subject": subject, "body": body }))
                .send()
                .await?
        }
        Commands::Status { key } => client.get(format!("{}/status/{}", base, key)).send().await?,
        Commands::Providers => client.get(format!("{}/providers", base)).send().await?,
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(retry_after) = res.headers().get(reqwest::header::RETRY_AFTER) {
        eprintln!("Retry-After: {}", retry_after.to_str().unwrap_or("?"));
    }

    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if status.is_client_error() || status.is_server_error() {
        std::process::exit(1);
    }
    Ok(())
}
