use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "webhook-cli")]
#[command(about = "Operator CLI for the Logbook webhook gateway", long_about = None)]
struct Cli {
    /// Base URL of the gateway.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Webhook path on the gateway.
    #[arg(short, long, default_value = "/webhook")]
    path: String,

    /// Shared webhook secret.
    #[arg(short, long, env = "WEBHOOK_SECRET")]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Send a test delivery
    Send {
        #[arg(value_enum)]
        kind: Kind,
        /// Result identifier to report
        result_id: u64,
        /// Explicit delivery id (X-Webhook-Id)
        #[arg(long)]
        delivery_id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Added,
    Updated,
    Deleted,
}

impl Kind {
    fn payload(self, result_id: u64) -> Value {
        match self {
            Kind::Added => json!({"type": "result-added", "result": {"id": result_id}}),
            Kind::Updated => json!({"type": "result-updated", "result": {"id": result_id}}),
            Kind::Deleted => json!({"type": "result-deleted", "result_id": result_id}),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            println!("{} {}", res.status(), res.text().await.unwrap_or_default());
        }
        Commands::Send {
            kind,
            result_id,
            delivery_id,
        } => {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            if let Some(secret) = &cli.secret {
                headers.insert("x-webhook-secret", HeaderValue::from_str(secret)?);
            }
            if let Some(id) = &delivery_id {
                headers.insert("x-webhook-id", HeaderValue::from_str(id)?);
            }

            let res = client
                .post(format!("{}{}", base, cli.path))
                .headers(headers)
                .body(kind.payload(result_id).to_string())
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}\n{}", status, serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}\n{}", status, text),
    }
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
