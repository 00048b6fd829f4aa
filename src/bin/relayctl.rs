use clap::{Parser, Subcommand};
use perchance_relay::Config;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "relayctl", about = "CLI for a running Perchance relay", version)]
struct Cli {
    /// Base URL of the relay
    #[arg(global = true, long, env = "RELAY_URL", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Request timeout in seconds. Generation can take a while.
    #[arg(global = true, long, default_value_t = 120)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the relay is up
    Health,
    /// Show credential and upload configuration status
    Status,
    /// Generate an image and print the published URL
    Generate {
        /// Text prompt
        prompt: String,
        /// Print the full JSON response instead of just the URL
        #[arg(long)]
        json: bool,
    },
    /// Push session credentials to the webhook
    PushCredentials {
        /// JSON file holding `{cookies, userKey}` (optionally under `data`)
        #[arg(long, value_name = "PATH", conflicts_with_all = ["user_key", "cookies"])]
        file: Option<PathBuf>,
        /// Perchance user key
        #[arg(long)]
        user_key: Option<String>,
        /// Cookie as NAME=VALUE (repeatable)
        #[arg(long = "cookie", value_name = "NAME=VALUE")]
        cookies: Vec<String>,
        /// Timestamp to record instead of the server's clock
        #[arg(long)]
        timestamp: Option<String>,
    },
}

fn parse_cookie_pairs(items: &[String]) -> Result<Map<String, Value>, String> {
    let mut out = Map::new();
    for item in items {
        let (name, value) = item
            .split_once('=')
            .ok_or_else(|| format!("Invalid cookie '{}', expected NAME=VALUE", item))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("Invalid cookie '{}', empty name", item));
        }
        out.insert(name.to_string(), Value::String(value.to_string()));
    }
    Ok(out)
}

async fn print_response(response: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let ok = response.status().is_success();
    let body: Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(ok)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    Config::dotenv_load();
    let cli = Cli::parse();
    let base = cli.server.trim_end_matches('/').to_string();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;

    let ok = match cli.command {
        Commands::Health => print_response(client.get(format!("{}/health", base)).send().await?).await?,
        Commands::Status => print_response(client.get(format!("{}/status", base)).send().await?).await?,
        Commands::Generate { prompt, json } => {
            let response = client
                .post(format!("{}/generate", base))
                .json(&json!({ "prompt": prompt }))
                .send()
                .await?;
            if json {
                print_response(response).await?
            } else {
                let ok = response.status().is_success();
                let body: Value = response.json().await?;
                match (ok, body.get("image_url").and_then(|v| v.as_str())) {
                    (true, Some(url)) => println!("{}", url),
                    _ => eprintln!(
                        "{}",
                        body.get("error").and_then(|v| v.as_str()).unwrap_or("generation failed")
                    ),
                }
                ok
            }
        }
        Commands::PushCredentials { file, user_key, cookies, timestamp } => {
            let body = match (file, user_key) {
                (Some(path), _) => {
                    let data = tokio::fs::read_to_string(&path).await?;
                    serde_json::from_str::<Value>(&data)?
                }
                (None, Some(key)) => {
                    let cookies = parse_cookie_pairs(&cookies)?;
                    let mut body = json!({ "cookies": cookies, "userKey": key });
                    if let Some(ts) = timestamp {
                        body["timestamp"] = Value::String(ts);
                    }
                    body
                }
                (None, None) => {
                    eprintln!("Must provide either --file <path> or --user-key with --cookie pairs");
                    std::process::exit(2);
                }
            };
            let response = client
                .post(format!("{}/webhook/cookies", base))
                .json(&body)
                .send()
                .await?;
            print_response(response).await?
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
