use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Command-line client for the headless bridge", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bridge and host status
    Status,
    /// Call a route with key=value query parameters
    Get {
        route: String,
        params: Vec<String>,
        /// Write raw (non-JSON) replies to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate one expression on the host thread
    Eval { code: String },
    /// Run a script on the host thread; `@path` reads it from a file
    Exec { code: String },
    /// Reload handler modules
    Reload,
    /// Reload handler modules and replace the HTTP listener
    Restart,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let (res, output) = match cli.command {
        Commands::Status => (client.get(format!("{}/status", base)).send().await?, None),
        Commands::Get { route, params, output } => {
            let query = params
                .iter()
                .map(|p| p.split_once('=').ok_or_else(|| format!("expected key=value, got '{}'", p)))
                .collect::<Result<Vec<_>, _>>()?;
            let route = route.trim_start_matches('/');
            let res = client
                .get(format!("{}/{}", base, route))
                .query(&query)
                .send()
                .await?;
            (res, output)
        }
        Commands::Eval { code } => (
            client.post(format!("{}/eval", base)).json(&json!({ "code": code })).send().await?,
            None,
        ),
        Commands::Exec { code } => {
            let code = match code.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)?,
                None => code,
            };
            let res = client.post(format!("{}/exec", base)).json(&json!({ "code": code })).send().await?;
            (res, None)
        }
        Commands::Reload => (client.get(format!("{}/reload", base)).send().await?, None),
        Commands::Restart => (client.get(format!("{}/restart", base)).send().await?, None),
    };

    print_response(res, output).await
}

async fn print_response(
    res: reqwest::Response,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let is_json = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    if !is_json {
        let bytes = res.bytes().await?;
        match output {
            Some(path) => {
                std::fs::write(&path, &bytes)?;
                eprintln!("Wrote {} bytes to {}", bytes.len(), path.display());
            }
            None => println!("{}", String::from_utf8_lossy(&bytes)),
        }
        return Ok(());
    }

    let body: Value = res.json().await?;
    if !status.is_success() {
        eprintln!("Error: bridge returned status {}", status);
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            eprintln!("{}", message);
        }
        if let Some(traceback) = body.get("traceback").and_then(Value::as_str) {
            eprintln!("{}", traceback);
        }
        std::process::exit(1);
    }

    let result = body.get("result").unwrap_or(&body);
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
