use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "store-cli")]
#[command(about = "Management CLI for the load balancer configuration store", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:5555")]
    url: String,

    #[arg(short, long, env = "LB_CONFIG_STORE_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service status and the committed version
    Status,
    /// Print the committed version, or a transaction's base version
    Version {
        #[arg(short, long)]
        transaction: Option<String>,
    },
    /// Print the raw configuration
    Raw {
        #[arg(short, long)]
        transaction: Option<String>,
    },
    /// Replace the whole configuration with the contents of a file
    Push {
        file: std::path::PathBuf,
        #[arg(short, long)]
        transaction: Option<String>,
        #[arg(short, long)]
        version: Option<i64>,
    },
    /// List open transactions
    Transactions {
        /// in_progress or outdated
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Open a transaction, optionally only if VERSION is current
    Start {
        #[arg(short, long)]
        version: Option<i64>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Commit a transaction
    Commit { id: String },
    /// Discard a transaction
    Discard { id: String },
    /// List sections of a kind, or show one
    Sections {
        kind: String,
        name: Option<String>,
        #[arg(short, long)]
        transaction: Option<String>,
    },
    /// List the servers of a backend
    Servers {
        backend: String,
        #[arg(short, long)]
        transaction: Option<String>,
    },
}

fn with_transaction(url: String, transaction: Option<&str>) -> String {
    match transaction {
        Some(id) => format!("{}?transaction_id={}", url, id),
        None => url,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/v1/status", base)).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Version { transaction } => {
            let url = with_transaction(format!("{}/v1/version", base), transaction.as_deref());
            let res = client.get(url).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Raw { transaction } => {
            let url = with_transaction(format!("{}/v1/raw", base), transaction.as_deref());
            let res = client.get(url).headers(headers).send().await?;
            print_text(res).await?;
        }
        Commands::Push { file, transaction, version } => {
            let body = std::fs::read_to_string(&file)?;
            let mut query = Vec::new();
            if let Some(id) = transaction {
                query.push(("transaction_id", id));
            }
            if let Some(version) = version {
                query.push(("version", version.to_string()));
            }
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            let res = client
                .post(format!("{}/v1/raw", base))
                .query(&query)
                .headers(headers)
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Transactions { status } => {
            let mut request = client.get(format!("{}/v1/transactions", base)).headers(headers);
            if let Some(status) = status {
                request = request.query(&[("status", status)]);
            }
            print_response(request.send().await?).await?;
        }
        Commands::Start { version, id } => {
            let mut query = Vec::new();
            if let Some(version) = version {
                query.push(("version", version.to_string()));
            }
            if let Some(id) = id {
                query.push(("id", id));
            }
            let res = client
                .post(format!("{}/v1/transactions", base))
                .query(&query)
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Commit { id } => {
            let res = client
                .put(format!("{}/v1/transactions/{}", base, id))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Discard { id } => {
            let res = client
                .delete(format!("{}/v1/transactions/{}", base, id))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Sections { kind, name, transaction } => {
            let url = match name {
                Some(name) => format!("{}/v1/sections/{}/{}", base, kind, name),
                None => format!("{}/v1/sections/{}", base, kind),
            };
            let res = client
                .get(with_transaction(url, transaction.as_deref()))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Servers { backend, transaction } => {
            let url = format!("{}/v1/backends/{}/servers", base, backend);
            let res = client
                .get(with_transaction(url, transaction.as_deref()))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn report_version(res: &reqwest::Response) {
    if let Some(version) = res.headers().get("configuration-version").and_then(|v| v.to_str().ok()) {
        eprintln!("configuration version: {}", version);
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    report_version(&res);
    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    report_version(&res);
    print!("{}", res.text().await?);
    Ok(())
}
