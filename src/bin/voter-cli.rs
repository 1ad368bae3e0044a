use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use voter_auth::blockchain::GeneratedWallet;

#[derive(Parser)]
#[command(name = "voter-cli")]
#[command(about = "Command-line client for the voter-auth API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Session token from `sign-in`.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a keypair locally and print it
    CreateAccount,
    /// Check service health
    Health,
    /// Sign in and print the session token
    SignIn {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// List elections
    Elections {
        #[command(subcommand)]
        which: ElectionList,
    },
    /// List elections you administer
    AdminElections,
}

#[derive(Subcommand)]
enum ElectionList {
    /// Elections that have not ended
    Open,
    /// Ended elections with vote counts
    Results,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    match cli.command {
        Commands::CreateAccount => {
            let wallet = GeneratedWallet::generate();
            let account = json!({
                "address": wallet.address(),
                "private_key": wallet.private_key_hex(),
            });
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::SignIn { email, password } => {
            let res = client
                .post(format!("{}/api/auth/sign-in", cli.url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Elections { which } => {
            let path = match which {
                ElectionList::Open => "open",
                ElectionList::Results => "results",
            };
            let res = client
                .get(format!("{}/api/elections/{}", cli.url, path))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::AdminElections => {
            let res = client
                .get(format!("{}/api/admin/elections", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
