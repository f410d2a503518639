use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "api-cli")]
#[command(about = "Command-line client for the restaurant API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Session token sent as a bearer token.
    #[arg(short, long, env = "RESTAURANT_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,
    /// Fetch a CSRF token
    Csrf,
    /// Show your membership in a restaurant
    Me { restaurant: String },
    /// List the members of a restaurant
    Members { restaurant: String },
    /// Invite someone to a restaurant
    Invite {
        restaurant: String,
        email: String,
        #[arg(long, default_value = "staff")]
        role: String,
    },
    /// Change a member's role
    SetRole {
        restaurant: String,
        user: String,
        role: String,
    },
    /// Accept an invitation
    Accept { invitation: String },
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
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Csrf => {
            let res = client
                .get(format!("{}/api/csrf-token", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Me { restaurant } => {
            let res = client
                .get(format!("{}/api/restaurants/{}/me", cli.url, restaurant))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Members { restaurant } => {
            let res = client
                .get(format!("{}/api/restaurants/{}/members", cli.url, restaurant))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Invite {
            restaurant,
            email,
            role,
        } => {
            with_csrf(&client, &cli.url, &mut headers).await?;
            let res = client
                .post(format!("{}/api/restaurants/{}/invitations", cli.url, restaurant))
                .headers(headers)
                .json(&json!({ "email": email, "role": role }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::SetRole {
            restaurant,
            user,
            role,
        } => {
            with_csrf(&client, &cli.url, &mut headers).await?;
            let res = client
                .patch(format!(
                    "{}/api/restaurants/{}/members/{}",
                    cli.url, restaurant, user
                ))
                .headers(headers)
                .json(&json!({ "role": role }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Accept { invitation } => {
            with_csrf(&client, &cli.url, &mut headers).await?;
            let res = client
                .post(format!("{}/api/invitations/{}/accept", cli.url, invitation))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// Fetch a CSRF token and add it to `headers`.
async fn with_csrf(
    client: &reqwest::Client,
    url: &str,
    headers: &mut HeaderMap,
) -> Result<(), Box<dyn std::error::Error>> {
    let body: Value = client
        .get(format!("{}/api/csrf-token", url))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let token = body["token"]
        .as_str()
        .ok_or("CSRF response did not contain a token")?;
    headers.insert("x-csrf-token", HeaderValue::from_str(token)?);
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
