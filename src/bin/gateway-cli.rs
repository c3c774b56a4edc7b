use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the edge security gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway health and wiring
    Health,
    /// Mint an anti-forgery token and show the cookie set with it
    Csrf,
    /// Send a session event to the relay
    Relay {
        /// SIGNED_IN, TOKEN_REFRESHED or SIGNED_OUT
        event: String,
        #[arg(long)]
        access_token: Option<String>,
        #[arg(long)]
        refresh_token: Option<String>,
    },
    /// Send protected POSTs and report the rate-limit headers of each
    Probe {
        /// Path of a protected route, e.g. /api/contact
        path: String,
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u32,
        /// CSRF header name
        #[arg(long, default_value = "x-csrf-token")]
        header: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client
                .get(format!("{}/health", base))
                .headers(request_headers()?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Csrf => {
            let res = client
                .get(format!("{}/api/csrf", base))
                .headers(request_headers()?)
                .send()
                .await?;
            for cookie in res.headers().get_all(SET_COOKIE) {
                println!("Set-Cookie: {}", cookie.to_str().unwrap_or("<binary>"));
            }
            print_response(res).await?;
        }
        Commands::Relay {
            event,
            access_token,
            refresh_token,
        } => {
            let body = json!({
                "event": event,
                "access_token": access_token,
                "refresh_token": refresh_token,
            });
            let res = client
                .post(format!("{}/api/auth/session", base))
                .headers(request_headers()?)
                .json(&body)
                .send()
                .await?;
            for cookie in res.headers().get_all(SET_COOKIE) {
                println!("Set-Cookie: {}", cookie.to_str().unwrap_or("<binary>"));
            }
            print_response(res).await?;
        }
        Commands::Probe {
            path,
            count,
            header,
        } => {
            let res = client
                .get(format!("{}/api/csrf", base))
                .headers(request_headers()?)
                .send()
                .await?;
            let cookie = res
                .headers()
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(';').next())
                .map(str::to_owned)
                .ok_or("gateway did not set an anti-forgery cookie")?;
            let minted: Value = res.json().await?;
            let token = minted["token"]
                .as_str()
                .ok_or("gateway did not return a token")?
                .to_owned();

            for attempt in 1..=count {
                let mut headers = request_headers()?;
                headers.insert(COOKIE, HeaderValue::from_str(&cookie)?);
                headers.insert(
                    reqwest::header::HeaderName::from_bytes(header.as_bytes())?,
                    HeaderValue::from_str(&token)?,
                );
                let res = client
                    .post(format!("{}{}", base, path))
                    .headers(headers)
                    .send()
                    .await?;
                let h = res.headers();
                println!(
                    "#{:<3} {}  limit={} remaining={} reset={} retry-after={}",
                    attempt,
                    res.status(),
                    header_str(h, "x-ratelimit-limit"),
                    header_str(h, "x-ratelimit-remaining"),
                    header_str(h, "x-ratelimit-reset"),
                    header_str(h, "retry-after"),
                );
            }
        }
    }

    Ok(())
}

fn request_headers() -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-request-id",
        HeaderValue::from_str(&Uuid::new_v4().to_string())?,
    );
    Ok(headers)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
