use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "portal-cli")]
#[command(about = "Operator CLI for the competition portal", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Bearer access token for the acting user.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service liveness
    Health,
    /// List competitions, soonest deadline first
    Competitions {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one competition
    Competition { id: String },
    /// List registrations visible to the token
    Registrations {
        #[arg(long)]
        competition: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Approve (or reject) a registration
    Approve {
        id: String,
        #[arg(long, default_value_t = false)]
        reject: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    let request = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)),
        Commands::Competitions { category, search } => {
            let mut query = Vec::new();
            if let Some(category) = category {
                query.push(("category", category));
            }
            if let Some(search) = search {
                query.push(("search", search));
            }
            client.get(format!("{}/api/competitions", base)).query(&query)
        }
        Commands::Competition { id } => client.get(format!("{}/api/competitions/{}", base, id)),
        Commands::Registrations { competition, status } => {
            let mut query = Vec::new();
            if let Some(competition) = competition {
                query.push(("competition_id", competition));
            }
            if let Some(status) = status {
                query.push(("status", status));
            }
            client.get(format!("{}/api/registrations", base)).query(&query)
        }
        Commands::Approve { id, reject } => {
            let status = if reject { "rejected" } else { "approved" };
            client
                .put(format!("{}/api/registrations/{}/approve", base, id))
                .json(&json!({ "status": status }))
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        if let Some(retry) = res.headers().get("retry-after").and_then(|v| v.to_str().ok()) {
            eprintln!("Retry after: {}s", retry);
        }
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return ensure_success(status);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Non-2xx answers fail the command so scripts see a non-zero exit.
fn ensure_success(status: StatusCode) -> Result<(), Box<dyn std::error::Error>> {
    if status.is_success() {
        Ok(())
    } else {
        Err(format!("portal returned status {}", status).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses_fail_the_command() {
        assert!(ensure_success(StatusCode::OK).is_ok());
        assert!(ensure_success(StatusCode::CREATED).is_ok());
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN, StatusCode::TOO_MANY_REQUESTS] {
            let err = ensure_success(status).unwrap_err();
            assert!(err.to_string().contains(status.as_str()));
        }
    }
}
