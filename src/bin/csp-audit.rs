use clap::Parser;

use ssr_nonce_gateway::security::audit;

#[derive(Parser)]
#[command(name = "csp-audit")]
#[command(about = "Check that a served page uses one CSP nonce throughout", long_about = None)]
struct Cli {
    /// Page to fetch.
    url: String,

    /// Attribute carrying the nonce on the application root marker.
    #[arg(long, default_value = "ngCspNonce")]
    root_attribute: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = client.get(&cli.url).send().await?;
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: {} returned status {}", cli.url, status);
        std::process::exit(2);
    }

    let headers = res.headers().clone();
    let body = res.text().await?;

    match audit::verify(&headers, &body, &cli.root_attribute) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Audit failed: {}", e);
            std::process::exit(1);
        }
    }
}
