use clap::{Parser, Subcommand};

use nearby_scraper::chromium::{ChromiumLaunchOptions, ChromiumSession};
use nearby_scraper::{run_scrape, BrowserSession, ScrapeParams};

#[derive(Debug, Parser)]
#[command(name = "nearby-cli")]
#[command(about = "Radius-bounded place discovery from a map link")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one scrape and print the JSON report.
    Scrape {
        /// Map link, short link, or any URL carrying coordinates.
        input_url: String,

        /// Search radius around the resolved center, in kilometers.
        #[arg(long, default_value_t = 5)]
        radius_km: u32,

        /// Search term; a generic business search is used when omitted.
        #[arg(long)]
        keyword: Option<String>,

        /// Stop once this many places are confirmed within the radius.
        #[arg(long, default_value_t = 10)]
        desired_results: usize,

        /// Run the browser without a visible window.
        #[arg(long)]
        headless: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = nearby_core::load_app_config_from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            input_url,
            radius_km,
            keyword,
            desired_results,
            headless,
        } => {
            let session = ChromiumSession::launch(&ChromiumLaunchOptions {
                headless: headless || config.headless,
                chrome_path: config.chrome_path.clone(),
                nav_timeout_ms: config.nav_timeout_ms,
            })
            .await?;

            let params = ScrapeParams {
                input_url,
                radius_km: f64::from(radius_km),
                keyword,
                desired_results,
                wait_timeout_ms: config.wait_timeout_ms,
                shortlink_timeout_secs: config.shortlink_timeout_secs,
            };

            let outcome = run_scrape(&session, &params).await;
            if let Err(err) = session.close().await {
                tracing::warn!(error = %err, "browser teardown failed");
            }

            let report = outcome?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
