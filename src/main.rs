use anyhow::Context;
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::json;

mod ai;
mod app;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod pipeline;
mod report;
mod scheduler;
mod services;

#[cfg(test)]
mod testing;

use app::App;
use config::Config;
use models::{
    ChannelSettings, EscalationSettings, FeedSource, NewCompany, SourceKind, ThreadStrategy,
};
use pipeline::CompanySelection;

#[derive(Debug, Parser)]
#[command(name = "rival-watch", version, about = "Competitor news collection and Slack digests")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, deduplicate and enrich news for companies
    Collect {
        /// Company id; repeat for several. Defaults to every active company.
        #[arg(long = "company")]
        companies: Vec<i64>,
    },
    /// Send the daily report (defaults to yesterday)
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Send the weekly report for the Sunday-Saturday week containing the date
    /// (defaults to last week)
    Weekly {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Send the ranked top-10 digest (defaults to today)
    Digest {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run collection and reports on a schedule
    Serve,
    /// Register a company to watch
    AddCompany {
        #[arg(long)]
        name: String,
        #[arg(long)]
        rss: Vec<String>,
        #[arg(long)]
        social: Vec<String>,
        #[arg(long)]
        search: Vec<String>,
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// Topical hints for enrichment prompts
        #[arg(long)]
        context: Option<String>,
    },
    /// Stop watching a company and drop its stored items
    RemoveCompany {
        #[arg(long)]
        id: i64,
    },
    /// Set the report destination channel
    SetChannel {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// User id mentioned at the top of each report
        #[arg(long)]
        mention: Option<String>,
        #[arg(long, default_value = "overflow")]
        thread_strategy: ThreadStrategy,
    },
    /// Set where pipeline failures are reported
    SetEscalation {
        #[arg(long)]
        mention: String,
        #[arg(long)]
        channel: String,
    },
    /// Print recent collection and delivery logs
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rival_watch=info,warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load().context("loading configuration")?;
    let app = App::new(config).await.context("initializing")?;

    match cli.command {
        Command::Collect { companies } => {
            let selection = if companies.is_empty() {
                CompanySelection::All
            } else {
                CompanySelection::Ids(companies)
            };
            let summary = app.collect(selection).await?;
            let failed: Vec<_> = summary
                .logs
                .iter()
                .filter(|l| l.error_code.is_some())
                .map(|l| l.company_name.as_str())
                .collect();
            println!(
                "{}",
                json!({
                    "run_id": summary.run_id,
                    "companies_processed": summary.companies_processed,
                    "raw_items_collected": summary.raw_items_collected,
                    "articles_produced": summary.articles_produced,
                    "failed": failed,
                })
            );
        }
        Command::Daily { date } => {
            let day = date.unwrap_or_else(|| app.today() - Duration::days(1));
            let log = app.send_daily(day).await?;
            println!("{}", serde_json::to_string(&log)?);
        }
        Command::Weekly { date } => {
            let date = date.unwrap_or_else(|| app.today() - Duration::days(7));
            let log = app.send_weekly(date).await?;
            println!("{}", serde_json::to_string(&log)?);
        }
        Command::Digest { date } => {
            let day = date.unwrap_or_else(|| app.today());
            let log = app.send_digest(day).await?;
            println!("{}", serde_json::to_string(&log)?);
        }
        Command::Serve => app.serve().await,
        Command::AddCompany {
            name,
            rss,
            social,
            search,
            priority,
            context,
        } => {
            let feeds = rss
                .into_iter()
                .map(|url| FeedSource::new(SourceKind::Rss, url))
                .chain(social.into_iter().map(|url| FeedSource::new(SourceKind::Social, url)))
                .chain(search.into_iter().map(|url| FeedSource::new(SourceKind::Search, url)))
                .collect::<Vec<_>>();
            let feed_count = feeds.len();
            let id = app
                .repository()
                .insert_company(NewCompany {
                    name: name.clone(),
                    feeds,
                    priority,
                    is_active: true,
                    context,
                })
                .await?;
            println!("{}", json!({ "id": id, "name": name, "feeds": feed_count }));
        }
        Command::RemoveCompany { id } => {
            let removed = app.repository().delete_company(id).await?;
            println!("{}", json!({ "id": id, "removed": removed }));
        }
        Command::SetChannel {
            id,
            name,
            mention,
            thread_strategy,
        } => {
            let settings = ChannelSettings {
                channel_id: id,
                channel_name: name,
                thread_strategy,
                mention_user_id: mention,
                updated_by: std::env::var("USER").ok(),
            };
            app.repository().save_channel_settings(settings.clone()).await?;
            println!("{}", serde_json::to_string(&settings)?);
        }
        Command::SetEscalation { mention, channel } => {
            let settings = EscalationSettings {
                mention_handle: mention,
                fallback_channel: channel,
            };
            app.repository().save_escalation_settings(settings.clone()).await?;
            println!("{}", serde_json::to_string(&settings)?);
        }
        Command::Logs { limit } => {
            for log in app.repository().list_collection_logs(limit).await? {
                println!("{}", json!({ "collection": log }));
            }
            for log in app.repository().list_delivery_logs(limit).await? {
                println!("{}", json!({ "delivery": log }));
            }
        }
    }

    Ok(())
}
