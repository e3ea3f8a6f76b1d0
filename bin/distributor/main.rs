//! Deluge Distributor
//!
//! Adds all torrents in a watch dir evenly to multiple Deluge instances.

use anyhow::Result;
use clap::Parser;
use deluge_distributor::notify::SlackNotifier;
use deluge_distributor::rpc::HttpConnector;
use deluge_distributor::util::duration_human;
use deluge_distributor::watch::{self, WatchOptions};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "deluge-distributor")]
#[command(about = "Adds all torrents in a watch dir evenly to multiple deluge instances")]
struct Args {
    /// Deluge config directory containing the hostlist
    #[arg(long, env = "DELUGE_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Directory scanned for .torrent files
    #[arg(long, env = "DELUGE_WATCH_PATH")]
    watch_path: Option<PathBuf>,

    /// Regex matched against host addresses; non-matching hosts are ignored
    #[arg(long, default_value = ".*", env = "DELUGE_HOST_FILTER")]
    host_filter: String,

    /// Per-host torrent ceiling
    #[arg(long, default_value = "100", env = "DELUGE_MAX_TORRENTS")]
    max_torrents: usize,

    /// Seconds between distribution cycles
    #[arg(long, default_value = "5", env = "DELUGE_SLEEP_TIME")]
    sleep_time: u64,

    /// Log filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "debug", env = "DELUGE_LOG_LEVEL")]
    log_level: String,

    /// Slack webhook URL for lifecycle and placement announcements
    #[arg(long, env = "SLACK_WEBHOOK")]
    slack_webhook: Option<String>,

    /// Username shown on Slack notifications
    #[arg(long, default_value = "Deluge Distributor", env = "SLACK_USERNAME")]
    slack_username: String,

    /// Slack message template; {message} is replaced with the announcement
    #[arg(long, default_value = "{message}", env = "SLACK_FORMAT")]
    slack_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&args.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let config_path = args.config_path.unwrap_or_else(|| app_dir("deluge"));
    let watch_path = args.watch_path.unwrap_or_else(|| app_dir("watch"));
    std::fs::create_dir_all(&config_path)?;
    std::fs::create_dir_all(&watch_path)?;

    info!("deluge-distributor started");
    info!("  --config-path \"{}\"", config_path.display());
    info!("  --watch-path \"{}\"", watch_path.display());
    info!("  --host-filter \"{}\"", args.host_filter);
    info!("  --max-torrents {}", args.max_torrents);
    info!("  --sleep-time {}", args.sleep_time);
    info!("  --log-level \"{}\"", args.log_level);
    info!(
        "  --slack-webhook \"{}\"",
        args.slack_webhook.as_deref().unwrap_or("")
    );
    info!("  --slack-username \"{}\"", args.slack_username);
    info!("  --slack-format \"{}\"", args.slack_format);

    let notifier = args.slack_webhook.map(|webhook| {
        SlackNotifier::new(webhook, args.slack_username.clone(), args.slack_format.clone())
    });
    if let Some(notifier) = &notifier {
        notifier.send("deluge-distributor started").await;
    }

    let options = WatchOptions {
        config_path,
        watch_path,
        host_filter: args.host_filter,
        max_torrents: args.max_torrents,
        sleep_time: args.sleep_time,
    };
    let connector = HttpConnector::default();

    let started = Instant::now();
    let result = watch::run(&options, &connector, notifier.as_ref()).await;

    let uptime = duration_human(started.elapsed().as_secs());
    info!(uptime = uptime.as_str(), "deluge-distributor exiting");
    if let Some(notifier) = &notifier {
        notifier
            .send(&format!("deluge-distributor exiting after {uptime}"))
            .await;
    }
    result.map_err(Into::into)
}

fn app_dir(name: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name)
}
