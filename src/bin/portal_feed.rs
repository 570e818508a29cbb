use std::path::PathBuf;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use jobportal_live::config::PortalConfig;
use jobportal_live::core::Notification;
use jobportal_live::logging::init_tracing;
use jobportal_live::session::{Credential, SessionContext};
use jobportal_live::views::NotificationFeed;

/// One line of stdin: an event as the portal pushes it.
#[derive(Debug, Deserialize)]
struct WireEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(error) = run().await {
        eprintln!("portal feed failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let mut config_path: Option<PathBuf> = None;
    let mut token: Option<String> = None;
    let mut base_url: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            print_help();
            return Ok(());
        }

        if let Some(value) = arg.strip_prefix("--config=") {
            config_path = Some(PathBuf::from(value));
            continue;
        }
        if arg == "--config" {
            let value = args
                .next()
                .ok_or_else(|| "--config requires a path".to_string())?;
            config_path = Some(PathBuf::from(value));
            continue;
        }

        if let Some(value) = arg.strip_prefix("--token=") {
            token = Some(value.to_string());
            continue;
        }
        if arg == "--token" {
            token = Some(
                args.next()
                    .ok_or_else(|| "--token requires a value".to_string())?,
            );
            continue;
        }

        if let Some(value) = arg.strip_prefix("--base-url=") {
            base_url = Some(value.to_string());
            continue;
        }
        if arg == "--base-url" {
            base_url = Some(
                args.next()
                    .ok_or_else(|| "--base-url requires a value".to_string())?,
            );
            continue;
        }

        return Err(format!("unknown argument '{arg}'. Use --help for usage"));
    }

    let mut config = PortalConfig::load(config_path.as_deref()).map_err(|error| error.to_string())?;
    if let Some(base_url) = base_url {
        config.api_base_url = base_url;
        config.validate().map_err(|error| error.to_string())?;
    }
    let credential = token
        .or_else(|| config.auth_token.clone())
        .map(|token| Credential::new(token, None));

    let mut session =
        SessionContext::init(config, credential).map_err(|error| error.to_string())?;
    let feed = NotificationFeed::mount(&session).await;
    print_feed(&feed);

    let Some(channel) = session.channel().cloned() else {
        eprintln!("no credential given, live updates disabled");
        return Ok(());
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(|error| error.to_string())? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let wire: WireEvent = match serde_json::from_str(line) {
            Ok(wire) => wire,
            Err(error) => {
                tracing::warn!("skipping unreadable event line: {error}");
                continue;
            }
        };
        if channel.deliver(&wire.event, wire.data).is_some() {
            // Listener tasks merge asynchronously.
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            print_feed(&feed);
        }
    }

    feed.unmount();
    session.logout();
    Ok(())
}

fn print_feed(feed: &NotificationFeed) {
    let notifications = feed.notifications();
    println!(
        "-- {} notifications, {} unread ({:?})",
        notifications.len(),
        feed.unread_count(),
        feed.load_state()
    );
    for notification in &notifications {
        println!("{}", render(notification));
    }
}

fn render(notification: &Notification) -> String {
    format!(
        "{} [{}] {:<9} {}: {}",
        if notification.read { " " } else { "*" },
        notification.timestamp.format("%Y-%m-%d %H:%M"),
        notification.kind.as_str(),
        notification.sender_name,
        notification.content
    )
}

fn print_help() {
    println!("portal_feed");
    println!();
    println!("Loads the unified notification feed and applies events read from stdin.");
    println!();
    println!("Usage:");
    println!("  cargo run --bin portal_feed -- [options] < events.ndjson");
    println!();
    println!("Options:");
    println!("  --config <path>     JSON config file (defaults + env overrides apply)");
    println!("  --token <token>     Bearer token; overrides JOBPORTAL_TOKEN");
    println!("  --base-url <url>    Portal API base URL; overrides JOBPORTAL_API_URL");
    println!("  -h, --help          Show this help");
    println!();
    println!("Event lines: {{\"event\": \"message:new\", \"data\": {{...}}}}");
}
