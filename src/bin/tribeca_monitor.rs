use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use tribeca_link::transport::WsTransport;
use tribeca_link::{ClientController, FireFactory, Hub, LinkConfig, SubscriberFactory, Subscription};

/// Connects to a tribeca engine and logs what the dashboard would show.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine WebSocket URL (overrides config file and TRIBECA_URL)
    #[arg(long)]
    url: Option<String>,

    /// JSON link config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Delay before reconnecting after the link drops, in milliseconds
    #[arg(long)]
    reconnect_ms: Option<u64>,

    /// Extra topics to log raw, by wire name (repeatable)
    #[arg(short, long)]
    watch: Vec<String>,

    /// Seconds between status lines
    #[arg(long, default_value_t = 10)]
    status_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LinkConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LinkConfig::default(),
    }
    .with_env_overrides();
    if let Some(url) = args.url {
        config = config.with_url(url);
    }
    if let Some(ms) = args.reconnect_ms {
        config = config.with_reconnect_delay(Duration::from_millis(ms));
    }

    info!("Starting tribeca monitor");
    info!("Engine: {}", config.url);

    let (transport, events, link) =
        WsTransport::spawn(config).context("Failed to start link")?;
    let hub = Hub::new(Rc::new(transport));
    let subscribers = SubscriberFactory::new(&hub);
    let controller = ClientController::new(subscribers.clone(), FireFactory::new(&hub));

    let mut watches = Vec::new();
    for name in &args.watch {
        let slot = Rc::new(RefCell::new(None));
        watch(&subscribers, name, &slot).with_context(|| format!("Cannot watch {name:?}"))?;
        watches.push(slot);
    }

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let mut status = tokio::time::interval(Duration::from_secs(args.status_secs.max(1)));
            let run = hub.run(events);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    _ = &mut run => {
                        warn!("Link task ended");
                        break;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted");
                        break;
                    }
                    _ = status.tick() => log_status(&controller),
                }
            }
        })
        .await;

    controller.shutdown();
    drop(watches);
    link.abort();
    info!("Dropped publishes: {}", hub.dropped_sends());
    Ok(())
}

fn log_status(controller: &ClientController) {
    match controller.pair_name() {
        Some(pair) => info!(
            "{} {} on {} | memory {} | notepad {:?}",
            controller.title().unwrap_or_default(),
            pair,
            controller.exchange_name().unwrap_or_default(),
            controller.memory().unwrap_or_else(|| "?".into()),
            controller.notepad().unwrap_or_default(),
        ),
        None => info!("{}", controller.state()),
    }
}

/// Logs every value on `name`, resubscribing after each disconnect.
fn watch(
    subscribers: &SubscriberFactory,
    name: &str,
    slot: &Rc<RefCell<Option<Subscription>>>,
) -> tribeca_link::Result<()> {
    let topic = name.to_string();
    let again = (subscribers.clone(), name.to_string(), Rc::downgrade(slot));
    let subscription = subscribers
        .subscriber_by_name(name)?
        .on_snapshot({
            let topic = topic.clone();
            move |items| info!("[{topic}] snapshot of {}", items.len())
        })
        .on_item(move |item| info!("[{topic}] {item}"))
        .on_disconnect(move |reason| {
            let (subscribers, name, slot) = &again;
            info!("[{name}] severed ({reason}), resubscribing");
            if let Some(slot) = slot.upgrade() {
                if let Err(err) = watch(subscribers, name, &slot) {
                    warn!("[{name}] resubscribe failed: {err}");
                }
            }
        })
        .subscribe();
    *slot.borrow_mut() = Some(subscription);
    Ok(())
}
