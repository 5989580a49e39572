use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use log::{LevelFilter, error, info, warn};
use tokio::sync::broadcast;

mod arming;
mod config;
mod devices;
mod dispatch;
mod error;
mod manager;
mod messages;
mod mqtt;
mod notify;
mod presence;
mod scanner;
mod trigger;

/// Arms cameras when every known device has left the network, and disarms them
/// when one comes back.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Run a single device check and exit
    #[arg(long)]
    once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::AppConfig::load(&cli.config)?;

    let registry =
        devices::DeviceRegistry::from_config(config.devices.as_deref().unwrap_or_default())
            .context("invalid [[devices]] section")?;
    info!("Watching for {} known device(s)", registry.len());
    if registry.is_empty() {
        warn!("No devices configured, every scan will report nobody present");
    }

    let scan = config.scan.clone().unwrap_or_default();
    let notify_config = config.notify.clone().unwrap_or_default();
    let call_timeout = config.dispatch.clone().unwrap_or_default().timeout();

    let (tx, rx) = broadcast::channel(10);

    let mqtt_client = match &config.mqtt {
        Some(mqtt_config) => {
            let (client, mut eventloop) = mqtt::MqttClient::new(mqtt_config);
            client.subscribe().await?;
            let event_client = client.clone();
            let tx = tx.clone();
            // Handle incoming MQTT messages (e.g. scan requests)
            tokio::task::spawn(async move {
                event_client.event_loop(&mut eventloop, tx).await;
            });
            Some(client)
        }
        None => None,
    };

    let webhook = notify::WebhookNotifier::from_config(&notify_config, call_timeout)
        .context("building webhook client")?;
    let notifier: Arc<dyn dispatch::Notifier> = match (webhook, &mqtt_client) {
        (Some(webhook), _) => Arc::new(webhook),
        (None, Some(client)) => Arc::new(client.clone()),
        (None, None) => Arc::new(notify::LogNotifier),
    };

    let targets = config
        .targets
        .iter()
        .flatten()
        .map(dispatch::ManagedTarget::from)
        .collect();
    let arming = Arc::new(arming::Arming::new(config.arming.clone(), mqtt_client.clone()));
    let dispatcher = dispatch::ActionDispatcher::new(
        targets,
        arming,
        notifier,
        notify_config.prefix(),
        call_timeout,
    );

    let core = Arc::new(manager::Manager::new(
        scanner::ScanExecutor::new(scanner::ScanCommand::new(scan.command(), scan.args())),
        registry,
        dispatcher,
        manager::PollSettings {
            timeout: scan.timeout(),
            check_interval: scan.check_interval(),
        },
    ));

    if cli.once {
        let report = core.run().await;
        info!("Device check finished: {:?}", report);
    } else {
        trigger::run_triggers(core, scan.poll_interval(), rx).await;
    }
    drop(tx);

    if let Some(client) = mqtt_client {
        if let Err(err) = client.disconnect().await {
            error!("Error disconnecting from MQTT: {:?}", err);
        }
    }

    Ok(())
}
