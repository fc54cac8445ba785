//! `fleetpulse watch`: stream the push channel to stdout.

use std::sync::Arc;
use std::time::Duration;

use tabled::Tabled;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use fleetpulse_core::{
    ConnectionState, DeviceRecord, QueryCache, RegionCache, SyncClient, WsConnector,
};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, EventPrinter};

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Last report")]
    reported: String,
    #[tabled(rename = "Elements")]
    elements: usize,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            id: d.id,
            name: d.name().unwrap_or("-").to_owned(),
            status: if d.is_online() { "online" } else { "offline" }.into(),
            reported: d
                .report_time
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            elements: d.elements.len(),
        }
    }
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sync_config = config::build_sync_config(global)?;
    let device_region = sync_config.device_region.clone();
    let url = sync_config.origin.to_string();

    let cache = Arc::new(RegionCache::new());
    let (notify_tx, mut notifications) = mpsc::unbounded_channel();
    let client = SyncClient::spawn(sync_config, WsConnector, cache.clone(), Arc::new(notify_tx));

    let mut events = client.events();
    let mut state = client.state();
    let mut invalidations = cache.invalidations();
    let printer = EventPrinter::new(args.json, output::should_color(global.color));

    client.connect()?;

    let started = Instant::now();
    let stop_at = args.duration.map(|d| started + d);
    let connect_by = args.connect_timeout.map(|d| started + d);
    let mut acknowledged = false;

    let outcome = loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break Ok(());
            }

            () = deadline(stop_at) => break Ok(()),

            () = deadline(connect_by), if !acknowledged => {
                break Err(CliError::ConnectionFailed {
                    url: url.clone(),
                    source: format!(
                        "not acknowledged within {}",
                        humantime::format_duration(args.connect_timeout.unwrap_or(Duration::ZERO))
                    )
                    .into(),
                });
            }

            changed = state.changed() => {
                if changed.is_err() {
                    break Err(CliError::Stopped);
                }
                let current = *state.borrow_and_update();
                acknowledged |= current == ConnectionState::Connected;
                printer.state(current)?;
            }

            event = events.recv() => match event {
                Ok(event) => printer.event(&event)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event output fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break Err(CliError::Stopped),
            },

            Some(notification) = notifications.recv() => printer.notification(&notification)?,

            region = invalidations.recv() => {
                if let Ok(region) = region {
                    tracing::debug!(region = %region, "region invalidated");
                }
            }
        }
    };

    if let Err(e) = client.disconnect() {
        tracing::debug!(error = %e, "disconnect skipped");
    }
    client.shutdown().await;

    if args.summary && !args.json {
        let rows: Vec<DeviceRow> = cache
            .get(&device_region)
            .map(|list| list.iter().map(|d| DeviceRow::from(d.as_ref())).collect())
            .unwrap_or_default();
        output::print_line(&output::render_table(&rows));
    }

    outcome
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
