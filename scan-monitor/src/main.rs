//! scan-monitor - print barcode scans from a serial scanner

mod settings;

use anyhow::{bail, Context};
use clap::Parser;
use scan_driver::{
    DeviceState, PortScanner, ScanEventSender, ScannerDriver, ScannerEvent, SerialOpener,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "scan-monitor")]
#[command(about = "Print barcode scans from a serial scanner", long_about = None)]
struct Args {
    /// List serial ports and exit
    #[arg(long)]
    list: bool,

    /// Write the current settings to settings.json and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scan_monitor=info,scan_driver=info,scan_protocol=info,scan_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::load();

    if args.init_config {
        let path = settings.save()?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    if args.list || settings.list_ports_on_startup {
        list_ports();
        if args.list {
            return Ok(());
        }
    }

    let config = settings
        .channel_config()
        .context("invalid scanner settings")?;

    info!(
        "Starting scan-monitor on {} @ {} baud",
        config.port_id, config.baud_rate
    );

    let (sink, mut events) = ScanEventSender::channel(settings.event_buffer.max(1));
    let driver = ScannerDriver::new(config, SerialOpener, sink)?;
    let scanner = driver.handle();

    scanner
        .enable()
        .await
        .with_context(|| format!("could not enable scanner on {}", settings.port_id))?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut faulted = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break; };
                if !print_event(&event, settings.show_hex) {
                    faulted = true;
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    if let Ok(health) = scanner.check_health().await {
        info!("{}", health);
    }
    if let Ok(stats) = scanner.stats().await {
        info!(
            "{} scans delivered, {} dropped, {} discarded",
            stats.delivered, stats.delivery_failures, stats.discarded
        );
    }
    driver.shutdown().await?;

    if faulted {
        bail!("scanner on {} entered the error state", settings.port_id);
    }
    Ok(())
}

fn list_ports() {
    match PortScanner::new().enumerate_ports() {
        Ok(ports) if ports.is_empty() => println!("No serial ports found"),
        Ok(ports) => {
            for port in ports {
                let marker = if port.scanner_vendor().is_some() { "*" } else { " " };
                println!("{} {:<24} {}", marker, port.port, port.description());
            }
        }
        Err(e) => warn!("{}", e),
    }
}

/// Print one event. Returns false once the scanner has faulted.
fn print_event(event: &ScannerEvent, show_hex: bool) -> bool {
    match event {
        ScannerEvent::Scan(record) => {
            if show_hex {
                println!(
                    "{:<12} {}  {:02X?}",
                    record.symbology(),
                    record.label_text(),
                    record.raw()
                );
            } else {
                println!("{:<12} {}", record.symbology(), record.label_text());
            }
            true
        }
        ScannerEvent::StateChanged { to, .. } => *to != DeviceState::Error,
        ScannerEvent::Error {
            context,
            kind,
            message,
        } => {
            warn!("{} ({}): {}", context, kind.name(), message);
            true
        }
    }
}
