#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * UBX-NODE: U-Blox GNSS receiver driver.
 * Authors: Guillaume W. Bres <guillaume.bressaix@gmail.com> et al,
 * This framework is shipped under Mozilla Public V2 license.
 */

use env_logger::{Builder, Target};

use log::{error, info, warn};

use tokio::{
    signal,
    sync::{mpsc, watch},
};

mod cli;
mod constellation;
mod device;
mod diagnostics;
mod error;
mod exchange;
mod node;
mod poller;
mod publisher;
mod sequencer;
mod settings;
mod translator;
mod ubx;

use crate::{
    cli::Cli,
    device::Device,
    error::Error,
    node::{Node, host_time},
    publisher::{ChannelSink, Writer},
    settings::Settings,
};

/// Opens the receiver, configures it, then streams until shutdown.
/// Runs on a blocking thread: every exchange with the receiver blocks.
fn drive(
    settings: Settings,
    sink: ChannelSink,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Error> {
    let mut device = Device::open(&settings.device, settings.baud_rate)?;

    sequencer::run(&mut device, &settings)?;

    let mut node = Node::new(settings, sink, host_time());
    node.subscribe(&mut device);
    node.run(&mut device, &shutdown)?;

    Ok(())
}

#[tokio::main]
pub async fn main() {
    let mut builder = Builder::from_default_env();

    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    // cli
    let cli = Cli::new();

    let settings = match Settings::try_from(cli.parameters()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", Error::from(e));
            std::process::exit(1);
        },
    };

    if settings.enable_ppp {
        warn!("Warning: PPP is enabled - this is an expert setting.");
    }

    info!(
        "{} - {} at {:.1}Hz, constellations: {}",
        host_time(),
        settings.device,
        settings.target_frequency(),
        settings.constellations
    );

    // shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // publications
    let (tx, rx) = mpsc::channel(128);

    let mut writer = Writer::new(std::io::stdout(), shutdown_rx.clone(), rx);

    let publisher = tokio::spawn(async move {
        writer.run().await;
    });

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(_) => {
                info!("{} - interrupted", host_time());

                if let Err(e) = shutdown_tx.send(true) {
                    error!("failed to signal shutdown: {}", e);
                }
            },
            Err(e) => {
                error!("signal handling error: {}", e);
            },
        }
    });

    let sink = ChannelSink::new(tx);

    let driver = tokio::task::spawn_blocking(move || drive(settings, sink, shutdown_rx));

    let result = match driver.await {
        Ok(result) => result,
        Err(e) => {
            error!("driver task failure: {}", e);
            std::process::exit(1);
        },
    };

    // every sender is gone by now: the writer drains and exits
    if let Err(e) = publisher.await {
        error!("publisher task failure: {}", e);
    }

    match result {
        Ok(_) => {
            info!("{} - exiting", host_time());
        },
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        },
    }
}
