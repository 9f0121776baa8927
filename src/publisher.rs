use log::{debug, error};

use serde::Serialize;

use std::io::{BufWriter, Write};

use tokio::sync::{mpsc::Receiver as Rx, mpsc::Sender as Tx, watch::Receiver as WatchRx};

use crate::{
    diagnostics::DiagnosticReport,
    translator::{NavSatFix, TwistWithCovariance},
    ubx::messages::NavPvt,
};

/// Publication capability. Delivery is best effort:
/// implementations never block the driver.
pub trait Sink<M> {
    fn publish(&mut self, msg: M);
}

/// Everything the driver publishes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Publication {
    NavPvt(NavPvt),
    Fix(NavSatFix),
    Velocity(TwistWithCovariance),
    /// Pass-through record
    Raw {
        #[serde(skip)]
        topic: &'static str,
        payload: Vec<u8>,
    },
    Diagnostics(DiagnosticReport),
}

impl Publication {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::NavPvt(_) => "navpvt",
            Self::Fix(_) => "fix",
            Self::Velocity(_) => "fix_velocity",
            Self::Raw { topic, .. } => *topic,
            Self::Diagnostics(_) => "diagnostics",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'static str,
    msg: &'a Publication,
}

/// [Sink] feeding the [Writer] task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Tx<Publication>,
}

impl ChannelSink {
    pub fn new(tx: Tx<Publication>) -> Self {
        Self { tx }
    }
}

impl Sink<Publication> for ChannelSink {
    fn publish(&mut self, msg: Publication) {
        let topic = msg.topic();

        match self.tx.try_send(msg) {
            Ok(_) => {},
            Err(e) => {
                error!("failed to publish on \"{}\": {}", topic, e);
            },
        }
    }
}

/// Writes every publication as one JSON document per line.
pub struct Writer<W: Write> {
    /// [Publication]s
    rx: Rx<Publication>,

    /// graceful exit
    shutdown: WatchRx<bool>,

    output: BufWriter<W>,
}

impl<W: Write> Writer<W> {
    pub fn new(output: W, shutdown: WatchRx<bool>, rx: Rx<Publication>) -> Self {
        Self {
            rx,
            shutdown,
            output: BufWriter::new(output),
        }
    }

    fn write(&mut self, msg: &Publication) -> std::io::Result<()> {
        let envelope = Envelope {
            topic: msg.topic(),
            msg,
        };

        serde_json::to_writer(&mut self.output, &envelope)?;
        self.output.write_all(b"\n")?;
        self.output.flush()
    }

    fn publish(&mut self, msg: &Publication) {
        if let Err(e) = self.write(msg) {
            error!("failed to write \"{}\": {}", msg.topic(), e);
        }
    }

    /// Runs until shutdown is signaled or every sender is gone.
    /// Publications already queued at shutdown are still written.
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(msg) => self.publish(&msg),
                    None => {
                        debug!("publisher: all senders closed");
                        return;
                    },
                },
                _ = self.shutdown.changed() => {
                    let mut pending = 0;
                    while let Ok(msg) = self.rx.try_recv() {
                        self.publish(&msg);
                        pending += 1;
                    }
                    debug!("publisher: shutdown ({} pending publications written)", pending);
                    return;
                },
            }
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Option<W> {
        self.output.into_inner().ok()
    }
}
