use log::{debug, error, info, trace, warn};

use hifitime::prelude::Epoch;

use std::time::{Duration as StdDuration, Instant};

use tokio::sync::watch::Receiver as WatchRx;

use ublox::cfg_msg::{CfgMsgSinglePort, CfgMsgSinglePortBuilder};

use crate::{
    device::Device,
    diagnostics::Diagnostics,
    error::ExchangeError,
    exchange::Exchange,
    poller::PollScheduler,
    publisher::{Publication, Sink},
    settings::{MessageKind, Settings},
    translator::Translator,
    ubx::{self, PacketRef, messages::NavPvt},
};

/// Aiding data poll period
const POLL_PERIOD: StdDuration = StdDuration::from_secs(1);

/// Current host time
pub fn host_time() -> Epoch {
    Epoch::now().unwrap_or_else(|e| panic!("Failed to determine system time: {}", e))
}

/// Steady-state driver context: owns every stateful component.
pub struct Node<S: Sink<Publication>> {
    settings: Settings,
    translator: Translator,
    diagnostics: Diagnostics,
    poller: PollScheduler,
    sink: S,
}

impl<S: Sink<Publication>> Node<S> {
    pub fn new(settings: Settings, sink: S, now: Epoch) -> Self {
        Self {
            translator: Translator::new(&settings.frame_id, &settings.constellations),
            diagnostics: Diagnostics::new(&settings, now),
            poller: PollScheduler::new(settings.features),
            settings,
            sink,
        }
    }

    /// Requests every enabled message on the current port.
    /// Rejections are not fatal.
    pub fn subscribe<E: Exchange>(&self, exchange: &mut E) {
        for kind in self.settings.features.enabled() {
            let (msg_class, msg_id) = kind.class_id(self.settings.generation);

            let frame = CfgMsgSinglePortBuilder {
                msg_class,
                msg_id,
                rate: kind.rate(),
            }
            .into_packet_bytes();

            match exchange.configure::<CfgMsgSinglePort>(&frame) {
                Ok(_) => debug!("{} enabled", kind.topic()),
                Err(e) => warn!("failed to enable {}: {}", kind.topic(), e),
            }
        }
    }

    /// Dispatches one received packet.
    pub fn handle_packet(&mut self, packet: &PacketRef<'_>, now: Epoch) {
        let (class, id) = packet.class_and_msg_id();

        match MessageKind::from_class_id(class, id, self.settings.generation) {
            Some(kind) if self.settings.features.is_enabled(kind) => match packet {
                PacketRef::NavPvt(pvt) => self.handle_nav_pvt(NavPvt::from(pvt), now),
                _ if kind == MessageKind::NavPvt => {
                    error!(
                        "NAV-PVT: unexpected payload length ({} bytes)",
                        packet.payload_len()
                    );
                },
                _ => match ubx::payload(packet) {
                    Some(payload) => self.sink.publish(Publication::Raw {
                        topic: kind.topic(),
                        payload: payload.to_vec(),
                    }),
                    None => trace!("no raw view of {:#04x}/{:#04x}", class, id),
                },
            },
            _ => {
                trace!("ignored {:#04x}/{:#04x}", class, id);
            },
        }
    }

    fn handle_nav_pvt(&mut self, pvt: NavPvt, now: Epoch) {
        let (fix, velocity) = self.translator.translate(&pvt, now);

        self.diagnostics.record(&pvt, fix.stamp, now);

        self.sink.publish(Publication::NavPvt(pvt));
        self.sink.publish(Publication::Fix(fix));
        self.sink.publish(Publication::Velocity(velocity));
    }

    /// Issues this tick's aiding polls.
    pub fn poll<E: Exchange>(&mut self, exchange: &mut E) -> Result<(), ExchangeError> {
        for request in self.poller.tick() {
            exchange.send(&request)?;
        }
        Ok(())
    }

    /// Publishes the diagnostic report.
    pub fn report(&mut self, now: Epoch) {
        let report = self.diagnostics.report(now);
        self.sink.publish(Publication::Diagnostics(report));
    }

    /// Event loop: runs until shutdown is requested or the channel fails.
    pub fn run(&mut self, device: &mut Device, shutdown: &WatchRx<bool>) -> Result<(), ExchangeError> {
        let report_period =
            StdDuration::from_secs_f64(self.settings.diagnostic_period.to_seconds());

        let mut next_poll = Instant::now() + POLL_PERIOD;
        let mut next_report = Instant::now() + report_period;

        info!("{} - streaming from {}", host_time(), device.address());

        loop {
            if *shutdown.borrow() {
                info!("{} - shutdown requested", host_time());
                return Ok(());
            }

            let now = host_time();
            device.consume_all_cb(|packet| self.handle_packet(&packet, now))?;

            let instant = Instant::now();

            if instant >= next_poll {
                self.poll(device)?;
                next_poll += POLL_PERIOD;
            }

            if instant >= next_report {
                self.report(host_time());
                next_report += report_period;
            }
        }
    }
}
