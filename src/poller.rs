use ublox::UbxPacketRequest;

use crate::{
    settings::{EnabledFeatureSet, HardwareGeneration, MessageKind},
    ubx,
};

/// AID-ALM / AID-EPH identifiers cycle through 1..=32
const MAX_POLL_ID: u8 = 32;

/// Issues the 1 Hz aiding data polls.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    id: u8,
    features: EnabledFeatureSet,
}

impl PollScheduler {
    pub fn new(features: EnabledFeatureSet) -> Self {
        Self { id: 1, features }
    }

    /// Request frames to send on this tick. The identifier advances
    /// on every tick, whatever is enabled.
    pub fn tick(&mut self) -> Vec<Vec<u8>> {
        let mut requests = Vec::with_capacity(3);

        for kind in [MessageKind::AidAlm, MessageKind::AidEph] {
            if self.features.is_enabled(kind) {
                let (class, id) = kind.class_id(HardwareGeneration::Legacy);
                requests.push(ubx::frame(class, id, &[self.id]));
            }
        }

        if self.features.is_enabled(MessageKind::AidHui) {
            let (class, id) = MessageKind::AidHui.class_id(HardwareGeneration::Legacy);
            requests.push(
                UbxPacketRequest::request_for_unknown(class, id)
                    .into_packet_bytes()
                    .to_vec(),
            );
        }

        self.id += 1;
        if self.id > MAX_POLL_ID {
            self.id = 1;
        }

        requests
    }
}

#[cfg(test)]
mod test {
    use super::PollScheduler;
    use crate::{
        exchange::test::{class_id, payload_of},
        settings::EnabledFeatureSet,
    };

    fn aid() -> EnabledFeatureSet {
        EnabledFeatureSet::resolve(false, false, true, &[])
    }

    #[test]
    fn requests() {
        let mut poller = PollScheduler::new(aid());
        let requests = poller.tick();

        assert_eq!(requests.len(), 3);

        assert_eq!(
            requests[0],
            vec![0xb5, 0x62, 0x0b, 0x30, 0x01, 0x00, 0x01, 0x3d, 0xfb]
        );

        assert_eq!(class_id(&requests[1]), (0x0b, 0x31));
        assert_eq!(payload_of(&requests[1]), &[1]);

        assert_eq!(
            requests[2],
            vec![0xb5, 0x62, 0x0b, 0x02, 0x00, 0x00, 0x0d, 0x32]
        );
    }

    #[test]
    fn id_cycles() {
        let mut poller = PollScheduler::new(aid());

        let ids = (0..66)
            .map(|_| payload_of(&poller.tick()[0])[0])
            .collect::<Vec<_>>();

        let expected = (1..=32).chain(1..=32).chain(1..=2).collect::<Vec<u8>>();
        assert_eq!(ids, expected);
    }

    #[test]
    fn id_advances_when_disabled() {
        let mut poller = PollScheduler::new(EnabledFeatureSet::default());

        for _ in 0..33 {
            assert!(poller.tick().is_empty());
        }
        assert_eq!(poller.id, 2);
    }

    #[test]
    fn alm_and_eph_share_the_id() {
        let mut poller = PollScheduler::new(aid());
        poller.tick();
        poller.tick();

        let requests = poller.tick();
        assert_eq!(payload_of(&requests[0]), &[3]);
        assert_eq!(payload_of(&requests[1]), &[3]);
    }
}
