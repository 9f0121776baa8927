//! UBX plumbing on top of the [ublox] crate: the protocol 23 parser,
//! a raw payload view for pass-through records and the few frames
//! the crate cannot build for us. Typed conversions live in [messages].

use log::error;

use ublox::{Parser, UbxPacket, proto23::Proto23};

pub use ublox::packetref_proto23::PacketRef;

pub mod messages;

const SYNC_CHAR_1: u8 = 0xb5;
const SYNC_CHAR_2: u8 = 0x62;

pub mod class {
    pub const NAV: u8 = 0x01;
    pub const RXM: u8 = 0x02;
    pub const CFG: u8 = 0x06;
    pub const AID: u8 = 0x0b;
}

/// Streaming parser, protocol 23 message definitions.
pub type UbxParser = Parser<Vec<u8>, Proto23>;

/// Feeds `data` to the parser and hands every complete packet to `cb`.
/// Corrupted frames are logged and skipped.
/// Returns the number of packets delivered.
pub fn consume<F: FnMut(PacketRef<'_>)>(parser: &mut UbxParser, data: &[u8], mut cb: F) -> usize {
    let mut total = 0;
    let mut it = parser.consume_ubx(data);

    loop {
        match it.next() {
            Some(Ok(UbxPacket::Proto23(packet))) => {
                cb(packet);
                total += 1;
            },
            Some(Ok(_)) => {},
            Some(Err(e)) => {
                error!("UBX parsing error: {}", e);
            },
            None => return total,
        }
    }
}

/// Raw payload of the packets we forward without interpretation.
pub fn payload<'p>(packet: &'p PacketRef<'_>) -> Option<&'p [u8]> {
    match packet {
        PacketRef::NavPosLlh(p) => Some(p.as_bytes()),
        PacketRef::NavStatus(p) => Some(p.as_bytes()),
        PacketRef::NavSol(p) => Some(p.as_bytes()),
        PacketRef::NavPvt(p) => Some(p.as_bytes()),
        PacketRef::NavVelNed(p) => Some(p.as_bytes()),
        PacketRef::NavClock(p) => Some(p.as_bytes()),
        PacketRef::RxmRawx(p) => Some(p.as_bytes()),
        PacketRef::RxmSfrbx(p) => Some(p.as_bytes()),
        PacketRef::Unknown(p) => Some(p.payload),
        _ => None,
    }
}

/// 8-bit Fletcher checksum over class, id, length and payload.
fn checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a = 0u8;
    let mut ck_b = 0u8;
    for byte in data {
        ck_a = ck_a.wrapping_add(*byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// Complete frame for messages the [ublox] crate has no builder for
/// (AID polls carrying a satellite id).
pub fn frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut frame = Vec::with_capacity(payload.len() + 8);

    frame.extend_from_slice(&[SYNC_CHAR_1, SYNC_CHAR_2, class, id]);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);

    let (ck_a, ck_b) = checksum(&frame[2..]);
    frame.push(ck_a);
    frame.push(ck_b);
    frame
}
