use ublox::UbxPacketMeta;

use crate::{error::ExchangeError, ubx::PacketRef};

/// Message exchange with the receiver.
///
/// Implementors own the byte-stream and the parser. Every call blocks
/// until the round trip completes or times out.
pub trait Exchange {
    /// Writes a complete frame without expecting any response.
    fn send(&mut self, frame: &[u8]) -> Result<(), ExchangeError>;

    /// Writes a configuration frame of message `T` and waits for its ACK.
    /// A NAK is reported as [ExchangeError::Nak].
    fn configure<T: UbxPacketMeta>(&mut self, frame: &[u8]) -> Result<(), ExchangeError>;

    /// Polls message `T` (empty payload request) and hands every received
    /// packet to `decode`, until it returns a value. A `T` answer the parser
    /// could not interpret is an [ExchangeError::Decode].
    fn poll<T, R, F>(&mut self, decode: F) -> Result<R, ExchangeError>
    where
        T: UbxPacketMeta,
        F: FnMut(&PacketRef<'_>) -> Option<R>;
}

/// Verdict carried by an ACK-ACK / ACK-NAK about message `T`.
pub(crate) fn acknowledgment<T: UbxPacketMeta>(
    packet: &PacketRef<'_>,
) -> Option<Result<(), ExchangeError>> {
    match packet {
        PacketRef::AckAck(ack) if ack.is_ack_for::<T>() => Some(Ok(())),
        PacketRef::AckNak(nak) if nak.is_nak_for::<T>() => Some(Err(ExchangeError::Nak {
            class: T::CLASS,
            id: T::ID,
        })),
        _ => None,
    }
}

/// Verdict on a packet received while polling `T`.
pub(crate) fn poll_answer<T, R, F>(
    packet: &PacketRef<'_>,
    decode: &mut F,
) -> Option<Result<R, ExchangeError>>
where
    T: UbxPacketMeta,
    F: FnMut(&PacketRef<'_>) -> Option<R>,
{
    if let Some(value) = decode(packet) {
        return Some(Ok(value));
    }

    match packet {
        PacketRef::Unknown(unknown) if (unknown.class, unknown.msg_id) == (T::CLASS, T::ID) => {
            Some(Err(ExchangeError::Decode {
                class: T::CLASS,
                id: T::ID,
                reason: "unexpected payload length",
            }))
        },
        // a rejected poll is answered with a NAK
        _ => match acknowledgment::<T>(packet) {
            Some(Err(e)) => Some(Err(e)),
            _ => None,
        },
    }
}
