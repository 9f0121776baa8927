use log::{debug, error, info, trace, warn};

use std::{
    io::{ErrorKind, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

use ublox::{
    UbxPacket, UbxPacketMeta, UbxPacketRequest,
    cfg_prt::{
        CfgPrtUart, CfgPrtUartBuilder, DataBits, InProtoMask, OutProtoMask, Parity, StopBits,
        UartMode, UartPortId,
    },
};

pub mod address;
mod interface;

use address::{DeviceAddress, Protocol};
use interface::Interface;

use crate::{
    error::{ExchangeError, TransportError},
    exchange::{Exchange, acknowledgment, poll_answer},
    ubx::{self, PacketRef, UbxParser},
};

/// Read timeout of the underlying channel. Kept short so that the event
/// loop can service its timers between two reads.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Default ACK / response timeout.
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Receiver attached to a byte-stream, implementing [Exchange] on top
/// of the UBX framing.
pub struct Device {
    address: DeviceAddress,
    interface: Interface,
    parser: UbxParser,
    buffer: Vec<u8>,
    response_timeout: Duration,
}

impl Device {
    fn new(address: DeviceAddress, interface: Interface) -> Self {
        Self {
            address,
            interface,
            parser: UbxParser::default(),
            buffer: vec![0; 8192],
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Opens the channel designated by `address`.
    pub fn open(address: &DeviceAddress, baud: u32) -> Result<Self, TransportError> {
        match address {
            DeviceAddress::Serial { path } => Self::open_serial_port(path, baud),
            DeviceAddress::Network {
                protocol: Protocol::Tcp,
                ..
            } => Self::connect_tcp(address),
            DeviceAddress::Network { protocol, .. } => {
                Err(TransportError::UnsupportedProtocol(protocol.to_string()))
            },
        }
    }

    fn open_serial_port(path: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;

        info!("Opened serial port {}", path);

        let address = DeviceAddress::Serial {
            path: path.to_string(),
        };

        let mut device = Self::new(address, Interface::from_serial_port(port));

        let frame = CfgPrtUartBuilder {
            portid: UartPortId::Uart1,
            reserved0: 0,
            tx_ready: 0,
            mode: UartMode::new(DataBits::Eight, Parity::None, StopBits::One),
            baud_rate: baud,
            in_proto_mask: InProtoMask::UBLOX | InProtoMask::NMEA,
            out_proto_mask: OutProtoMask::UBLOX,
            flags: 0,
            reserved5: 0,
        }
        .into_packet_bytes();

        // The receiver may already answer at the new baud rate:
        // a missing ACK is not conclusive here.
        match device.configure::<CfgPrtUart>(&frame) {
            Ok(_) => debug!("UART1 configured at {} bauds", baud),
            Err(e) => warn!("CFG-PRT not acknowledged: {}", e),
        }

        Ok(device)
    }

    fn connect_tcp(address: &DeviceAddress) -> Result<Self, TransportError> {
        let socket_address = address.socket_address().unwrap_or_default();

        info!("Connecting to {} ...", address);

        let resolution_error = |source| TransportError::Resolution {
            address: socket_address.clone(),
            source,
        };

        let endpoints = socket_address
            .as_str()
            .to_socket_addrs()
            .map_err(resolution_error)?
            .collect::<Vec<SocketAddr>>();

        if endpoints.is_empty() {
            return Err(resolution_error(std::io::Error::new(
                ErrorKind::NotFound,
                "no address found",
            )));
        }

        let connect_error = |source| TransportError::Connect {
            address: socket_address.clone(),
            source,
        };

        let stream = TcpStream::connect(&endpoints[..]).map_err(connect_error)?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(connect_error)?;

        info!("Connected to {}.", socket_address);

        Ok(Self::new(address.clone(), Interface::from_tcp_stream(stream)))
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Consume all UBX packets available right now.
    ///
    /// ## Returns
    /// - Ok(0) when nothing was received before the read timeout
    /// - Ok(n) with n=number of packets that were consumed (not bytes)
    /// - Err(e) on I/O error, which is fatal for the channel
    pub fn consume_all_cb<T: FnMut(PacketRef<'_>)>(&mut self, cb: T) -> std::io::Result<usize> {
        let nbytes = self.read_some()?;
        Ok(ubx::consume(&mut self.parser, &self.buffer[..nbytes], cb))
    }

    /// Reads the interface once. A read timeout is "no data".
    fn read_some(&mut self) -> std::io::Result<usize> {
        match self.interface.read(&mut self.buffer) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Drains incoming packets until `matcher` returns a verdict about `T`
    /// or the response timeout expires. Unrelated packets are dropped.
    fn wait_for<T, R, F>(&mut self, mut matcher: F) -> Result<R, ExchangeError>
    where
        T: UbxPacketMeta,
        F: FnMut(&PacketRef<'_>) -> Option<Result<R, ExchangeError>>,
    {
        let deadline = Instant::now() + self.response_timeout;
        let mut nbytes = 0;

        loop {
            let mut it = self.parser.consume_ubx(&self.buffer[..nbytes]);

            while let Some(next) = it.next() {
                match next {
                    Ok(UbxPacket::Proto23(packet)) => {
                        if let Some(verdict) = matcher(&packet) {
                            return verdict;
                        }
                        let (class, id) = packet.class_and_msg_id();
                        trace!(
                            "dropping {:#04x}/{:#04x} while waiting for {:#04x}/{:#04x}",
                            class,
                            id,
                            T::CLASS,
                            T::ID
                        );
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!("UBX parsing error: {}", e);
                    },
                }
            }

            drop(it);

            if Instant::now() >= deadline {
                return Err(ExchangeError::Timeout {
                    class: T::CLASS,
                    id: T::ID,
                });
            }

            nbytes = self.read_some()?;
        }
    }

    fn write_all(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.interface.write_all(frame)?;
        self.interface.flush()
    }
}

impl Exchange for Device {
    fn send(&mut self, frame: &[u8]) -> Result<(), ExchangeError> {
        self.write_all(frame)?;
        Ok(())
    }

    fn configure<T: UbxPacketMeta>(&mut self, frame: &[u8]) -> Result<(), ExchangeError> {
        self.write_all(frame)?;
        self.wait_for::<T, _, _>(acknowledgment::<T>)
    }

    fn poll<T, R, F>(&mut self, mut decode: F) -> Result<R, ExchangeError>
    where
        T: UbxPacketMeta,
        F: FnMut(&PacketRef<'_>) -> Option<R>,
    {
        self.write_all(&UbxPacketRequest::request_for::<T>().into_packet_bytes())?;
        self.wait_for::<T, _, _>(|packet| poll_answer::<T, R, F>(packet, &mut decode))
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Interface::Tcp(stream) = &self.interface {
            let _ = stream.shutdown(Shutdown::Both);
        }
        info!("Closed connection to {}.", self.address);
    }
}
