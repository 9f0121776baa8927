use serialport::SerialPort;
use std::{
    io::{ErrorKind, Read, Write},
    net::TcpStream,
};

/// [Interface] to the U-Blox stream
pub enum Interface {
    /// [Interface::Port] is a physical serial port.
    Port(Box<dyn SerialPort>),

    /// [Interface::Tcp] is a receiver exposed over a TCP socket.
    Tcp(TcpStream),
}

impl Interface {
    /// Creates a new [SerialPort] interface
    pub fn from_serial_port(port: Box<dyn SerialPort>) -> Self {
        Self::Port(port)
    }

    /// Creates a new TCP interface
    pub fn from_tcp_stream(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }
}

impl Read for Interface {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Port(port) => port.read(buf),
            Self::Tcp(stream) => match stream.read(buf) {
                Ok(0) if !buf.is_empty() => Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )),
                other => other,
            },
        }
    }
}

impl Write for Interface {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Port(port) => port.write(buf),
            Self::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Port(port) => port.flush(),
            Self::Tcp(stream) => stream.flush(),
        }
    }
}
