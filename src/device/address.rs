use std::sync::LazyLock;

use regex::Regex;

static NETWORK_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(tcp|udp)://(.+):(\d+)$").expect("valid device address pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

/// Where the receiver is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAddress {
    /// Local serial device, for example `/dev/ttyACM0`
    Serial { path: String },

    /// `tcp://host:port` or `udp://host:port`.
    /// The port is kept verbatim and only checked at resolution time.
    Network {
        protocol: Protocol,
        host: String,
        port: String,
    },
}

impl DeviceAddress {
    /// Interprets a device string. Anything that is not
    /// `(tcp|udp)://host:port` is a serial device path.
    pub fn parse(s: &str) -> Self {
        match NETWORK_ADDRESS.captures(s) {
            Some(captures) => Self::Network {
                protocol: match &captures[1] {
                    "tcp" => Protocol::Tcp,
                    _ => Protocol::Udp,
                },
                host: captures[2].to_string(),
                port: captures[3].to_string(),
            },
            None => Self::Serial {
                path: s.to_string(),
            },
        }
    }

    /// `host:port` of a network address.
    pub fn socket_address(&self) -> Option<String> {
        match self {
            Self::Network { host, port, .. } => Some(format!("{}:{}", host, port)),
            Self::Serial { .. } => None,
        }
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial { path } => write!(f, "{}", path),
            Self::Network {
                protocol,
                host,
                port,
            } => write!(f, "{}://{}:{}", protocol, host, port),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{DeviceAddress, Protocol};

    #[test]
    fn tcp_address() {
        let address = DeviceAddress::parse("tcp://192.168.1.10:2101");
        assert_eq!(
            address,
            DeviceAddress::Network {
                protocol: Protocol::Tcp,
                host: "192.168.1.10".to_string(),
                port: "2101".to_string(),
            }
        );
        assert_eq!(address.to_string(), "tcp://192.168.1.10:2101");
        assert_eq!(address.socket_address().unwrap(), "192.168.1.10:2101");
    }

    #[test]
    fn udp_address() {
        assert_eq!(
            DeviceAddress::parse("udp://gnss.local:5000"),
            DeviceAddress::Network {
                protocol: Protocol::Udp,
                host: "gnss.local".to_string(),
                port: "5000".to_string(),
            }
        );
    }

    #[test]
    fn out_of_range_port_stays_network() {
        for (device, protocol) in [
            ("udp://localhost:70000", Protocol::Udp),
            ("tcp://localhost:99999999999", Protocol::Tcp),
        ] {
            match DeviceAddress::parse(device) {
                DeviceAddress::Network { protocol: p, .. } => assert_eq!(p, protocol),
                other => panic!("{} parsed as {:?}", device, other),
            }
        }
    }

    #[test]
    fn serial_paths() {
        for path in [
            "/dev/ttyACM0",
            "/dev/serial/by-id/usb-u-blox_AG_GNSS_receiver-if00",
            "COM3",
            "ftp://host:21",
            "tcp://host",
            "tcp://host:port",
        ] {
            assert_eq!(
                DeviceAddress::parse(path),
                DeviceAddress::Serial {
                    path: path.to_string()
                },
                "{} should be a serial path",
                path
            );
        }
    }
}
