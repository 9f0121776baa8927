use thiserror::Error;

/// Invalid user parameters, detected before any transport action.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rate must be > 0 (got {0})")]
    InvalidRate(i64),

    #[error("dr_limit must be between 0 and 255 (got {0})")]
    InvalidDeadReckoningLimit(i64),

    #[error("unknown dynamic model \"{0}\"")]
    UnknownDynamicModel(String),

    #[error("unknown fix mode \"{0}\"")]
    UnknownFixMode(String),

    #[error("invalid ublox_version {0}")]
    InvalidHardwareGeneration(i64),

    #[error("qzss_sig_cfg {0:#x} does not fit the signal configuration mask")]
    InvalidQzssSignalMask(u32),

    #[error("diagnostic period must be > 0s (got {0})")]
    InvalidDiagnosticPeriod(f64),

    #[error("frequency tolerance must be >= 0 (got {0})")]
    InvalidFrequencyTolerance(f64),
}

/// Failures to open the byte-stream channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not resolve {address}: {source}")]
    Resolution {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("protocol \"{0}\" is unsupported")]
    UnsupportedProtocol(String),
}

/// Errors raised by a single request / response round trip.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no response to {class:#04x}/{id:#04x}")]
    Timeout { class: u8, id: u8 },

    #[error("{class:#04x}/{id:#04x} rejected (NAK)")]
    Nak { class: u8, id: u8 },

    #[error("failed to decode {class:#04x}/{id:#04x}: {reason}")]
    Decode {
        class: u8,
        id: u8,
        reason: &'static str,
    },
}

/// Fatal handshake step failures.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("failed to set measurement rate to {meas_rate_ms}ms: {source}")]
    MeasurementRate {
        meas_rate_ms: u16,
        #[source]
        source: ExchangeError,
    },

    #[error("failed to {} PPP: {source}", verb(.enable))]
    Ppp {
        enable: bool,
        #[source]
        source: ExchangeError,
    },

    #[error("failed to set model {model}: {source}")]
    DynamicModel {
        model: String,
        #[source]
        source: ExchangeError,
    },

    #[error("failed to set fix mode {mode}: {source}")]
    FixMode {
        mode: String,
        #[source]
        source: ExchangeError,
    },

    #[error("failed to set dead reckoning limit {limit}: {source}")]
    DeadReckoningLimit {
        limit: u8,
        #[source]
        source: ExchangeError,
    },

    #[error("failed to read the GNSS config: {0}")]
    GnssRead(#[source] ExchangeError),

    #[error("failed to configure GNSS: {0}")]
    GnssWrite(#[source] ExchangeError),
}

/// Any fatal condition of the driver.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("error configuring device: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("transport failure: {0}")]
    Exchange(#[from] ExchangeError),
}

fn verb(enable: &bool) -> &'static str {
    if *enable { "enable" } else { "disable" }
}
