use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command, value_parser};

use crate::settings::{Constellations, MessageKind, Parameters, SIG_CFG_QZSS_L1CA};

/// Accepts decimal or 0x prefixed hexadecimal values
fn parse_mask(s: &str) -> Result<u32, String> {
    let s = s.trim();

    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };

    parsed.map_err(|e| format!("invalid mask \"{}\": {}", s, e))
}

/// Boolean switch: `--flag`, `--flag true` or `--flag false`
fn switch(id: &'static str, default: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .value_name("BOOL")
        .value_parser(value_parser!(bool))
        .num_args(0..=1)
        .default_value(default)
        .default_missing_value("true")
        .help(help)
}

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    fn command() -> Command {
        let mut command = Command::new("ubx-node")
            .author("Guillaume W. Bres, <guillaume.bressaix@gmail.com>")
            .version(env!("CARGO_PKG_VERSION"))
            .about("U-Blox GNSS receiver driver")
            .color(ColorChoice::Always)
            .next_help_heading("Device")
            .arg(
                Arg::new("device")
                    .short('d')
                    .long("device")
                    .value_name("DEVICE")
                    .default_value("/dev/ttyACM0")
                    .help("Serial port (for example /dev/ttyACM0) or network address (tcp://host:port)"),
            )
            .arg(
                Arg::new("baudrate")
                    .short('b')
                    .long("baudrate")
                    .value_name("Baudrate (u32)")
                    .value_parser(value_parser!(u32))
                    .default_value("9600")
                    .help("Serial port baud rate. Not used on network devices."),
            )
            .arg(
                Arg::new("frame-id")
                    .long("frame-id")
                    .value_name("FRAME")
                    .default_value("gps")
                    .help("Frame identifier of the published estimates"),
            )
            .arg(
                Arg::new("ublox-version")
                    .long("ublox-version")
                    .value_name("GENERATION")
                    .value_parser(value_parser!(i64))
                    .allow_negative_numbers(true)
                    .default_value("6")
                    .help("Receiver hardware generation (6, 7, 8..). Drives the constellation configuration."),
            )
            .next_help_heading("Navigation")
            .arg(
                Arg::new("rate")
                    .short('r')
                    .long("rate")
                    .value_name("Hz")
                    .value_parser(value_parser!(i64))
                    .allow_negative_numbers(true)
                    .default_value("4")
                    .help("Navigation solution rate (Hz)"),
            )
            .arg(
                Arg::new("dynamic-model")
                    .long("dynamic-model")
                    .value_name("MODEL")
                    .default_value("portable")
                    .help("Dynamic platform model: portable, stationary, pedestrian, automotive, sea, airborne1, airborne2, airborne4, wristwatch"),
            )
            .arg(
                Arg::new("fix-mode")
                    .long("fix-mode")
                    .value_name("MODE")
                    .default_value("both")
                    .help("Fix mode: 2d, 3d or both"),
            )
            .arg(
                Arg::new("dr-limit")
                    .long("dr-limit")
                    .value_name("SECONDS")
                    .value_parser(value_parser!(i64))
                    .allow_negative_numbers(true)
                    .default_value("0")
                    .help("Dead reckoning limit (s), 0..255"),
            )
            .arg(switch(
                "enable-ppp",
                "false",
                "Precise Point Positioning. This is an expert setting.",
            ))
            .next_help_heading("Constellation selection")
            .arg(switch("enable-gps", "true", "Track GPS"))
            .arg(switch("enable-sbas", "false", "Track SBAS"))
            .arg(switch("enable-galileo", "false", "Track Galileo"))
            .arg(switch("enable-beidou", "false", "Track BeiDou"))
            .arg(switch("enable-imes", "false", "Track IMES"))
            .arg(switch("enable-qzss", "false", "Track QZSS"))
            .arg(switch("enable-glonass", "false", "Track Glonass"))
            .arg(
                Arg::new("qzss-sig-cfg")
                    .long("qzss-sig-cfg")
                    .value_name("MASK")
                    .value_parser(parse_mask)
                    .help("QZSS signal configuration mask. Default is 0x010000 (L1C/A)"),
            )
            .next_help_heading("Diagnostics")
            .arg(
                Arg::new("diagnostic-period")
                    .long("diagnostic-period")
                    .value_name("SECONDS")
                    .value_parser(value_parser!(f64))
                    .allow_negative_numbers(true)
                    .default_value("0.2")
                    .help("Diagnostic report period (s)"),
            )
            .arg(
                Arg::new("freq-tolerance")
                    .long("freq-tolerance")
                    .value_name("RATIO")
                    .value_parser(value_parser!(f64))
                    .default_value("0.05")
                    .help("Tolerated relative deviation of the solution rate"),
            )
            .next_help_heading("Messages")
            .arg(
                Arg::new("all")
                    .long("all")
                    .action(ArgAction::SetTrue)
                    .help("Enable every message kind"),
            )
            .arg(
                Arg::new("rxm")
                    .long("rxm")
                    .action(ArgAction::SetTrue)
                    .help("Enable RXM messages (raw measurements, subframes, ephemeris, almanac)"),
            )
            .arg(
                Arg::new("aid")
                    .long("aid")
                    .action(ArgAction::SetTrue)
                    .help("Enable AID messages, polled every second"),
            );

        for kind in MessageKind::ALL {
            command = command.arg(
                Arg::new(kind.toggle())
                    .long(kind.flag())
                    .value_name("BOOL")
                    .value_parser(value_parser!(bool))
                    .num_args(0..=1)
                    .default_missing_value("true")
                    .help(format!("Publish \"{}\"", kind.topic())),
            );
        }

        command
    }

    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: Self::command().get_matches(),
        }
    }

    #[cfg(test)]
    fn from_args(args: &[&str]) -> Self {
        Self {
            matches: Self::command()
                .try_get_matches_from(args)
                .unwrap_or_else(|e| panic!("{}", e)),
        }
    }

    fn flag(&self, id: &str) -> bool {
        self.matches.get_one::<bool>(id).copied().unwrap_or_default()
    }

    fn string(&self, id: &str) -> String {
        self.matches
            .get_one::<String>(id)
            .cloned()
            .unwrap_or_default()
    }

    fn integer(&self, id: &str) -> i64 {
        self.matches.get_one::<i64>(id).copied().unwrap_or_default()
    }

    fn float(&self, id: &str) -> f64 {
        self.matches.get_one::<f64>(id).copied().unwrap_or_default()
    }

    /// Returns User baud rate specification
    pub fn baud_rate(&self) -> u32 {
        self.matches.get_one::<u32>("baudrate").copied().unwrap_or(9600)
    }

    pub fn constellations(&self) -> Constellations {
        Constellations {
            gps: self.flag("enable-gps"),
            sbas: self.flag("enable-sbas"),
            galileo: self.flag("enable-galileo"),
            beidou: self.flag("enable-beidou"),
            imes: self.flag("enable-imes"),
            qzss: self.flag("enable-qzss"),
            glonass: self.flag("enable-glonass"),
        }
    }

    pub fn qzss_sig_cfg(&self) -> u32 {
        self.matches
            .get_one::<u32>("qzss-sig-cfg")
            .copied()
            .unwrap_or(SIG_CFG_QZSS_L1CA)
    }

    /// Per message kind switches, when set explicitly.
    pub fn explicit_messages(&self) -> Vec<(MessageKind, bool)> {
        MessageKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let value = self.matches.get_one::<bool>(kind.toggle())?;
                Some((kind, *value))
            })
            .collect()
    }

    /// Raw user parameters. Validation happens when building [crate::settings::Settings].
    pub fn parameters(&self) -> Parameters {
        Parameters {
            device: self.string("device"),
            frame_id: self.string("frame-id"),
            baudrate: self.baud_rate(),
            rate: self.integer("rate"),
            constellations: self.constellations(),
            qzss_sig_cfg: self.qzss_sig_cfg(),
            enable_ppp: self.flag("enable-ppp"),
            dynamic_model: self.string("dynamic-model"),
            fix_mode: self.string("fix-mode"),
            dr_limit: self.integer("dr-limit"),
            ublox_version: self.integer("ublox-version"),
            diagnostic_period: self.float("diagnostic-period"),
            freq_tolerance: self.float("freq-tolerance"),
            all: self.matches.get_flag("all"),
            rxm: self.matches.get_flag("rxm"),
            aid: self.matches.get_flag("aid"),
            explicit: self.explicit_messages(),
        }
    }
}
