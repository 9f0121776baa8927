use hifitime::Duration;
use itertools::Itertools;

use crate::{
    device::address::DeviceAddress,
    constellation::SIG_CFG_MASK,
    error::ConfigError,
    ubx::{
        class,
        messages::{DynamicModel, FixMode},
    },
};

/// Default QZSS signal configuration: L1C/A
pub const SIG_CFG_QZSS_L1CA: u32 = 0x0001_0000;

/// Receiver hardware generation, which drives the constellation
/// configuration strategy and a few message variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HardwareGeneration {
    /// u-blox 6 and older: no CFG-GNSS
    Legacy,
    /// u-blox 7: GLONASS switch only
    Gen7,
    /// u-blox 8 and newer
    Gen8,
}

impl TryFrom<i64> for HardwareGeneration {
    type Error = ConfigError;

    fn try_from(version: i64) -> Result<Self, Self::Error> {
        match version {
            v if v <= 0 => Err(ConfigError::InvalidHardwareGeneration(v)),
            1..=6 => Ok(Self::Legacy),
            7 => Ok(Self::Gen7),
            _ => Ok(Self::Gen8),
        }
    }
}

/// Constellations the user wants tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constellations {
    pub gps: bool,
    pub sbas: bool,
    pub galileo: bool,
    pub beidou: bool,
    pub imes: bool,
    pub qzss: bool,
    pub glonass: bool,
}

impl Default for Constellations {
    fn default() -> Self {
        Self {
            gps: true,
            sbas: false,
            galileo: false,
            beidou: false,
            imes: false,
            qzss: false,
            glonass: false,
        }
    }
}

impl std::fmt::Display for Constellations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (self.gps, "GPS"),
            (self.sbas, "SBAS"),
            (self.galileo, "Galileo"),
            (self.beidou, "BeiDou"),
            (self.imes, "IMES"),
            (self.qzss, "QZSS"),
            (self.glonass, "Glonass"),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| enabled.then_some(name))
        .join(", ");

        write!(f, "{}", names)
    }
}

/// Every message kind the node may subscribe to and forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NavSol,
    NavPvt,
    NavStatus,
    NavSvinfo,
    NavClk,
    RxmRaw,
    RxmSfrb,
    RxmEph,
    RxmAlm,
    NavPosllh,
    NavPosecef,
    NavVelned,
    AidAlm,
    AidEph,
    AidHui,
}

/// Umbrella toggle a kind falls back to when not set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Umbrella {
    /// enabled unless told otherwise
    On,
    All,
    Rxm,
    Aid,
}

impl MessageKind {
    pub const ALL: [MessageKind; 15] = [
        Self::NavSol,
        Self::NavPvt,
        Self::NavStatus,
        Self::NavSvinfo,
        Self::NavClk,
        Self::RxmRaw,
        Self::RxmSfrb,
        Self::RxmEph,
        Self::RxmAlm,
        Self::NavPosllh,
        Self::NavPosecef,
        Self::NavVelned,
        Self::AidAlm,
        Self::AidEph,
        Self::AidHui,
    ];

    /// Toggle name, as exposed on the command line.
    pub fn toggle(&self) -> &'static str {
        match self {
            Self::NavSol => "nav_sol",
            Self::NavPvt => "nav_pvt",
            Self::NavStatus => "nav_status",
            Self::NavSvinfo => "nav_svinfo",
            Self::NavClk => "nav_clk",
            Self::RxmRaw => "rxm_raw",
            Self::RxmSfrb => "rxm_sfrb",
            Self::RxmEph => "rxm_eph",
            Self::RxmAlm => "rxm_alm",
            Self::NavPosllh => "nav_posllh",
            Self::NavPosecef => "nav_posecef",
            Self::NavVelned => "nav_velned",
            Self::AidAlm => "aid_alm",
            Self::AidEph => "aid_eph",
            Self::AidHui => "aid_hui",
        }
    }

    /// Command line flag.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::NavSol => "nav-sol",
            Self::NavPvt => "nav-pvt",
            Self::NavStatus => "nav-status",
            Self::NavSvinfo => "nav-svinfo",
            Self::NavClk => "nav-clk",
            Self::RxmRaw => "rxm-raw",
            Self::RxmSfrb => "rxm-sfrb",
            Self::RxmEph => "rxm-eph",
            Self::RxmAlm => "rxm-alm",
            Self::NavPosllh => "nav-posllh",
            Self::NavPosecef => "nav-posecef",
            Self::NavVelned => "nav-velned",
            Self::AidAlm => "aid-alm",
            Self::AidEph => "aid-eph",
            Self::AidHui => "aid-hui",
        }
    }

    /// Topic the raw record is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::NavSol => "navsol",
            Self::NavPvt => "navpvt",
            Self::NavStatus => "navstatus",
            Self::NavSvinfo => "navsvinfo",
            Self::NavClk => "navclock",
            Self::RxmRaw => "rxmraw",
            Self::RxmSfrb => "rxmsfrb",
            Self::RxmEph => "rxmeph",
            Self::RxmAlm => "rxmalm",
            Self::NavPosllh => "navposllh",
            Self::NavPosecef => "navposecef",
            Self::NavVelned => "navvelned",
            Self::AidAlm => "aidalm",
            Self::AidEph => "aideph",
            Self::AidHui => "aidhui",
        }
    }

    /// (class, id) of this kind on given hardware.
    pub fn class_id(&self, generation: HardwareGeneration) -> (u8, u8) {
        let gen8 = generation >= HardwareGeneration::Gen8;
        match self {
            Self::NavPosecef => (class::NAV, 0x01),
            Self::NavPosllh => (class::NAV, 0x02),
            Self::NavStatus => (class::NAV, 0x03),
            Self::NavSol => (class::NAV, 0x06),
            Self::NavPvt => (class::NAV, 0x07),
            Self::NavVelned => (class::NAV, 0x12),
            Self::NavClk => (class::NAV, 0x22),
            Self::NavSvinfo => (class::NAV, 0x30),
            Self::RxmRaw if gen8 => (class::RXM, 0x15),
            Self::RxmRaw => (class::RXM, 0x10),
            Self::RxmSfrb if gen8 => (class::RXM, 0x13),
            Self::RxmSfrb => (class::RXM, 0x11),
            Self::RxmAlm => (class::RXM, 0x30),
            Self::RxmEph => (class::RXM, 0x31),
            Self::AidHui => (class::AID, 0x02),
            Self::AidAlm => (class::AID, 0x30),
            Self::AidEph => (class::AID, 0x31),
        }
    }

    /// Output rate requested from the receiver, in navigation solutions.
    pub fn rate(&self) -> u8 {
        match self {
            Self::NavSvinfo => 20,
            _ => 1,
        }
    }

    fn umbrella(&self) -> Umbrella {
        match self {
            Self::NavSol
            | Self::NavPvt
            | Self::NavStatus
            | Self::NavPosllh
            | Self::NavPosecef
            | Self::NavVelned => Umbrella::On,
            Self::NavSvinfo | Self::NavClk => Umbrella::All,
            Self::RxmRaw | Self::RxmSfrb | Self::RxmEph | Self::RxmAlm => Umbrella::Rxm,
            Self::AidAlm | Self::AidEph | Self::AidHui => Umbrella::Aid,
        }
    }

    /// Identifies the kind of a received packet.
    pub fn from_class_id(class: u8, id: u8, generation: HardwareGeneration) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.class_id(generation) == (class, id))
    }
}

/// Per message kind publication switches, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnabledFeatureSet {
    pub nav_sol: bool,
    pub nav_pvt: bool,
    pub nav_status: bool,
    pub nav_svinfo: bool,
    pub nav_clk: bool,
    pub rxm_raw: bool,
    pub rxm_sfrb: bool,
    pub rxm_eph: bool,
    pub rxm_alm: bool,
    pub nav_posllh: bool,
    pub nav_posecef: bool,
    pub nav_velned: bool,
    pub aid_alm: bool,
    pub aid_eph: bool,
    pub aid_hui: bool,
}

impl EnabledFeatureSet {
    /// Resolves every switch: explicit value first, umbrella otherwise.
    pub fn resolve(all: bool, rxm: bool, aid: bool, explicit: &[(MessageKind, bool)]) -> Self {
        let mut set = Self::default();

        for kind in MessageKind::ALL {
            let fallback = match kind.umbrella() {
                Umbrella::On => true,
                Umbrella::All => all,
                Umbrella::Rxm => all || rxm,
                Umbrella::Aid => all || aid,
            };

            let value = explicit
                .iter()
                .rev()
                .find_map(|(k, v)| (*k == kind).then_some(*v))
                .unwrap_or(fallback);

            *set.switch_mut(kind) = value;
        }

        set
    }

    fn switch_mut(&mut self, kind: MessageKind) -> &mut bool {
        match kind {
            MessageKind::NavSol => &mut self.nav_sol,
            MessageKind::NavPvt => &mut self.nav_pvt,
            MessageKind::NavStatus => &mut self.nav_status,
            MessageKind::NavSvinfo => &mut self.nav_svinfo,
            MessageKind::NavClk => &mut self.nav_clk,
            MessageKind::RxmRaw => &mut self.rxm_raw,
            MessageKind::RxmSfrb => &mut self.rxm_sfrb,
            MessageKind::RxmEph => &mut self.rxm_eph,
            MessageKind::RxmAlm => &mut self.rxm_alm,
            MessageKind::NavPosllh => &mut self.nav_posllh,
            MessageKind::NavPosecef => &mut self.nav_posecef,
            MessageKind::NavVelned => &mut self.nav_velned,
            MessageKind::AidAlm => &mut self.aid_alm,
            MessageKind::AidEph => &mut self.aid_eph,
            MessageKind::AidHui => &mut self.aid_hui,
        }
    }

    pub fn is_enabled(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::NavSol => self.nav_sol,
            MessageKind::NavPvt => self.nav_pvt,
            MessageKind::NavStatus => self.nav_status,
            MessageKind::NavSvinfo => self.nav_svinfo,
            MessageKind::NavClk => self.nav_clk,
            MessageKind::RxmRaw => self.rxm_raw,
            MessageKind::RxmSfrb => self.rxm_sfrb,
            MessageKind::RxmEph => self.rxm_eph,
            MessageKind::RxmAlm => self.rxm_alm,
            MessageKind::NavPosllh => self.nav_posllh,
            MessageKind::NavPosecef => self.nav_posecef,
            MessageKind::NavVelned => self.nav_velned,
            MessageKind::AidAlm => self.aid_alm,
            MessageKind::AidEph => self.aid_eph,
            MessageKind::AidHui => self.aid_hui,
        }
    }

    /// Enabled kinds, in subscription order.
    pub fn enabled(&self) -> Vec<MessageKind> {
        MessageKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }
}

/// User parameters, as collected. Nothing here has been validated.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub device: String,
    pub frame_id: String,
    pub baudrate: u32,
    pub rate: i64,
    pub constellations: Constellations,
    pub qzss_sig_cfg: u32,
    pub enable_ppp: bool,
    pub dynamic_model: String,
    pub fix_mode: String,
    pub dr_limit: i64,
    pub ublox_version: i64,
    pub diagnostic_period: f64,
    pub freq_tolerance: f64,
    pub all: bool,
    pub rxm: bool,
    pub aid: bool,
    pub explicit: Vec<(MessageKind, bool)>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            device: "/dev/ttyACM0".to_string(),
            frame_id: "gps".to_string(),
            baudrate: 9600,
            rate: 4,
            constellations: Constellations::default(),
            qzss_sig_cfg: SIG_CFG_QZSS_L1CA,
            enable_ppp: false,
            dynamic_model: "portable".to_string(),
            fix_mode: "both".to_string(),
            dr_limit: 0,
            ublox_version: 6,
            diagnostic_period: 0.2,
            freq_tolerance: 0.05,
            all: false,
            rxm: false,
            aid: false,
            explicit: Vec::new(),
        }
    }
}

/// Validated driver settings. Immutable once built.
#[derive(Debug, Clone)]
pub struct Settings {
    pub device: DeviceAddress,
    pub frame_id: String,
    pub baud_rate: u32,
    /// Measurement interval (ms)
    pub meas_rate_ms: u16,
    pub constellations: Constellations,
    pub qzss_sig_cfg: u32,
    pub enable_ppp: bool,
    pub dynamic_model: DynamicModel,
    pub fix_mode: FixMode,
    pub dr_limit: u8,
    pub generation: HardwareGeneration,
    pub features: EnabledFeatureSet,
    pub diagnostic_period: Duration,
    pub freq_tolerance: f64,
}

impl Settings {
    /// Effective solution rate (Hz), after integer rounding of the interval.
    pub fn target_frequency(&self) -> f64 {
        1000.0 / f64::from(self.meas_rate_ms)
    }

    /// Measurement interval as a [Duration].
    pub fn measurement_interval(&self) -> Duration {
        Duration::from_milliseconds(f64::from(self.meas_rate_ms))
    }
}

/// Measurement interval (ms) for a rate (Hz).
pub fn measurement_interval_ms(rate: i64) -> Result<u16, ConfigError> {
    if rate <= 0 || rate > 1000 {
        return Err(ConfigError::InvalidRate(rate));
    }
    Ok((1000 / rate) as u16)
}

impl TryFrom<Parameters> for Settings {
    type Error = ConfigError;

    fn try_from(params: Parameters) -> Result<Self, Self::Error> {
        let meas_rate_ms = measurement_interval_ms(params.rate)?;

        let dr_limit = u8::try_from(params.dr_limit)
            .map_err(|_| ConfigError::InvalidDeadReckoningLimit(params.dr_limit))?;

        let dynamic_model = params.dynamic_model.parse::<DynamicModel>()?;
        let fix_mode = params.fix_mode.parse::<FixMode>()?;
        let generation = HardwareGeneration::try_from(params.ublox_version)?;

        if params.qzss_sig_cfg & !SIG_CFG_MASK != 0 {
            return Err(ConfigError::InvalidQzssSignalMask(params.qzss_sig_cfg));
        }

        if !(params.diagnostic_period > 0.0) {
            return Err(ConfigError::InvalidDiagnosticPeriod(params.diagnostic_period));
        }

        if !(params.freq_tolerance >= 0.0) {
            return Err(ConfigError::InvalidFrequencyTolerance(params.freq_tolerance));
        }

        Ok(Self {
            device: DeviceAddress::parse(&params.device),
            frame_id: params.frame_id,
            baud_rate: params.baudrate,
            meas_rate_ms,
            constellations: params.constellations,
            qzss_sig_cfg: params.qzss_sig_cfg,
            enable_ppp: params.enable_ppp,
            dynamic_model,
            fix_mode,
            dr_limit,
            generation,
            features: EnabledFeatureSet::resolve(
                params.all,
                params.rxm,
                params.aid,
                &params.explicit,
            ),
            diagnostic_period: Duration::from_seconds(params.diagnostic_period),
            freq_tolerance: params.freq_tolerance,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn defaults() {
        let settings = Settings::try_from(Parameters::default()).unwrap();

        assert_eq!(settings.meas_rate_ms, 250);
        assert_eq!(settings.target_frequency(), 4.0);
        assert_eq!(settings.frame_id, "gps");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.dynamic_model, DynamicModel::Portable);
        assert_eq!(settings.fix_mode, FixMode::Auto);
        assert_eq!(settings.dr_limit, 0);
        assert_eq!(settings.generation, HardwareGeneration::Legacy);
        assert_eq!(settings.constellations, Constellations::default());
        assert_eq!(
            settings.device,
            DeviceAddress::Serial {
                path: "/dev/ttyACM0".to_string()
            }
        );
    }

    #[test]
    fn measurement_interval() {
        assert_eq!(measurement_interval_ms(4).unwrap(), 250);
        assert_eq!(measurement_interval_ms(1).unwrap(), 1000);
        assert_eq!(measurement_interval_ms(3).unwrap(), 333);

        for rate in [0, -1, -4] {
            assert!(matches!(
                measurement_interval_ms(rate),
                Err(ConfigError::InvalidRate(r)) if r == rate
            ));
        }
    }

    #[test]
    fn invalid_rate_is_rejected() {
        let params = Parameters {
            rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            Settings::try_from(params),
            Err(ConfigError::InvalidRate(0))
        ));
    }

    #[test]
    fn dead_reckoning_limit_range() {
        for (limit, valid) in [(-1, false), (0, true), (255, true), (256, false)] {
            let params = Parameters {
                dr_limit: limit,
                ..Default::default()
            };

            match Settings::try_from(params) {
                Ok(settings) => {
                    assert!(valid, "{} should be rejected", limit);
                    assert_eq!(i64::from(settings.dr_limit), limit);
                },
                Err(ConfigError::InvalidDeadReckoningLimit(l)) => {
                    assert!(!valid, "{} should be accepted", limit);
                    assert_eq!(l, limit);
                },
                Err(e) => panic!("unexpected error {}", e),
            }
        }
    }

    #[test]
    fn model_and_fix_mode_strings() {
        let params = Parameters {
            dynamic_model: "submarine".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Settings::try_from(params),
            Err(ConfigError::UnknownDynamicModel(_))
        ));

        let params = Parameters {
            fix_mode: "4d".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Settings::try_from(params),
            Err(ConfigError::UnknownFixMode(_))
        ));

        let params = Parameters {
            dynamic_model: "airborne2".to_string(),
            fix_mode: "3d".to_string(),
            ..Default::default()
        };
        let settings = Settings::try_from(params).unwrap();
        assert_eq!(settings.dynamic_model, DynamicModel::Airborne2);
        assert_eq!(settings.fix_mode, FixMode::Fix3D);
    }

    #[test]
    fn frequency_tolerance() {
        for (tolerance, valid) in [(0.0, true), (0.05, true), (-0.01, false), (f64::NAN, false)] {
            let params = Parameters {
                freq_tolerance: tolerance,
                ..Default::default()
            };

            match Settings::try_from(params) {
                Ok(settings) => {
                    assert!(valid, "{} should be rejected", tolerance);
                    assert_eq!(settings.freq_tolerance, tolerance);
                },
                Err(ConfigError::InvalidFrequencyTolerance(t)) => {
                    assert!(!valid, "{} should be accepted", tolerance);
                    assert!(t.is_nan() || t == tolerance);
                },
                Err(e) => panic!("unexpected error {}", e),
            }
        }
    }

    #[test]
    fn hardware_generations() {
        assert_eq!(
            HardwareGeneration::try_from(5).unwrap(),
            HardwareGeneration::Legacy
        );
        assert_eq!(
            HardwareGeneration::try_from(6).unwrap(),
            HardwareGeneration::Legacy
        );
        assert_eq!(
            HardwareGeneration::try_from(7).unwrap(),
            HardwareGeneration::Gen7
        );
        assert_eq!(
            HardwareGeneration::try_from(8).unwrap(),
            HardwareGeneration::Gen8
        );
        assert_eq!(
            HardwareGeneration::try_from(9).unwrap(),
            HardwareGeneration::Gen8
        );
        assert!(HardwareGeneration::try_from(0).is_err());
    }

    #[test]
    fn feature_defaults() {
        let set = EnabledFeatureSet::resolve(false, false, false, &[]);

        assert_eq!(
            set.enabled(),
            vec![
                MessageKind::NavSol,
                MessageKind::NavPvt,
                MessageKind::NavStatus,
                MessageKind::NavPosllh,
                MessageKind::NavPosecef,
                MessageKind::NavVelned,
            ]
        );
    }

    #[test]
    fn feature_umbrellas() {
        let set = EnabledFeatureSet::resolve(false, true, false, &[]);
        assert!(set.rxm_raw && set.rxm_sfrb && set.rxm_eph && set.rxm_alm);
        assert!(!set.aid_alm && !set.nav_svinfo);

        let set = EnabledFeatureSet::resolve(false, false, true, &[(MessageKind::AidHui, false)]);
        assert!(set.aid_alm && set.aid_eph);
        assert!(!set.aid_hui);

        let set = EnabledFeatureSet::resolve(true, false, false, &[(MessageKind::NavPvt, false)]);
        assert!(!set.nav_pvt);
        assert_eq!(set.enabled().len(), MessageKind::ALL.len() - 1);
    }

    #[test]
    fn message_kind_lookup() {
        assert_eq!(
            MessageKind::from_class_id(0x02, 0x15, HardwareGeneration::Gen8),
            Some(MessageKind::RxmRaw)
        );
        assert_eq!(
            MessageKind::from_class_id(0x02, 0x10, HardwareGeneration::Gen7),
            Some(MessageKind::RxmRaw)
        );
        assert_eq!(
            MessageKind::from_class_id(0x02, 0x15, HardwareGeneration::Legacy),
            None
        );
        assert_eq!(
            MessageKind::from_class_id(0x01, 0x07, HardwareGeneration::Legacy),
            Some(MessageKind::NavPvt)
        );
    }

    #[test]
    fn constellation_names() {
        let constellations = Constellations {
            glonass: true,
            galileo: true,
            ..Default::default()
        };
        assert_eq!(constellations.to_string(), "GPS, Galileo, Glonass");
    }
}
