//! Owned views of the UBX messages this driver interprets, and the
//! user facing enums mapped onto [ublox] configuration types.
use std::str::FromStr;

use serde::Serialize;

use ublox::{
    GnssFixType,
    cfg_gnss::{CfgGnssRef, GnssConfigBlock},
    cfg_nav5::{NavDynamicModel, NavFixMode},
    mon_ver::MonVerRef,
    nav_pvt::proto23::NavPvtRef,
};

use crate::error::ConfigError;

/// UBX-MON-VER, as reported by the receiver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverVersion {
    pub software: String,
    pub hardware: String,
    pub extensions: Vec<String>,
}

impl From<&MonVerRef<'_>> for ReceiverVersion {
    fn from(ver: &MonVerRef<'_>) -> Self {
        Self {
            software: ver.software_version().to_string(),
            hardware: ver.hardware_version().to_string(),
            extensions: ver.extension().map(|ext| ext.to_string()).collect(),
        }
    }
}

/// Receiver dynamic platform model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DynamicModel {
    #[default]
    Portable,
    Stationary,
    Pedestrian,
    Automotive,
    Sea,
    /// < 1g acceleration
    Airborne1,
    /// < 2g acceleration
    Airborne2,
    /// < 4g acceleration
    Airborne4,
    Wristwatch,
}

impl FromStr for DynamicModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "portable" => Ok(Self::Portable),
            "stationary" => Ok(Self::Stationary),
            "pedestrian" => Ok(Self::Pedestrian),
            "automotive" => Ok(Self::Automotive),
            "sea" => Ok(Self::Sea),
            "airborne1" => Ok(Self::Airborne1),
            "airborne2" => Ok(Self::Airborne2),
            "airborne4" => Ok(Self::Airborne4),
            "wristwatch" => Ok(Self::Wristwatch),
            other => Err(ConfigError::UnknownDynamicModel(other.to_string())),
        }
    }
}

impl std::fmt::Display for DynamicModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Portable => "portable",
            Self::Stationary => "stationary",
            Self::Pedestrian => "pedestrian",
            Self::Automotive => "automotive",
            Self::Sea => "sea",
            Self::Airborne1 => "airborne1",
            Self::Airborne2 => "airborne2",
            Self::Airborne4 => "airborne4",
            Self::Wristwatch => "wristwatch",
        };
        f.write_str(name)
    }
}

impl From<DynamicModel> for NavDynamicModel {
    fn from(model: DynamicModel) -> Self {
        match model {
            DynamicModel::Portable => Self::Portable,
            DynamicModel::Stationary => Self::Stationary,
            DynamicModel::Pedestrian => Self::Pedestrian,
            DynamicModel::Automotive => Self::Automotive,
            DynamicModel::Sea => Self::Sea,
            DynamicModel::Airborne1 => Self::AirborneWithLess1gAcceleration,
            DynamicModel::Airborne2 => Self::AirborneWithLess2gAcceleration,
            DynamicModel::Airborne4 => Self::AirborneWithLess4gAcceleration,
            DynamicModel::Wristwatch => Self::WristWornWatch,
        }
    }
}

/// Position fixing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixMode {
    Fix2D,
    Fix3D,
    #[default]
    Auto,
}

impl FromStr for FixMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2d" => Ok(Self::Fix2D),
            "3d" => Ok(Self::Fix3D),
            "both" | "auto" => Ok(Self::Auto),
            other => Err(ConfigError::UnknownFixMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for FixMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fix2D => f.write_str("2d"),
            Self::Fix3D => f.write_str("3d"),
            Self::Auto => f.write_str("both"),
        }
    }
}

impl From<FixMode> for NavFixMode {
    fn from(mode: FixMode) -> Self {
        match mode {
            FixMode::Fix2D => Self::Only2D,
            FixMode::Fix3D => Self::Only3D,
            FixMode::Auto => Self::Auto2D3D,
        }
    }
}

/// UBX-CFG-GNSS read back from the receiver.
#[derive(Debug, Clone, Default)]
pub struct GnssConfig {
    pub num_trk_ch_hw: u8,
    pub num_trk_ch_use: u8,
    pub blocks: Vec<GnssConfigBlock>,
}

impl From<&CfgGnssRef<'_>> for GnssConfig {
    fn from(cfg: &CfgGnssRef<'_>) -> Self {
        Self {
            num_trk_ch_hw: cfg.num_trk_ch_hw(),
            num_trk_ch_use: cfg.num_trk_ch_use(),
            blocks: cfg.blocks().collect(),
        }
    }
}

/// Receiver reported fix type.
pub mod fix_type {
    use super::GnssFixType;

    pub const NO_FIX: u8 = GnssFixType::NoFix as u8;
    pub const DEAD_RECKONING_ONLY: u8 = GnssFixType::DeadReckoningOnly as u8;
    pub const FIX_2D: u8 = GnssFixType::Fix2D as u8;
    pub const FIX_3D: u8 = GnssFixType::Fix3D as u8;
    pub const GPS_DEAD_RECKONING_COMBINED: u8 = GnssFixType::GPSPlusDeadReckoning as u8;
    pub const TIME_ONLY: u8 = GnssFixType::TimeOnlyFix as u8;
}

/// UBX-NAV-PVT, integer fields exactly as reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NavPvt {
    /// GPS time of week (ms)
    pub i_tow: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub valid: u8,
    /// time accuracy estimate (ns)
    pub t_acc: u32,
    /// fraction of second, -1e9..1e9 (ns)
    pub nano: i32,
    pub fix_type: u8,
    pub flags: u8,
    pub flags2: u8,
    pub num_sv: u8,
    /// 1e-7 deg
    pub lon: i32,
    /// 1e-7 deg
    pub lat: i32,
    /// height above ellipsoid (mm)
    pub height: i32,
    /// height above mean sea level (mm)
    pub h_msl: i32,
    /// mm
    pub h_acc: u32,
    /// mm
    pub v_acc: u32,
    /// mm/s
    pub vel_n: i32,
    pub vel_e: i32,
    pub vel_d: i32,
    pub g_speed: i32,
    /// 1e-5 deg
    pub head_mot: i32,
    /// mm/s
    pub s_acc: u32,
    pub head_acc: u32,
    /// 0.01
    pub p_dop: u16,
}

impl NavPvt {
    pub const VALID_DATE: u8 = 0x01;
    pub const VALID_TIME: u8 = 0x02;

    pub const FLAGS_GNSS_FIX_OK: u8 = 0x01;
    pub const FLAGS_CARRIER_PHASE_FIXED: u8 = 0x80;

    pub fn gnss_fix_ok(&self) -> bool {
        self.flags & Self::FLAGS_GNSS_FIX_OK != 0
    }

    pub fn carrier_phase_fixed(&self) -> bool {
        self.flags & Self::FLAGS_CARRIER_PHASE_FIXED != 0
    }

    /// True when both the UTC date and time of day are resolved.
    pub fn utc_resolved(&self) -> bool {
        let mask = Self::VALID_DATE | Self::VALID_TIME;
        self.valid & mask == mask
    }
}

impl From<&NavPvtRef<'_>> for NavPvt {
    fn from(pvt: &NavPvtRef<'_>) -> Self {
        Self {
            i_tow: pvt.itow(),
            year: pvt.year(),
            month: pvt.month(),
            day: pvt.day(),
            hour: pvt.hour(),
            min: pvt.min(),
            sec: pvt.sec(),
            valid: pvt.valid_raw(),
            t_acc: pvt.time_accuracy(),
            nano: pvt.nanosec(),
            fix_type: pvt.fix_type_raw(),
            flags: pvt.flags_raw(),
            flags2: pvt.flags2_raw(),
            num_sv: pvt.num_satellites(),
            lon: pvt.longitude_raw(),
            lat: pvt.latitude_raw(),
            height: pvt.height_above_ellipsoid_raw(),
            h_msl: pvt.height_msl_raw(),
            h_acc: pvt.horizontal_accuracy_raw(),
            v_acc: pvt.vertical_accuracy_raw(),
            vel_n: pvt.vel_north_raw(),
            vel_e: pvt.vel_east_raw(),
            vel_d: pvt.vel_down_raw(),
            g_speed: pvt.ground_speed_2d_raw(),
            head_mot: pvt.heading_motion_raw(),
            s_acc: pvt.speed_accuracy_raw(),
            head_acc: pvt.heading_accuracy_raw(),
            p_dop: pvt.pdop_raw(),
        }
    }
}
