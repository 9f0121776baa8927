use hifitime::prelude::{Duration, Epoch};
use serde::{Serialize, Serializer};

use crate::{settings::Constellations, ubx::messages::NavPvt};

/// Service bits of a position estimate
pub mod service {
    pub const GPS: u16 = 1;
    pub const GLONASS: u16 = 2;
    pub const COMPASS: u16 = 4;
    pub const GALILEO: u16 = 8;
}

/// Position covariance only has its diagonal populated
pub const COVARIANCE_TYPE_DIAGONAL_KNOWN: u8 = 2;

const DEG_PER_LSB: f64 = 1.0E-7;
const MILLI: f64 = 1.0E-3;

pub(crate) fn serialize_epoch<S: Serializer>(epoch: &Epoch, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(epoch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FixStatus {
    NoFix,
    Fix,
    /// Carrier phase ambiguities resolved
    AugmentedFix,
}

/// Position estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavSatFix {
    #[serde(serialize_with = "serialize_epoch")]
    pub stamp: Epoch,
    pub frame_id: String,
    pub status: FixStatus,
    pub service: u16,
    /// ddeg
    pub latitude: f64,
    /// ddeg
    pub longitude: f64,
    /// height above ellipsoid (m)
    pub altitude: f64,
    /// Row major 3x3 (m²)
    pub position_covariance: [f64; 9],
    pub position_covariance_type: u8,
}

/// Velocity estimate, East North Up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwistWithCovariance {
    #[serde(serialize_with = "serialize_epoch")]
    pub stamp: Epoch,
    pub frame_id: String,
    /// m/s
    pub linear: [f64; 3],
    /// rad/s, never estimated
    pub angular: [f64; 3],
    /// (linear, angular) 6x6 covariance
    pub covariance: [[f64; 6]; 6],
}

/// Service bits advertised for the tracked constellations.
pub fn service_mask(constellations: &Constellations) -> u16 {
    let mut mask = service::GPS;

    if constellations.glonass {
        mask |= service::GLONASS;
    }
    if constellations.beidou {
        mask |= service::COMPASS;
    }
    if constellations.galileo {
        mask |= service::GALILEO;
    }

    mask
}

/// UTC time of the solution, when the receiver resolved it.
pub fn record_stamp(pvt: &NavPvt) -> Option<Epoch> {
    if !pvt.utc_resolved() {
        return None;
    }

    let epoch = Epoch::maybe_from_gregorian_utc(
        i32::from(pvt.year),
        pvt.month,
        pvt.day,
        pvt.hour,
        pvt.min,
        pvt.sec,
        0,
    )
    .ok()?;

    // nano is signed: the rounded second may be ahead of the solution
    Some(epoch + Duration::from_total_nanoseconds(i128::from(pvt.nano)))
}

fn fix_status(pvt: &NavPvt) -> FixStatus {
    if pvt.gnss_fix_ok() && pvt.fix_type >= 2 {
        if pvt.carrier_phase_fixed() {
            FixStatus::AugmentedFix
        } else {
            FixStatus::Fix
        }
    } else {
        FixStatus::NoFix
    }
}

/// Turns NAV-PVT records into position and velocity estimates.
#[derive(Debug, Clone)]
pub struct Translator {
    frame_id: String,
    service: u16,
}

impl Translator {
    pub fn new(frame_id: &str, constellations: &Constellations) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            service: service_mask(constellations),
        }
    }

    /// Translates a record. `now` stamps records that do not carry a valid UTC date.
    pub fn translate(&self, pvt: &NavPvt, now: Epoch) -> (NavSatFix, TwistWithCovariance) {
        let stamp = record_stamp(pvt).unwrap_or(now);
        (self.position(pvt, stamp), self.velocity(pvt, stamp))
    }

    fn position(&self, pvt: &NavPvt, stamp: Epoch) -> NavSatFix {
        let std_h = f64::from(pvt.h_acc) * MILLI;
        let std_v = f64::from(pvt.v_acc) * MILLI;

        let mut position_covariance = [0.0; 9];
        position_covariance[0] = std_h.powi(2);
        position_covariance[4] = std_h.powi(2);
        position_covariance[8] = std_v.powi(2);

        NavSatFix {
            stamp,
            frame_id: self.frame_id.clone(),
            status: fix_status(pvt),
            service: self.service,
            latitude: f64::from(pvt.lat) * DEG_PER_LSB,
            longitude: f64::from(pvt.lon) * DEG_PER_LSB,
            altitude: f64::from(pvt.height) * MILLI,
            position_covariance,
            position_covariance_type: COVARIANCE_TYPE_DIAGONAL_KNOWN,
        }
    }

    fn velocity(&self, pvt: &NavPvt, stamp: Epoch) -> TwistWithCovariance {
        let variance = (f64::from(pvt.s_acc) * MILLI).powi(2);

        let mut covariance = [[0.0; 6]; 6];
        for (i, row) in covariance.iter_mut().take(3).enumerate() {
            row[i] = variance;
        }
        covariance[3][3] = -1.0;

        TwistWithCovariance {
            stamp,
            frame_id: self.frame_id.clone(),
            linear: [
                f64::from(pvt.vel_e) * MILLI,
                f64::from(pvt.vel_n) * MILLI,
                -f64::from(pvt.vel_d) * MILLI,
            ],
            angular: [0.0; 3],
            covariance,
        }
    }
}
