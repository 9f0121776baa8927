use std::collections::VecDeque;

use hifitime::prelude::{Duration, Epoch};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    settings::Settings,
    translator::serialize_epoch,
    ubx::messages::{NavPvt, fix_type},
};

pub const HARDWARE_ID: &str = "ublox";

/// Number of report ticks the frequency is averaged over
const FREQUENCY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Level {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub key: &'static str,
    pub value: String,
}

impl KeyValue {
    fn new<T: ToString>(key: &'static str, value: T) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticStatus {
    pub name: &'static str,
    pub level: Level,
    pub message: String,
    pub values: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    #[serde(serialize_with = "serialize_epoch")]
    pub stamp: Epoch,
    pub hardware_id: &'static str,
    /// Worst level of all statuses
    pub level: Level,
    pub statuses: Vec<DiagnosticStatus>,
}

/// Severity and message of a fix type.
pub fn fix_severity(fix: u8) -> (Level, &'static str) {
    match fix {
        fix_type::NO_FIX => (Level::Error, "No fix"),
        fix_type::DEAD_RECKONING_ONLY => (Level::Warn, "Dead reckoning only"),
        fix_type::FIX_2D => (Level::Ok, "2D fix"),
        fix_type::FIX_3D => (Level::Ok, "3D fix"),
        fix_type::GPS_DEAD_RECKONING_COMBINED => (Level::Ok, "GPS and dead reckoning combined"),
        fix_type::TIME_ONLY => (Level::Warn, "Time fix only"),
        _ => (Level::Error, "Unknown fix type"),
    }
}

/// Fix health of the last accepted record. No record yet reads as "No fix".
pub fn fix_check(last: Option<&NavPvt>) -> DiagnosticStatus {
    let pvt = last.copied().unwrap_or_default();
    let (level, message) = fix_severity(pvt.fix_type);

    DiagnosticStatus {
        name: "fix",
        level,
        message: message.to_string(),
        values: vec![
            KeyValue::new("iTOW", pvt.i_tow),
            KeyValue::new("lon", pvt.lon),
            KeyValue::new("lat", pvt.lat),
            KeyValue::new("height", pvt.height),
            KeyValue::new("hMSL", pvt.h_msl),
            KeyValue::new("hAcc", pvt.h_acc),
            KeyValue::new("vAcc", pvt.v_acc),
            KeyValue::new("numSV", pvt.num_sv),
        ],
    }
}

/// Publication rate monitor, over a sliding window of report ticks.
#[derive(Debug, Clone)]
pub struct FrequencyStatus {
    min: f64,
    max: f64,
    tolerance: f64,
    count: u64,
    /// (report time, event count at that time), oldest first
    history: VecDeque<(Epoch, u64)>,
}

impl FrequencyStatus {
    pub fn new(target: f64, tolerance: f64, now: Epoch) -> Self {
        Self {
            min: target,
            max: target,
            tolerance,
            count: 0,
            history: std::iter::repeat_n((now, 0), FREQUENCY_WINDOW).collect(),
        }
    }

    pub fn tick(&mut self) {
        self.count += 1;
    }

    pub fn report(&mut self, now: Epoch) -> DiagnosticStatus {
        let (oldest_t, oldest_count) = self.history.front().copied().unwrap_or((now, 0));

        let events = self.count - oldest_count;
        let window = (now - oldest_t).to_seconds();
        let freq = events as f64 / window;

        self.history.push_back((now, self.count));
        while self.history.len() > FREQUENCY_WINDOW {
            self.history.pop_front();
        }

        let (level, message) = if events == 0 {
            (Level::Error, "No events recorded.")
        } else if freq < self.min * (1.0 - self.tolerance) {
            (Level::Warn, "Frequency too low.")
        } else if freq > self.max * (1.0 + self.tolerance) {
            (Level::Warn, "Frequency too high.")
        } else {
            (Level::Ok, "Desired frequency met")
        };

        DiagnosticStatus {
            name: "fix topic frequency",
            level,
            message: message.to_string(),
            values: vec![
                KeyValue::new("Events in window", events),
                KeyValue::new("Events since startup", self.count),
                KeyValue::new("Duration of window (s)", window),
                KeyValue::new("Actual frequency (Hz)", freq),
                KeyValue::new("Target frequency (Hz)", self.min),
                KeyValue::new(
                    "Minimum acceptable frequency (Hz)",
                    self.min * (1.0 - self.tolerance),
                ),
                KeyValue::new(
                    "Maximum acceptable frequency (Hz)",
                    self.max * (1.0 + self.tolerance),
                ),
            ],
        }
    }
}

/// Monitors the delay between record stamps and the host clock.
#[derive(Debug, Clone)]
pub struct TimestampStatus {
    /// earliest acceptable delay (s), negative
    min_acceptable: f64,
    /// latest acceptable delay (s)
    max_acceptable: f64,
    min_delay: f64,
    max_delay: f64,
    early_count: u64,
    late_count: u64,
    /// a stamp was received since the last report
    updated: bool,
    early: bool,
    late: bool,
}

impl TimestampStatus {
    /// Accepts delays within half a measurement interval, both ways.
    pub fn new(interval: Duration) -> Self {
        let half = interval.to_seconds() / 2.0;

        Self {
            min_acceptable: -half,
            max_acceptable: half,
            min_delay: 0.0,
            max_delay: 0.0,
            early_count: 0,
            late_count: 0,
            updated: false,
            early: false,
            late: false,
        }
    }

    pub fn tick(&mut self, stamp: Epoch, now: Epoch) {
        let delay = (now - stamp).to_seconds();

        if !self.updated {
            self.min_delay = delay;
            self.max_delay = delay;
        } else {
            self.min_delay = self.min_delay.min(delay);
            self.max_delay = self.max_delay.max(delay);
        }

        if delay < self.min_acceptable {
            self.early = true;
        }
        if delay > self.max_acceptable {
            self.late = true;
        }

        self.updated = true;
    }

    pub fn report(&mut self) -> DiagnosticStatus {
        let (level, message) = if !self.updated {
            (Level::Warn, "No data since last update.".to_string())
        } else {
            let mut issues = Vec::with_capacity(2);

            if self.early {
                self.early_count += 1;
                issues.push("Timestamps too far in future seen.");
            }
            if self.late {
                self.late_count += 1;
                issues.push("Timestamps too old.");
            }

            if issues.is_empty() {
                (Level::Ok, "Timestamps are reasonable.".to_string())
            } else {
                (Level::Error, issues.iter().join(" "))
            }
        };

        let status = DiagnosticStatus {
            name: "fix topic timestamp",
            level,
            message,
            values: vec![
                KeyValue::new("Earliest timestamp delay", self.min_delay),
                KeyValue::new("Latest timestamp delay", self.max_delay),
                KeyValue::new("Earliest acceptable timestamp delay", self.min_acceptable),
                KeyValue::new("Latest acceptable timestamp delay", self.max_acceptable),
                KeyValue::new("Late diagnostic update count", self.late_count),
                KeyValue::new("Early diagnostic update count", self.early_count),
            ],
        };

        self.updated = false;
        self.early = false;
        self.late = false;

        status
    }
}

/// Receiver health state, reported periodically.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    last: Option<NavPvt>,
    frequency: FrequencyStatus,
    timestamp: TimestampStatus,
}

impl Diagnostics {
    pub fn new(settings: &Settings, now: Epoch) -> Self {
        Self {
            last: None,
            frequency: FrequencyStatus::new(
                settings.target_frequency(),
                settings.freq_tolerance,
                now,
            ),
            timestamp: TimestampStatus::new(settings.measurement_interval()),
        }
    }

    /// Latches a translated record.
    pub fn record(&mut self, pvt: &NavPvt, stamp: Epoch, now: Epoch) {
        self.last = Some(*pvt);
        self.frequency.tick();
        self.timestamp.tick(stamp, now);
    }

    pub fn report(&mut self, now: Epoch) -> DiagnosticReport {
        let statuses = vec![
            fix_check(self.last.as_ref()),
            self.frequency.report(now),
            self.timestamp.report(),
        ];

        let level = statuses
            .iter()
            .map(|status| status.level)
            .max()
            .unwrap_or(Level::Ok);

        DiagnosticReport {
            stamp: now,
            hardware_id: HARDWARE_ID,
            level,
            statuses,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::{Parameters, Settings};

    fn t0() -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2024, 1, 1)
    }

    #[test]
    fn fix_severities() {
        assert_eq!(fix_severity(0), (Level::Error, "No fix"));
        assert_eq!(fix_severity(1), (Level::Warn, "Dead reckoning only"));
        assert_eq!(fix_severity(2), (Level::Ok, "2D fix"));
        assert_eq!(fix_severity(3), (Level::Ok, "3D fix"));
        assert_eq!(
            fix_severity(4),
            (Level::Ok, "GPS and dead reckoning combined")
        );
        assert_eq!(fix_severity(5), (Level::Warn, "Time fix only"));
        assert_eq!(fix_severity(6).0, Level::Error);
    }

    #[test]
    fn no_record_yet() {
        let status = fix_check(None);
        assert_eq!(status.level, Level::Error);
        assert_eq!(status.message, "No fix");

        let keys = status.values.iter().map(|kv| kv.key).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                "iTOW", "lon", "lat", "height", "hMSL", "hAcc", "vAcc", "numSV"
            ]
        );
    }

    #[test]
    fn fix_values_are_raw() {
        let pvt = NavPvt {
            i_tow: 345_600_250,
            fix_type: fix_type::FIX_3D,
            lon: 23_456_789,
            lat: -450_000_001,
            height: 152_300,
            h_msl: 104_100,
            h_acc: 1_250,
            v_acc: 2_100,
            num_sv: 11,
            ..Default::default()
        };

        let status = fix_check(Some(&pvt));
        assert_eq!(status.level, Level::Ok);
        assert_eq!(status.message, "3D fix");

        let values = status
            .values
            .iter()
            .map(|kv| (kv.key, kv.value.as_str()))
            .collect::<Vec<_>>();

        assert_eq!(
            values,
            vec![
                ("iTOW", "345600250"),
                ("lon", "23456789"),
                ("lat", "-450000001"),
                ("height", "152300"),
                ("hMSL", "104100"),
                ("hAcc", "1250"),
                ("vAcc", "2100"),
                ("numSV", "11"),
            ]
        );
    }

    #[test]
    fn frequency_checks() {
        let mut status = FrequencyStatus::new(4.0, 0.05, t0());

        // nothing received
        let report = status.report(t0() + Duration::from_seconds(1.0));
        assert_eq!(report.level, Level::Error);
        assert_eq!(report.message, "No events recorded.");

        // 4 events over 2s: too low
        for _ in 0..4 {
            status.tick();
        }
        let report = status.report(t0() + Duration::from_seconds(2.0));
        assert_eq!(report.level, Level::Warn);
        assert_eq!(report.message, "Frequency too low.");

        // 12 events over 3s
        for _ in 0..8 {
            status.tick();
        }
        let report = status.report(t0() + Duration::from_seconds(3.0));
        assert_eq!(report.level, Level::Ok);
        assert_eq!(report.message, "Desired frequency met");

        // 40 events over 4s
        for _ in 0..28 {
            status.tick();
        }
        let report = status.report(t0() + Duration::from_seconds(4.0));
        assert_eq!(report.level, Level::Warn);
        assert_eq!(report.message, "Frequency too high.");
    }

    #[test]
    fn frequency_window_slides() {
        let mut status = FrequencyStatus::new(1.0, 0.05, t0());

        for i in 1..=20 {
            status.tick();
            let report = status.report(t0() + Duration::from_seconds(i as f64));
            assert_eq!(report.level, Level::Ok, "tick {}", i);
        }

        // window now spans the last 10 ticks only
        assert_eq!(status.history.len(), FREQUENCY_WINDOW);
        assert_eq!(
            status.history.front().copied(),
            Some((t0() + Duration::from_seconds(11.0), 11))
        );
    }

    #[test]
    fn timestamp_checks() {
        // 250ms interval: +/- 125ms accepted
        let mut status = TimestampStatus::new(Duration::from_milliseconds(250.0));

        let report = status.report();
        assert_eq!(report.level, Level::Warn);
        assert_eq!(report.message, "No data since last update.");

        status.tick(t0(), t0() + Duration::from_milliseconds(100.0));
        assert_eq!(status.report().level, Level::Ok);

        status.tick(t0(), t0() + Duration::from_milliseconds(200.0));
        let report = status.report();
        assert_eq!(report.level, Level::Error);
        assert_eq!(report.message, "Timestamps too old.");

        status.tick(t0() + Duration::from_milliseconds(200.0), t0());
        let report = status.report();
        assert_eq!(report.level, Level::Error);
        assert_eq!(report.message, "Timestamps too far in future seen.");

        // reset after each report
        assert_eq!(status.report().level, Level::Warn);
    }

    #[test]
    fn aggregated_report() {
        let settings = Settings::try_from(Parameters::default()).unwrap();
        let mut diagnostics = Diagnostics::new(&settings, t0());

        let report = diagnostics.report(t0() + Duration::from_seconds(0.2));
        assert_eq!(report.hardware_id, "ublox");
        assert_eq!(report.level, Level::Error);
        assert_eq!(report.statuses.len(), 3);

        let pvt = NavPvt {
            fix_type: fix_type::FIX_3D,
            num_sv: 12,
            ..Default::default()
        };

        // 4 Hz for 2s
        for i in 0..8 {
            let now = t0() + Duration::from_milliseconds(250.0 * f64::from(i));
            diagnostics.record(&pvt, now, now);
        }

        let report = diagnostics.report(t0() + Duration::from_seconds(2.0));
        assert_eq!(report.statuses[0].message, "3D fix");
        assert_eq!(report.statuses[1].level, Level::Ok);
        assert_eq!(report.statuses[2].level, Level::Ok);
        assert_eq!(report.level, Level::Ok);
    }
}
