//! Startup handshake: brings the receiver into a known operating mode.
//!
//! Steps run in a fixed order and each one blocks until the receiver
//! acknowledges it. The first rejected or unanswered step aborts the
//! remaining ones.
use itertools::Itertools;
use log::{debug, info, warn};

use ublox::{
    cfg_nav5::{CfgNav5, CfgNav5Builder, CfgNav5Params},
    cfg_navx5::{CfgNavX5, CfgNavX5Builder, CfgNavX5Params1},
    cfg_rate::{AlignmentToReferenceTime, CfgRate, CfgRateBuilder},
    mon_ver::MonVer,
};

use crate::{
    constellation,
    error::HandshakeError,
    exchange::Exchange,
    settings::Settings,
    ubx::{PacketRef, messages::ReceiverVersion},
};

/// Runs the complete handshake.
pub fn run<E: Exchange>(exchange: &mut E, settings: &Settings) -> Result<(), HandshakeError> {
    read_version(exchange);

    set_measurement_rate(exchange, settings.meas_rate_ms)?;
    set_ppp(exchange, settings.enable_ppp)?;

    set_dynamic_model(exchange, settings)?;
    set_fix_mode(exchange, settings)?;
    set_dead_reckoning_limit(exchange, settings.dr_limit)?;

    constellation::configure(
        exchange,
        settings.generation,
        &settings.constellations,
        settings.qzss_sig_cfg,
    )?;

    info!("U-Blox configured successfully.");
    Ok(())
}

/// Identifies the receiver. Not fatal: some firmwares never answer.
fn read_version<E: Exchange>(exchange: &mut E) {
    let version = exchange.poll::<MonVer, _, _>(|packet| match packet {
        PacketRef::MonVer(ver) => Some(ReceiverVersion::from(ver)),
        _ => None,
    });

    match version {
        Ok(version) => {
            info!("U-Blox Software version: {}", version.software);
            info!("U-Blox Hardware version: {}", version.hardware);

            if !version.extensions.is_empty() {
                debug!("Extensions: {}", version.extensions.iter().join(", "));
            }
        },
        Err(e) => {
            warn!("failed to poll MON-VER: {}", e);
        },
    }
}

fn set_measurement_rate<E: Exchange>(
    exchange: &mut E,
    meas_rate_ms: u16,
) -> Result<(), HandshakeError> {
    let frame = CfgRateBuilder {
        measure_rate_ms: meas_rate_ms,
        nav_rate: 1,
        time_ref: AlignmentToReferenceTime::Gps,
    }
    .into_packet_bytes();

    exchange
        .configure::<CfgRate>(&frame)
        .map_err(|source| HandshakeError::MeasurementRate {
            meas_rate_ms,
            source,
        })?;

    debug!("measurement rate set to {}ms", meas_rate_ms);
    Ok(())
}

fn set_ppp<E: Exchange>(exchange: &mut E, enable: bool) -> Result<(), HandshakeError> {
    let frame = CfgNavX5Builder {
        mask1: CfgNavX5Params1::USE_PPP,
        use_ppp: u8::from(enable),
        ..Default::default()
    }
    .into_packet_bytes();

    exchange
        .configure::<CfgNavX5>(&frame)
        .map_err(|source| HandshakeError::Ppp { enable, source })?;

    debug!("PPP enabled: {}", enable);
    Ok(())
}

fn set_dynamic_model<E: Exchange>(
    exchange: &mut E,
    settings: &Settings,
) -> Result<(), HandshakeError> {
    let model = settings.dynamic_model;

    let frame = CfgNav5Builder {
        mask: CfgNav5Params::DYN,
        dyn_model: model.into(),
        ..Default::default()
    }
    .into_packet_bytes();

    exchange
        .configure::<CfgNav5>(&frame)
        .map_err(|source| HandshakeError::DynamicModel {
            model: model.to_string(),
            source,
        })?;

    debug!("dynamic model: {}", model);
    Ok(())
}

fn set_fix_mode<E: Exchange>(exchange: &mut E, settings: &Settings) -> Result<(), HandshakeError> {
    let mode = settings.fix_mode;

    let frame = CfgNav5Builder {
        mask: CfgNav5Params::POS_FIX_MODE,
        fix_mode: mode.into(),
        ..Default::default()
    }
    .into_packet_bytes();

    exchange
        .configure::<CfgNav5>(&frame)
        .map_err(|source| HandshakeError::FixMode {
            mode: mode.to_string(),
            source,
        })?;

    debug!("fix mode: {}", mode);
    Ok(())
}

fn set_dead_reckoning_limit<E: Exchange>(
    exchange: &mut E,
    limit: u8,
) -> Result<(), HandshakeError> {
    let frame = CfgNav5Builder {
        mask: CfgNav5Params::DR_LIM,
        dr_limit: limit,
        ..Default::default()
    }
    .into_packet_bytes();

    exchange
        .configure::<CfgNav5>(&frame)
        .map_err(|source| HandshakeError::DeadReckoningLimit { limit, source })?;

    debug!("dead reckoning limit: {}s", limit);
    Ok(())
}

#[cfg(test)]
mod test {
    use ublox::{
        UbxPacketMeta,
        cfg_gnss::CfgGnss,
        cfg_nav5::CfgNav5,
        cfg_navx5::CfgNavX5,
        cfg_rate::CfgRate,
        mon_ver::MonVer,
    };

    use super::run;
    use crate::{
        error::{ExchangeError, HandshakeError},
        exchange::test::{Scripted, payload_of},
        settings::{Parameters, Settings},
        ubx::messages::test::{cfg_gnss_payload, mon_ver_payload},
    };

    fn settings(ublox_version: i64) -> Settings {
        Settings::try_from(Parameters {
            ublox_version,
            ..Default::default()
        })
        .unwrap()
    }

    fn gnss_read_back() -> Vec<u8> {
        cfg_gnss_payload(32, 32, &[(0, 8, 16, 0x0001_0001)])
    }

    #[test]
    fn steps_are_ordered() {
        let mut exchange = Scripted::default()
            .respond(MonVer::CLASS, MonVer::ID, mon_ver_payload("ROM CORE 3.01", "00080000", &[]))
            .respond(CfgGnss::CLASS, CfgGnss::ID, gnss_read_back());

        run(&mut exchange, &settings(8)).unwrap();

        assert_eq!(
            exchange.sent_ids(),
            vec![
                (MonVer::CLASS, MonVer::ID),
                (CfgRate::CLASS, CfgRate::ID),
                (CfgNavX5::CLASS, CfgNavX5::ID),
                (CfgNav5::CLASS, CfgNav5::ID),
                (CfgNav5::CLASS, CfgNav5::ID),
                (CfgNav5::CLASS, CfgNav5::ID),
                (CfgGnss::CLASS, CfgGnss::ID),
                (CfgGnss::CLASS, CfgGnss::ID),
            ]
        );

        // CFG-RATE: 250ms, 1 solution per measurement, GPS time
        assert_eq!(
            payload_of(&exchange.sent[1]),
            &[0xfa, 0x00, 0x01, 0x00, 0x01, 0x00]
        );

        // CFG-NAVX5: only the PPP switch, disabled by default
        let navx5 = payload_of(&exchange.sent[2]);
        assert_eq!(navx5.len(), 40);
        assert_eq!(&navx5[2..4], &[0x00, 0x20]);
        assert_eq!(navx5[26], 0);

        // NAV5: dynamic model, fix mode, dead reckoning limit
        let nav5 = exchange.sent_of(CfgNav5::CLASS, CfgNav5::ID);
        let masks = nav5.iter().map(|f| payload_of(f)[0]).collect::<Vec<_>>();
        assert_eq!(masks, vec![0x01, 0x04, 0x08]);

        // portable, auto 2D/3D, 0s
        assert_eq!(payload_of(nav5[0])[2], 0);
        assert_eq!(payload_of(nav5[1])[3], 3);
        assert_eq!(payload_of(nav5[2])[13], 0);
    }

    #[test]
    fn user_values_are_encoded() {
        let settings = Settings::try_from(Parameters {
            ublox_version: 6,
            dynamic_model: "airborne2".to_string(),
            fix_mode: "3d".to_string(),
            dr_limit: 42,
            enable_ppp: true,
            ..Default::default()
        })
        .unwrap();

        let mut exchange = Scripted::default();
        run(&mut exchange, &settings).unwrap();

        assert_eq!(payload_of(&exchange.sent[2])[26], 1);

        let nav5 = exchange.sent_of(CfgNav5::CLASS, CfgNav5::ID);
        assert_eq!(payload_of(nav5[0])[2], 7);
        assert_eq!(payload_of(nav5[1])[3], 2);
        assert_eq!(payload_of(nav5[2])[13], 42);
    }

    #[test]
    fn version_poll_is_not_fatal() {
        // MON-VER never answered, legacy hardware
        let mut exchange = Scripted::default();
        run(&mut exchange, &settings(6)).unwrap();

        // no CFG-GNSS on legacy hardware
        assert!(exchange.sent_of(CfgGnss::CLASS, CfgGnss::ID).is_empty());
        assert_eq!(exchange.sent.len(), 6);
    }

    #[test]
    fn stops_at_first_nak() {
        let mut exchange = Scripted::default().nak(CfgNavX5::CLASS, CfgNavX5::ID);

        match run(&mut exchange, &settings(8)) {
            Err(HandshakeError::Ppp { enable, source }) => {
                assert!(!enable);
                assert!(matches!(source, ExchangeError::Nak { .. }));
            },
            other => panic!("unexpected result {:?}", other),
        }

        // nothing after CFG-NAVX5
        assert_eq!(exchange.sent.len(), 3);
        assert!(exchange.sent_of(CfgNav5::CLASS, CfgNav5::ID).is_empty());
    }

    #[test]
    fn rate_timeout_is_fatal() {
        let mut exchange = Scripted::default().silent(CfgRate::CLASS, CfgRate::ID);

        assert!(matches!(
            run(&mut exchange, &settings(8)),
            Err(HandshakeError::MeasurementRate {
                meas_rate_ms: 250,
                source: ExchangeError::Timeout { .. }
            })
        ));
    }

    #[test]
    fn gnss_read_failure_aborts() {
        let mut exchange = Scripted::default();

        assert!(matches!(
            run(&mut exchange, &settings(7)),
            Err(HandshakeError::GnssRead(_))
        ));
    }
}
