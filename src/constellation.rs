use log::{debug, info, warn};

use ublox::cfg_gnss::{
    BeidouSigMask, CfgGnss, CfgGnssBuilder, GalileoSigMask, GlonassSigMask, GnssConfigBlock,
    GnssId, GpsSigMask, ImesSigMask, QzssSigMask, SbasSigMask,
};

use crate::{
    error::HandshakeError,
    exchange::Exchange,
    settings::{Constellations, HardwareGeneration},
    ubx::{PacketRef, messages::GnssConfig},
};

/// Signal configuration bits of a CFG-GNSS block flags field
pub const SIG_CFG_MASK: u32 = 0x00ff_0000;

/// Tracking channels used on u-blox 8 and newer
const NUM_TRK_CH_USE: u8 = 28;

/// QZSS signals, from the flags-aligned user value.
fn qzss_signals(qzss_sig_cfg: u32) -> QzssSigMask {
    QzssSigMask::from_bits_retain(((qzss_sig_cfg & SIG_CFG_MASK) >> 16) as u8)
}

/// Builds the CFG-GNSS write request from the configuration
/// read back from the receiver. Returns None when this hardware
/// generation does not support CFG-GNSS.
pub fn build_request(
    generation: HardwareGeneration,
    current: &GnssConfig,
    constellations: &Constellations,
    qzss_sig_cfg: u32,
) -> Option<GnssConfig> {
    match generation {
        HardwareGeneration::Legacy => None,
        HardwareGeneration::Gen7 => Some(GnssConfig {
            num_trk_ch_hw: current.num_trk_ch_hw,
            num_trk_ch_use: current.num_trk_ch_use,
            blocks: vec![GnssConfigBlock::new(
                constellations.glonass,
                GnssId::GLONASS,
                8,
                14,
                GlonassSigMask::L10F,
            )],
        }),
        HardwareGeneration::Gen8 => Some(GnssConfig {
            num_trk_ch_hw: current.num_trk_ch_hw,
            num_trk_ch_use: NUM_TRK_CH_USE,
            blocks: vec![
                GnssConfigBlock::new(constellations.gps, GnssId::GPS, 8, 16, GpsSigMask::L1CA),
                GnssConfigBlock::new(constellations.sbas, GnssId::SBAS, 0, 4, SbasSigMask::L1CA),
                GnssConfigBlock::new(
                    constellations.galileo,
                    GnssId::GALILEO,
                    0,
                    4,
                    GalileoSigMask::E1,
                ),
                GnssConfigBlock::new(
                    constellations.beidou,
                    GnssId::BEIDOU,
                    0,
                    4,
                    BeidouSigMask::B1I,
                ),
                GnssConfigBlock::new(constellations.imes, GnssId::IMES, 0, 4, ImesSigMask::L1CA),
                GnssConfigBlock::new(
                    constellations.qzss,
                    GnssId::QZSS,
                    0,
                    3,
                    qzss_signals(qzss_sig_cfg),
                ),
                GnssConfigBlock::new(
                    constellations.glonass,
                    GnssId::GLONASS,
                    8,
                    14,
                    GlonassSigMask::L10F,
                ),
            ],
        }),
    }
}

/// Serializes a CFG-GNSS write request.
pub fn to_frame(request: &GnssConfig) -> Vec<u8> {
    let mut frame = Vec::with_capacity(12 + 8 * request.blocks.len());

    CfgGnssBuilder {
        msg_version: 0,
        num_trk_ch_hw: request.num_trk_ch_hw,
        num_trk_ch_use: request.num_trk_ch_use,
        ..Default::default()
    }
    .with_blocks(&request.blocks)
    .extend_to(&mut frame);

    frame
}

/// Reads, logs and rewrites the receiver constellation configuration.
pub fn configure<E: Exchange>(
    exchange: &mut E,
    generation: HardwareGeneration,
    constellations: &Constellations,
    qzss_sig_cfg: u32,
) -> Result<(), HandshakeError> {
    if generation == HardwareGeneration::Legacy {
        warn!("ublox_version < 7, ignoring GNSS settings");
        return Ok(());
    }

    let current = exchange
        .poll::<CfgGnss, _, _>(|packet| match packet {
            PacketRef::CfgGnss(cfg) => Some(GnssConfig::from(cfg)),
            _ => None,
        })
        .map_err(HandshakeError::GnssRead)?;

    info!("Read GNSS config.");
    debug!("Num. tracking channels in hardware: {}", current.num_trk_ch_hw);
    debug!("Num. tracking channels to use: {}", current.num_trk_ch_use);

    if generation == HardwareGeneration::Gen7 {
        warn!("ublox_version < 8, ignoring BeiDou, Galileo, IMES, QZSS and SBAS settings");
    } else {
        for block in current.blocks.iter() {
            debug!(
                "{:?}: enabled={} reserved={} max={} sig_cfg={:#04x}",
                block.gnss_id,
                block.enabled(),
                block.res_trk_ch,
                block.max_trk_ch,
                block.raw_sig_mask()
            );
        }
    }

    let Some(request) = build_request(generation, &current, constellations, qzss_sig_cfg) else {
        return Ok(());
    };

    exchange
        .configure::<CfgGnss>(&to_frame(&request))
        .map_err(HandshakeError::GnssWrite)?;

    info!("GNSS configured: {}", constellations);
    Ok(())
}
