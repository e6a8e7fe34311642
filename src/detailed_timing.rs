//! 18-byte detailed timing definitions
//!
//! Shared by the base block descriptor slots and the trailing area of CTA-861
//! extension blocks.

use crate::diagnostics::Scope;
use serde::Serialize;

pub const DETAILED_TIMING_SIZE: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StereoMode {
    None,
    FieldSequentialRight,
    FieldSequentialLeft,
    TwoWayInterleavedRight,
    TwoWayInterleavedLeft,
    FourWayInterleaved,
    SideBySideInterleaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncPolarity {
    Negative,
    Positive,
}

impl SyncPolarity {
    fn from_bit(set: bool) -> Self {
        if set {
            SyncPolarity::Positive
        } else {
            SyncPolarity::Negative
        }
    }
}

/// Sync signal description from the flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncSignal {
    Analog {
        bipolar: bool,
        serrations: bool,
        sync_on_all_rgb: bool,
    },
    DigitalComposite {
        serrations: bool,
        horiz_polarity: SyncPolarity,
    },
    DigitalSeparate {
        vert_polarity: SyncPolarity,
        horiz_polarity: SyncPolarity,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedTiming {
    pub pixel_clock_hz: u64,
    pub horiz_video: u16,
    pub horiz_blank: u16,
    pub horiz_front_porch: u16,
    pub horiz_sync_pulse: u16,
    pub horiz_image_mm: u16,
    pub horiz_border: u8,
    pub vert_video: u16,
    pub vert_blank: u16,
    pub vert_front_porch: u16,
    pub vert_sync_pulse: u16,
    pub vert_image_mm: u16,
    pub vert_border: u8,
    pub interlaced: bool,
    pub stereo: StereoMode,
    pub sync: SyncSignal,
}

impl DetailedTiming {
    /// Decode a timing whose pixel clock field is non-zero.
    ///
    /// Inconsistent porches are reported but the timing is still returned.
    pub fn parse(d: &[u8; DETAILED_TIMING_SIZE], scope: &mut Scope<'_>) -> Self {
        let hi4 = |lo: usize, hi: usize, shift: u32| u16::from(d[lo]) | (u16::from((d[hi] >> shift) & 0x0F) << 8);

        let pixel_clock_hz = u64::from(u16::from_le_bytes([d[0], d[1]])) * 10_000;
        let horiz_video = hi4(2, 4, 4);
        let horiz_blank = hi4(3, 4, 0);
        let vert_video = hi4(5, 7, 4);
        let vert_blank = hi4(6, 7, 0);

        let horiz_front_porch = u16::from(d[8]) | (u16::from(d[11] >> 6) << 8);
        let horiz_sync_pulse = u16::from(d[9]) | (u16::from((d[11] >> 4) & 0x03) << 8);
        let vert_front_porch = u16::from(d[10] >> 4) | (u16::from((d[11] >> 2) & 0x03) << 4);
        let vert_sync_pulse = u16::from(d[10] & 0x0F) | (u16::from(d[11] & 0x03) << 4);

        let horiz_image_mm = hi4(12, 14, 4);
        let vert_image_mm = hi4(13, 14, 0);

        let flags = d[17];
        let interlaced = flags & 0x80 != 0;
        let stereo = match ((flags >> 4) & 0x06) | (flags & 0x01) {
            0b010 => StereoMode::FieldSequentialRight,
            0b100 => StereoMode::FieldSequentialLeft,
            0b011 => StereoMode::TwoWayInterleavedRight,
            0b101 => StereoMode::TwoWayInterleavedLeft,
            0b110 => StereoMode::FourWayInterleaved,
            0b111 => StereoMode::SideBySideInterleaved,
            _ => StereoMode::None,
        };
        let sync = match (flags >> 3) & 0x03 {
            0b00 | 0b01 => SyncSignal::Analog {
                bipolar: (flags >> 3) & 0x01 != 0,
                serrations: flags & 0x04 != 0,
                sync_on_all_rgb: flags & 0x02 != 0,
            },
            0b10 => SyncSignal::DigitalComposite {
                serrations: flags & 0x04 != 0,
                horiz_polarity: SyncPolarity::from_bit(flags & 0x02 != 0),
            },
            _ => SyncSignal::DigitalSeparate {
                vert_polarity: SyncPolarity::from_bit(flags & 0x04 != 0),
                horiz_polarity: SyncPolarity::from_bit(flags & 0x02 != 0),
            },
        };

        if horiz_front_porch + horiz_sync_pulse > horiz_blank {
            scope.fail(format!(
                "Detailed timing {}x{}: horizontal front porch + sync ({}) exceeds blanking ({})",
                horiz_video,
                vert_video,
                horiz_front_porch + horiz_sync_pulse,
                horiz_blank
            ));
        }
        if vert_front_porch + vert_sync_pulse > vert_blank {
            scope.fail(format!(
                "Detailed timing {}x{}: vertical front porch + sync ({}) exceeds blanking ({})",
                horiz_video,
                vert_video,
                vert_front_porch + vert_sync_pulse,
                vert_blank
            ));
        }

        Self {
            pixel_clock_hz,
            horiz_video,
            horiz_blank,
            horiz_front_porch,
            horiz_sync_pulse,
            horiz_image_mm,
            horiz_border: d[15],
            vert_video,
            vert_blank,
            vert_front_porch,
            vert_sync_pulse,
            vert_image_mm,
            vert_border: d[16],
            interlaced,
            stereo,
            sync,
        }
    }

    pub fn horiz_total(&self) -> u32 {
        u32::from(self.horiz_video) + u32::from(self.horiz_blank)
    }

    pub fn vert_total(&self) -> u32 {
        u32::from(self.vert_video) + u32::from(self.vert_blank)
    }

    /// Field refresh rate in Hz, 0 if the totals are degenerate
    pub fn refresh_hz(&self) -> f64 {
        let total = u64::from(self.horiz_total()) * u64::from(self.vert_total());
        if total == 0 {
            return 0.0;
        }
        let rate = self.pixel_clock_hz as f64 / total as f64;
        if self.interlaced {
            rate * 2.0
        } else {
            rate
        }
    }
}
