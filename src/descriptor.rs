//! The four 18-byte descriptor slots of the base block
//!
//! A slot holds either a detailed timing (non-zero pixel clock) or a display
//! descriptor selected by the tag in byte 3.

use crate::detailed_timing::{DetailedTiming, DETAILED_TIMING_SIZE};
use crate::diagnostics::Scope;
use crate::edid::{EstablishedMode, StandardTiming};
use serde::Serialize;

pub const EDID_MAX_DESCRIPTORS: usize = 4;

const TAG_PRODUCT_SERIAL: u8 = 0xFF;
const TAG_DATA_STRING: u8 = 0xFE;
const TAG_RANGE_LIMITS: u8 = 0xFD;
const TAG_PRODUCT_NAME: u8 = 0xFC;
const TAG_COLOR_POINT: u8 = 0xFB;
const TAG_STANDARD_TIMINGS: u8 = 0xFA;
const TAG_COLOR_MANAGEMENT_DATA: u8 = 0xF9;
const TAG_CVT_TIMING_CODES: u8 = 0xF8;
const TAG_ESTABLISHED_TIMINGS_III: u8 = 0xF7;
const TAG_DUMMY: u8 = 0x10;

/// Established timings III bitmap, MSB of byte 6 first
const ESTABLISHED_TIMINGS_III: [(u16, u16, u8, bool); 44] = [
    (640, 350, 85, false),
    (640, 400, 85, false),
    (720, 400, 85, false),
    (640, 480, 85, false),
    (848, 480, 60, false),
    (800, 600, 85, false),
    (1024, 768, 85, false),
    (1152, 864, 75, false),
    (1280, 768, 60, true),
    (1280, 768, 60, false),
    (1280, 768, 75, false),
    (1280, 768, 85, false),
    (1280, 960, 60, false),
    (1280, 960, 85, false),
    (1280, 1024, 60, false),
    (1280, 1024, 85, false),
    (1360, 768, 60, false),
    (1440, 900, 60, true),
    (1440, 900, 60, false),
    (1440, 900, 75, false),
    (1440, 900, 85, false),
    (1400, 1050, 60, true),
    (1400, 1050, 60, false),
    (1400, 1050, 75, false),
    (1400, 1050, 85, false),
    (1680, 1050, 60, true),
    (1680, 1050, 60, false),
    (1680, 1050, 75, false),
    (1680, 1050, 85, false),
    (1600, 1200, 60, false),
    (1600, 1200, 65, false),
    (1600, 1200, 70, false),
    (1600, 1200, 75, false),
    (1600, 1200, 85, false),
    (1792, 1344, 60, false),
    (1792, 1344, 75, false),
    (1856, 1392, 60, false),
    (1856, 1392, 75, false),
    (1920, 1200, 60, true),
    (1920, 1200, 60, false),
    (1920, 1200, 75, false),
    (1920, 1200, 85, false),
    (1920, 1440, 60, false),
    (1920, 1440, 75, false),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Descriptor {
    DetailedTiming(DetailedTiming),
    ProductSerial(String),
    DataString(String),
    RangeLimits(RangeLimits),
    ProductName(String),
    ColorPoints(Vec<ColorPoint>),
    StandardTimings(Vec<StandardTiming>),
    ColorManagementData(ColorManagementData),
    CvtTimingCodes(Vec<CvtTimingCode>),
    EstablishedTimingsIII(Vec<EstablishedMode>),
    Dummy,
    ManufacturerSpecified { tag: u8, payload: Vec<u8> },
    Unknown { tag: u8, payload: Vec<u8> },
}

/// How the display wants timings outside the listed ones generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RangeLimitsKind {
    DefaultGtf,
    LimitsOnly,
    SecondaryGtf,
    Cvt { major: u8, minor: u8 },
    Unknown(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeLimits {
    pub min_vert_rate_hz: u16,
    pub max_vert_rate_hz: u16,
    pub min_horiz_rate_khz: u16,
    pub max_horiz_rate_khz: u16,
    pub max_pixel_clock_mhz: Option<u32>,
    pub kind: RangeLimitsKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorPoint {
    pub index: u8,
    pub white_x: f32,
    pub white_y: f32,
    /// `None` when the gamma is defined elsewhere
    pub gamma: Option<f32>,
}

/// Display color management polynomial coefficients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorManagementData {
    pub version: u8,
    pub red_a3: f32,
    pub red_a2: f32,
    pub green_a3: f32,
    pub green_a2: f32,
    pub blue_a3: f32,
    pub blue_a2: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CvtAspectRatio {
    R4_3,
    R16_9,
    R16_10,
    R15_9,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CvtTimingCode {
    pub addressable_lines: u16,
    pub aspect_ratio: CvtAspectRatio,
    pub preferred_rate_hz: u8,
    pub supports_50hz: bool,
    pub supports_60hz: bool,
    pub supports_75hz: bool,
    pub supports_85hz: bool,
    pub supports_60hz_reduced_blanking: bool,
}

impl Descriptor {
    pub fn parse(d: &[u8; DETAILED_TIMING_SIZE], revision: u8, scope: &mut Scope<'_>) -> Self {
        if d[0] != 0 || d[1] != 0 {
            return Descriptor::DetailedTiming(DetailedTiming::parse(d, scope));
        }

        let tag = d[3];
        if d[2] != 0 {
            scope.fail(format!("Display descriptor 0x{:02X}: byte 2 is not zero", tag));
        }
        if d[4] != 0 && tag != TAG_RANGE_LIMITS {
            scope.fail(format!("Display descriptor 0x{:02X}: byte 4 is not zero", tag));
        }
        let payload = &d[5..];

        match tag {
            TAG_PRODUCT_SERIAL => Descriptor::ProductSerial(parse_text(payload, scope)),
            TAG_DATA_STRING => Descriptor::DataString(parse_text(payload, scope)),
            TAG_PRODUCT_NAME => Descriptor::ProductName(parse_text(payload, scope)),
            TAG_RANGE_LIMITS => Descriptor::RangeLimits(parse_range_limits(d, revision, scope)),
            TAG_COLOR_POINT => Descriptor::ColorPoints(parse_color_points(payload)),
            TAG_STANDARD_TIMINGS => {
                let timings = payload[..12]
                    .chunks_exact(2)
                    .filter_map(|p| StandardTiming::parse(p[0], p[1], revision, scope))
                    .collect();
                Descriptor::StandardTimings(timings)
            }
            TAG_COLOR_MANAGEMENT_DATA => {
                let coeff = |i: usize| f32::from(u16::from_le_bytes([payload[i], payload[i + 1]])) / 100.0;
                if payload[0] != 3 {
                    scope.fail(format!("Color management data version {} is not 3", payload[0]));
                }
                Descriptor::ColorManagementData(ColorManagementData {
                    version: payload[0],
                    red_a3: coeff(1),
                    red_a2: coeff(3),
                    green_a3: coeff(5),
                    green_a2: coeff(7),
                    blue_a3: coeff(9),
                    blue_a2: coeff(11),
                })
            }
            TAG_CVT_TIMING_CODES => {
                if payload[0] != 1 {
                    scope.fail(format!("CVT timing codes version {} is not 1", payload[0]));
                }
                let codes = payload[1..]
                    .chunks_exact(3)
                    .filter_map(|c| parse_cvt_code([c[0], c[1], c[2]], scope))
                    .collect();
                Descriptor::CvtTimingCodes(codes)
            }
            TAG_ESTABLISHED_TIMINGS_III => {
                if payload[0] != 0x0A {
                    scope.fail(format!(
                        "Established timings III revision 0x{:02X} is not 0x0A",
                        payload[0]
                    ));
                }
                Descriptor::EstablishedTimingsIII(established_timings_iii(&payload[1..7]))
            }
            TAG_DUMMY => {
                if payload.iter().any(|&b| b != 0) {
                    scope.fail("Dummy descriptor payload is not zeroed");
                }
                Descriptor::Dummy
            }
            0x00..=0x0F => Descriptor::ManufacturerSpecified {
                tag,
                payload: payload.to_vec(),
            },
            _ => {
                scope.fail(format!("Unknown display descriptor tag 0x{:02X}", tag));
                Descriptor::Unknown {
                    tag,
                    payload: payload.to_vec(),
                }
            }
        }
    }
}

/// Text is terminated by 0x0A and padded with spaces
fn parse_text(payload: &[u8], scope: &mut Scope<'_>) -> String {
    let end = payload.iter().position(|&b| b == 0x0A).unwrap_or(payload.len());
    if end < payload.len() && payload[end + 1..].iter().any(|&b| b != 0x20) {
        scope.fail("Text descriptor is not padded with spaces after the newline");
    }

    let mut text = String::with_capacity(end);
    for &b in &payload[..end] {
        if (0x20..=0x7E).contains(&b) {
            text.push(char::from(b));
        } else {
            scope.fail(format!("Text descriptor contains non-printable byte 0x{:02X}", b));
            text.push('.');
        }
    }
    text.trim_end_matches(' ').to_string()
}

fn parse_range_limits(d: &[u8; DETAILED_TIMING_SIZE], revision: u8, scope: &mut Scope<'_>) -> RangeLimits {
    let offsets = if revision >= 4 { d[4] } else { 0 };
    let max_vert_offset = if offsets & 0x02 != 0 { 255 } else { 0 };
    let min_vert_offset = if offsets & 0x03 == 0x03 { 255 } else { 0 };
    let max_horiz_offset = if offsets & 0x08 != 0 { 255 } else { 0 };
    let min_horiz_offset = if offsets & 0x0C == 0x0C { 255 } else { 0 };

    let limits = RangeLimits {
        min_vert_rate_hz: u16::from(d[5]) + min_vert_offset,
        max_vert_rate_hz: u16::from(d[6]) + max_vert_offset,
        min_horiz_rate_khz: u16::from(d[7]) + min_horiz_offset,
        max_horiz_rate_khz: u16::from(d[8]) + max_horiz_offset,
        max_pixel_clock_mhz: match d[9] {
            0 => None,
            v => Some(u32::from(v) * 10),
        },
        kind: match d[10] {
            0x00 => RangeLimitsKind::DefaultGtf,
            0x01 => RangeLimitsKind::LimitsOnly,
            0x02 => RangeLimitsKind::SecondaryGtf,
            0x04 => RangeLimitsKind::Cvt {
                major: d[11] >> 4,
                minor: d[11] & 0x0F,
            },
            other => RangeLimitsKind::Unknown(other),
        },
    };

    if limits.min_vert_rate_hz > limits.max_vert_rate_hz {
        scope.fail(format!(
            "Range limits: min vertical rate {} Hz > max {} Hz",
            limits.min_vert_rate_hz, limits.max_vert_rate_hz
        ));
    }
    if limits.min_horiz_rate_khz > limits.max_horiz_rate_khz {
        scope.fail(format!(
            "Range limits: min horizontal rate {} kHz > max {} kHz",
            limits.min_horiz_rate_khz, limits.max_horiz_rate_khz
        ));
    }
    if let RangeLimitsKind::Unknown(v) = limits.kind {
        scope.fail(format!("Range limits: unknown timing support type 0x{:02X}", v));
    }
    limits
}

fn parse_color_points(payload: &[u8]) -> Vec<ColorPoint> {
    payload[..10]
        .chunks_exact(5)
        .filter(|p| p[0] != 0)
        .map(|p| {
            let x = (u16::from(p[2]) << 2) | u16::from((p[1] >> 2) & 0x03);
            let y = (u16::from(p[3]) << 2) | u16::from(p[1] & 0x03);
            ColorPoint {
                index: p[0],
                white_x: f32::from(x) / 1024.0,
                white_y: f32::from(y) / 1024.0,
                gamma: match p[4] {
                    0xFF => None,
                    g => Some((f32::from(g) + 100.0) / 100.0),
                },
            }
        })
        .collect()
}

fn parse_cvt_code(c: [u8; 3], scope: &mut Scope<'_>) -> Option<CvtTimingCode> {
    if c == [0, 0, 0] {
        return None;
    }
    let raw_lines = u16::from(c[0]) | (u16::from(c[1] >> 4) << 8);
    let aspect_ratio = match (c[1] >> 2) & 0x03 {
        0 => CvtAspectRatio::R4_3,
        1 => CvtAspectRatio::R16_9,
        2 => CvtAspectRatio::R16_10,
        _ => CvtAspectRatio::R15_9,
    };
    if c[1] & 0x03 != 0 {
        scope.fail("CVT timing code: reserved bits set");
    }
    let code = CvtTimingCode {
        addressable_lines: (raw_lines + 1) * 2,
        aspect_ratio,
        preferred_rate_hz: [50, 60, 75, 85][usize::from((c[2] >> 5) & 0x03)],
        supports_50hz: c[2] & 0x10 != 0,
        supports_60hz: c[2] & 0x08 != 0,
        supports_75hz: c[2] & 0x04 != 0,
        supports_85hz: c[2] & 0x02 != 0,
        supports_60hz_reduced_blanking: c[2] & 0x01 != 0,
    };
    if c[2] & 0x1F == 0 {
        scope.fail("CVT timing code: no refresh rate supported");
    }
    Some(code)
}

fn established_timings_iii(bitmap: &[u8]) -> Vec<EstablishedMode> {
    ESTABLISHED_TIMINGS_III
        .iter()
        .enumerate()
        .filter(|(i, _)| bitmap[i / 8] & (0x80 >> (i % 8)) != 0)
        .map(|(_, &(width, height, refresh_hz, reduced_blanking))| EstablishedMode {
            width,
            height,
            refresh_hz,
            interlaced: false,
            reduced_blanking,
        })
        .collect()
}
