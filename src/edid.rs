//! EDID 1.x base block and the document root
//!
//! # Layout
//!
//! ```text
//! 0x00  header (00 FF FF FF FF FF FF 00)
//! 0x08  vendor / product identification
//! 0x12  version, revision
//! 0x14  basic display parameters
//! 0x19  chromaticity coordinates
//! 0x23  established timings I & II
//! 0x26  standard timings (8 x 2 bytes)
//! 0x36  descriptors (4 x 18 bytes)
//! 0x7E  extension count
//! 0x7F  checksum
//! ```

use crate::descriptor::{Descriptor, EDID_MAX_DESCRIPTORS};
use crate::detailed_timing::{DetailedTiming, DETAILED_TIMING_SIZE};
use crate::diagnostics::{Diagnostics, Scope};
use crate::extension::Extension;
use crate::reader::ByteReader;
use crate::{Error, Result};
use serde::Serialize;
use tracing::debug;

pub const EDID_BLOCK_SIZE: usize = 128;
pub const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
pub const EDID_MAX_STANDARD_TIMINGS: usize = 8;

const BASE_CONTEXT: &str = "Base EDID";

/// Established timings I & II, MSB of byte 0x23 first
const ESTABLISHED_TIMINGS_I_II: [(u16, u16, u8, bool); 17] = [
    (720, 400, 70, false),
    (720, 400, 88, false),
    (640, 480, 60, false),
    (640, 480, 67, false),
    (640, 480, 72, false),
    (640, 480, 75, false),
    (800, 600, 56, false),
    (800, 600, 60, false),
    (800, 600, 72, false),
    (800, 600, 75, false),
    (832, 624, 75, false),
    (1024, 768, 87, true),
    (1024, 768, 60, false),
    (1024, 768, 70, false),
    (1024, 768, 75, false),
    (1280, 1024, 75, false),
    (1152, 870, 75, false),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorProduct {
    /// Three-letter PNP manufacturer ID
    pub manufacturer: String,
    pub product: u16,
    pub serial: u32,
    pub manufacture_week: Option<u8>,
    pub manufacture_year: Option<u16>,
    pub model_year: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalLevel {
    /// +0.7/-0.3 V
    L0_7_0_3,
    /// +0.714/-0.286 V
    L0_714_0_286,
    /// +1.0/-0.4 V
    L1_0_0_4,
    /// +0.7/0 V
    L0_7_0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DigitalInterface {
    Undefined,
    Dvi,
    HdmiA,
    HdmiB,
    Mddi,
    DisplayPort,
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VideoInput {
    Analog {
        signal_level: SignalLevel,
        blank_to_black_setup: bool,
        separate_sync: bool,
        composite_sync_on_horiz: bool,
        composite_sync_on_green: bool,
        serrated_vsync: bool,
    },
    Digital {
        /// Bits per primary color channel, `None` when undefined
        color_bit_depth: Option<u8>,
        interface: DigitalInterface,
    },
}

impl VideoInput {
    pub fn is_digital(&self) -> bool {
        matches!(self, VideoInput::Digital { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenSize {
    pub width_cm: Option<u8>,
    pub height_cm: Option<u8>,
    pub landscape_aspect_ratio: Option<f32>,
    pub portrait_aspect_ratio: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayColorType {
    Monochrome,
    Rgb,
    NonRgb,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorEncodings {
    pub rgb444: bool,
    pub ycrcb444: bool,
    pub ycrcb422: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MiscFeatures {
    pub dpms_standby: bool,
    pub dpms_suspend: bool,
    pub dpms_off: bool,
    /// Analog displays only
    pub display_color_type: Option<DisplayColorType>,
    /// Digital displays with EDID 1.4 only
    pub color_encodings: Option<ColorEncodings>,
    pub srgb_is_primary: bool,
    pub preferred_timing_is_native: bool,
    /// EDID 1.4: continuous frequency; earlier revisions: default GTF supported
    pub continuous_freq: bool,
}

/// CIE 1931 xy coordinates, each reconstructed from 10 bits
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Chromaticity {
    pub red_x: f32,
    pub red_y: f32,
    pub green_x: f32,
    pub green_y: f32,
    pub blue_x: f32,
    pub blue_y: f32,
    pub white_x: f32,
    pub white_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EstablishedMode {
    pub width: u16,
    pub height: u16,
    pub refresh_hz: u8,
    pub interlaced: bool,
    pub reduced_blanking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EstablishedTimings {
    pub modes: Vec<EstablishedMode>,
    /// Low 7 bits of byte 0x25
    pub manufacturer_specific: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AspectRatio {
    R1_1,
    R16_10,
    R4_3,
    R5_4,
    R16_9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StandardTiming {
    pub horiz_video: u16,
    pub vert_video: u16,
    pub refresh_hz: u8,
    pub aspect_ratio: AspectRatio,
}

impl StandardTiming {
    /// Decode one 2-byte standard timing; `None` for the unused 0x0101 slot
    pub fn parse(b0: u8, b1: u8, revision: u8, scope: &mut Scope<'_>) -> Option<Self> {
        if (b0, b1) == (0x01, 0x01) {
            return None;
        }
        if b0 == 0x00 {
            scope.fail(format!("Standard timing 0x{:02X}{:02X}: invalid horizontal size", b0, b1));
            return None;
        }

        let horiz_video = (u16::from(b0) + 31) * 8;
        let aspect_ratio = match b1 >> 6 {
            0 if revision < 3 => AspectRatio::R1_1,
            0 => AspectRatio::R16_10,
            1 => AspectRatio::R4_3,
            2 => AspectRatio::R5_4,
            _ => AspectRatio::R16_9,
        };
        let vert_video = match aspect_ratio {
            AspectRatio::R1_1 => horiz_video,
            AspectRatio::R16_10 => horiz_video * 10 / 16,
            AspectRatio::R4_3 => horiz_video * 3 / 4,
            AspectRatio::R5_4 => horiz_video * 4 / 5,
            AspectRatio::R16_9 => horiz_video * 9 / 16,
        };

        Some(Self {
            horiz_video,
            vert_video,
            refresh_hz: (b1 & 0x3F) + 60,
            aspect_ratio,
        })
    }
}

/// A decoded EDID: the base block plus its extension blocks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edid {
    pub version: u8,
    pub revision: u8,
    pub vendor_product: VendorProduct,
    pub video_input: VideoInput,
    pub screen_size: ScreenSize,
    /// `None` when the gamma is stored in an extension
    pub basic_gamma: Option<f32>,
    pub misc_features: MiscFeatures,
    pub chromaticity: Chromaticity,
    pub established_timings: EstablishedTimings,
    pub standard_timings: Vec<StandardTiming>,
    pub descriptors: Vec<Descriptor>,
    /// Extension count declared in the base block
    pub extension_count: u8,
    pub extensions: Vec<Extension>,
}

impl Edid {
    /// Decode a complete EDID blob.
    ///
    /// Fails only on structural problems: a size that is not a multiple of
    /// 128, a wrong header, fewer blocks than the base block declares, or a
    /// capacity overflow inside an extension. Everything else is recorded in
    /// `diags`.
    pub fn parse(data: &[u8], diags: &mut Diagnostics) -> Result<Self> {
        if data.is_empty() || data.len() % EDID_BLOCK_SIZE != 0 {
            return Err(Error::InvalidSize(data.len()));
        }

        let (base, rest) = data.split_at(EDID_BLOCK_SIZE);
        let mut base_block = [0u8; EDID_BLOCK_SIZE];
        base_block.copy_from_slice(base);

        let mut edid = {
            let mut scope = Scope::new(diags, Some(0), BASE_CONTEXT);
            parse_base_block(&base_block, &mut scope)?
        };

        let declared = usize::from(edid.extension_count);
        let present = rest.len() / EDID_BLOCK_SIZE;
        if declared > present {
            return Err(Error::Truncated { declared, present });
        }
        if present > declared {
            diags.push(
                Some(0),
                BASE_CONTEXT,
                format!(
                    "Extension count is {} but {} extension blocks follow, ignoring the surplus",
                    declared, present
                ),
            );
        }

        for (i, chunk) in rest.chunks_exact(EDID_BLOCK_SIZE).take(declared).enumerate() {
            let mut block = [0u8; EDID_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            let ext = Extension::parse(&block, i + 1, diags)?;
            edid.extensions.push(ext);
        }

        debug!(
            manufacturer = %edid.vendor_product.manufacturer,
            product = edid.vendor_product.product,
            extensions = edid.extensions.len(),
            "Decoded EDID"
        );
        Ok(edid)
    }

    pub fn detailed_timings(&self) -> impl Iterator<Item = &DetailedTiming> {
        self.descriptors.iter().filter_map(|d| match d {
            Descriptor::DetailedTiming(t) => Some(t),
            _ => None,
        })
    }

    pub fn product_name(&self) -> Option<&str> {
        self.descriptors.iter().find_map(|d| match d {
            Descriptor::ProductName(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn product_serial(&self) -> Option<&str> {
        self.descriptors.iter().find_map(|d| match d {
            Descriptor::ProductSerial(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// CTA-861 extensions in block order
    pub fn cta_extensions(&self) -> impl Iterator<Item = &crate::cta::Cta> {
        self.extensions.iter().filter_map(|e| match e {
            Extension::Cta(cta) => Some(cta),
            _ => None,
        })
    }

    /// DisplayID sections in block order
    pub fn displayid_extensions(&self) -> impl Iterator<Item = &crate::displayid::DisplayId> {
        self.extensions.iter().filter_map(|e| match e {
            Extension::DisplayId(d) => Some(d),
            _ => None,
        })
    }
}

/// Sum of all bytes modulo 256 must be zero
pub(crate) fn checksum_ok(block: &[u8]) -> bool {
    block.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == 0
}

fn parse_base_block(block: &[u8; EDID_BLOCK_SIZE], scope: &mut Scope<'_>) -> Result<Edid> {
    let mut r = ByteReader::new(block);

    if r.read_array::<8>()? != EDID_HEADER {
        return Err(Error::InvalidHeader);
    }
    if !checksum_ok(block) {
        scope.fail("Invalid checksum");
    }

    let id = r.read_array::<10>()?;
    let version = r.read_u8()?;
    let revision = r.read_u8()?;
    if version != 1 {
        scope.fail(format!("Unsupported EDID version {}.{}", version, revision));
    }
    let vendor_product = parse_vendor_product(&id, revision, scope);

    let input = r.read_u8()?;
    let video_input = parse_video_input(input, revision, scope);
    let [width, height] = r.read_array::<2>()?;
    let screen_size = parse_screen_size(width, height);
    let basic_gamma = match r.read_u8()? {
        0xFF => None,
        g => Some((f32::from(g) + 100.0) / 100.0),
    };
    let features = r.read_u8()?;
    let misc_features = parse_misc_features(features, &video_input, revision);

    let chromaticity = parse_chromaticity(&r.read_array::<10>()?);

    let established_timings = parse_established_timings(&r.read_array::<3>()?);

    let mut standard_timings = Vec::with_capacity(EDID_MAX_STANDARD_TIMINGS);
    for _ in 0..EDID_MAX_STANDARD_TIMINGS {
        let [b0, b1] = r.read_array::<2>()?;
        if let Some(t) = StandardTiming::parse(b0, b1, revision, scope) {
            standard_timings.push(t);
        }
    }

    let mut descriptors = Vec::with_capacity(EDID_MAX_DESCRIPTORS);
    for slot in 0..EDID_MAX_DESCRIPTORS {
        let raw = r.read_array::<DETAILED_TIMING_SIZE>()?;
        let desc = Descriptor::parse(&raw, revision, scope);
        if slot == 0 && revision >= 3 && !matches!(desc, Descriptor::DetailedTiming(_)) {
            scope.fail("First descriptor is not a preferred detailed timing");
        }
        descriptors.push(desc);
    }

    let extension_count = r.read_u8()?;

    Ok(Edid {
        version,
        revision,
        vendor_product,
        video_input,
        screen_size,
        basic_gamma,
        misc_features,
        chromaticity,
        established_timings,
        standard_timings,
        descriptors,
        extension_count,
        extensions: Vec::new(),
    })
}

/// Unpack three 5-bit letters, 1 = 'A'
pub(crate) fn decode_pnp_id(raw: u16) -> String {
    [10u16, 5, 0]
        .iter()
        .map(|shift| {
            let v = ((raw >> shift) & 0x1F) as u8;
            char::from(b'@' + v)
        })
        .collect()
}

fn parse_vendor_product(id: &[u8; 10], revision: u8, scope: &mut Scope<'_>) -> VendorProduct {
    let raw = u16::from_be_bytes([id[0], id[1]]);
    let manufacturer = decode_pnp_id(raw);
    if raw & 0x8000 != 0 || !manufacturer.chars().all(|c| c.is_ascii_uppercase()) {
        scope.fail(format!("Manufacturer name field 0x{:04X} is invalid", raw));
    }

    let week = id[8];
    let year = 1990 + u16::from(id[9]);
    let (manufacture_week, manufacture_year, model_year) = match week {
        0xFF => (None, None, Some(year)),
        0 => (None, Some(year), None),
        1..=54 => (Some(week), Some(year), None),
        _ => {
            scope.fail(format!("Invalid week of manufacture {}", week));
            (None, Some(year), None)
        }
    };
    if revision >= 4 && year < 2006 {
        scope.fail(format!("Year {} is before EDID 1.4 existed", year));
    }

    VendorProduct {
        manufacturer,
        product: u16::from_le_bytes([id[2], id[3]]),
        serial: u32::from_le_bytes([id[4], id[5], id[6], id[7]]),
        manufacture_week,
        manufacture_year,
        model_year,
    }
}

fn parse_video_input(v: u8, revision: u8, scope: &mut Scope<'_>) -> VideoInput {
    if v & 0x80 == 0 {
        return VideoInput::Analog {
            signal_level: match (v >> 5) & 0x03 {
                0 => SignalLevel::L0_7_0_3,
                1 => SignalLevel::L0_714_0_286,
                2 => SignalLevel::L1_0_0_4,
                _ => SignalLevel::L0_7_0,
            },
            blank_to_black_setup: v & 0x10 != 0,
            separate_sync: v & 0x08 != 0,
            composite_sync_on_horiz: v & 0x04 != 0,
            composite_sync_on_green: v & 0x02 != 0,
            serrated_vsync: v & 0x01 != 0,
        };
    }

    if revision < 4 {
        if v & 0x7E != 0 {
            scope.fail("Digital video input: reserved bits set");
        }
        return VideoInput::Digital {
            color_bit_depth: None,
            interface: DigitalInterface::Undefined,
        };
    }

    let color_bit_depth = match (v >> 4) & 0x07 {
        0 => None,
        7 => {
            scope.fail("Digital video input: reserved color bit depth");
            None
        }
        n => Some(4 + 2 * n),
    };
    let interface = match v & 0x0F {
        0 => DigitalInterface::Undefined,
        1 => DigitalInterface::Dvi,
        2 => DigitalInterface::HdmiA,
        3 => DigitalInterface::HdmiB,
        4 => DigitalInterface::Mddi,
        5 => DigitalInterface::DisplayPort,
        n => {
            scope.fail(format!("Digital video input: unknown interface {}", n));
            DigitalInterface::Unknown(n)
        }
    };
    VideoInput::Digital {
        color_bit_depth,
        interface,
    }
}

fn parse_screen_size(width: u8, height: u8) -> ScreenSize {
    let mut size = ScreenSize {
        width_cm: None,
        height_cm: None,
        landscape_aspect_ratio: None,
        portrait_aspect_ratio: None,
    };
    match (width, height) {
        (0, 0) => {}
        (w, 0) => size.landscape_aspect_ratio = Some((f32::from(w) + 99.0) / 100.0),
        (0, h) => size.portrait_aspect_ratio = Some(100.0 / (f32::from(h) + 99.0)),
        (w, h) => {
            size.width_cm = Some(w);
            size.height_cm = Some(h);
        }
    }
    size
}

fn parse_misc_features(v: u8, input: &VideoInput, revision: u8) -> MiscFeatures {
    let color_bits = (v >> 3) & 0x03;
    let (display_color_type, color_encodings) = if input.is_digital() && revision >= 4 {
        let encodings = ColorEncodings {
            rgb444: true,
            ycrcb444: color_bits & 0x01 != 0,
            ycrcb422: color_bits & 0x02 != 0,
        };
        (None, Some(encodings))
    } else {
        let kind = match color_bits {
            0 => DisplayColorType::Monochrome,
            1 => DisplayColorType::Rgb,
            2 => DisplayColorType::NonRgb,
            _ => DisplayColorType::Undefined,
        };
        (Some(kind), None)
    };

    MiscFeatures {
        dpms_standby: v & 0x80 != 0,
        dpms_suspend: v & 0x40 != 0,
        dpms_off: v & 0x20 != 0,
        display_color_type,
        color_encodings,
        srgb_is_primary: v & 0x04 != 0,
        preferred_timing_is_native: v & 0x02 != 0,
        continuous_freq: v & 0x01 != 0,
    }
}

/// Bytes 0-1 hold the two low bits of every coordinate, bytes 2-9 the
/// eight high bits, in red x/y, green x/y, blue x/y, white x/y order.
fn parse_chromaticity(b: &[u8; 10]) -> Chromaticity {
    let coord = |hi: usize, lo_byte: usize, lo_shift: u8| {
        let raw = (u16::from(b[hi]) << 2) | u16::from((b[lo_byte] >> lo_shift) & 0x03);
        f32::from(raw) / 1024.0
    };
    Chromaticity {
        red_x: coord(2, 0, 6),
        red_y: coord(3, 0, 4),
        green_x: coord(4, 0, 2),
        green_y: coord(5, 0, 0),
        blue_x: coord(6, 1, 6),
        blue_y: coord(7, 1, 4),
        white_x: coord(8, 1, 2),
        white_y: coord(9, 1, 0),
    }
}

fn parse_established_timings(b: &[u8; 3]) -> EstablishedTimings {
    let modes = ESTABLISHED_TIMINGS_I_II
        .iter()
        .enumerate()
        .filter(|(i, _)| b[i / 8] & (0x80 >> (i % 8)) != 0)
        .map(|(_, &(width, height, refresh_hz, interlaced))| EstablishedMode {
            width,
            height,
            refresh_hz,
            interlaced,
            reduced_blanking: false,
        })
        .collect();
    EstablishedTimings {
        modes,
        manufacturer_specific: b[2] & 0x7F,
    }
}
