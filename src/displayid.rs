//! DisplayID sections
//!
//! A section is a 4-byte header (version, payload length, product type,
//! extension count), a payload of data blocks and a checksum byte. Each data
//! block has a 3-byte header: tag, revision, payload length.
//!
//! Capacities are fixed by the largest possible payload: 248 bytes of block
//! payload behind a 3-byte header fit at most 83 blocks and
//! `floor(248 / record size)` timings per timing block. A section claiming
//! more is corrupt and aborts the parse.

use crate::diagnostics::Scope;
use crate::reader::ByteReader;
use crate::{Error, Result};
use serde::Serialize;
use tracing::debug;

pub const DISPLAYID_EXTENSION_TAG: u8 = 0x70;

pub const DISPLAYID_MAX_SECTION_PAYLOAD: usize = 251;
pub const DISPLAYID_MAX_DATA_BLOCKS: usize = 83;
pub const DISPLAYID_MAX_TYPE_I_TIMINGS: usize = 12;
pub const DISPLAYID_MAX_TYPE_II_TIMINGS: usize = 22;
pub const DISPLAYID_MAX_TYPE_III_TIMINGS: usize = 82;

const TYPE_I_TIMING_SIZE: usize = 20;
const TYPE_II_TIMING_SIZE: usize = 11;
const TYPE_III_TIMING_SIZE: usize = 3;
const DISPLAY_PARAMS_SIZE: usize = 12;
const TILED_TOPOLOGY_SIZE: usize = 22;
const PRODUCT_ID_MIN_SIZE: usize = 12;

const TAG_PRODUCT_ID: u8 = 0x00;
const TAG_DISPLAY_PARAMS: u8 = 0x01;
const TAG_TYPE_I_TIMING: u8 = 0x03;
const TAG_TYPE_II_TIMING: u8 = 0x04;
const TAG_TYPE_III_TIMING: u8 = 0x05;
const TAG_TILED_TOPOLOGY: u8 = 0x12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AspectRatio {
    R1_1,
    R5_4,
    R4_3,
    R15_9,
    R16_9,
    R16_10,
    R64_27,
    R256_135,
    Undefined,
    Reserved(u8),
}

impl AspectRatio {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0 => AspectRatio::R1_1,
            1 => AspectRatio::R5_4,
            2 => AspectRatio::R4_3,
            3 => AspectRatio::R15_9,
            4 => AspectRatio::R16_9,
            5 => AspectRatio::R16_10,
            6 => AspectRatio::R64_27,
            7 => AspectRatio::R256_135,
            8 => AspectRatio::Undefined,
            other => AspectRatio::Reserved(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::R1_1 => "1:1",
            AspectRatio::R5_4 => "5:4",
            AspectRatio::R4_3 => "4:3",
            AspectRatio::R15_9 => "15:9",
            AspectRatio::R16_9 => "16:9",
            AspectRatio::R16_10 => "16:10",
            AspectRatio::R64_27 => "64:27",
            AspectRatio::R256_135 => "256:135",
            AspectRatio::Undefined => "undefined",
            AspectRatio::Reserved(_) => "reserved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stereo3d {
    Never,
    Always,
    User,
    Reserved,
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

/// A type I or type II detailed timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timing {
    pub pixel_clock_hz: u64,
    pub preferred: bool,
    pub stereo_3d: Stereo3d,
    pub interlaced: bool,
    /// Type I only
    pub aspect_ratio: Option<AspectRatio>,
    pub horiz_active: u32,
    pub horiz_blank: u32,
    pub horiz_offset: u32,
    pub horiz_sync_width: u32,
    pub horiz_sync_polarity: SyncPolarity,
    pub vert_active: u32,
    pub vert_blank: u32,
    pub vert_offset: u32,
    pub vert_sync_width: u32,
    pub vert_sync_polarity: SyncPolarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimingFormula {
    CvtStandard,
    CvtReducedBlanking,
    Reserved(u8),
}

/// A type III short timing, generated from a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeIIITiming {
    pub preferred: bool,
    pub formula: TimingFormula,
    pub aspect_ratio: AspectRatio,
    pub horiz_active: u16,
    pub interlaced: bool,
    pub refresh_hz: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductId {
    pub vendor: String,
    pub product_code: u16,
    pub serial: u32,
    pub manufacture_week: Option<u8>,
    pub manufacture_year: Option<u16>,
    pub model_year: Option<u16>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DisplayParamsFeatures {
    pub audio: bool,
    pub separate_audio_inputs: bool,
    pub audio_input_override: bool,
    pub power_management: bool,
    pub fixed_timing: bool,
    pub fixed_pixel_format: bool,
    pub ai: bool,
    pub deinterlacing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayParams {
    pub horiz_image_mm: f32,
    pub vert_image_mm: f32,
    pub horiz_pixels: u16,
    pub vert_pixels: u16,
    pub features: DisplayParamsFeatures,
    /// `None` when the gamma is defined elsewhere
    pub gamma: Option<f32>,
    pub aspect_ratio: f32,
    pub bits_per_color_overall: u8,
    pub bits_per_color_native: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TileBehavior {
    Undefined,
    Location,
    Scale,
    Clone,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileBezel {
    pub top_px: f32,
    pub bottom_px: f32,
    pub right_px: f32,
    pub left_px: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiledTopology {
    pub single_enclosure: bool,
    pub single_tile_behavior: TileBehavior,
    pub multi_tile_behavior: TileBehavior,
    pub total_horiz_tiles: u8,
    pub total_vert_tiles: u8,
    pub horiz_tile_location: u8,
    pub vert_tile_location: u8,
    pub tile_width: u32,
    pub tile_height: u32,
    pub bezel: Option<TileBezel>,
    pub vendor: String,
    pub product_code: u16,
    pub serial: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataBlock {
    ProductId(ProductId),
    DisplayParams(DisplayParams),
    TypeITimings(Vec<Timing>),
    TypeIITimings(Vec<Timing>),
    TypeIIITimings(Vec<TypeIIITiming>),
    TiledTopology(TiledTopology),
    Unknown { tag: u8, revision: u8, payload: Vec<u8> },
}

impl DataBlock {
    pub fn tag(&self) -> u8 {
        match self {
            DataBlock::ProductId(_) => TAG_PRODUCT_ID,
            DataBlock::DisplayParams(_) => TAG_DISPLAY_PARAMS,
            DataBlock::TypeITimings(_) => TAG_TYPE_I_TIMING,
            DataBlock::TypeIITimings(_) => TAG_TYPE_II_TIMING,
            DataBlock::TypeIIITimings(_) => TAG_TYPE_III_TIMING,
            DataBlock::TiledTopology(_) => TAG_TILED_TOPOLOGY,
            DataBlock::Unknown { tag, .. } => *tag,
        }
    }
}

/// Data block name for a DisplayID 1.x tag
pub fn data_block_name(tag: u8) -> &'static str {
    match tag {
        0x00 => "Product Identification Data Block",
        0x01 => "Display Parameters Data Block",
        0x02 => "Color Characteristics Data Block",
        0x03 => "Video Timing Modes Type 1 - Detailed Timings Data Block",
        0x04 => "Video Timing Modes Type 2 - Detailed Timings Data Block",
        0x05 => "Video Timing Modes Type 3 - Short Timings Data Block",
        0x06 => "Video Timing Modes Type 4 - DMT Timings Data Block",
        0x07 => "Supported Timing Modes Type 1 - VESA DMT Timings Data Block",
        0x08 => "Supported Timing Modes Type 2 - CTA-861 Timings Data Block",
        0x09 => "Video Timing Range Data Block",
        0x0A => "Product Serial Number Data Block",
        0x0B => "GP ASCII String Data Block",
        0x0C => "Display Device Data Data Block",
        0x0D => "Interface Power Sequencing Data Block",
        0x0E => "Transfer Characteristics Data Block",
        0x0F => "Display Interface Data Block",
        0x10 => "Stereo Display Interface Data Block",
        0x11 => "Video Timing Modes Type 5 - Short Timings Data Block",
        0x12 => "Tiled Display Topology Data Block",
        0x13 => "Video Timing Modes Type 6 - Detailed Timings Data Block",
        0x7F => "Vendor-Specific Data Block",
        0x81 => "CTA-861 DisplayID Data Block",
        _ => "Unknown DisplayID Data Block",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayId {
    pub version: u8,
    pub revision: u8,
    /// Product type (1.x) or primary use case (2.x)
    pub product_type: u8,
    pub extension_count: u8,
    pub data_blocks: Vec<DataBlock>,
}

impl DisplayId {
    /// Decode one section starting at its version byte.
    ///
    /// Inside an EDID extension this is everything after the 0x70 tag.
    pub fn parse(data: &[u8], scope: &mut Scope<'_>) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let version_byte = r.read_u8()?;
        let payload_len = usize::from(r.read_u8()?);
        let product_type = r.read_u8()?;
        let extension_count = r.read_u8()?;

        let version = version_byte >> 4;
        let revision = version_byte & 0x0F;
        if version != 1 && version != 2 {
            scope.fail(format!("Unsupported DisplayID version {}.{}", version, revision));
        }
        if payload_len > DISPLAYID_MAX_SECTION_PAYLOAD {
            scope.fail(format!(
                "Section payload length {} exceeds {} bytes",
                payload_len, DISPLAYID_MAX_SECTION_PAYLOAD
            ));
        }

        let payload = r.sub_reader(payload_len)?;
        r.read_u8()?;
        let section = &data[..r.position()];
        if section.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) != 0 {
            scope.fail("Invalid DisplayID section checksum");
        }

        let data_blocks = if version == 1 {
            parse_data_blocks(payload, scope)?
        } else {
            if version == 2 {
                scope.fail("DisplayID 2.x data blocks are not decoded");
            }
            parse_raw_data_blocks(payload, scope)?
        };

        debug!(
            version,
            revision,
            data_blocks = data_blocks.len(),
            "Decoded DisplayID section"
        );
        Ok(DisplayId {
            version,
            revision,
            product_type,
            extension_count,
            data_blocks,
        })
    }

    pub fn product_type_name(&self) -> &'static str {
        match (self.version, self.product_type) {
            (1, 0) => "Extension Section",
            (1, 1) => "Test Structure; test equipment only",
            (1, 2) => "Display panel or other transducer, LCD or PDP module, etc.",
            (1, 3) => "Standalone display device",
            (1, 4) => "Television receiver",
            (1, 5) => "Repeater/translator",
            (1, 6) => "DIRECT DRIVE monitor",
            (2, 0) => "Same primary use case as the base section",
            (2, 1) => "Test Structure; test equipment only",
            (2, 2) => "None of the listed primary use cases; generic display",
            (2, 3) => "Television (TV) display",
            (2, 4) => "Desktop productivity display",
            (2, 5) => "Desktop gaming display",
            (2, 6) => "Presentation display",
            (2, 7) => "Head-mounted Virtual Reality (VR) display",
            (2, 8) => "Head-mounted Augmented Reality (AR) display",
            _ => "Reserved",
        }
    }

    pub fn display_params(&self) -> Option<&DisplayParams> {
        self.data_blocks.iter().find_map(|b| match b {
            DataBlock::DisplayParams(p) => Some(p),
            _ => None,
        })
    }

    pub fn tiled_topology(&self) -> Option<&TiledTopology> {
        self.data_blocks.iter().find_map(|b| match b {
            DataBlock::TiledTopology(t) => Some(t),
            _ => None,
        })
    }
}

/// One data block header and payload, `None` once padding or an overrun
/// ends the walk.
fn next_data_block<'a>(
    r: &mut ByteReader<'a>,
    count: usize,
    scope: &mut Scope<'_>,
) -> Result<Option<(u8, u8, &'a [u8])>> {
    if r.is_empty() || r.rest().iter().all(|&b| b == 0) {
        return Ok(None);
    }
    if count >= DISPLAYID_MAX_DATA_BLOCKS {
        return Err(Error::TooManyDataBlocks {
            max: DISPLAYID_MAX_DATA_BLOCKS,
        });
    }

    let offset = r.position();
    let header = match r.read_array::<3>() {
        Ok(h) => h,
        Err(e) => {
            scope.fail(format!("Data block header at offset {} is truncated: {}", offset, e));
            return Ok(None);
        }
    };
    let [tag, revision, len] = header;
    match r.read_bytes(usize::from(len)) {
        Ok(payload) => Ok(Some((tag, revision, payload))),
        Err(e) => {
            scope.fail(format!(
                "{} at offset {} overruns the section: {}",
                data_block_name(tag),
                offset,
                e
            ));
            Ok(None)
        }
    }
}

fn parse_data_blocks(mut r: ByteReader<'_>, scope: &mut Scope<'_>) -> Result<Vec<DataBlock>> {
    let mut blocks = Vec::new();
    let mut count = 0;
    while let Some((tag, revision, body)) = next_data_block(&mut r, count, scope)? {
        count += 1;
        let block = match tag {
            TAG_PRODUCT_ID => parse_product_id(body, scope).map(DataBlock::ProductId),
            TAG_DISPLAY_PARAMS => parse_display_params(body, scope).map(DataBlock::DisplayParams),
            TAG_TYPE_I_TIMING => {
                let raw = timing_records(body, TYPE_I_TIMING_SIZE, DISPLAYID_MAX_TYPE_I_TIMINGS, "type I", scope)?;
                Some(DataBlock::TypeITimings(raw.map(parse_type_i_timing).collect::<Result<_>>()?))
            }
            TAG_TYPE_II_TIMING => {
                let raw = timing_records(body, TYPE_II_TIMING_SIZE, DISPLAYID_MAX_TYPE_II_TIMINGS, "type II", scope)?;
                Some(DataBlock::TypeIITimings(raw.map(parse_type_ii_timing).collect::<Result<_>>()?))
            }
            TAG_TYPE_III_TIMING => {
                let raw = timing_records(body, TYPE_III_TIMING_SIZE, DISPLAYID_MAX_TYPE_III_TIMINGS, "type III", scope)?;
                Some(DataBlock::TypeIIITimings(raw.map(parse_type_iii_timing).collect()))
            }
            TAG_TILED_TOPOLOGY => parse_tiled_topology(body, scope).map(DataBlock::TiledTopology),
            _ => Some(DataBlock::Unknown {
                tag,
                revision,
                payload: body.to_vec(),
            }),
        };
        blocks.extend(block);
    }
    Ok(blocks)
}

fn parse_raw_data_blocks(mut r: ByteReader<'_>, scope: &mut Scope<'_>) -> Result<Vec<DataBlock>> {
    let mut blocks = Vec::new();
    while let Some((tag, revision, body)) = next_data_block(&mut r, blocks.len(), scope)? {
        blocks.push(DataBlock::Unknown {
            tag,
            revision,
            payload: body.to_vec(),
        });
    }
    Ok(blocks)
}

/// Split a timing block into fixed-size records, enforcing the capacity
fn timing_records<'a>(
    body: &'a [u8],
    size: usize,
    max: usize,
    kind: &'static str,
    scope: &mut Scope<'_>,
) -> Result<std::slice::ChunksExact<'a, u8>> {
    let count = body.len() / size;
    if count > max {
        return Err(Error::TooManyTimings { kind, count, max });
    }
    if body.len() % size != 0 {
        scope.fail(format!(
            "Video timing {} block length {} is not a multiple of {}",
            kind,
            body.len(),
            size
        ));
    }
    Ok(body.chunks_exact(size))
}

fn stereo_from_bits(bits: u8) -> Stereo3d {
    match bits & 0x03 {
        0 => Stereo3d::Never,
        1 => Stereo3d::Always,
        2 => Stereo3d::User,
        _ => Stereo3d::Reserved,
    }
}

fn parse_type_i_timing(d: &[u8]) -> Result<Timing> {
    let mut r = ByteReader::new(d);
    let raw_clock = r.read_u24_le()?;
    let flags = r.read_u8()?;
    let mut le = || r.read_u16_le().map(u32::from);
    let horiz_active = le()? + 1;
    let horiz_blank = le()? + 1;
    let horiz_sync = le()?;
    let horiz_sync_width = le()? + 1;
    let vert_active = le()? + 1;
    let vert_blank = le()? + 1;
    let vert_sync = le()?;
    let vert_sync_width = le()? + 1;
    Ok(Timing {
        pixel_clock_hz: (u64::from(raw_clock) + 1) * 10_000,
        preferred: flags & 0x80 != 0,
        stereo_3d: stereo_from_bits(flags >> 5),
        interlaced: flags & 0x10 != 0,
        aspect_ratio: Some(AspectRatio::from_bits(flags)),
        horiz_active,
        horiz_blank,
        horiz_offset: (horiz_sync & 0x7FFF) + 1,
        horiz_sync_polarity: SyncPolarity::from_bit(horiz_sync & 0x8000 != 0),
        horiz_sync_width,
        vert_active,
        vert_blank,
        vert_offset: (vert_sync & 0x7FFF) + 1,
        vert_sync_polarity: SyncPolarity::from_bit(vert_sync & 0x8000 != 0),
        vert_sync_width,
    })
}

fn parse_type_ii_timing(d: &[u8]) -> Result<Timing> {
    let raw_clock = ByteReader::new(d).read_u24_le()?;
    let raw_hactive = u32::from(d[4]) | (u32::from(d[5] & 0x01) << 8);
    let raw_vactive = u32::from(d[7]) | (u32::from(d[8] & 0x0F) << 8);
    Ok(Timing {
        pixel_clock_hz: (u64::from(raw_clock) + 1) * 10_000,
        preferred: d[3] & 0x80 != 0,
        stereo_3d: stereo_from_bits(d[3] >> 5),
        interlaced: d[3] & 0x10 != 0,
        aspect_ratio: None,
        horiz_active: (raw_hactive + 1) * 8,
        horiz_blank: (u32::from(d[5] >> 1) + 1) * 8,
        horiz_offset: (u32::from(d[6] >> 4) + 1) * 8,
        horiz_sync_width: (u32::from(d[6] & 0x0F) + 1) * 8,
        horiz_sync_polarity: SyncPolarity::from_bit(d[3] & 0x08 != 0),
        vert_active: raw_vactive + 1,
        vert_blank: u32::from(d[9]) + 1,
        vert_offset: u32::from(d[10] >> 4) + 1,
        vert_sync_width: u32::from(d[10] & 0x0F) + 1,
        vert_sync_polarity: SyncPolarity::from_bit(d[3] & 0x04 != 0),
    })
}

fn parse_type_iii_timing(d: &[u8]) -> TypeIIITiming {
    TypeIIITiming {
        preferred: d[0] & 0x80 != 0,
        formula: match (d[0] >> 4) & 0x07 {
            0 => TimingFormula::CvtStandard,
            1 => TimingFormula::CvtReducedBlanking,
            other => TimingFormula::Reserved(other),
        },
        aspect_ratio: AspectRatio::from_bits(d[0]),
        horiz_active: (u16::from(d[1]) + 1) * 8,
        interlaced: d[2] & 0x80 != 0,
        refresh_hz: (d[2] & 0x7F) + 1,
    }
}

/// Three ASCII letters when printable, hex otherwise
fn vendor_string(id: &[u8]) -> String {
    if id.iter().all(|b| b.is_ascii_graphic()) {
        id.iter().map(|&b| char::from(b)).collect()
    } else {
        id.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

fn parse_product_id(body: &[u8], scope: &mut Scope<'_>) -> Option<ProductId> {
    if body.len() < PRODUCT_ID_MIN_SIZE {
        scope.fail(format!(
            "Product Identification Data Block length {} is shorter than {}",
            body.len(),
            PRODUCT_ID_MIN_SIZE
        ));
        return None;
    }
    let week = body[9];
    let year = 2000 + u16::from(body[10]);
    let name_len = usize::from(body[11]);
    let name_bytes = match body.get(PRODUCT_ID_MIN_SIZE..PRODUCT_ID_MIN_SIZE + name_len) {
        Some(b) => b,
        None => {
            scope.fail("Product Identification Data Block: product name overruns the block");
            &body[PRODUCT_ID_MIN_SIZE..]
        }
    };

    let (manufacture_week, manufacture_year, model_year) = match week {
        0xFF => (None, None, Some(year)),
        0 => (None, Some(year), None),
        1..=54 => (Some(week), Some(year), None),
        _ => {
            scope.fail(format!("Product Identification Data Block: invalid week {}", week));
            (None, Some(year), None)
        }
    };

    Some(ProductId {
        vendor: vendor_string(&body[0..3]),
        product_code: u16::from_le_bytes([body[3], body[4]]),
        serial: u32::from_le_bytes([body[5], body[6], body[7], body[8]]),
        manufacture_week,
        manufacture_year,
        model_year,
        name: name_bytes
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { char::from(b) } else { '.' })
            .collect(),
    })
}

fn parse_display_params(body: &[u8], scope: &mut Scope<'_>) -> Option<DisplayParams> {
    if body.len() != DISPLAY_PARAMS_SIZE {
        scope.fail(format!(
            "Display Parameters Data Block length {} is not {}",
            body.len(),
            DISPLAY_PARAMS_SIZE
        ));
        if body.len() < DISPLAY_PARAMS_SIZE {
            return None;
        }
    }
    let le = |i: usize| u16::from_le_bytes([body[i], body[i + 1]]);
    let f = body[8];
    Some(DisplayParams {
        horiz_image_mm: f32::from(le(0)) / 10.0,
        vert_image_mm: f32::from(le(2)) / 10.0,
        horiz_pixels: le(4),
        vert_pixels: le(6),
        features: DisplayParamsFeatures {
            audio: f & 0x80 != 0,
            separate_audio_inputs: f & 0x40 != 0,
            audio_input_override: f & 0x20 != 0,
            power_management: f & 0x10 != 0,
            fixed_timing: f & 0x08 != 0,
            fixed_pixel_format: f & 0x04 != 0,
            ai: f & 0x02 != 0,
            deinterlacing: f & 0x01 != 0,
        },
        gamma: match body[9] {
            0xFF => None,
            g => Some((f32::from(g) + 100.0) / 100.0),
        },
        aspect_ratio: (f32::from(body[10]) + 100.0) / 100.0,
        bits_per_color_overall: (body[11] >> 4) + 1,
        bits_per_color_native: (body[11] & 0x0F) + 1,
    })
}

fn tile_behavior(bits: u8) -> TileBehavior {
    match bits {
        0 => TileBehavior::Undefined,
        1 => TileBehavior::Location,
        2 => TileBehavior::Scale,
        3 => TileBehavior::Clone,
        other => TileBehavior::Reserved(other),
    }
}

fn parse_tiled_topology(body: &[u8], scope: &mut Scope<'_>) -> Option<TiledTopology> {
    if body.len() < TILED_TOPOLOGY_SIZE {
        scope.fail(format!(
            "Tiled Display Topology Data Block length {} is shorter than {}",
            body.len(),
            TILED_TOPOLOGY_SIZE
        ));
        return None;
    }

    let caps = body[0];
    let hi = body[3];
    let total_horiz_tiles = ((body[1] >> 4) | (((hi >> 6) & 0x03) << 4)) + 1;
    let total_vert_tiles = ((body[1] & 0x0F) | (((hi >> 4) & 0x03) << 4)) + 1;
    let horiz_tile_location = (body[2] >> 4) | (((hi >> 2) & 0x03) << 4);
    let vert_tile_location = (body[2] & 0x0F) | ((hi & 0x03) << 4);

    if horiz_tile_location >= total_horiz_tiles || vert_tile_location >= total_vert_tiles {
        scope.fail(format!(
            "Tile location ({}, {}) is outside the {}x{} grid",
            horiz_tile_location, vert_tile_location, total_horiz_tiles, total_vert_tiles
        ));
    }

    // bit 6 flags the bezel bytes as valid
    let multiplier = f32::from(body[8]);
    let bezel = (caps & 0x40 != 0).then(|| TileBezel {
        top_px: multiplier * f32::from(body[9]) / 10.0,
        bottom_px: multiplier * f32::from(body[10]) / 10.0,
        right_px: multiplier * f32::from(body[11]) / 10.0,
        left_px: multiplier * f32::from(body[12]) / 10.0,
    });

    Some(TiledTopology {
        single_enclosure: caps & 0x80 != 0,
        multi_tile_behavior: tile_behavior((caps >> 3) & 0x03),
        single_tile_behavior: tile_behavior(caps & 0x07),
        total_horiz_tiles,
        total_vert_tiles,
        horiz_tile_location,
        vert_tile_location,
        tile_width: u32::from(u16::from_le_bytes([body[4], body[5]])) + 1,
        tile_height: u32::from(u16::from_le_bytes([body[6], body[7]])) + 1,
        bezel,
        vendor: vendor_string(&body[13..16]),
        product_code: u16::from_le_bytes([body[16], body[17]]),
        serial: u32::from_le_bytes([body[18], body[19], body[20], body[21]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::testutil::displayid_section;

    fn parse(section: &[u8], diags: &mut Diagnostics) -> Result<DisplayId> {
        DisplayId::parse(section, &mut Scope::new(diags, Some(1), "DisplayID Extension Block"))
    }

    #[test]
    fn test_too_many_data_blocks_is_fatal() {
        // 84 empty GP ASCII string blocks, 252 bytes of payload
        let blocks: Vec<Vec<u8>> = (0..84).map(|_| vec![0x0B, 0x00, 0x00]).collect();
        let refs: Vec<&[u8]> = blocks.iter().map(|b| b.as_slice()).collect();
        let section = displayid_section(0x12, &refs);

        let mut diags = Diagnostics::new();
        let err = parse(&section, &mut diags).unwrap_err();
        assert!(matches!(err, Error::TooManyDataBlocks { max: 83 }));
        assert!(!err.is_block_local());
    }

    #[test]
    fn test_max_data_blocks_is_accepted() {
        let blocks: Vec<Vec<u8>> = (0..83).map(|_| vec![0x0B, 0x00, 0x00]).collect();
        let refs: Vec<&[u8]> = blocks.iter().map(|b| b.as_slice()).collect();
        let section = displayid_section(0x12, &refs);

        let mut diags = Diagnostics::new();
        let displayid = parse(&section, &mut diags).unwrap();
        assert_eq!(displayid.data_blocks.len(), 83);
    }

    #[test]
    fn test_too_many_type_iii_timings_is_fatal() {
        let mut block = vec![TAG_TYPE_III_TIMING, 0x00, 249];
        block.extend(std::iter::repeat([0x04, 0xEF, 0x3B]).take(83).flatten());
        let section = displayid_section(0x12, &[&block]);

        let err = parse(&section, &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyTimings { kind: "type III", count: 83, max: 82 }
        ));
    }

    #[test]
    fn test_type_i_timing() {
        // 1920x1080@60, 148.5 MHz, preferred, 16:9, +hsync +vsync
        let block = [
            TAG_TYPE_I_TIMING, 0x00, 20,
            0x01, 0x3A, 0x00, 0x84,
            0x7F, 0x07, 0x17, 0x01, 0x57, 0x80, 0x2B, 0x00,
            0x37, 0x04, 0x2C, 0x00, 0x03, 0x80, 0x04, 0x00,
        ];
        let section = displayid_section(0x12, &[&block]);
        let mut diags = Diagnostics::new();
        let displayid = parse(&section, &mut diags).unwrap();
        assert!(diags.is_empty(), "unexpected diagnostics:\n{}", diags);

        match &displayid.data_blocks[0] {
            DataBlock::TypeITimings(timings) => {
                let t = timings[0];
                assert_eq!(t.pixel_clock_hz, 148_500_000);
                assert!(t.preferred);
                assert_eq!(t.aspect_ratio, Some(AspectRatio::R16_9));
                assert_eq!((t.horiz_active, t.horiz_blank), (1920, 280));
                assert_eq!((t.horiz_offset, t.horiz_sync_width), (88, 44));
                assert_eq!(t.horiz_sync_polarity, SyncPolarity::Positive);
                assert_eq!((t.vert_active, t.vert_blank), (1080, 45));
                assert_eq!((t.vert_offset, t.vert_sync_width), (4, 5));
                assert_eq!(t.vert_sync_polarity, SyncPolarity::Positive);
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_type_iii_timing() {
        let block = [TAG_TYPE_III_TIMING, 0x00, 3, 0x94, 0xEF, 0x3B];
        let section = displayid_section(0x12, &[&block]);
        let displayid = parse(&section, &mut Diagnostics::new()).unwrap();
        match &displayid.data_blocks[0] {
            DataBlock::TypeIIITimings(timings) => {
                let t = timings[0];
                assert!(t.preferred);
                assert_eq!(t.formula, TimingFormula::CvtReducedBlanking);
                assert_eq!(t.aspect_ratio, AspectRatio::R16_9);
                assert_eq!(t.horiz_active, 1920);
                assert_eq!(t.refresh_hz, 60);
                assert!(!t.interlaced);
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_display_params_gamma() {
        let block = [
            TAG_DISPLAY_PARAMS, 0x00, 12,
            0x4C, 0x17, 0x2C, 0x0D, 0x00, 0x0F, 0x70, 0x08, 0x10, 0x78, 0x4E, 0x77,
        ];
        let section = displayid_section(0x12, &[&block]);
        let displayid = parse(&section, &mut Diagnostics::new()).unwrap();
        let p = displayid.display_params().unwrap();
        assert!((p.horiz_image_mm - 596.4).abs() < 0.01);
        assert_eq!((p.horiz_pixels, p.vert_pixels), (3840, 2160));
        assert!(p.features.power_management);
        assert!((p.gamma.unwrap() - 2.2).abs() < 0.001);
        assert_eq!((p.bits_per_color_overall, p.bits_per_color_native), (8, 8));
    }

    #[test]
    fn test_tiled_topology() {
        let mut block = vec![TAG_TILED_TOPOLOGY, 0x00, 22];
        block.extend_from_slice(&[
            0x82, // single enclosure, scale when alone
            0x10, // 2x1 tiles
            0x10, // location (1, 0)
            0x00,
            0xFF, 0x0E, 0x6F, 0x08, // 3840x2160 tiles
            0x00, 0x00, 0x00, 0x00, 0x00,
            b'A', b'C', b'M',
            0x34, 0x12,
            0x01, 0x00, 0x00, 0x00,
        ]);
        let section = displayid_section(0x12, &[&block]);
        let mut diags = Diagnostics::new();
        let displayid = parse(&section, &mut diags).unwrap();
        let t = displayid.tiled_topology().unwrap();
        assert!(t.single_enclosure);
        assert_eq!(t.single_tile_behavior, TileBehavior::Scale);
        assert_eq!((t.total_horiz_tiles, t.total_vert_tiles), (2, 1));
        assert_eq!((t.horiz_tile_location, t.vert_tile_location), (1, 0));
        assert_eq!((t.tile_width, t.tile_height), (3840, 2160));
        assert!(t.bezel.is_none());
        assert_eq!(t.vendor, "ACM");
        assert!(diags.is_empty(), "unexpected diagnostics:\n{}", diags);
    }

    fn tiled_block(caps: u8, bezel: [u8; 5]) -> Vec<u8> {
        let mut block = vec![TAG_TILED_TOPOLOGY, 0x00, 22, caps, 0x10, 0x10, 0x00, 0xFF, 0x0E, 0x6F, 0x08];
        block.extend_from_slice(&bezel);
        block.extend_from_slice(&[b'A', b'C', b'M', 0x34, 0x12, 0x01, 0x00, 0x00, 0x00]);
        block
    }

    #[test]
    fn test_tiled_bezel_follows_capability_bit() {
        // multiplier 10, top 2, bottom 4, right 6, left 8
        let bezel = [10, 2, 4, 6, 8];

        let section = displayid_section(0x12, &[&tiled_block(0xC2, bezel)]);
        let displayid = parse(&section, &mut Diagnostics::new()).unwrap();
        let b = displayid.tiled_topology().unwrap().bezel.unwrap();
        assert!((b.top_px - 2.0).abs() < 1e-4);
        assert!((b.bottom_px - 4.0).abs() < 1e-4);
        assert!((b.right_px - 6.0).abs() < 1e-4);
        assert!((b.left_px - 8.0).abs() < 1e-4);

        // same bytes without the capability bit are not bezel information
        let section = displayid_section(0x12, &[&tiled_block(0x82, bezel)]);
        let displayid = parse(&section, &mut Diagnostics::new()).unwrap();
        assert!(displayid.tiled_topology().unwrap().bezel.is_none());
    }

    #[test]
    fn test_overrun_is_soft() {
        let section = displayid_section(0x12, &[&[0x0B, 0x00, 0x10, 0x41]]);
        let mut diags = Diagnostics::new();
        let displayid = parse(&section, &mut diags).unwrap();
        assert!(displayid.data_blocks.is_empty());
        assert!(diags.contains("overruns the section"));
    }
}
