//! CTA-861 extension blocks
//!
//! A CTA block is a 4-byte header, a collection of tagged data blocks, then
//! detailed timing definitions from the offset given in byte 2 up to the
//! checksum.
//!
//! Each data block starts with one header byte: tag in bits 7-5, payload
//! length in bits 4-0. Tag 7 carries an extended tag as the first payload
//! byte.

use crate::detailed_timing::{DetailedTiming, DETAILED_TIMING_SIZE};
use crate::diagnostics::Scope;
use crate::edid::EDID_BLOCK_SIZE;
use crate::reader::ByteReader;
use crate::Result;
use serde::Serialize;
use tracing::debug;

pub const CTA_EXTENSION_TAG: u8 = 0x02;

/// First byte of the data block collection
const DATA_BLOCK_OFFSET: usize = 4;
/// Checksum byte, end of the DTD area
const DTD_END: usize = EDID_BLOCK_SIZE - 1;

pub const OUI_HDMI: u32 = 0x000C03;
pub const OUI_HDMI_FORUM: u32 = 0xC45DD8;
pub const OUI_HDR10_PLUS: u32 = 0x90848B;
pub const OUI_DOLBY: u32 = 0x00D046;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataBlockTag {
    Audio,
    Video,
    VendorSpecific,
    SpeakerAllocation,
    VesaDisplayTransferCharacteristic,
    VideoCapability,
    VendorVideo,
    VesaDisplayDevice,
    VesaVideoTiming,
    Colorimetry,
    HdrStaticMetadata,
    HdrDynamicMetadata,
    VideoFormatPreference,
    Ycbcr420Video,
    Ycbcr420CapabilityMap,
    VendorAudio,
    RoomConfiguration,
    SpeakerLocation,
    InfoFrame,
    Reserved(u8),
    ReservedExtended(u8),
}

impl DataBlockTag {
    fn from_short(tag: u8) -> Self {
        match tag {
            1 => DataBlockTag::Audio,
            2 => DataBlockTag::Video,
            3 => DataBlockTag::VendorSpecific,
            4 => DataBlockTag::SpeakerAllocation,
            5 => DataBlockTag::VesaDisplayTransferCharacteristic,
            other => DataBlockTag::Reserved(other),
        }
    }

    fn from_extended(tag: u8) -> Self {
        match tag {
            0 => DataBlockTag::VideoCapability,
            1 => DataBlockTag::VendorVideo,
            2 => DataBlockTag::VesaDisplayDevice,
            3 => DataBlockTag::VesaVideoTiming,
            5 => DataBlockTag::Colorimetry,
            6 => DataBlockTag::HdrStaticMetadata,
            7 => DataBlockTag::HdrDynamicMetadata,
            13 => DataBlockTag::VideoFormatPreference,
            14 => DataBlockTag::Ycbcr420Video,
            15 => DataBlockTag::Ycbcr420CapabilityMap,
            17 => DataBlockTag::VendorAudio,
            18 => DataBlockTag::RoomConfiguration,
            19 => DataBlockTag::SpeakerLocation,
            32 => DataBlockTag::InfoFrame,
            other => DataBlockTag::ReservedExtended(other),
        }
    }

    pub fn name(&self) -> String {
        let name = match self {
            DataBlockTag::Audio => "Audio Data Block",
            DataBlockTag::Video => "Video Data Block",
            DataBlockTag::VendorSpecific => "Vendor-Specific Data Block",
            DataBlockTag::SpeakerAllocation => "Speaker Allocation Data Block",
            DataBlockTag::VesaDisplayTransferCharacteristic => {
                "VESA Display Transfer Characteristics Data Block"
            }
            DataBlockTag::VideoCapability => "Video Capability Data Block",
            DataBlockTag::VendorVideo => "Vendor-Specific Video Data Block",
            DataBlockTag::VesaDisplayDevice => "VESA Video Display Device Data Block",
            DataBlockTag::VesaVideoTiming => "VESA Video Timing Block Extension",
            DataBlockTag::Colorimetry => "Colorimetry Data Block",
            DataBlockTag::HdrStaticMetadata => "HDR Static Metadata Data Block",
            DataBlockTag::HdrDynamicMetadata => "HDR Dynamic Metadata Data Block",
            DataBlockTag::VideoFormatPreference => "Video Format Preference Data Block",
            DataBlockTag::Ycbcr420Video => "YCbCr 4:2:0 Video Data Block",
            DataBlockTag::Ycbcr420CapabilityMap => "YCbCr 4:2:0 Capability Map Data Block",
            DataBlockTag::VendorAudio => "Vendor-Specific Audio Data Block",
            DataBlockTag::RoomConfiguration => "Room Configuration Data Block",
            DataBlockTag::SpeakerLocation => "Speaker Location Data Block",
            DataBlockTag::InfoFrame => "InfoFrame Data Block",
            DataBlockTag::Reserved(t) => return format!("Reserved Data Block (tag {})", t),
            DataBlockTag::ReservedExtended(t) => {
                return format!("Reserved Extended Data Block (extended tag {})", t)
            }
        };
        name.to_string()
    }

    /// Tags that may legitimately appear more than once per extension.
    /// All other tags are looked up first-match.
    pub fn allows_multiple(&self) -> bool {
        matches!(
            self,
            DataBlockTag::Audio
                | DataBlockTag::Video
                | DataBlockTag::VendorSpecific
                | DataBlockTag::VendorVideo
                | DataBlockTag::VendorAudio
                | DataBlockTag::Ycbcr420Video
                | DataBlockTag::InfoFrame
                | DataBlockTag::HdrDynamicMetadata
                | DataBlockTag::Reserved(_)
                | DataBlockTag::ReservedExtended(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioFormat {
    Lpcm,
    Ac3,
    Mpeg1,
    Mp3,
    Mpeg2,
    AacLc,
    Dts,
    Atrac,
    OneBitAudio,
    EnhancedAc3,
    DtsHd,
    Mat,
    Dst,
    WmaPro,
    Extended,
    Reserved,
}

impl AudioFormat {
    fn from_code(code: u8) -> Self {
        match code {
            1 => AudioFormat::Lpcm,
            2 => AudioFormat::Ac3,
            3 => AudioFormat::Mpeg1,
            4 => AudioFormat::Mp3,
            5 => AudioFormat::Mpeg2,
            6 => AudioFormat::AacLc,
            7 => AudioFormat::Dts,
            8 => AudioFormat::Atrac,
            9 => AudioFormat::OneBitAudio,
            10 => AudioFormat::EnhancedAc3,
            11 => AudioFormat::DtsHd,
            12 => AudioFormat::Mat,
            13 => AudioFormat::Dst,
            14 => AudioFormat::WmaPro,
            15 => AudioFormat::Extended,
            _ => AudioFormat::Reserved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortAudioDescriptor {
    pub format: AudioFormat,
    pub max_channels: u8,
    pub sample_rates_hz: Vec<u32>,
    /// LPCM only
    pub lpcm_bit_depths: Vec<u8>,
    /// Compressed formats 2-8 only
    pub max_bitrate_kbs: Option<u32>,
}

const SAMPLE_RATES_HZ: [u32; 7] = [32_000, 44_100, 48_000, 88_200, 96_000, 176_400, 192_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShortVideoDescriptor {
    pub vic: u8,
    pub native: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorSpecific {
    /// IEEE OUI, in the usual big-endian notation
    pub oui: u32,
    pub payload: Vec<u8>,
}

impl VendorSpecific {
    pub fn vendor_name(&self) -> Option<&'static str> {
        match self.oui {
            OUI_HDMI => Some("HDMI"),
            OUI_HDMI_FORUM => Some("HDMI Forum"),
            OUI_HDR10_PLUS => Some("HDR10+"),
            OUI_DOLBY => Some("Dolby"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SpeakerAllocation {
    pub flw_frw: bool,
    pub rlc_rrc: bool,
    pub flc_frc: bool,
    pub bc: bool,
    pub bl_br: bool,
    pub fc: bool,
    pub lfe1: bool,
    pub fl_fr: bool,
    pub tpsil_tpsir: bool,
    pub sil_sir: bool,
    pub tpbc: bool,
    pub lfe2: bool,
    pub ls_rs: bool,
    pub tpfc: bool,
    pub tpc: bool,
    pub tpfl_tpfr: bool,
    pub btfl_btfr: bool,
    pub btfc: bool,
    pub tpbl_tpbr: bool,
    pub tpls_tprs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverscanBehavior {
    Unsupported,
    AlwaysOverscanned,
    AlwaysUnderscanned,
    Both,
}

impl OverscanBehavior {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => OverscanBehavior::Unsupported,
            1 => OverscanBehavior::AlwaysOverscanned,
            2 => OverscanBehavior::AlwaysUnderscanned,
            _ => OverscanBehavior::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoCapability {
    pub ycc_quantization_selectable: bool,
    pub rgb_quantization_selectable: bool,
    pub pt_overscan: OverscanBehavior,
    pub it_overscan: OverscanBehavior,
    pub ce_overscan: OverscanBehavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Colorimetry {
    pub xvycc_601: bool,
    pub xvycc_709: bool,
    pub sycc_601: bool,
    pub opycc_601: bool,
    pub oprgb: bool,
    pub bt2020_cycc: bool,
    pub bt2020_ycc: bool,
    pub bt2020_rgb: bool,
    /// DCI-P3
    pub st2113_rgb: bool,
    pub ictcp: bool,
    /// Gamut metadata profiles MD0-MD3
    pub gamut_metadata: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Eotfs {
    pub traditional_sdr: bool,
    pub traditional_hdr: bool,
    pub pq: bool,
    pub hlg: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HdrStaticMetadata {
    pub eotfs: Eotfs,
    pub type1: bool,
    /// cd/m², `None` when absent or zero
    pub desired_content_max_luminance: Option<f32>,
    pub desired_content_max_frame_avg_luminance: Option<f32>,
    pub desired_content_min_luminance: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ycbcr420CapabilityMap {
    /// Empty bitmap: every SVD supports 4:2:0
    pub bitmap: Vec<u8>,
}

impl Ycbcr420CapabilityMap {
    /// Whether the SVD at `index` in the video data blocks supports 4:2:0
    pub fn supports(&self, index: usize) -> bool {
        if self.bitmap.is_empty() {
            return true;
        }
        self.bitmap
            .get(index / 8)
            .map_or(false, |b| b & (1 << (index % 8)) != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataBlock {
    Audio(Vec<ShortAudioDescriptor>),
    Video(Vec<ShortVideoDescriptor>),
    VendorSpecific(VendorSpecific),
    SpeakerAllocation(SpeakerAllocation),
    VideoCapability(VideoCapability),
    Colorimetry(Colorimetry),
    HdrStaticMetadata(HdrStaticMetadata),
    Ycbcr420Video(Vec<ShortVideoDescriptor>),
    Ycbcr420CapabilityMap(Ycbcr420CapabilityMap),
    /// Recognized or reserved tag kept undecoded
    Raw { tag: DataBlockTag, payload: Vec<u8> },
}

impl DataBlock {
    pub fn tag(&self) -> DataBlockTag {
        match self {
            DataBlock::Audio(_) => DataBlockTag::Audio,
            DataBlock::Video(_) => DataBlockTag::Video,
            DataBlock::VendorSpecific(_) => DataBlockTag::VendorSpecific,
            DataBlock::SpeakerAllocation(_) => DataBlockTag::SpeakerAllocation,
            DataBlock::VideoCapability(_) => DataBlockTag::VideoCapability,
            DataBlock::Colorimetry(_) => DataBlockTag::Colorimetry,
            DataBlock::HdrStaticMetadata(_) => DataBlockTag::HdrStaticMetadata,
            DataBlock::Ycbcr420Video(_) => DataBlockTag::Ycbcr420Video,
            DataBlock::Ycbcr420CapabilityMap(_) => DataBlockTag::Ycbcr420CapabilityMap,
            DataBlock::Raw { tag, .. } => *tag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CtaFlags {
    pub it_underscan: bool,
    pub basic_audio: bool,
    pub ycc444: bool,
    pub ycc422: bool,
    pub native_dtds: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cta {
    pub revision: u8,
    pub flags: CtaFlags,
    pub data_blocks: Vec<DataBlock>,
    pub detailed_timings: Vec<DetailedTiming>,
}

impl Cta {
    pub fn parse(block: &[u8; EDID_BLOCK_SIZE], scope: &mut Scope<'_>) -> Result<Self> {
        let mut r = ByteReader::new(&block[..DTD_END]);
        r.skip(1)?;
        let revision = r.read_u8()?;
        let dtd_offset = usize::from(r.read_u8()?);
        let raw_flags = r.read_u8()?;

        if revision == 0 || revision > 3 {
            scope.fail(format!("Unknown CTA-861 revision {}", revision));
        }
        let flags = if revision >= 2 {
            CtaFlags {
                it_underscan: raw_flags & 0x80 != 0,
                basic_audio: raw_flags & 0x40 != 0,
                ycc444: raw_flags & 0x20 != 0,
                ycc422: raw_flags & 0x10 != 0,
                native_dtds: raw_flags & 0x0F,
            }
        } else {
            if raw_flags != 0 {
                scope.fail("Byte 3 must be zero for CTA-861 revision 1");
            }
            CtaFlags::default()
        };

        let mut cta = Cta {
            revision,
            flags,
            data_blocks: Vec::new(),
            detailed_timings: Vec::new(),
        };

        if dtd_offset == 0 {
            return Ok(cta);
        }
        let dtd_offset = if dtd_offset < DATA_BLOCK_OFFSET || dtd_offset > DTD_END {
            scope.fail(format!("Invalid detailed timing offset {}", dtd_offset));
            dtd_offset.clamp(DATA_BLOCK_OFFSET, DTD_END)
        } else {
            dtd_offset
        };

        if dtd_offset > DATA_BLOCK_OFFSET {
            if revision < 3 {
                scope.fail("Data block collection present before CTA-861 revision 3");
            } else {
                let mut blocks = ByteReader::new(&block[DATA_BLOCK_OFFSET..dtd_offset]);
                cta.data_blocks = parse_data_block_collection(&mut blocks, scope);
                report_duplicates(&cta.data_blocks, scope);
            }
        }

        let mut dtds = ByteReader::new(&block[dtd_offset..DTD_END]);
        while dtds.remaining() >= DETAILED_TIMING_SIZE {
            let raw = dtds.read_array::<DETAILED_TIMING_SIZE>()?;
            if raw[0] == 0 && raw[1] == 0 {
                break;
            }
            cta.detailed_timings.push(DetailedTiming::parse(&raw, scope));
        }

        debug!(
            revision,
            data_blocks = cta.data_blocks.len(),
            detailed_timings = cta.detailed_timings.len(),
            "Decoded CTA-861 extension"
        );
        Ok(cta)
    }

    /// First data block with `tag`.
    ///
    /// Tags that must appear at most once resolve to their first occurrence;
    /// later duplicates are never consulted.
    pub fn find(&self, tag: DataBlockTag) -> Option<&DataBlock> {
        self.data_blocks.iter().find(|b| b.tag() == tag)
    }

    pub fn colorimetry(&self) -> Option<&Colorimetry> {
        match self.find(DataBlockTag::Colorimetry)? {
            DataBlock::Colorimetry(c) => Some(c),
            _ => None,
        }
    }

    pub fn hdr_static_metadata(&self) -> Option<&HdrStaticMetadata> {
        match self.find(DataBlockTag::HdrStaticMetadata)? {
            DataBlock::HdrStaticMetadata(m) => Some(m),
            _ => None,
        }
    }

    /// All SVDs from every video data block, in order
    pub fn svds(&self) -> impl Iterator<Item = &ShortVideoDescriptor> {
        self.data_blocks.iter().flat_map(|b| match b {
            DataBlock::Video(svds) => svds.as_slice(),
            _ => &[][..],
        })
    }
}

/// Walk the TLV sequence. A block whose declared length runs past the
/// collection ends the walk; blocks decoded so far are kept.
fn parse_data_block_collection(r: &mut ByteReader<'_>, scope: &mut Scope<'_>) -> Vec<DataBlock> {
    let mut blocks = Vec::new();
    while !r.is_empty() {
        let offset = DATA_BLOCK_OFFSET + r.position();
        let header = match r.read_u8() {
            Ok(h) => h,
            Err(_) => break,
        };
        let len = usize::from(header & 0x1F);
        let payload = match r.read_bytes(len) {
            Ok(p) => p,
            Err(e) => {
                scope.fail(format!(
                    "Data block at offset {} overruns the data block collection: {}",
                    offset, e
                ));
                break;
            }
        };

        let block = match header >> 5 {
            7 => match payload.split_first() {
                Some((&ext_tag, rest)) => parse_extended_data_block(ext_tag, rest, scope),
                None => {
                    scope.fail("Extended tag data block has no extended tag");
                    None
                }
            },
            tag => parse_data_block(tag, payload, scope),
        };
        blocks.extend(block);
    }
    blocks
}

fn parse_data_block(tag: u8, payload: &[u8], scope: &mut Scope<'_>) -> Option<DataBlock> {
    let tag = DataBlockTag::from_short(tag);
    match tag {
        DataBlockTag::Audio => parse_audio(payload, scope).map(DataBlock::Audio),
        DataBlockTag::Video => Some(DataBlock::Video(parse_svds(payload, scope))),
        DataBlockTag::VendorSpecific => {
            if payload.len() < 3 {
                scope.fail("Vendor-Specific Data Block is too short for an OUI");
                return None;
            }
            Some(DataBlock::VendorSpecific(VendorSpecific {
                oui: u32::from_le_bytes([payload[0], payload[1], payload[2], 0]),
                payload: payload[3..].to_vec(),
            }))
        }
        DataBlockTag::SpeakerAllocation => parse_speaker_allocation(payload, scope).map(DataBlock::SpeakerAllocation),
        _ => {
            if let DataBlockTag::Reserved(t) = tag {
                scope.fail(format!("Unknown CTA-861 data block tag {}", t));
            }
            Some(DataBlock::Raw {
                tag,
                payload: payload.to_vec(),
            })
        }
    }
}

fn parse_extended_data_block(ext_tag: u8, payload: &[u8], scope: &mut Scope<'_>) -> Option<DataBlock> {
    let tag = DataBlockTag::from_extended(ext_tag);
    match tag {
        DataBlockTag::VideoCapability => {
            let Some(&b) = payload.first() else {
                scope.fail("Video Capability Data Block is empty");
                return None;
            };
            Some(DataBlock::VideoCapability(VideoCapability {
                ycc_quantization_selectable: b & 0x80 != 0,
                rgb_quantization_selectable: b & 0x40 != 0,
                pt_overscan: OverscanBehavior::from_bits(b >> 4),
                it_overscan: OverscanBehavior::from_bits(b >> 2),
                ce_overscan: OverscanBehavior::from_bits(b),
            }))
        }
        DataBlockTag::Colorimetry => parse_colorimetry(payload, scope).map(DataBlock::Colorimetry),
        DataBlockTag::HdrStaticMetadata => parse_hdr_static_metadata(payload, scope).map(DataBlock::HdrStaticMetadata),
        DataBlockTag::Ycbcr420Video => Some(DataBlock::Ycbcr420Video(parse_svds(payload, scope))),
        DataBlockTag::Ycbcr420CapabilityMap => Some(DataBlock::Ycbcr420CapabilityMap(Ycbcr420CapabilityMap {
            bitmap: payload.to_vec(),
        })),
        _ => {
            if let DataBlockTag::ReservedExtended(t) = tag {
                scope.fail(format!("Unknown CTA-861 extended data block tag {}", t));
            }
            Some(DataBlock::Raw {
                tag,
                payload: payload.to_vec(),
            })
        }
    }
}

fn parse_audio(payload: &[u8], scope: &mut Scope<'_>) -> Option<Vec<ShortAudioDescriptor>> {
    if payload.is_empty() || payload.len() % 3 != 0 {
        scope.fail(format!(
            "Audio Data Block length {} is not a non-zero multiple of 3",
            payload.len()
        ));
        if payload.len() < 3 {
            return None;
        }
    }

    let sads = payload
        .chunks_exact(3)
        .map(|sad| {
            let code = (sad[0] >> 3) & 0x0F;
            let format = AudioFormat::from_code(code);
            let sample_rates_hz = SAMPLE_RATES_HZ
                .iter()
                .enumerate()
                .filter(|(i, _)| sad[1] & (1 << i) != 0)
                .map(|(_, &hz)| hz)
                .collect();
            let (lpcm_bit_depths, max_bitrate_kbs) = match code {
                1 => {
                    let depths = [16u8, 20, 24]
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| sad[2] & (1 << i) != 0)
                        .map(|(_, &d)| d)
                        .collect();
                    (depths, None)
                }
                2..=8 => (Vec::new(), Some(u32::from(sad[2]) * 8)),
                _ => (Vec::new(), None),
            };
            ShortAudioDescriptor {
                format,
                max_channels: (sad[0] & 0x07) + 1,
                sample_rates_hz,
                lpcm_bit_depths,
                max_bitrate_kbs,
            }
        })
        .collect();
    Some(sads)
}

fn parse_svds(payload: &[u8], scope: &mut Scope<'_>) -> Vec<ShortVideoDescriptor> {
    payload
        .iter()
        .filter_map(|&b| match b {
            1..=64 => Some(ShortVideoDescriptor { vic: b, native: false }),
            129..=192 => Some(ShortVideoDescriptor {
                vic: b & 0x7F,
                native: true,
            }),
            65..=127 | 193..=253 => Some(ShortVideoDescriptor { vic: b, native: false }),
            _ => {
                scope.fail(format!("Reserved short video descriptor 0x{:02X}", b));
                None
            }
        })
        .collect()
}

fn parse_speaker_allocation(payload: &[u8], scope: &mut Scope<'_>) -> Option<SpeakerAllocation> {
    if payload.len() < 3 {
        scope.fail("Speaker Allocation Data Block is shorter than 3 bytes");
        return None;
    }
    let (a, b, c) = (payload[0], payload[1], payload[2]);
    Some(SpeakerAllocation {
        flw_frw: a & 0x80 != 0,
        rlc_rrc: a & 0x40 != 0,
        flc_frc: a & 0x20 != 0,
        bc: a & 0x10 != 0,
        bl_br: a & 0x08 != 0,
        fc: a & 0x04 != 0,
        lfe1: a & 0x02 != 0,
        fl_fr: a & 0x01 != 0,
        tpsil_tpsir: b & 0x80 != 0,
        sil_sir: b & 0x40 != 0,
        tpbc: b & 0x20 != 0,
        lfe2: b & 0x10 != 0,
        ls_rs: b & 0x08 != 0,
        tpfc: b & 0x04 != 0,
        tpc: b & 0x02 != 0,
        tpfl_tpfr: b & 0x01 != 0,
        btfl_btfr: c & 0x08 != 0,
        btfc: c & 0x04 != 0,
        tpbl_tpbr: c & 0x02 != 0,
        tpls_tprs: c & 0x01 != 0,
    })
}

fn parse_colorimetry(payload: &[u8], scope: &mut Scope<'_>) -> Option<Colorimetry> {
    if payload.len() < 2 {
        scope.fail("Colorimetry Data Block is shorter than 2 bytes");
        return None;
    }
    let (a, b) = (payload[0], payload[1]);
    Some(Colorimetry {
        xvycc_601: a & 0x01 != 0,
        xvycc_709: a & 0x02 != 0,
        sycc_601: a & 0x04 != 0,
        opycc_601: a & 0x08 != 0,
        oprgb: a & 0x10 != 0,
        bt2020_cycc: a & 0x20 != 0,
        bt2020_ycc: a & 0x40 != 0,
        bt2020_rgb: a & 0x80 != 0,
        st2113_rgb: b & 0x80 != 0,
        ictcp: b & 0x40 != 0,
        gamut_metadata: b & 0x0F,
    })
}

/// EOTF byte, descriptor byte, then up to three optional luminance code
/// values whose presence follows from the payload length.
fn parse_hdr_static_metadata(payload: &[u8], scope: &mut Scope<'_>) -> Option<HdrStaticMetadata> {
    if payload.len() < 2 {
        scope.fail("HDR Static Metadata Data Block is shorter than 2 bytes");
        return None;
    }
    let eotf = payload[0];
    if eotf & 0xF0 != 0 {
        scope.fail("HDR Static Metadata Data Block: reserved EOTF bits set");
    }

    let code = |i: usize| payload.get(i).copied().filter(|&v| v != 0);
    let max_luminance = code(2).map(|v| 50.0 * 2f32.powf(f32::from(v) / 32.0));
    let max_frame_avg = code(3).map(|v| 50.0 * 2f32.powf(f32::from(v) / 32.0));
    let min_luminance = code(4).and_then(|v| {
        let min = max_luminance.map(|max| max * (f32::from(v) / 255.0).powi(2) / 100.0);
        if min.is_none() {
            scope.fail("HDR Static Metadata Data Block: min luminance given without max luminance");
        }
        min
    });

    Some(HdrStaticMetadata {
        eotfs: Eotfs {
            traditional_sdr: eotf & 0x01 != 0,
            traditional_hdr: eotf & 0x02 != 0,
            pq: eotf & 0x04 != 0,
            hlg: eotf & 0x08 != 0,
        },
        type1: payload[1] & 0x01 != 0,
        desired_content_max_luminance: max_luminance,
        desired_content_max_frame_avg_luminance: max_frame_avg,
        desired_content_min_luminance: min_luminance,
    })
}

fn report_duplicates(blocks: &[DataBlock], scope: &mut Scope<'_>) {
    let mut seen: Vec<DataBlockTag> = Vec::new();
    for block in blocks {
        let tag = block.tag();
        if tag.allows_multiple() {
            continue;
        }
        if seen.contains(&tag) {
            scope.fail(format!(
                "{} appears more than once, only the first is used",
                tag.name()
            ));
        } else {
            seen.push(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::testutil::cta_block;

    fn parse(block: &[u8; EDID_BLOCK_SIZE], diags: &mut Diagnostics) -> Cta {
        Cta::parse(block, &mut Scope::new(diags, Some(1), "CTA-861 Extension Block")).unwrap()
    }

    #[test]
    fn test_duplicate_colorimetry_first_wins() {
        let block = cta_block(&[
            &[0xE3, 0x05, 0x80, 0x00], // BT.2020 RGB
            &[0xE3, 0x05, 0x01, 0x40], // xvYCC601 + ICtCp
        ]);
        let mut diags = Diagnostics::new();
        let cta = parse(&block, &mut diags);

        assert_eq!(cta.data_blocks.len(), 2);
        let c = cta.colorimetry().unwrap();
        assert!(c.bt2020_rgb);
        assert!(!c.xvycc_601);
        assert!(!c.ictcp);
        assert!(diags.contains("Colorimetry Data Block appears more than once"));
    }

    #[test]
    fn test_repeatable_blocks_are_quiet() {
        let block = cta_block(&[&[0x42, 0x90, 0x04], &[0x41, 0x10]]);
        let mut diags = Diagnostics::new();
        let cta = parse(&block, &mut diags);
        let svds: Vec<_> = cta.svds().map(|s| (s.vic, s.native)).collect();
        assert_eq!(svds, vec![(16, true), (4, false), (16, false)]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_hdr_static_metadata_optional_bytes() {
        let block = cta_block(&[&[0xE3, 0x06, 0x05, 0x01], &[0xE5, 0x06, 0x0D, 0x01, 0x60, 0x00]]);
        let mut diags = Diagnostics::new();
        let cta = parse(&block, &mut diags);

        let m = cta.hdr_static_metadata().unwrap();
        assert!(m.eotfs.traditional_sdr);
        assert!(m.eotfs.pq);
        assert!(!m.eotfs.hlg);
        assert!(m.type1);
        assert_eq!(m.desired_content_max_luminance, None);
    }

    #[test]
    fn test_hdr_min_luminance_needs_max() {
        let block = cta_block(&[&[0xE6, 0x06, 0x05, 0x01, 0x00, 0x00, 0x40]]);
        let mut diags = Diagnostics::new();
        let cta = parse(&block, &mut diags);
        let m = cta.hdr_static_metadata().unwrap();
        assert_eq!(m.desired_content_max_luminance, None);
        assert_eq!(m.desired_content_min_luminance, None);
        assert!(diags.contains("min luminance given without max luminance"));
    }

    #[test]
    fn test_hdr_static_metadata_luminance() {
        let block = cta_block(&[&[0xE6, 0x06, 0x0D, 0x01, 0x60, 0x40, 0x80]]);
        let cta = parse(&block, &mut Diagnostics::new());
        let m = cta.hdr_static_metadata().unwrap();
        assert!(m.eotfs.hlg);
        // 50 * 2^(96/32) = 400 cd/m²
        assert!((m.desired_content_max_luminance.unwrap() - 400.0).abs() < 0.01);
        assert!((m.desired_content_max_frame_avg_luminance.unwrap() - 200.0).abs() < 0.01);
        let min = m.desired_content_min_luminance.unwrap();
        assert!((min - 400.0 * (128.0f32 / 255.0).powi(2) / 100.0).abs() < 0.001);
    }

    #[test]
    fn test_audio_and_vendor_blocks() {
        let block = cta_block(&[
            &[0x23, 0x09, 0x07, 0x07],       // LPCM 2ch, 32/44.1/48 kHz, 16/20/24 bit
            &[0x65, 0x03, 0x0C, 0x00, 0x10, 0x00], // HDMI VSDB, physical address 1.0.0.0
            &[0x83, 0x01, 0x00, 0x00],       // FL/FR
        ]);
        let mut diags = Diagnostics::new();
        let cta = parse(&block, &mut diags);
        assert!(diags.is_empty(), "unexpected diagnostics:\n{}", diags);

        match &cta.data_blocks[0] {
            DataBlock::Audio(sads) => {
                assert_eq!(sads.len(), 1);
                assert_eq!(sads[0].format, AudioFormat::Lpcm);
                assert_eq!(sads[0].max_channels, 2);
                assert_eq!(sads[0].sample_rates_hz, vec![32_000, 44_100, 48_000]);
                assert_eq!(sads[0].lpcm_bit_depths, vec![16, 20, 24]);
            }
            other => panic!("unexpected block {:?}", other),
        }
        match &cta.data_blocks[1] {
            DataBlock::VendorSpecific(v) => {
                assert_eq!(v.oui, OUI_HDMI);
                assert_eq!(v.vendor_name(), Some("HDMI"));
                assert_eq!(v.payload, vec![0x10, 0x00]);
            }
            other => panic!("unexpected block {:?}", other),
        }
        assert!(matches!(
            cta.data_blocks[2],
            DataBlock::SpeakerAllocation(SpeakerAllocation { fl_fr: true, .. })
        ));
    }

    #[test]
    fn test_overrun_keeps_earlier_blocks() {
        // second block claims 31 bytes but the collection ends first
        let block = cta_block(&[&[0x41, 0x10], &[0x5F, 0x01]]);
        let mut diags = Diagnostics::new();
        let cta = parse(&block, &mut diags);
        assert_eq!(cta.data_blocks.len(), 1);
        assert!(diags.contains("overruns"));
    }

    #[test]
    fn test_ycbcr420_capability_map() {
        let map = Ycbcr420CapabilityMap { bitmap: vec![0b0000_0101] };
        assert!(map.supports(0));
        assert!(!map.supports(1));
        assert!(map.supports(2));
        assert!(!map.supports(9));
        assert!(Ycbcr420CapabilityMap { bitmap: vec![] }.supports(42));
    }

    #[test]
    fn test_trailing_detailed_timings() {
        let mut block = cta_block(&[&[0x41, 0x10]]);
        let dtd = [
            0x01, 0x1D, 0x00, 0x72, 0x51, 0xD0, 0x1E, 0x20, 0x6E, 0x28, 0x55, 0x00, 0x0F, 0x48,
            0x42, 0x00, 0x00, 0x1E,
        ];
        block[6..24].copy_from_slice(&dtd);
        crate::testutil::finish_block(&mut block);
        let cta = parse(&block, &mut Diagnostics::new());
        assert_eq!(cta.detailed_timings.len(), 1);
        assert_eq!(cta.detailed_timings[0].horiz_video, 1280);
        assert_eq!(cta.detailed_timings[0].vert_video, 720);
    }
}
