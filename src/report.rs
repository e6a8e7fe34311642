//! Human-readable dump in the layout of `di-edid-decode`

use crate::cta::{Cta, DataBlock as CtaDataBlock, OverscanBehavior, SpeakerAllocation};
use crate::descriptor::{Descriptor, RangeLimitsKind};
use crate::detailed_timing::{DetailedTiming, StereoMode, SyncPolarity, SyncSignal};
use crate::displayid::{self, DataBlock as DisplayIdDataBlock, DisplayId, TileBehavior, TimingFormula};
use crate::edid::{DigitalInterface, Edid, StandardTiming, VideoInput};
use crate::extension::{Extension, RawExtension};
use crate::info::{DerivedInfo, Info};
use std::fmt;

const HIDDEN: &str = "...";

/// Switches for the text report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Print "..." instead of serial numbers
    pub hide_serial_numbers: bool,
    /// Also print raw payloads of undecoded blocks and rarely used fields
    pub uncommon_features: bool,
    pub show_diagnostics: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            hide_serial_numbers: false,
            uncommon_features: false,
            show_diagnostics: true,
        }
    }
}

/// Renders an [`Info`] through `Display`
pub struct Report<'a> {
    info: &'a Info,
    opts: ReportOptions,
}

impl<'a> Report<'a> {
    pub fn new(info: &'a Info, opts: ReportOptions) -> Self {
        Self { info, opts }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edid = &self.info.edid;
        let mut dtd_counter = 0;

        write_base_block(f, edid, &self.opts, &mut dtd_counter)?;
        for (i, ext) in edid.extensions.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Block {}, {}:", i + 1, ext.tag().name())?;
            match ext {
                Extension::Cta(cta) => write_cta(f, cta, &self.opts, &mut dtd_counter)?,
                Extension::DisplayId(d) => write_displayid(f, d, &self.opts)?,
                Extension::Opaque(raw) => write_opaque(f, raw, &self.opts)?,
            }
        }

        writeln!(f)?;
        write_derived(f, &self.info.derived, &self.opts)?;

        if self.opts.show_diagnostics && !self.info.diagnostics.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            writeln!(f)?;
            write!(f, "{}", self.info.diagnostics)?;
        }
        Ok(())
    }
}

/// Convenience wrapper around [`Report`]
pub fn render(info: &Info, opts: &ReportOptions) -> String {
    Report::new(info, *opts).to_string()
}

fn hex_lines(bytes: &[u8], indent: &str) -> String {
    bytes
        .chunks(16)
        .map(|chunk| {
            let line: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{}{}\n", indent, line.join(" "))
        })
        .collect()
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

fn write_base_block(
    f: &mut fmt::Formatter<'_>,
    edid: &Edid,
    opts: &ReportOptions,
    dtd_counter: &mut usize,
) -> fmt::Result {
    writeln!(f, "Block 0, Base EDID:")?;
    writeln!(f, "  EDID Structure Version & Revision: {}.{}", edid.version, edid.revision)?;

    let vp = &edid.vendor_product;
    writeln!(f, "  Vendor & Product Identification:")?;
    writeln!(f, "    Manufacturer: {}", vp.manufacturer)?;
    writeln!(f, "    Model: {}", vp.product)?;
    if vp.serial != 0 {
        if opts.hide_serial_numbers {
            writeln!(f, "    Serial Number: {}", HIDDEN)?;
        } else {
            writeln!(f, "    Serial Number: {}", vp.serial)?;
        }
    }
    match (vp.manufacture_week, vp.manufacture_year, vp.model_year) {
        (_, _, Some(year)) => writeln!(f, "    Model year: {}", year)?,
        (Some(week), Some(year), _) => writeln!(f, "    Made in: week {} of {}", week, year)?,
        (None, Some(year), _) => writeln!(f, "    Made in: {}", year)?,
        _ => {}
    }

    writeln!(f, "  Basic Display Parameters & Features:")?;
    match edid.video_input {
        VideoInput::Analog {
            signal_level,
            blank_to_black_setup,
            separate_sync,
            composite_sync_on_horiz,
            composite_sync_on_green,
            serrated_vsync,
        } => {
            writeln!(f, "    Analog display")?;
            writeln!(f, "    Signal Level Standard: {:?}", signal_level)?;
            if blank_to_black_setup {
                writeln!(f, "    Blank-to-black setup/pedestal")?;
            }
            let mut syncs = Vec::new();
            if separate_sync {
                syncs.push("Separate");
            }
            if composite_sync_on_horiz {
                syncs.push("Composite");
            }
            if composite_sync_on_green {
                syncs.push("SyncOnGreen");
            }
            if !syncs.is_empty() {
                writeln!(f, "    Sync: {}", syncs.join(" "))?;
            }
            if serrated_vsync {
                writeln!(f, "    Serration on VSync")?;
            }
        }
        VideoInput::Digital {
            color_bit_depth,
            interface,
        } => {
            writeln!(f, "    Digital display")?;
            match color_bit_depth {
                Some(bits) => writeln!(f, "    Bits per primary color channel: {}", bits)?,
                None if edid.revision >= 4 => {
                    writeln!(f, "    Color depth is undefined")?
                }
                None => {}
            }
            let name = match interface {
                DigitalInterface::Undefined => None,
                DigitalInterface::Dvi => Some("DVI"),
                DigitalInterface::HdmiA => Some("HDMI-a"),
                DigitalInterface::HdmiB => Some("HDMI-b"),
                DigitalInterface::Mddi => Some("MDDI"),
                DigitalInterface::DisplayPort => Some("DisplayPort"),
                DigitalInterface::Unknown(_) => Some("Unknown"),
            };
            if let Some(name) = name {
                writeln!(f, "    {} interface", name)?;
            }
        }
    }

    let size = &edid.screen_size;
    match (size.width_cm, size.height_cm) {
        (Some(w), Some(h)) => writeln!(f, "    Maximum image size: {} cm x {} cm", w, h)?,
        _ => {
            if let Some(ar) = size.landscape_aspect_ratio {
                writeln!(f, "    Aspect ratio: {:.2} (landscape)", ar)?;
            } else if let Some(ar) = size.portrait_aspect_ratio {
                writeln!(f, "    Aspect ratio: {:.2} (portrait)", ar)?;
            } else {
                writeln!(f, "    Image size is variable")?;
            }
        }
    }

    match edid.basic_gamma {
        Some(g) => writeln!(f, "    Gamma: {:.2}", g)?,
        None => writeln!(f, "    Gamma is defined in an extension block")?,
    }

    let misc = &edid.misc_features;
    let mut dpms = Vec::new();
    if misc.dpms_standby {
        dpms.push("Standby");
    }
    if misc.dpms_suspend {
        dpms.push("Suspend");
    }
    if misc.dpms_off {
        dpms.push("Off");
    }
    if !dpms.is_empty() {
        writeln!(f, "    DPMS levels: {}", dpms.join(" "))?;
    }
    if let Some(kind) = misc.display_color_type {
        writeln!(f, "    Display color type: {:?}", kind)?;
    }
    if let Some(enc) = misc.color_encodings {
        let mut formats = vec!["RGB 4:4:4"];
        if enc.ycrcb444 {
            formats.push("YCrCb 4:4:4");
        }
        if enc.ycrcb422 {
            formats.push("YCrCb 4:2:2");
        }
        writeln!(f, "    Supported color formats: {}", formats.join(", "))?;
    }
    if misc.srgb_is_primary {
        writeln!(f, "    Default (sRGB) color space is primary color space")?;
    }
    if misc.preferred_timing_is_native {
        writeln!(
            f,
            "    First detailed timing includes the native pixel format and preferred refresh rate"
        )?;
    }
    if misc.continuous_freq {
        if edid.revision >= 4 {
            writeln!(f, "    Display is continuous frequency")?;
        } else {
            writeln!(f, "    Supports GTF timings within operating range")?;
        }
    }

    let c = &edid.chromaticity;
    writeln!(f, "  Color Characteristics:")?;
    writeln!(f, "    Red  : {:.4}, {:.4}", c.red_x, c.red_y)?;
    writeln!(f, "    Green: {:.4}, {:.4}", c.green_x, c.green_y)?;
    writeln!(f, "    Blue : {:.4}, {:.4}", c.blue_x, c.blue_y)?;
    writeln!(f, "    White: {:.4}, {:.4}", c.white_x, c.white_y)?;

    writeln!(f, "  Established Timings I & II:")?;
    if edid.established_timings.modes.is_empty() {
        writeln!(f, "    none")?;
    }
    for m in &edid.established_timings.modes {
        let i = if m.interlaced { "i" } else { "" };
        writeln!(f, "    {:>5}x{:<5}{} {:>3} Hz", m.width, m.height, i, m.refresh_hz)?;
    }
    if opts.uncommon_features && edid.established_timings.manufacturer_specific != 0 {
        writeln!(
            f,
            "    Manufacturer specific timings: 0x{:02x}",
            edid.established_timings.manufacturer_specific
        )?;
    }

    writeln!(f, "  Standard Timings:")?;
    if edid.standard_timings.is_empty() {
        writeln!(f, "    none")?;
    }
    for t in &edid.standard_timings {
        write_standard_timing(f, t, "    ")?;
    }

    writeln!(f, "  Detailed Timing Descriptors:")?;
    for d in &edid.descriptors {
        write_descriptor(f, d, opts, dtd_counter)?;
    }

    if edid.extension_count > 0 {
        writeln!(f, "  Extension blocks: {}", edid.extension_count)?;
    }
    Ok(())
}

fn write_standard_timing(f: &mut fmt::Formatter<'_>, t: &StandardTiming, indent: &str) -> fmt::Result {
    use crate::edid::AspectRatio;
    let ar = match t.aspect_ratio {
        AspectRatio::R1_1 => "1:1",
        AspectRatio::R16_10 => "16:10",
        AspectRatio::R4_3 => "4:3",
        AspectRatio::R5_4 => "5:4",
        AspectRatio::R16_9 => "16:9",
    };
    writeln!(
        f,
        "{}{:>5}x{:<5} {:>3} Hz {:>5}",
        indent, t.horiz_video, t.vert_video, t.refresh_hz, ar
    )
}

fn write_detailed_timing(
    f: &mut fmt::Formatter<'_>,
    t: &DetailedTiming,
    dtd_counter: &mut usize,
) -> fmt::Result {
    *dtd_counter += 1;
    let i = if t.interlaced { "i" } else { "" };
    write!(
        f,
        "    DTD {}: {:>5}x{:<5}{} {:>10.6} Hz {:>11.6} MHz",
        dtd_counter,
        t.horiz_video,
        t.vert_video,
        i,
        t.refresh_hz(),
        t.pixel_clock_hz as f64 / 1_000_000.0
    )?;
    if t.horiz_image_mm != 0 || t.vert_image_mm != 0 {
        write!(f, " ({} mm x {} mm)", t.horiz_image_mm, t.vert_image_mm)?;
    }
    writeln!(f)?;

    let (hpol, vpol) = match t.sync {
        SyncSignal::DigitalSeparate {
            vert_polarity,
            horiz_polarity,
        } => (Some(horiz_polarity), Some(vert_polarity)),
        SyncSignal::DigitalComposite { horiz_polarity, .. } => (Some(horiz_polarity), None),
        SyncSignal::Analog { .. } => (None, None),
    };
    let pol = |p: Option<SyncPolarity>| match p {
        Some(SyncPolarity::Positive) => " Hpol P",
        Some(SyncPolarity::Negative) => " Hpol N",
        None => "",
    };
    let hback = t.horiz_blank.saturating_sub(t.horiz_front_porch + t.horiz_sync_pulse);
    let vback = t.vert_blank.saturating_sub(t.vert_front_porch + t.vert_sync_pulse);
    writeln!(
        f,
        "               Hfront {:>4} Hsync {:>3} Hback {:>4}{}",
        t.horiz_front_porch,
        t.horiz_sync_pulse,
        hback,
        pol(hpol)
    )?;
    writeln!(
        f,
        "               Vfront {:>4} Vsync {:>3} Vback {:>4}{}",
        t.vert_front_porch,
        t.vert_sync_pulse,
        vback,
        pol(vpol).replace('H', "V")
    )?;
    if t.horiz_border != 0 || t.vert_border != 0 {
        writeln!(f, "               Hborder {} Vborder {}", t.horiz_border, t.vert_border)?;
    }
    if t.stereo != StereoMode::None {
        writeln!(f, "               Stereo: {:?}", t.stereo)?;
    }
    Ok(())
}

fn write_descriptor(
    f: &mut fmt::Formatter<'_>,
    d: &Descriptor,
    opts: &ReportOptions,
    dtd_counter: &mut usize,
) -> fmt::Result {
    match d {
        Descriptor::DetailedTiming(t) => write_detailed_timing(f, t, dtd_counter),
        Descriptor::ProductSerial(s) => {
            let s = if opts.hide_serial_numbers { HIDDEN } else { s.as_str() };
            writeln!(f, "    Display Product Serial Number: '{}'", s)
        }
        Descriptor::DataString(s) => writeln!(f, "    Alphanumeric Data String: '{}'", s),
        Descriptor::ProductName(s) => writeln!(f, "    Display Product Name: '{}'", s),
        Descriptor::RangeLimits(r) => {
            writeln!(f, "    Display Range Limits:")?;
            let kind = match r.kind {
                RangeLimitsKind::DefaultGtf => "GTF".to_string(),
                RangeLimitsKind::LimitsOnly => "Bare Limits".to_string(),
                RangeLimitsKind::SecondaryGtf => "Secondary GTF".to_string(),
                RangeLimitsKind::Cvt { major, minor } => format!("CVT {}.{}", major, minor),
                RangeLimitsKind::Unknown(v) => format!("Unknown 0x{:02x}", v),
            };
            write!(
                f,
                "      Monitor ranges ({}): {}-{} Hz V, {}-{} kHz H",
                kind, r.min_vert_rate_hz, r.max_vert_rate_hz, r.min_horiz_rate_khz, r.max_horiz_rate_khz
            )?;
            if let Some(clock) = r.max_pixel_clock_mhz {
                write!(f, ", max dotclock {} MHz", clock)?;
            }
            writeln!(f)
        }
        Descriptor::ColorPoints(points) => {
            writeln!(f, "    Color Point Data:")?;
            for p in points {
                write!(f, "      Index: {} White: {:.4}, {:.4}", p.index, p.white_x, p.white_y)?;
                match p.gamma {
                    Some(g) => writeln!(f, " Gamma: {:.2}", g)?,
                    None => writeln!(f)?,
                }
            }
            Ok(())
        }
        Descriptor::StandardTimings(timings) => {
            writeln!(f, "    Standard Timing Identifications:")?;
            timings.iter().try_for_each(|t| write_standard_timing(f, t, "      "))
        }
        Descriptor::ColorManagementData(dcm) => {
            writeln!(f, "    Display Color Management Data:")?;
            writeln!(f, "      Version:  {}", dcm.version)?;
            writeln!(f, "      Red a3:   {:.2} Red a2:   {:.2}", dcm.red_a3, dcm.red_a2)?;
            writeln!(f, "      Green a3: {:.2} Green a2: {:.2}", dcm.green_a3, dcm.green_a2)?;
            writeln!(f, "      Blue a3:  {:.2} Blue a2:  {:.2}", dcm.blue_a3, dcm.blue_a2)
        }
        Descriptor::CvtTimingCodes(codes) => {
            writeln!(f, "    CVT 3 Byte Timing Codes:")?;
            for c in codes {
                writeln!(
                    f,
                    "      {} lines, {:?}, preferred {} Hz",
                    c.addressable_lines, c.aspect_ratio, c.preferred_rate_hz
                )?;
            }
            Ok(())
        }
        Descriptor::EstablishedTimingsIII(modes) => {
            writeln!(f, "    Established timings III:")?;
            for m in modes {
                let rb = if m.reduced_blanking { " RB" } else { "" };
                writeln!(f, "      {:>5}x{:<5} {:>3} Hz{}", m.width, m.height, m.refresh_hz, rb)?;
            }
            Ok(())
        }
        Descriptor::Dummy => writeln!(f, "    Dummy Descriptor"),
        Descriptor::ManufacturerSpecified { tag, payload } => {
            writeln!(f, "    Manufacturer-Specified Display Descriptor (0x{:02x}):", tag)?;
            if opts.uncommon_features {
                write!(f, "{}", hex_lines(payload, "      "))?;
            }
            Ok(())
        }
        Descriptor::Unknown { tag, payload } => {
            writeln!(f, "    Unknown Display Descriptor (0x{:02x}):", tag)?;
            if opts.uncommon_features {
                write!(f, "{}", hex_lines(payload, "      "))?;
            }
            Ok(())
        }
    }
}

fn overscan(b: OverscanBehavior) -> &'static str {
    match b {
        OverscanBehavior::Unsupported => "Not supported",
        OverscanBehavior::AlwaysOverscanned => "Always Overscanned",
        OverscanBehavior::AlwaysUnderscanned => "Always Underscanned",
        OverscanBehavior::Both => "Supports both over- and underscan",
    }
}

fn speakers(s: &SpeakerAllocation) -> Vec<&'static str> {
    [
        (s.fl_fr, "FL/FR - Front Left/Right"),
        (s.lfe1, "LFE1 - Low Frequency Effects 1"),
        (s.fc, "FC - Front Center"),
        (s.bl_br, "BL/BR - Back Left/Right"),
        (s.bc, "BC - Back Center"),
        (s.flc_frc, "FLc/FRc - Front Left/Right of Center"),
        (s.rlc_rrc, "RLC/RRC - Rear Left/Right of Center"),
        (s.flw_frw, "FLw/FRw - Front Left/Right Wide"),
        (s.tpfl_tpfr, "TpFL/TpFR - Top Front Left/Right"),
        (s.tpc, "TpC - Top Center"),
        (s.tpfc, "TpFC - Top Front Center"),
        (s.ls_rs, "LS/RS - Left/Right Surround"),
        (s.lfe2, "LFE2 - Low Frequency Effects 2"),
        (s.tpbc, "TpBC - Top Back Center"),
        (s.sil_sir, "SiL/SiR - Side Left/Right"),
        (s.tpsil_tpsir, "TpSiL/TpSiR - Top Side Left/Right"),
        (s.tpbl_tpbr, "TpBL/TpBR - Top Back Left/Right"),
        (s.btfc, "BtFC - Bottom Front Center"),
        (s.btfl_btfr, "BtFL/BtFR - Bottom Front Left/Right"),
        (s.tpls_tprs, "TpLS/TpRS - Top Left/Right Surround"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|&(_, name)| name)
    .collect()
}

fn write_cta(
    f: &mut fmt::Formatter<'_>,
    cta: &Cta,
    opts: &ReportOptions,
    dtd_counter: &mut usize,
) -> fmt::Result {
    writeln!(f, "  Revision: {}", cta.revision)?;
    let flags = &cta.flags;
    if flags.it_underscan {
        writeln!(f, "  Underscans IT Video Formats by default")?;
    }
    if flags.basic_audio {
        writeln!(f, "  Basic audio support")?;
    }
    if flags.ycc444 {
        writeln!(f, "  Supports YCbCr 4:4:4")?;
    }
    if flags.ycc422 {
        writeln!(f, "  Supports YCbCr 4:2:2")?;
    }
    if cta.revision >= 2 {
        writeln!(f, "  Native detailed modes: {}", flags.native_dtds)?;
    }

    for block in &cta.data_blocks {
        writeln!(f, "  {}:", block.tag().name())?;
        match block {
            CtaDataBlock::Audio(sads) => {
                for sad in sads {
                    writeln!(f, "    {:?}:", sad.format)?;
                    writeln!(f, "      Max channels: {}", sad.max_channels)?;
                    let rates: Vec<String> = sad
                        .sample_rates_hz
                        .iter()
                        .map(|r| format!("{}", f64::from(*r) / 1000.0))
                        .collect();
                    writeln!(f, "      Supported sample rates (kHz): {}", rates.join(" "))?;
                    if !sad.lpcm_bit_depths.is_empty() {
                        let depths: Vec<String> =
                            sad.lpcm_bit_depths.iter().map(|d| d.to_string()).collect();
                        writeln!(f, "      Supported sample sizes (bits): {}", depths.join(" "))?;
                    }
                    if let Some(rate) = sad.max_bitrate_kbs {
                        writeln!(f, "      Maximum bit rate: {} kb/s", rate)?;
                    }
                }
            }
            CtaDataBlock::Video(svds) | CtaDataBlock::Ycbcr420Video(svds) => {
                for svd in svds {
                    let native = if svd.native { " (native)" } else { "" };
                    writeln!(f, "    VIC {:>3}{}", svd.vic, native)?;
                }
            }
            CtaDataBlock::VendorSpecific(v) => {
                let name = v.vendor_name().unwrap_or("unknown vendor");
                writeln!(
                    f,
                    "    OUI {:02X}-{:02X}-{:02X} ({})",
                    (v.oui >> 16) & 0xFF,
                    (v.oui >> 8) & 0xFF,
                    v.oui & 0xFF,
                    name
                )?;
                if opts.uncommon_features {
                    write!(f, "{}", hex_lines(&v.payload, "    "))?;
                }
            }
            CtaDataBlock::SpeakerAllocation(s) => {
                for name in speakers(s) {
                    writeln!(f, "    {}", name)?;
                }
            }
            CtaDataBlock::VideoCapability(v) => {
                writeln!(
                    f,
                    "    YCbCr quantization: {}",
                    if v.ycc_quantization_selectable { "Selectable (via AVI YQ)" } else { "No Data" }
                )?;
                writeln!(
                    f,
                    "    RGB quantization: {}",
                    if v.rgb_quantization_selectable { "Selectable (via AVI Q)" } else { "No Data" }
                )?;
                writeln!(f, "    PT scan behavior: {}", overscan(v.pt_overscan))?;
                writeln!(f, "    IT scan behavior: {}", overscan(v.it_overscan))?;
                writeln!(f, "    CE scan behavior: {}", overscan(v.ce_overscan))?;
            }
            CtaDataBlock::Colorimetry(c) => {
                let flags = [
                    (c.xvycc_601, "xvYCC601"),
                    (c.xvycc_709, "xvYCC709"),
                    (c.sycc_601, "sYCC601"),
                    (c.opycc_601, "opYCC601"),
                    (c.oprgb, "opRGB"),
                    (c.bt2020_cycc, "BT2020cYCC"),
                    (c.bt2020_ycc, "BT2020YCC"),
                    (c.bt2020_rgb, "BT2020RGB"),
                    (c.st2113_rgb, "ST2113RGB"),
                    (c.ictcp, "ICtCp"),
                ];
                for (_, name) in flags.iter().filter(|(set, _)| *set) {
                    writeln!(f, "    {}", name)?;
                }
                if c.gamut_metadata != 0 {
                    writeln!(f, "    Gamut metadata profiles: 0x{:x}", c.gamut_metadata)?;
                }
            }
            CtaDataBlock::HdrStaticMetadata(m) => {
                writeln!(f, "    Electro optical transfer functions:")?;
                let eotfs = [
                    (m.eotfs.traditional_sdr, "Traditional gamma - SDR luminance range"),
                    (m.eotfs.traditional_hdr, "Traditional gamma - HDR luminance range"),
                    (m.eotfs.pq, "SMPTE ST2084"),
                    (m.eotfs.hlg, "Hybrid Log-Gamma"),
                ];
                for (_, name) in eotfs.iter().filter(|(set, _)| *set) {
                    writeln!(f, "      {}", name)?;
                }
                writeln!(f, "    Supported static metadata descriptors:")?;
                if m.type1 {
                    writeln!(f, "      Static metadata type 1")?;
                }
                if let Some(v) = m.desired_content_max_luminance {
                    writeln!(f, "    Desired content max luminance: {:.3} cd/m^2", v)?;
                }
                if let Some(v) = m.desired_content_max_frame_avg_luminance {
                    writeln!(f, "    Desired content max frame-average luminance: {:.3} cd/m^2", v)?;
                }
                if let Some(v) = m.desired_content_min_luminance {
                    writeln!(f, "    Desired content min luminance: {:.3} cd/m^2", v)?;
                }
            }
            CtaDataBlock::Ycbcr420CapabilityMap(map) => {
                if map.bitmap.is_empty() {
                    writeln!(f, "    All VDB SVDs")?;
                } else {
                    for (i, svd) in cta.svds().enumerate() {
                        if map.supports(i) {
                            writeln!(f, "    VIC {:>3}", svd.vic)?;
                        }
                    }
                }
            }
            CtaDataBlock::Raw { payload, .. } => {
                if opts.uncommon_features {
                    write!(f, "{}", hex_lines(payload, "    "))?;
                }
            }
        }
    }

    if !cta.detailed_timings.is_empty() {
        writeln!(f, "  Detailed Timing Descriptors:")?;
        for t in &cta.detailed_timings {
            write_detailed_timing(f, t, dtd_counter)?;
        }
    }
    Ok(())
}

fn write_displayid_timing(f: &mut fmt::Formatter<'_>, t: &displayid::Timing) -> fmt::Result {
    let total = u64::from(t.horiz_active + t.horiz_blank) * u64::from(t.vert_active + t.vert_blank);
    let refresh = if total == 0 {
        0.0
    } else {
        t.pixel_clock_hz as f64 / total as f64
    };
    let i = if t.interlaced { "i" } else { "" };
    write!(
        f,
        "    DTD: {:>5}x{:<5}{} {:>10.6} Hz {:>11.6} MHz",
        t.horiz_active,
        t.vert_active,
        i,
        refresh,
        t.pixel_clock_hz as f64 / 1_000_000.0
    )?;
    if let Some(ar) = t.aspect_ratio {
        write!(f, " {}", ar.label())?;
    }
    if t.preferred {
        write!(f, " (preferred)")?;
    }
    writeln!(f)?;
    let pol = |p: displayid::SyncPolarity| match p {
        displayid::SyncPolarity::Positive => 'P',
        displayid::SyncPolarity::Negative => 'N',
    };
    writeln!(
        f,
        "               Hfront {:>4} Hsync {:>3} Hback {:>4} Hpol {}",
        t.horiz_offset,
        t.horiz_sync_width,
        t.horiz_blank.saturating_sub(t.horiz_offset + t.horiz_sync_width),
        pol(t.horiz_sync_polarity)
    )?;
    writeln!(
        f,
        "               Vfront {:>4} Vsync {:>3} Vback {:>4} Vpol {}",
        t.vert_offset,
        t.vert_sync_width,
        t.vert_blank.saturating_sub(t.vert_offset + t.vert_sync_width),
        pol(t.vert_sync_polarity)
    )
}

fn tile_behavior(b: TileBehavior) -> &'static str {
    match b {
        TileBehavior::Undefined => "Undefined",
        TileBehavior::Location => "Image is displayed at the Tile Location",
        TileBehavior::Scale => "Image is scaled to fit the entire tiled display",
        TileBehavior::Clone => "Image is cloned to all other tiles",
        TileBehavior::Reserved(_) => "Reserved",
    }
}

fn write_displayid(f: &mut fmt::Formatter<'_>, d: &DisplayId, opts: &ReportOptions) -> fmt::Result {
    writeln!(f, "  Version: {}.{}", d.version, d.revision)?;
    writeln!(f, "  Extension Count: {}", d.extension_count)?;
    writeln!(f, "  Display Product Type: {}", d.product_type_name())?;

    for block in &d.data_blocks {
        writeln!(f, "  {}:", displayid::data_block_name(block.tag()))?;
        match block {
            DisplayIdDataBlock::ProductId(p) => {
                writeln!(f, "    Vendor ID: {}", p.vendor)?;
                writeln!(f, "    Product Code: {}", p.product_code)?;
                if p.serial != 0 {
                    if opts.hide_serial_numbers {
                        writeln!(f, "    Serial Number: {}", HIDDEN)?;
                    } else {
                        writeln!(f, "    Serial Number: {}", p.serial)?;
                    }
                }
                match (p.manufacture_week, p.manufacture_year, p.model_year) {
                    (_, _, Some(year)) => writeln!(f, "    Model year: {}", year)?,
                    (Some(week), Some(year), _) => writeln!(f, "    Made in: week {} of {}", week, year)?,
                    (None, Some(year), _) => writeln!(f, "    Made in: {}", year)?,
                    _ => {}
                }
                if !p.name.is_empty() {
                    writeln!(f, "    Product ID: {}", p.name)?;
                }
            }
            DisplayIdDataBlock::DisplayParams(p) => {
                writeln!(f, "    Image size: {:.1} mm x {:.1} mm", p.horiz_image_mm, p.vert_image_mm)?;
                writeln!(f, "    Display native pixel format: {}x{}", p.horiz_pixels, p.vert_pixels)?;
                let feats = &p.features;
                let flags = [
                    (feats.audio, "Audio support on video interface"),
                    (feats.separate_audio_inputs, "Separate audio inputs provided"),
                    (feats.audio_input_override, "Audio input override"),
                    (feats.power_management, "Power management (DPM)"),
                    (feats.fixed_timing, "Fixed timing"),
                    (feats.fixed_pixel_format, "Fixed pixel format"),
                    (feats.ai, "Support ACP, ISRC1 or ISRC2packets"),
                    (feats.deinterlacing, "De-interlacing"),
                ];
                if flags.iter().any(|(set, _)| *set) {
                    writeln!(f, "    Feature support flags:")?;
                    for (_, name) in flags.iter().filter(|(set, _)| *set) {
                        writeln!(f, "      {}", name)?;
                    }
                }
                if let Some(g) = p.gamma {
                    writeln!(f, "    Gamma: {:.2}", g)?;
                }
                writeln!(f, "    Aspect ratio: {:.2}", p.aspect_ratio)?;
                writeln!(f, "    Dynamic bpc native: {}", p.bits_per_color_native)?;
                writeln!(f, "    Dynamic bpc overall: {}", p.bits_per_color_overall)?;
            }
            DisplayIdDataBlock::TypeITimings(timings) | DisplayIdDataBlock::TypeIITimings(timings) => {
                for t in timings {
                    write_displayid_timing(f, t)?;
                }
            }
            DisplayIdDataBlock::TypeIIITimings(timings) => {
                for t in timings {
                    let formula = match t.formula {
                        TimingFormula::CvtStandard => "CVT",
                        TimingFormula::CvtReducedBlanking => "CVT-RB",
                        TimingFormula::Reserved(_) => "Reserved",
                    };
                    let i = if t.interlaced { "i" } else { "" };
                    write!(
                        f,
                        "    {}: {} px wide{} {} Hz {}",
                        formula,
                        t.horiz_active,
                        i,
                        t.refresh_hz,
                        t.aspect_ratio.label()
                    )?;
                    if t.preferred {
                        write!(f, " (preferred)")?;
                    }
                    writeln!(f)?;
                }
            }
            DisplayIdDataBlock::TiledTopology(t) => {
                writeln!(f, "    Capabilities:")?;
                writeln!(f, "      Behavior if it is the only tile: {}", tile_behavior(t.single_tile_behavior))?;
                writeln!(
                    f,
                    "      Behavior if more than one tile and fewer than total number of tiles: {}",
                    tile_behavior(t.multi_tile_behavior)
                )?;
                if t.single_enclosure {
                    writeln!(f, "      Tiled display consists of a single physical display enclosure")?;
                }
                writeln!(
                    f,
                    "    Num horizontal tiles: {} Num vertical tiles: {}",
                    t.total_horiz_tiles, t.total_vert_tiles
                )?;
                writeln!(
                    f,
                    "    Tile location: {}, {}",
                    t.horiz_tile_location, t.vert_tile_location
                )?;
                writeln!(f, "    Tile resolution: {}x{}", t.tile_width, t.tile_height)?;
                if let Some(b) = t.bezel {
                    writeln!(
                        f,
                        "    Top bezel size: {:.1} pixels, Bottom: {:.1}, Right: {:.1}, Left: {:.1}",
                        b.top_px, b.bottom_px, b.right_px, b.left_px
                    )?;
                }
                writeln!(f, "    Tiled Display Manufacturer/Vendor ID: {}", t.vendor)?;
                writeln!(f, "    Tiled Display Product ID Code: {}", t.product_code)?;
                if opts.hide_serial_numbers {
                    writeln!(f, "    Tiled Display Serial Number: {}", HIDDEN)?;
                } else {
                    writeln!(f, "    Tiled Display Serial Number: {}", t.serial)?;
                }
            }
            DisplayIdDataBlock::Unknown { revision, payload, .. } => {
                if opts.uncommon_features {
                    writeln!(f, "    Revision: {}", revision)?;
                    write!(f, "{}", hex_lines(payload, "    "))?;
                }
            }
        }
    }
    Ok(())
}

fn write_opaque(f: &mut fmt::Formatter<'_>, raw: &RawExtension, opts: &ReportOptions) -> fmt::Result {
    if opts.uncommon_features {
        write!(f, "{}", hex_lines(&raw.bytes, "  "))?;
    }
    Ok(())
}

fn write_derived(f: &mut fmt::Formatter<'_>, d: &DerivedInfo, opts: &ReportOptions) -> fmt::Result {
    writeln!(f, "Display information:")?;
    if let Some(make) = &d.make {
        writeln!(f, "  Make: {}", make)?;
    }
    if let Some(model) = &d.model {
        writeln!(f, "  Model: {}", model)?;
    }
    if let Some(serial) = &d.serial {
        let serial = if opts.hide_serial_numbers { HIDDEN } else { serial.as_str() };
        writeln!(f, "  Serial: {}", serial)?;
    }
    match d.default_gamma {
        Some(g) => writeln!(f, "  Default gamma: {:.2}", g)?,
        None => writeln!(f, "  Default gamma: unset")?,
    }

    let p = &d.default_color_primaries;
    match p.primaries {
        Some([r, g, b]) => writeln!(
            f,
            "  Default color primaries: red ({:.4}, {:.4}), green ({:.4}, {:.4}), blue ({:.4}, {:.4})",
            r.x, r.y, g.x, g.y, b.x, b.y
        )?,
        None => writeln!(f, "  Default color primaries: unset")?,
    }
    match p.default_white {
        Some(w) => writeln!(f, "  Default white point: ({:.4}, {:.4})", w.x, w.y)?,
        None => writeln!(f, "  Default white point: unset")?,
    }

    let hdr = &d.hdr_static_metadata;
    writeln!(f, "  HDR static metadata:")?;
    writeln!(f, "    Traditional SDR: {}", yes_no(hdr.eotfs.traditional_sdr))?;
    writeln!(f, "    Traditional HDR: {}", yes_no(hdr.eotfs.traditional_hdr))?;
    writeln!(f, "    PQ: {}", yes_no(hdr.eotfs.pq))?;
    writeln!(f, "    HLG: {}", yes_no(hdr.eotfs.hlg))?;
    writeln!(f, "    Static metadata type 1: {}", yes_no(hdr.type1))?;

    let c = &d.supported_signal_colorimetry;
    writeln!(f, "  Supported signal colorimetry:")?;
    writeln!(f, "    BT.2020 cYCC: {}", yes_no(c.bt2020_cycc))?;
    writeln!(f, "    BT.2020 YCC: {}", yes_no(c.bt2020_ycc))?;
    writeln!(f, "    BT.2020 RGB: {}", yes_no(c.bt2020_rgb))?;
    writeln!(f, "    ST 2113 RGB: {}", yes_no(c.st2113_rgb))?;
    writeln!(f, "    ICtCp: {}", yes_no(c.ictcp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{cta_block, displayid_block, text_descriptor, BaseBlockBuilder};

    fn report(data: &[u8], opts: ReportOptions) -> String {
        let info = crate::parse(data).unwrap();
        render(&info, &opts)
    }

    #[test]
    fn test_base_block_report() {
        let text = report(&BaseBlockBuilder::new().build(), ReportOptions::default());
        assert!(text.starts_with("Block 0, Base EDID:\n"));
        assert!(text.contains("  EDID Structure Version & Revision: 1.4\n"));
        assert!(text.contains("    Manufacturer: ACM\n"));
        assert!(text.contains("    Model: 4660\n"));
        assert!(text.contains("    Made in: week 10 of 2023\n"));
        assert!(text.contains("    DisplayPort interface\n"));
        assert!(text.contains("    Gamma: 2.20\n"));
        assert!(text.contains("    DTD 1:  1920x1080"));
        assert!(text.contains("Hfront   88 Hsync  44 Hback  148 Hpol P"));
        assert!(text.contains("    Display Product Name: 'ACME Display'\n"));
        assert!(text.contains("Monitor ranges (Bare Limits): 50-75 Hz V, 30-160 kHz H, max dotclock 170 MHz"));
        assert!(text.contains("  Model: ACME Display\n"));
        assert!(!text.contains("Failures:"));
    }

    #[test]
    fn test_hide_serial_numbers() {
        let data = BaseBlockBuilder::new()
            .serial(12345678)
            .descriptor(3, text_descriptor(0xFF, "SN-0042"))
            .build();

        let shown = report(&data, ReportOptions::default());
        assert!(shown.contains("Serial Number: 12345678"));
        assert!(shown.contains("'SN-0042'"));

        let opts = ReportOptions {
            hide_serial_numbers: true,
            ..ReportOptions::default()
        };
        let hidden = report(&data, opts);
        assert!(hidden.contains("Serial Number: ..."));
        assert!(hidden.contains("Display Product Serial Number: '...'"));
        assert!(!hidden.contains("12345678"));
        assert!(!hidden.contains("SN-0042"));
    }

    #[test]
    fn test_failures_section() {
        let mut data = BaseBlockBuilder::new().build();
        data[127] = data[127].wrapping_add(1);

        let text = report(&data, ReportOptions::default());
        assert!(text.contains("\nFailures:\n\nBlock 0, Base EDID:\n  Invalid checksum\n"));

        let opts = ReportOptions {
            show_diagnostics: false,
            ..ReportOptions::default()
        };
        assert!(!report(&data, opts).contains("Failures:"));
    }

    #[test]
    fn test_cta_report() {
        let cta = cta_block(&[
            &[0x42, 0x90, 0x04],
            &[0xE3, 0x05, 0xC0, 0x00],
            &[0xE3, 0x06, 0x0D, 0x01],
        ]);
        let text = report(&BaseBlockBuilder::new().extension(cta).build(), ReportOptions::default());
        assert!(text.contains("  Extension blocks: 1\n"));
        assert!(text.contains("Block 1, CTA-861 Extension Block:\n  Revision: 3\n"));
        assert!(text.contains("  Video Data Block:\n    VIC  16 (native)\n    VIC   4\n"));
        assert!(text.contains("  Colorimetry Data Block:\n    BT2020YCC\n    BT2020RGB\n"));
        assert!(text.contains("      SMPTE ST2084\n      Hybrid Log-Gamma\n"));
        assert!(text.contains("    PQ: yes\n"));
    }

    #[test]
    fn test_displayid_report() {
        let block = displayid_block(&[&[0x05, 0x00, 3, 0x94, 0xEF, 0x3B]]);
        let text = report(&BaseBlockBuilder::new().extension(block).build(), ReportOptions::default());
        assert!(text.contains("Block 1, DisplayID Extension Block:\n  Version: 1.2\n"));
        assert!(text.contains("  Video Timing Modes Type 3 - Short Timings Data Block:\n"));
        assert!(text.contains("    CVT-RB: 1920 px wide 60 Hz 16:9 (preferred)\n"));
    }

    #[test]
    fn test_uncommon_features_dump_opaque_blocks() {
        let mut block = [0u8; 128];
        block[0] = 0xF0;
        block[1] = 0xAB;
        crate::testutil::finish_block(&mut block);
        let data = BaseBlockBuilder::new().extension(block).build();

        let plain = report(&data, ReportOptions::default());
        assert!(plain.contains("Block 1, Block Map Extension Block:\n"));
        assert!(!plain.contains("f0 ab 00"));

        let opts = ReportOptions {
            uncommon_features: true,
            ..ReportOptions::default()
        };
        assert!(report(&data, opts).contains("  f0 ab 00 00"));
    }
}
