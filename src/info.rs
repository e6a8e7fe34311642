//! High-level display information derived from a parsed EDID
//!
//! Combines base block, CTA-861 and DisplayID fields with fixed priority
//! rules. Everything here is computed once right after parsing and never
//! updated afterwards.

use crate::cta::{Eotfs, HdrStaticMetadata};
use crate::diagnostics::Diagnostics;
use crate::edid::Edid;
use crate::Result;
use serde::Serialize;
use tracing::debug;

/// Gamma implied by the sRGB default color space flag
const SRGB_GAMMA: f32 = 2.2;

/// CIE 1931 xy point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cie1931Xy {
    pub x: f32,
    pub y: f32,
}

const SRGB_PRIMARIES: [Cie1931Xy; 3] = [
    Cie1931Xy { x: 0.640, y: 0.330 },
    Cie1931Xy { x: 0.300, y: 0.600 },
    Cie1931Xy { x: 0.150, y: 0.060 },
];

const D65_WHITE: Cie1931Xy = Cie1931Xy { x: 0.3127, y: 0.3290 };

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorPrimaries {
    /// Red, green, blue
    pub primaries: Option<[Cie1931Xy; 3]>,
    pub default_white: Option<Cie1931Xy>,
}

/// Signal colorimetries beyond the default RGB/YCbCr ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SupportedSignalColorimetry {
    pub bt2020_cycc: bool,
    pub bt2020_ycc: bool,
    pub bt2020_rgb: bool,
    pub st2113_rgb: bool,
    pub ictcp: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedInfo {
    /// PNP manufacturer ID
    pub make: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub default_gamma: Option<f32>,
    pub default_color_primaries: ColorPrimaries,
    pub hdr_static_metadata: HdrStaticMetadata,
    pub supported_signal_colorimetry: SupportedSignalColorimetry,
}

impl DerivedInfo {
    pub fn compute(edid: &Edid) -> Self {
        Self {
            make: make(edid),
            model: model(edid),
            serial: serial(edid),
            default_gamma: default_gamma(edid),
            default_color_primaries: default_color_primaries(edid),
            hdr_static_metadata: hdr_static_metadata(edid),
            supported_signal_colorimetry: supported_signal_colorimetry(edid),
        }
    }
}

/// A parsed EDID with its derived information and the problems found on
/// the way
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub edid: Edid,
    pub diagnostics: Diagnostics,
    pub derived: DerivedInfo,
}

impl Info {
    /// Diagnostics in the "Block N, section:" layout, `None` when the EDID
    /// decoded cleanly
    pub fn failure_msg(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            None
        } else {
            Some(self.diagnostics.to_string())
        }
    }
}

/// Decode an EDID blob and derive display information from it.
///
/// On a fatal error no partial result is returned.
pub fn parse(bytes: &[u8]) -> Result<Info> {
    let mut diagnostics = Diagnostics::new();
    let edid = Edid::parse(bytes, &mut diagnostics)?;
    let derived = DerivedInfo::compute(&edid);
    debug!(
        diagnostics = diagnostics.len(),
        make = ?derived.make,
        model = ?derived.model,
        "Derived display info"
    );
    Ok(Info {
        edid,
        diagnostics,
        derived,
    })
}

fn make(edid: &Edid) -> Option<String> {
    let manufacturer = &edid.vendor_product.manufacturer;
    manufacturer
        .chars()
        .all(|c| c.is_ascii_uppercase())
        .then(|| manufacturer.clone())
}

fn model(edid: &Edid) -> Option<String> {
    match edid.product_name() {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ => Some(format!("0x{:04X}", edid.vendor_product.product)),
    }
}

fn serial(edid: &Edid) -> Option<String> {
    match edid.product_serial() {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => match edid.vendor_product.serial {
            0 => None,
            n => Some(format!("0x{:08X}", n)),
        },
    }
}

/// DisplayID display parameters, then the sRGB flag, then the base block
fn default_gamma(edid: &Edid) -> Option<f32> {
    let displayid_gamma = edid
        .displayid_extensions()
        .filter_map(|d| d.display_params())
        .find_map(|p| p.gamma);
    if displayid_gamma.is_some() {
        return displayid_gamma;
    }
    if edid.misc_features.srgb_is_primary {
        return Some(SRGB_GAMMA);
    }
    edid.basic_gamma
}

fn default_color_primaries(edid: &Edid) -> ColorPrimaries {
    if edid.misc_features.srgb_is_primary {
        return ColorPrimaries {
            primaries: Some(SRGB_PRIMARIES),
            default_white: Some(D65_WHITE),
        };
    }

    let c = &edid.chromaticity;
    let coords = [c.red_x, c.red_y, c.green_x, c.green_y, c.blue_x, c.blue_y];
    let primaries = coords.iter().all(|&v| v > 0.0).then(|| {
        [
            Cie1931Xy { x: c.red_x, y: c.red_y },
            Cie1931Xy { x: c.green_x, y: c.green_y },
            Cie1931Xy { x: c.blue_x, y: c.blue_y },
        ]
    });
    let default_white = (c.white_x > 0.0 && c.white_y > 0.0).then(|| Cie1931Xy {
        x: c.white_x,
        y: c.white_y,
    });
    ColorPrimaries {
        primaries,
        default_white,
    }
}

fn sdr_only() -> HdrStaticMetadata {
    HdrStaticMetadata {
        eotfs: Eotfs {
            traditional_sdr: true,
            ..Eotfs::default()
        },
        type1: false,
        desired_content_max_luminance: None,
        desired_content_max_frame_avg_luminance: None,
        desired_content_min_luminance: None,
    }
}

fn hdr_static_metadata(edid: &Edid) -> HdrStaticMetadata {
    edid.cta_extensions()
        .find_map(|cta| cta.hdr_static_metadata())
        .cloned()
        .unwrap_or_else(sdr_only)
}

fn supported_signal_colorimetry(edid: &Edid) -> SupportedSignalColorimetry {
    match edid.cta_extensions().find_map(|cta| cta.colorimetry()) {
        Some(c) => SupportedSignalColorimetry {
            bt2020_cycc: c.bt2020_cycc,
            bt2020_ycc: c.bt2020_ycc,
            bt2020_rgb: c.bt2020_rgb,
            st2113_rgb: c.st2113_rgb,
            ictcp: c.ictcp,
        },
        None => SupportedSignalColorimetry::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edid::{EDID_BLOCK_SIZE, EDID_HEADER};
    use crate::extension::{Extension, ExtensionTag};
    use crate::testutil::{cta_block, displayid_block, finish_block, text_descriptor, BaseBlockBuilder};
    use crate::Error;

    fn display_params_block(gamma: u8) -> Vec<u8> {
        vec![
            0x01, 0x00, 12, 0x4C, 0x17, 0x2C, 0x0D, 0x00, 0x0F, 0x70, 0x08, 0x10, gamma, 0x4E,
            0x77,
        ]
    }

    #[test]
    fn test_identity_round_trip() {
        let info = parse(&BaseBlockBuilder::new().build()).unwrap();
        assert_eq!(info.edid.vendor_product.manufacturer, "ACM");
        assert_eq!(info.edid.vendor_product.product, 0x1234);
        assert_eq!(info.derived.make.as_deref(), Some("ACM"));
        assert_eq!(info.derived.model.as_deref(), Some("ACME Display"));
        assert_eq!(info.derived.serial, None);
        assert_eq!(info.failure_msg(), None);
    }

    #[test]
    fn test_model_and_serial_fallbacks() {
        let data = BaseBlockBuilder::new()
            .serial(0xDEAD_BEEF)
            .descriptor(1, text_descriptor(0xFE, "rev B"))
            .build();
        let info = parse(&data).unwrap();
        assert_eq!(info.derived.model.as_deref(), Some("0x1234"));
        assert_eq!(info.derived.serial.as_deref(), Some("0xDEADBEEF"));

        let data = BaseBlockBuilder::new()
            .serial(0xDEAD_BEEF)
            .descriptor(3, text_descriptor(0xFF, "SN12345"))
            .build();
        let info = parse(&data).unwrap();
        assert_eq!(info.derived.serial.as_deref(), Some("SN12345"));
    }

    #[test]
    fn test_srgb_flag_overrides_zero_chromaticity() {
        let data = BaseBlockBuilder::new()
            .features(0x06)
            .chromaticity([0; 10])
            .build();
        let p = parse(&data).unwrap().derived.default_color_primaries;
        assert_eq!(p.primaries, Some(SRGB_PRIMARIES));
        assert_eq!(p.default_white, Some(D65_WHITE));
    }

    #[test]
    fn test_zero_chromaticity_has_no_primaries() {
        let data = BaseBlockBuilder::new()
            .features(0x02)
            .chromaticity([0; 10])
            .build();
        let p = parse(&data).unwrap().derived.default_color_primaries;
        assert_eq!(p.primaries, None);
        assert_eq!(p.default_white, None);
    }

    #[test]
    fn test_stored_chromaticity_without_srgb_flag() {
        let data = BaseBlockBuilder::new().features(0x02).build();
        let p = parse(&data).unwrap().derived.default_color_primaries;
        let [red, _, blue] = p.primaries.unwrap();
        assert!((red.x - 0.640).abs() < 1.0 / 1024.0);
        assert!((blue.y - 0.060).abs() < 1.0 / 1024.0);
        assert!((p.default_white.unwrap().y - 0.329).abs() < 1.0 / 1024.0);
    }

    #[test]
    fn test_gamma_priority() {
        // DisplayID gamma 2.4 beats both the sRGB flag and the base block
        let data = BaseBlockBuilder::new()
            .extension(displayid_block(&[&display_params_block(140)]))
            .build();
        let gamma = parse(&data).unwrap().derived.default_gamma.unwrap();
        assert!((gamma - 2.4).abs() < 0.001);

        // sRGB flag beats the base block value
        let data = BaseBlockBuilder::new().gamma(220).build();
        let gamma = parse(&data).unwrap().derived.default_gamma.unwrap();
        assert!((gamma - 2.2).abs() < 0.001);

        let data = BaseBlockBuilder::new().features(0x02).gamma(220).build();
        let gamma = parse(&data).unwrap().derived.default_gamma.unwrap();
        assert!((gamma - 3.2).abs() < 0.001);

        // 0xFF in DisplayID defers to the next source
        let data = BaseBlockBuilder::new()
            .features(0x02)
            .gamma(0xFF)
            .extension(displayid_block(&[&display_params_block(0xFF)]))
            .build();
        assert_eq!(parse(&data).unwrap().derived.default_gamma, None);
    }

    #[test]
    fn test_hdr_absent_is_sdr() {
        let info = parse(&BaseBlockBuilder::new().build()).unwrap();
        let hdr = info.derived.hdr_static_metadata;
        assert!(hdr.eotfs.traditional_sdr);
        assert!(!hdr.eotfs.traditional_hdr);
        assert!(!hdr.eotfs.pq);
        assert!(!hdr.eotfs.hlg);
        assert!(!hdr.type1);
        assert_eq!(hdr.desired_content_max_luminance, None);
        assert_eq!(
            info.derived.supported_signal_colorimetry,
            SupportedSignalColorimetry::default()
        );
    }

    #[test]
    fn test_hdr_and_colorimetry_from_cta() {
        let cta = cta_block(&[
            &[0xE3, 0x06, 0x0D, 0x01],
            &[0xE3, 0x05, 0xC0, 0x00],
            &[0xE3, 0x05, 0x80, 0x40],
        ]);
        let info = parse(&BaseBlockBuilder::new().extension(cta).build()).unwrap();
        let hdr = &info.derived.hdr_static_metadata;
        assert!(hdr.eotfs.pq);
        assert!(hdr.eotfs.hlg);
        assert!(hdr.type1);

        // the duplicate colorimetry block is ignored
        let c = info.derived.supported_signal_colorimetry;
        assert!(c.bt2020_ycc);
        assert!(c.bt2020_rgb);
        assert!(!c.ictcp);
        assert!(info.failure_msg().unwrap().contains("appears more than once"));
    }

    #[test]
    fn test_truncated_extension_keeps_siblings() {
        // DisplayID section header claiming 200 payload bytes
        let mut displayid = [0u8; EDID_BLOCK_SIZE];
        displayid[0] = 0x70;
        displayid[1] = 0x12;
        displayid[2] = 200;
        finish_block(&mut displayid);
        let cta = cta_block(&[&[0xE3, 0x05, 0x80, 0x00]]);

        let data = BaseBlockBuilder::new().extension(displayid).extension(cta).build();
        let info = parse(&data).unwrap();
        match &info.edid.extensions[0] {
            Extension::Opaque(raw) => assert_eq!(raw.tag, ExtensionTag::DisplayId),
            other => panic!("unexpected extension {:?}", other),
        }
        assert!(matches!(info.edid.extensions[1], Extension::Cta(_)));
        assert!(info.diagnostics.contains("Block truncated"));
        assert!(info.derived.supported_signal_colorimetry.bt2020_rgb);
    }

    #[test]
    fn test_random_base_blocks_never_fatal() {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for i in 0..20_000 {
            let mut block = [0u8; EDID_BLOCK_SIZE];
            block[..8].copy_from_slice(&EDID_HEADER);
            for b in &mut block[8..126] {
                *b = next() as u8;
            }
            block[0x7E] = 0;
            if i % 2 == 0 {
                finish_block(&mut block);
            } else {
                block[0x7F] = next() as u8;
            }

            if let Err(e) = parse(&block) {
                panic!("block {} failed with {:?}: {:02x?}", i, e, block);
            }
        }
    }

    #[test]
    fn test_fatal_error_returns_nothing() {
        let mut data = BaseBlockBuilder::new().build();
        data[1] = 0x00;
        assert!(matches!(parse(&data), Err(Error::InvalidHeader)));
    }
}
