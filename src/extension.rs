//! Routing of 128-byte extension blocks by their tag byte

use crate::cta::{Cta, CTA_EXTENSION_TAG};
use crate::diagnostics::{Diagnostics, Scope};
use crate::displayid::{DisplayId, DISPLAYID_EXTENSION_TAG};
use crate::edid::{checksum_ok, EDID_BLOCK_SIZE};
use crate::Result;
use serde::Serialize;
use tracing::debug;

/// Extension tags known by name but not decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtensionTag {
    Cta,
    VideoTimingBlock,
    DisplayInformation,
    LocalizedString,
    DigitalPacketVideoLink,
    DisplayId,
    BlockMap,
    Manufacturer,
    Unknown(u8),
}

impl ExtensionTag {
    pub fn from_raw(tag: u8) -> Self {
        match tag {
            0x02 => ExtensionTag::Cta,
            0x10 => ExtensionTag::VideoTimingBlock,
            0x40 => ExtensionTag::DisplayInformation,
            0x50 => ExtensionTag::LocalizedString,
            0x60 => ExtensionTag::DigitalPacketVideoLink,
            0x70 => ExtensionTag::DisplayId,
            0xF0 => ExtensionTag::BlockMap,
            0xFF => ExtensionTag::Manufacturer,
            other => ExtensionTag::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtensionTag::Cta => "CTA-861 Extension Block",
            ExtensionTag::VideoTimingBlock => "Video Timing Extension Block",
            ExtensionTag::DisplayInformation => "Display Information Extension Block",
            ExtensionTag::LocalizedString => "Localized String Extension Block",
            ExtensionTag::DigitalPacketVideoLink => "Digital Packet Video Link Extension",
            ExtensionTag::DisplayId => "DisplayID Extension Block",
            ExtensionTag::BlockMap => "Block Map Extension Block",
            ExtensionTag::Manufacturer => "Manufacturer-Specific Extension Block",
            ExtensionTag::Unknown(_) => "Unknown Extension Block",
        }
    }
}

/// An extension block kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawExtension {
    pub tag: ExtensionTag,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Extension {
    Cta(Cta),
    DisplayId(DisplayId),
    /// Known or unknown tag this decoder does not interpret
    Opaque(RawExtension),
}

impl Extension {
    /// Decode extension block number `index` (1-based, the base block is 0).
    ///
    /// A bad checksum is only reported. A read past the end of the block
    /// abandons the block and keeps it as opaque; capacity overflows are
    /// returned to the caller.
    pub fn parse(
        block: &[u8; EDID_BLOCK_SIZE],
        index: usize,
        diags: &mut Diagnostics,
    ) -> Result<Self> {
        let tag = ExtensionTag::from_raw(block[0]);
        let mut scope = Scope::new(diags, Some(index), tag.name());
        debug!(index, tag = ?tag, "Decoding extension block");

        if !checksum_ok(block) {
            scope.fail("Invalid checksum");
        }

        let parsed = match block[0] {
            CTA_EXTENSION_TAG => Cta::parse(block, &mut scope).map(Extension::Cta),
            DISPLAYID_EXTENSION_TAG => DisplayId::parse(&block[1..], &mut scope).map(Extension::DisplayId),
            _ => {
                if let ExtensionTag::Unknown(raw) = tag {
                    scope.fail(format!("Unknown extension tag 0x{:02X}", raw));
                }
                Ok(Extension::Opaque(RawExtension {
                    tag,
                    bytes: block.to_vec(),
                }))
            }
        };

        match parsed {
            Ok(ext) => Ok(ext),
            Err(e) if e.is_block_local() => {
                scope.fail(format!("Block truncated: {}", e));
                Ok(Extension::Opaque(RawExtension {
                    tag,
                    bytes: block.to_vec(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    pub fn tag(&self) -> ExtensionTag {
        match self {
            Extension::Cta(_) => ExtensionTag::Cta,
            Extension::DisplayId(_) => ExtensionTag::DisplayId,
            Extension::Opaque(raw) => raw.tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::finish_block;

    #[test]
    fn test_unknown_tag_is_opaque() {
        let mut block = [0u8; EDID_BLOCK_SIZE];
        block[0] = 0x33;
        block[5] = 0xAB;
        finish_block(&mut block);

        let mut diags = Diagnostics::new();
        let ext = Extension::parse(&block, 1, &mut diags).unwrap();
        match ext {
            Extension::Opaque(raw) => {
                assert_eq!(raw.tag, ExtensionTag::Unknown(0x33));
                assert_eq!(raw.bytes[5], 0xAB);
                assert_eq!(raw.bytes.len(), EDID_BLOCK_SIZE);
            }
            other => panic!("unexpected extension {:?}", other),
        }
        assert!(diags.contains("Unknown extension tag 0x33"));
    }

    #[test]
    fn test_known_undecoded_tag_is_quiet() {
        let mut block = [0u8; EDID_BLOCK_SIZE];
        block[0] = 0xF0;
        finish_block(&mut block);

        let mut diags = Diagnostics::new();
        let ext = Extension::parse(&block, 1, &mut diags).unwrap();
        assert_eq!(ext.tag(), ExtensionTag::BlockMap);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_bad_checksum_still_decodes() {
        let mut block = [0u8; EDID_BLOCK_SIZE];
        block[0] = CTA_EXTENSION_TAG;
        block[1] = 3;
        block[2] = 4;
        finish_block(&mut block);
        block[127] ^= 0xFF;

        let mut diags = Diagnostics::new();
        let ext = Extension::parse(&block, 2, &mut diags).unwrap();
        assert!(matches!(ext, Extension::Cta(_)));
        let d = diags.iter().next().unwrap();
        assert_eq!(d.block, Some(2));
        assert_eq!(d.message, "Invalid checksum");
    }
}
