//! Builders for synthetic EDID blobs used across the unit tests

use crate::edid::{EDID_BLOCK_SIZE, EDID_HEADER};

const DTD_1080P: [u8; 18] = [
    0x02, 0x3A, 0x80, 0x18, 0x71, 0x38, 0x2D, 0x40, 0x58, 0x2C, 0x45, 0x00, 0x0F, 0x48, 0x42, 0x00,
    0x00, 0x1E,
];

const RANGE_LIMITS: [u8; 18] = [
    0x00, 0x00, 0x00, 0xFD, 0x00, 50, 75, 30, 160, 17, 0x01, 0x0A, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
];

const DUMMY: [u8; 18] = [0x00, 0x00, 0x00, 0x10, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// sRGB primaries and D65 white point
pub const SRGB_CHROMATICITY: [u8; 10] = [0xEE, 0x91, 0xA3, 0x54, 0x4C, 0x99, 0x26, 0x0F, 0x50, 0x54];

/// Set byte 127 so the block sums to zero
pub fn finish_block(block: &mut [u8; EDID_BLOCK_SIZE]) {
    let sum = block[..EDID_BLOCK_SIZE - 1]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    block[EDID_BLOCK_SIZE - 1] = 0u8.wrapping_sub(sum);
}

/// Display descriptor holding `text`, newline terminated and space padded
pub fn text_descriptor(tag: u8, text: &str) -> [u8; 18] {
    let mut d = [0x20u8; 18];
    d[..5].copy_from_slice(&[0, 0, 0, tag, 0]);
    let bytes = text.as_bytes();
    d[5..5 + bytes.len()].copy_from_slice(bytes);
    if bytes.len() < 13 {
        d[5 + bytes.len()] = 0x0A;
    }
    d
}

/// CTA-861 revision 3 block with the given data blocks and no DTDs
pub fn cta_block(data_blocks: &[&[u8]]) -> [u8; EDID_BLOCK_SIZE] {
    let mut block = [0u8; EDID_BLOCK_SIZE];
    block[0] = 0x02;
    block[1] = 3;
    let mut pos = 4;
    for db in data_blocks {
        block[pos..pos + db.len()].copy_from_slice(db);
        pos += db.len();
    }
    block[2] = pos as u8;
    finish_block(&mut block);
    block
}

/// A DisplayID section (header, data blocks, checksum) without the
/// extension tag
pub fn displayid_section(version: u8, data_blocks: &[&[u8]]) -> Vec<u8> {
    let payload: Vec<u8> = data_blocks.iter().flat_map(|b| b.iter().copied()).collect();
    let mut section = vec![version, payload.len() as u8, 0x00, 0x00];
    section.extend_from_slice(&payload);
    let sum = section.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    section.push(0u8.wrapping_sub(sum));
    section
}

/// DisplayID 1.2 extension block
pub fn displayid_block(data_blocks: &[&[u8]]) -> [u8; EDID_BLOCK_SIZE] {
    let section = displayid_section(0x12, data_blocks);
    let mut block = [0u8; EDID_BLOCK_SIZE];
    block[0] = 0x70;
    block[1..1 + section.len()].copy_from_slice(&section);
    finish_block(&mut block);
    block
}

/// Valid EDID 1.4 base block for a 1080p DisplayPort monitor, "ACM" 0x1234
pub struct BaseBlockBuilder {
    base: [u8; EDID_BLOCK_SIZE],
    extensions: Vec<[u8; EDID_BLOCK_SIZE]>,
}

impl BaseBlockBuilder {
    pub fn new() -> Self {
        let mut base = [0u8; EDID_BLOCK_SIZE];
        base[..8].copy_from_slice(&EDID_HEADER);
        base[0x10] = 10;
        base[0x11] = 33;
        base[0x12] = 1;
        base[0x13] = 4;
        base[0x14] = 0xA5;
        base[0x15] = 60;
        base[0x16] = 34;
        base[0x17] = 120;
        base[0x18] = 0x06;
        base[0x19..0x23].copy_from_slice(&SRGB_CHROMATICITY);
        base[0x23..0x26].copy_from_slice(&[0x21, 0x08, 0x00]);
        base[0x26] = 0xD1;
        base[0x27] = 0xC0;
        for slot in base[0x28..0x36].chunks_exact_mut(2) {
            slot.copy_from_slice(&[0x01, 0x01]);
        }

        let builder = Self {
            base,
            extensions: Vec::new(),
        };
        builder
            .manufacturer("ACM")
            .product(0x1234)
            .descriptor(0, DTD_1080P)
            .descriptor(1, text_descriptor(0xFC, "ACME Display"))
            .descriptor(2, RANGE_LIMITS)
            .descriptor(3, DUMMY)
    }

    pub fn manufacturer(mut self, id: &str) -> Self {
        let raw = id
            .bytes()
            .fold(0u16, |acc, c| (acc << 5) | u16::from(c - b'@'));
        self.base[0x08..0x0A].copy_from_slice(&raw.to_be_bytes());
        self
    }

    pub fn product(mut self, product: u16) -> Self {
        self.base[0x0A..0x0C].copy_from_slice(&product.to_le_bytes());
        self
    }

    pub fn serial(mut self, serial: u32) -> Self {
        self.base[0x0C..0x10].copy_from_slice(&serial.to_le_bytes());
        self
    }

    pub fn revision(mut self, revision: u8) -> Self {
        self.base[0x13] = revision;
        self
    }

    pub fn gamma(mut self, raw: u8) -> Self {
        self.base[0x17] = raw;
        self
    }

    pub fn features(mut self, features: u8) -> Self {
        self.base[0x18] = features;
        self
    }

    pub fn chromaticity(mut self, raw: [u8; 10]) -> Self {
        self.base[0x19..0x23].copy_from_slice(&raw);
        self
    }

    pub fn descriptor(mut self, slot: usize, raw: [u8; 18]) -> Self {
        let start = 0x36 + slot * 18;
        self.base[start..start + 18].copy_from_slice(&raw);
        self
    }

    /// Declared count only, no block is appended
    pub fn extension_count(mut self, count: u8) -> Self {
        self.base[0x7E] = count;
        self
    }

    pub fn extension(mut self, block: [u8; EDID_BLOCK_SIZE]) -> Self {
        self.extensions.push(block);
        self.base[0x7E] += 1;
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        finish_block(&mut self.base);
        let mut data = self.base.to_vec();
        for ext in &self.extensions {
            data.extend_from_slice(ext);
        }
        data
    }
}
