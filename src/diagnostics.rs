//! Non-fatal problems found while decoding
//!
//! Real displays ship EDIDs with bad checksums, duplicate blocks and
//! out-of-range fields. Those are collected here and the decoder keeps going.

use serde::Serialize;
use std::fmt;
use tracing::debug;

/// A single non-fatal decoding problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Index of the 128-byte block the problem was found in
    pub block: Option<usize>,
    /// Section name, e.g. "Base EDID" or "CTA-861 Extension Block"
    pub context: String,
    pub message: String,
}

/// Ordered list of diagnostics accumulated over one parse
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Option<usize>, context: &str, message: impl Into<String>) {
        let message = message.into();
        debug!(?block, context, %message, "EDID diagnostic");
        self.entries.push(Diagnostic {
            block,
            context: context.to_string(),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Whether any diagnostic message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }
}

/// Records diagnostics against one block and section of the input
pub struct Scope<'d> {
    diags: &'d mut Diagnostics,
    block: Option<usize>,
    context: &'static str,
}

impl<'d> Scope<'d> {
    pub fn new(diags: &'d mut Diagnostics, block: Option<usize>, context: &'static str) -> Self {
        Self {
            diags,
            block,
            context,
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.diags.push(self.block, self.context, message);
    }
}

/// Renders the failure message in di-edid-decode layout: one heading per
/// block/section, messages indented beneath it.
impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut last: Option<(Option<usize>, &str)> = None;
        for d in &self.entries {
            let key = (d.block, d.context.as_str());
            if last != Some(key) {
                match d.block {
                    Some(block) => writeln!(f, "Block {}, {}:", block, d.context)?,
                    None => writeln!(f, "{}:", d.context)?,
                }
                last = Some(key);
            }
            writeln!(f, "  {}", d.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_output() {
        let mut diags = Diagnostics::new();
        diags.push(Some(0), "Base EDID", "Invalid checksum");
        diags.push(Some(0), "Base EDID", "Unknown descriptor tag 0x11");
        diags.push(Some(1), "CTA-861 Extension Block", "Empty data block");

        let text = diags.to_string();
        assert_eq!(
            text,
            "Block 0, Base EDID:\n  Invalid checksum\n  Unknown descriptor tag 0x11\n\
             Block 1, CTA-861 Extension Block:\n  Empty data block\n"
        );
        assert_eq!(diags.len(), 3);
        assert!(diags.contains("descriptor tag"));
    }
}
