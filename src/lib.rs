//! EDID / CTA-861 / DisplayID decoder
//!
//! Turns the raw EDID blob a display reports (128-byte base block plus
//! extension blocks) into a typed document, derives the few facts most
//! consumers actually want, and renders a `di-edid-decode` style report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │   info: parse() + derived gamma / primaries / HDR / color   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │   edid: base block, descriptors, detailed timings           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │   extension: dispatch on tag byte                           │
//! │  ┌─────────────────────┐  ┌──────────────────────────────┐  │
//! │  │ cta (0x02)          │  │ displayid (0x70)             │  │
//! │  └─────────────────────┘  └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                   reader: bounds-checked cursor
//! ```
//!
//! Structural problems abort the parse with an [`Error`]. Everything else is
//! collected as diagnostics next to the decoded document.
//!
//! # Usage
//!
//! ```rust,ignore
//! let bytes = std::fs::read("/sys/class/drm/card0-DP-1/edid")?;
//! let info = display_info::parse(&bytes)?;
//! println!("{:?} {:?}", info.derived.make, info.derived.model);
//! if let Some(msg) = info.failure_msg() {
//!     eprintln!("{}", msg);
//! }
//! ```

pub mod config;
pub mod cta;
pub mod descriptor;
pub mod detailed_timing;
pub mod diagnostics;
pub mod displayid;
pub mod edid;
pub mod error;
pub mod extension;
pub mod info;
pub mod reader;
pub mod report;

#[cfg(test)]
mod testutil;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use edid::Edid;
pub use error::Error;
pub use info::{parse, DerivedInfo, Info};
pub use report::{render, Report, ReportOptions};

pub type Result<T> = std::result::Result<T, Error>;
