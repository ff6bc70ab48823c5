//! Pure text-to-struct parsers for the three telemetry sections the shell
//! emits: `status`, `cur_pro`/`feeder_pro` (process), and `getall`.
//!
//! None of these touch I/O or hold state; each takes the raw exec output and
//! returns a sparse typed record. Absent fields mean the device did not emit
//! the corresponding line in this sample, not a parse failure.

pub mod getall;
pub mod process;
pub mod status;

pub use getall::{parse_getall, GetAllValue, ParsedGetAll};
pub use process::{parse_process, ExtraKv, ParsedProcess};
pub use status::{parse_status, ParsedStatus};

use serde::Serialize;

/// A number that may be integral or fractional, matching the shell's own
/// ad hoc distinction (an integral float collapses to an int).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    /// Parse a numeric token, collapsing an integral float to an int exactly
    /// the way the shell's own number formatting does.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let v = raw.trim();
        if v.is_empty() {
            return None;
        }
        if v.contains('.') {
            let f: f64 = v.parse().ok()?;
            if f.fract() == 0.0 {
                Some(Num::Int(f as i64))
            } else {
                Some(Num::Float(f))
            }
        } else {
            v.parse::<i64>().ok().map(Num::Int)
        }
    }

    /// Parse as an int, silently dropping non-integral floats (a setter
    /// expecting an int never accepts a fractional value).
    #[must_use]
    pub fn parse_int(raw: &str) -> Option<i64> {
        match Self::parse(raw)? {
            Num::Int(i) => Some(i),
            Num::Float(f) if f.fract() == 0.0 => Some(f as i64),
            Num::Float(_) => None,
        }
    }
}

/// Split `text` into non-blank, non-prompt, CR-stripped lines, the common
/// first step of the process and getall parsers. The status parser instead
/// works over the whole CR-stripped text, since several of its fields are
/// found with a prefix search rather than a per-line scan.
pub(crate) fn normalized_lines(text: &str) -> Vec<String> {
    text.replace('\r', "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "msh >")
        .map(str::to_string)
        .collect()
}
