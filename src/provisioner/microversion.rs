//! Microversion Negotiation
//!
//! Manila versions its API with `major.minor` microversions. The client pins
//! one and must fall inside the `[min_version, version]` range the server
//! advertises.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed `major.minor` microversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Microversion {
    pub major: u32,
    pub minor: u32,
}

impl Microversion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for Microversion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMicroversion {
            version: s.to_string(),
        };

        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: parse_component(major).ok_or_else(invalid)?,
            minor: parse_component(minor).ok_or_else(invalid)?,
        })
    }
}

impl fmt::Display for Microversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Non-empty run of ASCII digits that fits in a `u32`
fn parse_component(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Check that `version` has the `<digits>.<digits>` form
pub fn validate_microversion(version: &str) -> Result<()> {
    version.parse::<Microversion>().map(|_| ())
}

/// Split a valid microversion into `(major, minor)`
pub fn split_microversion(version: &str) -> Result<(u32, u32)> {
    let mv: Microversion = version.parse()?;
    Ok((mv.major, mv.minor))
}

/// Verify the client microversion is within the server's advertised range.
///
/// Both server bounds are validated first so a malformed server answer is
/// reported as such rather than as a range mismatch.
pub fn check_microversion(client: &str, min: &str, max: &str) -> Result<Microversion> {
    let min_mv: Microversion = min.parse()?;
    let max_mv: Microversion = max.parse()?;
    let client_mv: Microversion = client.parse()?;

    if client_mv < min_mv || client_mv > max_mv {
        return Err(Error::UnsupportedMicroversion {
            client: client.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }

    Ok(client_mv)
}
