//! Zone Resolution
//!
//! Parses the `zones` storage class parameter and spreads claims across a
//! set of availability zones with a stable hash of the claim name.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use tracing::debug;

/// Parse a comma separated zone list into a set.
///
/// Entries are trimmed; an entry that is empty after trimming rejects the
/// whole list.
pub fn zones_to_set(zones: &str) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for zone in zones.split(',') {
        let zone = zone.trim();
        if zone.is_empty() {
            return Err(Error::Validation(format!(
                "comma separated list of zones ({zones:?}) must not contain an empty zone"
            )));
        }
        set.insert(zone.to_string());
    }
    Ok(set)
}

/// Pick the zone a claim is provisioned in.
///
/// Zones are taken in sorted order and indexed by an FNV-1 hash of the claim
/// name. Names shaped like StatefulSet claims (`<claim>-<set>-<ordinal>`)
/// hash only `<set>` (everything between the first and the last dash) and
/// add the ordinal to the index, so the members of one
/// set round-robin across zones while all claims of one member stay together.
///
/// Returns `None` only when `zones` is empty.
pub fn choose_zone<'a>(zones: &'a BTreeSet<String>, claim_name: &str) -> Option<&'a str> {
    if zones.is_empty() {
        return None;
    }

    let (hash, index) = claim_name_hash_and_index(claim_name);
    let position = hash.wrapping_add(index) as usize % zones.len();
    zones.iter().nth(position).map(String::as_str)
}

fn claim_name_hash_and_index(claim_name: &str) -> (u32, u32) {
    let mut hash_input = claim_name;
    let mut index = 0;

    if let Some((prefix, ordinal)) = claim_name.rsplit_once('-') {
        if let Some(ordinal) = parse_ordinal(ordinal) {
            index = ordinal;
            hash_input = prefix.split_once('-').map_or(prefix, |(_, set)| set);
            debug!("Claim {} looks like StatefulSet member {}", claim_name, index);
        }
    }

    (fnv1_32(hash_input.as_bytes()), index)
}

/// Unsigned decimal ordinal; signs and anything beyond 32 bits are rejected
fn parse_ordinal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// 32-bit FNV-1 (multiply, then xor)
fn fnv1_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        hash.wrapping_mul(PRIME) ^ u32::from(b)
    })
}
