//! Export Location Selection
//!
//! A share may be reachable through several export locations, some of them
//! reserved for administrators. One is picked for the volume.

use crate::domain::ports::ExportLocation;
use crate::error::{Error, Result};

/// Choose the export location a volume mounts.
///
/// Rules, applied in input order:
/// 1. admin-only locations and blank paths are skipped
/// 2. the first preferred location wins
/// 3. otherwise the first remaining location is used
pub fn choose_export_location(locations: &[ExportLocation]) -> Result<&ExportLocation> {
    if locations.is_empty() {
        return Err(Error::ExportLocationNotFound(
            "received an empty list of export locations".into(),
        ));
    }

    let mut first_usable = None;
    for location in locations {
        if location.is_admin_only || location.path.trim().is_empty() {
            continue;
        }
        if location.preferred {
            return Ok(location);
        }
        first_usable.get_or_insert(location);
    }

    first_usable.ok_or_else(|| {
        Error::ExportLocationNotFound("cannot find any non-admin export location".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn location(id: &str, path: &str, is_admin_only: bool, preferred: bool) -> ExportLocation {
        ExportLocation {
            path: path.into(),
            is_admin_only,
            preferred,
            id: id.into(),
            share_instance_id: None,
        }
    }

    #[test]
    fn test_empty_list() {
        assert_matches!(
            choose_export_location(&[]),
            Err(Error::ExportLocationNotFound(_))
        );
    }

    #[test]
    fn test_admin_only_is_never_chosen() {
        let locations = [location("a", "10.0.0.1:/a", true, true)];
        assert_matches!(
            choose_export_location(&locations),
            Err(Error::ExportLocationNotFound(_))
        );
    }

    #[test]
    fn test_blank_paths_are_skipped() {
        let locations = [
            location("a", "", false, true),
            location("b", " \t ", false, true),
            location("c", "10.0.0.3:/c", false, false),
        ];
        assert_eq!(choose_export_location(&locations).unwrap().id, "c");

        let blanks = [location("a", "", false, false), location("b", "  ", false, true)];
        assert!(choose_export_location(&blanks).is_err());
    }

    #[test]
    fn test_preferred_wins_over_order() {
        let locations = [
            location("a", "10.0.0.1:/a", false, false),
            location("b", "10.0.0.2:/b", false, true),
        ];
        assert_eq!(choose_export_location(&locations).unwrap().id, "b");
    }

    #[test]
    fn test_first_preferred_wins() {
        let locations = [
            location("a", "10.0.0.1:/a", true, true),
            location("b", "10.0.0.2:/b", false, true),
            location("c", "10.0.0.3:/c", false, true),
        ];
        assert_eq!(choose_export_location(&locations).unwrap().id, "b");
    }

    #[test]
    fn test_first_by_order_without_preference() {
        let locations = [
            location("a", "10.0.0.1:/a", false, false),
            location("b", "10.0.0.2:/b", false, false),
        ];
        assert_eq!(choose_export_location(&locations).unwrap().id, "a");
    }

    #[test]
    fn test_duplicate_paths_are_not_collapsed() {
        let locations = [
            location("a", "10.0.0.1:/a", true, false),
            location("b", "10.0.0.1:/a", false, false),
        ];
        assert_eq!(choose_export_location(&locations).unwrap().id, "b");
    }
}
