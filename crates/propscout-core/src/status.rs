use crate::record::PropertyStatus;

/// Normalizes arbitrary status text (selector text, labeled-regex capture, or
/// keyword-scan match) into the fixed status vocabulary. Ordered by
/// specificity so "ready to move" matches before the looser "ready".
pub fn normalize_status(text: &str) -> PropertyStatus {
    let lower = text.to_lowercase();
    const ORDERED: &[(&str, PropertyStatus)] = &[
        ("ready to move", PropertyStatus::ReadyToMove),
        ("immediate possession", PropertyStatus::ImmediatePossession),
        ("under construction", PropertyStatus::UnderConstruction),
        ("new launch", PropertyStatus::NewLaunch),
        ("pre launch", PropertyStatus::PreLaunch),
        ("pre-launch", PropertyStatus::PreLaunch),
        ("resale", PropertyStatus::Resale),
        ("possession", PropertyStatus::PossessionDated),
        ("ready", PropertyStatus::ReadyToMove),
    ];
    for (needle, status) in ORDERED {
        if lower.contains(needle) {
            return *status;
        }
    }
    PropertyStatus::Unspecified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_to_move_beats_bare_ready() {
        assert_eq!(normalize_status("Ready to Move"), PropertyStatus::ReadyToMove);
        assert_eq!(normalize_status("Status: Ready"), PropertyStatus::ReadyToMove);
    }

    #[test]
    fn unmatched_text_is_unspecified() {
        assert_eq!(normalize_status("whatever"), PropertyStatus::Unspecified);
    }
}
