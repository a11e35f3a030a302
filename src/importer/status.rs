//! Free-text status cells to `PlanStatus`

use crate::models::PlanStatus;

/// Map a status cell to a status. `None` for blank or unrecognised text.
pub fn normalize_status(input: &str) -> Option<PlanStatus> {
    let normalized = input
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let status = match normalized.as_str() {
        "not started" | "nicht begonnen" | "noch nicht begonnen" | "nicht gestartet"
        | "offen" => PlanStatus::NotStarted,
        "started" | "begonnen" | "gestartet" | "in arbeit" | "in umsetzung" | "läuft"
        | "in progress" => PlanStatus::Started,
        "partially implemented" | "teilweise umgesetzt" | "teilweise" | "teilweise erledigt"
        | "teilweise erfüllt" => PlanStatus::PartiallyImplemented,
        "implemented" | "umgesetzt" | "erledigt" | "abgeschlossen" | "erfüllt" | "done" => {
            PlanStatus::Implemented
        }
        "deferred" | "verschoben" | "zurückgestellt" | "auf eis gelegt" | "gestoppt" => {
            PlanStatus::Deferred
        }
        _ => return None,
    };
    Some(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_values_and_labels() {
        for status in PlanStatus::ALL {
            assert_eq!(normalize_status(status.as_str()), Some(status));
            assert_eq!(normalize_status(status.label()), Some(status));
        }
    }

    #[test]
    fn test_german_labels() {
        assert_eq!(normalize_status("  Teilweise  umgesetzt "), Some(PlanStatus::PartiallyImplemented));
        assert_eq!(normalize_status("Nicht begonnen"), Some(PlanStatus::NotStarted));
        assert_eq!(normalize_status("UMGESETZT"), Some(PlanStatus::Implemented));
        assert_eq!(normalize_status("Verschoben"), Some(PlanStatus::Deferred));
        assert_eq!(normalize_status("in-Arbeit"), Some(PlanStatus::Started));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(normalize_status(""), None);
        assert_eq!(normalize_status("vielleicht"), None);
    }
}
