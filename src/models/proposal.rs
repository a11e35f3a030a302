//! Update proposals submitted by signed-in visitors
//!
//! A proposal never touches the plan's updates directly. It is parked in the
//! plan's `proposals` JSON object, keyed by the proposing user's id, until an
//! editor accepts or rejects it.

use crate::models::plan::{PlanRating, PlanStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateProposal {
    #[validate(length(min = 1, max = 1024, message = "Summarize the update in a title."))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[validate(url(message = "Please provide a link."))]
    pub url: String,
    #[serde(default, deserialize_with = "blank_status")]
    pub status: Option<PlanStatus>,
    #[serde(default, deserialize_with = "blank_rating")]
    pub rating: Option<PlanRating>,
}

/// Older rows store an unset choice as `""` and ratings as strings
fn blank_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<PlanStatus>, D::Error> {
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn blank_rating<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<PlanRating>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i32),
        Text(String),
    }

    let number = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Number(n)) => n,
        Some(Raw::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(Raw::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom)?,
    };
    PlanRating::try_from(number)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProposal {
    pub data: UpdateProposal,
    pub timestamp: DateTime<Utc>,
}

impl StoredProposal {
    pub fn new(data: UpdateProposal, now: DateTime<Utc>) -> Self {
        Self {
            data,
            timestamp: now,
        }
    }
}

/// One value of the `proposals` column. Entries that no longer parse are kept
/// verbatim so rewriting the column never loses them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProposalEntry {
    Stored(StoredProposal),
    Unreadable(serde_json::Value),
}

/// Typed view over a plan's `proposals` column
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proposals(pub BTreeMap<String, ProposalEntry>);

impl Proposals {
    pub fn from_column(value: Option<&serde_json::Value>) -> Self {
        let Some(serde_json::Value::Object(map)) = value else {
            return Self::default();
        };
        let entries = map
            .iter()
            .map(|(user, raw)| {
                let entry = serde_json::from_value(raw.clone())
                    .map(ProposalEntry::Stored)
                    .unwrap_or_else(|_| ProposalEntry::Unreadable(raw.clone()));
                (user.clone(), entry)
            })
            .collect();
        Self(entries)
    }

    pub fn to_column(&self) -> Option<serde_json::Value> {
        if self.0.is_empty() {
            return None;
        }
        serde_json::to_value(self).ok()
    }

    pub fn take(&mut self, user_id: i32) -> Option<ProposalEntry> {
        self.0.remove(&user_id.to_string())
    }
}

/// Body for accepting a proposal
#[derive(Debug, Default, Deserialize)]
pub struct AcceptProposal {
    #[serde(default)]
    pub public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn proposal(title: &str) -> UpdateProposal {
        UpdateProposal {
            title: title.to_string(),
            content: String::new(),
            url: "https://example.org/meldung".to_string(),
            status: Some(PlanStatus::Started),
            rating: None,
        }
    }

    fn stored(title: &str) -> ProposalEntry {
        ProposalEntry::Stored(StoredProposal::new(proposal(title), Utc::now()))
    }

    #[test]
    fn test_column_round_trip_and_take() {
        let mut proposals = Proposals::default();
        proposals.0.insert("3".to_string(), stored("Gesetz beschlossen"));

        let column = proposals.to_column();
        let mut restored = Proposals::from_column(column.as_ref());
        assert_eq!(restored, proposals);

        let Some(ProposalEntry::Stored(taken)) = restored.take(3) else {
            panic!("proposal of user 3 missing");
        };
        assert_eq!(taken.data.status, Some(PlanStatus::Started));
        assert_eq!(restored.to_column(), None);
    }

    #[test]
    fn test_blank_choices_from_older_rows() {
        let raw = serde_json::json!({"7": {
            "data": {"title": "Kabinett", "content": "", "url": "https://example.org",
                     "status": "", "rating": ""},
            "timestamp": "2021-05-01T12:00:00.123456+00:00"
        }, "8": {
            "data": {"title": "Bundesrat", "url": "https://example.org",
                     "status": "implemented", "rating": "4"},
            "timestamp": "2021-05-02T08:00:00+00:00"
        }});
        let proposals = Proposals::from_column(Some(&raw));

        let Some(ProposalEntry::Stored(blank)) = proposals.0.get("7") else {
            panic!("blank choices did not parse");
        };
        assert_eq!(blank.data.status, None);
        assert_eq!(blank.data.rating, None);
        let Some(ProposalEntry::Stored(filled)) = proposals.0.get("8") else {
            panic!("string rating did not parse");
        };
        assert_eq!(filled.data.status, Some(PlanStatus::Implemented));
        assert_eq!(filled.data.rating, Some(PlanRating::Good));
    }

    #[test]
    fn test_unreadable_entries_survive_a_rewrite() {
        let raw = serde_json::json!({"1": {"nope": true}});
        let mut proposals = Proposals::from_column(Some(&raw));
        proposals.0.insert("2".to_string(), stored("neu"));
        assert_eq!(proposals.take(2).map(|_| ()), Some(()));

        assert_eq!(proposals.to_column(), Some(raw));
        assert!(Proposals::from_column(None).0.is_empty());
    }

    #[test]
    fn test_proposal_validation() {
        assert!(proposal("ok").validate().is_ok());
        assert!(proposal("").validate().is_err());
        let mut bad_url = proposal("ok");
        bad_url.url = "kein link".to_string();
        assert!(bad_url.validate().is_err());
    }
}
