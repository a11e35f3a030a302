//! Public URLs for plans, sections and updates
//!
//! Paths mirror the public site: `{base}/{gov}/plan/{plan}/` and
//! `{base}/{gov}/{section}/`. Domain URLs prefix the configured site URL.

use crate::config::SiteConfig;
use crate::models::{Government, GovernmentPlan, GovernmentPlanSection, PublicBody};

/// Tag every pre-filled FOI request carries
pub const REQUEST_TAG: &str = "Koalitionstracker";

const MAX_SUBJECT_CHARS: usize = 250;

#[derive(Debug, Clone)]
pub struct SiteLinks {
    site_url: String,
    base_path: String,
    foi_request_path: String,
}

impl SiteLinks {
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            site_url: site.site_url.trim_end_matches('/').to_string(),
            base_path: site.base_path.clone(),
            foi_request_path: site.foi_request_path.clone(),
        }
    }

    pub fn plan_path(&self, government_slug: &str, plan_slug: &str) -> String {
        format!("{}/{}/plan/{}/", self.base_path, government_slug, plan_slug)
    }

    pub fn section_path(&self, government_slug: &str, section_slug: &str) -> String {
        format!("{}/{}/{}/", self.base_path, government_slug, section_slug)
    }

    pub fn update_path(&self, government_slug: &str, plan_slug: &str, update_id: i32) -> String {
        format!("{}#update-{}", self.plan_path(government_slug, plan_slug), update_id)
    }

    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }

    /// The planning document when there is one, else the tracker's start page
    pub fn government_url(&self, government: &Government) -> String {
        if !government.planning_document.is_empty() {
            return government.planning_document.clone();
        }
        if self.base_path.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", self.base_path)
        }
    }

    pub fn plan_url(&self, government: &Government, plan: &GovernmentPlan) -> String {
        self.absolute(&self.plan_path(&government.slug, &plan.slug))
    }

    pub fn section_url(&self, government: &Government, section: &GovernmentPlanSection) -> String {
        self.absolute(&self.section_path(&government.slug, &section.slug))
    }

    /// Pre-filled FOI request asking the responsible body about the plan
    pub fn request_url(&self, plan: &GovernmentPlan, public_body: &PublicBody) -> String {
        let mut subject = format!("Stand des Regierungsvorhabens „{}“", plan.title);
        if subject.chars().count() > MAX_SUBJECT_CHARS {
            subject = subject.chars().take(MAX_SUBJECT_CHARS).collect::<String>() + "...";
        }
        let body = format!(
            "Dokumente, die den Stand des Regierungsvorhabens „{}“ (siehe Koalitionsvertrag), dokumentieren.",
            plan.title
        );
        let path = self.foi_request_path.replace("{slug}", &public_body.slug);

        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("subject", &subject)
            .append_pair("body", &body)
            .append_pair("ref", &plan.foirequest_reference())
            .append_pair("tags", REQUEST_TAG)
            .append_pair("hide_public", "1")
            .append_pair("hide_similar", "1")
            .append_pair("hide_draft", "1")
            .finish();

        format!("{}{}?{}", self.site_url, path, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn links() -> SiteLinks {
        SiteLinks::new(&SiteConfig {
            site_url: "https://fragdenstaat.de/".to_string(),
            base_path: "/koalitionstracker".to_string(),
            search_language: "german".to_string(),
            foi_request_path: "/anfrage-stellen/an/{slug}/".to_string(),
        })
    }

    fn plan(title: &str) -> GovernmentPlan {
        GovernmentPlan {
            id: 42,
            government_id: 1,
            title: title.to_string(),
            slug: "buergergeld".to_string(),
            description: String::new(),
            quote: String::new(),
            public: true,
            due_date: None,
            measure: String::new(),
            status: crate::models::PlanStatus::NotStarted,
            rating: None,
            reference: String::new(),
            category_ids: vec![],
            responsible_publicbody_id: Some(1),
            group_id: None,
            proposals: None,
            properties: serde_json::json!({}),
        }
    }

    fn body() -> PublicBody {
        PublicBody {
            id: 1,
            name: "Bundesministerium für Arbeit und Soziales".to_string(),
            slug: "bmas".to_string(),
            jurisdiction_id: None,
        }
    }

    #[test]
    fn test_paths() {
        let links = links();
        assert_eq!(
            links.plan_path("ampel", "buergergeld"),
            "/koalitionstracker/ampel/plan/buergergeld/"
        );
        assert_eq!(
            links.update_path("ampel", "buergergeld", 9),
            "/koalitionstracker/ampel/plan/buergergeld/#update-9"
        );
        assert_eq!(
            links.absolute(&links.section_path("ampel", "arbeit")),
            "https://fragdenstaat.de/koalitionstracker/ampel/arbeit/"
        );
    }

    #[test]
    fn test_request_url() {
        let url = links().request_url(&plan("Bürgergeld"), &body());
        let parsed = url::Url::parse(&url).unwrap();

        assert_eq!(parsed.path(), "/anfrage-stellen/an/bmas/");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            pairs[0],
            (
                "subject".to_string(),
                "Stand des Regierungsvorhabens „Bürgergeld“".to_string()
            )
        );
        assert!(pairs.contains(&("ref".to_string(), "govplan:plan@42".to_string())));
        assert!(pairs.contains(&("hide_draft".to_string(), "1".to_string())));
    }

    #[test]
    fn test_request_subject_is_truncated() {
        let url = links().request_url(&plan(&"x".repeat(400)), &body());
        let parsed = url::Url::parse(&url).unwrap();
        let (_, subject) = parsed.query_pairs().next().unwrap();
        assert_eq!(subject.chars().count(), MAX_SUBJECT_CHARS + 3);
        assert!(subject.ends_with("..."));
    }
}
