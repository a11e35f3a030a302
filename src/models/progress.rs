//! Status breakdown of a set of plans

use crate::models::plan::{GovernmentPlan, PlanStatus};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProgressSection {
    pub status: PlanStatus,
    pub label: &'static str,
    pub count: usize,
    pub css_class: &'static str,
    pub percentage: i64,
    pub css_percentage: String,
}

#[derive(Debug, Serialize)]
pub struct PlanProgress {
    pub count: usize,
    pub sections: Vec<ProgressSection>,
}

fn progress_css(status: PlanStatus) -> &'static str {
    match status {
        PlanStatus::NotStarted => "secondary",
        PlanStatus::Started => "primary",
        PlanStatus::PartiallyImplemented => "warning",
        PlanStatus::Implemented => "success",
        PlanStatus::Deferred => "danger",
    }
}

/// One entry per status, in display order
pub fn plan_progress(plans: &[GovernmentPlan]) -> PlanProgress {
    let total = plans.len();
    let sections = PlanStatus::ALL
        .into_iter()
        .map(|status| {
            let count = plans.iter().filter(|p| p.status == status).count();
            let percentage = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            ProgressSection {
                status,
                label: status.label(),
                count,
                css_class: progress_css(status),
                percentage: percentage.round_ties_even() as i64,
                css_percentage: percentage.to_string(),
            }
        })
        .collect();

    PlanProgress {
        count: total,
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn with_status(status: PlanStatus) -> GovernmentPlan {
        GovernmentPlan {
            id: 1,
            government_id: 1,
            title: String::new(),
            slug: String::new(),
            description: String::new(),
            quote: String::new(),
            public: true,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            measure: String::new(),
            status,
            rating: None,
            reference: String::new(),
            category_ids: vec![],
            responsible_publicbody_id: None,
            group_id: None,
            proposals: None,
            properties: serde_json::json!({}),
        }
    }

    #[test]
    fn test_progress_counts_and_rounds() {
        let plans = vec![
            with_status(PlanStatus::Started),
            with_status(PlanStatus::Started),
            with_status(PlanStatus::Implemented),
        ];
        let progress = plan_progress(&plans);

        assert_eq!(progress.count, 3);
        assert_eq!(progress.sections.len(), 5);
        let started = &progress.sections[1];
        assert_eq!(started.count, 2);
        assert_eq!(started.percentage, 67);
        assert_eq!(started.css_class, "primary");
        assert_eq!(progress.sections[3].percentage, 33);
        assert_eq!(progress.sections[0].percentage, 0);
    }

    #[test]
    fn test_progress_rounds_halves_to_even() {
        let mut plans = vec![with_status(PlanStatus::Started)];
        plans.extend((0..3).map(|_| with_status(PlanStatus::Implemented)));
        plans.extend((0..4).map(|_| with_status(PlanStatus::NotStarted)));
        let progress = plan_progress(&plans);

        // 12.5 and 37.5
        assert_eq!(progress.sections[1].percentage, 12);
        assert_eq!(progress.sections[3].percentage, 38);
        assert_eq!(progress.sections[1].css_percentage, "12.5");
    }

    #[test]
    fn test_progress_of_empty_list() {
        let progress = plan_progress(&[]);
        assert_eq!(progress.count, 0);
        assert!(progress.sections.iter().all(|s| s.percentage == 0));
    }
}
