//! Who may see which governments, plans and updates

use crate::auth::Claims;
use crate::models::{Government, GovernmentPlan};

/// The caller of a request, anonymous when no bearer token was sent
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

/// Row set of plans a viewer is allowed to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanScope {
    All,
    /// Public plans of public governments
    Public,
    /// Plans assigned to one of these editor groups
    Groups(Vec<i32>),
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user_id(&self) -> Option<i32> {
        self.0.as_ref().map(|c| c.sub)
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_staff(&self) -> bool {
        self.0.as_ref().is_some_and(|c| c.is_staff)
    }

    /// Anonymous visitors and users without the manage-plans permission
    pub fn has_limited_access(&self) -> bool {
        !self.0.as_ref().is_some_and(|c| c.can_manage_plans)
    }

    /// Plans the viewer may edit
    pub fn allowed_plans(&self) -> PlanScope {
        if !self.has_limited_access() {
            return PlanScope::All;
        }
        let groups = self.0.as_ref().map(|c| c.groups.clone()).unwrap_or_default();
        PlanScope::Groups(groups)
    }

    /// Plans the viewer may read on the public site
    pub fn visible_plans(&self) -> PlanScope {
        if self.has_limited_access() {
            PlanScope::Public
        } else {
            PlanScope::All
        }
    }

    /// Staff may open governments that are not public yet
    pub fn sees_hidden_governments(&self) -> bool {
        self.is_staff()
    }

    pub fn sees_hidden_updates(&self) -> bool {
        !self.has_limited_access()
    }

    pub fn can_see_government(&self, government: &Government) -> bool {
        government.public || self.sees_hidden_governments()
    }
}

impl PlanScope {
    pub fn permits(&self, plan: &GovernmentPlan, government: &Government) -> bool {
        match self {
            PlanScope::All => true,
            PlanScope::Public => plan.public && government.public,
            PlanScope::Groups(groups) => plan.group_id.is_some_and(|g| groups.contains(&g)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;
    use crate::models::PlanStatus;

    fn claims(is_staff: bool, can_manage_plans: bool, groups: Vec<i32>) -> Claims {
        Claims {
            sub: 1,
            email: "user@example.org".to_string(),
            is_staff,
            can_manage_plans,
            groups,
            exp: 0,
            iat: 0,
            token_type: TokenType::Access,
        }
    }

    fn government(public: bool) -> Government {
        Government {
            id: 1,
            name: "Ampel".to_string(),
            slug: "ampel".to_string(),
            public,
            jurisdiction_id: None,
            description: String::new(),
            start_date: None,
            end_date: None,
            active: true,
            planning_document: String::new(),
        }
    }

    fn plan(public: bool, group_id: Option<i32>) -> GovernmentPlan {
        GovernmentPlan {
            id: 1,
            government_id: 1,
            title: "Plan".to_string(),
            slug: "plan".to_string(),
            description: String::new(),
            quote: String::new(),
            public,
            due_date: None,
            measure: String::new(),
            status: PlanStatus::NotStarted,
            rating: None,
            reference: String::new(),
            category_ids: vec![],
            responsible_publicbody_id: None,
            group_id,
            proposals: None,
            properties: serde_json::json!({}),
        }
    }

    #[test]
    fn test_anonymous_never_sees_hidden_rows() {
        let viewer = Viewer::anonymous();
        assert!(viewer.has_limited_access());
        assert_eq!(viewer.visible_plans(), PlanScope::Public);

        for gov_public in [true, false] {
            let gov = government(gov_public);
            assert_eq!(viewer.can_see_government(&gov), gov_public);
            for plan_public in [true, false] {
                let plan = plan(plan_public, None);
                let visible = viewer.visible_plans().permits(&plan, &gov);
                assert_eq!(visible, plan_public && gov_public);
            }
        }
        assert!(!viewer.sees_hidden_updates());
    }

    #[test]
    fn test_anonymous_is_allowed_no_plans() {
        let viewer = Viewer::anonymous();
        assert_eq!(viewer.allowed_plans(), PlanScope::Groups(vec![]));
        assert!(!viewer
            .allowed_plans()
            .permits(&plan(true, Some(1)), &government(true)));
    }

    #[test]
    fn test_limited_editor_is_scoped_to_groups() {
        let viewer = Viewer(Some(claims(true, false, vec![2, 5])));
        let scope = viewer.allowed_plans();
        let gov = government(false);

        assert!(scope.permits(&plan(false, Some(5)), &gov));
        assert!(!scope.permits(&plan(true, Some(3)), &gov));
        assert!(!scope.permits(&plan(true, None), &gov));
        // staff without the permission still only reads public plans
        assert_eq!(viewer.visible_plans(), PlanScope::Public);
        assert!(viewer.can_see_government(&gov));
    }

    #[test]
    fn test_plan_manager_sees_everything() {
        let viewer = Viewer(Some(claims(true, true, vec![])));
        assert_eq!(viewer.allowed_plans(), PlanScope::All);
        assert_eq!(viewer.visible_plans(), PlanScope::All);
        assert!(viewer.sees_hidden_updates());
        assert!(viewer
            .visible_plans()
            .permits(&plan(false, None), &government(false)));
    }
}
