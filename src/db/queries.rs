//! SQL fragments and a small builder for filtered queries
//!
//! Plan and update queries always join their government (`g`) so visibility
//! can be decided in one statement. Aliases: `g` governments, `p` plans,
//! `u` updates, `s` sections.

use crate::auth::PlanScope;
use postgres_types::ToSql;

pub const GOVERNMENT_COLUMNS: &str = r#"
    g.id, g.name, g.slug, g.public, g.jurisdiction_id, g.description,
    g.start_date, g.end_date, g.active, g.planning_document
"#;

pub const PLAN_COLUMNS: &str = r#"
    p.id, p.government_id, p.title, p.slug, p.description, p.quote, p.public,
    p.due_date, p.measure, p.status, p.rating, p.reference,
    ARRAY(
        SELECT pc.category_id FROM government_plan_categories pc
        WHERE pc.plan_id = p.id ORDER BY pc.category_id
    ) AS category_ids,
    p.responsible_publicbody_id, p.group_id, p.proposals, p.properties
"#;

pub const PLAN_FROM: &str = r#"
    FROM government_plans p
    JOIN governments g ON g.id = p.government_id
"#;

pub const UPDATE_COLUMNS: &str = r#"
    u.id, u.plan_id, u.user_id, u.timestamp, u.title, u.content, u.url,
    u.status, u.rating, u.public, u.foirequest_id
"#;

pub const UPDATE_FROM: &str = r#"
    FROM government_plan_updates u
    JOIN government_plans p ON p.id = u.plan_id
    JOIN governments g ON g.id = p.government_id
"#;

pub const SECTION_COLUMNS: &str = r#"
    s.id, s.government_id, s.title, s.slug,
    ARRAY(
        SELECT sc.category_id FROM government_plan_section_categories sc
        WHERE sc.section_id = s.id ORDER BY sc.category_id
    ) AS category_ids,
    s.description, s.icon, s.sort_order, s.featured
"#;

/// Default plan ordering
pub const PLAN_ORDER: &str = "p.reference, p.title, p.id";

pub type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Collects WHERE conditions and their positional parameters
#[derive(Default)]
pub struct SqlBuilder {
    conditions: Vec<String>,
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its placeholder (`$n`)
    pub fn bind<T>(&mut self, value: T) -> String
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.params.push(Box::new(value));
        format!("${}", self.params.len())
    }

    pub fn filter(&mut self, condition: impl Into<String>) {
        self.conditions.push(condition.into());
    }

    /// Restrict plans (alias `p`, government alias `g`) to a viewer scope
    pub fn scope(&mut self, scope: &PlanScope) {
        match scope {
            PlanScope::All => {}
            PlanScope::Public => self.filter("p.public AND g.public"),
            PlanScope::Groups(groups) => {
                let placeholder = self.bind(groups.clone());
                self.filter(format!("p.group_id = ANY({})", placeholder));
            }
        }
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| &**p as &(dyn ToSql + Sync))
            .collect()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// LIMIT/OFFSET clause; `None` limit means no limit
pub fn limit_clause(limit: Option<i64>, offset: i64) -> String {
    match limit {
        Some(limit) => format!(" LIMIT {} OFFSET {}", limit.max(0), offset.max(0)),
        None => format!(" OFFSET {}", offset.max(0)),
    }
}
