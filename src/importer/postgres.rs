//! Import target writing into PostgreSQL inside one transaction

use crate::db::lookups::{find_or_create_category, public_body_id_by_name, set_categories};
use crate::db::queries::SqlBuilder;
use crate::db::unique_slug;
use crate::importer::{ImportError, ImportTarget, ImportedPlan, PlanField, UpsertOutcome};
use crate::models::Government;
use deadpool_postgres::Transaction;

/// Writes plans through a transaction; nothing is visible until [`commit`]
///
/// [`commit`]: PgImportTarget::commit
pub struct PgImportTarget<'a> {
    tx: Transaction<'a>,
}

impl<'a> PgImportTarget<'a> {
    pub fn new(tx: Transaction<'a>) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> Result<(), ImportError> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl ImportTarget for PgImportTarget<'_> {
    async fn find_public_body(&mut self, name: &str) -> Result<Option<i32>, ImportError> {
        Ok(public_body_id_by_name(&*self.tx, name).await?)
    }

    async fn upsert_plan(
        &mut self,
        government: &Government,
        plan: &ImportedPlan,
    ) -> Result<UpsertOutcome, ImportError> {
        let existing = self
            .tx
            .query_opt(
                "SELECT id FROM government_plans WHERE government_id = $1 AND title = $2
                 ORDER BY id LIMIT 1",
                &[&government.id, &plan.title],
            )
            .await?;

        let (id, outcome): (i32, _) = match existing {
            Some(row) => (row.get(0), UpsertOutcome::Updated),
            None => {
                let slug = unique_slug(&*self.tx, "government_plans", &plan.title).await?;
                let row = self
                    .tx
                    .query_one(
                        "INSERT INTO government_plans (government_id, title, slug)
                         VALUES ($1, $2, $3) RETURNING id",
                        &[&government.id, &plan.title, &slug],
                    )
                    .await?;
                (row.get(0), UpsertOutcome::Created)
            }
        };

        let mut builder = SqlBuilder::new();
        let mut assignments = Vec::new();
        let mut properties = Vec::new();
        let mut categories = None;
        for field in &plan.fields {
            let assignment = match field {
                PlanField::Description(text) => format!("description = {}", builder.bind(text.clone())),
                PlanField::Quote(text) => format!("quote = {}", builder.bind(text.clone())),
                PlanField::Measure(text) => format!("measure = {}", builder.bind(text.clone())),
                PlanField::Reference(text) => format!("reference = {}", builder.bind(text.clone())),
                PlanField::DueDate(date) => format!("due_date = {}", builder.bind(*date)),
                PlanField::Status(status) => {
                    format!("status = {}", builder.bind(status.as_str().to_string()))
                }
                PlanField::Rating(rating) => {
                    format!("rating = {}", builder.bind(rating.map(i32::from)))
                }
                PlanField::ResponsibleBody(id) => {
                    format!("responsible_publicbody_id = {}", builder.bind(*id))
                }
                PlanField::Public(public) => format!("public = {}", builder.bind(*public)),
                PlanField::Property(key, value) => {
                    let k = builder.bind(key.clone());
                    let v = builder.bind(value.clone());
                    properties.push(format!("{}::text, {}::text", k, v));
                    continue;
                }
                PlanField::Categories(names) => {
                    categories = Some(names);
                    continue;
                }
            };
            assignments.push(assignment);
        }

        // one assignment per column, so all properties merge in a single object
        if !properties.is_empty() {
            assignments.push(format!(
                "properties = properties || jsonb_build_object({})",
                properties.join(", ")
            ));
        }
        if !assignments.is_empty() {
            let p = builder.bind(id);
            let sql = format!(
                "UPDATE government_plans SET {} WHERE id = {}",
                assignments.join(", "),
                p
            );
            self.tx.execute(&sql, &builder.params()).await?;
        }

        if let Some(names) = categories {
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                ids.push(find_or_create_category(&*self.tx, name).await?);
            }
            set_categories(&*self.tx, "government_plan_categories", "plan_id", id, &ids).await?;
        }

        Ok(outcome)
    }
}
