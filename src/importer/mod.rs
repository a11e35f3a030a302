//! CSV import of plans
//!
//! A column mapping (JSON object, field name to CSV column) says where each
//! plan field comes from. Rows are parsed into [`ImportedPlan`]s and handed
//! to an [`ImportTarget`], which upserts them by (government, title).

mod dates;
mod postgres;
mod status;

pub use dates::parse_date_phrase;
pub use postgres::PgImportTarget;
pub use status::normalize_status;

use crate::models::{Government, PlanRating, PlanStatus};
use crate::sanitize::clean_rich_text;
use chrono::NaiveDate;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

const PROPERTY_PREFIX: &str = "properties.";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Column mapping must be a JSON object of field names to column names")]
    InvalidMapping,

    #[error("Unknown field '{0}' in column mapping")]
    UnknownField(String),

    #[error("Column mapping must map the 'title' field")]
    MissingTitle,

    #[error("Column '{0}' not found in CSV header")]
    MissingColumn(String),

    #[error("Row {row}: no public body named '{name}'")]
    UnknownPublicBody { row: usize, name: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Quote,
    Measure,
    Reference,
    DueDate,
    Status,
    Rating,
    ResponsibleBody,
    Categories,
    Public,
    Property(String),
}

impl FromStr for Field {
    type Err = ImportError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let field = match name {
            "title" => Field::Title,
            "description" => Field::Description,
            "quote" => Field::Quote,
            "measure" => Field::Measure,
            "reference" => Field::Reference,
            "due_date" => Field::DueDate,
            "status" => Field::Status,
            "rating" => Field::Rating,
            "responsible_publicbody" => Field::ResponsibleBody,
            "categories" => Field::Categories,
            "public" => Field::Public,
            other => match other.strip_prefix(PROPERTY_PREFIX) {
                Some(key) if !key.is_empty() => Field::Property(key.to_string()),
                _ => return Err(ImportError::UnknownField(other.to_string())),
            },
        };
        Ok(field)
    }
}

/// Which CSV column feeds which plan field
#[derive(Debug, Clone)]
pub struct ColumnMapping(Vec<(Field, String)>);

impl ColumnMapping {
    /// Parse and check a mapping before any row is read
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ImportError> {
        let object = value.as_object().ok_or(ImportError::InvalidMapping)?;
        let mut fields = Vec::with_capacity(object.len());
        for (name, column) in object {
            let column = column.as_str().ok_or(ImportError::InvalidMapping)?;
            fields.push((name.parse::<Field>()?, column.to_string()));
        }
        if !fields.iter().any(|(field, _)| *field == Field::Title) {
            return Err(ImportError::MissingTitle);
        }
        Ok(Self(fields))
    }

    fn resolve(&self, headers: &csv::StringRecord) -> Result<Vec<(Field, usize)>, ImportError> {
        self.0
            .iter()
            .map(|(field, column)| {
                headers
                    .iter()
                    .position(|h| h.trim() == column)
                    .map(|index| (field.clone(), index))
                    .ok_or_else(|| ImportError::MissingColumn(column.clone()))
            })
            .collect()
    }
}

/// One parsed value to write onto a plan
#[derive(Debug, Clone, PartialEq)]
pub enum PlanField {
    Description(String),
    Quote(String),
    Measure(String),
    Reference(String),
    DueDate(Option<NaiveDate>),
    Status(PlanStatus),
    Rating(Option<PlanRating>),
    ResponsibleBody(Option<i32>),
    /// Category names
    Categories(Vec<String>),
    Public(bool),
    Property(String, String),
}

/// A parsed row, identified by its title within the government
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedPlan {
    pub title: String,
    pub fields: Vec<PlanField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Where imported plans are written
pub trait ImportTarget {
    async fn find_public_body(&mut self, name: &str) -> Result<Option<i32>, ImportError>;

    async fn upsert_plan(
        &mut self,
        government: &Government,
        plan: &ImportedPlan,
    ) -> Result<UpsertOutcome, ImportError>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} skipped",
            self.created, self.updated, self.skipped
        )
    }
}

pub struct PlanImporter {
    government: Government,
    mapping: ColumnMapping,
}

impl PlanImporter {
    pub fn new(government: Government, mapping: ColumnMapping) -> Self {
        Self {
            government,
            mapping,
        }
    }

    /// Import every row; the first failing row aborts the run
    pub async fn import_rows<R: Read, T: ImportTarget>(
        &self,
        reader: R,
        target: &mut T,
    ) -> Result<ImportSummary, ImportError> {
        let mut csv = csv::Reader::from_reader(reader);
        let columns = self.mapping.resolve(csv.headers()?)?;
        let mut summary = ImportSummary::default();

        for (index, record) in csv.records().enumerate() {
            let record = record?;
            // line 1 is the header
            let row = index + 2;
            let Some(plan) = self.parse_row(row, &columns, &record, target).await? else {
                warn!(row, "Skipping row without title");
                summary.skipped += 1;
                continue;
            };
            match target.upsert_plan(&self.government, &plan).await? {
                UpsertOutcome::Created => summary.created += 1,
                UpsertOutcome::Updated => summary.updated += 1,
            }
            debug!(row, title = %plan.title, "Imported plan");
        }

        info!(government = %self.government.slug, %summary, "Import finished");
        Ok(summary)
    }

    async fn parse_row<T: ImportTarget>(
        &self,
        row: usize,
        columns: &[(Field, usize)],
        record: &csv::StringRecord,
        target: &mut T,
    ) -> Result<Option<ImportedPlan>, ImportError> {
        let mut title = String::new();
        let mut fields = Vec::with_capacity(columns.len());

        for (field, index) in columns {
            let value = record.get(*index).unwrap_or("").trim();
            let parsed = match field {
                Field::Title => {
                    title = value.to_string();
                    continue;
                }
                Field::Description => PlanField::Description(clean_rich_text(value)),
                Field::Quote => PlanField::Quote(value.to_string()),
                Field::Measure => PlanField::Measure(value.to_string()),
                Field::Reference => PlanField::Reference(value.to_string()),
                Field::DueDate => {
                    let date = parse_date_phrase(value, self.government.end_date);
                    if date.is_none() && !value.is_empty() {
                        warn!(row, value, "Could not parse due date");
                    }
                    PlanField::DueDate(date)
                }
                Field::Status => PlanField::Status(parse_status(row, value)),
                Field::Rating => PlanField::Rating(parse_rating(row, value)),
                Field::ResponsibleBody => {
                    if value.is_empty() {
                        PlanField::ResponsibleBody(None)
                    } else {
                        let id = target.find_public_body(value).await?.ok_or_else(|| {
                            ImportError::UnknownPublicBody {
                                row,
                                name: value.to_string(),
                            }
                        })?;
                        PlanField::ResponsibleBody(Some(id))
                    }
                }
                Field::Categories => PlanField::Categories(split_categories(value)),
                Field::Public => PlanField::Public(is_truthy(value)),
                Field::Property(key) => PlanField::Property(key.clone(), value.to_string()),
            };
            fields.push(parsed);
        }

        if title.is_empty() {
            return Ok(None);
        }
        Ok(Some(ImportedPlan { title, fields }))
    }
}

fn parse_status(row: usize, value: &str) -> PlanStatus {
    if value.is_empty() {
        return PlanStatus::NotStarted;
    }
    normalize_status(value).unwrap_or_else(|| {
        warn!(row, value, "Unknown status, using not_started");
        PlanStatus::NotStarted
    })
}

fn parse_rating(row: usize, value: &str) -> Option<PlanRating> {
    if value.is_empty() {
        return None;
    }
    let rating = value
        .parse::<i32>()
        .ok()
        .and_then(|n| PlanRating::try_from(n).ok());
    if rating.is_none() {
        warn!(row, value, "Ignoring invalid rating");
    }
    rating
}

fn split_categories(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "ja" | "yes" | "x"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryTarget {
        bodies: HashMap<String, i32>,
        plans: Vec<ImportedPlan>,
    }

    impl ImportTarget for MemoryTarget {
        async fn find_public_body(&mut self, name: &str) -> Result<Option<i32>, ImportError> {
            Ok(self.bodies.get(name).copied())
        }

        async fn upsert_plan(
            &mut self,
            _government: &Government,
            plan: &ImportedPlan,
        ) -> Result<UpsertOutcome, ImportError> {
            if let Some(existing) = self.plans.iter_mut().find(|p| p.title == plan.title) {
                *existing = plan.clone();
                return Ok(UpsertOutcome::Updated);
            }
            self.plans.push(plan.clone());
            Ok(UpsertOutcome::Created)
        }
    }

    fn government() -> Government {
        Government {
            id: 1,
            name: "Ampel".to_string(),
            slug: "ampel".to_string(),
            public: true,
            jurisdiction_id: None,
            description: String::new(),
            start_date: NaiveDate::from_ymd_opt(2021, 12, 8),
            end_date: NaiveDate::from_ymd_opt(2025, 12, 7),
            active: true,
            planning_document: String::new(),
        }
    }

    fn importer(mapping: serde_json::Value) -> PlanImporter {
        PlanImporter::new(government(), ColumnMapping::from_json(&mapping).unwrap())
    }

    fn target() -> MemoryTarget {
        MemoryTarget {
            bodies: HashMap::from([("Bundesministerium der Finanzen".to_string(), 11)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_mapping_rejects_unknown_fields() {
        let err = ColumnMapping::from_json(&serde_json::json!({
            "title": "Vorhaben",
            "colour": "Farbe"
        }))
        .unwrap_err();
        assert!(matches!(err, ImportError::UnknownField(f) if f == "colour"));

        let err = ColumnMapping::from_json(&serde_json::json!({"quote": "Zitat"})).unwrap_err();
        assert!(matches!(err, ImportError::MissingTitle));

        let err = ColumnMapping::from_json(&serde_json::json!(["title"])).unwrap_err();
        assert!(matches!(err, ImportError::InvalidMapping));

        assert!(ColumnMapping::from_json(&serde_json::json!({
            "title": "Vorhaben",
            "properties.ressort": "Ressort"
        }))
        .is_ok());
    }

    #[test]
    fn test_import_parses_every_field() {
        let importer = importer(serde_json::json!({
            "title": "Vorhaben",
            "quote": "Zitat",
            "due_date": "Frist",
            "status": "Stand",
            "rating": "Bewertung",
            "responsible_publicbody": "Ressort",
            "categories": "Themen",
            "public": "Öffentlich",
            "properties.seite": "Seite"
        }));
        let csv = "Vorhaben,Zitat,Frist,Stand,Bewertung,Ressort,Themen,Öffentlich,Seite\n\
                   Schuldenbremse, Wir halten sie ein. ,Ende 2023,teilweise umgesetzt,4,\
                   Bundesministerium der Finanzen,Finanzen; Haushalt,ja,S. 158\n";
        let mut target = target();

        let summary = tokio_test::block_on(importer.import_rows(csv.as_bytes(), &mut target))
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                created: 1,
                updated: 0,
                skipped: 0
            }
        );
        let plan = &target.plans[0];
        assert_eq!(plan.title, "Schuldenbremse");
        // mapping keys are visited in key order, so compare as a set
        let expected = [
            PlanField::Quote("Wir halten sie ein.".to_string()),
            PlanField::DueDate(NaiveDate::from_ymd_opt(2023, 12, 31)),
            PlanField::Status(PlanStatus::PartiallyImplemented),
            PlanField::Rating(Some(PlanRating::Good)),
            PlanField::ResponsibleBody(Some(11)),
            PlanField::Categories(vec!["Finanzen".to_string(), "Haushalt".to_string()]),
            PlanField::Public(true),
            PlanField::Property("seite".to_string(), "S. 158".to_string()),
        ];
        assert_eq!(plan.fields.len(), expected.len());
        for field in &expected {
            assert!(plan.fields.contains(field), "missing {:?}", field);
        }
    }

    #[test]
    fn test_same_title_updates_and_blank_rows_skip() {
        let importer = importer(serde_json::json!({"title": "Vorhaben", "status": "Stand"}));
        let csv = "Vorhaben,Stand\nWindkraft,begonnen\n,umgesetzt\nWindkraft,vielleicht\n";
        let mut target = target();

        let summary = tokio_test::block_on(importer.import_rows(csv.as_bytes(), &mut target))
            .unwrap();

        assert_eq!(summary.to_string(), "1 created, 1 updated, 1 skipped");
        assert_eq!(
            target.plans[0].fields,
            vec![PlanField::Status(PlanStatus::NotStarted)]
        );
    }

    #[test]
    fn test_missing_column_aborts_before_rows() {
        let importer = importer(serde_json::json!({"title": "Vorhaben", "quote": "Zitat"}));
        let mut target = target();

        let err = tokio_test::block_on(importer.import_rows("Vorhaben\nA\n".as_bytes(), &mut target))
            .unwrap_err();

        assert!(matches!(err, ImportError::MissingColumn(c) if c == "Zitat"));
        assert!(target.plans.is_empty());
    }

    #[test]
    fn test_unknown_public_body_aborts() {
        let importer = importer(serde_json::json!({
            "title": "Vorhaben",
            "responsible_publicbody": "Ressort"
        }));
        let csv = "Vorhaben,Ressort\nA,Bundesministerium der Finanzen\nB,Ministerium für Zauberei\n";
        let mut target = target();

        let err = tokio_test::block_on(importer.import_rows(csv.as_bytes(), &mut target))
            .unwrap_err();

        assert!(matches!(
            err,
            ImportError::UnknownPublicBody { row: 3, ref name } if name == "Ministerium für Zauberei"
        ));
        assert_eq!(target.plans.len(), 1);
    }

    #[test]
    fn test_value_helpers() {
        assert!(is_truthy("X"));
        assert!(is_truthy("Ja"));
        assert!(!is_truthy("nein"));
        assert!(!is_truthy(""));
        assert_eq!(parse_rating(2, "9"), None);
        assert_eq!(parse_rating(2, "1"), Some(PlanRating::Terrible));
        assert_eq!(split_categories(" ; a,,b ;"), vec!["a", "b"]);
    }
}
