//! Peacetrack tables.
//!
//! Regions contain posts, posts and sectors host projects, projects break
//! down into goals, objectives and indicators, and indicators are measured
//! through outputs and outcomes. Volunteers belong to a cohort and record
//! activities whose measurements feed those outputs and outcomes.
//!
//! Foreign keys are serialized under the relation name (`region`, `project`,
//! ...) and carry the referenced row id.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::query::QueryAs;
use sqlx::sqlite::SqliteArguments;
use sqlx::{FromRow, Sqlite};

use super::resource::{require_text, Resource, ResourceInput, WriteResource};
use crate::{Error, Result};

type Query<'q, O> = QueryAs<'q, Sqlite, O, SqliteArguments<'q>>;

fn check_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(Error::Validation(
                "end_date must not be before start_date".to_string(),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Region
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Region {
    pub id: i64,
    pub region_name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionInput {
    pub region_name: String,
}

impl Resource for Region {
    const TABLE: &'static str = "regions";
    const NAME: &'static str = "Region";
    const DESCRIPTION: &'static str = "Geographic regions grouping country posts.";
}

impl WriteResource for Region {
    type Input = RegionInput;
}

impl ResourceInput for RegionInput {
    const COLUMNS: &'static [&'static str] = &["region_name"];

    fn validate(&self) -> Result<()> {
        require_text("region_name", &self.region_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query.bind(self.region_name)
    }
}

// ============================================================================
// Sector
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Sector {
    pub id: i64,
    pub sector_name: String,
    pub sector_desc: String,
    pub sector_code: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectorInput {
    pub sector_name: String,
    #[serde(default)]
    pub sector_desc: String,
    #[serde(default)]
    pub sector_code: String,
}

impl Resource for Sector {
    const TABLE: &'static str = "sectors";
    const NAME: &'static str = "Sector";
}

impl WriteResource for Sector {
    type Input = SectorInput;
}

impl ResourceInput for SectorInput {
    const COLUMNS: &'static [&'static str] = &["sector_name", "sector_desc", "sector_code"];

    fn validate(&self) -> Result<()> {
        require_text("sector_name", &self.sector_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.sector_name)
            .bind(self.sector_desc)
            .bind(self.sector_code)
    }
}

// ============================================================================
// PTPost (a country post, unrelated to malaria posts)
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PtPost {
    pub id: i64,
    pub post_name: String,
    #[serde(rename = "region")]
    pub region_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PtPostInput {
    pub post_name: String,
    #[serde(rename = "region")]
    pub region_id: i64,
}

impl Resource for PtPost {
    const TABLE: &'static str = "ptposts";
    const NAME: &'static str = "PT Post";
    const DESCRIPTION: &'static str = "Country posts volunteers serve at.";
}

impl WriteResource for PtPost {
    type Input = PtPostInput;
}

impl ResourceInput for PtPostInput {
    const COLUMNS: &'static [&'static str] = &["post_name", "region_id"];

    fn validate(&self) -> Result<()> {
        require_text("post_name", &self.post_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query.bind(self.post_name).bind(self.region_id)
    }
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: i64,
    pub project_name: String,
    pub project_desc: String,
    #[serde(rename = "sector")]
    pub sector_id: i64,
    #[serde(rename = "ptpost")]
    pub ptpost_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInput {
    pub project_name: String,
    #[serde(default)]
    pub project_desc: String,
    #[serde(rename = "sector")]
    pub sector_id: i64,
    #[serde(rename = "ptpost")]
    pub ptpost_id: i64,
}

impl Resource for Project {
    const TABLE: &'static str = "projects";
    const NAME: &'static str = "Project";
}

impl WriteResource for Project {
    type Input = ProjectInput;
}

impl ResourceInput for ProjectInput {
    const COLUMNS: &'static [&'static str] =
        &["project_name", "project_desc", "sector_id", "ptpost_id"];

    fn validate(&self) -> Result<()> {
        require_text("project_name", &self.project_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.project_name)
            .bind(self.project_desc)
            .bind(self.sector_id)
            .bind(self.ptpost_id)
    }
}

// ============================================================================
// Goal
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Goal {
    pub id: i64,
    pub goal_name: String,
    pub goal_desc: String,
    #[serde(rename = "project")]
    pub project_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalInput {
    pub goal_name: String,
    #[serde(default)]
    pub goal_desc: String,
    #[serde(rename = "project")]
    pub project_id: i64,
}

impl Resource for Goal {
    const TABLE: &'static str = "goals";
    const NAME: &'static str = "Goal";
}

impl WriteResource for Goal {
    type Input = GoalInput;
}

impl ResourceInput for GoalInput {
    const COLUMNS: &'static [&'static str] = &["goal_name", "goal_desc", "project_id"];

    fn validate(&self) -> Result<()> {
        require_text("goal_name", &self.goal_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.goal_name)
            .bind(self.goal_desc)
            .bind(self.project_id)
    }
}

// ============================================================================
// Objective
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Objective {
    pub id: i64,
    pub objective_name: String,
    pub objective_desc: String,
    #[serde(rename = "goal")]
    pub goal_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveInput {
    pub objective_name: String,
    #[serde(default)]
    pub objective_desc: String,
    #[serde(rename = "goal")]
    pub goal_id: i64,
}

impl Resource for Objective {
    const TABLE: &'static str = "objectives";
    const NAME: &'static str = "Objective";
}

impl WriteResource for Objective {
    type Input = ObjectiveInput;
}

impl ResourceInput for ObjectiveInput {
    const COLUMNS: &'static [&'static str] = &["objective_name", "objective_desc", "goal_id"];

    fn validate(&self) -> Result<()> {
        require_text("objective_name", &self.objective_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.objective_name)
            .bind(self.objective_desc)
            .bind(self.goal_id)
    }
}

// ============================================================================
// Indicator
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Indicator {
    pub id: i64,
    pub indicator_name: String,
    #[serde(rename = "objective")]
    pub objective_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorInput {
    pub indicator_name: String,
    #[serde(rename = "objective")]
    pub objective_id: i64,
}

impl Resource for Indicator {
    const TABLE: &'static str = "indicators";
    const NAME: &'static str = "Indicator";
}

impl WriteResource for Indicator {
    type Input = IndicatorInput;
}

impl ResourceInput for IndicatorInput {
    const COLUMNS: &'static [&'static str] = &["indicator_name", "objective_id"];

    fn validate(&self) -> Result<()> {
        require_text("indicator_name", &self.indicator_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query.bind(self.indicator_name).bind(self.objective_id)
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Output {
    pub id: i64,
    pub output_name: String,
    #[serde(rename = "indicator")]
    pub indicator_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputInput {
    pub output_name: String,
    #[serde(rename = "indicator")]
    pub indicator_id: i64,
}

impl Resource for Output {
    const TABLE: &'static str = "outputs";
    const NAME: &'static str = "Output";
}

impl WriteResource for Output {
    type Input = OutputInput;
}

impl ResourceInput for OutputInput {
    const COLUMNS: &'static [&'static str] = &["output_name", "indicator_id"];

    fn validate(&self) -> Result<()> {
        require_text("output_name", &self.output_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query.bind(self.output_name).bind(self.indicator_id)
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Outcome {
    pub id: i64,
    pub outcome_name: String,
    #[serde(rename = "indicator")]
    pub indicator_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeInput {
    pub outcome_name: String,
    #[serde(rename = "indicator")]
    pub indicator_id: i64,
}

impl Resource for Outcome {
    const TABLE: &'static str = "outcomes";
    const NAME: &'static str = "Outcome";
}

impl WriteResource for Outcome {
    type Input = OutcomeInput;
}

impl ResourceInput for OutcomeInput {
    const COLUMNS: &'static [&'static str] = &["outcome_name", "indicator_id"];

    fn validate(&self) -> Result<()> {
        require_text("outcome_name", &self.outcome_name)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query.bind(self.outcome_name).bind(self.indicator_id)
    }
}

// ============================================================================
// Cohort
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Cohort {
    pub id: i64,
    pub cohort_name: String,
    #[serde(rename = "project")]
    pub project_id: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CohortInput {
    pub cohort_name: String,
    #[serde(rename = "project")]
    pub project_id: i64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Resource for Cohort {
    const TABLE: &'static str = "cohorts";
    const NAME: &'static str = "Cohort";
    const DESCRIPTION: &'static str = "Volunteer intake groups serving on a project.";
}

impl WriteResource for Cohort {
    type Input = CohortInput;
}

impl ResourceInput for CohortInput {
    const COLUMNS: &'static [&'static str] =
        &["cohort_name", "project_id", "start_date", "end_date"];

    fn validate(&self) -> Result<()> {
        require_text("cohort_name", &self.cohort_name)?;
        check_date_range(self.start_date, self.end_date)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.cohort_name)
            .bind(self.project_id)
            .bind(self.start_date)
            .bind(self.end_date)
    }
}

// ============================================================================
// Volunteer
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Volunteer {
    pub id: i64,
    #[serde(rename = "pcuser")]
    pub pcuser_id: i64,
    #[serde(rename = "cohort")]
    pub cohort_id: i64,
    #[serde(rename = "ptpost")]
    pub ptpost_id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolunteerInput {
    #[serde(rename = "pcuser")]
    pub pcuser_id: i64,
    #[serde(rename = "cohort")]
    pub cohort_id: i64,
    #[serde(rename = "ptpost")]
    pub ptpost_id: i64,
}

impl Resource for Volunteer {
    const TABLE: &'static str = "volunteers";
    const NAME: &'static str = "Volunteer";
}

impl WriteResource for Volunteer {
    type Input = VolunteerInput;
}

impl ResourceInput for VolunteerInput {
    const COLUMNS: &'static [&'static str] = &["pcuser_id", "cohort_id", "ptpost_id"];

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.pcuser_id)
            .bind(self.cohort_id)
            .bind(self.ptpost_id)
    }
}

// ============================================================================
// Activity
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Activity {
    pub id: i64,
    pub activity_name: String,
    pub activity_desc: String,
    #[serde(rename = "volunteer")]
    pub volunteer_id: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityInput {
    pub activity_name: String,
    #[serde(default)]
    pub activity_desc: String,
    #[serde(rename = "volunteer")]
    pub volunteer_id: i64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Resource for Activity {
    const TABLE: &'static str = "activities";
    const NAME: &'static str = "Activity";
}

impl WriteResource for Activity {
    type Input = ActivityInput;
}

impl ResourceInput for ActivityInput {
    const COLUMNS: &'static [&'static str] = &[
        "activity_name",
        "activity_desc",
        "volunteer_id",
        "start_date",
        "end_date",
    ];

    fn validate(&self) -> Result<()> {
        require_text("activity_name", &self.activity_name)?;
        check_date_range(self.start_date, self.end_date)
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.activity_name)
            .bind(self.activity_desc)
            .bind(self.volunteer_id)
            .bind(self.start_date)
            .bind(self.end_date)
    }
}

// ============================================================================
// Measurement
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Measurement {
    pub id: i64,
    #[serde(rename = "activity")]
    pub activity_id: i64,
    #[serde(rename = "output")]
    pub output_id: Option<i64>,
    #[serde(rename = "outcome")]
    pub outcome_id: Option<i64>,
    pub value: i64,
    pub date: NaiveDate,
    pub notes: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementInput {
    #[serde(rename = "activity")]
    pub activity_id: i64,
    #[serde(rename = "output", default)]
    pub output_id: Option<i64>,
    #[serde(rename = "outcome", default)]
    pub outcome_id: Option<i64>,
    #[serde(default)]
    pub value: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

impl Resource for Measurement {
    const TABLE: &'static str = "measurements";
    const NAME: &'static str = "Measurement";
    const DESCRIPTION: &'static str = "Values recorded by an activity against an output or outcome.";
}

impl WriteResource for Measurement {
    type Input = MeasurementInput;
}

impl ResourceInput for MeasurementInput {
    const COLUMNS: &'static [&'static str] = &[
        "activity_id",
        "output_id",
        "outcome_id",
        "value",
        "date",
        "notes",
    ];

    fn validate(&self) -> Result<()> {
        if self.output_id.is_none() && self.outcome_id.is_none() {
            return Err(Error::Validation(
                "a measurement must reference an output or an outcome".to_string(),
            ));
        }
        Ok(())
    }

    fn bind<'q, O>(self, query: Query<'q, O>) -> Query<'q, O> {
        query
            .bind(self.activity_id)
            .bind(self.output_id)
            .bind(self.outcome_id)
            .bind(self.value)
            .bind(self.date)
            .bind(self.notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema, insert_row, DbPool};

    async fn setup_test_db() -> DbPool {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_date_range() {
        let start = NaiveDate::from_ymd_opt(2015, 6, 1);
        let end = NaiveDate::from_ymd_opt(2017, 8, 1);
        assert!(check_date_range(start, end).is_ok());
        assert!(check_date_range(end, start).is_err());
        assert!(check_date_range(None, start).is_ok());
    }

    #[test]
    fn test_measurement_requires_target() {
        let input = MeasurementInput {
            activity_id: 1,
            output_id: None,
            outcome_id: None,
            value: 3,
            date: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
            notes: String::new(),
        };
        assert!(matches!(input.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_foreign_keys_use_relation_names() {
        let input: PtPostInput =
            serde_json::from_value(serde_json::json!({"post_name": "Lusaka", "region": 4}))
                .unwrap();
        assert_eq!(input.region_id, 4);
    }

    #[tokio::test]
    async fn test_missing_parent_is_validation_error() {
        let pool = setup_test_db().await;

        let err = insert_row::<PtPost>(
            &pool,
            PtPostInput {
                post_name: "Lusaka".to_string(),
                region_id: 77,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Validation(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_project_hierarchy() {
        let pool = setup_test_db().await;

        let region: Region = insert_row::<Region>(
            &pool,
            RegionInput {
                region_name: "Africa".to_string(),
            },
        )
        .await
        .unwrap();
        let ptpost: PtPost = insert_row::<PtPost>(
            &pool,
            PtPostInput {
                post_name: "Zambia".to_string(),
                region_id: region.id,
            },
        )
        .await
        .unwrap();
        let sector: Sector = insert_row::<Sector>(
            &pool,
            SectorInput {
                sector_name: "Health".to_string(),
                sector_desc: String::new(),
                sector_code: "HE".to_string(),
            },
        )
        .await
        .unwrap();
        let project: Project = insert_row::<Project>(
            &pool,
            ProjectInput {
                project_name: "Malaria prevention".to_string(),
                project_desc: String::new(),
                sector_id: sector.id,
                ptpost_id: ptpost.id,
            },
        )
        .await
        .unwrap();

        assert_eq!(project.ptpost_id, ptpost.id);
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["sector"], sector.id);
        assert_eq!(json["ptpost"], ptpost.id);
    }
}
