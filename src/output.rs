//! Data model: grades, parsed rows, canonical records and tidy rows.
//!
//! Counts are `Option<f64>` everywhere. `None` means absent (suppressed,
//! unreported or unparseable) and is never silently turned into zero;
//! see [`crate::count`] for the arithmetic rules.

use crate::error::YearWarning;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ── Dataset kinds ────────────────────────────────────────────────────────

/// The two independently published reports used for a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Per-grade enrollment by county (mandatory).
    GradeDetail,
    /// Headcount total by county (corroborating, optional).
    Headcount,
}

impl DatasetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::GradeDetail => "grade_detail",
            DatasetKind::Headcount => "headcount",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wide (one record per district) or tidy (one row per grade level) output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    Wide,
    #[default]
    Tidy,
}

impl OutputShape {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputShape::Wide => "wide",
            OutputShape::Tidy => "tidy",
        }
    }
}

/// File format for written output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    /// `.json` → JSON, anything else → CSV.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

// ── Grades ───────────────────────────────────────────────────────────────

/// One of the 14 reported grade buckets, in report column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grade {
    Pk,
    K,
    G01,
    G02,
    G03,
    G04,
    G05,
    G06,
    G07,
    G08,
    G09,
    G10,
    G11,
    G12,
}

impl Grade {
    /// All grades in column order.
    pub const ALL: [Grade; 14] = [
        Grade::Pk,
        Grade::K,
        Grade::G01,
        Grade::G02,
        Grade::G03,
        Grade::G04,
        Grade::G05,
        Grade::G06,
        Grade::G07,
        Grade::G08,
        Grade::G09,
        Grade::G10,
        Grade::G11,
        Grade::G12,
    ];

    /// Column position (0 = PK, 13 = grade 12).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Label used in the tidy `grade_level` column.
    pub fn label(self) -> &'static str {
        match self {
            Grade::Pk => "PK",
            Grade::K => "K",
            Grade::G01 => "01",
            Grade::G02 => "02",
            Grade::G03 => "03",
            Grade::G04 => "04",
            Grade::G05 => "05",
            Grade::G06 => "06",
            Grade::G07 => "07",
            Grade::G08 => "08",
            Grade::G09 => "09",
            Grade::G10 => "10",
            Grade::G11 => "11",
            Grade::G12 => "12",
        }
    }
}

/// Per-grade counts in column order.
///
/// Serialises as a map keyed by grade label (`"PK"`, `"K"`, `"01"`…).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradeCounts([Option<f64>; 14]);

impl GradeCounts {
    /// All grades absent.
    pub fn absent() -> Self {
        Self([None; 14])
    }

    /// Build from values in column order; missing trailing values are absent
    /// and anything past grade 12 is ignored.
    pub fn from_ordered(values: &[Option<f64>]) -> Self {
        let mut counts = Self::absent();
        for (slot, value) in counts.0.iter_mut().zip(values.iter()) {
            *slot = *value;
        }
        counts
    }

    pub fn get(&self, grade: Grade) -> Option<f64> {
        self.0[grade.index()]
    }

    pub fn set(&mut self, grade: Grade, value: Option<f64>) {
        self.0[grade.index()] = value;
    }

    /// `(grade, count)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Grade, Option<f64>)> + '_ {
        Grade::ALL.iter().map(move |&g| (g, self.get(g)))
    }

    /// Counts for an inclusive grade span, in column order.
    pub fn span(&self, from: Grade, to: Grade) -> impl Iterator<Item = Option<f64>> + '_ {
        self.0[from.index()..=to.index()].iter().copied()
    }

    pub fn as_slice(&self) -> &[Option<f64>] {
        &self.0
    }

    pub fn all_absent(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

impl Serialize for GradeCounts {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(Grade::ALL.len()))?;
        for (grade, value) in self.iter() {
            map.serialize_entry(grade.label(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GradeCounts {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = HashMap::<String, Option<f64>>::deserialize(deserializer)?;
        let mut counts = Self::absent();
        for grade in Grade::ALL {
            counts.set(grade, map.get(grade.label()).copied().flatten());
        }
        Ok(counts)
    }
}

// ── Parsed rows (transient) ──────────────────────────────────────────────

/// One county row parsed from a grade-detail report.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGradeRow {
    /// Canonical county name.
    pub county: String,
    pub grades: GradeCounts,
    /// Row total: the stated total, or the grade sum when none was stated.
    pub total: Option<f64>,
    /// Whether `total` was printed in the report (vs. computed).
    pub total_stated: bool,
}

/// One county row parsed from a headcount report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadcountRow {
    pub county: String,
    pub headcount: f64,
}

// ── Canonical records ────────────────────────────────────────────────────

/// Aggregation level of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    State,
    District,
    Campus,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::State => "state",
            Scope::District => "district",
            Scope::Campus => "campus",
        }
    }
}

/// Canonical wide record: one per district per year, plus one state row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictEnrollmentRecord {
    pub end_year: u16,
    pub scope: Scope,
    pub district_id: Option<String>,
    pub district_name: Option<String>,
    pub county: Option<String>,
    pub row_total: Option<f64>,
    pub grades: GradeCounts,
}

// ── Tidy rows ────────────────────────────────────────────────────────────

/// Grade-level vocabulary of the tidy output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeLevel {
    #[serde(rename = "TOTAL")]
    Total,
    #[serde(rename = "PK")]
    Pk,
    #[serde(rename = "K")]
    K,
    #[serde(rename = "01")]
    G01,
    #[serde(rename = "02")]
    G02,
    #[serde(rename = "03")]
    G03,
    #[serde(rename = "04")]
    G04,
    #[serde(rename = "05")]
    G05,
    #[serde(rename = "06")]
    G06,
    #[serde(rename = "07")]
    G07,
    #[serde(rename = "08")]
    G08,
    #[serde(rename = "09")]
    G09,
    #[serde(rename = "10")]
    G10,
    #[serde(rename = "11")]
    G11,
    #[serde(rename = "12")]
    G12,
    #[serde(rename = "K8")]
    K8,
    #[serde(rename = "HS")]
    Hs,
    #[serde(rename = "K12")]
    K12,
}

impl GradeLevel {
    /// Derived bands have no meaningful share of the row total.
    pub fn is_band(self) -> bool {
        matches!(self, GradeLevel::K8 | GradeLevel::Hs | GradeLevel::K12)
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeLevel::Total => "TOTAL",
            GradeLevel::K8 => "K8",
            GradeLevel::Hs => "HS",
            GradeLevel::K12 => "K12",
            GradeLevel::Pk => "PK",
            GradeLevel::K => "K",
            GradeLevel::G01 => "01",
            GradeLevel::G02 => "02",
            GradeLevel::G03 => "03",
            GradeLevel::G04 => "04",
            GradeLevel::G05 => "05",
            GradeLevel::G06 => "06",
            GradeLevel::G07 => "07",
            GradeLevel::G08 => "08",
            GradeLevel::G09 => "09",
            GradeLevel::G10 => "10",
            GradeLevel::G11 => "11",
            GradeLevel::G12 => "12",
        }
    }
}

impl From<Grade> for GradeLevel {
    fn from(g: Grade) -> Self {
        match g {
            Grade::Pk => GradeLevel::Pk,
            Grade::K => GradeLevel::K,
            Grade::G01 => GradeLevel::G01,
            Grade::G02 => GradeLevel::G02,
            Grade::G03 => GradeLevel::G03,
            Grade::G04 => GradeLevel::G04,
            Grade::G05 => GradeLevel::G05,
            Grade::G06 => GradeLevel::G06,
            Grade::G07 => GradeLevel::G07,
            Grade::G08 => GradeLevel::G08,
            Grade::G09 => GradeLevel::G09,
            Grade::G10 => GradeLevel::G10,
            Grade::G11 => GradeLevel::G11,
            Grade::G12 => GradeLevel::G12,
        }
    }
}

impl TryFrom<GradeLevel> for Grade {
    type Error = ();

    fn try_from(level: GradeLevel) -> Result<Self, Self::Error> {
        Grade::ALL
            .into_iter()
            .find(|&g| GradeLevel::from(g) == level)
            .ok_or(())
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Demographic subgroup; this source only reports all students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subgroup {
    #[default]
    TotalEnrollment,
}

/// One long-format row: a count for one scope, grade level and subgroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyEnrollmentRow {
    pub end_year: u16,
    pub aggregation_flag: Scope,
    pub district_id: Option<String>,
    pub campus_id: Option<String>,
    pub district_name: Option<String>,
    pub campus_name: Option<String>,
    pub county: Option<String>,
    pub grade_level: GradeLevel,
    pub subgroup: Subgroup,
    pub n_students: f64,
    pub pct: Option<f64>,
    pub is_state: bool,
    pub is_district: bool,
    pub is_campus: bool,
}

// ── Results ──────────────────────────────────────────────────────────────

/// Enrollment data for one year in the requested shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "rows", rename_all = "snake_case")]
pub enum EnrollmentData {
    Wide(Vec<DistrictEnrollmentRecord>),
    Tidy(Vec<TidyEnrollmentRow>),
}

impl EnrollmentData {
    pub fn len(&self) -> usize {
        match self {
            EnrollmentData::Wide(r) => r.len(),
            EnrollmentData::Tidy(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> OutputShape {
        match self {
            EnrollmentData::Wide(_) => OutputShape::Wide,
            EnrollmentData::Tidy(_) => OutputShape::Tidy,
        }
    }
}

/// Counters describing how a year was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearStats {
    /// Layout the grade-detail report was parsed with.
    pub layout: Option<String>,
    pub grade_detail_url: Option<String>,
    pub headcount_url: Option<String>,
    pub pages: usize,
    pub district_rows: usize,
    pub headcount_rows: usize,
    /// Districts whose total came from the headcount report.
    pub headcount_overrides: usize,
    pub from_cache: bool,
    pub duration_ms: u64,
}

/// Result of producing one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentOutput {
    pub end_year: u16,
    pub data: EnrollmentData,
    pub warnings: Vec<YearWarning>,
    pub stats: YearStats,
}

/// A year that could not be produced inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedYear {
    pub end_year: u16,
    pub error: String,
}

/// Result of a multi-year request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub years: Vec<EnrollmentOutput>,
    pub failed_years: Vec<FailedYear>,
}

impl BatchOutput {
    /// All tidy rows across years; empty for wide outputs.
    pub fn tidy_rows(&self) -> Vec<TidyEnrollmentRow> {
        self.years
            .iter()
            .filter_map(|y| match &y.data {
                EnrollmentData::Tidy(rows) => Some(rows.iter().cloned()),
                EnrollmentData::Wide(_) => None,
            })
            .flatten()
            .collect()
    }

    /// All wide records across years; empty for tidy outputs.
    pub fn wide_records(&self) -> Vec<DistrictEnrollmentRecord> {
        self.years
            .iter()
            .filter_map(|y| match &y.data {
                EnrollmentData::Wide(rows) => Some(rows.iter().cloned()),
                EnrollmentData::Tidy(_) => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_labels_follow_column_order() {
        let labels: Vec<&str> = Grade::ALL.iter().map(|g| g.label()).collect();
        assert_eq!(labels[0], "PK");
        assert_eq!(labels[1], "K");
        assert_eq!(labels[2], "01");
        assert_eq!(labels[13], "12");
    }

    #[test]
    fn grade_counts_from_short_slice_leaves_tail_absent() {
        let c = GradeCounts::from_ordered(&[Some(1.0), Some(2.0), None]);
        assert_eq!(c.get(Grade::Pk), Some(1.0));
        assert_eq!(c.get(Grade::K), Some(2.0));
        assert_eq!(c.get(Grade::G01), None);
        assert_eq!(c.get(Grade::G12), None);
    }

    #[test]
    fn grade_span_is_inclusive() {
        let values: Vec<Option<f64>> = (0..14).map(|i| Some(i as f64)).collect();
        let c = GradeCounts::from_ordered(&values);
        let hs: Vec<Option<f64>> = c.span(Grade::G09, Grade::G12).collect();
        assert_eq!(hs, vec![Some(10.0), Some(11.0), Some(12.0), Some(13.0)]);
    }

    #[test]
    fn grade_level_serialises_to_stable_vocabulary() {
        let levels = [
            (GradeLevel::Total, "\"TOTAL\""),
            (GradeLevel::Pk, "\"PK\""),
            (GradeLevel::G01, "\"01\""),
            (GradeLevel::K8, "\"K8\""),
            (GradeLevel::Hs, "\"HS\""),
            (GradeLevel::K12, "\"K12\""),
        ];
        for (level, expected) in levels {
            assert_eq!(serde_json::to_string(&level).unwrap(), expected);
            assert_eq!(level.to_string(), expected.trim_matches('"'));
        }
    }

    #[test]
    fn grade_level_round_trips_through_grade() {
        for g in Grade::ALL {
            let level = GradeLevel::from(g);
            assert!(!level.is_band());
            assert_eq!(Grade::try_from(level), Ok(g));
        }
        assert!(Grade::try_from(GradeLevel::K12).is_err());
    }

    #[test]
    fn grade_counts_serialise_by_label() {
        let mut c = GradeCounts::absent();
        c.set(Grade::G03, Some(12.0));
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["03"], serde_json::json!(12.0));
        assert!(json["PK"].is_null());

        let back: GradeCounts = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn output_format_from_extension() {
        use std::path::Path;
        assert_eq!(OutputFormat::from_path(Path::new("enr.JSON")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("enr.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("enr")), OutputFormat::Csv);
    }

    #[test]
    fn enrollment_data_reports_shape() {
        assert_eq!(EnrollmentData::Wide(vec![]).shape(), OutputShape::Wide);
        assert!(EnrollmentData::Tidy(vec![]).is_empty());
    }
}
