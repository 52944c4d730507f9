//! Merge grade-detail rows with the headcount report.
//!
//! Headcount is a left join by county: where a county has a headcount it
//! replaces the row total, and a headcount without a grade row is never
//! promoted to a record.

use crate::count::{approx_eq, sum_present};
use crate::county::CountyRegistry;
use crate::error::YearWarning;
use crate::output::{DistrictEnrollmentRecord, HeadcountRow, RawGradeRow, Scope};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// District records for one year plus what was noticed while building them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub records: Vec<DistrictEnrollmentRecord>,
    pub warnings: Vec<YearWarning>,
    /// Districts whose total came from the headcount report.
    pub headcount_overrides: usize,
}

/// Build one district record per grade row.
pub fn reconcile(
    year: u16,
    grade_rows: &[RawGradeRow],
    headcounts: &[HeadcountRow],
    counties: &CountyRegistry,
) -> Reconciled {
    let headcount_by_county: HashMap<&str, f64> = headcounts
        .iter()
        .map(|h| (h.county.as_str(), h.headcount))
        .collect();

    let mut out = Reconciled::default();

    for row in grade_rows {
        if let Some(warning) = total_mismatch(year, row) {
            warn!("{warning}");
            out.warnings.push(warning);
        }

        let row_total = match headcount_by_county.get(row.county.as_str()) {
            Some(&headcount) => {
                debug!(
                    "{}: headcount {headcount} replaces total {:?}",
                    row.county, row.total
                );
                out.headcount_overrides += 1;
                Some(headcount)
            }
            None => row.total,
        };

        out.records.push(DistrictEnrollmentRecord {
            end_year: year,
            scope: Scope::District,
            district_id: counties.district_id(&row.county),
            district_name: counties.district_name(&row.county),
            county: Some(row.county.clone()),
            row_total,
            grades: row.grades,
        });
    }

    let present: HashSet<&str> = grade_rows.iter().map(|r| r.county.as_str()).collect();
    let missing: Vec<String> = counties
        .names()
        .filter(|name| !present.contains(name))
        .map(str::to_string)
        .collect();
    if !grade_rows.is_empty() && !missing.is_empty() {
        let warning = YearWarning::MissingCounties {
            year,
            counties: missing,
        };
        warn!("{warning}");
        out.warnings.push(warning);
    }

    out
}

/// A stated total is kept as printed; a disagreement with a complete set of
/// grade counts is reported. Rows with suppressed grades are not compared.
fn total_mismatch(year: u16, row: &RawGradeRow) -> Option<YearWarning> {
    if !row.total_stated || row.grades.as_slice().iter().any(Option::is_none) {
        return None;
    }
    let stated = row.total?;
    let computed = sum_present(row.grades.as_slice().iter().copied())?;
    if approx_eq(stated, computed) {
        return None;
    }
    Some(YearWarning::TotalMismatch {
        year,
        county: row.county.clone(),
        stated,
        computed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::GradeCounts;
    use crate::reference::ReferenceData;

    fn counties() -> CountyRegistry {
        CountyRegistry::new(&ReferenceData::builtin().unwrap())
    }

    fn row(county: &str, grade: f64, total: Option<f64>, stated: bool) -> RawGradeRow {
        RawGradeRow {
            county: county.into(),
            grades: GradeCounts::from_ordered(&[Some(grade); 14]),
            total,
            total_stated: stated,
        }
    }

    #[test]
    fn headcount_overrides_total() {
        let rows = [row("Kanawha", 1.0, Some(14.0), false), row("Barbour", 1.0, Some(14.0), false)];
        let hc = [HeadcountRow {
            county: "Kanawha".into(),
            headcount: 1300.0,
        }];
        let r = reconcile(2020, &rows, &hc, &counties());
        assert_eq!(r.records[0].row_total, Some(1300.0));
        assert_eq!(r.records[1].row_total, Some(14.0));
        assert_eq!(r.headcount_overrides, 1);
    }

    #[test]
    fn headcount_alone_does_not_create_a_record() {
        let rows = [row("Barbour", 1.0, Some(14.0), false)];
        let hc = [HeadcountRow {
            county: "Wood".into(),
            headcount: 500.0,
        }];
        let r = reconcile(2020, &rows, &hc, &counties());
        assert_eq!(r.records.len(), 1);
        assert_eq!(r.headcount_overrides, 0);
    }

    #[test]
    fn records_carry_synthesized_identity() {
        let r = reconcile(2021, &[row("Kanawha", 1.0, Some(14.0), false)], &[], &counties());
        let rec = &r.records[0];
        assert_eq!(rec.end_year, 2021);
        assert_eq!(rec.scope, Scope::District);
        assert_eq!(rec.district_id.as_deref(), Some("54039"));
        assert_eq!(rec.district_name.as_deref(), Some("KANAWHA COUNTY SCHOOLS"));
        assert_eq!(rec.county.as_deref(), Some("Kanawha"));
    }

    #[test]
    fn stated_total_is_kept_and_mismatch_reported() {
        let r = reconcile(2020, &[row("Barbour", 1.0, Some(20.0), true)], &[], &counties());
        assert_eq!(r.records[0].row_total, Some(20.0));
        assert!(r.warnings.iter().any(|w| matches!(
            w,
            YearWarning::TotalMismatch { stated, computed, .. } if *stated == 20.0 && *computed == 14.0
        )));
    }

    #[test]
    fn suppressed_grades_are_not_compared() {
        let mut r0 = row("Barbour", 1.0, Some(20.0), true);
        r0.grades.set(crate::output::Grade::Pk, None);
        let r = reconcile(2020, &[r0], &[], &counties());
        assert!(!r
            .warnings
            .iter()
            .any(|w| matches!(w, YearWarning::TotalMismatch { .. })));
    }

    #[test]
    fn missing_counties_are_reported_not_fabricated() {
        let r = reconcile(2020, &[row("Barbour", 1.0, Some(14.0), false)], &[], &counties());
        assert_eq!(r.records.len(), 1);
        let missing = r.warnings.iter().find_map(|w| match w {
            YearWarning::MissingCounties { counties, .. } => Some(counties.len()),
            _ => None,
        });
        assert_eq!(missing, Some(54));
    }

    #[test]
    fn no_rows_no_missing_warning() {
        let r = reconcile(2020, &[], &[], &counties());
        assert!(r.records.is_empty());
        assert!(r.warnings.is_empty());
    }
}
