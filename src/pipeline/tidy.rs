//! Wide records → long rows.
//!
//! Per record, in order: `TOTAL`, each grade `PK`..`12`, then the bands
//! `K8`, `HS` and `K12`. A row whose count is absent is dropped.

use super::tag::id_enr_aggs;
use crate::count::{ratio, sum_present};
use crate::output::{DistrictEnrollmentRecord, Grade, GradeLevel, Subgroup, TidyEnrollmentRow};

/// Reshape wide records to tidy rows, tagged with their aggregation level.
pub fn tidy_enr(records: &[DistrictEnrollmentRecord]) -> Vec<TidyEnrollmentRow> {
    let mut rows = Vec::with_capacity(records.len() * 18);
    for record in records {
        rows.extend(record_rows(record));
    }
    id_enr_aggs(rows)
}

fn record_rows(record: &DistrictEnrollmentRecord) -> Vec<TidyEnrollmentRow> {
    let total = record.row_total;
    let g = &record.grades;

    let mut cells: Vec<(GradeLevel, Option<f64>, Option<f64>)> = Vec::with_capacity(18);
    cells.push((GradeLevel::Total, total, ratio(total, total)));
    for (grade, n) in g.iter() {
        cells.push((grade.into(), n, ratio(n, total)));
    }
    cells.push((GradeLevel::K8, sum_present(g.span(Grade::K, Grade::G08)), None));
    cells.push((GradeLevel::Hs, sum_present(g.span(Grade::G09, Grade::G12)), None));
    cells.push((GradeLevel::K12, sum_present(g.span(Grade::K, Grade::G12)), None));

    cells
        .into_iter()
        .filter_map(|(grade_level, n, pct)| {
            Some(TidyEnrollmentRow {
                end_year: record.end_year,
                aggregation_flag: record.scope,
                district_id: record.district_id.clone(),
                campus_id: None,
                district_name: record.district_name.clone(),
                campus_name: None,
                county: record.county.clone(),
                grade_level,
                subgroup: Subgroup::TotalEnrollment,
                n_students: n?,
                pct,
                is_state: false,
                is_district: false,
                is_campus: false,
            })
        })
        .collect()
}
