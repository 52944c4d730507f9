//! Aggregation-level tagging from identifier fields.

use crate::output::{Scope, TidyEnrollmentRow};

/// Scope implied by which identifiers are populated. Empty strings count as
/// absent.
pub fn scope_of(district_id: Option<&str>, campus_id: Option<&str>) -> Scope {
    let present = |id: Option<&str>| id.is_some_and(|s| !s.trim().is_empty());
    if present(campus_id) {
        Scope::Campus
    } else if present(district_id) {
        Scope::District
    } else {
        Scope::State
    }
}

/// Set `aggregation_flag` and the `is_*` flags on every row.
pub fn id_enr_aggs(mut rows: Vec<TidyEnrollmentRow>) -> Vec<TidyEnrollmentRow> {
    for row in &mut rows {
        let scope = scope_of(row.district_id.as_deref(), row.campus_id.as_deref());
        row.aggregation_flag = scope;
        row.is_state = scope == Scope::State;
        row.is_district = scope == Scope::District;
        row.is_campus = scope == Scope::Campus;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{GradeLevel, Subgroup};

    fn row(district_id: Option<&str>, campus_id: Option<&str>) -> TidyEnrollmentRow {
        TidyEnrollmentRow {
            end_year: 2020,
            // Deliberately wrong; tagging must ignore it.
            aggregation_flag: Scope::Campus,
            district_id: district_id.map(String::from),
            campus_id: campus_id.map(String::from),
            district_name: None,
            campus_name: None,
            county: None,
            grade_level: GradeLevel::Total,
            subgroup: Subgroup::TotalEnrollment,
            n_students: 1.0,
            pct: Some(1.0),
            is_state: false,
            is_district: false,
            is_campus: true,
        }
    }

    #[test]
    fn scope_follows_identifiers() {
        assert_eq!(scope_of(None, None), Scope::State);
        assert_eq!(scope_of(Some(""), None), Scope::State);
        assert_eq!(scope_of(Some("54039"), None), Scope::District);
        assert_eq!(scope_of(Some("54039"), Some("001")), Scope::Campus);
    }

    #[test]
    fn flags_are_exclusive() {
        let rows = id_enr_aggs(vec![row(None, None), row(Some("54001"), None)]);
        assert!(rows[0].is_state && !rows[0].is_district && !rows[0].is_campus);
        assert_eq!(rows[0].aggregation_flag, Scope::State);
        assert!(rows[1].is_district && !rows[1].is_state && !rows[1].is_campus);
        assert_eq!(rows[1].aggregation_flag, Scope::District);
    }
}
