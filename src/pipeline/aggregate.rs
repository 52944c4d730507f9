//! Synthetic state row.

use crate::count::sum_present;
use crate::output::{DistrictEnrollmentRecord, Grade, GradeCounts, Scope};

/// Sum every district record into one state record.
///
/// Identifiers are absent; each numeric field is the sum of the present
/// district values. Existing state records are ignored, so aggregating an
/// already-aggregated set gives the same row. Returns `None` when there are
/// no district records.
pub fn aggregate_state(records: &[DistrictEnrollmentRecord]) -> Option<DistrictEnrollmentRecord> {
    let districts: Vec<&DistrictEnrollmentRecord> = records
        .iter()
        .filter(|r| r.scope == Scope::District)
        .collect();
    let end_year = districts.first()?.end_year;

    let mut grades = GradeCounts::absent();
    for grade in Grade::ALL {
        grades.set(grade, sum_present(districts.iter().map(|r| r.grades.get(grade))));
    }

    Some(DistrictEnrollmentRecord {
        end_year,
        scope: Scope::State,
        district_id: None,
        district_name: None,
        county: None,
        row_total: sum_present(districts.iter().map(|r| r.row_total)),
        grades,
    })
}

/// State row first, then districts. Any state rows already present are
/// replaced.
pub fn with_state_row(records: Vec<DistrictEnrollmentRecord>) -> Vec<DistrictEnrollmentRecord> {
    let state = aggregate_state(&records);
    state
        .into_iter()
        .chain(records.into_iter().filter(|r| r.scope == Scope::District))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn district(id: &str, total: Option<f64>, pk: Option<f64>) -> DistrictEnrollmentRecord {
        let mut grades = GradeCounts::absent();
        grades.set(Grade::Pk, pk);
        DistrictEnrollmentRecord {
            end_year: 2022,
            scope: Scope::District,
            district_id: Some(id.into()),
            district_name: Some(format!("{id} COUNTY SCHOOLS")),
            county: Some(id.into()),
            row_total: total,
            grades,
        }
    }

    #[test]
    fn state_row_sums_present_values() {
        let records = [
            district("A", Some(100.0), Some(5.0)),
            district("B", Some(1300.0), None),
            district("C", None, Some(2.0)),
        ];
        let state = aggregate_state(&records).unwrap();
        assert_eq!(state.scope, Scope::State);
        assert_eq!(state.row_total, Some(1400.0));
        assert_eq!(state.grades.get(Grade::Pk), Some(7.0));
        assert_eq!(state.grades.get(Grade::K), None);
        assert!(state.district_id.is_none());
        assert!(state.district_name.is_none());
        assert!(state.county.is_none());
        assert_eq!(state.end_year, 2022);
    }

    #[test]
    fn no_districts_no_state_row() {
        assert!(aggregate_state(&[]).is_none());
        assert!(with_state_row(vec![]).is_empty());
    }

    #[test]
    fn aggregation_is_idempotent() {
        let once = with_state_row(vec![
            district("A", Some(10.0), None),
            district("B", Some(20.0), None),
        ]);
        let twice = with_state_row(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.iter().filter(|r| r.scope == Scope::State).count(), 1);
        assert_eq!(once[0].row_total, Some(30.0));
    }
}
