//! Outer join of several frames on their timestamp index.

use super::stats::forward_fill;
use super::AnalyticsError;
use crate::frame::TimeFrame;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Full outer join on the index: the union of all timestamps in ascending
/// order, every column from every frame, gaps forward-filled.
///
/// The index name of the first frame is kept. Column names must be unique
/// across frames; when a frame repeats a timestamp, its last row wins.
pub fn full_join(frames: &[TimeFrame]) -> Result<TimeFrame, AnalyticsError> {
    let first = frames.first().ok_or(AnalyticsError::NoFrames)?;

    let mut seen = HashSet::new();
    for frame in frames {
        for name in frame.column_names() {
            if !seen.insert(name.to_string()) {
                return Err(AnalyticsError::DuplicateColumn(name.to_string()));
            }
        }
    }

    let index: Vec<NaiveDateTime> = frames
        .iter()
        .flat_map(|f| f.index().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let position: BTreeMap<NaiveDateTime, usize> =
        index.iter().enumerate().map(|(i, ts)| (*ts, i)).collect();

    let mut columns = Vec::with_capacity(seen.len());
    for frame in frames {
        for (name, values) in frame.columns() {
            let mut aligned = vec![f64::NAN; index.len()];
            for (ts, v) in frame.index().iter().zip(values) {
                aligned[position[ts]] = *v;
            }
            columns.push((name.clone(), forward_fill(&aligned)));
        }
    }
    Ok(TimeFrame::new(first.index_name(), index, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 4, day).unwrap()
    }

    #[test]
    fn joins_sorts_and_fills() {
        let a = TimeFrame::from_dates("date_time", &[d(3), d(1)], vec![("value1".into(), vec![6.0, 22.0])])
            .unwrap();
        let b = TimeFrame::from_dates("dt", &[d(2), d(1)], vec![("value2".into(), vec![12.0, 43.0])])
            .unwrap();
        let joined = full_join(&[a, b]).unwrap();
        assert_eq!(joined.index_name(), "date_time");
        assert_eq!(joined.dates(), vec![d(1), d(2), d(3)]);
        assert_eq!(joined.column("value1").unwrap(), &[22.0, 22.0, 6.0]);
        assert_eq!(joined.column("value2").unwrap(), &[43.0, 12.0, 12.0]);
    }

    #[test]
    fn leading_gap_stays_nan() {
        let a = TimeFrame::from_dates("date", &[d(1)], vec![("a".into(), vec![1.0])]).unwrap();
        let b = TimeFrame::from_dates("date", &[d(2)], vec![("b".into(), vec![2.0])]).unwrap();
        let joined = full_join(&[a, b]).unwrap();
        assert!(joined.column("b").unwrap()[0].is_nan());
        assert_eq!(joined.column("a").unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let a = TimeFrame::from_dates("date", &[d(1)], vec![("v".into(), vec![1.0])]).unwrap();
        assert!(matches!(
            full_join(&[a.clone(), a]),
            Err(AnalyticsError::DuplicateColumn(_))
        ));
        assert!(matches!(full_join(&[]), Err(AnalyticsError::NoFrames)));
    }
}
