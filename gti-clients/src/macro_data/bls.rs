//! Bureau of Labor Statistics public API (v2).

use super::{parse_value, MacroDataError};
use crate::http;
use chrono::NaiveDate;
use gti_core::config::{BlsCredentials, Secret};
use gti_core::frame::TimeFrame;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_BASE_URL: &str = "https://api.bls.gov/publicAPI/v2";

#[derive(Debug, Serialize)]
struct SeriesRequest<'a> {
    seriesid: &'a [String],
    startyear: String,
    endyear: String,
    registrationkey: &'a str,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results")]
    results: Option<Results>,
}

#[derive(Debug, Deserialize)]
struct Results {
    #[serde(default)]
    series: Vec<Series>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(rename = "seriesID")]
    series_id: String,
    #[serde(default)]
    data: Vec<DataPoint>,
}

#[derive(Debug, Deserialize)]
struct DataPoint {
    year: String,
    period: String,
    value: String,
}

/// First day of a monthly observation; `None` for M13 (annual average)
/// and non-monthly periods.
fn period_date(year: &str, period: &str) -> Option<NaiveDate> {
    let month: u32 = period.strip_prefix('M')?.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, 1)
}

pub struct Bls {
    api_key: Secret,
    base_url: String,
    http: Client,
}

impl Bls {
    pub fn new(creds: BlsCredentials) -> Result<Self, MacroDataError> {
        Ok(Self {
            api_key: creds.api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: http::client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Monthly values for each of `series_ids`, one column per series,
    /// indexed by `date` (first of month). Gaps are NaN.
    pub fn series(
        &self,
        series_ids: &[String],
        start_year: i32,
        end_year: i32,
    ) -> Result<TimeFrame, MacroDataError> {
        let url = format!("{}/timeseries/data/", self.base_url);
        let body = SeriesRequest {
            seriesid: series_ids,
            startyear: start_year.to_string(),
            endyear: end_year.to_string(),
            registrationkey: self.api_key.expose(),
        };
        let response: SeriesResponse = http::send_json(self.http.post(&url).json(&body), &url)?;
        if response.status != "REQUEST_SUCCEEDED" {
            return Err(MacroDataError::Api {
                source_name: "BLS",
                message: response.message.join("; "),
            });
        }
        let series = response.results.map(|r| r.series).unwrap_or_default();
        tracing::debug!(series = series.len(), "bls series");
        series_to_frame(series_ids, &series)
    }
}

fn series_to_frame(ids: &[String], series: &[Series]) -> Result<TimeFrame, MacroDataError> {
    let mut by_id: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    let mut dates = BTreeSet::new();
    for s in series {
        let points = by_id.entry(s.series_id.as_str()).or_default();
        for p in &s.data {
            if let Some(date) = period_date(&p.year, &p.period) {
                points.insert(date, parse_value(&p.value));
                dates.insert(date);
            }
        }
    }
    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let columns = ids
        .iter()
        .map(|id| {
            let points = by_id.get(id.as_str());
            let values = dates
                .iter()
                .map(|d| points.and_then(|p| p.get(d)).copied().unwrap_or(f64::NAN))
                .collect();
            (id.clone(), values)
        })
        .collect();
    Ok(TimeFrame::from_dates("date", &dates, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_periods_only() {
        assert_eq!(period_date("2024", "M03"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(period_date("2024", "M13"), None);
        assert_eq!(period_date("2024", "Q01"), None);
    }

    #[test]
    fn series_align_on_union_of_months() {
        let raw = r#"[
            {"seriesID": "A", "data": [
                {"year": "2024", "period": "M02", "value": "2.0"},
                {"year": "2024", "period": "M01", "value": "1.0"},
                {"year": "2024", "period": "M13", "value": "9.9"}]},
            {"seriesID": "B", "data": [
                {"year": "2024", "period": "M02", "value": "-"}]}
        ]"#;
        let series: Vec<Series> = serde_json::from_str(raw).unwrap();
        let ids = vec!["A".to_string(), "B".to_string()];
        let frame = series_to_frame(&ids, &series).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("A").unwrap(), &[1.0, 2.0]);
        assert!(frame.column("B").unwrap().iter().all(|v| v.is_nan()));
    }
}
