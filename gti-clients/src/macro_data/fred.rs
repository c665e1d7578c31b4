//! FRED (St. Louis Fed) series observations.

use super::{parse_value, MacroDataError};
use crate::http;
use chrono::NaiveDate;
use gti_core::config::{FredCredentials, Secret};
use gti_core::frame::TimeFrame;
use reqwest::blocking::Client;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org";

#[derive(Debug, Deserialize)]
struct Observations {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: NaiveDate,
    value: String,
}

pub struct Fred {
    api_key: Secret,
    base_url: String,
    http: Client,
}

impl Fred {
    pub fn new(creds: FredCredentials) -> Result<Self, MacroDataError> {
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

    /// Observations of `series_id` as a frame indexed by `date` with one
    /// `value` column. Missing observations (`.`) are NaN.
    pub fn series(
        &self,
        series_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TimeFrame, MacroDataError> {
        let url = format!("{}/fred/series/observations", self.base_url);
        let mut query = vec![
            ("series_id", series_id.to_string()),
            ("api_key", self.api_key.expose().to_string()),
            ("file_type", "json".to_string()),
        ];
        if let Some(start) = start {
            query.push(("observation_start", start.to_string()));
        }
        if let Some(end) = end {
            query.push(("observation_end", end.to_string()));
        }
        let body: Observations = http::send_json(self.http.get(&url).query(&query), &url)?;
        tracing::debug!(series_id, observations = body.observations.len(), "fred series");

        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = body
            .observations
            .iter()
            .map(|o| (o.date, parse_value(&o.value)))
            .unzip();
        Ok(TimeFrame::from_dates("date", &dates, vec![("value".to_string(), values)])?)
    }
}
