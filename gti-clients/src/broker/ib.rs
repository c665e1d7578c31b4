//! Interactive Brokers through the Client Portal gateway.
//!
//! The gateway is a local HTTPS service (self-signed certificate) that must
//! already be logged in. Stocks resolve to SMART-routed USD contracts.

use super::{bars_to_dataframe, Bar, BrokerError, HistoryPeriod, Quote};
use crate::http;
use chrono::{Duration, Local, NaiveDate};
use gti_core::config::IbCredentials;
use polars::prelude::DataFrame;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Snapshot field ids: last, open, high, low, prior close.
const SNAPSHOT_FIELDS: &str = "31,7295,70,71,7741";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub conid: i64,
    pub symbol: String,
    pub sec_type: String,
    pub exchange: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionChain {
    pub symbol: String,
    pub exchange: String,
    /// Expiry months as the gateway reports them (`JAN25`).
    pub expirations: Vec<String>,
    pub strikes: Vec<f64>,
}

// ── Gateway payloads ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthStatus {
    #[serde(default)]
    authenticated: bool,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(deserialize_with = "number_or_string")]
    conid: i64,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(rename = "secType")]
    sec_type: String,
    months: Option<String>,
    exchange: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Vec<HistoryBar>,
}

#[derive(Debug, Deserialize)]
struct HistoryBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
    /// Epoch milliseconds.
    t: i64,
}

#[derive(Debug, Deserialize)]
struct Strikes {
    #[serde(default)]
    call: Vec<f64>,
    #[serde(default)]
    put: Vec<f64>,
}

fn number_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    match Value::deserialize(de)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("conid out of range")),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("unexpected conid {other}"))),
    }
}

/// Snapshot values arrive as strings, sometimes prefixed with a status
/// letter (`C` closed, `H` halted).
fn snapshot_value(fields: &BTreeMap<String, Value>, id: &str) -> f64 {
    match fields.get(id) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .replace(',', "")
            .parse()
            .unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Accepts gateway bar sizes (`1d`, `5min`) and the long form (`1 day`, `5 mins`).
pub fn gateway_bar_size(bar: &str) -> String {
    let compact: String = bar.split_whitespace().collect();
    let lower = compact.to_ascii_lowercase();
    let digits: String = lower.chars().take_while(|c| c.is_ascii_digit()).collect();
    let unit = &lower[digits.len()..];
    let unit = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => "s",
        "min" | "mins" | "minute" | "minutes" => "min",
        "h" | "hour" | "hours" => "h",
        "d" | "day" | "days" => "d",
        "w" | "week" | "weeks" => "w",
        "m" | "month" | "months" => "m",
        other => other,
    };
    format!("{}{unit}", if digits.is_empty() { "1" } else { &digits })
}

fn month_key(month: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("01{month}"), "%d%b%y").ok()
}

// ── Client ───────────────────────────────────────────────────────────

pub struct IbClient {
    base_url: String,
    http: Client,
    snapshot_wait: std::time::Duration,
}

impl IbClient {
    /// Connect to the gateway at `https://{host}:{port}/v1/api`.
    pub fn connect(creds: &IbCredentials) -> Result<Self, BrokerError> {
        Self::connect_url(format!("https://{}:{}/v1/api", creds.host, creds.port))
    }

    /// Connect to an explicit API root and confirm the session is authenticated.
    pub fn connect_url(base_url: impl Into<String>) -> Result<Self, BrokerError> {
        let client = Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http::local_gateway_client()?,
            snapshot_wait: std::time::Duration::from_secs(1),
        };
        let url = client.url("/iserver/auth/status");
        let status: AuthStatus = http::send_json(client.http.get(&url), &url)?;
        if !status.authenticated {
            return Err(BrokerError::NotAuthenticated);
        }
        tracing::info!(base_url = %client.base_url, "connected to IB gateway");
        Ok(client)
    }

    /// Pause before re-reading a snapshot that came back empty.
    pub fn with_snapshot_wait(mut self, wait: std::time::Duration) -> Self {
        self.snapshot_wait = wait;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BrokerError> {
        let url = self.url(path);
        Ok(http::send_json(self.http.get(&url).query(query), &url)?)
    }

    fn search(&self, symbol: &str) -> Result<SearchHit, BrokerError> {
        let hits: Vec<SearchHit> = self.get(
            "/iserver/secdef/search",
            &[("symbol", symbol.to_string()), ("secType", "STK".to_string())],
        )?;
        hits.into_iter()
            .find(|h| h.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| BrokerError::UnknownSymbol(symbol.to_string()))
    }

    pub fn stock_contract(&self, symbol: &str) -> Result<Contract, BrokerError> {
        let hit = self.search(symbol)?;
        Ok(Contract {
            conid: hit.conid,
            symbol: hit.symbol,
            sec_type: "STK".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
        })
    }

    pub fn stock_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let contract = self.stock_contract(symbol)?;
        let query = [
            ("conids", contract.conid.to_string()),
            ("fields", SNAPSHOT_FIELDS.to_string()),
        ];
        let mut rows: Vec<BTreeMap<String, Value>> =
            self.get("/iserver/marketdata/snapshot", &query)?;
        // The first snapshot for a contract only opens the subscription.
        if rows.first().map_or(true, |r| !r.contains_key("31")) {
            std::thread::sleep(self.snapshot_wait);
            rows = self.get("/iserver/marketdata/snapshot", &query)?;
        }
        let Some(fields) = rows.first() else {
            return Ok(Quote::default());
        };
        Ok(Quote {
            last: snapshot_value(fields, "31"),
            open: snapshot_value(fields, "7295"),
            high: snapshot_value(fields, "70"),
            low: snapshot_value(fields, "71"),
            close: snapshot_value(fields, "7741"),
        })
    }

    /// Bars for `contract`, or an empty frame if the request fails.
    pub fn historical_data(
        &self,
        contract: &Contract,
        period: HistoryPeriod,
        bar_size: &str,
        outside_rth: bool,
    ) -> Result<DataFrame, BrokerError> {
        match self.try_historical_data(contract, period, bar_size, outside_rth) {
            Ok(df) => Ok(df),
            Err(e) => {
                tracing::warn!(symbol = %contract.symbol, error = %e, "historical data request failed");
                Ok(bars_to_dataframe(&[])?)
            }
        }
    }

    pub fn try_historical_data(
        &self,
        contract: &Contract,
        period: HistoryPeriod,
        bar_size: &str,
        outside_rth: bool,
    ) -> Result<DataFrame, BrokerError> {
        Ok(bars_to_dataframe(&self.bars(contract, period, bar_size, outside_rth, None)?)?)
    }

    fn bars(
        &self,
        contract: &Contract,
        period: HistoryPeriod,
        bar_size: &str,
        outside_rth: bool,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, BrokerError> {
        let mut query = vec![
            ("conid", contract.conid.to_string()),
            ("period", period.gateway()),
            ("bar", gateway_bar_size(bar_size)),
            ("outsideRth", outside_rth.to_string()),
        ];
        // The gateway counts the period back from `startTime`.
        if let Some(end) = end {
            query.push(("startTime", format!("{}-23:59:59", end.format("%Y%m%d"))));
        }
        let history: HistoryResponse = self.get("/iserver/marketdata/history", &query)?;
        tracing::debug!(symbol = %contract.symbol, %period, bars = history.data.len(), "history");
        history
            .data
            .into_iter()
            .map(|b| {
                let time = chrono::DateTime::from_timestamp_millis(b.t)
                    .ok_or(BrokerError::Invalid {
                        field: "t",
                        reason: format!("bad bar timestamp {}", b.t),
                    })?
                    .naive_utc();
                Ok(Bar {
                    time,
                    open: b.o,
                    high: b.h,
                    low: b.l,
                    close: b.c,
                    volume: b.v,
                })
            })
            .collect()
    }

    /// Daily bars between `start` and `end` inclusive.
    pub fn historical_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, BrokerError> {
        let contract = self.stock_contract(symbol)?;
        let period = HistoryPeriod::for_span(start, end);
        let bars = match self.bars(&contract, period, "1 day", false, Some(end)) {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "daily bars request failed");
                Vec::new()
            }
        };
        let kept: Vec<Bar> = bars
            .into_iter()
            .filter(|b| (start..=end).contains(&b.time.date()))
            .collect();
        Ok(bars_to_dataframe(&kept)?)
    }

    fn recent_daily_bar(&self, symbol: &str) -> Result<Option<Bar>, BrokerError> {
        let today = Local::now().date_naive();
        let contract = self.stock_contract(symbol)?;
        let bars = self
            .bars(&contract, HistoryPeriod::Days(7), "1 day", false, Some(today))
            .unwrap_or_else(|e| {
                tracing::warn!(symbol, error = %e, "fallback bars request failed");
                Vec::new()
            });
        let since = today - Duration::days(7);
        Ok(bars.into_iter().filter(|b| b.time.date() >= since).last())
    }

    /// Last trade, or the most recent daily close when the snapshot has none.
    pub fn latest_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        let quote = self.stock_quote(symbol)?;
        if !quote.last.is_nan() {
            return Ok(quote.last);
        }
        Ok(self.recent_daily_bar(symbol)?.map_or(f64::NAN, |b| b.close))
    }

    /// Session open, or the most recent daily open when the snapshot has none.
    pub fn open_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        let quote = self.stock_quote(symbol)?;
        if !quote.open.is_nan() {
            return Ok(quote.open);
        }
        Ok(self.recent_daily_bar(symbol)?.map_or(f64::NAN, |b| b.open))
    }

    /// SMART-routed option months and strikes for `symbol`.
    pub fn option_chain(&self, symbol: &str) -> Result<OptionChain, BrokerError> {
        let hit = self.search(symbol)?;
        let months: Vec<String> = hit
            .sections
            .iter()
            .filter(|s| s.sec_type == "OPT")
            .filter(|s| {
                s.exchange
                    .as_deref()
                    .map_or(true, |ex| ex.split(';').any(|e| e == "SMART"))
            })
            .filter_map(|s| s.months.as_deref())
            .flat_map(|m| m.split(';'))
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        let mut strikes = BTreeSet::new();
        for month in &months {
            let found: Strikes = self.get(
                "/iserver/secdef/strikes",
                &[
                    ("conid", hit.conid.to_string()),
                    ("sectype", "OPT".to_string()),
                    ("month", month.clone()),
                    ("exchange", "SMART".to_string()),
                ],
            )?;
            // f64 is not Ord; strikes are quoted to the cent.
            strikes.extend(found.call.iter().chain(&found.put).map(|k| (k * 100.0).round() as i64));
        }
        Ok(OptionChain {
            symbol: hit.symbol,
            exchange: "SMART".to_string(),
            expirations: months,
            strikes: strikes.into_iter().map(|k| k as f64 / 100.0).collect(),
        })
    }

    /// Expiry months, deduplicated and in calendar order.
    pub fn option_expiries(&self, symbol: &str) -> Result<Vec<String>, BrokerError> {
        let chain = self.option_chain(symbol)?;
        Ok(sort_months(chain.expirations))
    }

    pub fn disconnect(self) -> Result<(), BrokerError> {
        let url = self.url("/logout");
        http::send_empty(self.http.post(&url), &url)?;
        tracing::info!("disconnected from IB gateway");
        Ok(())
    }
}

fn sort_months(months: Vec<String>) -> Vec<String> {
    let mut keyed: Vec<(Option<NaiveDate>, String)> =
        months.into_iter().map(|m| (month_key(&m), m)).collect();
    keyed.sort();
    keyed.dedup_by(|a, b| a.1 == b.1);
    keyed.into_iter().map(|(_, m)| m).collect()
}
