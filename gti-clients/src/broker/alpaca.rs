//! Alpaca trading and market-data REST APIs.

use super::{bars_to_dataframe, Bar, BrokerError, Side};
use crate::http;
use chrono::{DateTime, NaiveDate, Utc};
use gti_core::config::AlpacaCredentials;
use polars::prelude::DataFrame;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub status: String,
    pub currency: String,
    #[serde(deserialize_with = "decimal_string")]
    pub cash: f64,
    #[serde(deserialize_with = "decimal_string")]
    pub equity: f64,
    #[serde(deserialize_with = "decimal_string")]
    pub buying_power: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(deserialize_with = "decimal_string")]
    pub qty: f64,
    #[serde(deserialize_with = "decimal_string")]
    pub avg_entry_price: f64,
    #[serde(deserialize_with = "decimal_string")]
    pub market_value: f64,
    pub side: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub status: String,
    pub side: String,
    pub qty: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trade {
    #[serde(rename = "t")]
    pub time: DateTime<Utc>,
    #[serde(rename = "p")]
    pub price: f64,
    #[serde(rename = "s")]
    pub size: f64,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    time_in_force: &'a str,
}

#[derive(Debug, Deserialize)]
struct LatestTrade {
    trade: Trade,
}

#[derive(Debug, Deserialize)]
struct BarsPage {
    #[serde(default)]
    bars: Option<Vec<AlpacaBar>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

/// Alpaca sends money fields as decimal strings.
fn decimal_string<'de, D: serde::Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(de)?;
    raw.parse().map_err(serde::de::Error::custom)
}

pub struct Alpaca {
    creds: AlpacaCredentials,
    http: Client,
}

impl Alpaca {
    pub fn new(creds: AlpacaCredentials) -> Result<Self, BrokerError> {
        Ok(Self {
            creds,
            http: http::client()?,
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.creds.api_key)
            .header("APCA-API-SECRET-KEY", self.creds.api_secret.expose())
    }

    fn trading_url(&self, path: &str) -> String {
        format!("{}{path}", self.creds.base_url.trim_end_matches('/'))
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}{path}", self.creds.data_url.trim_end_matches('/'))
    }

    pub fn account(&self) -> Result<Account, BrokerError> {
        let url = self.trading_url("/v2/account");
        Ok(http::send_json(self.authed(self.http.get(&url)), &url)?)
    }

    pub fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let url = self.trading_url("/v2/positions");
        Ok(http::send_json(self.authed(self.http.get(&url)), &url)?)
    }

    /// Day market order.
    pub fn submit_market_order(&self, symbol: &str, qty: f64, side: Side) -> Result<Order, BrokerError> {
        if qty.is_nan() || qty <= 0.0 {
            return Err(BrokerError::Invalid {
                field: "qty",
                reason: format!("must be positive, got {qty}"),
            });
        }
        let url = self.trading_url("/v2/orders");
        let body = OrderRequest {
            symbol,
            qty: qty.to_string(),
            side: side.as_str(),
            kind: "market",
            time_in_force: "day",
        };
        let order: Order = http::send_json(self.authed(self.http.post(&url).json(&body)), &url)?;
        tracing::info!(symbol, qty, side = side.as_str(), order_id = %order.id, "submitted market order");
        Ok(order)
    }

    pub fn latest_trade(&self, symbol: &str) -> Result<Trade, BrokerError> {
        let url = self.data_url(&format!("/v2/stocks/{symbol}/trades/latest"));
        let latest: LatestTrade = http::send_json(self.authed(self.http.get(&url)), &url)?;
        Ok(latest.trade)
    }

    /// Bars between `start` and `end`, following `next_page_token`.
    /// `timeframe` is Alpaca's form: `1Day`, `1Hour`, `15Min`.
    pub fn bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, BrokerError> {
        let url = self.data_url(&format!("/v2/stocks/{symbol}/bars"));
        let mut bars = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut query = vec![
                ("timeframe", timeframe.to_string()),
                ("start", start.format("%Y-%m-%d").to_string()),
                ("end", end.format("%Y-%m-%d").to_string()),
                ("limit", "10000".to_string()),
            ];
            if let Some(t) = &token {
                query.push(("page_token", t.clone()));
            }
            let page: BarsPage =
                http::send_json(self.authed(self.http.get(&url).query(&query)), &url)?;
            bars.extend(page.bars.unwrap_or_default().into_iter().map(|b| Bar {
                time: b.t.naive_utc(),
                open: b.o,
                high: b.h,
                low: b.l,
                close: b.c,
                volume: b.v,
            }));
            match page.next_page_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }
        tracing::debug!(symbol, timeframe, bars = bars.len(), "alpaca bars");
        Ok(bars_to_dataframe(&bars)?)
    }
}
