//! DynamoDB tables over the JSON 1.0 protocol.

use super::{signed_headers, sigv4, AwsError};
use crate::http::{self, HttpError};
use gti_core::config::AwsCredentials;
use polars::prelude::*;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const TARGET_PREFIX: &str = "DynamoDB_20120810";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// A DynamoDB attribute in its wire form (`{"S": "abc"}`, `{"N": "1.5"}`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Numbers travel as strings.
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    /// Base64 binary.
    #[serde(rename = "B")]
    B(String),
}

pub type Item = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    pub fn number(value: f64) -> Self {
        AttributeValue::N(value.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::N(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Text form used for string columns; `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) | AttributeValue::B(s) => Some(s.clone()),
            AttributeValue::Bool(b) => Some(b.to_string()),
            AttributeValue::Null(_) => None,
            other => serde_json::to_string(other).ok(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::S(s.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListTablesOutput {
    #[serde(default)]
    table_names: Vec<String>,
    last_evaluated_table_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetItemOutput {
    item: Option<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanOutput {
    #[serde(default)]
    items: Vec<Item>,
    last_evaluated_key: Option<Item>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

pub struct DynamoDbClient {
    creds: AwsCredentials,
    endpoint: String,
    http: Client,
}

impl DynamoDbClient {
    pub fn new(creds: AwsCredentials) -> Result<Self, AwsError> {
        let endpoint = format!("https://dynamodb.{}.amazonaws.com", creds.region);
        Ok(Self {
            creds,
            endpoint,
            http: http::client()?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn call<T: serde::de::DeserializeOwned>(&self, op: &str, body: Value) -> Result<T, AwsError> {
        let raw = format!("{}/", self.endpoint);
        let url = Url::parse(&raw).map_err(|_| AwsError::InvalidEndpoint(raw.clone()))?;
        let payload = body.to_string();
        let payload_hash = sigv4::sha256_hex(payload.as_bytes());
        let headers = signed_headers(
            &self.creds,
            "dynamodb",
            "POST",
            &url,
            &[
                ("content-type".to_string(), CONTENT_TYPE.to_string()),
                ("x-amz-target".to_string(), format!("{TARGET_PREFIX}.{op}")),
            ],
            &payload_hash,
        )?;
        let mut request = self.http.post(url.clone()).body(payload);
        for (k, v) in &headers {
            request = request.header(k.as_str(), v.as_str());
        }
        tracing::debug!(op, "dynamodb call");
        http::send_json(request, url.as_str()).map_err(service_error)
    }

    /// All table names, following `LastEvaluatedTableName`.
    pub fn list_tables(&self) -> Result<Vec<String>, AwsError> {
        let mut names = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let body = match &start {
                Some(name) => json!({ "ExclusiveStartTableName": name }),
                None => json!({}),
            };
            let page: ListTablesOutput = self.call("ListTables", body)?;
            names.extend(page.table_names);
            match page.last_evaluated_table_name {
                Some(next) => start = Some(next),
                None => return Ok(names),
            }
        }
    }

    pub fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, AwsError> {
        let out: GetItemOutput = self.call("GetItem", json!({ "TableName": table, "Key": key }))?;
        Ok(out.item)
    }

    pub fn put_item(&self, table: &str, item: &Item) -> Result<(), AwsError> {
        let _: Value = self.call("PutItem", json!({ "TableName": table, "Item": item }))?;
        Ok(())
    }

    /// Full table scan, following `LastEvaluatedKey`.
    pub fn scan(&self, table: &str) -> Result<Vec<Item>, AwsError> {
        let mut items = Vec::new();
        let mut start: Option<Item> = None;
        loop {
            let mut body = json!({ "TableName": table });
            if let Some(key) = &start {
                body["ExclusiveStartKey"] = serde_json::to_value(key)
                    .map_err(|e| AwsError::Decode(e.to_string()))?;
            }
            let page: ScanOutput = self.call("Scan", body)?;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => start = Some(key),
                None => break,
            }
        }
        tracing::debug!(table, items = items.len(), "scanned table");
        Ok(items)
    }

    pub fn scan_frame(&self, table: &str) -> Result<DataFrame, AwsError> {
        items_to_dataframe(&self.scan(table)?)
    }
}

/// Flatten items into columns in first-seen attribute order. A column whose
/// values are all numbers becomes `f64`; anything else becomes text.
pub fn items_to_dataframe(items: &[Item]) -> Result<DataFrame, AwsError> {
    let mut names: Vec<&str> = Vec::new();
    for item in items {
        for key in item.keys() {
            if !names.contains(&key.as_str()) {
                names.push(key);
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let cells: Vec<Option<&AttributeValue>> = items.iter().map(|i| i.get(name)).collect();
        let numeric = cells
            .iter()
            .flatten()
            .all(|v| matches!(v, AttributeValue::N(_)) && v.as_f64().is_some());
        let column = if numeric {
            let values: Vec<Option<f64>> = cells.iter().map(|c| c.and_then(|v| v.as_f64())).collect();
            Column::new(name.into(), values)
        } else {
            let values: Vec<Option<String>> =
                cells.iter().map(|c| c.and_then(|v| v.to_text())).collect();
            Column::new(name.into(), values)
        };
        columns.push(column);
    }
    DataFrame::new(columns).map_err(|e| AwsError::Decode(e.to_string()))
}

fn service_error(err: HttpError) -> AwsError {
    if let HttpError::Status { body, .. } = &err {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            let code = parsed.kind.rsplit('#').next().unwrap_or(&parsed.kind);
            return AwsError::Service {
                code: code.to_string(),
                message: parsed.message,
            };
        }
    }
    AwsError::Http(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_wire_format() {
        let item: Item = serde_json::from_str(
            r#"{"id": {"S": "a1"}, "px": {"N": "101.5"}, "live": {"BOOL": true},
                "tags": {"SS": ["x", "y"]}, "gone": {"NULL": true}}"#,
        )
        .unwrap();
        assert_eq!(item["id"], AttributeValue::S("a1".into()));
        assert_eq!(item["px"].as_f64(), Some(101.5));
        assert_eq!(item["live"], AttributeValue::Bool(true));
        assert_eq!(item["gone"].to_text(), None);
        assert_eq!(
            serde_json::to_string(&AttributeValue::number(2.0)).unwrap(),
            r#"{"N":"2"}"#
        );
    }

    #[test]
    fn items_flatten_to_typed_columns() {
        let rows: Vec<Item> = serde_json::from_str(
            r#"[{"sym": {"S": "AAPL"}, "px": {"N": "190.1"}},
                {"sym": {"S": "MSFT"}, "px": {"N": "410"}, "note": {"N": "1"}},
                {"sym": {"S": "GOOG"}, "px": {"S": "n/a"}}]"#,
        )
        .unwrap();
        let df = items_to_dataframe(&rows).unwrap();
        let names: Vec<&str> = df.get_columns().iter().map(|c| c.name().as_str()).collect();
        assert_eq!(names, vec!["sym", "px", "note"]);
        assert_eq!(df.column("px").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("note").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("note").unwrap().null_count(), 2);
    }

    #[test]
    fn error_type_is_shortened() {
        let err = service_error(HttpError::Status {
            url: "u".into(),
            status: 400,
            body: r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"no table"}"#.into(),
        });
        assert!(matches!(
            err,
            AwsError::Service { ref code, ref message }
                if code == "ResourceNotFoundException" && message == "no table"
        ));
    }
}
