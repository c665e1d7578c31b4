//! S3 and DynamoDB against a mocked endpoint: signing headers, payload
//! shapes, pagination and error mapping.

use gti_clients::aws::sigv4::EMPTY_PAYLOAD_SHA256;
use gti_clients::aws::{AttributeValue, AwsError, DynamoDbClient, Item, S3Client};
use gti_clients::data_loader::DataLoader;
use gti_core::config::{AwsCredentials, Secret};
use gti_core::data::FileFormat;
use gti_core::frame::TimeFrame;
use mockito::Matcher;
use polars::prelude::DataType;
use serde_json::json;

fn creds(token: Option<&str>) -> AwsCredentials {
    AwsCredentials {
        access_key_id: "AKIDTEST".into(),
        secret_access_key: Secret::new("secret"),
        session_token: token.map(Secret::new),
        region: "us-east-1".into(),
    }
}

fn auth_matcher(service: &str) -> Matcher {
    Matcher::Regex(format!(
        r"^AWS4-HMAC-SHA256 Credential=AKIDTEST/\d{{8}}/us-east-1/{service}/aws4_request, SignedHeaders=[a-z0-9;-]+, Signature=[0-9a-f]{{64}}$"
    ))
}

// ── S3 ───────────────────────────────────────────────────────────────

#[test]
fn s3_get_is_signed_and_loads_a_frame() {
    let mut server = mockito::Server::new();
    let object = server
        .mock("GET", "/research/prices/2024.csv")
        .match_header("authorization", auth_matcher("s3"))
        .match_header("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256)
        .match_header("x-amz-security-token", "session")
        .match_header("x-amz-date", Matcher::Regex(r"^\d{8}T\d{6}Z$".into()))
        .with_body("date,close\n2024-01-02,10.5\n2024-01-03,11.0\n")
        .create();

    let s3 = S3Client::new(creds(Some("session")))
        .unwrap()
        .with_endpoint(server.url());
    let loader = DataLoader::with_s3(s3);
    let df = loader
        .load_from_s3("research", "prices/2024.csv", FileFormat::Csv)
        .unwrap();
    object.assert();

    let frame = TimeFrame::from_dataframe(&df).unwrap();
    assert_eq!(frame.len(), 2);
    assert_eq!(frame.column("close").unwrap(), &[10.5, 11.0]);
}

#[test]
fn s3_put_sends_body_hash() {
    let mut server = mockito::Server::new();
    let body = b"hello".to_vec();
    let put = server
        .mock("PUT", "/bucket/notes.txt")
        .match_header("authorization", auth_matcher("s3"))
        .match_header(
            "x-amz-content-sha256",
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        )
        .match_body("hello")
        .with_status(200)
        .create();

    let s3 = S3Client::new(creds(None))
        .unwrap()
        .with_endpoint(server.url());
    s3.put_object("bucket", "notes.txt", body).unwrap();
    put.assert();
}

#[test]
fn s3_error_code_is_surfaced() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/bucket/missing.parquet")
        .with_status(404)
        .with_body("<?xml version=\"1.0\"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>")
        .create();

    let s3 = S3Client::new(creds(None))
        .unwrap()
        .with_endpoint(server.url());
    match s3.get_object("bucket", "missing.parquet") {
        Err(AwsError::Service { code, .. }) => assert_eq!(code, "NoSuchKey"),
        other => panic!("expected service error, got {other:?}"),
    }
}

// ── DynamoDB ─────────────────────────────────────────────────────────

fn dynamo(server: &mockito::Server) -> DynamoDbClient {
    DynamoDbClient::new(creds(None))
        .unwrap()
        .with_endpoint(server.url())
}

#[test]
fn list_tables_follows_pagination() {
    let mut server = mockito::Server::new();
    let second = server
        .mock("POST", "/")
        .match_header("x-amz-target", "DynamoDB_20120810.ListTables")
        .match_body(Matcher::PartialJson(json!({"ExclusiveStartTableName": "orders"})))
        .with_body(r#"{"TableNames": ["quotes"]}"#)
        .expect(1)
        .create();
    let first = server
        .mock("POST", "/")
        .match_header("x-amz-target", "DynamoDB_20120810.ListTables")
        .match_header("content-type", "application/x-amz-json-1.0")
        .match_header("authorization", auth_matcher("dynamodb"))
        .with_body(r#"{"TableNames": ["fills", "orders"], "LastEvaluatedTableName": "orders"}"#)
        .expect(1)
        .create();

    let tables = dynamo(&server).list_tables().unwrap();
    assert_eq!(tables, vec!["fills", "orders", "quotes"]);
    first.assert();
    second.assert();
}

#[test]
fn put_then_get_item() {
    let mut server = mockito::Server::new();
    let put = server
        .mock("POST", "/")
        .match_header("x-amz-target", "DynamoDB_20120810.PutItem")
        .match_body(Matcher::PartialJson(json!({
            "TableName": "quotes",
            "Item": {"sym": {"S": "AAPL"}, "px": {"N": "190.5"}}
        })))
        .with_body("{}")
        .create();
    server
        .mock("POST", "/")
        .match_header("x-amz-target", "DynamoDB_20120810.GetItem")
        .with_body(r#"{"Item": {"sym": {"S": "AAPL"}, "px": {"N": "190.5"}}}"#)
        .create();

    let client = dynamo(&server);
    let mut item = Item::new();
    item.insert("sym".into(), AttributeValue::from("AAPL"));
    item.insert("px".into(), AttributeValue::number(190.5));
    client.put_item("quotes", &item).unwrap();
    put.assert();

    let mut key = Item::new();
    key.insert("sym".into(), AttributeValue::from("AAPL"));
    let got = client.get_item("quotes", &key).unwrap().unwrap();
    assert_eq!(got["px"].as_f64(), Some(190.5));
}

#[test]
fn scan_frame_pages_and_types_columns() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/")
        .match_header("x-amz-target", "DynamoDB_20120810.Scan")
        .match_body(Matcher::PartialJson(json!({"ExclusiveStartKey": {"sym": {"S": "B"}}})))
        .with_body(r#"{"Items": [{"sym": {"S": "C"}, "px": {"N": "3"}}], "Count": 1}"#)
        .expect(1)
        .create();
    server
        .mock("POST", "/")
        .match_header("x-amz-target", "DynamoDB_20120810.Scan")
        .with_body(
            r#"{"Items": [{"sym": {"S": "A"}, "px": {"N": "1"}}, {"sym": {"S": "B"}, "px": {"N": "2.5"}}],
                "LastEvaluatedKey": {"sym": {"S": "B"}}}"#,
        )
        .expect(1)
        .create();

    let df = dynamo(&server).scan_frame("quotes").unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(df.column("px").unwrap().dtype(), &DataType::Float64);
    assert_eq!(df.column("sym").unwrap().dtype(), &DataType::String);
}

#[test]
fn dynamodb_error_type_is_mapped() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/")
        .with_status(400)
        .with_body(r#"{"__type": "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException", "message": "Requested resource not found"}"#)
        .create();

    match dynamo(&server).scan("nope") {
        Err(AwsError::Service { code, message }) => {
            assert_eq!(code, "ResourceNotFoundException");
            assert_eq!(message, "Requested resource not found");
        }
        other => panic!("expected service error, got {other:?}"),
    }
}
