//! OpenAI, FRED and BLS clients against mocked endpoints.

use chrono::NaiveDate;
use gti_clients::genai::{GenAi, GenAiError};
use gti_clients::macro_data::{Bls, Fred, MacroDataError};
use gti_core::config::{BlsCredentials, FredCredentials, OpenAiCredentials, Secret};
use mockito::Matcher;
use serde_json::json;

// ── OpenAI ───────────────────────────────────────────────────────────

fn genai(server: &mockito::Server, model: Option<&str>) -> GenAi {
    GenAi::new(OpenAiCredentials {
        api_key: Secret::new("sk-test"),
        model: model.map(str::to_string),
        base_url: Some(format!("{}/v1", server.url())),
    })
    .unwrap()
}

#[test]
fn generate_text_trims_first_choice() {
    let mut server = mockito::Server::new();
    let completion = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 150,
            "messages": [{"role": "user", "content": "Explain beta."}]
        })))
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id": "c1", "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  Beta measures co-movement.\n"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}]}"#,
        )
        .create();

    let text = genai(&server, None).generate_text("Explain beta.", None).unwrap();
    assert_eq!(text, "Beta measures co-movement.");
    completion.assert();
}

#[test]
fn custom_model_and_token_limit() {
    let mut server = mockito::Server::new();
    let completion = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({"model": "gpt-4o", "max_tokens": 20})))
        .with_body(r#"{"choices": [{"message": {"content": "ok"}}]}"#)
        .create();

    let text = genai(&server, Some("gpt-4o")).generate_text("hi", Some(20)).unwrap();
    assert_eq!(text, "ok");
    completion.assert();
}

#[test]
fn empty_choices_is_an_error() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/v1/chat/completions")
        .with_body(r#"{"choices": []}"#)
        .create();

    assert!(matches!(
        genai(&server, None).generate_text("hi", None),
        Err(GenAiError::EmptyResponse)
    ));
}

// ── FRED ─────────────────────────────────────────────────────────────

#[test]
fn fred_missing_observations_are_nan() {
    let mut server = mockito::Server::new();
    let observations = server
        .mock("GET", "/fred/series/observations")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("series_id".into(), "DGS10".into()),
            Matcher::UrlEncoded("api_key".into(), "fred-key".into()),
            Matcher::UrlEncoded("file_type".into(), "json".into()),
            Matcher::UrlEncoded("observation_start".into(), "2024-01-01".into()),
        ]))
        .with_body(
            r#"{"observations": [
                {"realtime_start": "2024-06-01", "date": "2024-01-01", "value": "."},
                {"realtime_start": "2024-06-01", "date": "2024-01-02", "value": "3.95"},
                {"realtime_start": "2024-06-01", "date": "2024-01-03", "value": "3.91"}]}"#,
        )
        .create();

    let fred = Fred::new(FredCredentials {
        api_key: Secret::new("fred-key"),
    })
    .unwrap()
    .with_base_url(server.url());
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let frame = fred.series("DGS10", Some(start), None).unwrap();
    observations.assert();

    assert_eq!(frame.index_name(), "date");
    let values = frame.column("value").unwrap();
    assert!(values[0].is_nan());
    assert_eq!(&values[1..], &[3.95, 3.91]);
}

// ── BLS ──────────────────────────────────────────────────────────────

fn bls(server: &mockito::Server) -> Bls {
    Bls::new(BlsCredentials {
        api_key: Secret::new("bls-key"),
    })
    .unwrap()
    .with_base_url(server.url())
}

#[test]
fn bls_series_become_columns() {
    let mut server = mockito::Server::new();
    let request = server
        .mock("POST", "/timeseries/data/")
        .match_body(Matcher::PartialJson(json!({
            "seriesid": ["CUUR0000SA0", "LNS14000000"],
            "startyear": "2023",
            "endyear": "2024",
            "registrationkey": "bls-key"
        })))
        .with_body(
            r#"{"status": "REQUEST_SUCCEEDED", "message": [], "Results": {"series": [
                {"seriesID": "CUUR0000SA0", "data": [
                    {"year": "2024", "period": "M02", "periodName": "February", "value": "310.326"},
                    {"year": "2024", "period": "M01", "periodName": "January", "value": "308.417"},
                    {"year": "2023", "period": "M13", "periodName": "Annual", "value": "304.702"}]},
                {"seriesID": "LNS14000000", "data": [
                    {"year": "2024", "period": "M01", "periodName": "January", "value": "3.7"}]}]}}"#,
        )
        .create();

    let ids = vec!["CUUR0000SA0".to_string(), "LNS14000000".to_string()];
    let frame = bls(&server).series(&ids, 2023, 2024).unwrap();
    request.assert();

    assert_eq!(
        frame.dates(),
        vec![
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        ]
    );
    assert_eq!(frame.column("CUUR0000SA0").unwrap(), &[308.417, 310.326]);
    let unemployment = frame.column("LNS14000000").unwrap();
    assert_eq!(unemployment[0], 3.7);
    assert!(unemployment[1].is_nan());
}

#[test]
fn bls_rejection_is_reported() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/timeseries/data/")
        .with_body(r#"{"status": "REQUEST_NOT_PROCESSED", "message": ["Invalid key"], "Results": {}}"#)
        .create();

    let err = bls(&server)
        .series(&["X".to_string()], 2024, 2024)
        .unwrap_err();
    assert!(matches!(err, MacroDataError::Api { ref message, .. } if message == "Invalid key"));
}
