//! End-to-end tests: a real zipfly router streaming files served by a local
//! upstream, driven over HTTP.

mod common;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::StatusCode;
use url::Url;

use common::{SECRET, read_zip, start_upstream, start_zipfly};
use zipfly::io::HttpSource;
use zipfly::{Entry, SignatureValidator, ZipStreamer};
use zipfly::signature::{EXPIRES_HEADER, SIGNATURE_HEADER, post_message, sign};

fn far_future() -> String {
    (chrono::Utc::now().timestamp() + 3600).to_string()
}

fn payload(upstream: &str) -> String {
    format!(
        r#"{{"filename":"photos.zip","files":[
            {{"url":"{upstream}/1","filename":"f1.jpg","compress":true}},
            {{"url":"{upstream}/2","filename":"f2.jpg"}}]}}"#
    )
}

async fn upstream() -> String {
    start_upstream(vec![
        ("1", b"first file body".repeat(100)),
        ("2", (0u8..=255).cycle().take(70_000).collect()),
    ])
    .await
}

#[tokio::test]
async fn health_check() {
    let base = start_zipfly("development", false).await;

    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn post_streams_archive_in_request_order() {
    let upstream = upstream().await;
    let base = start_zipfly("development", false).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/zip"))
        .body(payload(&upstream))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/zip");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"photos.zip\""
    );

    let entries = read_zip(&resp.bytes().await.unwrap());
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].0, "f1.jpg");
    assert_eq!(entries[0].1, zip::CompressionMethod::Deflated);
    assert_eq!(entries[0].2, b"first file body".repeat(100));

    assert_eq!(entries[1].0, "f2.jpg");
    assert_eq!(entries[1].1, zip::CompressionMethod::Stored);
    let expected: Vec<u8> = (0u8..=255).cycle().take(70_000).collect();
    assert_eq!(entries[1].2, expected);
}

#[tokio::test]
async fn default_archive_name() {
    let upstream = upstream().await;
    let base = start_zipfly("development", false).await;

    let body = format!(r#"{{"files":[{{"url":"{upstream}/1","filename":"x.txt"}}]}}"#);
    let resp = reqwest::Client::new()
        .post(format!("{base}/zip"))
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"archive.zip\""
    );
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_streaming() {
    let upstream = upstream().await;
    let base = start_zipfly("development", false).await;
    let client = reqwest::Client::new();

    let cases = [
        r#"{"files": "dfdf"}"#.to_string(),
        "{}".to_string(),
        r#"{"files": []}"#.to_string(),
        format!(r#"{{"files":[{{"url":"{upstream}/1","filename":"../escape.txt"}}]}}"#),
        r#"{"files":[{"url":"ftp://example.com/1","filename":"a.txt"}]}"#.to_string(),
        format!(r#"{{"files":[{{"url":"{upstream}/1","filename":""}}]}}"#),
        format!(
            r#"{{"files":[{{"url":"{upstream}/1","filename":"{}.txt"}}]}}"#,
            "a".repeat(70_000)
        ),
    ];

    for body in cases {
        let resp = client
            .post(format!("{base}/zip"))
            .body(body.clone())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {:.80}", body);
        assert_ne!(resp.headers()["content-type"], "application/zip");
    }
}

#[tokio::test]
async fn signed_post_in_production() {
    let upstream = upstream().await;
    let base = start_zipfly("production", false).await;
    let client = reqwest::Client::new();
    let body = payload(&upstream);

    // Unsigned
    let resp = client
        .post(format!("{base}/zip"))
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Valid
    let expires = far_future();
    let signature = sign(SECRET.as_bytes(), &post_message(&expires, body.as_bytes()));
    let resp = client
        .post(format!("{base}/zip"))
        .header(SIGNATURE_HEADER, &signature)
        .header(EXPIRES_HEADER, &expires)
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_zip(&resp.bytes().await.unwrap()).len(), 2);

    // Same signature, one byte of body changed
    let mutated = body.replacen("f1.jpg", "f3.jpg", 1);
    let resp = client
        .post(format!("{base}/zip"))
        .header(SIGNATURE_HEADER, &signature)
        .header(EXPIRES_HEADER, &expires)
        .body(mutated)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Expired
    let expired = (chrono::Utc::now().timestamp() - 10).to_string();
    let signature = sign(SECRET.as_bytes(), &post_message(&expired, body.as_bytes()));
    let resp = client
        .post(format!("{base}/zip"))
        .header(SIGNATURE_HEADER, &signature)
        .header(EXPIRES_HEADER, &expired)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.text().await.unwrap(), "invalid signature");
}

#[tokio::test]
async fn explicit_validation_flag_enforces_outside_production() {
    let base = start_zipfly("development", true).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/zip"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

/// Upstream serving a `list.json` whose files live on a second upstream.
async fn upstream_with_list() -> String {
    let files = upstream().await;
    let list = format!(
        r#"{{"filename":"from-source.zip","files":[{{"url":"{files}/1","filename":"/a/./one.txt","compress":true}}]}}"#
    );
    start_upstream(vec![("list.json", list.into_bytes())]).await
}

#[tokio::test]
async fn get_fetches_payload_from_source() {
    let lists = upstream_with_list().await;
    let base = start_zipfly("development", false).await;
    let source = BASE64_STANDARD.encode(format!("{lists}/list.json"));

    let mut url = Url::parse(&format!("{base}/zip")).unwrap();
    url.query_pairs_mut().append_pair("source", &source);
    let resp = reqwest::get(url).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"from-source.zip\""
    );
    let entries = read_zip(&resp.bytes().await.unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "a/one.txt");
    assert_eq!(entries[0].2, b"first file body".repeat(100));

    // filename override
    let mut url = Url::parse(&format!("{base}/zip")).unwrap();
    url.query_pairs_mut()
        .append_pair("source", &source)
        .append_pair("filename", "custom.zip");
    let resp = reqwest::get(url).await.unwrap();
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"custom.zip\""
    );
}

#[tokio::test]
async fn get_rejects_bad_sources() {
    let lists = upstream_with_list().await;
    let base = start_zipfly("development", false).await;

    let resp = reqwest::get(format!("{base}/zip")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "missing source url");

    let resp = reqwest::get(format!("{base}/zip?source=%25%25%25")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "invalid source url");

    let missing = BASE64_STANDARD.encode(format!("{lists}/nope.json"));
    let mut url = Url::parse(&format!("{base}/zip")).unwrap();
    url.query_pairs_mut().append_pair("source", &missing);
    let resp = reqwest::get(url).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signed_get_in_production() {
    let lists = upstream_with_list().await;
    let base = start_zipfly("production", false).await;
    let source = BASE64_STANDARD.encode(format!("{lists}/list.json"));
    let expires = far_future();

    let mut unsigned = Url::parse(&format!("{base}/zip")).unwrap();
    unsigned
        .query_pairs_mut()
        .append_pair("source", &source)
        .append_pair("expires", &expires);

    let validator = SignatureValidator::new(SECRET, Url::parse(&base).unwrap());
    let canonical = validator.canonical_url("/zip", unsigned.query().unwrap_or_default());
    let signature = sign(SECRET.as_bytes(), canonical.as_bytes());

    let resp = reqwest::get(unsigned.clone()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let mut signed = unsigned.clone();
    signed.query_pairs_mut().append_pair("signature", &signature);
    let resp = reqwest::get(signed).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_zip(&resp.bytes().await.unwrap()).len(), 1);

    // Changing any signed parameter invalidates the signature
    let mut tampered = unsigned;
    tampered
        .query_pairs_mut()
        .append_pair("filename", "other.zip")
        .append_pair("signature", &signature);
    let resp = reqwest::get(tampered).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upstream_failure_mid_stream_breaks_the_response() {
    let upstream = upstream().await;
    let base = start_zipfly("development", false).await;

    let body = format!(
        r#"{{"files":[
            {{"url":"{upstream}/1","filename":"ok.txt"}},
            {{"url":"{upstream}/missing","filename":"missing.txt"}},
            {{"url":"{upstream}/2","filename":"never.txt"}}]}}"#
    );

    let result = reqwest::Client::new()
        .post(format!("{base}/zip"))
        .body(body)
        .send()
        .await;

    // Depending on how much was flushed before the abort, the client sees
    // either a 200 whose body cannot be read to completion or a dropped
    // connection. It never sees a complete archive.
    if let Ok(resp) = result {
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.bytes().await.is_err());
    }
}

#[tokio::test]
async fn estimated_size_uses_upstream_content_length() {
    let upstream = upstream().await;
    let source = HttpSource::new().unwrap();

    let known = Entry::new(&format!("{upstream}/1"), "one.txt", false).unwrap();
    assert_eq!(known.estimated_size(&source).await, 1500);

    let missing = Entry::new(&format!("{upstream}/missing"), "gone.txt", false).unwrap();
    assert_eq!(missing.estimated_size(&source).await, 0);

    let unreachable = Entry::new("http://127.0.0.1:1/file", "nowhere.txt", false).unwrap();
    assert_eq!(unreachable.estimated_size(&source).await, 0);

    let streamer = ZipStreamer::new(vec![
        known,
        Entry::new(&format!("{upstream}/2"), "two.bin", true).unwrap(),
        missing,
    ])
    .unwrap();
    assert_eq!(streamer.estimated_size(&source).await, 1500 + 70_000);
}
