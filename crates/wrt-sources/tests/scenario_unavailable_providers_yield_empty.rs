//! A provider that answers with errors contributes nothing, and never fails
//! the caller.

use std::time::Duration;

use httpmock::prelude::*;
use wrt_sources::{http_client, DedicatedLedgerSource, ExchangeSource, SourceConnector};

#[tokio::test]
async fn http_connectors_degrade_to_empty_batches() {
    // no mocks registered: every request gets a 404
    let server = MockServer::start_async().await;
    let http = http_client(Duration::from_secs(5), "wrt-scenario").unwrap();

    let connectors: Vec<Box<dyn SourceConnector>> = vec![
        Box::new(ExchangeSource::new(
            http.clone(),
            server.url("/api"),
            "#masters of kacky".to_string(),
            100,
        )),
        Box::new(DedicatedLedgerSource::new(
            http,
            server.url("/api"),
            "#masters of kacky".to_string(),
            4,
        )),
    ];

    for c in connectors {
        let out = c.fetch(None).await.expect("provider outages are not errors");
        assert!(out.is_empty(), "{} returned records", c.kind());
    }
}

#[tokio::test]
async fn undecodable_body_degrades_to_empty_batch() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/tracks");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let src = ExchangeSource::new(
        reqwest::Client::new(),
        server.url("/api"),
        "#masters of kacky".to_string(),
        100,
    );
    assert!(src.fetch(None).await.unwrap().is_empty());
}
