// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! HTTP source against a mock session API

use mockito::Matcher;
use replaysync_client::{ClientConfig, HttpSource, SessionSource, StreamRange};
use replaysync_core::{decode_chunk, SyncError};

#[tokio::test]
async fn test_load_session() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/sessions/s-1/full")
        .match_query(Matcher::UrlEncoded("includeRrweb".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"actions":[{"kind":"action","actionId":"a","ts":10}],"rrweb":{"firstSeq":0,"lastSeq":9}}"#)
        .create_async()
        .await;

    let source = HttpSource::new(ClientConfig::new(server.url())).unwrap();
    let full = source.load_session("s-1").await.unwrap();

    assert_eq!(full.actions.len(), 1);
    assert_eq!(full.rrweb, Some(StreamRange::new(0, 9)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_chunks_passes_watermark() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/sessions/s-1/rrweb")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("afterSeq".into(), "4".into()),
            Matcher::UrlEncoded("limit".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(
            // [{"type":4,"data":{},"timestamp":1}]
            r#"{"items":[{"seq":5,"base64":"W3sidHlwZSI6NCwiZGF0YSI6e30sInRpbWVzdGFtcCI6MX1d"},{"seq":6}]}"#,
        )
        .create_async()
        .await;

    let source = HttpSource::new(ClientConfig::new(server.url())).unwrap();
    let chunks = source.fetch_chunks("s-1", 4, 2).await.unwrap();

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].seq, 5);
    let events = decode_chunk(&chunks[0]).unwrap();
    assert_eq!(events[0].timestamp, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_traces() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/sessions/s-1/traces")
        .with_status(200)
        .with_body(r#"{"items":[{"key":"k","traces":[{"requestRid":"r1","request":{},"batches":[{"trace":{"events":[]}}]}]}]}"#)
        .create_async()
        .await;

    let source = HttpSource::new(ClientConfig::new(server.url())).unwrap();
    let traces = source.fetch_traces("s-1").await.unwrap();
    assert_eq!(traces.items.len(), 1);
    assert_eq!(traces.items[0].traces[0].request_rid.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_fetch_traces_keeps_good_items_next_to_bad_ones() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/sessions/s-1/traces")
        .with_status(200)
        .with_body(
            r#"{"items":[{"key":"k","traces":[{"requestRid":{"x":1},"batches":"nope"},{"requestRid":"r-good","batches":null},"junk"]}]}"#,
        )
        .create_async()
        .await;

    let source = HttpSource::new(ClientConfig::new(server.url())).unwrap();
    let traces = source.fetch_traces("s-1").await.unwrap();
    let rids: Vec<Option<&str>> = traces.items[0]
        .traces
        .iter()
        .map(|t| t.request_rid.as_deref())
        .collect();
    assert_eq!(rids, vec![None, Some("r-good")]);
    assert!(traces.items[0].traces[1].batches.is_empty());
}

#[tokio::test]
async fn test_non_success_is_data_fetch_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/sessions/gone/full")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body("session not found")
        .create_async()
        .await;

    let source = HttpSource::new(ClientConfig::new(server.url())).unwrap();
    let err = source.load_session("gone").await.unwrap_err();
    assert!(matches!(err, SyncError::DataFetch(msg) if msg.contains("404")));
}

#[tokio::test]
async fn test_malformed_body_is_data_fetch_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/sessions/s-1/traces")
        .with_status(200)
        .with_body("<html>")
        .create_async()
        .await;

    let source = HttpSource::new(ClientConfig::new(server.url())).unwrap();
    assert!(matches!(
        source.fetch_traces("s-1").await,
        Err(SyncError::DataFetch(_))
    ));
}
