//! Graph Client Integration Tests
//!
//! Site and drive resolution, existence checks and upload primitives against
//! a mock REST endpoint.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;
    use sharepoint_router::auth::{AuthError, StaticTokenProvider, TokenProvider};
    use sharepoint_router::graph::{ChunkOutcome, GraphClient, GraphError, CLIENT_REQUEST_ID};
    use sharepoint_router::upload::ChunkRange;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ITEM_PATH: &str = "/drives/drive-1/root:/Shared%20Documents/Finance/Invoice%20March.pdf";

    fn client(api_base: &str) -> GraphClient {
        GraphClient::new(
            api_base,
            "contoso.sharepoint.com",
            "/sites/Operations",
            Arc::new(StaticTokenProvider::new("test-token")),
        )
        .unwrap()
    }

    /// Counts invalidations so tests can observe 401 handling
    #[derive(Default)]
    struct CountingTokens {
        invalidations: AtomicUsize,
    }

    #[async_trait]
    impl TokenProvider for CountingTokens {
        async fn get_token(&self) -> Result<String, AuthError> {
            Ok("stale-token".to_string())
        }

        async fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_resolve_site() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sites/contoso.sharepoint.com:/sites/Operations"))
            .and(header("authorization", "Bearer test-token"))
            .and(header_exists(CLIENT_REQUEST_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "contoso.sharepoint.com,aaa,bbb",
                "displayName": "Operations"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let site_id = client(&mock_server.uri()).resolve_site().await.unwrap();
        assert_eq!(site_id, "contoso.sharepoint.com,aaa,bbb");
    }

    #[tokio::test]
    async fn test_resolve_site_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sites/contoso.sharepoint.com:/sites/Operations"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server.uri()).resolve_site().await.unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_resolve_default_drive() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sites/site-1/drive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "drive-1",
                "driveType": "documentLibrary"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let drive_id = client(&mock_server.uri())
            .resolve_default_drive("site-1")
            .await
            .unwrap();
        assert_eq!(drive_id, "drive-1");
    }

    #[tokio::test]
    async fn test_check_exists_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(ITEM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "item-9",
                "name": "Invoice March.pdf",
                "webUrl": "https://contoso.sharepoint.com/Invoice%20March.pdf",
                "size": 2048
            })))
            .mount(&mock_server)
            .await;

        let (exists, item) = client(&mock_server.uri())
            .check_exists("drive-1", "Shared Documents/Finance/Invoice March.pdf")
            .await
            .unwrap();
        assert!(exists);
        let item = item.unwrap();
        assert_eq!(item.id, "item-9");
        assert_eq!(item.size, Some(2048));
    }

    #[tokio::test]
    async fn test_check_exists_not_found_is_not_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(ITEM_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": "itemNotFound"}
            })))
            .mount(&mock_server)
            .await;

        let (exists, item) = client(&mock_server.uri())
            .check_exists("drive-1", "Shared Documents/Finance/Invoice March.pdf")
            .await
            .unwrap();
        assert!(!exists);
        assert!(item.is_none());
    }

    #[tokio::test]
    async fn test_check_exists_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(ITEM_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server.uri())
            .check_exists("drive-1", "Shared Documents/Finance/Invoice March.pdf")
            .await
            .unwrap_err();
        match err {
            GraphError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("Expected UnexpectedStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sites/contoso.sharepoint.com:/sites/Operations"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tokens = Arc::new(CountingTokens::default());
        let client = GraphClient::new(
            &mock_server.uri(),
            "contoso.sharepoint.com",
            "/sites/Operations",
            tokens.clone(),
        )
        .unwrap();

        let err = client.resolve_site().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.status(), Some(401));
        assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forbidden_keeps_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sites/site-1/drive"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let tokens = Arc::new(CountingTokens::default());
        let client = GraphClient::new(
            &mock_server.uri(),
            "contoso.sharepoint.com",
            "/sites/Operations",
            tokens.clone(),
        )
        .unwrap();

        let err = client.resolve_default_drive("site-1").await.unwrap_err();
        assert!(matches!(err, GraphError::Unauthorized { status: 403, .. }));
        assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_put_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(format!("{ITEM_PATH}:/content")))
            .and(header("authorization", "Bearer test-token"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "new-item",
                "webUrl": "https://contoso/new",
                "size": 5
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let item = client(&mock_server.uri())
            .put_content(
                "drive-1",
                "Shared Documents/Finance/Invoice March.pdf",
                Bytes::from_static(b"hello"),
            )
            .await
            .unwrap();
        assert_eq!(item.id, "new-item");
        assert_eq!(item.web_url.as_deref(), Some("https://contoso/new"));
    }

    #[tokio::test]
    async fn test_create_upload_session() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{ITEM_PATH}:/createUploadSession")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uploadUrl": "https://upload.example/session/1",
                "expirationDateTime": "2026-10-17T10:00:00Z"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let session = client(&mock_server.uri())
            .create_upload_session("drive-1", "Shared Documents/Finance/Invoice March.pdf")
            .await
            .unwrap();
        assert_eq!(session.upload_url, "https://upload.example/session/1");
        assert_eq!(
            session.expiration_date_time.as_deref(),
            Some("2026-10-17T10:00:00Z")
        );
    }

    #[tokio::test]
    async fn test_upload_chunk_outcomes() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/session/accept"))
            .and(header("content-range", "bytes 0-3/10"))
            .and(header("content-length", "4"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "nextExpectedRanges": ["4-"]
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/session/done"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "done-item"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/session/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("session expired"))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let range = ChunkRange { start: 0, end: 3 };
        let body = Bytes::from_static(b"abcd");

        let outcome = client
            .upload_chunk(&format!("{}/session/accept", mock_server.uri()), range, 10, body.clone())
            .await
            .unwrap();
        match outcome {
            ChunkOutcome::Accepted {
                next_expected_ranges,
            } => assert_eq!(next_expected_ranges, vec!["4-".to_string()]),
            other => panic!("Expected Accepted, got {other:?}"),
        }

        let outcome = client
            .upload_chunk(&format!("{}/session/done", mock_server.uri()), range, 10, body.clone())
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::Completed(item) if item.id == "done-item"));

        let outcome = client
            .upload_chunk(&format!("{}/session/gone", mock_server.uri()), range, 10, body)
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::Failed { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_upload_chunk_sends_no_bearer_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/session/anon"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/session/anon"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&mock_server)
            .await;

        let outcome = client(&mock_server.uri())
            .upload_chunk(
                &format!("{}/session/anon", mock_server.uri()),
                ChunkRange { start: 0, end: 1 },
                4,
                Bytes::from_static(b"ab"),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::Accepted { .. }));
    }
}
