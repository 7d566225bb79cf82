//! Integration tests for the MCP session and client.
//!
//! These tests drive the `mock-tool-server` binary over real pipes.

use std::sync::Arc;
use std::time::Duration;

use flowbridge_mcp::{
    ConnectionState, InboundMessage, LaunchSpec, McpClient, McpError, RequestId, SessionConfig,
    SessionObserver,
};
use parking_lot::Mutex;
use serde_json::{Map, json};

fn mock_server() -> LaunchSpec {
    LaunchSpec::new(env!("CARGO_BIN_EXE_mock-tool-server"))
}

/// Observer that keeps everything it is shown.
#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<InboundMessage>>,
    unparsed: Mutex<Vec<String>>,
    stderr: Mutex<String>,
    exits: Mutex<Vec<Option<i32>>>,
}

impl SessionObserver for Recorder {
    fn on_message(&self, message: &InboundMessage) {
        self.messages.lock().push(message.clone());
    }

    fn on_unparsed_line(&self, line: &str) {
        self.unparsed.lock().push(line.to_string());
    }

    fn on_stderr(&self, chunk: &str) {
        self.stderr.lock().push_str(chunk);
    }

    fn on_exit(&self, code: Option<i32>) {
        self.exits.lock().push(code);
    }
}

impl Recorder {
    fn response_ids(&self) -> Vec<RequestId> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| m.response_id().cloned())
            .collect()
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 10s"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn client_with(args: &[&str], recorder: Arc<Recorder>) -> McpClient {
    let launch = args
        .iter()
        .fold(mock_server(), |spec, arg| spec.with_arg(*arg));
    let config = SessionConfig::new(launch)
        .with_ready_timeout(Duration::from_millis(500))
        .with_request_timeout(Duration::from_secs(10));
    McpClient::with_observer(config, recorder)
}

#[tokio::test]
async fn test_connect_on_handshake_and_fetch_tools() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&["--handshake"], recorder.clone());

    client.connect().await.expect("Failed to connect");
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.session().pid().is_some());

    let tools = client.fetch_tools().await.expect("Failed to list tools");
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "upload_file", "analyze_files"]);

    // The banner is not JSON and is reported verbatim.
    assert_eq!(
        *recorder.unparsed.lock(),
        vec!["[mock-tool-server] listening on stdio".to_string()]
    );

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_falls_back_to_timer() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&[], recorder.clone());

    client.connect().await.expect("Failed to connect");
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(recorder.messages.lock().is_empty());

    client.disconnect().await;
}

#[tokio::test]
async fn test_fire_and_forget_ids_and_delivery_order() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&["--handshake"], recorder.clone());
    client.connect().await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(client.list_tools().await.unwrap());
    }
    ids.push(client.call_tool("echo", json!({"message": "hi"})).await.unwrap());
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

    wait_until(|| recorder.response_ids().len() == 6).await;
    let expected: Vec<RequestId> = (1..=6).map(RequestId::from).collect();
    assert_eq!(recorder.response_ids(), expected);

    client.disconnect().await;
}

#[tokio::test]
async fn test_upload_and_analyze() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.cobol");
    std::fs::write(&path, "       IDENTIFICATION DIVISION.\n").unwrap();

    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&["--handshake"], recorder.clone());
    client.connect().await.unwrap();

    let result = client
        .invoke_upload_file(&path)
        .await
        .expect("Failed to upload");
    assert!(!result.is_error());
    assert_eq!(
        result.text(),
        Some("Uploaded test.cobol (32 bytes)".to_string())
    );

    let result = client
        .invoke_analyze_files(&["test.cobol", "other.cobol"])
        .await
        .expect("Failed to analyze");
    assert_eq!(
        result.text(),
        Some("Analyzed 2 file(s): test.cobol, other.cobol".to_string())
    );

    wait_until(|| recorder.stderr.lock().contains("tools/call")).await;
    client.disconnect().await;
}

#[tokio::test]
async fn test_upload_missing_file_writes_nothing() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&["--handshake"], recorder.clone());
    client.connect().await.unwrap();

    let err = client
        .upload_file("/nonexistent/dir/test.cobol")
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::FileNotFound(_)));

    // No id was consumed and nothing reached the server.
    assert_eq!(client.list_tools().await.unwrap(), 1);
    wait_until(|| recorder.response_ids().len() == 1).await;
    assert!(!recorder.stderr.lock().contains("tools/call"));

    client.disconnect().await;
}

#[tokio::test]
async fn test_server_error_response() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&["--handshake"], recorder);
    client.connect().await.unwrap();

    let err = client
        .session_mut()
        .request("resources/list", Map::new(), Duration::from_secs(10))
        .await
        .unwrap_err();
    match err {
        McpError::ServerError { code, message, .. } => {
            assert_eq!(code, -32601);
            assert!(message.contains("resources/list"));
        }
        other => panic!("expected server error, got {other:?}"),
    }

    let result = client.invoke_tool("nonexistent", json!({})).await.unwrap();
    assert!(result.is_error());
    assert!(result.text().unwrap_or_default().contains("Unknown tool"));

    client.disconnect().await;
}

#[tokio::test]
async fn test_request_timeout_clears_pending() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&["--handshake", "--delay-ms", "500"], recorder);
    client.connect().await.unwrap();

    let err = client
        .session_mut()
        .request("tools/list", Map::new(), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::RequestTimeout { .. }));
    assert_eq!(client.session().pending_requests(), 0);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect().await;
}

#[tokio::test]
async fn test_server_crash_detection() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(
        &["--handshake", "--crash-on", "analyze_files"],
        recorder.clone(),
    );
    client.connect().await.unwrap();

    // Other tools still answer.
    let result = client.invoke_tool("echo", json!({"message": "hi"})).await.unwrap();
    assert_eq!(result.text(), Some("hi".to_string()));

    let err = client.invoke_analyze_files(&["test.cobol"]).await.unwrap_err();
    assert!(matches!(err, McpError::ConnectionClosed));

    wait_until(|| !recorder.exits.lock().is_empty()).await;
    assert_eq!(*recorder.exits.lock(), vec![Some(1)]);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    assert!(matches!(client.list_tools().await, Err(McpError::NotConnected)));

    // Reconnecting works and ids keep increasing.
    client.connect().await.unwrap();
    assert_eq!(client.list_tools().await.unwrap(), 3);
    client.disconnect().await;
}

#[tokio::test]
async fn test_send_after_stop_fails() {
    let recorder = Arc::new(Recorder::default());
    let mut client = client_with(&["--handshake"], recorder.clone());
    client.connect().await.unwrap();

    client.disconnect().await;
    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(recorder.exits.lock().len(), 1);

    assert!(matches!(client.list_tools().await, Err(McpError::NotConnected)));
    assert!(matches!(
        client.analyze_files(&["test.cobol"]).await,
        Err(McpError::NotConnected)
    ));
}

#[tokio::test]
async fn test_initialize_handshake() {
    let recorder = Arc::new(Recorder::default());
    let config = SessionConfig::new(mock_server())
        .with_ready_timeout(Duration::from_secs(10))
        .with_initialize(true);
    let mut client = McpClient::with_observer(config, recorder.clone());

    client.connect().await.unwrap();

    // The initialize response was the readiness signal.
    let first = recorder.messages.lock()[0].clone();
    match first {
        InboundMessage::Response { id, result } => {
            assert_eq!(id, RequestId::Number(1));
            assert_eq!(result["serverInfo"]["name"], "mock-tool-server");
        }
        other => panic!("expected initialize response, got {other:?}"),
    }

    assert_eq!(client.list_tools().await.unwrap(), 2);
    wait_until(|| {
        recorder
            .stderr
            .lock()
            .contains("notifications/initialized")
    })
    .await;

    client.disconnect().await;
}

#[tokio::test]
async fn test_connect_nonexistent_bridge() {
    let config = SessionConfig::new(LaunchSpec::new("nonexistent-mcp-bridge-12345"));
    let mut client = McpClient::new(config);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, McpError::Launch(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
