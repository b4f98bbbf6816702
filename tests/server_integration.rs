//! Full HTTP round-trips against the JSON-RPC binding.

mod common;

use std::sync::Arc;

use common::{message_send_request, start_test_server, EchoAgent};

#[tokio::test]
async fn message_send_returns_completed_task() {
    let (base_url, _server) = start_test_server(Arc::new(EchoAgent)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/a2a", base_url))
        .json(&message_send_request(1, "Hello, Agent!"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["jsonrpc"], "2.0");
    assert_eq!(json["id"], 1);
    assert!(json.get("error").is_none());

    // The result is the task object itself, discriminated by "kind".
    let result = &json["result"];
    assert_eq!(result["kind"], "task");
    assert!(result["id"].is_string());
    assert!(result["contextId"].is_string());
    assert_eq!(result["status"]["state"], "completed");

    let text = result["status"]["message"]["parts"][0]["text"]
        .as_str()
        .unwrap();
    assert!(text.contains("Echo: Hello, Agent!"), "got: {}", text);
}

#[tokio::test]
async fn tasks_get_round_trip() {
    let (base_url, _server) = start_test_server(Arc::new(EchoAgent)).await;
    let client = reqwest::Client::new();

    let send: serde_json::Value = client
        .post(format!("{}/a2a", base_url))
        .json(&message_send_request(7, "find me later"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = send["result"]["id"].as_str().unwrap();

    let get_body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 8,
        "method": "tasks/get",
        "params": {"id": task_id}
    });
    let json: serde_json::Value = client
        .post(format!("{}/a2a", base_url))
        .json(&get_body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["result"]["id"], task_id);
    assert_eq!(json["result"]["status"]["state"], "completed");
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let (base_url, _server) = start_test_server(Arc::new(EchoAgent)).await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tasks/fly",
        "params": {}
    });
    let json: serde_json::Value = client
        .post(format!("{}/a2a", base_url))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["error"]["code"], -32601);
}

#[tokio::test]
async fn unknown_task_maps_to_task_not_found_code() {
    let (base_url, _server) = start_test_server(Arc::new(EchoAgent)).await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tasks/get",
        "params": {"id": "no-such-task"}
    });
    let json: serde_json::Value = client
        .post(format!("{}/a2a", base_url))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["error"]["code"], -32001);
}

#[tokio::test]
async fn bad_version_header_is_rejected() {
    let (base_url, _server) = start_test_server(Arc::new(EchoAgent)).await;
    let client = reqwest::Client::new();

    let json: serde_json::Value = client
        .post(format!("{}/a2a", base_url))
        .header("X-A2A-Version", "42.0")
        .json(&message_send_request(3, "hi"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Version not supported"));
}

#[tokio::test]
async fn agent_card_is_discoverable() {
    let (base_url, _server) = start_test_server(Arc::new(EchoAgent)).await;
    let client = reqwest::Client::new();

    for path in ["/.well-known/agent-card.json", "/.well-known/agent.json"] {
        let json: serde_json::Value = client
            .get(format!("{}{}", base_url, path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["name"], "Test Agent");
        assert_eq!(json["capabilities"]["streaming"], true);
    }
}

#[tokio::test]
async fn message_stream_delivers_sse_until_final() {
    let (base_url, _server) = start_test_server(Arc::new(EchoAgent)).await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 9,
        "method": "message/stream",
        "params": {
            "message": {
                "messageId": "m-stream",
                "role": "user",
                "kind": "message",
                "parts": [{"kind": "text", "text": "stream it"}]
            }
        }
    });

    let resp = client
        .post(format!("{}/a2a", base_url))
        .header("Accept", "text/event-stream")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body_text = resp.text().await.unwrap();

    // Each frame is a JSON-RPC envelope whose result is the event.
    let mut states = Vec::new();
    for line in body_text.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            let frame: serde_json::Value = serde_json::from_str(data.trim()).unwrap();
            assert_eq!(frame["jsonrpc"], "2.0");
            if frame["result"]["kind"] == "status-update" {
                states.push(frame["result"]["status"]["state"].as_str().unwrap().to_string());
            }
        }
    }

    assert_eq!(states.first().map(String::as_str), Some("working"));
    assert_eq!(states.last().map(String::as_str), Some("completed"));
}
