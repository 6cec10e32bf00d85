//! Fabric REST Client Tests
//!
//! Exercises the HTTP client against a mock server.

use base64::Engine;
use fabdeploy::adapters::{CreateItemRequest, FabricClient, WorkspaceApi};
use fabdeploy::domain::{DefinitionPart, RemoteArtifact, RemoteFolder};
use fabdeploy::error::DeployError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn create_request(name: &str, kind: &str) -> CreateItemRequest {
    CreateItemRequest {
        display_name: name.to_string(),
        artifact_type: kind.to_string(),
        description: None,
    }
}

fn client(server: &MockServer) -> FabricClient {
    FabricClient::new(server.uri(), "tok").unwrap()
}

#[tokio::test]
async fn test_list_items_follows_continuation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/items"))
        .and(query_param("continuationToken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "2", "displayName": "Load", "type": "Notebook"}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/items"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1", "displayName": "Sales", "type": "Lakehouse"}],
            "continuationUri": format!("{}/v1/workspaces/ws/items?continuationToken=page2", server.uri())
        })))
        .mount(&server)
        .await;

    let items = client(&server).list_items("ws").await.unwrap();

    assert_eq!(
        items,
        vec![
            RemoteArtifact::new("1", "Sales", "Lakehouse"),
            RemoteArtifact::new("2", "Load", "Notebook"),
        ]
    );
}

#[tokio::test]
async fn test_list_items_rejects_repeated_continuation() {
    let server = MockServer::start().await;
    let looping = format!("{}/v1/workspaces/ws/items?continuationToken=loop", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/items"))
        .and(query_param("continuationToken", "loop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "2", "displayName": "Load", "type": "Notebook"}],
            "continuationUri": looping.clone()
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1", "displayName": "Sales", "type": "Lakehouse"}],
            "continuationUri": looping.clone()
        })))
        .mount(&server)
        .await;

    let result = client(&server).list_items("ws").await;

    assert!(matches!(
        result,
        Err(DeployError::RemoteUnavailable { status: None, .. })
    ));
}

#[tokio::test]
async fn test_create_item_returns_new_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items"))
        .and(body_partial_json(json!({"displayName": "Sales", "type": "Lakehouse"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "new-1", "displayName": "Sales", "type": "Lakehouse"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server)
        .create_item("ws", &create_request("Sales", "Lakehouse"))
        .await
        .unwrap();

    assert_eq!(id, "new-1");
}

#[tokio::test]
async fn test_create_conflict_statuses() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items"))
        .and(body_partial_json(json!({"displayName": "A"})))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items"))
        .and(body_partial_json(json!({"displayName": "B"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": "ItemDisplayNameAlreadyInUse",
            "message": "Item display name is already in use"
        })))
        .mount(&server)
        .await;

    let fabric = client(&server);
    for name in ["A", "B"] {
        let result = fabric.create_item("ws", &create_request(name, "Notebook")).await;
        match result {
            Err(DeployError::RemoteConflict { display_name, artifact_type }) => {
                assert_eq!(display_name, name);
                assert_eq!(artifact_type, "Notebook");
            }
            other => panic!("expected RemoteConflict, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_create_accepted_looks_up_listing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "lro-1", "displayName": "Sales", "type": "Lakehouse"}]
        })))
        .mount(&server)
        .await;

    let id = client(&server)
        .create_item("ws", &create_request("Sales", "Lakehouse"))
        .await
        .unwrap();

    assert_eq!(id, "lro-1");
}

#[tokio::test]
async fn test_other_errors_carry_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = client(&server)
        .create_item("ws", &create_request("Sales", "Lakehouse"))
        .await;

    match result {
        Err(DeployError::RemoteUnavailable { status, message }) => {
            assert_eq!(status, Some(403));
            assert_eq!(message, "Forbidden");
        }
        other => panic!("expected RemoteUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_definition_sends_base64_parts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items/item-1/updateDefinition"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let parts = vec![DefinitionPart::new("notebook-content.py", b"print(1)\n".to_vec())];
    client(&server)
        .update_definition("ws", "item-1", &parts)
        .await
        .unwrap();

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let part = &body["definition"]["parts"][0];

    assert_eq!(part["path"], "notebook-content.py");
    assert_eq!(part["payloadType"], "InlineBase64");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(part["payload"].as_str().unwrap())
        .unwrap();
    assert_eq!(decoded, b"print(1)\n");
}

#[tokio::test]
async fn test_update_definition_failure_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items/item-1/updateDefinition"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad part"))
        .mount(&server)
        .await;

    let result = client(&server)
        .update_definition("ws", "item-1", &[])
        .await;

    assert!(matches!(
        result,
        Err(DeployError::RemoteUnavailable { status: Some(400), .. })
    ));
}

#[tokio::test]
async fn test_probe_item() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/items/lh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "lh-1", "displayName": "Sales", "type": "Lakehouse"
        })))
        .mount(&server)
        .await;

    let fabric = client(&server);
    let present = RemoteArtifact::new("lh-1", "Sales", "Lakehouse");
    let gone = RemoteArtifact::new("lh-2", "Old", "Lakehouse");

    assert!(fabric.probe_item("ws", &present).await.is_ok());
    assert!(fabric.probe_item("ws", &gone).await.is_err());
}

#[tokio::test]
async fn test_list_folders() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws/folders"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "f-1", "displayName": "Analysis", "workspaceId": "ws"},
                {"id": "f-2", "displayName": "Daily", "parentFolderId": "f-1", "workspaceId": "ws"}
            ]
        })))
        .mount(&server)
        .await;

    let folders = client(&server).list_folders("ws").await.unwrap();

    assert_eq!(folders.len(), 2);
    assert_eq!(folders[0], RemoteFolder::new("f-1", "Analysis"));
    assert_eq!(folders[1].parent_folder_id.as_deref(), Some("f-1"));
}

#[tokio::test]
async fn test_move_item_posts_target_folder() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items/nb-1/move"))
        .and(body_partial_json(json!({"targetFolderId": "f-1"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws/items/nb-2/move"))
        .respond_with(ResponseTemplate::new(404).set_body_string("ItemNotFound"))
        .mount(&server)
        .await;

    let fabric = client(&server);
    fabric.move_item("ws", "nb-1", "f-1").await.unwrap();

    let result = fabric.move_item("ws", "nb-2", "f-1").await;
    assert!(matches!(
        result,
        Err(DeployError::RemoteUnavailable { status: Some(404), .. })
    ));
}
