//! Integration tests for the AI correspondent assignment flows: the
//! single-document path including the no-match marker tag, and the bulk
//! sweep's skip/precondition behavior.

use paperless_curator::{
    AppError, ChatClient, CorrespondentAssigner, OpenAiConfig, PaperlessClient, PaperlessConfig,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn paperless_for(server: &MockServer) -> PaperlessClient {
    let config = PaperlessConfig::new(&server.uri(), "test-token".into())
        .expect("mock server URI is a valid base URL");
    PaperlessClient::new(&config).expect("client construction succeeds")
}

fn chat_for(server: &MockServer) -> ChatClient {
    let config = OpenAiConfig {
        api_base: server.uri(),
        api_key: "test-key".into(),
    };
    ChatClient::new(&config).expect("client construction succeeds")
}

fn completion_with(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn bulk_sweep_skips_documents_already_carrying_the_marker() {
    let chat_server = MockServer::start().await;
    let paperless_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "results": [{ "id": 10, "name": "gpt-correspondent" }]
        })))
        .mount(&paperless_server)
        .await;

    // Document 1 already carries the marker; only document 2 gets
    // processed. No individual GET for document 1 is mounted, so any
    // attempt to touch it fails the test.
    Mock::given(method("GET"))
        .and(path("/api/documents/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": null,
            "results": [
                { "id": 1, "content": "already done", "tags": [10] },
                { "id": 2, "content": "Invoice from Acme", "tags": [] }
            ]
        })))
        .mount(&paperless_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/documents/2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2,
            "content": "Invoice from Acme",
            "tags": []
        })))
        .mount(&paperless_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/correspondents/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "results": [{ "id": 7, "name": "Acme" }]
        })))
        .mount(&paperless_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(
            r#"{"status": "match", "correspondent": "Acme"}"#,
        )))
        .expect(1)
        .mount(&chat_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/documents/2/"))
        .and(body_json(json!({ "correspondent": 7 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2 })))
        .expect(1)
        .mount(&paperless_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/documents/2/"))
        .and(body_json(json!({ "tags": [10] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2 })))
        .expect(1)
        .mount(&paperless_server)
        .await;

    let paperless = paperless_for(&paperless_server);
    let chat = chat_for(&chat_server);
    let assigner = CorrespondentAssigner::new(&paperless, &chat);

    assigner.assign_all().await.unwrap();
}

#[tokio::test]
async fn bulk_sweep_requires_the_marker_tag_to_exist() {
    let chat_server = MockServer::start().await;
    let paperless_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0,
            "next": null,
            "results": []
        })))
        .mount(&paperless_server)
        .await;

    let paperless = paperless_for(&paperless_server);
    let chat = chat_for(&chat_server);
    let assigner = CorrespondentAssigner::new(&paperless, &chat);

    let err = assigner.assign_all().await.unwrap_err();
    assert!(matches!(err, AppError::MissingConfiguration(_)));
}

#[tokio::test]
async fn a_no_match_decision_attaches_the_undetermined_marker() {
    let chat_server = MockServer::start().await;
    let paperless_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/documents/5/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5,
            "content": "illegible scan",
            "tags": []
        })))
        .mount(&paperless_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/correspondents/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0,
            "next": null,
            "results": []
        })))
        .mount(&paperless_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(
            r#"{"status": "no_match", "reason": "Unable to determine a correspondent"}"#,
        )))
        .expect(1)
        .mount(&chat_server)
        .await;

    // The marker tag is created on demand and attached; the document's
    // correspondent is never touched.
    Mock::given(method("GET"))
        .and(path("/api/tags/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0,
            "next": null,
            "results": []
        })))
        .up_to_n_times(1)
        .mount(&paperless_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tags/"))
        .and(body_json(json!({ "name": "gpt-correspondent-unable-to-determine" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(
            json!({ "id": 33, "name": "gpt-correspondent-unable-to-determine" }),
        ))
        .expect(1)
        .mount(&paperless_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/documents/5/"))
        .and(body_json(json!({ "tags": [33] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
        .expect(1)
        .mount(&paperless_server)
        .await;

    let paperless = paperless_for(&paperless_server);
    let chat = chat_for(&chat_server);
    let assigner = CorrespondentAssigner::new(&paperless, &chat);

    assigner.assign(5).await.unwrap();
}
