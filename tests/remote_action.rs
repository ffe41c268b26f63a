//! Remote Action Integration Tests
//!
//! Runs the HTTP adapter against a one-shot local responder and checks
//! request encoding plus how responses map onto the pipeline.

use actionform::adapters::PREV_STATE_FIELD;
use actionform::{ActionForm, Encoding, RemoteAction, Submitter, SubmitOutcome, ValueBundle};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Captured request: header block and body
struct Captured {
    head: String,
    body: String,
}

/// Serve `responses` in order, one per connection, and return the requests
async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/submit", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            captured.push(read_request(&mut socket).await);

            let response = format!(
                "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
        captured
    });

    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(split) = text.find("\r\n\r\n") {
            let head = text[..split].to_string();
            let length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);

            let body = &buf[split + 4..];
            if body.len() >= length {
                return Captured {
                    head,
                    body: String::from_utf8_lossy(&body[..length]).to_string(),
                };
            }
        }

        if n == 0 {
            panic!("connection closed before the request was complete");
        }
    }
}

fn bundle(value: Value) -> ValueBundle {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_json_body_and_result() {
    let (url, server) = serve(vec![(200, r#"{"success":true,"id":7}"#)]).await;

    let action = RemoteAction::new(url).with_bearer_token("secret");
    let result = action
        .submit(&bundle(json!({"email": "ada@example.com"})))
        .await
        .unwrap();

    assert_eq!(result, json!({"success": true, "id": 7}));

    let requests = server.await.unwrap();
    let request = &requests[0];
    assert!(request.head.starts_with("POST /submit"));
    assert!(request.head.to_ascii_lowercase().contains("authorization: bearer secret"));

    let sent: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(sent, json!({"email": "ada@example.com"}));
}

#[tokio::test]
async fn test_form_encoding_sends_previous_state() {
    let (url, server) = serve(vec![
        (200, r#"{"count":1}"#),
        (200, r#"{"count":2}"#),
    ])
    .await;

    let action = RemoteAction::new(url).with_encoding(Encoding::Form);
    let data = bundle(json!({"name": "Ada", "tags": ["a", "b"]}));

    action.submit(&data).await.unwrap();
    let second = action.submit(&data).await.unwrap();
    assert_eq!(second, json!({"count": 2}));
    assert_eq!(action.previous_state(), Some(json!({"count": 2})));

    let requests = server.await.unwrap();
    assert!(requests[0].body.contains("name=Ada"));
    assert!(requests[0].body.contains("tags=a"));
    assert!(requests[0].body.contains("tags=b"));
    assert!(!requests[0].body.contains(PREV_STATE_FIELD));

    // {"count":1} url-encoded
    assert!(requests[1]
        .body
        .contains("__prev_state=%7B%22count%22%3A1%7D"));
}

#[tokio::test]
async fn test_error_status_with_json_body_maps_to_field_errors() {
    let (url, server) = serve(vec![(422, r#"{"errors":{"email":["already registered"]}}"#)]).await;

    let form = ActionForm::builder(RemoteAction::new(url)).build();
    let outcome = form
        .execute_submit(bundle(json!({"email": "taken@example.com"})))
        .await;

    assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
    assert_eq!(
        form.form_state().errors["email"].message,
        "already registered"
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_error_status_without_json_is_transport_failure() {
    let (url, server) = serve(vec![(500, "oops")]).await;

    let form = ActionForm::builder(RemoteAction::new(url)).build();
    let outcome = form.execute_submit(ValueBundle::new()).await;

    match outcome {
        SubmitOutcome::Failed(message) => assert!(message.contains("500")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(form.history()[0].error.is_some());
    server.await.unwrap();
}
