use native_auth::auth::{AuthError, CallbackListener};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn get(port: u16, target: &str) -> reqwest::StatusCode {
    reqwest::get(format!("http://127.0.0.1:{port}{target}"))
        .await
        .expect("request")
        .status()
}

#[tokio::test]
async fn listener_ignores_unrelated_requests_and_yields_the_code() {
    let listener = CallbackListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let port = listener.port();

    let client = tokio::spawn(async move {
        let favicon = get(port, "/favicon.ico").await;
        let empty = get(port, "/?state=_default").await;
        let code = get(port, "/?code=the-code&state=_default").await;
        (favicon, empty, code)
    });

    let code = listener.wait_for_code().await.expect("code");
    let (favicon, empty, ok) = client.await.expect("client task");

    assert_eq!(code, "the-code");
    assert_eq!(favicon, reqwest::StatusCode::NOT_FOUND);
    assert_eq!(empty, reqwest::StatusCode::NOT_FOUND);
    assert_eq!(ok, reqwest::StatusCode::OK);
}

#[tokio::test]
async fn malformed_requests_get_bad_request_and_are_ignored() {
    let listener = CallbackListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let addr = listener.local_addr();

    let client = tokio::spawn(async move {
        let mut socket = TcpStream::connect(addr).await.expect("connect");
        socket
            .write_all(b"POST /?code=nope HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .expect("write");
        let mut response = String::new();
        socket.read_to_string(&mut response).await.expect("read");

        let followup = get(addr.port(), "/?code=real").await;
        (response, followup)
    });

    let code = listener.wait_for_code().await.expect("code");
    let (response, followup) = client.await.expect("client task");

    assert_eq!(code, "real");
    assert!(response.starts_with("HTTP/1.1 400"));
    assert_eq!(followup, reqwest::StatusCode::OK);
}

#[tokio::test]
async fn error_redirect_becomes_a_listener_error() {
    let listener = CallbackListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let port = listener.port();

    let client = tokio::spawn(async move { get(port, "/?error=access_denied").await });

    let err = listener.wait_for_code().await.unwrap_err();
    let status = client.await.expect("client task");

    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    match err {
        AuthError::LocalListener(msg) => assert_eq!(msg, "authorization failed: access_denied"),
        other => panic!("expected LocalListener, got {other:?}"),
    }
}

#[tokio::test]
async fn binding_an_occupied_port_fails() {
    let first = CallbackListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let err = CallbackListener::bind(first.local_addr()).await.unwrap_err();
    assert!(matches!(err, AuthError::LocalListener(msg) if msg.contains("bind")));
}

#[tokio::test]
async fn listener_stops_serving_after_the_code() {
    let listener = CallbackListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let port = listener.port();

    let client = tokio::spawn(async move { get(port, "/?code=once").await });
    assert_eq!(listener.wait_for_code().await.expect("code"), "once");
    client.await.expect("client task");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let refused = reqwest::get(format!("http://127.0.0.1:{port}/?code=twice")).await;
    assert!(refused.is_err());
}
