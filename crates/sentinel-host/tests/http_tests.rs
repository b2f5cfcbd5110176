use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use sentinel_core::{HttpClient, HttpRequest, Secret, TransportError};
use sentinel_host::ReqwestHttpClient;
use tiny_http::{Header, Response, Server};

fn serve_once(status: u16, headers: Vec<Header>) -> (String, thread::JoinHandle<(String, Vec<(String, String)>, String)>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let method = request.method().to_string();
        let seen = request
            .headers()
            .iter()
            .map(|h| (h.field.as_str().as_str().to_string(), h.value.as_str().to_string()))
            .collect();
        let mut body = String::new();
        request.as_reader().read_to_string(&mut body).unwrap();
        let mut response = Response::from_string("ok").with_status_code(status);
        for header in headers {
            response = response.with_header(header);
        }
        request.respond(response).unwrap();
        (method, seen, body)
    });
    (format!("http://{addr}/health"), handle)
}

#[test]
fn maps_status_and_retry_after() {
    let retry_after = Header::from_bytes("Retry-After", "7").unwrap();
    let (url, handle) = serve_once(429, vec![retry_after]);

    let client = ReqwestHttpClient::new().unwrap();
    let response = client.send(&HttpRequest::get(&url, Duration::from_secs(2))).unwrap();
    let (method, _, _) = handle.join().unwrap();

    assert_eq!(method, "GET");
    assert_eq!(response.status, 429);
    assert_eq!(response.retry_after(), Some(Duration::from_secs(7)));
    assert_eq!(response.body, "ok");
}

#[test]
fn post_carries_bearer_and_body() {
    let (url, handle) = serve_once(201, vec![]);

    let client = ReqwestHttpClient::new().unwrap();
    let request = HttpRequest::post_json(&url, r#"{"tag_name":"v1.0.0"}"#.to_string(), Duration::from_secs(2))
        .with_header("Accept", "application/vnd.github+json")
        .with_bearer(Secret::new("tok-abc"));
    let response = client.send(&request).unwrap();
    let (method, headers, body) = handle.join().unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(method, "POST");
    assert_eq!(body, r#"{"tag_name":"v1.0.0"}"#);
    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };
    assert_eq!(header("Authorization").as_deref(), Some("Bearer tok-abc"));
    assert_eq!(header("Accept").as_deref(), Some("application/vnd.github+json"));
    assert_eq!(header("Content-Type").as_deref(), Some("application/json"));
}

#[test]
fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());

    let client = ReqwestHttpClient::new().unwrap();
    let err = client.send(&HttpRequest::get(&url, Duration::from_millis(200))).unwrap_err();

    assert!(matches!(err, TransportError::Timeout(_)), "{err:?}");
    assert!(err.is_retryable());
    drop(listener);
}

#[test]
fn refused_connection_is_connect_error() {
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let url = format!("http://{addr}/");

    let client = ReqwestHttpClient::new().unwrap();
    let err = client.send(&HttpRequest::get(&url, Duration::from_secs(2))).unwrap_err();

    assert!(matches!(err, TransportError::Connect(_)), "{err:?}");
}
