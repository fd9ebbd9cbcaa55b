use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use micro_http_worker::config::ServerSettings;
use micro_http_worker::handler::make_handler;
use micro_http_worker::server::HttpListener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

struct Running {
    addr: std::net::SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

async fn start(settings: ServerSettings) -> (Running, impl Fn() -> usize) {
    let handler = make_handler(|req: Request<Bytes>| async move {
        let body = format!("{} {}", req.uri().path(), req.body().len());
        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
    });

    let settings = ServerSettings { host: "127.0.0.1".to_string(), port: 0, ..settings };
    let listener = HttpListener::bind(settings, handler).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let pool = std::sync::Arc::clone(listener.pool());

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(listener.serve(shutdown.clone()));
    (Running { addr, shutdown, task }, move || pool.idle_count())
}

async fn read_all(stream: &mut TcpStream) -> String {
    let mut out = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut out)).await.unwrap().unwrap();
    out
}

#[tokio::test]
async fn serves_pipelined_requests_over_tcp() {
    let (running, _) = start(ServerSettings::default()).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream
        .write_all(b"POST /upload HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /last HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let out = read_all(&mut stream).await;
    assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 2);
    assert!(out.find("/upload 3").unwrap() < out.find("/last 0").unwrap());

    running.shutdown.cancel();
    running.task.await.unwrap();
}

#[tokio::test]
async fn exhausted_pool_answers_503() {
    let (running, idle_count) = start(ServerSettings { min_threads: 1, max_threads: 1, ..ServerSettings::default() }).await;

    let mut first = TcpStream::connect(running.addr).await.unwrap();
    first.write_all(b"GET /held").await.unwrap();
    timeout(Duration::from_secs(5), async {
        while idle_count() > 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let mut second = TcpStream::connect(running.addr).await.unwrap();
    let out = read_all(&mut second).await;
    assert!(out.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
    assert!(out.contains("connection: close\r\n"));

    first.write_all(b" HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
    assert!(read_all(&mut first).await.ends_with("/held 0"));

    running.shutdown.cancel();
    running.task.await.unwrap();
}

#[tokio::test]
async fn idle_client_is_disconnected() {
    let (running, idle_count) = start(ServerSettings { read_timeout: 100, ..ServerSettings::default() }).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    assert_eq!(read_all(&mut stream).await, "");

    timeout(Duration::from_secs(5), async {
        while idle_count() == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    running.shutdown.cancel();
    running.task.await.unwrap();
}

#[tokio::test]
async fn missing_certificate_fails_bind() {
    let settings = ServerSettings {
        port: 0,
        tls: Some(micro_http_worker::config::TlsSettings {
            cert_file: "/nonexistent/cert.pem".to_string(),
            key_file: "/nonexistent/key.pem".to_string(),
        }),
        ..ServerSettings::default()
    };
    let handler = make_handler(|_req: Request<Bytes>| async { Ok::<_, Infallible>(Response::new(Full::new(Bytes::new()))) });

    assert!(HttpListener::bind(settings, handler).await.is_err());
}
