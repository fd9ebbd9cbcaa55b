//! Serves "Hello World!" through the worker pool.
//!
//! ```text
//! cargo run --example hello_pool [settings.toml]
//! ```

use std::convert::Infallible;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use micro_http_worker::config::ServerSettings;
use micro_http_worker::handler::make_handler;
use micro_http_worker::server::HttpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let settings = match std::env::args().nth(1) {
        Some(path) => {
            let content = std::fs::read_to_string(&path).expect("can't read settings file");
            ServerSettings::from_toml_str(&content).expect("invalid settings file")
        }
        None => ServerSettings::default(),
    };

    let listener = match HttpListener::bind(settings, make_handler(hello_world)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "can't start server");
            return;
        }
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, stopping");
                shutdown.cancel();
            }
        });
    }

    listener.serve(shutdown).await;
}

async fn hello_world(request: Request<Bytes>) -> Result<Response<Full<Bytes>>, Infallible> {
    info!(path = request.uri().path(), body_len = request.body().len(), "request received");

    let mut response = Response::new(Full::new(Bytes::from_static(b"Hello World!\r\n")));
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}
