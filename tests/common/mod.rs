//! Test fixtures: an upstream file server and a running zipfly instance,
//! both on ephemeral local ports.

#![allow(dead_code)]

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

use zipfly::{Server, ServerOptions};

pub const SECRET: &str = "test-secret";

/// Serve `files` (path without leading slash -> body). Unknown paths get 404.
/// Returns the base URL, e.g. `http://127.0.0.1:12345`.
pub async fn start_upstream(files: Vec<(&str, Vec<u8>)>) -> String {
    let files: HashMap<String, Vec<u8>> = files
        .into_iter()
        .map(|(path, body)| (path.to_string(), body))
        .collect();

    async fn serve_file(
        State(files): State<Arc<HashMap<String, Vec<u8>>>>,
        Path(path): Path<String>,
    ) -> Response {
        match files.get(&path) {
            Some(body) => body.clone().into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    let app = Router::new()
        .route("/*path", get(serve_file))
        .with_state(Arc::new(files));

    spawn(app).await
}

/// Start zipfly with the given enforcement settings.
pub async fn start_zipfly(environment: &str, validate_signature: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");

    let server = Server::new(ServerOptions {
        environment: environment.to_string(),
        validate_signature,
        signing_secret: SECRET.to_string(),
        public_url: Url::parse(&base).unwrap(),
    })
    .unwrap();

    tokio::spawn(async move {
        server
            .serve(listener, std::future::pending())
            .await
            .unwrap();
    });

    base
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Entries of a ZIP archive as (name, compression, content), in order.
pub fn read_zip(bytes: &[u8]) -> Vec<(String, zip::CompressionMethod, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), file.compression(), content)
        })
        .collect()
}
