//! Local HTTP fixture server.
//!
//! Serves fixed bodies by exact path on an ephemeral port so the listing
//! and fetch stages can be exercised against real HTTP without network
//! access. Bodies are streamed in small chunks so that clients see a
//! multi-chunk response.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use tokio::task::JoinHandle;

/// Chunk size used when streaming fixture bodies.
pub const FIXTURE_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone)]
struct Fixture {
    status: StatusCode,
    body: Bytes,
}

type Routes = Arc<HashMap<String, Fixture>>;

/// Builder for [`FixtureServer`].
#[derive(Debug, Default)]
pub struct FixtureServerBuilder {
    routes: HashMap<String, Fixture>,
}

impl FixtureServerBuilder {
    /// Serve `body` with 200 OK at `path`.
    pub fn route(self, path: &str, body: impl Into<Bytes>) -> Self {
        self.route_status(path, StatusCode::OK.as_u16(), body)
    }

    /// Serve `body` with the numeric HTTP `status` at `path`.
    ///
    /// Takes a plain code so callers need not share this server's `http` version.
    pub fn route_status(mut self, path: &str, status: u16, body: impl Into<Bytes>) -> Self {
        let status = StatusCode::from_u16(status).expect("valid HTTP status code");
        self.routes.insert(
            path.to_string(),
            Fixture {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Bind to an ephemeral local port and start serving.
    pub async fn start(self) -> FixtureServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture server");
        let addr = listener.local_addr().expect("fixture server address");

        let app = Router::new()
            .fallback(serve_fixture)
            .with_state(Arc::new(self.routes));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        FixtureServer { addr, handle }
    }
}

/// A running fixture server; stops when dropped.
pub struct FixtureServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    pub fn builder() -> FixtureServerBuilder {
        FixtureServerBuilder::default()
    }

    /// Absolute URL for `path` (which must start with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_fixture(State(routes): State<Routes>, uri: Uri) -> Response {
    let Some(fixture) = routes.get(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let chunks: Vec<Result<Bytes, Infallible>> = fixture
        .body
        .chunks(FIXTURE_CHUNK_SIZE)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();

    (fixture.status, Body::from_stream(futures::stream::iter(chunks))).into_response()
}
