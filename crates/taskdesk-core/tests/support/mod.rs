#![allow(dead_code)]

use std::future::{Ready, ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use tokio::net::TcpListener;

/// What the fake backend saw.
#[derive(Default)]
pub struct Recorder {
    hits: AtomicUsize,
    auth: Mutex<Vec<Option<String>>>,
    bodies: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, headers: &HeaderMap, body: &str) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.auth.lock().expect("auth lock").push(auth);
        self.bodies
            .lock()
            .expect("bodies lock")
            .push(body.to_string());
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.auth.lock().expect("auth lock").clone()
    }

    pub fn last_body_json(&self) -> serde_json::Value {
        let bodies = self.bodies.lock().expect("bodies lock");
        let last = bodies.last().expect("at least one request");
        serde_json::from_str(last).expect("request body is JSON")
    }
}

/// Serves `router` on an ephemeral loopback port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

/// Handler that records the request and answers with a fixed status and body.
pub fn reply(
    recorder: Arc<Recorder>,
    status: StatusCode,
    body: &'static str,
) -> impl Fn(HeaderMap, String) -> Ready<(StatusCode, &'static str)> + Clone + Send + Sync + 'static {
    move |headers: HeaderMap, request_body: String| {
        recorder.record(&headers, &request_body);
        ready((status, body))
    }
}
