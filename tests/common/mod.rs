//! Purpose: In-process mock of the Regatta HTTP/JSON API for integration tests.
//! Exports: `MockRegatta`, `RangeCall`.
//! Role: Serves range/put/delete_range/status from in-memory tables on a loopback port.
//! Invariants: Range pages hold at most `page_size` records and start inclusively at `key`.
//! Invariants: A `range_end` of `[0x00]` means "no upper bound"; no `range_end` means exact key.
//! Invariants: The server thread stops when the mock is dropped.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, mpsc};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

pub type Table = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeCall {
    pub table: String,
    pub key: Vec<u8>,
    pub range_end: Option<Vec<u8>>,
    pub limit: i64,
}

#[derive(Clone)]
enum Failure {
    Envelope(u16, Value),
    Bare(u16),
}

struct MockState {
    version: String,
    page_size: usize,
    tables: BTreeMap<String, Table>,
    range_calls: Vec<RangeCall>,
    failure: Option<Failure>,
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockRegatta {
    addr: SocketAddr,
    state: Shared,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockRegatta {
    pub fn start() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let state = Arc::new(Mutex::new(MockState {
            version: "v0.5.0".to_string(),
            page_size,
            tables: BTreeMap::new(),
            range_calls: Vec::new(),
            failure: None,
        }));
        let app = router(state.clone());
        let (addr_tx, addr_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .expect("mock runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind mock");
                addr_tx
                    .send(listener.local_addr().expect("mock addr"))
                    .expect("send mock addr");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("serve mock");
            });
        });
        let addr = addr_rx.recv().expect("mock started");
        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn create_table(&self, table: &str) {
        self.lock().tables.entry(table.to_string()).or_default();
    }

    pub fn insert(&self, table: &str, key: &[u8], value: &[u8]) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
    }

    pub fn table(&self, table: &str) -> Option<Table> {
        self.lock().tables.get(table).cloned()
    }

    pub fn range_calls(&self) -> Vec<RangeCall> {
        self.lock().range_calls.clone()
    }

    /// Fail every request with a JSON error envelope.
    pub fn fail_with(&self, status: u16, code: &str, message: &str) {
        self.lock().failure = Some(Failure::Envelope(
            status,
            json!({"error": {"code": code, "message": message}}),
        ));
    }

    /// Fail every request with an empty body.
    pub fn fail_with_status(&self, status: u16) {
        self.lock().failure = Some(Failure::Bare(status));
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for MockRegatta {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/v1/kv/range", post(range))
        .route("/v1/kv/put", post(put))
        .route("/v1/kv/delete_range", post(delete_range))
        .route("/v1/status", get(status))
        .with_state(state)
}

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poison| poison.into_inner())
}

fn failure_response(failure: Failure) -> Response {
    match failure {
        Failure::Envelope(status, body) => (status_code(status), Json(body)).into_response(),
        Failure::Bare(status) => status_code(status).into_response(),
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn table_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"code": "NotFound", "message": "table not found"}})),
    )
        .into_response()
}

fn decode(value: &Value) -> Vec<u8> {
    STANDARD
        .decode(value.as_str().unwrap_or_default())
        .expect("client sends base64")
}

fn decode_opt(value: Option<&Value>) -> Option<Vec<u8>> {
    value.filter(|v| !v.is_null()).map(decode)
}

fn wire(key: &[u8], value: &[u8]) -> Value {
    json!({"key": STANDARD.encode(key), "value": STANDARD.encode(value)})
}

fn select(rows: &Table, key: &[u8], range_end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)> {
    match range_end {
        None => rows
            .get(key)
            .map(|value| (key.to_vec(), value.clone()))
            .into_iter()
            .collect(),
        Some(end) => rows
            .range(key.to_vec()..)
            .filter(|(k, _)| end == [0u8].as_slice() || k.as_slice() < end)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

async fn range(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    let call = RangeCall {
        table: body["table"].as_str().unwrap_or_default().to_string(),
        key: decode(&body["key"]),
        range_end: decode_opt(body.get("range_end")),
        limit: body["limit"].as_i64().unwrap_or(0),
    };
    state.range_calls.push(call.clone());
    if let Some(failure) = state.failure.clone() {
        return failure_response(failure);
    }
    let Some(rows) = state.tables.get(&call.table) else {
        return table_not_found();
    };
    let cap = match usize::try_from(call.limit) {
        Ok(limit) if limit > 0 => limit.min(state.page_size),
        _ => state.page_size,
    };
    let matching = select(rows, &call.key, call.range_end.as_deref());
    let more = matching.len() > cap;
    let kvs: Vec<Value> = matching
        .iter()
        .take(cap)
        .map(|(k, v)| wire(k, v))
        .collect();
    Json(json!({"count": kvs.len(), "more": more, "kvs": kvs})).into_response()
}

async fn put(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    if let Some(failure) = state.failure.clone() {
        return failure_response(failure);
    }
    let table = body["table"].as_str().unwrap_or_default().to_string();
    let Some(rows) = state.tables.get_mut(&table) else {
        return table_not_found();
    };
    rows.insert(decode(&body["key"]), decode(&body["value"]));
    Json(json!({})).into_response()
}

async fn delete_range(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    if let Some(failure) = state.failure.clone() {
        return failure_response(failure);
    }
    let table = body["table"].as_str().unwrap_or_default().to_string();
    let key = decode(&body["key"]);
    let range_end = decode_opt(body.get("range_end"));
    let Some(rows) = state.tables.get_mut(&table) else {
        return table_not_found();
    };
    let doomed = select(rows, &key, range_end.as_deref());
    for (k, _) in &doomed {
        rows.remove(k);
    }
    let prev_kvs: Vec<Value> = doomed.iter().map(|(k, v)| wire(k, v)).collect();
    Json(json!({"deleted": doomed.len(), "prev_kvs": prev_kvs})).into_response()
}

async fn status(State(state): State<Shared>) -> Response {
    let state = lock(&state);
    if let Some(failure) = state.failure.clone() {
        return failure_response(failure);
    }
    let tables: serde_json::Map<String, Value> = state
        .tables
        .keys()
        .map(|name| (name.clone(), json!({})))
        .collect();
    Json(json!({"version": state.version, "tables": tables})).into_response()
}
