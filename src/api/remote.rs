//! Purpose: JSON-over-HTTP(S) client for the Regatta KV API (range, put, delete, status).
//! Exports: `RemoteClient`.
//! Role: Concrete `RangeProvider`; the only module that touches the network.
//! Invariants: Byte strings travel as standard base64 in request and response bodies.
//! Invariants: Every request runs under the client's single operation deadline.
//! Invariants: Remote failures map to NotFound, Unavailable, or Rpc(code, message).
#![allow(clippy::result_large_err)]

use super::client::{ApiResult, ClientConfig, DeleteResponse, StatusResponse};
use crate::core::error::{Error, ErrorKind};
use crate::core::page::{GetOptions, KeyValue, Page, RangeProvider};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

const DEADLINE_EXCEEDED: &str = "DeadlineExceeded";

#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<RemoteClientInner>,
}

struct RemoteClientInner {
    base_url: Url,
    agent: ureq::Agent,
    deadline: Option<Instant>,
}

#[derive(Debug)]
struct AcceptAllServerCertVerifier;

impl ServerCertVerifier for AcceptAllServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[derive(Serialize)]
struct RangeRequest<'a> {
    table: &'a str,
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
    limit: i64,
}

#[derive(Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<WireKeyValue>,
    #[serde(default)]
    more: bool,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    table: &'a str,
    key: String,
    value: String,
}

#[derive(Serialize)]
struct DeleteRangeRequest<'a> {
    table: &'a str,
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
    prev_kv: bool,
}

#[derive(Deserialize)]
struct DeleteRangeResponse {
    #[serde(default)]
    deleted: i64,
    #[serde(default)]
    prev_kvs: Vec<WireKeyValue>,
}

#[derive(Deserialize)]
struct StatusEnvelope {
    #[serde(default)]
    version: String,
    #[serde(default)]
    tables: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct WireKeyValue {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    code: String,
    message: Option<String>,
}

impl RemoteClient {
    /// Build a client for one command invocation; the operation deadline starts now.
    pub fn connect(config: &ClientConfig) -> ApiResult<Self> {
        let base_url = normalize_endpoint(&config.endpoint)?;
        let mut builder = ureq::AgentBuilder::new()
            .timeout_connect(config.dial_timeout);
        if config.insecure {
            builder = builder.tls_config(Arc::new(skip_verify_tls_config()));
        } else if let Some(cert) = &config.cert {
            builder = builder.tls_config(Arc::new(ca_file_tls_config(cert)?));
        }
        debug!(endpoint = %base_url, insecure = config.insecure, "regatta client ready");
        Ok(Self {
            inner: Arc::new(RemoteClientInner {
                base_url,
                agent: builder.build(),
                deadline: Some(Instant::now() + config.timeout),
            }),
        })
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.deadline = Some(deadline);
        } else {
            self.inner = Arc::new(RemoteClientInner {
                base_url: self.inner.base_url.clone(),
                agent: self.inner.agent.clone(),
                deadline: Some(deadline),
            });
        }
        self
    }

    /// Single range request; the caller owns pagination.
    pub fn range(&self, table: &str, key: &[u8], opts: &GetOptions) -> ApiResult<Page> {
        let payload = RangeRequest {
            table,
            key: encode_bytes(key),
            range_end: opts.range_end.as_deref().map(encode_bytes),
            limit: opts.limit.max(0),
        };
        let response: RangeResponse = self.post_json(&["v1", "kv", "range"], &payload)?;
        let records = response
            .kvs
            .into_iter()
            .map(key_value_from_wire)
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(Page::new(records, response.more))
    }

    pub fn put(&self, table: &str, key: &[u8], value: &[u8]) -> ApiResult<()> {
        let payload = PutRequest {
            table,
            key: encode_bytes(key),
            value: encode_bytes(value),
        };
        let _response: Value = self.post_json(&["v1", "kv", "put"], &payload)?;
        Ok(())
    }

    pub fn delete_range(
        &self,
        table: &str,
        key: &[u8],
        range_end: Option<&[u8]>,
    ) -> ApiResult<DeleteResponse> {
        let payload = DeleteRangeRequest {
            table,
            key: encode_bytes(key),
            range_end: range_end.map(encode_bytes),
            prev_kv: true,
        };
        let response: DeleteRangeResponse =
            self.post_json(&["v1", "kv", "delete_range"], &payload)?;
        let prev_kvs = response
            .prev_kvs
            .into_iter()
            .map(key_value_from_wire)
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(DeleteResponse {
            deleted: response.deleted,
            prev_kvs,
        })
    }

    pub fn status(&self) -> ApiResult<StatusResponse> {
        let url = build_url(&self.inner.base_url, &["v1", "status"])?;
        let request = self.request("GET", &url)?;
        let envelope: StatusEnvelope = self.finish(request.call())?;
        Ok(StatusResponse {
            version: envelope.version,
            tables: envelope.tables.into_keys().collect(),
        })
    }

    fn post_json<T, R>(&self, segments: &[&str], body: &T) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = build_url(&self.inner.base_url, segments)?;
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        let request = self
            .request("POST", &url)?
            .set("Content-Type", "application/json");
        self.finish(request.send_string(&payload))
    }

    fn request(&self, method: &str, url: &Url) -> ApiResult<ureq::Request> {
        let mut request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        if let Some(remaining) = self.remaining()? {
            request = request.timeout(remaining);
        }
        debug!(method, url = %url, "regatta request");
        Ok(request)
    }

    fn finish<R>(&self, response: Result<ureq::Response, ureq::Error>) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => {
                if self.deadline_passed() {
                    Err(deadline_exceeded().with_source(err))
                } else {
                    Err(Error::new(ErrorKind::Unavailable)
                        .with_message(err.to_string())
                        .with_source(err))
                }
            }
        }
    }

    fn remaining(&self) -> ApiResult<Option<Duration>> {
        let Some(deadline) = self.inner.deadline else {
            return Ok(None);
        };
        let now = Instant::now();
        if now >= deadline {
            return Err(deadline_exceeded());
        }
        Ok(Some(deadline - now))
    }

    fn deadline_passed(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl RangeProvider for RemoteClient {
    fn get(&self, table: &str, key: &[u8], opts: &GetOptions) -> Result<Page, Error> {
        self.range(table, key, opts)
    }
}

fn skip_verify_tls_config() -> rustls::ClientConfig {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAllServerCertVerifier))
        .with_no_client_auth()
}

fn ca_file_tls_config(path: &Path) -> ApiResult<rustls::ClientConfig> {
    let cert_bytes = std::fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("failed to read CA certificate {}", path.display()))
            .with_source(err)
    })?;
    let mut cert_reader = Cursor::new(cert_bytes);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("failed to parse CA certificate {}", path.display()))
                .with_source(err)
        })?;
    if certs.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!(
            "CA certificate file {} contains no certificates",
            path.display()
        )));
    }

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let mut root_store = rustls::RootCertStore::empty();
    let (added, _) = root_store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message(format!(
            "CA certificate file {} contains no parsable certificates",
            path.display()
        )));
    }
    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

fn normalize_endpoint(raw: &str) -> ApiResult<Url> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let mut url = Url::parse(&with_scheme).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid endpoint '{raw}'"))
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("endpoint must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("endpoint must not include a path"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| {
                Error::new(ErrorKind::Usage).with_message("endpoint cannot be a base")
            })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn decode_bytes(text: &str) -> ApiResult<Vec<u8>> {
    STANDARD.decode(text).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid base64 in response")
            .with_source(err)
    })
}

fn key_value_from_wire(kv: WireKeyValue) -> ApiResult<KeyValue> {
    Ok(KeyValue {
        key: decode_bytes(&kv.key)?,
        value: decode_bytes(&kv.value)?,
    })
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let reader = BufReader::new(response.into_reader());
    serde_json::from_reader(reader).map_err(response_body_error)
}

/// Body reads stream without a size cap; transport failures mid-body are `Io`.
fn response_body_error(err: serde_json::Error) -> Error {
    if err.is_io() {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    } else {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    }
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    error_from_body(status, &body)
}

fn error_from_body(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => error_from_remote(envelope.error),
        Err(_) => error_from_status(status),
    }
}

fn error_from_remote(remote: RemoteError) -> Error {
    let message = remote.message.unwrap_or_default();
    match remote.code.as_str() {
        "NotFound" => Error::new(ErrorKind::NotFound).with_message(message),
        "Unavailable" => Error::new(ErrorKind::Unavailable).with_message(message),
        code => Error::rpc(code, message),
    }
}

fn error_from_status(status: u16) -> Error {
    let message = format!("remote error status {status}");
    match status {
        404 => Error::new(ErrorKind::NotFound).with_message(message),
        502 | 503 => Error::new(ErrorKind::Unavailable).with_message(message),
        504 => Error::rpc(DEADLINE_EXCEEDED, message),
        _ => Error::rpc("Unknown", message),
    }
}

fn deadline_exceeded() -> Error {
    Error::rpc(DEADLINE_EXCEEDED, "operation deadline exceeded")
}
