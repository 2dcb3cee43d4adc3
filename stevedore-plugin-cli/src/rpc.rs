//! Line-delimited JSON wire protocol for plugin RPC.
//!
//! One request per line in, one response per line out. Record payloads cross
//! the wire base64-encoded so the frames stay valid JSON regardless of the
//! stored bytes. The transport stays deliberately dumb: no pipelining
//! guarantees beyond per-connection ordering, no framing beyond newlines.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::debug;

use stevedore_plugin_k8s::{SecretStore, StorageStore};
use stevedore_plugin_spec::{Error, SecretsProtocol, StorageProtocol};

/// The interface selected at startup; requests for the other interface are
/// rejected rather than silently misrouted.
pub enum PluginService {
    Secrets(Arc<SecretStore>),
    Storage(Arc<StorageStore>),
}

impl PluginService {
    pub fn secrets(store: SecretStore) -> Self {
        PluginService::Secrets(Arc::new(store))
    }

    pub fn storage(store: StorageStore) -> Self {
        PluginService::Storage(Arc::new(store))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Resolve {
        source: String,
        key: String,
    },
    Create {
        source: String,
        key: String,
        value: String,
    },
    Save {
        item_type: String,
        group: String,
        name: String,
        #[serde(default)]
        data: Option<String>,
    },
    Read {
        item_type: String,
        name: String,
    },
    Delete {
        item_type: String,
        name: String,
    },
    List {
        item_type: String,
        group: String,
    },
    Count {
        item_type: String,
        group: String,
    },
}

impl Request {
    /// Operation name for diagnostics. Never include the request body:
    /// `create` carries a secret value.
    fn op(&self) -> &'static str {
        match self {
            Request::Resolve { .. } => "resolve",
            Request::Create { .. } => "create",
            Request::Save { .. } => "save",
            Request::Read { .. } => "read",
            Request::Delete { .. } => "delete",
            Request::List { .. } => "list",
            Request::Count { .. } => "count",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<WireError>,
}

#[derive(Debug, Serialize)]
struct WireError {
    kind: &'static str,
    message: String,
}

impl Response {
    fn ok(result: Value) -> Self {
        Response {
            result: Some(result),
            error: None,
        }
    }

    fn err(kind: &'static str, message: String) -> Self {
        Response {
            result: None,
            error: Some(WireError { kind, message }),
        }
    }
}

fn respond<T: Into<Value>>(result: Result<T, Error>) -> Response {
    match result {
        Ok(value) => Response::ok(value.into()),
        Err(err) => Response::err(error_kind(&err), err.to_string()),
    }
}

fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::Configuration(_) => "configuration",
        Error::NotFound { .. } => "not_found",
        Error::RecordDoesNotExist => "record_does_not_exist",
        Error::AlreadyExists { .. } => "already_exists",
        Error::WrongDataField { .. }
        | Error::PayloadTooLarge { .. }
        | Error::UnsupportedSourceKind { .. }
        | Error::Validation(_) => "validation",
        Error::Api { .. } => "api",
    }
}

pub async fn dispatch(service: &PluginService, request: Request) -> Response {
    match (service, request) {
        (PluginService::Secrets(store), Request::Resolve { source, key }) => {
            respond(store.resolve(&source, &key).await)
        }
        (PluginService::Secrets(store), Request::Create { source, key, value }) => {
            respond(store.create(&source, &key, &value).await.map(|()| Value::Null))
        }
        (
            PluginService::Storage(store),
            Request::Save {
                item_type,
                group,
                name,
                data,
            },
        ) => {
            let data = match data.as_deref().map(|encoded| STANDARD.decode(encoded)) {
                Some(Ok(bytes)) => bytes,
                None => Vec::new(),
                Some(Err(err)) => {
                    return Response::err("validation", format!("save data is not valid base64: {err}"))
                }
            };
            respond(
                store
                    .save(&item_type, &group, &name, &data)
                    .await
                    .map(|()| Value::Null),
            )
        }
        (PluginService::Storage(store), Request::Read { item_type, name }) => respond(
            store
                .read(&item_type, &name)
                .await
                .map(|data| Value::String(STANDARD.encode(data))),
        ),
        (PluginService::Storage(store), Request::Delete { item_type, name }) => {
            respond(store.delete(&item_type, &name).await.map(|()| Value::Null))
        }
        (PluginService::Storage(store), Request::List { item_type, group }) => {
            respond(store.list(&item_type, &group).await.map(|names| {
                Value::Array(names.into_iter().map(Value::String).collect())
            }))
        }
        (PluginService::Storage(store), Request::Count { item_type, group }) => respond(
            store
                .count(&item_type, &group)
                .await
                .map(|count| Value::Number(count.into())),
        ),
        (_, request) => Response::err(
            "validation",
            format!(
                "operation {} is not supported by the selected interface",
                request.op()
            ),
        ),
    }
}

pub async fn serve(service: PluginService, listener: TcpListener) -> anyhow::Result<()> {
    let service = Arc::new(service);
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "client connected");
        let service = service.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(&service, stream).await {
                debug!(%err, "connection closed with error");
            }
        });
    }
}

async fn handle_connection(
    service: &PluginService,
    stream: tokio::net::TcpStream,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(service, request).await,
            Err(err) => Response::err("validation", format!("malformed request: {err}")),
        };
        let mut payload = serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec());
        payload.push(b'\n');
        write.write_all(&payload).await?;
    }
    Ok(())
}
