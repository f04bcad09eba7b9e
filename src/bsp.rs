//! Thin BSP JSON-RPC transport and method dispatch. Per spec §1 this layer
//! (framing, envelope shapes beyond what the core produces) is an external
//! collaborator to the target-graph engine, so it stays deliberately small:
//! a Content-Length-framed stdio loop (grounded on the teacher's
//! `languages::base_proxy::LspConnection` read loop) and a method table
//! routing onto `adapter::TargetRegistry` and `engine::Engine`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::adapter::TargetRegistry;
use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::logging::Logger;

const BSP_VERSION: &str = "2.0.0";

pub struct BspServer {
    pub config: ServerConfig,
    pub workspace_root: PathBuf,
    pub execroot: String,
    pub registry: Arc<TargetRegistry>,
    pub engine: Arc<Engine>,
    pub logger: Arc<dyn Logger>,
}

impl BspServer {
    /// Reads one Content-Length-framed JSON-RPC message from `reader`.
    /// Returns `Ok(None)` on clean EOF.
    pub async fn read_message<R>(reader: &mut BufReader<R>) -> std::io::Result<Option<Value>>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
            if let Some((key, value)) = line.trim().split_once(": ") {
                if key.eq_ignore_ascii_case("Content-Length") {
                    content_length = value.parse().ok();
                }
            }
        }

        let length = content_length.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "missing Content-Length")
        })?;
        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await?;
        let value = serde_json::from_slice(&body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(value))
    }

    /// Writes `message` Content-Length-framed to `writer`, with sorted keys
    /// and unescaped forward slashes per spec §6.
    pub async fn write_message<W>(writer: &mut W, message: &Value) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let body = serde_json::to_string(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        writer.write_all(header.as_bytes()).await?;
        writer.write_all(body.as_bytes()).await?;
        writer.flush().await
    }

    /// Dispatches one decoded JSON-RPC request/notification to the core.
    /// Returns `None` for notifications (no reply expected).
    pub async fn dispatch(&self, message: Value) -> Option<Value> {
        let id = message.get("id").cloned();
        let method = message.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        let result = self.handle_method(method, params).await;

        let id = id?;
        Some(match result {
            Ok(value) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": value,
            }),
            Err(e) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32603, "message": e.to_string() },
            }),
        })
    }

    async fn handle_method(&self, method: &str, params: Value) -> Result<Value, EngineError> {
        match method {
            "build/initialize" => Ok(self.initialize_response()),
            "build/initialized" => Ok(Value::Null),
            "build/shutdown" => Ok(Value::Null),
            "build/exit" => Ok(Value::Null),
            "workspace/buildTargets" => {
                let targets = self.registry.build_targets().await;
                Ok(json!({ "targets": targets.into_iter().map(build_target_json).collect::<Vec<_>>() }))
            }
            "buildTarget/sources" => {
                let uris = extract_uris(&params, "targets");
                let items = self.registry.sources(&uris).await;
                Ok(json!({
                    "items": items.into_iter().map(|i| json!({
                        "target": { "uri": i.target },
                        "sources": i.sources.into_iter().map(|s| json!({
                            "uri": s.uri,
                            "kind": 1,
                            "generated": s.kind_generated,
                        })).collect::<Vec<_>>(),
                        "dataKind": i.data_kind,
                        "data": {},
                    })).collect::<Vec<_>>()
                }))
            }
            "textDocument/sourceKitOptions" => {
                let uri = params
                    .get("target")
                    .and_then(|t| t.get("uri"))
                    .and_then(|u| u.as_str())
                    .unwrap_or("");
                let result = self
                    .registry
                    .source_kit_options(
                        uri,
                        &self.workspace_root.to_string_lossy(),
                        &self.config.default_settings,
                    )
                    .await;
                Ok(json!({
                    "compilerArguments": result.compiler_arguments,
                    "workingDirectory": result.working_directory,
                }))
            }
            "textDocument/registerForChanges" => {
                let uri = params
                    .get("uri")
                    .and_then(|u| u.as_str())
                    .unwrap_or("");
                let args = self
                    .registry
                    .register_for_changes(uri, &self.config.default_settings)
                    .await;
                Ok(json!({ "uri": uri, "updatedOptions": { "compilerArguments": args } }))
            }
            "buildTarget/prepare" => {
                self.registry
                    .prepare(
                        &self.config.targets,
                        &self.config.aquery_args,
                        &self.workspace_root,
                        self.logger.clone(),
                    )
                    .await;
                Ok(json!({}))
            }
            "workspace/didChangeWatchedFiles" => {
                let changes = self.registry.did_change_watched_files(&*self.logger).await;
                Ok(json!({
                    "changes": changes.into_iter().map(|(uri, _)| json!({
                        "target": { "uri": uri },
                        "kind": 2,
                    })).collect::<Vec<_>>()
                }))
            }
            _ => Err(EngineError::JsonRpc {
                code: -32601,
                message: format!("method not found: {}", method),
            }),
        }
    }

    fn initialize_response(&self) -> Value {
        json!({
            "displayName": self.config.name,
            "version": self.config.version,
            "bspVersion": BSP_VERSION,
            "capabilities": {
                "languageIds": self.config.languages,
            },
            "data": {
                "indexDatabasePath": self.config.index_database_path,
                "indexStorePath": ServerConfig::index_store_path(&self.execroot),
                "outputPathsProvider": false,
                "prepareProvider": true,
                "sourceKitOptionsProvider": true,
                "defaultSettings": self.config.default_settings,
            }
        })
    }
}

fn build_target_json(view: crate::adapter::BuildTargetView) -> Value {
    json!({
        "id": { "uri": view.id },
        "displayName": view.display_name,
        "tags": view.tags,
        "languageIds": view.language_ids,
        "dependencies": view.dependencies,
        "capabilities": {
            "canCompile": view.can_compile,
            "canTest": view.can_test,
            "canRun": view.can_run,
            "canDebug": view.can_debug,
        }
    })
}

fn extract_uris(params: &Value, targets_key: &str) -> Vec<String> {
    params
        .get(targets_key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.get("uri").and_then(|u| u.as_str()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[allow(dead_code)]
fn method_table() -> HashMap<&'static str, &'static str> {
    // Documents the supported method surface; not consulted at runtime,
    // dispatch is a direct match in `handle_method`.
    HashMap::from([
        ("build/initialize", "handshake"),
        ("workspace/buildTargets", "adapter::build_targets"),
        ("buildTarget/sources", "adapter::sources"),
        ("textDocument/sourceKitOptions", "adapter::source_kit_options"),
        (
            "textDocument/registerForChanges",
            "adapter::register_for_changes",
        ),
        ("buildTarget/prepare", "adapter::prepare"),
        (
            "workspace/didChangeWatchedFiles",
            "adapter::did_change_watched_files",
        ),
    ])
}
