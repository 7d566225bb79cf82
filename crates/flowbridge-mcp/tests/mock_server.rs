//! Mock MCP tool server for integration testing.
//!
//! Speaks newline-delimited JSON-RPC on stdin/stdout and answers
//! `initialize`, `tools/list` and `tools/call`.
//!
//! Usage:
//!   mock-tool-server [--handshake] [--delay-ms N] [--crash-on TOOL]
//!
//! Options:
//!   --handshake        Emit a JSON notification on startup
//!   --delay-ms N       Add N ms delay to all responses
//!   --crash-on TOOL    Exit with code 1 when TOOL is called
//!
//! A non-JSON banner line is always printed first, and every request method
//! is echoed to stderr, the way bridge processes interleave their logs.

#![allow(dead_code)]

use std::env;
use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// JSON-RPC request structure.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<u64>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

/// Server configuration parsed from command line.
struct ServerConfig {
    handshake: bool,
    delay_ms: u64,
    crash_on: Option<String>,
}

impl ServerConfig {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Self {
            handshake: false,
            delay_ms: 0,
            crash_on: None,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--handshake" => {
                    config.handshake = true;
                    i += 1;
                }
                "--delay-ms" if i + 1 < args.len() => {
                    config.delay_ms = args[i + 1].parse().unwrap_or(0);
                    i += 2;
                }
                "--crash-on" if i + 1 < args.len() => {
                    config.crash_on = Some(args[i + 1].clone());
                    i += 2;
                }
                _ => {
                    i += 1;
                }
            }
        }

        config
    }
}

fn main() {
    let config = ServerConfig::from_args();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    writeln!(stdout, "[mock-tool-server] listening on stdio").unwrap();
    if config.handshake {
        writeln!(
            stdout,
            "{}",
            json!({"jsonrpc": "2.0", "method": "notifications/ready", "params": {}})
        )
        .unwrap();
    }
    stdout.flush().unwrap();

    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            return;
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(_) => continue,
        };
        eprintln!("[mock-tool-server] {}", request.method);

        // Notifications get no response
        let Some(id) = request.id else {
            continue;
        };

        if config.delay_ms > 0 {
            thread::sleep(Duration::from_millis(config.delay_ms));
        }

        let response = handle_request(id, &request, &config);
        let response_json = serde_json::to_string(&response).unwrap();
        writeln!(stdout, "{}", response_json).unwrap();
        stdout.flush().unwrap();
    }
}

fn text_result(text: String) -> Value {
    json!({ "content": [ { "type": "text", "text": text } ] })
}

fn handle_request(id: u64, request: &JsonRpcRequest, config: &ServerConfig) -> JsonRpcResponse {
    let result = match request.method.as_str() {
        "initialize" => Some(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "mock-tool-server", "version": "1.0.0" }
        })),
        "tools/list" => Some(json!({
            "tools": [
                {
                    "name": "echo",
                    "description": "Echo back the input",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "message": { "type": "string" } },
                        "required": ["message"]
                    }
                },
                {
                    "name": "upload_file",
                    "description": "Store a file for later analysis",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "file_name": { "type": "string" },
                            "file_content": { "type": "string" }
                        },
                        "required": ["file_name", "file_content"]
                    }
                },
                {
                    "name": "analyze_files",
                    "description": "Analyze previously uploaded files",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "file_paths": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["file_paths"]
                    }
                }
            ]
        })),
        "tools/call" => {
            let params = request.params.clone().unwrap_or(json!({}));
            let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let args = params.get("arguments").cloned().unwrap_or(json!({}));

            if config.crash_on.as_deref() == Some(tool_name) {
                std::process::exit(1);
            }

            match tool_name {
                "echo" => {
                    let message = args.get("message").and_then(|v| v.as_str()).unwrap_or("");
                    Some(text_result(message.to_string()))
                }
                "upload_file" => {
                    let name = args.get("file_name").and_then(|v| v.as_str()).unwrap_or("");
                    let content = args
                        .get("file_content")
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    Some(text_result(format!(
                        "Uploaded {} ({} bytes)",
                        name,
                        content.len()
                    )))
                }
                "analyze_files" => {
                    let paths: Vec<&str> = args
                        .get("file_paths")
                        .and_then(|v| v.as_array())
                        .map(|a| a.iter().filter_map(|p| p.as_str()).collect())
                        .unwrap_or_default();
                    Some(text_result(format!(
                        "Analyzed {} file(s): {}",
                        paths.len(),
                        paths.join(", ")
                    )))
                }
                _ => Some(json!({
                    "content": [
                        { "type": "text", "text": format!("Unknown tool: {}", tool_name) }
                    ],
                    "isError": true
                })),
            }
        }
        _ => None,
    };

    let error = if result.is_none() {
        Some(json!({
            "code": -32601,
            "message": format!("Method not found: {}", request.method)
        }))
    } else {
        None
    };

    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result,
        error,
    }
}
