// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gitbay serve` command implementation.
//!
//! Starts the full service and speaks newline-delimited JSON over
//! stdin/stdout: `{"id": ..., "tool": "git_clone", "args": {...}}` in,
//! `{"id": ..., "ok": true, "result": {...}}` out. The MCP wire framing
//! proper is an external collaborator; this loop is the seam it plugs
//! into. Logs go to stderr through the redacting writer.

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use gitbay_config::GitbayConfig;
use gitbay_core::GitBayError;
use gitbay_security::{RedactingWriter, SecretRegistry};

use crate::handlers::dispatch_tool;
use crate::service::Service;

#[derive(Debug, Deserialize)]
struct ToolCall {
    #[serde(default)]
    id: Option<serde_json::Value>,
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Run the `gitbay serve` command until EOF or a termination signal.
pub async fn run_serve(config: GitbayConfig) -> Result<(), GitBayError> {
    let registry = SecretRegistry::new();
    init_tracing(&config.server.log_level, registry.clone());

    info!("starting gitbay serve");

    // Held for the process lifetime; an external scrape endpoint renders
    // through this handle.
    let _prometheus = if config.server.prometheus_enabled {
        match gitbay_metrics::PrometheusMetrics::install() {
            Ok(metrics) => {
                info!("prometheus metrics enabled");
                Some(metrics)
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        None
    };

    let service = Service::start(config, registry.clone()).await?;
    let cancel = install_signal_handler();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = cancel.cancelled() => {
                info!("shutdown signal received");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolCall>(&line) {
            Ok(call) => {
                debug!(tool = call.tool.as_str(), "tool call received");
                match dispatch_tool(&service, &call.tool, call.args).await {
                    Ok(result) => serde_json::json!({
                        "id": call.id,
                        "ok": true,
                        "result": result,
                    }),
                    Err(e) => serde_json::json!({
                        "id": call.id,
                        "ok": false,
                        "error": redacted_payload(&registry, &e),
                    }),
                }
            }
            Err(e) => serde_json::json!({
                "id": null,
                "ok": false,
                "error": { "message": format!("malformed tool call: {e}") },
            }),
        };

        let mut out = response.to_string();
        out.push('\n');
        if let Err(e) = stdout.write_all(out.as_bytes()).await {
            error!(error = %e, "stdout write failed");
            break;
        }
        let _ = stdout.flush().await;
    }

    service.shutdown().await;
    info!("gitbay serve shutdown complete");
    Ok(())
}

fn redacted_payload(registry: &SecretRegistry, error: &GitBayError) -> serde_json::Value {
    let payload = error.to_payload();
    let serialized = payload.to_string();
    let redacted = registry.redact(&serialized);
    serde_json::from_str(&redacted).unwrap_or(payload)
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a token cancelled when either signal is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable");
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
///
/// All output is routed to stderr through the redacting writer; stdout
/// belongs to the tool protocol.
fn init_tracing(log_level: &str, registry: SecretRegistry) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gitbay={log_level},warn")));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), registry.clone()))
        .try_init();
    if result.is_err() {
        // A subscriber is already installed (tests); keep it.
    }
}
