//! DevTools protocol side channel.
//!
//! The Playwright crate does not expose protocol-level features like cache
//! override or precise JS coverage, so the benchmark launches the browser
//! with `--remote-debugging-port` and attaches straight to the page target's
//! websocket for those two commands. Calls are strictly sequential — one
//! request in flight at a time, matched by id.

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::metrics::JsCoverage;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct DebugTarget {
    #[serde(rename = "type")]
    kind: String,
    url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

pub struct CdpSession {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl CdpSession {
    /// Attaches to the page target whose URL contains `url_fragment`
    /// (empty fragment = first page target).
    pub async fn connect_to_page(port: u16, url_fragment: &str) -> Result<Self> {
        let list_url = format!("http://127.0.0.1:{}/json", port);
        let targets: Vec<DebugTarget> = reqwest::get(&list_url)
            .await
            .with_context(|| format!("DevTools endpoint unreachable at {}", list_url))?
            .json()
            .await
            .context("DevTools /json returned unexpected payload")?;

        let target = targets
            .iter()
            .find(|t| t.kind == "page" && t.url.contains(url_fragment))
            .ok_or_else(|| {
                anyhow!(
                    "no page target matching \"{}\" on port {}",
                    url_fragment,
                    port
                )
            })?;
        let ws_url = target
            .ws_url
            .as_ref()
            .ok_or_else(|| anyhow!("page target has no webSocketDebuggerUrl"))?;

        let (ws, _) = connect_async(ws_url)
            .await
            .context("DevTools websocket handshake failed")?;

        log::debug!("attached to page target {}", target.url);
        Ok(Self { ws, next_id: 0 })
    }

    async fn send(&mut self, method: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let payload = json!({ "id": id, "method": method, "params": params });
        self.ws.send(Message::Text(payload.to_string())).await?;

        // Events arrive interleaved with the response; skip until our id.
        let reply = tokio::time::timeout(COMMAND_TIMEOUT, async {
            while let Some(msg) = self.ws.next().await {
                if let Message::Text(text) = msg? {
                    let value: Value = serde_json::from_str(&text)?;
                    if value.get("id").and_then(Value::as_u64) == Some(id) {
                        return Ok::<Value, anyhow::Error>(value);
                    }
                }
            }
            bail!("DevTools websocket closed while awaiting {}", method)
        })
        .await
        .with_context(|| format!("DevTools command {} timed out", method))??;

        if let Some(err) = reply.get("error") {
            bail!("DevTools command {} failed: {}", method, err);
        }
        Ok(reply.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn set_cache_disabled(&mut self, disabled: bool) -> Result<()> {
        self.send("Network.enable", json!({})).await?;
        self.send(
            "Network.setCacheDisabled",
            json!({ "cacheDisabled": disabled }),
        )
        .await?;
        Ok(())
    }

    /// Starts precise byte-level coverage. Must be called before navigation
    /// so scripts parsed during load are instrumented.
    pub async fn start_js_coverage(&mut self) -> Result<()> {
        self.send("Profiler.enable", json!({})).await?;
        self.send("Debugger.enable", json!({})).await?;
        self.send(
            "Profiler.startPreciseCoverage",
            json!({ "callCount": false, "detailed": true }),
        )
        .await?;
        Ok(())
    }

    /// Takes the accumulated coverage and resolves script sizes, returning a
    /// used/total byte summary.
    pub async fn stop_js_coverage(&mut self) -> Result<JsCoverage> {
        let taken = self.send("Profiler.takePreciseCoverage", json!({})).await?;
        self.send("Profiler.stopPreciseCoverage", json!({})).await.ok();

        let mut total_bytes: u64 = 0;
        let mut used_bytes: u64 = 0;

        let scripts = taken
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for script in scripts {
            let url = script.get("url").and_then(Value::as_str).unwrap_or("");
            if !url.starts_with("http") {
                continue; // extension / injected scripts
            }
            let script_id = match script.get("scriptId").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => continue,
            };

            let source = match self
                .send("Debugger.getScriptSource", json!({ "scriptId": script_id }))
                .await
            {
                Ok(res) => res
                    .get("scriptSource")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .len() as u64,
                Err(e) => {
                    log::debug!("script source unavailable for {}: {}", url, e);
                    continue;
                }
            };
            total_bytes += source;

            let functions = script
                .get("functions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for func in functions {
                let ranges = func
                    .get("ranges")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for range in ranges {
                    let count = range.get("count").and_then(Value::as_u64).unwrap_or(0);
                    if count == 0 {
                        continue;
                    }
                    let start = range.get("startOffset").and_then(Value::as_u64).unwrap_or(0);
                    let end = range.get("endOffset").and_then(Value::as_u64).unwrap_or(0);
                    used_bytes += end.saturating_sub(start);
                }
            }
        }

        let used_bytes = used_bytes.min(total_bytes);
        Ok(summarize_coverage(total_bytes, used_bytes))
    }
}

fn summarize_coverage(total_bytes: u64, used_bytes: u64) -> JsCoverage {
    let unused_percent = if total_bytes > 0 {
        let pct = (total_bytes - used_bytes) as f64 / total_bytes as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    } else {
        0.0
    };
    JsCoverage {
        total_kb: (total_bytes as f64 / 1024.0).round() as u64,
        used_kb: (used_bytes as f64 / 1024.0).round() as u64,
        unused_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_coverage() {
        let cov = summarize_coverage(1024 * 300, 1024 * 100);
        assert_eq!(cov.total_kb, 300);
        assert_eq!(cov.used_kb, 100);
        assert_eq!(cov.unused_percent, 66.7);
    }

    #[test]
    fn test_summarize_coverage_empty() {
        let cov = summarize_coverage(0, 0);
        assert_eq!(cov.total_kb, 0);
        assert_eq!(cov.unused_percent, 0.0);
    }
}
