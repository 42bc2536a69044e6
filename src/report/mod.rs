//! V1-vs-V2 comparison reports from a benchmark run.

pub mod json;
pub mod markdown;

use anyhow::{Context, Result};
use std::path::Path;

use crate::harness::{BenchmarkRun, StepRecord};
use crate::metrics::PageMetrics;

pub const MARKDOWN_FILE: &str = "complaint-flow-benchmark.md";
pub const JSON_FILE: &str = "complaint-flow-benchmark.json";

/// Metric rows of the comparison table, lower is better for all of them.
pub type MetricAccessor = fn(&PageMetrics) -> Option<f64>;

pub const COMPARISON_METRICS: &[(&str, MetricAccessor)] = &[
    ("TTFB", |m| Some(m.ttfb as f64)),
    ("FCP", |m| m.fcp.map(|v| v as f64)),
    ("LCP", |m| m.lcp.map(|v| v as f64)),
    ("CLS", |m| Some(m.cls)),
    ("DCL", |m| Some(m.dom_content_loaded as f64)),
    ("Load Event", |m| Some(m.load_event as f64)),
    ("TBT", |m| Some(m.tbt as f64)),
    ("DOM Nodes", |m| Some(m.dom_nodes as f64)),
    ("JS Transferido (KB)", |m| Some(m.js_transferred_kb as f64)),
    ("Total Recursos", |m| Some(m.total_resources as f64)),
    ("Heap JS (KB)", |m| Some(m.js_heap_used as f64)),
];

/// Average of one metric over the measured steps, nulls skipped, 1 decimal.
/// `None` when no step produced the metric.
pub fn avg(steps: &[StepRecord], accessor: MetricAccessor) -> Option<f64> {
    let values: Vec<f64> = steps
        .iter()
        .filter_map(|s| s.metrics.as_ref())
        .filter_map(accessor)
        .collect();
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// `+50 (+33.3%)` — signed absolute and signed percentage, one decimal on
/// the percentage (`+0%` on a zero baseline), `—` when either side is
/// missing.
pub fn fmt_delta(a: Option<f64>, b: Option<f64>) -> String {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return "—".to_string(),
    };
    let d = b - a;
    let sign = if d > 0.0 { "+" } else { "" };
    let pct = if a != 0.0 {
        format!("{:.1}", d / a * 100.0)
    } else {
        "0".to_string()
    };
    format!("{sign}{} ({sign}{}%)", fmt_num(d), pct)
}

/// Lower-is-better verdict: `✅ X% melhor`, `❌ X% pior` or `➡️ igual`.
pub fn fmt_gain(a: Option<f64>, b: Option<f64>) -> String {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return "—".to_string(),
    };
    let d = b - a;
    // zero baseline has no meaningful percentage; the report prints plain 0
    let pct = if a != 0.0 {
        format!("{:.1}", (d / a * 100.0).abs())
    } else {
        "0".to_string()
    };
    if d < 0.0 {
        format!("✅ {}% melhor", pct)
    } else if d > 0.0 {
        format!("❌ {}% pior", pct)
    } else {
        "➡️ igual".to_string()
    }
}

/// Trims a trailing `.0` so integer-valued averages print like integers.
pub fn fmt_num(v: f64) -> String {
    if (v - v.round()).abs() < f64::EPSILON {
        format!("{}", v.round() as i64)
    } else {
        format!("{:.1}", v)
    }
}

pub fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt_num).unwrap_or_else(|| "—".to_string())
}

/// Regenerates both report files from a saved JSON dump.
pub fn generate(results_path: &Path, format: &str, output_dir: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(results_path)
        .with_context(|| format!("falha ao ler {}", results_path.display()))?;
    let run: BenchmarkRun = serde_json::from_str(&raw).context("dump de resultados inválido")?;

    match format {
        "markdown" | "md" => markdown::write(&run, &output_dir.join(MARKDOWN_FILE)),
        "json" => json::write(&run, &output_dir.join(JSON_FILE)),
        "all" => {
            markdown::write(&run, &output_dir.join(MARKDOWN_FILE))?;
            json::write(&run, &output_dir.join(JSON_FILE))
        }
        other => anyhow::bail!("formato desconhecido: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::StepRecord;

    fn metrics(ttfb: i64, fcp: Option<i64>) -> PageMetrics {
        PageMetrics {
            url: "https://x/".to_string(),
            ttfb,
            fcp,
            lcp: None,
            cls: 0.0,
            dom_content_loaded: 500,
            load_event: 1000,
            dom_nodes: 100,
            js_heap_used: 1000,
            js_heap_total: 2000,
            transferred_kb: 50,
            js_transferred_kb: 20,
            total_resources: 30,
            js_files: 10,
            tbt: 0,
            cached_resources: 0,
            js_coverage: None,
        }
    }

    fn record(ttfb: i64, fcp: Option<i64>) -> StepRecord {
        StepRecord {
            step: "Etapa".to_string(),
            url: "https://x/".to_string(),
            actual_url: "https://x/".to_string(),
            redirected: false,
            metrics: Some(metrics(ttfb, fcp)),
            error: None,
        }
    }

    #[test]
    fn test_delta_formats_sign_on_both_parts() {
        assert_eq!(fmt_delta(Some(150.0), Some(200.0)), "+50 (+33.3%)");
        assert_eq!(fmt_delta(Some(200.0), Some(150.0)), "-50 (-25.0%)");
        assert_eq!(fmt_delta(None, Some(200.0)), "—");
        assert_eq!(fmt_delta(Some(200.0), None), "—");
    }

    #[test]
    fn test_delta_zero_baseline() {
        assert_eq!(fmt_delta(Some(0.0), Some(10.0)), "+10 (+0%)");
        assert_eq!(fmt_gain(Some(0.0), Some(10.0)), "❌ 0% pior");
    }

    #[test]
    fn test_gain_verdicts() {
        assert_eq!(fmt_gain(Some(200.0), Some(150.0)), "✅ 25.0% melhor");
        assert_eq!(fmt_gain(Some(150.0), Some(200.0)), "❌ 33.3% pior");
        assert_eq!(fmt_gain(Some(100.0), Some(100.0)), "➡️ igual");
        assert_eq!(fmt_gain(None, Some(1.0)), "—");
    }

    #[test]
    fn test_avg_skips_nulls_and_rounds() {
        let steps = vec![record(100, Some(400)), record(200, None), record(101, Some(450))];
        assert_eq!(avg(&steps, |m| Some(m.ttfb as f64)), Some(133.7));
        // fcp missing in one step: average over the two present values
        assert_eq!(avg(&steps, |m| m.fcp.map(|v| v as f64)), Some(425.0));
    }

    #[test]
    fn test_avg_none_when_no_values() {
        let steps = vec![record(100, None)];
        assert_eq!(avg(&steps, |m| m.fcp.map(|v| v as f64)), None);
    }

    #[test]
    fn test_fmt_num_drops_integer_decimal() {
        assert_eq!(fmt_num(50.0), "50");
        assert_eq!(fmt_num(33.3), "33.3");
        assert_eq!(fmt_opt(None), "—");
    }
}
