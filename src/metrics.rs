//! Page performance metrics.
//!
//! One `evaluate` call returns the raw `performance.*` entries as JSON; the
//! derivation into a flat metrics record happens here so the Web Vitals
//! arithmetic is unit-testable without a browser. Missing entries default to
//! null/zero — there is no error path. The caller is responsible for waiting
//! long enough that late entries (LCP, long tasks) have mostly settled.

use serde::{Deserialize, Serialize};

/// Raw snapshot script. `buffered: true` observers are not needed because the
/// timeline types used here are all readable via getEntriesByType at any
/// point after load.
pub const RAW_METRICS_JS: &str = r#"
() => {
  const nav = performance.getEntriesByType('navigation')[0];
  const mem = performance.memory;
  return {
    nav: nav ? {
      requestStart: nav.requestStart,
      responseStart: nav.responseStart,
      domContentLoadedEventEnd: nav.domContentLoadedEventEnd,
      loadEventEnd: nav.loadEventEnd,
      startTime: nav.startTime,
    } : null,
    paint: performance.getEntriesByType('paint').map(p => ({ name: p.name, startTime: p.startTime })),
    resources: performance.getEntriesByType('resource').map(r => ({
      name: r.name,
      transferSize: r.transferSize ?? 0,
      encodedBodySize: r.encodedBodySize ?? 0,
    })),
    longTasks: performance.getEntriesByType('longtask').map(t => t.duration),
    layoutShifts: performance.getEntriesByType('layout-shift').map(e => ({
      value: e.value ?? 0,
      hadRecentInput: !!e.hadRecentInput,
    })),
    lcp: performance.getEntriesByType('largest-contentful-paint').map(e => ({
      renderTime: e.renderTime ?? 0,
      loadTime: e.loadTime ?? 0,
    })),
    memory: mem ? { usedJSHeapSize: mem.usedJSHeapSize, totalJSHeapSize: mem.totalJSHeapSize } : null,
    domNodes: document.querySelectorAll('*').length,
    url: location.href,
  };
}
"#;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPerformance {
    pub nav: Option<RawNavigation>,
    pub paint: Vec<RawPaint>,
    pub resources: Vec<RawResource>,
    pub long_tasks: Vec<f64>,
    pub layout_shifts: Vec<RawLayoutShift>,
    pub lcp: Vec<RawLcpEntry>,
    pub memory: Option<RawMemory>,
    pub dom_nodes: u64,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNavigation {
    pub request_start: f64,
    pub response_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
    pub start_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPaint {
    pub name: String,
    pub start_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResource {
    pub name: String,
    pub transfer_size: u64,
    pub encoded_body_size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLayoutShift {
    pub value: f64,
    pub had_recent_input: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLcpEntry {
    pub render_time: f64,
    pub load_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMemory {
    #[serde(rename = "usedJSHeapSize")]
    pub used_js_heap_size: u64,
    #[serde(rename = "totalJSHeapSize")]
    pub total_js_heap_size: u64,
}

/// JS coverage summary produced by the protocol side channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsCoverage {
    pub total_kb: u64,
    pub used_kb: u64,
    pub unused_percent: f64,
}

/// Flat per-visit metrics record, immutable after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub url: String,
    pub ttfb: i64,
    pub fcp: Option<i64>,
    pub lcp: Option<i64>,
    pub cls: f64,
    pub dom_content_loaded: i64,
    pub load_event: i64,
    pub dom_nodes: u64,
    pub js_heap_used: u64,
    pub js_heap_total: u64,
    #[serde(rename = "transferredKB")]
    pub transferred_kb: u64,
    #[serde(rename = "jsTransferredKB")]
    pub js_transferred_kb: u64,
    pub total_resources: u64,
    pub js_files: u64,
    pub tbt: i64,
    pub cached_resources: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js_coverage: Option<JsCoverage>,
}

fn is_js_resource(name: &str) -> bool {
    match name.split_once('?') {
        Some((path, _)) => path.ends_with(".js"),
        None => name.ends_with(".js"),
    }
}

impl PageMetrics {
    pub fn derive(raw: &RawPerformance) -> Self {
        let (ttfb, dcl, load) = match &raw.nav {
            Some(nav) => (
                (nav.response_start - nav.request_start).round() as i64,
                (nav.dom_content_loaded_event_end - nav.start_time).round() as i64,
                (nav.load_event_end - nav.start_time).round() as i64,
            ),
            None => (0, 0, 0),
        };

        let fcp = raw
            .paint
            .iter()
            .find(|p| p.name == "first-contentful-paint")
            .map(|p| p.start_time.round() as i64);

        // Last LCP candidate wins; renderTime is preferred, loadTime is the
        // fallback for cross-origin images without Timing-Allow-Origin.
        let lcp = raw.lcp.last().and_then(|e| {
            let v = if e.render_time > 0.0 {
                e.render_time
            } else {
                e.load_time
            };
            if v > 0.0 {
                Some(v.round() as i64)
            } else {
                None
            }
        });

        let cls: f64 = raw
            .layout_shifts
            .iter()
            .filter(|e| !e.had_recent_input)
            .map(|e| e.value)
            .sum();
        let cls = (cls * 10_000.0).round() / 10_000.0;

        let tbt: f64 = raw.long_tasks.iter().map(|d| (d - 50.0).max(0.0)).sum();

        let transferred: u64 = raw.resources.iter().map(|r| r.transfer_size).sum();
        let js_resources: Vec<&RawResource> = raw
            .resources
            .iter()
            .filter(|r| is_js_resource(&r.name))
            .collect();
        let js_transferred: u64 = js_resources.iter().map(|r| r.transfer_size).sum();

        let cached = raw
            .resources
            .iter()
            .filter(|r| r.transfer_size == 0 && r.encoded_body_size > 0)
            .count() as u64;

        let (heap_used, heap_total) = match &raw.memory {
            Some(m) => (
                (m.used_js_heap_size as f64 / 1024.0).round() as u64,
                (m.total_js_heap_size as f64 / 1024.0).round() as u64,
            ),
            None => (0, 0),
        };

        Self {
            url: raw.url.clone(),
            ttfb,
            fcp,
            lcp,
            cls,
            dom_content_loaded: dcl,
            load_event: load,
            dom_nodes: raw.dom_nodes,
            js_heap_used: heap_used,
            js_heap_total: heap_total,
            transferred_kb: (transferred as f64 / 1024.0).round() as u64,
            js_transferred_kb: (js_transferred as f64 / 1024.0).round() as u64,
            total_resources: raw.resources.len() as u64,
            js_files: js_resources.len() as u64,
            tbt: tbt.round() as i64,
            cached_resources: cached,
            js_coverage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw() -> RawPerformance {
        RawPerformance {
            nav: Some(RawNavigation {
                request_start: 10.0,
                response_start: 110.0,
                dom_content_loaded_event_end: 560.0,
                load_event_end: 2218.4,
                start_time: 0.0,
            }),
            url: "https://www.reclameaqui.com.br/reclamar/".to_string(),
            dom_nodes: 198,
            ..Default::default()
        }
    }

    #[test]
    fn test_tbt_zero_without_long_tasks() {
        let raw = base_raw();
        let m = PageMetrics::derive(&raw);
        assert_eq!(m.tbt, 0);
    }

    #[test]
    fn test_tbt_counts_only_over_50ms() {
        let mut raw = base_raw();
        raw.long_tasks = vec![30.0, 80.0, 175.0];
        let m = PageMetrics::derive(&raw);
        // max(0, 30-50) + (80-50) + (175-50)
        assert_eq!(m.tbt, 155);
    }

    #[test]
    fn test_lcp_null_without_entries() {
        let raw = base_raw();
        let m = PageMetrics::derive(&raw);
        assert_eq!(m.lcp, None);
    }

    #[test]
    fn test_lcp_prefers_render_time_of_last_entry() {
        let mut raw = base_raw();
        raw.lcp = vec![
            RawLcpEntry { render_time: 400.0, load_time: 380.0 },
            RawLcpEntry { render_time: 0.0, load_time: 1250.4 },
        ];
        let m = PageMetrics::derive(&raw);
        assert_eq!(m.lcp, Some(1250));
    }

    #[test]
    fn test_cls_excludes_recent_input_shifts() {
        let mut raw = base_raw();
        raw.layout_shifts = vec![
            RawLayoutShift { value: 0.05, had_recent_input: false },
            RawLayoutShift { value: 0.30, had_recent_input: true },
            RawLayoutShift { value: 0.012345, had_recent_input: false },
        ];
        let m = PageMetrics::derive(&raw);
        assert_eq!(m.cls, 0.0623);
    }

    #[test]
    fn test_ttfb_and_navigation_timings() {
        let raw = base_raw();
        let m = PageMetrics::derive(&raw);
        assert_eq!(m.ttfb, 100);
        assert_eq!(m.dom_content_loaded, 560);
        assert_eq!(m.load_event, 2218);
    }

    #[test]
    fn test_missing_navigation_defaults_to_zero() {
        let raw = RawPerformance::default();
        let m = PageMetrics::derive(&raw);
        assert_eq!(m.ttfb, 0);
        assert_eq!(m.fcp, None);
        assert_eq!(m.dom_content_loaded, 0);
    }

    #[test]
    fn test_js_resources_and_cache_accounting() {
        let mut raw = base_raw();
        raw.resources = vec![
            RawResource {
                name: "https://cdn/app.js?v=3".into(),
                transfer_size: 10_240,
                encoded_body_size: 30_000,
            },
            RawResource {
                name: "https://cdn/styles.css".into(),
                transfer_size: 2_048,
                encoded_body_size: 8_000,
            },
            RawResource {
                name: "https://cdn/vendor.js".into(),
                transfer_size: 0,
                encoded_body_size: 50_000,
            },
        ];
        let m = PageMetrics::derive(&raw);
        assert_eq!(m.total_resources, 3);
        assert_eq!(m.js_files, 2);
        assert_eq!(m.transferred_kb, 12);
        assert_eq!(m.js_transferred_kb, 10);
        assert_eq!(m.cached_resources, 1);
    }

    #[test]
    fn test_serde_camel_case_shape() {
        let m = PageMetrics::derive(&base_raw());
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("domContentLoaded").is_some());
        assert!(json.get("transferredKB").is_some());
        assert!(json.get("jsTransferredKB").is_some());
        assert!(json.get("cachedResources").is_some());
        // coverage is optional and absent by default
        assert!(json.get("jsCoverage").is_none());
    }
}
