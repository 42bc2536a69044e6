//! Step benchmark for the interactive publish flow.
//!
//! Marks are appended after every flow step; at the end of the run the
//! collected marks are printed as a console table and appended to the
//! `benchmark-results.json` history file in the working directory.

use chrono::Utc;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{Environment, SiteVersion, BENCH_HISTORY_FILE};

/// One recorded step: delta from the previous mark plus the accumulated
/// total since the benchmark started.
#[derive(Debug, Clone)]
pub struct Mark {
    pub label: String,
    pub step_ms: u64,
    pub total_ms: u64,
}

pub struct Benchmark {
    started: Instant,
    last: Instant,
    marks: Vec<Mark>,
    history_path: PathBuf,
}

/// Metadata attached to a persisted benchmark entry.
pub struct RunMeta<'a> {
    pub env: Environment,
    pub version: SiteVersion,
    pub company: &'a str,
    pub status: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchStep {
    pub label: String,
    pub step_ms: u64,
    pub step_formatted: String,
    pub accumulated_ms: u64,
    pub accumulated_formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchEntry {
    pub date: String,
    pub env: String,
    pub version: String,
    pub company: String,
    pub status: String,
    pub total_ms: u64,
    pub total_formatted: String,
    pub steps: Vec<BenchStep>,
}

impl Benchmark {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: now,
            marks: Vec::new(),
            history_path: PathBuf::from(BENCH_HISTORY_FILE),
        }
    }

    #[cfg(test)]
    fn with_history_path(path: PathBuf) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: now,
            marks: Vec::new(),
            history_path: path,
        }
    }

    pub fn mark(&mut self, label: impl Into<String>) {
        let now = Instant::now();
        self.marks.push(Mark {
            label: label.into(),
            step_ms: now.duration_since(self.last).as_millis() as u64,
            total_ms: now.duration_since(self.started).as_millis() as u64,
        });
        self.last = now;
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Prints the step table and appends the run to the benchmark history.
    pub fn report(&self, meta: &RunMeta<'_>) -> BenchEntry {
        let total_ms = self.started.elapsed().as_millis() as u64;
        let sep = "─".repeat(64);
        let sep2 = "═".repeat(64);

        println!("\n{}", sep2);
        println!("  {}", "BENCHMARK — Métricas de Performance".bold());
        println!("{}", sep2);
        println!("  Ambiente : {}", meta.env.label().cyan());
        println!("  Versão   : {}", meta.version.label().cyan());
        println!("  Empresa  : {}", meta.company.cyan());
        println!("  Data     : {}", chrono::Local::now().format("%d/%m/%Y %H:%M:%S"));
        println!("{}", sep);
        println!("  {:<38} {:>8} {:>10}", "Etapa", "Δ Etapa", "Acumulado");
        println!("{}", sep);
        for mark in &self.marks {
            println!(
                "  {:<38} {:>8} {:>10}",
                mark.label,
                fmt_ms(mark.step_ms),
                fmt_ms(mark.total_ms)
            );
        }
        println!("{}", sep);
        println!("  {:<38} {:>8}", "TOTAL".bold(), fmt_ms(total_ms).bold());
        println!("{}\n", sep2);

        let entry = BenchEntry {
            date: Utc::now().to_rfc3339(),
            env: meta.env.label().to_string(),
            version: meta.version.label().to_string(),
            company: meta.company.to_string(),
            status: meta.status.to_string(),
            total_ms,
            total_formatted: fmt_ms(total_ms),
            steps: self
                .marks
                .iter()
                .map(|m| BenchStep {
                    label: m.label.clone(),
                    step_ms: m.step_ms,
                    step_formatted: fmt_ms(m.step_ms),
                    accumulated_ms: m.total_ms,
                    accumulated_formatted: fmt_ms(m.total_ms),
                })
                .collect(),
        };

        if append_history(&self.history_path, &entry).is_ok() {
            println!(
                "  Benchmark salvo em: {}\n",
                self.history_path.display().to_string().cyan()
            );
        }

        entry
    }
}

/// Read-modify-write of the whole history array. The file stays a plain JSON
/// array so it can be consumed directly by the report tooling.
fn append_history(path: &Path, entry: &BenchEntry) -> anyhow::Result<()> {
    let mut all: Vec<BenchEntry> = match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    all.push(entry.clone());
    std::fs::write(path, serde_json::to_string_pretty(&all)?)?;
    Ok(())
}

/// Human duration: `870ms`, `12.3s`, `2m 5s`.
pub fn fmt_ms(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let m = ms / 60_000;
        let s = ((ms % 60_000) as f64 / 1000.0).round() as u64;
        format!("{}m {}s", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_ms() {
        assert_eq!(fmt_ms(0), "0ms");
        assert_eq!(fmt_ms(870), "870ms");
        assert_eq!(fmt_ms(1_000), "1.0s");
        assert_eq!(fmt_ms(12_340), "12.3s");
        assert_eq!(fmt_ms(65_000), "1m 5s");
        assert_eq!(fmt_ms(125_600), "2m 6s");
    }

    #[test]
    fn test_marks_accumulate() {
        let mut bench = Benchmark::start();
        bench.mark("1. Página inicial carregada");
        std::thread::sleep(std::time::Duration::from_millis(15));
        bench.mark("2. Busca de empresa enviada");

        let marks = bench.marks();
        assert_eq!(marks.len(), 2);
        assert!(marks[1].step_ms >= 15);
        assert!(marks[1].total_ms >= marks[0].total_ms + marks[1].step_ms);
        assert_eq!(marks[0].label, "1. Página inicial carregada");
    }

    #[test]
    fn test_history_appends() {
        let path = std::env::temp_dir().join(format!(
            "ra-tester-bench-{}.json",
            uuid::Uuid::new_v4()
        ));

        let mut bench = Benchmark::with_history_path(path.clone());
        bench.mark("1. Página inicial carregada");
        let meta = RunMeta {
            env: Environment::Tst,
            version: SiteVersion::V1,
            company: "Abdu Restaurante",
            status: "published",
        };
        bench.report(&meta);
        bench.report(&meta);

        let raw = std::fs::read_to_string(&path).unwrap();
        let all: Vec<BenchEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].env, "TST");
        assert_eq!(all[0].steps.len(), 1);

        std::fs::remove_file(&path).ok();
    }
}
