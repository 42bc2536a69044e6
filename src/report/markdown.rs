//! Markdown rendering of the benchmark comparison report.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;

use crate::harness::{BenchmarkRun, CacheMode, StepRecord};
use crate::report::{avg, fmt_delta, fmt_gain, fmt_opt, COMPARISON_METRICS};

pub fn write(run: &BenchmarkRun, path: &Path) -> Result<()> {
    let content = render(run);
    std::fs::write(path, content)
        .with_context(|| format!("falha ao gravar {}", path.display()))?;
    println!("✅ Relatório salvo em: {}", path.display());
    Ok(())
}

pub fn render(run: &BenchmarkRun) -> String {
    let mut out = String::new();

    let scenario = match run.cache_mode {
        CacheMode::FreshContext => "B — Isolado sem Cache (First Load Absoluto)",
        CacheMode::SharedContext => "A — Fluxo Contínuo (cache acumulado)",
    };

    let _ = writeln!(out, "# Relatório de Performance — Fluxo de Reclamação");
    let _ = writeln!(out);
    let _ = writeln!(out, "> Gerado em: {}", run.generated_at);
    let _ = writeln!(out, "> Ferramenta: ra-tester (Playwright + Chrome DevTools Protocol)");
    let _ = writeln!(
        out,
        "> Ambiente: **{}** (ID de sessão: `{}`)",
        run.env, run.session_id
    );
    let _ = writeln!(
        out,
        "> Stack V1: **Next.js** (SSR/SPA) | Stack V2: **Astro + Trust-DS** (MPA + Islands)"
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "---");
    let _ = writeln!(out);
    let _ = writeln!(out, "## 🎯 Resumo Executivo");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Cenário | Descrição |");
    let _ = writeln!(out, "|---------|-----------|");
    let _ = writeln!(
        out,
        "| **A — Fluxo contínuo** | Usuário navega em sequência; cache acumula entre etapas. \
         Simula experiência real. |"
    );
    let _ = writeln!(
        out,
        "| **B — Isolado sem cache** | Cada URL medida independentemente com contexto fresco. \
         Mede first load absoluto. |"
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "---");
    let _ = writeln!(out);
    let _ = writeln!(out, "## 🔬 Cenário {}", scenario);
    let _ = writeln!(out);
    let _ = writeln!(out, "### Comparativo médio V1 vs V2");
    let _ = writeln!(out);
    out.push_str(&comparison_table(&run.v1, &run.v2));
    let _ = writeln!(out);
    let _ = writeln!(out, "### V1 — Next.js (detalhe por etapa)");
    let _ = writeln!(out);
    out.push_str(&step_table(&run.v1));
    let _ = writeln!(out);
    let _ = writeln!(out, "### V2 — Astro + Trust-DS (detalhe por etapa)");
    let _ = writeln!(out);
    out.push_str(&step_table(&run.v2));
    let _ = writeln!(out);
    let _ = writeln!(out, "### Cobertura JavaScript — V1");
    let _ = writeln!(out);
    out.push_str(&coverage_table(&run.v1));
    let _ = writeln!(out);
    let _ = writeln!(out, "### Cobertura JavaScript — V2");
    let _ = writeln!(out);
    out.push_str(&coverage_table(&run.v2));
    let _ = writeln!(out);
    let _ = writeln!(out, "---");
    let _ = writeln!(out);
    let _ = writeln!(out, "## 🧠 Análise: Diferenças entre os Cenários");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Aspecto | Cenário A (Contínuo) | Cenário B (Isolado) |");
    let _ = writeln!(out, "|---------|---------------------|---------------------|");
    let _ = writeln!(
        out,
        "| Cache | Recursos reutilizados entre etapas | Nenhum cache em nenhuma etapa |"
    );
    let _ = writeln!(out, "| Contexto | Mesmo browser/session | Contexto fresco por URL |");
    let _ = writeln!(
        out,
        "| Uso | Experiência real do usuário | Pior caso / comparação técnica |"
    );
    let _ = writeln!(
        out,
        "| JS Coverage | Não disponível | Disponível por etapa |"
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "---");
    let _ = writeln!(out);
    let _ = writeln!(out, "## 📐 Legenda de Métricas");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Sigla | Significado | Bom |");
    let _ = writeln!(out, "|-------|-------------|-----|");
    let _ = writeln!(out, "| TTFB | Time to First Byte | < 200ms |");
    let _ = writeln!(out, "| FCP | First Contentful Paint | < 1.8s |");
    let _ = writeln!(out, "| LCP | Largest Contentful Paint | < 2.5s |");
    let _ = writeln!(out, "| CLS | Cumulative Layout Shift | < 0.1 |");
    let _ = writeln!(out, "| DCL | DOMContentLoaded | < 3s |");
    let _ = writeln!(out, "| TBT | Total Blocking Time | < 200ms |");
    let _ = writeln!(out, "| JS Coverage | % JS executado vs baixado | > 70% |");

    out
}

fn comparison_table(v1: &[StepRecord], v2: &[StepRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "| Métrica | V1 (Next.js) | V2 (Astro) | Delta | Avaliação |");
    let _ = writeln!(out, "|---------|-------------|------------|-------|-----------|");
    for (label, accessor) in COMPARISON_METRICS {
        let a = avg(v1, *accessor);
        let b = avg(v2, *accessor);
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            label,
            fmt_opt(a),
            fmt_opt(b),
            fmt_delta(a, b),
            fmt_gain(a, b)
        );
    }
    out
}

fn step_table(steps: &[StepRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "| Etapa | TTFB | FCP | LCP | CLS | DCL | Load | TBT | DOM Nodes | JS KB | Recursos | Heap (KB) |"
    );
    let _ = writeln!(
        out,
        "|-------|------|-----|-----|-----|-----|------|-----|-----------|-------|----------|-----------|"
    );
    for s in steps {
        match &s.metrics {
            Some(m) => {
                let _ = writeln!(
                    out,
                    "| {} | {}ms | {} | {} | {} | {}ms | {}ms | {}ms | {} | {} | {} | {} |",
                    s.step,
                    m.ttfb,
                    opt_ms(m.fcp),
                    opt_ms(m.lcp),
                    m.cls,
                    m.dom_content_loaded,
                    m.load_event,
                    m.tbt,
                    m.dom_nodes,
                    m.js_transferred_kb,
                    m.total_resources,
                    m.js_heap_used
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "| {} | — | — | — | — | — | — | — | — | — | — | — |",
                    s.step
                );
            }
        }
    }
    out
}

fn coverage_table(steps: &[StepRecord]) -> String {
    let rows: Vec<String> = steps
        .iter()
        .filter_map(|s| {
            let coverage = s.metrics.as_ref()?.js_coverage.as_ref()?;
            Some(format!(
                "| {} | {} | {} | {} | {}% |",
                s.step,
                coverage.total_kb,
                coverage.used_kb,
                coverage.total_kb.saturating_sub(coverage.used_kb),
                coverage.unused_percent
            ))
        })
        .collect();
    if rows.is_empty() {
        return "*Cobertura não disponível*\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "| Etapa | Total JS (KB) | Utilizado (KB) | Não usado (KB) | % Código morto |"
    );
    let _ = writeln!(
        out,
        "|-------|--------------|---------------|----------------|----------------|"
    );
    for row in rows {
        let _ = writeln!(out, "{}", row);
    }
    out
}

fn opt_ms(v: Option<i64>) -> String {
    v.map(|v| format!("{}ms", v)).unwrap_or_else(|| "—".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{JsCoverage, PageMetrics};

    fn sample_record(step: &str, ttfb: i64, coverage: bool) -> StepRecord {
        StepRecord {
            step: step.to_string(),
            url: "https://x/".to_string(),
            actual_url: "https://x/".to_string(),
            redirected: false,
            metrics: Some(PageMetrics {
                url: "https://x/".to_string(),
                ttfb,
                fcp: Some(400),
                lcp: None,
                cls: 0.01,
                dom_content_loaded: 550,
                load_event: 2200,
                dom_nodes: 198,
                js_heap_used: 88182,
                js_heap_total: 160537,
                transferred_kb: 24,
                js_transferred_kb: 8,
                total_resources: 104,
                js_files: 59,
                tbt: 0,
                cached_resources: 0,
                js_coverage: coverage.then(|| JsCoverage {
                    total_kb: 300,
                    used_kb: 100,
                    unused_percent: 66.7,
                }),
            }),
            error: None,
        }
    }

    fn sample_run() -> BenchmarkRun {
        BenchmarkRun {
            generated_at: "28/08/2026 10:00:00".to_string(),
            env: "PROD".to_string(),
            session_id: "sid".to_string(),
            cache_mode: CacheMode::FreshContext,
            v1: vec![sample_record("Etapa 1 - Busca inicial", 150, true)],
            v2: vec![sample_record("Etapa 1 - Busca inicial", 200, false)],
        }
    }

    #[test]
    fn test_render_contains_comparison_and_delta() {
        let md = render(&sample_run());
        assert!(md.contains("## 🎯 Resumo Executivo"));
        assert!(md.contains("| TTFB | 150 | 200 | +50 (+33.3%) | ❌ 33.3% pior |"));
        assert!(md.contains("Cenário B — Isolado sem Cache"));
    }

    #[test]
    fn test_coverage_table_and_fallback() {
        let run = sample_run();
        let md = render(&run);
        // v1 has coverage rows, v2 falls back to the placeholder
        assert!(md.contains("| Etapa 1 - Busca inicial | 300 | 100 | 200 | 66.7% |"));
        assert!(md.contains("*Cobertura não disponível*"));
    }

    #[test]
    fn test_step_table_null_metrics_row() {
        let mut run = sample_run();
        run.v1.push(StepRecord {
            step: "Etapa 2".to_string(),
            url: "https://x/2".to_string(),
            actual_url: String::new(),
            redirected: true,
            metrics: None,
            error: Some("timeout".to_string()),
        });
        let md = render(&run);
        assert!(md.contains("| Etapa 2 | — | — |"));
    }
}
