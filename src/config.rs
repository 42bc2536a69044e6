//! Run configuration: target environment, site version and step timeouts.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::tokens::Tokens;

pub const TEST_COMPANIES: &[&str] = &["Abdu Restaurante", "Tocati Peças", "Comercial Praia"];
pub const DEFAULT_PHONE: &str = "83988089452";
pub const TOKENS_FILE: &str = ".ra-tokens.json";
pub const BENCH_HISTORY_FILE: &str = "benchmark-results.json";

/// Target environment of the complaint site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Tst,
    Evo,
    Prod,
}

impl Environment {
    pub fn label(&self) -> &'static str {
        match self {
            Environment::Tst => "TST",
            Environment::Evo => "EVO",
            Environment::Prod => "PROD",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Tst => "https://reclameaqui-tst.obviostaging.com.br",
            Environment::Evo => "https://reclameaqui-evolucao.obviostaging.com.br",
            Environment::Prod => "https://www.reclameaqui.com.br",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tst" | "1" => Ok(Environment::Tst),
            "evo" | "2" => Ok(Environment::Evo),
            "prod" | "3" => Ok(Environment::Prod),
            other => bail!("Unknown environment: {} (expected tst, evo or prod)", other),
        }
    }
}

/// Rendering stack of the complaint flow. V2 is selected with `?ab-force=B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteVersion {
    V1,
    V2,
}

impl SiteVersion {
    pub fn label(&self) -> &'static str {
        match self {
            SiteVersion::V1 => "V1",
            SiteVersion::V2 => "V2",
        }
    }

    pub fn stack(&self) -> &'static str {
        match self {
            SiteVersion::V1 => "Next.js",
            SiteVersion::V2 => "Astro + Trust-DS",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "v1" | "1" => Ok(SiteVersion::V1),
            "v2" | "2" => Ok(SiteVersion::V2),
            other => bail!("Unknown site version: {} (expected v1 or v2)", other),
        }
    }
}

/// Entry URL of the complaint flow for a given environment/version.
pub fn search_url(env: Environment, version: SiteVersion) -> String {
    match version {
        SiteVersion::V1 => format!("{}/reclamar/", env.base_url()),
        SiteVersion::V2 => format!("{}/reclamar/?ab-force=B", env.base_url()),
    }
}

/// Per-step wait budgets. CI machines are slower, mainly during SSR
/// hydration, so every budget gets a larger value there.
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub page_load: Duration,
    pub element: Duration,
    pub navigation: Duration,
    pub form_detect: Duration,
    pub form_field: Duration,
    pub textarea: Duration,
    pub phone: Duration,
    pub sim_check: Duration,
    pub publish: Duration,
    pub debounce: Duration,
}

impl Timeouts {
    pub fn local() -> Self {
        Self {
            page_load: Duration::from_millis(60_000),
            element: Duration::from_millis(20_000),
            navigation: Duration::from_millis(30_000),
            form_detect: Duration::from_millis(15_000),
            form_field: Duration::from_millis(15_000),
            textarea: Duration::from_millis(25_000),
            phone: Duration::from_millis(12_000),
            sim_check: Duration::from_millis(5_000),
            publish: Duration::from_millis(60_000),
            debounce: Duration::from_millis(2_500),
        }
    }

    pub fn ci() -> Self {
        Self {
            page_load: Duration::from_millis(120_000),
            element: Duration::from_millis(90_000),
            navigation: Duration::from_millis(60_000),
            form_detect: Duration::from_millis(60_000),
            form_field: Duration::from_millis(45_000),
            textarea: Duration::from_millis(60_000),
            phone: Duration::from_millis(30_000),
            sim_check: Duration::from_millis(15_000),
            publish: Duration::from_millis(90_000),
            debounce: Duration::from_millis(4_000),
        }
    }

    pub fn from_env() -> Self {
        if std::env::var("CI").map(|v| !v.is_empty()).unwrap_or(false) {
            Self::ci()
        } else {
            Self::local()
        }
    }
}

/// Everything a single publish run needs, resolved up front and immutable
/// for the duration of the run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub env: Environment,
    pub version: SiteVersion,
    pub company: String,
    pub phone: String,
    pub complaint_text: String,
    pub tokens: Tokens,
    pub ra_forms_fields: Vec<String>,
    pub headless: bool,
}

impl RunSettings {
    /// Non-interactive resolution from RA_* environment variables.
    pub fn from_env() -> Result<Self> {
        let env = Environment::parse(&std::env::var("RA_ENV").unwrap_or_else(|_| "tst".into()))?;
        let version =
            SiteVersion::parse(&std::env::var("RA_VERSION").unwrap_or_else(|_| "v1".into()))?;
        let company =
            std::env::var("RA_COMPANY").unwrap_or_else(|_| TEST_COMPANIES[0].to_string());
        let phone = std::env::var("RA_PHONE").unwrap_or_else(|_| DEFAULT_PHONE.to_string());
        let complaint_text =
            std::env::var("RA_TEXT").unwrap_or_else(|_| default_complaint_text());

        let tokens = Tokens {
            tk: std::env::var("RA_TK").ok().filter(|v| !v.is_empty()),
            rtk: std::env::var("RA_RTK").ok().filter(|v| !v.is_empty()),
            itk: std::env::var("RA_ITK").ok().filter(|v| !v.is_empty()),
            saved_at: None,
        };

        Ok(Self {
            env,
            version,
            company,
            phone,
            complaint_text,
            tokens,
            ra_forms_fields: ra_forms_fields_from_env(),
            headless: headless_from_env(),
        })
    }
}

/// raValida answers are positional and company-specific; unset positions are
/// skipped when filling.
pub fn ra_forms_fields_from_env() -> Vec<String> {
    (1..=5)
        .map(|i| std::env::var(format!("RA_FORMS_FIELD_{}", i)).unwrap_or_default())
        .collect()
}

pub fn headless_from_env() -> bool {
    std::env::var("RA_HEADLESS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

pub fn default_complaint_text() -> String {
    format!(
        "Esta é uma reclamação de teste publicada via script automatizado. \
         O produto não foi entregue dentro do prazo acordado. \
         Solicito resolução do problema o mais breve possível. \
         Gerado em: {}.",
        chrono::Local::now().format("%d/%m/%Y %H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("tst").unwrap(), Environment::Tst);
        assert_eq!(Environment::parse("PROD").unwrap(), Environment::Prod);
        assert_eq!(Environment::parse("2").unwrap(), Environment::Evo);
        assert!(Environment::parse("staging").is_err());
    }

    #[test]
    fn test_search_url_v2_carries_ab_force() {
        let url = search_url(Environment::Prod, SiteVersion::V2);
        assert_eq!(url, "https://www.reclameaqui.com.br/reclamar/?ab-force=B");

        let url = search_url(Environment::Tst, SiteVersion::V1);
        assert_eq!(
            url,
            "https://reclameaqui-tst.obviostaging.com.br/reclamar/"
        );
    }

    #[test]
    fn test_ci_timeouts_are_larger() {
        let local = Timeouts::local();
        let ci = Timeouts::ci();
        assert!(ci.page_load > local.page_load);
        assert!(ci.element > local.element);
        assert!(ci.form_detect > local.form_detect);
        assert_eq!(ci.element, Duration::from_millis(90_000));
    }
}
