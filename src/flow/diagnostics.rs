//! DOM diagnostics captured when a flow step times out.

use anyhow::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::driver::WebDriver;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputInfo {
    pub tag: String,
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub input_type: String,
    pub placeholder: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDiagnostics {
    pub url: String,
    pub title: String,
    pub body_text_length: usize,
    pub input_count: usize,
    pub inputs: Vec<InputInfo>,
    pub has_main: bool,
    pub has_next: bool,
}

const DIAGNOSTICS_JS: &str = r#"() => {
    const inputs = Array.from(document.querySelectorAll('input')).map((el) => ({
        tag: el.tagName,
        id: el.id || null,
        name: el.name || null,
        type: el.type || 'text',
        placeholder: (el.getAttribute('placeholder') || '').slice(0, 50),
        visible: el.offsetParent !== null && el.offsetWidth > 0,
    }));
    return {
        url: window.location.href,
        title: document.title,
        bodyTextLength: document.body?.innerText?.length ?? 0,
        inputCount: inputs.length,
        inputs,
        hasMain: !!document.querySelector('main'),
        hasNext: !!document.querySelector('#__next'),
    };
}"#;

pub async fn collect(driver: &WebDriver) -> Result<PageDiagnostics> {
    driver.eval::<PageDiagnostics>(DIAGNOSTICS_JS).await
}

pub fn print(diag: &PageDiagnostics) {
    println!("  {} Diagnóstico da página:", "🔍".cyan());
    println!("    URL    : {}", diag.url);
    println!("    Título : {}", diag.title);
    println!("    Texto  : {} caracteres no body", diag.body_text_length);
    println!(
        "    main={} #__next={} inputs={}",
        diag.has_main, diag.has_next, diag.input_count
    );
    for input in &diag.inputs {
        println!(
            "    <input id={:?} name={:?} type={} placeholder=\"{}\" visível={}>",
            input.id, input.name, input.input_type, input.placeholder, input.visible
        );
    }
    if diag.inputs.is_empty() {
        println!("    Nenhum input encontrado no DOM.");
    }
}

/// Screenshot helper: waits for the body to have visible content first so the
/// capture is not a blank frame mid-navigation. Failures are tolerated.
pub async fn snap(driver: &WebDriver, path: &str) {
    for _ in 0..20 {
        let ready = driver
            .eval::<bool>("() => (document.body?.innerText?.length ?? 0) > 0")
            .await
            .unwrap_or(false);
        if ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    if let Err(e) = driver.screenshot(path).await {
        log::warn!("screenshot falhou ({}): {}", path, e);
    } else {
        println!("  {} Screenshot salvo: {}", "📷".blue(), path);
    }
}
