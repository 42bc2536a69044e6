//! Browser driver built on Playwright.
//!
//! Thin wrapper around a chromium page exposing just the operations the
//! complaint flow and the benchmark harness need. Launching prefers a real
//! Google Chrome install over the bundled chromium because the production
//! site fingerprints headless chromium builds.

use anyhow::{Context, Result};
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::tokens::Tokens;

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// When set, chromium is started with `--remote-debugging-port` so the
    /// CDP side channel can attach (cache control, JS coverage).
    pub debug_port: Option<u16>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: crate::config::headless_from_env(),
            debug_port: None,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    opts: LaunchOptions,
}

impl WebDriver {
    pub async fn launch(opts: LaunchOptions) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("falha ao inicializar o Playwright")?;
        playwright.prepare().context("driver do Playwright ausente")?;

        let chromium = playwright.chromium();
        let mut launcher = chromium.launcher().headless(opts.headless);

        let chrome_path = find_chrome();
        if let Some(path) = &chrome_path {
            log::debug!("usando navegador em {}", path.display());
            launcher = launcher.executable(path);
        } else {
            println!(
                "{} Nenhum Chrome encontrado, usando chromium padrão",
                "⚠️".yellow()
            );
        }

        let mut args: Vec<String> = [
            "--no-sandbox",
            "--disable-setuid-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--disable-extensions",
            "--no-first-run",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(port) = opts.debug_port {
            args.push(format!("--remote-debugging-port={}", port));
        }
        if !opts.headless {
            args.push("--start-maximized".to_string());
        }

        launcher = launcher.args(&args);
        let browser = launcher.launch().await.context("falha ao abrir o navegador")?;

        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;
        // headed runs get --start-maximized; forcing a viewport would undo it
        if opts.headless {
            page.set_viewport_size(Viewport {
                width: opts.viewport_width as i32,
                height: opts.viewport_height as i32,
            })
            .await?;
        }

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            opts,
        })
    }

    /// Replaces the current context with a fresh one. Used by the isolated
    /// benchmark so no cookie or cache state leaks between measured URLs.
    pub async fn fresh_page(&mut self) -> Result<()> {
        self.context.close().await.ok();

        let context = self.browser.context_builder().build().await?;
        let page = context.new_page().await?;
        if self.opts.headless {
            page.set_viewport_size(Viewport {
                width: self.opts.viewport_width as i32,
                height: self.opts.viewport_height as i32,
            })
            .await?;
        }

        self.context = Arc::new(context);
        self.page = Arc::new(Mutex::new(page));
        Ok(())
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .with_context(|| format!("falha ao navegar para {}", url))?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        let url: String = page.eval("() => location.href").await?;
        Ok(url)
    }

    /// Waits for a selector within its own timeout. A miss is a normal
    /// outcome, not an error.
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let page = self.page.lock().await;
        let result = page
            .wait_for_selector_builder(selector)
            .timeout(timeout.as_millis() as f64)
            .wait_for_selector()
            .await;
        Ok(result.is_ok())
    }

    pub async fn is_visible(&self, selector: &str) -> Result<bool> {
        let page = self.page.lock().await;
        match page.query_selector(selector).await? {
            Some(el) => Ok(el.is_visible().await?),
            None => Ok(false),
        }
    }

    pub async fn count(&self, selector: &str) -> Result<usize> {
        let page = self.page.lock().await;
        Ok(page.query_selector_all(selector).await?.len())
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.click_builder(selector)
            .click()
            .await
            .with_context(|| format!("falha ao clicar em '{}'", selector))?;
        Ok(())
    }

    pub async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let page = self.page.lock().await;
        if let Some(el) = page.query_selector(selector).await? {
            el.fill_builder(text).fill().await?;
            Ok(())
        } else {
            anyhow::bail!("elemento não encontrado: {}", selector)
        }
    }

    /// Types through the keyboard with a per-character delay. Masked inputs
    /// (phone, CPF) reformat on each keystroke and reject `fill`.
    pub async fn type_masked(&self, selector: &str, text: &str, delay: Duration) -> Result<()> {
        self.click(selector).await?;
        let page = self.page.lock().await;
        for ch in text.chars() {
            page.keyboard.input_text(&ch.to_string()).await?;
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    pub async fn eval<R>(&self, js: &str) -> Result<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let page = self.page.lock().await;
        Ok(page.eval::<R>(js).await?)
    }

    /// Current value length of an input, 0 if the element is missing.
    pub async fn inner_value_len(&self, selector: &str) -> Result<usize> {
        let page = self.page.lock().await;
        let js = "el => (el.value || el.innerText || '').length";
        match page
            .evaluate_on_selector::<String, usize>(selector, js, None::<String>)
            .await
        {
            Ok(len) => Ok(len),
            Err(_) => Ok(0),
        }
    }

    pub async fn input_value(&self, selector: &str) -> Result<String> {
        let page = self.page.lock().await;
        match page
            .evaluate_on_selector::<String, _>(selector, "el => el.value || ''", None::<String>)
            .await
        {
            Ok(v) => Ok(v),
            Err(_) => Ok(String::new()),
        }
    }

    pub async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let js = format!("el => el.getAttribute({})", serde_json::to_string(name)?);
        let page = self.page.lock().await;
        match page
            .evaluate_on_selector::<String, Option<String>>(selector, &js, None::<String>)
            .await
        {
            Ok(v) => Ok(v),
            Err(_) => Ok(None),
        }
    }

    /// Sets an input's value through the framework's own value setter so a
    /// React-controlled field registers the change. Plain `fill` writes the
    /// DOM value but the component state never sees it and validation keeps
    /// the submit button disabled. Returns false when the element is absent.
    pub async fn fill_framework_input(&self, selector: &str, value: &str) -> Result<bool> {
        let sel_json = serde_json::to_string(selector)?;
        let val_json = serde_json::to_string(value)?;
        let js = format!(
            r#"() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const proto = el.tagName === 'TEXTAREA'
                    ? window.HTMLTextAreaElement.prototype
                    : window.HTMLInputElement.prototype;
                const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                setter.call(el, {val});
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }}"#,
            sel = sel_json,
            val = val_json
        );
        self.eval::<bool>(&js).await
    }

    /// Writes session tokens into localStorage. Must run after a navigation
    /// to the site origin, since localStorage is origin-scoped.
    pub async fn inject_tokens(&self, tokens: &Tokens) -> Result<()> {
        let pairs: Vec<(&str, &Option<String>)> = vec![
            ("tk", &tokens.tk),
            ("rtk", &tokens.rtk),
            ("itk", &tokens.itk),
        ];
        let mut stmts = String::new();
        for (key, value) in pairs {
            if let Some(v) = value {
                stmts.push_str(&format!(
                    "localStorage.setItem({}, {});",
                    serde_json::to_string(key)?,
                    serde_json::to_string(v)?
                ));
            }
        }
        if stmts.is_empty() {
            return Ok(());
        }
        let js = format!("() => {{ {} }}", stmts);
        self.eval::<serde_json::Value>(&js).await?;
        Ok(())
    }

    pub async fn screenshot(&self, path: &str) -> Result<()> {
        let page = self.page.lock().await;
        let path_buf = PathBuf::from(path);
        if let Some(parent) = path_buf.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        page.screenshot_builder().path(path_buf).screenshot().await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.context.close().await.ok();
        self.browser.close().await.ok();
        Ok(())
    }
}

fn find_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("RA_CHROME") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Some(p);
        }
    }
    if let Ok(path) = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Some(p);
        }
    }

    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];
    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_launch_options() {
        std::env::remove_var("RA_HEADLESS");
        let opts = LaunchOptions::default();
        assert_eq!(opts.viewport_width, 1280);
        assert_eq!(opts.viewport_height, 720);
        assert!(opts.debug_port.is_none());
    }
}
