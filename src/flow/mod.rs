//! Interactive complaint-publishing flow.
//!
//! One browser, one page, strictly sequential:
//!
//! SEARCH → COMPANY_SELECTED → (RETENTION | DIRECT) → (RAVALIDA | RA_FORMS |
//! TEXTAREA | UNKNOWN) → TEXT_FILLED → (PUBLISH | BLOCKED) → (SUCCESS |
//! BLOCKED | TIMEOUT)
//!
//! Each wait succeeds once or the run fails; there are no retries. Branches
//! where the site can render more than one screen are resolved by racing
//! probes (see `driver::probe`). Being blocked by the 3-day duplicate rule is
//! an expected business outcome, not an error.

pub mod diagnostics;
pub mod selectors;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use colored::Colorize;
use regex::Regex;
use std::time::Duration;

use crate::bench::{Benchmark, RunMeta};
use crate::config::{search_url, RunSettings, SiteVersion, Timeouts};
use crate::driver::{first_of, selector_probe, url_probe, LaunchOptions, WebDriver};

/// Terminal state of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Published { url: String },
    Blocked,
}

/// Which form variant minha-historia rendered for this company.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    RaValida,
    RaForms,
    Textarea,
    Unknown,
}

impl FormKind {
    fn label(&self) -> &'static str {
        match self {
            FormKind::RaValida => "ravalida",
            FormKind::RaForms => "ra-forms",
            FormKind::Textarea => "textarea",
            FormKind::Unknown => "ausente",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfirmState {
    Publish,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostPublish {
    Success,
    Blocked,
}

pub struct ComplaintFlow {
    driver: WebDriver,
    settings: RunSettings,
    timeouts: Timeouts,
    bench: Benchmark,
    timestamp: String,
}

pub async fn run(settings: RunSettings) -> Result<FlowOutcome> {
    let timeouts = Timeouts::from_env();
    let timestamp = Local::now().format("%Y-%m-%dT%H-%M-%S").to_string();

    println!("\n  Abrindo navegador...");
    let driver = WebDriver::launch(LaunchOptions {
        headless: settings.headless,
        ..LaunchOptions::default()
    })
    .await?;

    let mut flow = ComplaintFlow {
        driver,
        settings,
        timeouts,
        bench: Benchmark::start(),
        timestamp,
    };

    let result = flow.execute().await;
    let outcome = match result {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            flow.report_fatal(&err).await;
            Err(err)
        }
    };
    flow.driver.close().await.ok();
    outcome
}

impl ComplaintFlow {
    async fn execute(&mut self) -> Result<FlowOutcome> {
        self.step_navigate().await.context("Etapa 1: navegação")?;
        self.step_search().await.context("Etapa 2: busca de empresa")?;
        self.step_select_company()
            .await
            .context("Etapa 3: seleção de empresa")?;
        self.step_retention().await.context("Etapa 4: página de retenção")?;
        let form = self.step_forms().await.context("Etapa 5: ra-forms")?;
        self.bench
            .mark(format!("5. ra-forms ({}) → textarea visível", form.label()));
        self.step_fill_text().await.context("Etapa 6: texto da reclamação")?;

        match self.step_confirm().await.context("Etapa 7: confirmação")? {
            ConfirmState::Blocked => {
                self.finish_blocked(false).await;
                return Ok(FlowOutcome::Blocked);
            }
            ConfirmState::Publish => {}
        }

        match self.step_publish().await.context("Etapa 7: publicação")? {
            PostPublish::Blocked => {
                self.finish_blocked(true).await;
                Ok(FlowOutcome::Blocked)
            }
            PostPublish::Success => {
                let url = self.driver.current_url().await.unwrap_or_default();
                self.finish_published(&url).await;
                Ok(FlowOutcome::Published { url })
            }
        }
    }

    /// Etapa 1: navigate to the search page, injecting session tokens on the
    /// way. localStorage is origin-scoped, so the tokens are written after a
    /// first navigation and the page reloaded to pick them up.
    async fn step_navigate(&mut self) -> Result<()> {
        let url = search_url(self.settings.env, self.settings.version);
        println!("\n  [1/7] Navegando para: {}", url);
        self.driver.goto(&url).await?;

        if self.settings.tokens.has_any() {
            self.driver.inject_tokens(&self.settings.tokens).await?;
            println!("  Tokens injetados no localStorage.");
            self.driver.goto(&url).await?;
        }
        self.bench.mark("1. Página inicial carregada");
        Ok(())
    }

    /// Etapa 2: fill the company into the search box and wait out the
    /// search debounce.
    async fn step_search(&mut self) -> Result<()> {
        println!("  [2/7] Buscando empresa: \"{}\"", self.settings.company);
        let visible = self
            .driver
            .wait_for_selector(selectors::SEARCH_INPUT, self.timeouts.element)
            .await?;
        if !visible {
            return Err(anyhow!(
                "campo de busca não ficou visível em {}ms",
                self.timeouts.element.as_millis()
            ));
        }
        self.driver
            .fill(selectors::SEARCH_INPUT, &self.settings.company)
            .await?;
        tokio::time::sleep(self.timeouts.debounce).await;
        self.bench.mark("2. Busca de empresa enviada");
        Ok(())
    }

    /// Etapa 3: pick the company in the autocomplete list. Exact first-word
    /// match preferred, first real result as fallback.
    async fn step_select_company(&mut self) -> Result<()> {
        println!("  [3/7] Selecionando empresa nos resultados...");
        let first_word = self
            .settings
            .company
            .split_whitespace()
            .next()
            .unwrap_or(&self.settings.company)
            .to_string();

        let any = selectors::autocomplete_any(&first_word);
        let appeared = self
            .driver
            .wait_for_selector(&any, self.timeouts.form_detect)
            .await?;
        if !appeared {
            return Err(anyhow!("nenhum resultado de busca apareceu"));
        }

        let exact = selectors::autocomplete_exact(&first_word);
        if self.driver.is_visible(&exact).await? {
            self.driver.click(&exact).await?;
        } else {
            println!("  Clicando no primeiro resultado disponível...");
            self.driver
                .click(&selectors::autocomplete_first_result())
                .await?;
        }
        self.bench.mark("3. Empresa selecionada");
        Ok(())
    }

    /// Etapa 4: companies with products get a retention page with a Reclamar
    /// call-to-action; companies without redirect straight to minha-historia.
    async fn step_retention(&mut self) -> Result<()> {
        println!("  [4/7] Aguardando página de retenção ou redirect direto...");

        #[derive(Clone, Copy, PartialEq)]
        enum Step4 {
            Retention,
            Direct,
        }

        let minha_historia = Regex::new(selectors::MINHA_HISTORIA_RE)?;
        let probes = vec![
            selector_probe(
                &self.driver,
                selectors::RECLAMAR_LINK,
                self.timeouts.navigation,
                "retention",
                Step4::Retention,
            ),
            url_probe(
                &self.driver,
                minha_historia,
                self.timeouts.navigation,
                "direct",
                Step4::Direct,
            ),
        ];

        let detected = first_of(probes, self.timeouts.navigation)
            .await
            .context("nem página de retenção nem minha-historia foram detectados")?;

        let url = self.driver.current_url().await.unwrap_or_default();
        println!("  URL: {} | Cenário: {}", url, detected.label);

        match detected.outcome {
            Step4::Retention => {
                self.driver.click(selectors::RECLAMAR_LINK).await?;
                println!("  Página de retenção detectada → clicou em Reclamar");
            }
            Step4::Direct => {
                println!("  Empresa sem produtos → já está em minha-historia");
            }
        }
        self.bench.mark("4. Página de retenção → Reclamar clicado");
        Ok(())
    }

    /// Etapa 5: minha-historia renders one of three form variants depending
    /// on the company's configuration. Unknown is tolerated.
    async fn step_forms(&mut self) -> Result<FormKind> {
        println!("  [5/7] Aguardando formulário...");

        let url = self.driver.current_url().await.unwrap_or_default();
        if !url.contains("minha-historia") {
            let re = Regex::new(selectors::MINHA_HISTORIA_RE)?;
            let probes = vec![url_probe(
                &self.driver,
                re,
                self.timeouts.navigation,
                "minha-historia",
                (),
            )];
            first_of(probes, self.timeouts.navigation)
                .await
                .context("não chegou em minha-historia")?;
        }

        let probes = vec![
            selector_probe(
                &self.driver,
                selectors::RAVALIDA,
                self.timeouts.form_detect,
                "ravalida",
                FormKind::RaValida,
            ),
            selector_probe(
                &self.driver,
                selectors::RADIO,
                self.timeouts.form_detect,
                "ra-forms",
                FormKind::RaForms,
            ),
            selector_probe(
                &self.driver,
                selectors::TEXTAREA,
                self.timeouts.form_detect,
                "textarea",
                FormKind::Textarea,
            ),
        ];

        let form = match first_of(probes, self.timeouts.form_detect * 2).await {
            Ok(detected) => detected.outcome,
            Err(_) => FormKind::Unknown,
        };

        match form {
            FormKind::RaValida => {
                println!("  [5/7] ra-forms raValida detectado — preenchendo campos privados...");
                self.fill_ravalida_fields().await?;

                let visible = self
                    .driver
                    .wait_for_selector(selectors::RAVALIDA_NEXT, self.timeouts.form_detect)
                    .await?;
                if !visible {
                    return Err(anyhow!("botão de avançar do raValida não apareceu"));
                }
                self.driver.click(selectors::RAVALIDA_NEXT).await?;
                println!("  [5/7] Campos raValida preenchidos → avançando...");

                self.wait_textarea().await?;
            }
            FormKind::RaForms => {
                println!("  [5/7] ra-forms Passo 1 detectado — preenchendo...");

                let sim_visible = self
                    .driver
                    .wait_for_selector(selectors::SIM_RADIO, self.timeouts.sim_check)
                    .await?;
                if sim_visible {
                    self.driver.click(selectors::SIM_RADIO).await?;
                } else {
                    self.driver.click(selectors::SIM_LABEL).await?;
                }
                tokio::time::sleep(Duration::from_millis(600)).await;

                self.fill_ra_forms_extras().await;

                let visible = self
                    .driver
                    .wait_for_selector(selectors::CONTINUAR, self.timeouts.form_detect)
                    .await?;
                if !visible {
                    return Err(anyhow!("botão Continuar do ra-forms não apareceu"));
                }
                self.driver.click(selectors::CONTINUAR).await?;

                self.wait_textarea().await?;
                println!("  [5/7] Avançou para Passo 2 (textarea).");
            }
            FormKind::Textarea => {
                println!("  [5/7] ra-forms não presente — textarea já visível.");
            }
            FormKind::Unknown => {
                println!("  [5/7] Tela desconhecida — tentando continuar mesmo assim...");
            }
        }

        Ok(form)
    }

    async fn wait_textarea(&self) -> Result<()> {
        let visible = self
            .driver
            .wait_for_selector(selectors::TEXTAREA, self.timeouts.textarea)
            .await?;
        if visible {
            Ok(())
        } else {
            Err(anyhow!(
                "textarea não ficou visível em {}ms",
                self.timeouts.textarea.as_millis()
            ))
        }
    }

    /// Fills the raValida private fields positionally from the configured
    /// values. Masked fields (placeholder with "__") are typed digit by digit
    /// through the keyboard; masks reformat on each keystroke.
    async fn fill_ravalida_fields(&self) -> Result<()> {
        let count = self.driver.count(selectors::RAVALIDA_INPUTS).await?;
        println!("  ra-forms raValida: {} campo(s) encontrado(s)", count);

        for i in 0..count {
            let value = self
                .settings
                .ra_forms_fields
                .get(i)
                .cloned()
                .unwrap_or_default();
            if value.is_empty() {
                println!("  raValida[{}] sem valor configurado — ignorando", i);
                continue;
            }

            let sel = format!("{} >> nth={}", selectors::RAVALIDA_INPUTS, i);
            if !self.driver.is_visible(&sel).await.unwrap_or(false) {
                continue;
            }

            let placeholder = self
                .driver
                .attribute(&sel, "placeholder")
                .await?
                .unwrap_or_default();
            let masked = placeholder.contains("__");

            if masked {
                let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
                self.driver
                    .type_masked(&sel, &digits, Duration::from_millis(60))
                    .await?;
            } else {
                self.driver.fill(&sel, &value).await?;
            }

            println!(
                "  raValida[{}] preenchido{}",
                i,
                if masked { " (mascarado)" } else { "" }
            );
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(())
    }

    /// Best-effort fill of step-1 extras after selecting "Sim": pick the
    /// first option of any visible dropdown and put a placeholder value in
    /// any empty text input. Every failure here is swallowed.
    async fn fill_ra_forms_extras(&self) {
        self.driver
            .eval::<serde_json::Value>(
                "() => { document.querySelectorAll('select').forEach(s => { \
                 if (s.options.length > 1) { s.selectedIndex = 1; \
                 s.dispatchEvent(new Event('change', { bubbles: true })); } }); }",
            )
            .await
            .ok();

        let comboboxes = self
            .driver
            .count("[role=\"combobox\"]")
            .await
            .unwrap_or(0);
        for i in 0..comboboxes {
            let sel = format!("[role=\"combobox\"] >> nth={}", i);
            if !self.driver.is_visible(&sel).await.unwrap_or(false) {
                continue;
            }
            if self.driver.click(&sel).await.is_err() {
                continue;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
            if self
                .driver
                .is_visible("[role=\"option\"]")
                .await
                .unwrap_or(false)
            {
                self.driver.click("[role=\"option\"]").await.ok();
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        let input_sel = "input:not([type=\"hidden\"]):not([type=\"radio\"])\
            :not([type=\"checkbox\"]):not([type=\"submit\"])";
        let inputs = self.driver.count(input_sel).await.unwrap_or(0);
        for i in 0..inputs {
            let sel = format!("{} >> nth={}", input_sel, i);
            if !self.driver.is_visible(&sel).await.unwrap_or(false) {
                continue;
            }
            let current = self.driver.input_value(&sel).await.unwrap_or_default();
            if !current.is_empty() {
                continue;
            }
            self.driver.fill(&sel, "12345678").await.ok();
        }
    }

    /// Etapa 6: fill the complaint text, handle the phone field (V1 shares
    /// the screen, V2 defers it to step 3) and advance.
    async fn step_fill_text(&mut self) -> Result<()> {
        println!("  [6/7] Preenchendo texto da reclamação...");

        self.close_voice_modal().await;
        self.wait_textarea().await?;

        let filled = self
            .driver
            .fill_framework_input(selectors::TEXTAREA_MAIN, &self.settings.complaint_text)
            .await
            .unwrap_or(false);
        if !filled {
            self.driver
                .fill("textarea", &self.settings.complaint_text)
                .await?;
        }

        // Verifies the framework accepted the text; falls back to plain fill.
        let len = self
            .driver
            .inner_value_len("textarea")
            .await
            .unwrap_or(0);
        if len == 0 {
            self.driver
                .fill("textarea", &self.settings.complaint_text)
                .await?;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        match self.settings.version {
            SiteVersion::V1 => {
                println!("  Aguardando campo de telefone...");
                let visible = self
                    .driver
                    .wait_for_selector(selectors::PHONE_V1, self.timeouts.phone)
                    .await?;
                if visible {
                    self.fill_phone_if_empty(selectors::PHONE_V1, true).await?;
                } else {
                    println!("  Campo de telefone não encontrado — prosseguindo...");
                }

                let next = self
                    .driver
                    .wait_for_selector(selectors::NEXT_STEP, self.timeouts.form_detect)
                    .await?;
                if !next {
                    return Err(anyhow!("botão 'Próximo passo' não apareceu"));
                }
                println!("  Avançando para tela de publicação (V1)...");
                self.driver.click(selectors::NEXT_STEP).await?;
            }
            SiteVersion::V2 => {
                let visible = self
                    .driver
                    .wait_for_selector(selectors::CONTINUAR, self.timeouts.form_detect)
                    .await?;
                if !visible {
                    return Err(anyhow!("botão 'Continuar' não apareceu"));
                }
                self.driver.click(selectors::CONTINUAR).await?;
            }
        }
        self.bench.mark("6. Reclamação preenchida → avançado");
        Ok(())
    }

    async fn fill_phone_if_empty(&self, selector: &str, typed: bool) -> Result<()> {
        let current = self.driver.input_value(selector).await?;
        let digits = current.chars().filter(|c| c.is_ascii_digit()).count();
        if digits >= 8 {
            println!("  Telefone já preenchido: {}", current);
            return Ok(());
        }
        println!("  Preenchendo telefone...");
        if typed {
            self.driver
                .type_masked(selector, &self.settings.phone, Duration::from_millis(50))
                .await?;
        } else {
            self.driver.fill(selector, &self.settings.phone).await?;
        }
        Ok(())
    }

    async fn close_voice_modal(&self) {
        let visible = self
            .driver
            .wait_for_selector(selectors::VOICE_MODAL_CLOSE, Duration::from_secs(4))
            .await
            .unwrap_or(false);
        if visible {
            println!("  Modal de voz detectado — fechando...");
            self.driver.click(selectors::VOICE_MODAL_CLOSE).await.ok();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Etapa 7a: confirmation screen shows either the publish button or the
    /// 3-day duplicate blocker before any click.
    async fn step_confirm(&mut self) -> Result<ConfirmState> {
        println!("  [7/7] Confirmando e publicando reclamação...");
        tokio::time::sleep(Duration::from_millis(1000)).await;

        if self.settings.version == SiteVersion::V2 {
            let visible = self
                .driver
                .wait_for_selector(selectors::PHONE_V2, Duration::from_secs(8))
                .await?;
            if visible {
                self.fill_phone_if_empty(selectors::PHONE_V2, false).await?;
            }
        }

        let probes = vec![
            selector_probe(
                &self.driver,
                selectors::PUBLISH,
                self.timeouts.element,
                "publish",
                ConfirmState::Publish,
            ),
            selector_probe(
                &self.driver,
                selectors::BLOCKER,
                self.timeouts.element,
                "blocked",
                ConfirmState::Blocked,
            ),
        ];
        let detected = first_of(probes, self.timeouts.element)
            .await
            .context("tela de confirmação não carregou")?;

        self.bench.mark("7. Tela de confirmação carregada");
        Ok(detected.outcome)
    }

    /// Etapa 7b: click publish and race success against the post-click
    /// blocker.
    async fn step_publish(&mut self) -> Result<PostPublish> {
        self.driver.click(selectors::PUBLISH).await?;
        println!("\n  Aguardando tela de sucesso...");

        let sucesso = Regex::new(selectors::SUCESSO_RE)?;
        let probes = vec![
            url_probe(
                &self.driver,
                sucesso,
                self.timeouts.publish,
                "success-url",
                PostPublish::Success,
            ),
            selector_probe(
                &self.driver,
                selectors::SUCCESS_TEXT,
                self.timeouts.publish,
                "success-text",
                PostPublish::Success,
            ),
            selector_probe(
                &self.driver,
                selectors::BLOCKER,
                self.timeouts.publish,
                "blocked",
                PostPublish::Blocked,
            ),
        ];

        let detected = first_of(probes, self.timeouts.publish)
            .await
            .context("nem sucesso nem bloqueio após publicar")?;
        Ok(detected.outcome)
    }

    async fn finish_blocked(&mut self, post_click: bool) {
        if post_click {
            println!(
                "\n  {} Reclamação bloqueada após publicar: já existe uma reclamação \
                 para esta empresa nos últimos 3 dias.",
                "⚠".yellow()
            );
        } else {
            println!(
                "\n  {} Reclamação bloqueada: já existe uma reclamação para esta \
                 empresa nos últimos 3 dias.",
                "⚠".yellow()
            );
        }

        self.bench.mark("8. Bloqueado — reclamação duplicada (3 dias)");
        let file = format!("complaint-bloqueado-{}.png", self.timestamp);
        diagnostics::snap(&self.driver, &file).await;

        self.bench.report(&RunMeta {
            env: self.settings.env,
            version: self.settings.version,
            company: &self.settings.company,
            status: "blocked_3_days",
        });
    }

    async fn finish_published(&mut self, url: &str) {
        self.bench.mark("8. Tela de sucesso atingida");
        println!("\n  URL final: {}", url);

        let file = format!("complaint-success-{}.png", self.timestamp);
        diagnostics::snap(&self.driver, &file).await;

        self.bench.report(&RunMeta {
            env: self.settings.env,
            version: self.settings.version,
            company: &self.settings.company,
            status: "published",
        });

        let sep = "═".repeat(60);
        println!("{}", sep.green());
        println!("  {}", "RECLAMAÇÃO PUBLICADA COM SUCESSO!".green().bold());
        println!("{}", sep.green());
        println!("  URL     : {}", url);
        println!("  Ambiente: {}", self.settings.env.label());
        println!("  Versão  : {}", self.settings.version.label());
        println!("  Empresa : {}", self.settings.company);
        println!("  Print   : {}", file);
        println!("{}\n", sep.green());
    }

    /// Fatal path: dump diagnostics and a screenshot before the caller sees
    /// the error. The browser is closed by `run`.
    async fn report_fatal(&self, err: &anyhow::Error) {
        let url = self.driver.current_url().await.unwrap_or_default();
        eprintln!("\n  {} ERRO: {:#}", "❌".red(), err);
        eprintln!("  URL atual: {}", url);

        match diagnostics::collect(&self.driver).await {
            Ok(diag) => diagnostics::print(&diag),
            Err(e) => log::warn!("diagnóstico indisponível: {}", e),
        }

        let file = format!("complaint-error-{}.png", self.timestamp);
        diagnostics::snap(&self.driver, &file).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_kind_labels() {
        assert_eq!(FormKind::RaValida.label(), "ravalida");
        assert_eq!(FormKind::RaForms.label(), "ra-forms");
        assert_eq!(FormKind::Textarea.label(), "textarea");
        assert_eq!(FormKind::Unknown.label(), "ausente");
    }
}
