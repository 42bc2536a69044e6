//! Interactive input collection for the publish flow.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use std::io::{self, BufRead, Write};

use crate::config::{
    default_complaint_text, headless_from_env, ra_forms_fields_from_env, Environment, RunSettings,
    SiteVersion, DEFAULT_PHONE, TEST_COMPANIES, TOKENS_FILE,
};
use crate::tokens::{mask, TokenStore, Tokens};

fn separator(ch: char) -> String {
    ch.to_string().repeat(60)
}

fn ask(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Five-step interactive session: environment, version, company, tokens,
/// complaint text. Ends with a summary block.
pub fn collect() -> Result<RunSettings> {
    println!("\n{}", separator('═'));
    println!("  Reclame AQUI — Publicação de Reclamação");
    println!("{}", separator('═'));

    let env = ask_environment()?;
    let version = ask_version()?;
    let company = ask_company()?;
    let tokens = ask_tokens()?;
    let complaint_text = ask_text()?;

    let settings = RunSettings {
        env,
        version,
        company,
        phone: DEFAULT_PHONE.to_string(),
        complaint_text,
        tokens,
        ra_forms_fields: ra_forms_fields_from_env(),
        headless: headless_from_env(),
    };
    print_summary(&settings);
    Ok(settings)
}

fn ask_environment() -> Result<Environment> {
    println!("\n[1/5] Ambiente\n");
    println!("  1  TST   — reclameaqui-tst.obviostaging.com.br");
    println!("  2  EVO   — reclameaqui-evolucao.obviostaging.com.br");
    println!("  3  PROD  — www.reclameaqui.com.br");

    loop {
        match ask("\n  Escolha [1/2/3]: ")?.as_str() {
            "1" => return Ok(Environment::Tst),
            "2" => return Ok(Environment::Evo),
            "3" => return Ok(Environment::Prod),
            _ => println!("  Opção inválida. Digite 1, 2 ou 3."),
        }
    }
}

fn ask_version() -> Result<SiteVersion> {
    println!("\n{}", separator('─'));
    println!("\n[2/5] Versão do fluxo\n");
    println!("  1  V1  — Next.js (fluxo padrão)");
    println!("  2  V2  — Astro + Trust-DS  (?ab-force=B)");

    loop {
        match ask("\n  Escolha [1/2]: ")?.as_str() {
            "1" => return Ok(SiteVersion::V1),
            "2" => return Ok(SiteVersion::V2),
            _ => println!("  Opção inválida. Digite 1 ou 2."),
        }
    }
}

fn ask_company() -> Result<String> {
    println!("\n{}", separator('─'));
    println!("\n[3/5] Empresa\n");
    for (i, company) in TEST_COMPANIES.iter().enumerate() {
        println!("  {}  {}", i + 1, company);
    }
    println!("  0  Outra (digitar o nome)");

    let choice = ask("\n  Escolha [0/1/2/3]: ")?;
    let company = match choice.parse::<usize>() {
        Ok(idx) if (1..=TEST_COMPANIES.len()).contains(&idx) => {
            TEST_COMPANIES[idx - 1].to_string()
        }
        Ok(0) => {
            let name = ask("  Nome da empresa: ")?;
            if name.is_empty() {
                println!("  Nome vazio — usando \"{}\"", TEST_COMPANIES[0]);
                TEST_COMPANIES[0].to_string()
            } else {
                name
            }
        }
        // Typed a company name directly instead of a menu index.
        _ if !choice.is_empty() => choice,
        _ => TEST_COMPANIES[0].to_string(),
    };
    Ok(company)
}

fn ask_tokens() -> Result<Tokens> {
    println!("\n{}", separator('─'));
    println!("\n[4/5] Tokens de autenticação");

    let store = TokenStore::new(TOKENS_FILE);
    let saved = store.load().filter(|t| t.has_any());

    let tokens = if let Some(saved) = saved {
        let when = saved
            .saved_at
            .as_deref()
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .map(|dt| dt.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "data desconhecida".to_string());
        println!("\n  Tokens salvos encontrados (de {}):", when);
        println!("    tk  → {}", mask(saved.tk.as_deref()));
        println!("    rtk → {}", mask(saved.rtk.as_deref()));
        println!("    itk → {}", mask(saved.itk.as_deref()));

        let reuse = !ask("\n  Reutilizar tokens salvos? [S/n]: ")?
            .eq_ignore_ascii_case("n");
        if reuse {
            println!("  Tokens reutilizados.");
            saved
        } else {
            println!("\n  Digite os novos tokens (Enter para deixar em branco):\n");
            let fresh = read_tokens()?;
            if fresh.has_any() {
                store.save(&fresh);
            }
            fresh
        }
    } else {
        println!("  (pressione Enter para pular — fluxo sem autenticação)\n");
        let fresh = read_tokens()?;
        if fresh.has_any() {
            store.save(&fresh);
            println!("  Tokens salvos para próximas execuções.");
        }
        fresh
    };

    if !tokens.has_any() {
        println!("\n  Tokens não informados — fluxo prosseguirá sem autenticação.");
    }
    Ok(tokens)
}

fn read_tokens() -> Result<Tokens> {
    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
    Ok(Tokens {
        tk: non_empty(ask("  tk  → ")?),
        rtk: non_empty(ask("  rtk → ")?),
        itk: non_empty(ask("  itk → ")?),
        saved_at: None,
    })
}

fn ask_text() -> Result<String> {
    println!("\n{}", separator('─'));
    println!("\n[5/5] Texto da reclamação");
    println!("  (pressione Enter para usar o texto padrão)\n");
    let default = default_complaint_text();
    println!("  Padrão: \"{}...\"", truncate(&default, 80));

    let custom = ask("\n  Texto → ")?;
    Ok(if custom.is_empty() { default } else { custom })
}

fn print_summary(settings: &RunSettings) {
    println!("\n{}", separator('═').cyan());
    println!("  {}", "RESUMO DA EXECUÇÃO".cyan().bold());
    println!("{}", separator('═').cyan());
    println!(
        "  Ambiente  : {} — {}",
        settings.env.label(),
        settings.env.base_url()
    );
    println!("  Versão    : {}", settings.version.label());
    println!("  Empresa   : {}", settings.company);
    println!(
        "  Tokens    : {}",
        if settings.tokens.has_any() {
            "Sim (injetados)"
        } else {
            "Não"
        }
    );
    println!("  Texto     : {}...", truncate(&settings.complaint_text, 60));
    println!("{}", separator('─'));
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("reclamação", 6), "reclam");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
