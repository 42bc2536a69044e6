//! Selector sets for the complaint flow. V1 (Next.js) and V2 (Astro) render
//! divergent DOM, so most entries are multi-alternative lists that cover both.

/// Search box on /reclamar/. V1 uses id="search", V2 a generic placeholder.
pub const SEARCH_INPUT: &str = "input#search, input[placeholder*=\"mpresa\"], \
    input[placeholder*=\"elecione\"], input[placeholder*=\"eclamar\"], \
    input[type=\"search\"], input[type=\"text\"]";

/// Retention page call-to-action (companies with products get this page).
pub const RECLAMAR_LINK: &str =
    "a:has-text(\"Reclamar\"), button:has-text(\"Reclamar\"), [href*=\"minha-historia\"]";

/// Complaint textarea on minha-historia.
pub const TEXTAREA: &str = "textarea[name=\"myHistory.description\"], \
    textarea[placeholder*=\"reclamação\"], textarea[placeholder*=\"compra\"], textarea";

/// The main textarea, targeted first by the framework-input setter.
pub const TEXTAREA_MAIN: &str = "textarea[name=\"myHistory.description\"]";

/// ra-forms yes/no questionnaire (step 1).
pub const RADIO: &str =
    "input[type=\"radio\"], label:has-text(\"Sim\"), [class*=\"radio\"]:has-text(\"Sim\")";

pub const SIM_RADIO: &str = "input[type=\"radio\"][value=\"true\"], label:has-text(\"Sim\") input";
pub const SIM_LABEL: &str = "label:has-text(\"Sim\"), [class*=\"radio\"]:has-text(\"Sim\")";

/// raValida private validation form (company-configured fields).
pub const RAVALIDA: &str = "input[name^=\"raValida\"], #btn-continue-ravalida";
pub const RAVALIDA_INPUTS: &str = "input[name^=\"raValida\"]";
pub const RAVALIDA_NEXT: &str = "#btn-continue-ravalida, \
    button:has-text(\"Proximo passo\"), button:has-text(\"Próximo passo\")";

pub const CONTINUAR: &str = "button:has-text(\"Continuar\")";

pub const NEXT_STEP: &str = "#complaint-phased-button-next, \
    button:has-text(\"Próximo passo\"), button:has-text(\"Proximo passo\")";

/// Voice-complaint modal dismiss button.
pub const VOICE_MODAL_CLOSE: &str = "#close-modal-voice-complaint, \
    button:has-text(\"Vou seguir com o teclado mesmo\"), button:has-text(\"teclado mesmo\")";

/// Phone input, V1 (same screen as the textarea).
pub const PHONE_V1: &str = "input[type=\"tel\"], input[name*=\"phone\"], \
    input[name*=\"telefone\"], input[name*=\"celular\"], input[placeholder*=\"(00)\"], \
    input[placeholder*=\"celular\"], input[placeholder*=\"telefone\"], \
    input[data-testid*=\"phone\"], input[data-testid*=\"telefone\"]";

/// Phone input, V2 (step 3).
pub const PHONE_V2: &str = "input[type=\"tel\"], input[placeholder*=\"celular\"], \
    input[placeholder*=\"telefone\"], input[placeholder*=\"(00)\"]";

pub const PUBLISH: &str =
    "button:has-text(\"Publicar reclamação\"), button:has-text(\"Publicar Reclamação\")";

/// 3-day duplicate-complaint blocker message.
pub const BLOCKER: &str =
    ":text(\"Você já efetuou uma reclamação para esta empresa nos últimos 3 dias\"), \
    :text(\"você já efetuou uma reclamação\"), :text(\"nos últimos 3 dias\")";

pub const SUCCESS_TEXT: &str =
    ":text(\"Sua reclamação foi publicada\"), :text(\"publicada com sucesso\")";

pub const MINHA_HISTORIA_RE: &str = "minha-historia";
pub const SUCESSO_RE: &str = "sucesso";

/// Autocomplete items: V1 renders <li> under #auto-complete-list-id, V2 uses
/// role=option buttons. The action-button item ("Não encontrou...") is not a
/// real result.
pub fn autocomplete_any(first_word: &str) -> String {
    format!(
        "#auto-complete-list-id li:not([id=\"action-button\"]), [role=\"option\"], \
         button:has-text(\"{}\")",
        first_word
    )
}

pub fn autocomplete_exact(first_word: &str) -> String {
    format!(
        "#auto-complete-list-id li:has-text(\"{w}\"):not([id=\"action-button\"]), \
         [role=\"option\"]:has-text(\"{w}\"), button:has-text(\"{w}\")",
        w = first_word
    )
}

pub fn autocomplete_first_result() -> String {
    "#auto-complete-list-id li:not([id=\"action-button\"]), \
     [role=\"option\"]:not(:has-text(\"Não encontrou\"))"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autocomplete_selectors_interpolate_first_word() {
        let sel = autocomplete_exact("Abdu");
        assert!(sel.contains("li:has-text(\"Abdu\")"));
        assert!(sel.contains("[role=\"option\"]:has-text(\"Abdu\")"));

        let any = autocomplete_any("Abdu");
        assert!(any.contains("button:has-text(\"Abdu\")"));
        assert!(any.contains(":not([id=\"action-button\"])"));
    }
}
