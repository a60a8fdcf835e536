// 📄 Page Controllers - one module per entity, plus login
// Controllers are transport-agnostic: they take a connection, the resolved
// identity and the raw route input, and return a typed result the server
// binary maps onto HTTP. Invalid or missing ids always resolve to NotFound,
// never to a panic or a 500.

pub mod agencias;
pub mod clientes;
pub mod contas;
pub mod dependentes;
pub mod funcionarios;
pub mod login;
pub mod transacoes;

use crate::forms::{ArrayField, FieldKind, FieldSpec, FormState};
use crate::schema::FieldError;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// RESULTS
// ============================================================================

/// A rendered page fragment; the binary wraps it in the document shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResult {
    Page(PageView),
    /// Generic not-found page, also the answer to malformed id segments.
    NotFound,
    /// Hard permission gates send the user here instead of rendering.
    Redirect(String),
}

impl PageResult {
    pub fn page(title: impl Into<String>, body: impl Into<String>) -> Self {
        PageResult::Page(PageView {
            title: title.into(),
            body: body.into(),
        })
    }
}

/// JSON outcome of a mutation endpoint. The binary maps the variant onto a
/// status code; the payload shape is stable for form clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationResponse {
    Ok { data: Value },
    Invalid { errors: Vec<FieldError> },
    NotFound,
    Denied { message: String },
    Failed { message: String },
}

// ============================================================================
// RENDER HELPERS
// ============================================================================

pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut html = String::from("<table>\n<tr>");
    for header in headers {
        html.push_str(&format!("<th>{}</th>", html_escape(header)));
    }
    html.push_str("</tr>\n");

    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", cell));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</table>");
    html
}

pub(crate) fn link(href: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", href, html_escape(label))
}

fn input_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Number => "number",
        FieldKind::Date => "date",
        FieldKind::DateTime => "datetime-local",
        FieldKind::Email => "email",
        FieldKind::Tel => "tel",
        FieldKind::Password => "password",
        FieldKind::Select => "text",
    }
}

/// One labeled input or select, current value taken from form state.
pub(crate) fn render_field(spec: &FieldSpec, state: &FormState) -> String {
    let name = spec.path.to_string();
    let value = html_escape(&state.get_str(&spec.path));
    let marker = if spec.required { " *" } else { "" };
    let label = format!(
        "<label for=\"{}\">{}{}</label>\n",
        name,
        html_escape(&spec.label),
        marker
    );

    if spec.kind == FieldKind::Select {
        let mut select = format!("<select id=\"{0}\" name=\"{0}\">\n", name);

        if spec.loading {
            select.push_str("<option value=\"\">carregando...</option>\n");
        } else {
            if spec.allow_clear || value.is_empty() {
                select.push_str("<option value=\"\"></option>\n");
            }
            for option in &spec.options {
                let selected = if option.value == state.get_str(&spec.path) {
                    " selected"
                } else {
                    ""
                };
                select.push_str(&format!(
                    "<option value=\"{}\"{}>{}</option>\n",
                    html_escape(&option.value),
                    selected,
                    html_escape(&option.label)
                ));
            }
        }

        select.push_str("</select>");
        return format!("<p>{}{}</p>", label, select);
    }

    let maxlength = match spec.max_len {
        Some(n) => format!(" maxlength=\"{}\"", n),
        None => String::new(),
    };

    format!(
        "<p>{}<input type=\"{}\" id=\"{}\" name=\"{}\" value=\"{}\"{} /></p>",
        label,
        input_type(spec.kind),
        name,
        name,
        value,
        maxlength
    )
}

/// A repeating group: one block per entry, labels counted from 1, plus the
/// append control.
pub(crate) fn render_array<F>(array: &ArrayField, state: &FormState, specs_for: F) -> String
where
    F: Fn(usize) -> Vec<FieldSpec>,
{
    let count = state.entry_count(&array.path).max(1);
    let mut html = String::new();

    for i in 0..count {
        html.push_str(&format!(
            "<fieldset>\n<legend>{}</legend>\n",
            html_escape(&array.label_for(i))
        ));
        for spec in specs_for(i) {
            html.push_str(&render_field(&spec, state));
        }
        html.push_str("</fieldset>\n");
    }

    html.push_str(&format!(
        "<button type=\"button\" data-append=\"{}\">Adicionar {}</button>",
        array.path,
        html_escape(&array.entry_label)
    ));

    html
}

pub(crate) fn render_hidden(name: &str, value: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\" />",
        name,
        html_escape(value)
    )
}

pub(crate) fn render_form(action: &str, body: &str, submit_label: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\" data-single-flight=\"true\">\n{}\n<button type=\"submit\">{}</button>\n</form>",
        action,
        body,
        html_escape(submit_label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::InputMask;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<b>\"A&B\"</b>"),
            "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_render_field_carries_value_and_maxlength() {
        let spec = FieldSpec::new("cpf", "CPF", FieldKind::Text)
            .required()
            .with_max_len(11)
            .with_mask(InputMask::Digits);
        let mut state = FormState::new();
        state.set(&spec, "123.456.789-01");

        let html = render_field(&spec, &state);
        assert!(html.contains("value=\"12345678901\""));
        assert!(html.contains("maxlength=\"11\""));
        assert!(html.contains("CPF *"));
    }

    #[test]
    fn test_render_select_marks_selected_option() {
        let spec = FieldSpec::new("rg_uf", "UF", FieldKind::Select)
            .with_options(crate::forms::uf_options())
            .with_clear();
        let mut state = FormState::new();
        state.set(&spec, "PR");

        let html = render_field(&spec, &state);
        assert!(html.contains("<option value=\"PR\" selected>"));
        assert!(html.contains("<option value=\"\">"));
    }

    #[test]
    fn test_mutation_response_serializes_tagged() {
        let resp = MutationResponse::NotFound;
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "not_found");

        let resp = MutationResponse::Failed {
            message: "FOREIGN KEY constraint failed".to_string(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["message"], "FOREIGN KEY constraint failed");
    }
}
