use super::{
    link, render_field, render_form, render_hidden, render_table, MutationResponse, PageResult,
};
use crate::dispatch::{DispatchOutcome, Dispatcher, Navigator};
use crate::forms::{tipo_transacao_options, FieldKind, FieldPath, FieldSpec, FormState, SelectOption};
use crate::permission::{allow, has_permission, require_identity, Identity};
use crate::queries::{contas, transacoes, UpsertOutcome};
use crate::schema::{parse_id, parse_id_field, validate_transacao_form};
use crate::util::format_currency;
use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

const TITULO_FALLBACK: &str = "Transação não encontrada";

pub fn titulo(conn: &Connection, raw_id: &str) -> String {
    let Ok(id) = parse_id(raw_id) else {
        return TITULO_FALLBACK.to_string();
    };

    match transacoes::get_nome_by_id(conn, id) {
        Ok(Some(tipo)) => format!("Transação {} ({})", id, tipo),
        _ => TITULO_FALLBACK.to_string(),
    }
}

fn conta_options(conn: &Connection) -> Result<Vec<SelectOption>> {
    let contas = contas::get_all(conn)?;
    Ok(contas
        .iter()
        .map(|c| {
            SelectOption::new(
                &c.num_conta.to_string(),
                &format!("{} ({})", c.num_conta, c.tipo),
            )
        })
        .collect())
}

fn form_fields(conn: &Connection) -> Result<Vec<FieldSpec>> {
    Ok(vec![
        FieldSpec::new("num_conta", "Conta", FieldKind::Select)
            .required()
            .with_options(conta_options(conn)?)
            .with_clear(),
        FieldSpec::new("tipo", "Tipo", FieldKind::Select)
            .required()
            .with_options(tipo_transacao_options())
            .with_clear(),
        FieldSpec::new("valor", "Valor", FieldKind::Number).required(),
        FieldSpec::new("data_hora", "Data e hora", FieldKind::DateTime).required(),
    ])
}

fn render_transacao_form(conn: &Connection, state: &FormState, editing: bool) -> Result<String> {
    let mut body = String::new();

    body.push_str(&render_hidden("create", if editing { "false" } else { "true" }));
    if editing {
        body.push_str(&render_hidden("id", &state.get_str(&FieldPath::key("id"))));
    }
    for spec in form_fields(conn)? {
        body.push_str(&render_field(&spec, state));
    }

    Ok(render_form("/api/transacoes/upsert", &body, "Salvar"))
}

pub fn list(conn: &Connection) -> Result<PageResult> {
    let transacoes = transacoes::get_all(conn)?;

    let rows: Vec<Vec<String>> = transacoes
        .iter()
        .map(|t| {
            vec![
                super::html_escape(&t.data_hora),
                super::html_escape(&t.tipo),
                format_currency(t.valor),
                link(&format!("/contas/{}", t.num_conta), &t.num_conta.to_string()),
                link(&format!("/transacoes/{}", t.id), "detalhes"),
            ]
        })
        .collect();

    let mut body = render_table(&["Data", "Tipo", "Valor", "Conta", ""], &rows);
    body.push_str(&format!(
        "\n<p>{}</p>",
        link("/transacoes/cadastrar", "Cadastrar transação")
    ));

    Ok(PageResult::page("Transações", body))
}

pub fn show(conn: &Connection, identity: Option<&Identity>, raw_id: &str) -> Result<PageResult> {
    let Ok(id) = parse_id(raw_id) else {
        return Ok(PageResult::NotFound);
    };

    let Some(transacao) = transacoes::get_by_id(conn, id)? else {
        return Ok(PageResult::NotFound);
    };

    let can_edit = has_permission(allow::TRANSACAO_EDIT, identity);
    let can_delete = has_permission(allow::TRANSACAO_DELETE, identity);

    let conta = link(
        &format!("/contas/{}", transacao.num_conta),
        &transacao.num_conta.to_string(),
    );

    let mut body = format!(
        "<dl>\n<dt>Conta</dt><dd>{}</dd>\n<dt>Tipo</dt><dd>{}</dd>\n<dt>Valor</dt><dd>{}</dd>\n<dt>Data e hora</dt><dd>{}</dd>\n</dl>",
        conta,
        super::html_escape(&transacao.tipo),
        format_currency(transacao.valor),
        super::html_escape(&transacao.data_hora),
    );

    if can_edit {
        body.push_str(&format!(
            "\n<p>{}</p>",
            link(&format!("/transacoes/{}/editar", transacao.id), "Editar")
        ));
    }
    if can_delete {
        body.push_str(&format!(
            "\n<form method=\"post\" action=\"/api/transacoes/delete\">{}<button type=\"submit\">Excluir</button></form>",
            render_hidden("id", &transacao.id.to_string())
        ));
    }

    Ok(PageResult::page(
        format!("Transação {} ({})", transacao.id, transacao.tipo),
        body,
    ))
}

pub fn create(conn: &Connection, identity: Option<&Identity>) -> Result<PageResult> {
    if require_identity(identity, allow::TRANSACAO_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let state = FormState::new();
    Ok(PageResult::page(
        "Cadastrar transação",
        render_transacao_form(conn, &state, false)?,
    ))
}

pub fn edit(conn: &Connection, identity: Option<&Identity>, raw_id: &str) -> Result<PageResult> {
    if require_identity(identity, allow::TRANSACAO_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let Ok(id) = parse_id(raw_id) else {
        return Ok(PageResult::NotFound);
    };

    let Some(transacao) = transacoes::get_by_id(conn, id)? else {
        return Ok(PageResult::NotFound);
    };

    let Ok(defaults) = crate::schema::prune_transacao(&transacao) else {
        return Ok(PageResult::NotFound);
    };

    let state = FormState::seed(&defaults);
    Ok(PageResult::page(
        format!("Editar transação {}", transacao.id),
        render_transacao_form(conn, &state, true)?,
    ))
}

pub fn upsert(conn: &Connection, identity: Option<&Identity>, payload: &Value) -> MutationResponse {
    if let Err(err) = require_identity(identity, allow::TRANSACAO_EDIT) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let dispatcher = Dispatcher::new();
    let mut navigator = Navigator::new();
    let id_from_payload = parse_id_field(payload, "id");

    let outcome = dispatcher.submit(
        payload,
        validate_transacao_form,
        |form| transacoes::upsert(conn, form),
        |result, nav| match result {
            UpsertOutcome::Created { id } => nav.push(&format!("/transacoes/{}", id)),
            UpsertOutcome::Updated { affected } if *affected > 0 => {
                if let Some(id) = id_from_payload {
                    nav.push(&format!("/transacoes/{}", id));
                }
            }
            _ => {}
        },
        &mut navigator,
    );

    match outcome {
        DispatchOutcome::Invalid(errors) => MutationResponse::Invalid { errors },
        DispatchOutcome::Busy => MutationResponse::Failed {
            message: "envio em andamento".to_string(),
        },
        DispatchOutcome::Success(result) if !result.applied() => MutationResponse::NotFound,
        DispatchOutcome::Success(result) => MutationResponse::Ok {
            data: json!({ "result": result, "redirect": navigator.target() }),
        },
        DispatchOutcome::Failed(message) => MutationResponse::Failed { message },
    }
}

pub fn delete(conn: &Connection, identity: Option<&Identity>, payload: &Value) -> MutationResponse {
    if let Err(err) = require_identity(identity, allow::TRANSACAO_DELETE) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let Some(id) = parse_id_field(payload, "id") else {
        return MutationResponse::NotFound;
    };

    match transacoes::delete(conn, id) {
        Ok(0) => MutationResponse::NotFound,
        Ok(affected) => MutationResponse::Ok {
            data: json!({ "affected": affected, "redirect": "/transacoes" }),
        },
        Err(err) => MutationResponse::Failed {
            message: err.to_string(),
        },
    }
}
