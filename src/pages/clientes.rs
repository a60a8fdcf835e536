use super::{
    link, render_array, render_field, render_form, render_hidden, render_table, MutationResponse,
    PageResult,
};
use crate::dispatch::{DispatchOutcome, Dispatcher, Navigator};
use crate::forms::{uf_options, ArrayField, FieldKind, FieldPath, FieldSpec, FormState, InputMask};
use crate::permission::{allow, has_permission, require_identity, Identity};
use crate::queries::{clientes, contas, dependentes};
use crate::schema::{flag_create, parse_cpf, parse_cpf_field, validate_cliente_form};
use crate::util::format_currency;
use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

const TITULO_FALLBACK: &str = "Cliente não encontrado";

pub fn titulo(conn: &Connection, raw_cpf: &str) -> String {
    let Ok(cpf) = parse_cpf(raw_cpf) else {
        return TITULO_FALLBACK.to_string();
    };

    match clientes::get_nome_by_cpf(conn, &cpf) {
        Ok(Some(nome)) => nome,
        _ => TITULO_FALLBACK.to_string(),
    }
}

fn form_fields(editing: bool) -> Vec<FieldSpec> {
    let mut fields = Vec::new();

    if !editing {
        fields.push(
            FieldSpec::new("cpf", "CPF", FieldKind::Text)
                .required()
                .with_max_len(11)
                .with_mask(InputMask::Digits),
        );
    }
    fields.push(
        FieldSpec::new("nome", "Nome", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(FieldSpec::new("data_nasc", "Data de nascimento", FieldKind::Date).required());
    fields.push(
        FieldSpec::new("rg_num", "RG", FieldKind::Text)
            .required()
            .with_max_len(15)
            .with_mask(InputMask::Digits),
    );
    fields.push(
        FieldSpec::new("rg_orgao_emissor", "Órgão emissor", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(
        FieldSpec::new("rg_uf", "UF do RG", FieldKind::Select)
            .required()
            .with_options(uf_options())
            .with_clear(),
    );
    fields.push(
        FieldSpec::new("end_tipo", "Tipo de logradouro", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(
        FieldSpec::new("end_logradouro", "Logradouro", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(FieldSpec::new("end_numero", "Número", FieldKind::Number).required());
    fields.push(
        FieldSpec::new("end_bairro", "Bairro", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(
        FieldSpec::new("end_cidade", "Cidade", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(
        FieldSpec::new("end_estado", "Estado", FieldKind::Select)
            .required()
            .with_options(uf_options())
            .with_clear(),
    );
    fields.push(
        FieldSpec::new("end_cep", "CEP", FieldKind::Text)
            .required()
            .with_max_len(8)
            .with_mask(InputMask::Digits),
    );

    fields
}

fn senha_field(editing: bool) -> FieldSpec {
    let label = if editing {
        "Senha (em branco mantém a atual)"
    } else {
        "Senha"
    };
    FieldSpec::new("senha", label, FieldKind::Password).with_max_len(80)
}

fn email_array() -> ArrayField {
    ArrayField::new("emails", "E-mail", json!({ "email": "", "tipo": "" }))
}

fn telefone_array() -> ArrayField {
    ArrayField::new("telefones", "Telefone", json!({ "telefone": "", "tipo": "" }))
}

fn email_specs(i: usize) -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(&format!("emails.{}.email", i), "E-mail", FieldKind::Email)
            .with_max_len(254),
        FieldSpec::new(&format!("emails.{}.tipo", i), "Tipo", FieldKind::Text).with_max_len(80),
    ]
}

fn telefone_specs(i: usize) -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(&format!("telefones.{}.telefone", i), "Telefone", FieldKind::Tel)
            .with_max_len(15)
            .with_mask(InputMask::Digits),
        FieldSpec::new(&format!("telefones.{}.tipo", i), "Tipo", FieldKind::Text).with_max_len(80),
    ]
}

fn render_cliente_form(state: &FormState, editing: bool) -> String {
    let mut body = String::new();

    body.push_str(&render_hidden("create", if editing { "false" } else { "true" }));
    if editing {
        body.push_str(&render_hidden("cpf", &state.get_str(&FieldPath::key("cpf"))));
    }
    for spec in form_fields(editing) {
        body.push_str(&render_field(&spec, state));
    }
    body.push_str(&render_array(&email_array(), state, email_specs));
    body.push_str(&render_array(&telefone_array(), state, telefone_specs));
    body.push_str(&render_field(&senha_field(editing), state));

    render_form("/api/clientes/upsert", &body, "Salvar")
}

pub fn list(conn: &Connection) -> Result<PageResult> {
    let clientes = clientes::get_all(conn)?;

    let rows: Vec<Vec<String>> = clientes
        .iter()
        .map(|c| {
            vec![
                super::html_escape(&c.cpf),
                super::html_escape(&c.nome),
                super::html_escape(&c.data_nasc),
                super::html_escape(&c.end_cidade),
                link(&format!("/clientes/{}", c.cpf), "detalhes"),
            ]
        })
        .collect();

    let mut body = render_table(&["CPF", "Nome", "Nascimento", "Cidade", ""], &rows);
    body.push_str(&format!(
        "\n<p>{}</p>",
        link("/clientes/cadastrar", "Cadastrar cliente")
    ));

    Ok(PageResult::page("Clientes", body))
}

pub fn show(conn: &Connection, identity: Option<&Identity>, raw_cpf: &str) -> Result<PageResult> {
    let Ok(cpf) = parse_cpf(raw_cpf) else {
        return Ok(PageResult::NotFound);
    };

    let Some(cliente) = clientes::get_by_cpf(conn, &cpf)? else {
        return Ok(PageResult::NotFound);
    };

    let can_edit = has_permission(allow::CLIENTE_EDIT, identity);
    let can_delete = has_permission(allow::CLIENTE_DELETE, identity);

    let mut body = format!(
        "<dl>\n<dt>CPF</dt><dd>{}</dd>\n<dt>Nome</dt><dd>{}</dd>\n<dt>Nascimento</dt><dd>{}</dd>\n<dt>RG</dt><dd>{} {} {}</dd>\n<dt>Endereço</dt><dd>{} {}, {} - {}, {} - {}, CEP {}</dd>\n</dl>",
        super::html_escape(&cliente.cpf),
        super::html_escape(&cliente.nome),
        super::html_escape(&cliente.data_nasc),
        super::html_escape(&cliente.rg_num),
        super::html_escape(&cliente.rg_orgao_emissor),
        super::html_escape(&cliente.rg_uf),
        super::html_escape(&cliente.end_tipo),
        super::html_escape(&cliente.end_logradouro),
        cliente.end_numero,
        super::html_escape(&cliente.end_bairro),
        super::html_escape(&cliente.end_cidade),
        super::html_escape(&cliente.end_estado),
        super::html_escape(&cliente.end_cep),
    );

    if !cliente.emails.is_empty() {
        body.push_str("\n<h2>E-mails</h2>\n<ul>");
        for contato in &cliente.emails {
            body.push_str(&format!(
                "\n<li>{} ({})</li>",
                super::html_escape(&contato.email),
                super::html_escape(&contato.tipo),
            ));
        }
        body.push_str("\n</ul>");
    }
    if !cliente.telefones.is_empty() {
        body.push_str("\n<h2>Telefones</h2>\n<ul>");
        for contato in &cliente.telefones {
            body.push_str(&format!(
                "\n<li>{} ({})</li>",
                super::html_escape(&contato.telefone),
                super::html_escape(&contato.tipo),
            ));
        }
        body.push_str("\n</ul>");
    }

    let contas = contas::get_by_cliente(conn, &cpf)?;
    if !contas.is_empty() {
        let rows: Vec<Vec<String>> = contas
            .iter()
            .map(|c| {
                vec![
                    c.num_conta.to_string(),
                    super::html_escape(&c.tipo),
                    format_currency(c.saldo),
                    link(&format!("/contas/{}", c.num_conta), "detalhes"),
                ]
            })
            .collect();
        body.push_str("\n<h2>Contas</h2>\n");
        body.push_str(&render_table(&["Número", "Tipo", "Saldo", ""], &rows));
    }

    let dependentes = dependentes::get_by_cliente(conn, &cpf)?;
    if !dependentes.is_empty() {
        let rows: Vec<Vec<String>> = dependentes
            .iter()
            .map(|d| {
                vec![
                    super::html_escape(&d.nome),
                    super::html_escape(&d.parentesco),
                    super::html_escape(&d.data_nasc),
                    link(&format!("/dependentes/{}", d.id), "detalhes"),
                ]
            })
            .collect();
        body.push_str("\n<h2>Dependentes</h2>\n");
        body.push_str(&render_table(&["Nome", "Parentesco", "Nascimento", ""], &rows));
    }

    if can_edit {
        body.push_str(&format!(
            "\n<p>{}</p>",
            link(&format!("/clientes/{}/editar", cliente.cpf), "Editar")
        ));
    }
    if can_delete {
        body.push_str(&format!(
            "\n<form method=\"post\" action=\"/api/clientes/delete\">{}<button type=\"submit\">Excluir</button></form>",
            render_hidden("cpf", &cliente.cpf)
        ));
    }

    Ok(PageResult::page(cliente.nome.clone(), body))
}

/// The create form doubles as self-service signup, so it renders for anyone.
pub fn create() -> PageResult {
    let mut state = FormState::new();
    state.push_entry(&email_array());
    state.push_entry(&telefone_array());

    PageResult::page("Cadastrar cliente", render_cliente_form(&state, false))
}

pub fn edit(conn: &Connection, identity: Option<&Identity>, raw_cpf: &str) -> Result<PageResult> {
    if require_identity(identity, allow::CLIENTE_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let Ok(cpf) = parse_cpf(raw_cpf) else {
        return Ok(PageResult::NotFound);
    };

    let Some(cliente) = clientes::get_by_cpf(conn, &cpf)? else {
        return Ok(PageResult::NotFound);
    };

    let Ok(defaults) = crate::schema::prune_cliente(&cliente) else {
        return Ok(PageResult::NotFound);
    };

    let state = FormState::seed(&defaults);
    Ok(PageResult::page(
        format!("Editar {}", cliente.nome),
        render_cliente_form(&state, true),
    ))
}

pub fn upsert(conn: &Connection, identity: Option<&Identity>, payload: &Value) -> MutationResponse {
    // create doubles as signup and stays open; updates are staff-only
    if !flag_create(payload) {
        if let Err(err) = require_identity(identity, allow::CLIENTE_EDIT) {
            return MutationResponse::Denied {
                message: err.to_string(),
            };
        }
    }

    let dispatcher = Dispatcher::new();
    let mut navigator = Navigator::new();
    let cpf_from_payload = parse_cpf_field(payload, "cpf");

    let outcome = dispatcher.submit(
        payload,
        validate_cliente_form,
        |form| clientes::upsert(conn, form),
        |result, nav| {
            if result.applied() {
                if let Some(cpf) = &cpf_from_payload {
                    nav.push(&format!("/clientes/{}", cpf));
                }
            }
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
    if let Err(err) = require_identity(identity, allow::CLIENTE_DELETE) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let Some(cpf) = parse_cpf_field(payload, "cpf") else {
        return MutationResponse::NotFound;
    };

    match clientes::delete(conn, &cpf) {
        Ok(0) => MutationResponse::NotFound,
        Ok(affected) => MutationResponse::Ok {
            data: json!({ "affected": affected, "redirect": "/clientes" }),
        },
        Err(err) => MutationResponse::Failed {
            message: err.to_string(),
        },
    }
}
