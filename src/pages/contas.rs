use super::{
    link, render_field, render_form, render_hidden, render_table, MutationResponse, PageResult,
};
use crate::dispatch::{DispatchOutcome, Dispatcher, Navigator};
use crate::forms::{tipo_conta_options, FieldKind, FieldPath, FieldSpec, FormState, SelectOption};
use crate::permission::{allow, has_permission, require_identity, Identity};
use crate::queries::{agencias, clientes, contas, transacoes, UpsertOutcome};
use crate::schema::{parse_id, parse_id_field, validate_conta_form};
use crate::util::format_currency;
use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

const TITULO_FALLBACK: &str = "Conta não encontrada";

/// Contas have no display name; the tipo doubles as the title.
pub fn titulo(conn: &Connection, raw_numero: &str) -> String {
    let Ok(num_conta) = parse_id(raw_numero) else {
        return TITULO_FALLBACK.to_string();
    };

    match contas::get_nome_by_numero(conn, num_conta) {
        Ok(Some(tipo)) => format!("Conta {} ({})", num_conta, tipo),
        _ => TITULO_FALLBACK.to_string(),
    }
}

fn agencia_options(conn: &Connection) -> Result<Vec<SelectOption>> {
    let agencias = agencias::get_all(conn)?;
    Ok(agencias
        .iter()
        .map(|a| SelectOption::new(&a.num_ag.to_string(), &a.nome_ag))
        .collect())
}

fn cliente_options(conn: &Connection) -> Result<Vec<SelectOption>> {
    let clientes = clientes::get_all(conn)?;
    Ok(clientes
        .iter()
        .map(|c| SelectOption::new(&c.cpf, &c.nome))
        .collect())
}

fn form_fields(conn: &Connection) -> Result<Vec<FieldSpec>> {
    Ok(vec![
        FieldSpec::new("tipo", "Tipo", FieldKind::Select)
            .required()
            .with_options(tipo_conta_options())
            .with_clear(),
        FieldSpec::new("saldo", "Saldo", FieldKind::Number).required(),
        FieldSpec::new("num_ag", "Agência", FieldKind::Select)
            .required()
            .with_options(agencia_options(conn)?)
            .with_clear(),
        FieldSpec::new("cpf_cliente", "Cliente", FieldKind::Select)
            .required()
            .with_options(cliente_options(conn)?)
            .with_clear(),
    ])
}

fn render_conta_form(conn: &Connection, state: &FormState, editing: bool) -> Result<String> {
    let mut body = String::new();

    body.push_str(&render_hidden("create", if editing { "false" } else { "true" }));
    if editing {
        body.push_str(&render_hidden(
            "num_conta",
            &state.get_str(&FieldPath::key("num_conta")),
        ));
    }
    for spec in form_fields(conn)? {
        body.push_str(&render_field(&spec, state));
    }

    Ok(render_form("/api/contas/upsert", &body, "Salvar"))
}

pub fn list(conn: &Connection) -> Result<PageResult> {
    let contas = contas::get_all(conn)?;

    let rows: Vec<Vec<String>> = contas
        .iter()
        .map(|c| {
            vec![
                c.num_conta.to_string(),
                super::html_escape(&c.tipo),
                format_currency(c.saldo),
                c.num_ag.to_string(),
                super::html_escape(&c.cpf_cliente),
                link(&format!("/contas/{}", c.num_conta), "detalhes"),
            ]
        })
        .collect();

    let mut body = render_table(
        &["Número", "Tipo", "Saldo", "Agência", "Cliente", ""],
        &rows,
    );
    body.push_str(&format!(
        "\n<p>{}</p>",
        link("/contas/cadastrar", "Cadastrar conta")
    ));

    Ok(PageResult::page("Contas", body))
}

pub fn show(conn: &Connection, identity: Option<&Identity>, raw_numero: &str) -> Result<PageResult> {
    let Ok(num_conta) = parse_id(raw_numero) else {
        return Ok(PageResult::NotFound);
    };

    let Some(conta) = contas::get_by_numero(conn, num_conta)? else {
        return Ok(PageResult::NotFound);
    };

    let can_edit = has_permission(allow::CONTA_EDIT, identity);
    let can_delete = has_permission(allow::CONTA_DELETE, identity);

    let agencia = agencias::get_nome_by_numero(conn, conta.num_ag)?
        .map(|nome| link(&format!("/agencias/{}", conta.num_ag), &nome))
        .unwrap_or_else(|| conta.num_ag.to_string());
    let cliente = clientes::get_nome_by_cpf(conn, &conta.cpf_cliente)?
        .map(|nome| link(&format!("/clientes/{}", conta.cpf_cliente), &nome))
        .unwrap_or_else(|| super::html_escape(&conta.cpf_cliente));

    let mut body = format!(
        "<dl>\n<dt>Número</dt><dd>{}</dd>\n<dt>Tipo</dt><dd>{}</dd>\n<dt>Saldo</dt><dd>{}</dd>\n<dt>Agência</dt><dd>{}</dd>\n<dt>Cliente</dt><dd>{}</dd>\n</dl>",
        conta.num_conta,
        super::html_escape(&conta.tipo),
        format_currency(conta.saldo),
        agencia,
        cliente,
    );

    let transacoes = transacoes::get_by_conta(conn, num_conta)?;
    if !transacoes.is_empty() {
        let rows: Vec<Vec<String>> = transacoes
            .iter()
            .map(|t| {
                vec![
                    super::html_escape(&t.data_hora),
                    super::html_escape(&t.tipo),
                    format_currency(t.valor),
                    link(&format!("/transacoes/{}", t.id), "detalhes"),
                ]
            })
            .collect();
        body.push_str("\n<h2>Transações</h2>\n");
        body.push_str(&render_table(&["Data", "Tipo", "Valor", ""], &rows));
    }

    if can_edit {
        body.push_str(&format!(
            "\n<p>{}</p>",
            link(&format!("/contas/{}/editar", conta.num_conta), "Editar")
        ));
    }
    if can_delete {
        body.push_str(&format!(
            "\n<form method=\"post\" action=\"/api/contas/delete\">{}<button type=\"submit\">Excluir</button></form>",
            render_hidden("num_conta", &conta.num_conta.to_string())
        ));
    }

    Ok(PageResult::page(
        format!("Conta {} ({})", conta.num_conta, conta.tipo),
        body,
    ))
}

pub fn create(conn: &Connection, identity: Option<&Identity>) -> Result<PageResult> {
    if require_identity(identity, allow::CONTA_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let state = FormState::new();
    Ok(PageResult::page(
        "Cadastrar conta",
        render_conta_form(conn, &state, false)?,
    ))
}

pub fn edit(conn: &Connection, identity: Option<&Identity>, raw_numero: &str) -> Result<PageResult> {
    if require_identity(identity, allow::CONTA_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let Ok(num_conta) = parse_id(raw_numero) else {
        return Ok(PageResult::NotFound);
    };

    let Some(conta) = contas::get_by_numero(conn, num_conta)? else {
        return Ok(PageResult::NotFound);
    };

    let Ok(defaults) = crate::schema::prune_conta(&conta) else {
        return Ok(PageResult::NotFound);
    };

    let state = FormState::seed(&defaults);
    Ok(PageResult::page(
        format!("Editar conta {}", conta.num_conta),
        render_conta_form(conn, &state, true)?,
    ))
}

pub fn upsert(conn: &Connection, identity: Option<&Identity>, payload: &Value) -> MutationResponse {
    if let Err(err) = require_identity(identity, allow::CONTA_EDIT) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let dispatcher = Dispatcher::new();
    let mut navigator = Navigator::new();
    let numero_from_payload = parse_id_field(payload, "num_conta");

    let outcome = dispatcher.submit(
        payload,
        validate_conta_form,
        |form| contas::upsert(conn, form),
        |result, nav| match result {
            UpsertOutcome::Created { id } => nav.push(&format!("/contas/{}", id)),
            UpsertOutcome::Updated { affected } if *affected > 0 => {
                if let Some(num_conta) = numero_from_payload {
                    nav.push(&format!("/contas/{}", num_conta));
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
    if let Err(err) = require_identity(identity, allow::CONTA_DELETE) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let Some(num_conta) = parse_id_field(payload, "num_conta") else {
        return MutationResponse::NotFound;
    };

    match contas::delete(conn, num_conta) {
        Ok(0) => MutationResponse::NotFound,
        Ok(affected) => MutationResponse::Ok {
            data: json!({ "affected": affected, "redirect": "/contas" }),
        },
        Err(err) => MutationResponse::Failed {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_demo_data, setup_database};
    use crate::permission::Role;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_demo_data(&conn).unwrap();
        conn
    }

    fn identity(role: Role) -> Identity {
        Identity {
            id: "1".to_string(),
            nome: "Teste".to_string(),
            role,
        }
    }

    #[test]
    fn test_show_malformed_numero_is_not_found() {
        let conn = test_conn();
        assert_eq!(show(&conn, None, "conta").unwrap(), PageResult::NotFound);
        assert_eq!(show(&conn, None, "999").unwrap(), PageResult::NotFound);
    }

    #[test]
    fn test_show_links_agencia_cliente_and_lists_transacoes() {
        let conn = test_conn();

        let PageResult::Page(page) = show(&conn, None, "1").unwrap() else {
            panic!("expected page");
        };
        assert!(page.body.contains("/agencias/10"));
        assert!(page.body.contains("/clientes/12345678901"));
        assert!(page.body.contains("Transações"));
    }

    #[test]
    fn test_create_redirects_to_new_conta() {
        let conn = test_conn();
        let gerente = identity(Role::Gerente);

        let resp = upsert(
            &conn,
            Some(&gerente),
            &json!({
                "tipo": "poupanca",
                "saldo": 250.0,
                "num_ag": 10,
                "cpf_cliente": "12345678901",
                "create": true,
            }),
        );
        let MutationResponse::Ok { data } = resp else {
            panic!("expected ok, got {:?}", resp);
        };
        let id = data["result"]["id"].as_i64().unwrap();
        assert_eq!(data["redirect"], format!("/contas/{}", id));
    }

    #[test]
    fn test_upsert_fk_violation_surfaces_failed() {
        let conn = test_conn();
        let gerente = identity(Role::Gerente);

        let resp = upsert(
            &conn,
            Some(&gerente),
            &json!({
                "tipo": "corrente",
                "saldo": 0.0,
                "num_ag": 99,
                "cpf_cliente": "12345678901",
                "create": true,
            }),
        );
        assert!(matches!(resp, MutationResponse::Failed { .. }));
    }

    #[test]
    fn test_upsert_denied_for_atendente() {
        let conn = test_conn();
        let atendente = identity(Role::Atendente);

        let resp = upsert(
            &conn,
            Some(&atendente),
            &json!({
                "tipo": "corrente",
                "saldo": 0.0,
                "num_ag": 10,
                "cpf_cliente": "12345678901",
                "create": true,
            }),
        );
        assert!(matches!(resp, MutationResponse::Denied { .. }));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        assert_eq!(
            delete(&conn, Some(&dba), &json!({ "num_conta": 999 })),
            MutationResponse::NotFound
        );
    }

    #[test]
    fn test_titulo_includes_tipo() {
        let conn = test_conn();
        assert_eq!(titulo(&conn, "1"), "Conta 1 (corrente)");
        assert_eq!(titulo(&conn, "999"), "Conta não encontrada");
    }
}
