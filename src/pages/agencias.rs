use super::{
    link, render_field, render_form, render_hidden, render_table, MutationResponse, PageResult,
};
use crate::dispatch::{DispatchOutcome, Dispatcher, Navigator};
use crate::forms::{FieldKind, FieldSpec, FormState};
use crate::permission::{allow, has_permission, require_identity, Identity};
use crate::queries::agencias;
use crate::schema::{parse_id, parse_id_field, validate_agencia_form};
use crate::util::format_currency;
use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

const TITULO_FALLBACK: &str = "Agência não encontrada";

/// Page title metadata: the agência's nome, or the fixed fallback.
pub fn titulo(conn: &Connection, raw_numero: &str) -> String {
    let Ok(num_ag) = parse_id(raw_numero) else {
        return TITULO_FALLBACK.to_string();
    };

    match agencias::get_nome_by_numero(conn, num_ag) {
        Ok(Some(nome)) => nome,
        _ => TITULO_FALLBACK.to_string(),
    }
}

fn form_fields(editing: bool) -> Vec<FieldSpec> {
    let mut fields = Vec::new();

    if !editing {
        fields.push(FieldSpec::new("num_ag", "Número", FieldKind::Number).required());
    }
    fields.push(
        FieldSpec::new("nome_ag", "Nome", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(
        FieldSpec::new("cidade_ag", "Cidade", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(FieldSpec::new("sal_total", "Salário total", FieldKind::Number).required());

    fields
}

fn render_agencia_form(state: &FormState, editing: bool) -> String {
    let mut body = String::new();

    body.push_str(&render_hidden("create", if editing { "false" } else { "true" }));
    if editing {
        body.push_str(&render_hidden("num_ag", &state.get_str(&crate::forms::FieldPath::key("num_ag"))));
    }
    for spec in form_fields(editing) {
        body.push_str(&render_field(&spec, state));
    }

    render_form("/api/agencias/upsert", &body, "Salvar")
}

pub fn list(conn: &Connection) -> Result<PageResult> {
    let agencias = agencias::get_all(conn)?;

    let rows: Vec<Vec<String>> = agencias
        .iter()
        .map(|a| {
            vec![
                a.num_ag.to_string(),
                super::html_escape(&a.nome_ag),
                super::html_escape(&a.cidade_ag),
                format_currency(a.sal_total),
                link(&format!("/agencias/{}", a.num_ag), "detalhes"),
            ]
        })
        .collect();

    let mut body = render_table(&["Número", "Nome", "Cidade", "Salário total", ""], &rows);
    body.push_str(&format!(
        "\n<p>{}</p>",
        link("/agencias/cadastrar", "Cadastrar agência")
    ));

    Ok(PageResult::page("Agências", body))
}

pub fn show(conn: &Connection, identity: Option<&Identity>, raw_numero: &str) -> Result<PageResult> {
    let Ok(num_ag) = parse_id(raw_numero) else {
        return Ok(PageResult::NotFound);
    };

    let Some(agencia) = agencias::get_by_numero(conn, num_ag)? else {
        return Ok(PageResult::NotFound);
    };

    // soft gates only hide the affordances; the mutation endpoints enforce
    let can_edit = has_permission(allow::AGENCIA_EDIT, identity);
    let can_delete = has_permission(allow::AGENCIA_DELETE, identity);

    let mut body = format!(
        "<dl>\n<dt>Número</dt><dd>{}</dd>\n<dt>Nome</dt><dd>{}</dd>\n<dt>Cidade</dt><dd>{}</dd>\n<dt>Salário total</dt><dd>{}</dd>\n</dl>",
        agencia.num_ag,
        super::html_escape(&agencia.nome_ag),
        super::html_escape(&agencia.cidade_ag),
        format_currency(agencia.sal_total),
    );

    let funcionarios = crate::queries::funcionarios::get_by_agencia(conn, num_ag)?;
    if !funcionarios.is_empty() {
        let rows: Vec<Vec<String>> = funcionarios
            .iter()
            .map(|f| {
                vec![
                    super::html_escape(&f.nome),
                    super::html_escape(&f.cargo),
                    link(&format!("/funcionarios/{}", f.matricula), "detalhes"),
                ]
            })
            .collect();
        body.push_str("\n<h2>Funcionários</h2>\n");
        body.push_str(&render_table(&["Nome", "Cargo", ""], &rows));
    }

    if can_edit {
        body.push_str(&format!(
            "\n<p>{}</p>",
            link(&format!("/agencias/{}/editar", agencia.num_ag), "Editar")
        ));
    }
    if can_delete {
        body.push_str(&format!(
            "\n<form method=\"post\" action=\"/api/agencias/delete\">{}<button type=\"submit\">Excluir</button></form>",
            render_hidden("num_ag", &agencia.num_ag.to_string())
        ));
    }

    Ok(PageResult::page(agencia.nome_ag.clone(), body))
}

pub fn create(identity: Option<&Identity>) -> PageResult {
    if require_identity(identity, allow::AGENCIA_EDIT).is_err() {
        return PageResult::Redirect("/login".to_string());
    }

    let state = FormState::new();
    PageResult::page("Cadastrar agência", render_agencia_form(&state, false))
}

pub fn edit(conn: &Connection, identity: Option<&Identity>, raw_numero: &str) -> Result<PageResult> {
    if require_identity(identity, allow::AGENCIA_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let Ok(num_ag) = parse_id(raw_numero) else {
        return Ok(PageResult::NotFound);
    };

    let Some(agencia) = agencias::get_by_numero(conn, num_ag)? else {
        return Ok(PageResult::NotFound);
    };

    // a row that cannot safely populate the form is treated as missing
    let Ok(defaults) = crate::schema::prune_agencia(&agencia) else {
        return Ok(PageResult::NotFound);
    };

    let state = FormState::seed(&defaults);
    Ok(PageResult::page(
        format!("Editar {}", agencia.nome_ag),
        render_agencia_form(&state, true),
    ))
}

pub fn upsert(conn: &Connection, identity: Option<&Identity>, payload: &Value) -> MutationResponse {
    if let Err(err) = require_identity(identity, allow::AGENCIA_EDIT) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let dispatcher = Dispatcher::new();
    let mut navigator = Navigator::new();
    let num_from_payload = parse_id_field(payload, "num_ag");

    let outcome = dispatcher.submit(
        payload,
        validate_agencia_form,
        |form| agencias::upsert(conn, form),
        |result, nav| {
            if result.applied() {
                if let Some(num_ag) = num_from_payload {
                    nav.push(&format!("/agencias/{}", num_ag));
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
    if let Err(err) = require_identity(identity, allow::AGENCIA_DELETE) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let Some(num_ag) = parse_id_field(payload, "num_ag") else {
        return MutationResponse::NotFound;
    };

    match agencias::delete(conn, num_ag) {
        Ok(0) => MutationResponse::NotFound,
        Ok(affected) => MutationResponse::Ok {
            data: json!({ "affected": affected, "redirect": "/agencias" }),
        },
        Err(err) => MutationResponse::Failed {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::permission::Role;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn identity(role: Role) -> Identity {
        Identity {
            id: "1".to_string(),
            nome: "Teste".to_string(),
            role,
        }
    }

    fn create_payload(num_ag: i64, nome: &str) -> Value {
        json!({
            "num_ag": num_ag,
            "nome_ag": nome,
            "cidade_ag": "Curitiba",
            "sal_total": 1000.0,
            "create": true,
        })
    }

    #[test]
    fn test_show_malformed_id_is_not_found() {
        let conn = test_conn();

        assert_eq!(show(&conn, None, "abc").unwrap(), PageResult::NotFound);
        assert_eq!(show(&conn, None, "").unwrap(), PageResult::NotFound);
        assert_eq!(show(&conn, None, "-5").unwrap(), PageResult::NotFound);
    }

    #[test]
    fn test_show_missing_row_is_not_found() {
        let conn = test_conn();
        assert_eq!(show(&conn, None, "42").unwrap(), PageResult::NotFound);
    }

    #[test]
    fn test_show_soft_gates_follow_role() {
        let conn = test_conn();
        let dba = identity(Role::Dba);
        let cliente = identity(Role::Cliente);

        upsert(&conn, Some(&dba), &create_payload(10, "Centro"));

        let PageResult::Page(for_dba) = show(&conn, Some(&dba), "10").unwrap() else {
            panic!("expected page");
        };
        assert!(for_dba.body.contains("/agencias/10/editar"));
        assert!(for_dba.body.contains("Excluir"));

        let PageResult::Page(for_cliente) = show(&conn, Some(&cliente), "10").unwrap() else {
            panic!("expected page");
        };
        assert!(!for_cliente.body.contains("/agencias/10/editar"));
        assert!(!for_cliente.body.contains("Excluir"));
    }

    #[test]
    fn test_edit_requires_dba() {
        let conn = test_conn();

        let anon = edit(&conn, None, "10").unwrap();
        assert_eq!(anon, PageResult::Redirect("/login".to_string()));

        let gerente = identity(Role::Gerente);
        let negado = edit(&conn, Some(&gerente), "10").unwrap();
        assert_eq!(negado, PageResult::Redirect("/login".to_string()));
    }

    #[test]
    fn test_upsert_create_then_show_displays_nome() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        let resp = upsert(&conn, Some(&dba), &create_payload(10, "Centro"));
        let MutationResponse::Ok { data } = resp else {
            panic!("expected ok, got {:?}", resp);
        };
        assert_eq!(data["redirect"], "/agencias/10");
        assert_eq!(data["result"]["outcome"], "created");

        let PageResult::Page(page) = show(&conn, None, "10").unwrap() else {
            panic!("expected page");
        };
        assert_eq!(page.title, "Centro");
        assert!(page.body.contains("Centro"));
    }

    #[test]
    fn test_upsert_update_touches_only_target() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        upsert(&conn, Some(&dba), &create_payload(10, "Antiga"));
        upsert(&conn, Some(&dba), &create_payload(20, "Bairro Alto"));

        let mut edit_payload = create_payload(10, "Centro");
        edit_payload["create"] = json!(false);
        let resp = upsert(&conn, Some(&dba), &edit_payload);
        assert!(matches!(resp, MutationResponse::Ok { .. }));

        assert_eq!(titulo(&conn, "10"), "Centro");
        assert_eq!(titulo(&conn, "20"), "Bairro Alto");
    }

    #[test]
    fn test_upsert_update_missing_is_not_found() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        let mut payload = create_payload(99, "Fantasma");
        payload["create"] = json!(false);

        assert_eq!(upsert(&conn, Some(&dba), &payload), MutationResponse::NotFound);
    }

    #[test]
    fn test_upsert_denied_for_cliente() {
        let conn = test_conn();
        let cliente = identity(Role::Cliente);

        let resp = upsert(&conn, Some(&cliente), &create_payload(10, "Centro"));
        assert!(matches!(resp, MutationResponse::Denied { .. }));
    }

    #[test]
    fn test_delete_maps_zero_rows_to_not_found() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        assert_eq!(
            delete(&conn, Some(&dba), &json!({ "num_ag": 42 })),
            MutationResponse::NotFound
        );
        assert_eq!(
            delete(&conn, Some(&dba), &json!({ "num_ag": "abc" })),
            MutationResponse::NotFound
        );
    }

    #[test]
    fn test_titulo_fallback() {
        let conn = test_conn();
        assert_eq!(titulo(&conn, "abc"), "Agência não encontrada");
        assert_eq!(titulo(&conn, "42"), "Agência não encontrada");
    }
}
