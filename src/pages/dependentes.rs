use super::{
    link, render_field, render_form, render_hidden, render_table, MutationResponse, PageResult,
};
use crate::dispatch::{DispatchOutcome, Dispatcher, Navigator};
use crate::forms::{FieldKind, FieldPath, FieldSpec, FormState, SelectOption};
use crate::permission::{allow, has_permission, require_identity, Identity};
use crate::queries::{clientes, dependentes, UpsertOutcome};
use crate::schema::{parse_id, parse_id_field, validate_dependente_form};
use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

const TITULO_FALLBACK: &str = "Dependente não encontrado";

pub fn titulo(conn: &Connection, raw_id: &str) -> String {
    let Ok(id) = parse_id(raw_id) else {
        return TITULO_FALLBACK.to_string();
    };

    match dependentes::get_nome_by_id(conn, id) {
        Ok(Some(nome)) => nome,
        _ => TITULO_FALLBACK.to_string(),
    }
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
        FieldSpec::new("cpf_cliente", "Cliente", FieldKind::Select)
            .required()
            .with_options(cliente_options(conn)?)
            .with_clear(),
        FieldSpec::new("nome", "Nome", FieldKind::Text)
            .required()
            .with_max_len(80),
        FieldSpec::new("data_nasc", "Data de nascimento", FieldKind::Date).required(),
        FieldSpec::new("parentesco", "Parentesco", FieldKind::Text)
            .required()
            .with_max_len(80),
    ])
}

fn render_dependente_form(conn: &Connection, state: &FormState, editing: bool) -> Result<String> {
    let mut body = String::new();

    body.push_str(&render_hidden("create", if editing { "false" } else { "true" }));
    if editing {
        body.push_str(&render_hidden("id", &state.get_str(&FieldPath::key("id"))));
    }
    for spec in form_fields(conn)? {
        body.push_str(&render_field(&spec, state));
    }

    Ok(render_form("/api/dependentes/upsert", &body, "Salvar"))
}

pub fn list(conn: &Connection) -> Result<PageResult> {
    let dependentes = dependentes::get_all(conn)?;

    let rows: Vec<Vec<String>> = dependentes
        .iter()
        .map(|d| {
            vec![
                super::html_escape(&d.nome),
                super::html_escape(&d.parentesco),
                super::html_escape(&d.cpf_cliente),
                super::html_escape(&d.data_nasc),
                link(&format!("/dependentes/{}", d.id), "detalhes"),
            ]
        })
        .collect();

    let mut body = render_table(&["Nome", "Parentesco", "Cliente", "Nascimento", ""], &rows);
    body.push_str(&format!(
        "\n<p>{}</p>",
        link("/dependentes/cadastrar", "Cadastrar dependente")
    ));

    Ok(PageResult::page("Dependentes", body))
}

pub fn show(conn: &Connection, identity: Option<&Identity>, raw_id: &str) -> Result<PageResult> {
    let Ok(id) = parse_id(raw_id) else {
        return Ok(PageResult::NotFound);
    };

    let Some(dependente) = dependentes::get_by_id(conn, id)? else {
        return Ok(PageResult::NotFound);
    };

    let can_edit = has_permission(allow::DEPENDENTE_EDIT, identity);
    let can_delete = has_permission(allow::DEPENDENTE_DELETE, identity);

    let cliente = clientes::get_nome_by_cpf(conn, &dependente.cpf_cliente)?
        .map(|nome| link(&format!("/clientes/{}", dependente.cpf_cliente), &nome))
        .unwrap_or_else(|| super::html_escape(&dependente.cpf_cliente));

    let mut body = format!(
        "<dl>\n<dt>Nome</dt><dd>{}</dd>\n<dt>Parentesco</dt><dd>{}</dd>\n<dt>Cliente</dt><dd>{}</dd>\n<dt>Nascimento</dt><dd>{}</dd>\n</dl>",
        super::html_escape(&dependente.nome),
        super::html_escape(&dependente.parentesco),
        cliente,
        super::html_escape(&dependente.data_nasc),
    );

    if can_edit {
        body.push_str(&format!(
            "\n<p>{}</p>",
            link(&format!("/dependentes/{}/editar", dependente.id), "Editar")
        ));
    }
    if can_delete {
        body.push_str(&format!(
            "\n<form method=\"post\" action=\"/api/dependentes/delete\">{}<button type=\"submit\">Excluir</button></form>",
            render_hidden("id", &dependente.id.to_string())
        ));
    }

    Ok(PageResult::page(dependente.nome.clone(), body))
}

pub fn create(conn: &Connection, identity: Option<&Identity>) -> Result<PageResult> {
    if require_identity(identity, allow::DEPENDENTE_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let state = FormState::new();
    Ok(PageResult::page(
        "Cadastrar dependente",
        render_dependente_form(conn, &state, false)?,
    ))
}

pub fn edit(conn: &Connection, identity: Option<&Identity>, raw_id: &str) -> Result<PageResult> {
    if require_identity(identity, allow::DEPENDENTE_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let Ok(id) = parse_id(raw_id) else {
        return Ok(PageResult::NotFound);
    };

    let Some(dependente) = dependentes::get_by_id(conn, id)? else {
        return Ok(PageResult::NotFound);
    };

    let Ok(defaults) = crate::schema::prune_dependente(&dependente) else {
        return Ok(PageResult::NotFound);
    };

    let state = FormState::seed(&defaults);
    Ok(PageResult::page(
        format!("Editar {}", dependente.nome),
        render_dependente_form(conn, &state, true)?,
    ))
}

pub fn upsert(conn: &Connection, identity: Option<&Identity>, payload: &Value) -> MutationResponse {
    if let Err(err) = require_identity(identity, allow::DEPENDENTE_EDIT) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let dispatcher = Dispatcher::new();
    let mut navigator = Navigator::new();
    let id_from_payload = parse_id_field(payload, "id");

    let outcome = dispatcher.submit(
        payload,
        validate_dependente_form,
        |form| dependentes::upsert(conn, form),
        |result, nav| match result {
            UpsertOutcome::Created { id } => nav.push(&format!("/dependentes/{}", id)),
            UpsertOutcome::Updated { affected } if *affected > 0 => {
                if let Some(id) = id_from_payload {
                    nav.push(&format!("/dependentes/{}", id));
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
    if let Err(err) = require_identity(identity, allow::DEPENDENTE_DELETE) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let Some(id) = parse_id_field(payload, "id") else {
        return MutationResponse::NotFound;
    };

    match dependentes::delete(conn, id) {
        Ok(0) => MutationResponse::NotFound,
        Ok(affected) => MutationResponse::Ok {
            data: json!({ "affected": affected, "redirect": "/dependentes" }),
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
    fn test_show_malformed_id_is_not_found() {
        let conn = test_conn();
        assert_eq!(show(&conn, None, "dep").unwrap(), PageResult::NotFound);
        assert_eq!(show(&conn, None, "999").unwrap(), PageResult::NotFound);
    }

    #[test]
    fn test_show_links_cliente() {
        let conn = test_conn();

        let PageResult::Page(page) = show(&conn, None, "1").unwrap() else {
            panic!("expected page");
        };
        assert_eq!(page.title, "Pedro Souza");
        assert!(page.body.contains("/clientes/12345678901"));
    }

    #[test]
    fn test_atendente_can_edit_but_not_delete() {
        let conn = test_conn();
        let atendente = identity(Role::Atendente);

        let resp = upsert(
            &conn,
            Some(&atendente),
            &json!({
                "id": 1,
                "cpf_cliente": "12345678901",
                "nome": "Pedro Souza Filho",
                "data_nasc": "2015-06-20",
                "parentesco": "filho",
                "create": false,
            }),
        );
        assert!(matches!(resp, MutationResponse::Ok { .. }));
        assert_eq!(titulo(&conn, "1"), "Pedro Souza Filho");

        let denied = delete(&conn, Some(&atendente), &json!({ "id": 1 }));
        assert!(matches!(denied, MutationResponse::Denied { .. }));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let conn = test_conn();
        let gerente = identity(Role::Gerente);

        assert_eq!(
            delete(&conn, Some(&gerente), &json!({ "id": 999 })),
            MutationResponse::NotFound
        );
        assert_eq!(
            delete(&conn, Some(&gerente), &json!({ "id": "zzz" })),
            MutationResponse::NotFound
        );
    }
}
