use super::{
    link, render_field, render_form, render_hidden, render_table, MutationResponse, PageResult,
};
use crate::dispatch::{DispatchOutcome, Dispatcher, Navigator};
use crate::forms::{cargo_options, FieldKind, FieldPath, FieldSpec, FormState, SelectOption};
use crate::permission::{allow, has_permission, require_identity, Identity};
use crate::queries::{agencias, funcionarios};
use crate::schema::{parse_id, parse_id_field, validate_funcionario_form};
use crate::util::format_currency;
use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

const TITULO_FALLBACK: &str = "Funcionário não encontrado";

pub fn titulo(conn: &Connection, raw_matricula: &str) -> String {
    let Ok(matricula) = parse_id(raw_matricula) else {
        return TITULO_FALLBACK.to_string();
    };

    match funcionarios::get_nome_by_matricula(conn, matricula) {
        Ok(Some(nome)) => nome,
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

fn form_fields(conn: &Connection, editing: bool) -> Result<Vec<FieldSpec>> {
    let mut fields = Vec::new();

    fields.push(
        FieldSpec::new("nome", "Nome", FieldKind::Text)
            .required()
            .with_max_len(80),
    );
    fields.push(
        FieldSpec::new("cargo", "Cargo", FieldKind::Select)
            .required()
            .with_options(cargo_options())
            .with_clear(),
    );
    fields.push(FieldSpec::new("salario", "Salário", FieldKind::Number).required());
    fields.push(
        FieldSpec::new("num_ag", "Agência", FieldKind::Select)
            .required()
            .with_options(agencia_options(conn)?)
            .with_clear(),
    );

    let senha_label = if editing {
        "Senha (em branco mantém a atual)"
    } else {
        "Senha"
    };
    fields.push(FieldSpec::new("senha", senha_label, FieldKind::Password).with_max_len(80));

    Ok(fields)
}

fn render_funcionario_form(conn: &Connection, state: &FormState, editing: bool) -> Result<String> {
    let mut body = String::new();

    body.push_str(&render_hidden("create", if editing { "false" } else { "true" }));
    if editing {
        body.push_str(&render_hidden(
            "matricula",
            &state.get_str(&FieldPath::key("matricula")),
        ));
    }
    for spec in form_fields(conn, editing)? {
        body.push_str(&render_field(&spec, state));
    }

    Ok(render_form("/api/funcionarios/upsert", &body, "Salvar"))
}

pub fn list(conn: &Connection) -> Result<PageResult> {
    let funcionarios = funcionarios::get_all(conn)?;

    let rows: Vec<Vec<String>> = funcionarios
        .iter()
        .map(|f| {
            vec![
                f.matricula.to_string(),
                super::html_escape(&f.nome),
                super::html_escape(&f.cargo),
                format_currency(f.salario),
                link(&format!("/funcionarios/{}", f.matricula), "detalhes"),
            ]
        })
        .collect();

    let mut body = render_table(&["Matrícula", "Nome", "Cargo", "Salário", ""], &rows);
    body.push_str(&format!(
        "\n<p>{}</p>",
        link("/funcionarios/cadastrar", "Cadastrar funcionário")
    ));

    Ok(PageResult::page("Funcionários", body))
}

pub fn show(
    conn: &Connection,
    identity: Option<&Identity>,
    raw_matricula: &str,
) -> Result<PageResult> {
    let Ok(matricula) = parse_id(raw_matricula) else {
        return Ok(PageResult::NotFound);
    };

    let Some(funcionario) = funcionarios::get_by_matricula(conn, matricula)? else {
        return Ok(PageResult::NotFound);
    };

    let can_edit = has_permission(allow::FUNCIONARIO_EDIT, identity);
    let can_delete = has_permission(allow::FUNCIONARIO_DELETE, identity);

    let agencia = agencias::get_nome_by_numero(conn, funcionario.num_ag)?
        .map(|nome| link(&format!("/agencias/{}", funcionario.num_ag), &nome))
        .unwrap_or_else(|| funcionario.num_ag.to_string());

    let mut body = format!(
        "<dl>\n<dt>Matrícula</dt><dd>{}</dd>\n<dt>Nome</dt><dd>{}</dd>\n<dt>Cargo</dt><dd>{}</dd>\n<dt>Salário</dt><dd>{}</dd>\n<dt>Agência</dt><dd>{}</dd>\n</dl>",
        funcionario.matricula,
        super::html_escape(&funcionario.nome),
        super::html_escape(&funcionario.cargo),
        format_currency(funcionario.salario),
        agencia,
    );

    if can_edit {
        body.push_str(&format!(
            "\n<p>{}</p>",
            link(
                &format!("/funcionarios/{}/editar", funcionario.matricula),
                "Editar"
            )
        ));
    }
    if can_delete {
        body.push_str(&format!(
            "\n<form method=\"post\" action=\"/api/funcionarios/delete\">{}<button type=\"submit\">Excluir</button></form>",
            render_hidden("matricula", &funcionario.matricula.to_string())
        ));
    }

    Ok(PageResult::page(funcionario.nome.clone(), body))
}

pub fn create(conn: &Connection, identity: Option<&Identity>) -> Result<PageResult> {
    if require_identity(identity, allow::FUNCIONARIO_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let state = FormState::new();
    Ok(PageResult::page(
        "Cadastrar funcionário",
        render_funcionario_form(conn, &state, false)?,
    ))
}

pub fn edit(
    conn: &Connection,
    identity: Option<&Identity>,
    raw_matricula: &str,
) -> Result<PageResult> {
    if require_identity(identity, allow::FUNCIONARIO_EDIT).is_err() {
        return Ok(PageResult::Redirect("/login".to_string()));
    }

    let Ok(matricula) = parse_id(raw_matricula) else {
        return Ok(PageResult::NotFound);
    };

    let Some(funcionario) = funcionarios::get_by_matricula(conn, matricula)? else {
        return Ok(PageResult::NotFound);
    };

    let Ok(defaults) = crate::schema::prune_funcionario(&funcionario) else {
        return Ok(PageResult::NotFound);
    };

    let state = FormState::seed(&defaults);
    Ok(PageResult::page(
        format!("Editar {}", funcionario.nome),
        render_funcionario_form(conn, &state, true)?,
    ))
}

pub fn upsert(conn: &Connection, identity: Option<&Identity>, payload: &Value) -> MutationResponse {
    if let Err(err) = require_identity(identity, allow::FUNCIONARIO_EDIT) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let dispatcher = Dispatcher::new();
    let mut navigator = Navigator::new();
    let matricula_from_payload = parse_id_field(payload, "matricula");

    let outcome = dispatcher.submit(
        payload,
        validate_funcionario_form,
        |form| funcionarios::upsert(conn, form),
        |result, nav| match result {
            crate::queries::UpsertOutcome::Created { id } => {
                nav.push(&format!("/funcionarios/{}", id));
            }
            crate::queries::UpsertOutcome::Updated { affected } if *affected > 0 => {
                if let Some(matricula) = matricula_from_payload {
                    nav.push(&format!("/funcionarios/{}", matricula));
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
    if let Err(err) = require_identity(identity, allow::FUNCIONARIO_DELETE) {
        return MutationResponse::Denied {
            message: err.to_string(),
        };
    }

    let Some(matricula) = parse_id_field(payload, "matricula") else {
        return MutationResponse::NotFound;
    };

    match funcionarios::delete(conn, matricula) {
        Ok(0) => MutationResponse::NotFound,
        Ok(affected) => MutationResponse::Ok {
            data: json!({ "affected": affected, "redirect": "/funcionarios" }),
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
    fn test_show_malformed_matricula_is_not_found() {
        let conn = test_conn();
        assert_eq!(show(&conn, None, "x1").unwrap(), PageResult::NotFound);
        assert_eq!(show(&conn, None, "999").unwrap(), PageResult::NotFound);
    }

    #[test]
    fn test_show_links_agencia() {
        let conn = test_conn();

        let PageResult::Page(page) = show(&conn, None, "1").unwrap() else {
            panic!("expected page");
        };
        assert_eq!(page.title, "Ana Pereira");
        assert!(page.body.contains("/agencias/10"));
    }

    #[test]
    fn test_create_generates_matricula_and_redirects() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        let resp = upsert(
            &conn,
            Some(&dba),
            &json!({
                "nome": "Novo Colega",
                "cargo": "atendente",
                "salario": 3500.0,
                "num_ag": 10,
                "senha": "senha123",
                "create": true,
            }),
        );
        let MutationResponse::Ok { data } = resp else {
            panic!("expected ok, got {:?}", resp);
        };
        let id = data["result"]["id"].as_i64().unwrap();
        assert_eq!(data["redirect"], format!("/funcionarios/{}", id));
    }

    #[test]
    fn test_upsert_denied_for_gerente() {
        let conn = test_conn();
        let gerente = identity(Role::Gerente);

        let resp = upsert(
            &conn,
            Some(&gerente),
            &json!({
                "matricula": 1,
                "nome": "Ana Pereira",
                "cargo": "dba",
                "salario": 9000.0,
                "num_ag": 10,
                "create": false,
            }),
        );
        assert!(matches!(resp, MutationResponse::Denied { .. }));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        assert_eq!(
            delete(&conn, Some(&dba), &json!({ "matricula": 999 })),
            MutationResponse::NotFound
        );
    }

    #[test]
    fn test_edit_seeds_current_values() {
        let conn = test_conn();
        let dba = identity(Role::Dba);

        let PageResult::Page(page) = edit(&conn, Some(&dba), "1").unwrap() else {
            panic!("expected page");
        };
        assert!(page.body.contains("value=\"Ana Pereira\""));
        assert!(page.body.contains("name=\"matricula\""));
    }
}
