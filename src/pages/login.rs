use super::{render_field, render_form, MutationResponse, PageResult};
use crate::forms::{FieldKind, FieldSpec, FormState, InputMask};
use crate::schema::{validate_login_cliente, validate_login_funcionario};
use crate::session::SessionStore;
use rusqlite::Connection;
use serde_json::{json, Value};

/// A login response pairs the page-level outcome with the freshly issued
/// session token, which only the HTTP layer turns into a cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub response: MutationResponse,
    pub token: Option<String>,
}

impl LoginOutcome {
    fn granted(token: String) -> Self {
        LoginOutcome {
            response: MutationResponse::Ok {
                data: json!({ "redirect": "/agencias" }),
            },
            token: Some(token),
        }
    }

    fn refused(response: MutationResponse) -> Self {
        LoginOutcome {
            response,
            token: None,
        }
    }
}

pub fn page() -> PageResult {
    let state = FormState::new();

    let mut cliente = String::new();
    cliente.push_str("<h2>Cliente</h2>\n");
    let cpf = FieldSpec::new("cpf", "CPF", FieldKind::Text)
        .required()
        .with_max_len(11)
        .with_mask(InputMask::Digits);
    let senha = FieldSpec::new("senha", "Senha", FieldKind::Password)
        .required()
        .with_max_len(80);
    let mut fields = render_field(&cpf, &state);
    fields.push_str(&render_field(&senha, &state));
    cliente.push_str(&render_form("/api/login/cliente", &fields, "Entrar"));

    let mut funcionario = String::new();
    funcionario.push_str("\n<h2>Funcionário</h2>\n");
    let matricula = FieldSpec::new("matricula", "Matrícula", FieldKind::Number).required();
    let senha = FieldSpec::new("senha", "Senha", FieldKind::Password)
        .required()
        .with_max_len(80);
    let mut fields = render_field(&matricula, &state);
    fields.push_str(&render_field(&senha, &state));
    funcionario.push_str(&render_form("/api/login/funcionario", &fields, "Entrar"));

    PageResult::page("Login", format!("{}{}", cliente, funcionario))
}

pub fn login_cliente(conn: &Connection, store: &SessionStore, payload: &Value) -> LoginOutcome {
    let form = match validate_login_cliente(payload) {
        Ok(form) => form,
        Err(errors) => return LoginOutcome::refused(MutationResponse::Invalid { errors }),
    };

    match store.login_cliente(conn, &form.cpf, &form.senha) {
        Ok(token) => LoginOutcome::granted(token),
        Err(err) => LoginOutcome::refused(MutationResponse::Failed {
            message: err.to_string(),
        }),
    }
}

pub fn login_funcionario(conn: &Connection, store: &SessionStore, payload: &Value) -> LoginOutcome {
    let form = match validate_login_funcionario(payload) {
        Ok(form) => form,
        Err(errors) => return LoginOutcome::refused(MutationResponse::Invalid { errors }),
    };

    match store.login_funcionario(conn, form.matricula, &form.senha) {
        Ok(token) => LoginOutcome::granted(token),
        Err(err) => LoginOutcome::refused(MutationResponse::Failed {
            message: err.to_string(),
        }),
    }
}

/// Logout never fails; an absent or stale token still lands on the login page.
pub fn logout(store: &SessionStore, token: Option<&str>) -> MutationResponse {
    if let Some(token) = token {
        store.logout(token);
    }

    MutationResponse::Ok {
        data: json!({ "redirect": "/login" }),
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

    #[test]
    fn test_page_renders_both_flows() {
        let PageResult::Page(page) = page() else {
            panic!("expected page");
        };
        assert!(page.body.contains("/api/login/cliente"));
        assert!(page.body.contains("/api/login/funcionario"));
        assert!(page.body.contains("type=\"password\""));
    }

    #[test]
    fn test_login_funcionario_issues_resolvable_token() {
        let conn = test_conn();
        let store = SessionStore::new();

        let outcome = login_funcionario(
            &conn,
            &store,
            &json!({ "matricula": "1", "senha": "admin123" }),
        );
        assert!(matches!(outcome.response, MutationResponse::Ok { .. }));

        let token = outcome.token.unwrap();
        let identity = store.resolve(&token).unwrap();
        assert_eq!(identity.role, Role::Dba);
    }

    #[test]
    fn test_login_cliente_wrong_senha_is_failed_without_token() {
        let conn = test_conn();
        let store = SessionStore::new();

        let outcome = login_cliente(
            &conn,
            &store,
            &json!({ "cpf": "12345678901", "senha": "errada" }),
        );
        assert_eq!(outcome.token, None);
        let MutationResponse::Failed { message } = outcome.response else {
            panic!("expected failed");
        };
        assert_eq!(message, "CPF ou senha inválidos");
    }

    #[test]
    fn test_login_cliente_short_cpf_is_invalid() {
        let conn = test_conn();
        let store = SessionStore::new();

        let outcome = login_cliente(&conn, &store, &json!({ "cpf": "123", "senha": "x1234" }));
        assert!(matches!(outcome.response, MutationResponse::Invalid { .. }));
        assert_eq!(outcome.token, None);
    }

    #[test]
    fn test_logout_drops_session_and_redirects() {
        let conn = test_conn();
        let store = SessionStore::new();

        let outcome = login_funcionario(
            &conn,
            &store,
            &json!({ "matricula": "1", "senha": "admin123" }),
        );
        let token = outcome.token.unwrap();

        let resp = logout(&store, Some(&token));
        let MutationResponse::Ok { data } = resp else {
            panic!("expected ok");
        };
        assert_eq!(data["redirect"], "/login");
        assert!(store.resolve(&token).is_none());

        // stale token logs out quietly
        assert!(matches!(
            logout(&store, Some(&token)),
            MutationResponse::Ok { .. }
        ));
    }
}
