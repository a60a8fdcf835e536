// 🏦 Banco Back-Office - Web Server
// Maps the transport-agnostic page controllers onto HTTP: GET routes render
// the document shell around a PageView, POST /api routes answer JSON with a
// status derived from the MutationResponse variant. Sessions ride in the
// `sessao` cookie.

use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use rusqlite::Connection;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use banco_backoffice::forms::{FieldPath, FormState};
use banco_backoffice::pages::{self, html_escape, MutationResponse, PageResult};
use banco_backoffice::permission::Identity;
use banco_backoffice::open_database;
use banco_backoffice::session::SessionStore;

const SESSION_COOKIE: &str = "sessao";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    sessions: SessionStore,
}

// ============================================================================
// PAYLOAD EXTRACTION
// ============================================================================

/// Mutation body: JSON from script clients, urlencoded from plain HTML forms.
/// Form posts arrive flat ("emails.0.email") and are rebuilt into the nested
/// payload the validators expect.
struct Payload(Value);

#[axum::async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);

        if is_json {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?;
            return Ok(Payload(value));
        }

        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;

        let mut form = FormState::new();
        for (name, value) in pairs {
            form.set_value(FieldPath::parse(&name), Value::String(value));
        }
        Ok(Payload(form.normalized()))
    }
}

// ============================================================================
// SESSION COOKIE
// ============================================================================

fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

fn current_identity(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    let token = session_token(headers)?;
    state.sessions.resolve(&token)
}

fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token)
}

fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE)
}

// ============================================================================
// RESPONSE MAPPING
// ============================================================================

fn shell(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<nav><a href=\"/agencias\">Agências</a> | <a href=\"/clientes\">Clientes</a> | <a href=\"/funcionarios\">Funcionários</a> | <a href=\"/contas\">Contas</a> | <a href=\"/dependentes\">Dependentes</a> | <a href=\"/transacoes\">Transações</a> | <a href=\"/login\">Login</a> <form method=\"post\" action=\"/api/logout\" style=\"display:inline\"><button type=\"submit\">Sair</button></form></nav>\n<h1>{}</h1>\n{}\n</body>\n</html>",
        html_escape(title),
        html_escape(title),
        body,
    )
}

/// `nf_title` feeds the document title of the not-found page, so a missing
/// agência still titles the tab "Agência não encontrada".
fn render_page(result: PageResult, nf_title: &str) -> Response {
    match result {
        PageResult::Page(view) => Html(shell(&view.title, &view.body)).into_response(),
        PageResult::NotFound => (
            StatusCode::NOT_FOUND,
            Html(shell(nf_title, "<p>Registro não encontrado.</p>")),
        )
            .into_response(),
        PageResult::Redirect(to) => Redirect::to(&to).into_response(),
    }
}

fn page_response(result: anyhow::Result<PageResult>, nf_title: &str) -> Response {
    match result {
        Ok(page) => render_page(page, nf_title),
        Err(err) => {
            tracing::error!("erro ao montar página: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(shell("Erro", "<p>Erro interno.</p>")),
            )
                .into_response()
        }
    }
}

fn mutation_status(resp: &MutationResponse) -> StatusCode {
    match resp {
        MutationResponse::Ok { .. } => StatusCode::OK,
        MutationResponse::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MutationResponse::NotFound => StatusCode::NOT_FOUND,
        MutationResponse::Denied { .. } => StatusCode::FORBIDDEN,
        MutationResponse::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn mutation_response(resp: MutationResponse) -> Response {
    (mutation_status(&resp), Json(resp)).into_response()
}

// ============================================================================
// PAGE HANDLERS
// ============================================================================

async fn home_page() -> Redirect {
    Redirect::to("/agencias")
}

async fn login_page() -> Response {
    render_page(pages::login::page(), "Login")
}

async fn agencias_list(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    page_response(pages::agencias::list(&conn), "Agências")
}

async fn agencias_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(numero): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::agencias::titulo(&conn, &numero);
    page_response(pages::agencias::show(&conn, identity.as_ref(), &numero), &title)
}

async fn agencias_create(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = current_identity(&state, &headers);
    render_page(pages::agencias::create(identity.as_ref()), "Cadastrar agência")
}

async fn agencias_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(numero): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::agencias::titulo(&conn, &numero);
    page_response(pages::agencias::edit(&conn, identity.as_ref(), &numero), &title)
}

async fn clientes_list(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    page_response(pages::clientes::list(&conn), "Clientes")
}

async fn clientes_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(cpf): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::clientes::titulo(&conn, &cpf);
    page_response(pages::clientes::show(&conn, identity.as_ref(), &cpf), &title)
}

async fn clientes_create() -> Response {
    render_page(pages::clientes::create(), "Cadastrar cliente")
}

async fn clientes_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(cpf): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::clientes::titulo(&conn, &cpf);
    page_response(pages::clientes::edit(&conn, identity.as_ref(), &cpf), &title)
}

async fn funcionarios_list(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    page_response(pages::funcionarios::list(&conn), "Funcionários")
}

async fn funcionarios_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(matricula): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::funcionarios::titulo(&conn, &matricula);
    page_response(
        pages::funcionarios::show(&conn, identity.as_ref(), &matricula),
        &title,
    )
}

async fn funcionarios_create(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    page_response(
        pages::funcionarios::create(&conn, identity.as_ref()),
        "Cadastrar funcionário",
    )
}

async fn funcionarios_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(matricula): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::funcionarios::titulo(&conn, &matricula);
    page_response(
        pages::funcionarios::edit(&conn, identity.as_ref(), &matricula),
        &title,
    )
}

async fn contas_list(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    page_response(pages::contas::list(&conn), "Contas")
}

async fn contas_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(numero): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::contas::titulo(&conn, &numero);
    page_response(pages::contas::show(&conn, identity.as_ref(), &numero), &title)
}

async fn contas_create(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    page_response(pages::contas::create(&conn, identity.as_ref()), "Cadastrar conta")
}

async fn contas_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(numero): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::contas::titulo(&conn, &numero);
    page_response(pages::contas::edit(&conn, identity.as_ref(), &numero), &title)
}

async fn dependentes_list(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    page_response(pages::dependentes::list(&conn), "Dependentes")
}

async fn dependentes_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::dependentes::titulo(&conn, &id);
    page_response(pages::dependentes::show(&conn, identity.as_ref(), &id), &title)
}

async fn dependentes_create(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    page_response(
        pages::dependentes::create(&conn, identity.as_ref()),
        "Cadastrar dependente",
    )
}

async fn dependentes_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::dependentes::titulo(&conn, &id);
    page_response(pages::dependentes::edit(&conn, identity.as_ref(), &id), &title)
}

async fn transacoes_list(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    page_response(pages::transacoes::list(&conn), "Transações")
}

async fn transacoes_show(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::transacoes::titulo(&conn, &id);
    page_response(pages::transacoes::show(&conn, identity.as_ref(), &id), &title)
}

async fn transacoes_create(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    page_response(
        pages::transacoes::create(&conn, identity.as_ref()),
        "Cadastrar transação",
    )
}

async fn transacoes_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    let title = pages::transacoes::titulo(&conn, &id);
    page_response(pages::transacoes::edit(&conn, identity.as_ref(), &id), &title)
}

// ============================================================================
// MUTATION HANDLERS
// ============================================================================

async fn agencias_upsert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::agencias::upsert(&conn, identity.as_ref(), &payload))
}

async fn agencias_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::agencias::delete(&conn, identity.as_ref(), &payload))
}

async fn clientes_upsert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::clientes::upsert(&conn, identity.as_ref(), &payload))
}

async fn clientes_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::clientes::delete(&conn, identity.as_ref(), &payload))
}

async fn funcionarios_upsert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::funcionarios::upsert(&conn, identity.as_ref(), &payload))
}

async fn funcionarios_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::funcionarios::delete(&conn, identity.as_ref(), &payload))
}

async fn contas_upsert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::contas::upsert(&conn, identity.as_ref(), &payload))
}

async fn contas_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::contas::delete(&conn, identity.as_ref(), &payload))
}

async fn dependentes_upsert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::dependentes::upsert(&conn, identity.as_ref(), &payload))
}

async fn dependentes_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::dependentes::delete(&conn, identity.as_ref(), &payload))
}

async fn transacoes_upsert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::transacoes::upsert(&conn, identity.as_ref(), &payload))
}

async fn transacoes_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload,
) -> Response {
    let identity = current_identity(&state, &headers);
    let conn = state.db.lock().unwrap();
    mutation_response(pages::transacoes::delete(&conn, identity.as_ref(), &payload))
}

async fn login_cliente(State(state): State<AppState>, Payload(payload): Payload) -> Response {
    let outcome = {
        let conn = state.db.lock().unwrap();
        pages::login::login_cliente(&conn, &state.sessions, &payload)
    };

    let status = mutation_status(&outcome.response);
    match outcome.token {
        Some(token) => (
            status,
            AppendHeaders([(header::SET_COOKIE, session_cookie(&token))]),
            Json(outcome.response),
        )
            .into_response(),
        None => (status, Json(outcome.response)).into_response(),
    }
}

async fn login_funcionario(State(state): State<AppState>, Payload(payload): Payload) -> Response {
    let outcome = {
        let conn = state.db.lock().unwrap();
        pages::login::login_funcionario(&conn, &state.sessions, &payload)
    };

    let status = mutation_status(&outcome.response);
    match outcome.token {
        Some(token) => (
            status,
            AppendHeaders([(header::SET_COOKIE, session_cookie(&token))]),
            Json(outcome.response),
        )
            .into_response(),
        None => (status, Json(outcome.response)).into_response(),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers);
    let resp = pages::login::logout(&state.sessions, token.as_deref());

    (
        mutation_status(&resp),
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        Json(resp),
    )
        .into_response()
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "banco_server=info,banco_backoffice=info,tower_http=info".into()
            }),
        )
        .init();

    println!("🏦 Banco Back-Office - Servidor Web");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::var("BANCO_DB_PATH").unwrap_or_else(|_| "banco.db".to_string());
    let conn = open_database(std::path::Path::new(&db_path))
        .expect("falha ao abrir o banco de dados");
    println!("✓ Banco de dados: {}", db_path);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        sessions: SessionStore::new(),
    };

    let api = Router::new()
        .route("/agencias/upsert", post(agencias_upsert))
        .route("/agencias/delete", post(agencias_delete))
        .route("/clientes/upsert", post(clientes_upsert))
        .route("/clientes/delete", post(clientes_delete))
        .route("/funcionarios/upsert", post(funcionarios_upsert))
        .route("/funcionarios/delete", post(funcionarios_delete))
        .route("/contas/upsert", post(contas_upsert))
        .route("/contas/delete", post(contas_delete))
        .route("/dependentes/upsert", post(dependentes_upsert))
        .route("/dependentes/delete", post(dependentes_delete))
        .route("/transacoes/upsert", post(transacoes_upsert))
        .route("/transacoes/delete", post(transacoes_delete))
        .route("/login/cliente", post(login_cliente))
        .route("/login/funcionario", post(login_funcionario))
        .route("/logout", post(logout));

    let app = Router::new()
        .route("/", get(home_page))
        .route("/login", get(login_page))
        .route("/agencias", get(agencias_list))
        .route("/agencias/cadastrar", get(agencias_create))
        .route("/agencias/:numero", get(agencias_show))
        .route("/agencias/:numero/editar", get(agencias_edit))
        .route("/clientes", get(clientes_list))
        .route("/clientes/cadastrar", get(clientes_create))
        .route("/clientes/:cpf", get(clientes_show))
        .route("/clientes/:cpf/editar", get(clientes_edit))
        .route("/funcionarios", get(funcionarios_list))
        .route("/funcionarios/cadastrar", get(funcionarios_create))
        .route("/funcionarios/:matricula", get(funcionarios_show))
        .route("/funcionarios/:matricula/editar", get(funcionarios_edit))
        .route("/contas", get(contas_list))
        .route("/contas/cadastrar", get(contas_create))
        .route("/contas/:numero", get(contas_show))
        .route("/contas/:numero/editar", get(contas_edit))
        .route("/dependentes", get(dependentes_list))
        .route("/dependentes/cadastrar", get(dependentes_create))
        .route("/dependentes/:id", get(dependentes_show))
        .route("/dependentes/:id/editar", get(dependentes_edit))
        .route("/transacoes", get(transacoes_list))
        .route("/transacoes/cadastrar", get(transacoes_create))
        .route("/transacoes/:id", get(transacoes_show))
        .route("/transacoes/:id/editar", get(transacoes_edit))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = std::env::var("BANCO_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("falha ao abrir a porta");

    println!("\n🚀 Servidor em http://{}", addr);
    println!("   Páginas: /agencias /clientes /funcionarios /contas /dependentes /transacoes");
    println!("\n   Ctrl+C encerra\n");

    axum::serve(listener, app)
        .await
        .expect("falha ao iniciar o servidor");
}
