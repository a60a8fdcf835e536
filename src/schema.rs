// 📐 Schema Validator - per-entity validation and coercion
// Raw route segments and form payloads either coerce into typed values or
// come back as field-level failures. Malformed input never panics.

use crate::queries::agencias::Agencia;
use crate::queries::clientes::Cliente;
use crate::queries::contas::Conta;
use crate::queries::dependentes::Dependente;
use crate::queries::funcionarios::Funcionario;
use crate::queries::transacoes::Transacao;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// FIXED DOMAINS
// ============================================================================

/// Brazilian state abbreviations, the only values accepted for UF fields.
pub const UFS: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS",
    "MG", "PA", "PB", "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC",
    "SP", "SE", "TO",
];

/// Staff roles a funcionário can hold (`cliente` is never a cargo).
pub const CARGOS: [&str; 3] = ["dba", "gerente", "atendente"];

/// Account types.
pub const TIPOS_CONTA: [&str; 3] = ["corrente", "poupanca", "salario"];

/// Transaction types.
pub const TIPOS_TRANSACAO: [&str; 4] = ["deposito", "saque", "transferencia", "pagamento"];

// ============================================================================
// VALIDATION FAILURE
// ============================================================================

/// One invalid field: which field and why. Array entries use the dotted
/// path (`emails.0.email`) so the error lands next to the right input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

/// Validation outcome for a whole form: the typed payload, or every invalid
/// field at once (never just the first).
pub type FormResult<T> = Result<T, Vec<FieldError>>;

// ============================================================================
// ROUTE SEGMENT COERCION
// ============================================================================

/// Coerce a decimal numeric string (a URL segment) into an id.
///
/// Rejects empty input, signs, non-digits and values that do not fit an
/// `i64`. Invalid segments resolve to not-found at the page level, so this
/// returns an error value instead of panicking.
pub fn parse_id(raw: &str) -> Result<i64, FieldError> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(FieldError::new("id", "obrigatório"));
    }

    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::new("id", "deve ser um número"));
    }

    raw.parse::<i64>()
        .map_err(|_| FieldError::new("id", "fora do intervalo"))
}

/// Coerce a CPF route segment: exactly 11 digits.
pub fn parse_cpf(raw: &str) -> Result<String, FieldError> {
    let raw = raw.trim();

    if raw.len() != 11 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::new("cpf", "deve conter 11 dígitos"));
    }

    Ok(raw.to_string())
}

/// Id coercion for mutation payloads (the delete endpoints), same rules as
/// `parse_id` but over a JSON field. `None` maps to not-found upstream.
pub fn parse_id_field(payload: &Value, name: &str) -> Option<i64> {
    field(payload, name).and_then(as_i64)
}

/// CPF coercion for mutation payloads.
pub fn parse_cpf_field(payload: &Value, name: &str) -> Option<String> {
    field(payload, name)
        .and_then(as_string)
        .filter(|cpf| cpf.len() == 11 && cpf.bytes().all(|b| b.is_ascii_digit()))
}

// ============================================================================
// PAYLOAD FIELD HELPERS
// ============================================================================

fn field<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    payload.get(name).filter(|v| !v.is_null())
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse::<i64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Required string field with a max length.
fn req_str(payload: &Value, name: &str, max: usize, errors: &mut Vec<FieldError>) -> String {
    match field(payload, name).and_then(as_string) {
        Some(s) if s.is_empty() => {
            errors.push(FieldError::new(name, "obrigatório"));
            String::new()
        }
        Some(s) if s.chars().count() > max => {
            errors.push(FieldError::new(name, format!("máximo de {} caracteres", max)));
            s
        }
        Some(s) => s,
        None => {
            errors.push(FieldError::new(name, "obrigatório"));
            String::new()
        }
    }
}

/// Required digits-only string, optionally of an exact length.
fn req_digits(
    payload: &Value,
    name: &str,
    exact: Option<usize>,
    max: usize,
    errors: &mut Vec<FieldError>,
) -> String {
    let value = req_str(payload, name, max, errors);

    if value.is_empty() {
        return value;
    }

    if !value.bytes().all(|b| b.is_ascii_digit()) {
        errors.push(FieldError::new(name, "somente números"));
    } else if let Some(len) = exact {
        if value.len() != len {
            errors.push(FieldError::new(name, format!("deve conter {} dígitos", len)));
        }
    }

    value
}

/// Required integer field, non-negative.
fn req_int(payload: &Value, name: &str, errors: &mut Vec<FieldError>) -> i64 {
    match field(payload, name).and_then(as_i64) {
        Some(n) if n >= 0 => n,
        Some(_) => {
            errors.push(FieldError::new(name, "deve ser positivo"));
            0
        }
        None => {
            errors.push(FieldError::new(name, "deve ser um número"));
            0
        }
    }
}

/// Required monetary field, finite and non-negative.
fn req_money(payload: &Value, name: &str, errors: &mut Vec<FieldError>) -> f64 {
    match field(payload, name).and_then(as_f64) {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(_) => {
            errors.push(FieldError::new(name, "valor inválido"));
            0.0
        }
        None => {
            errors.push(FieldError::new(name, "deve ser um número"));
            0.0
        }
    }
}

/// Required member of a fixed domain (UFs, cargos, tipos).
fn req_member(
    payload: &Value,
    name: &str,
    domain: &[&str],
    errors: &mut Vec<FieldError>,
) -> String {
    let value = req_str(payload, name, 80, errors);

    if !value.is_empty() && !domain.contains(&value.as_str()) {
        errors.push(FieldError::new(name, "valor fora do domínio"));
    }

    value
}

/// Required ISO date (YYYY-MM-DD).
fn req_date(payload: &Value, name: &str, errors: &mut Vec<FieldError>) -> String {
    let value = req_str(payload, name, 10, errors);

    if !value.is_empty() && NaiveDate::parse_from_str(&value, "%Y-%m-%d").is_err() {
        errors.push(FieldError::new(name, "data inválida"));
    }

    value
}

/// Required timestamp, `YYYY-MM-DDTHH:MM[:SS]` as datetime-local inputs emit.
fn req_datetime(payload: &Value, name: &str, errors: &mut Vec<FieldError>) -> String {
    let value = req_str(payload, name, 19, errors);

    if !value.is_empty()
        && NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S").is_err()
        && NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M").is_err()
    {
        errors.push(FieldError::new(name, "data/hora inválida"));
    }

    value
}

/// Optional senha: empty or absent means "unchanged"; when present it must
/// have a minimum length. Never echoed back by the prune variants.
fn opt_senha(payload: &Value, errors: &mut Vec<FieldError>) -> Option<String> {
    match field(payload, "senha").and_then(as_string) {
        Some(s) if s.is_empty() => None,
        Some(s) if s.chars().count() < 4 => {
            errors.push(FieldError::new("senha", "mínimo de 4 caracteres"));
            None
        }
        Some(s) if s.chars().count() > 80 => {
            errors.push(FieldError::new("senha", "máximo de 80 caracteres"));
            None
        }
        Some(s) => Some(s),
        None => None,
    }
}

/// Form state serializes the create flag as a bool or as the string "true".
pub fn flag_create(payload: &Value) -> bool {
    match payload.get("create") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text == "true",
        _ => false,
    }
}

// ============================================================================
// AGÊNCIA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgenciaForm {
    pub num_ag: i64,
    pub nome_ag: String,
    pub cidade_ag: String,
    pub sal_total: f64,
    pub create: bool,
}

pub fn validate_agencia_form(payload: &Value) -> FormResult<AgenciaForm> {
    let mut errors = Vec::new();

    let num_ag = req_int(payload, "num_ag", &mut errors);
    let nome_ag = req_str(payload, "nome_ag", 80, &mut errors);
    let cidade_ag = req_str(payload, "cidade_ag", 80, &mut errors);
    let sal_total = req_money(payload, "sal_total", &mut errors);
    let create = flag_create(payload);

    if errors.is_empty() {
        Ok(AgenciaForm {
            num_ag,
            nome_ag,
            cidade_ag,
            sal_total,
            create,
        })
    } else {
        Err(errors)
    }
}

// ============================================================================
// CLIENTE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContatoEmail {
    pub email: String,
    pub tipo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContatoTelefone {
    pub telefone: String,
    pub tipo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClienteForm {
    pub cpf: String,
    pub nome: String,
    pub data_nasc: String,
    pub rg_num: String,
    pub rg_orgao_emissor: String,
    pub rg_uf: String,
    pub end_tipo: String,
    pub end_logradouro: String,
    pub end_numero: i64,
    pub end_bairro: String,
    pub end_cidade: String,
    pub end_estado: String,
    pub end_cep: String,
    pub emails: Vec<ContatoEmail>,
    pub telefones: Vec<ContatoTelefone>,
    pub senha: Option<String>,
    pub create: bool,
}

fn validate_emails(payload: &Value, errors: &mut Vec<FieldError>) -> Vec<ContatoEmail> {
    let mut out = Vec::new();

    let Some(entries) = payload.get("emails").and_then(Value::as_array) else {
        return out;
    };

    for (i, entry) in entries.iter().enumerate() {
        let email = field(entry, "email").and_then(as_string).unwrap_or_default();
        let tipo = field(entry, "tipo").and_then(as_string).unwrap_or_default();

        // the form keeps one blank row around; blank rows are not data
        if email.is_empty() && tipo.is_empty() {
            continue;
        }

        if email.is_empty() {
            errors.push(FieldError::new(format!("emails.{}.email", i), "obrigatório"));
            continue;
        }
        if email.chars().count() > 254 {
            errors.push(FieldError::new(
                format!("emails.{}.email", i),
                "máximo de 254 caracteres",
            ));
        }
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            errors.push(FieldError::new(format!("emails.{}.email", i), "e-mail inválido"));
        }
        if tipo.chars().count() > 80 {
            errors.push(FieldError::new(
                format!("emails.{}.tipo", i),
                "máximo de 80 caracteres",
            ));
        }

        out.push(ContatoEmail { email, tipo });
    }

    out
}

fn validate_telefones(payload: &Value, errors: &mut Vec<FieldError>) -> Vec<ContatoTelefone> {
    let mut out = Vec::new();

    let Some(entries) = payload.get("telefones").and_then(Value::as_array) else {
        return out;
    };

    for (i, entry) in entries.iter().enumerate() {
        let telefone = field(entry, "telefone").and_then(as_string).unwrap_or_default();
        let tipo = field(entry, "tipo").and_then(as_string).unwrap_or_default();

        if telefone.is_empty() && tipo.is_empty() {
            continue;
        }

        if telefone.is_empty() {
            errors.push(FieldError::new(
                format!("telefones.{}.telefone", i),
                "obrigatório",
            ));
            continue;
        }
        if telefone.len() > 15 || !telefone.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(FieldError::new(
                format!("telefones.{}.telefone", i),
                "somente números, máximo de 15 dígitos",
            ));
        }
        if tipo.chars().count() > 80 {
            errors.push(FieldError::new(
                format!("telefones.{}.tipo", i),
                "máximo de 80 caracteres",
            ));
        }

        out.push(ContatoTelefone { telefone, tipo });
    }

    out
}

pub fn validate_cliente_form(payload: &Value) -> FormResult<ClienteForm> {
    let mut errors = Vec::new();

    let cpf = req_digits(payload, "cpf", Some(11), 11, &mut errors);
    let nome = req_str(payload, "nome", 80, &mut errors);
    let data_nasc = req_date(payload, "data_nasc", &mut errors);
    let rg_num = req_digits(payload, "rg_num", None, 15, &mut errors);
    let rg_orgao_emissor = req_str(payload, "rg_orgao_emissor", 80, &mut errors);
    let rg_uf = req_member(payload, "rg_uf", &UFS, &mut errors);
    let end_tipo = req_str(payload, "end_tipo", 80, &mut errors);
    let end_logradouro = req_str(payload, "end_logradouro", 80, &mut errors);
    let end_numero = req_int(payload, "end_numero", &mut errors);
    let end_bairro = req_str(payload, "end_bairro", 80, &mut errors);
    let end_cidade = req_str(payload, "end_cidade", 80, &mut errors);
    let end_estado = req_member(payload, "end_estado", &UFS, &mut errors);
    let end_cep = req_digits(payload, "end_cep", Some(8), 8, &mut errors);
    let emails = validate_emails(payload, &mut errors);
    let telefones = validate_telefones(payload, &mut errors);
    let senha = opt_senha(payload, &mut errors);
    let create = flag_create(payload);

    if errors.is_empty() {
        Ok(ClienteForm {
            cpf,
            nome,
            data_nasc,
            rg_num,
            rg_orgao_emissor,
            rg_uf,
            end_tipo,
            end_logradouro,
            end_numero,
            end_bairro,
            end_cidade,
            end_estado,
            end_cep,
            emails,
            telefones,
            senha,
            create,
        })
    } else {
        Err(errors)
    }
}

// ============================================================================
// FUNCIONÁRIO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncionarioForm {
    /// Absent on create (the matrícula is generated by the store).
    pub matricula: Option<i64>,
    pub nome: String,
    pub cargo: String,
    pub salario: f64,
    pub num_ag: i64,
    pub senha: Option<String>,
    pub create: bool,
}

pub fn validate_funcionario_form(payload: &Value) -> FormResult<FuncionarioForm> {
    let mut errors = Vec::new();

    let create = flag_create(payload);
    let matricula = if create {
        None
    } else {
        match field(payload, "matricula").and_then(as_i64) {
            Some(m) if m > 0 => Some(m),
            _ => {
                errors.push(FieldError::new("matricula", "obrigatório"));
                None
            }
        }
    };
    let nome = req_str(payload, "nome", 80, &mut errors);
    let cargo = req_member(payload, "cargo", &CARGOS, &mut errors);
    let salario = req_money(payload, "salario", &mut errors);
    let num_ag = req_int(payload, "num_ag", &mut errors);
    let senha = opt_senha(payload, &mut errors);

    if errors.is_empty() {
        Ok(FuncionarioForm {
            matricula,
            nome,
            cargo,
            salario,
            num_ag,
            senha,
            create,
        })
    } else {
        Err(errors)
    }
}

// ============================================================================
// CONTA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContaForm {
    /// Absent on create (account numbers are generated by the store).
    pub num_conta: Option<i64>,
    pub tipo: String,
    pub saldo: f64,
    pub num_ag: i64,
    pub cpf_cliente: String,
    pub create: bool,
}

pub fn validate_conta_form(payload: &Value) -> FormResult<ContaForm> {
    let mut errors = Vec::new();

    let create = flag_create(payload);
    let num_conta = if create {
        None
    } else {
        match field(payload, "num_conta").and_then(as_i64) {
            Some(n) if n > 0 => Some(n),
            _ => {
                errors.push(FieldError::new("num_conta", "obrigatório"));
                None
            }
        }
    };
    let tipo = req_member(payload, "tipo", &TIPOS_CONTA, &mut errors);
    let saldo = req_money(payload, "saldo", &mut errors);
    let num_ag = req_int(payload, "num_ag", &mut errors);
    let cpf_cliente = req_digits(payload, "cpf_cliente", Some(11), 11, &mut errors);

    if errors.is_empty() {
        Ok(ContaForm {
            num_conta,
            tipo,
            saldo,
            num_ag,
            cpf_cliente,
            create,
        })
    } else {
        Err(errors)
    }
}

// ============================================================================
// DEPENDENTE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependenteForm {
    pub id: Option<i64>,
    pub cpf_cliente: String,
    pub nome: String,
    pub data_nasc: String,
    pub parentesco: String,
    pub create: bool,
}

pub fn validate_dependente_form(payload: &Value) -> FormResult<DependenteForm> {
    let mut errors = Vec::new();

    let create = flag_create(payload);
    let id = if create {
        None
    } else {
        match field(payload, "id").and_then(as_i64) {
            Some(n) if n > 0 => Some(n),
            _ => {
                errors.push(FieldError::new("id", "obrigatório"));
                None
            }
        }
    };
    let cpf_cliente = req_digits(payload, "cpf_cliente", Some(11), 11, &mut errors);
    let nome = req_str(payload, "nome", 80, &mut errors);
    let data_nasc = req_date(payload, "data_nasc", &mut errors);
    let parentesco = req_str(payload, "parentesco", 40, &mut errors);

    if errors.is_empty() {
        Ok(DependenteForm {
            id,
            cpf_cliente,
            nome,
            data_nasc,
            parentesco,
            create,
        })
    } else {
        Err(errors)
    }
}

// ============================================================================
// TRANSAÇÃO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransacaoForm {
    pub id: Option<i64>,
    pub num_conta: i64,
    pub tipo: String,
    pub valor: f64,
    pub data_hora: String,
    pub create: bool,
}

pub fn validate_transacao_form(payload: &Value) -> FormResult<TransacaoForm> {
    let mut errors = Vec::new();

    let create = flag_create(payload);
    let id = if create {
        None
    } else {
        match field(payload, "id").and_then(as_i64) {
            Some(n) if n > 0 => Some(n),
            _ => {
                errors.push(FieldError::new("id", "obrigatório"));
                None
            }
        }
    };
    let num_conta = req_int(payload, "num_conta", &mut errors);
    let tipo = req_member(payload, "tipo", &TIPOS_TRANSACAO, &mut errors);
    let valor = match field(payload, "valor").and_then(as_f64) {
        Some(v) if v.is_finite() && v > 0.0 => v,
        Some(_) => {
            errors.push(FieldError::new("valor", "deve ser maior que zero"));
            0.0
        }
        None => {
            errors.push(FieldError::new("valor", "deve ser um número"));
            0.0
        }
    };
    let data_hora = req_datetime(payload, "data_hora", &mut errors);

    if errors.is_empty() {
        Ok(TransacaoForm {
            id,
            num_conta,
            tipo,
            valor,
            data_hora,
            create,
        })
    } else {
        Err(errors)
    }
}

// ============================================================================
// LOGIN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginClienteForm {
    pub cpf: String,
    pub senha: String,
}

pub fn validate_login_cliente(payload: &Value) -> FormResult<LoginClienteForm> {
    let mut errors = Vec::new();

    let cpf = req_digits(payload, "cpf", Some(11), 11, &mut errors);
    let senha = req_str(payload, "senha", 80, &mut errors);

    if errors.is_empty() {
        Ok(LoginClienteForm { cpf, senha })
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginFuncionarioForm {
    pub matricula: i64,
    pub senha: String,
}

pub fn validate_login_funcionario(payload: &Value) -> FormResult<LoginFuncionarioForm> {
    let mut errors = Vec::new();

    let matricula = match field(payload, "matricula").and_then(as_i64) {
        Some(m) if m > 0 => m,
        _ => {
            errors.push(FieldError::new("matricula", "deve ser um número"));
            0
        }
    };
    let senha = req_str(payload, "senha", 80, &mut errors);

    if errors.is_empty() {
        Ok(LoginFuncionarioForm { matricula, senha })
    } else {
        Err(errors)
    }
}

// ============================================================================
// PRUNE - row → edit-form defaults
// ============================================================================
// A stored row only reaches an edit form when every field needed for safe
// display holds a usable value. Partial or corrupted rows fail here and the
// page resolves to not-found instead of rendering a broken form.

fn check_nonempty(value: &str, name: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(name, "ausente"));
    }
}

fn check_digits_exact(value: &str, len: usize, name: &str, errors: &mut Vec<FieldError>) {
    if value.len() != len || !value.bytes().all(|b| b.is_ascii_digit()) {
        errors.push(FieldError::new(name, format!("deve conter {} dígitos", len)));
    }
}

fn check_member(value: &str, domain: &[&str], name: &str, errors: &mut Vec<FieldError>) {
    if !domain.contains(&value) {
        errors.push(FieldError::new(name, "valor fora do domínio"));
    }
}

fn check_date(value: &str, name: &str, errors: &mut Vec<FieldError>) {
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        errors.push(FieldError::new(name, "data inválida"));
    }
}

fn check_datetime(value: &str, name: &str, errors: &mut Vec<FieldError>) {
    if NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_err()
        && NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_err()
    {
        errors.push(FieldError::new(name, "data/hora inválida"));
    }
}

fn check_money(value: f64, name: &str, errors: &mut Vec<FieldError>) {
    if !value.is_finite() || value < 0.0 {
        errors.push(FieldError::new(name, "valor inválido"));
    }
}

pub fn prune_agencia(agencia: &Agencia) -> FormResult<Value> {
    let mut errors = Vec::new();

    check_nonempty(&agencia.nome_ag, "nome_ag", &mut errors);
    check_nonempty(&agencia.cidade_ag, "cidade_ag", &mut errors);
    check_money(agencia.sal_total, "sal_total", &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(json!({
        "num_ag": agencia.num_ag,
        "nome_ag": agencia.nome_ag,
        "cidade_ag": agencia.cidade_ag,
        "sal_total": agencia.sal_total,
    }))
}

pub fn prune_cliente(cliente: &Cliente) -> FormResult<Value> {
    let mut errors = Vec::new();

    check_digits_exact(&cliente.cpf, 11, "cpf", &mut errors);
    check_nonempty(&cliente.nome, "nome", &mut errors);
    check_date(&cliente.data_nasc, "data_nasc", &mut errors);
    check_nonempty(&cliente.rg_num, "rg_num", &mut errors);
    check_nonempty(&cliente.rg_orgao_emissor, "rg_orgao_emissor", &mut errors);
    check_member(&cliente.rg_uf, &UFS, "rg_uf", &mut errors);
    check_nonempty(&cliente.end_tipo, "end_tipo", &mut errors);
    check_nonempty(&cliente.end_logradouro, "end_logradouro", &mut errors);
    check_nonempty(&cliente.end_bairro, "end_bairro", &mut errors);
    check_nonempty(&cliente.end_cidade, "end_cidade", &mut errors);
    check_member(&cliente.end_estado, &UFS, "end_estado", &mut errors);
    check_digits_exact(&cliente.end_cep, 8, "end_cep", &mut errors);
    if cliente.end_numero < 0 {
        errors.push(FieldError::new("end_numero", "deve ser positivo"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // the edit form always renders at least one contact group
    let emails = if cliente.emails.is_empty() {
        json!([{ "email": "", "tipo": "" }])
    } else {
        json!(cliente.emails)
    };
    let telefones = if cliente.telefones.is_empty() {
        json!([{ "telefone": "", "tipo": "" }])
    } else {
        json!(cliente.telefones)
    };

    Ok(json!({
        "cpf": cliente.cpf,
        "nome": cliente.nome,
        "data_nasc": cliente.data_nasc,
        "rg_num": cliente.rg_num,
        "rg_orgao_emissor": cliente.rg_orgao_emissor,
        "rg_uf": cliente.rg_uf,
        "end_tipo": cliente.end_tipo,
        "end_logradouro": cliente.end_logradouro,
        "end_numero": cliente.end_numero,
        "end_bairro": cliente.end_bairro,
        "end_cidade": cliente.end_cidade,
        "end_estado": cliente.end_estado,
        "end_cep": cliente.end_cep,
        "emails": emails,
        "telefones": telefones,
    }))
}

pub fn prune_funcionario(funcionario: &Funcionario) -> FormResult<Value> {
    let mut errors = Vec::new();

    check_nonempty(&funcionario.nome, "nome", &mut errors);
    check_member(&funcionario.cargo, &CARGOS, "cargo", &mut errors);
    check_money(funcionario.salario, "salario", &mut errors);
    if funcionario.num_ag <= 0 {
        errors.push(FieldError::new("num_ag", "ausente"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(json!({
        "matricula": funcionario.matricula,
        "nome": funcionario.nome,
        "cargo": funcionario.cargo,
        "salario": funcionario.salario,
        "num_ag": funcionario.num_ag,
    }))
}

pub fn prune_conta(conta: &Conta) -> FormResult<Value> {
    let mut errors = Vec::new();

    check_member(&conta.tipo, &TIPOS_CONTA, "tipo", &mut errors);
    check_money(conta.saldo, "saldo", &mut errors);
    check_digits_exact(&conta.cpf_cliente, 11, "cpf_cliente", &mut errors);
    if conta.num_ag <= 0 {
        errors.push(FieldError::new("num_ag", "ausente"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(json!({
        "num_conta": conta.num_conta,
        "tipo": conta.tipo,
        "saldo": conta.saldo,
        "num_ag": conta.num_ag,
        "cpf_cliente": conta.cpf_cliente,
    }))
}

pub fn prune_dependente(dependente: &Dependente) -> FormResult<Value> {
    let mut errors = Vec::new();

    check_digits_exact(&dependente.cpf_cliente, 11, "cpf_cliente", &mut errors);
    check_nonempty(&dependente.nome, "nome", &mut errors);
    check_date(&dependente.data_nasc, "data_nasc", &mut errors);
    check_nonempty(&dependente.parentesco, "parentesco", &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(json!({
        "id": dependente.id,
        "cpf_cliente": dependente.cpf_cliente,
        "nome": dependente.nome,
        "data_nasc": dependente.data_nasc,
        "parentesco": dependente.parentesco,
    }))
}

pub fn prune_transacao(transacao: &Transacao) -> FormResult<Value> {
    let mut errors = Vec::new();

    check_member(&transacao.tipo, &TIPOS_TRANSACAO, "tipo", &mut errors);
    check_datetime(&transacao.data_hora, "data_hora", &mut errors);
    if !transacao.valor.is_finite() || transacao.valor <= 0.0 {
        errors.push(FieldError::new("valor", "deve ser maior que zero"));
    }
    if transacao.num_conta <= 0 {
        errors.push(FieldError::new("num_conta", "ausente"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(json!({
        "id": transacao.id,
        "num_conta": transacao.num_conta,
        "tipo": transacao.tipo,
        "valor": transacao.valor,
        "data_hora": transacao.data_hora,
    }))
}

// ============================================================================
// TESTS
// ============================================================================
