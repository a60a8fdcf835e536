// 🔑 Session Store - opaque login tokens resolved to identities
// Tokens live in memory; a restart logs everyone out. Senhas are checked
// against the stored SHA-256 digest, never kept in clear.

use crate::db::hash_senha;
use crate::permission::{Identity, Role};
use crate::queries::{clientes, funcionarios, QueryError};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

// ============================================================================
// ERRORS
// ============================================================================

/// Login failure. Credential mismatches use a fixed message so the response
/// does not reveal whether the id exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub message: String,
}

impl AuthError {
    fn invalid_cliente() -> Self {
        AuthError {
            message: "CPF ou senha inválidos".to_string(),
        }
    }

    fn invalid_funcionario() -> Self {
        AuthError {
            message: "matrícula ou senha inválidas".to_string(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AuthError {}

impl From<QueryError> for AuthError {
    fn from(err: QueryError) -> Self {
        AuthError {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Identity>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Issue a fresh opaque token for an already-verified identity.
    pub fn issue(&self, identity: Identity) -> String {
        let token = Uuid::new_v4().to_string();

        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(token.clone(), identity);

        token
    }

    /// Token → identity; `None` for unknown or expired-by-logout tokens.
    pub fn resolve(&self, token: &str) -> Option<Identity> {
        let sessions = self.sessions.read().unwrap();
        sessions.get(token).cloned()
    }

    /// Drop the session. Returns whether a session existed.
    pub fn logout(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(token).is_some()
    }

    pub fn login_cliente(
        &self,
        conn: &Connection,
        cpf: &str,
        senha: &str,
    ) -> Result<String, AuthError> {
        let Some(stored) = clientes::get_senha_hash(conn, cpf)? else {
            return Err(AuthError::invalid_cliente());
        };

        if stored != hash_senha(senha) {
            return Err(AuthError::invalid_cliente());
        }

        let Some(nome) = clientes::get_nome_by_cpf(conn, cpf)? else {
            return Err(AuthError::invalid_cliente());
        };

        Ok(self.issue(Identity {
            id: cpf.to_string(),
            nome,
            role: Role::Cliente,
        }))
    }

    pub fn login_funcionario(
        &self,
        conn: &Connection,
        matricula: i64,
        senha: &str,
    ) -> Result<String, AuthError> {
        let Some(stored) = funcionarios::get_senha_hash(conn, matricula)? else {
            return Err(AuthError::invalid_funcionario());
        };

        if stored != hash_senha(senha) {
            return Err(AuthError::invalid_funcionario());
        }

        let Some(funcionario) = funcionarios::get_by_matricula(conn, matricula)? else {
            return Err(AuthError::invalid_funcionario());
        };

        let Some(role) = Role::from_cargo(&funcionario.cargo) else {
            return Err(AuthError {
                message: "cargo sem papel de acesso".to_string(),
            });
        };

        Ok(self.issue(Identity {
            id: matricula.to_string(),
            nome: funcionario.nome,
            role,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_demo_data, setup_database};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_demo_data(&conn).unwrap();
        conn
    }

    #[test]
    fn test_login_funcionario_maps_cargo_to_role() {
        let conn = test_conn();
        let store = SessionStore::new();

        // seeded matrículas start at 1 with the dba
        let token = store.login_funcionario(&conn, 1, "admin123").unwrap();
        let identity = store.resolve(&token).unwrap();

        assert_eq!(identity.role, Role::Dba);
        assert_eq!(identity.nome, "Ana Pereira");
        assert_eq!(identity.id, "1");
    }

    #[test]
    fn test_login_cliente() {
        let conn = test_conn();
        let store = SessionStore::new();

        let token = store
            .login_cliente(&conn, "12345678901", "cliente123")
            .unwrap();
        let identity = store.resolve(&token).unwrap();

        assert_eq!(identity.role, Role::Cliente);
        assert_eq!(identity.id, "12345678901");
    }

    #[test]
    fn test_wrong_senha_and_unknown_id_look_alike() {
        let conn = test_conn();
        let store = SessionStore::new();

        let wrong = store
            .login_cliente(&conn, "12345678901", "errada")
            .unwrap_err();
        let missing = store
            .login_cliente(&conn, "00000000000", "qualquer")
            .unwrap_err();

        assert_eq!(wrong, missing);
    }

    #[test]
    fn test_logout_invalidates_token() {
        let store = SessionStore::new();

        let token = store.issue(Identity {
            id: "1".to_string(),
            nome: "Teste".to_string(),
            role: Role::Gerente,
        });

        assert!(store.resolve(&token).is_some());
        assert!(store.logout(&token));
        assert!(store.resolve(&token).is_none());
        assert!(!store.logout(&token));
    }

    #[test]
    fn test_tokens_are_unique_per_login() {
        let conn = test_conn();
        let store = SessionStore::new();

        let t1 = store.login_funcionario(&conn, 1, "admin123").unwrap();
        let t2 = store.login_funcionario(&conn, 1, "admin123").unwrap();

        assert_ne!(t1, t2);
    }
}
