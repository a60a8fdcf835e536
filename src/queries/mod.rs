// 🗄️ Query Layer - one module per entity, thin wrappers over SQL
// Reads return `Option` for absence; writes return affected-row counts and
// pass constraint failures through with the engine's message intact.

pub mod agencias;
pub mod clientes;
pub mod contas;
pub mod dependentes;
pub mod funcionarios;
pub mod transacoes;

use serde::Serialize;

// ============================================================================
// ERRORS
// ============================================================================

/// Failure surfaced by a query function.
///
/// `NotFound` is reserved for writes that target a missing row. Reads signal
/// absence with `Ok(None)` instead, so a missing row on a page never becomes
/// an error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    NotFound { entity: &'static str },
    Db { message: String },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::NotFound { entity } => write!(f, "{} não encontrado(a)", entity),
            QueryError::Db { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        QueryError::Db {
            message: err.to_string(),
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

// ============================================================================
// UPSERT OUTCOME
// ============================================================================

/// What a write did: a fresh row with its id, or an update with how many
/// rows matched. `Updated { affected: 0 }` means the target id does not
/// exist; the mutation endpoint maps that to not-found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome<K> {
    Created { id: K },
    Updated { affected: usize },
}

impl<K> UpsertOutcome<K> {
    /// True when the write landed on an existing or new row.
    pub fn applied(&self) -> bool {
        match self {
            UpsertOutcome::Created { .. } => true,
            UpsertOutcome::Updated { affected } => *affected > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_is_generic() {
        let err = QueryError::NotFound { entity: "agência" };
        assert_eq!(err.to_string(), "agência não encontrado(a)");
    }

    #[test]
    fn test_db_error_message_passes_through() {
        let err = QueryError::Db {
            message: "FOREIGN KEY constraint failed".to_string(),
        };
        assert_eq!(err.to_string(), "FOREIGN KEY constraint failed");
    }

    #[test]
    fn test_outcome_applied() {
        assert!(UpsertOutcome::Created { id: 1i64 }.applied());
        assert!(UpsertOutcome::<i64>::Updated { affected: 1 }.applied());
        assert!(!UpsertOutcome::<i64>::Updated { affected: 0 }.applied());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let created = UpsertOutcome::Created { id: 10i64 };
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["outcome"], "created");
        assert_eq!(json["id"], 10);
    }
}
