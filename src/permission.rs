// 🔐 Permission Service - role checks against per-action allow-lists
// Soft gates (button visibility) resolve to Option; hard gates (mutations,
// edit pages) interrupt with PermissionDenied.

use serde::{Deserialize, Serialize};

// ============================================================================
// ROLES
// ============================================================================

/// Fixed role set. Staff roles come from the funcionário's cargo; `Cliente`
/// is the self-service role and is never a cargo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Dba,
    Gerente,
    Atendente,
    Cliente,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Dba => "dba",
            Role::Gerente => "gerente",
            Role::Atendente => "atendente",
            Role::Cliente => "cliente",
        }
    }

    /// Map a stored cargo to a role. Unknown cargos resolve to no role at
    /// all, which every gate treats as denied.
    pub fn from_cargo(cargo: &str) -> Option<Role> {
        match cargo {
            "dba" => Some(Role::Dba),
            "gerente" => Some(Role::Gerente),
            "atendente" => Some(Role::Atendente),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// The acting user: a funcionário (id = matrícula) or a cliente (id = cpf).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub nome: String,
    pub role: Role,
}

// ============================================================================
// DENIAL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDenied {
    pub required: Vec<Role>,
}

impl std::fmt::Display for PermissionDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "acesso negado")
    }
}

impl std::error::Error for PermissionDenied {}

// ============================================================================
// GATES
// ============================================================================

/// Pure predicate for UI affordances; no session re-fetch. Anonymous is
/// always denied.
pub fn has_permission(allowed: &[Role], identity: Option<&Identity>) -> bool {
    match identity {
        Some(identity) => allowed.contains(&identity.role),
        None => false,
    }
}

/// Soft gate: the identity when its role is allowed, `None` otherwise.
/// Absence is not an error here.
pub fn resolve_identity(current: Option<&Identity>, allowed: &[Role]) -> Option<Identity> {
    current
        .filter(|identity| allowed.contains(&identity.role))
        .cloned()
}

/// Hard gate: same resolution, but failure interrupts the response.
pub fn require_identity(
    current: Option<&Identity>,
    allowed: &[Role],
) -> Result<Identity, PermissionDenied> {
    resolve_identity(current, allowed).ok_or_else(|| PermissionDenied {
        required: allowed.to_vec(),
    })
}

// ============================================================================
// PER-ACTION ALLOW-LISTS
// ============================================================================

/// Every action's allow-list lives here so a page's soft gate and the
/// matching mutation's hard gate always read the same constant.
pub mod allow {
    use super::Role;

    pub const AGENCIA_EDIT: &[Role] = &[Role::Dba];
    pub const AGENCIA_DELETE: &[Role] = &[Role::Dba];

    pub const CLIENTE_EDIT: &[Role] = &[Role::Dba, Role::Gerente, Role::Atendente];
    pub const CLIENTE_DELETE: &[Role] = &[Role::Dba, Role::Gerente];

    pub const FUNCIONARIO_EDIT: &[Role] = &[Role::Dba];
    pub const FUNCIONARIO_DELETE: &[Role] = &[Role::Dba];

    pub const CONTA_EDIT: &[Role] = &[Role::Dba, Role::Gerente];
    pub const CONTA_DELETE: &[Role] = &[Role::Dba, Role::Gerente];

    pub const DEPENDENTE_EDIT: &[Role] = &[Role::Dba, Role::Gerente, Role::Atendente];
    pub const DEPENDENTE_DELETE: &[Role] = &[Role::Dba, Role::Gerente];

    pub const TRANSACAO_EDIT: &[Role] = &[Role::Dba, Role::Gerente, Role::Atendente];
    pub const TRANSACAO_DELETE: &[Role] = &[Role::Dba];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            id: "1".to_string(),
            nome: "Teste".to_string(),
            role,
        }
    }

    #[test]
    fn test_has_permission_truth_table() {
        let dba = identity(Role::Dba);
        let cliente = identity(Role::Cliente);

        assert!(has_permission(&[Role::Dba], Some(&dba)));
        assert!(!has_permission(&[Role::Dba], Some(&cliente)));
        assert!(!has_permission(&[Role::Dba], None));
    }

    #[test]
    fn test_resolve_identity_is_soft() {
        let gerente = identity(Role::Gerente);

        assert!(resolve_identity(Some(&gerente), allow::CONTA_EDIT).is_some());
        assert!(resolve_identity(Some(&gerente), allow::AGENCIA_EDIT).is_none());
        assert!(resolve_identity(None, allow::AGENCIA_EDIT).is_none());
    }

    #[test]
    fn test_require_identity_reports_required_roles() {
        let atendente = identity(Role::Atendente);

        let err = require_identity(Some(&atendente), allow::AGENCIA_EDIT).unwrap_err();
        assert_eq!(err.required, vec![Role::Dba]);

        let ok = require_identity(Some(&atendente), allow::CLIENTE_EDIT).unwrap();
        assert_eq!(ok.role, Role::Atendente);
    }

    #[test]
    fn test_role_cargo_mapping() {
        assert_eq!(Role::from_cargo("dba"), Some(Role::Dba));
        assert_eq!(Role::from_cargo("gerente"), Some(Role::Gerente));
        assert_eq!(Role::from_cargo("cliente"), None);
        assert_eq!(Role::from_cargo("estagiario"), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Dba).unwrap();
        assert_eq!(json, "\"dba\"");

        let back: Role = serde_json::from_str("\"atendente\"").unwrap();
        assert_eq!(back, Role::Atendente);
    }
}
