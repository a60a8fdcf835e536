// Banco Back-Office - Core Library
// Exposes all modules for use in the CLI, the web server, and tests

pub mod db;
pub mod dispatch;
pub mod forms;
pub mod pages;
pub mod permission;
pub mod queries;
pub mod schema;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use db::{hash_senha, open_database, seed_demo_data, setup_database};
pub use dispatch::{DispatchOutcome, Dispatcher, Navigator};
pub use forms::{
    ArrayField, FieldKind, FieldPath, FieldSpec, FormState, InputMask, SelectOption,
};
pub use pages::{MutationResponse, PageResult, PageView};
pub use permission::{
    has_permission, require_identity, resolve_identity, Identity, PermissionDenied, Role,
};
pub use queries::{QueryError, QueryResult, UpsertOutcome};
pub use schema::{FieldError, FormResult};
pub use session::{AuthError, SessionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
