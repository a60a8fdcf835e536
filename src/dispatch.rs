// 🚦 Mutation Dispatcher - validated submits, one in flight at a time
// Sits between a form and whatever executes the write. The mutation is
// never issued for a payload the validator rejected, a second submit while
// one is pending does nothing, and failures come back with the server's
// message untouched.

use crate::schema::{FieldError, FormResult};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

// ============================================================================
// NAVIGATION HANDLE
// ============================================================================

/// Where the success callback may send the user next. The binary maps the
/// recorded target onto an actual redirect; tests read it directly.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Navigator {
    target: Option<String>,
}

impl Navigator {
    pub fn new() -> Self {
        Navigator { target: None }
    }

    /// Last push wins.
    pub fn push(&mut self, route: &str) {
        self.target = Some(route.to_string());
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, PartialEq)]
pub enum DispatchOutcome<R> {
    /// The validator rejected the payload; no mutation call was made.
    Invalid(Vec<FieldError>),
    /// Another submit from this form is still in flight.
    Busy,
    /// The mutation succeeded and the success callback has run.
    Success(R),
    /// The mutation failed; the message is the server's, verbatim.
    Failed(String),
}

impl<R> DispatchOutcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// One per form instance. The atomic flag is the pending state: set when a
/// mutation goes out, cleared when it settles either way.
#[derive(Debug, Default)]
pub struct Dispatcher {
    in_flight: AtomicBool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Validate, send, and settle one submit.
    ///
    /// `validate` turns the raw payload into the typed one; `mutation`
    /// executes the write; `on_success` receives the response and the
    /// navigation handle. A failed mutation is reported once and never
    /// retried from here.
    pub fn submit<P, R, E, V, M, S>(
        &self,
        payload: &Value,
        validate: V,
        mutation: M,
        on_success: S,
        navigator: &mut Navigator,
    ) -> DispatchOutcome<R>
    where
        V: FnOnce(&Value) -> FormResult<P>,
        M: FnOnce(&P) -> Result<R, E>,
        E: std::fmt::Display,
        S: FnOnce(&R, &mut Navigator),
    {
        // invalid payloads surface inline and never reach the transport
        let typed = match validate(payload) {
            Ok(typed) => typed,
            Err(errors) => return DispatchOutcome::Invalid(errors),
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return DispatchOutcome::Busy;
        }

        let outcome = match mutation(&typed) {
            Ok(response) => {
                on_success(&response, navigator);
                DispatchOutcome::Success(response)
            }
            Err(err) => DispatchOutcome::Failed(err.to_string()),
        };

        self.in_flight.store(false, Ordering::SeqCst);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate_agencia_form;
    use serde_json::json;
    use std::cell::Cell;

    fn valid_payload() -> Value {
        json!({
            "num_ag": 10,
            "nome_ag": "Centro",
            "cidade_ag": "Curitiba",
            "sal_total": 1000.0,
            "create": true,
        })
    }

    #[test]
    fn test_invalid_payload_never_calls_mutation() {
        let dispatcher = Dispatcher::new();
        let mut navigator = Navigator::new();
        let calls = Cell::new(0);

        let payload = json!({ "num_ag": "x", "nome_ag": "", "cidade_ag": "", "sal_total": -1 });

        let outcome = dispatcher.submit(
            &payload,
            validate_agencia_form,
            |_form| {
                calls.set(calls.get() + 1);
                Ok::<_, String>(())
            },
            |_resp, _nav| {},
            &mut navigator,
        );

        assert!(matches!(outcome, DispatchOutcome::Invalid(_)));
        assert_eq!(calls.get(), 0);
        assert_eq!(navigator.target(), None);
        assert!(!dispatcher.is_pending());
    }

    #[test]
    fn test_cpf_123_is_rejected_before_any_call() {
        let dispatcher = Dispatcher::new();
        let mut navigator = Navigator::new();
        let calls = Cell::new(0);

        let mut payload = json!({
            "cpf": "123",
            "nome": "Maria",
            "data_nasc": "1990-04-12",
            "rg_num": "123456789",
            "rg_orgao_emissor": "SSP",
            "rg_uf": "PR",
            "end_tipo": "Residencial",
            "end_logradouro": "Rua A",
            "end_numero": 1,
            "end_bairro": "Centro",
            "end_cidade": "Curitiba",
            "end_estado": "PR",
            "end_cep": "80010000",
            "create": true,
        });
        payload["emails"] = json!([]);

        let outcome = dispatcher.submit(
            &payload,
            crate::schema::validate_cliente_form,
            |_form| {
                calls.set(calls.get() + 1);
                Ok::<_, String>(())
            },
            |_resp, _nav| {},
            &mut navigator,
        );

        let DispatchOutcome::Invalid(errors) = outcome else {
            panic!("expected inline validation failure");
        };
        assert!(errors.iter().any(|e| e.field == "cpf"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_success_runs_callback_with_navigator() {
        let dispatcher = Dispatcher::new();
        let mut navigator = Navigator::new();

        let outcome = dispatcher.submit(
            &valid_payload(),
            validate_agencia_form,
            |form| Ok::<_, String>(form.num_ag),
            |num_ag, nav| nav.push(&format!("/agencias/{}", num_ag)),
            &mut navigator,
        );

        assert_eq!(outcome, DispatchOutcome::Success(10));
        assert_eq!(navigator.target(), Some("/agencias/10"));
        assert!(!dispatcher.is_pending());
    }

    #[test]
    fn test_failure_surfaces_message_verbatim_and_settles() {
        let dispatcher = Dispatcher::new();
        let mut navigator = Navigator::new();

        let outcome = dispatcher.submit(
            &valid_payload(),
            validate_agencia_form,
            |_form| Err::<(), _>("UNIQUE constraint failed: agencia.num_ag".to_string()),
            |_resp: &(), _nav| {},
            &mut navigator,
        );

        assert_eq!(
            outcome,
            DispatchOutcome::Failed("UNIQUE constraint failed: agencia.num_ag".to_string())
        );
        assert_eq!(navigator.target(), None);
        // settled, so the next submit is allowed again
        assert!(!dispatcher.is_pending());
    }

    #[test]
    fn test_second_submit_while_pending_is_busy() {
        let dispatcher = Dispatcher::new();
        let mut outer_nav = Navigator::new();

        let outcome = dispatcher.submit(
            &valid_payload(),
            validate_agencia_form,
            |_form| {
                // a resubmit arriving while this one is in flight
                let mut inner_nav = Navigator::new();
                let inner = dispatcher.submit(
                    &valid_payload(),
                    validate_agencia_form,
                    |_form| Ok::<_, String>(0i64),
                    |_resp, _nav| {},
                    &mut inner_nav,
                );
                assert_eq!(inner, DispatchOutcome::Busy);
                Ok::<_, String>(1i64)
            },
            |_resp, _nav| {},
            &mut outer_nav,
        );

        assert_eq!(outcome, DispatchOutcome::Success(1));
        assert!(!dispatcher.is_pending());
    }
}
