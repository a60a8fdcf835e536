use super::{QueryResult, UpsertOutcome};
use crate::schema::ContaForm;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conta {
    pub num_conta: i64,
    pub tipo: String,
    pub saldo: f64,
    pub num_ag: i64,
    pub cpf_cliente: String,
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conta> {
    Ok(Conta {
        num_conta: row.get(0)?,
        tipo: row.get(1)?,
        saldo: row.get(2)?,
        num_ag: row.get(3)?,
        cpf_cliente: row.get(4)?,
    })
}

pub fn get_by_numero(conn: &Connection, num_conta: i64) -> QueryResult<Option<Conta>> {
    let conta = conn
        .query_row(
            "SELECT num_conta, tipo, saldo, num_ag, cpf_cliente
             FROM conta WHERE num_conta = ?1",
            [num_conta],
            from_row,
        )
        .optional()?;

    Ok(conta)
}

/// Titles use the account type as the display name.
pub fn get_nome_by_numero(conn: &Connection, num_conta: i64) -> QueryResult<Option<String>> {
    let tipo = conn
        .query_row(
            "SELECT tipo FROM conta WHERE num_conta = ?1",
            [num_conta],
            |row| row.get(0),
        )
        .optional()?;

    Ok(tipo)
}

pub fn get_all(conn: &Connection) -> QueryResult<Vec<Conta>> {
    let mut stmt = conn.prepare(
        "SELECT num_conta, tipo, saldo, num_ag, cpf_cliente
         FROM conta ORDER BY num_conta",
    )?;

    let contas = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(contas)
}

pub fn get_by_cliente(conn: &Connection, cpf: &str) -> QueryResult<Vec<Conta>> {
    let mut stmt = conn.prepare(
        "SELECT num_conta, tipo, saldo, num_ag, cpf_cliente
         FROM conta WHERE cpf_cliente = ?1 ORDER BY num_conta",
    )?;

    let contas = stmt
        .query_map([cpf], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(contas)
}

pub fn upsert(conn: &Connection, form: &ContaForm) -> QueryResult<UpsertOutcome<i64>> {
    if form.create {
        conn.execute(
            "INSERT INTO conta (tipo, saldo, num_ag, cpf_cliente)
             VALUES (?1, ?2, ?3, ?4)",
            params![form.tipo, form.saldo, form.num_ag, form.cpf_cliente],
        )?;

        return Ok(UpsertOutcome::Created {
            id: conn.last_insert_rowid(),
        });
    }

    let Some(num_conta) = form.num_conta else {
        return Ok(UpsertOutcome::Updated { affected: 0 });
    };

    let affected = conn.execute(
        "UPDATE conta SET tipo = ?2, saldo = ?3, num_ag = ?4, cpf_cliente = ?5
         WHERE num_conta = ?1",
        params![num_conta, form.tipo, form.saldo, form.num_ag, form.cpf_cliente],
    )?;

    Ok(UpsertOutcome::Updated { affected })
}

pub fn delete(conn: &Connection, num_conta: i64) -> QueryResult<usize> {
    let affected = conn.execute("DELETE FROM conta WHERE num_conta = ?1", [num_conta])?;

    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::queries::QueryError;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        crate::db::seed_demo_data(&conn).unwrap();
        conn
    }

    fn form(create: bool, num_conta: Option<i64>) -> ContaForm {
        ContaForm {
            num_conta,
            tipo: "poupanca".to_string(),
            saldo: 500.0,
            num_ag: 10,
            cpf_cliente: "12345678901".to_string(),
            create,
        }
    }

    #[test]
    fn test_create_then_get() {
        let conn = test_conn();

        let UpsertOutcome::Created { id } = upsert(&conn, &form(true, None)).unwrap() else {
            panic!("expected create");
        };

        let conta = get_by_numero(&conn, id).unwrap().unwrap();
        assert_eq!(conta.tipo, "poupanca");
        assert_eq!(conta.saldo, 500.0);
        assert_eq!(conta.cpf_cliente, "12345678901");
    }

    #[test]
    fn test_create_with_unknown_cliente_fails() {
        let conn = test_conn();

        let mut f = form(true, None);
        f.cpf_cliente = "00000000000".to_string();

        let err = upsert(&conn, &f).unwrap_err();
        match err {
            QueryError::Db { message } => assert!(message.contains("FOREIGN KEY")),
            other => panic!("expected Db error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_missing_affects_zero() {
        let conn = test_conn();

        let outcome = upsert(&conn, &form(false, Some(9999))).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { affected: 0 });
    }

    #[test]
    fn test_delete_with_transacoes_is_blocked() {
        let conn = test_conn();

        // the seeded conta carries transações
        let contas = get_by_cliente(&conn, "12345678901").unwrap();
        let err = delete(&conn, contas[0].num_conta).unwrap_err();

        match err {
            QueryError::Db { message } => assert!(message.contains("FOREIGN KEY")),
            other => panic!("expected Db error, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_fresh_conta() {
        let conn = test_conn();

        let UpsertOutcome::Created { id } = upsert(&conn, &form(true, None)).unwrap() else {
            panic!("expected create");
        };

        assert_eq!(delete(&conn, id).unwrap(), 1);
        assert_eq!(delete(&conn, id).unwrap(), 0);
    }
}
