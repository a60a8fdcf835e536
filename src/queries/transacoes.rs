use super::{QueryResult, UpsertOutcome};
use crate::schema::TransacaoForm;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transacao {
    pub id: i64,
    pub num_conta: i64,
    pub tipo: String,
    pub valor: f64,
    pub data_hora: String,
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transacao> {
    Ok(Transacao {
        id: row.get(0)?,
        num_conta: row.get(1)?,
        tipo: row.get(2)?,
        valor: row.get(3)?,
        data_hora: row.get(4)?,
    })
}

pub fn get_by_id(conn: &Connection, id: i64) -> QueryResult<Option<Transacao>> {
    let transacao = conn
        .query_row(
            "SELECT id, num_conta, tipo, valor, data_hora
             FROM transacao WHERE id = ?1",
            [id],
            from_row,
        )
        .optional()?;

    Ok(transacao)
}

/// Titles use the transaction type as the display name.
pub fn get_nome_by_id(conn: &Connection, id: i64) -> QueryResult<Option<String>> {
    let tipo = conn
        .query_row("SELECT tipo FROM transacao WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(tipo)
}

pub fn get_all(conn: &Connection) -> QueryResult<Vec<Transacao>> {
    let mut stmt = conn.prepare(
        "SELECT id, num_conta, tipo, valor, data_hora
         FROM transacao ORDER BY data_hora DESC",
    )?;

    let transacoes = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transacoes)
}

pub fn get_by_conta(conn: &Connection, num_conta: i64) -> QueryResult<Vec<Transacao>> {
    let mut stmt = conn.prepare(
        "SELECT id, num_conta, tipo, valor, data_hora
         FROM transacao WHERE num_conta = ?1 ORDER BY data_hora DESC",
    )?;

    let transacoes = stmt
        .query_map([num_conta], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transacoes)
}

pub fn upsert(conn: &Connection, form: &TransacaoForm) -> QueryResult<UpsertOutcome<i64>> {
    if form.create {
        conn.execute(
            "INSERT INTO transacao (num_conta, tipo, valor, data_hora)
             VALUES (?1, ?2, ?3, ?4)",
            params![form.num_conta, form.tipo, form.valor, form.data_hora],
        )?;

        return Ok(UpsertOutcome::Created {
            id: conn.last_insert_rowid(),
        });
    }

    let Some(id) = form.id else {
        return Ok(UpsertOutcome::Updated { affected: 0 });
    };

    let affected = conn.execute(
        "UPDATE transacao SET num_conta = ?2, tipo = ?3, valor = ?4, data_hora = ?5
         WHERE id = ?1",
        params![id, form.num_conta, form.tipo, form.valor, form.data_hora],
    )?;

    Ok(UpsertOutcome::Updated { affected })
}

pub fn delete(conn: &Connection, id: i64) -> QueryResult<usize> {
    let affected = conn.execute("DELETE FROM transacao WHERE id = ?1", [id])?;

    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::queries::QueryError;

    fn test_conn() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        crate::db::seed_demo_data(&conn).unwrap();

        let num_conta: i64 = conn
            .query_row("SELECT num_conta FROM conta LIMIT 1", [], |row| row.get(0))
            .unwrap();

        (conn, num_conta)
    }

    fn form(num_conta: i64, create: bool, id: Option<i64>) -> TransacaoForm {
        TransacaoForm {
            id,
            num_conta,
            tipo: "deposito".to_string(),
            valor: 250.0,
            data_hora: "2024-03-05T09:00:00".to_string(),
            create,
        }
    }

    #[test]
    fn test_create_then_get() {
        let (conn, num_conta) = test_conn();

        let UpsertOutcome::Created { id } = upsert(&conn, &form(num_conta, true, None)).unwrap()
        else {
            panic!("expected create");
        };

        let transacao = get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(transacao.valor, 250.0);
        assert_eq!(transacao.tipo, "deposito");
    }

    #[test]
    fn test_create_with_unknown_conta_fails() {
        let (conn, _) = test_conn();

        let err = upsert(&conn, &form(9999, true, None)).unwrap_err();
        match err {
            QueryError::Db { message } => assert!(message.contains("FOREIGN KEY")),
            other => panic!("expected Db error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_missing_affects_zero() {
        let (conn, num_conta) = test_conn();

        let outcome = upsert(&conn, &form(num_conta, false, Some(777))).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { affected: 0 });
    }

    #[test]
    fn test_get_by_conta_newest_first() {
        let (conn, num_conta) = test_conn();

        let transacoes = get_by_conta(&conn, num_conta).unwrap();
        assert_eq!(transacoes.len(), 2);
        assert!(transacoes[0].data_hora >= transacoes[1].data_hora);
    }

    #[test]
    fn test_delete_counts_rows() {
        let (conn, num_conta) = test_conn();

        let UpsertOutcome::Created { id } = upsert(&conn, &form(num_conta, true, None)).unwrap()
        else {
            panic!("expected create");
        };

        assert_eq!(delete(&conn, id).unwrap(), 1);
        assert_eq!(delete(&conn, id).unwrap(), 0);
    }
}
