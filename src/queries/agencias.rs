use super::{QueryResult, UpsertOutcome};
use crate::schema::AgenciaForm;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agencia {
    pub num_ag: i64,
    pub nome_ag: String,
    pub cidade_ag: String,
    pub sal_total: f64,
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agencia> {
    Ok(Agencia {
        num_ag: row.get(0)?,
        nome_ag: row.get(1)?,
        cidade_ag: row.get(2)?,
        sal_total: row.get(3)?,
    })
}

pub fn get_by_numero(conn: &Connection, num_ag: i64) -> QueryResult<Option<Agencia>> {
    let agencia = conn
        .query_row(
            "SELECT num_ag, nome_ag, cidade_ag, sal_total
             FROM agencia WHERE num_ag = ?1",
            [num_ag],
            from_row,
        )
        .optional()?;

    Ok(agencia)
}

/// Name-only projection for page titles.
pub fn get_nome_by_numero(conn: &Connection, num_ag: i64) -> QueryResult<Option<String>> {
    let nome = conn
        .query_row(
            "SELECT nome_ag FROM agencia WHERE num_ag = ?1",
            [num_ag],
            |row| row.get(0),
        )
        .optional()?;

    Ok(nome)
}

pub fn get_all(conn: &Connection) -> QueryResult<Vec<Agencia>> {
    let mut stmt = conn.prepare(
        "SELECT num_ag, nome_ag, cidade_ag, sal_total
         FROM agencia ORDER BY num_ag",
    )?;

    let agencias = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(agencias)
}

/// The agência número is chosen by the operator, so create echoes it back
/// instead of reading a generated rowid.
pub fn upsert(conn: &Connection, form: &AgenciaForm) -> QueryResult<UpsertOutcome<i64>> {
    if form.create {
        conn.execute(
            "INSERT INTO agencia (num_ag, nome_ag, cidade_ag, sal_total)
             VALUES (?1, ?2, ?3, ?4)",
            params![form.num_ag, form.nome_ag, form.cidade_ag, form.sal_total],
        )?;

        Ok(UpsertOutcome::Created { id: form.num_ag })
    } else {
        let affected = conn.execute(
            "UPDATE agencia SET nome_ag = ?2, cidade_ag = ?3, sal_total = ?4
             WHERE num_ag = ?1",
            params![form.num_ag, form.nome_ag, form.cidade_ag, form.sal_total],
        )?;

        Ok(UpsertOutcome::Updated { affected })
    }
}

pub fn delete(conn: &Connection, num_ag: i64) -> QueryResult<usize> {
    let affected = conn.execute("DELETE FROM agencia WHERE num_ag = ?1", [num_ag])?;

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
        conn
    }

    fn form(num_ag: i64, nome: &str, create: bool) -> AgenciaForm {
        AgenciaForm {
            num_ag,
            nome_ag: nome.to_string(),
            cidade_ag: "Curitiba".to_string(),
            sal_total: 1000.0,
            create,
        }
    }

    #[test]
    fn test_create_then_get_round_trip() {
        let conn = test_conn();

        let outcome = upsert(&conn, &form(10, "Centro", true)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created { id: 10 });

        let agencia = get_by_numero(&conn, 10).unwrap().unwrap();
        assert_eq!(agencia.num_ag, 10);
        assert_eq!(agencia.nome_ag, "Centro");
        assert_eq!(agencia.cidade_ag, "Curitiba");
        assert_eq!(agencia.sal_total, 1000.0);
    }

    #[test]
    fn test_get_missing_is_none() {
        let conn = test_conn();
        assert!(get_by_numero(&conn, 999).unwrap().is_none());
        assert!(get_nome_by_numero(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_create_duplicate_numero_is_db_error() {
        let conn = test_conn();

        upsert(&conn, &form(10, "Centro", true)).unwrap();
        let err = upsert(&conn, &form(10, "Outra", true)).unwrap_err();

        match err {
            QueryError::Db { message } => assert!(message.contains("UNIQUE")),
            other => panic!("expected Db error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_touches_only_matching_row() {
        let conn = test_conn();

        upsert(&conn, &form(10, "Antiga", true)).unwrap();
        upsert(&conn, &form(20, "Bairro Alto", true)).unwrap();

        let outcome = upsert(&conn, &form(10, "Centro", false)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { affected: 1 });

        assert_eq!(get_nome_by_numero(&conn, 10).unwrap().unwrap(), "Centro");
        assert_eq!(
            get_nome_by_numero(&conn, 20).unwrap().unwrap(),
            "Bairro Alto"
        );
    }

    #[test]
    fn test_update_missing_affects_zero_rows() {
        let conn = test_conn();

        let outcome = upsert(&conn, &form(77, "Fantasma", false)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { affected: 0 });
        assert!(!outcome.applied());
    }

    #[test]
    fn test_delete_counts_rows() {
        let conn = test_conn();

        upsert(&conn, &form(10, "Centro", true)).unwrap();

        assert_eq!(delete(&conn, 10).unwrap(), 1);
        assert_eq!(delete(&conn, 10).unwrap(), 0);
    }

    #[test]
    fn test_delete_with_contas_surfaces_constraint() {
        let conn = test_conn();
        crate::db::seed_demo_data(&conn).unwrap();

        let err = delete(&conn, 10).unwrap_err();
        match err {
            QueryError::Db { message } => assert!(message.contains("FOREIGN KEY")),
            other => panic!("expected Db error, got {:?}", other),
        }
    }

    #[test]
    fn test_get_all_ordered_by_numero() {
        let conn = test_conn();

        upsert(&conn, &form(20, "Bairro Alto", true)).unwrap();
        upsert(&conn, &form(10, "Centro", true)).unwrap();

        let todas = get_all(&conn).unwrap();
        let numeros: Vec<i64> = todas.iter().map(|a| a.num_ag).collect();
        assert_eq!(numeros, vec![10, 20]);
    }
}
