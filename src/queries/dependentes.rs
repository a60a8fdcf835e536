use super::{QueryResult, UpsertOutcome};
use crate::schema::DependenteForm;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependente {
    pub id: i64,
    pub cpf_cliente: String,
    pub nome: String,
    pub data_nasc: String,
    pub parentesco: String,
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Dependente> {
    Ok(Dependente {
        id: row.get(0)?,
        cpf_cliente: row.get(1)?,
        nome: row.get(2)?,
        data_nasc: row.get(3)?,
        parentesco: row.get(4)?,
    })
}

pub fn get_by_id(conn: &Connection, id: i64) -> QueryResult<Option<Dependente>> {
    let dependente = conn
        .query_row(
            "SELECT id, cpf_cliente, nome, data_nasc, parentesco
             FROM dependente WHERE id = ?1",
            [id],
            from_row,
        )
        .optional()?;

    Ok(dependente)
}

pub fn get_nome_by_id(conn: &Connection, id: i64) -> QueryResult<Option<String>> {
    let nome = conn
        .query_row("SELECT nome FROM dependente WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(nome)
}

pub fn get_all(conn: &Connection) -> QueryResult<Vec<Dependente>> {
    let mut stmt = conn.prepare(
        "SELECT id, cpf_cliente, nome, data_nasc, parentesco
         FROM dependente ORDER BY id",
    )?;

    let dependentes = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(dependentes)
}

pub fn get_by_cliente(conn: &Connection, cpf: &str) -> QueryResult<Vec<Dependente>> {
    let mut stmt = conn.prepare(
        "SELECT id, cpf_cliente, nome, data_nasc, parentesco
         FROM dependente WHERE cpf_cliente = ?1 ORDER BY id",
    )?;

    let dependentes = stmt
        .query_map([cpf], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(dependentes)
}

pub fn upsert(conn: &Connection, form: &DependenteForm) -> QueryResult<UpsertOutcome<i64>> {
    if form.create {
        conn.execute(
            "INSERT INTO dependente (cpf_cliente, nome, data_nasc, parentesco)
             VALUES (?1, ?2, ?3, ?4)",
            params![form.cpf_cliente, form.nome, form.data_nasc, form.parentesco],
        )?;

        return Ok(UpsertOutcome::Created {
            id: conn.last_insert_rowid(),
        });
    }

    let Some(id) = form.id else {
        return Ok(UpsertOutcome::Updated { affected: 0 });
    };

    let affected = conn.execute(
        "UPDATE dependente SET cpf_cliente = ?2, nome = ?3, data_nasc = ?4, parentesco = ?5
         WHERE id = ?1",
        params![id, form.cpf_cliente, form.nome, form.data_nasc, form.parentesco],
    )?;

    Ok(UpsertOutcome::Updated { affected })
}

pub fn delete(conn: &Connection, id: i64) -> QueryResult<usize> {
    let affected = conn.execute("DELETE FROM dependente WHERE id = ?1", [id])?;

    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        crate::db::seed_demo_data(&conn).unwrap();
        conn
    }

    fn form(nome: &str, create: bool, id: Option<i64>) -> DependenteForm {
        DependenteForm {
            id,
            cpf_cliente: "12345678901".to_string(),
            nome: nome.to_string(),
            data_nasc: "2012-01-20".to_string(),
            parentesco: "filha".to_string(),
            create,
        }
    }

    #[test]
    fn test_create_update_delete_cycle() {
        let conn = test_conn();

        let UpsertOutcome::Created { id } = upsert(&conn, &form("Laura", true, None)).unwrap()
        else {
            panic!("expected create");
        };

        let mut edit = form("Laura Souza", false, Some(id));
        edit.parentesco = "enteada".to_string();
        assert_eq!(
            upsert(&conn, &edit).unwrap(),
            UpsertOutcome::Updated { affected: 1 }
        );

        let lido = get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(lido.nome, "Laura Souza");
        assert_eq!(lido.parentesco, "enteada");

        assert_eq!(delete(&conn, id).unwrap(), 1);
        assert!(get_by_id(&conn, id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_affects_zero() {
        let conn = test_conn();

        let outcome = upsert(&conn, &form("Laura", false, Some(404))).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { affected: 0 });
    }

    #[test]
    fn test_get_by_cliente_lists_seeded_dependente() {
        let conn = test_conn();

        let dependentes = get_by_cliente(&conn, "12345678901").unwrap();
        assert_eq!(dependentes.len(), 1);
        assert_eq!(dependentes[0].nome, "Pedro Souza");
    }
}
