use super::{QueryResult, UpsertOutcome};
use crate::db::hash_senha;
use crate::schema::FuncionarioForm;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funcionario {
    pub matricula: i64,
    pub nome: String,
    pub cargo: String,
    pub salario: f64,
    pub num_ag: i64,
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Funcionario> {
    Ok(Funcionario {
        matricula: row.get(0)?,
        nome: row.get(1)?,
        cargo: row.get(2)?,
        salario: row.get(3)?,
        num_ag: row.get(4)?,
    })
}

pub fn get_by_matricula(conn: &Connection, matricula: i64) -> QueryResult<Option<Funcionario>> {
    let funcionario = conn
        .query_row(
            "SELECT matricula, nome, cargo, salario, num_ag
             FROM funcionario WHERE matricula = ?1",
            [matricula],
            from_row,
        )
        .optional()?;

    Ok(funcionario)
}

pub fn get_nome_by_matricula(conn: &Connection, matricula: i64) -> QueryResult<Option<String>> {
    let nome = conn
        .query_row(
            "SELECT nome FROM funcionario WHERE matricula = ?1",
            [matricula],
            |row| row.get(0),
        )
        .optional()?;

    Ok(nome)
}

pub fn get_all(conn: &Connection) -> QueryResult<Vec<Funcionario>> {
    let mut stmt = conn.prepare(
        "SELECT matricula, nome, cargo, salario, num_ag
         FROM funcionario ORDER BY matricula",
    )?;

    let funcionarios = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(funcionarios)
}

pub fn get_by_agencia(conn: &Connection, num_ag: i64) -> QueryResult<Vec<Funcionario>> {
    let mut stmt = conn.prepare(
        "SELECT matricula, nome, cargo, salario, num_ag
         FROM funcionario WHERE num_ag = ?1 ORDER BY matricula",
    )?;

    let funcionarios = stmt
        .query_map([num_ag], from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(funcionarios)
}

/// Login check for the funcionário tab; also feeds the identity's role,
/// since the cargo doubles as the access-control role.
pub fn get_senha_hash(conn: &Connection, matricula: i64) -> QueryResult<Option<String>> {
    let hash: Option<Option<String>> = conn
        .query_row(
            "SELECT senha_hash FROM funcionario WHERE matricula = ?1",
            [matricula],
            |row| row.get(0),
        )
        .optional()?;

    Ok(hash.flatten())
}

/// The matrícula is generated on create and comes back in the outcome.
pub fn upsert(conn: &Connection, form: &FuncionarioForm) -> QueryResult<UpsertOutcome<i64>> {
    if form.create {
        let senha_hash = form.senha.as_deref().map(hash_senha);

        conn.execute(
            "INSERT INTO funcionario (nome, cargo, salario, num_ag, senha_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![form.nome, form.cargo, form.salario, form.num_ag, senha_hash],
        )?;

        return Ok(UpsertOutcome::Created {
            id: conn.last_insert_rowid(),
        });
    }

    let Some(matricula) = form.matricula else {
        return Ok(UpsertOutcome::Updated { affected: 0 });
    };

    let affected = match &form.senha {
        Some(senha) => conn.execute(
            "UPDATE funcionario SET nome = ?2, cargo = ?3, salario = ?4,
                    num_ag = ?5, senha_hash = ?6
             WHERE matricula = ?1",
            params![
                matricula,
                form.nome,
                form.cargo,
                form.salario,
                form.num_ag,
                hash_senha(senha),
            ],
        )?,
        None => conn.execute(
            "UPDATE funcionario SET nome = ?2, cargo = ?3, salario = ?4, num_ag = ?5
             WHERE matricula = ?1",
            params![matricula, form.nome, form.cargo, form.salario, form.num_ag],
        )?,
    };

    Ok(UpsertOutcome::Updated { affected })
}

pub fn delete(conn: &Connection, matricula: i64) -> QueryResult<usize> {
    let affected = conn.execute("DELETE FROM funcionario WHERE matricula = ?1", [matricula])?;

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
        conn.execute(
            "INSERT INTO agencia (num_ag, nome_ag, cidade_ag, sal_total)
             VALUES (10, 'Centro', 'Curitiba', 0)",
            [],
        )
        .unwrap();
        conn
    }

    fn form(nome: &str, create: bool, matricula: Option<i64>) -> FuncionarioForm {
        FuncionarioForm {
            matricula,
            nome: nome.to_string(),
            cargo: "gerente".to_string(),
            salario: 9500.0,
            num_ag: 10,
            senha: None,
            create,
        }
    }

    #[test]
    fn test_create_generates_matricula() {
        let conn = test_conn();

        let a = upsert(&conn, &form("Ana", true, None)).unwrap();
        let b = upsert(&conn, &form("Bia", true, None)).unwrap();

        let (UpsertOutcome::Created { id: id_a }, UpsertOutcome::Created { id: id_b }) = (a, b)
        else {
            panic!("expected two creates");
        };
        assert!(id_b > id_a);

        let ana = get_by_matricula(&conn, id_a).unwrap().unwrap();
        assert_eq!(ana.nome, "Ana");
        assert_eq!(ana.cargo, "gerente");
    }

    #[test]
    fn test_create_requires_existing_agencia() {
        let conn = test_conn();

        let mut f = form("Ana", true, None);
        f.num_ag = 999;

        let err = upsert(&conn, &f).unwrap_err();
        match err {
            QueryError::Db { message } => assert!(message.contains("FOREIGN KEY")),
            other => panic!("expected Db error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_missing_affects_zero() {
        let conn = test_conn();

        let outcome = upsert(&conn, &form("Ana", false, Some(42))).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { affected: 0 });
    }

    #[test]
    fn test_update_changes_cargo() {
        let conn = test_conn();

        let UpsertOutcome::Created { id } = upsert(&conn, &form("Ana", true, None)).unwrap()
        else {
            panic!("expected create");
        };

        let mut f = form("Ana", false, Some(id));
        f.cargo = "dba".to_string();
        let outcome = upsert(&conn, &f).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { affected: 1 });

        assert_eq!(get_by_matricula(&conn, id).unwrap().unwrap().cargo, "dba");
    }

    #[test]
    fn test_senha_survives_update_without_senha() {
        let conn = test_conn();

        let mut criar = form("Ana", true, None);
        criar.senha = Some("segredo1".to_string());
        let UpsertOutcome::Created { id } = upsert(&conn, &criar).unwrap() else {
            panic!("expected create");
        };

        upsert(&conn, &form("Ana", false, Some(id))).unwrap();

        let hash = get_senha_hash(&conn, id).unwrap().unwrap();
        assert_eq!(hash, hash_senha("segredo1"));
    }

    #[test]
    fn test_delete_and_get_by_agencia() {
        let conn = test_conn();

        let UpsertOutcome::Created { id } = upsert(&conn, &form("Ana", true, None)).unwrap()
        else {
            panic!("expected create");
        };
        upsert(&conn, &form("Bia", true, None)).unwrap();

        assert_eq!(get_by_agencia(&conn, 10).unwrap().len(), 2);
        assert_eq!(delete(&conn, id).unwrap(), 1);
        assert_eq!(delete(&conn, id).unwrap(), 0);
        assert_eq!(get_by_agencia(&conn, 10).unwrap().len(), 1);
    }
}
