use super::{QueryResult, UpsertOutcome};
use crate::db::hash_senha;
use crate::schema::{ClienteForm, ContatoEmail, ContatoTelefone};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Full cliente record with its ordered contact rows. The senha hash is
/// deliberately not part of this struct; login reads it separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cliente {
    pub cpf: String,
    pub nome: String,
    pub data_nasc: String,
    pub rg_num: String,
    pub rg_orgao_emissor: String,
    pub rg_uf: String,
    pub end_tipo: String,
    pub end_logradouro: String,
    pub end_numero: i64,
    pub end_bairro: String,
    pub end_cidade: String,
    pub end_estado: String,
    pub end_cep: String,
    pub emails: Vec<ContatoEmail>,
    pub telefones: Vec<ContatoTelefone>,
}

/// List projection for the clientes grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClienteResumo {
    pub cpf: String,
    pub nome: String,
    pub data_nasc: String,
    pub end_cidade: String,
}

fn load_emails(conn: &Connection, cpf: &str) -> QueryResult<Vec<ContatoEmail>> {
    let mut stmt = conn.prepare(
        "SELECT email, tipo FROM email_cliente
         WHERE cpf_cliente = ?1 ORDER BY ordem",
    )?;

    let emails = stmt
        .query_map([cpf], |row| {
            Ok(ContatoEmail {
                email: row.get(0)?,
                tipo: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(emails)
}

fn load_telefones(conn: &Connection, cpf: &str) -> QueryResult<Vec<ContatoTelefone>> {
    let mut stmt = conn.prepare(
        "SELECT telefone, tipo FROM telefone_cliente
         WHERE cpf_cliente = ?1 ORDER BY ordem",
    )?;

    let telefones = stmt
        .query_map([cpf], |row| {
            Ok(ContatoTelefone {
                telefone: row.get(0)?,
                tipo: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(telefones)
}

pub fn get_by_cpf(conn: &Connection, cpf: &str) -> QueryResult<Option<Cliente>> {
    let main = conn
        .query_row(
            "SELECT cpf, nome, data_nasc, rg_num, rg_orgao_emissor, rg_uf,
                    end_tipo, end_logradouro, end_numero, end_bairro,
                    end_cidade, end_estado, end_cep
             FROM cliente WHERE cpf = ?1",
            [cpf],
            |row| {
                Ok(Cliente {
                    cpf: row.get(0)?,
                    nome: row.get(1)?,
                    data_nasc: row.get(2)?,
                    rg_num: row.get(3)?,
                    rg_orgao_emissor: row.get(4)?,
                    rg_uf: row.get(5)?,
                    end_tipo: row.get(6)?,
                    end_logradouro: row.get(7)?,
                    end_numero: row.get(8)?,
                    end_bairro: row.get(9)?,
                    end_cidade: row.get(10)?,
                    end_estado: row.get(11)?,
                    end_cep: row.get(12)?,
                    emails: Vec::new(),
                    telefones: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut cliente) = main else {
        return Ok(None);
    };

    cliente.emails = load_emails(conn, cpf)?;
    cliente.telefones = load_telefones(conn, cpf)?;

    Ok(Some(cliente))
}

pub fn get_nome_by_cpf(conn: &Connection, cpf: &str) -> QueryResult<Option<String>> {
    let nome = conn
        .query_row("SELECT nome FROM cliente WHERE cpf = ?1", [cpf], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(nome)
}

pub fn get_all(conn: &Connection) -> QueryResult<Vec<ClienteResumo>> {
    let mut stmt = conn.prepare(
        "SELECT cpf, nome, data_nasc, end_cidade
         FROM cliente ORDER BY nome",
    )?;

    let clientes = stmt
        .query_map([], |row| {
            Ok(ClienteResumo {
                cpf: row.get(0)?,
                nome: row.get(1)?,
                data_nasc: row.get(2)?,
                end_cidade: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(clientes)
}

/// Senha hash for the login check; `None` when the cliente does not exist
/// or has never set a senha.
pub fn get_senha_hash(conn: &Connection, cpf: &str) -> QueryResult<Option<String>> {
    let hash: Option<Option<String>> = conn
        .query_row(
            "SELECT senha_hash FROM cliente WHERE cpf = ?1",
            [cpf],
            |row| row.get(0),
        )
        .optional()?;

    Ok(hash.flatten())
}

fn insert_contatos(conn: &Connection, form: &ClienteForm) -> QueryResult<()> {
    for (ordem, contato) in form.emails.iter().enumerate() {
        conn.execute(
            "INSERT INTO email_cliente (cpf_cliente, ordem, email, tipo)
             VALUES (?1, ?2, ?3, ?4)",
            params![form.cpf, ordem as i64, contato.email, contato.tipo],
        )?;
    }

    for (ordem, contato) in form.telefones.iter().enumerate() {
        conn.execute(
            "INSERT INTO telefone_cliente (cpf_cliente, ordem, telefone, tipo)
             VALUES (?1, ?2, ?3, ?4)",
            params![form.cpf, ordem as i64, contato.telefone, contato.tipo],
        )?;
    }

    Ok(())
}

/// Create or update a cliente together with its contact rows.
///
/// The whole write runs in one transaction: the contact rows are replaced
/// wholesale on update, and nothing is applied when the target row is
/// missing (`Updated { affected: 0 }`).
pub fn upsert(conn: &Connection, form: &ClienteForm) -> QueryResult<UpsertOutcome<String>> {
    let tx = conn.unchecked_transaction()?;

    if form.create {
        let senha_hash = form.senha.as_deref().map(hash_senha);

        tx.execute(
            "INSERT INTO cliente (
                cpf, nome, data_nasc, rg_num, rg_orgao_emissor, rg_uf,
                end_tipo, end_logradouro, end_numero, end_bairro, end_cidade,
                end_estado, end_cep, senha_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                form.cpf,
                form.nome,
                form.data_nasc,
                form.rg_num,
                form.rg_orgao_emissor,
                form.rg_uf,
                form.end_tipo,
                form.end_logradouro,
                form.end_numero,
                form.end_bairro,
                form.end_cidade,
                form.end_estado,
                form.end_cep,
                senha_hash,
            ],
        )?;

        insert_contatos(&tx, form)?;
        tx.commit()?;

        return Ok(UpsertOutcome::Created {
            id: form.cpf.clone(),
        });
    }

    let affected = match &form.senha {
        Some(senha) => tx.execute(
            "UPDATE cliente SET
                nome = ?2, data_nasc = ?3, rg_num = ?4, rg_orgao_emissor = ?5,
                rg_uf = ?6, end_tipo = ?7, end_logradouro = ?8, end_numero = ?9,
                end_bairro = ?10, end_cidade = ?11, end_estado = ?12,
                end_cep = ?13, senha_hash = ?14
             WHERE cpf = ?1",
            params![
                form.cpf,
                form.nome,
                form.data_nasc,
                form.rg_num,
                form.rg_orgao_emissor,
                form.rg_uf,
                form.end_tipo,
                form.end_logradouro,
                form.end_numero,
                form.end_bairro,
                form.end_cidade,
                form.end_estado,
                form.end_cep,
                hash_senha(senha),
            ],
        )?,
        None => tx.execute(
            "UPDATE cliente SET
                nome = ?2, data_nasc = ?3, rg_num = ?4, rg_orgao_emissor = ?5,
                rg_uf = ?6, end_tipo = ?7, end_logradouro = ?8, end_numero = ?9,
                end_bairro = ?10, end_cidade = ?11, end_estado = ?12,
                end_cep = ?13
             WHERE cpf = ?1",
            params![
                form.cpf,
                form.nome,
                form.data_nasc,
                form.rg_num,
                form.rg_orgao_emissor,
                form.rg_uf,
                form.end_tipo,
                form.end_logradouro,
                form.end_numero,
                form.end_bairro,
                form.end_cidade,
                form.end_estado,
                form.end_cep,
            ],
        )?,
    };

    if affected == 0 {
        // target cliente is gone, leave the contact rows alone
        return Ok(UpsertOutcome::Updated { affected: 0 });
    }

    tx.execute(
        "DELETE FROM email_cliente WHERE cpf_cliente = ?1",
        [&form.cpf],
    )?;
    tx.execute(
        "DELETE FROM telefone_cliente WHERE cpf_cliente = ?1",
        [&form.cpf],
    )?;
    insert_contatos(&tx, form)?;
    tx.commit()?;

    Ok(UpsertOutcome::Updated { affected })
}

/// Contact rows and dependentes go with the cliente (cascade); contas block
/// the delete and the constraint message is surfaced as-is.
pub fn delete(conn: &Connection, cpf: &str) -> QueryResult<usize> {
    let affected = conn.execute("DELETE FROM cliente WHERE cpf = ?1", [cpf])?;

    Ok(affected)
}
