use anyhow::{Context, Result};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Open (or create) the database file and make sure the schema exists.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    setup_database(&conn)?;

    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; foreign keys are off by default in SQLite
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Agências
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS agencia (
            num_ag INTEGER PRIMARY KEY,
            nome_ag TEXT NOT NULL,
            cidade_ag TEXT NOT NULL,
            sal_total REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Clientes (with ordered contact rows in child tables)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cliente (
            cpf TEXT PRIMARY KEY,
            nome TEXT NOT NULL,
            data_nasc TEXT NOT NULL,
            rg_num TEXT NOT NULL,
            rg_orgao_emissor TEXT NOT NULL,
            rg_uf TEXT NOT NULL,
            end_tipo TEXT NOT NULL,
            end_logradouro TEXT NOT NULL,
            end_numero INTEGER NOT NULL,
            end_bairro TEXT NOT NULL,
            end_cidade TEXT NOT NULL,
            end_estado TEXT NOT NULL,
            end_cep TEXT NOT NULL,
            senha_hash TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS email_cliente (
            cpf_cliente TEXT NOT NULL REFERENCES cliente(cpf) ON DELETE CASCADE,
            ordem INTEGER NOT NULL,
            email TEXT NOT NULL,
            tipo TEXT NOT NULL,
            PRIMARY KEY (cpf_cliente, ordem)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS telefone_cliente (
            cpf_cliente TEXT NOT NULL REFERENCES cliente(cpf) ON DELETE CASCADE,
            ordem INTEGER NOT NULL,
            telefone TEXT NOT NULL,
            tipo TEXT NOT NULL,
            PRIMARY KEY (cpf_cliente, ordem)
        )",
        [],
    )?;

    // ==========================================================================
    // Funcionários
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS funcionario (
            matricula INTEGER PRIMARY KEY AUTOINCREMENT,
            nome TEXT NOT NULL,
            cargo TEXT NOT NULL,
            salario REAL NOT NULL DEFAULT 0,
            num_ag INTEGER NOT NULL REFERENCES agencia(num_ag),
            senha_hash TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Contas (deleting a cliente or agência with contas must fail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS conta (
            num_conta INTEGER PRIMARY KEY AUTOINCREMENT,
            tipo TEXT NOT NULL,
            saldo REAL NOT NULL DEFAULT 0,
            num_ag INTEGER NOT NULL REFERENCES agencia(num_ag),
            cpf_cliente TEXT NOT NULL REFERENCES cliente(cpf)
        )",
        [],
    )?;

    // ==========================================================================
    // Dependentes (owned by the cliente, removed with it)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS dependente (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cpf_cliente TEXT NOT NULL REFERENCES cliente(cpf) ON DELETE CASCADE,
            nome TEXT NOT NULL,
            data_nasc TEXT NOT NULL,
            parentesco TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Transações
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transacao (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            num_conta INTEGER NOT NULL REFERENCES conta(num_conta),
            tipo TEXT NOT NULL,
            valor REAL NOT NULL,
            data_hora TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_funcionario_ag ON funcionario(num_ag)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_conta_cliente ON conta(cpf_cliente)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_conta_ag ON conta(num_ag)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_dependente_cliente ON dependente(cpf_cliente)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transacao_conta ON transacao(num_conta)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transacao_data ON transacao(data_hora)",
        [],
    )?;

    Ok(())
}

/// SHA-256 hex digest for stored senhas. Login compares digests, the clear
/// text is never persisted.
pub fn hash_senha(senha: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(senha.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Load a small demo dataset: one agência, one cliente with contacts, one
/// funcionário per cargo, a conta and a few transações. The `seed` command
/// uses this to produce a browsable instance.
pub fn seed_demo_data(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO agencia (num_ag, nome_ag, cidade_ag, sal_total)
         VALUES (10, 'Centro', 'Curitiba', 31700.0)",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO cliente (
            cpf, nome, data_nasc, rg_num, rg_orgao_emissor, rg_uf,
            end_tipo, end_logradouro, end_numero, end_bairro, end_cidade,
            end_estado, end_cep, senha_hash
        ) VALUES (
            '12345678901', 'Maria Souza', '1990-04-12', '123456789', 'SSP', 'PR',
            'Residencial', 'Rua das Flores', 120, 'Centro', 'Curitiba',
            'PR', '80010000', ?1
        )",
        [hash_senha("cliente123")],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO email_cliente (cpf_cliente, ordem, email, tipo)
         VALUES ('12345678901', 0, 'maria@example.com', 'pessoal')",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO telefone_cliente (cpf_cliente, ordem, telefone, tipo)
         VALUES ('12345678901', 0, '41987654321', 'celular')",
        [],
    )?;

    let funcionarios = [
        ("Ana Pereira", "dba", 12000.0, "admin123"),
        ("Carlos Mota", "gerente", 9500.0, "gerente123"),
        ("Beatriz Ramos", "atendente", 4200.0, "atendente123"),
    ];

    for (nome, cargo, salario, senha) in funcionarios {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM funcionario WHERE nome = ?1",
            [nome],
            |row| row.get(0),
        )?;

        if exists == 0 {
            conn.execute(
                "INSERT INTO funcionario (nome, cargo, salario, num_ag, senha_hash)
                 VALUES (?1, ?2, ?3, 10, ?4)",
                rusqlite::params![nome, cargo, salario, hash_senha(senha)],
            )?;
        }
    }

    let contas: i64 = conn.query_row("SELECT COUNT(*) FROM conta", [], |row| row.get(0))?;
    if contas == 0 {
        conn.execute(
            "INSERT INTO conta (tipo, saldo, num_ag, cpf_cliente)
             VALUES ('corrente', 3250.75, 10, '12345678901')",
            [],
        )?;

        let num_conta = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO dependente (cpf_cliente, nome, data_nasc, parentesco)
             VALUES ('12345678901', 'Pedro Souza', '2015-09-03', 'filho')",
            [],
        )?;

        conn.execute(
            "INSERT INTO transacao (num_conta, tipo, valor, data_hora)
             VALUES (?1, 'deposito', 1500.0, '2024-03-01T10:30:00'),
                    (?1, 'saque', 200.0, '2024-03-02T15:10:00')",
            [num_conta],
        )?;
    }

    Ok(())
}
