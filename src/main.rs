use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

use banco_backoffice::{open_database, seed_demo_data};

fn db_path() -> PathBuf {
    env::var("BANCO_DB_PATH")
        .unwrap_or_else(|_| "banco.db".to_string())
        .into()
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(),
        Some("seed") => run_seed(),
        Some(other) => bail!("comando desconhecido: {}", other),
        None => {
            println!("🏦 Banco Back-Office");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("Comandos:");
            println!("  init   cria as tabelas em {}", db_path().display());
            println!("  seed   insere os dados de demonstração");
            println!();
            println!("O servidor web sobe com: cargo run --bin banco-server");
            Ok(())
        }
    }
}

fn run_init() -> Result<()> {
    let path = db_path();
    println!("🔧 Criando tabelas em {}...", path.display());

    let _conn = open_database(&path)?;

    println!("✓ Banco de dados pronto (WAL + foreign keys)");
    Ok(())
}

fn run_seed() -> Result<()> {
    let path = db_path();
    println!("💾 Inserindo dados de demonstração em {}...", path.display());

    let conn = open_database(&path)?;
    seed_demo_data(&conn)?;

    println!("✓ Agência 10 (Centro), cliente Maria Souza e equipe criados");
    println!("  login funcionário: matrícula 1, senha admin123");
    println!("  login cliente:     CPF 12345678901, senha cliente123");
    Ok(())
}
