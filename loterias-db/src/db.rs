use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use crate::models::{parse_balls, parse_date, DrawRecord, DrawSeries, GameGeometry};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    game              TEXT NOT NULL,
    contest           INTEGER NOT NULL,
    date              TEXT NOT NULL,
    numbers           TEXT NOT NULL,
    accumulated       INTEGER NOT NULL DEFAULT 0,
    collected_amount  REAL,
    winners_count     INTEGER,
    PRIMARY KEY (game, contest)
);
";

const SELECT_COLUMNS: &str =
    "SELECT contest, date, numbers, accumulated, collected_amount, winners_count FROM draws";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("loterias.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Não foi possível criar o diretório {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Não foi possível abrir a base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Falha na migração")?;
    Ok(())
}

fn join_numbers(draw: &DrawRecord) -> String {
    draw.drawn_numbers()
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Retorna `false` quando o concurso já existe para o jogo.
pub fn insert_draw(conn: &Connection, game: &str, draw: &DrawRecord) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (game, contest, date, numbers, accumulated, collected_amount, winners_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            game,
            draw.contest_number(),
            draw.draw_date().format("%Y-%m-%d").to_string(),
            join_numbers(draw),
            draw.accumulated(),
            draw.collected_amount(),
            draw.winners_count(),
        ],
    ).context("Falha na inserção")?;
    Ok(changed > 0)
}

/// Insere vários concursos numa única transação; devolve quantos eram novos.
pub fn insert_draws(conn: &Connection, game: &str, draws: &[DrawRecord]) -> Result<u32> {
    let tx = conn.unchecked_transaction()
        .context("Não foi possível iniciar a transação")?;
    let mut inserted = 0;
    for draw in draws {
        if insert_draw(&tx, game, draw)? {
            inserted += 1;
        }
    }
    tx.commit().context("Falha no commit")?;
    Ok(inserted)
}

type DrawRow = (u32, String, String, bool, Option<f64>, Option<u32>);

fn row_to_draw(geometry: &GameGeometry, row: DrawRow) -> Result<DrawRecord> {
    let (contest, date, numbers, accumulated, collected, winners) = row;
    let date = parse_date(&date)?;
    let numbers = parse_balls(&numbers)?;
    let draw = DrawRecord::new(geometry, contest, date, numbers)
        .with_context(|| format!("Concurso {} inválido na base", contest))?
        .with_accumulated(accumulated)
        .with_collected_amount(collected)
        .with_winners_count(winners);
    Ok(draw)
}

fn query_draws(conn: &Connection, geometry: &GameGeometry, limit: Option<u32>) -> Result<Vec<DrawRecord>> {
    let sql = format!(
        "{} WHERE game = ?1 ORDER BY contest DESC LIMIT ?2",
        SELECT_COLUMNS
    );
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![geometry.slug, limit], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, Option<f64>>(4)?,
            row.get::<_, Option<u32>>(5)?,
        ))
    })?.collect::<Result<Vec<DrawRow>, _>>()?;

    rows.into_iter().map(|row| row_to_draw(geometry, row)).collect()
}

/// Histórico completo do jogo, do mais recente ao mais antigo.
pub fn fetch_series(conn: &Connection, geometry: &GameGeometry) -> Result<DrawSeries> {
    Ok(DrawSeries::from_records(query_draws(conn, geometry, None)?))
}

pub fn fetch_last_draws(conn: &Connection, geometry: &GameGeometry, limit: u32) -> Result<Vec<DrawRecord>> {
    query_draws(conn, geometry, Some(limit))
}

pub fn count_draws(conn: &Connection, game: &str) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM draws WHERE game = ?1",
        [game],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn max_contest(conn: &Connection, game: &str) -> Result<u32> {
    let max: Option<u32> = conn.query_row(
        "SELECT MAX(contest) FROM draws WHERE game = ?1",
        [game],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}
