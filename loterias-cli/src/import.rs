use anyhow::{Context, Result, bail};
use loterias_db::rusqlite::Connection;
use std::path::Path;
use tracing::warn;

use loterias_db::db::insert_draw;
use loterias_db::models::{parse_balls, parse_date, DrawRecord, GameGeometry};

/// Valor em notação brasileira ("1.234,56", "R$ 10,00"). Campo vazio ⇒ `None`.
pub fn parse_brl_amount(s: &str) -> Result<Option<f64>> {
    let s = s.trim().trim_start_matches("R$").trim();
    if s.is_empty() {
        return Ok(None);
    }
    let normalized = s.replace('.', "").replace(',', ".");
    normalized
        .parse::<f64>()
        .map(Some)
        .with_context(|| format!("Valor inválido: '{}'", s))
}

pub fn parse_accumulated(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "sim" | "s" | "true" | "1" => Ok(true),
        "não" | "nao" | "n" | "false" | "0" | "" => Ok(false),
        other => bail!("Valor de acumulado inválido: '{}'", other),
    }
}

fn parse_record(record: &csv::StringRecord, geometry: &GameGeometry) -> Result<DrawRecord> {
    let get = |idx: usize| -> Result<&str> {
        record
            .get(idx)
            .map(str::trim)
            .with_context(|| format!("Campo ausente no índice {}", idx))
    };
    // colunas opcionais podem faltar nas exportações antigas
    let optional = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

    let contest: u32 = get(0)?
        .parse()
        .with_context(|| format!("Concurso inválido: '{}'", optional(0)))?;
    let date = parse_date(get(1)?)?;
    let numbers = parse_balls(get(2)?)?;

    let winners = match optional(5) {
        "" => None,
        raw => Some(
            raw.parse::<u32>()
                .with_context(|| format!("Ganhadores inválido: '{}'", raw))?,
        ),
    };

    let draw = DrawRecord::new(geometry, contest, date, numbers)?
        .with_accumulated(parse_accumulated(optional(3))?)
        .with_collected_amount(parse_brl_amount(optional(4))?)
        .with_winners_count(winners);
    Ok(draw)
}

pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

pub fn import_csv(conn: &Connection, geometry: &GameGeometry, path: &Path) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Não foi possível abrir {:?}", path))?;

    let tx = conn.unchecked_transaction()
        .context("Não foi possível iniciar a transação")?;

    let mut result = ImportResult {
        total_records: 0,
        inserted: 0,
        skipped: 0,
        errors: 0,
    };

    for record_result in reader.records() {
        result.total_records += 1;
        let line = result.total_records;
        let draw = record_result
            .context("Erro de leitura")
            .and_then(|record| parse_record(&record, geometry));
        match draw {
            Ok(draw) => match insert_draw(&tx, &geometry.slug, &draw) {
                Ok(true) => result.inserted += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => {
                    warn!(line, error = %e, "falha ao inserir concurso");
                    result.errors += 1;
                }
            },
            Err(e) => {
                warn!(line, error = format!("{e:#}"), "linha ignorada");
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Falha no commit")?;
    Ok(result)
}
