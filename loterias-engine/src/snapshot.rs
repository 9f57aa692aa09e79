//! Snapshot estático pré-calculado: concursos + agregados do modo global.
//! A ausência do arquivo é um estado normal (primeira execução).

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use loterias_db::models::{DrawRecord, DrawSeries, GameGeometry};

use crate::stats::AggregateStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticSnapshot {
    pub game: String,
    pub draws: Vec<DrawRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<AggregateStats>,
}

impl StaticSnapshot {
    pub fn series(&self) -> DrawSeries {
        DrawSeries::from_records(self.draws.clone())
    }
}

/// Registros inválidos são descartados com aviso, como uma busca perdida.
pub fn load_snapshot(path: &Path, geometry: &GameGeometry) -> Result<Option<StaticSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Não foi possível ler {:?}", path))?;
    let snapshot: StaticSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Snapshot inválido: {:?}", path))?;
    if snapshot.game != geometry.slug {
        bail!("Snapshot de '{}' não serve para '{}'", snapshot.game, geometry.slug);
    }

    let draws = snapshot
        .draws
        .into_iter()
        .filter_map(|draw| {
            let contest = draw.contest_number();
            match draw.revalidated(geometry) {
                Ok(draw) => Some(draw),
                Err(e) => {
                    warn!(game = %geometry.slug, contest, error = %e, "registro do snapshot descartado");
                    None
                }
            }
        })
        .collect();

    Ok(Some(StaticSnapshot {
        game: snapshot.game,
        draws,
        stats: snapshot.stats,
    }))
}

pub fn save_snapshot(path: &Path, snapshot: &StaticSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).with_context(|| format!("Não foi possível gravar {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{compute_aggregate, StatsOptions};

    fn megasena() -> GameGeometry {
        GameGeometry::for_slug("megasena").unwrap()
    }

    #[test]
    fn test_absent_snapshot_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("megasena.json"), &megasena()).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let g = megasena();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("megasena.json");
        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        let draws = vec![
            DrawRecord::new(&g, 2, date, loterias_db::models::parse_balls("01 02 03 04 05 06").unwrap()).unwrap(),
            DrawRecord::new(&g, 1, date, loterias_db::models::parse_balls("11 12 13 14 15 16").unwrap()).unwrap(),
        ];
        let stats = compute_aggregate(&draws, &g, &StatsOptions::default());
        let snapshot = StaticSnapshot {
            game: "megasena".into(),
            draws,
            stats: Some(stats),
        };
        save_snapshot(&path, &snapshot).unwrap();

        let loaded = load_snapshot(&path, &g).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.series().latest_contest(), 2);
    }

    #[test]
    fn test_invalid_records_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("megasena.json");
        std::fs::write(
            &path,
            r#"{
                "game": "megasena",
                "draws": [
                    {"contestNumber": 5, "drawDate": "2024-01-05", "drawnNumbers": ["01","02","03","04","05","06"], "accumulated": false},
                    {"contestNumber": 4, "drawDate": "2024-01-04", "drawnNumbers": ["01","02"], "accumulated": false}
                ]
            }"#,
        )
        .unwrap();
        let loaded = load_snapshot(&path, &megasena()).unwrap().unwrap();
        assert_eq!(loaded.draws.len(), 1);
        assert!(loaded.stats.is_none());

        let quina = GameGeometry::for_slug("quina").unwrap();
        assert!(load_snapshot(&path, &quina).is_err());
    }
}
