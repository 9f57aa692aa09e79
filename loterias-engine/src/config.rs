use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backtest::PrizeTable;
use crate::delay::ProfileOptions;
use crate::stats::StatsOptions;

pub const DEFAULT_CONFIG_FILE: &str = "loterias.json";
pub const DEFAULT_BASE_URL: &str = "https://servicebus2.caixa.gov.br/portaldeloterias/api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Preço do bilhete e tabela de prêmios de uma modalidade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub ticket_price: f64,
    pub prize_table: PrizeTable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub source: SourceConfig,
    pub stats: StatsOptions,
    pub profile: ProfileOptions,
    pub games: BTreeMap<String, GameConfig>,
}

impl EngineConfig {
    /// Modalidade sem configuração: preço zero e nenhuma faixa de prêmio.
    pub fn game(&self, slug: &str) -> GameConfig {
        match self.games.get(slug) {
            Some(game) => game.clone(),
            None => {
                tracing::debug!(game = slug, "modalidade sem tabela de prêmios configurada");
                GameConfig::default()
            }
        }
    }
}

/// Arquivo ausente não é erro: usa os valores padrão.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Não foi possível ler {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Configuração inválida: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.source.base_url, DEFAULT_BASE_URL);
        assert!((config.profile.thresholds.very_high - 1.3).abs() < 1e-12);
        assert!(config.game("megasena").prize_table.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loterias.json");
        std::fs::write(
            &path,
            r#"{
                "profile": { "thresholds": { "low": 0.5 } },
                "games": { "megasena": { "ticket_price": 5.0, "prize_table": { "6": 1000000 } } }
            }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.source.timeout_secs, 10);
        assert_eq!(config.profile.window_months, 12);
        assert!((config.profile.thresholds.low - 0.5).abs() < 1e-12);
        assert!((config.profile.thresholds.high - 1.1).abs() < 1e-12);
        let megasena = config.game("megasena");
        assert_eq!(megasena.ticket_price, 5.0);
        assert_eq!(megasena.prize_table.prize(6), 1_000_000.0);
        assert_eq!(megasena.prize_table.prize(5), 0.0);
    }

    #[test]
    fn test_example_config_parses() {
        let config: EngineConfig =
            serde_json::from_str(include_str!("../../loterias.example.json")).unwrap();
        assert_eq!(config.source.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.game("quina").prize_table.prize(2), 3.0);
        assert!(config.game("lotomania").prize_table.is_empty());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loterias.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(&path).is_err());
    }
}
