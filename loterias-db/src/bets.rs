//! Leitura do arquivo de apostas do usuário. Somente leitura: este crate nunca
//! grava apostas.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{Bet, GameSelection};

pub fn load_bets(path: &Path) -> Result<Vec<Bet>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Não foi possível ler {:?}", path))?;
    let bets: Vec<Bet> = serde_json::from_str(&content)
        .with_context(|| format!("Arquivo de apostas inválido: {:?}", path))?;
    Ok(bets)
}

/// Todos os jogos das apostas de uma modalidade, na ordem do arquivo.
pub fn selections_for_game(bets: &[Bet], game: &str) -> Vec<GameSelection> {
    bets.iter()
        .filter(|b| b.game_slug == game)
        .flat_map(|b| b.games.iter().cloned())
        .collect()
}
