use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use loterias_db::bets::selections_for_game;
use loterias_db::models::{Ball, Bet, DrawRecord, DrawSeries, GameGeometry, GameSelection};

use crate::stats::{compute_aggregate, StatsOptions};

/// Quantidade de concursos recentes usada na constância.
pub const CONSISTENCY_WINDOW: usize = 20;

/// Prêmio por quantidade de acertos. Faixas ausentes valem zero; nunca são inferidas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrizeTable(BTreeMap<u8, f64>);

impl PrizeTable {
    pub fn new(tiers: impl IntoIterator<Item = (u8, f64)>) -> Self {
        Self(tiers.into_iter().collect())
    }

    pub fn prize(&self, hits: usize) -> f64 {
        u8::try_from(hits)
            .ok()
            .and_then(|h| self.0.get(&h).copied())
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tiers(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        self.0.iter().map(|(&h, &p)| (h, p))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawOutcome {
    pub contest: u32,
    pub date: NaiveDate,
    /// Acertos de cada jogo, na ordem dos jogos.
    pub hits: Vec<usize>,
    /// O resultado exibido do concurso é o melhor jogo, não a soma.
    pub best_hits: usize,
    pub prize: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestHit {
    pub contest: u32,
    pub date: NaiveDate,
    pub hits: usize,
    pub game_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestReport {
    pub games: usize,
    pub draws: usize,
    pub outcomes: Vec<DrawOutcome>,
    pub total_investment: f64,
    pub total_return: f64,
    pub roi_pct: f64,
    pub average_hits: f64,
    pub consistency_pct: f64,
    pub symmetry_score: f64,
    pub neighbor_factor: f64,
    pub ghost_numbers: Vec<Ball>,
    pub best_ever: Option<BestHit>,
}

impl BacktestReport {
    pub fn net(&self) -> f64 {
        self.total_return - self.total_investment
    }
}

/// Melhor acerto de qualquer jogo em `history`. Em empate vale o concurso que
/// aparece primeiro (o mais recente numa série decrescente).
pub fn best_ever(games: &[GameSelection], history: &[DrawRecord]) -> Option<BestHit> {
    let mut best: Option<BestHit> = None;
    for draw in history {
        for (game_index, game) in games.iter().enumerate() {
            let hits = game.hits(draw);
            if hits > 0 && best.as_ref().map_or(true, |b| hits > b.hits) {
                best = Some(BestHit {
                    contest: draw.contest_number(),
                    date: draw.draw_date(),
                    hits,
                    game_index,
                });
            }
        }
    }
    best
}

fn ghost_numbers(games: &[GameSelection], window: &[DrawRecord]) -> Vec<Ball> {
    if window.is_empty() {
        return Vec::new();
    }
    let drawn: BTreeSet<Ball> = window
        .iter()
        .flat_map(|d| d.drawn_numbers().iter().copied())
        .collect();
    let chosen: BTreeSet<Ball> = games
        .iter()
        .flat_map(|g| g.main_numbers.iter().copied())
        .collect();
    chosen.difference(&drawn).copied().collect()
}

/// Reaplica os jogos do usuário sobre a janela (ordem decrescente de concurso).
/// Entradas vazias produzem um relatório zerado, nunca um erro.
pub fn backtest(
    games: &[GameSelection],
    window: &[DrawRecord],
    geometry: &GameGeometry,
    prize_table: &PrizeTable,
    ticket_price: f64,
) -> BacktestReport {
    let outcomes: Vec<DrawOutcome> = window
        .iter()
        .map(|draw| {
            let hits: Vec<usize> = games.iter().map(|g| g.hits(draw)).collect();
            DrawOutcome {
                contest: draw.contest_number(),
                date: draw.draw_date(),
                best_hits: hits.iter().copied().max().unwrap_or(0),
                prize: hits.iter().map(|&h| prize_table.prize(h)).sum(),
                hits,
            }
        })
        .collect();

    let total_investment = games.len() as f64 * ticket_price * window.len() as f64;
    let total_return: f64 = outcomes.iter().map(|o| o.prize).sum();
    let roi_pct = if total_investment > 0.0 {
        (total_return - total_investment) / total_investment * 100.0
    } else {
        0.0
    };

    let average_hits = if outcomes.is_empty() {
        0.0
    } else {
        outcomes.iter().map(|o| o.best_hits).sum::<usize>() as f64 / outcomes.len() as f64
    };

    let recent = &outcomes[..outcomes.len().min(CONSISTENCY_WINDOW)];
    let consistency_pct = if recent.is_empty() {
        0.0
    } else {
        recent.iter().filter(|o| o.best_hits > 0).count() as f64 / recent.len() as f64 * 100.0
    };

    // simetria e vizinhança olham só para os jogos do usuário, não para os concursos
    let personal = compute_aggregate(games, geometry, &StatsOptions::default());
    let max_quadrant = personal.quadrants.max();
    let symmetry_score = if max_quadrant == 0 {
        0.0
    } else {
        100.0 - (max_quadrant - personal.quadrants.min()) as f64 / max_quadrant as f64 * 100.0
    };
    let neighbor_factor = if games.is_empty() {
        0.0
    } else {
        personal.consecutive_count as f64 / games.len() as f64 * 100.0
    };

    BacktestReport {
        games: games.len(),
        draws: window.len(),
        total_investment,
        total_return,
        roi_pct,
        average_hits,
        consistency_pct,
        symmetry_score,
        neighbor_factor,
        ghost_numbers: ghost_numbers(games, window),
        best_ever: best_ever(games, window),
        outcomes,
    }
}

/// Simula as apostas de uma modalidade sobre os `window` concursos mais recentes;
/// o melhor acerto é procurado na série inteira.
pub fn backtest_bets(
    bets: &[Bet],
    series: &DrawSeries,
    geometry: &GameGeometry,
    prize_table: &PrizeTable,
    ticket_price: f64,
    window: usize,
) -> BacktestReport {
    let games = selections_for_game(bets, &geometry.slug);
    let mut report = backtest(&games, series.recent(window), geometry, prize_table, ticket_price);
    report.best_ever = best_ever(&games, series);
    report
}
