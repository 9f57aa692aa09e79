use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use loterias_db::models::{Ball, DrawRecord, GameGeometry, GameSelection};

/// Qualquer item de janela que tenha dezenas escolhidas: um concurso oficial
/// (modo global) ou um jogo do usuário (modo pessoal).
pub trait Pick {
    fn picked(&self) -> &[Ball];
}

impl Pick for DrawRecord {
    fn picked(&self) -> &[Ball] {
        self.drawn_numbers()
    }
}

impl Pick for GameSelection {
    fn picked(&self) -> &[Ball] {
        &self.main_numbers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Global,
    Personal,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Global => write!(f, "global"),
            Mode::Personal => write!(f, "pessoal"),
        }
    }
}

pub const MIN_TOP_PAIRS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsOptions {
    pub top_pairs: usize,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self { top_pairs: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberCount {
    pub number: Ball,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    pub pair: (Ball, Ball),
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberDelay {
    pub number: Ball,
    pub delay: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumBucket {
    pub label: String,
    pub count: u32,
}

const SUM_BUCKETS: [(u32, &str); 6] = [
    (50, "0-50"),
    (100, "51-100"),
    (150, "101-150"),
    (200, "151-200"),
    (250, "201-250"),
    (u32::MAX, "250+"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantCounts {
    pub q1: u32,
    pub q2: u32,
    pub q3: u32,
    pub q4: u32,
}

impl QuadrantCounts {
    pub fn as_array(&self) -> [u32; 4] {
        [self.q1, self.q2, self.q3, self.q4]
    }

    pub fn max(&self) -> u32 {
        self.as_array().into_iter().max().unwrap_or(0)
    }

    pub fn min(&self) -> u32 {
        self.as_array().into_iter().min().unwrap_or(0)
    }
}

/// Quadrante (1..=4) de uma dezena na grade do volante.
/// 1 = alto-esquerda, 2 = alto-direita, 3 = baixo-esquerda, 4 = baixo-direita.
pub fn quadrant(geometry: &GameGeometry, ball: Ball) -> u8 {
    let width = geometry.grid_width.max(1) as u32;
    let position = geometry.grid_position(ball);
    let row = position.div_ceil(width);
    let col = match position % width {
        0 => width,
        c => c,
    };
    let middle_row = geometry.grid_rows().div_ceil(2);
    let middle_col = width.div_ceil(2);
    match (row <= middle_row, col <= middle_col) {
        (true, true) => 1,
        (true, false) => 2,
        (false, true) => 3,
        (false, false) => 4,
    }
}

/// Agregados de uma janela. Sempre reconstruído, nunca alterado no lugar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub record_count: usize,
    /// Ordenado por contagem decrescente; empates mantêm a ordem de aparição.
    pub frequency: Vec<NumberCount>,
    pub even_count: u32,
    pub odd_count: u32,
    pub prime_count: u32,
    pub average_sum: f64,
    pub sum_ranges: Vec<SumBucket>,
    pub quadrants: QuadrantCounts,
    pub consecutive_count: u32,
    pub top_pairs: Vec<PairCount>,
    /// Atraso de cada dezena da modalidade, em ordem crescente de dezena.
    pub delays: Vec<NumberDelay>,
}

impl AggregateStats {
    pub fn frequency_of(&self, ball: Ball) -> u32 {
        self.frequency
            .iter()
            .find(|c| c.number == ball)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn total_occurrences(&self) -> u32 {
        self.frequency.iter().map(|c| c.count).sum()
    }

    pub fn delay_of(&self, ball: Ball) -> Option<usize> {
        self.delays.iter().find(|d| d.number == ball).map(|d| d.delay)
    }

    /// As `n` dezenas mais e menos sorteadas da modalidade (inclui as nunca vistas).
    pub fn hot_cold(&self, geometry: &GameGeometry, n: usize) -> (Vec<NumberCount>, Vec<NumberCount>) {
        let all: Vec<NumberCount> = geometry
            .balls()
            .map(|number| NumberCount {
                number,
                count: self.frequency_of(number),
            })
            .collect();
        let mut hot = all.clone();
        hot.sort_by(|a, b| b.count.cmp(&a.count));
        hot.truncate(n);
        let mut cold = all;
        cold.sort_by(|a, b| a.count.cmp(&b.count));
        cold.truncate(n);
        (hot, cold)
    }
}

/// Contador que preserva a ordem da primeira aparição de cada chave.
pub(crate) struct OrderedCounter<K> {
    index: HashMap<K, usize>,
    entries: Vec<(K, u32)>,
}

impl<K: std::hash::Hash + Eq + Copy> OrderedCounter<K> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn increment(&mut self, key: K) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, 1));
            }
        }
    }

    pub(crate) fn ranked(mut self) -> Vec<(K, u32)> {
        // sort_by é estável: empates ficam na ordem de aparição
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries
    }
}

/// Calcula os agregados de uma janela, seja de concursos ou de jogos do usuário.
pub fn compute_aggregate<T: Pick>(
    window: &[T],
    geometry: &GameGeometry,
    options: &StatsOptions,
) -> AggregateStats {
    let mut frequency = OrderedCounter::new();
    let mut pairs = OrderedCounter::new();
    let mut even_count = 0u32;
    let mut odd_count = 0u32;
    let mut prime_count = 0u32;
    let mut total_sum = 0u64;
    let mut sum_counts = [0u32; SUM_BUCKETS.len()];
    let mut quadrants = QuadrantCounts::default();
    let mut consecutive_count = 0u32;

    for item in window {
        let mut numbers = item.picked().to_vec();
        numbers.sort_unstable();
        numbers.dedup();

        let mut record_sum = 0u32;
        for &ball in &numbers {
            frequency.increment(ball);
            if ball.is_even() {
                even_count += 1;
            } else {
                odd_count += 1;
            }
            if ball.is_prime() {
                prime_count += 1;
            }
            record_sum += ball.value() as u32;
            match quadrant(geometry, ball) {
                1 => quadrants.q1 += 1,
                2 => quadrants.q2 += 1,
                3 => quadrants.q3 += 1,
                _ => quadrants.q4 += 1,
            }
        }

        consecutive_count += numbers
            .windows(2)
            .filter(|w| w[1].value() - w[0].value() == 1)
            .count() as u32;

        for (i, &a) in numbers.iter().enumerate() {
            for &b in &numbers[i + 1..] {
                pairs.increment((a, b));
            }
        }

        total_sum += record_sum as u64;
        let bucket = SUM_BUCKETS
            .iter()
            .position(|&(upper, _)| record_sum <= upper)
            .unwrap_or(SUM_BUCKETS.len() - 1);
        sum_counts[bucket] += 1;
    }

    let average_sum = if window.is_empty() {
        0.0
    } else {
        total_sum as f64 / window.len() as f64
    };

    let mut top_pairs: Vec<PairCount> = pairs
        .ranked()
        .into_iter()
        .map(|(pair, count)| PairCount { pair, count })
        .collect();
    top_pairs.truncate(options.top_pairs.max(MIN_TOP_PAIRS));

    AggregateStats {
        record_count: window.len(),
        frequency: frequency
            .ranked()
            .into_iter()
            .map(|(number, count)| NumberCount { number, count })
            .collect(),
        even_count,
        odd_count,
        prime_count,
        average_sum,
        sum_ranges: SUM_BUCKETS
            .iter()
            .zip(sum_counts)
            .map(|(&(_, label), count)| SumBucket {
                label: label.to_string(),
                count,
            })
            .collect(),
        quadrants,
        consecutive_count,
        top_pairs,
        delays: delays(window, geometry),
    }
}

/// Atraso = posição do primeiro item (mais recente) que contém a dezena;
/// `window.len()` se ela nunca aparece.
fn delays<T: Pick>(window: &[T], geometry: &GameGeometry) -> Vec<NumberDelay> {
    geometry
        .balls()
        .map(|number| NumberDelay {
            number,
            delay: window
                .iter()
                .position(|item| item.picked().contains(&number))
                .unwrap_or(window.len()),
        })
        .collect()
}
