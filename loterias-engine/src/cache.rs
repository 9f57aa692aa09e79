use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use loterias_db::models::DrawSeries;

use crate::stats::{AggregateStats, Mode};

pub type CacheKey = (String, Mode);

#[derive(Debug, Clone, Default)]
struct CachedResult {
    series: Option<Arc<DrawSeries>>,
    aggregate: Option<Arc<AggregateStats>>,
}

/// Memoização por (modalidade, modo) durante uma sessão. Nada é removido;
/// uma nova conciliação substitui o valor da entrada.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<CacheKey, CachedResult>,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(game: &str, mode: Mode) -> CacheKey {
        (game.to_string(), mode)
    }

    fn record<T>(&mut self, game: &str, mode: Mode, value: Option<T>, what: &str) -> Option<T> {
        if value.is_some() {
            self.hits += 1;
            debug!(game, %mode, what, "cache hit");
        } else {
            self.misses += 1;
        }
        value
    }

    pub fn series(&mut self, game: &str, mode: Mode) -> Option<Arc<DrawSeries>> {
        let value = self
            .entries
            .get(&Self::key(game, mode))
            .and_then(|e| e.series.clone());
        self.record(game, mode, value, "series")
    }

    /// Guarda a série; o agregado da mesma entrada deixa de valer.
    pub fn store_series(&mut self, game: &str, mode: Mode, series: DrawSeries) -> Arc<DrawSeries> {
        let series = Arc::new(series);
        let entry = self.entries.entry(Self::key(game, mode)).or_default();
        entry.series = Some(Arc::clone(&series));
        entry.aggregate = None;
        series
    }

    pub fn aggregate(&mut self, game: &str, mode: Mode) -> Option<Arc<AggregateStats>> {
        let value = self
            .entries
            .get(&Self::key(game, mode))
            .and_then(|e| e.aggregate.clone());
        self.record(game, mode, value, "aggregate")
    }

    pub fn store_aggregate(&mut self, game: &str, mode: Mode, stats: AggregateStats) -> Arc<AggregateStats> {
        let stats = Arc::new(stats);
        self.entries
            .entry(Self::key(game, mode))
            .or_default()
            .aggregate = Some(Arc::clone(&stats));
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
