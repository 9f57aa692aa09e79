use std::sync::Arc;

use tracing::info;

use loterias_db::models::{Ball, Bet, DrawRecord, DrawSeries, GameGeometry, GameSelection};

use crate::backtest::{backtest_bets, BacktestReport};
use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::delay::{number_profile, NumberProfile};
use crate::error::SyncError;
use crate::reconcile::{fill_window, reconcile, Reconciliation};
use crate::source::DrawSource;
use crate::stats::{compute_aggregate, AggregateStats, Mode};

/// Serviço de uma sessão de uso: fonte ao vivo, cache e configuração.
pub struct Session {
    source: Box<dyn DrawSource>,
    cache: ResultCache,
    config: EngineConfig,
}

impl Session {
    pub fn new(source: Box<dyn DrawSource>, config: EngineConfig) -> Self {
        Self::with_cache(source, config, ResultCache::new())
    }

    pub fn with_cache(source: Box<dyn DrawSource>, config: EngineConfig, cache: ResultCache) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Concilia sempre, ignorando o cache, e guarda o resultado.
    pub async fn refresh(
        &mut self,
        geometry: &GameGeometry,
        snapshot: Option<&[DrawRecord]>,
    ) -> Result<Reconciliation, SyncError> {
        let reconciliation = reconcile(self.source.as_ref(), geometry, snapshot).await?;
        self.cache
            .store_series(&geometry.slug, Mode::Global, reconciliation.series.clone());
        Ok(reconciliation)
    }

    /// Série em cache ou, na primeira chamada, conciliada a partir do snapshot.
    pub async fn series(
        &mut self,
        geometry: &GameGeometry,
        snapshot: Option<&[DrawRecord]>,
    ) -> Result<Arc<DrawSeries>, SyncError> {
        if let Some(series) = self.cache.series(&geometry.slug, Mode::Global) {
            return Ok(series);
        }
        self.refresh(geometry, snapshot).await?;
        self.cache
            .series(&geometry.slug, Mode::Global)
            .ok_or_else(|| SyncError::SourceUnavailable {
                game: geometry.slug.clone(),
                reason: "série ausente após conciliação".to_string(),
            })
    }

    pub async fn global_stats(
        &mut self,
        geometry: &GameGeometry,
        snapshot: Option<&[DrawRecord]>,
    ) -> Result<Arc<AggregateStats>, SyncError> {
        if let Some(stats) = self.cache.aggregate(&geometry.slug, Mode::Global) {
            return Ok(stats);
        }
        let series = self.series(geometry, snapshot).await?;
        let stats = compute_aggregate(series.as_slice(), geometry, &self.config.stats);
        Ok(self.cache.store_aggregate(&geometry.slug, Mode::Global, stats))
    }

    /// Recalculado a cada chamada: o conjunto de jogos muda de uma consulta para outra.
    pub fn personal_stats(&self, geometry: &GameGeometry, games: &[GameSelection]) -> AggregateStats {
        compute_aggregate(games, geometry, &self.config.stats)
    }

    /// Calculado a cada consulta; não fica em cache.
    pub async fn profile(
        &mut self,
        geometry: &GameGeometry,
        snapshot: Option<&[DrawRecord]>,
        target: Ball,
    ) -> Result<NumberProfile, SyncError> {
        let series = self.series(geometry, snapshot).await?;
        Ok(number_profile(target, &series, geometry, &self.config.profile))
    }

    /// Completa os concursos que faltam na janela antes de simular.
    pub async fn backtest(
        &mut self,
        geometry: &GameGeometry,
        snapshot: Option<&[DrawRecord]>,
        bets: &[Bet],
        window: u32,
    ) -> Result<BacktestReport, SyncError> {
        let series = self.series(geometry, snapshot).await?;
        let (filled, lost) = fill_window(self.source.as_ref(), geometry, &series, window).await;
        let series = if filled.len() != series.len() {
            info!(game = %geometry.slug, added = filled.len() - series.len(), lost, "janela completada");
            self.cache.store_series(&geometry.slug, Mode::Global, filled)
        } else {
            series
        };

        let game = self.config.game(&geometry.slug);
        Ok(backtest_bets(
            bets,
            &series,
            geometry,
            &game.prize_table,
            game.ticket_price,
            window as usize,
        ))
    }
}
