use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use loterias_db::models::{DrawRecord, DrawSeries, GameGeometry};

use crate::error::SyncError;
use crate::source::DrawSource;

/// A partir desta diferença o snapshot local é descartado.
pub const GAP_LIMIT: u32 = 50;
/// Tamanho da janela buscada quando o snapshot é inutilizável.
pub const FALLBACK_WINDOW: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconcileStrategy {
    UpToDate,
    GapFill { requested: usize },
    Fallback { requested: usize },
}

impl std::fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileStrategy::UpToDate => write!(f, "em dia"),
            ReconcileStrategy::GapFill { requested } => {
                write!(f, "complemento de {} concursos", requested)
            }
            ReconcileStrategy::Fallback { requested } => {
                write!(f, "janela de {} concursos (snapshot descartado)", requested)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub series: DrawSeries,
    pub strategy: ReconcileStrategy,
    /// Buscas que falharam ou voltaram vazias/malformadas.
    pub lost: usize,
}

impl Reconciliation {
    pub fn is_partial(&self) -> bool {
        self.lost > 0
    }
}

/// Busca os concursos em paralelo. As falhas são registradas e descartadas;
/// devolve os registros obtidos e a quantidade perdida.
pub async fn fetch_contests(
    source: &dyn DrawSource,
    geometry: &GameGeometry,
    contests: &[u32],
) -> (Vec<DrawRecord>, usize) {
    let game = geometry.slug.as_str();
    let results = join_all(contests.iter().map(|&contest| async move {
        (contest, source.by_contest(game, contest).await)
    }))
    .await;

    let mut records = Vec::with_capacity(results.len());
    let mut lost = 0;
    for (contest, result) in results {
        match result {
            Ok(Some(raw)) => match raw.into_record(geometry) {
                Ok(draw) => records.push(draw),
                Err(e) => {
                    warn!(game, contest, error = %e, "concurso malformado descartado");
                    lost += 1;
                }
            },
            Ok(None) => {
                warn!(game, contest, "concurso não encontrado na fonte");
                lost += 1;
            }
            Err(e) => {
                warn!(game, contest, error = %e, "falha ao buscar concurso");
                lost += 1;
            }
        }
    }
    (records, lost)
}

async fn fetch_latest(source: &dyn DrawSource, geometry: &GameGeometry) -> Result<DrawRecord, SyncError> {
    let unavailable = |reason: String| SyncError::SourceUnavailable {
        game: geometry.slug.clone(),
        reason,
    };
    match source.latest(&geometry.slug).await {
        Ok(Some(raw)) => raw
            .into_record(geometry)
            .map_err(|e| unavailable(format!("último concurso malformado: {}", e))),
        Ok(None) => Err(unavailable("nenhum concurso retornado".to_string())),
        Err(e) => Err(unavailable(e.to_string())),
    }
}

/// Busca os concursos de `oldest` até o anterior ao último; o último já veio
/// validado de `latest()` e entra na frente sem nova busca.
async fn recover_down_to(
    source: &dyn DrawSource,
    geometry: &GameGeometry,
    latest: DrawRecord,
    oldest: u32,
) -> (Vec<DrawRecord>, usize) {
    let contests: Vec<u32> = (oldest..latest.contest_number()).rev().collect();
    let (records, lost) = fetch_contests(source, geometry, &contests).await;
    let mut recovered = Vec::with_capacity(records.len() + 1);
    recovered.push(latest);
    recovered.extend(records);
    (recovered, lost)
}

/// Concilia um snapshot local (possivelmente ausente ou defasado) com a fonte
/// ao vivo. Só a falha do "último concurso" é fatal.
pub async fn reconcile(
    source: &dyn DrawSource,
    geometry: &GameGeometry,
    snapshot: Option<&[DrawRecord]>,
) -> Result<Reconciliation, SyncError> {
    let snapshot = snapshot.unwrap_or(&[]);
    let last_stored = snapshot.iter().map(|d| d.contest_number()).max().unwrap_or(0);

    let latest = fetch_latest(source, geometry).await?;
    let latest_contest = latest.contest_number();
    let gap = latest_contest as i64 - last_stored as i64;

    if !snapshot.is_empty() && gap <= 0 {
        info!(game = %geometry.slug, latest_contest, last_stored, "snapshot em dia");
        return Ok(Reconciliation {
            series: DrawSeries::from_records(snapshot.to_vec()),
            strategy: ReconcileStrategy::UpToDate,
            lost: 0,
        });
    }

    if !snapshot.is_empty() && gap < GAP_LIMIT as i64 {
        let requested = gap as usize;
        let (mut records, lost) = recover_down_to(source, geometry, latest, last_stored + 1).await;
        info!(
            game = %geometry.slug,
            requested,
            recovered = records.len(),
            lost,
            "complemento do snapshot"
        );
        records.extend_from_slice(snapshot);
        return Ok(Reconciliation {
            series: DrawSeries::from_records(records),
            strategy: ReconcileStrategy::GapFill { requested },
            lost,
        });
    }

    let oldest = latest_contest.saturating_sub(FALLBACK_WINDOW - 1).max(1);
    let requested = (latest_contest - oldest + 1) as usize;
    let (records, lost) = recover_down_to(source, geometry, latest, oldest).await;
    info!(
        game = %geometry.slug,
        last_stored,
        latest_contest,
        recovered = records.len(),
        lost,
        "snapshot inutilizável, janela fixa"
    );
    Ok(Reconciliation {
        series: DrawSeries::from_records(records),
        strategy: ReconcileStrategy::Fallback { requested },
        lost,
    })
}

/// Garante que os `window` concursos mais recentes da série estejam presentes,
/// buscando os que faltam. Falhas continuam como buracos.
pub async fn fill_window(
    source: &dyn DrawSource,
    geometry: &GameGeometry,
    series: &DrawSeries,
    window: u32,
) -> (DrawSeries, usize) {
    let latest = series.latest_contest();
    if latest == 0 || window == 0 {
        return (series.clone(), 0);
    }
    let oldest = latest.saturating_sub(window - 1).max(1);
    let missing: Vec<u32> = (oldest..=latest)
        .rev()
        .filter(|&c| series.find(c).is_none())
        .collect();
    if missing.is_empty() {
        return (series.clone(), 0);
    }
    let (mut records, lost) = fetch_contests(source, geometry, &missing).await;
    records.extend_from_slice(series.as_slice());
    (DrawSeries::from_records(records), lost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::{numbered_source, raw, FakeSource};
    use loterias_db::models::Ball;
    use std::collections::HashSet;

    fn megasena() -> GameGeometry {
        GameGeometry::for_slug("megasena").unwrap()
    }

    fn snapshot_up_to(last: u32, len: u32) -> Vec<DrawRecord> {
        let g = megasena();
        let source = numbered_source(last);
        (last + 1 - len..=last)
            .map(|c| source.draws[&c].clone().into_record(&g).unwrap())
            .collect()
    }

    fn contests(series: &DrawSeries) -> Vec<u32> {
        series.iter().map(|d| d.contest_number()).collect()
    }

    #[tokio::test]
    async fn test_gap_below_limit_fetches_each_contest() {
        let source = numbered_source(149);
        let snapshot = snapshot_up_to(100, 10);

        let result = reconcile(&source, &megasena(), Some(snapshot.as_slice())).await.unwrap();
        // 48 buscas por concurso + o último, que vem de latest()
        assert_eq!(source.calls(), 48);
        assert_eq!(result.strategy, ReconcileStrategy::GapFill { requested: 49 });
        assert_eq!(result.series.len(), 59);
        assert_eq!(result.series.latest_contest(), 149);
        assert!(result.series.missing_contests().is_empty());
    }

    #[tokio::test]
    async fn test_gap_at_limit_falls_back_to_fixed_window() {
        let source = numbered_source(150);
        let snapshot = snapshot_up_to(100, 10);

        let result = reconcile(&source, &megasena(), Some(snapshot.as_slice())).await.unwrap();
        assert_eq!(source.calls(), 19);
        assert_eq!(result.strategy, ReconcileStrategy::Fallback { requested: 20 });
        assert_eq!(contests(&result.series), (131..=150).rev().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_or_absent_snapshot_falls_back() {
        let source = numbered_source(30);
        let result = reconcile(&source, &megasena(), None).await.unwrap();
        assert_eq!(result.series.len(), 20);
        assert_eq!(result.series.latest_contest(), 30);

        let source = numbered_source(5);
        let result = reconcile(&source, &megasena(), Some(&[][..])).await.unwrap();
        assert_eq!(source.calls(), 4);
        assert_eq!(contests(&result.series), vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_up_to_date_snapshot_unchanged() {
        let source = numbered_source(100);
        let snapshot = snapshot_up_to(100, 5);
        let result = reconcile(&source, &megasena(), Some(snapshot.as_slice())).await.unwrap();
        assert_eq!(source.calls(), 0);
        assert_eq!(result.strategy, ReconcileStrategy::UpToDate);
        assert_eq!(contests(&result.series), vec![100, 99, 98, 97, 96]);
    }

    #[tokio::test]
    async fn test_idempotent() {
        let source = numbered_source(120);
        let snapshot = snapshot_up_to(100, 10);
        let first = reconcile(&source, &megasena(), Some(snapshot.as_slice())).await.unwrap();
        let second = reconcile(&source, &megasena(), Some(snapshot.as_slice())).await.unwrap();
        assert_eq!(first.series, second.series);

        let third = reconcile(&source, &megasena(), Some(first.series.as_slice())).await.unwrap();
        assert_eq!(third.series, first.series);
        assert_eq!(third.strategy, ReconcileStrategy::UpToDate);
    }

    #[tokio::test]
    async fn test_partial_loss_leaves_visible_gap() {
        let mut source = numbered_source(110);
        source.failing.insert(105);
        source.draws.remove(&107);
        source
            .draws
            .insert(108, raw(108, &[1, 2, 3]));
        let snapshot = snapshot_up_to(100, 3);

        let result = reconcile(&source, &megasena(), Some(snapshot.as_slice())).await.unwrap();
        assert_eq!(result.lost, 3);
        assert!(result.is_partial());
        assert_eq!(result.series.missing_contests(), vec![108, 107, 105]);

        let unique: HashSet<u32> = contests(&result.series).into_iter().collect();
        assert_eq!(unique.len(), result.series.len());
    }

    #[tokio::test]
    async fn test_only_contests_after_last_stored_are_fetched() {
        let g = megasena();
        let source = numbered_source(102);
        let mut snapshot = snapshot_up_to(100, 3);
        // registro local divergente da fonte para o concurso 101
        let date = snapshot[0].draw_date();
        let stale = DrawRecord::new(&g, 101, date, (40..46).map(Ball::new).collect()).unwrap();
        snapshot.push(stale);

        // o maior concurso local agora é 101: só falta o 102, que já vem de latest()
        let result = reconcile(&source, &g, Some(snapshot.as_slice())).await.unwrap();
        assert_eq!(source.calls(), 0);
        assert_eq!(result.series.find(101).unwrap().drawn_numbers()[0], Ball::new(40));
        assert_eq!(result.series.latest_contest(), 102);
    }

    #[tokio::test]
    async fn test_latest_record_kept_when_its_contest_fetch_fails() {
        let mut source = numbered_source(130);
        source.failing.insert(130);
        let snapshot = snapshot_up_to(100, 5);
        let gap = reconcile(&source, &megasena(), Some(snapshot.as_slice())).await.unwrap();
        assert_eq!(gap.series.latest_contest(), 130);
        assert_eq!(gap.lost, 0);
        assert!(gap.series.missing_contests().is_empty());

        let fallback = reconcile(&source, &megasena(), None).await.unwrap();
        assert_eq!(contests(&fallback.series), (111..=130).rev().collect::<Vec<_>>());
        assert_eq!(fallback.lost, 0);
    }

    #[tokio::test]
    async fn test_latest_failure_is_distinct_error() {
        let source = FakeSource {
            latest_fails: true,
            ..Default::default()
        };
        let err = reconcile(&source, &megasena(), None).await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
        assert!(err.is_retryable());
        assert_eq!(source.calls(), 0);

        let empty = FakeSource::default();
        let err = reconcile(&empty, &megasena(), None).await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fill_window_fetches_only_missing() {
        let g = megasena();
        let source = numbered_source(50);
        let partial: Vec<DrawRecord> = snapshot_up_to(50, 10)
            .into_iter()
            .filter(|d| d.contest_number() % 3 != 0)
            .collect();
        let series = DrawSeries::from_records(partial);

        let (filled, lost) = fill_window(&source, &g, &series, 10).await;
        assert_eq!(lost, 0);
        assert_eq!(source.calls(), 3);
        assert_eq!(contests(&filled), (41..=50).rev().collect::<Vec<_>>());
    }
}
