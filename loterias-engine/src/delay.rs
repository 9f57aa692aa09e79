use chrono::Months;
use serde::{Deserialize, Serialize};

use loterias_db::models::{Ball, DrawRecord, DrawSeries, GameGeometry};

use crate::stats::{NumberCount, OrderedCounter};

/// Limiares da razão entre a frequência na janela e a probabilidade teórica.
/// São escolhas de produto, não estatísticas medidas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendThresholds {
    pub very_high: f64,
    pub high: f64,
    pub low: f64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            very_high: 1.3,
            high: 1.1,
            low: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    VeryHigh,
    High,
    Normal,
    Low,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::VeryHigh => write!(f, "MUITO ALTA"),
            Trend::High => write!(f, "ALTA"),
            Trend::Normal => write!(f, "NORMAL"),
            Trend::Low => write!(f, "BAIXA"),
        }
    }
}

pub fn classify_trend(windowed: f64, theoretical: f64, thresholds: &TrendThresholds) -> Trend {
    if theoretical <= 0.0 {
        return Trend::Normal;
    }
    let ratio = windowed / theoretical;
    if ratio > thresholds.very_high {
        Trend::VeryHigh
    } else if ratio > thresholds.high {
        Trend::High
    } else if ratio < thresholds.low {
        Trend::Low
    } else {
        Trend::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    pub window_months: u32,
    pub partners: usize,
    pub thresholds: TrendThresholds,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            window_months: 12,
            partners: 3,
            thresholds: TrendThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberProfile {
    pub number: Ball,
    pub window_draws: usize,
    pub window_occurrences: usize,
    /// Ocorrências na janela / concursos na janela, em %.
    pub frequency_pct: f64,
    pub current_delay: usize,
    pub average_delay: Option<f64>,
    pub trend: Trend,
    pub partners: Vec<NumberCount>,
    /// Todos os concursos da série que contêm a dezena, do mais recente ao mais antigo.
    pub occurrences: Vec<DrawRecord>,
}

/// Quantidade de concursos mais recentes que o primeiro contendo `target`;
/// `draws.len()` se ele nunca saiu. `draws` em ordem decrescente.
pub fn current_delay(target: Ball, draws: &[DrawRecord]) -> usize {
    draws
        .iter()
        .position(|d| d.contains(target))
        .unwrap_or(draws.len())
}

/// Média das diferenças de número de concurso entre aparições consecutivas.
/// Usa os números de concurso, então buracos na série não distorcem a média.
pub fn average_delay(target: Ball, draws: &[DrawRecord]) -> Option<f64> {
    let appearances: Vec<u32> = draws
        .iter()
        .rev()
        .filter(|d| d.contains(target))
        .map(|d| d.contest_number())
        .collect();
    if appearances.len() < 2 {
        return None;
    }
    let total: u64 = appearances
        .windows(2)
        .map(|w| (w[1] - w[0]) as u64)
        .sum();
    Some(total as f64 / (appearances.len() - 1) as f64)
}

/// Concursos dos últimos `months` meses, contados a partir do concurso mais recente.
pub fn recent_months(draws: &[DrawRecord], months: u32) -> &[DrawRecord] {
    let Some(anchor) = draws.first().map(|d| d.draw_date()) else {
        return draws;
    };
    let Some(cutoff) = anchor.checked_sub_months(Months::new(months)) else {
        return draws;
    };
    let end = draws
        .iter()
        .position(|d| d.draw_date() <= cutoff)
        .unwrap_or(draws.len());
    &draws[..end]
}

pub fn number_profile(
    target: Ball,
    series: &DrawSeries,
    geometry: &GameGeometry,
    options: &ProfileOptions,
) -> NumberProfile {
    let window = recent_months(series.as_slice(), options.window_months);

    let mut partners = OrderedCounter::new();
    let mut window_occurrences = 0;
    for draw in window.iter().filter(|d| d.contains(target)) {
        window_occurrences += 1;
        for &other in draw.drawn_numbers().iter().filter(|&&b| b != target) {
            partners.increment(other);
        }
    }

    let windowed = if window.is_empty() {
        0.0
    } else {
        window_occurrences as f64 / window.len() as f64
    };

    let partners = partners
        .ranked()
        .into_iter()
        .take(options.partners)
        .map(|(number, count)| NumberCount { number, count })
        .collect();

    NumberProfile {
        number: target,
        window_draws: window.len(),
        window_occurrences,
        frequency_pct: windowed * 100.0,
        current_delay: current_delay(target, series),
        average_delay: average_delay(target, series),
        trend: classify_trend(windowed, geometry.theoretical_probability(), &options.thresholds),
        partners,
        occurrences: series.iter().filter(|d| d.contains(target)).cloned().collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayRow {
    pub number: Ball,
    pub current_delay: usize,
    pub average_delay: Option<f64>,
    pub last_contest: Option<u32>,
}

/// Atraso atual e médio de todas as dezenas da modalidade.
pub fn delay_table(series: &DrawSeries, geometry: &GameGeometry) -> Vec<DelayRow> {
    geometry
        .balls()
        .map(|number| DelayRow {
            number,
            current_delay: current_delay(number, series),
            average_delay: average_delay(number, series),
            last_contest: series
                .iter()
                .find(|d| d.contains(number))
                .map(|d| d.contest_number()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn megasena() -> GameGeometry {
        GameGeometry::for_slug("megasena").unwrap()
    }

    fn b(n: u8) -> Ball {
        Ball::new(n)
    }

    fn draw_on(contest: u32, date: NaiveDate, numbers: &[u8]) -> DrawRecord {
        DrawRecord::new(&megasena(), contest, date, numbers.iter().map(|&n| b(n)).collect()).unwrap()
    }

    /// Um concurso por semana a partir de 2023-01-01; a dezena 07 sai a cada 4 concursos.
    fn weekly_series(count: u32) -> DrawSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let records = (1..=count)
            .map(|c| {
                let date = start + chrono::Days::new(7 * (c as u64 - 1));
                if c % 4 == 0 {
                    draw_on(c, date, &[7, 11, 22, 33, 44, 55])
                } else {
                    draw_on(c, date, &[1, 2, 3, 4, 5, 6])
                }
            })
            .collect();
        DrawSeries::from_records(records)
    }

    #[test]
    fn test_current_delay_counts_more_recent_records() {
        let series = weekly_series(10);
        // 10, 9 sem a 07; 8 contém
        assert_eq!(current_delay(b(7), &series), 2);
        assert_eq!(current_delay(b(1), &series), 0);
        assert_eq!(current_delay(b(60), &series), 10);
    }

    #[test]
    fn test_average_delay() {
        let series = weekly_series(20);
        assert_eq!(average_delay(b(7), &series), Some(4.0));
        assert_eq!(average_delay(b(60), &series), None);

        let single = weekly_series(5);
        assert_eq!(average_delay(b(7), &single), None);
    }

    #[test]
    fn test_average_delay_tolerates_gaps() {
        let full = weekly_series(20);
        let with_gaps: Vec<DrawRecord> = full
            .iter()
            .filter(|d| ![10, 11, 13].contains(&d.contest_number()))
            .cloned()
            .collect();
        let series = DrawSeries::from_records(with_gaps);
        assert_eq!(series.missing_contests(), vec![13, 11, 10]);
        assert_eq!(average_delay(b(7), &series), Some(4.0));
    }

    #[test]
    fn test_recent_months_window() {
        let series = weekly_series(104);
        let window = recent_months(&series, 12);
        assert!(window.len() >= 52 && window.len() <= 53);
        let anchor = series[0].draw_date();
        assert!(window.iter().all(|d| anchor - d.draw_date() < chrono::Duration::days(367)));
        assert!(recent_months(&[], 12).is_empty());
    }

    #[test]
    fn test_trend_classification() {
        let t = TrendThresholds::default();
        assert_eq!(classify_trend(0.14, 0.1, &t), Trend::VeryHigh);
        assert_eq!(classify_trend(0.12, 0.1, &t), Trend::High);
        assert_eq!(classify_trend(0.10, 0.1, &t), Trend::Normal);
        assert_eq!(classify_trend(0.05, 0.1, &t), Trend::Low);
        assert_eq!(classify_trend(0.05, 0.0, &t), Trend::Normal);

        let strict = TrendThresholds { very_high: 2.0, high: 1.5, low: 0.2 };
        assert_eq!(classify_trend(0.14, 0.1, &strict), Trend::Normal);
    }

    #[test]
    fn test_number_profile() {
        let g = megasena();
        let series = weekly_series(104);
        let profile = number_profile(b(7), &series, &g, &ProfileOptions::default());

        assert_eq!(profile.current_delay, 0);
        assert_eq!(profile.average_delay, Some(4.0));
        assert_eq!(profile.occurrences.len(), 26);
        assert_eq!(profile.occurrences[0].contest_number(), 104);
        // 1 a cada 4 concursos = 25%, contra 10% teóricos
        assert!((profile.frequency_pct - 25.0).abs() < 1.0);
        assert_eq!(profile.trend, Trend::VeryHigh);
        let partners: Vec<Ball> = profile.partners.iter().map(|p| p.number).collect();
        assert_eq!(partners, vec![b(11), b(22), b(33)]);
        assert_eq!(profile.partners[0].count as usize, profile.window_occurrences);

        let rare = number_profile(b(60), &series, &g, &ProfileOptions::default());
        assert_eq!(rare.trend, Trend::Low);
        assert_eq!(rare.current_delay, 104);
        assert!(rare.partners.is_empty());
    }

    #[test]
    fn test_profile_on_empty_series() {
        let profile = number_profile(b(7), &DrawSeries::default(), &megasena(), &ProfileOptions::default());
        assert_eq!(profile.window_draws, 0);
        assert_eq!(profile.frequency_pct, 0.0);
        assert_eq!(profile.current_delay, 0);
        assert_eq!(profile.average_delay, None);
    }

    #[test]
    fn test_delay_table() {
        let series = weekly_series(10);
        let table = delay_table(&series, &megasena());
        assert_eq!(table.len(), 60);
        let seven = &table[6];
        assert_eq!(seven.number, b(7));
        assert_eq!(seven.current_delay, 2);
        assert_eq!(seven.last_contest, Some(8));
        assert_eq!(table[59].last_contest, None);
    }
}
