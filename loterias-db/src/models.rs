use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Erros de validação de um concurso ou de uma dezena.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrawError {
    #[error("dezena inválida: '{0}'")]
    InvalidBall(String),
    #[error("dezena {ball} fora dos limites ({min:02}-{max:02})")]
    OutOfRange { ball: Ball, min: u8, max: u8 },
    #[error("dezena em duplicidade: {0}")]
    Duplicate(Ball),
    #[error("quantidade de dezenas inválida: esperado {expected}, recebido {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("número de concurso inválido: {0}")]
    InvalidContest(u32),
    #[error("data inválida: '{0}'")]
    InvalidDate(String),
    #[error("campo obrigatório ausente: {0}")]
    MissingField(&'static str),
    #[error("jogo desconhecido: '{0}'")]
    UnknownGame(String),
}

/// Uma dezena. Exibida e serializada sempre com dois dígitos ("05").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ball(u8);

impl Ball {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_even(self) -> bool {
        self.0 % 2 == 0
    }

    /// Divisão por tentativa até a raiz; suficiente para dezenas até 99.
    pub fn is_prime(self) -> bool {
        let n = self.0 as u32;
        if n < 2 {
            return false;
        }
        let mut d = 2;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }
}

impl fmt::Display for Ball {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for Ball {
    type Err = DrawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 2 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DrawError::InvalidBall(s.to_string()));
        }
        trimmed
            .parse::<u8>()
            .map(Ball)
            .map_err(|_| DrawError::InvalidBall(s.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BallRepr {
    Text(String),
    Int(u8),
}

impl TryFrom<BallRepr> for Ball {
    type Error = DrawError;

    fn try_from(repr: BallRepr) -> Result<Self, Self::Error> {
        match repr {
            BallRepr::Text(s) => s.parse(),
            BallRepr::Int(n) if n <= 99 => Ok(Ball(n)),
            BallRepr::Int(n) => Err(DrawError::InvalidBall(n.to_string())),
        }
    }
}

impl Serialize for Ball {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ball {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = BallRepr::deserialize(deserializer)?;
        Ball::try_from(repr).map_err(serde::de::Error::custom)
    }
}

/// Lê uma lista "01 02 03", "01-02-03" ou "01,02,03".
pub fn parse_balls(raw: &str) -> Result<Vec<Ball>, DrawError> {
    raw.split(|c: char| c.is_whitespace() || c == '-' || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Geometria fixa de uma modalidade: faixa de dezenas, tamanho do sorteio e
/// largura da grade do volante.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameGeometry {
    pub slug: String,
    pub min_number: u8,
    pub max_number: u8,
    pub draw_size: usize,
    pub grid_width: u8,
}

const CATALOGUE: &[(&str, u8, u8, usize, u8)] = &[
    ("megasena", 1, 60, 6, 10),
    ("quina", 1, 80, 5, 10),
    ("lotofacil", 1, 25, 15, 5),
    ("lotomania", 0, 99, 20, 10),
    ("timemania", 1, 80, 7, 10),
    ("diadesorte", 1, 31, 7, 7),
    ("duplasena", 1, 50, 6, 10),
    ("maismilionaria", 1, 50, 6, 10),
];

impl GameGeometry {
    pub fn new(slug: &str, min_number: u8, max_number: u8, draw_size: usize, grid_width: u8) -> Self {
        Self {
            slug: slug.to_string(),
            min_number,
            max_number,
            draw_size,
            grid_width,
        }
    }

    pub fn for_slug(slug: &str) -> Result<Self, DrawError> {
        CATALOGUE
            .iter()
            .find(|(s, ..)| *s == slug)
            .map(|&(s, min, max, size, width)| Self::new(s, min, max, size, width))
            .ok_or_else(|| DrawError::UnknownGame(slug.to_string()))
    }

    pub fn slugs() -> impl Iterator<Item = &'static str> {
        CATALOGUE.iter().map(|(s, ..)| *s)
    }

    pub fn range(&self) -> usize {
        (self.max_number as usize + 1).saturating_sub(self.min_number as usize)
    }

    /// draw_size / range: chance de uma dezena qualquer ser sorteada.
    pub fn theoretical_probability(&self) -> f64 {
        let range = self.range();
        if range == 0 {
            return 0.0;
        }
        self.draw_size as f64 / range as f64
    }

    pub fn contains(&self, ball: Ball) -> bool {
        (self.min_number..=self.max_number).contains(&ball.value())
    }

    pub fn balls(&self) -> impl Iterator<Item = Ball> {
        (self.min_number..=self.max_number).map(Ball::new)
    }

    /// Posição na grade; o "00" da Lotomania ocupa a última casa.
    pub fn grid_position(&self, ball: Ball) -> u32 {
        match ball.value() {
            0 => self.range() as u32,
            n => n as u32,
        }
    }

    pub fn grid_rows(&self) -> u32 {
        let width = self.grid_width.max(1) as u32;
        (self.range() as u32).div_ceil(width)
    }
}

/// Um concurso oficial. Imutável: os campos só são acessíveis para leitura.
///
/// `Deserialize` não conhece a modalidade e por isso não valida as dezenas:
/// registros lidos de JSON devem passar por [`DrawRecord::revalidated`] antes
/// do uso (é o que `load_snapshot` faz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRecord {
    contest_number: u32,
    draw_date: NaiveDate,
    drawn_numbers: Vec<Ball>,
    accumulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collected_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    winners_count: Option<u32>,
}

impl DrawRecord {
    pub fn new(
        geometry: &GameGeometry,
        contest_number: u32,
        draw_date: NaiveDate,
        numbers: Vec<Ball>,
    ) -> Result<Self, DrawError> {
        if contest_number == 0 {
            return Err(DrawError::InvalidContest(contest_number));
        }
        let drawn_numbers = validate_numbers(geometry, numbers)?;
        Ok(Self {
            contest_number,
            draw_date,
            drawn_numbers,
            accumulated: false,
            collected_amount: None,
            winners_count: None,
        })
    }

    pub fn with_accumulated(mut self, accumulated: bool) -> Self {
        self.accumulated = accumulated;
        self
    }

    pub fn with_collected_amount(mut self, amount: Option<f64>) -> Self {
        self.collected_amount = amount;
        self
    }

    pub fn with_winners_count(mut self, winners: Option<u32>) -> Self {
        self.winners_count = winners;
        self
    }

    /// Registros vindos de JSON não passam pelo construtor: refaz a validação
    /// e reordena as dezenas.
    pub fn revalidated(self, geometry: &GameGeometry) -> Result<Self, DrawError> {
        if self.contest_number == 0 {
            return Err(DrawError::InvalidContest(self.contest_number));
        }
        let drawn_numbers = validate_numbers(geometry, self.drawn_numbers)?;
        Ok(Self { drawn_numbers, ..self })
    }

    pub fn contest_number(&self) -> u32 {
        self.contest_number
    }

    pub fn draw_date(&self) -> NaiveDate {
        self.draw_date
    }

    /// Dezenas em ordem crescente.
    pub fn drawn_numbers(&self) -> &[Ball] {
        &self.drawn_numbers
    }

    pub fn contains(&self, ball: Ball) -> bool {
        self.drawn_numbers.binary_search(&ball).is_ok()
    }

    pub fn accumulated(&self) -> bool {
        self.accumulated
    }

    pub fn collected_amount(&self) -> Option<f64> {
        self.collected_amount
    }

    pub fn winners_count(&self) -> Option<u32> {
        self.winners_count
    }
}

/// Verifica limites, duplicidade e quantidade; devolve as dezenas ordenadas.
pub fn validate_numbers(geometry: &GameGeometry, numbers: Vec<Ball>) -> Result<Vec<Ball>, DrawError> {
    if numbers.len() != geometry.draw_size {
        return Err(DrawError::WrongCount {
            expected: geometry.draw_size,
            actual: numbers.len(),
        });
    }
    let mut seen = HashSet::with_capacity(numbers.len());
    for &ball in &numbers {
        if !geometry.contains(ball) {
            return Err(DrawError::OutOfRange {
                ball,
                min: geometry.min_number,
                max: geometry.max_number,
            });
        }
        if !seen.insert(ball) {
            return Err(DrawError::Duplicate(ball));
        }
    }
    let mut sorted = numbers;
    sorted.sort_unstable();
    Ok(sorted)
}

/// Aceita "2024-01-31" ou "31/01/2024".
pub fn parse_date(raw: &str) -> Result<NaiveDate, DrawError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .map_err(|_| DrawError::InvalidDate(raw.to_string()))
}

/// Histórico ordenado por concurso decrescente (mais recente primeiro), sem repetição.
/// Buracos na numeração são tolerados, mas expostos por `missing_contests`.
/// Desserializar ordena e remove repetições, mas não revalida as dezenas de
/// cada registro; veja [`DrawRecord::revalidated`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<DrawRecord>", into = "Vec<DrawRecord>")]
pub struct DrawSeries {
    draws: Vec<DrawRecord>,
}

impl DrawSeries {
    /// Em caso de repetição, vale a primeira ocorrência em `records`.
    pub fn from_records(records: Vec<DrawRecord>) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let mut draws: Vec<DrawRecord> = records
            .into_iter()
            .filter(|d| seen.insert(d.contest_number))
            .collect();
        draws.sort_by(|a, b| b.contest_number.cmp(&a.contest_number));
        Self { draws }
    }

    pub fn as_slice(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn into_vec(self) -> Vec<DrawRecord> {
        self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn latest(&self) -> Option<&DrawRecord> {
        self.draws.first()
    }

    pub fn latest_contest(&self) -> u32 {
        self.draws.first().map(|d| d.contest_number).unwrap_or(0)
    }

    /// Os `n` concursos mais recentes.
    pub fn recent(&self, n: usize) -> &[DrawRecord] {
        &self.draws[..n.min(self.draws.len())]
    }

    pub fn find(&self, contest: u32) -> Option<&DrawRecord> {
        self.draws
            .binary_search_by(|d| contest.cmp(&d.contest_number))
            .ok()
            .map(|i| &self.draws[i])
    }

    /// Concursos ausentes entre o mais antigo e o mais recente, em ordem decrescente.
    pub fn missing_contests(&self) -> Vec<u32> {
        self.draws
            .windows(2)
            .flat_map(|pair| (pair[1].contest_number + 1..pair[0].contest_number).rev())
            .collect()
    }
}

impl From<Vec<DrawRecord>> for DrawSeries {
    fn from(records: Vec<DrawRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<DrawSeries> for Vec<DrawRecord> {
    fn from(series: DrawSeries) -> Self {
        series.draws
    }
}

impl std::ops::Deref for DrawSeries {
    type Target = [DrawRecord];

    fn deref(&self) -> &Self::Target {
        &self.draws
    }
}

/// Um jogo de uma aposta: dezenas principais (+ extras como mês ou time do coração).
/// As dezenas principais formam um conjunto: ordenadas e sem repetição, também
/// quando lidas de JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SelectionRepr")]
pub struct GameSelection {
    pub main_numbers: Vec<Ball>,
    #[serde(default)]
    pub extra_numbers: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionRepr {
    main_numbers: Vec<Ball>,
    #[serde(default)]
    extra_numbers: Vec<String>,
}

impl From<SelectionRepr> for GameSelection {
    fn from(repr: SelectionRepr) -> Self {
        Self {
            extra_numbers: repr.extra_numbers,
            ..Self::new(repr.main_numbers)
        }
    }
}

impl GameSelection {
    pub fn new(mut main_numbers: Vec<Ball>) -> Self {
        main_numbers.sort_unstable();
        main_numbers.dedup();
        Self {
            main_numbers,
            extra_numbers: Vec::new(),
        }
    }

    pub fn hits(&self, draw: &DrawRecord) -> usize {
        self.main_numbers.iter().filter(|&&b| draw.contains(b)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: String,
    pub game_slug: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_contest_number: Option<u32>,
    pub games: Vec<GameSelection>,
}

#[cfg(test)]
pub(crate) fn test_draw(contest: u32, numbers: &[u8]) -> DrawRecord {
    let geometry = GameGeometry::for_slug("megasena").unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(contest as u64 * 3);
    DrawRecord::new(&geometry, contest, date, numbers.iter().map(|&n| Ball::new(n)).collect()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn megasena() -> GameGeometry {
        GameGeometry::for_slug("megasena").unwrap()
    }

    #[test]
    fn test_ball_padding() {
        assert_eq!(Ball::new(5).to_string(), "05");
        assert_eq!("5".parse::<Ball>().unwrap(), "05".parse::<Ball>().unwrap());
        assert!("100".parse::<Ball>().is_err());
        assert!("a1".parse::<Ball>().is_err());
        assert!("".parse::<Ball>().is_err());
    }

    #[test]
    fn test_ball_serde_as_padded_string() {
        let json = serde_json::to_string(&vec![Ball::new(1), Ball::new(42)]).unwrap();
        assert_eq!(json, r#"["01","42"]"#);
        let balls: Vec<Ball> = serde_json::from_str(r#"["07", 8, "9"]"#).unwrap();
        assert_eq!(balls, vec![Ball::new(7), Ball::new(8), Ball::new(9)]);
    }

    #[test]
    fn test_primes() {
        let primes: Vec<u8> = (0..=30).filter(|&n| Ball::new(n).is_prime()).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_parse_balls_separators() {
        let balls = parse_balls("01 02-03,4").unwrap();
        assert_eq!(balls.len(), 4);
        assert_eq!(balls[3], Ball::new(4));
    }

    #[test]
    fn test_geometry_catalogue() {
        let g = megasena();
        assert_eq!(g.range(), 60);
        assert!((g.theoretical_probability() - 0.1).abs() < 1e-12);
        assert_eq!(g.grid_rows(), 6);

        let lotomania = GameGeometry::for_slug("lotomania").unwrap();
        assert_eq!(lotomania.range(), 100);
        assert_eq!(lotomania.grid_position(Ball::new(0)), 100);
        assert!(GameGeometry::for_slug("powerball").is_err());
    }

    #[test]
    fn test_draw_record_validation() {
        let g = megasena();
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let ok = DrawRecord::new(&g, 10, date, parse_balls("06 05 04 03 02 01").unwrap()).unwrap();
        assert_eq!(ok.drawn_numbers()[0], Ball::new(1));
        assert!(ok.contains(Ball::new(6)));

        assert!(matches!(
            DrawRecord::new(&g, 10, date, parse_balls("01 02 03").unwrap()),
            Err(DrawError::WrongCount { expected: 6, actual: 3 })
        ));
        assert!(matches!(
            DrawRecord::new(&g, 10, date, parse_balls("01 01 03 04 05 06").unwrap()),
            Err(DrawError::Duplicate(_))
        ));
        assert!(matches!(
            DrawRecord::new(&g, 10, date, parse_balls("01 02 03 04 05 61").unwrap()),
            Err(DrawError::OutOfRange { .. })
        ));
        assert!(matches!(
            DrawRecord::new(&g, 0, date, parse_balls("01 02 03 04 05 06").unwrap()),
            Err(DrawError::InvalidContest(0))
        ));
    }

    #[test]
    fn test_revalidated_sorts_json_input() {
        let json = r#"{"contestNumber":3,"drawDate":"2024-01-10","drawnNumbers":["60","01","30","02","03","04"],"accumulated":true}"#;
        let raw: DrawRecord = serde_json::from_str(json).unwrap();
        let draw = raw.revalidated(&megasena()).unwrap();
        assert_eq!(draw.drawn_numbers().first(), Some(&Ball::new(1)));
        assert!(draw.contains(Ball::new(60)));
        assert!(draw.accumulated());

        let short = r#"{"contestNumber":3,"drawDate":"2024-01-10","drawnNumbers":["01"],"accumulated":false}"#;
        let raw: DrawRecord = serde_json::from_str(short).unwrap();
        assert!(raw.revalidated(&megasena()).is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 2, 17).unwrap();
        assert_eq!(parse_date("17/02/2026").unwrap(), expected);
        assert_eq!(parse_date("2026-02-17").unwrap(), expected);
        assert!(parse_date("17-02").is_err());
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let fresh = test_draw(9, &[10, 11, 12, 13, 14, 15]);
        let stale = test_draw(9, &[1, 2, 3, 4, 5, 6]);
        let series = DrawSeries::from_records(vec![
            test_draw(7, &[1, 2, 3, 4, 5, 6]),
            fresh.clone(),
            stale,
            test_draw(10, &[1, 2, 3, 4, 5, 6]),
        ]);
        let contests: Vec<u32> = series.iter().map(|d| d.contest_number()).collect();
        assert_eq!(contests, vec![10, 9, 7]);
        assert_eq!(series.find(9), Some(&fresh));
        assert_eq!(series.missing_contests(), vec![8]);
        assert_eq!(series.latest_contest(), 10);
        assert_eq!(series.recent(2).len(), 2);
        assert_eq!(series.recent(20).len(), 3);
    }

    #[test]
    fn test_series_serde_roundtrip_keeps_order() {
        let series = DrawSeries::from_records(vec![
            test_draw(1, &[1, 2, 3, 4, 5, 6]),
            test_draw(2, &[7, 8, 9, 10, 11, 12]),
        ]);
        let json = serde_json::to_string(&series).unwrap();
        assert!(json.contains(r#""drawnNumbers":["07","08","09","10","11","12"]"#));
        let restored: DrawSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, series);
    }

    #[test]
    fn test_series_deserialize_does_not_validate_draws() {
        let json = r#"[
            {"contestNumber":2,"drawDate":"2024-01-06","drawnNumbers":["01","02"],"accumulated":false},
            {"contestNumber":1,"drawDate":"2024-01-03","drawnNumbers":["01","02","03","04","05","06"],"accumulated":false}
        ]"#;
        let series: DrawSeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.as_slice()[0].contest_number(), 1);

        let valid: Vec<DrawRecord> = series
            .as_slice()
            .iter()
            .cloned()
            .filter_map(|d| d.revalidated(&megasena()).ok())
            .collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].contest_number(), 1);
    }

    #[test]
    fn test_selection_hits() {
        let draw = test_draw(10, &[1, 2, 3, 4, 5, 6]);
        let game = GameSelection::new(vec![Ball::new(6), Ball::new(2), Ball::new(40), Ball::new(2)]);
        assert_eq!(game.main_numbers.len(), 3);
        assert_eq!(game.hits(&draw), 2);
    }
}
