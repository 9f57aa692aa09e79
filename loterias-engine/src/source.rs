use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use loterias_db::models::{parse_date, Ball, DrawError, DrawRecord, GameGeometry};

use crate::error::SourceError;

/// Payload bruto da fonte ao vivo, ainda não validado.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDraw {
    #[serde(default)]
    pub numero: Option<u32>,
    #[serde(default)]
    pub data_apuracao: Option<String>,
    #[serde(default)]
    pub lista_dezenas: Vec<String>,
    #[serde(default)]
    pub acumulado: bool,
    #[serde(default)]
    pub valor_arrecadado: Option<f64>,
    #[serde(default)]
    pub lista_rateio_premio: Vec<RawPrizeTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPrizeTier {
    #[serde(default)]
    pub numero_de_ganhadores: Option<u32>,
}

impl RawDraw {
    /// Converte o payload num `DrawRecord`; campos obrigatórios ausentes viram erro.
    pub fn into_record(self, geometry: &GameGeometry) -> Result<DrawRecord, DrawError> {
        let contest = self.numero.ok_or(DrawError::MissingField("numero"))?;
        let date = self
            .data_apuracao
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or(DrawError::MissingField("dataApuracao"))?;
        let date = parse_date(date)?;
        if self.lista_dezenas.is_empty() {
            return Err(DrawError::MissingField("listaDezenas"));
        }
        let numbers = self
            .lista_dezenas
            .iter()
            .map(|s| s.parse::<Ball>())
            .collect::<Result<Vec<_>, _>>()?;
        let winners = self
            .lista_rateio_premio
            .first()
            .and_then(|tier| tier.numero_de_ganhadores);

        Ok(DrawRecord::new(geometry, contest, date, numbers)?
            .with_accumulated(self.acumulado)
            .with_collected_amount(self.valor_arrecadado)
            .with_winners_count(winners))
    }
}

/// Fonte da verdade dos concursos. `Ok(None)` = concurso inexistente.
#[async_trait]
pub trait DrawSource: Send + Sync {
    async fn latest(&self, game: &str) -> Result<Option<RawDraw>, SourceError>;
    async fn by_contest(&self, game: &str, contest: u32) -> Result<Option<RawDraw>, SourceError>;
}

/// Cliente HTTP para a API pública de resultados.
pub struct HttpDrawSource {
    client: Client,
    base_url: String,
}

impl HttpDrawSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: String) -> Result<Option<RawDraw>, SourceError> {
        tracing::debug!(%url, "requisição à fonte");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let raw = serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(Some(raw))
    }
}

#[async_trait]
impl DrawSource for HttpDrawSource {
    async fn latest(&self, game: &str) -> Result<Option<RawDraw>, SourceError> {
        self.get(format!("{}/{}", self.base_url, game)).await
    }

    async fn by_contest(&self, game: &str, contest: u32) -> Result<Option<RawDraw>, SourceError> {
        self.get(format!("{}/{}/{}", self.base_url, game, contest)).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "numero": 2701,
        "dataApuracao": "04/05/2024",
        "listaDezenas": ["05", "13", "22", "31", "48", "60"],
        "acumulado": true,
        "valorArrecadado": 98765432.1,
        "listaRateioPremio": [{ "descricaoFaixa": "6 acertos", "numeroDeGanhadores": 0 }],
        "tipoJogo": "MEGA_SENA"
    }"#;

    fn megasena() -> GameGeometry {
        GameGeometry::for_slug("megasena").unwrap()
    }

    #[test]
    fn test_payload_into_record() {
        let raw: RawDraw = serde_json::from_str(PAYLOAD).unwrap();
        let draw = raw.into_record(&megasena()).unwrap();
        assert_eq!(draw.contest_number(), 2701);
        assert_eq!(draw.draw_date().to_string(), "2024-05-04");
        assert!(draw.accumulated());
        assert_eq!(draw.winners_count(), Some(0));
        assert!(draw.contains(Ball::new(5)));
    }

    #[test]
    fn test_malformed_payloads() {
        let g = megasena();
        let no_date = RawDraw {
            numero: Some(1),
            lista_dezenas: vec!["01".into(); 6],
            ..Default::default()
        };
        assert_eq!(no_date.into_record(&g), Err(DrawError::MissingField("dataApuracao")));

        let no_numbers = RawDraw {
            numero: Some(1),
            data_apuracao: Some("01/01/2024".into()),
            ..Default::default()
        };
        assert_eq!(no_numbers.into_record(&g), Err(DrawError::MissingField("listaDezenas")));

        let no_contest = RawDraw::default();
        assert_eq!(no_contest.into_record(&g), Err(DrawError::MissingField("numero")));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let source = HttpDrawSource::new("https://example.invalid/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.base_url, "https://example.invalid/api");
    }
}
