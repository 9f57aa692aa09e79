use thiserror::Error;

/// Falhas da fonte ao vivo. Um concurso inexistente não é erro: vira `Ok(None)`.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("falha de rede: {0}")]
    Transport(String),
    #[error("resposta HTTP {status} para {url}")]
    Status { status: u16, url: String },
    #[error("resposta ilegível: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// O último concurso não pôde ser obtido; nenhuma série é confiável sem ele.
    #[error("fonte indisponível para '{game}': {reason}")]
    SourceUnavailable { game: String, reason: String },
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::SourceUnavailable { .. })
    }
}
