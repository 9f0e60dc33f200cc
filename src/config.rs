use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub embeddings: EmbeddingsConfig,
    pub registry: RegistryConfig,
    pub reviewers: ReviewersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingsConfig {
    pub model_api_url: String, // e.g. OpenAI or local TEI
    pub model_api_key: String,
    pub embedding_dim: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Identity permitted to store embeddings on behalf of any submitter.
    /// Fixed at startup; there is no runtime mutation path.
    pub admin_identity: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReviewersConfig {
    /// Static reviewer pool membership. The assignment protocol picks
    /// `random_value mod pool.len()`.
    pub pool: Vec<String>,
}

impl AppConfig {
    pub fn build() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.rust_log", "info,paperchain_rs=debug")?
            .set_default("embeddings.model_api_url", "https://api.openai.com/v1/embeddings")?
            .set_default("embeddings.model_api_key", "mock")?
            .set_default("embeddings.embedding_dim", 768)?
            .set_default("registry.admin_identity", "admin")?
            .set_default("reviewers.pool", Vec::<String>::new())?
            // E.g. `APP_SERVER__PORT=8080` sets `ServerConfig.port`
            .add_source(Environment::default().separator("__").prefix("APP"));

        builder.build()?.try_deserialize()
    }
}
