use anyhow::Result;

use super::super::Container;

pub struct ConnectionController<'a> {
    container: &'a Container,
}

impl<'a> ConnectionController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Probe every external service. Fails with the full report when a
    /// required service is down; a missing LLM provider is only reported.
    pub async fn test_connection(&self) -> Result<String> {
        let mut output = "Connection test\n===============\n".to_string();
        let mut failures = Vec::new();

        match self.container.vector_repo().heartbeat().await {
            Ok(()) => output.push_str("Vector store:      ok\n"),
            Err(e) => {
                output.push_str(&format!("Vector store:      FAILED ({})\n", e));
                failures.push("vector store (check CHROMA_URL or --chroma-url)");
            }
        }

        let embedding = self.container.embedding_service();
        match embedding.health_check().await {
            Ok(()) => output.push_str(&format!(
                "Embedding service: ok ({}, {} dims)\n",
                embedding.config().model_name(),
                embedding.dimension()
            )),
            Err(e) => {
                output.push_str(&format!("Embedding service: FAILED ({})\n", e));
                failures.push("embedding service (check EMBEDDING_URL or --embedding-url)");
            }
        }

        match self.container.llm_provider() {
            Some(provider) if provider.is_available() => output.push_str(&format!(
                "LLM provider:      {} ({})\n",
                provider.provider_name(),
                provider.model()
            )),
            Some(provider) => output.push_str(&format!(
                "LLM provider:      {} has no API key, re-ranking will be skipped\n",
                provider.provider_name()
            )),
            None => output.push_str("LLM provider:      disabled\n"),
        }

        if failures.is_empty() {
            Ok(output)
        } else {
            anyhow::bail!("{}\nUnreachable: {}", output, failures.join(", "))
        }
    }
}
