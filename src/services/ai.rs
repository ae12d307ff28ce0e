use anyhow::{anyhow, Result};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, Role,
};
use async_openai::{config::OpenAIConfig, Client};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tokio::time::{sleep, Duration};

const SYSTEM_PROMPT: &str = r#"Você é um consultor de saúde ocupacional especializado em riscos psicossociais.
Entrada: pontuação média (escala 1 a 5, quanto maior melhor) por domínio de uma pesquisa anônima com colaboradores, e opcionalmente o recorte demográfico analisado.
Saída: recomendações práticas e priorizadas para a empresa, em português do Brasil.
- Comece pelos domínios com pior pontuação.
- No máximo 3 ações por domínio, objetivas e aplicáveis em 90 dias.
- Não faça diagnósticos clínicos nem cite indivíduos."#;

#[derive(Clone)]
pub struct AiService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl AiService {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self { client, model }
    }

    /// Free-text recommendations for the given domain name -> score map.
    pub async fn recommend(
        &self,
        domain_scores: &BTreeMap<String, f64>,
        context: &[(String, String)],
    ) -> Result<String> {
        let prompt = build_prompt(domain_scores, context);
        let mut retries = 0;

        loop {
            let messages = vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    role: Role::System,
                    content: SYSTEM_PROMPT.to_string(),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    role: Role::User,
                    content: ChatCompletionRequestUserMessageContent::Text(prompt.clone()),
                    name: None,
                }),
            ];

            let request = CreateChatCompletionRequestArgs::default()
                .model(self.model.as_str())
                .messages(messages)
                .build()?;

            match self.client.chat().create(request).await {
                Ok(resp) => {
                    return resp
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .filter(|text| !text.trim().is_empty())
                        .ok_or_else(|| anyhow!("empty recommendation returned"));
                }
                Err(err) => {
                    retries += 1;
                    if retries > 3 {
                        return Err(anyhow!("OpenAI error: {err}"));
                    }
                    tracing::warn!("Recommendation request failed (attempt {}): {}", retries, err);
                    sleep(Duration::from_millis(500 * retries)).await;
                }
            }
        }
    }
}

fn build_prompt(domain_scores: &BTreeMap<String, f64>, context: &[(String, String)]) -> String {
    let mut prompt = String::from("Pontuação por domínio:\n");
    for (domain, score) in domain_scores {
        let _ = writeln!(prompt, "- {domain}: {score:.2}");
    }
    if !context.is_empty() {
        prompt.push_str("Recorte demográfico:\n");
        for (key, value) in context {
            let _ = writeln!(prompt, "- {key}: {value}");
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_scores_with_two_decimals() {
        let scores = BTreeMap::from([
            ("Demandas".to_string(), 2.456),
            ("Controle".to_string(), 4.0),
        ]);
        let prompt = build_prompt(&scores, &[]);
        assert!(prompt.contains("- Controle: 4.00"));
        assert!(prompt.contains("- Demandas: 2.46"));
        assert!(!prompt.contains("Recorte"));
    }

    #[test]
    fn test_prompt_includes_demographic_context() {
        let scores = BTreeMap::from([("Cargo".to_string(), 3.1)]);
        let context = vec![("unit".to_string(), "Unit A".to_string())];
        let prompt = build_prompt(&scores, &context);
        assert!(prompt.contains("Recorte demográfico"));
        assert!(prompt.contains("- unit: Unit A"));
    }
}
