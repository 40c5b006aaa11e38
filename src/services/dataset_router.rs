use std::sync::Arc;

use crate::models::{DatasetId, SchemaCatalog};
use crate::services::agent::AgentError;
use crate::services::{LlmClient, PromptMessage};

/// Picks the dataset a question is about.
///
/// Always commits to an answer: unclear answers and model failures fall back
/// to the primary dataset so synthesis has a schema to work with.
pub struct DatasetRouter {
    llm: Arc<dyn LlmClient>,
    catalog: Arc<SchemaCatalog>,
}

impl DatasetRouter {
    pub fn new(llm: Arc<dyn LlmClient>, catalog: Arc<SchemaCatalog>) -> Self {
        Self { llm, catalog }
    }

    pub fn build_prompt(&self, question: &str) -> String {
        let rules: Vec<String> = self
            .catalog
            .datasets()
            .map(|d| {
                format!(
                    "- If the question mentions {} data, {} → output: {}",
                    d.label,
                    d.keywords.join(", "),
                    d.name
                )
            })
            .collect();
        let names: Vec<&str> = self.catalog.datasets().map(|d| d.name.as_str()).collect();

        format!(
            r#"Choose the correct database for this question.

Rules:
{rules}

Output format:
Return ONLY one word: {choices}

Question: {question}"#,
            rules = rules.join("\n"),
            choices = names.join(" or "),
            question = question,
        )
    }

    pub async fn route(&self, question: &str) -> DatasetId {
        let prompt = self.build_prompt(question);
        match self.llm.complete(&[PromptMessage::system(prompt)]).await {
            Ok(answer) => {
                let dataset = DatasetId::from_answer(&answer);
                tracing::info!("Routed question to {} (model answered {:?})", dataset, answer.trim());
                dataset
            }
            Err(e) => {
                let failure = AgentError::Routing(e);
                tracing::warn!("{}; defaulting to {}", failure, DatasetId::default());
                DatasetId::default()
            }
        }
    }
}
