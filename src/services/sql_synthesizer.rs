use std::sync::Arc;

use crate::models::{DatasetId, SchemaCatalog};
use crate::services::agent::AgentError;
use crate::services::{LlmClient, PromptMessage};

/// A candidate SQL statement together with the completion it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCandidate {
    pub sql: String,
    pub completion: String,
}

/// Turns a question into one SQL statement scoped to a single dataset
pub struct SqlSynthesizer {
    llm: Arc<dyn LlmClient>,
    dialect: String,
}

impl SqlSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, dialect: impl Into<String>) -> Self {
        Self {
            llm,
            dialect: dialect.into(),
        }
    }

    /// Only the chosen dataset's tables go into the prompt; this is what keeps
    /// generated SQL from reaching into the other database.
    pub fn build_prompt(&self, question: &str, dataset: DatasetId, catalog: &SchemaCatalog) -> String {
        let schema = catalog.dataset(dataset);
        let example_table = schema.table_names().next().unwrap_or("posts");

        format!(
            r#"You are an agent generating SQL for {dialect}.

Use ONLY the tables defined below:

{tables}
User question:
{question}

Target database: {target}

Output format:
Return ONLY a single valid {dialect} SQL query.
Do NOT include explanations, comments, markdown, or surrounding text.
Do NOT qualify table names with a database or schema name (for example use {table} instead of {database}.{table})."#,
            dialect = self.dialect,
            tables = schema.render(),
            question = question,
            target = schema.label,
            table = example_table,
            database = schema.database,
        )
    }

    /// Strip whitespace and markdown fences from a completion
    pub fn extract_sql(completion: &str) -> String {
        let trimmed = completion.trim();
        let inner = trimmed
            .strip_prefix("```sql")
            .or_else(|| trimmed.strip_prefix("```SQL"))
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);
        inner.strip_suffix("```").unwrap_or(inner).trim().to_string()
    }

    pub async fn synthesize(
        &self,
        question: &str,
        dataset: DatasetId,
        catalog: &SchemaCatalog,
    ) -> Result<SqlCandidate, AgentError> {
        let prompt = self.build_prompt(question, dataset, catalog);
        tracing::debug!("SQL synthesis prompt for {}:\n{}", dataset, prompt);

        let completion = self
            .llm
            .complete(&[PromptMessage::system(prompt)])
            .await
            .map_err(AgentError::Synthesis)?;

        let sql = Self::extract_sql(&completion);
        tracing::info!("Generated SQL for {}: {}", dataset, sql);
        Ok(SqlCandidate { sql, completion })
    }
}
