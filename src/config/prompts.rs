//! Prompt templates for Docent.
//!
//! The system directive can be customized by placing an `agent.toml` file in
//! the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the conversational agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    /// Directive sent ahead of every transcript.
    pub system: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a research assistant with access to the user's document collection.

You have tools to search the documents and read them. Think about what information you need, then use the appropriate tools.

Guidelines:
- Use 'list_documents' if you need to know what documents are available
- Use 'search_documents' to find passages relevant to the question
- Use 'get_document' to read every passage of one document in order
- If a tool reports an error, adjust the request and try again

When you have gathered enough information, give your final answer without calling tools.
Cite the documents and pages you relied on. If the documents do not answer the question, say so."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// The system directive with custom variables substituted.
    pub fn system_directive(&self) -> String {
        Self::render(&self.agent.system, &self.variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.agent.system.contains("search_documents"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} documents.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 documents.");
    }

    #[test]
    fn test_custom_directive_with_variables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("agent.toml"),
            "system = \"You answer questions about {{product}} manuals.\"\n",
        )
        .unwrap();

        let mut vars = HashMap::new();
        vars.insert("product".to_string(), "pump".to_string());

        let prompts = Prompts::load(dir.path().to_str(), Some(&vars)).unwrap();
        assert_eq!(
            prompts.system_directive(),
            "You answer questions about pump manuals."
        );
    }
}
