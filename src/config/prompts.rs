//! Prompt templates for Kurs.
//!
//! The system prompt can be customized by placing a `system.toml` file in the
//! custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
}

/// Prompts used by the reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    pub system: String,
    /// Wraps the raw user question before it enters the loop.
    pub query: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant for course materials and educational content. You can search course content and fetch course outlines.

Tools:
- search_course_content: find passages inside course lessons. Filter by course name and lesson number when the question names them.
- get_course_outline: fetch a course's title, link, instructor and complete lesson list.

How to work:
- Questions about what a course covers, its structure or its lessons: call get_course_outline and report the title, link and every lesson with its number and title.
- Questions about specific material: call search_course_content first, then answer.
- Multi-part questions may need several tool calls over separate rounds, for example an outline lookup followed by a lesson search. You have at most 2 rounds of tool use.
- General knowledge questions: answer directly without tools.
- If a tool finds nothing, say so plainly.

Answers must be:
1. Brief and focused
2. Educational
3. Clear
4. Supported by examples when they help

Give only the answer. Do not describe your search process or mention tool results."#
                .to_string(),
            query: "Answer this question about course materials: {{query}}".to_string(),
        }
    }
}

impl AssistantPrompts {
    /// System prompt with prior conversation appended when present.
    pub fn system_with_history(&self, history: Option<&str>) -> String {
        match history {
            Some(h) if !h.is_empty() => {
                format!("{}\n\nPrevious conversation:\n{}", self.system, h)
            }
            _ => self.system.clone(),
        }
    }

    /// Render the user-facing query prompt.
    pub fn render_query(&self, query: &str) -> String {
        let mut vars = std::collections::HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        Prompts::render(&self.query, &vars)
    }
}

impl Prompts {
    /// Load prompts, overriding defaults from a custom directory if given.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let system_path = custom_path.join("system.toml");
            if system_path.exists() {
                let content = std::fs::read_to_string(&system_path)?;
                prompts.assistant = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}
