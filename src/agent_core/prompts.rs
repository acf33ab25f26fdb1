//! Prompt profiles keyed by role and profile.
//!
//! Each field resolves independently: role entry, then profile entry, then
//! the default entry, then the global `llm` prompt text.

use crate::config::{LlmConfig, PromptEntry, PromptsConfig};

/// Placeholder in system prompts replaced by the chatbot name.
const BOT_NAME_PLACEHOLDER: &str = "{chatbotName}";

/// Placeholder in guidelines (and welcome messages) for substitution.
const PERCENT_PLACEHOLDER: &str = "%s";

/// Resolved prompt configuration for one gateway instance.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    prompts: PromptsConfig,
    global_system: Option<String>,
    global_guidelines: Option<String>,
    chatbot_name: Option<String>,
    welcome_message: Option<String>,
}

impl PromptCatalog {
    pub fn new(prompts: &PromptsConfig, llm: &LlmConfig) -> Self {
        Self {
            prompts: prompts.clone(),
            global_system: non_blank(llm.system_prompt.as_deref()),
            global_guidelines: non_blank(llm.assistant_guidelines.as_deref()),
            chatbot_name: non_blank(llm.chatbot_name.as_deref()),
            welcome_message: non_blank(llm.welcome_message.as_deref()),
        }
    }

    pub fn is_valid_role(&self, role: Option<&str>) -> bool {
        role.map(str::trim)
            .filter(|r| !r.is_empty())
            .is_some_and(|r| self.prompts.role.contains_key(r))
    }

    pub fn is_valid_profile(&self, profile: Option<&str>) -> bool {
        profile
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .is_some_and(|p| self.prompts.profile.contains_key(p))
    }

    /// Raw system prompt for the role/profile pair.
    pub fn system_prompt(&self, role: Option<&str>, profile: Option<&str>) -> Option<String> {
        self.resolve(role, profile, |e| e.system_prompt.as_deref())
            .or_else(|| self.global_system.clone())
    }

    /// Raw assistant guidelines for the role/profile pair.
    pub fn assistant_guidelines(&self, role: Option<&str>, profile: Option<&str>) -> Option<String> {
        self.resolve(role, profile, |e| e.assistant_guidelines.as_deref())
            .or_else(|| self.global_guidelines.clone())
    }

    /// The system message sent to the LLM: rendered prompt, then rendered
    /// guidelines, one per line. `None` when both are empty.
    pub fn render_system(&self, role: Option<&str>, profile: Option<&str>) -> Option<String> {
        let mut parts = Vec::new();

        if let Some(system) = self.system_prompt(role, profile) {
            let rendered = match &self.chatbot_name {
                Some(name) => system.replace(BOT_NAME_PLACEHOLDER, name),
                None => system,
            };
            parts.push(rendered.trim().to_string());
        }

        if let Some(guidelines) = self.assistant_guidelines(role, profile) {
            let rendered = match self.rendered_welcome() {
                Some(welcome) => guidelines.replace(PERCENT_PLACEHOLDER, &welcome),
                None => guidelines,
            };
            parts.push(rendered.trim().to_string());
        }

        let joined = parts.join("\n");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Every prompt text whose literal echo must be stripped from output.
    pub fn echo_candidates(&self, role: Option<&str>, profile: Option<&str>) -> Vec<String> {
        let mut texts: Vec<String> = [
            self.global_system.clone(),
            self.global_guidelines.clone(),
            self.system_prompt(role, profile),
            self.assistant_guidelines(role, profile),
            self.render_system(role, profile),
        ]
        .into_iter()
        .flatten()
        .filter(|t| !t.trim().is_empty())
        .collect();
        // Longest first so a full echo is removed before its fragments
        texts.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        texts.dedup();
        texts
    }

    fn rendered_welcome(&self) -> Option<String> {
        let template = self.welcome_message.as_ref()?;
        Some(match &self.chatbot_name {
            Some(name) => template.replacen(PERCENT_PLACEHOLDER, name, 1),
            None => template.clone(),
        })
    }

    fn resolve<F>(&self, role: Option<&str>, profile: Option<&str>, field: F) -> Option<String>
    where
        F: Fn(&PromptEntry) -> Option<&str>,
    {
        let by_role = role
            .and_then(|r| self.prompts.role.get(r.trim()))
            .and_then(&field);
        let by_profile = profile
            .and_then(|p| self.prompts.profile.get(p.trim()))
            .and_then(&field);
        by_role
            .or(by_profile)
            .or_else(|| field(&self.prompts.default))
            .and_then(|s| non_blank(Some(s)))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
