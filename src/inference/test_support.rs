//! Scripted chat model used by unit tests across the crate.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::client::ChatModel;
use super::errors::InferenceError;

type Script = dyn Fn(&str) -> Result<String, InferenceError> + Send + Sync;

/// Model whose answers come from a closure given the user prompt.
pub struct ScriptedModel {
    script: Box<Script>,
    prompts: Mutex<Vec<(Option<String>, String)>>,
    healthy: bool,
}

impl ScriptedModel {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str) -> Result<String, InferenceError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            prompts: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    /// Answer each phase of a chat turn differently, keyed on the prompt
    /// sections the orchestrator appends.
    pub fn phased(baseline: &'static str, plan: &'static str, regenerated: &'static str) -> Self {
        Self::new(move |prompt| {
            if prompt.contains("Available tools (JSON)") {
                Ok(plan.to_string())
            } else if prompt.contains("Tool result (JSON)") {
                Ok(regenerated.to_string())
            } else {
                Ok(baseline.to_string())
            }
        })
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// `(system, prompt)` pairs in call order.
    pub fn prompts(&self) -> Vec<(Option<String>, String)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> Result<String, InferenceError> {
        self.prompts
            .lock()
            .push((system_prompt.map(str::to_string), prompt.to_string()));
        (self.script)(prompt)
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
