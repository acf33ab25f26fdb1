//! Two-phase tool-use orchestrator.
//!
//! One chat turn:
//! 1. **Authorize**: credential, known role or profile, non-empty message
//! 2. **Baseline**: the LLM answers the raw message
//! 3. **Plan**: the LLM sees the tool catalog and proposes one call as JSON
//! 4. **Validate**: the call must match the catalog, else the baseline wins
//! 5. **Execute**: the call goes through the resilient RPC client
//! 6. **Regenerate**: the LLM answers again with the tool result in view
//! 7. **Sanitize**: prompt echoes and deny-listed lines are removed
//!
//! Every fallback (unparsed plan, invalid call, failed execution) is an
//! explicit branch with its own `TurnPath`.

use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use super::admission::{Admission, AdmissionController};
use super::errors::AgentError;
use super::plan_parser::{build_planning_prompt, build_regeneration_prompt, parse_plan, PlanOutcome};
use super::prompts::PromptCatalog;
use super::sanitize::{filter_lines, sanitize, strip_prompts};
use super::types::{
    ChatReply, ChatRequest, ComponentHealth, HealthReport, HealthStatus, ToolReply, TurnOutcome,
    TurnPath,
};
use crate::config::GatewayConfig;
use crate::inference::ChatModel;
use crate::mcp_client::catalog::{catalog_prompt_json, fetch_catalog, validate, Validation};
use crate::mcp_client::{CallContext, ResilientRpcClient, RpcResult, ToolCall, ToolDescriptor};

/// Returned when a validated tool call fails. Carries no backend detail.
pub const TOOL_FAILURE_APOLOGY: &str =
    "I can't access the business data right now. Please try again later or contact support.";

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Owns all per-instance state: prompts, admission windows, and the RPC
/// client (with its session cache).
pub struct Orchestrator {
    llm: Arc<dyn ChatModel>,
    rpc: Arc<ResilientRpcClient>,
    prompts: PromptCatalog,
    admission: AdmissionController,
    filter_keywords: Vec<String>,
    llm_enabled: bool,
    rpc_enabled: bool,
    health_method: String,
}

impl Orchestrator {
    pub fn new(
        config: &GatewayConfig,
        llm: Arc<dyn ChatModel>,
        rpc: Arc<ResilientRpcClient>,
    ) -> Self {
        Self {
            llm,
            rpc,
            prompts: PromptCatalog::new(&config.prompts, &config.llm),
            admission: AdmissionController::from_config(&config.rate_limit),
            filter_keywords: config.filter_keywords.clone(),
            llm_enabled: config.llm.enabled,
            rpc_enabled: config.rpc.enabled,
            health_method: config.rpc.health_method.clone(),
        }
    }

    /// Admission check for a request carrying `api_key`.
    pub fn admit(&self, api_key: Option<&str>) -> Result<(), AgentError> {
        match self.admission.check(api_key) {
            Admission::Allowed => Ok(()),
            Admission::Rejected => Err(AgentError::RateLimited),
        }
    }

    /// Local checks made before any downstream call.
    pub fn authorize(&self, req: &ChatRequest) -> Result<(), AgentError> {
        if req.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(AgentError::MissingCredential);
        }
        let role = req.role.as_deref();
        let profile = req.profile.as_deref();
        if !self.prompts.is_valid_role(role) && !self.prompts.is_valid_profile(profile) {
            return Err(AgentError::InvalidRoleOrProfile {
                role: req.role.clone(),
                profile: req.profile.clone(),
            });
        }
        if req.message.trim().is_empty() {
            return Err(AgentError::EmptyMessage);
        }
        Ok(())
    }

    // ─── Chat ────────────────────────────────────────────────────────────

    /// Run one chat turn end to end.
    pub async fn handle_chat(&self, req: ChatRequest) -> Result<TurnOutcome, AgentError> {
        if !self.llm_enabled {
            return Err(AgentError::LlmDisabled);
        }

        let trace_id = req
            .correlation_id
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let span = tracing::info_span!("chat_turn", correlation_id = %trace_id);

        async {
            tracing::info!(
                role = ?req.role,
                profile = ?req.profile,
                message_len = req.message.len(),
                "orchestrator: chat request received"
            );
            if let Err(e) = self.authorize(&req) {
                tracing::info!(code = e.code(), "orchestrator: request rejected");
                return Err(e);
            }

            let outcome = self.run_turn(&req).await;
            match &outcome {
                Ok(turn) => tracing::info!(
                    path = ?turn.path,
                    response_len = turn.reply.response.len(),
                    reply_correlation_id = %turn.reply.correlation_id,
                    "orchestrator: chat turn complete"
                ),
                Err(e) => tracing::error!(error = %e, "orchestrator: chat turn failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_turn(&self, req: &ChatRequest) -> Result<TurnOutcome, AgentError> {
        let role = req.role.as_deref();
        let profile = req.profile.as_deref();
        let system = self.prompts.render_system(role, profile);
        let echoes = self.prompts.echo_candidates(role, profile);
        let ctx = req.call_context();

        let baseline = self.llm.generate(system.as_deref(), &req.message).await?;
        tracing::info!(chars = baseline.len(), "orchestrator: baseline generated");

        let catalog = if self.rpc_enabled {
            fetch_catalog(&self.rpc, &ctx).await
        } else {
            Vec::new()
        };

        let candidate = match self.plan(system.as_deref(), &req.message, &catalog).await {
            PlanOutcome::Parsed(call) => Some(call),
            PlanOutcome::NotParsed => {
                // The baseline itself may already be a tool call
                let cleaned = strip_prompts(&baseline, &echoes);
                match parse_plan(&filter_lines(&cleaned, &self.filter_keywords)) {
                    PlanOutcome::Parsed(call) => {
                        tracing::info!(method = %call.method, "orchestrator: baseline carries tool call");
                        Some(call)
                    }
                    PlanOutcome::NotParsed => None,
                }
            }
        };

        let call = match candidate.map(|call| validate(&catalog, call)) {
            Some(Validation::Valid(call)) => call,
            Some(Validation::Invalid { reason }) => {
                tracing::info!(reason = %reason, "orchestrator: tool call discarded");
                return Ok(self.direct(&baseline, &echoes));
            }
            None => return Ok(self.direct(&baseline, &echoes)),
        };

        self.execute_and_regenerate(req, system.as_deref(), &echoes, &ctx, call)
            .await
    }

    /// Ask the LLM for a tool call. LLM failure counts as "no tool call".
    async fn plan(
        &self,
        system: Option<&str>,
        message: &str,
        catalog: &[ToolDescriptor],
    ) -> PlanOutcome {
        if catalog.is_empty() {
            tracing::debug!("orchestrator: empty catalog, skipping planning");
            return PlanOutcome::NotParsed;
        }
        let prompt = build_planning_prompt(message, &catalog_prompt_json(catalog));
        match self.llm.generate(system, &prompt).await {
            Ok(text) => {
                let outcome = parse_plan(&text);
                tracing::info!(
                    tools = catalog.len(),
                    parsed = matches!(outcome, PlanOutcome::Parsed(_)),
                    "orchestrator: planning done"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "orchestrator: planning failed, answering directly");
                PlanOutcome::NotParsed
            }
        }
    }

    async fn execute_and_regenerate(
        &self,
        req: &ChatRequest,
        system: Option<&str>,
        echoes: &[String],
        ctx: &CallContext,
        call: ToolCall,
    ) -> Result<TurnOutcome, AgentError> {
        let method = call.method.clone();
        tracing::info!(method = %method, params = call.params.len(), "orchestrator: executing tool call");

        let data = match self.rpc.call(&method, Value::Object(call.params), ctx).await {
            RpcResult::Success { data } => data,
            RpcResult::Error { code, message } => {
                tracing::warn!(method = %method, code = %code, message = %message, "orchestrator: tool call failed");
                return Ok(TurnOutcome {
                    reply: ChatReply::fresh(TOOL_FAILURE_APOLOGY),
                    path: TurnPath::ExecutionFailed { method },
                });
            }
        };

        let result_json = Value::Object(data).to_string();
        let prompt = build_regeneration_prompt(&req.message, &result_json);
        let regenerated = self.llm.generate(system, &prompt).await?;
        tracing::info!(chars = regenerated.len(), "orchestrator: answer regenerated");

        Ok(TurnOutcome {
            reply: sanitize(&regenerated, echoes, &self.filter_keywords),
            path: TurnPath::Executed { method },
        })
    }

    fn direct(&self, baseline: &str, echoes: &[String]) -> TurnOutcome {
        TurnOutcome {
            reply: sanitize(baseline, echoes, &self.filter_keywords),
            path: TurnPath::Direct,
        }
    }

    // ─── Tool endpoint ───────────────────────────────────────────────────

    /// Forward a single RPC call on behalf of the caller.
    pub async fn handle_tool(
        &self,
        ctx: CallContext,
        method: &str,
        params: Value,
    ) -> Result<ToolReply, AgentError> {
        if !self.rpc_enabled {
            return Err(AgentError::RpcDisabled);
        }
        if ctx.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(AgentError::MissingCredential);
        }
        let result = self.rpc.call(method, params, &ctx).await;
        Ok(ToolReply::from(result))
    }

    // ─── Health ──────────────────────────────────────────────────────────

    /// Probe the LLM and the RPC backend concurrently.
    pub async fn health(&self) -> HealthReport {
        let (llm, rpc) = futures::join!(self.llm_health(), self.rpc_health());
        HealthReport::new(llm, rpc)
    }

    async fn llm_health(&self) -> ComponentHealth {
        if !self.llm_enabled {
            return disabled();
        }
        component(self.llm.health_check().await, Some(self.llm.model_name().to_string()))
    }

    async fn rpc_health(&self) -> ComponentHealth {
        if !self.rpc_enabled {
            return disabled();
        }
        let result = self
            .rpc
            .call(&self.health_method, Value::Object(Default::default()), &CallContext::default())
            .await;
        let detail = match &result {
            RpcResult::Success { .. } => None,
            RpcResult::Error { code, .. } => Some(code.clone()),
        };
        component(result.is_success(), detail)
    }
}

fn component(up: bool, detail: Option<String>) -> ComponentHealth {
    ComponentHealth {
        status: if up { HealthStatus::Up } else { HealthStatus::Down },
        detail,
    }
}

fn disabled() -> ComponentHealth {
    ComponentHealth {
        status: HealthStatus::Disabled,
        detail: None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
