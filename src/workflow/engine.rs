//! 工作流引擎
//!
//! 单轮状态机：每轮固定从 Router 起步，执行 → 记账 → 无交接即终止 →
//! 撞执行上限即终止 → 校验交接（用轮初快照）→ 接受则切换专家继续，拒绝即终止。
//! 同轮内严格顺序执行；跨轮对同一会话无互斥（已知竞态）。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::agents::{AgentKind, Specialist};
use crate::core::AgentError;
use crate::session::{ClarificationState, SessionStore, SessionStoreError};

use super::types::{AgentResponse, HandoffRequest, TurnContext, TurnResult, WorkflowState};
use super::validator::{ApprovedHandoff, HandoffValidator};

/// 工作流引擎：静态专家表 + 校验器 + 会话存储
pub struct WorkflowEngine {
    specialists: HashMap<AgentKind, Arc<dyn Specialist>>,
    validator: HandoffValidator,
    store: Arc<dyn SessionStore>,
    max_iterations: u32,
}

impl WorkflowEngine {
    pub fn new(
        specialists: HashMap<AgentKind, Arc<dyn Specialist>>,
        validator: HandoffValidator,
        store: Arc<dyn SessionStore>,
        max_iterations: u32,
    ) -> Self {
        Self {
            specialists,
            validator,
            store,
            max_iterations,
        }
    }

    /// 跑完一轮：返回最终回复与汇总 metadata。
    /// 只有会话存储失败会以 Err 穿出，其余失败都已在专家边界降级。
    pub async fn run_turn(&self, ctx: &TurnContext) -> Result<TurnResult, AgentError> {
        let mut state = WorkflowState::new(self.max_iterations);
        let mut executed: Vec<AgentKind> = Vec::new();

        loop {
            let specialist = self.specialists.get(&state.current_agent).ok_or_else(|| {
                AgentError::UnknownAgent(state.current_agent.as_str().to_string())
            })?;

            tracing::debug!(
                "Executing {} (iteration {})",
                state.current_agent.as_str(),
                state.iteration_count + 1
            );
            let response = specialist.generate(ctx).await;
            state.iteration_count += 1;
            executed.push(state.current_agent);

            self.persist_execution(ctx, state.current_agent, &response)
                .await?;

            if response.needs_clarification {
                self.persist_clarification(ctx, &response).await?;
                return Ok(finish(state.iteration_count, executed, response));
            }

            let Some(target) = response.handoff_to else {
                return Ok(finish(state.iteration_count, executed, response));
            };

            if state.iteration_count >= state.max_iterations {
                tracing::warn!(
                    "Handoff iteration cap ({}) reached for session {}, terminating turn",
                    state.max_iterations,
                    ctx.session_id
                );
                return Ok(finish(state.iteration_count, executed, response));
            }

            // 校验用轮初快照，不重读会话
            let request =
                HandoffRequest::from_response(state.current_agent, target, &response, ctx);
            match self.validator.validate(&request, &ctx.session) {
                Ok(approved) => {
                    tracing::info!(
                        "Handoff {} -> {} ({})",
                        approved.from_agent.as_str(),
                        approved.to_agent.as_str(),
                        approved.reason
                    );
                    self.persist_handoff(ctx, &approved).await?;
                    state.current_agent = target;
                }
                Err(rejection) => {
                    tracing::debug!(
                        "Handoff {} -> {} rejected: {}",
                        state.current_agent.as_str(),
                        target.as_str(),
                        rejection
                    );
                    return Ok(finish(state.iteration_count, executed, response));
                }
            }
        }
    }

    /// 每次专家执行后的记账：追加 agent_history、写 current_agent，
    /// 合并专家带回的购物车数量 / 结账进度 / 意图。读改写，不原子。
    async fn persist_execution(
        &self,
        ctx: &TurnContext,
        agent: AgentKind,
        response: &AgentResponse,
    ) -> Result<(), SessionStoreError> {
        let mut session = self.store.get(&ctx.session_id).await?;
        session.agent_history.push(agent);
        session.current_agent = Some(agent);
        session.clarification_state = None;

        if let Some(count) = response
            .metadata
            .get("cart_items_count")
            .and_then(Value::as_u64)
        {
            session.cart_items_count = count as u32;
        }
        if let Some(status) = response.metadata.get("checkout_state") {
            if let Ok(parsed) = serde_json::from_value(status.clone()) {
                session.checkout_state = Some(parsed);
            }
        }
        if agent == AgentKind::Router {
            if let Some(intent) = response.metadata.get("intent").and_then(Value::as_str) {
                session.last_intent = Some(intent.to_string());
            }
        }
        self.store.replace(session).await
    }

    async fn persist_clarification(
        &self,
        ctx: &TurnContext,
        response: &AgentResponse,
    ) -> Result<(), SessionStoreError> {
        let mut session = self.store.get(&ctx.session_id).await?;
        session.clarification_state = Some(ClarificationState {
            question: response
                .clarification_question
                .clone()
                .unwrap_or_else(|| response.content.clone()),
            original_message: ctx.user_message.clone(),
        });
        self.store.replace(session).await
    }

    async fn persist_handoff(
        &self,
        ctx: &TurnContext,
        approved: &ApprovedHandoff,
    ) -> Result<(), SessionStoreError> {
        let mut session = self.store.get(&ctx.session_id).await?;
        session.handoff_context = Some(crate::session::HandoffContext {
            from_agent: approved.from_agent,
            to_agent: approved.to_agent,
            reason: approved.reason.clone(),
        });
        self.store.replace(session).await
    }
}

/// 终态组装：最后一个专家的 content + metadata ∪ {iterations, final_agent, agent_history}
fn finish(iterations: u32, executed: Vec<AgentKind>, response: AgentResponse) -> TurnResult {
    let final_agent = executed.last().copied().unwrap_or(AgentKind::Router);

    let mut metadata = response.metadata;
    metadata.insert("iterations".to_string(), Value::from(iterations));
    metadata.insert(
        "final_agent".to_string(),
        Value::from(final_agent.as_str()),
    );
    metadata.insert(
        "agent_history".to_string(),
        Value::from(
            executed
                .iter()
                .map(|a| a.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
    );

    TurnResult {
        content: response.content,
        metadata,
    }
}
