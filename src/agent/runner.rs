//! Turn runner: the tool-calling loop behind one chat request.
//!
//! A turn either starts from a new user message or resumes a suspended tool
//! call. Each step asks the LLM for text and tool calls, runs the calls in
//! order, and streams every event as a [`UiChunk`]. The turn ends when the
//! model answers without tool calls, a tool suspends, or the step cap is hit.
//! Parts are persisted after every step so a dropped connection keeps what
//! was already produced.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::definition::AgentDefinition;
use super::memory::ThreadMemory;
use super::prompts;
use super::suspend::{ToolCallState, TrackedCall};
use crate::chat::convert::to_llm_messages;
use crate::chat::ui::{SuspendedData, ToolPart, ToolPartState, UiChunk, UiMessage, UiPart, UiRole};
use crate::context::ToolContext;
use crate::error::AgentError;
use crate::llm::{ChatMessage, LlmProvider, ToolCall, ToolCompletionRequest, ToolDefinition};
use crate::store::{SuspendedCallRecord, SuspendedStatus};
use crate::tools::{Tool, ToolError, ToolOutcome, ToolRegistry};

const TOOL_TIMEOUT: Duration = Duration::from_secs(60);
const CHUNK_BUFFER: usize = 64;

pub const ANOTHER_SUSPENSION: &str = "another tool call is awaiting user input";
pub const SKIPPED_AFTER_SUSPEND: &str = "not executed: turn suspended awaiting user input";

/// Client data for a suspended call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeRequest {
    pub tool_call_id: String,
    pub data: Value,
}

/// One chat request, already scoped to a thread and principal.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub agent: Arc<AgentDefinition>,
    pub thread_id: String,
    pub resource_id: String,
    pub user_id: String,
    /// Messages sent by the client, oldest first.
    pub messages: Vec<UiMessage>,
    pub resume: Option<ResumeRequest>,
}

/// How a prepared turn begins.
#[derive(Debug)]
enum TurnStart {
    Message(UiMessage),
    Resume {
        record: SuspendedCallRecord,
        data: Value,
    },
}

/// A turn that passed request validation and may now stream.
#[derive(Debug)]
pub struct PreparedTurn {
    request: TurnRequest,
    start: TurnStart,
}

impl PreparedTurn {
    pub fn thread_id(&self) -> &str {
        &self.request.thread_id
    }
}

/// What a finished turn produced.
#[derive(Debug, Clone, Default)]
pub struct TurnSummary {
    pub message_id: String,
    pub text: String,
    pub suspended: Option<SuspendedData>,
    pub steps: usize,
}

/// Resume data carried as `output: {data}` on a tool part of the last
/// assistant message, for a call that message also marks suspended.
fn resume_from_messages(messages: &[UiMessage]) -> Option<ResumeRequest> {
    let last = messages.last().filter(|m| m.role == UiRole::Assistant)?;
    last.parts.iter().find_map(|part| {
        let UiPart::Suspended(suspended) = part else {
            return None;
        };
        let tool = last.tool_part(&suspended.tool_call_id)?;
        let data = tool.output.as_ref()?.get("data")?.clone();
        Some(ResumeRequest {
            tool_call_id: suspended.tool_call_id.clone(),
            data,
        })
    })
}

/// Sends chunks until the receiver goes away.
struct Emitter {
    tx: mpsc::Sender<UiChunk>,
    open: bool,
}

impl Emitter {
    fn new(tx: mpsc::Sender<UiChunk>) -> Self {
        Self { tx, open: true }
    }

    async fn send(&mut self, chunk: UiChunk) {
        if self.open && self.tx.send(chunk).await.is_err() {
            debug!("Chunk receiver dropped, stopping turn");
            self.open = false;
        }
    }

    fn is_closed(&self) -> bool {
        !self.open
    }
}

/// Result of running one tool call.
enum CallResult {
    Output(Value),
    Error(String),
    Suspended(Value),
}

/// Mutable state of a running turn.
struct Turn {
    request: TurnRequest,
    /// Recalled history without the response message.
    history: Vec<UiMessage>,
    /// Assistant message this turn writes into.
    response: UiMessage,
    /// Oldest call still suspended in the thread.
    pending: Option<SuspendedCallRecord>,
    /// Pending call offered back to the model with a `resumeData` parameter.
    offered: Option<SuspendedCallRecord>,
    summary: TurnSummary,
}

impl Turn {
    fn tool_context(&self, tool_call_id: &str) -> ToolContext {
        ToolContext::new(
            self.request.user_id.as_str(),
            self.request.thread_id.as_str(),
            self.request.resource_id.as_str(),
            tool_call_id,
        )
    }

    fn remembers(&self) -> bool {
        self.request.agent.memory.is_some()
    }
}

/// Runs turns for any agent in the catalog.
pub struct AgentRunner {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    memory: ThreadMemory,
    max_steps: usize,
}

impl AgentRunner {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        memory: ThreadMemory,
        max_steps: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            memory,
            max_steps: max_steps.max(1),
        }
    }

    pub fn memory(&self) -> &ThreadMemory {
        &self.memory
    }

    /// Validate a request before any output is produced.
    ///
    /// Fails with `UnknownToolCall` when resume data names a call that is not
    /// suspended in this thread.
    pub async fn prepare(&self, request: TurnRequest) -> Result<PreparedTurn, AgentError> {
        let resume = request
            .resume
            .clone()
            .or_else(|| resume_from_messages(&request.messages));

        let start = match resume {
            Some(resume) => {
                let record = self
                    .memory
                    .suspended_call(&request.thread_id, &request.resource_id, &resume.tool_call_id)
                    .await?
                    .ok_or_else(|| AgentError::UnknownToolCall {
                        tool_call_id: resume.tool_call_id.clone(),
                    })?;
                TurnStart::Resume {
                    record,
                    data: resume.data,
                }
            }
            None => match request.messages.last() {
                Some(last) if last.role == UiRole::User && !last.text().trim().is_empty() => {
                    TurnStart::Message(last.clone())
                }
                Some(_) => {
                    return Err(AgentError::InvalidRequest(
                        "last message must be a user message or a tool resume".to_string(),
                    ));
                }
                None => {
                    return Err(AgentError::InvalidRequest("messages must not be empty".to_string()));
                }
            },
        };

        Ok(PreparedTurn { request, start })
    }

    /// Run a turn in the background and stream its chunks.
    pub fn stream(self: &Arc<Self>, turn: PreparedTurn) -> mpsc::Receiver<UiChunk> {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = runner.run(turn, tx.clone()).await {
                warn!(error = %e, "Turn failed");
                let _ = tx.send(UiChunk::Error { error_text: e.to_string() }).await;
                let _ = tx.send(UiChunk::Finish).await;
            }
        });
        rx
    }

    /// Run a turn to completion without a client stream.
    pub async fn generate(&self, turn: PreparedTurn) -> Result<TurnSummary, AgentError> {
        let (tx, mut rx) = mpsc::channel(CHUNK_BUFFER);
        let drain = async { while rx.recv().await.is_some() {} };
        let (result, ()) = tokio::join!(self.run(turn, tx), drain);
        result
    }

    /// Drive the loop, emitting chunks into `tx`.
    pub async fn run(
        &self,
        prepared: PreparedTurn,
        tx: mpsc::Sender<UiChunk>,
    ) -> Result<TurnSummary, AgentError> {
        let mut out = Emitter::new(tx);
        let PreparedTurn { request, start } = prepared;
        let thread_id = request.thread_id.clone();
        let resource_id = request.resource_id.clone();
        let remembers = request.agent.memory.is_some();

        if let TurnStart::Message(message) = &start {
            if remembers {
                self.memory.save(&thread_id, &resource_id, message).await?;
            }
        }

        let history = match request.agent.memory {
            Some(config) => {
                self.memory
                    .recall(&thread_id, &resource_id, Some(config.last_messages), true)
                    .await?
            }
            None => request.messages.clone(),
        };

        let response = match &start {
            TurnStart::Message(_) => UiMessage::new(Uuid::new_v4().to_string(), UiRole::Assistant),
            TurnStart::Resume { record, .. } => {
                self.load_suspended_message(&request, &history, record).await?
            }
        };

        let pending = self.memory.pending_suspension(&thread_id, &resource_id).await?;

        let mut turn = Turn {
            summary: TurnSummary {
                message_id: response.id.clone(),
                ..TurnSummary::default()
            },
            history: history.into_iter().filter(|m| m.id != response.id).collect(),
            response,
            offered: None,
            pending,
            request,
        };

        info!(
            agent = %turn.request.agent.id,
            thread = %thread_id,
            resource = %resource_id,
            resume = matches!(start, TurnStart::Resume { .. }),
            "Turn started"
        );

        out.send(UiChunk::Start {
            message_id: turn.response.id.clone(),
        })
        .await;

        match start {
            TurnStart::Resume { record, data } => {
                self.resume_call(&mut turn, &mut out, record, data, false).await?;
                self.persist(&turn).await?;
            }
            TurnStart::Message(_) => {
                if turn.request.agent.auto_resume {
                    turn.offered = turn.pending.clone();
                }
            }
        }

        self.tool_loop(&mut turn, &mut out).await?;

        out.send(UiChunk::Finish).await;
        info!(
            thread = %thread_id,
            steps = turn.summary.steps,
            suspended = turn.summary.suspended.is_some(),
            "Turn finished"
        );
        Ok(turn.summary)
    }

    async fn tool_loop(&self, turn: &mut Turn, out: &mut Emitter) -> Result<(), AgentError> {
        let tool_names = turn.request.agent.tool_names();
        let base_tools = self.tools.definitions_for(&tool_names).await;

        for step in 1..=self.max_steps {
            if out.is_closed() {
                return Ok(());
            }
            turn.summary.steps = step;

            let request = ToolCompletionRequest::new(
                self.llm_messages(turn),
                self.offered_tools(turn, &base_tools).await,
            );
            out.send(UiChunk::StartStep).await;
            turn.response.parts.push(UiPart::StepStart);

            let response = match self.llm.complete_with_tools(request).await {
                Ok(response) => response,
                Err(e) => {
                    self.persist(turn).await?;
                    return Err(e.into());
                }
            };

            if let Some(text) = response.content.filter(|t| !t.is_empty()) {
                let id = format!("{}-{step}", turn.response.id);
                out.send(UiChunk::TextStart { id: id.clone() }).await;
                out.send(UiChunk::TextDelta {
                    id: id.clone(),
                    delta: text.clone(),
                })
                .await;
                out.send(UiChunk::TextEnd { id }).await;
                turn.summary.text.push_str(&text);
                turn.response.parts.push(UiPart::Text { text });
            }

            let has_calls = !response.tool_calls.is_empty();
            let mut suspended = false;
            for call in response.tool_calls {
                if suspended {
                    self.skip_call(turn, out, call).await;
                } else {
                    suspended = self.handle_call(turn, out, call).await?;
                }
            }

            self.persist(turn).await?;
            out.send(UiChunk::FinishStep).await;

            if suspended || !has_calls {
                return Ok(());
            }
        }

        warn!(
            thread = %turn.request.thread_id,
            max = self.max_steps,
            "Turn stopped at step cap"
        );
        out.send(UiChunk::Error {
            error_text: AgentError::MaxStepsExceeded { max: self.max_steps }.to_string(),
        })
        .await;
        Ok(())
    }

    fn llm_messages(&self, turn: &Turn) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(turn.request.agent.instructions.clone()),
            ChatMessage::system(prompts::caller_note(&turn.request.user_id)),
        ];
        if let Some(offered) = &turn.offered {
            messages.push(ChatMessage::system(prompts::auto_resume_note(offered)));
        }
        messages.extend(to_llm_messages(&turn.history));
        messages.extend(to_llm_messages(std::slice::from_ref(&turn.response)));
        messages
    }

    /// Tool definitions for this step, with the offered call's tool taking
    /// `resumeData` instead of its usual input.
    async fn offered_tools(&self, turn: &Turn, base: &[ToolDefinition]) -> Vec<ToolDefinition> {
        let Some(offered) = &turn.offered else {
            return base.to_vec();
        };
        let resume_schema = match self.tools.get(&offered.tool_name).await {
            Some(tool) => tool.resume_schema(),
            None => None,
        };
        let Some(resume_schema) = resume_schema else {
            return base.to_vec();
        };
        base.iter()
            .cloned()
            .map(|mut def| {
                if def.name == offered.tool_name {
                    def.parameters = json!({
                        "type": "object",
                        "properties": { "resumeData": resume_schema },
                        "required": ["resumeData"]
                    });
                }
                def
            })
            .collect()
    }

    /// Run one model tool call. Returns whether the turn is now suspended.
    async fn handle_call(
        &self,
        turn: &mut Turn,
        out: &mut Emitter,
        call: ToolCall,
    ) -> Result<bool, AgentError> {
        if let Some(offered) = turn.offered.clone() {
            if call.name == offered.tool_name {
                if let Some(data) = call.arguments.get("resumeData").cloned() {
                    turn.offered = None;
                    self.resume_call(turn, out, offered, data, true).await?;
                    return Ok(false);
                }
            }
        }

        let mut tracked = TrackedCall::new(call.id.as_str(), call.name.as_str(), call.arguments.clone());
        self.announce(turn, out, &tracked).await;

        let ctx = turn.tool_context(&call.id);
        let result = match self.tools.get(&call.name).await {
            Some(tool) => execute_tool(tool.as_ref(), call.arguments, &ctx).await,
            None => CallResult::Error(ToolError::NotFound(call.name.clone()).to_string()),
        };

        match result {
            CallResult::Output(output) => {
                transition(&mut tracked, ToolCallState::OutputAvailable)?;
                self.complete_part(turn, out, &tracked.tool_call_id, output).await;
                Ok(false)
            }
            CallResult::Error(error) => {
                transition(&mut tracked, ToolCallState::Errored)?;
                self.fail_part(turn, out, &tracked.tool_call_id, error).await;
                Ok(false)
            }
            CallResult::Suspended(payload) => {
                if let Some(pending) = &turn.pending {
                    debug!(
                        pending = %pending.tool_call_id,
                        rejected = %tracked.tool_call_id,
                        "Second suspension in thread refused"
                    );
                    transition(&mut tracked, ToolCallState::Errored)?;
                    self.fail_part(turn, out, &tracked.tool_call_id, ANOTHER_SUSPENSION.to_string())
                        .await;
                    return Ok(false);
                }

                transition(&mut tracked, ToolCallState::Suspended)?;
                let record = tracked.suspension_record(
                    &turn.request.thread_id,
                    &turn.request.resource_id,
                    &turn.response.id,
                    payload.clone(),
                    Utc::now(),
                );
                self.memory.record_suspension(&record).await?;

                let data = SuspendedData {
                    tool_call_id: tracked.tool_call_id.clone(),
                    tool_name: tracked.tool_name.clone(),
                    suspend_payload: payload,
                };
                turn.response.parts.push(UiPart::Suspended(data.clone()));
                out.send(UiChunk::DataToolCallSuspended { data: data.clone() }).await;
                info!(
                    thread = %turn.request.thread_id,
                    tool = %tracked.tool_name,
                    tool_call_id = %tracked.tool_call_id,
                    "Tool call suspended"
                );
                turn.summary.suspended = Some(data);
                turn.pending = Some(record);
                Ok(true)
            }
        }
    }

    /// Record a call that was not run because an earlier call suspended.
    async fn skip_call(&self, turn: &mut Turn, out: &mut Emitter, call: ToolCall) {
        let tracked = TrackedCall::new(call.id, call.name, call.arguments);
        self.announce(turn, out, &tracked).await;
        self.fail_part(turn, out, &tracked.tool_call_id, SKIPPED_AFTER_SUSPEND.to_string())
            .await;
    }


    /// Continue a suspended call with client data.
    ///
    /// With `announce`, a fresh tool part for the call is added to the
    /// response and the part in the original message is rewritten as well.
    async fn resume_call(
        &self,
        turn: &mut Turn,
        out: &mut Emitter,
        record: SuspendedCallRecord,
        data: Value,
        announce: bool,
    ) -> Result<(), AgentError> {
        let mut tracked = TrackedCall::from_record(&record);
        if announce || turn.response.tool_part(&record.tool_call_id).is_none() {
            self.announce(turn, out, &tracked).await;
        }
        if turn
            .pending
            .as_ref()
            .is_some_and(|p| p.tool_call_id == record.tool_call_id)
        {
            turn.pending = None;
        }

        let result: Result<Value, String> = match self.tools.get(&record.tool_name).await {
            None => Err(ToolError::NotFound(record.tool_name.clone()).to_string()),
            Some(tool) => match tool.validate_resume(&data) {
                Err(e) => Err(e.to_string()),
                Ok(()) => {
                    transition(&mut tracked, ToolCallState::Resumed)?;
                    self.memory.resolve(&record, SuspendedStatus::Resumed).await?;
                    let ctx = turn.tool_context(&record.tool_call_id).with_resume_data(data);
                    match execute_tool(tool.as_ref(), record.input.clone(), &ctx).await {
                        CallResult::Output(output) => Ok(output),
                        CallResult::Error(error) => Err(error),
                        CallResult::Suspended(_) => {
                            Err(format!("{} suspended again after resume", record.tool_name))
                        }
                    }
                }
            },
        };

        match result {
            Ok(output) => {
                transition(&mut tracked, ToolCallState::OutputAvailable)?;
                self.complete_part(turn, out, &record.tool_call_id, output).await;
                info!(tool_call_id = %record.tool_call_id, tool = %record.tool_name, "Tool call resumed");
            }
            Err(error) => {
                transition(&mut tracked, ToolCallState::Errored)?;
                self.memory.resolve(&record, SuspendedStatus::Errored).await?;
                warn!(tool_call_id = %record.tool_call_id, error = %error, "Resume failed");
                self.fail_part(turn, out, &record.tool_call_id, error.clone()).await;
                if let Some(part) = turn.response.tool_part_mut(&record.tool_call_id) {
                    part.output = Some(json!({ "success": false, "error": error }));
                }
            }
        }
        let part = turn.response.tool_part(&record.tool_call_id).cloned();

        if announce {
            if let Some(part) = part {
                self.rewrite_stored_part(turn, &record, part).await?;
            }
        }
        Ok(())
    }

    /// Add an `input-available` tool part and announce it.
    async fn announce(&self, turn: &mut Turn, out: &mut Emitter, call: &TrackedCall) {
        turn.response.parts.push(UiPart::Tool(ToolPart {
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            state: ToolPartState::InputAvailable,
            input: call.input.clone(),
            output: None,
            error_text: None,
        }));
        out.send(UiChunk::ToolInputAvailable {
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            input: call.input.clone(),
            dynamic: true,
        })
        .await;
    }

    async fn complete_part(&self, turn: &mut Turn, out: &mut Emitter, tool_call_id: &str, output: Value) {
        if let Some(part) = turn.response.tool_part_mut(tool_call_id) {
            part.state = ToolPartState::OutputAvailable;
            part.output = Some(output.clone());
            part.error_text = None;
        }
        out.send(UiChunk::ToolOutputAvailable {
            tool_call_id: tool_call_id.to_string(),
            output,
            dynamic: true,
        })
        .await;
    }

    async fn fail_part(&self, turn: &mut Turn, out: &mut Emitter, tool_call_id: &str, error: String) {
        if let Some(part) = turn.response.tool_part_mut(tool_call_id) {
            part.state = ToolPartState::OutputError;
            part.error_text = Some(error.clone());
        }
        out.send(UiChunk::ToolOutputError {
            tool_call_id: tool_call_id.to_string(),
            error_text: error,
            dynamic: true,
        })
        .await;
    }

    async fn persist(&self, turn: &Turn) -> Result<(), AgentError> {
        if turn.remembers() {
            self.memory
                .save(&turn.request.thread_id, &turn.request.resource_id, &turn.response)
                .await?;
        }
        Ok(())
    }

    /// Copy a resolved part into the stored message that suspended it.
    async fn rewrite_stored_part(
        &self,
        turn: &Turn,
        record: &SuspendedCallRecord,
        resolved: ToolPart,
    ) -> Result<(), AgentError> {
        if !turn.remembers() || record.message_id == turn.response.id {
            return Ok(());
        }
        let Some(mut message) = self
            .memory
            .find_message(&record.thread_id, &record.resource_id, &record.message_id)
            .await?
        else {
            return Ok(());
        };
        if let Some(part) = message.tool_part_mut(&record.tool_call_id) {
            *part = resolved;
            self.memory
                .save(&record.thread_id, &record.resource_id, &message)
                .await?;
        }
        Ok(())
    }

    /// The assistant message holding a suspended call, rebuilt from the
    /// record when it is no longer stored.
    async fn load_suspended_message(
        &self,
        request: &TurnRequest,
        history: &[UiMessage],
        record: &SuspendedCallRecord,
    ) -> Result<UiMessage, AgentError> {
        if let Some(message) = history.iter().find(|m| m.id == record.message_id) {
            return Ok(message.clone());
        }
        if request.agent.memory.is_some() {
            if let Some(message) = self
                .memory
                .find_message(&request.thread_id, &request.resource_id, &record.message_id)
                .await?
            {
                return Ok(message);
            }
        }
        if let Some(message) = request.messages.iter().find(|m| m.id == record.message_id) {
            return Ok(message.clone());
        }

        let mut message = UiMessage::new(record.message_id.clone(), UiRole::Assistant);
        message.parts.push(UiPart::Tool(ToolPart {
            tool_call_id: record.tool_call_id.clone(),
            tool_name: record.tool_name.clone(),
            state: ToolPartState::InputAvailable,
            input: record.input.clone(),
            output: None,
            error_text: None,
        }));
        message.parts.push(UiPart::Suspended(SuspendedData {
            tool_call_id: record.tool_call_id.clone(),
            tool_name: record.tool_name.clone(),
            suspend_payload: record.suspend_payload.clone(),
        }));
        Ok(message)
    }
}

fn transition(call: &mut TrackedCall, target: ToolCallState) -> Result<(), AgentError> {
    call.transition_to(target).map_err(|e| {
        warn!(tool_call_id = %call.tool_call_id, error = %e, "Illegal tool call transition");
        AgentError::from(e)
    })
}

/// Validate and run a tool under the execution timeout.
async fn execute_tool(tool: &dyn Tool, input: Value, ctx: &ToolContext) -> CallResult {
    if let Err(e) = tool.validate_input(&input) {
        return CallResult::Error(e.to_string());
    }

    debug!(tool = %tool.name(), tool_call_id = %ctx.tool_call_id, "Tool call started");
    let start = std::time::Instant::now();
    let result = tokio::time::timeout(TOOL_TIMEOUT, tool.execute(input, ctx)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Err(_) => {
            debug!(tool = %tool.name(), elapsed_ms, "Tool call timed out");
            CallResult::Error(ToolError::Timeout(TOOL_TIMEOUT).to_string())
        }
        Ok(Err(e)) => {
            debug!(tool = %tool.name(), elapsed_ms, error = %e, "Tool call failed");
            CallResult::Error(e.to_string())
        }
        Ok(Ok(ToolOutcome::Output(output))) => {
            debug!(tool = %tool.name(), elapsed_ms, "Tool call succeeded");
            CallResult::Output(output)
        }
        Ok(Ok(ToolOutcome::Suspend(payload))) => {
            if tool.can_suspend() {
                CallResult::Suspended(payload)
            } else {
                CallResult::Error(ToolError::SuspendNotAllowed(tool.name().to_string()).to_string())
            }
        }
    }
}
