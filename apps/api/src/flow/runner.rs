//! Flow Runner: drives one invocation through
//! Validating → Rendering → Invoking(×N) → Assembling.
//!
//! The runner holds no per-invocation state; every call owns its own request
//! and response objects, so concurrent invocations never contend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::{AppError, FlowError};
use crate::flow::definition::{empty_value, FlowDefinition, InvocationMode, ResponseFormat};
use crate::flow::registry::FlowRegistry;
use crate::llm_client::{InvocationOutput, InvocationRequest, InvokeError, ModelInvoker};
use crate::schema::Schema;
use crate::template::TemplateError;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Validating,
    Rendering,
    Invoking,
    Assembling,
}

#[derive(Clone)]
pub struct FlowRunner {
    registry: Arc<FlowRegistry>,
    invoker: Arc<dyn ModelInvoker>,
    deadline: Duration,
    max_retries: u32,
}

impl FlowRunner {
    pub fn new(registry: FlowRegistry, invoker: Arc<dyn ModelInvoker>) -> Self {
        Self {
            registry: Arc::new(registry),
            invoker,
            deadline: DEFAULT_DEADLINE,
            max_retries: 0,
        }
    }

    /// Deadline for one model invocation, retries and backoff included.
    /// An overrun is reported as `CapabilityUnavailable`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Extra attempts for single-invocation flows on `CapabilityUnavailable`.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// Looks up `name` and runs it.
    pub async fn invoke(&self, name: &str, input: &Value) -> Result<Value, AppError> {
        let flow = self
            .registry
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("Flow '{name}' does not exist")))?;
        Ok(self.run(&flow, input).await?)
    }

    pub async fn run(&self, flow: &FlowDefinition, input: &Value) -> Result<Value, FlowError> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("flow", flow = %flow.name(), %invocation_id);

        async {
            let result = self.run_stages(flow, input).await;
            match &result {
                Ok(_) => info!("Flow completed"),
                Err(e @ (FlowError::MalformedOutput { .. } | FlowError::Template(_))) => {
                    error!("Flow failed: {e}")
                }
                Err(e) => warn!("Flow failed: {e}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, flow: &FlowDefinition, input: &Value) -> Result<Value, FlowError> {
        debug!(stage = ?FlowStage::Validating);
        let mut normalized = flow.input_schema().validate(input)?;
        flow.check_requirements(&normalized)?;
        flow.apply_rules(&mut normalized)?;

        let assembled = match flow.mode() {
            InvocationMode::Single(prompt) => {
                debug!(stage = ?FlowStage::Rendering);
                let request = prompt.request(&normalized, flow.output_schema())?;

                debug!(stage = ?FlowStage::Invoking);
                let output = self.invoke_with_retry(&request).await?;

                debug!(stage = ?FlowStage::Assembling);
                into_value(output, &prompt.format)
            }
            InvocationMode::ParallelMulti(subtasks) => {
                debug!(stage = ?FlowStage::Rendering);
                let mut slots = Map::new();
                let mut pending = Vec::with_capacity(subtasks.len());
                for subtask in subtasks {
                    let slot = flow.slot_schema(&subtask.label).ok_or_else(|| {
                        FlowError::Template(TemplateError::Definition(format!(
                            "sub-task '{}' has no output slot",
                            subtask.label
                        )))
                    })?;
                    let request = subtask.prompt.request(&normalized, &slot)?;
                    if let Some(spec) = slot.get(&subtask.label) {
                        slots.insert(subtask.label.clone(), empty_value(&spec.ty));
                    }
                    pending.push((
                        subtask.label.clone(),
                        subtask.prompt.format.clone(),
                        slot,
                        request,
                    ));
                }

                debug!(stage = ?FlowStage::Invoking, subtasks = pending.len());
                let settled = self.fan_out(pending).await;

                debug!(stage = ?FlowStage::Assembling);
                for (label, value) in settled {
                    slots.insert(label, value);
                }
                Value::Object(slots)
            }
        };

        check_output(flow.output_schema(), &assembled)
    }

    /// Runs every sub-request concurrently and waits for all of them.
    /// A failed sub-task yields nothing; its slot keeps the empty placeholder.
    async fn fan_out(
        &self,
        pending: Vec<(String, ResponseFormat, Schema, InvocationRequest)>,
    ) -> Vec<(String, Value)> {
        let mut set = JoinSet::new();

        for (label, format, slot, request) in pending {
            let invoker = Arc::clone(&self.invoker);
            let deadline = self.deadline;
            set.spawn(async move {
                let result = invoke_once(invoker.as_ref(), &request, deadline)
                    .await
                    .map_err(FlowError::from)
                    .and_then(|output| check_output(&slot, &into_value(output, &format)))
                    .map(|mut checked| checked[&label].take());
                (label, result)
            });
        }

        let mut settled = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((label, Ok(value))) => settled.push((label, value)),
                Ok((label, Err(e))) => {
                    warn!(subtask = %label, "Sub-task failed, using empty result: {e}");
                }
                Err(e) => warn!("Sub-task aborted, using empty result: {e}"),
            }
        }
        settled
    }

    /// Retries `CapabilityUnavailable` within a single deadline shared by
    /// every attempt and backoff.
    async fn invoke_with_retry(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationOutput, InvokeError> {
        match tokio::time::timeout(self.deadline, self.retry_loop(request)).await {
            Ok(result) => result,
            Err(_) => Err(deadline_exceeded(self.deadline)),
        }
    }

    async fn retry_loop(&self, request: &InvocationRequest) -> Result<InvocationOutput, InvokeError> {
        let mut attempt = 0;
        loop {
            match self.invoker.invoke(request).await {
                Err(InvokeError::CapabilityUnavailable(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    // Exponential backoff: 1s, 2s, 4s
                    let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                    warn!(
                        "Invocation attempt {} failed ({}), retrying after {}ms...",
                        attempt,
                        reason,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

async fn invoke_once(
    invoker: &dyn ModelInvoker,
    request: &InvocationRequest,
    deadline: Duration,
) -> Result<InvocationOutput, InvokeError> {
    match tokio::time::timeout(deadline, invoker.invoke(request)).await {
        Ok(result) => result,
        Err(_) => Err(deadline_exceeded(deadline)),
    }
}

fn deadline_exceeded(deadline: Duration) -> InvokeError {
    InvokeError::CapabilityUnavailable(format!("no answer within {}s", deadline.as_secs_f32()))
}

fn into_value(output: InvocationOutput, format: &ResponseFormat) -> Value {
    match (output, format) {
        (InvocationOutput::Text(text), ResponseFormat::TextField(field)) => {
            let mut object = Map::new();
            object.insert(field.clone(), Value::String(text));
            Value::Object(object)
        }
        // Schema-constrained answers are used as-is; a stray text answer is
        // tried as JSON and left to the output check otherwise.
        (InvocationOutput::Structured(value), _) => value,
        (InvocationOutput::Text(text), ResponseFormat::Json) => {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
    }
}

fn check_output(schema: &Schema, value: &Value) -> Result<Value, FlowError> {
    schema
        .validate(value)
        .map(Value::Object)
        .map_err(|e| FlowError::MalformedOutput {
            message: format!("output did not match the declared schema: {e}"),
            violations: e.violations,
        })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
