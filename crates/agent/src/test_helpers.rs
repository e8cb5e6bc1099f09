//! Shared test helpers: a scripted provider and misbehaving capabilities.

use async_trait::async_trait;
use inkwell_core::capability::{Capability, CapabilityArgs, CapabilitySchema};
use inkwell_core::error::{CapabilityError, ProviderError};
use inkwell_core::provider::{CompletionRequest, CompletionResponse, Provider};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A provider that replays scripted results in order.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    call_count: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(texts: Vec<String>) -> Self {
        Self::from_results(texts.into_iter().map(Ok).collect())
    }

    pub fn from_results(results: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            call_count: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    #[allow(dead_code)]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let next = self.responses.lock().unwrap().pop_front();
        let Some(next) = next else {
            panic!("ScriptedProvider: no more responses (call #{})", *count);
        };
        *count += 1;
        self.prompts.lock().unwrap().push(request.prompt);
        next.map(CompletionResponse::text)
    }
}

/// A decision in the JSON shape the decision prompt asks for.
pub fn decision_json(response_type: &str, tool: Option<&str>, args: Value, confidence: f64) -> String {
    json!({
        "context_understanding": "The student is working on a college essay",
        "reasoning": format!("Best next step is {}", tool.unwrap_or("a conversational reply")),
        "response_type": response_type,
        "tool_name": tool,
        "tool_args": args,
        "confidence": confidence,
        "context_flags": [],
    })
    .to_string()
}

/// Sleeps for a fixed time before answering.
pub struct SlowCapability {
    delay: Duration,
}

impl SlowCapability {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Capability for SlowCapability {
    fn name(&self) -> &str {
        "slow"
    }

    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema::new("Takes its time.")
    }

    async fn invoke(&self, _args: CapabilityArgs) -> Result<Value, CapabilityError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!("finally"))
    }
}

/// Always fails.
pub struct FailingCapability;

#[async_trait]
impl Capability for FailingCapability {
    fn name(&self) -> &str {
        "failing"
    }

    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema::new("Always fails.")
    }

    async fn invoke(&self, _args: CapabilityArgs) -> Result<Value, CapabilityError> {
        Err(CapabilityError::Failed("something broke".into()))
    }
}

/// Succeeds with `null`.
pub struct NullCapability;

#[async_trait]
impl Capability for NullCapability {
    fn name(&self) -> &str {
        "null"
    }

    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema::new("Returns nothing.")
    }

    async fn invoke(&self, _args: CapabilityArgs) -> Result<Value, CapabilityError> {
        Ok(Value::Null)
    }
}
