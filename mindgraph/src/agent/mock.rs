//! Mock collaborators for tests and examples.
//!
//! - [`MockPlanner`]: replays scripted replies, then a fallback reply forever.
//! - [`MockSearchAgent`]: fixed answer, failure, panic or closure, with optional delay.
//! - [`MockSummarizer`]: fixed text, echo of the references, or failure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::graph::SearchAnswer;
use crate::worker::SearchError;

use super::{Conversation, Planner, PlannerReply, SearchAgent, SearchRequest, Summarizer, SummaryRequest};

/// Scripted planner.
///
/// Each call pops the next scripted result; once the script is exhausted every call
/// returns the fallback (default [`PlannerReply::Summarize`]). Conversations seen are
/// recorded for assertions.
pub struct MockPlanner {
    script: Mutex<VecDeque<Result<PlannerReply, AgentError>>>,
    fallback: Result<PlannerReply, AgentError>,
    seen: Mutex<Vec<Conversation>>,
}

impl MockPlanner {
    pub fn scripted(replies: Vec<PlannerReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().map(Ok).collect()),
            fallback: Ok(PlannerReply::Summarize),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Returns the same reply on every call.
    pub fn repeating(reply: PlannerReply) -> Self {
        Self::scripted(Vec::new()).with_fallback(Ok(reply))
    }

    /// Fails on every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(Vec::new()).with_fallback(Err(AgentError::ExecutionFailed(message.into())))
    }

    /// Appends a failure to the script (builder).
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.lock_script()
            .push_back(Err(AgentError::ExecutionFailed(message.into())));
        self
    }

    /// Sets what is returned once the script is exhausted (builder).
    pub fn with_fallback(mut self, fallback: Result<PlannerReply, AgentError>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Conversations passed to `plan`, in call order.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<PlannerReply, AgentError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, conversation: &Conversation) -> Result<PlannerReply, AgentError> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(conversation.clone());
        let next = self.lock_script().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

type SearchFn = dyn Fn(&SearchRequest) -> Result<SearchAnswer, SearchError> + Send + Sync;

enum SearchBehavior {
    Respond(SearchAnswer),
    Fail(String),
    Panic,
    Compute(Arc<SearchFn>),
}

/// Mock search agent.
///
/// Counts calls and keeps every request so tests can check the topic and history.
pub struct MockSearchAgent {
    behavior: SearchBehavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MockSearchAgent {
    fn with_behavior(behavior: SearchBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns `answer` for every query.
    pub fn responding(answer: SearchAnswer) -> Self {
        Self::with_behavior(SearchBehavior::Respond(answer))
    }

    /// Fails every query with `SearchError::Failed(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(SearchBehavior::Fail(message.into()))
    }

    /// Panics inside `search`.
    pub fn panicking() -> Self {
        Self::with_behavior(SearchBehavior::Panic)
    }

    /// Computes the result from the request.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&SearchRequest) -> Result<SearchAnswer, SearchError> + Send + Sync + 'static,
    {
        Self::with_behavior(SearchBehavior::Compute(Arc::new(f)))
    }

    /// Sleeps before answering (builder).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SearchAgent for MockSearchAgent {
    async fn search(&self, request: SearchRequest) -> Result<SearchAnswer, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            SearchBehavior::Respond(answer) => Ok(answer.clone()),
            SearchBehavior::Fail(message) => Err(SearchError::Failed(message.clone())),
            SearchBehavior::Panic => panic!("mock search agent panic for {}", request.query),
            SearchBehavior::Compute(f) => f(&request),
        }
    }
}

enum SummaryBehavior {
    Fixed(String),
    Echo,
    Fail(String),
}

/// Mock summarizer. Records every request.
pub struct MockSummarizer {
    behavior: SummaryBehavior,
    requests: Mutex<Vec<SummaryRequest>>,
}

impl MockSummarizer {
    fn with_behavior(behavior: SummaryBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(answer: impl Into<String>) -> Self {
        Self::with_behavior(SummaryBehavior::Fixed(answer.into()))
    }

    /// Answers with the question followed by the reference text.
    pub fn echo() -> Self {
        Self::with_behavior(SummaryBehavior::Echo)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(SummaryBehavior::Fail(message.into()))
    }

    pub fn requests(&self) -> Vec<SummaryRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, request: SummaryRequest) -> Result<String, AgentError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        match &self.behavior {
            SummaryBehavior::Fixed(answer) => Ok(answer.clone()),
            SummaryBehavior::Echo => Ok(format!(
                "Answer to: {}\n\n{}",
                request.question, request.references_text
            )),
            SummaryBehavior::Fail(message) => Err(AgentError::ExecutionFailed(message.clone())),
        }
    }
}
