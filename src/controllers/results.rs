//! Experiment results session
//!
//! Fetches the result and visualization list for one experiment as a unit,
//! seeds the chat transcript, and runs the send/receive/retry protocol.
//! The transcript is owned exclusively by this controller.

use crate::api::ApiGateway;
use crate::types::{AppResult, ExperimentResult, Visualization};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

const GREETING_WITH_REPORT: &str =
    "Hello! I am your territory partition analysis assistant. Here is the initial analysis report for this experiment:";
const GREETING: &str =
    "Hello! I am your territory partition analysis assistant. What would you like to analyze?";
const MSG_CHAT_FAILED: &str = "Sorry, something went wrong while replying.";
const MSG_ACTIVATION_FAILED: &str =
    "Failed to fetch experiment results. The experiment may still be running or may have failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Bot,
    System,
}

/// Re-issue of a failed send, carried as data on the error message it
/// belongs to rather than as a live closure.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryCommand {
    pub original_text: String,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Strictly increasing within a session.
    pub id: u64,
    pub role: MessageRole,
    pub text: String,
    pub retry: Option<RetryCommand>,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of the results view. Content renders only in `Ready`; a failure
/// of either activation fetch fails the whole view.
#[derive(Debug, Clone, Default)]
pub enum SessionPhase {
    #[default]
    Inactive,
    Loading,
    Failed(String),
    Ready {
        result: ExperimentResult,
        visualizations: Vec<Visualization>,
    },
}

/// What became of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The protocol ran to completion (the exchange itself may have failed
    /// and left a retryable error message in the transcript).
    Completed,
    /// Rejected: another send is already in flight. Sends are serialized.
    Busy,
    /// Rejected locally: empty text or no active experiment.
    Ignored,
}

pub struct ResultsSessionController {
    gateway: Arc<ApiGateway>,
    pub experiment_id: Option<String>,
    pub phase: SessionPhase,
    pub messages: Vec<ChatMessage>,
    next_message_id: u64,
    pub chat_busy: bool,
}

impl ResultsSessionController {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            gateway,
            experiment_id: None,
            phase: SessionPhase::Inactive,
            messages: Vec::new(),
            next_message_id: 1,
            chat_busy: false,
        }
    }

    /// Open the session for an experiment: fetch the result and the
    /// visualization list concurrently and apply them as a unit.
    pub async fn activate(&mut self, experiment_id: impl Into<String>) {
        let experiment_id = experiment_id.into();
        self.experiment_id = Some(experiment_id.clone());
        self.phase = SessionPhase::Loading;
        self.messages.clear();
        self.next_message_id = 1;
        self.chat_busy = false;

        let outcome = tokio::try_join!(
            self.gateway.experiment_result(&experiment_id),
            self.gateway.visualizations(&experiment_id)
        );
        self.apply_activation(&experiment_id, outcome);
    }

    /// Close the session. The transcript lives only as long as the view;
    /// reopening the same experiment starts from a fresh activation.
    pub fn deactivate(&mut self) {
        self.experiment_id = None;
        self.phase = SessionPhase::Inactive;
        self.messages.clear();
        self.next_message_id = 1;
        self.chat_busy = false;
    }

    /// Apply an activation outcome. Responses tagged with an experiment that
    /// is no longer current are discarded, as is a duplicate settlement of an
    /// already-settled activation; the transcript is seeded at most once.
    pub fn apply_activation(
        &mut self,
        experiment_id: &str,
        outcome: AppResult<(ExperimentResult, Vec<Visualization>)>,
    ) {
        if self.experiment_id.as_deref() != Some(experiment_id) {
            debug!("discarding activation response for stale experiment {}", experiment_id);
            return;
        }
        if !matches!(self.phase, SessionPhase::Loading) {
            debug!("activation for {} already settled", experiment_id);
            return;
        }
        match outcome {
            Ok((result, visualizations)) => {
                info!(
                    "experiment {} ready ({} algorithms, {} visualizations)",
                    experiment_id,
                    result.evaluation_reports.len(),
                    visualizations.len()
                );
                self.seed_transcript(result.llm_analysis_result.as_deref());
                self.phase = SessionPhase::Ready {
                    result,
                    visualizations,
                };
            }
            Err(e) => {
                warn!("activation of {} failed: {}", experiment_id, e);
                self.phase = SessionPhase::Failed(e.user_message(MSG_ACTIVATION_FAILED));
            }
        }
    }

    fn seed_transcript(&mut self, narrative: Option<&str>) {
        match narrative {
            Some(report) => {
                self.push_message(MessageRole::System, GREETING_WITH_REPORT, None);
                self.push_message(MessageRole::Bot, report, None);
            }
            None => {
                self.push_message(MessageRole::System, GREETING, None);
            }
        }
    }

    fn push_message(&mut self, role: MessageRole, text: &str, retry: Option<RetryCommand>) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            text: text.to_string(),
            retry,
            timestamp: Utc::now(),
        });
        id
    }

    /// Run the send protocol: append the user message optimistically, issue
    /// the exchange, then append either the reply or a retryable error
    /// message. The optimistic user message is never rolled back.
    ///
    /// Sends are serialized: while one is in flight the controller rejects
    /// further sends instead of letting replies interleave out of order.
    pub async fn send_message(&mut self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(experiment_id) = self.experiment_id.clone() else {
            return SendOutcome::Ignored;
        };
        if self.chat_busy {
            return SendOutcome::Busy;
        }

        self.chat_busy = true;
        self.push_message(MessageRole::User, text, None);
        let outcome = self.gateway.chat(&experiment_id, text).await;
        self.apply_chat(&experiment_id, text, outcome);
        SendOutcome::Completed
    }

    /// Apply a chat outcome; replies for an experiment that is no longer
    /// active are discarded.
    pub fn apply_chat(
        &mut self,
        experiment_id: &str,
        original_text: &str,
        outcome: AppResult<crate::types::ChatReply>,
    ) {
        if self.experiment_id.as_deref() != Some(experiment_id) {
            debug!("discarding chat reply for stale experiment {}", experiment_id);
            return;
        }
        self.chat_busy = false;
        match outcome {
            Ok(reply) => {
                self.push_message(MessageRole::Bot, &reply.reply, None);
            }
            Err(e) => {
                warn!("chat exchange failed: {}", e);
                self.push_message(
                    MessageRole::System,
                    MSG_CHAT_FAILED,
                    Some(RetryCommand {
                        original_text: original_text.to_string(),
                    }),
                );
            }
        }
    }

    /// Invoke the retry command bound to a message: remove exactly that
    /// message and re-run the send protocol with the original text. The
    /// removal and the re-send are one step: while a send is in flight the
    /// retry is rejected whole and the error message stays in the transcript.
    pub async fn retry(&mut self, message_id: u64) -> SendOutcome {
        if self.chat_busy {
            return SendOutcome::Busy;
        }
        let Some(index) = self
            .messages
            .iter()
            .position(|m| m.id == message_id && m.retry.is_some())
        else {
            return SendOutcome::Ignored;
        };
        let removed = self.messages.remove(index);
        let command = removed.retry.unwrap_or(RetryCommand {
            original_text: String::new(),
        });
        self.send_message(&command.original_text).await
    }

    /// Partition the visualization list by algorithm, preserving first-seen
    /// algorithm order and per-algorithm arrival order.
    pub fn grouped_visualizations(&self) -> Vec<(&str, Vec<&Visualization>)> {
        let SessionPhase::Ready { visualizations, .. } = &self.phase else {
            return Vec::new();
        };
        let mut groups: Vec<(&str, Vec<&Visualization>)> = Vec::new();
        for viz in visualizations {
            match groups.iter_mut().find(|(algo, _)| *algo == viz.algorithm) {
                Some((_, list)) => list.push(viz),
                None => groups.push((viz.algorithm.as_str(), vec![viz])),
            }
        }
        groups
    }

    /// Download link for one algorithm's partition export. No network I/O.
    pub fn export_url(&self, algorithm: &str) -> Option<String> {
        self.experiment_id
            .as_deref()
            .map(|id| self.gateway.export_url(id, algorithm))
    }
}
