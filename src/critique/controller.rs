//! Critique Controller: drives one primary turn and N-1 critique turns.
//!
//! ```text
//! AwaitingPrimary -> AwaitingCritique(2) -> ... -> AwaitingCritique(N) -> Done
//! ```
//!
//! A failed primary turn ends the run. A failed critique turn is skipped: no
//! turn is appended, no record is written, and the next iteration runs.

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use super::config::{RunConfig, select_critic};
use crate::error::{CritiqueError, Result};
use crate::events::{EventSender, RunEvent, emit};
use crate::llm::{BackoffClient, ChatRequest, ChatTransport, Completion, FailureKind, Message, RequestFailure};
use crate::prompt::build_critique_request;
use crate::storage::{RunRecord, RunStore, generate_run_id};
use crate::transcript::{NewTurn, Transcript};

/// Where the controller is in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationState {
    AwaitingPrimary,
    AwaitingCritique(u32),
    Done,
}

impl IterationState {
    /// Iteration number this state will execute
    pub fn iteration(&self) -> Option<u32> {
        match self {
            Self::AwaitingPrimary => Some(1),
            Self::AwaitingCritique(i) => Some(*i),
            Self::Done => None,
        }
    }

    /// The state after this one completes or is skipped
    pub fn next(&self, total_iterations: u32) -> Self {
        match self.iteration() {
            Some(current) if current < total_iterations => Self::AwaitingCritique(current + 1),
            _ => Self::Done,
        }
    }
}

/// A critique iteration that produced nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedIteration {
    pub iteration: u32,
    pub model: String,
    pub kind: FailureKind,
    pub detail: String,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub transcript: Transcript,
    /// Iterations that appended a turn, in order
    pub completed: Vec<u32>,
    pub skipped: Vec<SkippedIteration>,
    pub records_persisted: usize,
    pub persist_failures: usize,
    /// Stopped early by the cancellation token
    pub cancelled: bool,
}

impl RunReport {
    fn new(run_id: String, transcript: Transcript) -> Self {
        Self {
            run_id,
            transcript,
            completed: Vec::new(),
            skipped: Vec::new(),
            records_persisted: 0,
            persist_failures: 0,
            cancelled: false,
        }
    }

    pub fn critique_count(&self) -> usize {
        self.transcript.critic_turns().count()
    }
}

/// Runs the generate-then-critique sequence against one transport and one store.
pub struct CritiqueController<T: ChatTransport, S: RunStore> {
    config: RunConfig,
    client: BackoffClient<T>,
    store: S,
    cancel: CancellationToken,
    events: Option<EventSender>,
    run_id: String,
}

impl<T: ChatTransport, S: RunStore> CritiqueController<T, S> {
    /// Validate `config` and wire the retrying client around `transport`
    pub fn new(config: RunConfig, transport: T, store: S) -> Result<Self> {
        config.validate()?;
        let client = BackoffClient::new(transport, config.retry.clone());

        Ok(Self {
            config,
            client,
            store,
            cancel: CancellationToken::new(),
            events: None,
            run_id: generate_run_id(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.client = self.client.with_events(events.clone());
        self.events = Some(events);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn client(&self) -> &BackoffClient<T> {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute every iteration in order.
    ///
    /// Errors only when the primary turn fails or the run is cancelled
    /// before it. Critique failures and persistence failures are recorded
    /// in the report.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            "Starting run {} ({} iterations) for prompt: {}",
            self.run_id, self.config.iterations, self.config.user_prompt
        );

        let mut report = RunReport::new(self.run_id.clone(), Transcript::new(&self.config.user_prompt));
        let mut state = IterationState::AwaitingPrimary;

        loop {
            match state {
                IterationState::AwaitingPrimary => {
                    self.primary_turn(&mut report.transcript).await?;
                    report.completed.push(1);
                    self.persist(1, &mut report);
                }
                IterationState::AwaitingCritique(iteration) => {
                    if self.cancel.is_cancelled() {
                        report.cancelled = true;
                        break;
                    }

                    match self.critique_turn(iteration, &mut report.transcript).await {
                        Ok(()) => {
                            report.completed.push(iteration);
                            self.persist(iteration, &mut report);
                        }
                        Err(CritiqueError::Cancelled) => {
                            warn!("Run {} cancelled during iteration {}", self.run_id, iteration);
                            report.cancelled = true;
                            break;
                        }
                        Err(CritiqueError::TurnFailed {
                            iteration,
                            model,
                            kind,
                            detail,
                            ..
                        }) => {
                            error!(
                                "Failed to get critique in iteration {} from {} ({}); skipping",
                                iteration, model, kind
                            );
                            emit(
                                self.events.as_ref(),
                                RunEvent::IterationSkipped {
                                    iteration,
                                    model: model.clone(),
                                    kind,
                                    detail: detail.clone(),
                                },
                            );
                            report.skipped.push(SkippedIteration {
                                iteration,
                                model,
                                kind,
                                detail,
                            });
                        }
                        Err(other) => return Err(other),
                    }
                }
                IterationState::Done => break,
            }

            state = state.next(self.config.iterations);
        }

        info!(
            "Run {} finished: {} completed, {} skipped, {} records persisted",
            self.run_id,
            report.completed.len(),
            report.skipped.len(),
            report.records_persisted
        );
        Ok(report)
    }

    async fn primary_turn(&self, transcript: &mut Transcript) -> Result<()> {
        let model = self.config.primary_model.as_str();
        info!("Iteration 1: requesting primary response from {}", model);
        emit(
            self.events.as_ref(),
            RunEvent::IterationStarted {
                iteration: 1,
                model: model.to_string(),
            },
        );

        let request = ChatRequest::new(model, vec![Message::user(transcript.user_prompt())])
            .with_reasoning(self.config.include_reasoning);
        let completion = self.request(1, &request).await.inspect_err(|e| {
            error!("Failed to get initial response from primary model: {}", e);
        })?;

        let turn = transcript.append(NewTurn::assistant(completion.content, completion.reasoning, model))?;
        emit(
            self.events.as_ref(),
            RunEvent::TurnAppended {
                iteration: 1,
                turn: turn.clone(),
            },
        );
        Ok(())
    }

    async fn critique_turn(&self, iteration: u32, transcript: &mut Transcript) -> Result<()> {
        let model = select_critic(iteration, &self.config);
        info!("Iteration {}: requesting critique from {}", iteration, model);
        emit(
            self.events.as_ref(),
            RunEvent::IterationStarted {
                iteration,
                model: model.to_string(),
            },
        );

        let request = build_critique_request(
            transcript,
            &self.config.critique_type,
            model,
            self.config.include_reasoning,
        );
        let completion = self.request(iteration, &request).await?;

        let turn = transcript.append(NewTurn::critic(
            iteration,
            completion.content,
            completion.reasoning,
            model,
        ))?;
        emit(
            self.events.as_ref(),
            RunEvent::TurnAppended {
                iteration,
                turn: turn.clone(),
            },
        );
        Ok(())
    }

    async fn request(&self, iteration: u32, request: &ChatRequest) -> Result<Completion> {
        self.client.complete(request).await.map_err(|failure| match failure {
            RequestFailure::Exhausted { attempts, kind, detail } => CritiqueError::TurnFailed {
                iteration,
                model: request.model.clone(),
                attempts,
                kind,
                detail,
            },
            RequestFailure::Cancelled => CritiqueError::Cancelled,
            RequestFailure::InvalidRequest(msg) => CritiqueError::Configuration(msg),
        })
    }

    /// Best-effort snapshot; failures are logged and counted, never raised
    fn persist(&self, iteration: u32, report: &mut RunReport) {
        let record = RunRecord::new(self.run_id.clone(), iteration, &report.transcript);
        match self.store.append(&record) {
            Ok(records) => {
                report.records_persisted += 1;
                emit(self.events.as_ref(), RunEvent::RecordPersisted { iteration, records });
            }
            Err(e) => {
                error!("Error saving iteration {}: {}", iteration, e);
                report.persist_failures += 1;
                emit(
                    self.events.as_ref(),
                    RunEvent::PersistFailed {
                        iteration,
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockTransport, RetryPolicy};
    use crate::storage::JsonRunStore;
    use crate::transcript::TurnRole;
    use tempfile::TempDir;

    fn config(iterations: u32) -> RunConfig {
        RunConfig::new("what is 2+2?")
            .with_models("primary", "critic-a", "critic-b")
            .with_iterations(iterations)
            .with_retry(RetryPolicy::from_secs(2, &[1]))
    }

    fn controller(
        iterations: u32,
        script: Vec<std::result::Result<crate::llm::HttpReply, crate::llm::TransportError>>,
    ) -> (CritiqueController<MockTransport, JsonRunStore>, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = JsonRunStore::new(temp.path().join("log.json"));
        let controller = CritiqueController::new(config(iterations), MockTransport::new(script), store)
            .unwrap()
            .with_run_id("test-run");
        (controller, temp)
    }

    #[test]
    fn test_state_transitions() {
        let state = IterationState::AwaitingPrimary;
        assert_eq!(state.iteration(), Some(1));
        assert_eq!(state.next(1), IterationState::Done);
        assert_eq!(state.next(3), IterationState::AwaitingCritique(2));
        assert_eq!(IterationState::AwaitingCritique(2).next(3), IterationState::AwaitingCritique(3));
        assert_eq!(IterationState::AwaitingCritique(3).next(3), IterationState::Done);
        assert_eq!(IterationState::Done.next(3), IterationState::Done);
        assert_eq!(IterationState::Done.iteration(), None);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let temp = TempDir::new().unwrap();
        let result = CritiqueController::new(
            config(0),
            MockTransport::default(),
            JsonRunStore::new(temp.path().join("log.json")),
        );
        assert!(matches!(result, Err(CritiqueError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_single_iteration_is_primary_only() {
        let (controller, _temp) = controller(1, vec![MockTransport::success("4", Some("sum"))]);

        let report = controller.run().await.unwrap();

        assert_eq!(report.transcript.len(), 2);
        assert_eq!(report.completed, vec![1]);
        assert_eq!(report.records_persisted, 1);
        assert_eq!(controller.client().transport().call_count(), 1);

        let assistant = report.transcript.assistant_turn().unwrap();
        assert_eq!(assistant.content, "4");
        assert_eq!(assistant.reasoning.as_deref(), Some("sum"));
        assert_eq!(assistant.model.as_deref(), Some("primary"));
    }

    #[tokio::test]
    async fn test_primary_request_is_plain_prompt() {
        let (controller, _temp) = controller(1, vec![MockTransport::success("4", None)]);
        controller.run().await.unwrap();

        let requests = controller.client().transport().requests();
        assert_eq!(requests[0].model, "primary");
        assert_eq!(requests[0].messages, vec![Message::user("what is 2+2?")]);
        assert!(requests[0].include_reasoning);
    }

    #[tokio::test]
    async fn test_critics_alternate_by_parity() {
        let (controller, _temp) = controller(
            4,
            vec![
                MockTransport::success("4", None),
                MockTransport::success("c2", None),
                MockTransport::success("c3", None),
                MockTransport::success("c4", None),
            ],
        );

        let report = controller.run().await.unwrap();

        let models: Vec<String> = controller
            .client()
            .transport()
            .requests()
            .into_iter()
            .map(|r| r.model)
            .collect();
        assert_eq!(models, vec!["primary", "critic-a", "critic-b", "critic-a"]);
        assert_eq!(report.critique_count(), 3);
        assert_eq!(report.completed, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_critique_prompt_sees_growing_transcript() {
        let (controller, _temp) = controller(
            3,
            vec![
                MockTransport::success("four", None),
                MockTransport::success("first critique", None),
                MockTransport::success("second critique", None),
            ],
        );
        controller.run().await.unwrap();

        let requests = controller.client().transport().requests();
        assert_eq!(requests[1].messages.len(), 1);
        assert!(requests[1].messages[0].content.contains("Assistant: four"));
        assert!(!requests[1].messages[0].content.contains("first critique"));
        assert!(requests[2].messages[0].content.contains("Critic: first critique"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_failure_aborts_run() {
        let (controller, _temp) = controller(3, vec![MockTransport::malformed(), MockTransport::malformed()]);

        let err = controller.run().await.unwrap_err();

        match err {
            CritiqueError::TurnFailed {
                iteration,
                model,
                attempts,
                kind,
                ..
            } => {
                assert_eq!(iteration, 1);
                assert_eq!(model, "primary");
                assert_eq!(attempts, 2);
                assert_eq!(kind, FailureKind::MalformedResponse);
            }
            other => panic!("expected TurnFailed, got {:?}", other),
        }
        assert_eq!(controller.client().transport().call_count(), 2);
        assert!(controller.store().load().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_critique_is_skipped() {
        let (controller, _temp) = controller(
            3,
            vec![
                MockTransport::success("4", None),
                MockTransport::rate_limited(),
                MockTransport::rate_limited(),
                MockTransport::success("late critique", None),
            ],
        );

        let report = controller.run().await.unwrap();

        assert_eq!(report.completed, vec![1, 3]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].iteration, 2);
        assert_eq!(report.skipped[0].model, "critic-a");
        assert_eq!(report.skipped[0].kind, FailureKind::RateLimited);

        let roles: Vec<TurnRole> = report.transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Assistant, TurnRole::Critic]);
        assert_eq!(report.transcript.turns()[2].critique_iteration, Some(3));
        assert_eq!(report.transcript.turns()[2].model.as_deref(), Some("critic-b"));

        let iterations: Vec<u32> = controller.store().load().unwrap().iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_corrupt_store_does_not_stop_run() {
        let (controller, _temp) = controller(
            2,
            vec![MockTransport::success("4", None), MockTransport::success("ok", None)],
        );
        std::fs::write(controller.store().path(), "not json").unwrap();

        let report = controller.run().await.unwrap();

        assert_eq!(report.transcript.len(), 3);
        assert_eq!(report.records_persisted, 0);
        assert_eq!(report.persist_failures, 2);
        assert_eq!(std::fs::read_to_string(controller.store().path()).unwrap(), "not json");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (controller, _temp) = controller(3, vec![MockTransport::success("4", None)]);
        let controller = controller.with_cancellation(cancel);

        assert!(matches!(controller.run().await, Err(CritiqueError::Cancelled)));
        assert_eq!(controller.client().transport().call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_mid_critique_keeps_partial_report() {
        let cancel = CancellationToken::new();
        let (controller, _temp) = controller(
            3,
            vec![MockTransport::success("4", None), MockTransport::rate_limited()],
        );
        let controller = controller.with_cancellation(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let report = controller.run().await.unwrap();
        canceller.await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.completed, vec![1]);
        assert!(report.skipped.is_empty());
        assert_eq!(report.transcript.len(), 2);
        assert_eq!(controller.store().load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_events_follow_run() {
        let (tx, mut rx) = crate::events::event_channel();
        let (controller, _temp) = controller(1, vec![MockTransport::success("4", None)]);
        let controller = controller.with_events(tx);

        controller.run().await.unwrap();
        drop(controller);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(match event {
                RunEvent::IterationStarted { .. } => "started",
                RunEvent::TurnAppended { .. } => "turn",
                RunEvent::RecordPersisted { .. } => "persisted",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["started", "turn", "persisted"]);
    }
}
