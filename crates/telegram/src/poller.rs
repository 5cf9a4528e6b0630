use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use rentatool_core::session::SessionId;

use crate::api::ApiError;
use crate::outbound::SendError;
use crate::update::{decode, ChatEvent, Update};

/// Inbound side of the messaging transport. The poller pulls updates from
/// this seam so tests can script them.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn next_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ApiError>;
    async fn acknowledge_callback(&self, callback_id: &str) -> Result<(), ApiError>;
}

/// The conversation core's entry points, as the transport sees them.
#[async_trait]
pub trait EventRouter: Send + Sync {
    async fn handle_text(&self, session: SessionId, text: &str) -> Result<(), SendError>;
    async fn handle_command(&self, session: SessionId, name: &str) -> Result<(), SendError>;
    async fn handle_callback(&self, session: SessionId, token: &str) -> Result<(), SendError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 500, max_delay_ms: 15_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Long-poll loop: fetch updates, decode, dispatch to the router, advance the
/// offset. Transport failures back off and retry; `max_retries` consecutive
/// failures abort the loop.
pub struct UpdatePoller {
    source: Arc<dyn UpdateSource>,
    router: Arc<dyn EventRouter>,
    reconnect_policy: ReconnectPolicy,
}

impl UpdatePoller {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        router: Arc<dyn EventRouter>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, router, reconnect_policy }
    }

    pub async fn run(&self) -> Result<(), ApiError> {
        info!("update poller started");
        let mut offset: Option<i64> = None;
        let mut attempt: u32 = 0;

        loop {
            match self.source.next_updates(offset).await {
                Ok(updates) => {
                    attempt = 0;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.dispatch(update).await;
                    }
                }
                Err(error) => {
                    attempt += 1;
                    if attempt > self.reconnect_policy.max_retries {
                        warn!(error = %error, "update poller giving up");
                        return Err(error);
                    }
                    let delay = self.reconnect_policy.backoff(attempt - 1);
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "update fetch failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn dispatch(&self, update: Update) {
        let Some(event) = decode(update) else {
            return;
        };

        let result = match &event {
            ChatEvent::Command { session, name } => {
                self.router.handle_command(*session, name).await
            }
            ChatEvent::Text { session, text } => self.router.handle_text(*session, text).await,
            ChatEvent::Callback { session, token, callback_id } => {
                // Ack first so the client stops its spinner even if the
                // handler replies slowly.
                if let Err(error) = self.source.acknowledge_callback(callback_id).await {
                    warn!(session = %session, error = %error, "callback ack failed");
                }
                self.router.handle_callback(*session, token).await
            }
        };

        if let Err(error) = result {
            warn!(error = %error, "event handler failed to reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedSource {
        batches: Mutex<Vec<Result<Vec<Update>, ApiError>>>,
        offsets: Mutex<Vec<Option<i64>>>,
        acks: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<Vec<Update>, ApiError>>) -> Self {
            Self {
                batches: Mutex::new(batches),
                offsets: Mutex::new(Vec::new()),
                acks: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn next_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ApiError> {
            self.offsets.lock().unwrap().push(offset);
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                // End the scripted run by exhausting the retry budget.
                return Err(ApiError::Rejected {
                    method: "getUpdates".to_string(),
                    description: "script finished".to_string(),
                });
            }
            batches.remove(0)
        }

        async fn acknowledge_callback(&self, callback_id: &str) -> Result<(), ApiError> {
            self.acks.lock().unwrap().push(callback_id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRouter {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventRouter for RecordingRouter {
        async fn handle_text(&self, session: SessionId, text: &str) -> Result<(), SendError> {
            self.seen.lock().unwrap().push(format!("text:{session}:{text}"));
            Ok(())
        }

        async fn handle_command(&self, session: SessionId, name: &str) -> Result<(), SendError> {
            self.seen.lock().unwrap().push(format!("command:{session}:{name}"));
            Ok(())
        }

        async fn handle_callback(&self, session: SessionId, token: &str) -> Result<(), SendError> {
            self.seen.lock().unwrap().push(format!("callback:{session}:{token}"));
            Ok(())
        }
    }

    fn update(raw: serde_json::Value) -> Update {
        serde_json::from_value(raw).expect("update")
    }

    #[tokio::test]
    async fn dispatches_in_order_and_advances_offset() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![
            update(serde_json::json!({
                "update_id": 7,
                "message": { "chat": { "id": 1 }, "text": "/start" }
            })),
            update(serde_json::json!({
                "update_id": 8,
                "callback_query": {
                    "id": "cb-1",
                    "data": "show_catalog",
                    "message": { "chat": { "id": 1 } }
                }
            })),
            update(serde_json::json!({
                "update_id": 9,
                "message": { "chat": { "id": 1 }, "text": "2" }
            })),
        ])]));
        let router = Arc::new(RecordingRouter::default());
        let poller = UpdatePoller::new(
            source.clone(),
            router.clone(),
            ReconnectPolicy { max_retries: 0, base_delay_ms: 1, max_delay_ms: 1 },
        );

        let result = poller.run().await;
        assert!(result.is_err(), "scripted source ends with an error");

        let seen = router.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "command:1:start".to_string(),
                "callback:1:show_catalog".to_string(),
                "text:1:2".to_string(),
            ]
        );
        assert_eq!(source.acks.lock().unwrap().clone(), vec!["cb-1".to_string()]);
        // Second fetch resumes past the last seen update.
        assert_eq!(source.offsets.lock().unwrap().clone(), vec![None, Some(10)]);
    }

    #[tokio::test]
    async fn transient_failures_back_off_then_recover() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(ApiError::Rejected {
                method: "getUpdates".to_string(),
                description: "flaky".to_string(),
            }),
            Ok(vec![update(serde_json::json!({
                "update_id": 20,
                "message": { "chat": { "id": 2 }, "text": "hello" }
            }))]),
        ]));
        let router = Arc::new(RecordingRouter::default());
        let poller = UpdatePoller::new(
            source.clone(),
            router.clone(),
            ReconnectPolicy { max_retries: 1, base_delay_ms: 1, max_delay_ms: 1 },
        );

        let _ = poller.run().await;
        assert_eq!(
            router.seen.lock().unwrap().clone(),
            vec!["text:2:hello".to_string()]
        );
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 500, max_delay_ms: 4_000 };
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4_000));
        assert_eq!(policy.backoff(10), Duration::from_millis(4_000));
    }
}
