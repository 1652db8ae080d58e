//! One-shot settlement of an invocation.
//!
//! A handler can signal completion through `context.succeed`, `context.fail`
//! or `callback(error, result)`. All three write into the same [`Completion`];
//! the first signal settles the [`Outcome`], later signals are ignored.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::HandlerError;

/// The settled result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(HandlerError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_result(self) -> Result<Value, HandlerError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(err) => Err(err),
        }
    }
}

/// Shared write side of an invocation's outcome.
///
/// Cloning is cheap. The receiver observes a closed channel once every clone
/// has been dropped without settling.
#[derive(Clone)]
pub struct Completion {
    slot: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl Completion {
    pub fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (completion, rx)
    }

    /// Settle the outcome. Returns `false` if it was already settled.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                // The executor may have stopped waiting; nothing to do then.
                let _ = tx.send(outcome);
                true
            }
            None => {
                debug!(success = outcome.is_success(), "ignoring signal after settlement");
                false
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn first_signal_wins() {
        let (completion, rx) = Completion::new();
        assert!(completion.settle(Outcome::Success(json!(1))));
        assert!(!completion.settle(Outcome::Failure("late".into())));
        assert!(!completion.settle(Outcome::Success(json!(2))));
        assert_eq!(rx.await.unwrap(), Outcome::Success(json!(1)));
    }

    #[tokio::test]
    async fn clones_share_the_slot() {
        let (completion, rx) = Completion::new();
        let other = completion.clone();
        assert!(other.settle(Outcome::Failure("first".into())));
        assert!(completion.is_settled());
        assert!(!completion.settle(Outcome::Success(Value::Null)));
        assert_eq!(rx.await.unwrap(), Outcome::Failure("first".into()));
    }

    #[tokio::test]
    async fn dropping_all_handles_closes_receiver() {
        let (completion, rx) = Completion::new();
        let other = completion.clone();
        drop(completion);
        drop(other);
        assert!(rx.await.is_err());
    }

    #[test]
    fn settle_after_receiver_dropped_is_harmless() {
        let (completion, rx) = Completion::new();
        drop(rx);
        assert!(completion.settle(Outcome::Success(Value::Null)));
        assert!(completion.is_settled());
    }

    #[test]
    fn outcome_into_result() {
        assert_eq!(Outcome::Success(json!("ok")).into_result(), Ok(json!("ok")));
        assert!(Outcome::Failure("no".into()).into_result().is_err());
    }
}
