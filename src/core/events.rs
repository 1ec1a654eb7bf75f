use tokio::sync::mpsc;
use tracing::debug;

use crate::api::models::{ModelDescriptor, PullProgressEvent};
use crate::core::error::OperationError;

/// Everything the core reports to the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub enum CoreEvent {
    /// A turn was accepted and is about to be sent to `model`.
    ChatStarted { model: String },
    ChatFragment(String),
    /// The turn ended without error. `content` is what was appended to the
    /// history; when `cancelled` is set it is the partial reply.
    ChatCompleted { content: String, cancelled: bool },
    ChatFailed(OperationError),
    CatalogUpdated(Vec<ModelDescriptor>),
    CatalogError(OperationError),
    PullProgress(PullProgressEvent),
    PullFinished(Result<(), OperationError>),
    DeleteFinished(Result<(), OperationError>),
}

/// Sending half of the ordered event channel. Cheap to clone; every
/// background task posts through its own clone.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<CoreEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post an event. Returns `false` once the receiver is gone.
    pub fn post(&self, event: CoreEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!(?event, "Event receiver dropped; discarding event");
                false
            }
        }
    }
}
