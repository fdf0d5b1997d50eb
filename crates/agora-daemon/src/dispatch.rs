//! Event-kind to handler routing.
//!
//! The dispatcher is a static binding table built at startup: each event
//! kind maps to one or more handlers, and a decoded envelope is passed
//! to every bound handler in binding order. There is no retry layer
//! here: a handler error propagates to the transport, which owns
//! redelivery under the at-least-once contract. Idempotency is likewise
//! the handlers' job, not the dispatcher's.

use std::collections::HashMap;
use std::sync::Arc;

use agora_core::events::EventEnvelope;
use tracing::{debug, warn};

use crate::handlers::{EventHandler, HandlerError};

/// Routes decoded envelopes to their bound handlers.
#[derive(Default)]
pub struct PolicyDispatcher {
    bindings: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl PolicyDispatcher {
    /// Empty dispatcher with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to an event kind. A kind may carry any number of
    /// handlers; they run in binding order.
    pub fn bind(&mut self, event_name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.bindings.entry(event_name.into()).or_default().push(handler);
    }

    /// Builder-style [`bind`](Self::bind).
    #[must_use]
    pub fn with_binding(
        mut self,
        event_name: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.bind(event_name, handler);
        self
    }

    /// Dispatch one envelope to every handler bound to its kind.
    ///
    /// Envelopes whose raw log was removed by a reorg are skipped before
    /// any handler runs. Unbound kinds are a logged no-op.
    ///
    /// # Errors
    ///
    /// Propagates the first handler error unchanged; remaining handlers
    /// for the envelope are not invoked. The transport decides whether
    /// to redeliver.
    pub fn dispatch(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        if envelope.raw_log.removed {
            warn!(
                event_name = %envelope.name,
                transaction_hash = %envelope.raw_log.transaction_hash,
                "log removed by reorg, skipping dispatch"
            );
            return Ok(());
        }

        let Some(handlers) = self.bindings.get(&envelope.name) else {
            debug!(event_name = %envelope.name, "no handlers bound, skipping");
            return Ok(());
        };

        for handler in handlers {
            debug!(
                event_name = %envelope.name,
                handler = handler.name(),
                "dispatching event"
            );
            handler.handle(envelope)?;
        }
        Ok(())
    }
}
