use snapreport_collab::Invoker;
use snapreport_core::{DispatchError, Envelope};
use tracing::info;

/// Wraps the finished report and hands it to the downstream target.
pub struct Dispatcher<'a> {
    invoker: &'a dyn Invoker,
    event_source: &'a str,
    title: &'a str,
    max_payload_bytes: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(invoker: &'a dyn Invoker, event_source: &'a str, title: &'a str, max_payload_bytes: usize) -> Self {
        Self {
            invoker,
            event_source,
            title,
            max_payload_bytes,
        }
    }

    /// The description is the report text exactly as assembled.
    pub fn envelope(&self, report_text: &str) -> Envelope {
        Envelope::new(self.event_source, self.title, report_text)
    }

    /// Serialize and invoke synchronously. Returns the payload size.
    pub fn dispatch(&self, target: &str, envelope: &Envelope) -> Result<usize, DispatchError> {
        let payload = envelope.to_bytes()?;
        if self.max_payload_bytes > 0 && payload.len() > self.max_payload_bytes {
            return Err(DispatchError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_bytes,
            });
        }
        self.invoker.invoke(target, &payload)?;
        info!(bytes = payload.len(), "envelope dispatched");
        Ok(payload.len())
    }
}
