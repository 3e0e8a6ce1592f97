//! Operation execution against a device.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ConvergeError, Result};
use crate::synth::{Operation, RestRequest};
use crate::transport::Transport;

/// What an apply actually did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// True when the device configuration changed (or would change, in
    /// check mode).
    pub changed: bool,
    /// Descriptions of the operations that were sent, in order.
    pub applied: Vec<String>,
    /// True when nothing was sent because this was a dry run.
    pub check_mode: bool,
}

/// Sends synthesized operations to a device, batching consecutive
/// operations of the same flavor (one CLI batch, one REST batch) so the
/// device sees them in synthesis order.
///
/// In check mode nothing touches the transport at all.
pub struct Executor<'a> {
    transport: &'a dyn Transport,
    check_mode: bool,
}

impl<'a> Executor<'a> {
    /// Creates an executor.
    #[must_use]
    pub const fn new(transport: &'a dyn Transport, check_mode: bool) -> Self {
        Self {
            transport,
            check_mode,
        }
    }

    /// Executes the operations.
    ///
    /// Each batch is all-or-nothing from the engine's point of view: on a
    /// transport failure, the report of what was already sent travels in
    /// the error so callers can surface a partial apply.
    ///
    /// # Errors
    ///
    /// Returns an apply error wrapping the transport failure, carrying the
    /// fully-sent prefix.
    pub async fn execute(&self, operations: &[Operation]) -> Result<ApplyReport> {
        if operations.is_empty() {
            debug!("nothing to apply");
            return Ok(ApplyReport {
                changed: false,
                applied: Vec::new(),
                check_mode: self.check_mode,
            });
        }

        if self.check_mode {
            info!(count = operations.len(), "check mode, not sending operations");
            return Ok(ApplyReport {
                changed: true,
                applied: Vec::new(),
                check_mode: true,
            });
        }

        let mut applied: Vec<String> = Vec::new();
        for batch in batches(operations) {
            if let Err(err) = self.send_batch(&batch).await {
                warn!(
                    applied = applied.len(),
                    total = operations.len(),
                    "apply failed partway through"
                );
                return Err(match err {
                    ConvergeError::Transport(source) => ConvergeError::Apply {
                        applied,
                        total: operations.len(),
                        source,
                    },
                    other => other,
                });
            }
            applied.extend(batch.iter().map(Operation::describe));
        }

        info!(count = applied.len(), "apply complete");
        Ok(ApplyReport {
            changed: true,
            applied,
            check_mode: false,
        })
    }

    async fn send_batch(&self, batch: &[Operation]) -> Result<()> {
        if batch.iter().all(Operation::is_command) {
            let commands: Vec<String> = batch
                .iter()
                .filter_map(|op| match op {
                    Operation::Command(line) => Some(line.clone()),
                    Operation::Request(_) => None,
                })
                .collect();
            self.transport.edit_config(&commands).await
        } else {
            let requests: Vec<RestRequest> = batch
                .iter()
                .filter_map(|op| match op {
                    Operation::Request(req) => Some(req.clone()),
                    Operation::Command(_) => None,
                })
                .collect();
            self.transport.send_requests(&requests).await
        }
    }
}

/// Splits operations into runs of the same flavor, preserving order.
fn batches(operations: &[Operation]) -> Vec<Vec<Operation>> {
    let mut out: Vec<Vec<Operation>> = Vec::new();
    for op in operations {
        match out.last_mut() {
            Some(batch)
                if batch
                    .first()
                    .is_some_and(|first| first.is_command() == op.is_command()) =>
            {
                batch.push(op.clone());
            }
            _ => out.push(vec![op.clone()]),
        }
    }
    out
}
