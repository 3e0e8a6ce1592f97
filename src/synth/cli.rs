//! Ordered CLI command assembly.
//!
//! Kinds that configure devices over the CLI push lines into a
//! [`CommandSet`], which handles context-entry lines (`interface X`,
//! `vlan 10`) so consecutive changes to the same context do not repeat
//! the entry command.

use crate::synth::Operation;

/// Accumulates configuration lines in application order.
#[derive(Debug, Default)]
pub struct CommandSet {
    lines: Vec<String>,
    context: Option<String>,
}

impl CommandSet {
    /// Creates an empty command set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            context: None,
        }
    }

    /// Pushes a line inside a configuration context, emitting the context
    /// entry line first unless it is already the active context.
    pub fn push_context(&mut self, context: impl Into<String>, line: impl Into<String>) {
        let context = context.into();
        if self.context.as_deref() != Some(context.as_str()) {
            self.lines.push(context.clone());
            self.context = Some(context);
        }
        self.lines.push(line.into());
    }

    /// Pushes a top-level line, leaving any active context.
    pub fn push_toplevel(&mut self, line: impl Into<String>) {
        self.context = None;
        self.lines.push(line.into());
    }

    /// True when no lines have been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consumes the set into operations.
    #[must_use]
    pub fn into_operations(self) -> Vec<Operation> {
        self.lines.into_iter().map(Operation::Command).collect()
    }
}
