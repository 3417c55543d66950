//! Audit hooks around mutating operations.
//!
//! Every create, save, delete, copy and rename runs inside
//! [`HookRunner::run`]. Sinks see the operation before it starts (and may
//! veto it) and again once its outcome is known.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::process::Command;

use crate::error::{ResourceError, ResourceResult};

/// Metadata describing one mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRecord {
    pub action: String,
    pub source: String,
    /// Empty for single-path operations.
    pub destination: String,
    pub username: String,
    /// Host directory the principal is scoped to.
    pub scope: String,
}

impl HookRecord {
    pub fn new(action: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            source: source.into(),
            destination: String::new(),
            username: String::new(),
            scope: String::new(),
        }
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn principal(mut self, username: impl Into<String>, scope: impl Into<String>) -> Self {
        self.username = username.into();
        self.scope = scope.into();
        self
    }
}

/// How a hooked operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Success,
    Failure(String),
}

impl HookOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, HookOutcome::Success)
    }
}

/// Observer of mutating operations.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Called before the operation. An error vetoes it.
    async fn before(&self, record: &HookRecord) -> ResourceResult<()> {
        let _ = record;
        Ok(())
    }

    /// Called after the operation ran, successful or not.
    async fn after(&self, record: &HookRecord, outcome: &HookOutcome);
}

/// Runs operations between the registered sinks' notifications.
#[derive(Clone, Default)]
pub struct HookRunner {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl HookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Run `unit` wrapped in before/after notifications.
    ///
    /// The unit does not run if any sink vetoes. Its own error is returned
    /// after every sink has observed it.
    pub async fn run<T, F>(&self, record: &HookRecord, unit: F) -> ResourceResult<T>
    where
        F: Future<Output = ResourceResult<T>> + Send,
    {
        for sink in &self.sinks {
            sink.before(record).await?;
        }

        let result = unit.await;
        let outcome = match &result {
            Ok(_) => HookOutcome::Success,
            Err(e) => HookOutcome::Failure(e.to_string()),
        };

        for sink in &self.sinks {
            sink.after(record, &outcome).await;
        }
        result
    }
}

impl std::fmt::Debug for HookRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRunner")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Emits a structured tracing event for every operation.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    async fn before(&self, record: &HookRecord) -> ResourceResult<()> {
        tracing::debug!(
            action = %record.action,
            source = %record.source,
            destination = %record.destination,
            user = %record.username,
            "operation starting"
        );
        Ok(())
    }

    async fn after(&self, record: &HookRecord, outcome: &HookOutcome) {
        match outcome {
            HookOutcome::Success => tracing::info!(
                action = %record.action,
                source = %record.source,
                destination = %record.destination,
                user = %record.username,
                "operation completed"
            ),
            HookOutcome::Failure(reason) => tracing::warn!(
                action = %record.action,
                source = %record.source,
                destination = %record.destination,
                user = %record.username,
                %reason,
                "operation failed"
            ),
        }
    }
}

/// Runs configured shell commands on `before_<action>` and `after_<action>`.
///
/// Commands see `FILE`, `SCOPE`, `TRIGGER`, `USERNAME` and `DESTINATION` in
/// their environment. A failing before-command vetoes the operation;
/// after-commands only run on success and their failures are logged.
#[derive(Debug, Clone, Default)]
pub struct CommandSink {
    commands: HashMap<String, Vec<String>>,
}

impl CommandSink {
    /// `commands` maps trigger names such as `before_upload` to shell lines.
    pub fn new(commands: HashMap<String, Vec<String>>) -> Self {
        Self { commands }
    }

    async fn exec(&self, trigger: &str, record: &HookRecord) -> ResourceResult<()> {
        let Some(lines) = self.commands.get(trigger) else {
            return Ok(());
        };

        for line in lines {
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(line)
                .env("FILE", host_path(&record.scope, &record.source))
                .env("SCOPE", &record.scope)
                .env("TRIGGER", trigger)
                .env("USERNAME", &record.username)
                .env(
                    "DESTINATION",
                    if record.destination.is_empty() {
                        String::new()
                    } else {
                        host_path(&record.scope, &record.destination)
                    },
                );

            tracing::debug!(%trigger, command = %line, "running hook command");
            let status = cmd.status().await.map_err(|e| ResourceError::HookRejected {
                action: record.action.clone(),
                reason: e.to_string(),
            })?;
            if !status.success() {
                return Err(ResourceError::HookRejected {
                    action: record.action.clone(),
                    reason: format!("`{line}` exited with {status}"),
                });
            }
        }
        Ok(())
    }
}

fn host_path(scope: &str, path: &str) -> String {
    format!(
        "{}/{}",
        scope.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl AuditSink for CommandSink {
    async fn before(&self, record: &HookRecord) -> ResourceResult<()> {
        self.exec(&format!("before_{}", record.action), record).await
    }

    async fn after(&self, record: &HookRecord, outcome: &HookOutcome) {
        if !outcome.is_success() {
            return;
        }
        if let Err(e) = self.exec(&format!("after_{}", record.action), record).await {
            tracing::warn!(action = %record.action, error = %e, "after hook failed");
        }
    }
}
