//! Compensating transactions for multi-step operations
//!
//! Every completed step may register an undo future. When a later step fails,
//! the undo futures of the completed steps run in reverse order. Futures are
//! lazy, so a registered undo does nothing unless the saga is aborted.

use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;

struct Completed<'a, E> {
    label: String,
    undo: Option<BoxFuture<'a, Result<(), E>>>,
}

/// A sequence of steps with compensation on failure
pub struct Saga<'a, E> {
    name: String,
    completed: Vec<Completed<'a, E>>,
}

impl<'a, E: fmt::Display> Saga<'a, E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one step; if it fails, compensate every completed step
    pub async fn step<T, Fut>(&mut self, label: &str, action: Fut) -> Result<T, SagaError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        tracing::debug!("{}: {}", self.name, label);
        match action.await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.abort(label, e).await),
        }
    }

    /// Register the undo of the step that just completed
    pub fn on_undo<Fut>(&mut self, label: impl Into<String>, undo: Fut)
    where
        Fut: Future<Output = Result<(), E>> + Send + 'a,
    {
        self.completed.push(Completed {
            label: label.into(),
            undo: Some(Box::pin(undo)),
        });
    }

    /// Record a completed step that cannot be undone
    pub fn irreversible(&mut self, label: impl Into<String>) {
        self.completed.push(Completed {
            label: label.into(),
            undo: None,
        });
    }

    /// Compensate completed steps in reverse order and describe the failure
    pub async fn abort(&mut self, step: &str, source: E) -> SagaError<E> {
        tracing::warn!("{}: step '{}' failed: {}", self.name, step, source);

        let mut compensated = Vec::new();
        let mut uncompensated = Vec::new();

        while let Some(done) = self.completed.pop() {
            match done.undo {
                Some(undo) => match undo.await {
                    Ok(()) => {
                        tracing::info!("{}: compensated '{}'", self.name, done.label);
                        compensated.push(done.label);
                    }
                    Err(e) => {
                        tracing::error!(
                            "{}: compensation of '{}' failed: {}",
                            self.name,
                            done.label,
                            e
                        );
                        uncompensated.push(format!("{} ({})", done.label, e));
                    }
                },
                None => {
                    tracing::warn!("{}: '{}' cannot be undone", self.name, done.label);
                    uncompensated.push(done.label);
                }
            }
        }

        SagaError {
            saga: self.name.clone(),
            step: step.to_string(),
            source,
            compensated,
            uncompensated,
        }
    }

    /// Finish successfully, discarding the registered undo actions
    pub fn commit(self) -> Vec<String> {
        self.completed.into_iter().map(|c| c.label).collect()
    }
}

/// Failure of a saga step, with the outcome of the compensation
#[derive(Debug)]
pub struct SagaError<E> {
    pub saga: String,
    pub step: String,
    pub source: E,
    /// Undone steps, most recent first
    pub compensated: Vec<String>,
    /// Steps left in place, most recent first
    pub uncompensated: Vec<String>,
}

impl<E> SagaError<E> {
    pub fn into_source(self) -> E {
        self.source
    }

    /// Whether everything completed before the failure was undone
    pub fn fully_compensated(&self) -> bool {
        self.uncompensated.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for SagaError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: step '{}' failed: {}", self.saga, self.step, self.source)?;
        if !self.uncompensated.is_empty() {
            write!(f, " (left in place: {})", self.uncompensated.join(", "))?;
        }
        Ok(())
    }
}

impl<E> std::error::Error for SagaError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
