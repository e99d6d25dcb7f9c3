//! Pipeline builder and the task it produces

use crate::context::Context;
use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use std::future::Future;

/// One unit of a pipeline
#[async_trait]
pub trait Step: Send + Sync {
    /// Run the step
    async fn execute(&self, ctx: &Context) -> Result<()>;
}

/// Step backed by a closure
pub struct FuncStep<F> {
    func: F,
}

impl<F> FuncStep<F> {
    /// Wrap a closure taking the run context
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Step for FuncStep<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn execute(&self, ctx: &Context) -> Result<()> {
        (self.func)(ctx.clone()).await
    }
}

struct NamedStep {
    name: String,
    step: Box<dyn Step>,
}

/// Accumulates steps for a [`Task`]
#[derive(Default)]
pub struct Builder {
    steps: Vec<NamedStep>,
}

impl Builder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a closure step
    pub fn func<F, Fut>(self, name: &str, func: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.step(name, FuncStep::new(func))
    }

    /// Append an explicit step
    pub fn step(mut self, name: &str, step: impl Step + 'static) -> Self {
        self.steps.push(NamedStep {
            name: name.to_string(),
            step: Box::new(step),
        });
        self
    }

    /// Number of steps collected so far
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no step was added
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Freeze the steps into a task
    pub fn build(self) -> Task {
        Task { steps: self.steps }
    }
}

/// An ordered, immutable list of named steps
pub struct Task {
    steps: Vec<NamedStep>,
}

impl Task {
    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every step in order, stopping at the first failure
    ///
    /// The failing step's error is wrapped with the step name. A cancelled
    /// context stops the pipeline before the next step starts.
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        for NamedStep { name, step } in &self.steps {
            ctx.check_cancelled()
                .map_err(|e| ClusterError::step(name.as_str(), e))?;

            tracing::info!("+ [ Serial ] - {}", name);
            if let Err(e) = step.execute(ctx).await {
                tracing::error!("step {} failed: {}", name, e);
                return Err(ClusterError::step(name.as_str(), e));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Step for Task {
    async fn execute(&self, ctx: &Context) -> Result<()> {
        Task::execute(self, ctx).await
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("steps", &self.step_names())
            .finish()
    }
}
