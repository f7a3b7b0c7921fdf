//! Filter pipeline wrapped around the command body.
//!
//! A chain is built fresh for every run: each [`FilterSpec`] produces a new
//! interceptor, global filters first, then the command's own, with the body
//! innermost. A filter decides whether and when to call [`Next::run`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::InvocationContext;
use crate::error::RegistrationError;

/// The command body: receives the context and the cooperative token.
pub type CommandHandler = Arc<
    dyn Fn(InvocationContext, CancellationToken) -> BoxFuture<'static, anyhow::Result<()>>
        + Send
        + Sync,
>;

/// Wrap an async closure as a [`CommandHandler`].
pub fn handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(InvocationContext, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx, token| Box::pin(f(ctx, token)))
}

/// An interceptor around the rest of the chain.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn invoke(
        &self,
        ctx: InvocationContext,
        token: CancellationToken,
        next: Next,
    ) -> anyhow::Result<()>;
}

type FilterFactory = Arc<dyn Fn() -> Arc<dyn Filter> + Send + Sync>;

/// Registration descriptor of a filter.
#[derive(Clone)]
pub struct FilterSpec {
    name: String,
    constructors: Vec<Vec<String>>,
    factory: FilterFactory,
}

impl FilterSpec {
    /// A filter built by `factory`, with the single constructor `(next)`.
    pub fn new<F, T>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Filter + 'static,
    {
        Self {
            name: name.into(),
            constructors: vec![vec!["next".to_string()]],
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Filter>),
        }
    }

    /// A filter constructed through `Default`, named after its type.
    pub fn of<T: Filter + Default + 'static>() -> Self {
        let name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        Self::new(name, T::default)
    }

    /// Replace the declared constructors, each given as its dependency list.
    pub fn with_constructors<I, C, S>(mut self, constructors: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constructors = constructors
            .into_iter()
            .map(|deps| deps.into_iter().map(Into::into).collect())
            .collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constructors(&self) -> &[Vec<String>] {
        &self.constructors
    }

    /// Exactly one constructor taking exactly one dependency.
    pub(crate) fn check(&self) -> Result<(), RegistrationError> {
        match self.constructors.as_slice() {
            [only] if only.len() == 1 => Ok(()),
            [only] => Err(RegistrationError::FilterConstructor {
                filter: self.name.clone(),
                found: only.len(),
            }),
            many => Err(RegistrationError::FilterConstructor {
                filter: self.name.clone(),
                found: many.len(),
            }),
        }
    }

    pub(crate) fn instantiate(&self) -> Arc<dyn Filter> {
        (self.factory)()
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("name", &self.name)
            .field("constructors", &self.constructors)
            .finish_non_exhaustive()
    }
}

/// The remainder of the chain after the current filter.
pub struct Next {
    links: Arc<[Arc<dyn Filter>]>,
    index: usize,
    body: CommandHandler,
}

impl Next {
    /// Run the next filter, or the body when no filters remain.
    pub async fn run(self, ctx: InvocationContext, token: CancellationToken) -> anyhow::Result<()> {
        match self.links.get(self.index).cloned() {
            Some(link) => {
                let next = Next {
                    links: Arc::clone(&self.links),
                    index: self.index + 1,
                    body: Arc::clone(&self.body),
                };
                link.invoke(ctx, token, next).await
            }
            None => (self.body)(ctx, token).await,
        }
    }
}

/// An instantiated pipeline for one run.
pub struct FilterChain {
    links: Arc<[Arc<dyn Filter>]>,
    body: CommandHandler,
}

impl FilterChain {
    /// Instantiate one interceptor per spec, outermost first.
    pub fn build(filters: &[FilterSpec], body: CommandHandler) -> Self {
        let links: Vec<Arc<dyn Filter>> = filters.iter().map(FilterSpec::instantiate).collect();
        Self {
            links: links.into(),
            body,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub async fn invoke(self, ctx: InvocationContext, token: CancellationToken) -> anyhow::Result<()> {
        let start = Instant::now();
        let command = ctx.command_name().to_string();
        let depth = self.links.len();

        let result = Next {
            links: self.links,
            index: 0,
            body: self.body,
        }
        .run(ctx, token)
        .await;

        debug!(
            command = %command,
            filters = depth,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Filter chain finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BoundArguments;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Recording {
        label: &'static str,
        trace: Trace,
    }

    #[async_trait]
    impl Filter for Recording {
        async fn invoke(
            &self,
            ctx: InvocationContext,
            token: CancellationToken,
            next: Next,
        ) -> anyhow::Result<()> {
            self.trace.lock().push(format!("{}-before", self.label));
            let result = next.run(ctx, token).await;
            self.trace.lock().push(format!("{}-after", self.label));
            result
        }
    }

    struct Gate;

    #[async_trait]
    impl Filter for Gate {
        async fn invoke(
            &self,
            ctx: InvocationContext,
            _token: CancellationToken,
            _next: Next,
        ) -> anyhow::Result<()> {
            ctx.set_exit_code(42);
            Ok(())
        }
    }

    fn recording(label: &'static str, trace: &Trace) -> FilterSpec {
        let trace = Arc::clone(trace);
        FilterSpec::new(label, move || Recording {
            label,
            trace: Arc::clone(&trace),
        })
    }

    fn recording_body(trace: &Trace) -> CommandHandler {
        let trace = Arc::clone(trace);
        handler(move |_ctx, _token| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().push("C".to_string());
                Ok(())
            }
        })
    }

    fn context() -> InvocationContext {
        InvocationContext::new("cmd", Vec::<String>::new(), BoundArguments::new())
    }

    #[tokio::test]
    async fn test_filters_wrap_body_in_order() {
        let trace: Trace = Arc::default();
        let chain = FilterChain::build(
            &[recording("A", &trace), recording("B", &trace)],
            recording_body(&trace),
        );

        chain.invoke(context(), CancellationToken::new()).await.unwrap();

        assert_eq!(
            *trace.lock(),
            vec!["A-before", "B-before", "C", "B-after", "A-after"]
        );
    }

    #[tokio::test]
    async fn test_filter_can_short_circuit() {
        let trace: Trace = Arc::default();
        let chain = FilterChain::build(
            &[recording("A", &trace), FilterSpec::new("Gate", || Gate)],
            recording_body(&trace),
        );
        let ctx = context();

        chain.invoke(ctx.clone(), CancellationToken::new()).await.unwrap();

        assert_eq!(*trace.lock(), vec!["A-before", "A-after"]);
        assert_eq!(ctx.exit_code(), Some(42));
    }

    #[tokio::test]
    async fn test_after_phase_observes_failure() {
        let trace: Trace = Arc::default();
        let chain = FilterChain::build(
            &[recording("A", &trace)],
            handler(|_ctx, _token| async { Err(anyhow::anyhow!("boom")) }),
        );

        let err = chain.invoke(context(), CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(*trace.lock(), vec!["A-before", "A-after"]);
    }

    #[test]
    fn test_constructor_check() {
        assert!(FilterSpec::new("Gate", || Gate).check().is_ok());

        let none = FilterSpec::new("Gate", || Gate).with_constructors(Vec::<Vec<String>>::new());
        assert_eq!(
            none.check(),
            Err(RegistrationError::FilterConstructor {
                filter: "Gate".to_string(),
                found: 0,
            })
        );

        let two_deps = FilterSpec::new("Gate", || Gate).with_constructors([["next", "logger"]]);
        assert!(two_deps.check().is_err());

        let two_ctors = FilterSpec::new("Gate", || Gate).with_constructors([["next"], ["other"]]);
        assert!(two_ctors.check().is_err());
    }

    #[test]
    fn test_of_uses_type_name() {
        #[derive(Default)]
        struct Timing;

        #[async_trait]
        impl Filter for Timing {
            async fn invoke(
                &self,
                ctx: InvocationContext,
                token: CancellationToken,
                next: Next,
            ) -> anyhow::Result<()> {
                next.run(ctx, token).await
            }
        }

        assert_eq!(FilterSpec::of::<Timing>().name(), "Timing");
    }
}
