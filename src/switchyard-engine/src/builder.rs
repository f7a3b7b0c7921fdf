//! Registration boundary: collects commands and filters, then produces a
//! [`Dispatcher`].

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::context::InvocationContext;
use crate::dispatcher::Dispatcher;
use crate::error::RegistrationError;
use crate::filter::{CommandHandler, FilterSpec, handler};
use crate::registry::{CommandRegistry, RegisteredCommand};
use crate::spec::{CommandSpec, ParameterKind};

/// Supplies command metadata before the engine starts.
pub trait Registrar {
    /// Filters applied to every command, outermost first.
    fn global_filters(&self) -> Vec<FilterSpec> {
        Vec::new()
    }

    fn commands(&self) -> Vec<(CommandSpec, CommandHandler)>;
}

/// Collects registrations. Errors are deferred to [`AppBuilder::build`].
#[derive(Default)]
pub struct AppBuilder {
    commands: Vec<(CommandSpec, CommandHandler)>,
    global_filters: Vec<FilterSpec>,
    call_sites: HashMap<String, String>,
    errors: Vec<RegistrationError>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-populated from a registrar.
    pub fn from_registrar<R: Registrar + ?Sized>(registrar: &R) -> Self {
        let mut builder = Self::new();
        builder.register(registrar);
        builder
    }

    /// Add everything a registrar supplies.
    pub fn register<R: Registrar + ?Sized>(&mut self, registrar: &R) -> &mut Self {
        self.global_filters.extend(registrar.global_filters());
        self.commands.extend(registrar.commands());
        self
    }

    /// Register a command body written as an async closure.
    ///
    /// Each call site may add exactly one command; calling this repeatedly
    /// from the same place (a loop) is a registration error.
    #[track_caller]
    pub fn add<F, Fut>(&mut self, spec: CommandSpec, body: F) -> &mut Self
    where
        F: Fn(InvocationContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_handler(spec, handler(body))
    }

    /// Register a command with a prepared handler. Same call-site rule as
    /// [`add`](Self::add).
    #[track_caller]
    pub fn add_handler(&mut self, spec: CommandSpec, body: CommandHandler) -> &mut Self {
        let location = Location::caller().to_string();
        let command = spec.full_name();

        if let Some(first) = self.call_sites.get(&location) {
            debug!(%location, first = %first, command = %command, "Repeated registration call site");
            self.errors.push(RegistrationError::CommandRegisteredInLoop { command, location });
            return self;
        }

        self.call_sites.insert(location, command);
        self.commands.push((spec, body));
        self
    }

    /// Add a filter applied to every command, outside per-command filters.
    pub fn use_filter(&mut self, filter: FilterSpec) -> &mut Self {
        self.global_filters.push(filter);
        self
    }

    /// Validate every registration and produce the dispatcher.
    ///
    /// Returns the first registration error found.
    pub fn build(self, config: RuntimeConfig) -> Result<Dispatcher, RegistrationError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        for filter in &self.global_filters {
            filter.check()?;
        }

        let mut registry = CommandRegistry::new();
        for (mut spec, body) in self.commands {
            spec.check_parameters()?;
            for filter in spec.filters() {
                filter.check()?;
            }
            check_services(&spec, &config)?;

            spec.prepend_filters(&self.global_filters);
            registry.register(RegisteredCommand::new(spec, body))?;
        }

        debug!(
            commands = registry.len(),
            global_filters = self.global_filters.len(),
            "Dispatcher built"
        );
        Ok(Dispatcher::new(registry, config))
    }
}

fn check_services(spec: &CommandSpec, config: &RuntimeConfig) -> Result<(), RegistrationError> {
    for param in spec.parameters() {
        let ParameterKind::Service(key) = param.kind() else {
            continue;
        };
        if param.default_value().is_none() && config.services().resolve(key).is_none() {
            return Err(RegistrationError::MissingService {
                command: spec.full_name(),
                parameter: param.name().to_string(),
                service: key.type_name().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, Next};
    use crate::services::ServiceCollection;
    use crate::spec::{ParameterSpec, ScalarType};
    use async_trait::async_trait;

    struct Passthrough;

    #[async_trait]
    impl Filter for Passthrough {
        async fn invoke(
            &self,
            ctx: InvocationContext,
            token: CancellationToken,
            next: Next,
        ) -> anyhow::Result<()> {
            next.run(ctx, token).await
        }
    }

    struct Demo;

    impl Registrar for Demo {
        fn global_filters(&self) -> Vec<FilterSpec> {
            vec![FilterSpec::new("Global", || Passthrough)]
        }

        fn commands(&self) -> Vec<(CommandSpec, CommandHandler)> {
            ["one", "two", "three"]
                .into_iter()
                .map(|name| {
                    (
                        CommandSpec::new(name).with_filter(FilterSpec::new("Local", || Passthrough)),
                        handler(|_ctx, _token| async { Ok(()) }),
                    )
                })
                .collect()
        }
    }

    #[test]
    fn test_registrar_commands_get_global_filters_first() {
        let dispatcher = AppBuilder::from_registrar(&Demo)
            .build(RuntimeConfig::new())
            .unwrap();

        let names: Vec<String> = dispatcher.registry().iter().map(RegisteredCommand::name).collect();
        assert_eq!(names, vec!["one", "two", "three"]);

        let filters: Vec<&str> = dispatcher
            .registry()
            .get("two")
            .unwrap()
            .spec()
            .filters()
            .iter()
            .map(FilterSpec::name)
            .collect();
        assert_eq!(filters, vec!["Global", "Local"]);
    }

    #[test]
    fn test_duplicate_command_name() {
        let mut builder = AppBuilder::new();
        builder.add(CommandSpec::new("add"), |_ctx, _token| async { Ok(()) });
        builder.add(CommandSpec::new("add"), |_ctx, _token| async { Ok(()) });

        assert_eq!(
            builder.build(RuntimeConfig::new()).err(),
            Some(RegistrationError::DuplicateCommandName("add".to_string()))
        );
    }

    #[test]
    fn test_add_in_loop_is_rejected() {
        let mut builder = AppBuilder::new();
        for name in ["a", "b"] {
            builder.add(CommandSpec::new(name), |_ctx, _token| async { Ok(()) });
        }

        assert!(matches!(
            builder.build(RuntimeConfig::new()),
            Err(RegistrationError::CommandRegisteredInLoop { command, .. }) if command == "b"
        ));
    }

    #[test]
    fn test_malformed_filter_is_rejected() {
        let mut builder = AppBuilder::new();
        builder.use_filter(
            FilterSpec::new("Broken", || Passthrough).with_constructors([["next"], ["next"]]),
        );
        builder.add(CommandSpec::new("x"), |_ctx, _token| async { Ok(()) });

        assert_eq!(
            builder.build(RuntimeConfig::new()).err(),
            Some(RegistrationError::FilterConstructor {
                filter: "Broken".to_string(),
                found: 2,
            })
        );
    }

    #[test]
    fn test_invalid_parameter_list_is_rejected() {
        let mut builder = AppBuilder::new();
        builder.add(
            CommandSpec::new("x")
                .with_parameter(ParameterSpec::flag("v").with_alias('v'))
                .with_parameter(ParameterSpec::flag("verbose").with_alias('v')),
            |_ctx, _token| async { Ok(()) },
        );

        assert!(matches!(
            builder.build(RuntimeConfig::new()),
            Err(RegistrationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_missing_service_is_rejected() {
        #[derive(Debug)]
        struct Clock;

        let spec = CommandSpec::new("now")
            .with_parameter(ParameterSpec::service::<Clock>("clock"))
            .with_parameter(ParameterSpec::scalar("format", ScalarType::String).with_default("%H"));

        let mut builder = AppBuilder::new();
        builder.add(spec.clone(), |_ctx, _token| async { Ok(()) });
        assert!(matches!(
            builder.build(RuntimeConfig::new()),
            Err(RegistrationError::MissingService { parameter, .. }) if parameter == "clock"
        ));

        let mut builder = AppBuilder::new();
        builder.add(spec, |_ctx, _token| async { Ok(()) });
        let config = RuntimeConfig::new().with_services(ServiceCollection::new().with(Clock));
        assert!(builder.build(config).is_ok());
    }
}
