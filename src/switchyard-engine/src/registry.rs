//! Command registry with longest-prefix resolution.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::error::RegistrationError;
use crate::filter::CommandHandler;
use crate::spec::CommandSpec;

/// A command descriptor paired with its body.
#[derive(Clone)]
pub struct RegisteredCommand {
    spec: CommandSpec,
    handler: CommandHandler,
}

impl RegisteredCommand {
    /// Pair a descriptor with the body that runs it.
    pub fn new(spec: CommandSpec, handler: CommandHandler) -> Self {
        Self { spec, handler }
    }

    /// The command's descriptor.
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// The command body, without filters.
    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    /// Space-joined full name; empty for the root command.
    pub fn name(&self) -> String {
        self.spec.full_name()
    }
}

impl fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Registry of commands keyed by space-joined full name.
///
/// Iteration follows registration order, which is also the order of the
/// top-level help table.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    /// Full name to command.
    commands: IndexMap<String, RegisteredCommand>,
    /// Alias to full name.
    aliases: HashMap<String, String>,
    /// Largest number of name segments of any command or alias.
    max_depth: usize,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command and its aliases.
    ///
    /// Fails if the name or any alias is already taken by a command or alias.
    pub fn register(&mut self, command: RegisteredCommand) -> Result<(), RegistrationError> {
        let name = command.name();
        if self.contains(&name) {
            return Err(RegistrationError::DuplicateCommandName(name));
        }

        let mut aliases = Vec::new();
        for segments in command.spec.alias_segments() {
            let alias = segments.join(" ");
            if alias == name || self.contains(&alias) || aliases.contains(&alias) {
                return Err(RegistrationError::DuplicateCommandName(alias));
            }
            self.max_depth = self.max_depth.max(segments.len());
            aliases.push(alias);
        }

        for alias in aliases {
            self.aliases.insert(alias, name.clone());
        }
        self.max_depth = self.max_depth.max(command.spec.segments().len());
        self.commands.insert(name, command);
        Ok(())
    }

    /// Get a command by full name or alias.
    pub fn get(&self, name: &str) -> Option<&RegisteredCommand> {
        if let Some(cmd) = self.commands.get(name) {
            return Some(cmd);
        }

        self.aliases
            .get(name)
            .and_then(|real_name| self.commands.get(real_name))
    }

    /// Check whether a name or alias is taken.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name) || self.aliases.contains_key(name)
    }

    /// The root command, if one is registered.
    pub fn root(&self) -> Option<&RegisteredCommand> {
        self.commands.get("")
    }

    /// Match the longest run of leading tokens against registered names.
    ///
    /// Returns the command and the tokens that follow its name. The root
    /// command matches any argv when nothing longer does.
    pub fn resolve<'a>(&self, argv: &'a [String]) -> Option<(&RegisteredCommand, &'a [String])> {
        let deepest = self.max_depth.min(argv.len());

        for depth in (1..=deepest).rev() {
            let name = argv[..depth].join(" ");
            if let Some(cmd) = self.get(&name) {
                return Some((cmd, &argv[depth..]));
            }
        }

        self.root().map(|cmd| (cmd, argv))
    }

    /// Number of registered commands, not counting aliases.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check whether no command is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::handler;

    fn command(name: &str) -> RegisteredCommand {
        RegisteredCommand::new(
            CommandSpec::new(name),
            handler(|_ctx, _token| async { Ok(()) }),
        )
    }

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn registry(names: &[&str]) -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        for name in names {
            registry.register(command(name)).unwrap();
        }
        registry
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = registry(&["add"]);
        assert_eq!(
            registry.register(command("add")),
            Err(RegistrationError::DuplicateCommandName("add".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_alias_conflicts_rejected() {
        let mut registry = CommandRegistry::new();
        registry
            .register(RegisteredCommand::new(
                CommandSpec::new("list").with_alias("ls"),
                handler(|_ctx, _token| async { Ok(()) }),
            ))
            .unwrap();

        assert!(registry.register(command("ls")).is_err());
        assert_eq!(registry.get("ls").map(RegisteredCommand::name), Some("list".to_string()));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = registry(&["user", "user add", "user add admin"]);
        let args = argv(&["user", "add", "--name", "bob"]);

        let (cmd, rest) = registry.resolve(&args).unwrap();
        assert_eq!(cmd.name(), "user add");
        assert_eq!(rest, &args[2..]);

        let args = argv(&["user", "remove"]);
        let (cmd, rest) = registry.resolve(&args).unwrap();
        assert_eq!(cmd.name(), "user");
        assert_eq!(rest, ["remove".to_string()]);
    }

    #[test]
    fn test_root_matches_as_fallback() {
        let registry = registry(&["", "echo"]);

        let args = argv(&["--msg", "hi"]);
        let (cmd, rest) = registry.resolve(&args).unwrap();
        assert!(cmd.spec().is_root());
        assert_eq!(rest.len(), 2);

        let (cmd, _) = registry.resolve(&argv(&["echo"])).unwrap();
        assert_eq!(cmd.name(), "echo");

        let empty: Vec<String> = Vec::new();
        assert!(registry.resolve(&empty).unwrap().0.spec().is_root());
    }

    #[test]
    fn test_no_match_without_root() {
        let registry = registry(&["add"]);
        assert!(registry.resolve(&argv(&["nope"])).is_none());
        assert!(registry.resolve(&[]).is_none());
    }

    #[test]
    fn test_iteration_follows_registration_order() {
        let registry = registry(&["user list", "add", "user add"]);
        let names: Vec<String> = registry.iter().map(RegisteredCommand::name).collect();
        assert_eq!(names, vec!["user list", "add", "user add"]);
        assert!(!registry.is_empty());
    }
}
