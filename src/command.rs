//! ## Chat commands
//!
//! Commands are declared with [`Command::builder`], which takes the name,
//! aliases, flags, and an ordered parameter schema. The [`Router`] matches
//! incoming chat messages against registered commands, resolves subcommands,
//! checks permissions, and coerces arguments before calling the handler.
//!
//! ```rust
//! use tmi_bot::{Command, ParamKind, HandlerError};
//!
//! let add = Command::builder("add")
//!   .alias("plus")
//!   .param("a", ParamKind::Int)
//!   .param("b", ParamKind::Int)
//!   .handler(|ctx, msg, args| async move {
//!     let sum = args.int("a").unwrap_or(0) + args.int("b").unwrap_or(0);
//!     ctx.say(msg.channel(), &sum.to_string()).await?;
//!     Ok::<_, HandlerError>(())
//!   })
//!   .build();
//! assert_eq!(add.name(), "add");
//! ```

use crate::bot::{Context, HandlerError};
use crate::msg::Message;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// The type a parameter is coerced to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
  feature = "serde",
  derive(serde::Serialize, serde::Deserialize),
  serde(rename_all = "lowercase")
)]
pub enum ParamKind {
  Str,
  Int,
  Float,
  Bool,
}

impl ParamKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ParamKind::Str => "str",
      ParamKind::Int => "int",
      ParamKind::Float => "float",
      ParamKind::Bool => "bool",
    }
  }

  /// Coerce `token` to this kind.
  pub fn coerce(&self, token: &str) -> Option<Value> {
    Some(match self {
      ParamKind::Str => Value::Str(token.to_owned()),
      ParamKind::Int => Value::Int(token.parse().ok()?),
      ParamKind::Float => Value::Float(token.parse().ok()?),
      ParamKind::Bool => Value::Bool(parse_bool(token)?),
    })
  }
}

impl Display for ParamKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

fn parse_bool(token: &str) -> Option<bool> {
  match token.to_ascii_lowercase().as_str() {
    "true" | "yes" | "on" | "1" => Some(true),
    "false" | "no" | "off" | "0" => Some(false),
    _ => None,
  }
}

/// A coerced argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Str(String),
  Int(i64),
  Float(f64),
  Bool(bool),
}

impl Value {
  pub fn kind(&self) -> ParamKind {
    match self {
      Value::Str(_) => ParamKind::Str,
      Value::Int(_) => ParamKind::Int,
      Value::Float(_) => ParamKind::Float,
      Value::Bool(_) => ParamKind::Bool,
    }
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Value::Str(v) => f.write_str(v),
      Value::Int(v) => write!(f, "{v}"),
      Value::Float(v) => write!(f, "{v}"),
      Value::Bool(v) => write!(f, "{v}"),
    }
  }
}

/// A named, typed positional parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
  pub name: String,
  pub kind: ParamKind,
}

/// Coerced arguments, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args(Vec<(String, Value)>);

impl Args {
  pub fn get(&self, name: &str) -> Option<&Value> {
    self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
  }

  pub fn str(&self, name: &str) -> Option<&str> {
    match self.get(name)? {
      Value::Str(v) => Some(v),
      _ => None,
    }
  }

  pub fn int(&self, name: &str) -> Option<i64> {
    match self.get(name)? {
      Value::Int(v) => Some(*v),
      _ => None,
    }
  }

  pub fn float(&self, name: &str) -> Option<f64> {
    match self.get(name)? {
      Value::Float(v) => Some(*v),
      Value::Int(v) => Some(*v as f64),
      _ => None,
    }
  }

  pub fn bool(&self, name: &str) -> Option<bool> {
    match self.get(name)? {
      Value::Bool(v) => Some(*v),
      _ => None,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
    self.0.iter().map(|(n, v)| (n.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Reported back to the channel the command was used in.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
  #[error("Not enough arguments for {command}, required arguments: {}", .required.join(", "))]
  ArgumentCount {
    command: String,
    required: Vec<String>,
  },

  #[error("Invalid type: got {actual:?}, {expected} expected")]
  InvalidArgumentType { expected: ParamKind, actual: String },

  #[error("You are not allowed to use this command")]
  PermissionDenied { command: String },
}

type CommandFn =
  dyn Fn(Context, Message, Args) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;

/// A registered chat command.
#[derive(Clone)]
pub struct Command {
  name: String,
  aliases: Vec<String>,
  description: Option<String>,
  listed: bool,
  admin: bool,
  unprefixed: bool,
  params: Vec<Param>,
  handler: Option<Arc<CommandFn>>,
  subcommands: HashMap<String, Arc<Command>>,
}

impl Command {
  pub fn builder(name: impl Into<String>) -> CommandBuilder {
    CommandBuilder {
      command: Command {
        name: name.into().to_lowercase(),
        aliases: Vec::new(),
        description: None,
        listed: true,
        admin: false,
        unprefixed: false,
        params: Vec::new(),
        handler: None,
        subcommands: HashMap::new(),
      },
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn aliases(&self) -> &[String] {
    &self.aliases
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  /// `false` for commands hidden from [`Router::listed`].
  pub fn is_listed(&self) -> bool {
    self.listed
  }

  pub fn is_admin(&self) -> bool {
    self.admin
  }

  pub fn is_unprefixed(&self) -> bool {
    self.unprefixed
  }

  pub fn params(&self) -> &[Param] {
    &self.params
  }

  pub fn subcommand(&self, name: &str) -> Option<&Arc<Command>> {
    self.subcommands.get(&name.to_lowercase())
  }

  /// How the command is invoked, e.g. `!add <a> <b>`.
  pub fn usage(&self, prefix: &str) -> String {
    let mut usage = if self.unprefixed {
      self.name.clone()
    } else {
      format!("{prefix}{}", self.name)
    };
    for param in &self.params {
      usage.push_str(&format!(" <{}>", param.name));
    }
    usage
  }

  /// The name followed by every alias.
  fn keys(&self) -> impl Iterator<Item = &str> + '_ {
    std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
  }
}

impl std::fmt::Debug for Command {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Command")
      .field("name", &self.name)
      .field("aliases", &self.aliases)
      .field("listed", &self.listed)
      .field("admin", &self.admin)
      .field("unprefixed", &self.unprefixed)
      .field("params", &self.params)
      .field("subcommands", &self.subcommands.keys().collect::<Vec<_>>())
      .finish_non_exhaustive()
  }
}

/// Builder for a [`Command`].
pub struct CommandBuilder {
  command: Command,
}

impl CommandBuilder {
  pub fn alias(mut self, alias: impl Into<String>) -> Self {
    self.command.aliases.push(alias.into().to_lowercase());
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.command.description = Some(description.into());
    self
  }

  /// Hide the command from [`Router::listed`].
  pub fn unlisted(mut self) -> Self {
    self.command.listed = false;
    self
  }

  /// Only logins in [`Config::admins`][crate::Config::admins] may use this command.
  pub fn admin(mut self) -> Self {
    self.command.admin = true;
    self
  }

  /// Match on the bare first word instead of the prefixed name.
  pub fn unprefixed(mut self) -> Self {
    self.command.unprefixed = true;
    self
  }

  /// Append a positional parameter.
  ///
  /// Surplus words are folded into the last parameter.
  pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
    self.command.params.push(Param {
      name: name.into(),
      kind,
    });
    self
  }

  pub fn subcommand(mut self, subcommand: impl Into<Command>) -> Self {
    let subcommand = Arc::new(subcommand.into());
    for key in subcommand.keys() {
      self
        .command
        .subcommands
        .insert(key.to_owned(), subcommand.clone());
    }
    self
  }

  pub fn handler<F, Fut, E>(mut self, handler: F) -> Self
  where
    F: Fn(Context, Message, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<HandlerError>,
  {
    let wrapped: Arc<CommandFn> = Arc::new(move |ctx: Context, msg: Message, args: Args| {
      let fut = handler(ctx, msg, args);
      async move {
        let result: Result<(), HandlerError> = fut.await.map_err(Into::into);
        result
      }
      .boxed()
    });
    self.command.handler = Some(wrapped);
    self
  }

  pub fn build(self) -> Command {
    self.command
  }
}

impl From<CommandBuilder> for Command {
  fn from(builder: CommandBuilder) -> Self {
    builder.build()
  }
}

/// A resolved command with its coerced arguments.
#[derive(Debug)]
pub struct Invocation {
  pub command: Arc<Command>,
  pub args: Args,
}

/// Matches chat messages to commands.
#[derive(Clone, Debug, Default)]
pub struct Router {
  prefix: String,
  admins: Vec<String>,
  nick: String,
  prefixed: HashMap<String, Arc<Command>>,
  unprefixed: HashMap<String, Arc<Command>>,
}

impl Router {
  /// `nick` is the bot's own login, messages from it are never commands.
  pub fn new(prefix: impl Into<String>, admins: &[String], nick: &str) -> Self {
    Self {
      prefix: prefix.into(),
      admins: admins.iter().map(|a| a.to_lowercase()).collect(),
      nick: nick.to_lowercase(),
      prefixed: HashMap::new(),
      unprefixed: HashMap::new(),
    }
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  /// Every listed command once, sorted by name.
  pub fn listed(&self) -> Vec<Arc<Command>> {
    let mut commands: Vec<_> = self
      .prefixed
      .values()
      .chain(self.unprefixed.values())
      .filter(|command| command.listed)
      .cloned()
      .collect();
    commands.sort_by(|a, b| a.name.cmp(&b.name));
    commands.dedup_by(|a, b| Arc::ptr_eq(a, b));
    commands
  }

  /// Register `command` under its name and every alias.
  ///
  /// A name or alias registered earlier is overwritten.
  pub fn register(&mut self, command: impl Into<Command>) {
    let command = Arc::new(command.into());
    let table = if command.unprefixed {
      &mut self.unprefixed
    } else {
      &mut self.prefixed
    };
    for key in command.keys() {
      if let Some(previous) = table.insert(key.to_owned(), command.clone()) {
        debug!(key, previous = previous.name, "command overwritten");
      }
    }
  }

  pub fn is_empty(&self) -> bool {
    self.prefixed.is_empty() && self.unprefixed.is_empty()
  }

  /// Find the command `message` invokes, if any, and coerce its arguments.
  pub fn resolve(&self, message: &Message) -> Result<Option<Invocation>, CommandError> {
    let author = message.author().name().to_lowercase();
    if author == self.nick {
      return Ok(None);
    }

    let Some((mut command, mut rest)) = self.lookup(message.content()) else {
      return Ok(None);
    };

    let mut admin = command.admin;
    loop {
      let (word, after) = split_word(rest.trim_start());
      match command.subcommand(word) {
        Some(sub) if !word.is_empty() => {
          command = sub.clone();
          admin |= command.admin;
          rest = after;
        }
        _ => break,
      }
    }

    if admin && !self.admins.contains(&author) {
      return Err(CommandError::PermissionDenied {
        command: command.name.clone(),
      });
    }

    let args = parse_args(&command, rest)?;
    Ok(Some(Invocation { command, args }))
  }

  fn lookup<'a>(&self, content: &'a str) -> Option<(Arc<Command>, &'a str)> {
    if !self.prefix.is_empty() {
      if let Some(after) = content.strip_prefix(self.prefix.as_str()) {
        let (word, rest) = split_word(after);
        if let Some(command) = self.prefixed.get(&word.to_lowercase()) {
          return Some((command.clone(), rest));
        }
      }
    }

    let (word, rest) = split_word(content);
    self
      .unprefixed
      .get(&word.to_lowercase())
      .map(|command| (command.clone(), rest))
  }

  /// Resolve and run the command `message` invokes.
  ///
  /// [`CommandError`]s are sent back to the message's channel.
  /// Returns `Ok(true)` if a command handler ran.
  pub async fn dispatch(&self, ctx: &Context, message: &Message) -> Result<bool, HandlerError> {
    let invocation = match self.resolve(message) {
      Ok(Some(invocation)) => invocation,
      Ok(None) => return Ok(false),
      Err(e) => {
        debug!(error = %e, author = message.author().name(), "command rejected");
        if let Err(send) = ctx.say(message.channel(), &e.to_string()).await {
          warn!(error = %send, "failed to report command error");
        }
        return Ok(false);
      }
    };

    let Some(handler) = invocation.command.handler.clone() else {
      debug!(command = invocation.command.name, "command has no handler");
      return Ok(false);
    };

    trace!(command = invocation.command.name, "running command");
    handler(ctx.clone(), message.clone(), invocation.args).await?;
    Ok(true)
  }
}

fn split_word(s: &str) -> (&str, &str) {
  match s.find(char::is_whitespace) {
    Some(end) => (&s[..end], &s[end..]),
    None => (s, ""),
  }
}

/// Byte ranges of the whitespace-separated words in `s`.
fn words(s: &str) -> SmallVec<[(usize, usize); 8]> {
  let mut out = SmallVec::new();
  let mut start = None;
  for (i, c) in s.char_indices() {
    match (c.is_whitespace(), start) {
      (true, Some(begin)) => {
        out.push((begin, i));
        start = None;
      }
      (false, None) => start = Some(i),
      _ => {}
    }
  }
  if let Some(begin) = start {
    out.push((begin, s.len()));
  }
  out
}

fn parse_args(command: &Command, rest: &str) -> Result<Args, CommandError> {
  let params = &command.params;
  let words = words(rest);
  if words.len() < params.len() {
    return Err(CommandError::ArgumentCount {
      command: command.name.clone(),
      required: params.iter().map(|p| p.name.clone()).collect(),
    });
  }

  let mut args = Vec::with_capacity(params.len());
  for (i, param) in params.iter().enumerate() {
    let (start, mut end) = words[i];
    if i + 1 == params.len() {
      // the last parameter takes everything that's left, spacing included
      if let Some(&(_, last)) = words.last() {
        end = last;
      }
    }
    let token = &rest[start..end];
    let value = param
      .kind
      .coerce(token)
      .ok_or_else(|| CommandError::InvalidArgumentType {
        expected: param.kind,
        actual: token.to_owned(),
      })?;
    args.push((param.name.clone(), value));
  }

  Ok(Args(args))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn router() -> Router {
    let mut router = Router::new("!", &["randers".to_owned()], "my_bot");
    router.register(
      Command::builder("cmd")
        .param("x", ParamKind::Int)
        .param("y", ParamKind::Str)
        .subcommand(Command::builder("sub").param("value", ParamKind::Str)),
    );
    router.register(
      Command::builder("echo")
        .alias("say")
        .param("text", ParamKind::Str),
    );
    router.register(Command::builder("hello").unprefixed());
    router.register(Command::builder("shutdown").admin());
    router.register(
      Command::builder("set")
        .param("ratio", ParamKind::Float)
        .param("enabled", ParamKind::Bool),
    );
    router
  }

  fn msg(content: &str) -> Message {
    Message::new(content, "forsen", "pajlada", None)
  }

  fn resolve(router: &Router, content: &str) -> Result<Option<Invocation>, CommandError> {
    router.resolve(&msg(content))
  }

  #[test]
  fn positional_args_with_folded_tail() {
    let inv = resolve(&router(), "!cmd 5 hello world").unwrap().unwrap();
    assert_eq!(inv.command.name(), "cmd");
    assert_eq!(inv.args.int("x"), Some(5));
    assert_eq!(inv.args.str("y"), Some("hello world"));
  }

  #[test]
  fn missing_args() {
    assert_eq!(
      resolve(&router(), "!cmd").unwrap_err(),
      CommandError::ArgumentCount {
        command: "cmd".into(),
        required: vec!["x".into(), "y".into()],
      }
    );
    assert_eq!(
      resolve(&router(), "!cmd").unwrap_err().to_string(),
      "Not enough arguments for cmd, required arguments: x, y"
    );
  }

  #[test]
  fn subcommand_takes_over() {
    let inv = resolve(&router(), "!cmd sub foo").unwrap().unwrap();
    assert_eq!(inv.command.name(), "sub");
    assert_eq!(inv.args.str("value"), Some("foo"));
  }

  #[test]
  fn non_subcommand_word_is_a_parent_argument() {
    assert_eq!(
      resolve(&router(), "!cmd other foo").unwrap_err(),
      CommandError::InvalidArgumentType {
        expected: ParamKind::Int,
        actual: "other".into(),
      }
    );
    let inv = resolve(&router(), "!cmd 1 sub").unwrap().unwrap();
    assert_eq!(inv.command.name(), "cmd");
    assert_eq!(inv.args.str("y"), Some("sub"));
  }

  #[test]
  fn unknown_command_is_ignored() {
    assert!(resolve(&router(), "!unknown").unwrap().is_none());
    assert!(resolve(&router(), "just chatting").unwrap().is_none());
    assert!(resolve(&router(), "!").unwrap().is_none());
  }

  #[test]
  fn spacing_in_last_argument_is_preserved() {
    let inv = resolve(&router(), "!echo   a   b  c  ").unwrap().unwrap();
    assert_eq!(inv.args.str("text"), Some("a   b  c"));
  }

  #[test]
  fn aliases_and_case_insensitive_names() {
    let inv = resolve(&router(), "!SAY hi").unwrap().unwrap();
    assert_eq!(inv.command.name(), "echo");
    let inv = resolve(&router(), "!Echo hi").unwrap().unwrap();
    assert_eq!(inv.command.name(), "echo");
  }

  #[test]
  fn unprefixed_commands_match_first_word() {
    let inv = resolve(&router(), "hello there").unwrap().unwrap();
    assert_eq!(inv.command.name(), "hello");
    assert!(resolve(&router(), "!hello").unwrap().is_none());
  }

  #[test]
  fn admin_commands() {
    let router = router();
    assert_eq!(
      resolve(&router, "!shutdown").unwrap_err(),
      CommandError::PermissionDenied {
        command: "shutdown".into()
      }
    );
    let admin = Message::new("!shutdown", "Randers", "pajlada", None);
    assert!(router.resolve(&admin).unwrap().is_some());
  }

  #[test]
  fn own_messages_are_ignored() {
    let own = Message::new("!echo hi", "my_bot", "pajlada", None);
    assert!(router().resolve(&own).unwrap().is_none());
  }

  #[test]
  fn coercion() {
    let inv = resolve(&router(), "!set 0.5 yes").unwrap().unwrap();
    assert_eq!(inv.args.float("ratio"), Some(0.5));
    assert_eq!(inv.args.bool("enabled"), Some(true));

    assert_eq!(
      resolve(&router(), "!set 0.5 maybe").unwrap_err().to_string(),
      "Invalid type: got \"maybe\", bool expected"
    );
  }

  #[test]
  fn last_registration_wins() {
    let mut router = router();
    router.register(Command::builder("echo"));
    let inv = resolve(&router, "!echo a b").unwrap().unwrap();
    assert!(inv.command.params().is_empty());
    assert!(inv.args.is_empty());

    // the alias still points at the old command
    let inv = resolve(&router, "!say a b").unwrap().unwrap();
    assert_eq!(inv.args.str("text"), Some("a b"));
  }

  #[test]
  fn custom_prefix() {
    let mut router = Router::new("?", &[], "my_bot");
    router.register(Command::builder("ping"));
    assert!(router.resolve(&msg("?ping")).unwrap().is_some());
    assert!(router.resolve(&msg("!ping")).unwrap().is_none());
  }

  #[test]
  fn listed_commands_for_help() {
    let mut router = router();
    router.register(
      Command::builder("add")
        .alias("plus")
        .description("Adds two numbers")
        .param("a", ParamKind::Int)
        .param("b", ParamKind::Int),
    );
    router.register(Command::builder("secret").unlisted());

    let listed = router.listed();
    let names: Vec<_> = listed.iter().map(|c| c.name()).collect();
    assert_eq!(names, ["add", "cmd", "echo", "hello", "set", "shutdown"]);

    let add = &listed[0];
    assert_eq!(add.description(), Some("Adds two numbers"));
    assert_eq!(add.usage(router.prefix()), "!add <a> <b>");
    assert_eq!(listed[3].usage("!"), "hello");
    assert!(router.resolve(&msg("!secret")).unwrap().is_some());
  }
}
