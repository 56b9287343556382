//! A small command bot.
//!
//! ```text,ignore
//! $ cargo run --example command_bot -- \
//!   --nick my_bot \
//!   --token oauth:yfvzjqb705z12hrhy1zkwa9xt7v662 \
//!   --channel forsen \
//!   --admin pajlada
//! ```
//!
//! Logs chat to stdout, answers `!help`, `!ping`, `!add <a> <b>`, `!echo <text>`,
//! and joins or leaves a user's channel when they whisper `join` or `leave`.

use anyhow::Result;
use clap::Parser;
use std::future::Future;
use std::time::Duration;
use tmi_bot::{
  Bot, Command, Config, Context, Credentials, Handler, HandlerError, Message, ParamKind, Timer,
};

#[derive(Parser)]
#[command(author, version)]
struct Args {
  /// Login name of the bot. Reads anonymously if not set.
  #[arg(long)]
  nick: Option<String>,

  /// Login oauth2 token
  #[arg(long)]
  token: Option<String>,

  /// Channels to join
  #[arg(long)]
  channel: Vec<String>,

  /// Users allowed to run admin commands
  #[arg(long)]
  admin: Vec<String>,

  /// Command prefix
  #[arg(long, default_value = "!")]
  prefix: String,

  /// Remind the bot's own chat to hydrate every N seconds
  #[arg(long)]
  hydrate: Option<u64>,

  /// Connect without TLS
  #[arg(long)]
  insecure: bool,
}

/// Logs chat, and joins channels on request.
struct Logger;

impl Handler for Logger {
  fn on_ready(&self, ctx: &Context) -> impl Future<Output = Result<(), HandlerError>> + Send {
    println!("connected as {}", ctx.nick());
    async { Ok(()) }
  }

  fn on_message(
    &self,
    _: &Context,
    msg: &Message,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    println!("#{} > {}: {}", msg.channel(), msg.author().name(), msg.text());
    async { Ok(()) }
  }

  fn on_private_message(
    &self,
    ctx: &Context,
    msg: &Message,
  ) -> impl Future<Output = Result<(), HandlerError>> + Send {
    let ctx = ctx.clone();
    let request = msg.text().trim().to_lowercase();
    let channel = msg.author().name().to_owned();
    async move {
      match request.as_str() {
        "join" => ctx.join(&channel).await?,
        "leave" => ctx.part(&channel).await?,
        _ => {}
      }
      Ok(())
    }
  }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let credentials = match (args.nick, args.token) {
    (Some(nick), Some(token)) => Credentials::new(nick, token),
    _ => Credentials::anon(),
  };
  let config = Config::builder()
    .credentials(credentials)
    .channels(args.channel)
    .admins(args.admin)
    .prefix(args.prefix)
    .secure(!args.insecure)
    .build();
  let own_channel = config.own_channel();

  let mut bot = Bot::new(config)
    .command(
      Command::builder("ping")
        .description("Check that the bot is alive")
        .handler(|ctx, msg, _| async move { ctx.say(msg.channel(), "pong").await }),
    )
    .command(
      Command::builder("add")
        .alias("plus")
        .description("Add two numbers")
        .param("a", ParamKind::Int)
        .param("b", ParamKind::Int)
        .handler(|ctx, msg, args| async move {
          let sum = args.int("a").unwrap_or(0) + args.int("b").unwrap_or(0);
          ctx.say(msg.channel(), &sum.to_string()).await
        }),
    )
    .command(
      Command::builder("echo")
        .description("Repeat the text back")
        .param("text", ParamKind::Str)
        .handler(|ctx, msg, args| async move {
          let text = args.str("text").unwrap_or_default().to_owned();
          ctx.say(msg.channel(), &text).await
        }),
    )
    .command(
      Command::builder("bot")
        .admin()
        .unlisted()
        .subcommand(Command::builder("stop").handler(|ctx, msg, _| async move {
          ctx.say(msg.channel(), "bye").await?;
          ctx.stop();
          Ok::<_, HandlerError>(())
        }))
        .subcommand(
          Command::builder("leave")
            .param("channel", ParamKind::Str)
            .handler(|ctx, _, args| async move {
              ctx.part(args.str("channel").unwrap_or_default()).await
            }),
        ),
    );

  let help = bot
    .router()
    .listed()
    .iter()
    .map(|command| command.usage(bot.router().prefix()))
    .collect::<Vec<_>>()
    .join(", ");
  bot = bot.command(
    Command::builder("help")
      .unlisted()
      .handler(move |ctx, msg, _| {
        let help = help.clone();
        async move { ctx.say(msg.channel(), &help).await }
      }),
  );

  if let Some(secs) = args.hydrate {
    bot = bot.timer(Timer::new(
      &own_channel,
      "drink some water",
      Duration::from_secs(secs),
    ));
  }

  bot.run(Logger).await?;
  Ok(())
}
