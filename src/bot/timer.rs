use crate::client::write::{SendError, Sender};
use crate::common::normalize_channel;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A message repeated in a channel on a fixed interval.
///
/// Timers start once the bot is ready and run until it shuts down.
/// The first message is sent one `interval` after startup.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Timer {
  pub channel: String,
  pub message: String,
  #[cfg_attr(feature = "serde", serde(with = "crate::client::secs"))]
  pub interval: Duration,
}

impl Timer {
  pub fn new(channel: &str, message: impl Into<String>, interval: Duration) -> Self {
    Self {
      channel: normalize_channel(channel),
      message: message.into(),
      interval,
    }
  }

  pub(crate) async fn run(self, sender: Sender, stop: CancellationToken) {
    if self.interval.is_zero() {
      warn!(channel = self.channel, "timer with a zero interval, not starting");
      return;
    }

    let mut interval = tokio::time::interval_at(
      tokio::time::Instant::now() + self.interval,
      self.interval,
    );
    loop {
      tokio::select! {
        biased;
        _ = stop.cancelled() => break,
        _ = interval.tick() => {}
      }

      match sender.say(&self.channel, &self.message).await {
        Ok(()) => trace!(channel = self.channel, "timer fired"),
        Err(SendError::StreamClosed | SendError::RateLimit(_)) => break,
        Err(e) => warn!(channel = self.channel, error = %e, "timer failed to send"),
      }
    }
    trace!(channel = self.channel, "timer stopped");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::client::write::tests::sender;
  use tokio::io::AsyncReadExt;

  #[tokio::test(start_paused = true)]
  async fn repeats_until_cancelled() {
    let (sender, mut server) = sender("my_bot");
    let stop = CancellationToken::new();
    let timer = Timer::new("#Pajlada", "drink water", Duration::from_secs(60));
    let task = tokio::spawn(timer.run(sender.clone(), stop.clone()));

    tokio::time::sleep(Duration::from_secs(150)).await;
    stop.cancel();
    task.await.unwrap();
    sender.close().await.unwrap();

    let mut out = String::new();
    server.read_to_string(&mut out).await.unwrap();
    assert_eq!(
      out,
      "PRIVMSG #pajlada :drink water\r\nPRIVMSG #pajlada :drink water\r\n"
    );
  }

  #[tokio::test(start_paused = true)]
  async fn stops_when_connection_closes() {
    let (sender, _server) = sender("my_bot");
    sender.close().await.unwrap();
    let timer = Timer::new("pajlada", "hi", Duration::from_secs(1));
    // returns on the first failed send instead of spinning forever
    timer.run(sender, CancellationToken::new()).await;
  }
}
