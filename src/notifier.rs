use anyhow::Result;
use tracing::{info, warn};

use crate::chat::ChatSink;
use crate::types::{ChannelId, Notification};

/// Render a notification as channel text.
///
/// `mention_role` is pinged only on progress messages.
pub fn render(notification: &Notification, mention_role: Option<u64>) -> String {
    match notification {
        Notification::Progress {
            badge_id,
            badge_name,
            universe,
            previous,
            current,
            increase,
        } => {
            let mut msg = String::new();
            if let Some(role) = mention_role {
                msg.push_str(&format!("<@&{role}>\n"));
            }
            msg.push_str("🔔 Someone just got something!\n");
            msg.push_str(&format!("Badge: {badge_name} in **{}**\n", universe.name));
            msg.push_str(&format!("Previous: **{previous}** → New: **{current}**\n"));
            msg.push_str(&format!("(📈 Increase: **{increase}**)\n"));
            msg.push_str(&format!("Badge ID: {badge_id}\n"));
            msg.push_str(&format!("[{}]({})\n", universe.name, universe.game_link()));
            msg
        }
        Notification::TrackingStopped {
            badge_name,
            cumulative,
            threshold,
            ..
        } => format!(
            "🚨 Badge **{badge_name}** has reached an increase of {cumulative} \
             (threshold {threshold}) and will no longer be tracked."
        ),
        Notification::Reinitialized {
            tracked,
            configured,
        } => format!("🔄 Badge data initialized: tracking {tracked}/{configured} badges."),
        Notification::SleepMode => "Looks like I need updated. Entering sleep mode 🌙".to_string(),
    }
}

/// Sends rendered notifications to one channel.
pub struct Notifier<C> {
    chat: C,
    channel_id: ChannelId,
    mention_role: Option<u64>,
}

impl<C: ChatSink> Notifier<C> {
    pub fn new(chat: C, channel_id: ChannelId, mention_role: Option<u64>) -> Self {
        Self {
            chat,
            channel_id,
            mention_role,
        }
    }

    /// Resolves once the chat connection can deliver messages.
    pub async fn wait_until_ready(&self) -> Result<()> {
        self.chat.wait_until_ready().await
    }

    /// Send one notification. Delivery failures are logged, never returned:
    /// a lost message must not abort the polling pass.
    pub async fn notify(&self, notification: &Notification) {
        let text = render(notification, self.mention_role);
        match self.chat.send_message(self.channel_id, &text).await {
            Ok(()) => info!("Notified: {}", summary(notification)),
            Err(e) => warn!("Failed to send {}: {e:#}", summary(notification)),
        }
    }

    pub async fn notify_all(&self, notifications: &[Notification]) {
        for n in notifications {
            self.notify(n).await;
        }
    }
}

fn summary(notification: &Notification) -> String {
    match notification {
        Notification::Progress {
            badge_name,
            increase,
            ..
        } => format!("progress for {badge_name} (+{increase})"),
        Notification::TrackingStopped { badge_name, .. } => {
            format!("tracking stopped for {badge_name}")
        }
        Notification::Reinitialized { .. } => "re-initialization".to_string(),
        Notification::SleepMode => "sleep mode".to_string(),
    }
}
