//! Send-rate and cooldown gating
//!
//! The queue processor consults the gate before pulling work; the delivery
//! path marks tokens sent. The gate never mutates queue state.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Rate-limit gate consulted by the queue processor and delivery path.
pub trait RateGate: Send + Sync {
    /// Whether the channel can take any message right now
    fn can_send_any(&self, chat: &str) -> bool;
    /// Whether a specific token can be sent to the channel
    fn can_send(&self, chat: &str, mint: &str) -> bool;
    /// Record a send for rate accounting
    fn mark_sent(&self, chat: &str, mint: &str);
}

/// Default gate: minimum spacing between sends per chat, plus a per-token
/// cooldown so one token cannot flood a channel.
pub struct CooldownGate {
    /// chat -> last send
    last_send: RwLock<HashMap<String, DateTime<Utc>>>,
    /// (chat, mint) -> last send
    token_sends: RwLock<HashMap<(String, String), DateTime<Utc>>>,
    min_send_interval: Duration,
    token_cooldown: Duration,
}

impl CooldownGate {
    pub fn new(min_send_interval_secs: i64, token_cooldown_secs: i64) -> Self {
        Self {
            last_send: RwLock::new(HashMap::new()),
            token_sends: RwLock::new(HashMap::new()),
            min_send_interval: Duration::seconds(min_send_interval_secs),
            token_cooldown: Duration::seconds(token_cooldown_secs),
        }
    }

    /// Drop entries old enough that they can never gate again
    pub fn cleanup(&self) {
        let cutoff = Utc::now() - self.token_cooldown * 2;
        self.token_sends.write().retain(|_, v| *v > cutoff);
        let chat_cutoff = Utc::now() - self.min_send_interval * 2;
        self.last_send.write().retain(|_, v| *v > chat_cutoff);
    }
}

impl RateGate for CooldownGate {
    fn can_send_any(&self, chat: &str) -> bool {
        match self.last_send.read().get(chat) {
            Some(last) => Utc::now() - *last >= self.min_send_interval,
            None => true,
        }
    }

    fn can_send(&self, chat: &str, mint: &str) -> bool {
        if !self.can_send_any(chat) {
            return false;
        }
        let key = (chat.to_string(), mint.to_string());
        match self.token_sends.read().get(&key) {
            Some(last) => Utc::now() - *last >= self.token_cooldown,
            None => true,
        }
    }

    fn mark_sent(&self, chat: &str, mint: &str) {
        let now = Utc::now();
        self.last_send.write().insert(chat.to_string(), now);
        self.token_sends
            .write()
            .insert((chat.to_string(), mint.to_string()), now);
    }
}
