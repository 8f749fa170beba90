use std::time::Duration;

use eoslink_records::{Argument, EosMessage};
use tokio::time::Instant;
use uuid::Uuid;

pub const PING: &str = "/eos/ping";
pub const PING_REPLY: &str = "/ping";

/// Liveness ping timers. Holds no I/O; the session asks it what is due.
#[derive(Debug)]
pub struct Heartbeat {
    tag: String,
    token: Uuid,
    /// -1 while stopped, otherwise consecutive missed replies.
    counter: i32,
    interval: Duration,
    failure: Duration,
    next_send: Option<Instant>,
    deadline: Option<Instant>,
}

impl Heartbeat {
    pub fn new(tag: impl Into<String>, interval: Duration, failure: Duration) -> Self {
        Self {
            tag: tag.into(),
            token: Uuid::new_v4(),
            counter: -1,
            interval,
            failure,
            next_send: None,
            deadline: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.counter = 0;
        self.next_send = Some(now);
        self.deadline = None;
    }

    pub fn stop(&mut self) {
        self.counter = -1;
        self.next_send = None;
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.counter >= 0
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn message(&self) -> EosMessage {
        EosMessage::new(
            PING,
            vec![
                Argument::String(self.tag.clone()),
                Argument::String(self.token.to_string()),
            ],
        )
    }

    /// Whether the outstanding ping timed out. A miss schedules an
    /// immediate resend.
    pub fn missed(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.counter += 1;
                self.next_send = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_send.is_some_and(|at| now >= at)
    }

    pub fn sent(&mut self, now: Instant) {
        self.next_send = None;
        self.deadline = Some(now + self.failure);
    }

    /// Consumes a `/ping` reply carrying this session's token.
    pub fn acknowledge(&mut self, reply: &EosMessage, now: Instant) -> bool {
        if !self.is_active() || reply.address != PING_REPLY {
            return false;
        }
        let token = self.token.to_string();
        if !reply
            .arguments
            .iter()
            .any(|argument| matches!(argument, Argument::String(value) if *value == token))
        {
            return false;
        }
        self.counter = 0;
        self.deadline = None;
        self.next_send = Some(now + self.interval);
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_send, self.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
