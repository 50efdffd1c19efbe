//! The fixed four-tier-per-channel-family queue topology.

use std::time::Duration;

use crate::domain::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelFamily {
    Email,
    InApp,
    Push,
}

impl From<Channel> for ChannelFamily {
    fn from(c: Channel) -> Self {
        match c {
            Channel::Email => Self::Email,
            Channel::InApp => Self::InApp,
            Channel::Push => Self::Push,
        }
    }
}

impl ChannelFamily {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::InApp => "in_app",
            Self::Push => "push",
        }
    }
}

/// A tier within a channel family's retry ladder, ordered from the point of
/// first enqueue (`Primary`) through escalating backoff (`Retry`, `Delayed`)
/// to the terminal holding tier (`DeadLetter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Primary,
    Retry,
    Delayed,
    DeadLetter,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Primary, Tier::Retry, Tier::Delayed, Tier::DeadLetter];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Retry => "retry",
            Self::Delayed => "delayed",
            Self::DeadLetter => "dead_letter",
        }
    }

    pub fn next(&self) -> Option<Tier> {
        match self {
            Self::Primary => Some(Self::Retry),
            Self::Retry => Some(Self::Delayed),
            Self::Delayed => Some(Self::DeadLetter),
            Self::DeadLetter => None,
        }
    }
}

/// Per-tier delay/attempt/concurrency policy.
#[derive(Debug, Clone, Copy)]
pub struct TierPolicy {
    pub tier: Tier,
    pub delay: Duration,
    pub max_attempts_in_tier: u32,
    pub worker_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct QueueTopology {
    family: ChannelFamily,
}

impl QueueTopology {
    pub fn new(family: ChannelFamily) -> Self {
        Self { family }
    }

    pub fn family(&self) -> ChannelFamily {
        self.family
    }

    pub fn queue_name(&self, tier: Tier) -> String {
        format!("{}:{}", self.family.prefix(), tier.name())
    }

    /// Policy table: primary is immediate, retry/delayed back off per the
    /// channel's own timing (email and push share delays, in-app escalates
    /// faster since a disconnected socket recovers quickly), dead_letter
    /// holds terminally-failed jobs for operator inspection (never
    /// auto-consumed, regardless of family).
    pub fn policy(&self, tier: Tier) -> TierPolicy {
        use ChannelFamily::*;
        use Tier::*;

        let (delay, max_attempts_in_tier, worker_concurrency) = match (self.family, tier) {
            (Email, Primary) => (Duration::from_secs(0), 4, 5),
            (InApp, Primary) => (Duration::from_secs(0), 3, 10),
            (Push, Primary) => (Duration::from_secs(0), 3, 8),

            (Email, Retry) => (Duration::from_secs(5 * 60), 3, 3),
            (InApp, Retry) => (Duration::from_secs(2 * 60), 3, 5),
            (Push, Retry) => (Duration::from_secs(5 * 60), 3, 4),

            (Email, Delayed) => (Duration::from_secs(30 * 60), 2, 1),
            (InApp, Delayed) => (Duration::from_secs(10 * 60), 2, 2),
            (Push, Delayed) => (Duration::from_secs(30 * 60), 2, 1),

            (_, DeadLetter) => (Duration::from_secs(0), 1, 1),
        };
        TierPolicy {
            tier,
            delay,
            max_attempts_in_tier,
            worker_concurrency: worker_concurrency.max(1),
        }
    }

    /// Total attempts available across the whole ladder before dead-letter.
    pub fn max_total_attempts(&self) -> u32 {
        Tier::ALL
            .iter()
            .map(|t| self.policy(*t).max_attempts_in_tier)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_are_namespaced_by_family_and_tier() {
        let topo = QueueTopology::new(ChannelFamily::Email);
        assert_eq!(topo.queue_name(Tier::Primary), "email:primary");
        assert_eq!(topo.queue_name(Tier::DeadLetter), "email:dead_letter");
    }

    #[test]
    fn tier_ladder_escalates_in_order() {
        assert_eq!(Tier::Primary.next(), Some(Tier::Retry));
        assert_eq!(Tier::Retry.next(), Some(Tier::Delayed));
        assert_eq!(Tier::Delayed.next(), Some(Tier::DeadLetter));
        assert_eq!(Tier::DeadLetter.next(), None);
    }

    #[test]
    fn dead_letter_has_no_consuming_workers() {
        let topo = QueueTopology::new(ChannelFamily::Push);
        let policy = topo.policy(Tier::DeadLetter);
        assert_eq!(policy.worker_concurrency, 1);
        // Terminal tier: the one attempt is never spent, since nothing polls it.
        assert_eq!(policy.max_attempts_in_tier, 1);
    }

    #[test]
    fn email_primary_allows_four_attempts_other_families_allow_three() {
        let email = QueueTopology::new(ChannelFamily::Email);
        let in_app = QueueTopology::new(ChannelFamily::InApp);
        let push = QueueTopology::new(ChannelFamily::Push);
        assert_eq!(email.policy(Tier::Primary).max_attempts_in_tier, 4);
        assert_eq!(in_app.policy(Tier::Primary).max_attempts_in_tier, 3);
        assert_eq!(push.policy(Tier::Primary).max_attempts_in_tier, 3);
    }

    #[test]
    fn retry_delays_differ_per_family() {
        let email = QueueTopology::new(ChannelFamily::Email);
        let in_app = QueueTopology::new(ChannelFamily::InApp);
        assert_eq!(email.policy(Tier::Retry).delay, Duration::from_secs(5 * 60));
        assert_eq!(in_app.policy(Tier::Retry).delay, Duration::from_secs(2 * 60));
        assert_eq!(email.policy(Tier::Delayed).delay, Duration::from_secs(30 * 60));
        assert_eq!(in_app.policy(Tier::Delayed).delay, Duration::from_secs(10 * 60));
    }

    #[test]
    fn delay_grows_monotonically_up_to_dead_letter() {
        let topo = QueueTopology::new(ChannelFamily::InApp);
        let primary = topo.policy(Tier::Primary).delay;
        let retry = topo.policy(Tier::Retry).delay;
        let delayed = topo.policy(Tier::Delayed).delay;
        assert!(primary <= retry);
        assert!(retry <= delayed);
    }
}
