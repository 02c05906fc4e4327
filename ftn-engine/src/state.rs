// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Scheduler-owned per-node state: lifecycle, failure streak, priority and
//! the backoff arithmetic.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ftn_model::{InternetProtocol, Node};
use std::time::Duration;

/// Lifecycle of one node through a test cycle:
/// `idle → queued → in-flight → cooldown → idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestLifecycle {
    #[default]
    Idle,
    Queued,
    InFlight,
    Cooldown,
}

/// In-memory, rebuilt on startup from recent history.
#[derive(Debug, Clone, Default)]
pub struct NodeTestState {
    pub last_test: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub priority: i32,
    pub next_attempt_after: Option<DateTime<Utc>>,
    pub lifecycle: TestLifecycle,
}

impl NodeTestState {
    /// Whether the scheduler may pick this node now.
    pub fn eligible(&self, now: DateTime<Utc>) -> bool {
        if !matches!(self.lifecycle, TestLifecycle::Idle | TestLifecycle::Cooldown) {
            return false;
        }
        match self.next_attempt_after {
            Some(after) => after <= now,
            None => true,
        }
    }

    /// Record one finished test and enter cooldown.
    pub fn record_outcome(
        &mut self,
        time: DateTime<Utc>,
        success: bool,
        base_interval: Duration,
        max_level: u32,
    ) {
        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.last_test = Some(time);
        let delay = backoff_delay(self.consecutive_failures, base_interval, max_level);
        self.next_attempt_after =
            Some(time + ChronoDuration::from_std(delay).unwrap_or(ChronoDuration::zero()));
        self.lifecycle = TestLifecycle::Cooldown;
    }
}

/// Backoff level: zero after a success, otherwise
/// `min(floor(log2(failures)) + 1, max_level)`.
pub fn backoff_level(consecutive_failures: u32, max_level: u32) -> u32 {
    if consecutive_failures == 0 {
        return 0;
    }
    (consecutive_failures.ilog2() + 1).min(max_level)
}

/// Next-attempt delay: `base · 2^level`.
pub fn backoff_delay(consecutive_failures: u32, base: Duration, max_level: u32) -> Duration {
    let level = backoff_level(consecutive_failures, max_level);
    base.saturating_mul(1u32 << level.min(31))
}

/// Priority in `[0, 100]`: base 50, boosted for advertised protocols and
/// hostnames, with mailer protocols counting extra.
pub fn node_priority(node: &Node, boost: i32) -> i32 {
    let mut priority = 50;

    if !node.internet.protocols.is_empty() {
        priority += boost;
    }
    if !node.hostnames().is_empty() {
        priority += boost;
    }
    for protocol in node.internet.protocols.keys() {
        match protocol {
            InternetProtocol::Binkp | InternetProtocol::Ifcico => priority += boost,
            InternetProtocol::Telnet => priority += boost / 2,
            _ => {}
        }
    }

    priority.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftn_model::{InternetEndpoint, NodeAddress};

    #[test]
    fn backoff_level_matches_the_log2_formula() {
        assert_eq!(backoff_level(0, 6), 0);
        assert_eq!(backoff_level(1, 6), 1);
        assert_eq!(backoff_level(2, 6), 2);
        assert_eq!(backoff_level(3, 6), 2);
        assert_eq!(backoff_level(4, 6), 3);
        assert_eq!(backoff_level(5, 6), 3);
        assert_eq!(backoff_level(8, 6), 4);
        assert_eq!(backoff_level(1000, 6), 6, "capped at max_level");
    }

    #[test]
    fn backoff_level_is_monotonic() {
        let mut previous = 0;
        for failures in 0..100 {
            let level = backoff_level(failures, 6);
            assert!(level >= previous, "level dropped at {failures}");
            previous = level;
        }
    }

    #[test]
    fn five_failures_back_off_by_eight_base_intervals() {
        let base = Duration::from_secs(60);
        assert_eq!(backoff_delay(5, base, 6), Duration::from_secs(60 * 8));
    }

    #[test]
    fn success_resets_to_base_interval() {
        let base = Duration::from_secs(60);
        assert_eq!(backoff_delay(0, base, 6), base);
    }

    fn node_with(protocols: &[InternetProtocol], hostname: Option<&str>) -> Node {
        let mut node = Node {
            address: NodeAddress::new(2, 450, 1024),
            ..Default::default()
        };
        for protocol in protocols {
            let endpoints = match hostname {
                Some(host) => vec![InternetEndpoint::address_only(host)],
                None => vec![],
            };
            let _ = node.internet.protocols.insert(*protocol, endpoints);
        }
        node
    }

    #[test]
    fn priority_stacks_protocol_and_hostname_boosts() {
        // No internet config at all: the base.
        assert_eq!(node_priority(&node_with(&[], None), 10), 50);

        // One mailer protocol with a hostname: protocols + hostname + IBN.
        let node = node_with(&[InternetProtocol::Binkp], Some("a.example.com"));
        assert_eq!(node_priority(&node, 10), 80);

        // Telnet adds half a boost.
        let node = node_with(
            &[InternetProtocol::Binkp, InternetProtocol::Telnet],
            Some("a.example.com"),
        );
        assert_eq!(node_priority(&node, 10), 85);
    }

    #[test]
    fn priority_is_clamped_to_one_hundred() {
        let node = node_with(
            &[
                InternetProtocol::Binkp,
                InternetProtocol::Ifcico,
                InternetProtocol::Telnet,
                InternetProtocol::Ftp,
                InternetProtocol::Vmodem,
            ],
            Some("a.example.com"),
        );
        assert_eq!(node_priority(&node, 40), 100);
    }

    #[test]
    fn record_outcome_success_resets_streak_and_enters_cooldown() {
        let mut state = NodeTestState {
            consecutive_failures: 4,
            ..Default::default()
        };
        let now = Utc::now();
        state.record_outcome(now, true, Duration::from_secs(60), 6);

        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.lifecycle, TestLifecycle::Cooldown);
        assert_eq!(
            state.next_attempt_after,
            Some(now + ChronoDuration::seconds(60))
        );
    }

    #[test]
    fn record_outcome_failure_grows_the_delay() {
        let mut state = NodeTestState::default();
        let now = Utc::now();
        for _ in 0..5 {
            state.record_outcome(now, false, Duration::from_secs(60), 6);
        }
        assert_eq!(state.consecutive_failures, 5);
        assert_eq!(
            state.next_attempt_after,
            Some(now + ChronoDuration::seconds(60 * 8))
        );
    }

    #[test]
    fn eligibility_respects_lifecycle_and_cooldown() {
        let now = Utc::now();
        let mut state = NodeTestState::default();
        assert!(state.eligible(now));

        state.lifecycle = TestLifecycle::InFlight;
        assert!(!state.eligible(now));

        state.lifecycle = TestLifecycle::Cooldown;
        state.next_attempt_after = Some(now + ChronoDuration::seconds(30));
        assert!(!state.eligible(now));

        state.next_attempt_after = Some(now - ChronoDuration::seconds(1));
        assert!(state.eligible(now));
    }
}
