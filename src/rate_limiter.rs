use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use libp2p_identity::PeerId;

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window admission control for dial requests.
///
/// Requests are limited globally, per peer, and by how often the server may
/// demand dial data. Independently of the quotas, at most one request per
/// peer is in flight at a time.
///
/// All logs are ordered by insertion time, so expired entries always form a
/// prefix and cleanup is amortized O(1) per admission.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    rpm: usize,
    per_peer_rpm: usize,
    dial_data_rpm: usize,

    reqs: VecDeque<Entry>,
    peer_reqs: HashMap<PeerId, VecDeque<Instant>>,
    dial_data_reqs: VecDeque<Instant>,
    // TODO: decide whether a few concurrent requests per peer should be
    // allowed instead of exactly one.
    ongoing_reqs: HashSet<PeerId>,
}

#[derive(Debug)]
struct Entry {
    peer: PeerId,
    time: Instant,
}

impl RateLimiter {
    pub(crate) fn new(rpm: usize, per_peer_rpm: usize, dial_data_rpm: usize) -> Self {
        Self {
            rpm,
            per_peer_rpm,
            dial_data_rpm,
            reqs: VecDeque::with_capacity(rpm),
            peer_reqs: HashMap::new(),
            dial_data_reqs: VecDeque::with_capacity(dial_data_rpm),
            ongoing_reqs: HashSet::new(),
        }
    }

    /// Admit a request from `peer`, recording it against the global and
    /// per-peer windows and marking the peer as having a request in flight.
    pub(crate) fn accept(&mut self, peer: PeerId) -> bool {
        self.accept_at(peer, Instant::now())
    }

    fn accept_at(&mut self, peer: PeerId, now: Instant) -> bool {
        self.cleanup(now);

        if self.ongoing_reqs.contains(&peer) {
            return false;
        }
        if self.reqs.len() >= self.rpm
            || self.peer_reqs.get(&peer).map_or(0, VecDeque::len) >= self.per_peer_rpm
        {
            return false;
        }

        self.ongoing_reqs.insert(peer);
        self.reqs.push_back(Entry { peer, time: now });
        self.peer_reqs.entry(peer).or_default().push_back(now);
        true
    }

    /// Charge the dial-data quota. Applied within an already-admitted
    /// request; does not touch the in-flight set or the request logs.
    pub(crate) fn accept_dial_data_request(&mut self) -> bool {
        self.accept_dial_data_request_at(Instant::now())
    }

    fn accept_dial_data_request_at(&mut self, now: Instant) -> bool {
        self.cleanup(now);

        if self.dial_data_reqs.len() >= self.dial_data_rpm {
            return false;
        }
        self.dial_data_reqs.push_back(now);
        true
    }

    /// Release `peer`'s in-flight slot. The window entries remain and age
    /// out on their own.
    pub(crate) fn complete_request(&mut self, peer: &PeerId) {
        self.ongoing_reqs.remove(peer);
    }

    fn cleanup(&mut self, now: Instant) {
        while let Some(entry) = self.reqs.front() {
            if now.duration_since(entry.time) < WINDOW {
                break;
            }
            if let Some(times) = self.peer_reqs.get_mut(&entry.peer) {
                while times
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= WINDOW)
                {
                    times.pop_front();
                }
                if times.is_empty() {
                    self.peer_reqs.remove(&entry.peer);
                }
            }
            self.reqs.pop_front();
        }

        while self
            .dial_data_reqs
            .front()
            .is_some_and(|t| now.duration_since(*t) >= WINDOW)
        {
            self.dial_data_reqs.pop_front();
        }
    }
}
