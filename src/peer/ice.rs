use crate::peer::types::IceCandidate;
use tracing::{debug, info, warn};

/// Кандидаты, полученные до установки remote description.
///
/// Порядок получения сохраняется; `drain` отдаёт их ровно один раз.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    pending: Vec<IceCandidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: IceCandidate) {
        debug!(queued = self.pending.len() + 1, "Remote description not set yet, queuing candidate");
        self.pending.push(candidate);
    }

    /// Забирает все отложенные кандидаты, очередь остаётся пустой
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Счётчики типов кандидатов
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateTally {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

impl CandidateTally {
    pub fn record(&mut self, candidate: &IceCandidate) {
        if candidate.candidate.contains("typ host") {
            self.host += 1;
        } else if candidate.candidate.contains("typ srflx") {
            self.srflx += 1;
        } else if candidate.candidate.contains("typ relay") {
            self.relay += 1;
        }
    }
}

pub fn analyze_candidates(candidates: &[IceCandidate]) -> CandidateTally {
    let mut tally = CandidateTally::default();
    for candidate in candidates {
        tally.record(candidate);
    }

    info!(
        host = tally.host,
        srflx = tally.srflx,
        relay = tally.relay,
        "Candidate analysis"
    );

    if tally.relay == 0 {
        warn!("No TURN relay candidates found! Connection through NAT may fail.");
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_queue_in_order() {
        let mut q = CandidateQueue::new();
        q.push(IceCandidate::new("a"));
        q.push(IceCandidate::new("b"));

        let drained: Vec<_> = q.drain().into_iter().map(|c| c.candidate).collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(q.is_empty());
        assert!(q.drain().is_empty());
    }

    #[test]
    fn tally_counts_types() {
        let cands = vec![
            IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 5000 typ host"),
            IceCandidate::new("candidate:2 1 udp 1 1.2.3.4 5001 typ srflx raddr 10.0.0.1"),
            IceCandidate::new("candidate:3 1 udp 1 5.6.7.8 5002 typ relay raddr 1.2.3.4"),
            IceCandidate::new("candidate:4 1 udp 1 10.0.0.2 5003 typ host"),
        ];
        let tally = analyze_candidates(&cands);
        assert_eq!(
            tally,
            CandidateTally {
                host: 2,
                srflx: 1,
                relay: 1
            }
        );
    }
}
