//! Provider selection policies.
//!
//! Candidates arrive already filtered by the availability predicate and
//! sorted alphabetically by name. A `degraded` provider remains selectable
//! but is deprioritized: every policy draws from the healthy pool first.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use mercato_types::SelectionPolicy;

/// Everything a policy needs to know about one available provider.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) name: String,
    pub(crate) priority: u32,
    pub(crate) degraded: bool,
    /// Success ratio in `[0, 1]`.
    pub(crate) success_rate: f64,
    /// EMA response time in seconds.
    pub(crate) avg_response_time: f64,
    /// Requests observed in the last minute.
    pub(crate) requests_per_minute: usize,
}

/// `max(0, 100 - (avg_response_s / 10) * 100)`: 100 at instant responses,
/// zero at ten seconds and beyond.
fn speed_score(avg_response_time: f64) -> f64 {
    (100.0 - (avg_response_time / 10.0) * 100.0).max(0.0)
}

fn health_score(candidate: &Candidate) -> f64 {
    0.7 * (candidate.success_rate * 100.0) + 0.3 * speed_score(candidate.avg_response_time)
}

/// Pick one provider from the candidate list, or `None` when it is empty.
pub(crate) fn select(
    policy: SelectionPolicy,
    candidates: &[Candidate],
    rotation: &AtomicUsize,
) -> Option<String> {
    let pool: Vec<&Candidate> = {
        let healthy: Vec<&Candidate> = candidates.iter().filter(|c| !c.degraded).collect();
        if healthy.is_empty() {
            candidates.iter().collect()
        } else {
            healthy
        }
    };
    if pool.is_empty() {
        return None;
    }

    let chosen = match policy {
        SelectionPolicy::PriorityOrder => pool
            .iter()
            .min_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)))
            .copied(),
        SelectionPolicy::RoundRobin => {
            // Stable alphabetical rotation; candidates are pre-sorted by name.
            let index = rotation.fetch_add(1, Ordering::Relaxed) % pool.len();
            pool.get(index).copied()
        }
        SelectionPolicy::HealthBased => pool
            .iter()
            .max_by(|a, b| {
                health_score(a)
                    .partial_cmp(&health_score(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.name.cmp(&a.name))
            })
            .copied(),
        SelectionPolicy::LoadBalanced => {
            let weights: Vec<f64> = pool
                .iter()
                .map(|c| 1.0 / (c.requests_per_minute as f64 + 1.0))
                .collect();
            let total: f64 = weights.iter().sum();
            let mut roll = rand::rng().random_range(0.0..total);
            let mut picked = *pool.last()?;
            for (candidate, weight) in pool.iter().zip(&weights) {
                if roll < *weight {
                    picked = candidate;
                    break;
                }
                roll -= weight;
            }
            Some(picked)
        }
        _ => pool
            .iter()
            .min_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)))
            .copied(),
    };
    chosen.map(|c| c.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, priority: u32) -> Candidate {
        Candidate {
            name: name.to_string(),
            priority,
            degraded: false,
            success_rate: 1.0,
            avg_response_time: 0.1,
            requests_per_minute: 0,
        }
    }

    #[test]
    fn priority_order_prefers_the_lowest_value() {
        let candidates = vec![candidate("fmp", 10), candidate("yahoo", 20)];
        let rotation = AtomicUsize::new(0);
        assert_eq!(
            select(SelectionPolicy::PriorityOrder, &candidates, &rotation),
            Some("fmp".to_string())
        );
    }

    #[test]
    fn round_robin_rotates_alphabetically() {
        let candidates = vec![candidate("fmp", 10), candidate("yahoo", 20)];
        let rotation = AtomicUsize::new(0);
        let picks: Vec<_> = (0..4)
            .filter_map(|_| select(SelectionPolicy::RoundRobin, &candidates, &rotation))
            .collect();
        assert_eq!(picks, vec!["fmp", "yahoo", "fmp", "yahoo"]);
    }

    #[test]
    fn health_based_prefers_fast_reliable_providers() {
        let mut slow = candidate("fmp", 10);
        slow.avg_response_time = 8.0;
        slow.success_rate = 0.6;
        let fast = candidate("yahoo", 20);
        let rotation = AtomicUsize::new(0);
        assert_eq!(
            select(SelectionPolicy::HealthBased, &[slow, fast], &rotation),
            Some("yahoo".to_string())
        );
    }

    #[test]
    fn degraded_providers_are_picked_only_as_last_resort() {
        let mut degraded = candidate("fmp", 1);
        degraded.degraded = true;
        let healthy = candidate("yahoo", 99);
        let rotation = AtomicUsize::new(0);
        assert_eq!(
            select(
                SelectionPolicy::PriorityOrder,
                &[degraded.clone(), healthy],
                &rotation
            ),
            Some("yahoo".to_string())
        );
        // With no healthy pool left, the degraded provider still serves.
        assert_eq!(
            select(SelectionPolicy::PriorityOrder, &[degraded], &rotation),
            Some("fmp".to_string())
        );
    }

    #[test]
    fn load_balanced_always_picks_someone() {
        let mut busy = candidate("fmp", 10);
        busy.requests_per_minute = 1_000;
        let idle = candidate("yahoo", 20);
        let rotation = AtomicUsize::new(0);
        for _ in 0..20 {
            let pick = select(
                SelectionPolicy::LoadBalanced,
                &[busy.clone(), idle.clone()],
                &rotation,
            );
            assert!(pick.is_some());
        }
    }
}
