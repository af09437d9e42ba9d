//! Event grouping and source attribution.
//!
//! Every state change goes through [`SourceState::apply`], so a second
//! election within a group is rejected by the transition table itself.

use std::collections::{BTreeSet, HashMap};

use spreadtrace_common::config::AttributionConfig;
use spreadtrace_common::{Candidate, InvalidTransition, SourceEvent, SourceState};
use tracing::debug;

/// Which posts may compete for the source slot of their event group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionPolicy {
    /// Platforms where only an original, non-reshared post is eligible.
    strict_platforms: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributionSummary {
    pub groups: usize,
    pub sources: usize,
}

impl Default for AttributionPolicy {
    fn default() -> Self {
        Self::from_config(&AttributionConfig::default())
    }
}

impl AttributionPolicy {
    pub fn new<I, S>(strict_platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strict_platforms: strict_platforms.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AttributionConfig) -> Self {
        Self {
            strict_platforms: config.strict_platforms.clone(),
        }
    }

    pub fn is_eligible(&self, candidate: &Candidate) -> bool {
        if self.strict_platforms.contains(&candidate.platform) {
            candidate.is_original_post && !candidate.is_reshare
        } else {
            true
        }
    }

    /// Assign a final [`SourceState`] to every candidate in place.
    ///
    /// Candidates must arrive `Unset`. Groups are keyed by `event_id` and
    /// ordered by timestamp; ties keep their slice order. The slice itself is
    /// never reordered.
    pub fn attribute(
        &self,
        candidates: &mut [Candidate],
    ) -> Result<AttributionSummary, InvalidTransition> {
        for candidate in candidates.iter_mut() {
            if self.is_eligible(candidate) {
                candidate.source_state = candidate.source_state.apply(SourceEvent::Eligible)?;
            }
        }

        let mut summary = AttributionSummary::default();
        for mut group in group_by_event(candidates) {
            group.sort_by(|a, b| candidates[*a].timestamp.cmp(&candidates[*b].timestamp));

            let winner = group
                .iter()
                .copied()
                .find(|i| candidates[*i].source_state == SourceState::Candidate);
            if let Some(i) = winner {
                candidates[i].source_state = candidates[i].source_state.apply(SourceEvent::Elect)?;
                summary.sources += 1;
            }
            summary.groups += 1;
        }

        for candidate in candidates.iter_mut() {
            candidate.source_state = candidate.source_state.apply(SourceEvent::Finalize)?;
        }

        debug!(
            candidates = candidates.len(),
            groups = summary.groups,
            sources = summary.sources,
            "Source attribution done"
        );
        Ok(summary)
    }
}

/// Indices per `event_id`, groups in order of first appearance.
fn group_by_event(candidates: &[Candidate]) -> Vec<Vec<usize>> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let g = *slot.entry(candidate.event_id.as_str()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[g].push(i);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weibo(id: &str, event: &str, ts: &str) -> Candidate {
        Candidate::new(id, event, "weibo", ts, true, false)
    }

    fn states(candidates: &[Candidate]) -> Vec<SourceState> {
        candidates.iter().map(|c| c.source_state).collect()
    }

    #[test]
    fn earliest_eligible_post_becomes_source() {
        let mut candidates = vec![weibo("1", "E", "2024-01-02"), weibo("2", "E", "2024-01-01")];
        let summary = AttributionPolicy::default().attribute(&mut candidates).unwrap();

        assert_eq!(candidates[0].id, "1");
        assert_eq!(candidates[0].source_state, SourceState::Candidate);
        assert_eq!(candidates[1].source_state, SourceState::Source);
        assert_eq!(summary, AttributionSummary { groups: 1, sources: 1 });
    }

    #[test]
    fn strict_platform_reshares_are_not_sources() {
        let mut candidates = vec![
            Candidate::new("1", "E", "weibo", "2024-01-01", false, true),
            Candidate::new("2", "E", "weibo", "2024-01-02", true, true),
        ];
        let summary = AttributionPolicy::default().attribute(&mut candidates).unwrap();
        assert_eq!(states(&candidates), vec![SourceState::NotSource; 2]);
        assert_eq!(summary.sources, 0);
    }

    #[test]
    fn other_platforms_are_always_eligible() {
        let mut candidates = vec![
            Candidate::new("1", "E", "weibo", "2024-01-01", false, true),
            Candidate::new("2", "E", "wechat", "2024-01-03", false, true),
        ];
        AttributionPolicy::default().attribute(&mut candidates).unwrap();
        assert_eq!(candidates[0].source_state, SourceState::NotSource);
        assert_eq!(candidates[1].source_state, SourceState::Source);
    }

    #[test]
    fn policy_is_configurable() {
        let mut candidates = vec![Candidate::new("1", "E", "wechat", "2024-01-01", false, true)];
        AttributionPolicy::new(["wechat"]).attribute(&mut candidates).unwrap();
        assert_eq!(candidates[0].source_state, SourceState::NotSource);
    }

    #[test]
    fn ties_keep_recall_order() {
        let mut candidates = vec![
            weibo("b", "E", "2024-01-01 08:00:00"),
            weibo("a", "E", "2024-01-01 08:00:00"),
        ];
        AttributionPolicy::default().attribute(&mut candidates).unwrap();
        assert!(candidates[0].is_source());
        assert!(!candidates[1].is_source());
    }

    #[test]
    fn at_most_one_source_per_event() {
        let mut candidates = vec![
            weibo("1", "A", "2024-01-03"),
            weibo("2", "B", "2024-01-02"),
            weibo("3", "A", "2024-01-01"),
            Candidate::new("4", "B", "news", "2024-01-01", false, false),
            weibo("5", "A", "2024-01-01"),
            Candidate::new("6", "C", "weibo", "2024-01-01", false, true),
        ];
        let summary = AttributionPolicy::default().attribute(&mut candidates).unwrap();
        assert_eq!(summary.groups, 3);

        for event in ["A", "B", "C"] {
            let sources = candidates
                .iter()
                .filter(|c| c.event_id == event && c.is_source())
                .count();
            assert!(sources <= 1, "event {event} has {sources} sources");
        }
        assert!(candidates[2].is_source());
        assert!(candidates[3].is_source());
        assert!(!candidates.iter().any(|c| c.event_id == "C" && c.is_source()));
    }

    #[test]
    fn attribution_is_deterministic() {
        let fixture = vec![
            weibo("1", "A", "2024-01-03"),
            weibo("2", "A", "2024-01-01"),
            Candidate::new("3", "A", "news", "2024-01-01", false, false),
            weibo("4", "B", "2024-01-05"),
        ];
        let mut first = fixture.clone();
        AttributionPolicy::default().attribute(&mut first).unwrap();
        for _ in 0..10 {
            let mut again = fixture.clone();
            AttributionPolicy::default().attribute(&mut again).unwrap();
            assert_eq!(states(&again), states(&first));
        }
    }

    #[test]
    fn already_attributed_input_is_rejected() {
        let mut candidates = vec![weibo("1", "E", "2024-01-01")];
        let policy = AttributionPolicy::default();
        policy.attribute(&mut candidates).unwrap();
        let err = policy.attribute(&mut candidates).unwrap_err();
        assert_eq!(err.from, SourceState::Source);
        assert_eq!(err.event, SourceEvent::Eligible);
    }

    #[test]
    fn empty_input_is_fine() {
        let summary = AttributionPolicy::default().attribute(&mut []).unwrap();
        assert_eq!(summary, AttributionSummary::default());
    }
}
