use crate::forecast::ForecastError;
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Number of states in the traffic alphabet.
pub const STATE_COUNT: usize = 4;

/// Closed traffic-state alphabet. Historical records encode these as the
/// numeric codes 0-3; both forms are accepted at the ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficState {
    Free,
    Dense,
    Congested,
    Closed,
}

impl TrafficState {
    pub const ALL: [TrafficState; STATE_COUNT] = [
        TrafficState::Free,
        TrafficState::Dense,
        TrafficState::Congested,
        TrafficState::Closed,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "free" | "0" => Some(TrafficState::Free),
            "dense" | "1" => Some(TrafficState::Dense),
            "congested" | "2" => Some(TrafficState::Congested),
            "closed" | "3" => Some(TrafficState::Closed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrafficState::Free => "free",
            TrafficState::Dense => "dense",
            TrafficState::Congested => "congested",
            TrafficState::Closed => "closed",
        }
    }

    /// The prediction target: the segment is considered congested only in
    /// this state, not when closed.
    pub fn is_congested(self) -> bool {
        matches!(self, TrafficState::Congested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: OffsetDateTime,
    pub state: TrafficState,
}

/// Ordered, deduplicated history of traffic-state observations.
///
/// Built once per history load and immutable afterwards. Timestamps are
/// strictly increasing; the sampling interval is inferred as the most common
/// gap between consecutive observations and defines one time-step for the
/// transition estimator.
#[derive(Debug, Clone)]
pub struct StateSeries {
    observations: Vec<Observation>,
    step: Option<Duration>,
}

impl StateSeries {
    /// Validates, orders and deduplicates raw `(timestamp, label)` records.
    ///
    /// Unknown labels fail with the offending value and its row index in the
    /// original input. Duplicate timestamps keep the first occurrence; two
    /// different states recorded for the identical timestamp are ambiguous
    /// and rejected.
    pub fn build<S: AsRef<str>>(
        records: &[(OffsetDateTime, S)],
    ) -> Result<StateSeries, ForecastError> {
        let mut entries = Vec::with_capacity(records.len());
        for (row, (timestamp, label)) in records.iter().enumerate() {
            let label = label.as_ref();
            let state = TrafficState::from_label(label).ok_or_else(|| {
                ForecastError::InvalidData {
                    row,
                    reason: format!("unknown state label {label:?}"),
                }
            })?;
            entries.push((row, *timestamp, state));
        }

        // Stable by original order, so the first record wins on duplicates.
        entries.sort_by_key(|(_, timestamp, _)| *timestamp);

        let mut observations: Vec<Observation> = Vec::with_capacity(entries.len());
        for (row, timestamp, state) in entries {
            match observations.last() {
                Some(previous) if previous.timestamp == timestamp => {
                    if previous.state != state {
                        return Err(ForecastError::InvalidData {
                            row,
                            reason: format!(
                                "conflicting states {:?} and {:?} at identical timestamp {timestamp}",
                                previous.state.label(),
                                state.label()
                            ),
                        });
                    }
                }
                _ => observations.push(Observation { timestamp, state }),
            }
        }

        let step = infer_step(&observations);
        Ok(StateSeries { observations, step })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Inferred sampling interval; None for series shorter than two
    /// observations.
    pub fn step(&self) -> Option<Duration> {
        self.step
    }

    pub fn last_state(&self) -> Option<TrafficState> {
        self.observations.last().map(|o| o.state)
    }

    /// Iterates over consecutive observation pairs in timestamp order.
    pub fn pairs(&self) -> impl Iterator<Item = (&Observation, &Observation)> {
        self.observations.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// First `count` observations as a series sharing the inferred step.
    ///
    /// The step is a property of the recording cadence, so the prefix keeps
    /// the full series' inference.
    pub(crate) fn prefix(&self, count: usize) -> StateSeries {
        StateSeries {
            observations: self.observations[..count.min(self.observations.len())].to_vec(),
            step: self.step,
        }
    }
}

fn infer_step(observations: &[Observation]) -> Option<Duration> {
    let mut gap_counts: HashMap<i64, usize> = HashMap::new();
    for window in observations.windows(2) {
        let gap_ms = (window[1].timestamp - window[0].timestamp).whole_milliseconds() as i64;
        if gap_ms > 0 {
            *gap_counts.entry(gap_ms).or_insert(0) += 1;
        }
    }

    // Mode of the gaps; ties resolve toward the smaller gap so a run of
    // denser sampling never inflates the step.
    gap_counts
        .into_iter()
        .max_by(|(gap_a, count_a), (gap_b, count_b)| {
            count_a.cmp(count_b).then(gap_b.cmp(gap_a))
        })
        .map(|(gap_ms, _)| Duration::from_millis(gap_ms as u64))
}
