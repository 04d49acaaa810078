use crate::{foundation::core::Millis, foundation::error::Fault, stage::Stage};

/// One observable event of a run.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    Transition { at: Millis, from: Stage, to: Stage },
    Fault { at: Millis, fault: Fault },
}

impl JournalEntry {
    pub fn at(&self) -> Millis {
        match self {
            Self::Transition { at, .. } | Self::Fault { at, .. } => *at,
        }
    }
}

/// Ordered record of stage transitions and absorbed faults.
///
/// Every entry is mirrored to `tracing`, so the journal doubles as the observability hook.
#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(transparent)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition(&mut self, at: Millis, from: Stage, to: Stage) {
        tracing::info!(%at, ?from, ?to, "stage transition");
        self.entries.push(JournalEntry::Transition { at, from, to });
    }

    pub fn fault(&mut self, at: Millis, fault: Fault) {
        tracing::warn!(%at, kind = fault.kind(), ?fault, "fault absorbed");
        self.entries.push(JournalEntry::Fault { at, fault });
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn faults(&self) -> impl Iterator<Item = &Fault> {
        self.entries.iter().filter_map(|e| match e {
            JournalEntry::Fault { fault, .. } => Some(fault),
            JournalEntry::Transition { .. } => None,
        })
    }

    pub fn count_faults(&self, kind: &str) -> usize {
        self.faults().filter(|f| f.kind() == kind).count()
    }

    /// Stages entered, in order (not including the initial `Idle`).
    pub fn stages(&self) -> Vec<Stage> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                JournalEntry::Transition { to, .. } => Some(*to),
                JournalEntry::Fault { .. } => None,
            })
            .collect()
    }

    /// When `stage` was entered, if it was.
    pub fn entered_at(&self, stage: Stage) -> Option<Millis> {
        self.entries.iter().find_map(|e| match e {
            JournalEntry::Transition { at, to, .. } if *to == stage => Some(*at),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::MediaKind;

    #[test]
    fn queries_filter_by_entry_kind() {
        let mut j = Journal::new();
        j.transition(Millis(0), Stage::Idle, Stage::ButtonFading);
        j.fault(
            Millis(16),
            Fault::PlaybackDenied {
                media: MediaKind::Audio,
            },
        );
        j.transition(Millis(16), Stage::ButtonFading, Stage::IntroShowing);

        assert_eq!(j.stages(), vec![Stage::ButtonFading, Stage::IntroShowing]);
        assert_eq!(j.count_faults("playback_denied"), 1);
        assert_eq!(j.entered_at(Stage::IntroShowing), Some(Millis(16)));
        assert_eq!(j.entered_at(Stage::Done), None);
        assert_eq!(j.entries()[1].at(), Millis(16));
    }

    #[test]
    fn serializes_as_tagged_list() {
        let mut j = Journal::new();
        j.transition(Millis(5), Stage::Idle, Stage::ButtonFading);
        let v = serde_json::to_value(&j).unwrap();
        assert_eq!(v[0]["event"], "transition");
        assert_eq!(v[0]["to"], "button_fading");
        assert_eq!(v[0]["at"], 5);
    }
}
