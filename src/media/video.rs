use crate::{
    foundation::core::Millis,
    foundation::error::{Fault, MediaKind},
    journal::Journal,
    page::{Signal, VideoSink},
    schedule::TaskHandle,
};

/// Owner of the video element's playback and buffering state.
///
/// The director decides *when* to load, retry and force playback; this type tracks which of
/// those is outstanding so late readiness events and stale timers become no-ops.
pub struct VideoController {
    sink: Option<Box<dyn VideoSink>>,
    awaiting_readiness: bool,
    started: bool,
    retries: u32,
    presented_at: Option<Millis>,
    retry: Option<TaskHandle>,
    failsafe: Option<TaskHandle>,
}

impl VideoController {
    pub fn new(sink: Option<Box<dyn VideoSink>>) -> Self {
        Self {
            sink,
            awaiting_readiness: false,
            started: false,
            retries: 0,
            presented_at: None,
            retry: None,
            failsafe: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.sink.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn presented_at(&self) -> Option<Millis> {
        self.presented_at
    }

    pub fn mark_presented(&mut self, now: Millis) {
        self.presented_at.get_or_insert(now);
    }

    /// Reload and wait for a readiness or error signal.
    pub fn load(&mut self, now: Millis) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        sink.load(now);
        self.awaiting_readiness = true;
    }

    /// Consume the pending readiness wait. `false` means no wait was armed and the signal is
    /// stale.
    pub fn take_readiness(&mut self) -> bool {
        std::mem::replace(&mut self.awaiting_readiness, false)
    }

    pub fn has_buffered(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| s.has_buffered())
    }

    /// Count a failed load; returns the total so far.
    pub fn note_error(&mut self) -> u32 {
        self.retries += 1;
        self.retries
    }

    pub fn arm_retry(&mut self, handle: TaskHandle) {
        if let Some(old) = self.retry.replace(handle) {
            old.cancel();
        }
    }

    pub fn arm_failsafe(&mut self, handle: TaskHandle) {
        if let Some(old) = self.failsafe.replace(handle) {
            old.cancel();
        }
    }

    /// Drop every outstanding wait, retry and failsafe.
    pub fn disarm(&mut self) {
        self.awaiting_readiness = false;
        if let Some(h) = self.retry.take() {
            h.cancel();
        }
        if let Some(h) = self.failsafe.take() {
            h.cancel();
        }
    }

    /// Attempt playback. A rejection is journaled; either way the video counts as started.
    pub fn play(&mut self, journal: &mut Journal, now: Millis) {
        self.disarm();
        self.started = true;
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = sink.play(now) {
            tracing::debug!(error = %e, "video play rejected");
            journal.fault(
                now,
                Fault::PlaybackDenied {
                    media: MediaKind::Video,
                },
            );
        }
    }

    pub fn poll_signals(&mut self, now: Millis) -> Vec<Signal> {
        self.sink
            .as_mut()
            .map(|s| s.poll_signals(now))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::memory::{MemoryVideo, VideoScript};
    use crate::schedule::Scheduler;

    #[test]
    fn readiness_is_consumed_once() {
        let mem = MemoryVideo::new(VideoScript::default());
        let mut v = VideoController::new(Some(Box::new(mem.clone())));
        assert!(!v.take_readiness());
        v.load(Millis(0));
        assert_eq!(mem.loads(), 1);
        assert!(v.take_readiness());
        assert!(!v.take_readiness());
    }

    #[test]
    fn play_disarms_pending_timers() {
        let mut sched = Scheduler::<()>::new();
        let retry = sched.enqueue("retry", Millis(1000), |_: &mut (), _: &mut Scheduler<()>| Ok(()));
        let failsafe =
            sched.enqueue("failsafe", Millis(3000), |_: &mut (), _: &mut Scheduler<()>| Ok(()));

        let mem = MemoryVideo::new(VideoScript::default());
        let mut v = VideoController::new(Some(Box::new(mem.clone())));
        v.arm_retry(retry.clone());
        v.arm_failsafe(failsafe.clone());

        let mut j = Journal::new();
        v.play(&mut j, Millis(40));
        assert!(v.is_started());
        assert!(retry.is_cancelled());
        assert!(failsafe.is_cancelled());
        assert_eq!(mem.play_calls(), vec![Millis(40)]);
        assert!(sched.is_empty());
    }

    #[test]
    fn denied_play_is_journaled() {
        let mem = MemoryVideo::new(VideoScript {
            deny_play: true,
            ..VideoScript::default()
        });
        let mut v = VideoController::new(Some(Box::new(mem)));
        let mut j = Journal::new();
        v.play(&mut j, Millis(0));
        assert!(v.is_started());
        assert_eq!(j.count_faults("playback_denied"), 1);
    }

    #[test]
    fn absent_sink_is_inert() {
        let mut v = VideoController::new(None);
        assert!(!v.is_present());
        v.load(Millis(0));
        assert!(!v.take_readiness());
        assert!(v.poll_signals(Millis(10)).is_empty());
        assert!(!v.has_buffered());
    }
}
