use crate::{
    foundation::core::Millis,
    foundation::error::{Fault, MediaKind},
    journal::Journal,
    page::{AudioSink, ElementKey},
    schedule::{Scheduler, TaskHandle},
};

/// Context type that owns an `AudioController`, so fade steps can find it when they fire.
pub trait AudioHost: 'static {
    fn audio(&mut self) -> &mut AudioController;
}

/// Single owner of the ambient audio element.
///
/// Every operation is intention-level and supersedes a fade in flight, so two stages can never
/// interleave volume writes.
pub struct AudioController {
    sink: Option<Box<dyn AudioSink>>,
    steps: u32,
    fade: Vec<TaskHandle>,
    missing_reported: bool,
}

impl AudioController {
    /// `steps` is the number of discrete volume writes per fade (at least one is used).
    pub fn new(sink: Option<Box<dyn AudioSink>>, steps: u32) -> Self {
        Self {
            sink,
            steps: steps.max(1),
            fade: Vec::new(),
            missing_reported: false,
        }
    }

    pub fn is_present(&self) -> bool {
        self.sink.is_some()
    }

    pub fn volume(&self) -> Option<f64> {
        self.sink.as_ref().map(|s| s.volume())
    }

    pub fn is_fading(&self) -> bool {
        self.fade.iter().any(TaskHandle::is_pending)
    }

    /// The sink, or `None` after journaling the absence once.
    fn sink(&mut self, journal: &mut Journal, now: Millis) -> Option<&mut Box<dyn AudioSink>> {
        if self.sink.is_none() && !self.missing_reported {
            self.missing_reported = true;
            journal.fault(
                now,
                Fault::ElementMissing {
                    element: ElementKey::Audio,
                },
            );
        }
        self.sink.as_mut()
    }

    fn cancel_fade(&mut self) {
        for h in self.fade.drain(..) {
            h.cancel();
        }
    }

    fn play(&mut self, journal: &mut Journal, now: Millis) {
        let Some(sink) = self.sink(journal, now) else {
            return;
        };
        if let Err(e) = sink.play() {
            tracing::debug!(error = %e, "audio play rejected");
            journal.fault(
                now,
                Fault::PlaybackDenied {
                    media: MediaKind::Audio,
                },
            );
        }
    }

    /// Prime playback inside a user gesture (play, then pause and rewind).
    pub fn unlock(&mut self, journal: &mut Journal, now: Millis) {
        let Some(sink) = self.sink(journal, now) else {
            return;
        };
        match sink.play() {
            Ok(()) => {
                sink.pause();
                sink.seek_start();
            }
            Err(e) => tracing::debug!(error = %e, "audio unlock rejected"),
        }
    }

    /// Play from the beginning at full volume.
    pub fn start(&mut self, journal: &mut Journal, now: Millis) {
        self.cancel_fade();
        if let Some(sink) = self.sink(journal, now) {
            sink.seek_start();
            sink.set_volume(1.0);
        }
        self.play(journal, now);
    }

    /// Pause immediately, abandoning any fade.
    pub fn stop(&mut self, journal: &mut Journal, now: Millis) {
        self.cancel_fade();
        if let Some(sink) = self.sink(journal, now) {
            sink.pause();
        }
    }

    /// Ramp the volume to `target` over `duration` in equal discrete steps on a fixed interval.
    /// With `pause_at_end` the element is paused after the final step.
    pub fn fade_to<H: AudioHost>(
        &mut self,
        sched: &mut Scheduler<H>,
        target: f64,
        duration: Millis,
        pause_at_end: bool,
        journal: &mut Journal,
        now: Millis,
    ) {
        self.cancel_fade();
        let Some(sink) = self.sink(journal, now) else {
            return;
        };
        let from = sink.volume();
        let target = target.clamp(0.0, 1.0);
        let steps = self.steps;
        let interval = Millis(duration.0 / u64::from(steps));

        for k in 1..=steps {
            let last = k == steps;
            let v = if last {
                target
            } else {
                from + (target - from) * (f64::from(k) / f64::from(steps))
            };
            let handle = sched.enqueue(
                "audio_fade_step",
                interval.times(u64::from(k)),
                move |host: &mut H, _: &mut Scheduler<H>| {
                    host.audio().apply_step(v, last && pause_at_end);
                    Ok(())
                },
            );
            self.fade.push(handle);
        }
    }

    /// Fade to silence, then pause.
    pub fn fade_out<H: AudioHost>(
        &mut self,
        sched: &mut Scheduler<H>,
        duration: Millis,
        journal: &mut Journal,
        now: Millis,
    ) {
        self.fade_to(sched, 0.0, duration, true, journal, now);
    }

    /// Restart from silence and fade up to `volume`.
    pub fn resume_at<H: AudioHost>(
        &mut self,
        sched: &mut Scheduler<H>,
        volume: f64,
        fade_in: Millis,
        journal: &mut Journal,
        now: Millis,
    ) {
        self.cancel_fade();
        if let Some(sink) = self.sink(journal, now) {
            sink.set_volume(0.0);
        }
        self.play(journal, now);
        self.fade_to(sched, volume, fade_in, false, journal, now);
    }

    fn apply_step(&mut self, volume: f64, pause: bool) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        sink.set_volume(volume);
        if pause {
            sink.pause();
        }
        self.fade.retain(TaskHandle::is_pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::memory::MemoryAudio;

    struct Host {
        audio: AudioController,
    }

    impl AudioHost for Host {
        fn audio(&mut self) -> &mut AudioController {
            &mut self.audio
        }
    }

    fn host(sink: Option<MemoryAudio>) -> Host {
        Host {
            audio: AudioController::new(sink.map(|s| Box::new(s) as Box<dyn AudioSink>), 20),
        }
    }

    fn run(sched: &mut Scheduler<Host>, h: &mut Host, until: u64) {
        for t in (0..=until).step_by(10) {
            sched.tick(h, Millis(t));
        }
    }

    #[test]
    fn fade_out_steps_down_and_pauses() {
        let mem = MemoryAudio::new();
        let mut h = host(Some(mem.clone()));
        let mut j = Journal::new();
        let mut s = Scheduler::<Host>::new();

        h.audio.start(&mut j, Millis::ZERO);
        assert!(mem.is_playing());
        h.audio.fade_out(&mut s, Millis(2000), &mut j, Millis::ZERO);
        assert!(h.audio.is_fading());

        run(&mut s, &mut h, 1000);
        assert!((mem.current_volume() - 0.5).abs() < 1e-9);
        assert!(mem.is_playing());

        run(&mut s, &mut h, 2000);
        assert_eq!(mem.current_volume(), 0.0);
        assert!(!mem.is_playing());
        assert!(!h.audio.is_fading());
        // start() writes 1.0, then 20 fade steps.
        assert_eq!(mem.volume_log().len(), 21);
        assert_eq!(j.faults().count(), 0);
    }

    #[test]
    fn start_supersedes_a_fade_in_flight() {
        let mem = MemoryAudio::new();
        let mut h = host(Some(mem.clone()));
        let mut j = Journal::new();
        let mut s = Scheduler::<Host>::new();

        h.audio.fade_out(&mut s, Millis(2000), &mut j, Millis::ZERO);
        run(&mut s, &mut h, 500);
        h.audio.start(&mut j, Millis(500));
        run(&mut s, &mut h, 3000);
        assert_eq!(mem.current_volume(), 1.0);
        assert!(mem.is_playing());
    }

    #[test]
    fn missing_sink_is_reported_once() {
        let mut h = host(None);
        let mut j = Journal::new();
        let mut s = Scheduler::<Host>::new();
        h.audio.start(&mut j, Millis::ZERO);
        h.audio.fade_out(&mut s, Millis(2000), &mut j, Millis(10));
        h.audio.stop(&mut j, Millis(20));
        assert!(s.is_empty());
        assert_eq!(j.count_faults("element_missing"), 1);
    }

    #[test]
    fn denied_play_is_journaled_not_raised() {
        let mem = MemoryAudio::denying();
        let mut h = host(Some(mem.clone()));
        let mut j = Journal::new();
        h.audio.start(&mut j, Millis::ZERO);
        assert!(!mem.is_playing());
        assert_eq!(j.count_faults("playback_denied"), 1);
    }

    #[test]
    fn unlock_plays_pauses_and_rewinds() {
        let mem = MemoryAudio::new();
        let mut h = host(Some(mem.clone()));
        let mut j = Journal::new();
        h.audio.unlock(&mut j, Millis::ZERO);
        assert_eq!(mem.plays(), 1);
        assert_eq!(mem.pauses(), 1);
        assert_eq!(mem.rewinds(), 1);
        assert!(!mem.is_playing());
    }

    #[test]
    fn resume_fades_up_to_reduced_volume() {
        let mem = MemoryAudio::new();
        let mut h = host(Some(mem.clone()));
        let mut j = Journal::new();
        let mut s = Scheduler::<Host>::new();
        h.audio.resume_at(&mut s, 0.3, Millis(1000), &mut j, Millis::ZERO);
        assert!(mem.is_playing());
        assert_eq!(mem.current_volume(), 0.0);
        run(&mut s, &mut h, 1000);
        assert_eq!(mem.current_volume(), 0.3);
        assert!(mem.is_playing());
    }
}
