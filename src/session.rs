use crate::{
    director::{Activation, Director, fault_for},
    foundation::clock::{Clock, ManualClock},
    foundation::core::{FrameInterval, Millis},
    foundation::error::CurtainError,
    journal::Journal,
    page::Signal,
    schedule::{Scheduler, TickReport},
    stage::Stage,
};

/// Frame loop around a `Director`. Each frame delivers signals first, then runs the scheduler.
pub struct Runtime<K: Clock = ManualClock> {
    clock: K,
    frame: FrameInterval,
    scheduler: Scheduler<Director>,
    director: Director,
    frames: u64,
}

impl<K: Clock> Runtime<K> {
    pub fn new(director: Director, clock: K) -> Self {
        let frame = director.config().frame_interval;
        let mut scheduler = Scheduler::new();
        scheduler.sync(clock.now());
        Self {
            clock,
            frame,
            scheduler,
            director,
            frames: 0,
        }
    }

    pub fn director(&self) -> &Director {
        &self.director
    }

    pub fn journal(&self) -> &Journal {
        self.director.journal()
    }

    pub fn stage(&self) -> Stage {
        self.director.stage()
    }

    pub fn is_done(&self) -> bool {
        self.director.stage().is_terminal()
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    pub fn frame_interval(&self) -> FrameInterval {
        self.frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whether scheduled work is still pending.
    pub fn has_pending_work(&self) -> bool {
        self.scheduler.needs_frame()
    }

    /// Deliver the begin gesture.
    pub fn begin(&mut self) -> Activation {
        let now = self.clock.now();
        self.scheduler.sync(now);
        match self.director.begin(&mut self.scheduler) {
            Ok(activation) => activation,
            Err(e) => {
                self.record_escape("begin", &e, now);
                Activation::Started
            }
        }
    }

    /// Deliver an external signal immediately.
    pub fn signal(&mut self, signal: Signal) {
        let now = self.clock.now();
        self.scheduler.sync(now);
        if let Err(e) = self.director.dispatch(signal, &mut self.scheduler) {
            self.record_escape("dispatch", &e, now);
        }
    }

    /// Run one frame at the clock's current time.
    pub fn frame(&mut self) -> TickReport {
        let now = self.clock.now();
        self.scheduler.sync(now);
        for signal in self.director.poll(now) {
            tracing::debug!(%now, ?signal, "signal");
            if let Err(e) = self.director.dispatch(signal, &mut self.scheduler) {
                self.record_escape("dispatch", &e, now);
            }
        }

        let report = self.scheduler.tick(&mut self.director, now);
        for failure in &report.failures {
            let fault = fault_for(&failure.label, &failure.error);
            self.director.journal_mut().fault(now, fault);
        }
        self.frames += 1;
        report
    }

    fn record_escape(&mut self, task: &str, error: &CurtainError, now: Millis) {
        tracing::warn!(task, %error, "stage action failed");
        let fault = fault_for(task, error);
        self.director.journal_mut().fault(now, fault);
    }
}

impl Runtime<ManualClock> {
    /// Advance virtual time by `span`, running one frame per frame interval.
    pub fn run_for(&mut self, span: Millis) {
        let target = self.clock.now().after(span);
        while self.clock.now() < target {
            let step = self.frame.span().min(target.elapsed_since(self.clock.now()));
            self.clock.advance(step);
            self.frame();
        }
    }

    /// Run frames until the sequence reaches `Done` or `limit` elapses. Returns whether it
    /// finished.
    pub fn run_until_done(&mut self, limit: Millis) -> bool {
        let deadline = self.clock.now().after(limit);
        while !self.is_done() && self.clock.now() < deadline {
            self.run_for(self.frame.span());
        }
        self.is_done()
    }
}
