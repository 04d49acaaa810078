use crate::{
    config::{Ending, ShowConfig},
    foundation::core::Millis,
    foundation::error::{CurtainError, CurtainResult, Fault},
    journal::Journal,
    media::{AudioController, AudioHost, VideoController},
    page::{AudioSink, ElementKey, Group, Page, Signal, VideoSink, class},
    schedule::Scheduler,
    stage::Stage,
};

type Sched = Scheduler<Director>;

/// Result of a begin gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Started,
    /// The sequence was already begun; nothing happened.
    Ignored,
}

pub struct Director {
    config: ShowConfig,
    page: Box<dyn Page>,
    audio: AudioController,
    video: VideoController,
    stage: Stage,
    journal: Journal,
}

impl AudioHost for Director {
    fn audio(&mut self) -> &mut AudioController {
        &mut self.audio
    }
}

impl Director {
    pub fn new(
        config: ShowConfig,
        page: Box<dyn Page>,
        audio: Option<Box<dyn AudioSink>>,
        video: Option<Box<dyn VideoSink>>,
    ) -> CurtainResult<Self> {
        config.validate()?;
        let steps = config.audio_fade_steps;
        Ok(Self {
            config,
            page,
            audio: AudioController::new(audio, steps),
            video: VideoController::new(video),
            stage: Stage::Idle,
            journal: Journal::new(),
        })
    }

    pub fn config(&self) -> &ShowConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    pub fn audio_controller(&self) -> &AudioController {
        &self.audio
    }

    pub fn video(&self) -> &VideoController {
        &self.video
    }

    fn enter(&mut self, to: Stage, now: Millis) -> CurtainResult<()> {
        self.stage.check_transition(to)?;
        self.journal.transition(now, self.stage, to);
        self.stage = to;
        Ok(())
    }

    /// `true` when the page has `key`; otherwise journal the absence.
    fn present(&mut self, key: ElementKey, now: Millis) -> bool {
        if self.page.contains(key) {
            return true;
        }
        self.journal
            .fault(now, Fault::ElementMissing { element: key });
        false
    }

    /// Collect pending external events.
    pub fn poll(&mut self, now: Millis) -> Vec<Signal> {
        let mut out = self.page.poll_signals(now);
        out.extend(self.video.poll_signals(now));
        out
    }

    /// Handle the begin gesture. Only the first call has any effect.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn begin(&mut self, sched: &mut Sched) -> CurtainResult<Activation> {
        if self.stage != Stage::Idle {
            tracing::debug!(stage = ?self.stage, "begin ignored");
            return Ok(Activation::Ignored);
        }
        let now = sched.now();
        self.enter(Stage::ButtonFading, now)?;

        if self.present(ElementKey::PlayButton, now) {
            self.page.set_disabled(ElementKey::PlayButton, true)?;
            self.page.add_class(ElementKey::PlayButton, class::FADE_OUT)?;
            sched.enqueue(
                "retire_button",
                self.config.button_fade,
                |d: &mut Director, _: &mut Sched| d.page.set_display(ElementKey::PlayButton, false),
            );
        }

        if self.config.ios_audio_unlock {
            self.audio.unlock(&mut self.journal, now);
        }
        sched.enqueue(
            "start_audio",
            Millis::ZERO,
            |d: &mut Director, s: &mut Sched| {
                d.audio.start(&mut d.journal, s.now());
                Ok(())
            },
        );

        self.enter(Stage::IntroShowing, now)?;
        if self.present(ElementKey::IntroText, now) {
            self.page.set_aria_hidden(ElementKey::IntroText, false)?;
            self.page.add_class(ElementKey::IntroText, class::SHOW)?;
        }
        sched.enqueue(
            "fade_intro",
            self.config.intro_visible,
            |d: &mut Director, s: &mut Sched| d.fade_intro(s),
        );
        Ok(Activation::Started)
    }

    /// Route an external event to the stage waiting for it; events no stage waits for are
    /// dropped.
    #[tracing::instrument(level = "debug", skip(self, sched))]
    pub fn dispatch(&mut self, signal: Signal, sched: &mut Sched) -> CurtainResult<()> {
        match signal {
            Signal::AnimationFinished(ElementKey::Logo) => self.logo_finished(sched),
            Signal::AnimationFinished(_) => Ok(()),
            Signal::VideoCanPlay => self.video_can_play(sched),
            Signal::VideoError => self.video_error(sched),
            Signal::VideoEnded => self.video_ended(sched),
        }
    }

    fn fade_intro(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        let now = sched.now();
        self.enter(Stage::IntroFading, now)?;
        if self.page.contains(ElementKey::IntroText) {
            self.page.remove_class(ElementKey::IntroText, class::SHOW)?;
            self.page.add_class(ElementKey::IntroText, class::FADE)?;
        }
        sched.enqueue(
            "remove_intro",
            self.config.intro_fade,
            |d: &mut Director, s: &mut Sched| d.animate_logo(s),
        );
        Ok(())
    }

    fn animate_logo(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        let now = sched.now();
        if self.page.contains(ElementKey::IntroText) {
            self.page.set_display(ElementKey::IntroText, false)?;
            self.page.set_aria_hidden(ElementKey::IntroText, true)?;
        }

        self.enter(Stage::LogoAnimating, now)?;
        if self.present(ElementKey::Logo, now) {
            self.page
                .animate(ElementKey::Logo, &self.config.logo_animation, now)?;
        } else {
            // Nothing will report completion; continue as if the entrance finished.
            sched.enqueue(
                "logo_skipped",
                Millis::ZERO,
                |d: &mut Director, s: &mut Sched| d.logo_finished(s),
            );
        }
        Ok(())
    }

    fn logo_finished(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        if self.stage != Stage::LogoAnimating {
            return Ok(());
        }
        let now = sched.now();
        self.enter(Stage::AudioFadingOut, now)?;
        self.audio
            .fade_out(sched, self.config.audio_fade, &mut self.journal, now);
        sched.enqueue(
            "present_video",
            self.config.video_delay,
            |d: &mut Director, s: &mut Sched| d.present_video(s),
        );
        Ok(())
    }

    fn present_video(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        let now = sched.now();
        self.enter(Stage::VideoBuffering, now)?;

        if !self.video.is_present() || !self.page.contains(ElementKey::Video) {
            self.journal.fault(
                now,
                Fault::ElementMissing {
                    element: ElementKey::Video,
                },
            );
            sched.enqueue(
                "video_skipped",
                Millis::ZERO,
                |d: &mut Director, s: &mut Sched| d.video_ended(s),
            );
            return Ok(());
        }

        self.page.add_class(ElementKey::Video, class::FULLSCREEN)?;
        self.video.mark_presented(now);
        if !self.config.video_buffering {
            return self.start_video(now);
        }

        self.video.load(now);
        let failsafe = sched.enqueue(
            "video_failsafe",
            self.config.video_failsafe,
            |d: &mut Director, s: &mut Sched| d.video_failsafe(s),
        );
        self.video.arm_failsafe(failsafe);
        Ok(())
    }

    fn start_video(&mut self, now: Millis) -> CurtainResult<()> {
        self.video.play(&mut self.journal, now);
        if self.stage < Stage::VideoPlaying {
            self.enter(Stage::VideoPlaying, now)?;
        }
        Ok(())
    }

    fn video_can_play(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        if !self.video.take_readiness() {
            return Ok(());
        }
        if !self.video.has_buffered() {
            tracing::debug!("video ready without buffered data; waiting for failsafe");
            return Ok(());
        }
        self.start_video(sched.now())
    }

    fn video_error(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        if !self.video.take_readiness() {
            return Ok(());
        }
        let attempts = self.video.note_error();
        if let Some(max) = self.config.video_max_retries
            && attempts > max
        {
            tracing::debug!(attempts, "video retry budget spent; waiting for failsafe");
            return Ok(());
        }
        let retry = sched.enqueue(
            "video_retry",
            self.config.video_retry,
            |d: &mut Director, s: &mut Sched| {
                if !d.video.is_started() {
                    d.video.load(s.now());
                }
                Ok(())
            },
        );
        self.video.arm_retry(retry);
        Ok(())
    }

    fn video_failsafe(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        if self.video.is_started() {
            return Ok(());
        }
        let now = sched.now();
        self.journal.fault(
            now,
            Fault::ReadinessTimeout {
                after: self.config.video_failsafe,
            },
        );
        self.start_video(now)
    }

    fn video_ended(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        if !matches!(self.stage, Stage::VideoBuffering | Stage::VideoPlaying) {
            return Ok(());
        }
        let now = sched.now();
        self.video.disarm();
        if self.page.contains(ElementKey::Video) {
            self.page.remove_class(ElementKey::Video, class::FULLSCREEN)?;
        }
        match self.config.ending {
            Ending::ScrollReveal => self.reveal(sched, now),
            Ending::EndSequence => self.end_sequence(sched, now),
        }
    }

    fn reveal(&mut self, sched: &mut Sched, now: Millis) -> CurtainResult<()> {
        self.enter(Stage::Revealing, now)?;
        if self.present(ElementKey::ScrollArrow, now) {
            sched.enqueue(
                "show_scroll_arrow",
                self.config.reveal.arrow_delay,
                |d: &mut Director, _: &mut Sched| {
                    d.page.add_class(ElementKey::ScrollArrow, class::SHOW)
                },
            );
        }
        sched.enqueue(
            "scroll_to_details",
            self.config.reveal.scroll_delay,
            |d: &mut Director, s: &mut Sched| d.reveal_details(s),
        );
        Ok(())
    }

    fn reveal_details(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        let now = sched.now();
        if self.present(ElementKey::Details, now) {
            self.page.set_aria_hidden(ElementKey::Details, false)?;
            self.page
                .scroll_to(ElementKey::Details, self.config.reveal.scroll_offset_px)?;
        }
        // The cascade runs even without the details section; only the scroll is skipped.
        sched.enqueue(
            "cascade",
            self.config.reveal.cascade_delay,
            |d: &mut Director, s: &mut Sched| d.cascade(s),
        );
        Ok(())
    }

    fn cascade(&mut self, sched: &mut Sched) -> CurtainResult<()> {
        let now = sched.now();
        let t = self.config.reveal.clone();
        let mut last = Millis::ZERO;

        for i in 0..self.page.count(Group::DetailItems) {
            let delay = t.detail_stagger.times(i as u64);
            last = last.max(delay);
            sched.enqueue(
                format!("reveal_detail_item[{i}]"),
                delay,
                move |d: &mut Director, _: &mut Sched| {
                    d.page.add_class(Group::DetailItems.key(i), class::VISIBLE)
                },
            );
        }

        if self.present(ElementKey::CardCollection, now) {
            self.page
                .set_aria_hidden(ElementKey::CardCollection, false)?;
            for i in 0..self.page.count(Group::Cards) {
                let delay = t.card_offset + t.card_stagger.times(i as u64);
                last = last.max(delay);
                sched.enqueue(
                    format!("reveal_card[{i}]"),
                    delay,
                    move |d: &mut Director, _: &mut Sched| {
                        d.page.add_class(Group::Cards.key(i), class::VISIBLE)
                    },
                );
            }
        }

        // Same deadline as the last reveal but enqueued after it, so it runs after it.
        sched.enqueue("reveal_done", last, |d: &mut Director, s: &mut Sched| {
            d.enter(Stage::Done, s.now())
        });
        Ok(())
    }

    fn end_sequence(&mut self, sched: &mut Sched, now: Millis) -> CurtainResult<()> {
        self.enter(Stage::EndSequence, now)?;
        let t = self.config.end_sequence.clone();

        if self.present(ElementKey::MainContent, now) {
            self.page.set_display(ElementKey::MainContent, false)?;
        }
        if self.present(ElementKey::EndBackdrop, now) {
            self.page.add_class(ElementKey::EndBackdrop, class::SHOW)?;
        }

        // Every step is offset from the video's end, not chained on the previous one.
        if self.present(ElementKey::EndImage, now) {
            show_at(sched, ElementKey::EndImage, t.image_in);
            fade_at(sched, ElementKey::EndImage, t.image_out);
        }
        if self.present(ElementKey::EndText, now) {
            show_at(sched, ElementKey::EndText, t.text_in);
            fade_at(sched, ElementKey::EndText, t.text_out);
        }
        let grid = self.present(ElementKey::LogoGrid, now);
        let (volume, fade_in) = (t.music_volume, t.music_fade_in);
        sched.enqueue("show_logo_grid", t.logos, move |d: &mut Director, s: &mut Sched| {
            let now = s.now();
            if grid {
                d.page.add_class(ElementKey::LogoGrid, class::SHOW)?;
            }
            d.audio.resume_at(s, volume, fade_in, &mut d.journal, now);
            Ok(())
        });
        sched.enqueue("end_done", t.logos, |d: &mut Director, s: &mut Sched| {
            d.enter(Stage::Done, s.now())
        });
        Ok(())
    }
}

fn show_at(sched: &mut Sched, key: ElementKey, at: Millis) {
    sched.enqueue(
        format!("show_{key}"),
        at,
        move |d: &mut Director, _: &mut Sched| d.page.add_class(key, class::SHOW),
    );
}

fn fade_at(sched: &mut Sched, key: ElementKey, at: Millis) {
    sched.enqueue(
        format!("fade_{key}"),
        at,
        move |d: &mut Director, _: &mut Sched| {
            d.page.remove_class(key, class::SHOW)?;
            d.page.add_class(key, class::FADE)
        },
    );
}

impl std::fmt::Debug for Director {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Director")
            .field("stage", &self.stage)
            .field("ending", &self.config.ending)
            .field("entries", &self.journal.entries().len())
            .finish_non_exhaustive()
    }
}

/// Classify an error that escaped a stage action. A target that vanished mid-run degrades the
/// same way as one absent from the start.
pub(crate) fn fault_for(task: &str, error: &CurtainError) -> Fault {
    match error {
        CurtainError::Element(element) => Fault::ElementMissing { element: *element },
        other => Fault::ActionFailed {
            task: task.to_owned(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::memory::{MemoryAudio, MemoryPage, MemoryVideo, VideoScript};

    fn director(page: MemoryPage) -> Director {
        Director::new(
            ShowConfig::default(),
            Box::new(page),
            Some(Box::new(MemoryAudio::new())),
            Some(Box::new(MemoryVideo::new(VideoScript::default()))),
        )
        .unwrap()
    }

    #[test]
    fn begin_is_at_most_once() {
        let page = MemoryPage::standard(2, 2);
        let mut d = director(page.clone());
        let mut s = Sched::new();

        assert_eq!(d.begin(&mut s).unwrap(), Activation::Started);
        let pending = s.len();
        let history = page.history().len();
        assert_eq!(d.begin(&mut s).unwrap(), Activation::Ignored);
        assert_eq!(s.len(), pending);
        assert_eq!(page.history().len(), history);
        assert_eq!(d.stage(), Stage::IntroShowing);
    }

    #[test]
    fn begin_retires_button_and_shows_intro() {
        let page = MemoryPage::standard(0, 0);
        let mut d = director(page.clone());
        let mut s = Sched::new();
        d.begin(&mut s).unwrap();

        let button = page.element(ElementKey::PlayButton).unwrap();
        assert!(button.disabled);
        assert!(button.classes.contains(class::FADE_OUT));
        assert!(button.displayed);
        let intro = page.element(ElementKey::IntroText).unwrap();
        assert!(!intro.aria_hidden);
        assert!(intro.classes.contains(class::SHOW));

        s.tick(&mut d, Millis(440));
        assert!(!page.element(ElementKey::PlayButton).unwrap().displayed);
    }

    #[test]
    fn stray_signals_before_their_stage_are_ignored() {
        let mut d = director(MemoryPage::standard(0, 0));
        let mut s = Sched::new();
        d.dispatch(Signal::VideoEnded, &mut s).unwrap();
        d.dispatch(Signal::AnimationFinished(ElementKey::Logo), &mut s)
            .unwrap();
        d.dispatch(Signal::VideoCanPlay, &mut s).unwrap();
        assert_eq!(d.stage(), Stage::Idle);
        assert!(s.is_empty());
    }

    #[test]
    fn missing_button_is_journaled() {
        let page = MemoryPage::standard(0, 0).without(ElementKey::PlayButton);
        let mut d = director(page);
        let mut s = Sched::new();
        assert_eq!(d.begin(&mut s).unwrap(), Activation::Started);
        assert_eq!(d.journal().count_faults("element_missing"), 1);
    }

    #[test]
    fn escaped_errors_are_classified() {
        assert_eq!(
            fault_for("x", &CurtainError::element(ElementKey::Card(1))),
            Fault::ElementMissing {
                element: ElementKey::Card(1)
            }
        );
        let f = fault_for("reveal_card[1]", &CurtainError::media("gone"));
        assert_eq!(f.kind(), "action_failed");
        assert!(matches!(f, Fault::ActionFailed { task, .. } if task == "reveal_card[1]"));
    }
}
