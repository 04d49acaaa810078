//! In-process page and media elements. Clones share state.

use crate::{
    anim::{KeyframeAnimation, Pose},
    foundation::core::Millis,
    foundation::error::{CurtainError, CurtainResult},
    page::{AudioSink, ElementKey, Group, Page, Signal, VideoSink},
};
use std::{cell::RefCell, collections::{BTreeMap, BTreeSet}, rc::Rc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementState {
    pub classes: BTreeSet<String>,
    pub displayed: bool,
    pub aria_hidden: bool,
    pub disabled: bool,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            classes: BTreeSet::new(),
            displayed: true,
            aria_hidden: false,
            disabled: false,
        }
    }
}

/// One recorded mutation.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOp {
    AddClass(String),
    RemoveClass(String),
    Display(bool),
    AriaHidden(bool),
    Disabled(bool),
    Animate,
    ScrollTo(f64),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PageEvent {
    pub at: Millis,
    pub key: ElementKey,
    pub op: PageOp,
}

#[derive(Clone, Debug)]
struct RunningAnimation {
    key: ElementKey,
    anim: KeyframeAnimation,
    started: Millis,
    reported: bool,
}

#[derive(Debug, Default)]
struct PageState {
    elements: BTreeMap<ElementKey, ElementState>,
    animations: Vec<RunningAnimation>,
    finished: BTreeMap<ElementKey, usize>,
    history: Vec<PageEvent>,
    now: Millis,
}

impl PageState {
    fn element_mut(&mut self, key: ElementKey) -> CurtainResult<&mut ElementState> {
        self.elements
            .get_mut(&key)
            .ok_or(CurtainError::element(key))
    }

    fn record(&mut self, key: ElementKey, op: PageOp) {
        let at = self.now;
        self.history.push(PageEvent { at, key, op });
    }
}

/// In-memory page whose targets are plain state records.
#[derive(Clone, Debug, Default)]
pub struct MemoryPage {
    inner: Rc<RefCell<PageState>>,
}

impl MemoryPage {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A page carrying every target, with `details` detail items and `cards` cards.
    pub fn standard(details: usize, cards: usize) -> Self {
        let page = Self::empty();
        for key in [
            ElementKey::PlayButton,
            ElementKey::IntroText,
            ElementKey::Logo,
            ElementKey::Video,
            ElementKey::ScrollArrow,
            ElementKey::Details,
            ElementKey::CardCollection,
            ElementKey::MainContent,
            ElementKey::EndBackdrop,
            ElementKey::EndImage,
            ElementKey::EndText,
            ElementKey::LogoGrid,
        ] {
            page.insert(key);
        }
        for i in 0..details {
            page.insert(ElementKey::DetailItem(i));
        }
        for i in 0..cards {
            page.insert(ElementKey::Card(i));
        }
        for key in [
            ElementKey::IntroText,
            ElementKey::Details,
            ElementKey::CardCollection,
        ] {
            if let Some(el) = page.inner.borrow_mut().elements.get_mut(&key) {
                el.aria_hidden = true;
            }
        }
        page
    }

    pub fn insert(&self, key: ElementKey) {
        self.inner
            .borrow_mut()
            .elements
            .entry(key)
            .or_default();
    }

    /// Builder-style removal, for pages lacking optional targets.
    pub fn without(self, key: ElementKey) -> Self {
        self.remove(key);
        self
    }

    /// Remove a target from the live page.
    pub fn remove(&self, key: ElementKey) {
        self.inner.borrow_mut().elements.remove(&key);
    }

    pub fn element(&self, key: ElementKey) -> Option<ElementState> {
        self.inner.borrow().elements.get(&key).cloned()
    }

    pub fn has_class(&self, key: ElementKey, class: &str) -> bool {
        self.inner
            .borrow()
            .elements
            .get(&key)
            .is_some_and(|el| el.classes.contains(class))
    }

    /// First time `class` was added to `key`.
    pub fn class_added_at(&self, key: ElementKey, class: &str) -> Option<Millis> {
        self.inner
            .borrow()
            .history
            .iter()
            .find(|e| e.key == key && matches!(&e.op, PageOp::AddClass(c) if c == class))
            .map(|e| e.at)
    }

    pub fn history(&self) -> Vec<PageEvent> {
        self.inner.borrow().history.clone()
    }

    pub fn scroll_target(&self) -> Option<(ElementKey, f64)> {
        self.inner
            .borrow()
            .history
            .iter()
            .rev()
            .find_map(|e| match e.op {
                PageOp::ScrollTo(off) => Some((e.key, off)),
                _ => None,
            })
    }

    pub fn animations_started(&self, key: ElementKey) -> usize {
        self.inner
            .borrow()
            .history
            .iter()
            .filter(|e| e.key == key && e.op == PageOp::Animate)
            .count()
    }

    /// How many times an animation on `key` reached its end.
    pub fn finished_count(&self, key: ElementKey) -> usize {
        self.inner
            .borrow()
            .finished
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    /// Current pose of the latest animation on `key`, at time `now`.
    pub fn pose_at(&self, key: ElementKey, now: Millis) -> Option<Pose> {
        let st = self.inner.borrow();
        let run = st.animations.iter().rev().find(|a| a.key == key)?;
        Some(run.anim.sample(now.elapsed_since(run.started)))
    }
}

impl Page for MemoryPage {
    fn contains(&self, key: ElementKey) -> bool {
        self.inner.borrow().elements.contains_key(&key)
    }

    fn count(&self, group: Group) -> usize {
        let st = self.inner.borrow();
        (0..)
            .take_while(|&i| st.elements.contains_key(&group.key(i)))
            .count()
    }

    fn add_class(&mut self, key: ElementKey, class: &str) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.element_mut(key)?.classes.insert(class.to_owned());
        st.record(key, PageOp::AddClass(class.to_owned()));
        Ok(())
    }

    fn remove_class(&mut self, key: ElementKey, class: &str) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.element_mut(key)?.classes.remove(class);
        st.record(key, PageOp::RemoveClass(class.to_owned()));
        Ok(())
    }

    fn set_display(&mut self, key: ElementKey, shown: bool) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.element_mut(key)?.displayed = shown;
        st.record(key, PageOp::Display(shown));
        Ok(())
    }

    fn set_aria_hidden(&mut self, key: ElementKey, hidden: bool) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.element_mut(key)?.aria_hidden = hidden;
        st.record(key, PageOp::AriaHidden(hidden));
        Ok(())
    }

    fn set_disabled(&mut self, key: ElementKey, disabled: bool) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.element_mut(key)?.disabled = disabled;
        st.record(key, PageOp::Disabled(disabled));
        Ok(())
    }

    fn animate(
        &mut self,
        key: ElementKey,
        anim: &KeyframeAnimation,
        now: Millis,
    ) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.element_mut(key)?;
        st.now = st.now.max(now);
        st.animations.push(RunningAnimation {
            key,
            anim: anim.clone(),
            started: now,
            reported: false,
        });
        st.record(key, PageOp::Animate);
        Ok(())
    }

    fn scroll_to(&mut self, key: ElementKey, offset_px: f64) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.element_mut(key)?;
        st.record(key, PageOp::ScrollTo(offset_px));
        Ok(())
    }

    fn poll_signals(&mut self, now: Millis) -> Vec<Signal> {
        let mut st = self.inner.borrow_mut();
        st.now = st.now.max(now);
        let mut done = Vec::new();
        for run in st.animations.iter_mut().filter(|a| !a.reported) {
            if run.anim.is_finished(now.elapsed_since(run.started)) {
                run.reported = true;
                done.push(run.key);
            }
        }
        for key in &done {
            *st.finished.entry(*key).or_insert(0) += 1;
        }
        done.into_iter().map(Signal::AnimationFinished).collect()
    }
}

#[derive(Debug)]
struct AudioState {
    playing: bool,
    volume: f64,
    deny_play: bool,
    plays: u32,
    denied: u32,
    pauses: u32,
    rewinds: u32,
    volume_log: Vec<f64>,
}

/// In-memory audio element.
#[derive(Clone, Debug)]
pub struct MemoryAudio {
    inner: Rc<RefCell<AudioState>>,
}

impl Default for MemoryAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAudio {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(AudioState {
                playing: false,
                volume: 1.0,
                deny_play: false,
                plays: 0,
                denied: 0,
                pauses: 0,
                rewinds: 0,
                volume_log: Vec::new(),
            })),
        }
    }

    /// An element whose `play()` is always rejected (autoplay policy).
    pub fn denying() -> Self {
        let a = Self::new();
        a.inner.borrow_mut().deny_play = true;
        a
    }

    pub fn is_playing(&self) -> bool {
        self.inner.borrow().playing
    }

    pub fn current_volume(&self) -> f64 {
        self.inner.borrow().volume
    }

    pub fn plays(&self) -> u32 {
        self.inner.borrow().plays
    }

    pub fn denied(&self) -> u32 {
        self.inner.borrow().denied
    }

    pub fn pauses(&self) -> u32 {
        self.inner.borrow().pauses
    }

    pub fn rewinds(&self) -> u32 {
        self.inner.borrow().rewinds
    }

    /// Every volume ever set, in order.
    pub fn volume_log(&self) -> Vec<f64> {
        self.inner.borrow().volume_log.clone()
    }
}

impl AudioSink for MemoryAudio {
    fn play(&mut self) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        if st.deny_play {
            st.denied += 1;
            return Err(CurtainError::media("audio playback denied"));
        }
        st.playing = true;
        st.plays += 1;
        Ok(())
    }

    fn pause(&mut self) {
        let mut st = self.inner.borrow_mut();
        st.playing = false;
        st.pauses += 1;
    }

    fn seek_start(&mut self) {
        self.inner.borrow_mut().rewinds += 1;
    }

    fn volume(&self) -> f64 {
        self.inner.borrow().volume
    }

    fn set_volume(&mut self, volume: f64) {
        let mut st = self.inner.borrow_mut();
        st.volume = volume.clamp(0.0, 1.0);
        let v = st.volume;
        st.volume_log.push(v);
    }
}

/// Scripted behaviour for `MemoryVideo`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoScript {
    /// Delay from `load` to readiness (or to the scripted error). `None` never becomes ready.
    pub ready_after: Option<Millis>,
    /// The first N loads end in an error instead of readiness.
    pub errors_before_ready: u32,
    pub buffered: bool,
    pub deny_play: bool,
    /// Playback length; `VideoEnded` fires this long after playback starts.
    pub duration: Millis,
}

impl Default for VideoScript {
    fn default() -> Self {
        Self {
            ready_after: Some(Millis(250)),
            errors_before_ready: 0,
            buffered: true,
            deny_play: false,
            duration: Millis(10_000),
        }
    }
}

#[derive(Debug, Default)]
struct VideoState {
    script: VideoScript,
    loads: u32,
    loaded_at: Option<Millis>,
    outcome_reported: bool,
    play_calls: Vec<Millis>,
    playing_since: Option<Millis>,
    ended: bool,
}

/// In-memory video element driven by a `VideoScript`.
#[derive(Clone, Debug, Default)]
pub struct MemoryVideo {
    inner: Rc<RefCell<VideoState>>,
}

impl MemoryVideo {
    pub fn new(script: VideoScript) -> Self {
        Self {
            inner: Rc::new(RefCell::new(VideoState {
                script,
                ..VideoState::default()
            })),
        }
    }

    pub fn loads(&self) -> u32 {
        self.inner.borrow().loads
    }

    /// Times at which `play()` was called, including denied calls.
    pub fn play_calls(&self) -> Vec<Millis> {
        self.inner.borrow().play_calls.clone()
    }

    pub fn playing_since(&self) -> Option<Millis> {
        self.inner.borrow().playing_since
    }

    pub fn has_ended(&self) -> bool {
        self.inner.borrow().ended
    }
}

impl VideoSink for MemoryVideo {
    fn load(&mut self, now: Millis) {
        let mut st = self.inner.borrow_mut();
        st.loads += 1;
        st.loaded_at = Some(now);
        st.outcome_reported = false;
        st.playing_since = None;
    }

    fn play(&mut self, now: Millis) -> CurtainResult<()> {
        let mut st = self.inner.borrow_mut();
        st.play_calls.push(now);
        if st.script.deny_play {
            return Err(CurtainError::media("video playback denied"));
        }
        if st.playing_since.is_none() {
            st.playing_since = Some(now);
        }
        Ok(())
    }

    fn has_buffered(&self) -> bool {
        self.inner.borrow().script.buffered
    }

    fn poll_signals(&mut self, now: Millis) -> Vec<Signal> {
        let mut st = self.inner.borrow_mut();
        let mut out = Vec::new();

        if let Some(at) = st.loaded_at
            && !st.outcome_reported
            && st.playing_since.is_none()
        {
            let erroring = st.loads <= st.script.errors_before_ready;
            if let Some(delay) = st.script.ready_after
                && now >= at.after(delay)
            {
                st.outcome_reported = true;
                out.push(if erroring {
                    Signal::VideoError
                } else {
                    Signal::VideoCanPlay
                });
            }
        }

        if let Some(since) = st.playing_since
            && !st.ended
            && now >= since.after(st.script.duration)
        {
            st.ended = true;
            out.push(Signal::VideoEnded);
        }
        out
    }
}
