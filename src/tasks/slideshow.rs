mod state;

pub use state::{PlaybackSM, PlaybackState, PlaybackStateChange};

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::ImmichClient;
use crate::config::Configuration;
use crate::error::ApiError;
use crate::events::{Layer, Slide, SlideEvent, Transition};
use crate::grouping::{PhotoGroup, PhotoRecord};
use crate::overlay::{self, SkinSettings};
use crate::tasks::files::{self, TempStore};
use crate::tasks::planner::Planner;

pub const CROSSFADE: Duration = Duration::from_millis(2500);
const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SlideshowOptions {
    /// Time a normal slide stays up.
    pub hold: Duration,
    /// Granularity of every wait; deactivation is noticed within one tick.
    pub tick: Duration,
    /// Pause between fading the old labels out and showing the new ones.
    pub label_fade: Duration,
    pub crossfade: Duration,
    /// Back-off before asking for another date when one had nothing to show.
    pub empty_day_pause: Duration,
    pub show_date: bool,
    pub show_tags: bool,
    pub show_burst: bool,
    pub skin: SkinSettings,
}

impl SlideshowOptions {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            hold: cfg.hold_time,
            tick: Duration::from_secs(1),
            label_fade: Duration::from_secs(1),
            crossfade: CROSSFADE,
            empty_day_pause: Duration::from_secs(1),
            show_date: cfg.show_date,
            show_tags: cfg.show_tags,
            show_burst: cfg.show_burst,
            skin: SkinSettings::from_config(cfg),
        }
    }
}

/// Position within the groups of the date being shown. Lives for one activation.
#[derive(Debug, Default)]
pub struct SlideshowSession {
    groups: Vec<PhotoGroup>,
    group_index: usize,
    image_index: usize,
}

impl SlideshowSession {
    pub fn load(&mut self, groups: Vec<PhotoGroup>) {
        self.groups = groups;
        self.group_index = 0;
        self.image_index = 0;
    }

    pub fn current_group(&self) -> Option<&PhotoGroup> {
        self.groups.get(self.group_index)
    }

    pub fn current_image(&self) -> Option<&PhotoRecord> {
        self.current_group()?.records().get(self.image_index)
    }

    pub fn advance_image(&mut self) {
        self.image_index += 1;
    }

    pub fn advance_group(&mut self) {
        self.group_index += 1;
        self.image_index = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Dates that had something to show.
    pub days: usize,
    pub groups: usize,
    pub shown: usize,
    /// Images dropped because their download failed.
    pub skipped: usize,
    /// Every playback state entered, starting with `WaitingForGroup`.
    pub states: Vec<PlaybackState>,
}

impl Default for SessionSummary {
    fn default() -> Self {
        Self {
            days: 0,
            groups: 0,
            shown: 0,
            skipped: 0,
            states: vec![PlaybackState::WaitingForGroup],
        }
    }
}

/// Runs one activation until `cancel` fires, the presenter goes away or the server fails.
///
/// Server failures are reported to the presenter as a dialog before this returns the error.
pub async fn run(
    planner: Planner,
    store: TempStore,
    options: SlideshowOptions,
    to_display: Sender<SlideEvent>,
    cancel: CancellationToken,
) -> Result<SessionSummary, ApiError> {
    Slideshow::new(planner, store, options, to_display, cancel)
        .run()
        .await
}

pub struct Slideshow {
    planner: Planner,
    client: ImmichClient,
    store: TempStore,
    options: SlideshowOptions,
    to_display: Sender<SlideEvent>,
    cancel: CancellationToken,
    sm: PlaybackSM,
    session: SlideshowSession,
    layer: Layer,
    splash_hidden: bool,
    summary: SessionSummary,
}

impl Slideshow {
    pub fn new(
        planner: Planner,
        store: TempStore,
        options: SlideshowOptions,
        to_display: Sender<SlideEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let client = planner.client().clone();
        Self {
            planner,
            client,
            store,
            options,
            to_display,
            cancel,
            sm: PlaybackSM::new(Instant::now()),
            session: SlideshowSession::default(),
            layer: Layer::A,
            splash_hidden: false,
            summary: SessionSummary::default(),
        }
    }

    pub async fn run(mut self) -> Result<SessionSummary, ApiError> {
        info!(hold = ?self.options.hold, burst = self.options.show_burst, "slideshow starting");
        self.emit(SlideEvent::Started(self.options.skin.clone()))
            .await;
        let outcome = self.play().await;
        self.finish(outcome.as_ref().err()).await;
        outcome.map(|()| self.summary)
    }

    async fn play(&mut self) -> Result<(), ApiError> {
        while !self.should_stop() {
            let plan = select! {
                _ = self.cancel.cancelled() => break,
                plan = self.planner.next_groups() => plan?,
            };
            if plan.is_empty() {
                info!(date = %plan.date, "no displayable photos for date");
                self.pause(self.options.empty_day_pause).await;
                continue;
            }

            self.summary.days += 1;
            self.session.load(plan.groups);
            while !self.should_stop() {
                let Some(burst) = self
                    .session
                    .current_group()
                    .map(|g| self.options.show_burst && g.is_burst())
                else {
                    break;
                };
                self.transition(|sm, now| sm.on_group(burst, now));
                self.show_group().await?;
                self.session.advance_group();
            }
            self.transition(|sm, now| sm.on_groups_exhausted(now));
        }
        Ok(())
    }

    /// Plays the session's current group in the mode the state machine is in.
    async fn show_group(&mut self) -> Result<(), ApiError> {
        let retention = files::retention_for(self.options.hold);
        if let Err(err) = self.store.purge_older_than(retention) {
            warn!("failed to purge old downloads: {err:#}");
        }

        let burst = match self.sm.current() {
            PlaybackState::DisplayingBurst => true,
            PlaybackState::DisplayingNormal => false,
            PlaybackState::WaitingForGroup | PlaybackState::Stopped => return Ok(()),
        };
        self.summary.groups += 1;
        if let Some(group) = self.session.current_group() {
            debug!(size = group.len(), burst, first = %group.first().id, "showing group");
        }

        self.emit(SlideEvent::Backdrop { visible: !burst }).await;
        if burst {
            // one set of labels for the whole burst
            if let Some(first) = self.session.current_image().cloned() {
                self.refresh_labels(&first).await?;
            }
        }
        if !self.splash_hidden {
            self.emit(SlideEvent::SplashHidden).await;
            self.splash_hidden = true;
        }

        while let Some(record) = self.session.current_image().cloned() {
            if self.should_stop() {
                break;
            }
            self.show_image(&record, burst).await?;
            self.session.advance_image();
        }
        Ok(())
    }

    async fn show_image(&mut self, record: &PhotoRecord, burst: bool) -> Result<(), ApiError> {
        let Some(path) = self.download(record).await else {
            self.summary.skipped += 1;
            return Ok(());
        };
        if !burst {
            self.refresh_labels(record).await?;
            if self.should_stop() {
                return Ok(());
            }
        }

        let (transition, hold) = if burst {
            (Transition::Cut, Duration::ZERO)
        } else {
            (Transition::CrossFade(self.options.crossfade), self.options.hold)
        };
        let slide = Slide {
            id: record.id.clone(),
            path,
            layer: self.layer,
            transition,
            backdrop: !burst,
            hold,
        };
        self.emit(SlideEvent::Show(slide)).await;
        self.summary.shown += 1;
        self.layer = self.layer.other();

        self.pause(hold).await;
        Ok(())
    }

    async fn download(&mut self, record: &PhotoRecord) -> Option<PathBuf> {
        let fetched = select! {
            _ = self.cancel.cancelled() => return None,
            res = self.client.fetch_original(&record.id) => res,
        };
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(id = %record.id, file = %record.filename, error = %err, "download failed; skipping");
                return None;
            }
        };
        match self.store.store(&record.id, &record.mime_type, &bytes).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(id = %record.id, file = %record.filename, "unusable download; skipping: {err:#}");
                None
            }
        }
    }

    async fn refresh_labels(&mut self, record: &PhotoRecord) -> Result<(), ApiError> {
        let tags = if self.options.show_tags {
            let info = self.client.asset_info(&record.id).await?;
            Some(info.exif_info.unwrap_or_default())
        } else {
            None
        };
        let labels = overlay::labels_for(record, self.options.show_date, tags.as_ref());

        self.emit(SlideEvent::LabelsHidden).await;
        self.pause(self.options.label_fade).await;
        self.emit(SlideEvent::Labels(labels)).await;
        Ok(())
    }

    /// Sleeps for `duration` in tick-sized steps, returning early once stopped.
    async fn pause(&mut self, duration: Duration) {
        let tick = self.options.tick.max(MIN_TICK);
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.should_stop() {
                return;
            }
            let step = remaining.min(tick);
            select! {
                _ = self.cancel.cancelled() => {}
                _ = sleep(step) => {}
            }
            remaining = remaining.saturating_sub(step);
        }
    }

    async fn emit(&mut self, event: SlideEvent) {
        if self.to_display.is_closed() {
            return;
        }
        if self.to_display.send(event).await.is_err() {
            warn!("display channel closed; stopping slideshow");
            self.transition(|sm, now| sm.on_stop(now));
        }
    }

    fn should_stop(&mut self) -> bool {
        if self.cancel.is_cancelled() && !self.sm.is_stopped() {
            info!("deactivation received; stopping slideshow");
            self.transition(|sm, now| sm.on_stop(now));
        }
        self.sm.is_stopped()
    }

    fn transition(
        &mut self,
        step: impl FnOnce(&mut PlaybackSM, Instant) -> Option<PlaybackStateChange>,
    ) {
        let now = Instant::now();
        let spent = self.sm.elapsed(now);
        if let Some(ch) = step(&mut self.sm, now) {
            debug!(from = ?ch.from, to = ?ch.to, after_ms = spent.as_millis() as u64, "playback state");
            self.summary.states.push(ch.to);
        }
    }

    async fn finish(&mut self, failure: Option<&ApiError>) {
        if let Some(err) = failure {
            error!(error = %err, "slideshow stopped by server error");
            self.emit(SlideEvent::Dialog(err.dialog())).await;
        }
        self.transition(|sm, now| sm.on_stop(now));
        match self.store.purge_all() {
            Ok(removed) => debug!(removed, "cleared downloads"),
            Err(err) => warn!("failed to clear downloads: {err:#}"),
        }
        self.emit(SlideEvent::Ended).await;
        info!(
            days = self.summary.days,
            groups = self.summary.groups,
            shown = self.summary.shown,
            skipped = self.summary.skipped,
            "slideshow stopped"
        );
    }
}
