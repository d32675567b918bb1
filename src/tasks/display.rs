use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use crate::events::{Dialog, Layer, SlideEvent, Transition};

/// Prefix of every window property the slideshow sets.
pub const PROPERTY_PREFIX: &str = "Screensaver.";

/// Headless stand-in for the host window: tracks the properties and image
/// slots a skin would render and logs every change.
#[derive(Debug, Default, Clone)]
pub struct Presenter {
    properties: BTreeMap<String, String>,
    foreground: [Option<PathBuf>; 2],
    backdrop: [Option<PathBuf>; 2],
    backdrop_visible: bool,
    shown: Vec<String>,
    dialogs: Vec<Dialog>,
    ended: bool,
}

impl Presenter {
    pub fn apply(&mut self, event: SlideEvent) {
        match event {
            SlideEvent::Started(skin) => {
                self.set("Dim", &skin.dim);
                if skin.show_music {
                    self.set("Music", "show");
                }
                if skin.show_clock {
                    self.set("Clock", "show");
                }
                self.ended = false;
                info!(dim = %skin.dim, music = skin.show_music, clock = skin.show_clock, "session started");
            }
            SlideEvent::SplashHidden => self.set("Splash", "hide"),
            SlideEvent::Backdrop { visible } => {
                self.backdrop_visible = visible;
                debug!(visible, "backdrop");
            }
            SlideEvent::LabelsHidden => {
                self.set("FadeinLabel", "0");
                self.set("FadeoutLabel", "1");
            }
            SlideEvent::Labels(labels) => {
                for (name, value) in labels.properties() {
                    match value {
                        Some(value) => self.set(name, value),
                        None => self.clear(name),
                    }
                }
                self.set("FadeinLabel", "1");
                self.set("FadeoutLabel", "0");
                debug!(?labels, "labels");
            }
            SlideEvent::Show(slide) => {
                let incoming = slide.layer;
                self.foreground[incoming.index()] = Some(slide.path.clone());
                if slide.backdrop {
                    self.backdrop[incoming.index()] = Some(slide.path.clone());
                    self.set(&fade_property(incoming), "0");
                    self.set(&fade_property(incoming.other()), "1");
                }
                let fade_ms = match slide.transition {
                    Transition::CrossFade(d) => d.as_millis() as u64,
                    Transition::Cut => 0,
                };
                info!(
                    id = %slide.id,
                    path = %slide.path.display(),
                    layer = ?slide.layer,
                    fade_ms,
                    hold_ms = slide.hold.as_millis() as u64,
                    "slide"
                );
                self.shown.push(slide.id);
            }
            SlideEvent::Dialog(dialog) => {
                error!(header = %dialog.header, "{}", dialog.text());
                self.dialogs.push(dialog);
            }
            SlideEvent::Ended => {
                self.properties.clear();
                self.backdrop_visible = false;
                self.ended = true;
                info!(shown = self.shown.len(), "session ended; properties cleared");
            }
        }
    }

    fn set(&mut self, name: &str, value: &str) {
        self.properties
            .insert(format!("{PROPERTY_PREFIX}{name}"), value.to_string());
    }

    fn clear(&mut self, name: &str) {
        self.properties.remove(&format!("{PROPERTY_PREFIX}{name}"));
    }

    /// Looks a property up by its short name, e.g. `City`.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(&format!("{PROPERTY_PREFIX}{name}"))
            .map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn foreground(&self, layer: Layer) -> Option<&Path> {
        self.foreground[layer.index()].as_deref()
    }

    pub fn backdrop(&self, layer: Layer) -> Option<&Path> {
        self.backdrop[layer.index()].as_deref()
    }

    pub fn backdrop_visible(&self) -> bool {
        self.backdrop_visible
    }

    /// Ids of every slide shown, in order.
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    pub fn dialogs(&self) -> &[Dialog] {
        &self.dialogs
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

fn fade_property(layer: Layer) -> String {
    format!("Fade1{}", layer.index() + 1)
}

/// Applies slideshow events until the slideshow drops its sender.
pub async fn run(mut from_slideshow: Receiver<SlideEvent>) -> Result<Presenter> {
    let mut presenter = Presenter::default();
    while let Some(event) = from_slideshow.recv().await {
        presenter.apply(event);
    }
    Ok(presenter)
}
