use std::path::PathBuf;
use std::time::Duration;

use crate::overlay::{InfoLabels, SkinSettings};

/// One of the two foreground image slots the slideshow alternates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    A,
    B,
}

impl Layer {
    pub fn other(self) -> Self {
        match self {
            Layer::A => Layer::B,
            Layer::B => Layer::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Layer::A => 0,
            Layer::B => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Incoming layer fades in while the outgoing one fades out.
    CrossFade(Duration),
    /// Hard swap, used for burst clusters.
    Cut,
}

/// A downloaded image ready to be swapped onto screen.
#[derive(Debug, Clone)]
pub struct Slide {
    pub id: String,
    pub path: PathBuf,
    pub layer: Layer,
    pub transition: Transition,
    /// Paint the same image on the blurred backdrop of `layer`.
    pub backdrop: bool,
    pub hold: Duration,
}

/// Modal message shown when a session has to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub header: String,
    pub message: String,
    pub details: Vec<(String, String)>,
}

impl Dialog {
    pub fn text(&self) -> String {
        let mut text = format!("{}\n{}\n", self.header, self.message);
        for (key, value) in &self.details {
            text.push_str(key);
            text.push_str(": ");
            text.push_str(value);
            text.push('\n');
        }
        text
    }
}

/// Everything the slideshow asks its presenter to do, in order.
#[derive(Debug, Clone)]
pub enum SlideEvent {
    /// Session started; apply dim/music/clock settings.
    Started(SkinSettings),
    SplashHidden,
    Backdrop { visible: bool },
    /// Fade the info labels out before they are replaced.
    LabelsHidden,
    /// Replace the info labels and fade them back in.
    Labels(InfoLabels),
    Show(Slide),
    Dialog(Dialog),
    /// Session over; clear every property the slideshow set.
    Ended,
}
