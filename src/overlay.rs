use chrono::NaiveDateTime;

use crate::api::ExifInfo;
use crate::config::Configuration;
use crate::grouping::PhotoRecord;

/// Text shown over a slide. `None` clears the label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoLabels {
    pub headline: Option<String>,
    pub caption: Option<String>,
    pub sublocation: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl InfoLabels {
    /// Label values keyed by the names the skin reads them under.
    pub fn properties(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("Headline", self.headline.as_deref()),
            ("Caption", self.caption.as_deref()),
            ("Sublocation", self.sublocation.as_deref()),
            ("City", self.city.as_deref()),
            ("State", self.state.as_deref()),
            ("Country", self.country.as_deref()),
            ("Date", self.date.as_deref()),
            ("Time", self.time.as_deref()),
        ]
    }

    pub fn is_blank(&self) -> bool {
        self.properties().iter().all(|(_, v)| v.is_none())
    }
}

/// e.g. `Friday May  7, 2021`
pub fn format_date(taken_at: NaiveDateTime) -> String {
    taken_at.format("%A %B %e, %Y").to_string()
}

/// e.g. `02:05 PM`
pub fn format_time(taken_at: NaiveDateTime) -> String {
    taken_at.format("%I:%M %p").to_string()
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Builds the labels for `record`; `tags` is the EXIF block when tag display is on.
pub fn labels_for(record: &PhotoRecord, show_date: bool, tags: Option<&ExifInfo>) -> InfoLabels {
    let mut labels = InfoLabels::default();
    if show_date {
        labels.date = Some(format_date(record.taken_at));
        labels.time = Some(format_time(record.taken_at));
    }
    if let Some(exif) = tags {
        labels.headline = non_blank(exif.description.as_ref());
        labels.city = non_blank(exif.city.as_ref());
        labels.state = non_blank(exif.state.as_ref());
        labels.country = non_blank(exif.country.as_ref());
    }
    labels
}

/// Session-wide presentation settings applied when a slideshow starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinSettings {
    /// ARGB colour diffuse applied to slides, `aarrggbb`.
    pub dim: String,
    pub show_music: bool,
    pub show_clock: bool,
}

impl SkinSettings {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            dim: dim_colour(cfg.dim_level),
            show_music: cfg.show_music,
            show_clock: cfg.show_clock,
        }
    }
}

/// Converts a brightness percentage into a white diffuse with that alpha.
pub fn dim_colour(level_percent: u8) -> String {
    let level = f64::from(level_percent.min(100));
    let alpha = (level * 2.55).round() as u8;
    format!("{alpha:02x}ffffff")
}
