pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod grouping;
pub mod overlay;
pub mod tasks {
    pub mod deactivation;
    pub mod display;
    pub mod files;
    pub mod planner;
    pub mod slideshow;
}
