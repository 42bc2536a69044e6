pub mod probe;
pub mod web;

pub use probe::{first_of, selector_probe, url_probe, Detected, Probe, ProbeTimeout};
pub use web::{LaunchOptions, WebDriver};
