//! # WebDriver bindings
//!
//! A small W3C WebDriver client speaking JSON over HTTP to a driver server
//! such as `chromedriver`. Only the commands needed to script a page are
//! covered: navigation, element lookup, attributes, clicks, key actions,
//! frames, alerts and script execution.

mod capabilities;
mod error;
mod locator;
mod session;

pub use capabilities::ChromeCapabilities;
pub use error::WebDriverError;
pub use locator::{Key, Locator};
pub use session::{Element, WebDriver};

pub type Result<T> = std::result::Result<T, WebDriverError>;
