use std::fmt;

/// Element lookup strategies.
///
/// W3C WebDriver only knows css selectors, xpath, tag names and link text, so
/// `Id` and `ClassName` are translated into css selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    Id(&'a str),
    ClassName(&'a str),
    TagName(&'a str),
    Css(&'a str),
    XPath(&'a str),
}

impl Locator<'_> {
    pub(crate) fn strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Id(id) => ("css selector", format!("[id=\"{id}\"]")),
            Locator::ClassName(class) => ("css selector", format!(".{class}")),
            Locator::TagName(tag) => ("tag name", tag.to_string()),
            Locator::Css(selector) => ("css selector", selector.to_string()),
            Locator::XPath(xpath) => ("xpath", xpath.to_string()),
        }
    }
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (using, value) = self.strategy();
        write!(f, "{using} `{value}`")
    }
}

/// Special keys from the WebDriver key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Space,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    pub fn code_point(self) -> char {
        match self {
            Key::Enter => '\u{E007}',
            Key::Space => '\u{E00D}',
            Key::ArrowLeft => '\u{E012}',
            Key::ArrowRight => '\u{E014}',
        }
    }
}
