use unicode_segmentation::UnicodeSegmentation;

const MAX_GRAPHEMES: usize = 256;

/// A non-blank display string of bounded length, used for push titles and bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageText(String);

impl MessageText {
    pub fn parse(field: &str, s: String) -> Result<MessageText, String> {
        if s.trim().is_empty() {
            return Err(format!("'{}' must not be empty.", field));
        }
        if s.graphemes(true).count() > MAX_GRAPHEMES {
            return Err(format!(
                "'{}' must be at most {} characters long.",
                field, MAX_GRAPHEMES
            ));
        }
        Ok(Self(s))
    }
}

impl AsRef<str> for MessageText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
