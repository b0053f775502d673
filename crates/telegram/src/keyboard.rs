use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Markdown,
    Html,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::Html => "HTML",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    pub fn new() -> Self {
        Self::default()
    }

    /// One button per row, the layout every selection list here uses.
    pub fn rows(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self { inline_keyboard: buttons.into_iter().map(|button| vec![button]).collect() }
    }

    pub fn row(mut self, buttons: Vec<InlineKeyboardButton>) -> Self {
        self.inline_keyboard.push(buttons);
        self
    }
}

/// A fully prepared outbound chat message. Rendering composes these; only the
/// Bot API client consumes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl OutboundMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: None, keyboard: None }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: Some(ParseMode::Markdown), keyboard: None }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{InlineKeyboardButton, InlineKeyboardMarkup, OutboundMessage, ParseMode};

    #[test]
    fn rows_layout_puts_one_button_per_row() {
        let markup = InlineKeyboardMarkup::rows(vec![
            InlineKeyboardButton::new("1. A", "select.1"),
            InlineKeyboardButton::new("2. B", "select.2"),
        ]);

        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 1);
        assert_eq!(markup.inline_keyboard[1][0].callback_data, "select.2");
    }

    #[test]
    fn keyboard_serializes_to_bot_api_shape() {
        let markup = InlineKeyboardMarkup::new()
            .row(vec![InlineKeyboardButton::new("Lihat Detail Lengkap", "detail.full")]);
        let value = serde_json::to_value(&markup).expect("serialize");

        assert_eq!(
            value["inline_keyboard"][0][0]["callback_data"],
            serde_json::json!("detail.full")
        );
    }

    #[test]
    fn markdown_constructor_sets_parse_mode() {
        let message = OutboundMessage::markdown("*hi*");
        assert_eq!(message.parse_mode, Some(ParseMode::Markdown));
        assert!(message.keyboard.is_none());
    }
}
