pub mod api;
pub mod commands;
pub mod keyboard;
pub mod poller;
pub mod render;

pub use api::{
    CallbackQuery, Chat, HttpTelegramApi, Message, TelegramApi, TelegramError, Update, User,
};
pub use commands::{parse_callback, parse_command, BotCommand, CallbackAction};
pub use keyboard::{InlineKeyboardButton, InlineKeyboardMarkup, OutboundMessage, ParseMode};
pub use poller::{PollPolicy, UpdateHandler, UpdatePoller};
