/// Commands understood across the two bot front-ends. The student bot accepts
/// the first three; the admin bot accepts the management set. Each handler
/// decides which subset it honors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Search { query: String },
    Register { token: String },
    AddUser { user_id: i64, username: Option<String> },
    RemoveUser { user_id: i64 },
    ListUsers,
    Logs,
    ChatId,
    Invalid { usage: &'static str },
    Unknown { command: String },
}

/// Parses a leading slash command. Returns `None` for plain text, which the
/// student bot treats as free-form input when a search prompt is pending.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let command_token = parts.next().unwrap_or_default();
    // Group chats address commands as `/cari@SomeBot`.
    let command = command_token.split('@').next().unwrap_or(command_token).to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    Some(match command.as_str() {
        "/start" => BotCommand::Start,
        "/cari" => BotCommand::Search { query: args.join(" ") },
        "/regist" => BotCommand::Register { token: args.join(" ") },
        "/add" => match args.first().and_then(|raw| raw.parse::<i64>().ok()) {
            Some(user_id) => BotCommand::AddUser {
                user_id,
                username: args.get(1).map(|username| username.trim_start_matches('@').to_owned()),
            },
            None => BotCommand::Invalid { usage: "/add <user_id> [username]" },
        },
        "/remove" => match args.first().and_then(|raw| raw.parse::<i64>().ok()) {
            Some(user_id) => BotCommand::RemoveUser { user_id },
            None => BotCommand::Invalid { usage: "/remove <user_id>" },
        },
        "/list" => BotCommand::ListUsers,
        "/logs" => BotCommand::Logs,
        "/chatid" => BotCommand::ChatId,
        _ => BotCommand::Unknown { command },
    })
}

/// Inline-button payloads attached to outbound keyboards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// 1-based position in the last emitted result list.
    SelectCandidate(usize),
    ViewFullDetail,
    SearchAgain,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            Self::SelectCandidate(index) => format!("select.{index}"),
            Self::ViewFullDetail => "detail.full".to_string(),
            Self::SearchAgain => "search.again".to_string(),
        }
    }
}

pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    match data {
        "detail.full" => Some(CallbackAction::ViewFullDetail),
        "search.again" => Some(CallbackAction::SearchAgain),
        _ => {
            let index = data.strip_prefix("select.")?.parse::<usize>().ok()?;
            (index > 0).then_some(CallbackAction::SelectCandidate(index))
        }
    }
}
