use teloxide::utils::command::BotCommands;

/// Static welcome text for /start.
pub const WELCOME: &str = "Welcome to AI Code Bot!\n\
    Use /explain, /debug, or /generate followed by your code or question. \
    You can also send an image to remove its background in just 30 sec.";

/// Reply for a message routed to background removal without a photo in it.
pub const SEND_IMAGE_HINT: &str = "Please send an image to remove its background.";

/// The closed set of bot commands. Every command carries its raw argument
/// tail so trailing text never makes parsing fail; /start just ignores it.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "AI Code Bot commands:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start(String),
    #[command(description = "explain a piece of code")]
    Explain(String),
    #[command(description = "find and fix bugs in code")]
    Debug(String),
    #[command(description = "generate code for a task")]
    Generate(String),
}

/// The prompt sent to the completion provider for a command, or `None` for
/// commands answered locally.
pub fn prompt_for(command: &Command) -> Option<String> {
    match command {
        Command::Start(_) => None,
        Command::Explain(args) => Some(format!(
            "Explain this code in detail:\n{}",
            normalize_args(args)
        )),
        Command::Debug(args) => Some(format!(
            "Find and fix bugs in the following code:\n{}",
            normalize_args(args)
        )),
        Command::Generate(args) => Some(format!(
            "Generate code for the following task:\n{}",
            normalize_args(args)
        )),
    }
}

/// Remainder of the message after the command token, with runs of whitespace
/// collapsed to single spaces. Empty argument lists are accepted as-is.
fn normalize_args(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
