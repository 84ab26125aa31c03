use std::sync::Arc;

use anyhow::Result;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, InputFile, PhotoSize};
use tracing::{error, info, warn};

use crate::commands::{self, Command};
use crate::config::Config;
use crate::llm::CompletionClient;
use crate::remover::{self, RembgService};

/// Shared application context, built once at startup and injected into the
/// handlers. No handler keeps state between updates.
pub struct AppState {
    config: Config,
    llm: CompletionClient,
    remover: RembgService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let llm = CompletionClient::new(config.groq.clone());
        let remover = RembgService::new(config.rembg.clone());
        Self {
            config,
            llm,
            remover,
        }
    }
}

/// Start long polling and dispatch updates until shutdown. Each update is
/// routed to exactly one handler: commands first, then photos, then plain
/// text; anything else is logged and dropped.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    info!("Starting Telegram bot...");

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo),
        )
        .branch(
            // Free text only; unknown /commands fall through to the default
            // handler and get no reply.
            dptree::filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
                .endpoint(handle_text),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    info!("Command in chat {}: {:?}", msg.chat.id, cmd);

    let Some(prompt) = commands::prompt_for(&cmd) else {
        bot.send_message(msg.chat.id, commands::WELCOME).await?;
        return Ok(());
    };

    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .ok();

    let reply = state.llm.complete(&prompt).await.into_reply_text();
    send_chunked(&bot, msg.chat.id, &reply).await
}

async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    info!("Free text in chat {} ({} chars)", msg.chat.id, text.len());

    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .ok();

    let reply = state.llm.complete(text).await.into_reply_text();
    send_chunked(&bot, msg.chat.id, &reply).await
}

async fn handle_photo(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Highest-resolution variant comes last in the size list.
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        bot.send_message(msg.chat.id, commands::SEND_IMAGE_HINT)
            .await?;
        return Ok(());
    };

    info!("Photo in chat {}: file {:?}", msg.chat.id, photo.file.id);

    bot.send_chat_action(msg.chat.id, ChatAction::UploadPhoto)
        .await
        .ok();

    // A pipeline failure becomes an error reply so the dispatcher keeps
    // serving other chats.
    match cutout_photo(&bot, photo, &state).await {
        Ok(png) => {
            bot.send_photo(
                msg.chat.id,
                InputFile::memory(png).file_name(remover::OUTPUT_FILENAME),
            )
            .await?;
        }
        Err(e) => {
            error!("Background removal failed: {:#}", e);
            bot.send_message(msg.chat.id, format!("Could not remove the background: {e}"))
                .await?;
        }
    }

    Ok(())
}

/// Download the photo, run the background-removal pipeline, return PNG bytes.
async fn cutout_photo(bot: &Bot, photo: &PhotoSize, state: &AppState) -> Result<Vec<u8>> {
    let file = bot.get_file(photo.file.id.clone()).await?;
    let mut buffer = Vec::new();
    bot.download_file(&file.path, &mut buffer).await?;

    info!("Downloaded {} byte photo", buffer.len());

    remover::remove_background(&buffer, &state.remover).await
}

/// Send one logical reply, split into chunks under Telegram's 4096 char
/// message limit.
async fn send_chunked(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in split_message(text, 4000) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

/// Split long messages at newline/space positions, never inside a UTF-8 char.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_stays_whole() {
        assert_eq!(split_message("hello", 4000), vec!["hello".to_string()]);
    }

    #[test]
    fn test_long_message_splits_under_limit() {
        let text = "word ".repeat(100);
        let chunks = split_message(&text, 32);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 32));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let text = format!("{}\n{}", "a".repeat(20), "b".repeat(20));
        let chunks = split_message(&text, 30);
        assert_eq!(chunks[0], format!("{}\n", "a".repeat(20)));
    }

    #[test]
    fn test_split_never_breaks_multibyte_chars() {
        let text = "é".repeat(50);
        let chunks = split_message(&text, 21);
        for chunk in &chunks {
            assert!(chunk.len() <= 21);
            // Reassembling from chars must not have lost anything.
            assert!(chunk.chars().all(|c| c == 'é'));
        }
        assert_eq!(chunks.concat(), text);
    }
}
