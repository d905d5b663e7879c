use std::sync::Arc;

use teloxide::{prelude::*, types::ChatAction};
use tracing::warn;

use cab_core::{
    dispatch::Prompt,
    domain::{ChatId, ImageNote},
    errors::Error,
};

use crate::router::AppState;
use crate::split_for_telegram;

const GREETING: &str = "Hi! I'm a coding assistant bot. Send me a request, or \
use /reset to clear the conversation history.";

const RESET_DONE: &str = "History cleared, you can start a new conversation.";

const CODE_USAGE: &str = "Please describe the task after /code, for example: \
/code Write a function that reverses a string.";

const STUDENT_USAGE: &str = "Please describe the exercise after /student and \
I'll walk you through it.";

const TEXT_ONLY: &str = "I can only handle text messages (and photos with a \
caption).";

const BUDGET_EXHAUSTED_MSG: &str = "Sorry, the bot has used up its credit \
budget. Please update TOTAL_BUDGET_USD or top up API credit.";

const BUSY_MSG: &str = "The model is a bit busy right now. Please try again \
in a moment.";

const FAILURE_MSG: &str = "Sorry, I couldn't process that request. Please try \
again later.";

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return handle_command(bot, msg, state).await;
        }
        let text = text.to_string();
        return answer_with_model(bot, msg, state, text, None, None).await;
    }

    if msg.photo().is_some() {
        return handle_photo(bot, msg, state).await;
    }

    bot.send_message(msg.chat.id, TEXT_ONLY).await?;
    Ok(())
}

async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = msg.text().unwrap_or_default();
    let (cmd, args) = split_command(text);
    let chat = ChatId(msg.chat.id.0);

    match cmd.as_str() {
        "/start" => {
            state.dispatcher.reset(chat);
            bot.send_message(msg.chat.id, GREETING).await?;
        }
        "/reset" => {
            state.dispatcher.reset(chat);
            bot.send_message(msg.chat.id, RESET_DONE).await?;
        }
        "/code" => {
            if args.is_empty() {
                bot.send_message(msg.chat.id, CODE_USAGE).await?;
                return Ok(());
            }
            let prompt = format!(
                "[CODE MODE]\nTask: {args}\nGive a step-by-step solution, with tests where \
                 appropriate."
            );
            let extra = state.cfg.code_system_prompt.clone();
            return answer_with_model(bot, msg, state, prompt, None, Some(extra)).await;
        }
        "/student" => {
            if args.is_empty() {
                bot.send_message(msg.chat.id, STUDENT_USAGE).await?;
                return Ok(());
            }
            let prompt = format!(
                "[TUTOR MODE]\nExercise: {args}\nExplain clearly, in steps a student can follow."
            );
            let extra = state.cfg.student_system_prompt.clone();
            return answer_with_model(bot, msg, state, prompt, None, Some(extra)).await;
        }
        _ => {
            bot.send_message(msg.chat.id, "Unknown command. Try /start, /reset, /code or /student.")
                .await?;
        }
    }

    Ok(())
}

async fn handle_photo(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let caption = msg.caption().map(|c| c.trim().to_string()).unwrap_or_default();
    let file_id = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .map(|p| p.file.id.clone())
        .unwrap_or_default();

    bot.send_message(
        msg.chat.id,
        "Got your photo 📷. I keep it in the conversation as a note and will answer based on \
         the caption.",
    )
    .await?;

    let placeholder = if caption.is_empty() {
        "The user sent a photo without a caption. Ask them to describe what is in it."
            .to_string()
    } else {
        caption.clone()
    };
    let text = format!(
        "The user sent a photo via Telegram. Caption (if any): {}\n\n{placeholder}",
        if caption.is_empty() { "none provided" } else { caption.as_str() }
    );

    let image = ImageNote {
        file_id,
        caption: if caption.is_empty() { None } else { Some(caption) },
    };

    answer_with_model(bot, msg, state, text, Some(image), None).await
}

async fn answer_with_model(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    text: String,
    image: Option<ImageNote>,
    extra_system: Option<String>,
) -> ResponseResult<()> {
    let chat = ChatId(msg.chat.id.0);

    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let prompt = Prompt {
        text,
        image,
        extra_system,
    };

    match state.dispatcher.handle(chat, prompt).await {
        Ok(reply) => {
            let mut out = reply.text;
            out.push_str(&format!(
                "\n\n💰 Credit remaining: ${:.2}",
                reply.remaining_usd
            ));
            if reply.exhausted {
                out.push_str(&format!(
                    "\n\n⚠️ The bot has reached its ${:.2} budget cap. Top up credit to \
                     continue.",
                    state.cfg.budget_limit_usd()
                ));
            }
            for chunk in split_for_telegram(&out) {
                bot.send_message(msg.chat.id, chunk).await?;
            }
        }
        Err(Error::BudgetExhausted) => {
            bot.send_message(msg.chat.id, BUDGET_EXHAUSTED_MSG).await?;
        }
        Err(Error::RateLimited) => {
            bot.send_message(msg.chat.id, BUSY_MSG).await?;
        }
        Err(e) => {
            warn!(chat = chat.0, error = %e, "request failed");
            bot.send_message(msg.chat.id, FAILURE_MSG).await?;
        }
    }

    Ok(())
}

/// Split "/cmd@botname args" into the bare command and its argument tail.
fn split_command(text: &str) -> (String, String) {
    let mut parts = text.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or_default().trim().to_string();

    let cmd = head.split('@').next().unwrap_or(head).to_string();
    (cmd, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_splitting_strips_bot_mention() {
        assert_eq!(
            split_command("/code@my_bot write a parser"),
            ("/code".to_string(), "write a parser".to_string())
        );
        assert_eq!(split_command("/reset"), ("/reset".to_string(), String::new()));
        assert_eq!(
            split_command("/student   explain recursion "),
            ("/student".to_string(), "explain recursion".to_string())
        );
    }
}
