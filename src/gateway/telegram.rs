use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    KeyboardButton, KeyboardMarkup, KeyboardRemove, LinkPreviewOptions, MessageId, ParseMode,
    ReplyMarkup, ReplyParameters,
};

use super::{Markup, MessageGateway, OutboundMessage, TextFormat};
use crate::error::SendError;
use crate::types::{ChatIdentity, MediaRef};

/// `MessageGateway` backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn callback_query_id(id: &str) -> CallbackQueryId {
    CallbackQueryId(id.to_string())
}

fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Html => Some(ParseMode::Html),
    }
}

fn reply_markup(markup: &Markup) -> Option<ReplyMarkup> {
    match markup {
        Markup::None => None,
        Markup::Inline(rows) => {
            let rows = rows.iter().map(|row| {
                row.iter()
                    .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.action.as_str()))
                    .collect::<Vec<_>>()
            });
            Some(InlineKeyboardMarkup::new(rows).into())
        }
        Markup::Reply(rows) => {
            let rows = rows.iter().map(|row| {
                row.iter()
                    .map(|label| KeyboardButton::new(label.clone()))
                    .collect::<Vec<_>>()
            });
            Some(KeyboardMarkup::new(rows).resize_keyboard().into())
        }
        Markup::RemoveReply => Some(KeyboardRemove::new().into()),
    }
}

fn input_file(media: &MediaRef) -> InputFile {
    InputFile::file_id(FileId(media.as_str().to_string()))
}

fn disabled_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl MessageGateway for TelegramGateway {
    async fn send(&self, to: ChatIdentity, message: &OutboundMessage) -> Result<(), SendError> {
        let chat_id = ChatId(to.0);
        match message {
            OutboundMessage::Text {
                body,
                format,
                markup,
                reply_to,
                link_preview,
            } => {
                let mut req = self.bot.send_message(chat_id, body.clone());
                if let Some(mode) = parse_mode(*format) {
                    req = req.parse_mode(mode);
                }
                if let Some(markup) = reply_markup(markup) {
                    req = req.reply_markup(markup);
                }
                if let Some(id) = reply_to {
                    req = req.reply_parameters(ReplyParameters::new(MessageId(*id)));
                }
                if !link_preview {
                    req = req.link_preview_options(disabled_preview());
                }
                req.await?;
            }
            OutboundMessage::Photo {
                media,
                caption,
                format,
                markup,
            } => {
                let mut req = self.bot.send_photo(chat_id, input_file(media));
                if let Some(caption) = caption {
                    req = req.caption(caption.clone());
                }
                if let Some(mode) = parse_mode(*format) {
                    req = req.parse_mode(mode);
                }
                if let Some(markup) = reply_markup(markup) {
                    req = req.reply_markup(markup);
                }
                req.await?;
            }
            OutboundMessage::Video {
                media,
                caption,
                format,
                markup,
            } => {
                let mut req = self.bot.send_video(chat_id, input_file(media));
                if let Some(caption) = caption {
                    req = req.caption(caption.clone());
                }
                if let Some(mode) = parse_mode(*format) {
                    req = req.parse_mode(mode);
                }
                if let Some(markup) = reply_markup(markup) {
                    req = req.reply_markup(markup);
                }
                req.await?;
            }
            OutboundMessage::Forward { from, message_id } => {
                self.bot
                    .forward_message(chat_id, ChatId(from.0), MessageId(*message_id))
                    .await?;
            }
        }
        Ok(())
    }

    async fn edit_text(
        &self,
        chat: ChatIdentity,
        message_id: i32,
        text: &str,
    ) -> Result<(), SendError> {
        self.bot
            .edit_message_text(ChatId(chat.0), MessageId(message_id), text)
            .await?;
        Ok(())
    }

    async fn clear_markup(&self, chat: ChatIdentity, message_id: i32) -> Result<(), SendError> {
        self.bot
            .edit_message_reply_markup(ChatId(chat.0), MessageId(message_id))
            .await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), SendError> {
        let mut req = self.bot.answer_callback_query(callback_query_id(callback_id));
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Button;
    use crate::types::CallbackAction;

    #[test]
    fn test_no_markup_for_none() {
        assert!(reply_markup(&Markup::None).is_none());
    }

    #[test]
    fn test_inline_markup_carries_callback_data() {
        let markup = Markup::Inline(vec![vec![Button::new(
            "Confirm",
            CallbackAction::BroadcastConfirm,
        )]]);
        match reply_markup(&markup) {
            Some(ReplyMarkup::InlineKeyboard(kb)) => {
                assert_eq!(kb.inline_keyboard.len(), 1);
                assert_eq!(kb.inline_keyboard[0][0].text, "Confirm");
            }
            other => panic!("unexpected markup: {other:?}"),
        }
    }

    #[test]
    fn test_reply_markup_and_removal() {
        let panel = Markup::Reply(vec![vec!["Stats".to_string()]]);
        assert!(matches!(
            reply_markup(&panel),
            Some(ReplyMarkup::Keyboard(_))
        ));
        assert!(matches!(
            reply_markup(&Markup::RemoveReply),
            Some(ReplyMarkup::KeyboardRemove(_))
        ));
    }

    #[test]
    fn test_html_format_maps_to_parse_mode() {
        assert_eq!(parse_mode(TextFormat::Html), Some(ParseMode::Html));
        assert_eq!(parse_mode(TextFormat::Plain), None);
    }

    #[test]
    fn test_callback_id_is_passed_through() {
        assert_eq!(
            callback_query_id("4382bfdwdsb323b2d9"),
            CallbackQueryId("4382bfdwdsb323b2d9".to_string())
        );
    }
}
