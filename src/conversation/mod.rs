pub mod state;

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use self::state::ChatSession;
pub use self::state::ConversationState;
use crate::admin::AdminSet;
use crate::config::FunnelConfig;
use crate::error::FlowError;
use crate::gateway::{Action, Button, Delivery, Markup, OutboundMessage};
use crate::keyed::KeyedStore;
use crate::platform::{Event, Inbound};
use crate::texts;
use crate::types::{CallbackAction, ChatIdentity, Command, MediaKind, MediaRef};

const TIME_FORMAT: &str = "%H:%M:%S %d/%m/%Y";

/// What the engine decided for one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub actions: Vec<Action>,
    /// State of the chat after the event was applied.
    pub state: ConversationState,
}

/// Result of a transition before it is applied. `next == None` keeps the
/// current state.
struct Step {
    actions: Vec<Action>,
    next: Option<ConversationState>,
}

impl Step {
    fn stay(actions: Vec<Action>) -> Self {
        Self {
            actions,
            next: None,
        }
    }

    fn to(next: ConversationState, actions: Vec<Action>) -> Self {
        Self {
            actions,
            next: Some(next),
        }
    }
}

/// Per-chat registration funnel.
pub struct ConversationEngine {
    funnel: FunnelConfig,
    admins: Arc<AdminSet>,
    sessions: KeyedStore<ChatIdentity, ChatSession>,
}

impl ConversationEngine {
    pub fn new(funnel: FunnelConfig, admins: Arc<AdminSet>) -> Self {
        Self {
            funnel,
            admins,
            sessions: KeyedStore::new(),
        }
    }

    pub async fn state_of(&self, chat: ChatIdentity) -> ConversationState {
        self.sessions.get(&chat).await.state
    }

    pub async fn is_capturing(&self, chat: ChatIdentity) -> bool {
        self.sessions.get(&chat).await.capturing
    }

    /// Drop the chat back to `Idle`, leaving the media reference mode alone.
    pub async fn reset(&self, chat: ChatIdentity) -> ConversationState {
        let previous = self
            .sessions
            .update(&chat, |session| std::mem::take(&mut session.state))
            .await;
        if previous != ConversationState::Idle {
            debug!("Chat {}: {} -> idle (reset)", chat, previous.name());
        }
        previous
    }

    pub async fn handle(&self, inbound: &Inbound) -> Outcome {
        self.handle_at(inbound, Local::now()).await
    }

    async fn handle_at(&self, inbound: &Inbound, now: DateTime<Local>) -> Outcome {
        let chat = inbound.chat;
        let admins = self.admins.members().await;
        let time = now.format(TIME_FORMAT).to_string();

        self.sessions
            .update(&chat, |session| {
                let actions = match &inbound.event {
                    Event::Command(Command::GetId) => {
                        session.capturing = true;
                        info!("Media reference mode enabled for {}", chat);
                        vec![send(chat, OutboundMessage::text(texts::GETID_ON))]
                    }
                    Event::Command(Command::StopGetId) => {
                        session.capturing = false;
                        info!("Media reference mode disabled for {}", chat);
                        vec![send(chat, OutboundMessage::text(texts::GETID_OFF))]
                    }
                    Event::Media { kind, media, .. } if session.capturing => {
                        let echo = OutboundMessage::html(texts::media_reference(
                            kind.label(),
                            media.as_str(),
                        ))
                        .replying_to(inbound.message_id);
                        vec![send(chat, echo)]
                    }
                    _ => self.advance(&mut session.state, inbound, &admins, &time),
                };
                Outcome {
                    actions,
                    state: session.state.clone(),
                }
            })
            .await
    }

    /// Apply one funnel transition to `state` and return what to send.
    fn advance(
        &self,
        state: &mut ConversationState,
        inbound: &Inbound,
        admins: &[ChatIdentity],
        time: &str,
    ) -> Vec<Action> {
        let chat = inbound.chat;
        let before = state.name();
        let actions = match self.transition(state, inbound, admins, time) {
            Ok(step) => {
                if let Some(next) = step.next {
                    *state = next;
                }
                step.actions
            }
            Err(FlowError::InvalidContentForState { expected, got }) => {
                debug!("Chat {} sent {} while {} was expected", chat, got, expected);
                vec![send(chat, OutboundMessage::html(texts::ASK_RECEIPT))]
            }
            Err(e) => {
                warn!("Unexpected rejection in conversation {}: {}", chat, e);
                Vec::new()
            }
        };
        if before != state.name() {
            debug!("Chat {}: {} -> {}", chat, before, state.name());
        }
        actions
    }

    fn transition(
        &self,
        state: &ConversationState,
        inbound: &Inbound,
        admins: &[ChatIdentity],
        time: &str,
    ) -> Result<Step, FlowError> {
        let chat = inbound.chat;

        let step = match (&inbound.event, state) {
            (Event::Command(Command::Start), _) => {
                Step::to(ConversationState::Idle, vec![self.intro(chat)])
            }

            (
                Event::Callback {
                    action: CallbackAction::NoAccount,
                    callback_id,
                    message_id,
                },
                ConversationState::Idle,
            ) => {
                let mut actions = vec![answer(callback_id)];
                if let Some(message_id) = message_id {
                    actions.push(Action::ClearMarkup {
                        chat,
                        message_id: *message_id,
                    });
                }
                actions.push(self.registration(chat));
                Step::stay(actions)
            }

            (
                Event::Callback {
                    action: CallbackAction::HaveAccount | CallbackAction::RegisteredDone,
                    callback_id,
                    ..
                },
                ConversationState::Idle,
            ) => Step::to(
                ConversationState::AwaitingUsername,
                vec![answer(callback_id), self.username_prompt(chat)],
            ),

            // Stale or out-of-order clicks still get acknowledged.
            (Event::Callback { callback_id, .. }, _) => Step::stay(vec![answer(callback_id)]),

            (Event::Text(body), ConversationState::AwaitingUsername) => {
                let account_name = body.trim();
                if account_name.is_empty() {
                    return Ok(Step::stay(Vec::new()));
                }
                info!("Chat {} submitted account name {:?}", chat, account_name);

                let notice = texts::admin_new_username(
                    &inbound.sender.handle(),
                    account_name,
                    time,
                    chat.0,
                );
                let mut actions: Vec<Action> = admins
                    .iter()
                    .map(|admin| {
                        let mut steps = vec![Delivery::new(*admin, OutboundMessage::text(&notice))];
                        if let Some(message_id) = inbound.message_id {
                            steps.push(Delivery::new(
                                *admin,
                                OutboundMessage::Forward {
                                    from: chat,
                                    message_id,
                                },
                            ));
                        }
                        Action::Chain {
                            steps,
                            on_failure: None,
                        }
                    })
                    .collect();
                actions.push(self.receipt_prompt(chat, account_name));

                Step::to(
                    ConversationState::AwaitingReceipt {
                        account_name: account_name.to_string(),
                    },
                    actions,
                )
            }

            (
                Event::Media {
                    kind: MediaKind::Photo | MediaKind::Document,
                    media,
                    ..
                },
                ConversationState::AwaitingReceipt { account_name },
            ) => Step::to(
                ConversationState::AwaitingGameChoice {
                    receipt: media.clone(),
                    account_name: account_name.clone(),
                },
                vec![send(chat, OutboundMessage::text(texts::ASK_GAME_CHOICE))],
            ),

            (Event::Media { kind: MediaKind::Video, .. }, ConversationState::AwaitingReceipt { .. }) => {
                return Err(FlowError::InvalidContentForState {
                    expected: "receipt image",
                    got: "video",
                });
            }

            (Event::Text(_), ConversationState::AwaitingReceipt { .. }) => {
                return Err(FlowError::InvalidContentForState {
                    expected: "receipt image",
                    got: "text",
                });
            }

            (
                Event::Text(body),
                ConversationState::AwaitingGameChoice {
                    receipt,
                    account_name,
                },
            ) => {
                let choice = body.trim();
                if choice.is_empty() {
                    return Ok(Step::stay(Vec::new()));
                }
                info!("Chat {} completed the funnel with choice {:?}", chat, choice);

                let summary = texts::admin_receipt_summary(
                    &inbound.sender.handle(),
                    account_name,
                    chat.0,
                    choice,
                    time,
                );
                Step::to(
                    ConversationState::Idle,
                    vec![self.report_receipt(chat, admins, receipt, &summary)],
                )
            }

            _ => Step::stay(Vec::new()),
        };

        Ok(step)
    }

    fn intro(&self, chat: ChatIdentity) -> Action {
        let keyboard = Markup::Inline(vec![
            vec![Button::new(texts::HAVE_ACCOUNT_BUTTON, CallbackAction::HaveAccount)],
            vec![Button::new(texts::NO_ACCOUNT_BUTTON, CallbackAction::NoAccount)],
        ]);
        illustrated(
            chat,
            self.funnel.media.intro(),
            OutboundMessage::text(texts::INTRO).with_markup(keyboard),
        )
    }

    fn registration(&self, chat: ChatIdentity) -> Action {
        let keyboard = Markup::Inline(vec![vec![Button::new(
            texts::REGISTERED_DONE_BUTTON,
            CallbackAction::RegisteredDone,
        )]]);
        illustrated(
            chat,
            self.funnel.media.registration(),
            OutboundMessage::html(texts::registration(&self.funnel.registration_link))
                .with_markup(keyboard),
        )
    }

    fn username_prompt(&self, chat: ChatIdentity) -> Action {
        illustrated(
            chat,
            self.funnel.media.username_prompt(),
            OutboundMessage::html(texts::ASK_USERNAME),
        )
    }

    fn receipt_prompt(&self, chat: ChatIdentity, account_name: &str) -> Action {
        let text = texts::username_received(
            account_name,
            &self.funnel.support_name,
            self.funnel.support_link.as_deref(),
        );
        illustrated(
            chat,
            self.funnel.media.receipt_prompt(),
            OutboundMessage::html(text).without_link_preview(),
        )
    }

    /// Hand the receipt and summary to every admin, then confirm to the user.
    /// If any admin hand-off fails the user is told instead.
    fn report_receipt(
        &self,
        chat: ChatIdentity,
        admins: &[ChatIdentity],
        receipt: &MediaRef,
        summary: &str,
    ) -> Action {
        if admins.is_empty() {
            warn!("No admins configured; receipt from {} cannot be reported", chat);
            return send(chat, OutboundMessage::text(texts::FLOW_FAILED));
        }

        let mut steps: Vec<Delivery> = admins
            .iter()
            .map(|admin| {
                Delivery::new(
                    *admin,
                    OutboundMessage::photo(receipt.clone(), Some(summary.to_string())),
                )
                .or_else(OutboundMessage::text(format!(
                    "{summary}\n📎 Receipt: {receipt}"
                )))
            })
            .collect();
        steps.push(Delivery::new(chat, OutboundMessage::text(texts::FLOW_COMPLETE)));

        Action::Chain {
            steps,
            on_failure: Some(Delivery::new(chat, OutboundMessage::text(texts::FLOW_FAILED))),
        }
    }
}

fn send(chat: ChatIdentity, message: OutboundMessage) -> Action {
    Action::Send(Delivery::new(chat, message))
}

fn answer(callback_id: &str) -> Action {
    Action::AnswerCallback {
        callback_id: callback_id.to_string(),
        text: None,
    }
}

/// Send `message` as the caption of `image` when there is one, degrading to
/// the bare message if the photo cannot be sent.
fn illustrated(chat: ChatIdentity, image: Option<MediaRef>, message: OutboundMessage) -> Action {
    let Some(image) = image else {
        return send(chat, message);
    };

    let (caption, format, markup) = match &message {
        OutboundMessage::Text {
            body,
            format,
            markup,
            ..
        } => (body.clone(), *format, markup.clone()),
        _ => return send(chat, message),
    };
    let photo = OutboundMessage::photo(image, Some(caption))
        .with_format(format)
        .with_markup(markup);

    Action::Send(Delivery::new(chat, photo).or_else(message))
}
