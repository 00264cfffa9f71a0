//! User-facing copy. HTML-formatted strings escape every interpolated
//! value that came from a user.

use html_escape::encode_text;

pub const HAVE_ACCOUNT_BUTTON: &str = "✅ I ALREADY HAVE AN ACCOUNT";
pub const NO_ACCOUNT_BUTTON: &str = "🆕 NO ACCOUNT – SIGN UP NOW";
pub const REGISTERED_DONE_BUTTON: &str = "✅ I'VE FINISHED SIGNING UP";

pub const INTRO: &str = "👋 Hello!\n\
    I'm the bot that hands out promo CODES.\n\n\
    👉 Do you already have a player account?\n\n\
    (Just tap a button below: HAVE ONE or NOT YET, and I'll help right away! 😊)";

pub const ASK_USERNAME: &str = "Great ❤️\n\n\
    Please send your exact <b>account name</b> so I can check it.\n\n\
    Example:\n<code>abc123</code>";

pub const ASK_RECEIPT: &str = "Please send a <b>transfer receipt image</b> so I can continue.";

pub const ASK_GAME_CHOICE: &str =
    "🔔 Thanks! Please tell me which game you'd like the bonus credited to.";

pub const FLOW_COMPLETE: &str =
    "✅ I've got everything I need, your points will be credited shortly ❤️";

pub const FLOW_FAILED: &str = "⚠️ Something went wrong passing your details on. \
    Please wait a moment or message support.";

pub const GETID_ON: &str = "✅ Media reference mode is on.\n\
    Send a photo, video or file and I'll reply with its reference.\n\
    Turn it off with /stopgetid";

pub const GETID_OFF: &str = "🛑 Media reference mode is off.";

pub fn registration(link: &str) -> String {
    format!(
        "Great, here's the sign-up link 👇\n\n\
         🔗 Sign up: {}\n\n\
         Once you're done, tap the button below and I'll take it from there.",
        encode_text(link)
    )
}

pub fn username_received(
    account_name: &str,
    support_name: &str,
    support_link: Option<&str>,
) -> String {
    let mut text = format!(
        "Got your account name: <b>{}</b> ✅\n\n\
         Top up your account to unlock the promotion.\n\n\
         When it's done, send me a <b>transfer receipt image</b> and I'll credit the points directly.",
        encode_text(account_name)
    );
    if let Some(link) = support_link {
        text.push_str(&format!(
            "\n\nAny questions? Message {}:\n👉 {}",
            encode_text(support_name),
            encode_text(link)
        ));
    }
    text
}

pub fn media_reference(kind: &str, reference: &str) -> String {
    format!(
        "✅ <b>{} reference:</b>\n\n<code>{}</code>",
        kind,
        encode_text(reference)
    )
}

/// Admin notification when a user submits an account name. Plain text.
pub fn admin_new_username(sender: &str, account_name: &str, time: &str, chat: i64) -> String {
    format!(
        "🔔 New account name submitted\n\n\
         👤 Telegram: {sender}\n\
         🧾 Account name: {account_name}\n\
         ⏰ Time: {time}\n\
         🆔 Chat ID: {chat}"
    )
}

/// Caption on the receipt forwarded to admins. Plain text.
pub fn admin_receipt_summary(
    sender: &str,
    account_name: &str,
    chat: i64,
    choice: &str,
    time: &str,
) -> String {
    format!(
        "📩 TRANSFER RECEIPT + GAME CHOICE\n\n\
         👤 Telegram: {sender}\n\
         🧾 Account name: {account_name}\n\
         🆔 Chat ID: {chat}\n\
         🎯 Game: {choice}\n\
         ⏰ Time: {time}"
    )
}

pub const PANEL_BROADCAST: &str = "📣 Broadcast";
pub const PANEL_STATS: &str = "📊 Stats";
pub const PANEL_EXIT: &str = "❌ Exit";

pub const PERMISSION_DENIED: &str = "❌ You don't have admin rights.";
pub const PERMISSION_DENIED_SHORT: &str = "No permission.";
pub const PANEL_TITLE: &str = "🔧 Admin Panel";
pub const PANEL_CLOSED: &str = "Left the admin panel.";
pub const CANCELLED: &str = "✅ Cancelled.";

pub const BROADCAST_ASK_CONTENT: &str = "📣 Send the <b>content to broadcast</b>.\n\
    ✅ Supported: <b>Text / Photo / Video</b> (captions allowed).\n\
    Cancel: /cancel";

pub const BROADCAST_CONFIRM_BUTTON: &str = "✅ Confirm send";
pub const BROADCAST_CANCEL_BUTTON: &str = "❌ Cancel";
pub const BROADCAST_CANCELLED_TOAST: &str = "Cancelled.";
pub const BROADCAST_CANCELLED: &str = "❌ Broadcast cancelled.";
pub const BROADCAST_EMPTY_TOAST: &str = "Nothing to send.";
pub const BROADCAST_EMPTY: &str = "⚠️ Nothing to send.";
pub const BROADCAST_SENDING_TOAST: &str = "Sending!";
pub const BROADCAST_SENDING: &str = "⏳ Sending...";

pub fn stats(count: u64) -> String {
    format!("👥 Users stored: {count}")
}

pub fn broadcast_confirm(recipients: u64, preview: &str) -> String {
    format!("You're about to send to <b>{recipients}</b> users.\n\n{preview}\n\nConfirm?")
}

pub fn preview_text(body: &str) -> String {
    format!("📝 <b>Text:</b>\n{}", encode_text(body))
}

pub fn preview_media(label: &str, caption: Option<&str>) -> String {
    match caption {
        Some(caption) => format!("{label}\nCaption:\n{}", encode_text(caption)),
        None => label.to_string(),
    }
}

pub fn broadcast_tally(sent: usize, failed: usize) -> String {
    format!("✅ Broadcast finished.\nSent: {sent}\nFailed: {failed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_input_is_escaped() {
        let text = username_received("<b>x</b>", "Support", None);
        assert!(text.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(!text.contains("Any questions"));
    }

    #[test]
    fn test_support_line_included_when_configured() {
        let text = username_received("player42", "Anna", Some("https://t.me/anna"));
        assert!(text.contains("Message Anna"));
        assert!(text.contains("https://t.me/anna"));
    }

    #[test]
    fn test_preview_media_without_caption() {
        assert_eq!(preview_media("🖼️ <b>Photo</b>", None), "🖼️ <b>Photo</b>");
        assert!(preview_media("🎬 <b>Video</b>", Some("a&b")).contains("a&amp;b"));
    }

    #[test]
    fn test_tally_lists_both_counts() {
        assert_eq!(
            broadcast_tally(3, 1),
            "✅ Broadcast finished.\nSent: 3\nFailed: 1"
        );
    }
}
