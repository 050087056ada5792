use crate::{
    correlation::CorrelationContext,
    models::{Notification, PushMessage},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::{error, info};

/// Result of unpacking the `data` field of a push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedData {
    pub data: Option<String>,
    pub should_continue: bool,
}

impl DecodedData {
    fn empty() -> Self {
        Self {
            data: None,
            should_continue: false,
        }
    }
}

/// Base64-decodes and trims the message payload.
///
/// Absent, undecodable, non-UTF-8 and blank payloads all come back as
/// `{ data: None, should_continue: false }`; nothing here is allowed to fail the request.
pub fn decode_message_data(message: &PushMessage, ctx: &CorrelationContext) -> DecodedData {
    let Some(raw) = message.data.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) else {
        error!(
            target = "pixelphraser.decoder",
            process_id = %ctx.process_id,
            "no data found in push message",
        );
        return DecodedData::empty();
    };

    let bytes = match BASE64.decode(raw) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(
                target = "pixelphraser.decoder",
                process_id = %ctx.process_id,
                error = %err,
                "push message data is not valid base64",
            );
            return DecodedData::empty();
        }
    };

    let decoded = match String::from_utf8(bytes) {
        Ok(text) => text.trim().to_string(),
        Err(err) => {
            error!(
                target = "pixelphraser.decoder",
                process_id = %ctx.process_id,
                error = %err,
                "push message data is not valid utf-8",
            );
            return DecodedData::empty();
        }
    };

    if decoded.is_empty() {
        error!(
            target = "pixelphraser.decoder",
            process_id = %ctx.process_id,
            "push message data decoded to an empty payload",
        );
        return DecodedData::empty();
    }

    info!(
        target = "pixelphraser.decoder",
        process_id = %ctx.process_id,
        decoded = %decoded,
        "decoded push message data",
    );
    DecodedData {
        data: Some(decoded),
        should_continue: true,
    }
}

/// Parses decoded data into a notification. Malformed JSON is a skip, not a failure.
pub fn parse_notification(data: &str, ctx: &CorrelationContext) -> Option<Notification> {
    match serde_json::from_str::<Notification>(data) {
        Ok(notification) => Some(notification),
        Err(err) => {
            error!(
                target = "pixelphraser.decoder",
                process_id = %ctx.process_id,
                error = %err,
                "decoded data is not a notification",
            );
            None
        }
    }
}
