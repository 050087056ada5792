//! Validation gates run ahead of the enrichment pipeline.
//!
//! Each gate is a pure predicate returning a [`ValidationVerdict`]; a chain is an ordered
//! slice of gates that stops at the first verdict with `should_continue == false`.

use crate::{
    correlation::CorrelationContext,
    models::{Notification, ProductSnapshot, PushMessage, ValidationVerdict},
};
use tracing::{error, info};

pub const MESSAGE_NOTIFICATION_TYPE: &str = "Message";
pub const ACCEPTED_EVENT_TYPES: [&str; 3] =
    ["ProductVariantAdded", "ProductImageAdded", "ProductCreated"];
pub const OPT_IN_ATTRIBUTE: &str = "generateDescription";

pub type GateCheck<T> = fn(&T, &CorrelationContext) -> ValidationVerdict;

pub struct Gate<T> {
    pub name: &'static str,
    pub check: GateCheck<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    Passed,
    Stopped {
        gate: &'static str,
        verdict: ValidationVerdict,
    },
}

impl ChainOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ChainOutcome::Passed)
    }
}

pub fn evaluate<T>(gates: &[Gate<T>], input: &T, ctx: &CorrelationContext) -> ChainOutcome {
    for gate in gates {
        let verdict = (gate.check)(input, ctx);
        if !verdict.should_continue {
            crate::metrics::gate_stopped(gate.name, verdict.is_valid);
            return ChainOutcome::Stopped {
                gate: gate.name,
                verdict,
            };
        }
    }
    ChainOutcome::Passed
}

pub const ENVELOPE_GATES: &[Gate<Option<PushMessage>>] = &[Gate {
    name: "message_presence",
    check: message_present,
}];

pub const NOTIFICATION_GATES: &[Gate<Notification>] = &[
    Gate {
        name: "notification_type",
        check: notification_type,
    },
    Gate {
        name: "event_type",
        check: event_type,
    },
    Gate {
        name: "product_id_present",
        check: product_id_present,
    },
];

pub const PRODUCT_GATES: &[Gate<ProductSnapshot>] = &[
    Gate {
        name: "product_data_complete",
        check: product_data_complete,
    },
    Gate {
        name: "attribute_opt_in",
        check: attribute_opt_in,
    },
];

pub fn message_present(message: &Option<PushMessage>, ctx: &CorrelationContext) -> ValidationVerdict {
    match message {
        Some(message) => {
            info!(
                target = "pixelphraser.gates",
                process_id = %ctx.process_id,
                push_message_id = message.message_id.as_deref().unwrap_or_default(),
                "push message received",
            );
            ValidationVerdict::proceed()
        }
        None => {
            error!(
                target = "pixelphraser.gates",
                process_id = %ctx.process_id,
                "missing push message",
            );
            ValidationVerdict::reject()
        }
    }
}

pub fn notification_type(notification: &Notification, ctx: &CorrelationContext) -> ValidationVerdict {
    if notification.notification_type == MESSAGE_NOTIFICATION_TYPE {
        info!(
            target = "pixelphraser.gates",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            notification_type = %notification.notification_type,
            "processing message",
        );
        return ValidationVerdict::proceed();
    }
    info!(
        target = "pixelphraser.gates",
        process_id = %ctx.process_id,
        message_id = %ctx.message_id,
        notification_type = %notification.notification_type,
        "skipping message",
    );
    ValidationVerdict::skip()
}

pub fn event_type(notification: &Notification, ctx: &CorrelationContext) -> ValidationVerdict {
    info!(
        target = "pixelphraser.gates",
        process_id = %ctx.process_id,
        message_id = %ctx.message_id,
        event_type = %notification.event_type,
        "event received",
    );
    if ACCEPTED_EVENT_TYPES.contains(&notification.event_type.as_str()) {
        return ValidationVerdict::proceed();
    }
    error!(
        target = "pixelphraser.gates",
        process_id = %ctx.process_id,
        message_id = %ctx.message_id,
        event_type = %notification.event_type,
        "invalid event type",
    );
    ValidationVerdict::skip()
}

pub fn product_id_present(notification: &Notification, ctx: &CorrelationContext) -> ValidationVerdict {
    if notification.product_id().is_some() {
        return ValidationVerdict::proceed();
    }
    error!(
        target = "pixelphraser.gates",
        process_id = %ctx.process_id,
        message_id = %ctx.message_id,
        "product id not found in message",
    );
    ValidationVerdict::skip()
}

pub fn product_data_complete(product: &ProductSnapshot, ctx: &CorrelationContext) -> ValidationVerdict {
    let product_type = product.product_type_id();
    let product_name = product.product_name();
    let image_url = product.image_url();
    info!(
        target = "pixelphraser.gates",
        process_id = %ctx.process_id,
        message_id = %ctx.message_id,
        product_name = product_name.unwrap_or_default(),
        "product name resolved",
    );

    if product_type.is_none() || product_name.is_none() || image_url.is_none() {
        error!(
            target = "pixelphraser.gates",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            product_type = ?product_type,
            product_name = ?product_name,
            image_url = ?image_url,
            "missing product data",
        );
        return ValidationVerdict::reject();
    }
    ValidationVerdict::proceed()
}

pub fn attribute_opt_in(product: &ProductSnapshot, ctx: &CorrelationContext) -> ValidationVerdict {
    if product.staged_attributes.is_empty() {
        error!(
            target = "pixelphraser.gates",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            "no product attributes found",
        );
        return ValidationVerdict::reject();
    }

    match product.attribute(OPT_IN_ATTRIBUTE) {
        Some(attribute) if attribute.is_enabled() => ValidationVerdict::proceed(),
        _ => {
            info!(
                target = "pixelphraser.gates",
                process_id = %ctx.process_id,
                message_id = %ctx.message_id,
                "automatic description generation not enabled",
            );
            ValidationVerdict::skip()
        }
    }
}
