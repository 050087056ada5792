//! Entry point for push deliveries.
//!
//! Every delivery walks the gate chains in order. A stopping gate acknowledges with `200` and an
//! empty body. Once every gate passes, the enrichment is handed to [`EnrichmentJobs`] and the
//! handler returns `200` without waiting for it; later failures only reach the logs and the job
//! history. Errors raised before that point answer `500` with an empty body.
//!
//! [`EnrichmentJobs`]: crate::jobs::EnrichmentJobs

use crate::{
    api::AppState,
    commercetools::StoreError,
    correlation::CorrelationContext,
    decoder::{decode_message_data, parse_notification},
    gates::{self, ChainOutcome, ENVELOPE_GATES, NOTIFICATION_GATES, PRODUCT_GATES},
    models::PushEnvelope,
    pipeline::{EnrichmentRequest, PipelineError},
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("product lookup failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// `POST /event`
pub async fn receive_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, DispatchError> {
    crate::metrics::inc_requests("/event");
    let ctx = CorrelationContext::new();

    dispatch(&state, &body, ctx.clone()).await.inspect_err(|err| {
        error!(
            target = "pixelphraser.dispatcher",
            process_id = %ctx.process_id,
            error = %err,
            "event processing failed before acknowledgment",
        );
    })
}

async fn dispatch(
    state: &AppState,
    body: &[u8],
    ctx: CorrelationContext,
) -> Result<StatusCode, DispatchError> {
    // An unreadable envelope is treated like one without a message.
    let envelope = serde_json::from_slice::<PushEnvelope>(body).unwrap_or_else(|err| {
        warn!(
            target = "pixelphraser.dispatcher",
            process_id = %ctx.process_id,
            error = %err,
            "request body is not a push envelope",
        );
        PushEnvelope::default()
    });

    if stopped(gates::evaluate(ENVELOPE_GATES, &envelope.message, &ctx), &ctx) {
        return Ok(StatusCode::OK);
    }
    let Some(message) = envelope.message else {
        return Ok(StatusCode::OK);
    };

    let decoded = decode_message_data(&message, &ctx);
    let Some(data) = decoded.data.filter(|_| decoded.should_continue) else {
        return Ok(StatusCode::OK);
    };
    let Some(notification) = parse_notification(&data, &ctx) else {
        return Ok(StatusCode::OK);
    };

    let ctx = ctx.with_message_id(notification.id.clone());
    if stopped(gates::evaluate(NOTIFICATION_GATES, &notification, &ctx), &ctx) {
        return Ok(StatusCode::OK);
    }
    let Some(product_id) = notification.product_id() else {
        return Ok(StatusCode::OK);
    };

    let product = state.catalog.fetch_product_by_id(product_id, &ctx).await?;
    if stopped(gates::evaluate(PRODUCT_GATES, &product, &ctx), &ctx) {
        return Ok(StatusCode::OK);
    }

    let request = EnrichmentRequest::from_snapshot(&product)?;
    info!(
        target = "pixelphraser.dispatcher",
        process_id = %ctx.process_id,
        message_id = %ctx.message_id,
        product_id = %request.product_id,
        "all gates passed, acknowledging and starting enrichment",
    );
    // Detached: the response does not wait for the enrichment to settle.
    drop(state.jobs.submit(request, ctx).await);
    Ok(StatusCode::OK)
}

fn stopped(outcome: ChainOutcome, ctx: &CorrelationContext) -> bool {
    match outcome {
        ChainOutcome::Passed => false,
        ChainOutcome::Stopped { gate, verdict } => {
            info!(
                target = "pixelphraser.dispatcher",
                process_id = %ctx.process_id,
                message_id = %ctx.message_id,
                gate,
                is_valid = verdict.is_valid,
                "acknowledging without enrichment",
            );
            true
        }
    }
}
