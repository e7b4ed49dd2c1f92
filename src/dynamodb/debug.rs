use std::{
    future::Future,
    time::{Duration, Instant},
};

use tracing::{Instrument, Span};

/// Send one SDK request inside `span`, logging how long it took.
///
/// `delay` is an artificial pause before sending, used to exercise slow
/// paths against DynamoDB Local.
pub async fn send_dynamo_request<F, Fut, T, E, D>(
    span: Span,
    delay: Option<Duration>,
    send: F,
    describe_err: D,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: FnOnce(&E) -> String,
{
    async move {
        if let Some(delay) = delay.filter(|delay| !delay.is_zero()) {
            tracing::trace!(
                delay_ms = delay.as_millis(),
                "Applying debug DynamoDB delay"
            );
            tokio::time::sleep(delay).await;
        }
        let started = Instant::now();
        let result = send().await;
        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(_) => tracing::trace!(elapsed_ms, "DynamoDB request succeeded"),
            Err(err) => tracing::debug!(
                elapsed_ms,
                error = %describe_err(err),
                "DynamoDB request failed"
            ),
        }
        result
    }
    .instrument(span)
    .await
}
