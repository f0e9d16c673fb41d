use std::time::Duration;

use futures::{Stream, StreamExt};
use health::{ComponentStatus, HealthHandle};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::converter::MessageRowConverter;
use crate::message::RawMessage;
use crate::model::{BatchUpdate, Outcome};

const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(5);

/// Pulls batches of raw messages from a stream, converts them one at a time and
/// pushes the results onto a bounded channel.
///
/// A single task does all the work, so updates come out in the order batches
/// came in. When the channel is full the task waits, which in turn stops it from
/// pulling more input. The output channel closes once the input stream ends.
pub struct ConversionStage {
    converter: MessageRowConverter,
    buffer_size: usize,
    liveness: Option<HealthHandle>,
    heartbeat: Duration,
    /// Set after a dropped batch, cleared by the next emitted update that
    /// converted something or had no failures.
    failing: bool,
}

impl ConversionStage {
    pub fn new(converter: MessageRowConverter, buffer_size: usize) -> Self {
        Self {
            converter,
            buffer_size,
            liveness: None,
            heartbeat: DEFAULT_HEARTBEAT,
            failing: false,
        }
    }

    /// Report to `liveness` every `heartbeat` while waiting on input or output,
    /// and after each update.
    pub fn with_liveness(mut self, liveness: HealthHandle, heartbeat: Duration) -> Self {
        self.liveness = Some(liveness);
        self.heartbeat = heartbeat;
        self
    }

    /// Start the stage on the current tokio runtime.
    ///
    /// `cancel` only reaches payload decoding: a cancelled stage keeps draining
    /// its input, acking every message without producing rows. Close the input
    /// stream to stop it.
    pub fn spawn<S>(self, cancel: CancellationToken, input: S) -> mpsc::Receiver<BatchUpdate>
    where
        S: Stream<Item = Vec<RawMessage>> + Send + 'static,
    {
        // tokio channels need a non-zero capacity
        let (tx, rx) = mpsc::channel(self.buffer_size.max(1));
        tokio::spawn(self.run(cancel, input, tx));
        rx
    }

    async fn run<S>(mut self, cancel: CancellationToken, input: S, out: mpsc::Sender<BatchUpdate>)
    where
        S: Stream<Item = Vec<RawMessage>> + Send,
    {
        let mut input = std::pin::pin!(input);
        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let batch = tokio::select! {
                batch = input.next() => batch,
                _ = heartbeat.tick() => {
                    if !self.failing {
                        self.report_healthy();
                    }
                    continue;
                }
            };

            let Some(batch) = batch else {
                break;
            };

            match self.converter.convert_batch(&cancel, batch) {
                Ok(update) => {
                    let clean = update.rows().next().is_some()
                        || !update
                            .outcomes()
                            .iter()
                            .any(|o| matches!(o.outcome, Outcome::Failed(_)));

                    if !self.emit(&out, &mut heartbeat, update).await {
                        warn!("conversion output receiver dropped, stopping stage");
                        return;
                    }
                    // An update that only failed says nothing about our health
                    if clean {
                        self.failing = false;
                        self.report_healthy();
                    }
                }
                Err(e) => {
                    // Not emitted, so none of the batch is acked and the log redelivers it
                    error!(error = %e, "dropping batch after repeated conversion failures");
                    self.failing = true;
                    if let Some(liveness) = &self.liveness {
                        liveness.report_status(ComponentStatus::Unhealthy);
                    }
                }
            }
        }

        info!("input exhausted, closing conversion stage output");
    }

    /// Wait for room on the output, still heartbeating while the writer is
    /// slow. Returns false once the receiver is gone.
    async fn emit(
        &self,
        out: &mpsc::Sender<BatchUpdate>,
        heartbeat: &mut Interval,
        update: BatchUpdate,
    ) -> bool {
        let permit = loop {
            tokio::select! {
                permit = out.reserve() => break permit,
                _ = heartbeat.tick() => {
                    if !self.failing {
                        self.report_healthy();
                    }
                }
            }
        };

        match permit {
            Ok(permit) => {
                permit.send(update);
                true
            }
            Err(_) => false,
        }
    }

    fn report_healthy(&self) {
        if let Some(liveness) = &self.liveness {
            liveness.report_healthy();
        }
    }
}

/// Convert a stream of batches with default settings and no health reporting.
pub fn convert<S>(
    cancel: CancellationToken,
    input: S,
    buffer_size: usize,
    converter: MessageRowConverter,
) -> mpsc::Receiver<BatchUpdate>
where
    S: Stream<Item = Vec<RawMessage>> + Send + 'static,
{
    ConversionStage::new(converter, buffer_size).spawn(cancel, input)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::stream;
    use health::HealthRegistry;
    use time::macros::datetime;

    use super::*;
    use crate::compress::NoOpCompressor;
    use crate::message::{ConsumerId, MessageId};

    fn batch(prefix: &str, len: usize) -> Vec<RawMessage> {
        (0..len)
            .map(|i| {
                RawMessage::new(
                    MessageId::new(format!("{prefix}-{i}")),
                    ConsumerId(0),
                    "{}",
                    datetime!(2024-01-01 00:00 UTC),
                )
            })
            .collect()
    }

    fn converter() -> MessageRowConverter {
        MessageRowConverter::new(Arc::new(NoOpCompressor))
    }

    #[tokio::test]
    async fn zero_buffer_size_still_works() {
        let input = stream::iter(vec![batch("a", 1), batch("b", 2)]);
        let mut out = convert(CancellationToken::new(), input, 0, converter());

        assert_eq!(out.recv().await.unwrap().len(), 1);
        assert_eq!(out.recv().await.unwrap().len(), 2);
        assert!(out.recv().await.is_none());
    }

    #[tokio::test]
    async fn empty_input_closes_output() {
        let input = stream::iter(Vec::<Vec<RawMessage>>::new());
        let mut out = convert(CancellationToken::new(), input, 4, converter());
        assert!(out.recv().await.is_none());
    }

    #[tokio::test]
    async fn reports_healthy_after_each_update() {
        let registry = HealthRegistry::new("liveness");
        let handle = registry.register("conversion".to_string(), time::Duration::seconds(30));
        assert!(!registry.get_status().healthy);

        let input = stream::iter(vec![batch("a", 1)]);
        let mut out = ConversionStage::new(converter(), 1)
            .with_liveness(handle, Duration::from_secs(60))
            .spawn(CancellationToken::new(), input);

        assert!(out.recv().await.is_some());
        assert!(out.recv().await.is_none());
        assert!(registry.get_status().healthy);
    }
}
