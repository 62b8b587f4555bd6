//! Reader and writer tasks wrapped around the protocol streams.
//!
//! The reader task owns the input stream and forwards whole frames, so the
//! host loop can wait on other events without abandoning a half-read frame.
//! The writer task owns the output stream and writes responses strictly in the
//! order their requests were read, one complete frame at a time.

use axhost_protocol::{
    ErrorCategory, ErrorDescriptor, FrameError, FrameLimit, FrameRead, FrameReader, FrameWriter,
    ResponseEnvelope,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::HOST_TARGET;
use super::errors::HostError;
use crate::dispatch::Dispatcher;
use crate::registry::OperationOutcome;

/// Written when even the error envelope for an unencodable response fails.
const ENCODING_FAILURE: &[u8] = br#"{"success":false,"data":null,"error":{"operation":null,"category":"handler","message":"response could not be encoded"}}"#;

pub(crate) type FrameResult = Result<FrameRead, FrameError>;

/// A response slot queued in request order.
pub(crate) enum PendingResponse {
    /// Answer known without running a handler.
    Ready(ResponseEnvelope),
    /// Answer produced by a spawned handler task.
    Running {
        operation: String,
        task: JoinHandle<ResponseEnvelope>,
        permit: OwnedSemaphorePermit,
    },
}

/// Spawns the task that reads frames from `input`.
///
/// The task stops after forwarding the end of the channel or a fault.
pub(crate) fn spawn_reader<R>(
    input: R,
    limit: FrameLimit,
) -> (JoinHandle<()>, mpsc::Receiver<FrameResult>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (frames_tx, frames_rx) = mpsc::channel(1);
    let task = tokio::spawn(async move {
        let mut reader = FrameReader::new(input, limit);
        loop {
            let read = reader.read_frame().await;
            let more = matches!(read, Ok(FrameRead::Frame(_)));
            if frames_tx.send(read).await.is_err() || !more {
                break;
            }
        }
    });
    (task, frames_rx)
}

/// The writer side of the pipeline.
pub(crate) struct ResponseWriter {
    pub(crate) limit: FrameLimit,
    pub(crate) dispatcher: Dispatcher,
    /// Stops the writer at the next frame boundary, dropping what is queued.
    pub(crate) abandon: CancellationToken,
}

impl ResponseWriter {
    /// Spawns the task that writes queued responses to `output`.
    ///
    /// The task ends once every sender is dropped and the queue is empty, at
    /// the first write failure, or when abandoned. A frame that has started
    /// is always finished.
    pub(crate) fn spawn<W>(
        self,
        output: W,
        pending: mpsc::Receiver<PendingResponse>,
    ) -> JoinHandle<Result<(), HostError>>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer = FrameWriter::new(output, self.limit);
        tokio::spawn(self.write_responses(writer, pending))
    }

    async fn write_responses<W>(
        self,
        mut writer: FrameWriter<W>,
        mut pending: mpsc::Receiver<PendingResponse>,
    ) -> Result<(), HostError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        loop {
            let next = tokio::select! {
                biased;
                () = self.abandon.cancelled() => None,
                received = pending.recv() => received,
            };
            let Some(slot) = next else {
                break;
            };
            let Some((envelope, permit)) = self.resolve(slot).await else {
                break;
            };
            let payload = encode(&envelope, self.limit);
            writer.write_frame(&payload).await.map_err(|fault| {
                error!(target: HOST_TARGET, error = %fault, "failed to write response frame");
                HostError::Write(fault)
            })?;
            debug!(
                target: HOST_TARGET,
                bytes = payload.len(),
                success = envelope.is_success(),
                "response written"
            );
            drop(permit);
        }
        Ok(())
    }

    /// Produces the envelope for a queued slot, or `None` once abandoned.
    async fn resolve(
        &self,
        slot: PendingResponse,
    ) -> Option<(ResponseEnvelope, Option<OwnedSemaphorePermit>)> {
        match slot {
            PendingResponse::Ready(envelope) => Some((envelope, None)),
            PendingResponse::Running {
                operation,
                task,
                permit,
            } => tokio::select! {
                biased;
                () = self.abandon.cancelled() => None,
                envelope = settle(&self.dispatcher, &operation, task) => Some((envelope, Some(permit))),
            },
        }
    }
}

/// Waits for a handler task and converts how it ended into a response.
async fn settle(
    dispatcher: &Dispatcher,
    operation: &str,
    task: JoinHandle<ResponseEnvelope>,
) -> ResponseEnvelope {
    match task.await {
        Ok(envelope) => envelope,
        Err(join_error) if join_error.is_panic() => {
            dispatcher.panicked(operation, &*join_error.into_panic())
        }
        Err(join_error) => dispatcher.complete(
            operation,
            OperationOutcome::failure(format!("operation did not complete: {join_error}")),
        ),
    }
}

/// Encodes `envelope`, substituting an error envelope if it cannot be framed.
fn encode(envelope: &ResponseEnvelope, limit: FrameLimit) -> Vec<u8> {
    let message = match envelope.to_bytes() {
        Ok(payload) if u32::try_from(payload.len()).is_ok_and(|length| limit.admits(length)) => {
            return payload;
        }
        Ok(payload) => format!(
            "response of {} bytes exceeds the {} byte frame limit",
            payload.len(),
            limit.get()
        ),
        Err(encode_error) => format!("response could not be encoded: {encode_error}"),
    };
    error!(target: HOST_TARGET, reason = %message, "replacing unframeable response");
    ResponseEnvelope::failure(ErrorDescriptor::new(ErrorCategory::Handler, message))
        .to_bytes()
        .unwrap_or_else(|_| ENCODING_FAILURE.to_vec())
}
