use bytes::Bytes;
use futures_util::Stream;
use futures_util::StreamExt;
use runpanel_core::config::AppMode;
use runpanel_core::events::decode_event;
use runpanel_core::events::RunEvent;
use runpanel_core::form::FileInput;
use serde_json::Map;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::RunLauncher;
use crate::contracts::select_run_kind;
use crate::error::ExecError;
use crate::sse::SseChunk;
use crate::sse::SseDecoder;

/// What the stream loop hands to its caller for each data-bearing chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(RunEvent),
    Rejected { reason: String },
}

/// Accumulator threaded through one stream loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub events: usize,
    pub rejected: usize,
    /// Chunks without a `data` field.
    pub skipped: usize,
    /// Message answers with inline image references for `message_file`
    /// events. Never merged into the displayed text.
    pub transcript: String,
    pub cancelled: bool,
}

impl StreamSummary {
    fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    fn record(&mut self, event: &RunEvent) {
        self.events += 1;
        match event {
            RunEvent::MessageFile { url } => {
                self.transcript.push_str(&format!("<img src=\"{url}\" />"));
            }
            RunEvent::Message { answer } => self.transcript.push_str(answer),
            _ => {}
        }
    }
}

/// Read a response body to completion, decoding each SSE chunk into an event.
///
/// Malformed chunks are reported as [`StreamItem::Rejected`] and the loop
/// keeps going. A transport error ends the loop. Cancellation ends it with
/// `cancelled` set and no error.
pub async fn consume_stream<S, F>(
    mut body: S,
    cancel: &CancellationToken,
    mut on_item: F,
) -> Result<StreamSummary, ExecError>
where
    S: Stream<Item = Result<Bytes, ExecError>> + Unpin,
    F: FnMut(StreamItem),
{
    let mut decoder = SseDecoder::new();
    let mut summary = StreamSummary::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(events = summary.events, "stream cancelled");
                summary.cancelled = true;
                return Ok(summary);
            }
            next = body.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                for chunk in decoder.push(&bytes) {
                    handle_chunk(chunk, &mut summary, &mut on_item);
                }
            }
            Some(Err(err)) => {
                warn!(error = %err, "stream read failed");
                return Err(err);
            }
            None => break,
        }
    }

    if let Some(chunk) = decoder.finish() {
        handle_chunk(chunk, &mut summary, &mut on_item);
    }
    if !summary.transcript.is_empty() {
        debug!(transcript = %summary.transcript, "message transcript");
    }
    debug!(
        events = summary.events,
        rejected = summary.rejected,
        skipped = summary.skipped,
        "stream finished"
    );
    Ok(summary)
}

fn handle_chunk<F>(chunk: SseChunk, summary: &mut StreamSummary, on_item: &mut F)
where
    F: FnMut(StreamItem),
{
    let Some(data) = chunk.data.filter(|data| !data.is_empty()) else {
        summary.skipped += 1;
        return;
    };
    match decode_event(&data) {
        Ok(event) => {
            summary.record(&event);
            on_item(StreamItem::Event(event));
        }
        Err(err) => {
            warn!(error = %err, "dropping malformed chunk");
            summary.rejected += 1;
            on_item(StreamItem::Rejected {
                reason: err.to_string(),
            });
        }
    }
}

/// Upload every file input and add its reference to `inputs`. A `file-list`
/// field becomes an array; a single file field becomes one object.
pub async fn upload_files<L>(
    launcher: &L,
    files: Vec<FileInput>,
    inputs: &mut Map<String, Value>,
) -> Result<(), ExecError>
where
    L: RunLauncher + ?Sized,
{
    for file in files {
        let mut uploaded = Vec::with_capacity(file.paths.len());
        for path in file.paths {
            let upload = launcher.upload(path).await?;
            debug!(variable = %file.variable, upload_file_id = %upload.id, "file uploaded");
            uploaded.push(upload.input_value());
        }
        let value = if file.multiple {
            Value::Array(uploaded)
        } else {
            match uploaded.pop() {
                Some(value) => value,
                None => continue,
            }
        };
        inputs.insert(file.variable, value);
    }
    Ok(())
}

/// Resolve the run kind for `mode`, upload any files, start the run and
/// consume its stream.
pub async fn trigger_run<L, F>(
    launcher: &L,
    mode: Option<AppMode>,
    mut inputs: Map<String, Value>,
    files: Vec<FileInput>,
    cancel: &CancellationToken,
    on_item: F,
) -> Result<StreamSummary, ExecError>
where
    L: RunLauncher + ?Sized,
    F: FnMut(StreamItem),
{
    let mode = mode.ok_or(ExecError::UnknownMode)?;
    let kind = select_run_kind(mode)?;

    if !files.is_empty() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamSummary::cancelled()),
            uploaded = upload_files(launcher, files, &mut inputs) => uploaded?,
        }
    }
    info!(kind = kind.label(), inputs = inputs.len(), "starting run");

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(StreamSummary::cancelled()),
        body = launcher.launch(kind, inputs) => body?,
    };
    consume_stream(body, cancel, on_item).await
}
