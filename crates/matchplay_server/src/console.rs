//! Line-oriented transport over any async reader/writer pair.
//!
//! Input lines look like `<participant> <command...>`. Each line becomes one
//! [`InboundEvent`] handled on its own task. Events from different
//! participants run concurrently; events from the same participant run one
//! at a time in arrival order. Notices are written one per line as they
//! become available.

use crate::dispatch::{Action, Dispatcher, InboundEvent, Notice};
use crate::ParticipantId;
use std::collections::{HashMap, VecDeque};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

/// How notices are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `[recipient] message`, boards on following lines.
    #[default]
    Text,
    /// One JSON object per notice.
    Json,
}

/// Parses `<participant> <command...>`. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (from, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some(InboundEvent::new(ParticipantId::from(from), Action::parse(rest)))
}

/// Renders one notice in `format`.
pub fn render(notice: &Notice, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("[{}] {}", notice.recipient(), notice.message()),
        OutputFormat::Json => serde_json::to_string(notice)
            .unwrap_or_else(|e| format!("{{\"error\":\"unserializable notice: {}\"}}", e)),
    }
}

/// Console transport driving a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct Console {
    dispatcher: Dispatcher,
    format: OutputFormat,
}

impl Console {
    /// Creates a console writing in `format`.
    pub fn new(dispatcher: Dispatcher, format: OutputFormat) -> Self {
        Self { dispatcher, format }
    }

    /// Reads events from `input` until EOF, writing every notice to `output`.
    ///
    /// `background` carries notices raised outside request handling, such as
    /// idle timeouts. Whatever is queued there when input ends is flushed
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error from `input` or `output`.
    #[instrument(skip_all, fields(format = ?self.format))]
    pub async fn run<R, W>(
        &self,
        input: R,
        mut output: W,
        mut background: mpsc::Receiver<Notice>,
    ) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(input).lines();
        let mut lanes = Lanes::default();
        let mut background_open = true;
        info!("Console ready");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    if let Some(event) = parse_line(&line) {
                        lanes.submit(&self.dispatcher, event);
                    }
                }
                Some(joined) = lanes.running.join_next(), if !lanes.running.is_empty() => {
                    self.finish(&mut output, &mut lanes, joined).await?;
                }
                notice = background.recv(), if background_open => {
                    match notice {
                        Some(notice) => self.write(&mut output, &notice).await?,
                        None => background_open = false,
                    }
                }
            }
        }

        while let Some(joined) = lanes.running.join_next().await {
            self.finish(&mut output, &mut lanes, joined).await?;
        }
        while let Ok(notice) = background.try_recv() {
            self.write(&mut output, &notice).await?;
        }
        output.flush().await?;
        info!("Console finished");
        Ok(())
    }

    /// Writes a finished event's notices and starts that participant's next
    /// queued event.
    async fn finish<W>(
        &self,
        output: &mut W,
        lanes: &mut Lanes,
        joined: Result<Handled, JoinError>,
    ) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let (from, handled) = match joined {
            Ok(done) => done,
            Err(e) => {
                // Lane tasks only await the handler, so this is a runtime shutdown.
                warn!(error = %e, "Console task failed");
                return Ok(());
            }
        };
        match handled {
            Ok(notices) => {
                for notice in &notices {
                    self.write(output, notice).await?;
                }
            }
            Err(e) => warn!(participant = %from, error = %e, "Event handler failed"),
        }
        lanes.advance(&self.dispatcher, from);
        Ok(())
    }

    async fn write<W>(&self, output: &mut W, notice: &Notice) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut line = render(notice, self.format);
        line.push('\n');
        output.write_all(line.as_bytes()).await?;
        output.flush().await
    }
}

/// Participant and the notices its event produced.
type Handled = (ParticipantId, Result<Vec<Notice>, JoinError>);

/// In-flight events, at most one per participant, and each participant's
/// backlog.
#[derive(Default)]
struct Lanes {
    running: JoinSet<Handled>,
    /// Present while the participant has an event running.
    waiting: HashMap<ParticipantId, VecDeque<InboundEvent>>,
}

impl Lanes {
    fn submit(&mut self, dispatcher: &Dispatcher, event: InboundEvent) {
        if let Some(backlog) = self.waiting.get_mut(event.from()) {
            debug!(participant = %event.from(), queued = backlog.len() + 1, "Event queued");
            backlog.push_back(event);
            return;
        }
        self.waiting.insert(event.from().clone(), VecDeque::new());
        self.start(dispatcher, event);
    }

    fn advance(&mut self, dispatcher: &Dispatcher, from: ParticipantId) {
        match self.waiting.get_mut(&from).and_then(VecDeque::pop_front) {
            Some(next) => self.start(dispatcher, next),
            None => {
                self.waiting.remove(&from);
            }
        }
    }

    fn start(&mut self, dispatcher: &Dispatcher, event: InboundEvent) {
        let dispatcher = dispatcher.clone();
        let from = event.from().clone();
        // The inner task isolates a panicking handler so the lane still advances.
        self.running.spawn(async move {
            let handled = tokio::spawn(async move { dispatcher.handle(event).await }).await;
            (from, handled)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_splits_identity() {
        let event = parse_line("  alice turn 0 2 ").unwrap();
        assert_eq!(event.from(), &ParticipantId::from("alice"));
        assert_eq!(event.action(), &Action::Turn { row: 0, col: 2 });

        let bare = parse_line("bob").unwrap();
        assert_eq!(bare.action(), &Action::Text(String::new()));
        assert!(parse_line("   ").is_none());
    }
}
