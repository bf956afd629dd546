//! Serial-to-MIDI polling loop
//!
//! Owns the serial source, the note controller and the MIDI sink. Every
//! line is parsed, handled and sent before the next one is looked at, and
//! the hand-off pause blocks the loop.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::controller::{parse_line, NoteController};
use crate::error::Result;
use crate::midi::MidiMessage;
use crate::output::NoteSink;
use crate::serial::{ByteSource, LineSplitter};

/// Bridge between a clicker byte source and a MIDI sink
pub struct Bridge<S, O> {
    source: S,
    sink: O,
    controller: NoteController,
    splitter: LineSplitter,
    buf: Vec<u8>,
    handoff_delay: Duration,
    poll_interval: Duration,
}

impl<S: ByteSource, O: NoteSink> Bridge<S, O> {
    pub fn new(source: S, sink: O, config: &AppConfig) -> Self {
        Self {
            source,
            sink,
            controller: NoteController::from_config(config),
            // A status line is well under four chunks long
            splitter: LineSplitter::new(config.serial.chunk_size * 4),
            buf: vec![0; config.serial.chunk_size],
            handoff_delay: config.notes.handoff_delay(),
            poll_interval: config.serial.poll_interval(),
        }
    }

    pub fn controller(&self) -> &NoteController {
        &self.controller
    }

    pub fn sink(&self) -> &O {
        &self.sink
    }

    /// Take the source and sink back
    pub fn into_parts(self) -> (S, O) {
        (self.source, self.sink)
    }

    /// Poll until `shutdown` resolves or a transport fails
    ///
    /// The active note is released on the way out in both cases.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!("Listening for clicker input...");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping poll loop");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        break Err(e);
                    }
                }
            }
        };

        let released = self.release().await;
        outcome.and(released)
    }

    /// Read one chunk if bytes are waiting and process the lines it completes
    ///
    /// Returns the number of lines that produced a button event.
    pub async fn poll_once(&mut self) -> Result<usize> {
        if self.source.bytes_waiting()? == 0 {
            return Ok(0);
        }

        let n = self.source.read_chunk(&mut self.buf)?;
        if n == 0 {
            return Ok(0);
        }

        let lines = self.splitter.push(&self.buf[..n]);
        let mut handled = 0;
        for line in &lines {
            if self.process_line(line).await? {
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Parse, handle and send a single line
    ///
    /// Returns whether the line carried a button event.
    pub async fn process_line(&mut self, line: &str) -> Result<bool> {
        let Some(parsed) = parse_line(line) else {
            debug!("Ignoring line: {:?}", line);
            return Ok(false);
        };

        info!(
            "Button {:?} from device {} (address {})",
            parsed.event,
            parsed.device(),
            parsed.address
        );

        let messages = self.controller.handle(parsed.event);
        self.send_all(&messages).await?;
        Ok(true)
    }

    /// Silence the active note
    pub async fn release(&mut self) -> Result<()> {
        let pending = self.splitter.pending().len();
        if pending > 0 {
            debug!("Dropping {} bytes of an unfinished line", pending);
        }
        let messages = self.controller.release_all();
        self.send_all(&messages).await
    }

    /// Send in order, pausing between consecutive messages
    async fn send_all(&mut self, messages: &[MidiMessage]) -> Result<()> {
        for (i, message) in messages.iter().enumerate() {
            if i > 0 && !self.handoff_delay.is_zero() {
                sleep(self.handoff_delay).await;
            }
            debug!("Sending {}", message);
            self.sink.send(message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::collections::VecDeque;
    use std::time::Instant;

    #[derive(Default)]
    struct ChunkSource {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkSource {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            }
        }
    }

    impl ByteSource for ChunkSource {
        fn bytes_waiting(&mut self) -> Result<usize> {
            Ok(self.chunks.front().map(Vec::len).unwrap_or(0))
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
            let Some(mut chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    #[derive(Default)]
    struct TimedSink {
        sent: Vec<(Instant, MidiMessage)>,
        fail: bool,
    }

    impl NoteSink for TimedSink {
        fn send_raw(&mut self, data: &[u8]) -> Result<()> {
            if self.fail {
                return Err(BridgeError::Midi("port closed".to_string()));
            }
            let msg = MidiMessage::parse(data).expect("bridge sends note messages");
            self.sent.push((Instant::now(), msg));
            Ok(())
        }
    }

    impl TimedSink {
        fn messages(&self) -> Vec<MidiMessage> {
            self.sent.iter().map(|(_, m)| *m).collect()
        }
    }

    fn bridge(chunks: &[&[u8]]) -> Bridge<ChunkSource, TimedSink> {
        Bridge::new(ChunkSource::new(chunks), TimedSink::default(), &AppConfig::default())
    }

    #[tokio::test]
    async fn test_poll_without_data_does_nothing() {
        let mut bridge = bridge(&[]);
        assert_eq!(bridge.poll_once().await.unwrap(), 0);
        assert!(bridge.sink().sent.is_empty());
    }

    #[tokio::test]
    async fn test_press_then_stop() {
        let mut bridge = bridge(&[
            b"incoming: AABBCCDDEEFF --> 2\n",
            b"incoming: AABBCCDDEEFF --> ?\n",
        ]);

        assert_eq!(bridge.poll_once().await.unwrap(), 1);
        assert_eq!(bridge.sink().messages(), vec![MidiMessage::note_on(0, 62, 112)]);
        assert_eq!(bridge.controller().active_note(), Some(62));

        assert_eq!(bridge.poll_once().await.unwrap(), 1);
        assert_eq!(
            bridge.sink().messages()[1..],
            [MidiMessage::note_off(0, 62)]
        );
        assert_eq!(bridge.controller().active_note(), None);
    }

    #[tokio::test]
    async fn test_handoff_pauses_between_messages() {
        let mut bridge = bridge(&[
            b"incoming: AABBCCDDEEFF --> 1\nincoming: AABBCCDDEEFF --> 2\n",
        ]);

        assert_eq!(bridge.poll_once().await.unwrap(), 2);

        let sent = &bridge.sink().sent;
        assert_eq!(
            bridge.sink().messages(),
            vec![
                MidiMessage::note_on(0, 61, 112),
                MidiMessage::note_on(0, 62, 112),
                MidiMessage::note_off(0, 61),
            ]
        );
        assert!(sent[2].0 - sent[1].0 >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_noise_is_ignored() {
        let mut bridge = bridge(&[b"booting...\nincoming: AABBCC --> 1\n\n"]);
        assert_eq!(bridge.poll_once().await.unwrap(), 0);
        assert!(bridge.sink().sent.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_boundary_inside_line() {
        // 60-byte reads split the third line
        let stream: &[u8] = b"incoming: AABBCCDDEEFF --> 3\n\
                              incoming: AABBCCDDEEFF --> 4\n\
                              incoming: AABBCCDDEEFF --> 5\n";
        let mut bridge = bridge(&[stream]);

        assert_eq!(bridge.poll_once().await.unwrap(), 2);
        assert_eq!(bridge.controller().active_note(), Some(64));
        assert_eq!(bridge.poll_once().await.unwrap(), 1);
        assert_eq!(bridge.controller().active_note(), Some(65));
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let mut bridge = Bridge::new(
            ChunkSource::new(&[b"incoming: AABBCCDDEEFF --> 1\n"]),
            TimedSink {
                fail: true,
                ..Default::default()
            },
            &AppConfig::default(),
        );

        let err = bridge.poll_once().await.unwrap_err();
        assert!(matches!(err, BridgeError::Midi(_)));
    }

    /// Yields its chunks, then fails every read
    struct FailingSource {
        chunks: ChunkSource,
    }

    impl ByteSource for FailingSource {
        fn bytes_waiting(&mut self) -> Result<usize> {
            Ok(self.chunks.bytes_waiting()?.max(1))
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.chunks.bytes_waiting()? == 0 {
                return Err(BridgeError::Serial("device unplugged".to_string()));
            }
            self.chunks.read_chunk(buf)
        }
    }

    #[tokio::test]
    async fn test_serial_failure_stops_run_and_releases_note() {
        let mut bridge = Bridge::new(
            FailingSource {
                chunks: ChunkSource::new(&[b"incoming: AABBCCDDEEFF --> 4\n"]),
            },
            TimedSink::default(),
            &AppConfig::default(),
        );

        let err = bridge.run(std::future::pending::<()>()).await.unwrap_err();

        assert!(matches!(err, BridgeError::Serial(_)));
        assert_eq!(
            bridge.sink().messages(),
            vec![MidiMessage::note_on(0, 64, 112), MidiMessage::note_off(0, 64)]
        );
        assert_eq!(bridge.controller().active_note(), None);
    }

    #[tokio::test]
    async fn test_run_releases_note_on_shutdown() {
        let mut bridge = bridge(&[b"incoming: AABBCCDDEEFF --> 5\n"]);

        bridge
            .run(sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert_eq!(
            bridge.sink().messages(),
            vec![MidiMessage::note_on(0, 65, 112), MidiMessage::note_off(0, 65)]
        );
        assert_eq!(bridge.controller().active_note(), None);
    }
}
