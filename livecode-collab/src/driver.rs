//! Async event loop for a headless or server-side peer.
//!
//! Interleaves the four event sources of a collaborating editor on one
//! task, which keeps the single-threaded contract of the session:
//!
//! ```text
//!   commands  (local user actions) ──┐
//!   inbound   (peer messages)      ──┤
//!   interval  (frame ticks)        ──┼──► select! ──► CollabSession
//!   sleep     (selection debounce) ──┘
//! ```
//!
//! Editor notifications are drained after every step, so the echo of a
//! remote apply is always seen before the next frame tick.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::editor::{EditorBuffer, EditorEvent, MemoryEditor};
use crate::live::SyncError;
use crate::protocol::{InboundEvent, ProtocolError, Transport};
use crate::session::CollabSession;

/// Editor whose notifications are pulled rather than pushed.
pub trait EventQueue {
    fn drain_events(&mut self) -> Vec<EditorEvent>;
}

impl EventQueue for MemoryEditor {
    fn drain_events(&mut self) -> Vec<EditorEvent> {
        MemoryEditor::drain_events(self)
    }
}

/// A local user action to run against the editor.
pub type EditorCommand<E> = Box<dyn FnOnce(&mut E) + Send>;

/// Owns a session and its editor and runs them on the current task.
///
/// Frame ticks follow the session's
/// [`frame_interval`](crate::config::SyncConfig::frame_interval).
pub struct Driver<E, T: Transport> {
    session: CollabSession<T>,
    editor: E,
    frame_interval: Duration,
}

impl<E, T> Driver<E, T>
where
    E: EditorBuffer + EventQueue,
    T: Transport,
{
    pub fn new(session: CollabSession<T>, editor: E) -> Self {
        let frame_interval = session.config().frame_interval;
        Self {
            session,
            editor,
            frame_interval,
        }
    }

    pub fn session(&self) -> &CollabSession<T> {
        &self.session
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn into_parts(self) -> (CollabSession<T>, E) {
        (self.session, self.editor)
    }

    /// Run until `commands` closes, then send what is still pending.
    ///
    /// Recoverable sync errors are logged and the loop continues; a
    /// transport error or a closed inbound channel ends it.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<EditorCommand<E>>,
        mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
    ) -> Result<(), SyncError> {
        let mut frame = time::interval(self.frame_interval);
        frame.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.drain_editor()?;
            let deadline = self.session.next_deadline().map(Instant::from_std);

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => command(&mut self.editor),
                    None => break,
                },
                event = inbound.recv() => match event {
                    Some(event) => {
                        let result = self.session.handle_inbound(&mut self.editor, &event);
                        recover(result)?;
                    }
                    None => {
                        log::info!("Inbound channel closed; stopping driver");
                        return Err(SyncError::Transport(ProtocolError::ConnectionClosed));
                    }
                },
                _ = frame.tick() => {
                    recover(self.session.on_frame().map(|_| ()))?;
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    recover(self.session.poll(now()))?;
                }
            }
        }

        self.drain_editor()?;
        recover(self.session.on_frame().map(|_| ()))?;
        log::info!("Driver stopped");
        Ok(())
    }

    fn drain_editor(&mut self) -> Result<(), SyncError> {
        for event in self.editor.drain_events() {
            let result = self.session.handle_editor_event(&self.editor, &event, now());
            recover(result)?;
        }
        Ok(())
    }
}

/// Tokio's clock as a std instant, so paused test time reaches the session.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Log errors the session recovers from; pass the rest up.
fn recover(result: Result<(), SyncError>) -> Result<(), SyncError> {
    match result {
        Err(SyncError::Transport(e)) => Err(SyncError::Transport(e)),
        Err(e) => {
            log::warn!("{e}");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::protocol::{ChannelTransport, SyncMessage};
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn test_driver_sends_edits_and_stops() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<EditorCommand<MemoryEditor>>();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();

        let doc = Uuid::new_v4();
        let mut session = CollabSession::new(SyncConfig::default(), ChannelTransport::new(Uuid::new_v4(), "Ada", out_tx));
        session.open_document(doc, "ab");
        let mut driver = Driver::new(session, MemoryEditor::new("ab"));

        let task = tokio::spawn(async move {
            let result = driver.run(cmd_rx, in_rx).await;
            (driver, result)
        });

        cmd_tx.send(Box::new(|e: &mut MemoryEditor| e.type_at(1, "c"))).unwrap();
        let frame = out_rx.recv().await.unwrap();
        let op = SyncMessage::decode(&frame).unwrap().operation_payload().unwrap();
        assert_eq!(op.apply("ab").unwrap(), "acb");

        drop(cmd_tx);
        let (driver, result) = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(driver.editor().text(), "acb");
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_uses_configured_frame_interval() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<EditorCommand<MemoryEditor>>();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();

        let config = SyncConfig {
            frame_interval: Duration::from_millis(200),
            ..SyncConfig::default()
        };
        let doc = Uuid::new_v4();
        let mut session = CollabSession::new(config, ChannelTransport::new(Uuid::new_v4(), "Ada", out_tx));
        session.open_document(doc, "ab");
        let mut driver = Driver::new(session, MemoryEditor::new("ab"));
        let _task = tokio::spawn(async move { driver.run(cmd_rx, in_rx).await });

        // Let the first, immediate tick pass before editing.
        time::sleep(Duration::from_millis(10)).await;
        cmd_tx.send(Box::new(|e: &mut MemoryEditor| e.type_at(2, "c"))).unwrap();

        time::sleep(Duration::from_millis(100)).await;
        assert!(out_rx.try_recv().is_err());

        time::sleep(Duration::from_millis(150)).await;
        let frame = out_rx.try_recv().unwrap();
        let op = SyncMessage::decode(&frame).unwrap().operation_payload().unwrap();
        assert_eq!(op.apply("ab").unwrap(), "abc");
    }

    #[test]
    fn test_recover_keeps_transport_errors() {
        assert!(recover(Err(SyncError::DesyncDetected("x".into()))).is_ok());
        assert!(recover(Err(SyncError::Transport(ProtocolError::ConnectionClosed))).is_err());
    }
}
