//! Outbound notifications.
//!
//! The engine reports what it did through a channel instead of calling back
//! into the embedding application. Sends are fire-and-forget: a dropped
//! receiver never blocks or fails an engine operation.

use crate::music::Instrument;
use crate::playback::NoteSource;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};

/// Playback transition reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Started,
    Paused,
    Resumed,
    /// Stopped on request.
    Stopped,
    /// Reached the final event on its own.
    Ended,
}

/// Accompaniment part that can be toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccompanimentPart {
    Drums,
    Bass,
    Chords,
    Metronome,
}

/// An event reported to the embedding application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    NoteTriggered {
        pitch: u8,
        name: String,
        velocity: u8,
        source: NoteSource,
        x: Option<f32>,
        y: Option<f32>,
    },
    HistoryChanged {
        strokes: usize,
        undo_depth: usize,
        redo_depth: usize,
    },
    Playback {
        state: PlaybackStatus,
        scan_x: f32,
        progress: f32,
    },
    AccompanimentToggled {
        part: AccompanimentPart,
        enabled: bool,
    },
    InstrumentChanged {
        instrument: Instrument,
    },
    LiveSoundToggled {
        enabled: bool,
    },
}

/// Sending half of the notification channel.
///
/// Cloning is cheap; a detached notifier silently drops everything.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<Sender<Notification>>,
}

impl Notifier {
    /// Creates a connected notifier and its receiving end.
    pub fn channel() -> (Self, Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Creates a notifier with no listener.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Sends a notification, ignoring a disconnected receiver.
    pub fn send(&self, notification: Notification) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(notification);
        }
    }
}
