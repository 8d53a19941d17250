//! Reading session state machine.
//!
//! Reads the page one unit at a time. A unit's natural completion is the only
//! thing that advances the cursor; cancellation and failure stop the loop
//! where it is. Every start bumps a generation counter so a continuation
//! left over from an earlier run can never advance the current one.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use voxpage_core::messages::{STATUS_FINISHED, STATUS_PAUSED, STATUS_READING};
use voxpage_core::types::ReadingSettings;
use voxpage_speech::{Completion, SpeechController, Utterance};

use crate::dom::{NodeId, SharedDocument};
use crate::highlight::Highlighter;
use crate::sequence::{compute_sequence, locate, ReadableUnit};
use crate::status::{emit_status, RuntimeSender};

/// Status published when speech output fails mid-page.
pub const STATUS_SPEECH_FAILED: &str = "Reading stopped: speech output failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingState {
    /// Nothing read yet, or the page was finished.
    Idle,
    /// Speaking units in order.
    Reading,
    /// Stopped part way; the cursor is kept for resume.
    Paused,
}

impl fmt::Display for ReadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingState::Idle => write!(f, "Idle"),
            ReadingState::Reading => write!(f, "Reading"),
            ReadingState::Paused => write!(f, "Paused"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    node: NodeId,
    /// Last known position, used when the node has left the page.
    position: usize,
}

impl Cursor {
    fn at(unit: &ReadableUnit) -> Self {
        Self {
            node: unit.node,
            position: unit.position,
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    state: ReadingState,
    cursor: Option<Cursor>,
    generation: u64,
    settings: ReadingSettings,
}

struct SessionShared {
    document: SharedDocument,
    speech: Arc<SpeechController>,
    highlighter: Highlighter,
    runtime: RuntimeSender,
    inner: Mutex<SessionInner>,
}

/// Sequential page reader for one tab.
#[derive(Clone)]
pub struct ReadingSession {
    shared: Arc<SessionShared>,
}

impl ReadingSession {
    pub fn new(
        document: SharedDocument,
        speech: Arc<SpeechController>,
        highlighter: Highlighter,
        runtime: RuntimeSender,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                document,
                speech,
                highlighter,
                runtime,
                inner: Mutex::new(SessionInner {
                    state: ReadingState::Idle,
                    cursor: None,
                    generation: 0,
                    settings: ReadingSettings::default(),
                }),
            }),
        }
    }

    pub fn state(&self) -> ReadingState {
        self.shared.lock().state
    }

    pub fn is_reading(&self) -> bool {
        self.state() == ReadingState::Reading
    }

    /// Text node the session will read (or is reading) next.
    pub fn current_unit(&self) -> Option<NodeId> {
        self.shared.lock().cursor.map(|c| c.node)
    }

    /// Start or resume reading. Returns `false` when already reading.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, settings: ReadingSettings) -> bool {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.state == ReadingState::Reading {
            tracing::debug!("Already reading; start ignored");
            return false;
        }

        let units = shared.sequence();
        let Some(unit) = resolve(&units, inner.cursor) else {
            // Nothing readable counts as the end of the page.
            shared.finish(inner);
            return true;
        };

        inner.state = ReadingState::Reading;
        inner.cursor = Some(Cursor::at(unit));
        inner.generation += 1;
        inner.settings = settings;
        let generation = inner.generation;
        drop(inner);

        tracing::info!(unit = unit.position, units = units.len(), "Reading started");
        emit_status(&shared.runtime, STATUS_READING);
        tokio::spawn(SessionShared::run(Arc::clone(shared), generation));
        true
    }

    /// Stop reading, keeping the cursor for the next `start`.
    ///
    /// Announces the paused state even when nothing was being read.
    pub fn pause(&self) {
        let shared = &self.shared;
        let was_reading = {
            let mut inner = shared.lock();
            if inner.state == ReadingState::Reading {
                inner.state = ReadingState::Paused;
                inner.generation += 1;
                true
            } else {
                false
            }
        };

        if was_reading {
            shared.speech.cancel();
            shared.highlighter.clear();
            tracing::info!("Reading paused");
        }
        emit_status(&shared.runtime, STATUS_PAUSED);
        shared.speech.announce(STATUS_PAUSED);
    }

    /// Pause when reading, start otherwise.
    pub fn toggle(&self, settings: ReadingSettings) {
        if self.is_reading() {
            self.pause();
        } else {
            self.start(settings);
        }
    }
}

/// Unit to read for `cursor`: the same node if still readable, else whatever
/// now sits at its last position, else (no cursor) the first unit.
fn resolve(units: &[ReadableUnit], cursor: Option<Cursor>) -> Option<&ReadableUnit> {
    match cursor {
        None => units.first(),
        Some(cursor) => match locate(units, cursor.node) {
            Some(index) => units.get(index),
            None => units.get(cursor.position),
        },
    }
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("reading session mutex poisoned")
    }

    fn sequence(&self) -> Vec<ReadableUnit> {
        compute_sequence(&self.document.read().expect("document lock poisoned"))
    }

    async fn run(shared: Arc<Self>, generation: u64) {
        loop {
            let Some((unit, utterance)) = shared.read_current(generation) else {
                return;
            };

            match utterance.finished().await {
                Completion::NaturalEnd => {
                    if !shared.advance(generation, &unit) {
                        return;
                    }
                }
                Completion::Canceled => {
                    shared.interrupted(generation, None);
                    return;
                }
                Completion::Failed(reason) => {
                    shared.interrupted(generation, Some(reason));
                    return;
                }
            }
        }
    }

    /// Highlight and speak the unit under the cursor.
    ///
    /// Runs under the session lock so a concurrent pause either happens
    /// before (and this returns `None`) or sees the utterance and cancels it.
    fn read_current(&self, generation: u64) -> Option<(ReadableUnit, Utterance)> {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != ReadingState::Reading {
            return None;
        }

        let units = self.sequence();
        let Some(unit) = resolve(&units, inner.cursor).cloned() else {
            self.finish(inner);
            return None;
        };
        inner.cursor = Some(Cursor::at(&unit));

        self.highlighter.highlight(unit.element);
        tracing::debug!(unit = unit.position, node = %unit.node, "Reading unit");
        let utterance = self.speech.speak_with(unit.text.clone(), &inner.settings);
        Some((unit, utterance))
    }

    /// Move the cursor past `unit`. Returns `false` when the loop should end.
    fn advance(&self, generation: u64, unit: &ReadableUnit) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != ReadingState::Reading {
            return false;
        }

        // Relocate by identity; the page may have shifted under us.
        let units = self.sequence();
        let next = match locate(&units, unit.node) {
            Some(index) => index + 1,
            None => unit.position,
        };

        match units.get(next) {
            Some(next) => {
                inner.cursor = Some(Cursor::at(next));
                true
            }
            None => {
                self.finish(inner);
                false
            }
        }
    }

    fn interrupted(&self, generation: u64, failure: Option<String>) {
        {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != ReadingState::Reading {
                return;
            }
            inner.state = ReadingState::Paused;
        }
        self.highlighter.clear();

        match failure {
            Some(reason) => {
                tracing::warn!(reason = %reason, "Speech failed; reading stopped");
                emit_status(&self.runtime, STATUS_SPEECH_FAILED);
            }
            None => tracing::debug!("Reading preempted by other speech"),
        }
    }

    fn finish(&self, mut inner: MutexGuard<'_, SessionInner>) {
        inner.state = ReadingState::Idle;
        inner.cursor = None;
        drop(inner);

        self.highlighter.clear();
        tracing::info!("Finished reading page");
        emit_status(&self.runtime, STATUS_FINISHED);
        self.speech.announce(STATUS_FINISHED);
    }
}
