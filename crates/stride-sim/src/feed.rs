//! Message-passing boundary between sensor sources and the fusion core.
//!
//! Producers hold cloneable [`SampleFeed`] handles and may live on any
//! thread. A single [`FeedReceiver`] owns the only path into the
//! controller and applies messages strictly in arrival order, so the core
//! never sees concurrent access.

use crate::error::SimError;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use stride_core::{
    CompassHeading, Coordinate, FusionController, FusionError, FusionEvent, SensorReading,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedMessage {
    Start(Option<Coordinate>),
    Sample(SensorReading),
    Compass(CompassHeading),
    Stop,
}

/// Receives the controller's output as messages are applied.
pub trait FusionObserver {
    fn on_event(&mut self, event: &FusionEvent);

    /// A message the controller refused. The track is unchanged.
    fn on_rejected(&mut self, _message: &FeedMessage, _error: &FusionError) {}
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SampleFeed {
    tx: SyncSender<FeedMessage>,
}

impl SampleFeed {
    /// Blocks while the channel is full.
    pub fn send(&self, msg: FeedMessage) -> Result<(), SimError> {
        self.tx.send(msg).map_err(|_| SimError::FeedClosed)
    }

    pub fn start(&self, fix: Option<Coordinate>) -> Result<(), SimError> {
        self.send(FeedMessage::Start(fix))
    }

    pub fn sample(&self, reading: SensorReading) -> Result<(), SimError> {
        self.send(FeedMessage::Sample(reading))
    }

    pub fn compass(&self, heading: CompassHeading) -> Result<(), SimError> {
        self.send(FeedMessage::Compass(heading))
    }

    pub fn stop(&self) -> Result<(), SimError> {
        self.send(FeedMessage::Stop)
    }
}

pub struct FeedReceiver {
    rx: Receiver<FeedMessage>,
}

/// Bounded feed. `capacity` of zero makes every send a rendezvous.
pub fn channel(capacity: usize) -> (SampleFeed, FeedReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (SampleFeed { tx }, FeedReceiver { rx })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub messages: u64,
    pub samples: u64,
    pub events: u64,
    pub rejected: u64,
    pub compass_applied: u64,
}

impl FeedReceiver {
    /// Apply one message to the controller.
    pub fn apply(
        controller: &mut FusionController,
        msg: &FeedMessage,
        observer: &mut dyn FusionObserver,
        summary: &mut DrainSummary,
    ) {
        summary.messages += 1;
        let result = match *msg {
            FeedMessage::Start(fix) => controller.start_tracking(fix),
            FeedMessage::Sample(ref reading) => {
                summary.samples += 1;
                controller.feed_sample(reading).map(|event| {
                    if let Some(e) = event {
                        summary.events += 1;
                        observer.on_event(&e);
                    }
                })
            }
            FeedMessage::Compass(heading) => controller.observe_compass(heading).map(|applied| {
                if applied {
                    summary.compass_applied += 1;
                }
            }),
            FeedMessage::Stop => {
                controller.stop_tracking();
                Ok(())
            }
        };

        if let Err(e) = result {
            summary.rejected += 1;
            observer.on_rejected(msg, &e);
        }
    }

    /// Apply messages until every [`SampleFeed`] has been dropped.
    pub fn drain_into(
        self,
        controller: &mut FusionController,
        observer: &mut dyn FusionObserver,
    ) -> DrainSummary {
        let mut summary = DrainSummary::default();
        for msg in self.rx.iter() {
            Self::apply(controller, &msg, observer, &mut summary);
        }
        tracing::debug!(
            messages = summary.messages,
            events = summary.events,
            rejected = summary.rejected,
            "feed drained"
        );
        summary
    }

    /// Apply whatever is queued right now without waiting for producers.
    pub fn drain_pending(
        &self,
        controller: &mut FusionController,
        observer: &mut dyn FusionObserver,
    ) -> DrainSummary {
        let mut summary = DrainSummary::default();
        for msg in self.rx.try_iter() {
            Self::apply(controller, &msg, observer, &mut summary);
        }
        summary
    }
}

/// Push `messages` from a dedicated producer thread.
pub fn spawn_replay(
    feed: SampleFeed,
    messages: Vec<FeedMessage>,
) -> JoinHandle<Result<(), SimError>> {
    thread::spawn(move || {
        for msg in messages {
            feed.send(msg)?;
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Keeps every event and rejection.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryRecorder {
    pub events: Vec<FusionEvent>,
    pub rejected: Vec<(FeedMessage, FusionError)>,
}

impl FusionObserver for TrajectoryRecorder {
    fn on_event(&mut self, event: &FusionEvent) {
        self.events.push(*event);
    }

    fn on_rejected(&mut self, message: &FeedMessage, error: &FusionError) {
        tracing::warn!(?message, %error, "feed message rejected");
        self.rejected.push((*message, *error));
    }
}
