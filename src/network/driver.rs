//! Peer Driver
//!
//! Async loop binding a [`Coordinator`] to a room transport. Ticks run on
//! a fixed interval; room events are applied as they arrive. After each
//! step the coordinator's outbox is serialized and handed to the
//! transport.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::game::input::InputState;
use crate::network::coordinator::Coordinator;
use crate::network::room::{RoomEvent, Transport, TransportError};

/// Millisecond time source.
pub trait Clock: Send {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Drives one peer.
pub struct PeerDriver<T: Transport, C: Clock> {
    coordinator: Coordinator,
    transport: T,
    events: mpsc::UnboundedReceiver<RoomEvent>,
    clock: C,
    tick_duration: Duration,
}

impl<T: Transport, C: Clock> PeerDriver<T, C> {
    /// Bind a coordinator to its transport and event stream.
    pub fn new(
        coordinator: Coordinator,
        transport: T,
        events: mpsc::UnboundedReceiver<RoomEvent>,
        clock: C,
    ) -> Self {
        let tick_rate = coordinator.config().network.tick_rate.max(1);
        Self {
            coordinator,
            transport,
            events,
            clock,
            tick_duration: Duration::from_micros((1_000_000 / tick_rate as u64).max(1)),
        }
    }

    /// The driven coordinator.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply one room event.
    pub fn handle_event(&mut self, event: RoomEvent) {
        let now = self.clock.now_ms();
        match event {
            RoomEvent::PeerJoined(peer) => self.coordinator.handle_peer_join(&peer),
            RoomEvent::PeerLeft(peer) => self.coordinator.handle_peer_leave(&peer, now),
            RoomEvent::Message { from, payload } => {
                // Rejections are logged by the coordinator
                let _ = self.coordinator.handle_raw(&from, &payload, now);
            }
        }
    }

    /// Advance one tick with the given input.
    pub fn step(&mut self, input: &InputState) {
        let now = self.clock.now_ms();
        self.coordinator.tick(input, now);
    }

    /// Send everything the coordinator queued.
    ///
    /// Only a closed transport is reported; other send failures are
    /// logged and the message is dropped.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        for out in self.coordinator.drain_outbox() {
            let payload = match out.message.to_json() {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to serialize {}: {}", out.message.kind(), e);
                    continue;
                }
            };
            match self.transport.send(&payload, out.to.as_ref()) {
                Ok(()) => {}
                Err(TransportError::Closed) => return Err(TransportError::Closed),
                Err(e) => debug!("Dropped {}: {}", out.message.kind(), e),
            }
        }
        Ok(())
    }

    /// Run until `shutdown` resolves, the event stream ends or the transport closes.
    ///
    /// `input` is sampled once per tick.
    #[instrument(skip_all, fields(peer = %self.coordinator.local_id()))]
    pub async fn run<F, S>(&mut self, mut input: F, shutdown: S) -> Result<(), TransportError>
    where
        F: FnMut(&Coordinator) -> InputState,
        S: Future<Output = ()>,
    {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("Peer driver started at {:?} per tick", self.tick_duration);
        self.flush()?;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Peer driver stopping");
                    break;
                }
                _ = tick_interval.tick() => {
                    let state = input(&self.coordinator);
                    self.step(&state);
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            warn!("Room event stream ended");
                            break;
                        }
                    }
                }
            }

            if let Err(e) = self.flush() {
                warn!("Transport closed: {}", e);
                return Err(e);
            }
        }

        Ok(())
    }

    /// Run for a fixed wall-clock duration.
    pub async fn run_for<F>(&mut self, duration: Duration, input: F) -> Result<(), TransportError>
    where
        F: FnMut(&Coordinator) -> InputState,
    {
        self.run(input, tokio::time::sleep(duration)).await
    }

    /// Give back the coordinator.
    pub fn into_coordinator(self) -> Coordinator {
        self.coordinator
    }
}
