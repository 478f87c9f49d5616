/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The per-committee event bus thread, which fires user-defined and logging handlers for
//! [events](crate::events).
//!
//! Every committee service owns one [`EventBus`]. Events can be published to it from the moment the
//! service is created. They are queued until the service [starts](crate::service::CommitteeService::start)
//! the bus, and the bus fires the handlers of every event still queued when it is stopped before its
//! thread exits. A bus that is stopped without ever being started fires the handlers of its queued
//! events on the stopping thread.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;
use crate::types::data_types::CommitteeID;

/// Pointer to a handler closure, shared by the event buses of all committees.
pub type HandlerPtr<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// How long the bus thread waits for an event before checking for shutdown.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The handlers registered for each kind of event.
#[derive(Clone, Default)]
pub(crate) struct EventHandlers {
    pub(crate) put_committee_handlers: Vec<HandlerPtr<PutCommitteeEvent>>,
    pub(crate) start_committee_handlers: Vec<HandlerPtr<StartCommitteeEvent>>,
    pub(crate) stop_committee_handlers: Vec<HandlerPtr<StopCommitteeEvent>>,
    pub(crate) update_committee_handlers: Vec<HandlerPtr<UpdateCommitteeEvent>>,
    pub(crate) resolve_node_handlers: Vec<HandlerPtr<ResolveNodeEvent>>,
    pub(crate) reject_node_handlers: Vec<HandlerPtr<RejectNodeEvent>>,
    pub(crate) dial_peer_handlers: Vec<HandlerPtr<DialPeerEvent>>,
    pub(crate) dial_failed_handlers: Vec<HandlerPtr<DialFailedEvent>>,
}

impl EventHandlers {
    /// Collect the user-defined handlers, adding the default logger of every event kind if
    /// `log_events` is set.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        put_committee_handler: Option<HandlerPtr<PutCommitteeEvent>>,
        start_committee_handler: Option<HandlerPtr<StartCommitteeEvent>>,
        stop_committee_handler: Option<HandlerPtr<StopCommitteeEvent>>,
        update_committee_handler: Option<HandlerPtr<UpdateCommitteeEvent>>,
        resolve_node_handler: Option<HandlerPtr<ResolveNodeEvent>>,
        reject_node_handler: Option<HandlerPtr<RejectNodeEvent>>,
        dial_peer_handler: Option<HandlerPtr<DialPeerEvent>>,
        dial_failed_handler: Option<HandlerPtr<DialFailedEvent>>,
    ) -> EventHandlers {
        fn collect<T: Logger>(log_events: bool, handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers: Vec<HandlerPtr<T>> = handler.into_iter().collect();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers
        }

        EventHandlers {
            put_committee_handlers: collect(log_events, put_committee_handler),
            start_committee_handlers: collect(log_events, start_committee_handler),
            stop_committee_handlers: collect(log_events, stop_committee_handler),
            update_committee_handlers: collect(log_events, update_committee_handler),
            resolve_node_handlers: collect(log_events, resolve_node_handler),
            reject_node_handlers: collect(log_events, reject_node_handler),
            dial_peer_handlers: collect(log_events, dial_peer_handler),
            dial_failed_handlers: collect(log_events, dial_failed_handler),
        }
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::PutCommittee(put_committee_event) => self
                .put_committee_handlers
                .iter()
                .for_each(|handler| handler(&put_committee_event)),

            Event::StartCommittee(start_committee_event) => self
                .start_committee_handlers
                .iter()
                .for_each(|handler| handler(&start_committee_event)),

            Event::StopCommittee(stop_committee_event) => self
                .stop_committee_handlers
                .iter()
                .for_each(|handler| handler(&stop_committee_event)),

            Event::UpdateCommittee(update_committee_event) => self
                .update_committee_handlers
                .iter()
                .for_each(|handler| handler(&update_committee_event)),

            Event::ResolveNode(resolve_node_event) => self
                .resolve_node_handlers
                .iter()
                .for_each(|handler| handler(&resolve_node_event)),

            Event::RejectNode(reject_node_event) => self
                .reject_node_handlers
                .iter()
                .for_each(|handler| handler(&reject_node_event)),

            Event::DialPeer(dial_peer_event) => self
                .dial_peer_handlers
                .iter()
                .for_each(|handler| handler(&dial_peer_event)),

            Event::DialFailed(dial_failed_event) => self
                .dial_failed_handlers
                .iter()
                .for_each(|handler| handler(&dial_failed_event)),
        }
    }
}

/// A committee's event bus: a channel of [`Event`]s and the thread that drains it.
pub(crate) struct EventBus {
    committee: CommitteeID,
    handlers: Arc<EventHandlers>,
    publisher: Sender<Event>,
    subscriber: Option<Receiver<Event>>,
    thread: Option<JoinHandle<()>>,
    shutdown: Option<Sender<()>>,
}

impl EventBus {
    /// Create a bus for `committee` that is not yet running.
    pub(crate) fn new(committee: CommitteeID, handlers: Arc<EventHandlers>) -> EventBus {
        let (publisher, subscriber) = mpsc::channel();
        EventBus {
            committee,
            handlers,
            publisher,
            subscriber: Some(subscriber),
            thread: None,
            shutdown: None,
        }
    }

    /// Get a handle to publish events to the bus.
    pub(crate) fn publisher(&self) -> Sender<Event> {
        self.publisher.clone()
    }

    /// Publish `event` to the bus.
    pub(crate) fn publish(&self, event: Event) {
        Event::publish(&self.publisher, event)
    }

    /// Check whether the bus thread is running.
    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Check whether events published now will still have their handlers fired, i.e., the bus is
    /// running or has not been started yet.
    pub(crate) fn is_open(&self) -> bool {
        self.thread.is_some() || self.subscriber.is_some()
    }

    /// Spawn the bus thread. Starting a running bus has no effect. A bus that failed to start, or was
    /// stopped, cannot be started again.
    pub(crate) fn start(&mut self) -> io::Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        let subscriber = self.subscriber.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "event bus cannot be restarted")
        })?;
        let (shutdown, shutdown_signal) = mpsc::channel();
        let handlers = self.handlers.clone();
        let thread = thread::Builder::new()
            .name(format!("committee-{}-event-bus", self.committee))
            .spawn(move || start_event_bus(handlers, subscriber, shutdown_signal))?;
        self.thread = Some(thread);
        self.shutdown = Some(shutdown);
        Ok(())
    }

    /// Stop the bus thread, waiting for it to fire the handlers of the events already published. If
    /// the bus was never started, fire them here instead.
    pub(crate) fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("event bus of committee {} panicked", self.committee);
            }
        }
        if let Some(subscriber) = self.subscriber.take() {
            fire_queued_events(&self.handlers, &subscriber);
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.stop()
    }
}

fn start_event_bus(
    event_handlers: Arc<EventHandlers>,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) {
    loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(SHUTDOWN_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }

    fire_queued_events(&event_handlers, &event_subscriber)
}

fn fire_queued_events(event_handlers: &EventHandlers, event_subscriber: &Receiver<Event>) {
    while let Ok(event) = event_subscriber.try_recv() {
        event_handlers.fire_handlers(event)
    }
}
