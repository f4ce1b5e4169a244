use futures::channel::mpsc::Sender;
use log::{debug, warn};

use crate::device::types::Event;

/// Result of handing one event to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped,
    /// The consumer is gone for good; the bridge detaches the sink.
    Closed,
}

/// The exclusive consumer of the event stream.
///
/// `deliver` runs inside the link's critical section: it must not block and must not
/// call back into the link.
pub trait EventSink: Send {
    fn deliver(&mut self, event: Event) -> Delivery;
}

impl<F> EventSink for F
where
    F: FnMut(Event) + Send,
{
    fn deliver(&mut self, event: Event) -> Delivery {
        self(event);
        Delivery::Delivered
    }
}

/// Bounded channel sink. Sending never blocks: a full channel drops the event.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Event>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Event>) -> Self {
        ChannelSink { sender }
    }
}

impl From<Sender<Event>> for ChannelSink {
    fn from(sender: Sender<Event>) -> Self {
        ChannelSink::new(sender)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&mut self, event: Event) -> Delivery {
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(err) if err.is_disconnected() => Delivery::Closed,
            Err(err) => {
                warn!("Event sink is full, dropping {:?}", err.into_inner());
                Delivery::Dropped
            },
        }
    }
}

/// Single-slot event bridge: at most one sink, live delivery, nothing buffered.
#[derive(Default)]
pub struct EventBridge {
    sink: Option<Box<dyn EventSink>>,
}

impl EventBridge {
    pub fn new() -> Self {
        EventBridge { sink: None }
    }

    /// Installs `sink`, silently replacing the previous one.
    pub fn attach_sink(&mut self, sink: Box<dyn EventSink>) {
        if self.sink.is_some() {
            debug!("Replacing attached event sink");
        }
        self.sink = Some(sink);
    }

    pub fn detach_sink(&mut self) {
        self.sink = None;
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&mut self, event: Event) -> Delivery {
        let sink = match self.sink.as_mut() {
            Some(sink) => sink,
            None => {
                debug!("No event sink attached, discarding {:?}", event);
                return Delivery::Dropped;
            },
        };

        let delivery = sink.deliver(event);
        if delivery == Delivery::Closed {
            warn!("Event sink closed, detaching it");
            self.sink = None;
        }

        delivery
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("has_sink", &self.has_sink())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use futures::channel::mpsc::channel;
    use super::*;
    use crate::device::types::ConnectState;

    fn recording_sink() -> (Box<dyn EventSink>, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events2 = events.clone();
        let sink = move |event: Event| events2.lock().unwrap().push(event);
        (Box::new(sink), events)
    }

    #[test]
    fn emit_without_sink_is_silently_dropped() {
        let mut bridge = EventBridge::new();
        let delivery = bridge.emit(Event::state_changed(ConnectState::Connecting));
        assert_eq!(delivery, Delivery::Dropped);
        assert!(!bridge.has_sink());
    }

    #[test]
    fn events_arrive_in_emission_order() {
        let mut bridge = EventBridge::new();
        let (sink, events) = recording_sink();
        bridge.attach_sink(sink);

        bridge.emit(Event::state_changed(ConnectState::Connecting));
        bridge.emit(Event::state_changed(ConnectState::Connected));
        bridge.emit(Event::data_received(vec![0x1b, 0x40]));

        assert_eq!(*events.lock().unwrap(), vec![
            Event::state_changed(ConnectState::Connecting),
            Event::state_changed(ConnectState::Connected),
            Event::data_received(vec![0x1b, 0x40]),
        ]);
    }

    #[test]
    fn attaching_a_new_sink_cuts_off_the_previous_one() {
        let mut bridge = EventBridge::new();
        let (first, first_events) = recording_sink();
        let (second, second_events) = recording_sink();

        bridge.attach_sink(first);
        bridge.emit(Event::state_changed(ConnectState::Connecting));
        bridge.attach_sink(second);
        bridge.emit(Event::state_changed(ConnectState::Connected));

        assert_eq!(*first_events.lock().unwrap(), vec![Event::state_changed(ConnectState::Connecting)]);
        assert_eq!(*second_events.lock().unwrap(), vec![Event::state_changed(ConnectState::Connected)]);
    }

    #[test]
    fn detach_is_idempotent_and_events_are_not_queued() {
        let mut bridge = EventBridge::new();
        let (sink, events) = recording_sink();
        bridge.attach_sink(sink);
        bridge.detach_sink();
        bridge.detach_sink();

        bridge.emit(Event::state_changed(ConnectState::Connecting));

        let (sink, late_events) = recording_sink();
        bridge.attach_sink(sink);
        assert!(events.lock().unwrap().is_empty());
        assert!(late_events.lock().unwrap().is_empty());
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sender, mut receiver) = channel::<Event>(0);
        let mut bridge = EventBridge::new();
        bridge.attach_sink(Box::new(ChannelSink::new(sender)));

        assert_eq!(bridge.emit(Event::state_changed(ConnectState::Connecting)), Delivery::Delivered);
        assert_eq!(bridge.emit(Event::state_changed(ConnectState::Connected)), Delivery::Dropped);
        assert!(bridge.has_sink());

        let received = receiver.try_next().unwrap();
        assert_eq!(received, Some(Event::state_changed(ConnectState::Connecting)));
    }

    #[test]
    fn closed_channel_detaches_the_sink() {
        let (sender, receiver) = channel::<Event>(4);
        drop(receiver);

        let mut bridge = EventBridge::new();
        bridge.attach_sink(Box::new(ChannelSink::new(sender)));

        assert_eq!(bridge.emit(Event::state_changed(ConnectState::Connecting)), Delivery::Closed);
        assert!(!bridge.has_sink());
    }
}
