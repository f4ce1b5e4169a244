use std::sync::{Arc, Mutex};
use futures::StreamExt;
use futures::channel::mpsc::channel;
use print_bridge::device::mock::{ConnectorCall, MockConnector, MockConnectorHandle};
use print_bridge::{ChannelSink, ConnectOutcome, ConnectState, ErrorKind, Event, LinkError, PrinterLink};

type Recorded = Arc<Mutex<Vec<Event>>>;

fn recorder() -> (impl FnMut(Event) + Send + 'static, Recorded) {
    let events: Recorded = Arc::new(Mutex::new(Vec::new()));
    let events2 = events.clone();
    (move |event: Event| events2.lock().unwrap().push(event), events)
}

fn link_with_sink() -> (PrinterLink<MockConnector>, MockConnectorHandle, Recorded) {
    let (connector, handle) = MockConnector::new();
    let link = PrinterLink::new(connector);
    let (sink, events) = recorder();
    link.attach_sink(sink);
    (link, handle, events)
}

fn snapshot(events: &Recorded) -> Vec<Event> {
    events.lock().unwrap().clone()
}

#[test]
fn connect_success_disconnect_yields_three_ordered_events() {
    let (link, handle, events) = link_with_sink();

    let sequence = link.connect("AA:BB").unwrap();
    assert_eq!(snapshot(&events), vec![Event::state_changed(ConnectState::Connecting)]);

    assert!(handle.resolve(sequence, ConnectOutcome::Success));
    assert_eq!(link.current_state(), ConnectState::Connected);
    assert!(link.is_connected());

    link.disconnect();
    assert_eq!(link.current_state(), ConnectState::Disconnected);
    assert_eq!(snapshot(&events), vec![
        Event::state_changed(ConnectState::Connecting),
        Event::state_changed(ConnectState::Connected),
        Event::state_changed(ConnectState::Disconnected),
    ]);
}

#[test]
fn late_result_of_superseded_attempt_is_discarded() {
    let (link, handle, events) = link_with_sink();

    let first = link.connect("AA:BB").unwrap();
    let second = link.connect("AA:BB").unwrap();
    assert_eq!((first, second), (1, 2));

    handle.resolve(first, ConnectOutcome::Success);
    assert_eq!(link.current_state(), ConnectState::Connecting);

    handle.resolve(second, ConnectOutcome::Success);
    assert_eq!(snapshot(&events), vec![
        Event::state_changed(ConnectState::Connecting),
        Event::state_changed(ConnectState::Connecting),
        Event::state_changed(ConnectState::Connected),
    ]);

    // stale data and drops of the first attempt are discarded too
    handle.receive(first, b"stale");
    handle.drop_connection(first);
    assert_eq!(link.current_state(), ConnectState::Connected);
    assert_eq!(snapshot(&events).len(), 3);
}

#[test]
fn timeout_is_not_sticky_across_a_new_attempt() {
    let (link, handle, events) = link_with_sink();

    let sequence = link.connect("AA:BB").unwrap();
    handle.resolve(sequence, ConnectOutcome::Timeout);
    assert_eq!(link.current_state(), ConnectState::Timeout);

    let retry = link.connect("AA:BB").unwrap();
    assert_eq!(link.current_state(), ConnectState::Connecting);
    assert!(retry > sequence);
    assert_eq!(snapshot(&events).last(), Some(&Event::state_changed(ConnectState::Connecting)));

    // the link never retried on its own
    assert_eq!(handle.connect_requests().len(), 2);
}

#[test]
fn connector_failure_surfaces_as_failed_plus_error() {
    let (link, handle, events) = link_with_sink();

    let sequence = link.connect("AA:BB").unwrap();
    handle.resolve(sequence, ConnectOutcome::failure(ErrorKind::PermissionDenied, "bluetooth permission denied"));

    assert_eq!(link.current_state(), ConnectState::Failed);
    assert_eq!(snapshot(&events)[1..], [
        Event::state_changed(ConnectState::Failed),
        Event::error(ErrorKind::PermissionDenied, "bluetooth permission denied"),
    ]);
}

#[test]
fn second_sink_takes_over_the_stream() {
    let (link, handle, first_events) = link_with_sink();
    let sequence = link.connect("AA:BB").unwrap();

    let (second, second_events) = recorder();
    link.attach_sink(second);
    handle.resolve(sequence, ConnectOutcome::Success);
    handle.receive(sequence, &[0x10, 0x04, 0x01]);

    assert_eq!(snapshot(&first_events), vec![Event::state_changed(ConnectState::Connecting)]);
    assert_eq!(snapshot(&second_events), vec![
        Event::state_changed(ConnectState::Connected),
        Event::data_received(vec![0x10, 0x04, 0x01]),
    ]);
}

#[test]
fn events_without_a_sink_are_dropped_not_queued() {
    let (connector, handle) = MockConnector::new();
    let link = PrinterLink::new(connector);

    let sequence = link.connect("AA:BB").unwrap();
    handle.resolve(sequence, ConnectOutcome::Success);
    handle.receive(sequence, b"status");

    let (sink, events) = recorder();
    link.attach_sink(sink);
    assert!(snapshot(&events).is_empty());

    link.detach_sink();
    link.detach_sink();
    link.disconnect();
    assert!(snapshot(&events).is_empty());
}

#[test]
fn unexpected_drop_reports_disconnected() {
    let (link, handle, events) = link_with_sink();
    let sequence = link.connect("AA:BB").unwrap();
    handle.resolve(sequence, ConnectOutcome::Success);

    handle.drop_connection(sequence);

    assert_eq!(link.current_state(), ConnectState::Disconnected);
    assert_eq!(link.session_sequence(), None);
    assert_eq!(snapshot(&events).last(), Some(&Event::state_changed(ConnectState::Disconnected)));
    assert!(!handle.calls().contains(&ConnectorCall::Disconnect));
}

#[test]
fn writes_pass_through_only_while_connected() {
    let (link, handle, events) = link_with_sink();
    assert_eq!(link.write(b"PRINT 1\r\n"), Err(LinkError::NotConnected));

    let sequence = link.connect("AA:BB").unwrap();
    handle.resolve(sequence, ConnectOutcome::Success);
    link.write(b"PRINT 1\r\n").unwrap();
    assert_eq!(handle.writes(), vec![b"PRINT 1\r\n".to_vec()]);

    handle.report_error(sequence, ErrorKind::WriteFailed, "gatt write rejected");
    assert_eq!(link.current_state(), ConnectState::Connected);
    assert_eq!(snapshot(&events).last(), Some(&Event::error(ErrorKind::WriteFailed, "gatt write rejected")));
}

#[test]
fn empty_peripheral_id_fails_fast() {
    let (link, handle, events) = link_with_sink();
    assert_eq!(link.connect(""), Err(LinkError::EmptyPeripheralId));
    assert_eq!(link.current_state(), ConnectState::Disconnected);
    assert!(handle.calls().is_empty());
    assert!(snapshot(&events).is_empty());
}

#[test]
fn shutdown_discards_reports_still_in_flight() {
    let (link, handle, events) = link_with_sink();
    let sequence = link.connect("AA:BB").unwrap();
    link.shutdown();

    handle.resolve(sequence, ConnectOutcome::Success);

    assert_eq!(link.current_state(), ConnectState::Disconnected);
    assert!(!link.has_sink());
    assert_eq!(snapshot(&events), vec![
        Event::state_changed(ConnectState::Connecting),
        Event::state_changed(ConnectState::Disconnected),
    ]);
}

#[test]
fn state_listener_and_sink_see_the_same_transitions() {
    let (link, handle, events) = link_with_sink();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    link.set_state_listener(move |state: ConnectState| seen2.lock().unwrap().push(state));

    let sequence = link.connect("AA:BB").unwrap();
    handle.resolve(sequence, ConnectOutcome::Success);
    link.disconnect();

    let streamed: Vec<ConnectState> = snapshot(&events).iter().filter_map(|event| match event {
        Event::StateChanged { state } => Some(*state),
        _ => None,
    }).collect();
    assert_eq!(*seen.lock().unwrap(), streamed);

    link.clear_state_listener();
    link.connect("AA:BB").unwrap();
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn reports_from_another_task_reach_a_channel_sink_in_order() {
    let (connector, handle) = MockConnector::new();
    let link = PrinterLink::new(connector);
    let (sender, mut receiver) = channel::<Event>(16);
    link.attach_sink(ChannelSink::new(sender));

    let sequence = link.connect("AA:BB").unwrap();

    let radio = tokio::spawn(async move {
        handle.resolve(sequence, ConnectOutcome::Success);
        handle.receive(sequence, b"ok");
        handle.drop_connection(sequence);
    });
    radio.await.unwrap();

    let mut received = Vec::new();
    for _ in 0..4 {
        received.push(receiver.next().await.unwrap());
    }

    assert_eq!(received, vec![
        Event::state_changed(ConnectState::Connecting),
        Event::state_changed(ConnectState::Connected),
        Event::data_received(b"ok".to_vec()),
        Event::state_changed(ConnectState::Disconnected),
    ]);
}
