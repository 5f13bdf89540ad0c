//! End-to-end pipeline scenarios: datagrams in, mixed frames out.
//!
//! Drives the server tick by tick through a stub wire format and verifies
//! the emitted frame sequence sample by sample.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use netaudio::audio::queue::FrameQueue;
use netaudio::audio::{
    Frame, FrameSink, HeapByteBufferComposer, HeapSampleBufferComposer, SampleBufferComposer,
};
use netaudio::datagram::Datagram;
use netaudio::datagram::queue::{DatagramQueue, DatagramSender};
use netaudio::packet::{AudioPacket, ChannelMask, PacketParser, PacketPtr, Sample, num_channels};
use netaudio::session::pool::FixedSessionPool;
use netaudio::{Server, ServerConfig};

const DST: &str = "127.0.0.1:4000";
const TICK: usize = 10;

/// Stub audio packet carrying mono `f32` samples directly.
struct TestPacket {
    source: u32,
    seqnum: u16,
    timestamp: u32,
    samples: Vec<Sample>,
}

impl AudioPacket for TestPacket {
    fn source(&self) -> u32 {
        self.source
    }

    fn seqnum(&self) -> u16 {
        self.seqnum
    }

    fn timestamp(&self) -> u32 {
        self.timestamp
    }

    fn rate(&self) -> u32 {
        1000
    }

    fn marker(&self) -> bool {
        false
    }

    fn channels(&self) -> ChannelMask {
        0b1
    }

    fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn read_samples(&self, ch_mask: ChannelMask, offset: usize, out: &mut [Sample]) -> usize {
        let out_channels = num_channels(ch_mask);
        if out_channels == 0 || ch_mask & 0b1 == 0 || offset >= self.samples.len() {
            return 0;
        }
        let n = (out.len() / out_channels).min(self.samples.len() - offset);
        for i in 0..n {
            out[i * out_channels] = self.samples[offset + i];
        }
        n
    }
}

/// Wire format: source u32 LE, seqnum u16 LE, timestamp u32 LE, then
/// `f32` LE samples. Anything shorter than a header is malformed.
struct TestParser;

impl PacketParser for TestParser {
    fn parse(&self, data: &[u8]) -> Option<PacketPtr> {
        if data.len() < 10 {
            return None;
        }
        let samples = data[10..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Arc::new(TestPacket {
            source: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            seqnum: u16::from_le_bytes([data[4], data[5]]),
            timestamp: u32::from_le_bytes([data[6], data[7], data[8], data[9]]),
            samples,
        }))
    }
}

#[derive(Clone)]
struct CollectSink(Arc<Mutex<Vec<Frame>>>);

impl CollectSink {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    fn frames(&self) -> Vec<Frame> {
        self.0.lock().unwrap().clone()
    }
}

impl FrameSink for CollectSink {
    fn write(&mut self, frame: Frame) -> bool {
        self.0.lock().unwrap().push(frame);
        true
    }
}

fn scenario_config(max_session_packets: usize, session_timeout: u32) -> ServerConfig {
    ServerConfig {
        channels: 0b1,
        sample_rate: 1000,
        samples_per_tick: TICK,
        output_latency: 20,
        session_latency: 10,
        session_timeout,
        max_sessions: 4,
        max_session_packets,
        options: 0,
        session_pool: Some(Arc::new(FixedSessionPool::new(4))),
        byte_buffer_composer: Some(Arc::new(HeapByteBufferComposer)),
        sample_buffer_composer: Some(Arc::new(HeapSampleBufferComposer)),
    }
}

fn make_server(config: ServerConfig) -> (Server, DatagramSender, CollectSink) {
    let (tx, rx) = DatagramQueue::bounded(256);
    let sink = CollectSink::new();
    let mut server = Server::new(Box::new(rx), Box::new(sink.clone()), config).unwrap();
    server
        .add_port(DST.parse().unwrap(), Arc::new(TestParser))
        .unwrap();
    (server, tx, sink)
}

fn send_packet(
    tx: &DatagramSender,
    src: &str,
    source: u32,
    seqnum: u16,
    timestamp: u32,
    samples: &[Sample],
) {
    let mut payload = Vec::new();
    payload.extend_from_slice(&source.to_le_bytes());
    payload.extend_from_slice(&seqnum.to_le_bytes());
    payload.extend_from_slice(&timestamp.to_le_bytes());
    for s in samples {
        payload.extend_from_slice(&s.to_le_bytes());
    }
    assert!(tx.send(Datagram {
        src: src.parse::<SocketAddr>().unwrap(),
        dst: DST.parse().unwrap(),
        payload,
    }));
}

/// Constant-value packet of one tick's worth of samples, value = seqnum.
fn send_numbered(tx: &DatagramSender, src: &str, seqnum: u16) {
    let timestamp = seqnum as u32 * TICK as u32;
    send_packet(tx, src, 1, seqnum, timestamp, &[seqnum as Sample; TICK]);
}

fn run_ticks(server: &mut Server, n: usize) {
    for _ in 0..n {
        assert!(server.tick());
    }
}

fn const_frames(values: &[Sample]) -> Vec<Frame> {
    values.iter().map(|&v| vec![v; TICK]).collect()
}

#[test]
fn single_stream_in_order() {
    let (mut server, tx, sink) = make_server(scenario_config(8, 1000));
    for seq in 0..5u16 {
        send_numbered(&tx, "10.0.0.1:5000", seq);
    }

    run_ticks(&mut server, 8);

    // Two frames of startup silence, the five packets, then silence.
    let expect = const_frames(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0]);
    assert_eq!(sink.frames(), expect);
    assert_eq!(server.num_sessions(), 1);
}

#[test]
fn reordered_arrival_same_output() {
    let (mut server, tx, sink) = make_server(scenario_config(8, 1000));
    for seq in [2u16, 0, 3, 1, 4] {
        send_numbered(&tx, "10.0.0.1:5000", seq);
    }

    run_ticks(&mut server, 8);

    let expect = const_frames(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0]);
    assert_eq!(sink.frames(), expect);
}

#[test]
fn loss_gap_renders_silence() {
    let (mut server, tx, sink) = make_server(scenario_config(8, 1000));
    for seq in [0u16, 1, 3, 4] {
        send_numbered(&tx, "10.0.0.1:5000", seq);
    }

    run_ticks(&mut server, 8);

    // The missing packet 2's slot plays as zeros; 3 and 4 keep their slots.
    let expect = const_frames(&[0.0, 0.0, 0.0, 1.0, 0.0, 3.0, 4.0, 0.0, 0.0, 0.0]);
    assert_eq!(sink.frames(), expect);
}

#[test]
fn store_overflow_keeps_newest() {
    let (mut server, tx, sink) = make_server(scenario_config(3, 1000));
    for seq in 0..6u16 {
        send_numbered(&tx, "10.0.0.1:5000", seq);
    }

    run_ticks(&mut server, 8);

    // Packets 0..=2 were evicted before playback began, so playout starts
    // directly at packet 3's timestamp.
    let expect = const_frames(&[0.0, 0.0, 3.0, 4.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(sink.frames(), expect);
}

#[test]
fn two_sessions_mix_until_one_times_out() {
    let (mut server, tx, sink) = make_server(scenario_config(16, 30));
    for seq in 0..10u16 {
        send_packet(&tx, "10.0.0.1:5000", 1, seq, seq as u32 * 10, &[1.0; TICK]);
    }
    for seq in 0..5u16 {
        send_packet(&tx, "10.0.0.2:6000", 2, seq, seq as u32 * 10, &[2.0; TICK]);
    }

    run_ticks(&mut server, 5);
    assert_eq!(server.num_sessions(), 2);

    run_ticks(&mut server, 5);
    assert_eq!(server.num_sessions(), 1);

    // Both streams sum while alive; the longer one plays alone after the
    // short one drains and times out.
    let expect = const_frames(&[0.0, 0.0, 3.0, 3.0, 3.0, 3.0, 3.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    assert_eq!(sink.frames(), expect);
}

#[test]
fn duplicates_are_idempotent() {
    let (mut server, tx, sink) = make_server(scenario_config(8, 1000));
    for seq in [0u16, 1, 2, 2, 2, 3, 4] {
        send_numbered(&tx, "10.0.0.1:5000", seq);
    }

    run_ticks(&mut server, 8);

    let expect = const_frames(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0]);
    assert_eq!(sink.frames(), expect);
    assert_eq!(server.num_sessions(), 1);
}

#[test]
fn contiguous_stream_round_trips() {
    let (mut server, tx, sink) = make_server(scenario_config(8, 1000));
    let ramp: Vec<Sample> = (0..50).map(|n| n as Sample).collect();
    for seq in 0..5u16 {
        let at = seq as usize * TICK;
        send_packet(&tx, "10.0.0.1:5000", 1, seq, at as u32, &ramp[at..at + TICK]);
    }

    run_ticks(&mut server, 5);

    // After the startup silence, the emitted samples are exactly the
    // concatenated packet payloads.
    let frames = sink.frames();
    let emitted: Vec<Sample> = frames[2..].iter().flatten().copied().collect();
    assert_eq!(emitted, ramp);
}

#[test]
fn one_frame_per_tick() {
    let (mut server, tx, sink) = make_server(scenario_config(8, 1000));
    send_numbered(&tx, "10.0.0.1:5000", 0);

    for n in 1usize..=6 {
        assert!(server.tick());
        // Two prologue frames from the delayed writer, then one per tick.
        assert_eq!(sink.frames().len(), 2 + n);
    }
}

#[test]
fn idle_session_reaped() {
    let (mut server, tx, _sink) = make_server(scenario_config(8, 30));
    send_numbered(&tx, "10.0.0.1:5000", 0);

    run_ticks(&mut server, 1);
    assert_eq!(server.num_sessions(), 1);

    // The store drains on tick 2; the idle clock hits 30 on tick 3.
    run_ticks(&mut server, 2);
    assert_eq!(server.num_sessions(), 0);
}

#[test]
fn unroutable_and_malformed_datagrams_dropped() {
    let (mut server, tx, _sink) = make_server(scenario_config(8, 1000));

    // Wrong destination port.
    assert!(tx.send(Datagram {
        src: "10.0.0.1:5000".parse().unwrap(),
        dst: "127.0.0.1:9999".parse().unwrap(),
        payload: vec![0; 32],
    }));
    // Truncated header.
    assert!(tx.send(Datagram {
        src: "10.0.0.1:5000".parse().unwrap(),
        dst: DST.parse().unwrap(),
        payload: vec![0; 4],
    }));

    run_ticks(&mut server, 1);

    assert_eq!(server.num_sessions(), 0);
    let stats = server.route_stats();
    assert_eq!(stats.no_port, 1);
    assert_eq!(stats.parse_failed, 1);
    assert_eq!(stats.routed, 0);
}

#[test]
fn pool_exhaustion_drops_extra_remotes() {
    let mut config = scenario_config(8, 1000);
    config.session_pool = Some(Arc::new(FixedSessionPool::new(1)));
    let (mut server, tx, _sink) = make_server(config);

    send_numbered(&tx, "10.0.0.1:5000", 0);
    send_numbered(&tx, "10.0.0.2:6000", 0);
    run_ticks(&mut server, 1);

    assert_eq!(server.num_sessions(), 1);
    assert_eq!(server.route_stats().sessions_rejected, 1);
}

#[test]
fn closed_source_ends_pipeline() {
    let (mut server, tx, _sink) = make_server(scenario_config(8, 1000));
    drop(tx);

    assert!(!server.tick());
    assert!(!server.tick());
}

#[test]
fn closed_sink_ends_pipeline() {
    struct ClosedSink;
    impl FrameSink for ClosedSink {
        fn write(&mut self, _frame: Frame) -> bool {
            false
        }
    }

    let (_tx, rx) = DatagramQueue::bounded(8);
    let mut server =
        Server::new(Box::new(rx), Box::new(ClosedSink), scenario_config(8, 1000)).unwrap();

    assert!(!server.tick());
    assert!(!server.tick());
}

#[test]
fn composer_exhaustion_ends_pipeline() {
    struct FailingComposer;
    impl SampleBufferComposer for FailingComposer {
        fn compose(&self, _n_samples: usize) -> Option<Frame> {
            None
        }
    }

    let mut config = scenario_config(8, 1000);
    config.sample_buffer_composer = Some(Arc::new(FailingComposer));
    let (mut server, _tx, sink) = make_server(config);

    assert!(!server.tick());
    assert!(sink.frames().is_empty());
}

#[test]
fn invalid_configs_rejected() {
    let make = |mutate: fn(&mut ServerConfig)| {
        let mut config = scenario_config(8, 1000);
        mutate(&mut config);
        let (_tx, rx) = DatagramQueue::bounded(8);
        Server::new(Box::new(rx), Box::new(CollectSink::new()), config)
    };

    assert!(make(|c| c.channels = 0).is_err());
    assert!(make(|c| c.samples_per_tick = 0).is_err());
    assert!(make(|c| c.sample_rate = 0).is_err());
    assert!(make(|c| c.session_pool = None).is_err());
    assert!(make(|c| c.byte_buffer_composer = None).is_err());
    assert!(make(|c| c.sample_buffer_composer = None).is_err());
    assert!(make(|_| ()).is_ok());
}

#[test]
fn duplicate_port_rejected() {
    let (mut server, _tx, _sink) = make_server(scenario_config(8, 1000));
    assert!(
        server
            .add_port(DST.parse().unwrap(), Arc::new(TestParser))
            .is_err()
    );
}

#[test]
fn stop_before_run_emits_only_eof() {
    let (mut server, _tx, sink) = make_server(scenario_config(8, 1000));
    server.stop_handle().stop();
    server.run();

    let frames = sink.frames();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_empty());
}

#[test]
fn threaded_run_stops_cleanly() {
    let (dgm_tx, dgm_rx) = DatagramQueue::bounded(256);
    let (frame_tx, frame_rx) = FrameQueue::bounded(4);

    let mut config = scenario_config(8, 1000);
    // Pace the loop so the bounded frame queue provides back-pressure
    // instead of the server spinning through millions of silent ticks.
    config.options = netaudio::ENABLE_TIMING;
    let mut server = Server::new(Box::new(dgm_rx), Box::new(frame_tx), config).unwrap();
    server
        .add_port(DST.parse().unwrap(), Arc::new(TestParser))
        .unwrap();

    let stop = server.stop_handle();
    let handle = std::thread::spawn(move || server.run());

    for seq in 0..3u16 {
        send_numbered(&dgm_tx, "10.0.0.1:5000", seq);
    }

    let mut frames = Vec::new();
    while let Some(frame) = frame_rx.recv() {
        let eof = frame.is_empty();
        frames.push(frame);
        if frames.len() == 5 {
            stop.stop();
        }
        if eof {
            break;
        }
    }
    handle.join().unwrap();

    let eof = frames.pop().unwrap();
    assert!(eof.is_empty());
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|f| f.len() == TICK));
}
