use std::io::{self, Write};
use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use netaudio::audio::queue::FrameQueue;
use netaudio::audio::{HeapByteBufferComposer, HeapSampleBufferComposer};
use netaudio::datagram::Datagram;
use netaudio::datagram::queue::DatagramQueue;
use netaudio::packet::rtp::RtpParser;
use netaudio::session::pool::FixedSessionPool;
use netaudio::{ENABLE_TIMING, Server, ServerConfig};

#[derive(Parser)]
#[command(
    name = "netaudio-server",
    about = "Receives RTP/L16 audio streams and writes mixed s16le PCM to stdout"
)]
struct Args {
    /// Bind address (host:port) for the UDP receive socket
    #[arg(long, short, default_value = "0.0.0.0:10001")]
    bind: String,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    rate: u32,

    /// Number of output channels (1..=32)
    #[arg(long, default_value_t = 2)]
    channels: u32,

    /// Output frame size in samples per channel
    #[arg(long, default_value_t = 441)]
    samples_per_tick: usize,

    /// Startup silence in samples
    #[arg(long, default_value_t = 4410)]
    output_latency: u32,

    /// Per-session jitter buffer depth in samples
    #[arg(long, default_value_t = 8820)]
    session_latency: u32,

    /// Session idle timeout in samples
    #[arg(long, default_value_t = 441000)]
    session_timeout: u32,

    /// Pace output to real time (for piping into non-blocking sinks)
    #[arg(long)]
    timed: bool,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if args.channels == 0 || args.channels > 32 {
        eprintln!("channels must be between 1 and 32");
        std::process::exit(2);
    }
    let channels = if args.channels == 32 {
        u32::MAX
    } else {
        (1u32 << args.channels) - 1
    };

    let socket = match UdpSocket::bind(&args.bind) {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", args.bind, e);
            std::process::exit(1);
        }
    };
    let local_addr = socket.local_addr().expect("bound socket has an address");

    let (dgm_tx, dgm_rx) = DatagramQueue::bounded(1024);
    let (frame_tx, frame_rx) = FrameQueue::bounded(64);

    let byte_composer = Arc::new(HeapByteBufferComposer);
    let config = ServerConfig {
        channels,
        sample_rate: args.rate,
        samples_per_tick: args.samples_per_tick,
        output_latency: args.output_latency,
        session_latency: args.session_latency,
        session_timeout: args.session_timeout,
        options: if args.timed { ENABLE_TIMING } else { 0 },
        session_pool: Some(Arc::new(FixedSessionPool::new(32))),
        byte_buffer_composer: Some(byte_composer.clone()),
        sample_buffer_composer: Some(Arc::new(HeapSampleBufferComposer)),
        ..ServerConfig::default()
    };

    let mut server = match Server::new(Box::new(dgm_rx), Box::new(frame_tx), config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to build pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let parser = match RtpParser::new(channels, args.rate, byte_composer) {
        Ok(parser) => Arc::new(parser),
        Err(e) => {
            eprintln!("Failed to build parser: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = server.add_port(local_addr, parser) {
        eprintln!("Failed to register port: {}", e);
        std::process::exit(1);
    }

    // Receiver thread: socket to datagram queue. Runs until process exit.
    thread::spawn(move || {
        let mut buf = [0u8; 2048];
        loop {
            match socket.recv_from(&mut buf) {
                Ok((len, src)) => {
                    dgm_tx.send(Datagram {
                        src,
                        dst: local_addr,
                        payload: buf[..len].to_vec(),
                    });
                }
                Err(e) => {
                    tracing::warn!("socket receive failed: {}", e);
                    break;
                }
            }
        }
    });

    let stop = server.stop_handle();
    let server_thread = thread::spawn(move || server.run());

    // Playback thread: frame queue to stdout as interleaved s16le PCM.
    let sink_thread = thread::spawn(move || {
        let stdout = io::stdout();
        let mut out = io::BufWriter::new(stdout.lock());
        while let Some(frame) = frame_rx.recv() {
            if frame.is_empty() {
                break;
            }
            for sample in frame {
                let s = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                if out.write_all(&s.to_le_bytes()).is_err() {
                    return;
                }
            }
        }
        let _ = out.flush();
    });

    eprintln!("Receiving on {local_addr} — press Enter to stop");
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);

    stop.stop();
    let _ = server_thread.join();
    let _ = sink_thread.join();
}
