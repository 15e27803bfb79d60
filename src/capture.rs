//! Capture boundary
//!
//! The only place that touches raw packets. Live capture and pcap replay
//! share one packet path: slice the ethernet frame, map the transport
//! port to a protocol, dissect, then hand the normalized frame to the
//! pipeline, which updates the agent and emits frames and alerts through
//! the safety layer.

use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap::{Capture, Device};
use tracing::{debug, error, info, warn};

use crate::agent::TrackingAgent;
use crate::config::{CaptureConfig, SafetyConfig};
use crate::core::OtFrame;
use crate::dissectors;
use crate::safety::{AlertRamp, BufferedEmitter, KillSwitch};
use crate::sink::EventSink;

/// Extracts a normalized frame from one raw ethernet packet.
///
/// Returns `None` for anything that is not IP over TCP or UDP on a known
/// OT port, or whose payload the dissector rejects. The destination port
/// is consulted first so request traffic wins when both ports are
/// well-known; the source port catches response traffic.
pub fn frame_from_packet(data: &[u8], ts: DateTime<Utc>) -> Option<OtFrame> {
    let sliced = match SlicedPacket::from_ethernet(data) {
        Ok(sliced) => sliced,
        Err(_) => return None,
    };

    let (src_ip, dst_ip): (IpAddr, IpAddr) = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (header.source_addr().into(), header.destination_addr().into())
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            (header.source_addr().into(), header.destination_addr().into())
        }
        _ => return None,
    };

    let (src_port, dst_port, payload) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            (tcp.source_port(), tcp.destination_port(), tcp.payload())
        }
        Some(TransportSlice::Udp(udp)) => {
            (udp.source_port(), udp.destination_port(), udp.payload())
        }
        _ => return None,
    };

    let protocol = dissectors::protocol_for_port(dst_port)
        .or_else(|| dissectors::protocol_for_port(src_port))?;
    dissectors::dissect(protocol, payload, src_ip, dst_ip, ts)
}

/// Counters for one capture run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    /// Raw packets handed to the pipeline.
    pub packets: u64,
    /// Frames successfully dissected.
    pub frames: u64,
    /// Alerts raised by the rules.
    pub alerts: u64,
}

/// Everything between the packet source and the sink.
pub struct Pipeline {
    agent: TrackingAgent,
    emitter: BufferedEmitter<EventSink>,
    ramp: AlertRamp,
    kill: KillSwitch,
    emit_frames: bool,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        agent: TrackingAgent,
        sink: EventSink,
        emit_frames: bool,
        safety: &SafetyConfig,
        kill: KillSwitch,
    ) -> Self {
        if kill.engaged() {
            warn!(
                "{} is set; all emission is suppressed until it is cleared",
                crate::safety::KILL_SWITCH_ENV
            );
        }
        Pipeline {
            agent,
            emitter: BufferedEmitter::new(sink, safety.buffer_capacity),
            ramp: AlertRamp::new(safety.ramp_days),
            kill,
            emit_frames,
            stats: PipelineStats::default(),
        }
    }

    /// One raw packet in, frames and alerts out.
    pub fn handle_packet(&mut self, data: &[u8], ts: DateTime<Utc>) {
        self.stats.packets += 1;
        if let Some(frame) = frame_from_packet(data, ts) {
            self.process_frame(frame);
        }
    }

    /// Runs one dissected frame through the agent and the sink.
    pub fn process_frame(&mut self, frame: OtFrame) {
        self.stats.frames += 1;
        debug!(
            "{} frame {}: func {}",
            frame.protocol, frame.session_id, frame.func_code
        );

        if self.emit_frames {
            match frame.to_wire() {
                Ok(doc) => self.emit(doc),
                Err(e) => error!("Failed to serialize frame: {}", e),
            }
        }

        for mut alert in self.agent.ingest_frame(&frame) {
            alert.severity = self.ramp.severity(alert.severity);
            self.stats.alerts += 1;
            debug!("alert [{}] {}: {}", alert.severity, alert.rule, alert.message);
            match alert.to_wire() {
                Ok(doc) => self.emit(doc),
                Err(e) => error!("Failed to serialize alert: {}", e),
            }
        }
    }

    fn emit(&mut self, doc: String) {
        if self.kill.engaged() {
            return;
        }
        self.emitter.emit(doc);
    }

    /// Retries anything still buffered, typically at shutdown.
    pub fn flush(&mut self) {
        self.emitter.flush();
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn agent(&self) -> &TrackingAgent {
        &self.agent
    }
}

/// Builds the capture filter for the configured ports.
fn bpf_filter(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|port| format!("port {}", port))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn packet_time(header: &pcap::PacketHeader) -> DateTime<Utc> {
    let nanos = (header.ts.tv_usec.max(0) as u32).saturating_mul(1000);
    DateTime::from_timestamp(header.ts.tv_sec as i64, nanos).unwrap_or_else(Utc::now)
}

/// Opens the configured interface and feeds packets to `handle` until the
/// shutdown flag is set. The pcap read timeout bounds how long shutdown
/// can lag behind the flag.
pub fn run_live<F>(config: &CaptureConfig, shutdown: &AtomicBool, mut handle: F) -> Result<()>
where
    F: FnMut(&[u8], DateTime<Utc>),
{
    let mut cap = match &config.interface {
        Some(name) => Capture::from_device(name.as_str())
            .with_context(|| format!("Failed to open capture device {}", name))?,
        None => {
            let device = Device::lookup()
                .context("Failed to look up a capture device")?
                .ok_or_else(|| anyhow!("No capture device available"))?;
            info!("No interface configured; using {}", device.name);
            Capture::from_device(device).context("Failed to open default capture device")?
        }
    }
    .promisc(config.promiscuous)
    .snaplen(config.snaplen)
    .timeout(config.timeout_ms)
    .open()
    .context("Failed to activate capture")?;

    if !config.ports.is_empty() {
        let filter = bpf_filter(&config.ports);
        cap.filter(&filter, true)
            .with_context(|| format!("Failed to apply capture filter '{}'", filter))?;
        info!("Capture filter: {}", filter);
    }

    while !shutdown.load(Ordering::Relaxed) {
        match cap.next_packet() {
            Ok(packet) => handle(packet.data, packet_time(packet.header)),
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                warn!("Capture read failed: {}", e);
                break;
            }
        }
    }
    info!("Capture loop stopped");
    Ok(())
}

/// Replays a capture file through `handle`, using the recorded packet
/// timestamps.
pub fn run_file<F>(path: &Path, mut handle: F) -> Result<()>
where
    F: FnMut(&[u8], DateTime<Utc>),
{
    let mut cap = Capture::from_file(path)
        .with_context(|| format!("Failed to open capture file: {}", path.display()))?;

    loop {
        match cap.next_packet() {
            Ok(packet) => handle(packet.data, packet_time(packet.header)),
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => {
                warn!("Error reading capture file: {}", e);
                break;
            }
        }
    }
    Ok(())
}
