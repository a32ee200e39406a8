//! Classification of raw output chunks from the proxy child.
//!
//! The child multiplexes three things onto stdout: free-text log lines,
//! packet notifications carrying a `(<N> bytes)` size, and `packet-meta`
//! marker lines with an embedded JSON payload. Classification is a pure,
//! synchronous transformation over one chunk; parse failures degrade to
//! missing metadata or zero byte deltas, never to an error.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use super::event::{LogKind, PacketMeta};

/// Marker substring tagging protocol-control lines in the child's stdout.
pub const META_MARKER: &str = "packet-meta";

/// Phrase emitted when a packet arrives from the tunnel interface.
const TUN_INGRESS_MARKER: &str = "→ Packet da TUN";
/// Phrase emitted when a packet arrives from the UDP transport.
const UDP_EGRESS_MARKER: &str = "← Packet from UDP";

static BYTE_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+) bytes\)").expect("valid byte count pattern"));

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Result of classifying one chunk: the log record to materialize plus the
/// counter deltas it contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: LogKind,
    pub message: String,
    pub meta: Option<PacketMeta>,
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl Classified {
    fn plain(kind: LogKind, message: String) -> Self {
        Self {
            kind,
            message,
            meta: None,
            packets_in: 0,
            packets_out: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }
}

/// Classify one raw chunk of child output.
///
/// Stderr chunks bypass packet detection entirely. For stdout, packet
/// direction is detected on the raw chunk before marker lines are stripped,
/// so a single line carrying both the phrase and an inline meta payload
/// still counts.
pub fn classify_chunk(text: &str, source: StreamSource) -> Classified {
    if source == StreamSource::Stderr {
        return Classified::plain(LogKind::Stderr, text.trim().to_string());
    }

    let mut classified = Classified::plain(LogKind::Stdout, String::new());

    if text.contains(TUN_INGRESS_MARKER) {
        classified.kind = LogKind::Packet;
        classified.packets_in = 1;
        classified.bytes_in = parse_byte_count(text);
    }
    if text.contains(UDP_EGRESS_MARKER) {
        classified.kind = LogKind::Packet;
        classified.packets_out = 1;
        classified.bytes_out = parse_byte_count(text);
    }

    classified.meta = extract_packet_meta(text);
    classified.message = strip_meta_lines(text);
    classified
}

/// First `(<N> bytes)` match in the chunk, or 0 when absent or unparsable.
fn parse_byte_count(text: &str) -> u64 {
    let Some(digits) = BYTE_COUNT_RE.captures(text).and_then(|c| c.get(1)) else {
        return 0;
    };
    digits.as_str().parse().unwrap_or_else(|err| {
        warn!(%err, raw = digits.as_str(), "unparsable packet byte count");
        0
    })
}

/// Extract the first successfully parsed `packet-meta` payload in the chunk.
///
/// The JSON object is located by a balanced-brace scan starting after the
/// marker token. The child emits the payload on its own line
/// (`packet-meta { ... }`), but the inline form
/// (`... {packet-meta: {...}}`) must resolve to the inner object too.
fn extract_packet_meta(text: &str) -> Option<PacketMeta> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || !line.contains(META_MARKER) {
            continue;
        }
        let Some(json) = balanced_object_after(line, META_MARKER) else {
            warn!(line, "packet-meta line without a JSON object");
            continue;
        };
        match serde_json::from_str(json) {
            Ok(meta) => return Some(meta),
            Err(err) => warn!(%err, line, "malformed packet-meta payload"),
        }
    }
    None
}

/// Slice of `line` covering the first balanced `{...}` after `marker`.
fn balanced_object_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = &line[line.find(marker)? + marker.len()..];
    let open = rest.find('{')?;
    let mut depth = 0usize;
    for (i, ch) in rest[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[open..open + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Display text for a chunk: everything except marker lines.
fn strip_meta_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.contains(META_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingress_packet_counts_bytes() {
        let c = classify_chunk(
            "[tun-proxy] → Packet da TUN (1500 bytes)\n",
            StreamSource::Stdout,
        );
        assert_eq!(c.kind, LogKind::Packet);
        assert_eq!(c.packets_in, 1);
        assert_eq!(c.bytes_in, 1500);
        assert_eq!(c.packets_out, 0);
        assert_eq!(c.bytes_out, 0);
    }

    #[test]
    fn egress_packet_counts_bytes() {
        let c = classify_chunk(
            "[tun-proxy] ← Packet from UDP (64 bytes)\n",
            StreamSource::Stdout,
        );
        assert_eq!(c.kind, LogKind::Packet);
        assert_eq!(c.packets_out, 1);
        assert_eq!(c.bytes_out, 64);
        assert_eq!(c.packets_in, 0);
    }

    #[test]
    fn missing_byte_count_degrades_to_zero() {
        let c = classify_chunk("→ Packet da TUN (many bytes)", StreamSource::Stdout);
        assert_eq!(c.kind, LogKind::Packet);
        assert_eq!(c.packets_in, 1);
        assert_eq!(c.bytes_in, 0);
    }

    #[test]
    fn plain_output_is_stdout() {
        let c = classify_chunk("[tun-proxy] Interface criada: tun0", StreamSource::Stdout);
        assert_eq!(c.kind, LogKind::Stdout);
        assert_eq!(c.message, "[tun-proxy] Interface criada: tun0");
        assert!(c.meta.is_none());
        assert_eq!(c.packets_in + c.packets_out, 0);
    }

    #[test]
    fn stderr_bypasses_packet_detection() {
        let c = classify_chunk("→ Packet da TUN (1500 bytes)", StreamSource::Stderr);
        assert_eq!(c.kind, LogKind::Stderr);
        assert_eq!(c.packets_in, 0);
        assert_eq!(c.bytes_in, 0);
    }

    #[test]
    fn meta_on_its_own_line_is_extracted_and_stripped() {
        let chunk = concat!(
            "[tun-proxy] → Packet da TUN (120 bytes)\n",
            "[tun-proxy] packet-meta { \"src\": \"fe80::1\", \"dst\": \"fe80::2\", \"proto\": \"udp\", \"size\": 120 }\n",
        );
        let c = classify_chunk(chunk, StreamSource::Stdout);
        assert_eq!(c.kind, LogKind::Packet);
        let meta = c.meta.expect("meta should parse");
        assert_eq!(meta.src, "fe80::1");
        assert_eq!(meta.size, 120);
        assert_eq!(c.message, "[tun-proxy] → Packet da TUN (120 bytes)");
    }

    #[test]
    fn inline_meta_resolves_to_inner_object() {
        // Single line carrying the phrase, the byte count, and the payload.
        let chunk = "→ Packet da TUN (120 bytes) {packet-meta: {\"src\":\"a\",\"dst\":\"b\",\"proto\":\"udp\",\"size\":120}}";
        let c = classify_chunk(chunk, StreamSource::Stdout);
        assert_eq!(c.kind, LogKind::Packet);
        assert_eq!(c.packets_in, 1);
        assert_eq!(c.bytes_in, 120);
        let meta = c.meta.expect("inline meta should parse");
        assert_eq!(meta.src, "a");
        assert_eq!(meta.dst, "b");
        assert_eq!(meta.proto, "udp");
        assert_eq!(meta.size, 120);
    }

    #[test]
    fn malformed_meta_keeps_the_entry() {
        let chunk = "→ Packet da TUN (40 bytes)\npacket-meta { not json }\n";
        let c = classify_chunk(chunk, StreamSource::Stdout);
        assert_eq!(c.kind, LogKind::Packet);
        assert!(c.meta.is_none());
        assert_eq!(c.packets_in, 1);
        assert_eq!(c.bytes_in, 40);
        assert_eq!(c.message, "→ Packet da TUN (40 bytes)");
    }

    #[test]
    fn meta_line_without_object_is_ignored() {
        let c = classify_chunk("packet-meta but no payload", StreamSource::Stdout);
        assert!(c.meta.is_none());
        assert_eq!(c.message, "");
    }

    #[test]
    fn chunk_with_both_directions_counts_both() {
        let chunk = "→ Packet da TUN (100 bytes)\n← Packet from UDP (100 bytes)\n";
        let c = classify_chunk(chunk, StreamSource::Stdout);
        assert_eq!(c.kind, LogKind::Packet);
        assert_eq!(c.packets_in, 1);
        assert_eq!(c.packets_out, 1);
    }
}
