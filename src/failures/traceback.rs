//! Shared-prefix folding and rendering of traces

use super::{Frame, ParsingFailure};

/// Marker line standing in for frames shared by all traces of a cluster
pub const SHARED_FRAMES_MARKER: &str = "  ...";

/// Number of leading frames identical across all `traces`
///
/// Never covers the last frame of the shortest trace, so every trace keeps at
/// least one frame of its own. For fully identical traces of length `L` this is
/// `L - 1`; for traces diverging at index `i` it is `i`.
pub fn shared_prefix_len(traces: &[&[Frame]]) -> usize {
    let Some(min_len) = traces.iter().map(|t| t.len()).min() else {
        return 0;
    };
    let cap = min_len.saturating_sub(1);

    let Some((first, rest)) = traces.split_first() else {
        return 0;
    };
    let diverges_at = (0..min_len)
        .find(|&i| rest.iter().any(|trace| trace[i] != first[i]))
        .unwrap_or(min_len);

    diverges_at.min(cap)
}

/// Rewrite a source path so reports do not expose the local directory layout
///
/// Paths through the `marker` directory become `.../<marker>/<rest>`. Other
/// relative paths are kept, other absolute paths are reduced to `.../<file>`.
pub fn shorten_path(path: &str, marker: &str) -> String {
    let normalized = path.replace('\\', "/");

    if !marker.is_empty() {
        let needle = format!("{}/", marker);
        let found = if normalized.starts_with(&needle) {
            Some(0)
        } else {
            normalized
                .find(&format!("/{}", needle))
                .map(|pos| pos + 1)
        };
        if let Some(start) = found {
            return format!(".../{}", &normalized[start..]);
        }
    }

    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);
        return format!(".../{}", file_name);
    }

    normalized
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

fn render_frame(frame: &Frame, marker: &str) -> String {
    format!(
        "  at {} ({}:{})",
        frame.function,
        shorten_path(&frame.file, marker),
        frame.line
    )
}

/// Render the traces of one cluster, shared frames shown only once
///
/// The first trace is rendered in full. Every following trace starts with
/// [`SHARED_FRAMES_MARKER`] in place of the shared frames (if there are any),
/// then its own frames. Each trace ends with `<Kind>: <message>`.
pub fn format_traces(failures: &[ParsingFailure], marker: &str) -> Vec<Vec<String>> {
    let frames: Vec<&[Frame]> = failures.iter().map(|f| f.trace.frames.as_slice()).collect();
    let shared = shared_prefix_len(&frames);

    failures
        .iter()
        .enumerate()
        .map(|(i, failure)| {
            let mut lines = Vec::with_capacity(failure.trace.len() + 2);
            let own_frames = &failure.trace.frames[shared..];
            if i == 0 {
                lines.extend(
                    failure.trace.frames[..shared]
                        .iter()
                        .map(|frame| render_frame(frame, marker)),
                );
            } else if shared > 0 {
                lines.push(SHARED_FRAMES_MARKER.to_string());
            }
            lines.extend(own_frames.iter().map(|frame| render_frame(frame, marker)));
            lines.push(format!("{}: {}", failure.kind.display_name(), failure.message));
            lines
        })
        .collect()
}
