//! In-fence handler.
//!
//! Streams content out as chunk events while watching for the closing
//! delimiter line. A tail long enough to hide a partial close line is
//! retained across feeds; the close run must match the opening run's
//! length exactly.

use crate::event::{Event, EventKind};
use crate::scan;

use super::{Mode, Step, StreamParser};

pub(super) fn step(p: &mut StreamParser, out: &mut Vec<Event>) -> Step {
    if !p.finishing && p.buffer.len() < p.opts.min_parse_len {
        return Step::NeedInput;
    }
    let (kind, fence_len) = {
        let fence = p.current_fence.as_ref().unwrap();
        (fence.kind, fence.fence_len)
    };
    match scan::find_fence_close(&p.buffer, kind, fence_len, p.at_line_start, p.finishing) {
        Some(close) => {
            let content = p.buffer[..close.content_end].to_string();
            p.emit_fence_chunks(&content, true, out);
            out.push(p.event(EventKind::FenceEnd));
            p.current_fence = None;
            p.consume(close.end);
            p.mode = Mode::Text;
            Step::Progress
        }
        None => {
            let keep = p.opts.min_parse_len.saturating_sub(1).max(fence_len);
            if p.buffer.len() > keep {
                let mut cut = p.buffer.len() - keep;
                while !p.buffer.is_char_boundary(cut) {
                    cut -= 1;
                }
                let content = p.buffer[..cut].to_string();
                p.emit_fence_chunks(&content, false, out);
                p.consume(cut);
            }
            Step::NeedInput
        }
    }
}
