//! In-tag handler.
//!
//! Scans for the matching close marker. Content ahead of the retained tail
//! moves into the held buffer rather than being emitted immediately, so a
//! token split across feeds is reassembled before emission; the close
//! marker itself may span any number of chunk boundaries.

use crate::event::{Event, EventKind};
use crate::scan::{self, TagCloseScan};

use super::{Mode, Step, StreamParser};

pub(super) fn step(p: &mut StreamParser, out: &mut Vec<Event>) -> Step {
    let name = p.current_tag.as_ref().unwrap().name.clone();
    match scan::find_tag_close(&p.buffer, &name) {
        TagCloseScan::Found { start, end } => {
            p.hold_prefix(start);
            p.flush_text(out);
            out.push(p.event(EventKind::TagClose { name }));
            p.current_tag = None;
            p.consume(end - start);
            p.mode = Mode::Text;
            Step::Progress
        }
        TagCloseScan::Partial { start } => {
            p.hold_prefix(start);
            Step::NeedInput
        }
        TagCloseScan::Absent => {
            // Retain enough of the tail for a close marker to span the
            // chunk boundary.
            let keep = (name.len() + 1).max(1);
            if p.buffer.len() > keep {
                let mut cut = p.buffer.len() - keep;
                while !p.buffer.is_char_boundary(cut) {
                    cut -= 1;
                }
                p.hold_prefix(cut);
            }
            Step::NeedInput
        }
    }
}
