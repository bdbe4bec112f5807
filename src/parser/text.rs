//! Text-mode handler.
//!
//! Finds the earliest position in the buffer that could start a tag or a
//! fence and decides without committing early: plain text moves to the
//! held buffer, an unresolved candidate waits for more input, and a
//! candidate that outgrows the lookahead limit is demoted to text.

use crate::event::{Event, EventKind, FenceScope, TagScope};
use crate::scan::{self, FenceOpenScan, SpecialKind, TagScan};

use super::{Mode, Step, StreamParser};

pub(super) fn step(p: &mut StreamParser, out: &mut Vec<Event>) -> Step {
    if !p.finishing && p.buffer.len() < p.opts.min_parse_len {
        return match scan::next_candidate(&p.buffer, p.at_line_start, 0) {
            None => {
                let n = p.buffer.len();
                p.hold_prefix(n);
                Step::Progress
            }
            Some(c) if c.pos == 0 => Step::NeedInput,
            Some(c) => {
                p.hold_prefix(c.pos);
                Step::NeedInput
            }
        };
    }
    let candidate = match scan::next_candidate(&p.buffer, p.at_line_start, 0) {
        None => {
            let n = p.buffer.len();
            p.hold_prefix(n);
            return Step::Progress;
        }
        Some(c) => c,
    };
    p.hold_prefix(candidate.pos);
    match candidate.kind {
        SpecialKind::Tag => tag_candidate(p, out),
        SpecialKind::Fence => fence_candidate(p, out),
    }
}

fn tag_candidate(p: &mut StreamParser, out: &mut Vec<Event>) -> Step {
    match scan::scan_tag_open(&p.buffer) {
        TagScan::Partial => {
            if p.buffer.len() >= p.opts.lookahead_limit {
                demote_lookahead(p);
                Step::Progress
            } else {
                Step::NeedInput
            }
        }
        TagScan::No => {
            p.hold_prefix(1);
            Step::Progress
        }
        TagScan::Open { name_end, end } => {
            let name = p.buffer[1..name_end].to_string();
            if !p.opts.recognizes(&name) {
                // The `<` alone becomes literal text; the rest of the
                // buffer is rescanned on the next pass.
                p.hold_prefix(1);
                return Step::Progress;
            }
            p.flush_text(out);
            let attrs = scan::parse_attrs(&p.buffer[name_end..end - 1]);
            p.current_tag = Some(TagScope {
                name: name.clone(),
                attrs: attrs.clone(),
            });
            out.push(p.event(EventKind::TagOpen { name, attrs }));
            p.consume(end);
            p.mode = Mode::InTag;
            Step::Progress
        }
    }
}

fn fence_candidate(p: &mut StreamParser, out: &mut Vec<Event>) -> Step {
    match scan::scan_fence_open(&p.buffer) {
        FenceOpenScan::Partial => {
            if p.buffer.len() >= p.opts.lookahead_limit {
                demote_lookahead(p);
                Step::Progress
            } else {
                Step::NeedInput
            }
        }
        FenceOpenScan::No => {
            p.hold_prefix(1);
            Step::Progress
        }
        FenceOpenScan::Open {
            kind,
            fence_len,
            lang,
            end,
        } => {
            p.flush_text(out);
            p.current_fence = Some(FenceScope {
                kind,
                fence_len,
                lang: lang.clone(),
            });
            out.push(p.event(EventKind::FenceStart { kind, lang }));
            p.consume(end);
            p.mode = Mode::InFence;
            Step::Progress
        }
    }
}

/// The pending candidate outgrew the lookahead limit without resolving.
/// Demote it to text, but only up to the next place a special could start,
/// so an embedded `<` or fence line is examined on the next pass.
fn demote_lookahead(p: &mut StreamParser) {
    let cut = match scan::next_candidate(&p.buffer, p.at_line_start, 1) {
        Some(c) => c.pos,
        None => p.buffer.len(),
    };
    p.hold_prefix(cut);
}
