use crate::models::{CodeGroup, CodePair, DetectedCode};

/// Codes whose tops differ by no more than this many pixels share a row.
pub const ROW_TOLERANCE: i32 = 100;

/// Groups detected codes into left/right pairs by row.
///
/// Codes are sorted by `(top, left)` and walked in order, so the result is
/// independent of detector output order. A group closes as soon as it
/// holds two codes (sorted by `left`) or when the next code's top moves
/// past `ROW_TOLERANCE` from the group's anchor; after a close the next
/// code re-anchors a fresh group. A group that closes with a single
/// member is kept as `CodeGroup::Incomplete` so the caller can report it
/// in sequence instead of dropping it.
pub fn group_codes(mut codes: Vec<DetectedCode>) -> Vec<CodeGroup> {
    codes.sort_by_key(|c| (c.top, c.left));

    let mut groups = Vec::new();
    let mut current: Vec<DetectedCode> = Vec::new();
    let mut anchor: Option<i32> = None;

    for code in codes {
        match anchor {
            None => anchor = Some(code.top),
            Some(row_top) if (code.top - row_top).abs() > ROW_TOLERANCE => {
                close_group(&mut groups, &mut current);
                anchor = Some(code.top);
            }
            Some(_) => {}
        }

        current.push(code);
        if current.len() == 2 {
            close_group(&mut groups, &mut current);
            anchor = None;
        }
    }
    close_group(&mut groups, &mut current);

    groups
}

fn close_group(groups: &mut Vec<CodeGroup>, current: &mut Vec<DetectedCode>) {
    match current.len() {
        0 => {}
        1 => {
            if let Some(code) = current.pop() {
                groups.push(CodeGroup::Incomplete(code));
            }
        }
        _ => {
            current.sort_by_key(|c| c.left);
            let right = current.pop();
            let left = current.pop();
            if let (Some(left), Some(right)) = (left, right) {
                groups.push(CodeGroup::Pair(CodePair::new(left, right)));
            }
        }
    }
    current.clear();
}
