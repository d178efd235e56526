#![no_main]

use axethrow::host::LineMatch;
use axethrow::tracking::feed::{list_pattern, position_from_line};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // First line is the entity id, the rest are console responses.
    let mut lines = text.lines();
    let Some(id) = lines.next() else {
        return;
    };

    let Ok(list) = list_pattern("Handaxe") else {
        return;
    };

    for line in lines {
        if let Some(found) = LineMatch::capture(&list, line) {
            let _ = found.get("id");
        }
        if let Some(position) = position_from_line(id, line) {
            assert!(position.x.is_finite() && position.y.is_finite() && position.z.is_finite());
        }
    }
});
