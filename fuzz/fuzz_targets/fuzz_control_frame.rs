//! Fuzz target: `parse_control_frame` + `translate`
//!
//! Any text frame the backend might push must either decode into a command
//! that translates to a directive, or fail with a `ParseError`.  Never panic.
//!
//! cargo fuzz run fuzz_control_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use tbao_bridge::app::commands::translate;
use tbao_bridge::wire::messages::{ControlFrame, parse_control_frame};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(ControlFrame::Command(command)) = parse_control_frame(text) {
        let directive = translate(command);
        assert!(!directive.kind().is_empty());
        assert!(directive.payload().is_object());
    }
});
