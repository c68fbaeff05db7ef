//! Backend command translation.
//!
//! Commands arriving over the control channel are mapped one-to-one onto
//! peer directives.  The mapping is total: every [`BackendCommand`] has
//! exactly one [`Directive`].

use crate::wire::messages::{BackendCommand, Directive};

/// Translate a backend command into the directive sent to the K210.
pub fn translate(command: BackendCommand) -> Directive {
    match command {
        BackendCommand::SetAiMode { mode } => Directive::SetMode { mode },
        BackendCommand::CaptureImage => Directive::CaptureImage,
        BackendCommand::StartAudio => Directive::StartAudio,
        BackendCommand::StopAudio => Directive::StopAudio,
    }
}
