//! Hooks: role filtering, systemd unit generation, install directives.

pub mod compile;
pub mod unit;

pub use compile::{DirectiveKind, HookScope, InstallDirective, compile_hooks};
pub use unit::{CommandEscaper, UnitManifest};
