// ─── Launchpad Core ───
// Content load-order model and game installer backend.
//
// Architecture:
//   core/
//     content/  Content files, dependency index, validation, activation, lists
//     install/  Install plan ordering, archive extraction, file placement
//     wizard/   Setup flow state machine + legacy settings import
//     state/    Settings and the per-session application state
//     error     Central error type

pub mod content;
pub mod error;
pub mod install;
pub mod state;
pub mod wizard;
