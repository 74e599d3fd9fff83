//! Terminal launcher driven by extension commands.
//!
//! Extensions are external programs described by a JSON manifest. Their
//! commands print pages (lists, details) or declarative actions (copy, open,
//! run another command...), and beacon turns those into a navigable stack of
//! pages. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure data model and page/resolution logic. No I/O.
//! - **[`io`]**: Filesystem, subprocesses and OS side effects, each behind a
//!   trait so the orchestration can be driven by scripted collaborators.
//!
//! Orchestration modules ([`executor`], [`navigator`], [`app`]) tie the two
//! together; [`tui`] draws the result with ratatui.

pub mod app;
pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod navigator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tui;
