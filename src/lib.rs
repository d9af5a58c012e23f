//! # Fotodeck
//!
//! Serve a directory of photographs over HTTP. Every photo gets two resized
//! derivatives written next to it (a full-size "optimised" copy and a small
//! preview), and the index follows the directory as photos are added,
//! removed or replaced.
//!
//! # Architecture: One Generation at a Time
//!
//! ```text
//!            ┌──────────── reload ────────────┐
//! photos/ ─► │ 1. Scan      walk → ImageIndex │
//!            │ 2. Optimise  derivatives       │ ─► SharedIndex ─► HTTP handlers
//!            └────────────────────────────────┘        ▲
//!                      ▲                               │ publish
//!                      └────────── ChangeWatcher ──────┘
//! ```
//!
//! A reload always builds a complete new [`types::ImageIndex`] off to the
//! side and publishes it in one swap. Readers see the old generation or the
//! new one, never a mixture, and a failed reload leaves the old one in
//! place.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the home directory and builds a fresh index of originals |
//! | [`process`] | Parallel derivative generation for a whole index; `reload` = scan + optimise |
//! | [`imaging`] | Fit-to-box math, resampling choice, the `image`-crate backend, [`imaging::derive_variant`] |
//! | [`shared`] | The published generation, shared by the watcher and request handlers |
//! | [`watch`] | Change notifications, throttled reloads |
//! | [`server`] | axum routes: index page, full-size and preview images, static assets |
//! | [`types`] | [`types::ImageEntry`] with its fallback accessors and derivative cleanup |
//! | [`naming`] | Marker tags and derivative file naming |
//! | [`config`] | `config.toml` loading and validation |
//! | [`output`] | CLI output formatting for `scan` and `cleanup` |
//!
//! # Design Decisions
//!
//! ## Derivatives Live Next to Their Originals
//!
//! `beach.jpg` gets `beach.optimised.jpg` and `beach.preview.jpg` in the same
//! directory. The marker tag in the name is the only bookkeeping: the scanner
//! skips anything carrying a tag, the watcher ignores writes to such files,
//! and an existing derivative is simply reused. There is no cache database to
//! get out of sync; deleting derivatives (by hand or with `fotodeck cleanup`)
//! is always safe.
//!
//! A consequence: an edited original keeps its old derivatives until they
//! are deleted.
//!
//! ## Failures Degrade to the Original
//!
//! A photo that fails to resize keeps serving its original bytes. Only
//! startup errors (bad config, missing home directory) are fatal.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
pub mod server;
pub mod shared;
pub mod types;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
