/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Diagnostic sinks.
//!
//! A [`StrBuf`](crate::StrBuf) reports what its growth machinery is doing
//! through two optional callbacks: a debug sink for reallocation traffic and
//! an error sink for allocation failures and formatting overruns. Both are
//! no-ops while unset; the buffer never treats their absence as an error and
//! never buffers or defers a diagnostic. Any state a sink needs travels in
//! its closure.
//!
//! With the `tracing` feature enabled, [`tracing_debug_sink`] and
//! [`tracing_error_sink`] provide ready-made sinks that hand diagnostics to
//! the `tracing` ecosystem.

use std::fmt;

/// A boxed diagnostic callback.
///
/// Sinks receive the structured [`fmt::Arguments`] of the diagnostic and
/// decide themselves whether and where to render them.
pub type SinkFn = Box<dyn Fn(fmt::Arguments<'_>)>;

/// A debug sink forwarding diagnostics to `tracing` at `DEBUG` level.
#[cfg(feature = "tracing")]
pub fn tracing_debug_sink() -> impl Fn(fmt::Arguments<'_>) {
    |args| tracing::debug!(target: "strbuf", "{args}")
}

/// An error sink forwarding diagnostics to `tracing` at `ERROR` level.
#[cfg(feature = "tracing")]
pub fn tracing_error_sink() -> impl Fn(fmt::Arguments<'_>) {
    |args| tracing::error!(target: "strbuf", "{args}")
}
