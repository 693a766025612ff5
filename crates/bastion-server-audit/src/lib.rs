// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only audit trail for security-relevant actions.
//!
//! Entries are numbered and fanned out to sinks by [`AuditLog`]. Sink
//! failures come back to the caller as [`AuditError`]; callers treat them as
//! an observability problem and never undo the action being audited.

pub mod error;
pub mod event;
pub mod filter;
pub mod log;
pub mod redaction;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{AuditAction, AuditEntry, AuditEntryBuilder, AuditSeverity};
pub use filter::AuditFilterConfig;
pub use log::AuditLog;
pub use sink::memory::MemoryAuditSink;
pub use sink::AuditSink;

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;
