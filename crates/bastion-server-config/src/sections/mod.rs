// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

pub mod audit;
pub mod database;
pub mod logging;
pub mod password;
pub mod rate_limit;
pub mod session;

pub use audit::{AuditConfig, AuditConfigLayer, AuditSeverityLevel, DEFAULT_SINK_TIMEOUT_MS};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use password::{HashAlgorithm, PasswordConfig, PasswordConfigLayer};
pub use rate_limit::{RateLimitConfig, RateLimitConfigLayer};
pub use session::{SessionConfig, SessionConfigLayer};
