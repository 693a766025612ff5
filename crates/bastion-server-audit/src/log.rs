// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The ordered audit writer.
//!
//! [`AuditLog::append`] numbers each entry under the sequence lock, then
//! walks the sinks holding one sink's turn lock at a time. The next turn is
//! taken before the previous one is released, so writers pass through every
//! sink in sequence order while different sinks publish different entries
//! concurrently. The sequence lock itself is only held until the writer has
//! its turn at the first sink.
//!
//! Each publish is bounded by the sink timeout, so a stalled sink delays
//! the writers behind it by at most that long. Every sink is attempted; the
//! first failure is returned after the others have run.

use std::sync::Arc;
use std::time::Duration;

use bastion_server_auth::AccountId;
use bastion_server_config::{AuditConfig, DEFAULT_SINK_TIMEOUT_MS};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{instrument, warn};

use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::event::{AuditAction, AuditEntry, AuditEntryBuilder};
use crate::filter::AuditFilterConfig;
use crate::redaction::redact_json_value;
use crate::sink::AuditSink;

struct SinkSlot {
	sink: Arc<dyn AuditSink>,
	turn: Mutex<()>,
}

pub struct AuditLog {
	enabled: bool,
	filter: AuditFilterConfig,
	sinks: Vec<SinkSlot>,
	sequence: Mutex<u64>,
	sink_timeout: Duration,
}

impl AuditLog {
	pub fn new(filter: AuditFilterConfig, sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		Self {
			enabled: true,
			filter,
			sinks: sinks
				.into_iter()
				.map(|sink| SinkSlot {
					sink,
					turn: Mutex::new(()),
				})
				.collect(),
			sequence: Mutex::new(0),
			sink_timeout: Duration::from_millis(DEFAULT_SINK_TIMEOUT_MS),
		}
	}

	/// A log that accepts and drops everything.
	pub fn disabled() -> Self {
		Self {
			enabled: false,
			..Self::new(AuditFilterConfig::default(), Vec::new())
		}
	}

	pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
		self.sink_timeout = timeout;
		self
	}

	/// Build from configuration. The tracing sink is added when configured;
	/// `sinks` carries the durable ones.
	pub fn from_config(config: &AuditConfig, mut sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		if !config.enabled {
			return Self::disabled();
		}

		#[cfg(feature = "sink-tracing")]
		if config.tracing_sink {
			sinks.push(Arc::new(crate::sink::tracing::TracingAuditSink::new(
				AuditFilterConfig::all(),
			)));
		}

		Self::new(
			AuditFilterConfig::with_min_severity(config.min_severity.into()),
			sinks,
		)
		.with_sink_timeout(Duration::from_millis(config.sink_timeout_ms))
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn sink_names(&self) -> Vec<String> {
		self.sinks.iter().map(|s| s.sink.name().to_string()).collect()
	}

	/// Record one action.
	pub async fn record(
		&self,
		action: AuditAction,
		actor_id: Option<AccountId>,
		target_id: Option<AccountId>,
		metadata: serde_json::Value,
	) -> AuditResult<Option<Arc<AuditEntry>>> {
		self.append(
			AuditEntry::builder(action)
				.maybe_actor(actor_id)
				.maybe_target(target_id)
				.metadata(metadata),
		)
		.await
	}

	/// Append a built entry. Returns `Ok(None)` when the entry was filtered
	/// out or the log is disabled.
	#[instrument(skip(self, builder))]
	pub async fn append(
		&self,
		builder: AuditEntryBuilder,
	) -> AuditResult<Option<Arc<AuditEntry>>> {
		if !self.enabled {
			return Ok(None);
		}

		let mut entry = builder.build();
		if !self.filter.allows(&entry) {
			return Ok(None);
		}
		redact_json_value(&mut entry.metadata);

		let mut sequence = self.sequence.lock().await;
		*sequence += 1;
		entry.sequence = *sequence;
		let entry = Arc::new(entry);
		let mut numbering = Some(sequence);

		let mut first_failure: Option<AuditError> = None;
		let mut held: Option<MutexGuard<'_, ()>> = None;
		for slot in &self.sinks {
			let turn = slot.turn.lock().await;
			drop(numbering.take());
			held = Some(turn);

			if !slot.sink.filter().allows(&entry) {
				continue;
			}
			if let Err(e) = self.publish(slot, &entry).await {
				warn!(
					sink = slot.sink.name(),
					action = %entry.action,
					sequence = entry.sequence,
					error = %e,
					"audit sink publish failed"
				);
				first_failure.get_or_insert(AuditError::SinkError {
					sink: slot.sink.name().to_string(),
					source: e,
				});
			}
		}
		drop(held);
		drop(numbering);

		match first_failure {
			Some(e) => Err(e),
			None => Ok(Some(entry)),
		}
	}

	async fn publish(&self, slot: &SinkSlot, entry: &Arc<AuditEntry>) -> Result<(), AuditSinkError> {
		match tokio::time::timeout(self.sink_timeout, slot.sink.publish(Arc::clone(entry))).await {
			Ok(result) => result,
			Err(_) => Err(AuditSinkError::Transient(format!(
				"publish timed out after {}ms",
				self.sink_timeout.as_millis()
			))),
		}
	}

	/// Health of every sink, by name.
	pub async fn health_check(&self) -> Vec<(String, Result<(), AuditSinkError>)> {
		let mut results = Vec::with_capacity(self.sinks.len());
		for SinkSlot { sink, .. } in &self.sinks {
			results.push((sink.name().to_string(), sink.health_check().await));
		}
		results
	}
}
