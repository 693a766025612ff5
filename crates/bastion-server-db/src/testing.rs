// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// A migrated in-memory database.
///
/// One connection only: every `:memory:` connection is its own database.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	sqlx::query("PRAGMA foreign_keys = ON")
		.execute(&pool)
		.await
		.unwrap();
	crate::pool::migrate(&pool).await.unwrap();
	pool
}
