// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod accounts;
mod durable;
mod last_admin;
mod login;
mod races;
mod sessions;
mod support;
