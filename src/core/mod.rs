/*
 * SPDX-FileCopyrightText: 2025 Sven Shi
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

pub mod context;
pub mod dns_utils;
pub mod error;
pub mod exec_ctx;
pub mod log;
