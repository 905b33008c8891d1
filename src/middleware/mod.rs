// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Middleware modules.

pub mod security;
