// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Confession Relayer Crate 🕸️
//!
//! An HTTP service for anonymous confessions that are anchored on chain.
//!
//! ## Overview
//!
//! Confessions are never written directly by their authors. Instead a
//! visitor pays the relayer wallet the current anchoring fee, then hands
//! the relayer the confession text and the payment transaction hash. The
//! relayer:
//!
//!   1. checks the payment (mined, sent to the relayer, large enough, never
//!      used before),
//!   2. anchors the keccak-256 hash of the text from its own wallet, so the
//!      only on-chain trace points at the relayer,
//!   3. waits for confirmation and stores the confession with the relayer's
//!      transaction hash.
//!
//! Around that core the service offers listing, anonymous voting keyed by a
//! client generated visitor id, aggregate trends, and a moderation surface
//! guarded by a wallet-signature login for a single owner address.

/// A module for building the HTTP router and the background tasks.
pub mod service;

/// A type alias for the result for the confession relayer.
pub type Result<T> = confession_relayer_utils::Result<T>;
