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

#![warn(missing_docs)]
//! # Confession Transaction Relay 🕸️
//!
//! The paid, anonymous submission path: rate limiting, payment
//! verification and the orchestrator that anchors a confession hash from
//! the relayer wallet before storing the confession.

/// Payment transaction checks.
pub mod payment;
/// Fixed-window rate limiting per network address.
pub mod rate_limit;
/// The submission state machine.
pub mod submit;
/// Input shape checks.
pub mod validation;

pub use payment::verify_payment;
pub use rate_limit::{RateLimiter, TrustedProxies};
pub use submit::{RelayerSubmitter, SubmissionError, SubmissionReceipt};
pub use validation::{validate_submission, FieldError, ValidSubmission};
