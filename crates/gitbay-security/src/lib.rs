// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security helpers for the gitbay service.
//!
//! Guarantees the redaction contract: no credential material supplied to
//! the credential manager ever appears in logs, stored records, or error
//! payloads crossing the tool boundary.

pub mod redact;

pub use redact::{redact, redact_url, RedactingWriter, SecretRegistry, REDACTED};
