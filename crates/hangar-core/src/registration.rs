// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical aircraft registration used as the identity key everywhere.
///
/// The tile registry and the providers disagree on formatting (`DAIBL`,
/// `d-aibl`, `D-AIBL`), so every comparison goes through
/// [`normalize_registration`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registration(String);

impl Registration {
    /// Returns `None` when nothing usable is left after normalization.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_registration(raw);
        if normalized.is_empty() || normalized == "-" {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Registration {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Uppercases, drops whitespace and inserts a hyphen after the first
/// character when the input has none. Idempotent.
pub fn normalize_registration(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    if compact.contains('-') || compact.chars().count() < 2 {
        return compact;
    }

    let mut chars = compact.chars();
    let mut out = String::with_capacity(compact.len() + 1);
    if let Some(first) = chars.next() {
        out.push(first);
    }
    out.push('-');
    out.extend(chars);
    out
}

/// `"lh 438"` / `"LH-438"` -> `"LH438"`.
pub fn normalize_flight_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}
