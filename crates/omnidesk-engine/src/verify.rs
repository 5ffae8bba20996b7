// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook subscription handshake.

/// Outcome of a `hub.*` verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Echo the challenge back with 200.
    Accepted(i64),
    /// 403.
    Forbidden,
    /// 400: malformed or incomplete request.
    BadRequest,
}

/// Check a subscription handshake against the configured verify token.
///
/// The challenge must parse as an integer before anything else is looked at.
/// With no token configured every complete request is refused.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected: Option<&str>,
) -> Verification {
    let Ok(challenge_value) = challenge.unwrap_or_default().trim().parse::<i64>() else {
        return Verification::BadRequest;
    };
    let (mode, token) = (mode.unwrap_or_default(), token.unwrap_or_default());
    if mode.is_empty() || token.is_empty() {
        return Verification::BadRequest;
    }

    match expected {
        Some(expected) if mode == "subscribe" && !expected.is_empty() && token == expected => {
            Verification::Accepted(challenge_value)
        }
        _ => Verification::Forbidden,
    }
}
