//  Copyright 2026, The Netwatch Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::fmt;

use chrono::{DateTime, Utc};

/// An immutable snapshot of host network availability.
///
/// `last_changed` is `None` until the tracker observes its first transition; the availability read
/// at start time only tells us the starting condition, not when it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    is_available: bool,
    last_changed: Option<DateTime<Utc>>,
}

impl ConnectivityState {
    pub(crate) fn initial(is_available: bool) -> Self {
        Self {
            is_available,
            last_changed: None,
        }
    }

    /// Produces the successor snapshot for a transition observed at `now`.
    pub(crate) fn transition(self, is_available: bool, now: DateTime<Utc>) -> Self {
        // The wall clock may step backwards; clamp so that successive snapshots never do.
        let last_changed = match self.last_changed {
            Some(prev) if now < prev => Some(prev),
            _ => Some(now),
        };
        Self {
            is_available,
            last_changed,
        }
    }

    /// True if the host currently reports network access.
    pub fn is_available(&self) -> bool {
        self.is_available
    }

    /// Wall-clock time of the most recent transition, if any has been observed.
    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.last_changed
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_available { "Available" } else { "Unavailable" };
        match self.last_changed {
            Some(at) => write!(f, "{} (since {})", status, at),
            None => write!(f, "{}", status),
        }
    }
}
