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

/// Identity of a host-delivered network signal. Signals carry no payload beyond which one fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSignal {
    Available,
    Unavailable,
}

impl NetworkSignal {
    pub fn is_available(self) -> bool {
        matches!(self, NetworkSignal::Available)
    }
}

impl fmt::Display for NetworkSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Handler installed on a [`SignalSource`]. Called once per delivered signal.
pub type SignalHandler = Box<dyn Fn(NetworkSignal) + Send + Sync>;

/// Identifies one handler registration on a [`SignalSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The host runtime's network-availability signal API as an injected capability.
///
/// The source delivers [`NetworkSignal::Available`] and [`NetworkSignal::Unavailable`] to every
/// installed handler, in delivery order, running each handler to completion before the next signal
/// is dispatched. Sources are part of the runtime and assumed reliable: registration and removal
/// do not fail, and there is nothing to retry. A signal the source never delivers simply leaves
/// observers with a stale reading until the next one arrives.
pub trait SignalSource: Send + Sync {
    /// Current availability as reported by the host.
    fn is_available(&self) -> bool;

    /// Installs `handler` to be called for every subsequently delivered signal.
    fn subscribe(&self, handler: SignalHandler) -> RegistrationId;

    /// Removes a previously installed handler. Unknown or already-removed ids are ignored.
    fn unsubscribe(&self, id: RegistrationId);
}
