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

//! An in-memory [`SignalSource`] for tests.

use std::sync::{Arc, Mutex};

use crate::signal::{NetworkSignal, RegistrationId, SignalHandler, SignalSource};

type SharedHandler = Arc<dyn Fn(NetworkSignal) + Send + Sync>;

/// A [`SignalSource`] backed by an in-memory handler table, with call accounting so tests can
/// assert on registration behaviour (duplicate subscribes, dangling handlers after teardown).
///
/// Clones share state, so a test can hold one clone while the tracker under test owns another.
#[derive(Clone)]
pub struct TestSignalSource {
    inner: Arc<Mutex<State>>,
}

struct State {
    available: bool,
    handlers: Vec<(RegistrationId, SharedHandler)>,
    next_id: u64,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
}

impl TestSignalSource {
    pub fn new(initially_available: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                available: initially_available,
                handlers: Vec::new(),
                next_id: 0,
                subscribe_calls: 0,
                unsubscribe_calls: 0,
            })),
        }
    }

    /// Sets the reported availability without delivering a signal, as if it had changed before any
    /// handler was installed.
    pub fn set_available(&self, available: bool) {
        self.inner.lock().unwrap().available = available;
    }

    /// Delivers `signal` to every installed handler in registration order, updating the reported
    /// availability to match.
    pub fn emit(&self, signal: NetworkSignal) {
        // Handlers are invoked outside the lock so that they may call back into this source
        let handlers = {
            let mut state = self.inner.lock().unwrap();
            state.available = signal.is_available();
            state.handlers.iter().map(|(_, h)| h.clone()).collect::<Vec<_>>()
        };
        for handler in handlers {
            handler(signal);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.inner.lock().unwrap().handlers.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.inner.lock().unwrap().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.inner.lock().unwrap().unsubscribe_calls
    }
}

impl SignalSource for TestSignalSource {
    fn is_available(&self) -> bool {
        self.inner.lock().unwrap().available
    }

    fn subscribe(&self, handler: SignalHandler) -> RegistrationId {
        let mut state = self.inner.lock().unwrap();
        state.subscribe_calls += 1;
        let id = RegistrationId(state.next_id);
        state.next_id += 1;
        state.handlers.push((id, Arc::from(handler)));
        id
    }

    fn unsubscribe(&self, id: RegistrationId) {
        let mut state = self.inner.lock().unwrap();
        state.unsubscribe_calls += 1;
        state.handlers.retain(|(handler_id, _)| *handler_id != id);
    }
}
