// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::sync::mpsc::Receiver;
use verif_core::VerifError;

#[derive(Debug)]
enum State<T> {
    Ready(Result<T, VerifError>),
    Pending(Receiver<Result<T, VerifError>>),
}

/// A result that may still be computing on a worker pool. Resolved exactly once by
/// [`Deferred::wait`].
#[derive(Debug)]
pub struct Deferred<T> {
    state: State<T>,
}

impl<T> Deferred<T> {
    /// An already-completed value.
    pub fn ready(value: T) -> Self {
        Self {
            state: State::Ready(Ok(value)),
        }
    }

    /// An already-failed computation.
    pub fn failed(error: VerifError) -> Self {
        Self {
            state: State::Ready(Err(error)),
        }
    }

    pub(crate) fn pending(receiver: Receiver<Result<T, VerifError>>) -> Self {
        Self {
            state: State::Pending(receiver),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Blocks until the value is available.
    pub fn wait(self) -> Result<T, VerifError> {
        match self.state {
            State::Ready(result) => result,
            State::Pending(receiver) => receiver.recv().map_err(|_| {
                VerifError::computation("worker exited without delivering a result")
            })?,
        }
    }
}
