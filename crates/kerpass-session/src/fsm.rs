//! The finite-state-machine driver: runs a sequence of pure state-functions
//! over a framed transport until one reports terminal success or failure
//! (spec.md §4.8).
//!
//! State-functions are modeled as boxed closures rather than actual
//! coroutines or `async fn`s, per spec.md §9 ("Coroutine-like control
//! flow"): the blocking I/O already lives behind [`Transport`], so the
//! driver itself only needs a plain loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kerpass_error::{Error, Result};

/// Which side of the protocol a driven FSM plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsmRole {
    Initiator,
    Responder,
}

/// Whether a state-function wants the driver to keep looping or to stop
/// because the protocol has terminated successfully. Failure is reported
/// through the `Result` the state-function returns, not through this enum
/// (spec.md §7 error kind 9, "Completion", is this `Ok` sentinel; it is
/// never constructed as a [`kerpass_error::Error`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Continue,
    Ok,
}

/// One state-function's output: the bytes to send (possibly empty), the
/// status, and — when `status` is [`Status::Continue`] — the function to
/// invoke with the next inbound message.
pub struct StepOutput<S> {
    pub outbound: Vec<u8>,
    pub status: Status,
    pub next: Option<StateFn<S>>,
}

impl<S> StepOutput<S> {
    pub fn done(outbound: Vec<u8>) -> Self {
        StepOutput {
            outbound,
            status: Status::Ok,
            next: None,
        }
    }

    pub fn continue_with(outbound: Vec<u8>, next: StateFn<S>) -> Self {
        StepOutput {
            outbound,
            status: Status::Continue,
            next: Some(next),
        }
    }
}

/// `(state, incoming message bytes) -> (next state-function, outgoing
/// message bytes, status)` (spec.md §4.8).
pub type StateFn<S> = Box<dyn FnOnce(&mut S, &[u8]) -> Result<StepOutput<S>> + Send>;

/// A framed byte-oriented transport the driver reads from and writes to.
/// Read/write calls may block; cancellation is surfaced as an
/// [`kerpass_error::ErrorKind::Io`] error, not as a signal the driver
/// interprets itself (spec.md §5 "Suspension / blocking points").
pub trait Transport {
    fn read(&mut self) -> Result<Vec<u8>>;
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

/// A cooperative cancellation flag threaded through `Run`, standing in for
/// the source's `context.Context` (spec.md §4.8 "Cancellation").
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Called on non-OK termination for compensating side effects, e.g.
/// removing a partially-created card (spec.md §4.8 "Exit handler").
pub type ExitHandler<'a, S> = dyn FnMut(&mut S, &Error) + 'a;

/// `Run(context, fsm, transport)`: drives `state` through `first` and
/// whatever state-functions it chains to, until one reports
/// [`Status::Ok`] or fails (spec.md §4.8).
#[tracing::instrument(level = "debug", skip_all, fields(role = ?role))]
pub fn run<S, T: Transport>(
    cancellation: &CancellationToken,
    role: FsmRole,
    mut state: S,
    first: StateFn<S>,
    transport: &mut T,
    mut exit_handler: Option<&mut ExitHandler<'_, S>>,
) -> Result<S> {
    let mut current = first;
    let mut inbound = if role == FsmRole::Responder {
        read_unless_cancelled(cancellation, transport)?
    } else {
        Vec::new()
    };

    loop {
        if cancellation.is_cancelled() {
            let err = Error::io("fsm driver cancelled");
            if let Some(handler) = exit_handler.as_deref_mut() {
                handler(&mut state, &err);
            }
            return Err(err);
        }

        let step = match current(&mut state, &inbound) {
            Ok(step) => step,
            Err(err) => {
                if let Some(handler) = exit_handler.as_deref_mut() {
                    handler(&mut state, &err);
                }
                return Err(err);
            }
        };

        if !step.outbound.is_empty() {
            if let Err(err) = transport.write(&step.outbound) {
                if let Some(handler) = exit_handler.as_deref_mut() {
                    handler(&mut state, &err);
                }
                return Err(err);
            }
        }

        match step.status {
            Status::Ok => {
                tracing::debug!("fsm driver reached Status::Ok");
                return Ok(state);
            }
            Status::Continue => {
                let next = step.next.ok_or_else(|| {
                    Error::sequence("state-function reported Continue without a next function")
                })?;
                tracing::debug!("fsm driver advancing to next state-function");
                inbound = read_unless_cancelled(cancellation, transport)?;
                current = next;
            }
        }
    }
}

fn read_unless_cancelled<T: Transport>(cancellation: &CancellationToken, transport: &mut T) -> Result<Vec<u8>> {
    if cancellation.is_cancelled() {
        return Err(Error::io("fsm driver cancelled"));
    }
    transport.read()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    struct ChannelTransport {
        inbound: VecDeque<Vec<u8>>,
        outbound: Vec<Vec<u8>>,
    }

    impl Transport for ChannelTransport {
        fn read(&mut self) -> Result<Vec<u8>> {
            self.inbound.pop_front().ok_or_else(|| Error::io("no more inbound messages"))
        }

        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            self.outbound.push(bytes.to_vec());
            Ok(())
        }
    }

    fn second_step(_state: &mut u32, inbound: &[u8]) -> Result<StepOutput<u32>> {
        assert_eq!(inbound, b"pong");
        Ok(StepOutput::done(b"done".to_vec()))
    }

    fn first_step(_state: &mut u32, inbound: &[u8]) -> Result<StepOutput<u32>> {
        assert!(inbound.is_empty());
        Ok(StepOutput::continue_with(b"ping".to_vec(), Box::new(second_step)))
    }

    #[test]
    fn initiator_runs_to_completion() {
        let mut transport = ChannelTransport::default();
        transport.inbound.push_back(b"pong".to_vec());

        let token = CancellationToken::new();
        let result = run(&token, FsmRole::Initiator, 0u32, Box::new(first_step), &mut transport, None);

        assert!(result.is_ok());
        assert_eq!(transport.outbound, vec![b"ping".to_vec(), b"done".to_vec()]);
    }

    #[test]
    fn responder_reads_before_calling_first_function() {
        let mut transport = ChannelTransport::default();
        transport.inbound.push_back(Vec::new());
        transport.inbound.push_back(b"pong".to_vec());

        let token = CancellationToken::new();
        let result = run(&token, FsmRole::Responder, 0u32, Box::new(first_step), &mut transport, None);
        assert!(result.is_ok());
    }

    #[test]
    fn cancellation_surfaces_as_io_error() {
        let mut transport = ChannelTransport::default();
        let token = CancellationToken::new();
        token.cancel();

        let err = run(&token, FsmRole::Initiator, 0u32, Box::new(first_step), &mut transport, None).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn exit_handler_runs_on_failure() {
        fn failing_step(_state: &mut u32, _inbound: &[u8]) -> Result<StepOutput<u32>> {
            Err(Error::policy("boom"))
        }

        let mut transport = ChannelTransport::default();
        let token = CancellationToken::new();
        let mut compensated = false;
        let mut handler = |state: &mut u32, _err: &Error| {
            *state += 1;
            compensated = true;
        };

        let result = run(
            &token,
            FsmRole::Initiator,
            0u32,
            Box::new(failing_step),
            &mut transport,
            Some(&mut handler),
        );
        assert!(result.is_err());
        assert!(compensated);
    }
}
