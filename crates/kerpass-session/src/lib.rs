//! Session-id factory, time-sharded expiring storage, and the FSM driver
//! that runs a protocol's state-functions over a framed transport
//! (spec.md §4.7–§4.8).

pub mod clock;
pub mod framing;
pub mod fsm;
pub mod sid;
pub mod store;

pub use clock::Clock;
pub use framing::FramedTransport;
pub use fsm::{run, CancellationToken, ExitHandler, FsmRole, StateFn, StepOutput, Status, Transport};
pub use sid::{SessionId, SessionIdFactory, N_SLOTS, SESSION_ID_LEN};
pub use store::TimeShardedStore;
