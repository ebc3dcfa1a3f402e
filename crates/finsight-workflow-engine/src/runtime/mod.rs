//! Run-scoped bookkeeping shared between the engine facade and the executor.

mod session;

pub(crate) use session::SessionTracker;
