//! Event sinks: subscriber trait, fan-out set, and a built-in logger.
//!
//! Subscribers observe the runtime event stream without being able to slow
//! it down: the [`SubscriberSet`] gives each one a bounded queue and a
//! dedicated worker, dropping events for a subscriber that falls behind.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
