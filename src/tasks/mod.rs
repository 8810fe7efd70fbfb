//! Background tasks module
//!
//! Tickers for running timers and the periodic room cleanup sweep.

pub mod room_cleanup;
pub mod timer_ticker;

// Re-export main functions
pub use room_cleanup::room_cleanup_task;
pub use timer_ticker::timer_tick_task;
