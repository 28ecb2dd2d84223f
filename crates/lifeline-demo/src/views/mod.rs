#![forbid(unsafe_code)]

//! The four demo views.
//!
//! | View | Source | Guard |
//! |------|--------|-------|
//! | [`DanglingCallBadView`] | user fetch | none |
//! | [`GoodView`] | user fetch | `bind_until` |
//! | [`IntervalBadView`] | interval | none, handle discarded |
//! | [`IntervalGoodView`] | interval | `bind_until`, handle kept |

pub mod dangling_call_bad;
pub mod good;
pub mod interval_bad;
pub mod interval_good;

pub use dangling_call_bad::DanglingCallBadView;
pub use good::GoodView;
pub use interval_bad::IntervalBadView;
pub use interval_good::IntervalGoodView;
