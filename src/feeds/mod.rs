//! Upstream feeds that push into the strategy actor on their own schedule.

pub mod poller;
