pub mod reaper;
pub mod sweeper;
