pub mod setup;
pub mod show;
pub mod status;
pub mod ui;
pub mod update;
pub mod watch;
