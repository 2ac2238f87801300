pub mod calendar;
pub mod core;
pub mod lessons;
pub mod setup;
pub mod timetables;
