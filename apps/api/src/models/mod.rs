pub mod bookmark;
pub mod course;
pub mod progress;
pub mod qa;
pub mod user;
