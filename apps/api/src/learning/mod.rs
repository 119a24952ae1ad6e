// Course delivery: lesson access, enrollment, per-lesson progress and the
// course completion / certificate cascade it triggers.

pub mod access;
pub mod certification;
pub mod handlers;
pub mod progress;
