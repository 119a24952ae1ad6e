// Q&A forum. Question status follows its answers:
// OPEN -> ANSWERED on the first answer, ANSWERED -> OPEN when the last one is
// deleted, and owners or admins may close a question at any time.

pub mod answers;
pub mod handlers;
pub mod questions;
