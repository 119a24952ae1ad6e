// Saved references to articles, books and courses.

pub mod handlers;
pub mod manager;
