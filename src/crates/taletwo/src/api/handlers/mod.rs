//! Endpoint handlers.

pub mod books;
pub mod health;
pub mod story;

pub use books::{create_book, get_book, list_books, update_book};
pub use health::health;
pub use story::{choose, get_story, next_page, ready, start_story};
