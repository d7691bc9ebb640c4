//! Document parser implementations

mod csv;
mod html;
mod plain_text;

pub use csv::CsvParser;
pub use html::HtmlParser;
pub use plain_text::PlainTextParser;
