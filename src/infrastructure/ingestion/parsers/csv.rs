//! CSV parser rendering rows as a Markdown table

use async_trait::async_trait;

use crate::domain::ingestion::{DocumentParser, ParsedDocument, ParserInput};
use crate::domain::KnowledgeError;

/// Parser for delimited text files
///
/// The first record is the header. Quoted fields may contain the
/// delimiter, doubled quotes and line breaks. Short rows are padded with
/// empty cells so every table row has the header's width.
#[derive(Debug, Clone, Default)]
pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }

    fn read_records(text: &str, delimiter: char) -> Result<Vec<Vec<String>>, KnowledgeError> {
        let mut records = Vec::new();
        let mut record = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    '"' => in_quotes = false,
                    _ => field.push(c),
                }
                continue;
            }

            match c {
                '"' if field.is_empty() => in_quotes = true,
                c if c == delimiter => record.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    Self::push_record(&mut records, std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }

        if in_quotes {
            return Err(KnowledgeError::parse("unterminated quoted field"));
        }

        if !field.is_empty() || !record.is_empty() {
            record.push(field);
            Self::push_record(&mut records, record);
        }

        Ok(records)
    }

    fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
        let blank = record.iter().all(|f| f.trim().is_empty());
        if !blank {
            records.push(record);
        }
    }

    fn render_table(records: &[Vec<String>]) -> String {
        let Some(header) = records.first() else {
            return String::new();
        };

        let width = records.iter().map(Vec::len).max().unwrap_or(0);
        let mut lines = Vec::with_capacity(records.len() + 1);

        lines.push(Self::render_row(header, width));
        lines.push(format!("|{}", " --- |".repeat(width)));

        for record in &records[1..] {
            lines.push(Self::render_row(record, width));
        }

        lines.join("\n")
    }

    fn render_row(record: &[String], width: usize) -> String {
        let cells: Vec<String> = (0..width)
            .map(|i| {
                record
                    .get(i)
                    .map(|cell| {
                        cell.trim()
                            .replace('|', "\\|")
                            .replace(['\r', '\n'], " ")
                    })
                    .unwrap_or_default()
            })
            .collect();

        format!("| {} |", cells.join(" | "))
    }
}

#[async_trait]
impl DocumentParser for CsvParser {
    fn supported_extensions(&self) -> &[&str] {
        &["csv"]
    }

    async fn parse(&self, input: &ParserInput) -> Result<ParsedDocument, KnowledgeError> {
        let text = input.text()?;
        let records = Self::read_records(&text, input.settings.csv_delimiter)
            .map_err(|e| KnowledgeError::parse(format!("{}: {}", input.filename, e)))?;

        Ok(ParsedDocument::new(Self::render_table(&records)))
    }
}
