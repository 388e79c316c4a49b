//! Page interpretation for the two lookup steps
//!
//! The lookup protocol only needs two things from markup: the name/value pairs
//! of the page's form, and the values in the results table. Both are behind
//! the [`PageInterpreter`] trait so the protocol can be tested with canned
//! answers; [`HtmlPageInterpreter`] is the `scraper`-backed implementation.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("No form found on address lookup page")]
    NoFormFound,

    #[error("Invalid results table selector '{0}'")]
    InvalidSelector(String),

    #[error("Results row {row} has no cell at index {index}")]
    MissingCell { row: usize, index: usize },
}

/// Fields of the first form on a page, plus how many forms the page had
#[derive(Debug, Clone, PartialEq)]
pub struct FormExtraction {
    pub fields: Vec<(String, String)>,
    pub form_count: usize,
}

impl FormExtraction {
    /// A page is expected to carry exactly one form. More is tolerated but should be surfaced.
    pub fn has_multiple_forms(&self) -> bool {
        self.form_count > 1
    }
}

/// Contents of the results table
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRows {
    Found(Vec<String>),
    NotFound,
}

pub trait PageInterpreter: Send + Sync {
    /// Extract the fields of the page's form. Fails with `NoFormFound` when there is none.
    fn extract_form(&self, markup: &str) -> Result<FormExtraction, PageError>;

    /// Extract one value per data row of the results table.
    fn extract_result_rows(&self, markup: &str) -> Result<ResultRows, PageError>;
}

// Safety: the selector strings below are constants with valid CSS syntax, so
// Selector::parse() cannot fail on them.
static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("form").unwrap());

static INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("input").unwrap());

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

static SPAN_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());

/// HTML interpreter for the HPD form pages
#[derive(Debug, Clone)]
pub struct HtmlPageInterpreter {
    table_selector: Selector,
    cell_index: usize,
}

impl HtmlPageInterpreter {
    /// `table_id` is the element id of the results table; `cell_index` is the
    /// zero-based column holding the value of each data row.
    pub fn new(table_id: &str, cell_index: usize) -> Result<Self, PageError> {
        let css = format!("[id=\"{}\"]", table_id);
        let table_selector =
            Selector::parse(&css).map_err(|_| PageError::InvalidSelector(table_id.to_string()))?;
        Ok(Self {
            table_selector,
            cell_index,
        })
    }
}

impl PageInterpreter for HtmlPageInterpreter {
    fn extract_form(&self, markup: &str) -> Result<FormExtraction, PageError> {
        let document = Html::parse_document(markup);
        let forms: Vec<ElementRef> = document.select(&FORM_SELECTOR).collect();
        let form = forms.first().ok_or(PageError::NoFormFound)?;

        let fields = form
            .select(&INPUT_SELECTOR)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or("");
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Ok(FormExtraction {
            fields,
            form_count: forms.len(),
        })
    }

    fn extract_result_rows(&self, markup: &str) -> Result<ResultRows, PageError> {
        let document = Html::parse_document(markup);
        let table = match document.select(&self.table_selector).next() {
            Some(table) => table,
            None => return Ok(ResultRows::NotFound),
        };

        let rows: Vec<ElementRef> = table.select(&ROW_SELECTOR).collect();
        if rows.len() <= 1 {
            return Ok(ResultRows::NotFound);
        }

        let mut values = Vec::with_capacity(rows.len() - 1);
        for (row_idx, row) in rows.iter().enumerate().skip(1) {
            let cell = row
                .select(&CELL_SELECTOR)
                .nth(self.cell_index)
                .ok_or(PageError::MissingCell {
                    row: row_idx,
                    index: self.cell_index,
                })?;
            values.push(cell_text(&cell));
        }

        Ok(ResultRows::Found(values))
    }
}

/// Text of the cell's first `<span>` if it has one, otherwise of the cell itself
fn cell_text(cell: &ElementRef) -> String {
    let source = cell.select(&SPAN_SELECTOR).next().unwrap_or(*cell);
    source.text().collect::<String>().trim().to_string()
}
