//! Vocabulary page field extraction
//!
//! Parses a klavogonki vocabulary page into a [`VocabularyRecord`]: title,
//! rating, usage counters, the details definition list (author, creation date,
//! public flag, vocabulary kind), and the entry texts used for script
//! classification.
//!
//! Extraction is deliberately tolerant. Individual missing fields degrade to
//! defaults rather than failing the whole page, so moderation still gets a
//! usable record; only a page with no recognizable vocabulary markup at all is
//! an error.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::classify::{classify, Label};
use crate::error::ExtractError;
use crate::models::{VocabId, VocabularyKind};

// Helper macro to parse selectors safely at startup
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    static ref TITLE: Selector = parse_selector!("td.title");
    static ref RATING: Selector = parse_selector!("div[class*='rating_stars']");
    static ref FAV_COUNT: Selector = parse_selector!("span#fav_cnt");
    static ref COMMENT_COUNT: Selector = parse_selector!("sub#cnt_comments");
    static ref USER_CONTENT: Selector = parse_selector!("div.user-content");
    static ref DT: Selector = parse_selector!("dt");
    static ref ENTRY_TEXT: Selector = parse_selector!("div.words td.text");
    static ref HISTORY_LINK: Selector = parse_selector!("a[href*='history']");
    static ref AUTHOR_LINK: Selector = parse_selector!("a");

    /// Trailing entry counter in the title, e.g. "Words of wisdom (128)"
    static ref TITLE_COUNT: Regex = Regex::new(r"\(\d+\)").expect("Invalid title count regex");

    /// Star rating encoded in the element class, e.g. "rating_stars7"
    static ref RATING_CLASS: Regex =
        Regex::new(r"rating_stars(\d{1,2})").expect("Invalid rating class regex");
}

/// All fields extracted from one vocabulary page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyRecord {
    /// Vocabulary ID
    pub id: VocabId,

    /// Page URL
    pub url: String,

    /// Vocabulary name without the trailing entry counter
    pub name: Option<String>,

    /// Free-form description
    pub description: Option<String>,

    /// Author nickname
    pub author: Option<String>,

    /// Creation date as displayed on the page
    pub created: Option<String>,

    /// Star rating, 0-10
    pub rating: u8,

    /// Number of racers using the vocabulary
    pub users_count: u32,

    /// Number of recorded races, from the `<sub>` beside the history link
    pub history_count: u32,

    /// Number of comments
    pub comments_count: u32,

    /// Whether the vocabulary is publicly visible ("Публичный: Да").
    /// Defaults to true when the field is missing so moderation still
    /// gets a chance to decide.
    pub is_public: bool,

    /// Declared vocabulary kind
    pub kind: Option<VocabularyKind>,

    /// Entry texts from the content table
    pub entries: Vec<String>,

    /// Script classification of the combined entry texts
    pub language: Label,
}

impl VocabularyRecord {
    /// Safe fallback record when extraction fails entirely: treated as public
    /// with an unknown category, so the operator still decides.
    pub fn fallback(id: VocabId, url: &str) -> Self {
        Self {
            id,
            url: url.to_string(),
            name: None,
            description: None,
            author: None,
            created: None,
            rating: 0,
            users_count: 0,
            history_count: 0,
            comments_count: 0,
            is_public: true,
            kind: None,
            entries: Vec::new(),
            language: Label::Unknown,
        }
    }

    /// Registry category label for this record
    pub fn category(&self) -> &str {
        self.kind.as_ref().map_or("unknown", |k| k.category())
    }

    /// One-line summary shown during moderation
    pub fn summary(&self) -> String {
        format!(
            "{} | {} | {} | rating {} | users {} | comments {} | {} | entries {}",
            self.id,
            self.name.as_deref().unwrap_or("-"),
            self.language,
            self.rating,
            self.users_count,
            self.comments_count,
            if self.is_public { "public" } else { "private" },
            self.entries.len(),
        )
    }
}

/// Vocabulary page parser
#[derive(Debug, Default)]
pub struct VocabularyExtractor;

impl VocabularyExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extract a [`VocabularyRecord`] from page HTML
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::DetailsNotFound`] if the page carries neither a
    /// vocabulary title nor a details block (e.g. an error page slipped through
    /// with status 200).
    pub fn extract(
        &self,
        html: &str,
        id: VocabId,
        url: &str,
    ) -> Result<VocabularyRecord, ExtractError> {
        let document = Html::parse_document(html);

        let name = self.extract_name(&document);
        let details = document.select(&USER_CONTENT).next();

        if name.is_none() && details.is_none() {
            return Err(ExtractError::DetailsNotFound);
        }

        let mut record = VocabularyRecord::fallback(id, url);
        record.name = name;
        record.rating = self.extract_rating(&document);
        record.users_count = self.extract_count(&document, &FAV_COUNT);
        record.history_count = self.extract_history_count(&document);
        record.comments_count = self.extract_count(&document, &COMMENT_COUNT);

        if let Some(details) = details {
            record.description = self.definition_value(details, "Описание:");
            record.author = self.extract_author(details);
            record.created = self
                .definition_value(details, "Создан:")
                .map(|text| text.split('(').next().unwrap_or(&text).trim().to_string());

            if let Some(public) = self.definition_value(details, "Публичный:") {
                record.is_public = public == "Да";
            }

            record.kind = self
                .definition_value(details, "Тип словаря:")
                .map(|label| VocabularyKind::from_page_label(&label));

            record.entries = details
                .select(&ENTRY_TEXT)
                .map(element_text)
                .filter(|text| !text.is_empty() && text != "…")
                .collect();
        }

        if !record.entries.is_empty() {
            record.language = classify(&record.entries.join(" "));
        }

        Ok(record)
    }

    /// Vocabulary name from the title cell, minus the trailing entry counter
    fn extract_name(&self, document: &Html) -> Option<String> {
        let title = document.select(&TITLE).next().map(element_text)?;
        let name = TITLE_COUNT
            .split(&title)
            .next()
            .unwrap_or(&title)
            .trim()
            .to_string();

        (!name.is_empty()).then_some(name)
    }

    /// Star rating from the `rating_starsN` class
    fn extract_rating(&self, document: &Html) -> u8 {
        document
            .select(&RATING)
            .filter_map(|div| {
                div.value().classes().find_map(|class| {
                    RATING_CLASS
                        .captures(class)
                        .and_then(|caps| caps[1].parse::<u8>().ok())
                })
            })
            .next()
            .unwrap_or(0)
    }

    /// Race count from the `<sub>` sibling of the history link
    fn extract_history_count(&self, document: &Html) -> u32 {
        document
            .select(&HISTORY_LINK)
            .next()
            .and_then(|link| {
                link.next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "sub")
            })
            .and_then(|sub| element_text(sub).parse::<u32>().ok())
            .unwrap_or(0)
    }

    /// Numeric counter from a single element, 0 when missing or malformed
    fn extract_count(&self, document: &Html, selector: &Selector) -> u32 {
        document
            .select(selector)
            .next()
            .and_then(|el| element_text(el).parse::<u32>().ok())
            .unwrap_or(0)
    }

    /// Value of the `<dd>` following the `<dt>` with the given label
    fn definition_value(&self, details: ElementRef<'_>, label: &str) -> Option<String> {
        let dt = details
            .select(&DT)
            .find(|dt| element_text(*dt).starts_with(label.trim_end_matches(':')))?;

        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "dd")?;

        let text = element_text(dd);
        (!text.is_empty()).then_some(text)
    }

    /// Author nickname from the link inside the author definition
    fn extract_author(&self, details: ElementRef<'_>) -> Option<String> {
        let dt = details
            .select(&DT)
            .find(|dt| element_text(*dt).starts_with("Автор"))?;

        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "dd")?;

        let author = dd
            .select(&AUTHOR_LINK)
            .next()
            .map(element_text)
            .unwrap_or_else(|| element_text(dd));

        (!author.is_empty()).then_some(author)
    }
}

/// Collapse an element's text nodes into a single trimmed string
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
