//! Case text preprocessing
//!
//! clean → standardize abbreviations → tokenize → keyword entity
//! extraction, producing the [`CaseContext`] the explanation
//! synthesizer consumes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "should", "could", "may", "might", "can", "this", "that", "these", "those",
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("mi", "myocardial infarction"),
    ("cad", "coronary artery disease"),
    ("chf", "congestive heart failure"),
    ("copd", "chronic obstructive pulmonary disease"),
    ("dm", "diabetes mellitus"),
    ("htn", "hypertension"),
    ("afib", "atrial fibrillation"),
];

const DISEASE_KEYWORDS: &[&str] = &[
    "disease", "disorder", "syndrome", "infection", "inflammation", "cancer", "tumor", "carcinoma",
    "diabetes", "hypertension", "pneumonia", "bronchitis", "asthma", "copd",
];

const SYMPTOM_KEYWORDS: &[&str] = &[
    "pain", "ache", "fever", "cough", "shortness", "breath", "nausea", "vomiting", "diarrhea",
    "fatigue", "weakness", "headache", "dizziness", "chest pain", "abdominal pain",
];

const PROCEDURE_KEYWORDS: &[&str] = &[
    "surgery", "operation", "procedure", "biopsy", "examination", "test", "scan", "x-ray", "ct",
    "mri", "ultrasound", "ecg", "echocardiogram", "catheterization",
];

const MEDICATION_KEYWORDS: &[&str] = &[
    "aspirin", "atorvastatin", "metoprolol", "clopidogrel", "heparin", "nitroglycerin", "insulin",
    "metformin", "furosemide", "warfarin",
];

static ABBREVIATION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ABBREVIATIONS
        .iter()
        .filter_map(|(abbrev, full)| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(abbrev)))
                .ok()
                .map(|re| (re, *full))
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    /// Cleaned text is truncated to this many characters
    pub max_text_length: usize,
    pub remove_stopwords: bool,
    /// Keep `.` and `-` so values like `12.5` and `x-ray` survive cleaning
    pub keep_numbers: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_text_length: 512,
            remove_stopwords: true,
            keep_numbers: true,
        }
    }
}

/// Keyword entities found in a case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub diseases: Vec<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub procedures: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.diseases.is_empty()
            && self.symptoms.is_empty()
            && self.procedures.is_empty()
            && self.medications.is_empty()
    }

    /// (kind, entities) pairs in a fixed order
    pub fn groups(&self) -> [(&'static str, &[String]); 4] {
        [
            ("diseases", self.diseases.as_slice()),
            ("symptoms", self.symptoms.as_slice()),
            ("procedures", self.procedures.as_slice()),
            ("medications", self.medications.as_slice()),
        ]
    }
}

/// Preprocessed case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    pub original_text: String,
    pub cleaned_text: String,
    pub standardized_text: String,
    pub tokens: Vec<String>,
    pub entities: Entities,
}

impl CaseContext {
    /// Tokens joined with single spaces
    pub fn preprocessed_text(&self) -> String {
        self.tokens.join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    options: PreprocessOptions,
}

impl Preprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    pub fn preprocess(&self, text: &str) -> CaseContext {
        let cleaned_text = self.clean(text);
        let standardized_text = standardize(&cleaned_text);
        let tokens = self.tokenize(&standardized_text);
        let entities = extract_entities(&standardized_text);

        CaseContext {
            original_text: text.to_string(),
            cleaned_text,
            standardized_text,
            tokens,
            entities,
        }
    }

    /// Lowercase, strip punctuation, collapse whitespace, truncate
    pub fn clean(&self, text: &str) -> String {
        let keep = |c: char| {
            c.is_alphanumeric()
                || c == '_'
                || c.is_whitespace()
                || (self.options.keep_numbers && (c == '.' || c == '-'))
        };
        let replaced: String = text
            .to_lowercase()
            .chars()
            .map(|c| if keep(c) { c } else { ' ' })
            .collect();
        let mut cleaned = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

        if cleaned.chars().count() > self.options.max_text_length {
            warn!("Case text truncated to {} characters", self.options.max_text_length);
            cleaned = cleaned.chars().take(self.options.max_text_length).collect();
            cleaned.truncate(cleaned.trim_end().len());
        }
        cleaned
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .filter(|t| !(self.options.remove_stopwords && STOPWORDS.contains(t)))
            .map(str::to_string)
            .collect()
    }
}

/// Expand known abbreviations (whole word, case-insensitive)
pub fn standardize(text: &str) -> String {
    ABBREVIATION_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (pattern, full)| {
            pattern.replace_all(&acc, *full).into_owned()
        })
}

/// Keyword entities present in `text`, matched on whole words
pub fn extract_entities(text: &str) -> Entities {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();

    let found = |keywords: &[&str]| -> Vec<String> {
        keywords
            .iter()
            .filter(|keyword| contains_phrase(&words, keyword))
            .map(|keyword| keyword.to_string())
            .collect()
    };

    Entities {
        diseases: found(DISEASE_KEYWORDS),
        symptoms: found(SYMPTOM_KEYWORDS),
        procedures: found(PROCEDURE_KEYWORDS),
        medications: found(MEDICATION_KEYWORDS),
    }
}

fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split_whitespace().collect();
    !parts.is_empty() && words.windows(parts.len()).any(|w| w == parts.as_slice())
}
