use std::collections::HashSet;

lazy_static::lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = {
        [
            "a", "about", "above", "after", "again", "against", "all", "am", "an", "and",
            "any", "are", "as", "at", "be", "because", "been", "before", "being",
            "below", "between", "both", "but", "by", "cannot", "could",
            "did", "do", "does", "doing", "down", "during",
            "each", "few", "for", "from", "further", "had", "has",
            "have", "having", "he", "her", "here",
            "hers", "herself", "him", "himself", "his", "how", "i",
            "if", "in", "into", "is", "it",
            "its", "itself", "me", "more", "most", "my", "myself",
            "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other", "ought",
            "our", "ours", "ourselves", "out", "over", "own", "same", "she",
            "should", "so", "some", "such",
            "than", "that", "the", "their", "theirs", "them", "themselves",
            "then", "there", "these", "they",
            "this", "those", "through", "to", "too", "under", "until", "up",
            "very", "was", "we", "were",
            "what", "when", "where", "which",
            "while", "who", "whom", "why", "with", "would",
            "you", "your", "yours",
            "yourself", "yourselves",
        ]
        .iter()
        .copied()
        .collect()
    };
}

/// Returns true if `token` is in the built-in English stop-word list.
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Turns text into an ordered token sequence.
///
/// Implementations must be pure and deterministic: the same text always
/// yields the same tokens, since documents and queries are tokenized at
/// different times and their vocabularies have to line up.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lower-cases, splits on runs of non-word characters and drops stop-words.
///
/// Word characters are Unicode alphanumerics and `_`.
#[derive(Debug, Clone, Copy)]
pub struct StandardTokenizer {
    filter_stopwords: bool,
}

impl StandardTokenizer {
    pub fn new() -> Self {
        Self {
            filter_stopwords: true,
        }
    }

    /// A tokenizer that keeps stop-words.
    pub fn keep_stopwords() -> Self {
        Self {
            filter_stopwords: false,
        }
    }

    /// Split into word runs
    fn split(&self, text: &str) -> Vec<String> {
        text.chars()
            .fold(vec![String::new()], |mut tokens, c| {
                if c.is_alphanumeric() || c == '_' {
                    if let Some(last) = tokens.last_mut() {
                        last.push(c);
                    }
                } else if tokens.last().map_or(false, |s| !s.is_empty()) {
                    tokens.push(String::new());
                }
                tokens
            })
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Remove stopwords
    fn stopword_filter(&self, tokens: Vec<String>) -> Vec<String> {
        if !self.filter_stopwords {
            return tokens;
        }
        tokens.into_iter().filter(|t| !is_stopword(t)).collect()
    }
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let tokens = self.split(&text.to_lowercase());
        self.stopword_filter(tokens)
    }
}
