//! Rule-based named entity recognition.
//!
//! Numeric entities (dates, times, money, percentages) come from regexes.
//! Names come from runs of capitalized words, classified by honorifics,
//! organization keywords, a place gazetteer and common given names.

use std::sync::LazyLock;

use regex::Regex;

use super::filter::is_stop_word;
use super::patterns::{compile_all, ExtractionPattern};
use super::recognizer::{resolve_overlaps, LabelResult, Recognizer, Span};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid regex"));

const MONTH: &str = "(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec)";

const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "prof", "professor", "sir", "dame", "lord", "lady",
    "president", "senator", "governor", "gov", "mayor", "judge", "justice", "rev", "gen",
    "general", "captain", "capt", "minister", "chancellor", "king", "queen", "prince",
    "princess", "ceo",
];

const ORG_KEYWORDS: &[&str] = &[
    "inc", "corp", "corporation", "co", "company", "ltd", "llc", "plc", "gmbh", "group",
    "university", "college", "institute", "school", "academy", "bank", "agency",
    "association", "foundation", "ministry", "department", "council", "committee", "party",
    "club", "fc", "labs", "laboratories", "technologies", "systems", "partners", "holdings",
    "airlines", "motors", "news", "times", "hospital", "organization", "organisation", "union",
    "federation", "commission", "court", "senate", "congress", "parliament", "administration",
    "bureau", "society", "industries", "enterprises", "studios", "network", "fund",
];

const KNOWN_ORGS: &[&str] = &[
    "apple", "google", "microsoft", "amazon", "tesla", "meta", "facebook", "twitter", "netflix",
    "openai", "nvidia", "intel", "samsung", "sony", "toyota", "boeing", "walmart", "spotify",
    "uber", "airbnb", "reuters", "nato", "unesco", "unicef",
];

const GAZETTEER: &[&str] = &[
    "united states", "united states of america", "america", "usa", "us", "u.s", "u.s.a",
    "united kingdom", "uk", "u.k", "britain", "great britain", "england", "scotland", "wales",
    "ireland", "france", "germany", "spain", "portugal", "italy", "greece", "netherlands",
    "belgium", "switzerland", "austria", "sweden", "norway", "denmark", "finland", "poland",
    "ukraine", "russia", "turkey", "israel", "egypt", "nigeria", "kenya", "south africa",
    "china", "japan", "korea", "south korea", "north korea", "india", "pakistan", "indonesia",
    "vietnam", "thailand", "singapore", "australia", "new zealand", "canada", "mexico",
    "brazil", "argentina", "chile", "colombia", "peru", "london", "paris", "berlin", "madrid",
    "rome", "milan", "lisbon", "amsterdam", "brussels", "vienna", "zurich", "geneva",
    "stockholm", "oslo", "copenhagen", "helsinki", "warsaw", "prague", "dublin", "edinburgh",
    "moscow", "kyiv", "istanbul", "cairo", "lagos", "nairobi", "beijing", "shanghai",
    "hong kong", "tokyo", "osaka", "seoul", "mumbai", "delhi", "new delhi", "bangalore",
    "jakarta", "bangkok", "sydney", "melbourne", "toronto", "vancouver", "montreal",
    "new york", "new york city", "los angeles", "san francisco", "chicago", "boston",
    "washington", "seattle", "austin", "houston", "dallas", "miami", "atlanta", "denver",
    "mexico city", "sao paulo", "buenos aires", "california", "texas", "florida", "silicon valley",
];

const GIVEN_NAMES: &[&str] = &[
    "james", "john", "robert", "michael", "william", "david", "richard", "joseph", "thomas",
    "charles", "daniel", "matthew", "mark", "paul", "peter", "george", "steven", "steve",
    "andrew", "tim", "jeff", "bill", "joe", "elon", "barack", "donald", "emmanuel", "angela",
    "mary", "patricia", "jennifer", "linda", "elizabeth", "susan", "jessica", "sarah", "karen",
    "emma", "olivia", "sophia", "alice", "anna", "maria", "laura", "julia", "emily", "hannah",
    "bob", "jane", "kate", "lisa", "nancy", "sam", "alex", "chris", "ben", "tom", "jack",
];

const DATE_WORDS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday", "today", "yesterday", "tomorrow",
];

const CONNECTORS: &[&str] = &["of", "and", "&", "for", "de"];

/// Abbreviations whose trailing period belongs to the word.
const KEEPS_PERIOD: &[&str] = &[
    "inc", "corp", "co", "ltd", "u.s", "u.k", "u.s.a", "st", "jr", "sr", "mr", "mrs", "ms", "dr",
    "prof", "gov", "gen", "rev", "capt",
];

struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    breaks_after: bool,
}

impl Token<'_> {
    fn normalized(&self) -> String {
        self.text.trim_end_matches('.').to_lowercase()
    }

    fn is_connector(&self) -> bool {
        CONNECTORS.contains(&self.normalized().as_str())
    }

    fn is_honorific(&self) -> bool {
        HONORIFICS.contains(&self.normalized().as_str())
    }

    fn is_name_part(&self) -> bool {
        if !self.text.chars().next().is_some_and(char::is_uppercase) {
            return false;
        }
        let word = self.normalized();
        !is_stop_word(&word) && !DATE_WORDS.contains(&word.as_str()) && !self.is_honorific()
    }

    fn is_acronym(&self) -> bool {
        let letters = self.text.chars().filter(|c| c.is_alphabetic()).count();
        (2..=6).contains(&letters) && !self.text.chars().any(char::is_lowercase)
    }

    fn is_titlecase(&self) -> bool {
        let mut chars = self.text.chars();
        chars.next().is_some_and(char::is_uppercase) && chars.any(char::is_lowercase)
    }
}

fn tokenize(sentence: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();

    for m in WORD.find_iter(sentence) {
        let raw = m.as_str();
        let body = raw.trim_start_matches(|c: char| !c.is_alphanumeric());
        let core_len = body.trim_end_matches(|c: char| !c.is_alphanumeric()).len();

        if core_len == 0 {
            if raw == "&" {
                tokens.push(Token {
                    text: raw,
                    start: m.start(),
                    end: m.end(),
                    breaks_after: false,
                });
            } else if let Some(prev) = tokens.last_mut() {
                prev.breaks_after = true;
            }
            continue;
        }

        let start = m.start() + (raw.len() - body.len());
        let mut end = start + core_len;
        let mut trail = &body[core_len..];
        if trail.starts_with('.') && KEEPS_PERIOD.contains(&body[..core_len].to_lowercase().as_str())
        {
            end += 1;
            trail = &trail[1..];
        }

        let mut possessive = false;
        for suffix in ["'s", "\u{2019}s"] {
            if sentence[start..end].ends_with(suffix) && end - start > suffix.len() {
                end -= suffix.len();
                possessive = true;
                break;
            }
        }

        tokens.push(Token {
            text: &sentence[start..end],
            start,
            end,
            breaks_after: possessive || !trail.is_empty(),
        });
    }
    tokens
}

fn classify(phrase: &[Token<'_>], after_honorific: bool) -> Option<&'static str> {
    let words: Vec<String> = phrase.iter().map(Token::normalized).collect();
    let joined = words.join(" ");
    let has_connector = phrase.iter().any(Token::is_connector);

    if after_honorific && !has_connector {
        return Some("PERSON");
    }
    if words.iter().any(|w| ORG_KEYWORDS.contains(&w.as_str()))
        || KNOWN_ORGS.contains(&joined.as_str())
    {
        return Some("ORG");
    }
    if GAZETTEER.contains(&joined.as_str()) {
        return Some("GPE");
    }
    if phrase.iter().any(Token::is_acronym) {
        return Some("ORG");
    }
    if has_connector {
        return None;
    }
    if GIVEN_NAMES.contains(&words[0].as_str()) && phrase.len() <= 4 {
        return Some("PERSON");
    }
    if (2..=3).contains(&phrase.len()) && phrase.iter().all(Token::is_titlecase) {
        return Some("PERSON");
    }
    None
}

fn push_span(sentence: &str, phrase: &[Token<'_>], label: &str, out: &mut Vec<Span>) {
    if let (Some(first), Some(last)) = (phrase.first(), phrase.last()) {
        out.push(Span::new(sentence, first.start, last.end, label));
    }
}

/// Regex and capitalization heuristics standing in for a statistical model.
pub struct RuleNer {
    patterns: Vec<ExtractionPattern>,
}

impl RuleNer {
    #[must_use]
    pub fn new() -> Self {
        let date_day_month = format!(
            r"\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\b\.?(?:,?\s+\d{{4}}\b)?"
        );
        let date_month_day =
            format!(r"\b{MONTH}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?\b(?:,?\s+\d{{4}}\b)?");
        let date_month_year = format!(r"\b{MONTH}\s+\d{{4}}\b");

        let defs: Vec<(&str, &str)> = vec![
            ("DATE", r"\b\d{4}-\d{2}-\d{2}\b"),
            ("DATE", r"\b\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}\b"),
            ("DATE", date_day_month.as_str()),
            ("DATE", date_month_day.as_str()),
            ("DATE", date_month_year.as_str()),
            ("DATE", r"\b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\b"),
            ("DATE", r"(?i)\b(?:today|yesterday|tomorrow)\b"),
            ("DATE", r"\b(?:1[89]|20)\d{2}\b"),
            (
                "TIME",
                r"(?i)\b\d{1,2}(?::\d{2})?\s?(?:a\.m\.|p\.m\.|am\b|pm\b)|\b\d{1,2}:\d{2}\b",
            ),
            (
                "MONEY",
                r"[$£€¥]\s?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?(?:\s(?:million|billion|trillion|thousand)\b)?",
            ),
            (
                "MONEY",
                r"(?i)\b\d+(?:\.\d+)?(?:\s(?:million|billion|trillion|thousand))?\s(?:dollars?|pounds?|euros?|yen|usd|gbp|eur|jpy)\b",
            ),
            ("PERCENT", r"\b\d+(?:\.\d+)?\s?(?:%|percent\b|per cent\b)"),
        ];

        Self {
            patterns: compile_all(&defs),
        }
    }

    fn find_names(sentence: &str, out: &mut Vec<Span>) {
        let tokens = tokenize(sentence);
        let mut i = 0;

        while i < tokens.len() {
            if !tokens[i].is_name_part() {
                i += 1;
                continue;
            }

            let first = i;
            let mut last = i;
            while !tokens[last].breaks_after {
                match tokens.get(last + 1) {
                    Some(next) if next.is_name_part() => last += 1,
                    Some(next)
                        if next.is_connector()
                            && !next.breaks_after
                            && tokens.get(last + 2).is_some_and(Token::is_name_part) =>
                    {
                        last += 2;
                    }
                    _ => break,
                }
            }

            let after_honorific = first > 0
                && tokens[first - 1].is_honorific()
                && !tokens[first - 1].breaks_after;
            let phrase = &tokens[first..=last];

            if let Some(label) = classify(phrase, after_honorific) {
                push_span(sentence, phrase, label, out);
            } else {
                // "Paris and London": classify the parts on their own.
                for (n, part) in phrase.split(Token::is_connector).enumerate() {
                    if let Some(label) = classify(part, after_honorific && n == 0) {
                        push_span(sentence, part, label, out);
                    }
                }
            }
            i = last + 1;
        }
    }
}

impl Default for RuleNer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer for RuleNer {
    fn name(&self) -> &str {
        "rule-ner"
    }

    fn is_available(&self) -> bool {
        !self.patterns.is_empty()
    }

    fn recognize(&self, sentence: &str) -> LabelResult<Vec<Span>> {
        let mut spans = Vec::new();
        for pattern in &self.patterns {
            pattern.find_spans(sentence, &mut spans);
        }
        Self::find_names(sentence, &mut spans);
        Ok(resolve_overlaps(spans))
    }
}
