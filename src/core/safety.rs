//! Content heuristics for profile text and chat messages.
//!
//! Everything here is list and pattern matching over normalized text.
//! Findings are either blocking (the write is refused) or flagging (the write
//! goes through and is marked for moderators).

use serde::Serialize;

/// Phrases that refuse the write outright
const DEFAULT_BLOCKED_TERMS: &[&str] = &[
    "kill yourself",
    "kys",
    "i will kill you",
    "i know where you live",
    "nudes for money",
    "underage",
];

/// Phrases typical of scams and off-platform solicitation
const DEFAULT_SOLICITATION_TERMS: &[&str] = &[
    "cashapp",
    "venmo",
    "paypal",
    "gift card",
    "giftcard",
    "bitcoin",
    "crypto investment",
    "wire transfer",
    "send money",
    "western union",
    "onlyfans",
    "snapchat",
    "snap me",
    "whatsapp",
    "telegram",
    "add my ig",
];

const LINK_SUFFIXES: &[&str] = &[".com", ".net", ".org", ".io", ".me", ".co", ".ly", ".app"];

const MIN_PHONE_DIGITS: usize = 9;
const MAX_REPEATED_CHARS: usize = 8;
const SHOUTING_MIN_LETTERS: usize = 12;
const SHOUTING_UPPER_RATIO: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "term", rename_all = "snake_case")]
pub enum SafetyFinding {
    BlockedTerm(String),
    Solicitation(String),
    EmailAddress,
    PhoneNumber,
    Link,
    RepeatedCharacters,
    Shouting,
}

impl SafetyFinding {
    pub fn is_blocking(&self) -> bool {
        matches!(self, SafetyFinding::BlockedTerm(_))
    }

    pub fn describe(&self) -> String {
        match self {
            SafetyFinding::BlockedTerm(term) => format!("contains blocked phrase \"{}\"", term),
            SafetyFinding::Solicitation(term) => format!("mentions \"{}\"", term),
            SafetyFinding::EmailAddress => "contains an email address".to_string(),
            SafetyFinding::PhoneNumber => "contains a phone number".to_string(),
            SafetyFinding::Link => "contains a link".to_string(),
            SafetyFinding::RepeatedCharacters => "contains long runs of repeated characters".to_string(),
            SafetyFinding::Shouting => "is written mostly in capitals".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Flag(Vec<SafetyFinding>),
    Block(Vec<SafetyFinding>),
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Block(_))
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Verdict::Flag(_))
    }

    pub fn findings(&self) -> &[SafetyFinding] {
        match self {
            Verdict::Allow => &[],
            Verdict::Flag(findings) | Verdict::Block(findings) => findings,
        }
    }

    /// Human-readable reasons joined for an error message
    pub fn reasons(&self) -> String {
        self.findings()
            .iter()
            .map(SafetyFinding::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Scanner holding normalized term lists
#[derive(Debug, Clone)]
pub struct SafetyScanner {
    blocked: Vec<String>,
    solicitation: Vec<String>,
}

impl Default for SafetyScanner {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl SafetyScanner {
    /// Build a scanner from the default lists plus `extra_blocked` terms
    pub fn new(extra_blocked: &[String]) -> Self {
        let blocked = DEFAULT_BLOCKED_TERMS
            .iter()
            .map(|t| t.to_string())
            .chain(extra_blocked.iter().cloned())
            .map(|t| normalize(&t))
            .filter(|t| !t.is_empty())
            .collect();
        let solicitation = DEFAULT_SOLICITATION_TERMS.iter().map(|t| normalize(t)).collect();

        Self {
            blocked,
            solicitation,
        }
    }

    pub fn scan(&self, text: &str) -> Verdict {
        let normalized = format!(" {} ", normalize(text));
        let mut findings = Vec::new();

        for term in &self.blocked {
            if normalized.contains(&format!(" {} ", term)) {
                findings.push(SafetyFinding::BlockedTerm(term.clone()));
            }
        }
        for term in &self.solicitation {
            if normalized.contains(&format!(" {} ", term)) {
                findings.push(SafetyFinding::Solicitation(term.clone()));
            }
        }

        if contains_email(text) {
            findings.push(SafetyFinding::EmailAddress);
        }
        if longest_digit_run(text) >= MIN_PHONE_DIGITS {
            findings.push(SafetyFinding::PhoneNumber);
        }
        if contains_link(text) {
            findings.push(SafetyFinding::Link);
        }
        if longest_repeat(text) >= MAX_REPEATED_CHARS {
            findings.push(SafetyFinding::RepeatedCharacters);
        }
        if is_shouting(text) {
            findings.push(SafetyFinding::Shouting);
        }

        if findings.iter().any(SafetyFinding::is_blocking) {
            Verdict::Block(findings)
        } else if findings.is_empty() {
            Verdict::Allow
        } else {
            Verdict::Flag(findings)
        }
    }
}

/// Number of distinct open reporters at which a profile goes back to review
pub fn should_escalate(distinct_reporters: i64, threshold: u32) -> bool {
    threshold > 0 && distinct_reporters >= threshold as i64
}

/// Lower-case, undo common character substitutions and collapse everything
/// that is not alphanumeric into single spaces.
fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'i',
            '3' => 'e',
            '4' | '@' => 'a',
            '5' | '$' => 's',
            '7' => 't',
            other => other.to_ascii_lowercase(),
        })
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_email(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        match word.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        }
    })
}

/// Longest run of digits, allowing the separators people put in phone numbers
fn longest_digit_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c.is_ascii_digit() {
            current += 1;
            longest = longest.max(current);
        } else if !matches!(c, ' ' | '-' | '.' | '(' | ')' | '+' | '/') {
            current = 0;
        }
    }
    longest
}

fn contains_link(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.contains("http://") || lower.contains("https://") || lower.contains("www.") {
        return true;
    }
    lower.split_whitespace().any(|word| {
        let word = word.trim_end_matches(|c: char| !c.is_alphanumeric());
        !word.contains('@')
            && LINK_SUFFIXES
                .iter()
                .any(|suffix| word.len() > suffix.len() && word.ends_with(suffix))
    })
}

fn longest_repeat(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in text.chars() {
        if Some(c) == previous && !c.is_whitespace() {
            current += 1;
        } else {
            current = 1;
        }
        previous = Some(c);
        longest = longest.max(current);
    }
    longest
}

fn is_shouting(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < SHOUTING_MIN_LETTERS {
        return false;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper as f64 / letters.len() as f64 > SHOUTING_UPPER_RATIO
}
