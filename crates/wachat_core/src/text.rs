//! crates/wachat_core/src/text.rs
//!
//! Pure text utilities for the auto-responder: language detection, keyword
//! extraction, and the canned default responses used when no QA pair matches.

use crate::domain::Language;

/// Detects the primary language of a text by counting Arabic-script
/// characters (U+0600..=U+06FF) against ASCII letters. A tie, or an empty
/// input, is `Unknown`.
pub fn detect_language(text: &str) -> Language {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Language::Unknown;
    }

    let arabic_count = trimmed.chars().filter(|c| is_arabic(*c)).count();
    let english_count = trimmed.chars().filter(char::is_ascii_alphabetic).count();

    if arabic_count > english_count {
        Language::Arabic
    } else if english_count > arabic_count {
        Language::English
    } else {
        Language::Unknown
    }
}

fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Extracts search keywords from a message: lowercased word tokens of at
/// least `min_length` characters, duplicates removed, input order preserved.
/// Characters outside word characters, whitespace, and the Arabic block are
/// stripped before tokenizing.
pub fn extract_keywords(text: &str, min_length: usize) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || *c == '_' || is_arabic(*c) || c.is_whitespace()
        })
        .collect();

    let mut keywords: Vec<String> = Vec::new();
    for word in cleaned.split_whitespace() {
        if word.chars().count() >= min_length && !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}

/// Escapes LIKE metacharacters so user text can be embedded in a pattern.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Picks the canned reply used when no QA pair matched, branching on
/// detected language and a few greeting/pricing keywords.
pub fn default_response(message: &str, language: Language) -> String {
    match language {
        Language::Arabic => default_arabic_response(message),
        _ => default_english_response(message),
    }
}

fn default_arabic_response(message: &str) -> String {
    let lower = message.to_lowercase();

    if lower.contains("مرحبا") || lower.contains("اهلا") || lower.contains("السلام") {
        "مرحبا! كيف يمكنني مساعدتك في استفسارك العقاري اليوم؟".to_string()
    } else if lower.contains("سعر") || lower.contains("تكلفة") || lower.contains("كم") {
        "يتراوح سعر العقارات بناءً على الموقع والمساحة والمواصفات. هل يمكنك تقديم المزيد من التفاصيل حول ما تبحث عنه؟".to_string()
    } else {
        "شكراً للتواصل معنا. كيف يمكننا مساعدتك في احتياجاتك العقارية؟".to_string()
    }
}

fn default_english_response(message: &str) -> String {
    let lower = message.to_lowercase();

    if lower.contains("hello") || lower.contains("hi") {
        "Hello! How can I assist you with your real estate inquiry today?".to_string()
    } else if lower.contains("price") || lower.contains("cost") {
        "Property prices vary based on location, size, and specifications. Can you provide more details about what you are looking for?".to_string()
    } else {
        "Thank you for contacting us. How can we help with your real estate needs?".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english() {
        assert_eq!(detect_language("hello"), Language::English);
        assert_eq!(detect_language("  what is the price?  "), Language::English);
    }

    #[test]
    fn detects_arabic() {
        assert_eq!(detect_language("مرحبا"), Language::Arabic);
        assert_eq!(detect_language("كم السعر؟"), Language::Arabic);
    }

    #[test]
    fn empty_and_ties_are_unknown() {
        assert_eq!(detect_language(""), Language::Unknown);
        assert_eq!(detect_language("   "), Language::Unknown);
        assert_eq!(detect_language("123 !?"), Language::Unknown);
        // Two Arabic letters vs two Latin letters.
        assert_eq!(detect_language("hi مر"), Language::Unknown);
    }

    #[test]
    fn keywords_are_lowercased_deduped_and_length_filtered() {
        let kws = extract_keywords("Hello, hello world! A price?", 2);
        assert_eq!(kws, vec!["hello", "world", "price"]);
    }

    #[test]
    fn keywords_keep_arabic_tokens() {
        let kws = extract_keywords("كم سعر الشقة", 2);
        assert_eq!(kws, vec!["كم", "سعر", "الشقة"]);
    }

    #[test]
    fn keywords_can_be_empty() {
        assert!(extract_keywords("a ! ?", 2).is_empty());
    }

    #[test]
    fn escape_like_covers_metacharacters() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn english_defaults_branch_on_keywords() {
        let greeting = default_response("hello there", Language::English);
        let pricing = default_response("what does it cost", Language::English);
        let generic = default_response("tell me more", Language::English);
        assert!(greeting.starts_with("Hello!"));
        assert!(pricing.starts_with("Property prices"));
        assert!(generic.starts_with("Thank you"));
        assert_ne!(greeting, pricing);
    }

    #[test]
    fn arabic_defaults_branch_on_keywords() {
        let greeting = default_response("مرحبا", Language::Arabic);
        let pricing = default_response("كم السعر", Language::Arabic);
        assert_ne!(greeting, pricing);
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let reply = default_response("123", Language::Unknown);
        assert!(reply.starts_with("Thank you"));
    }
}
