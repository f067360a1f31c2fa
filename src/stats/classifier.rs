//! Header classification
//!
//! Pure functions that turn raw request headers into the dimension values
//! the aggregation engine groups and filters by. Classification never fails:
//! malformed input degrades to a generic value instead of an error.

/// Primary language subtag to display name
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
];

/// Known crawler user agent tokens (case-insensitive substring match)
const CRAWLER_TOKENS: &[&str] = &[
    "googlebot",
    "bingbot",
    "slurp",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "sogou",
    "ahrefs",
];

/// Map an `Accept-Language` header to a display name.
///
/// Only the primary subtag of the first listed tag matters: `"en-US,en;q=0.9"`
/// maps to `"English"`. Codes outside the fixed table are echoed back with
/// their first letter capitalized, so an empty or malformed header yields an
/// empty string.
pub fn readable_language(header: &str) -> String {
    let code: String = header
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .chars()
        .take(2)
        .flat_map(|c| c.to_lowercase())
        .collect();

    for (tag, name) in LANGUAGE_NAMES {
        if code == *tag {
            return (*name).to_string();
        }
    }

    capitalize(&code)
}

fn capitalize(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve a user agent to a browser family name.
///
/// Token order matters: Chrome user agents also contain "safari", and Edge
/// and Opera user agents also contain "chrome", so each test guards against
/// the overlapping tokens of the families checked after it.
pub fn browser_name(user_agent: &str) -> String {
    let ua = user_agent.to_lowercase();

    let name = if ua.contains("chrome") && !ua.contains("edge") && !ua.contains("opr") {
        "Chrome"
    } else if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("safari") && !ua.contains("chrome") {
        "Safari"
    } else if ua.contains("edge") {
        "Edge"
    } else if ua.contains("opr") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("msie") || ua.contains("trident") {
        "Internet Explorer"
    } else {
        "Other"
    };

    name.to_string()
}

/// Whether the user agent belongs to a known crawler.
///
/// Crawler visits are still persisted by the store; the engine drops them
/// before computing any statistics.
pub fn is_crawler(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    CRAWLER_TOKENS.iter().any(|token| ua.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_table() {
        assert_eq!(readable_language("en-US,en;q=0.9"), "English");
        assert_eq!(readable_language("fr-FR,fr;q=0.8,en;q=0.5"), "French");
        assert_eq!(readable_language("de"), "German");
        assert_eq!(readable_language("zh-CN"), "Chinese");
        assert_eq!(readable_language("ja,en-US;q=0.7"), "Japanese");
    }

    #[test]
    fn test_language_case_insensitive() {
        assert_eq!(readable_language("EN-US"), "English");
        assert_eq!(readable_language("Pt-BR"), "Portuguese");
    }

    #[test]
    fn test_language_unknown_code_capitalized() {
        assert_eq!(readable_language("nl-NL,nl;q=0.9"), "Nl");
        assert_eq!(readable_language("sv"), "Sv");
    }

    #[test]
    fn test_language_empty_header() {
        assert_eq!(readable_language(""), "");
        assert_eq!(readable_language("   "), "");
    }

    #[test]
    fn test_language_single_char_tag() {
        assert_eq!(readable_language("x"), "X");
    }

    #[test]
    fn test_browser_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        assert_eq!(browser_name(ua), "Chrome");
    }

    #[test]
    fn test_browser_firefox() {
        let ua = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(browser_name(ua), "Firefox");
    }

    #[test]
    fn test_browser_safari_without_chrome() {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
                  (KHTML, like Gecko) Version/17.1 Safari/605.1.15";
        assert_eq!(browser_name(ua), "Safari");
    }

    #[test]
    fn test_browser_edge_beats_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edge/120.0.0.0";
        assert_eq!(browser_name(ua), "Edge");
    }

    #[test]
    fn test_browser_opera_beats_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0";
        assert_eq!(browser_name(ua), "Opera");
    }

    #[test]
    fn test_browser_internet_explorer() {
        assert_eq!(
            browser_name("Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.1; Trident/6.0)"),
            "Internet Explorer"
        );
        assert_eq!(
            browser_name("Mozilla/5.0 (Windows NT 10.0; Trident/7.0; rv:11.0) like Gecko"),
            "Internet Explorer"
        );
    }

    #[test]
    fn test_browser_other() {
        assert_eq!(browser_name("curl/8.4.0"), "Other");
        assert_eq!(browser_name(""), "Other");
    }

    #[test]
    fn test_crawler_detection() {
        assert!(is_crawler(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        ));
        assert!(is_crawler(
            "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)"
        ));
        assert!(is_crawler("Mozilla/5.0 (compatible; YandexBot/3.0)"));
        assert!(is_crawler("AhrefsBot/7.0; +http://ahrefs.com/robot/"));
    }

    #[test]
    fn test_regular_browser_is_not_crawler() {
        assert!(!is_crawler(
            "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0"
        ));
        assert!(!is_crawler(""));
    }
}
