//! Vendor relatedness
//!
//! Vendors are compared after lowercasing and trimming. Product names map
//! onto their company family.

const FAMILIES: &[(&str, &[&str])] = &[
    ("openai", &["openai", "chatgpt", "gpt", "gpt-4", "dall-e", "sora"]),
    ("anthropic", &["anthropic", "claude"]),
    ("google", &["google", "gemini", "deepmind", "google deepmind", "bard"]),
    ("meta", &["meta", "llama", "facebook"]),
    ("microsoft", &["microsoft", "copilot", "azure", "bing"]),
];

const FRONTIER: &[&str] = &["openai", "anthropic", "google", "meta", "microsoft"];

const SECOND_TIER: &[&str] = &[
    "mistral",
    "cohere",
    "hugging face",
    "huggingface",
    "perplexity",
    "xai",
    "stability ai",
    "ai21",
];

const NON_COMMERCIAL: &[&str] = &["academic", "human", "manual"];

fn normalize(vendor: &str) -> String {
    vendor.trim().to_lowercase()
}

fn family(vendor: &str) -> Option<&'static str> {
    FAMILIES
        .iter()
        .find(|(_, members)| members.contains(&vendor))
        .map(|(name, _)| *name)
}

fn tier(vendor: &str) -> Option<u8> {
    let canonical = family(vendor).unwrap_or(vendor);
    if FRONTIER.contains(&canonical) {
        Some(1)
    } else if SECOND_TIER.contains(&canonical) {
        Some(2)
    } else {
        None
    }
}

/// Exact match 1.0, same company family 0.7, academic/human/manual
/// cross-match 0.6, same tier 0.4, else 0
pub fn vendor_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if let (Some(fa), Some(fb)) = (family(&a), family(&b)) {
        if fa == fb {
            return 0.7;
        }
    }
    if NON_COMMERCIAL.contains(&a.as_str()) && NON_COMMERCIAL.contains(&b.as_str()) {
        return 0.6;
    }
    match (tier(&a), tier(&b)) {
        (Some(ta), Some(tb)) if ta == tb => 0.4,
        _ => 0.0,
    }
}

/// Fallback-quality bonus for a vendor
pub fn trust_bonus(vendor: &str) -> f64 {
    let v = normalize(vendor);
    if v == "academic" {
        return 10.0;
    }
    if NON_COMMERCIAL.contains(&v.as_str()) {
        return 3.0;
    }
    match tier(&v) {
        Some(1) => 8.0,
        Some(_) => 5.0,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_similarity() {
        assert_eq!(vendor_similarity("OpenAI", "openai "), 1.0);
        assert_eq!(vendor_similarity("Claude", "Anthropic"), 0.7);
        assert_eq!(vendor_similarity("academic", "Human"), 0.6);
        assert_eq!(vendor_similarity("OpenAI", "Anthropic"), 0.4);
        assert_eq!(vendor_similarity("Mistral", "Cohere"), 0.4);
        assert_eq!(vendor_similarity("OpenAI", "Mistral"), 0.0);
        assert_eq!(vendor_similarity("", "OpenAI"), 0.0);
    }

    #[test]
    fn test_vendor_similarity_is_symmetric() {
        let vendors = ["openai", "claude", "gemini", "mistral", "manual", "acme"];
        for a in vendors {
            for b in vendors {
                assert_eq!(vendor_similarity(a, b), vendor_similarity(b, a));
            }
        }
    }

    #[test]
    fn test_trust_bonus() {
        assert_eq!(trust_bonus("Academic"), 10.0);
        assert_eq!(trust_bonus("gemini"), 8.0);
        assert_eq!(trust_bonus("Cohere"), 5.0);
        assert_eq!(trust_bonus("Manual"), 3.0);
        assert_eq!(trust_bonus("acme"), 0.0);
    }
}
