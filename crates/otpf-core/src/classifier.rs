use crate::domain::ForwardingRule;

/// Rules whose keyword occurs in `body`, in storage order.
///
/// Keyword and body are both trimmed. Matching is a case-insensitive
/// substring test, neither anchored nor whole-word. Rules with a blank
/// keyword never match. Overlapping rules all match.
pub fn match_rules<'a>(rules: &'a [ForwardingRule], body: &str) -> Vec<&'a ForwardingRule> {
    let haystack = body.trim().to_lowercase();
    rules
        .iter()
        .filter(|rule| keyword_matches(&rule.keywords, &haystack))
        .collect()
}

fn keyword_matches(keywords: &str, lowered_body: &str) -> bool {
    let needle = keywords.trim();
    !needle.is_empty() && lowered_body.contains(&needle.to_lowercase())
}
