//! Pure catalog text matching. Ranking is deterministic and side-effect
//! free; the escalation side effect on a miss lives upstream in the
//! gateway, not here.

use crate::domain::product::Product;

/// Lowercases, folds common Latin diacritics, drops punctuation, and
/// collapses whitespace. This is the canonical form used both for ranking
/// and for the escalation dedupe key.
pub fn normalize_phrase(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = true;
    for ch in input.chars() {
        let folded = match ch {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        };
        for lower in folded.to_lowercase() {
            if lower.is_alphanumeric() {
                out.push(lower);
                last_was_space = false;
            } else if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        }
    }
    out.trim_end().to_owned()
}

pub fn tokenize(input: &str) -> Vec<String> {
    normalize_phrase(input)
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Normalized edit-distance similarity in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogMatch {
    pub product: Product,
    pub score: f64,
}

#[derive(Clone, Debug)]
pub struct MatcherConfig {
    /// Fuzzy floor below which a near-miss is treated as no match.
    pub min_similarity: f64,
    pub max_results: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { min_similarity: 0.6, max_results: 5 }
    }
}

/// Two-stage ranking: containment against name and description first, then
/// a fuzzy pass against the name for misspellings.
#[derive(Clone, Debug, Default)]
pub struct CatalogMatcher {
    config: MatcherConfig,
}

impl CatalogMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn rank(&self, query: &str, products: &[Product]) -> Vec<CatalogMatch> {
        let normalized_query = normalize_phrase(query);
        if normalized_query.is_empty() {
            return Vec::new();
        }
        let query_tokens = tokenize(query);
        let mut matches: Vec<CatalogMatch> = products
            .iter()
            .filter_map(|product| {
                self.score(&normalized_query, &query_tokens, product)
                    .map(|score| CatalogMatch { product: product.clone(), score })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.product.name.cmp(&b.product.name))
        });
        matches.truncate(self.config.max_results);
        matches
    }

    fn score(&self, query: &str, query_tokens: &[String], product: &Product) -> Option<f64> {
        let name = normalize_phrase(&product.name);
        let haystack = normalize_phrase(&product.search_text());
        if name == query {
            return Some(1.0);
        }
        if haystack.contains(query) {
            return Some(0.9);
        }
        if !query_tokens.is_empty()
            && query_tokens.iter().all(|token| haystack.contains(token.as_str()))
        {
            return Some(0.8);
        }
        let fuzzy = similarity(&name, query);
        if fuzzy >= self.config.min_similarity {
            // Cap below the containment tiers so exact evidence always wins.
            return Some(fuzzy.min(0.79));
        }
        None
    }
}

/// Decides whether a free-text phrase plausibly names a product, gating the
/// escalation side effect on catalog misses.
pub trait MentionHeuristic: Send + Sync {
    fn is_product_mention(&self, phrase: &str) -> bool;
}

/// Conservative default: short noun-ish phrases pass, greetings and
/// conversational filler do not.
#[derive(Clone, Debug, Default)]
pub struct DefaultMentionHeuristic;

const FILLER_PHRASES: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "ok", "okay", "yes", "no", "bye", "goodbye",
    "hola", "buenas", "gracias", "si", "adios",
];

impl MentionHeuristic for DefaultMentionHeuristic {
    fn is_product_mention(&self, phrase: &str) -> bool {
        let normalized = normalize_phrase(phrase);
        if normalized.len() < 2 || normalized.len() > 60 {
            return false;
        }
        if FILLER_PHRASES.contains(&normalized.as_str()) {
            return false;
        }
        if !normalized.chars().any(char::is_alphabetic) {
            return false;
        }
        normalized.split_whitespace().count() <= 6
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        normalize_phrase, similarity, tokenize, CatalogMatcher, DefaultMentionHeuristic,
        MatcherConfig, MentionHeuristic,
    };
    use crate::domain::product::{Availability, Product, ProductId};
    use crate::domain::tenant::TenantId;

    fn product(id: &str, name: &str, description: Option<&str>) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            tenant_id: TenantId("t-1".to_owned()),
            sku: format!("SKU-{id}"),
            name: name.to_owned(),
            description: description.map(str::to_owned),
            price: Some(Decimal::ONE),
            unit: "piece".to_owned(),
            availability: Availability::Confirmed,
        }
    }

    #[test]
    fn normalization_folds_case_accents_and_punctuation() {
        assert_eq!(normalize_phrase("  Café con Leche!! "), "cafe con leche");
        assert_eq!(tokenize("Jamón, y queso"), vec!["jamon", "y", "queso"]);
    }

    #[test]
    fn exact_name_outranks_description_containment() {
        let matcher = CatalogMatcher::default();
        let products = vec![
            product("p-1", "Sandwich", Some("bread and ham")),
            product("p-2", "Combo Deluxe", Some("sandwich with fries")),
        ];
        let ranked = matcher.rank("sandwich", &products);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].product.id.0, "p-1");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn description_text_is_searchable() {
        let matcher = CatalogMatcher::default();
        let products = vec![product("p-1", "Sandwich", Some("ham, cheese, lettuce"))];
        let ranked = matcher.rank("cheese", &products);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn misspellings_match_through_the_fuzzy_pass() {
        let matcher = CatalogMatcher::default();
        let products = vec![product("p-1", "Sandwich", None)];
        let ranked = matcher.rank("sandwhich", &products);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].score < 0.8);
    }

    #[test]
    fn unrelated_queries_match_nothing() {
        let matcher = CatalogMatcher::default();
        let products = vec![product("p-1", "Sandwich", None)];
        assert!(matcher.rank("lawnmower", &products).is_empty());
    }

    #[test]
    fn result_count_is_capped() {
        let matcher = CatalogMatcher::new(MatcherConfig { max_results: 2, ..Default::default() });
        let products: Vec<Product> = (0..5)
            .map(|i| product(&format!("p-{i}"), &format!("Sandwich {i}"), None))
            .collect();
        assert_eq!(matcher.rank("sandwich", &products).len(), 2);
    }

    #[test]
    fn similarity_is_symmetric_enough_for_thresholds() {
        assert!(similarity("sandwich", "sandwhich") > 0.8);
        assert!(similarity("sandwich", "pizza") < 0.4);
    }

    #[test]
    fn greetings_are_not_product_mentions() {
        let heuristic = DefaultMentionHeuristic;
        assert!(!heuristic.is_product_mention("Hola!"));
        assert!(!heuristic.is_product_mention("thanks"));
        assert!(!heuristic.is_product_mention("123 456"));
        assert!(heuristic.is_product_mention("vegan burger"));
        assert!(heuristic.is_product_mention("jamón serrano"));
    }

    #[test]
    fn very_long_phrases_are_not_product_mentions() {
        let heuristic = DefaultMentionHeuristic;
        let rambling = "could you maybe tell me whether you might possibly have anything \
                        like the thing I had last week";
        assert!(!heuristic.is_product_mention(rambling));
    }
}
