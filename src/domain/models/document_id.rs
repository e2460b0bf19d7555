use std::sync::LazyLock;

use regex::Regex;

/// Vector-store document ids: `product_{id}_{store}`.
pub struct DocumentId;

static DOCUMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^product_(\d+)(?:_\d+)?$").unwrap());

impl DocumentId {
    pub fn format(product_id: i64, store_id: u32) -> String {
        format!("product_{}_{}", product_id, store_id)
    }

    /// Product id encoded in a document id, `None` for foreign ids.
    pub fn parse(document_id: &str) -> Option<i64> {
        DOCUMENT_ID
            .captures(document_id)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_store_suffix_and_legacy_ids() {
        assert_eq!(DocumentId::parse("product_20_1"), Some(20));
        assert_eq!(DocumentId::parse("product_20"), Some(20));
        assert_eq!(DocumentId::parse(&DocumentId::format(42, 3)), Some(42));
    }

    #[test]
    fn test_parse_ignores_foreign_ids() {
        assert_eq!(DocumentId::parse("category_20_1"), None);
        assert_eq!(DocumentId::parse("product_abc_1"), None);
        assert_eq!(DocumentId::parse("product_20_1_extra"), None);
        assert_eq!(DocumentId::parse(""), None);
    }
}
