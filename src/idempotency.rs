use sha2::{Digest, Sha256};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

// Deterministic document id for a client supplied idempotency key.
// Same type + key always maps to the same id, so a retried create hits the existing document.
pub fn document_id_for_key(document_type: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_type);
    hasher.update([0u8]);
    hasher.update(key);
    let digest = format!("{:x}", hasher.finalize());
    format!("{document_type}-{}", &digest[..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_scoped_by_type() {
        let first = document_id_for_key("booking", "retry-42");
        assert_eq!(first, document_id_for_key("booking", "retry-42"));
        assert_ne!(first, document_id_for_key("quizResult", "retry-42"));
        assert_ne!(first, document_id_for_key("booking", "retry-43"));
    }

    #[test]
    fn ids_use_only_sanity_safe_characters() {
        let id = document_id_for_key("newsletterSubscriber", "a/b c?");
        assert!(id.starts_with("newsletterSubscriber-"));
        assert_eq!(id.len(), "newsletterSubscriber-".len() + 32);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }
}
