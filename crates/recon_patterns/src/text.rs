//! Canonical text built from a transaction's learnable fields, embedded identically by C5
//! (lookup) and C9 (learning) so the two halves of the feedback loop agree on what a
//! "pattern" is the embedding of (§4.5, §8 "round trip / law").

/// Collapse whitespace and lowercase, without touching punctuation — embedding models are
/// expected to tokenize punctuation themselves; this only removes incidental formatting noise.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// `normalize(description) ⊕ " " ⊕ counterparty_name ⊕ " " ⊕ payment_reference` (§4.5).
pub fn build_text(description: &str, counterparty_name: Option<&str>, payment_reference: Option<&str>) -> String {
    let mut parts = vec![normalize(description)];
    if let Some(name) = counterparty_name {
        parts.push(normalize(name));
    }
    if let Some(reference) = payment_reference {
        parts.push(normalize(reference));
    }
    parts.join(" ")
}
