//! Derives the `(kind, value, target_kind, target_id, target_name)` a new [`recon_model::Pattern`]
//! is built from, given one reviewed suggestion (§4.9 steps 1-3).

use recon_approval_client::SuggestionDetail;
use recon_model::{GlAccountType, PatternKind, TargetKind};
use recon_patterns::{build_text, normalize};

/// The accounting-system classification of a GL line maps onto the pattern's target kind: a
/// receivable line is settled by a customer, a payable line by a vendor, an intercompany line
/// by a subsidiary; anything else (bank transfers, uncategorized lines) resolves to a plain
/// account (§3 `Pattern.target_kind`, §4.9). See DESIGN.md for the reasoning behind this
/// mapping.
pub fn target_kind_for(gl_type: GlAccountType) -> TargetKind {
    match gl_type {
        GlAccountType::Receivable => TargetKind::Customer,
        GlAccountType::Payable => TargetKind::Vendor,
        GlAccountType::Intercompany => TargetKind::Subsidiary,
        GlAccountType::Bank | GlAccountType::Other => TargetKind::Account,
    }
}

/// What a newly-approved suggestion would become as a `Pattern`, before we know whether an
/// existing one already covers it.
pub struct DerivedPattern {
    pub kind: PatternKind,
    pub value: String,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub target_name: String,
    pub embedding_text: String,
}

/// Prefer a counterparty-name pattern (the strongest, most reusable signal); fall back to the
/// transaction's description when no counterparty name was recorded (§3 `Pattern.kind`).
pub fn derive(detail: &SuggestionDetail) -> Option<DerivedPattern> {
    let gl_type = detail.gl_type?;
    let target_name = detail.gl_entity.clone()?;
    let target_id = detail.ic_entity.clone().unwrap_or_else(|| target_name.clone());
    let target_kind = target_kind_for(gl_type);

    let (kind, value) = match detail.counterparty_name.as_deref() {
        Some(name) if !name.trim().is_empty() => (PatternKind::Counterparty, normalize(name)),
        None | Some(_) => {
            let description = detail.description.as_deref().unwrap_or_default();
            if description.trim().is_empty() {
                return None;
            }
            (PatternKind::Description, normalize(description))
        }
    };

    let embedding_text = build_text(
        detail.description.as_deref().unwrap_or_default(),
        detail.counterparty_name.as_deref(),
        detail.payment_reference.as_deref(),
    );

    Some(DerivedPattern { kind, value, target_kind, target_id, target_name, embedding_text })
}
