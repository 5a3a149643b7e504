use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{EntityKey, ProfileId, SubsidiaryId};
use crate::money::CurrencyCode;

/// One legal entity in the corporate group, as loaded from process configuration (C11). Never
/// hard-coded: the aliases/known_ibans lists are operator-maintained (§9 open question).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub profile_id: ProfileId,
    pub subsidiary_id: SubsidiaryId,
    pub display_name: String,
    pub jurisdiction: String,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub known_ibans: Vec<String>,
}

/// Process-local, reloadable directory of [`Entity`] rows, keyed by canonical entity key.
/// Used by the intercompany classifier (§4.4.4) and the exact matcher's known-IBAN check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMap {
    entities: HashMap<EntityKey, Entity>,
}

impl EntityMap {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities: entities.into_iter().map(|e| (e.key.clone(), e)).collect() }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Find the entity whose display name or any alias normalizes-equal to `name` (case- and
    /// whitespace-insensitive, per §4.4.4).
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        let needle = normalize_name(name);
        self.entities.values().find(|e| {
            normalize_name(&e.display_name) == needle
                || e.aliases.iter().any(|a| normalize_name(a) == needle)
        })
    }

    /// Find the entity owning a given IBAN/account number (§4.4.4, §4.4.1 exact-match IBAN rule).
    pub fn find_by_iban(&self, account: &str) -> Option<&Entity> {
        let needle = account.trim().to_uppercase();
        self.entities.values().find(|e| e.known_ibans.iter().any(|i| i.to_uppercase() == needle))
    }

    /// Whether `payment_reference` contains the literal "IC" token or any entity alias
    /// (§4.4.4 third intercompany rule).
    pub fn payment_reference_signals_ic(&self, payment_reference: &str) -> bool {
        let tokens: Vec<String> =
            payment_reference.split(|c: char| !c.is_alphanumeric()).map(|t| t.to_uppercase()).collect();
        if tokens.iter().any(|t| t == "IC") {
            return true;
        }
        let lowered = payment_reference.to_lowercase();
        self.entities.values().any(|e| e.aliases.iter().any(|a| lowered.contains(&a.to_lowercase())))
    }
}

fn normalize_name(s: &str) -> String {
    s.trim().to_lowercase()
}
