//! Technique vocabulary
//!
//! Maps each technique id to the action families it may appear under,
//! and flags storage-retrieval techniques (those that pull material out
//! of storage rather than receive it from an earlier step).

use crate::models::ActionFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueDef {
    pub families: Vec<ActionFamily>,
    #[serde(default)]
    pub storage_retrieval: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechniqueVocabulary {
    pub techniques: BTreeMap<String, TechniqueDef>,
}

impl Default for TechniqueVocabulary {
    fn default() -> Self {
        use ActionFamily::*;

        let mut vocab = Self {
            techniques: BTreeMap::new(),
        };
        let groups: &[(ActionFamily, &[&str])] = &[
            (
                Heat,
                &[
                    "toast", "fry", "griddle", "steam", "bake", "microwave", "sous_vide", "melt",
                    "warm", "reheat", "char",
                ],
            ),
            (
                Prep,
                &[
                    "slice", "dice", "chop", "shred", "mix", "whisk", "marinate", "thaw", "season",
                    "unwrap",
                ],
            ),
            (Transfer, &["place", "pass", "handoff"]),
            (
                Assemble,
                &["layer", "fold", "roll", "spread", "top", "stack", "combine"],
            ),
            (
                Portion,
                &["scoop", "weigh", "count", "ladle", "pump", "sprinkle"],
            ),
            (Check, &["temp_check", "visual_check", "taste"]),
            (Package, &["bag", "box", "lid", "sleeve", "cup"]),
            (Other, &["hold", "rest"]),
        ];
        for (family, ids) in groups {
            for id in *ids {
                vocab.insert(id, &[*family], false);
            }
        }
        vocab.insert("pull", &[Prep, Transfer], true);
        vocab.insert("retrieve", &[Transfer, Prep], true);
        vocab.insert("wrap", &[Assemble, Package], false);
        vocab
    }
}

impl TechniqueVocabulary {
    pub fn insert(&mut self, id: &str, families: &[ActionFamily], storage_retrieval: bool) {
        self.techniques.insert(
            id.to_string(),
            TechniqueDef {
                families: families.to_vec(),
                storage_retrieval,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&TechniqueDef> {
        self.techniques.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.techniques.contains_key(id)
    }

    /// Unknown techniques are treated as compatible; vocabulary membership is a separate check
    pub fn allows_family(&self, id: &str, family: ActionFamily) -> bool {
        self.get(id).map_or(true, |t| t.families.contains(&family))
    }

    pub fn is_storage_retrieval(&self, id: &str) -> bool {
        self.get(id).is_some_and(|t| t.storage_retrieval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vocabulary() {
        let vocab = TechniqueVocabulary::default();
        assert!(vocab.contains("toast"));
        assert!(vocab.allows_family("toast", ActionFamily::Heat));
        assert!(!vocab.allows_family("toast", ActionFamily::Prep));
        assert!(vocab.allows_family("wrap", ActionFamily::Package));
        assert!(vocab.is_storage_retrieval("retrieve"));
        assert!(!vocab.is_storage_retrieval("slice"));
        assert!(!vocab.contains("juggle"));
        assert!(vocab.allows_family("juggle", ActionFamily::Heat));
    }

    #[test]
    fn test_vocabulary_parses_as_plain_map() {
        let vocab: TechniqueVocabulary = serde_json::from_str(
            r#"{"smoke": {"families": ["heat"]}, "forage": {"families": ["prep"], "storage_retrieval": true}}"#,
        )
        .expect("parse vocabulary");
        assert!(vocab.allows_family("smoke", ActionFamily::Heat));
        assert!(vocab.is_storage_retrieval("forage"));
    }
}
