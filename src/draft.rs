use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub key: String,
    pub from: String,
    pub to: String,
}

/// Difference between what a client has on screen and what it last submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDiff {
    pub added: BTreeMap<String, String>,
    pub changed: Vec<Change>,
    pub removed: Vec<String>,
    pub has_unsaved_changes: bool,
}

impl DraftDiff {
    /// `None` in the draft means the choice was cleared; keys absent from the
    /// draft are untouched.
    pub fn compute(
        submitted: &BTreeMap<String, String>,
        draft: &BTreeMap<String, Option<String>>,
    ) -> Self {
        let mut diff = Self::default();

        for (key, choice) in draft {
            match (submitted.get(key), choice) {
                (None, Some(to)) => {
                    diff.added.insert(key.clone(), to.clone());
                }
                (Some(from), Some(to)) if from != to => diff.changed.push(Change {
                    key: key.clone(),
                    from: from.clone(),
                    to: to.clone(),
                }),
                (Some(_), None) => diff.removed.push(key.clone()),
                _ => {}
            }
        }

        diff.has_unsaved_changes =
            !diff.added.is_empty() || !diff.changed.is_empty() || !diff.removed.is_empty();
        diff
    }

    /// Keys whose stored value would change if the draft were submitted.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.added
            .keys()
            .map(String::as_str)
            .chain(self.changed.iter().map(|c| c.key.as_str()))
            .chain(self.removed.iter().map(String::as_str))
    }
}
