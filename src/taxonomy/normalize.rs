use super::{ALL_CATEGORIES, MISC_KEY};
use crate::models::{Category, Poll};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DISPLAY_PREFIX: Regex = Regex::new(r"^category:\s*").unwrap();
}

/// Free-text metadata a poll may carry. Any subset can be present.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollMetadata<'a> {
    pub category: Option<&'a str>,
    pub tags: &'a [String],
    pub title: Option<&'a str>,
    pub question: Option<&'a str>,
    pub prompt: Option<&'a str>,
}

impl<'a> From<&'a Poll> for PollMetadata<'a> {
    fn from(poll: &'a Poll) -> Self {
        Self {
            question: Some(&poll.question),
            tags: &poll.tags,
            ..Default::default()
        }
    }
}

/// Map poll metadata onto catalog keys. Never returns an empty list.
pub fn normalize(meta: &PollMetadata<'_>) -> Vec<String> {
    normalize_with(&ALL_CATEGORIES, meta)
}

pub fn normalize_with(catalog: &[Category], meta: &PollMetadata<'_>) -> Vec<String> {
    let mut matches: Vec<String> = Vec::new();

    // Exact key, optionally behind a "category:" display prefix
    if let Some(raw) = meta.category {
        let lowered = raw.trim().to_lowercase();
        let wanted = DISPLAY_PREFIX.replace(&lowered, "");
        if let Some(found) = catalog.iter().find(|c| c.key.to_lowercase() == wanted) {
            push_unique(&mut matches, &found.key);
        }
    }

    let haystack = [meta.category, meta.title, meta.question, meta.prompt]
        .into_iter()
        .flatten()
        .chain(meta.tags.iter().map(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    for category in catalog {
        let hit = haystack.contains(&category.key.to_lowercase())
            || (!category.label.is_empty() && haystack.contains(&category.label.to_lowercase()))
            || category
                .synonyms
                .iter()
                .any(|s| !s.is_empty() && haystack.contains(&s.to_lowercase()));
        if hit {
            push_unique(&mut matches, &category.key);
        }
    }

    // Loose tag heuristic for hierarchical keys ("limousine" -> "vehicle:limousine")
    for tag in meta.tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        for category in catalog {
            if category.key.to_lowercase().contains(&tag) {
                push_unique(&mut matches, &category.key);
            }
        }
    }

    if matches.is_empty() {
        return vec![MISC_KEY.to_string()];
    }
    matches
}

fn push_unique(matches: &mut Vec<String>, key: &str) {
    if !matches.iter().any(|k| k == key) {
        matches.push(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use crate::models::CategoryGroup;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn synonym_in_tag_matches() {
        let t = tags(&["Stretch Limo Ideas"]);
        let keys = normalize(&PollMetadata { tags: &t, ..Default::default() });
        assert!(keys.contains(&"vehicle:limousine".to_string()));
    }

    #[test]
    fn explicit_category_with_display_prefix() {
        let keys = normalize(&PollMetadata {
            category: Some("Category: pricing:overtime"),
            ..Default::default()
        });
        assert_eq!(keys.first().map(String::as_str), Some("pricing:overtime"));
    }

    #[test]
    fn multi_label_keeps_every_match() {
        let keys = normalize(&PollMetadata {
            question: Some("Best stretch limo for a wedding?"),
            ..Default::default()
        });
        assert!(keys.contains(&"vehicle:limousine".to_string()));
        assert!(keys.contains(&"event:wedding".to_string()));
    }

    #[test]
    fn tag_substring_of_hierarchical_key() {
        let t = tags(&["sprinter"]);
        let keys = normalize(&PollMetadata { tags: &t, ..Default::default() });
        assert!(keys.contains(&"vehicle:sprinter".to_string()));
    }

    #[test]
    fn no_match_falls_back_to_misc() {
        let keys = normalize(&PollMetadata {
            question: Some("zzz qqq"),
            ..Default::default()
        });
        assert_eq!(keys, vec![MISC_KEY.to_string()]);

        let empty = normalize(&PollMetadata::default());
        assert_eq!(empty, vec![MISC_KEY.to_string()]);
    }

    #[test]
    fn blank_tags_do_not_match_everything() {
        let t = tags(&["", "   "]);
        let keys = normalize(&PollMetadata { tags: &t, ..Default::default() });
        assert_eq!(keys, vec![MISC_KEY.to_string()]);
    }

    #[test]
    fn results_are_deduplicated() {
        let t = tags(&["limousine", "limo"]);
        let keys = normalize(&PollMetadata {
            category: Some("vehicle:limousine"),
            tags: &t,
            question: Some("limousine limousine"),
            ..Default::default()
        });
        let hits = keys.iter().filter(|k| *k == "vehicle:limousine").count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn custom_catalog() {
        let catalog = vec![Category {
            key: "x:alpha".to_string(),
            label: "Alpha".to_string(),
            group: CategoryGroup::Other,
            synonyms: vec!["first letter".to_string()],
        }];
        let keys = normalize_with(&catalog, &PollMetadata {
            title: Some("The FIRST LETTER"),
            ..Default::default()
        });
        assert_eq!(keys, vec!["x:alpha".to_string()]);
    }

    #[test]
    fn from_poll_uses_question_and_tags() {
        let poll = Poll::new("p1", "Favorite wedding ride?", &["A", "B"]).with_tags(&["karaoke"]);
        let keys = normalize(&PollMetadata::from(&poll));
        assert!(keys.contains(&"event:wedding".to_string()));
        assert!(keys.contains(&"feature:karaoke".to_string()));
    }

    fn vocabulary() -> Vec<String> {
        ALL_CATEGORIES
            .iter()
            .flat_map(|c| c.synonyms.iter().cloned().chain([c.label.clone(), c.key.clone()]))
            .collect()
    }

    // Catalog words mixed with noise, so hits and misses both come up
    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![prop::sample::select(vocabulary()), "[a-zA-Z :-]{0,12}"]
    }

    proptest! {
        #[test]
        fn every_textual_hit_is_returned(
            question in fragment(),
            tags in prop::collection::vec(fragment(), 0..4),
        ) {
            let keys = normalize(&PollMetadata {
                question: Some(&question),
                tags: &tags,
                ..Default::default()
            });
            prop_assert!(!keys.is_empty());
            let unique: HashSet<&String> = keys.iter().collect();
            prop_assert_eq!(unique.len(), keys.len());

            let haystack = std::iter::once(question.as_str())
                .chain(tags.iter().map(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            for category in ALL_CATEGORIES.iter() {
                let label = category.label.to_lowercase();
                let hit = haystack.contains(&category.key.to_lowercase())
                    || (!label.is_empty() && haystack.contains(&label))
                    || category
                        .synonyms
                        .iter()
                        .any(|s| !s.is_empty() && haystack.contains(&s.to_lowercase()))
                    || tags.iter().any(|t| {
                        let t = t.trim().to_lowercase();
                        !t.is_empty() && category.key.to_lowercase().contains(&t)
                    });
                if hit {
                    prop_assert!(keys.contains(&category.key), "{} missing for {:?}", category.key, haystack);
                }
            }
        }
    }
}
