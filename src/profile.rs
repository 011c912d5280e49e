//! Multi-aspect character profiling.
//!
//! A lookup runs two independent paths: a literal, case-insensitive scan of
//! every raw source document decides whether the character exists and which
//! story it belongs to, while vector retrieval over four templated aspect
//! queries supplies the text the summary, relations and type are derived
//! from.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::State;
use crate::corpus::IndexHandle;
use crate::embedder::Embedder;
use crate::error::{Result, TalevecError};
use crate::retriever::Retriever;
use crate::sources::SourceReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CharacterType {
    Protagonist,
    Antagonist,
    #[serde(rename = "Main Character")]
    MainCharacter,
    #[serde(rename = "Supporting Character")]
    SupportingCharacter,
}

/// Keyword rules checked in order; the first keyword found wins.
pub const TYPE_RULES: [(&str, CharacterType); 3] = [
    ("protagonist", CharacterType::Protagonist),
    ("antagonist", CharacterType::Antagonist),
    ("main", CharacterType::MainCharacter),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Relation {
    pub name: String,
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterInfo {
    pub name: String,
    pub story_title: String,
    pub summary: String,
    pub relations: Vec<Relation>,
    pub character_type: CharacterType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aspect {
    StoryTitle,
    Summary,
    Relations,
    CharacterType,
}

impl Aspect {
    pub const ALL: [Aspect; 4] = [
        Aspect::StoryTitle,
        Aspect::Summary,
        Aspect::Relations,
        Aspect::CharacterType,
    ];

    pub fn query(self, name: &str) -> String {
        match self {
            Aspect::StoryTitle => format!("story title {name}"),
            Aspect::Summary => format!("summary of {name}'s role"),
            Aspect::Relations => format!("relationships of {name}"),
            Aspect::CharacterType => format!("character type role of {name}"),
        }
    }
}

/// Tunables for record synthesis.
#[derive(Debug, Clone, Copy)]
pub struct ProfileRules {
    pub top_k: usize,
    pub summary_chars: usize,
    pub max_relations: usize,
}

impl Default for ProfileRules {
    fn default() -> Self {
        Self::from(&State::default())
    }
}

impl From<&State> for ProfileRules {
    fn from(state: &State) -> Self {
        Self {
            top_k: state.top_k,
            summary_chars: state.summary_chars,
            max_relations: state.max_relations,
        }
    }
}

/// Retrieved text per aspect, each the space-joined chunks in rank order.
#[derive(Debug, Clone, Default)]
pub struct AspectTexts {
    pub story_title: String,
    pub summary: String,
    pub relations: String,
    pub character_type: String,
}

impl AspectTexts {
    fn set(&mut self, aspect: Aspect, text: String) {
        match aspect {
            Aspect::StoryTitle => self.story_title = text,
            Aspect::Summary => self.summary = text,
            Aspect::Relations => self.relations = text,
            Aspect::CharacterType => self.character_type = text,
        }
    }
}

pub fn lookup(
    handle: &IndexHandle,
    embedder: &dyn Embedder,
    sources: &dyn SourceReader,
    name: &str,
    rules: &ProfileRules,
) -> Result<Option<CharacterInfo>> {
    info!("looking up information for {name}");

    let matching = matching_sources(handle, sources, name)?;
    let Some(source_id) = matching.first() else {
        debug!("{name} not found in any source");
        return Ok(None);
    };
    if matching.len() > 1 {
        debug!(
            candidates = matching.len(),
            "{name} appears in several sources, using {source_id}"
        );
    }

    let retriever = Retriever::new(handle, embedder);
    let aspects = gather_aspects(&retriever, name, rules.top_k)?;

    Ok(Some(CharacterInfo {
        name: name.to_string(),
        story_title: story_title(source_id),
        summary: truncate_chars(&aspects.summary, rules.summary_chars),
        relations: extract_relations(&aspects.relations, name, rules.max_relations),
        character_type: classify(&aspects.character_type),
    }))
}

/// Runs the four aspect queries concurrently; any failure fails the lookup.
pub fn gather_aspects(retriever: &Retriever<'_>, name: &str, k: usize) -> Result<AspectTexts> {
    let texts = Aspect::ALL
        .par_iter()
        .map(|&aspect| {
            let chunks = retriever.retrieve(&aspect.query(name), k)?;
            Ok((aspect, chunks.join(" ")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut aspects = AspectTexts::default();
    for (aspect, text) in texts {
        aspects.set(aspect, text);
    }
    Ok(aspects)
}

/// Source ids whose full text contains `name`, ignoring case, sorted
/// ascending so the first is a stable title choice.
pub fn matching_sources(
    handle: &IndexHandle,
    sources: &dyn SourceReader,
    name: &str,
) -> Result<BTreeSet<String>> {
    let needle = name.to_lowercase();
    let mut matching = BTreeSet::new();
    for source_id in handle.store().sources() {
        let text = sources
            .read(source_id)
            .map_err(|source| TalevecError::SourceRead {
                source_id: source_id.to_string(),
                source,
            })?;
        if text.to_lowercase().contains(&needle) {
            matching.insert(source_id.to_string());
        }
    }
    Ok(matching)
}

/// The source id without its file extension.
pub fn story_title(source_id: &str) -> String {
    Path::new(source_id)
        .with_extension("")
        .to_string_lossy()
        .into_owned()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Sentences (split on `.`) that mention `name` verbatim, trimmed, in order.
pub fn extract_relations(text: &str, name: &str, max: usize) -> Vec<Relation> {
    text.split('.')
        .filter(|sentence| sentence.contains(name))
        .map(|sentence| Relation {
            name: "Unknown".to_string(),
            relation: sentence.trim().to_string(),
        })
        .take(max)
        .collect()
}

pub fn classify(text: &str) -> CharacterType {
    let lowered = text.to_lowercase();
    TYPE_RULES
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|&(_, kind)| kind)
        .unwrap_or(CharacterType::SupportingCharacter)
}
