//! Verification by listing what exists

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::phrases::{GuardrailPhrases, Tokens};
use super::verdict::{CheckKind, GuardrailVerdict, Verifier};
use crate::context::{redact_account_id, ContextField, ContextStore};
use crate::error::TriageResult;
use crate::handlers::{HandlerFactory, HandlerKind};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::log_debug;

/// Names shown in a not-found answer
const MAX_LISTED: usize = 10;

/// Words between a keyword and the name it introduces
const FILLERS: &[&str] = &["named", "called", "is", "the", "a", "an"];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "of", "for", "my", "our", "this", "that", "to", "from", "with",
    "and", "or", "is", "are", "named", "called", "all", "any", "every", "same", "under", "inside",
    "within", "at", "its", "which", "what", "new", "existing",
];

/// Resource keyword to ARM resource type
const RESOURCE_TYPES: &[(&str, &str)] = &[
    ("data factory", "microsoft.datafactory/factories"),
    ("factory", "microsoft.datafactory/factories"),
    ("adf", "microsoft.datafactory/factories"),
    ("key vault", "microsoft.keyvault/vaults"),
    ("keyvault", "microsoft.keyvault/vaults"),
    ("vault", "microsoft.keyvault/vaults"),
    ("batch account", "microsoft.batch/batchaccounts"),
    ("batch pool", "microsoft.batch/batchaccounts"),
    ("storage account", "microsoft.storage/storageaccounts"),
];

/// Looks names up through the handler factory
///
/// Groups are checked against the subscription's resource groups, resources
/// against the resources of the subscription (or of the group in context).
pub struct ListingVerifier {
    factory: Arc<HandlerFactory>,
    phrases: GuardrailPhrases,
    logger: SharedLogger,
}

impl ListingVerifier {
    pub fn new(factory: Arc<HandlerFactory>) -> Self {
        Self {
            factory,
            phrases: GuardrailPhrases::default(),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_phrases(mut self, phrases: GuardrailPhrases) -> Self {
        self.phrases = phrases;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    async fn names(&self, kind: HandlerKind, context: &ContextStore, type_filter: Option<&str>) -> TriageResult<Vec<String>> {
        let handle = self.factory.get_handler(kind, context).await?;
        let listing = handle.invoke("list", json!({})).await?;
        Ok(item_names(&listing, type_filter))
    }

    fn candidates(&self, check: CheckKind, text: &str) -> Vec<String> {
        match check {
            CheckKind::ResourceGroup => {
                let mut found = mentioned_names(text, &self.phrases.group_keywords);
                for token in Tokens::new(text).iter_words() {
                    if self.phrases.looks_like_group_name(token) && !found.iter().any(|f| f == token) {
                        found.push(token.to_string());
                    }
                }
                found
            }
            CheckKind::Resource => mentioned_names(text, &self.phrases.resource_keywords),
        }
    }

    fn subscription_label(context: &ContextStore) -> String {
        context
            .get(ContextField::AccountDisplayName)
            .or_else(|| context.get(ContextField::AccountId).map(|id| redact_account_id(&id)))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Verifier for ListingVerifier {
    async fn verify(
        &self,
        check: CheckKind,
        context: &ContextStore,
        text: &str,
    ) -> TriageResult<GuardrailVerdict> {
        if !context.has(ContextField::AccountId) {
            return Ok(GuardrailVerdict::not_found(
                check,
                "",
                format!(
                    "I need a subscription before I can check the {}. Which subscription should I use?",
                    check.label()
                ),
            ));
        }

        let candidates = self.candidates(check, text);
        if candidates.is_empty() {
            return Ok(match context.get(check.field()) {
                Some(current) => GuardrailVerdict::found(
                    check,
                    current.clone(),
                    format!("Using {} '{}' from the conversation.", check.label(), current),
                ),
                None => GuardrailVerdict::not_found(check, "", format!("Which {} do you mean?", check.label())),
            });
        }

        let (kind, type_filter) = match check {
            CheckKind::ResourceGroup => (HandlerKind::ResourceGroups, None),
            CheckKind::Resource => (HandlerKind::Resources, resource_type(text, &self.phrases)),
        };
        let names = self.names(kind, context, type_filter).await?;
        log_debug!(
            self.logger,
            "[ListingVerifier] {} candidates {:?} against {} names",
            check,
            candidates,
            names.len()
        );

        let subscription = Self::subscription_label(context);
        Ok(match resolve_name(&candidates, &names) {
            Some(name) => GuardrailVerdict::found(
                check,
                name.clone(),
                format!("{} '{}' exists in subscription {}.", capitalize(check.label()), name, subscription),
            ),
            None => {
                let wanted = candidates[0].clone();
                let mut reasoning = format!(
                    "{} '{}' was not found in subscription {}.",
                    capitalize(check.label()),
                    wanted,
                    subscription
                );
                if !names.is_empty() {
                    let shown: Vec<&str> = names.iter().take(MAX_LISTED).map(String::as_str).collect();
                    reasoning.push_str(&format!(" Available: {}", shown.join(", ")));
                    if names.len() > MAX_LISTED {
                        reasoning.push_str(&format!(" and {} more", names.len() - MAX_LISTED));
                    }
                    reasoning.push('.');
                }
                GuardrailVerdict::not_found(check, wanted, reasoning)
            }
        })
    }
}

/// Likely names next to any of `keywords` in `text`
///
/// Takes the word after a keyword (skipping fillers such as "named") and
/// the word before it. Words that look like identifiers come first.
pub fn mentioned_names(text: &str, keywords: &[String]) -> Vec<String> {
    let tokens = Tokens::new(text);
    let keyword_words: Vec<String> = keywords
        .iter()
        .flat_map(|k| k.split_whitespace().map(|w| w.to_lowercase()))
        .collect();

    let mut found: Vec<String> = Vec::new();
    let mut push = |word: &str| {
        if !found.iter().any(|f| f == word) {
            found.push(word.to_string());
        }
    };

    for keyword in keywords {
        for (start, len) in tokens.find(keyword) {
            let mut after = start + len;
            while tokens.lower(after).map_or(false, |w| FILLERS.contains(&w)) {
                after += 1;
            }
            if let Some(word) = usable(&tokens, &keyword_words, after) {
                push(word);
            }
            if let Some(word) = start.checked_sub(1).and_then(|i| usable(&tokens, &keyword_words, i)) {
                push(word);
            }
        }
    }

    // stable, so keyword order is kept within each group
    found.sort_by_key(|w| !looks_like_identifier(w));
    found
}

/// First candidate that matches a name exactly, then case-insensitively,
/// then as the unique name containing it
pub fn resolve_name(candidates: &[String], names: &[String]) -> Option<String> {
    for candidate in candidates {
        if let Some(name) = names.iter().find(|n| *n == candidate) {
            return Some(name.clone());
        }
        let lower = candidate.to_lowercase();
        if let Some(name) = names.iter().find(|n| n.to_lowercase() == lower) {
            return Some(name.clone());
        }
        if lower.len() >= 3 {
            let partial: Vec<&String> = names.iter().filter(|n| n.to_lowercase().contains(&lower)).collect();
            if let [only] = partial.as_slice() {
                return Some((*only).clone());
            }
        }
    }
    None
}

fn usable<'a>(tokens: &'a Tokens, keyword_words: &[String], index: usize) -> Option<&'a str> {
    let lower = tokens.lower(index)?;
    if STOP_WORDS.contains(&lower) || keyword_words.iter().any(|k| k == lower) {
        return None;
    }
    tokens.word(index)
}

fn looks_like_identifier(word: &str) -> bool {
    word.chars().any(|c| c == '-' || c == '_' || c.is_ascii_digit())
}

fn resource_type(text: &str, phrases: &GuardrailPhrases) -> Option<&'static str> {
    let tokens = Tokens::new(text);
    let (start, len) = tokens.find_any(&phrases.resource_keywords)?;
    let keyword: Vec<&str> = (start..start + len).filter_map(|i| tokens.lower(i)).collect();
    let keyword = keyword.join(" ");
    RESOURCE_TYPES
        .iter()
        .find(|(k, _)| *k == keyword)
        .map(|(_, t)| *t)
}

fn item_names(listing: &Value, type_filter: Option<&str>) -> Vec<String> {
    listing
        .get("value")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| match type_filter {
                    Some(wanted) => item
                        .get("type")
                        .and_then(|t| t.as_str())
                        .map_or(true, |t| t.eq_ignore_ascii_case(wanted)),
                    None => true,
                })
                .filter_map(|item| item.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
