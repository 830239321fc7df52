//! Rule-driven field extraction: rule sets, the extraction engine and
//! canonical identifier derivation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use invrec_core::{
    EvidenceRef, Field, LayoutError, ModelError, Record, RecordSchema, Scope, NOT_AVAILABLE,
};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info_span, warn};

mod builtins;
mod identity;
mod profile;

pub use builtins::{builtin, BUILTIN_NAMES};
pub use identity::{
    basename, classify_filename, derive_identifiers, filename_identifiers, DerivedIdentity,
    IdentityOptions,
};
pub use profile::{
    load_profile, resolve_profile, CollectSpec, Profile, ProfileFile, RuleSpec, Section,
    SectionSpec,
};

pub const CRATE_NAME: &str = "invrec-rules";

/// Pure function of `(content, filename)`; `None` means "not available".
pub type CustomFn = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{field}`: invalid pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule `{field}`: unknown custom extractor `{name}`")]
    UnknownCustom { field: String, name: String },
    #[error("rule `{field}`: expected exactly one of pattern, section, collect or custom, found {found}")]
    StrategyCount { field: String, found: usize },
    #[error("rule `{field}`: {message}")]
    Invalid { field: String, message: String },
    #[error(transparent)]
    Schema(#[from] ModelError),
    #[error("layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("unsupported profile version {0}")]
    Version(u32),
    #[error("invalid profile yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Clone)]
pub enum Strategy {
    Pattern { regex: Regex, scope: Scope },
    Custom {
        name: String,
        scope: Scope,
        func: CustomFn,
    },
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Pattern { regex, scope } => f
                .debug_struct("Pattern")
                .field("regex", &regex.as_str())
                .field("scope", scope)
                .finish(),
            Strategy::Custom { name, scope, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("scope", scope)
                .finish(),
        }
    }
}

impl Strategy {
    pub fn label(&self) -> &str {
        match self {
            Strategy::Pattern { .. } => "pattern",
            Strategy::Custom { name, .. } => name,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Strategy::Pattern { scope, .. } | Strategy::Custom { scope, .. } => *scope,
        }
    }

    fn evidence(&self) -> EvidenceRef {
        EvidenceRef {
            strategy: self.label().to_string(),
            scope: self.scope(),
        }
    }

    fn apply(&self, content: &str, filename: &str) -> Option<String> {
        match self {
            Strategy::Pattern { regex, scope } => {
                let haystack = match scope {
                    Scope::Content => content,
                    Scope::Filename => filename,
                };
                regex
                    .captures(haystack)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            }
            Strategy::Custom { func, .. } => func(content, filename),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub field: String,
    pub strategy: Strategy,
    pub required: bool,
}

impl ExtractionRule {
    /// Pattern rule; the first capture group is the field value.
    pub fn pattern(field: impl Into<String>, pattern: &str, scope: Scope) -> Result<Self, RuleError> {
        let field = field.into();
        let regex = compile(&field, pattern)?;
        require_group(&field, &regex, 1)?;
        Ok(Self {
            field,
            strategy: Strategy::Pattern { regex, scope },
            required: false,
        })
    }

    pub fn custom(field: impl Into<String>, name: impl Into<String>, func: CustomFn) -> Self {
        Self {
            field: field.into(),
            strategy: Strategy::Custom {
                name: name.into(),
                scope: Scope::Content,
                func,
            },
            required: false,
        }
    }

    pub fn builtin(field: impl Into<String>, name: &str) -> Result<Self, RuleError> {
        let field = field.into();
        let func = builtin(name).ok_or_else(|| RuleError::UnknownCustom {
            field: field.clone(),
            name: name.to_string(),
        })?;
        Ok(Self::custom(field, name, func))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

pub(crate) fn compile(field: &str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
        field: field.to_string(),
        source,
    })
}

pub(crate) fn require_group(field: &str, regex: &Regex, group: usize) -> Result<(), RuleError> {
    if regex.captures_len() <= group {
        return Err(RuleError::Invalid {
            field: field.to_string(),
            message: format!("pattern `{}` has no capture group {group}", regex.as_str()),
        });
    }
    Ok(())
}

/// Immutable, ordered catalog of extraction rules for one report format.
#[derive(Debug, Clone)]
pub struct RuleSet {
    schema: Arc<RecordSchema>,
    rules: Vec<ExtractionRule>,
    identity: IdentityOptions,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, rules: Vec<ExtractionRule>) -> Result<Self, RuleError> {
        let fields = rules.iter().map(|r| r.field.clone()).collect();
        let schema = RecordSchema::new(name, fields)?;
        Ok(Self {
            schema: Arc::new(schema),
            rules,
            identity: IdentityOptions::default(),
        })
    }

    pub fn with_identity(mut self, identity: IdentityOptions) -> Self {
        self.identity = identity;
        self
    }

    pub fn name(&self) -> &str {
        self.schema.rule_set()
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub fn identity(&self) -> &IdentityOptions {
        &self.identity
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != NOT_AVAILABLE)
}

pub fn extract(rule_set: &RuleSet, content: &str, filename: &str) -> Result<Record, ExtractError> {
    extract_at(rule_set, content, filename, Utc::now())
}

/// Applies every rule in declared order, then derives identifiers.
pub fn extract_at(
    rule_set: &RuleSet,
    content: &str,
    filename: &str,
    processed_at: DateTime<Utc>,
) -> Result<Record, ExtractError> {
    let span = info_span!("extract", rule_set = rule_set.name(), file = filename);
    let _guard = span.enter();

    let base = basename(filename);
    let mut fields = Vec::with_capacity(rule_set.len());
    for rule in &rule_set.rules {
        match normalize(rule.strategy.apply(content, base)) {
            Some(value) => {
                fields.push(Field::with_value_and_evidence(value, rule.strategy.evidence()))
            }
            None if rule.required => {
                warn!(field = %rule.field, "required field not found");
                return Err(ExtractError::MissingField(rule.field.clone()));
            }
            None => {
                debug!(field = %rule.field, strategy = rule.strategy.label(), "field not found");
                fields.push(Field::empty());
            }
        }
    }

    let derived = derive_identifiers(filename, content, &rule_set.identity);
    let record = Record::new(
        Arc::clone(&rule_set.schema),
        fields,
        derived.identifiers,
        derived.hostname,
        filename,
        processed_at,
    )?;
    Ok(record)
}
