use crate::pattern::Mode;
use crate::transform::DEFAULT_MAX_REPETITIONS;
use crate::tree::{Category, Schema, Value};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RuleFile {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub kinds: Vec<KindSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl RuleFile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }
        if self.meta.max_repetitions == 0 {
            issues.push(ValidationIssue::InvalidValue {
                rule_id: None,
                message: "meta.max_repetitions must be at least 1".to_string(),
            });
        }

        let mut known_kinds: Vec<&str> = vec![Schema::ROOT_NAME];
        known_kinds.extend(self.kinds.iter().map(|k| k.name.as_str()));

        let mut seen_kinds = HashSet::new();
        for kind in &self.kinds {
            if kind.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "kinds.name",
                });
            } else if !seen_kinds.insert(kind.name.as_str()) || kind.name == Schema::ROOT_NAME {
                issues.push(ValidationIssue::DuplicateKind {
                    name: kind.name.clone(),
                });
            }
            if let Some(parent) = &kind.parent {
                check_kind(&mut issues, None, parent, &known_kinds);
            }
        }

        let mut seen_ids = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            } else if !seen_ids.insert(rule.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    rule_id: rule.id.clone(),
                });
            }
            if rule.max_repetitions == Some(0) {
                issues.push(ValidationIssue::InvalidValue {
                    rule_id: Some(rule.id.clone()),
                    message: "max_repetitions must be at least 1".to_string(),
                });
            }
            rule.validate_patterns(&mut issues, &known_kinds);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_max_repetitions")]
    pub max_repetitions: usize,
    /// Treat reaching `max_repetitions` as an error.
    #[serde(default)]
    pub strict: bool,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
            strict: false,
        }
    }
}

fn default_max_repetitions() -> usize {
    DEFAULT_MAX_REPETITIONS
}

/// One `[[kinds]]` entry. Kinds without a parent derive from `Node`.
#[derive(Debug, Deserialize, Clone)]
pub struct KindSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberSpec>,
    /// Nodes of this kind carry a scalar value.
    #[serde(default)]
    pub value: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemberSpec {
    pub name: String,
    pub category: Category,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleSpec {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    pub search: PatternSpec,
    #[serde(default)]
    pub replace: Option<PatternSpec>,
    /// Overrides `meta.max_repetitions` for this rule.
    #[serde(default)]
    pub max_repetitions: Option<usize>,
}

impl RuleSpec {
    /// Search pattern first, then the replace pattern.
    pub fn patterns(&self) -> Vec<&PatternSpec> {
        let mut all = Vec::new();
        self.search.walk(&mut |p| all.push(p));
        if let Some(replace) = &self.replace {
            replace.walk(&mut |p| all.push(p));
        }
        all
    }

    /// Named pattern definitions of this rule. References are not included.
    pub fn definitions(&self) -> HashMap<&str, &PatternSpec> {
        let mut named = HashMap::new();
        for pattern in self.patterns() {
            if let (Some(name), false) = (&pattern.name, pattern.is_ref()) {
                named.entry(name.as_str()).or_insert(pattern);
            }
        }
        named
    }

    fn validate_patterns(&self, issues: &mut Vec<ValidationIssue>, known_kinds: &[&str]) {
        let rule_id = Some(self.id.clone());
        let patterns = self.patterns();

        let mut defined = HashSet::new();
        for pattern in &patterns {
            match (&pattern.name, pattern.is_ref()) {
                (Some(name), false) if !defined.insert(name.as_str()) => {
                    issues.push(ValidationIssue::DuplicateName {
                        rule_id: self.id.clone(),
                        name: name.clone(),
                    });
                }
                (None, true) => issues.push(ValidationIssue::MissingField {
                    rule_id: rule_id.clone(),
                    field: "ref.name",
                }),
                _ => {}
            }
        }

        for pattern in &patterns {
            if let (Some(name), true) = (&pattern.name, pattern.is_ref()) {
                if !defined.contains(name.as_str()) {
                    issues.push(ValidationIssue::UnknownName {
                        rule_id: self.id.clone(),
                        name: name.clone(),
                        suggestion: suggest(name, defined.iter().copied()),
                    });
                }
            }
            if let Some(kind) = &pattern.kind {
                check_kind(issues, rule_id.clone(), kind, known_kinds);
            }
            if let AgentSpec::MatchAny { patterns } = &pattern.agent {
                if patterns.is_empty() {
                    issues.push(ValidationIssue::InvalidValue {
                        rule_id: rule_id.clone(),
                        message: "match-any needs at least one pattern".to_string(),
                    });
                }
            }
        }
    }
}

fn check_kind(
    issues: &mut Vec<ValidationIssue>,
    rule_id: Option<String>,
    name: &str,
    known_kinds: &[&str],
) {
    if !known_kinds.contains(&name) {
        issues.push(ValidationIssue::UnknownKind {
            rule_id,
            name: name.to_string(),
            suggestion: suggest(name, known_kinds.iter().copied()),
        });
    }
}

/// Closest candidate to `name`, if any is close enough to be a typo.
pub fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
        .filter(|(score, _)| *score >= 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// A pattern node. `kind` defaults to `Node`; `name` defines the node for
/// later `ref`s, or names the target of a `ref`.
#[derive(Debug, Deserialize, Clone)]
pub struct PatternSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub agent: AgentSpec,
}

impl PatternSpec {
    pub fn is_ref(&self) -> bool {
        matches!(self.agent, AgentSpec::Ref)
    }

    /// Visit this pattern and every pattern nested in it.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PatternSpec)) {
        visit(self);
        for child in self.agent.children() {
            child.walk(visit);
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "agent", rename_all = "kebab-case")]
pub enum AgentSpec {
    Standard {
        #[serde(default)]
        value: Option<Value>,
        #[serde(default)]
        members: BTreeMap<String, MemberPattern>,
    },
    Star {
        #[serde(default)]
        restriction: Option<Box<PatternSpec>>,
    },
    Stuff {
        terminus: Box<PatternSpec>,
        #[serde(default)]
        restriction: Option<Box<PatternSpec>>,
    },
    AnyNode {
        terminus: Box<PatternSpec>,
    },
    Overlay {
        through: Box<PatternSpec>,
        overlay: Box<PatternSpec>,
    },
    NotMatch {
        pattern: Box<PatternSpec>,
    },
    MatchAll {
        patterns: Vec<PatternSpec>,
    },
    MatchAny {
        patterns: Vec<PatternSpec>,
    },
    GreenGrass {
        through: Box<PatternSpec>,
    },
    Slave {
        through: Box<PatternSpec>,
        search: Box<PatternSpec>,
        #[serde(default)]
        replace: Option<Box<PatternSpec>>,
        #[serde(default)]
        mode: Mode,
    },
    Ref,
}

impl AgentSpec {
    pub fn children(&self) -> Vec<&PatternSpec> {
        match self {
            AgentSpec::Standard { members, .. } => members
                .values()
                .flat_map(|member| match member {
                    MemberPattern::Many(items) => items.iter().collect::<Vec<_>>(),
                    MemberPattern::One(item) => vec![&**item],
                })
                .collect(),
            AgentSpec::Star { restriction } => restriction.iter().map(|r| &**r).collect(),
            AgentSpec::Stuff {
                terminus,
                restriction,
            } => std::iter::once(&**terminus)
                .chain(restriction.iter().map(|r| &**r))
                .collect(),
            AgentSpec::AnyNode { terminus } => vec![&**terminus],
            AgentSpec::Overlay { through, overlay } => vec![&**through, &**overlay],
            AgentSpec::NotMatch { pattern } => vec![&**pattern],
            AgentSpec::MatchAll { patterns } | AgentSpec::MatchAny { patterns } => {
                patterns.iter().collect()
            }
            AgentSpec::GreenGrass { through } => vec![&**through],
            AgentSpec::Slave {
                through,
                search,
                replace,
                ..
            } => [&**through, &**search]
                .into_iter()
                .chain(replace.iter().map(|r| &**r))
                .collect(),
            AgentSpec::Ref => Vec::new(),
        }
    }
}

/// Member patterns: a table for single members, an array for containers.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum MemberPattern {
    Many(Vec<PatternSpec>),
    One(Box<PatternSpec>),
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyRuleList,
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        rule_id: String,
    },
    DuplicateKind {
        name: String,
    },
    DuplicateName {
        rule_id: String,
        name: String,
    },
    UnknownName {
        rule_id: String,
        name: String,
        suggestion: Option<String>,
    },
    UnknownKind {
        rule_id: Option<String>,
        name: String,
        suggestion: Option<String>,
    },
    InvalidValue {
        rule_id: Option<String>,
        message: String,
    },
}

fn did_you_mean(f: &mut fmt::Formatter<'_>, suggestion: &Option<String>) -> fmt::Result {
    match suggestion {
        Some(s) => write!(f, " (did you mean '{s}'?)"),
        None => Ok(()),
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "rule file contains no rules"),
            ValidationIssue::MissingField { rule_id, field } => match rule_id {
                Some(id) => write!(f, "rule '{id}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId { rule_id } => {
                write!(f, "rule id '{rule_id}' is used more than once")
            }
            ValidationIssue::DuplicateKind { name } => {
                write!(f, "kind '{name}' is defined more than once")
            }
            ValidationIssue::DuplicateName { rule_id, name } => {
                write!(f, "rule '{rule_id}' defines pattern '{name}' more than once")
            }
            ValidationIssue::UnknownName {
                rule_id,
                name,
                suggestion,
            } => {
                write!(f, "rule '{rule_id}' refers to undefined pattern '{name}'")?;
                did_you_mean(f, suggestion)
            }
            ValidationIssue::UnknownKind {
                rule_id,
                name,
                suggestion,
            } => {
                match rule_id {
                    Some(id) => write!(f, "rule '{id}' uses unknown kind '{name}'")?,
                    None => write!(f, "unknown kind '{name}'")?,
                }
                did_you_mean(f, suggestion)
            }
            ValidationIssue::InvalidValue { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid rule configuration: {message}"),
            },
        }
    }
}
