//! Turn a validated [`RuleFile`] into a schema and runnable rules.
//!
//! Named pattern nodes are built on first use, so a `ref` may appear before
//! the node it names. Every reference to a name yields the same pattern
//! node, which is what couples search and replace.

use crate::config::schema::{AgentSpec, KindSpec, MemberPattern, PatternSpec, RuleFile, RuleSpec};
use crate::pattern::{PatternError, PatternId, PatternSet};
use crate::transform::{Limits, Transformation};
use crate::tree::{Category, KindId, Member, Schema, SchemaError};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("kind '{kind}': {source}")]
    Kind {
        kind: String,
        #[source]
        source: SchemaError,
    },

    #[error("rule '{rule}': {source}")]
    Pattern {
        rule: String,
        #[source]
        source: PatternError,
    },

    #[error("rule '{rule}': undefined pattern '{name}'")]
    UnknownName { rule: String, name: String },

    #[error("rule '{rule}': pattern '{name}' contains itself")]
    Cycle { rule: String, name: String },
}

#[derive(Debug)]
pub struct CompiledRule {
    pub transformation: Transformation,
    pub limits: Limits,
    pub description: Option<String>,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        self.transformation.name()
    }
}

/// Everything one rule file defines. Rules keep file order.
#[derive(Debug)]
pub struct RuleSet {
    pub name: String,
    pub schema: Rc<Schema>,
    pub rules: Vec<CompiledRule>,
}

impl RuleFile {
    pub fn compile(&self) -> Result<RuleSet, CompileError> {
        let schema = Rc::new(build_schema(&self.kinds)?);
        let rules = self
            .rules
            .iter()
            .map(|rule| self.compile_rule(&schema, rule))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "compiled '{}': {} kind(s), {} rule(s)",
            self.meta.name,
            schema.len(),
            rules.len()
        );
        Ok(RuleSet {
            name: self.meta.name.clone(),
            schema,
            rules,
        })
    }

    fn compile_rule(&self, schema: &Rc<Schema>, rule: &RuleSpec) -> Result<CompiledRule, CompileError> {
        let mut compiler = RuleCompiler {
            rule: &rule.id,
            patterns: PatternSet::new(schema.clone()),
            definitions: rule.definitions(),
            named: HashMap::new(),
            building: HashSet::new(),
        };
        let search = compiler.pattern(&rule.search)?;
        let replace = match &rule.replace {
            Some(replace) => Some(compiler.pattern(replace)?),
            None => None,
        };

        let transformation = Transformation::new(
            rule.id.clone(),
            compiler.patterns,
            search,
            replace,
            rule.mode,
        )
        .map_err(|source| CompileError::Pattern {
            rule: rule.id.clone(),
            source,
        })?;

        Ok(CompiledRule {
            transformation,
            limits: Limits {
                max_repetitions: rule.max_repetitions.unwrap_or(self.meta.max_repetitions),
                strict: self.meta.strict,
            },
            description: rule.description.clone(),
        })
    }
}

/// Define `kinds` in dependency order, so a parent may be listed after its
/// children.
pub fn build_schema(kinds: &[KindSpec]) -> Result<Schema, CompileError> {
    let mut schema = Schema::new();
    let mut pending: Vec<&KindSpec> = kinds.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for kind in pending {
            let parent = match &kind.parent {
                None => Some(KindId::NODE),
                Some(parent) => schema.lookup(parent),
            };
            match parent {
                Some(parent) => define(&mut schema, kind, parent)?,
                None => deferred.push(kind),
            }
        }

        if deferred.len() == before {
            if let Some(kind) = deferred.first() {
                return Err(CompileError::Kind {
                    kind: kind.name.clone(),
                    source: SchemaError::UnknownKind {
                        name: kind.parent.clone().unwrap_or_default(),
                    },
                });
            }
        }
        pending = deferred;
    }
    Ok(schema)
}

fn define(schema: &mut Schema, kind: &KindSpec, parent: KindId) -> Result<(), CompileError> {
    let members: Vec<(&str, Category)> = kind
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.category))
        .collect();
    let defined = if kind.value {
        schema.define_valued(&kind.name, parent, &members)
    } else {
        schema.define(&kind.name, parent, &members)
    };
    defined.map(|_| ()).map_err(|source| CompileError::Kind {
        kind: kind.name.clone(),
        source,
    })
}

struct RuleCompiler<'r> {
    rule: &'r str,
    patterns: PatternSet,
    definitions: HashMap<&'r str, &'r PatternSpec>,
    named: HashMap<&'r str, PatternId>,
    building: HashSet<&'r str>,
}

impl<'r> RuleCompiler<'r> {
    fn fail(&self, source: impl Into<PatternError>) -> CompileError {
        CompileError::Pattern {
            rule: self.rule.to_string(),
            source: source.into(),
        }
    }

    fn pattern(&mut self, spec: &'r PatternSpec) -> Result<PatternId, CompileError> {
        match &spec.name {
            Some(name) => self.named(name),
            None => self.build(spec),
        }
    }

    fn named(&mut self, name: &'r str) -> Result<PatternId, CompileError> {
        if let Some(id) = self.named.get(name) {
            return Ok(*id);
        }
        let spec = *self
            .definitions
            .get(name)
            .ok_or_else(|| CompileError::UnknownName {
                rule: self.rule.to_string(),
                name: name.to_string(),
            })?;
        if !self.building.insert(name) {
            return Err(CompileError::Cycle {
                rule: self.rule.to_string(),
                name: name.to_string(),
            });
        }
        let id = self.build(spec)?;
        self.building.remove(name);
        self.named.insert(name, id);
        Ok(id)
    }

    fn optional(
        &mut self,
        spec: &'r Option<Box<PatternSpec>>,
    ) -> Result<Option<PatternId>, CompileError> {
        match spec {
            Some(spec) => Ok(Some(self.pattern(spec)?)),
            None => Ok(None),
        }
    }

    fn all(&mut self, specs: &'r [PatternSpec]) -> Result<Vec<PatternId>, CompileError> {
        specs.iter().map(|spec| self.pattern(spec)).collect()
    }

    fn build(&mut self, spec: &'r PatternSpec) -> Result<PatternId, CompileError> {
        let kind = match &spec.kind {
            Some(name) => self
                .patterns
                .schema()
                .kind(name)
                .map_err(|e| self.fail(e))?,
            None => KindId::NODE,
        };

        let built = match &spec.agent {
            AgentSpec::Standard { value, members } => {
                let members = self.members(kind, members)?;
                match value {
                    Some(value) => self.patterns.valued(kind, value.clone(), members),
                    None => self.patterns.standard(kind, members),
                }
            }
            AgentSpec::Star { restriction } => {
                let restriction = self.optional(restriction)?;
                self.patterns.star(kind, restriction)
            }
            AgentSpec::Stuff {
                terminus,
                restriction,
            } => {
                let terminus = self.pattern(terminus)?;
                let restriction = self.optional(restriction)?;
                self.patterns.stuff(kind, terminus, restriction)
            }
            AgentSpec::AnyNode { terminus } => {
                let terminus = self.pattern(terminus)?;
                self.patterns.any_node(kind, terminus)
            }
            AgentSpec::Overlay { through, overlay } => {
                let through = self.pattern(through)?;
                let overlay = self.pattern(overlay)?;
                self.patterns.overlay(kind, through, overlay)
            }
            AgentSpec::NotMatch { pattern } => {
                let pattern = self.pattern(pattern)?;
                self.patterns.not_match(kind, pattern)
            }
            AgentSpec::MatchAll { patterns } => {
                let patterns = self.all(patterns)?;
                self.patterns.match_all(kind, patterns)
            }
            AgentSpec::MatchAny { patterns } => {
                let patterns = self.all(patterns)?;
                self.patterns.match_any(kind, patterns)
            }
            AgentSpec::GreenGrass { through } => {
                let through = self.pattern(through)?;
                self.patterns.green_grass(kind, through)
            }
            AgentSpec::Slave {
                through,
                search,
                replace,
                mode,
            } => {
                let through = self.pattern(through)?;
                let search = self.pattern(search)?;
                let replace = self.optional(replace)?;
                self.patterns.slave(kind, through, search, replace, *mode)
            }
            AgentSpec::Ref => {
                return Err(CompileError::UnknownName {
                    rule: self.rule.to_string(),
                    name: String::new(),
                })
            }
        };
        built.map_err(|e| self.fail(e))
    }

    /// Member patterns in layout order. Absent members are left open.
    fn members(
        &mut self,
        kind: KindId,
        given: &'r std::collections::BTreeMap<String, MemberPattern>,
    ) -> Result<Vec<Member<PatternId>>, CompileError> {
        let schema = self.patterns.schema_rc().clone();
        let kind_name = schema.name(kind);

        if let Some(unknown) = given
            .keys()
            .find(|name| schema.member_index(kind, name).is_none())
        {
            return Err(self.fail(SchemaError::UnknownMember {
                kind: kind_name.to_string(),
                member: unknown.clone(),
            }));
        }

        let mut members = Vec::with_capacity(schema.layout(kind).len());
        for (index, decl) in schema.layout(kind).iter().enumerate() {
            let member = match (decl.category, given.get(&decl.name)) {
                (category, None) => Member::empty(category),
                (Category::Single, Some(MemberPattern::One(item))) => {
                    Member::Single(Some(self.pattern(item)?))
                }
                (Category::Sequence, Some(MemberPattern::Many(items))) => {
                    Member::Sequence(self.all(items)?)
                }
                (Category::Collection, Some(MemberPattern::Many(items))) => {
                    Member::Collection(self.all(items)?)
                }
                (expected, Some(other)) => {
                    return Err(self.fail(SchemaError::MemberCategory {
                        kind: kind_name.to_string(),
                        index,
                        expected,
                        found: match other {
                            MemberPattern::One(_) => Category::Single,
                            MemberPattern::Many(_) => Category::Sequence,
                        },
                    }))
                }
            };
            members.push(member);
        }
        Ok(members)
    }
}
