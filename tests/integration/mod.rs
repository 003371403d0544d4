//! Engine behaviour through the public API.
//!
//! Every test builds its subject trees and patterns over the small
//! arithmetic schema below.

mod engine;
mod properties;
mod wildcards;

use std::rc::Rc;
use treegraft::pattern::{Mode, PatternId, PatternSet};
use treegraft::transform::Transformation;
use treegraft::tree::{Category, Forest, KindId, Member, NodeId, Schema};

pub struct Arith {
    pub forest: Forest,
    pub patterns: PatternSet,
    pub expr: KindId,
    pub int: KindId,
    pub add: KindId,
    pub mul: KindId,
    pub list: KindId,
    pub bag: KindId,
}

pub fn arith() -> Arith {
    let mut schema = Schema::new();
    let expr = schema.define("Expr", KindId::NODE, &[]).unwrap();
    let int = schema.define_valued("Int", expr, &[]).unwrap();
    let operands = [("lhs", Category::Single), ("rhs", Category::Single)];
    let add = schema.define("Add", expr, &operands).unwrap();
    let mul = schema.define("Mul", expr, &operands).unwrap();
    let list = schema
        .define("List", KindId::NODE, &[("items", Category::Sequence)])
        .unwrap();
    let bag = schema
        .define("Bag", KindId::NODE, &[("items", Category::Collection)])
        .unwrap();
    let schema = Rc::new(schema);
    Arith {
        forest: Forest::new(schema.clone()),
        patterns: PatternSet::new(schema),
        expr,
        int,
        add,
        mul,
        list,
        bag,
    }
}

impl Arith {
    pub fn int(&mut self, value: i64) -> NodeId {
        self.forest.leaf(self.int, value).unwrap()
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(self.add, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(self.mul, lhs, rhs)
    }

    fn binary(&mut self, kind: KindId, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.forest
            .node(kind, vec![Member::Single(Some(lhs)), Member::Single(Some(rhs))])
            .unwrap()
    }

    pub fn list(&mut self, items: Vec<NodeId>) -> NodeId {
        self.forest
            .node(self.list, vec![Member::Sequence(items)])
            .unwrap()
    }

    pub fn bag(&mut self, items: Vec<NodeId>) -> NodeId {
        self.forest
            .node(self.bag, vec![Member::Collection(items)])
            .unwrap()
    }

    /// Pattern `kind(lhs, rhs)`; `None` leaves an operand open.
    pub fn binary_pattern(
        &mut self,
        kind: KindId,
        lhs: Option<PatternId>,
        rhs: Option<PatternId>,
    ) -> PatternId {
        self.patterns
            .standard(kind, vec![Member::Single(lhs), Member::Single(rhs)])
            .unwrap()
    }

    pub fn int_pattern(&mut self, value: i64) -> PatternId {
        self.patterns.valued(self.int, value, vec![]).unwrap()
    }

    /// Turn the patterns built so far into a rule.
    pub fn rule(
        &mut self,
        name: &str,
        search: PatternId,
        replace: Option<PatternId>,
        mode: Mode,
    ) -> Transformation {
        let fresh = PatternSet::new(self.forest.schema_rc().clone());
        let patterns = std::mem::replace(&mut self.patterns, fresh);
        Transformation::new(name, patterns, search, replace, mode).unwrap()
    }

    pub fn show(&self, id: NodeId) -> String {
        self.forest.display(id).to_string()
    }
}

/// `Add(x, 0) => x`
pub fn add_zero(a: &mut Arith, mode: Mode) -> Transformation {
    let x = a.patterns.blank(a.expr).unwrap();
    let zero = a.int_pattern(0);
    let search = a.binary_pattern(a.add, Some(x), Some(zero));
    a.rule("add-zero", search, Some(x), mode)
}
