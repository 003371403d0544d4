use super::{arith, Arith};
use proptest::prelude::*;
use std::cmp::Ordering;
use treegraft::engine::{Key, Run};
use treegraft::pattern::Mode;
use treegraft::tree::{compare, equal, KindId, Member};
use treegraft::NodeId;

#[derive(Debug, Clone)]
enum Shape {
    Int(i64),
    Add(Box<Shape>, Box<Shape>),
    List(Vec<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = (0i64..3).prop_map(Shape::Int);
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Shape::Add(Box::new(l), Box::new(r))),
            prop::collection::vec(inner, 0..4).prop_map(Shape::List),
        ]
    })
}

fn plant(a: &mut Arith, shape: &Shape) -> NodeId {
    match shape {
        Shape::Int(v) => a.int(*v),
        Shape::Add(l, r) => {
            let l = plant(a, l);
            let r = plant(a, r);
            a.add(l, r)
        }
        Shape::List(items) => {
            let items = items.iter().map(|item| plant(a, item)).collect();
            a.list(items)
        }
    }
}

proptest! {
    #[test]
    fn compare_is_reflexive_across_copies(s in shape()) {
        let mut a = arith();
        let first = plant(&mut a, &s);
        let second = plant(&mut a, &s);
        prop_assert_eq!(compare(&a.forest, first, first), Ordering::Equal);
        prop_assert_eq!(compare(&a.forest, first, second), Ordering::Equal);
        prop_assert!(equal(&a.forest, first, second));
    }

    #[test]
    fn compare_is_antisymmetric(s in shape(), t in shape()) {
        let mut a = arith();
        let x = plant(&mut a, &s);
        let y = plant(&mut a, &t);
        prop_assert_eq!(compare(&a.forest, x, y), compare(&a.forest, y, x).reverse());
        prop_assert_eq!(equal(&a.forest, x, y), compare(&a.forest, x, y) == Ordering::Equal);
    }

    #[test]
    fn compare_is_transitive(s in shape(), t in shape(), u in shape()) {
        let mut a = arith();
        let mut ids = vec![plant(&mut a, &s), plant(&mut a, &t), plant(&mut a, &u)];
        ids.sort_by(|x, y| compare(&a.forest, *x, *y));
        prop_assert_ne!(compare(&a.forest, ids[0], ids[1]), Ordering::Greater);
        prop_assert_ne!(compare(&a.forest, ids[1], ids[2]), Ordering::Greater);
        prop_assert_ne!(compare(&a.forest, ids[0], ids[2]), Ordering::Greater);
    }

    #[test]
    fn leading_star_stops_at_the_first_occurrence(
        values in prop::collection::vec(0i64..4, 1..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let target = values[pick.index(values.len())];
        let first = values.iter().position(|v| *v == target).unwrap_or_default();

        let mut a = arith();
        let before = a.patterns.star(a.int, None).unwrap();
        let marker = a.int_pattern(target);
        let after = a.patterns.star(a.int, None).unwrap();
        let search = a
            .patterns
            .standard(a.list, vec![Member::Sequence(vec![before, marker, after])])
            .unwrap();
        let rule = a.rule("split", search, None, Mode::Compare);

        let items: Vec<NodeId> = values.iter().map(|v| a.int(*v)).collect();
        let subject = a.list(items.clone());
        let couplings = rule.find(&a.forest, subject).unwrap().unwrap();

        let prefix = Key::Run(Run { ordered: true, items: items[..first].to_vec() });
        let suffix = Key::Run(Run { ordered: true, items: items[first + 1..].to_vec() });
        prop_assert_eq!(couplings.get(before), Some(&prefix));
        prop_assert_eq!(couplings.get(marker), Some(&Key::Node(items[first])));
        prop_assert_eq!(couplings.get(after), Some(&suffix));
    }

    #[test]
    fn shared_pattern_node_binds_equal_subtrees(s in shape(), t in shape()) {
        let mut a = arith();
        let x = a.patterns.blank(KindId::NODE).unwrap();
        let search = a.binary_pattern(a.add, Some(x), Some(x));
        let rule = a.rule("twins", search, None, Mode::Compare);

        let lhs = plant(&mut a, &s);
        let rhs = plant(&mut a, &t);
        let subject = a.add(lhs, rhs);
        let found = rule.find(&a.forest, subject).unwrap();

        prop_assert_eq!(found.is_some(), equal(&a.forest, lhs, rhs));
        if let Some(couplings) = found {
            prop_assert_eq!(couplings.get(x), Some(&Key::Node(lhs)));
        }
    }

    #[test]
    fn search_is_deterministic(s in shape()) {
        let mut a = arith();
        let root = plant(&mut a, &s);
        let zero = a.int_pattern(0);
        let rule = a.rule("find-zero", zero, None, Mode::Search);

        let first = rule.find(&a.forest, root).unwrap();
        let second = rule.find(&a.forest, root).unwrap();
        prop_assert_eq!(first, second);
    }
}
