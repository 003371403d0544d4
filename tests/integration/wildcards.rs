use super::arith;
use treegraft::engine::{Key, Run};
use treegraft::pattern::Mode;
use treegraft::transform::Limits;
use treegraft::tree::{KindId, Member};

fn run(ordered: bool, items: Vec<treegraft::NodeId>) -> Key {
    Key::Run(Run { ordered, items })
}

#[test]
fn test_leading_star_stops_before_the_last_element() {
    let mut a = arith();
    let rest = a.patterns.star(a.int, None).unwrap();
    let last = a.patterns.blank(a.int).unwrap();
    let search = a
        .patterns
        .standard(a.list, vec![Member::Sequence(vec![rest, last])])
        .unwrap();
    let rule = a.rule("prefix", search, None, Mode::Compare);

    let items = vec![a.int(1), a.int(2), a.int(3)];
    let subject = a.list(items.clone());
    let couplings = rule.find(&a.forest, subject).unwrap().unwrap();
    assert_eq!(couplings.get(rest), Some(&run(true, items[..2].to_vec())));
    assert_eq!(couplings.get(last), Some(&Key::Node(items[2])));
}

#[test]
fn test_trailing_star_takes_the_remainder() {
    let mut a = arith();
    let first = a.patterns.blank(a.int).unwrap();
    let rest = a.patterns.star(a.int, None).unwrap();
    let search = a
        .patterns
        .standard(a.list, vec![Member::Sequence(vec![first, rest])])
        .unwrap();
    let rule = a.rule("suffix", search, None, Mode::Compare);

    let items = vec![a.int(1), a.int(2), a.int(3)];
    let subject = a.list(items.clone());
    let couplings = rule.find(&a.forest, subject).unwrap().unwrap();
    assert_eq!(couplings.get(first), Some(&Key::Node(items[0])));
    assert_eq!(couplings.get(rest), Some(&run(true, items[1..].to_vec())));
}

#[test]
fn test_lone_star_matches_an_empty_sequence() {
    let mut a = arith();
    let all = a.patterns.star(a.int, None).unwrap();
    let search = a
        .patterns
        .standard(a.list, vec![Member::Sequence(vec![all])])
        .unwrap();
    let rule = a.rule("anything", search, None, Mode::Compare);

    let empty = a.list(vec![]);
    let couplings = rule.find(&a.forest, empty).unwrap().unwrap();
    assert_eq!(couplings.get(all), Some(&run(true, vec![])));
}

#[test]
fn test_empty_sequence_pattern_only_matches_empty() {
    let mut a = arith();
    let search = a
        .patterns
        .standard(a.list, vec![Member::Sequence(vec![])])
        .unwrap();
    let rule = a.rule("empty", search, None, Mode::Compare);

    let empty = a.list(vec![]);
    let one = a.int(1);
    let full = a.list(vec![one]);
    assert!(rule.find(&a.forest, empty).unwrap().is_some());
    assert!(rule.find(&a.forest, full).unwrap().is_none());
}

#[test]
fn test_star_restriction_applies_to_every_element() {
    let mut a = arith();
    let zero = a.int_pattern(0);
    let nonzero = a.patterns.not_match(a.int, zero).unwrap();
    let all = a.patterns.star(a.int, Some(nonzero)).unwrap();
    let search = a
        .patterns
        .standard(a.list, vec![Member::Sequence(vec![all])])
        .unwrap();
    let rule = a.rule("no-zeros", search, None, Mode::Compare);

    let clean = vec![a.int(1), a.int(2)];
    let clean = a.list(clean);
    let dirty = vec![a.int(1), a.int(0)];
    let dirty = a.list(dirty);
    assert!(rule.find(&a.forest, clean).unwrap().is_some());
    assert!(rule.find(&a.forest, dirty).unwrap().is_none());
}

#[test]
fn test_collection_star_takes_the_unmatched_elements() {
    let mut a = arith();
    let two = a.int_pattern(2);
    let others = a.patterns.star(a.int, None).unwrap();
    let search = a
        .patterns
        .standard(a.bag, vec![Member::Collection(vec![two, others])])
        .unwrap();
    let rule = a.rule("has-two", search, None, Mode::Compare);

    let items = vec![a.int(1), a.int(2), a.int(3)];
    let subject = a.bag(items.clone());
    let couplings = rule.find(&a.forest, subject).unwrap().unwrap();
    assert_eq!(couplings.get(two), Some(&Key::Node(items[1])));
    assert_eq!(
        couplings.get(others),
        Some(&run(false, vec![items[0], items[2]]))
    );
}

#[test]
fn test_not_match_restricts_without_binding() {
    let mut a = arith();
    let zero = a.int_pattern(0);
    let nonzero = a.patterns.not_match(a.int, zero).unwrap();
    let search = a.binary_pattern(a.add, None, Some(nonzero));
    let rule = a.rule("rhs-not-zero", search, None, Mode::Search);

    let (one, z) = (a.int(1), a.int(0));
    let with_zero = a.add(one, z);
    let (one, two) = (a.int(1), a.int(2));
    let without = a.add(one, two);
    let root = a.add(with_zero, without);

    let couplings = rule.find(&a.forest, root).unwrap().unwrap();
    assert_eq!(couplings.get(search), Some(&Key::Node(without)));
    assert_eq!(couplings.get(nonzero), Some(&Key::Node(two)));
    assert_eq!(couplings.get(zero), None);
}

#[test]
fn test_stuff_restriction_guards_the_path() {
    let mut a = arith();
    let zero = a.int_pattern(0);
    let any_mul = a.binary_pattern(a.mul, None, None);
    let outside_mul = a.patterns.not_match(KindId::NODE, any_mul).unwrap();
    let search = a
        .patterns
        .stuff(KindId::NODE, zero, Some(outside_mul))
        .unwrap();
    let rule = a.rule("zero-outside-mul", search, None, Mode::Compare);

    let (inner_zero, one) = (a.int(0), a.int(1));
    let product = a.mul(inner_zero, one);
    let outer_zero = a.int(0);
    let root = a.add(product, outer_zero);

    let couplings = rule.find(&a.forest, root).unwrap().unwrap();
    assert_eq!(couplings.get(zero), Some(&Key::Node(outer_zero)));
}

#[test]
fn test_any_node_looks_one_level_down() {
    let mut a = arith();
    let zero = a.int_pattern(0);
    let search = a.patterns.any_node(a.add, zero).unwrap();
    let rule = a.rule("zero-operand", search, None, Mode::Compare);

    let (three, z) = (a.int(3), a.int(0));
    let direct = a.add(three, z);
    let (nested_zero, four) = (a.int(0), a.int(4));
    let product = a.mul(nested_zero, four);
    let five = a.int(5);
    let indirect = a.add(product, five);

    let couplings = rule.find(&a.forest, direct).unwrap().unwrap();
    assert_eq!(couplings.get(zero), Some(&Key::Node(z)));
    assert!(rule.find(&a.forest, indirect).unwrap().is_none());
}

#[test]
fn test_stuff_rewrites_the_occurrence_its_restriction_allows() {
    let mut a = arith();
    let one = a.int_pattern(1);
    let seven = a.int_pattern(7);
    let one_to_seven = a.patterns.overlay(a.int, one, seven).unwrap();
    let any_mul = a.binary_pattern(a.mul, None, None);
    let search = a
        .patterns
        .stuff(KindId::NODE, one_to_seven, Some(any_mul))
        .unwrap();
    let rule = a.rule("one-under-mul", search, None, Mode::Compare);

    // The same Int 1 sits under the Add and directly under the Mul.
    let shared = a.int(1);
    let nine = a.int(9);
    let sum = a.add(shared, nine);
    let root = a.mul(sum, shared);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 1);
    assert_eq!(a.show(applied.root), "(Mul (Add (Int 1) (Int 9)) (Int 7))");
    assert_eq!(
        a.forest.get(applied.root).members[0],
        Member::Single(Some(sum))
    );
}

#[test]
fn test_any_node_rewrites_one_shared_operand_per_hit() {
    let mut a = arith();
    let one = a.int_pattern(1);
    let seven = a.int_pattern(7);
    let one_to_seven = a.patterns.overlay(a.int, one, seven).unwrap();
    let search = a.patterns.any_node(a.add, one_to_seven).unwrap();
    let rule = a.rule("operand-one", search, None, Mode::Compare);

    let shared = a.int(1);
    let root = a.add(shared, shared);

    let limits = Limits {
        max_repetitions: 1,
        strict: false,
    };
    let applied = rule.apply(&mut a.forest, root, limits).unwrap();
    assert_eq!(applied.hits, 1);
    assert_eq!(a.show(applied.root), "(Add (Int 7) (Int 1))");

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 2);
    assert_eq!(a.show(applied.root), "(Add (Int 7) (Int 7))");
}
