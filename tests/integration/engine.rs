use super::{add_zero, arith};
use treegraft::pattern::Mode;
use treegraft::transform::Limits;
use treegraft::tree::{equal, Member};
use treegraft::ApplyError;

#[test]
fn test_search_rewrites_nested_hits() {
    let mut a = arith();
    let rule = add_zero(&mut a, Mode::Search);
    let seven = a.int(7);
    let zero = a.int(0);
    let inner = a.add(seven, zero);
    let one = a.int(1);
    let root = a.mul(inner, one);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 1);
    assert_eq!(a.show(applied.root), "(Mul (Int 7) (Int 1))");
    // Untouched subtrees are shared with the input.
    assert_eq!(a.forest.get(applied.root).members[1], Member::Single(Some(one)));
}

#[test]
fn test_exhausted_search_changes_nothing() {
    let mut a = arith();
    let rule = add_zero(&mut a, Mode::Search);
    let seven = a.int(7);
    let three = a.int(3);
    let root = a.add(seven, three);
    let before = a.forest.len();

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 0);
    assert_eq!(applied.root, root);
    assert_eq!(a.forest.len(), before);

    // Applying again to the result is just as quiet.
    let again = rule.apply(&mut a.forest, applied.root, Limits::default()).unwrap();
    assert_eq!(again.hits, 0);
    assert_eq!(again.root, root);
}

#[test]
fn test_compare_mode_repeats_at_the_root_only() {
    let mut a = arith();
    let rule = add_zero(&mut a, Mode::Compare);
    let seven = a.int(7);
    let zero = a.int(0);
    let inner = a.add(seven, zero);
    let outer_zero = a.int(0);
    let root = a.add(inner, outer_zero);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 2);
    assert_eq!(a.show(applied.root), "(Int 7)");

    let one = a.int(1);
    let buried = a.mul(inner, one);
    let applied = rule.apply(&mut a.forest, buried, Limits::default()).unwrap();
    assert_eq!(applied.hits, 0);
}

#[test]
fn test_overlay_keeps_unspecified_members() {
    let mut a = arith();
    let one = a.int_pattern(1);
    let matched = a.binary_pattern(a.add, Some(one), None);
    let five = a.int_pattern(5);
    let changed = a.binary_pattern(a.add, Some(five), None);
    let search = a.patterns.overlay(a.add, matched, changed).unwrap();
    let rule = a.rule("lhs-one-to-five", search, None, Mode::Search);

    let lhs = a.int(1);
    let rhs = a.int(2);
    let sum = a.add(lhs, rhs);
    let three = a.int(3);
    let root = a.mul(sum, three);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 1);
    assert_eq!(a.show(applied.root), "(Mul (Add (Int 5) (Int 2)) (Int 3))");

    let Member::Single(Some(new_sum)) = a.forest.get(applied.root).members[0] else {
        panic!("lhs should be set");
    };
    assert_ne!(new_sum, sum);
    // The kept rhs is a fresh copy; the sibling off the hit path is shared.
    let Member::Single(Some(kept)) = a.forest.get(new_sum).members[1] else {
        panic!("rhs should be kept");
    };
    assert_ne!(kept, rhs);
    assert!(equal(&a.forest, kept, rhs));
    assert_eq!(a.forest.get(applied.root).members[1], Member::Single(Some(three)));
}

#[test]
fn test_green_grass_skips_copies_of_matched_material() {
    let mut a = arith();
    let expr = a.patterns.blank(a.expr).unwrap();
    let search = a.patterns.green_grass(a.expr, expr).unwrap();
    let zero = a.int_pattern(0);
    let replace = a.binary_pattern(a.mul, Some(expr), Some(zero));
    let rule = a.rule("times-zero", search, Some(replace), Mode::Search);

    let one = a.int(1);
    let two = a.int(2);
    let root = a.add(one, two);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 1);
    assert_eq!(a.show(applied.root), "(Mul (Add (Int 1) (Int 2)) (Int 0))");
}

#[test]
fn test_strict_cap_fails_at_exactly_max_repetitions() {
    let mut a = arith();
    // Rebuilding an Int yields a fresh Int that matches again.
    let any_int = a.patterns.blank(a.int).unwrap();
    let rule = a.rule("forever", any_int, None, Mode::Search);
    let root = a.int(1);

    let limits = Limits {
        max_repetitions: 3,
        strict: true,
    };
    let err = rule.apply(&mut a.forest, root, limits).unwrap_err();
    match err {
        ApplyError::PossiblyInfinite { rule, repetitions } => {
            assert_eq!(rule, "forever");
            assert_eq!(repetitions, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_lenient_cap_stops_at_exactly_max_repetitions() {
    let mut a = arith();
    let any_int = a.patterns.blank(a.int).unwrap();
    let rule = a.rule("forever", any_int, None, Mode::Search);
    let root = a.int(1);

    let limits = Limits {
        max_repetitions: 3,
        strict: false,
    };
    let applied = rule.apply(&mut a.forest, root, limits).unwrap();
    assert_eq!(applied.hits, 3);
    assert_eq!(a.show(applied.root), "(Int 1)");
    assert_ne!(applied.root, root);
}

#[test]
fn test_green_grass_skips_rebuilt_nodes() {
    let mut a = arith();
    let any_int = a.patterns.blank(a.int).unwrap();
    let fresh_only = a.patterns.green_grass(a.int, any_int).unwrap();
    let rule = a.rule("touch-once", fresh_only, None, Mode::Search);

    let one = a.int(1);
    let two = a.int(2);
    let root = a.add(one, two);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 2);
    assert_eq!(a.show(applied.root), "(Add (Int 1) (Int 2))");
    assert!(a
        .forest
        .children(applied.root)
        .all(|child| child != one && child != two));
}

#[test]
fn test_slave_rewrites_inside_the_replacement_only() {
    let mut a = arith();
    let x = a.patterns.blank(a.expr).unwrap();
    let y = a.patterns.blank(a.expr).unwrap();
    let search = a.binary_pattern(a.add, Some(x), Some(y));
    let product = a.binary_pattern(a.mul, Some(x), Some(y));
    let one = a.int_pattern(1);
    let nine = a.int_pattern(9);
    let replace = a
        .patterns
        .slave(a.expr, product, one, Some(nine), Mode::Search)
        .unwrap();
    let rule = a.rule("add-to-mul", search, Some(replace), Mode::Search);

    let lhs = a.int(1);
    let rhs = a.int(2);
    let sum = a.add(lhs, rhs);
    let outer_one = a.int(1);
    let root = a.mul(sum, outer_one);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 1);
    assert_eq!(
        a.show(applied.root),
        "(Mul (Mul (Int 9) (Int 2)) (Int 1))"
    );
    assert_eq!(
        a.forest.get(applied.root).members[1],
        Member::Single(Some(outer_one))
    );
}

#[test]
fn test_match_any_rewrites_every_disjunct() {
    let mut a = arith();
    let one = a.int_pattern(1);
    let two = a.int_pattern(2);
    let either = a.patterns.match_any(a.int, vec![one, two]).unwrap();
    let zero = a.int_pattern(0);
    let rule = a.rule("small-to-zero", either, Some(zero), Mode::Search);

    let lhs = a.int(1);
    let rhs = a.int(2);
    let root = a.add(lhs, rhs);

    let applied = rule.apply(&mut a.forest, root, Limits::default()).unwrap();
    assert_eq!(applied.hits, 2);
    assert_eq!(a.show(applied.root), "(Add (Int 0) (Int 0))");
}

#[test]
fn test_match_all_requires_every_conjunct() {
    let mut a = arith();
    let any_add = a.binary_pattern(a.add, None, None);
    let zero = a.int_pattern(0);
    let zero_rhs = a.binary_pattern(a.add, None, Some(zero));
    let both = a.patterns.match_all(a.add, vec![any_add, zero_rhs]).unwrap();
    let rule = a.rule("add-with-zero", both, None, Mode::Compare);

    let one = a.int(1);
    let z = a.int(0);
    let hit = a.add(one, z);
    let two = a.int(2);
    let miss = a.add(one, two);

    assert!(rule.find(&a.forest, hit).unwrap().is_some());
    assert!(rule.find(&a.forest, miss).unwrap().is_none());
}
