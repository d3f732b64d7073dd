//! Property-based checks for route pattern matching.

use netcondition::pattern::RoutePattern;
use proptest::prelude::*;

fn literal() -> impl Strategy<Value = String> { "[a-z0-9/._-]{1,24}" }

fn target() -> impl Strategy<Value = String> { "[ -~]{0,40}" }

proptest! {
    #[test]
    fn literal_matches_only_itself(source in literal(), other in literal()) {
        let pattern = RoutePattern::new(&source).expect("literal compiles");
        prop_assert!(pattern.is_literal());
        prop_assert!(pattern.matches(&source));
        prop_assert_eq!(pattern.matches(&other), source == other);
    }

    #[test]
    fn query_and_fragment_are_ignored(source in literal(), query in "[a-z=&]{0,12}") {
        let pattern = RoutePattern::new(&source).expect("literal compiles");
        let with_query = format!("{source}?{query}");
        let with_fragment = format!("{source}#{query}");
        prop_assert!(pattern.matches(&with_query));
        prop_assert!(pattern.matches(&with_fragment));
    }

    #[test]
    fn globstar_matches_everything(target in target()) {
        let globstar = RoutePattern::new("**").expect("compiles");
        let doubled = RoutePattern::new("**/**").expect("compiles");
        prop_assert!(globstar.matches(&target));
        prop_assert!(doubled.matches(&target));
    }

    #[test]
    fn star_never_crosses_a_separator(path in "[a-z/]{0,24}") {
        let star = RoutePattern::new("*").expect("compiles");
        prop_assert_eq!(star.matches(&path), !path.contains('/'));
    }

    #[test]
    fn rooted_globstar_claims_every_descendant(segment in "[a-z]{1,8}", rest in "[a-z/]{0,24}") {
        let pattern = RoutePattern::new(&format!("**/{segment}/**")).expect("compiles");
        let descendant = format!("https://host.test/{segment}/{rest}");
        prop_assert!(pattern.matches(&descendant));
        let rooted = format!("/{segment}");
        prop_assert!(!pattern.matches(&rooted));
    }
}
