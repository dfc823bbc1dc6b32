//! Property tests for validation routing

use deontica_domain::{Clause, Modality, Route};
use deontica_gatekeeper::{decide, Gatekeeper, RefineBudget, RemoteReport, MAX_REFINES};
use proptest::prelude::*;
use serde_json::json;

fn arb_modality() -> impl Strategy<Value = Option<Modality>> {
    prop::option::of(prop::sample::select(Modality::ALL.to_vec()))
}

fn arb_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z ]{0,12}")
}

fn arb_clause() -> impl Strategy<Value = Clause> {
    (arb_modality(), arb_text(), arb_text(), arb_text(), arb_text()).prop_map(
        |(modality, actor, actor_canonical, object, formula)| {
            let mut c = Clause::new("Providers shall keep logs.");
            c.modality = modality;
            c.actor = actor;
            c.actor_canonical = actor_canonical;
            c.object = object;
            c.set_deontic_formula(formula);
            c
        },
    )
}

fn arb_remote() -> impl Strategy<Value = RemoteReport> {
    (any::<bool>(), any::<bool>()).prop_map(|(pass, retriable)| {
        RemoteReport::from_value(&json!({"pass": pass, "retriable": retriable}))
    })
}

proptest! {
    #[test]
    fn refine_count_never_exceeds_two(failures in prop::collection::vec(any::<bool>(), 0..20)) {
        let mut budget = RefineBudget::default();
        let mut refines = 0u32;
        for retriable in failures {
            if decide(false, retriable, &mut budget) == Route::Refine {
                refines += 1;
            }
        }
        prop_assert!(refines <= MAX_REFINES);
        prop_assert_eq!(refines, budget.used());
    }

    #[test]
    fn evaluation_loop_is_bounded(clause in arb_clause(), remote in arb_remote()) {
        let gatekeeper = Gatekeeper::default();
        let mut budget = RefineBudget::default();
        let mut rounds = 0;
        loop {
            rounds += 1;
            let result = gatekeeper.evaluate(&clause, &remote, &mut budget);
            if result.route != Route::Refine {
                break;
            }
        }
        prop_assert!(rounds <= 1 + MAX_REFINES as usize);
    }

    #[test]
    fn bare_clause_always_fails_local_checks(text in ".{0,40}") {
        let clause = Clause::new(text);
        let report = Gatekeeper::default().check(&clause);
        prop_assert!(!report.passed());
        prop_assert_eq!(
            report.codes(),
            vec!["missing_modality", "missing_actor", "missing_formula"]
        );
    }

    #[test]
    fn local_and_remote_pass_routes_ok(clause in arb_clause(), used in 0u32..=2) {
        let gatekeeper = Gatekeeper::default();
        prop_assume!(gatekeeper.check(&clause).passed());

        let mut budget = RefineBudget::default();
        for _ in 0..used {
            budget.try_consume();
        }
        let remote = RemoteReport::from_value(&json!({"pass": true}));
        let result = gatekeeper.evaluate(&clause, &remote, &mut budget);
        prop_assert_eq!(result.route, Route::Ok);
        prop_assert_eq!(budget.used(), used);
    }

    #[test]
    fn local_failure_without_retry_routes_review(clause in arb_clause(), remote in arb_remote()) {
        let gatekeeper = Gatekeeper::default();
        prop_assume!(!gatekeeper.check(&clause).passed());

        // Non-retriable, on a fresh budget
        let mut fresh = RefineBudget::default();
        let no_retry = RemoteReport { retriable: false, ..remote.clone() };
        prop_assert_eq!(gatekeeper.evaluate(&clause, &no_retry, &mut fresh).route, Route::Review);

        // Retriable, on an exhausted budget
        let mut spent = RefineBudget::default();
        while spent.try_consume() {}
        let retry = RemoteReport { retriable: true, ..remote };
        prop_assert_eq!(gatekeeper.evaluate(&clause, &retry, &mut spent).route, Route::Review);
    }
}
