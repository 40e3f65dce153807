// Fallback behaviour of the model gateway.
// CI: 128 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

mod common;

use std::collections::HashSet;

use proptest::prelude::*;

use gridassist_ai::{Content, Gateway, GatewayError, InvokeRequest, ModelPlan, Tool};

use common::{models, ScriptedBackend};

fn config_128() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn request(plan: &ModelPlan) -> InvokeRequest {
    InvokeRequest::new(plan, vec![Content::user_text("hello")])
}

#[test]
fn notices_follow_fallback_order() {
    let backend = ScriptedBackend::new().fail("m1").fail("m2").ok("m3", "answer");
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(models(&["m1", "m2", "m3"]));

    let mut notices = Vec::new();
    let invocation = gateway
        .invoke(&request(&plan), |failed, next| notices.push((failed.to_string(), next.to_string())))
        .unwrap();

    assert_eq!(
        notices,
        vec![("m1".to_string(), "m2".to_string()), ("m2".to_string(), "m3".to_string())]
    );
    assert_eq!(invocation.text, "answer");
    assert_eq!(invocation.final_model, "m3");
    assert_eq!(invocation.failed, models(&["m1", "m2"]));
    assert!(invocation.fell_back());
}

#[test]
fn start_model_mid_list_never_goes_back() {
    let backend = ScriptedBackend::new().ok("a", "from a").fail("b").fail("c");
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(models(&["a", "b", "c"])).starting_at("b");

    let err = gateway.invoke_quiet(&request(&plan)).unwrap_err();
    assert_eq!(backend.models_called(), models(&["b", "c"]));
    match err {
        GatewayError::AllModelsExhausted { tried, .. } => assert_eq!(tried, models(&["b", "c"])),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unlisted_start_model_falls_back_to_list() {
    let backend = ScriptedBackend::new().fail("custom").ok("a", "ok");
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(models(&["a", "b"])).starting_at("custom");

    let invocation = gateway.invoke_quiet(&request(&plan)).unwrap();
    assert_eq!(invocation.final_model, "a");
    assert_eq!(backend.models_called(), models(&["custom", "a"]));
}

#[test]
fn empty_plan_is_an_error() {
    let backend = ScriptedBackend::new();
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(Vec::new());
    assert_eq!(gateway.invoke_quiet(&request(&plan)), Err(GatewayError::NoModels));
    assert!(backend.models_called().is_empty());
}

#[test]
fn config_and_tools_are_identical_across_attempts() {
    let backend = ScriptedBackend::new().fail("m1").ok("m2", "[]");
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(models(&["m1", "m2"])).with_temperature(0.7);
    let req = request(&plan).system("instructions").tool(Tool::GoogleSearch);

    gateway.invoke_quiet(&req).unwrap();

    let requests = backend.requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].config, requests[1].config);
    assert_eq!(requests[0].tools, vec![Tool::GoogleSearch]);
    assert_eq!(requests[0].tools, requests[1].tools);
    assert_eq!(requests[0].contents, requests[1].contents);
    assert_eq!(requests[1].system_instruction.as_deref(), Some("instructions"));
    assert_eq!(requests[1].config.temperature, Some(0.7));
}

proptest! {
    #![proptest_config(config_128())]

    /// With every model failing, exactly N distinct attempts are made.
    #[test]
    fn exhaustion_after_exactly_n_attempts(n in 1usize..12) {
        let names: Vec<String> = (0..n).map(|i| format!("model-{}", i)).collect();
        let backend = ScriptedBackend::new();
        let gateway = Gateway::new(&backend);
        let plan = ModelPlan::new(names.clone());

        let mut retries = 0;
        let err = gateway.invoke(&request(&plan), |_, _| retries += 1).unwrap_err();

        let called = backend.models_called();
        prop_assert_eq!(called.len(), n);
        let distinct: HashSet<&String> = called.iter().collect();
        prop_assert_eq!(distinct.len(), n);
        prop_assert_eq!(retries, n - 1);
        let exhausted = matches!(err, GatewayError::AllModelsExhausted { ref tried, .. } if *tried == names);
        prop_assert!(exhausted);
    }

    /// Attempted positions strictly increase, whatever fails and wherever we start.
    #[test]
    fn selection_is_forward_only(
        outcomes in prop::collection::vec(any::<bool>(), 1..10),
        start in 0usize..10,
    ) {
        let names: Vec<String> = (0..outcomes.len()).map(|i| format!("m{}", i)).collect();
        let start = start % names.len();
        let mut backend = ScriptedBackend::new();
        for (name, ok) in names.iter().zip(&outcomes) {
            backend = if *ok { backend.ok(name, "done") } else { backend.fail(name) };
        }
        let gateway = Gateway::new(&backend);
        let plan = ModelPlan::new(names.clone()).starting_at(names[start].clone());

        let result = gateway.invoke_quiet(&request(&plan));

        let positions: Vec<usize> = backend
            .models_called()
            .iter()
            .map(|m| names.iter().position(|n| n == m).unwrap())
            .collect();
        prop_assert_eq!(positions[0], start);
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

        match result {
            Ok(inv) => {
                let last = *positions.last().unwrap();
                prop_assert!(outcomes[last]);
                prop_assert_eq!(inv.final_model, names[last].clone());
                prop_assert!(positions[..positions.len() - 1].iter().all(|p| !outcomes[*p]));
            }
            Err(_) => prop_assert!(outcomes[start..].iter().all(|ok| !ok)),
        }
    }
}
