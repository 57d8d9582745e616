//! Property tests: reconcile passes over randomly shaped questionnaires
//! and response trees.
//!
//! Hidden widgets are never reported invalid, group instances always come
//! out in `_sequence` order, a settled section stays settled and pruned
//! selections only ever keep offered choices.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use survey_engine::*;
use survey_types::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate a random scalar response.
fn arb_response() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        any::<i32>().prop_map(|n| Some(json!(n))),
        "[a-z]{0,6}".prop_map(|s| Some(json!(s))),
        any::<bool>().prop_map(|b| Some(json!(b))),
    ]
}

/// Generate a widget shape: visible, hidden fallback and default value.
fn arb_question() -> impl Strategy<Value = (bool, Option<Value>, Option<Value>)> {
    (
        any::<bool>(),
        prop::option::of("[a-z]{1,4}".prop_map(|s| json!(s))),
        prop::option::of(any::<u8>().prop_map(|n| json!(n))),
    )
}

fn question(visible: bool, fallback: Option<Value>, default: Option<Value>) -> QuestionWidget {
    let conditional = match fallback {
        Some(fallback) => Conditional::Fixed {
            visible,
            fallback: Some(fallback),
            custom_fallback: None,
        },
        None => Conditional::Literal(visible),
    };
    let mut widget = QuestionWidget::new("")
        .with_conditional(conditional)
        .with_validations(Validations::new(|_| Ok(vec![ValidationRule::new(true, "Always wrong")])));
    if let Some(default) = default {
        widget = widget.with_default_value(DefaultValue::Literal(default));
    }
    widget
}

fn build(
    shapes: &[(bool, Option<Value>, Option<Value>)],
    responses: &[Option<Value>],
) -> (WidgetRegistry, Vec<String>, ResponseTree) {
    let mut registry = WidgetRegistry::new();
    let mut tree = ResponseTree::new();
    let mut widgets = Vec::new();
    for (i, (visible, fallback, default)) in shapes.iter().enumerate() {
        let name = format!("q{}", i);
        let mut widget = question(*visible, fallback.clone(), default.clone());
        widget.path = name.clone();
        registry.register(name.as_str(), widget).unwrap();
        if let Some(Some(response)) = responses.get(i) {
            tree.set(&name, Some(response.clone()));
        }
        widgets.push(name);
    }
    (registry, widgets, tree)
}

fn pass(
    registry: &WidgetRegistry,
    widgets: &[String],
    tree: &mut ResponseTree,
    affected: &AffectedPaths,
    previous: &SectionStatus,
) -> PassOutcome {
    Reconciler::default()
        .reconcile(registry, PassInput::new(widgets, affected, previous), ValueDiff::new(), tree)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A hidden widget is always valid and carries no error message.
    #[test]
    fn hidden_widgets_are_never_invalid(
        shapes in prop::collection::vec(arb_question(), 1..8),
        responses in prop::collection::vec(arb_response(), 8),
        validate_all in any::<bool>(),
    ) {
        let (registry, widgets, mut tree) = build(&shapes, &responses);
        let affected = if validate_all { AffectedPaths::All } else { AffectedPaths::from_paths(widgets.clone()) };
        let outcome = pass(&registry, &widgets, &mut tree, &affected, &SectionStatus::new());

        for status in outcome.status.iter() {
            if !status.is_visible {
                prop_assert!(status.is_valid);
                prop_assert!(status.error_message.is_none());
            }
        }
    }

    /// Hidden widgets end up holding their fallback value.
    #[test]
    fn hidden_widgets_hold_their_fallback(
        shapes in prop::collection::vec(arb_question(), 1..8),
        responses in prop::collection::vec(arb_response(), 8),
    ) {
        let (registry, widgets, mut tree) = build(&shapes, &responses);
        pass(&registry, &widgets, &mut tree, &AffectedPaths::none(), &SectionStatus::new());

        for (name, (visible, fallback, _)) in widgets.iter().zip(&shapes) {
            if !visible {
                prop_assert!(values_equivalent(tree.response(name), fallback.as_ref()));
            }
        }
    }

    /// Once a section stops writing, another pass changes nothing.
    #[test]
    fn settled_section_is_stable(
        shapes in prop::collection::vec(arb_question(), 1..8),
        responses in prop::collection::vec(arb_response(), 8),
    ) {
        let (registry, widgets, mut tree) = build(&shapes, &responses);
        let none = AffectedPaths::none();
        let mut previous = SectionStatus::new();
        for _ in 0..ReconcilerConfig::default().max_rounds {
            let outcome = pass(&registry, &widgets, &mut tree, &none, &previous);
            previous = outcome.status;
            if !outcome.needs_another_round {
                break;
            }
        }

        let before = tree.clone();
        let next = pass(&registry, &widgets, &mut tree, &none, &previous);
        prop_assert!(!next.needs_another_round);
        prop_assert_eq!(&tree, &before);
        prop_assert_eq!(next.status, previous);
    }

    /// Group instances are visited in ascending `_sequence` order.
    #[test]
    fn group_instances_follow_sequence(
        sequences in prop::collection::hash_set(0i64..1000, 1..12),
    ) {
        let mut persons = Map::new();
        for (i, sequence) in sequences.iter().enumerate() {
            let id = format!("p{}", i);
            persons.insert(id.clone(), json!({ "_uuid": id, "_sequence": sequence }));
        }
        let mut tree = ResponseTree::from_value(json!({ "persons": persons }));

        let mut registry = WidgetRegistry::new();
        registry.register("persons", GroupWidget::new("persons", ["age"])).unwrap();
        registry.register("age", QuestionWidget::new("age")).unwrap();
        let widgets = vec!["persons".to_string()];
        let outcome = pass(&registry, &widgets, &mut tree, &AffectedPaths::none(), &SectionStatus::new());

        let visited: Vec<i64> = outcome
            .status
            .group_instances("persons")
            .iter()
            .map(|instance| {
                tree.get(&format!("persons.{}._sequence", instance.grouped_object_id))
                    .and_then(Value::as_i64)
                    .unwrap()
            })
            .collect();
        let mut expected: Vec<i64> = sequences.into_iter().collect();
        expected.sort();
        prop_assert_eq!(visited, expected);
    }

    /// Pruning keeps visible selections in order, swaps hidden ones for
    /// their substitute and never duplicates a value.
    #[test]
    fn pruned_selection_keeps_only_offered_choices(
        hidden in prop::collection::vec(any::<bool>(), 6),
        substitutes in prop::collection::vec(prop::option::of(0usize..6), 6),
        selected in prop::collection::btree_set(0usize..6, 1..6),
    ) {
        let choices: Vec<Choice> = (0..6)
            .map(|i| {
                let choice = Choice::new(format!("c{}", i));
                if hidden[i] {
                    let substitute = substitutes[i].map_or(Value::Null, |s| json!(format!("c{}", s)));
                    choice.with_conditional(Conditional::Fixed {
                        visible: false,
                        fallback: Some(substitute),
                        custom_fallback: None,
                    })
                } else {
                    choice
                }
            })
            .collect();
        let current = Value::Array(selected.iter().map(|i| json!(format!("c{}", i))).collect());

        let tree = ResponseTree::new();
        let check = ChoiceVisibilityEvaluator::default().evaluate(
            Some(&current),
            &Choices::of(choices),
            &EvalScope::new(&tree, "modes"),
        );

        let any_hidden = selected.iter().any(|i| hidden[*i]);
        prop_assert_eq!(check.all_visible, !any_hidden);
        let Some(Value::Array(result)) = check.adjusted else {
            return Err(TestCaseError::fail("pruned selection must stay a sequence"));
        };

        let kept: Vec<Value> = selected
            .iter()
            .filter(|i| !hidden[**i])
            .map(|i| json!(format!("c{}", i)))
            .collect();
        let in_result: Vec<Value> = result.iter().filter(|v| kept.contains(v)).cloned().collect();
        prop_assert_eq!(in_result, kept);

        for (i, value) in result.iter().enumerate() {
            prop_assert!(!result[..i].contains(value));
            prop_assert!(!value.is_null());
        }
    }
}
