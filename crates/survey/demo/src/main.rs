#![deny(unsafe_code)]
//! Survey demo binary walking one respondent through a household
//! questionnaire.
//!
//! Runs a self-contained demonstration of:
//! 1. Default injection on the first visit of a section
//! 2. Conditional widgets revealed and reset as answers change
//! 3. Validation gated on what the respondent touched
//! 4. Repeatable person groups with pruned choices
//!
//! Set `RUST_LOG=survey_engine=debug` to follow every engine write.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use survey_engine::{InterviewSession, ReconcilerConfig, SectionEdit, SectionUpdate, WidgetRegistry};
use survey_types::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── Formatting Helpers ──────────────────────────────────────────────────

fn section(title: &str) {
    println!();
    println!(" ┌{}┐", "─".repeat(60));
    println!(" │  {:<58}│", title);
    println!(" └{}┘", "─".repeat(60));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn warn(msg: &str) {
    println!("   [!!]  {}", msg);
}

fn print_update(label: &str, update: &SectionUpdate) {
    ok(&format!(
        "{}  rounds={}  writes={}  valid={}",
        label,
        update.rounds,
        update.value_diff.len(),
        update.all_widgets_valid
    ));
    for (path, value) in update.value_diff.iter() {
        match value {
            Some(value) => info(&format!("  {} = {}", path, value)),
            None => info(&format!("  {} unset", path)),
        }
    }
}

// ── Translations ────────────────────────────────────────────────────────

struct DemoCatalog;

impl Translator for DemoCatalog {
    fn translate(&self, key: &str, params: &BTreeMap<String, String>, language: &str) -> Option<String> {
        let max = params.get("max").map(String::as_str).unwrap_or("?");
        match (key, language) {
            ("errors.tooMany", "fr") => Some(format!("Au plus {} véhicules", max)),
            ("errors.tooMany", _) => Some(format!("At most {} vehicles", max)),
            _ => None,
        }
    }
}

// ── Questionnaire ───────────────────────────────────────────────────────

fn age_of(scope: &EvalScope<'_>) -> i64 {
    let (person, _) = scope.path.rsplit_once('.').unwrap_or(("", ""));
    scope
        .tree
        .response(&join_path(person, "age"))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn questionnaire() -> anyhow::Result<WidgetRegistry> {
    let mut registry = WidgetRegistry::new();

    registry.register("intro", WidgetDefinition::Text(InfoWidget::new()))?;
    registry.register(
        "hasCar",
        QuestionWidget::new("home.hasCar")
            .with_input_type(InputType::Radio)
            .with_choices(Choices::of([Choice::new("yes"), Choice::new("no")]))
            .with_default_value(DefaultValue::Literal(json!("no"))),
    )?;
    registry.register(
        "carCount",
        QuestionWidget::new("home.carCount")
            .with_input_type(InputType::Number)
            .with_datatype(Datatype::Integer)
            .with_conditional(Conditional::computed(|scope| {
                let has_car = scope.tree.response("home.hasCar") == Some(&json!("yes"));
                Ok(json!([has_car, 0]))
            }))
            .with_validations(Validations::new(|scope| {
                let count = scope.value.and_then(Value::as_i64);
                Ok(vec![
                    ValidationRule::new(count.is_none(), "How many vehicles?"),
                    ValidationRule::new(
                        count.map_or(false, |c| c > 20),
                        LocalizedText::key("errors.tooMany").with_param("max", "20"),
                    ),
                ])
            })),
    )?;
    registry.register(
        "nextHome",
        WidgetDefinition::Button(InfoWidget::new().with_conditional(Conditional::computed(|scope| {
            Ok(json!(scope.tree.response("home.hasCar").is_some()))
        }))),
    )?;
    registry.register_section("home", ["intro", "hasCar", "carCount", "nextHome"]);

    registry.register("persons", GroupWidget::new("household.persons", ["age", "occupation", "license"]))?;
    registry.register(
        "age",
        QuestionWidget::new("age")
            .with_input_type(InputType::Number)
            .with_datatype(Datatype::Integer)
            .with_validations(Validations::new(|scope| {
                Ok(vec![ValidationRule::new(
                    is_blank(scope.value),
                    LocalizedText::ByLanguage(BTreeMap::from([
                        ("en".to_string(), "Age is required".to_string()),
                        ("fr".to_string(), "L'âge est requis".to_string()),
                    ])),
                )])
            })),
    )?;
    registry.register(
        "occupation",
        QuestionWidget::new("occupation")
            .with_input_type(InputType::Checkbox)
            .with_custom_path("occupationOther")
            .with_custom_choice("other")
            .with_choices(Choices::of([
                Choice::new("student"),
                Choice::new("worker").with_conditional(Conditional::computed(|scope| {
                    let person = scope.path.trim_end_matches(".occupation");
                    let age = scope.tree.response(&join_path(person, "age")).and_then(Value::as_i64);
                    Ok(json!([age.map_or(true, |a| a >= 15), "student"]))
                })),
                Choice::new("other"),
            ])),
    )?;
    registry.register(
        "license",
        QuestionWidget::new("drivingLicense")
            .with_conditional(Conditional::computed(|scope| Ok(json!([age_of(scope) >= 16, "no"]))))
            .use_assigned_value_on_hide(),
    )?;
    registry.register_section("household", ["persons"]);

    registry.validate()?;
    Ok(registry)
}

fn person(sequence: i64, age: Option<i64>) -> (String, Value) {
    let id = Uuid::new_v4().to_string();
    let mut data = json!({ "_uuid": id, "_sequence": sequence });
    if let Some(age) = age {
        data["age"] = json!(age);
    }
    (id, data)
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if let Err(e) = run_demo() {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {:#}", e);
        std::process::exit(1);
    }

    println!();
    println!("  Demo complete.");
    println!();
}

fn run_demo() -> anyhow::Result<()> {
    let registry = Arc::new(questionnaire()?);
    let user = InterviewUser::new("respondent-1").with_language("fr");
    let language = user.language.clone().unwrap_or_else(|| "en".to_string());
    tracing::info!(respondent = ?user.id, language = %language, "Starting interview");
    let mut session = InterviewSession::new(registry, ReconcilerConfig::default(), ResponseTree::new())?
        .with_user(user);

    // ── Phase A: Home ───────────────────────────────────────────────
    section("Phase A: Home section");

    let update = session.update_section("home", SectionEdit::new())?;
    print_update("First visit", &update);

    let update = session.update_section("home", SectionEdit::set("home.hasCar", json!("yes")))?;
    print_update("Respondent owns a car", &update);

    let update = session.update_section("home", SectionEdit::set("home.carCount", json!("25")))?;
    print_update("Respondent typed 25 vehicles", &update);
    if let Some(status) = session.status("home").and_then(|s| s.widget("carCount")) {
        if let Some(message) = &status.error_message {
            warn(&format!("carCount: {}", message.resolve(&language, &DemoCatalog)));
        }
    }

    let update = session.update_section("home", SectionEdit::set("home.hasCar", json!("no")))?;
    print_update("Respondent sold the car", &update);

    // ── Phase B: Household ──────────────────────────────────────────
    section("Phase B: Household members");

    let members = [person(2, Some(12)), person(1, Some(41)), person(3, None)];
    let child = members[0].0.clone();
    let persons: serde_json::Map<String, Value> = members.into_iter().collect();
    let update = session.update_section("household", SectionEdit::set("household.persons", Value::Object(persons)))?;
    print_update("Three persons added", &update);

    let occupation = format!("household.persons.{}.occupation", child);
    let update = session.update_section(
        "household",
        SectionEdit::set(occupation.as_str(), json!(["worker", "other"])),
    )?;
    print_update("Child marked as worker", &update);

    let update = session.update_section("household", SectionEdit::submit())?;
    print_update("Household submitted", &update);
    if let Some(status) = session.status("household") {
        for instance in status.group_instances("persons") {
            if let Some(age) = instance.widgets.get("age") {
                if !age.is_valid {
                    let message = age
                        .error_message
                        .as_ref()
                        .map(|m| m.resolve(&language, &DemoCatalog))
                        .unwrap_or_default();
                    warn(&format!("{}: {}", age.path, message));
                }
            }
        }
        println!();
        println!("{}", serde_json::to_string_pretty(status)?);
    }

    section("Final responses");
    println!("{}", serde_json::to_string_pretty(session.tree())?);
    Ok(())
}
