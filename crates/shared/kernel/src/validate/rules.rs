//! Device rules that span several fields, plus the normalization they imply.

use super::issue::Issue;
use pinrig_domain::{ConfigValue, Section, Settings};
use std::collections::BTreeMap;

pub(crate) const CONFIRM_EJECT_TYPES: [&str; 5] = ["target", "switch", "event", "count", "fake"];
const SWITCH_TYPES: [&str; 2] = ["NO", "NC"];

/// Normalizes defaults that depend on other fields and reports rule violations.
pub(super) fn apply(sections: &mut BTreeMap<String, Section>) -> Vec<Issue> {
    let mut issues = Vec::new();

    if let Some(Section::Collection(devices)) = sections.get_mut("ball_devices") {
        for (name, settings) in devices.iter_mut() {
            ball_device(&format!("ball_devices.{name}"), settings, &mut issues);
        }
    }

    if let Some(Section::Collection(switches)) = sections.get_mut("switches") {
        for (name, settings) in switches.iter_mut() {
            if let Some(ConfigValue::Str(kind)) = settings.get_mut("type") {
                *kind = kind.to_uppercase();
                if !SWITCH_TYPES.contains(&kind.as_str()) {
                    issues.push(Issue::rule(format!("switches.{name}.type"), "must be NO or NC"));
                }
            }
        }
    }

    for collection in ["switches", "coils"] {
        if let Some(Section::Collection(entries)) = sections.get(collection) {
            unique_numbers(collection, entries, &mut issues);
        }
    }

    issues
}

fn ball_device(path: &str, settings: &mut Settings, issues: &mut Vec<Issue>) {
    let confirm = settings.str("confirm_eject_type").unwrap_or("target").to_owned();
    if !CONFIRM_EJECT_TYPES.contains(&confirm.as_str()) {
        issues.push(Issue::rule(
            format!("{path}.confirm_eject_type"),
            format!("'{confirm}' is not one of {}", CONFIRM_EJECT_TYPES.join(", ")),
        ));
    }
    if confirm == "switch" && settings.str("confirm_eject_switch").is_none() {
        issues.push(Issue::rule(
            format!("{path}.confirm_eject_switch"),
            "required when confirm_eject_type is switch",
        ));
    }
    if confirm == "event" && settings.str("confirm_eject_event").is_none() {
        issues.push(Issue::rule(
            format!("{path}.confirm_eject_event"),
            "required when confirm_eject_type is event",
        ));
    }

    if settings.get("ball_capacity").is_none_or(ConfigValue::is_null) {
        let switches = settings.list("ball_switches").len();
        settings.insert("ball_capacity", ConfigValue::Int(i64::try_from(switches).unwrap_or(i64::MAX)));
    }

    let targets = settings.list("eject_targets").len();
    if let Some(ConfigValue::List(timeouts)) = settings.get_mut("eject_timeouts") {
        if timeouts.len() > targets {
            issues.push(Issue::rule(
                format!("{path}.eject_timeouts"),
                format!("{} timeouts for {targets} eject targets", timeouts.len()),
            ));
        } else {
            timeouts.resize(targets, ConfigValue::Ms(0));
        }
    }

    if settings.int("balls_per_eject").is_some_and(|n| n < 1) {
        issues.push(Issue::rule(format!("{path}.balls_per_eject"), "must be at least 1"));
    }
}

fn unique_numbers(collection: &str, entries: &BTreeMap<String, Settings>, issues: &mut Vec<Issue>) {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (name, settings) in entries {
        let Some(number) = settings.str("number") else { continue };
        if let Some(first) = seen.get(number) {
            issues.push(Issue::rule(
                format!("{collection}.{name}.number"),
                format!("number {number} is already used by {collection}.{first}"),
            ));
        } else {
            seen.insert(number, name);
        }
    }
}
