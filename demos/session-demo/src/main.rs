//! Stateline Interactive Session Demo
//!
//! Walks through a full analyst session: named data modifiers and
//! business-logic steps invoked through the funnel, checkpoint-triggered
//! analyses (sequential and parallel), file-backed persistence hooks,
//! and rollback to earlier versions.
//!
//! Snapshots are written as JSON files under the system temp directory;
//! the stored save token is the file path.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use stateline_core::{
    AnalysisAttrs, HistoryView, LogicAttrs, Model, ModifierAttrs, Version, VersionKey,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("=== Stateline interactive session demo ===");
    println!();

    let snapshot_dir = std::env::temp_dir().join("stateline-session-demo");
    fs::create_dir_all(&snapshot_dir)?;
    println!("snapshots -> {}", snapshot_dir.display());
    println!();

    let mut model = build_model(&snapshot_dir)?;
    register_functions(&mut model)?;

    run_session(&mut model)?;
    replay_history(&mut model)?;

    model.wait_for_analyses();
    println!("session complete");
    Ok(())
}

/// Working data for the session: a mapping of named datasets.
fn initial_data() -> Value {
    json!({
        "prices": [10.0, 12.5, 11.0, 55.0, 10.5],
        "volumes": [100.0, 120.0, 90.0, 3.0, 110.0],
    })
}

/// A model with file-backed snapshot hooks: save writes the working
/// data as a JSON file and returns the path as the token; restore reads
/// the token back out of the version and loads the file.
fn build_model(snapshot_dir: &Path) -> anyhow::Result<Model<Value>> {
    let save_dir = snapshot_dir.to_path_buf();
    let model = Model::builder(initial_data())
        .on_checkpoint_save(move |data: &Value, key: &VersionKey, _: &HistoryView<Value>| {
            let path = save_dir.join(format!("snapshot-{}-{}.json", key.step, key.name));
            fs::write(&path, serde_json::to_vec_pretty(data)?)?;
            Ok(path.display().to_string())
        })
        .on_checkpoint_restore(|key: &VersionKey, history: &HistoryView<Value>| {
            let token = history
                .get(key)
                .and_then(Version::save_token)
                .ok_or_else(|| anyhow::anyhow!("no snapshot recorded for {key}"))?;
            let bytes = fs::read(token)?;
            Ok(serde_json::from_slice(&bytes)?)
        })
        .build()?;
    Ok(model)
}

fn register_functions(model: &mut Model<Value>) -> anyhow::Result<()> {
    // Modifiers: pure transitions on a named dataset.
    model.register_data_modifier(
        "scale",
        ModifierAttrs { checkpointed: true },
        |mut data, params| {
            let dataset = params
                .get("dataset")
                .and_then(Value::as_str)
                .unwrap_or("prices")
                .to_string();
            let factor = params.get("factor").and_then(Value::as_f64).unwrap_or(1.0);
            let scaled: Vec<Value> = values_of(&data, &dataset)
                .into_iter()
                .map(|v| json!(v * factor))
                .collect();
            data[dataset] = scaled.into();
            Ok(data)
        },
    )?;

    model.register_data_modifier(
        "drop_outliers",
        ModifierAttrs { checkpointed: true },
        |mut data, params| {
            let dataset = params
                .get("dataset")
                .and_then(Value::as_str)
                .unwrap_or("prices")
                .to_string();
            let cutoff = params.get("cutoff").and_then(Value::as_f64).unwrap_or(f64::MAX);
            let kept: Vec<Value> = values_of(&data, &dataset)
                .into_iter()
                .filter(|v| *v <= cutoff)
                .map(|v| json!(v))
                .collect();
            data[dataset] = kept.into();
            Ok(data)
        },
    )?;

    // Business logic: cleans prices, then rescales only if they are
    // still cheap. Unique: re-dispatching is a recorded no-op.
    model.register_business_logic(
        "prepare_prices",
        LogicAttrs {
            checkpointed: false,
            unique: true,
        },
        |data, scope, _| {
            let prices = values_of(&data, "prices");
            let max = prices.iter().cloned().fold(f64::MIN, f64::max);
            if max > 50.0 {
                scope.commit("drop_outliers", json!({ "dataset": "prices", "cutoff": 50.0 }))?;
            }
            if mean(&values_of(&scope.current_data(), "prices")) < 20.0 {
                scope.commit("scale", json!({ "dataset": "prices", "factor": 2.0 }))?;
            }
            Ok(())
        },
    )?;

    // Sequential analysis: cheap summary printed on every checkpoint.
    model.register_analysis(
        "price-summary",
        AnalysisAttrs::default(),
        |data, history| {
            let prices = values_of(&data, "prices");
            println!(
                "  [analysis] version {}: {} prices, mean {:.2}",
                history.last().map(Version::step).unwrap_or(0),
                prices.len(),
                mean(&prices),
            );
            Ok(())
        },
    )?;

    // Parallel analysis: slower scan that must not block the session.
    model.register_analysis(
        "volume-scan",
        AnalysisAttrs {
            parallelizable: true,
        },
        |data, _| {
            std::thread::sleep(std::time::Duration::from_millis(25));
            let volumes = values_of(&data, "volumes");
            tracing::info!(
                count = volumes.len(),
                mean = format!("{:.2}", mean(&volumes)).as_str(),
                "volume scan finished"
            );
            Ok(())
        },
    )?;

    Ok(())
}

fn run_session(model: &mut Model<Value>) -> anyhow::Result<()> {
    println!("-- mutating through the funnel --");

    model.commit("scale", json!({ "dataset": "volumes", "factor": 1.5 }))?;
    println!("committed scale(volumes, 1.5)");

    let outcome = model.dispatch("prepare_prices", Value::Null)?;
    println!("dispatched prepare_prices: {outcome:?}");

    // Unique step: the second dispatch is skipped, not re-run.
    let outcome = model.dispatch("prepare_prices", Value::Null)?;
    println!("dispatched prepare_prices again: {outcome:?}");
    println!();

    println!("-- recorded history --");
    for version in &model.history() {
        println!(
            "  step {} <- {} ({})",
            version.step(),
            version.name(),
            version.save_token().unwrap_or("in-memory"),
        );
    }
    println!();
    Ok(())
}

fn replay_history(model: &mut Model<Value>) -> anyhow::Result<()> {
    println!("-- rollback and revert --");
    println!(
        "current mean price: {:.2}",
        mean(&values_of(&model.current_data(), "prices"))
    );

    let key = model.rollback(1)?;
    println!(
        "rollback(1) -> {key}; mean price {:.2}",
        mean(&values_of(&model.current_data(), "prices"))
    );

    let first = model
        .history()
        .keys()
        .next()
        .cloned()
        .expect("at least one version");
    model.revert_to_version(&first)?;
    println!(
        "revert_to_version({first}) -> mean price {:.2}",
        mean(&values_of(&model.current_data(), "prices"))
    );

    // Rollback moved data only; the full history is still there.
    println!("history still holds {} versions", model.history().len());
    println!();
    Ok(())
}

fn values_of(data: &Value, dataset: &str) -> Vec<f64> {
    data[dataset]
        .as_array()
        .map(|values| values.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
