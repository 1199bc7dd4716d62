//! End-to-end use of the public API

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use stratamodel::{
    CollectionOptions, Fallback, FieldRange, FieldSet, MemoryBackend, Model, ModelConfig, Pool,
    CONFIG_FILE_NAME,
};
use tempfile::TempDir;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Budget {
    limit: u64,
    currency: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Task {
    id: String,
    title: String,
    priority: u8,
    done: bool,
    estimate: Duration,
    owner: Option<String>,
    budget: Budget,
}

impl Model for Task {
    fn declare(fields: &mut FieldSet<Self>) {
        fields
            .scalar("Title", |t: &Self| &t.title, |t: &mut Self| &mut t.title)
            .index();
        fields
            .scalar("Priority", |t: &Self| &t.priority, |t: &mut Self| &mut t.priority)
            .index();
        fields
            .scalar("Done", |t: &Self| &t.done, |t: &mut Self| &mut t.done)
            .index();
        fields.scalar("Estimate", |t: &Self| &t.estimate, |t: &mut Self| &mut t.estimate);
        fields.optional("Owner", |t: &Self| &t.owner, |t: &mut Self| &mut t.owner);
        fields.aggregate("Budget", |t: &Self| &t.budget, |t: &mut Self| &mut t.budget);
    }

    fn model_id(&self) -> &str {
        &self.id
    }

    fn set_model_id(&mut self, id: String) {
        self.id = id;
    }
}

fn task(title: &str, priority: u8, done: bool) -> Task {
    Task {
        title: title.to_string(),
        priority,
        done,
        estimate: Duration::from_millis(1500),
        owner: None,
        budget: Budget {
            limit: 100,
            currency: "EUR".to_string(),
        },
        ..Task::default()
    }
}

#[test]
fn test_task_lifecycle() {
    let pool = Pool::in_memory();
    let tasks = pool.new_collection::<Task>().unwrap();

    let mut write = task("write docs", 2, false);
    let mut ship = task("ship release", 1, false);
    let mut fix = task("fix bug", 3, true);
    for t in [&mut write, &mut ship, &mut fix] {
        tasks.save(t).unwrap();
    }
    assert_eq!(tasks.count().unwrap(), 3);
    assert_eq!(tasks.find(&write.id).unwrap(), write);

    let urgent = tasks
        .find_in_range("Priority", &FieldRange::numeric(..=2.0))
        .unwrap();
    let titles: Vec<&str> = urgent.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["ship release", "write docs"]);

    ship.done = true;
    ship.owner = Some("ann".to_string());
    tasks.save_fields(&["Done", "Owner"], &mut ship).unwrap();
    let mut done = tasks
        .ids_in_range("Done", &FieldRange::boolean(true))
        .unwrap();
    done.sort();
    let mut expected = vec![ship.id.clone(), fix.id.clone()];
    expected.sort();
    assert_eq!(done, expected);

    assert!(tasks.delete(&fix.id).unwrap());
    assert_eq!(tasks.delete_all().unwrap(), 2);
    assert_eq!(tasks.count().unwrap(), 0);
}

#[test]
fn test_pool_from_config_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    ModelConfig::write_default_if_missing(&path).unwrap();
    let mut config = ModelConfig::from_file(&path).unwrap();
    config.collections.fallback = "json".to_string();
    config.collections.index = false;

    let options = config.collection_options().unwrap();
    let pool = Pool::new(Arc::new(MemoryBackend::new()), config.store.max_idle)
        .with_defaults(options);
    let tasks = pool.new_collection::<Task>().unwrap();
    assert_eq!(tasks.schema().fallback(), &Fallback::Json);
    assert!(!tasks.is_indexed());

    let mut t = task("json", 1, false);
    tasks.save(&mut t).unwrap();
    assert_eq!(tasks.find(&t.id).unwrap(), t);
    assert!(tasks.count().is_err());

    let renamed = pool
        .new_collection_with_options::<Task>(CollectionOptions::default().named("todo"))
        .unwrap_err();
    assert!(renamed.to_string().contains("Task"));
}
