//! In-Memory Record Store Adapter
//!
//! Authoritative person dataset held in memory and seeded from a YAML or
//! JSON file. Lookups are exact matches, results ordered by id.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::domain::{Person, RecordStore};
use crate::error::{Error, Result};

/// In-memory record store
#[derive(Debug)]
pub struct InMemoryRecordStore {
    people: RwLock<BTreeMap<i64, Person>>,
    available: AtomicBool,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryRecordStore {
    /// Later records replace earlier ones with the same id.
    pub fn new(people: Vec<Person>) -> Self {
        Self {
            people: RwLock::new(people.into_iter().map(|p| (p.id, p)).collect()),
            available: AtomicBool::new(true),
        }
    }

    /// Parse a YAML (or JSON) list of people.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let people: Vec<Person> =
            serde_yaml::from_str(raw).map_err(|e| Error::SeedParse(e.to_string()))?;
        Ok(Self::new(people))
    }

    /// Load seed records from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let store = Self::from_yaml_str(&raw)
            .map_err(|e| Error::SeedParse(format!("{}: {}", path.display(), e)))?;
        info!("Loaded {} seed records from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn insert(&self, person: Person) -> Option<Person> {
        self.people.write().insert(person.id, person)
    }

    pub fn remove(&self, id: i64) -> Option<Person> {
        self.people.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.people.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.read().is_empty()
    }

    /// Simulate the database going down (`false`) or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::RecordStore("record store unavailable".to_string()))
        }
    }

    fn filter<F>(&self, predicate: F) -> Result<Vec<Person>>
    where
        F: Fn(&Person) -> bool,
    {
        self.check_available()?;
        Ok(self
            .people
            .read()
            .values()
            .filter(|p| predicate(p))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_all(&self) -> Result<Vec<Person>> {
        self.filter(|_| true)
    }

    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Person>> {
        Ok(self
            .filter(|p| p.national_id == national_id)?
            .into_iter()
            .next())
    }

    async fn find_by_city(&self, city: &str) -> Result<Vec<Person>> {
        self.filter(|p| p.city() == Some(city))
    }

    async fn find_by_state(&self, state: &str) -> Result<Vec<Person>> {
        self.filter(|p| p.state() == Some(state))
    }

    async fn find_by_country(&self, country: &str) -> Result<Vec<Person>> {
        self.filter(|p| p.country() == Some(country))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::Acquire))
    }
}
