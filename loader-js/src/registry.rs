use crate::record::ModuleId;
use crate::record::ModuleRecord;
use ahash::HashMap;
use url::Url;

/// Arena of module records.
///
/// Records are never removed from the arena, so a [`ModuleId`] stays valid for the registry's
/// lifetime. Deleting a module only detaches its URL from the index; dependents that linked
/// against the old record keep using it.
#[derive(Default)]
pub(crate) struct Registry {
  records: Vec<ModuleRecord>,
  ids: HashMap<Url, ModuleId>,
}

impl Registry {
  pub fn lookup(&self, url: &Url) -> Option<ModuleId> {
    self.ids.get(url).copied()
  }

  /// Adds `record` and makes it the one registered under its URL.
  pub fn insert(&mut self, record: ModuleRecord) -> ModuleId {
    let id = ModuleId::from_index(self.records.len());
    self.ids.insert(record.url.clone(), id);
    self.records.push(record);
    id
  }

  pub fn detach(&mut self, url: &Url) -> Option<ModuleId> {
    self.ids.remove(url)
  }

  pub fn record(&self, id: ModuleId) -> &ModuleRecord {
    &self.records[id.index()]
  }

  pub fn record_mut(&mut self, id: ModuleId) -> &mut ModuleRecord {
    &mut self.records[id.index()]
  }

  pub fn lookup_record(&self, url: &Url) -> Option<&ModuleRecord> {
    self.lookup(url).map(|id| self.record(id))
  }

  /// Registered records in creation order.
  pub fn registered(&self) -> impl Iterator<Item = &ModuleRecord> + '_ {
    let mut ids: Vec<ModuleId> = self.ids.values().copied().collect();
    ids.sort_by_key(|id| id.index());
    ids.into_iter().map(|id| self.record(id))
  }
}
