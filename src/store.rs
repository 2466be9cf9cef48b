//! Store traits and implementations for contacts, templates and campaigns.
//!
//! Stores hand out owned clones taken under a lock, so a status poller always
//! sees one consistent campaign record.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::campaign::{Campaign, CampaignId};
use crate::contact::Contact;
use crate::error::{CampaignError, ContactError};
use crate::template::Template;

/// Read access to contact lists.
pub trait ContactStore: Send + Sync {
    /// Contacts of a list in list order; unknown lists are empty.
    fn get_contacts(&self, list_id: &str) -> Result<Vec<Contact>, CampaignError>;
}

/// Read access to templates.
pub trait TemplateStore: Send + Sync {
    fn get_template(&self, template_id: &str) -> Result<Option<Template>, CampaignError>;
}

/// Persistence for campaign records.
pub trait CampaignStore: Send + Sync {
    /// Store a new campaign.
    fn insert(&self, campaign: &Campaign) -> Result<(), CampaignError>;

    /// Get a campaign by ID.
    fn get(&self, id: &CampaignId) -> Result<Option<Campaign>, CampaignError>;

    /// Overwrite an existing campaign with a newer snapshot.
    fn save(&self, campaign: &Campaign) -> Result<(), CampaignError>;

    /// All campaigns, newest first.
    fn list(&self) -> Result<Vec<Campaign>, CampaignError>;
}

#[derive(Debug, Default)]
struct CampaignTable {
    by_id: HashMap<CampaignId, Campaign>,
    /// Insertion order of campaign IDs.
    order: Vec<CampaignId>,
}

/// Thread-safe in-memory store for contacts, templates and campaigns.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: RwLock<HashMap<String, Vec<Contact>>>,
    templates: RwLock<HashMap<String, Template>>,
    campaigns: RwLock<CampaignTable>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create an empty list; existing lists are left untouched.
    pub fn create_list(&self, list_id: impl Into<String>) {
        self.lists.write().entry(list_id.into()).or_default();
    }

    /// Add a contact to a list, replacing one with the same email.
    pub fn add_contact(&self, list_id: &str, contact: Contact) -> Result<(), ContactError> {
        if !contact.is_valid() {
            return Err(ContactError::InvalidEmail(contact.email));
        }
        let mut lists = self.lists.write();
        let list = lists
            .get_mut(list_id)
            .ok_or_else(|| ContactError::ListNotFound(list_id.to_string()))?;
        match list
            .iter_mut()
            .find(|c| c.email.eq_ignore_ascii_case(&contact.email))
        {
            Some(existing) => *existing = contact,
            None => list.push(contact),
        }
        Ok(())
    }

    /// Add many contacts; returns how many were accepted.
    pub fn add_contacts(
        &self,
        list_id: &str,
        contacts: impl IntoIterator<Item = Contact>,
    ) -> Result<usize, ContactError> {
        let mut added = 0;
        for contact in contacts {
            match self.add_contact(list_id, contact) {
                Ok(()) => added += 1,
                Err(ContactError::InvalidEmail(email)) => {
                    tracing::warn!(email = %email, list_id, "Skipping invalid contact");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    /// Remove a contact by email.
    pub fn remove_contact(&self, list_id: &str, email: &str) -> bool {
        let mut lists = self.lists.write();
        let Some(list) = lists.get_mut(list_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|c| !c.email.eq_ignore_ascii_case(email));
        list.len() != before
    }

    /// Insert or replace a template.
    pub fn put_template(&self, template_id: impl Into<String>, template: Template) {
        self.templates.write().insert(template_id.into(), template);
    }
}

impl ContactStore for MemoryStore {
    fn get_contacts(&self, list_id: &str) -> Result<Vec<Contact>, CampaignError> {
        Ok(self.lists.read().get(list_id).cloned().unwrap_or_default())
    }
}

impl TemplateStore for MemoryStore {
    fn get_template(&self, template_id: &str) -> Result<Option<Template>, CampaignError> {
        Ok(self.templates.read().get(template_id).cloned())
    }
}

impl CampaignStore for MemoryStore {
    fn insert(&self, campaign: &Campaign) -> Result<(), CampaignError> {
        let mut table = self.campaigns.write();
        if table.by_id.insert(campaign.id, campaign.clone()).is_none() {
            table.order.push(campaign.id);
        }
        Ok(())
    }

    fn get(&self, id: &CampaignId) -> Result<Option<Campaign>, CampaignError> {
        Ok(self.campaigns.read().by_id.get(id).cloned())
    }

    fn save(&self, campaign: &Campaign) -> Result<(), CampaignError> {
        let mut table = self.campaigns.write();
        match table.by_id.get_mut(&campaign.id) {
            Some(existing) => {
                *existing = campaign.clone();
                Ok(())
            }
            None => Err(CampaignError::NotFound(campaign.id)),
        }
    }

    fn list(&self) -> Result<Vec<Campaign>, CampaignError> {
        let table = self.campaigns.read();
        Ok(table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.by_id.get(id).cloned())
            .collect())
    }
}

/// Campaign store keeping one JSON file per campaign in a directory.
///
/// Writes go to a temporary file that is renamed into place, so a crash never
/// leaves a half-written record behind.
#[derive(Debug)]
pub struct FileCampaignStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCampaignStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CampaignError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, id: &CampaignId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn write(&self, campaign: &Campaign) -> Result<(), CampaignError> {
        let path = self.path_for(&campaign.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(campaign)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read(path: &Path) -> Result<Campaign, CampaignError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl CampaignStore for FileCampaignStore {
    fn insert(&self, campaign: &Campaign) -> Result<(), CampaignError> {
        let _guard = self.write_lock.lock();
        self.write(campaign)
    }

    fn get(&self, id: &CampaignId) -> Result<Option<Campaign>, CampaignError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn save(&self, campaign: &Campaign) -> Result<(), CampaignError> {
        let _guard = self.write_lock.lock();
        if !self.path_for(&campaign.id).exists() {
            return Err(CampaignError::NotFound(campaign.id));
        }
        self.write(campaign)
    }

    fn list(&self) -> Result<Vec<Campaign>, CampaignError> {
        let mut campaigns = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                campaigns.push(Self::read(&path)?);
            }
        }
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(campaigns)
    }
}

impl<T: ContactStore + ?Sized> ContactStore for Arc<T> {
    fn get_contacts(&self, list_id: &str) -> Result<Vec<Contact>, CampaignError> {
        (**self).get_contacts(list_id)
    }
}

impl<T: TemplateStore + ?Sized> TemplateStore for Arc<T> {
    fn get_template(&self, template_id: &str) -> Result<Option<Template>, CampaignError> {
        (**self).get_template(template_id)
    }
}

impl<T: CampaignStore + ?Sized> CampaignStore for Arc<T> {
    fn insert(&self, campaign: &Campaign) -> Result<(), CampaignError> {
        (**self).insert(campaign)
    }

    fn get(&self, id: &CampaignId) -> Result<Option<Campaign>, CampaignError> {
        (**self).get(id)
    }

    fn save(&self, campaign: &Campaign) -> Result<(), CampaignError> {
        (**self).save(campaign)
    }

    fn list(&self) -> Result<Vec<Campaign>, CampaignError> {
        (**self).list()
    }
}
