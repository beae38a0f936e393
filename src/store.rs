//! Persistence seam: the pipeline reads snapshots and writes merges through
//! [`ArticleStore`]. [`MemoryStore`] keeps everything in memory and can be
//! saved to / loaded from a JSON snapshot file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::analyze::rules::{Rule, RuleId};
use crate::article::{Article, ArticleFeatures, ArticleId, ArticleState, ClusterLabel, UserId};
use crate::error::StoreError;
use crate::ingest::RawArticle;
use crate::preferences::UserPreference;

/// Every call is scoped to one user; articles of other users are invisible.
pub trait ArticleStore: Send + Sync {
    /// Stores a normalized record. Links are unique per user.
    fn insert_article(&self, user: UserId, raw: RawArticle) -> Result<Article, StoreError>;

    fn article(&self, user: UserId, id: ArticleId) -> Result<Article, StoreError>;

    /// All of the user's articles in insertion order.
    fn articles_for_user(&self, user: UserId) -> Result<Vec<Article>, StoreError>;

    /// Replaces every enrichment field in one write.
    fn save_features(
        &self,
        user: UserId,
        id: ArticleId,
        features: ArticleFeatures,
    ) -> Result<(), StoreError>;

    fn save_state(&self, user: UserId, id: ArticleId, state: &ArticleState) -> Result<(), StoreError>;

    /// Caller validates the range.
    fn save_rating(&self, user: UserId, id: ArticleId, rating: f32) -> Result<(), StoreError>;

    /// Full recompute: listed articles get their label, the rest of the user's
    /// articles are left alone.
    fn save_clusters(
        &self,
        user: UserId,
        assignments: &[(ArticleId, ClusterLabel)],
    ) -> Result<(), StoreError>;

    fn preferences(&self, user: UserId) -> Result<Option<UserPreference>, StoreError>;

    fn save_preferences(&self, prefs: UserPreference) -> Result<(), StoreError>;

    fn rules_for_user(&self, user: UserId) -> Result<Vec<Rule>, StoreError>;

    /// Inserts or replaces by id; ids `<= 0` get a fresh one.
    fn put_rule(&self, rule: Rule) -> Result<Rule, StoreError>;

    fn delete_rule(&self, user: UserId, id: RuleId) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    next_article_id: ArticleId,
    #[serde(default)]
    next_rule_id: RuleId,
    #[serde(default)]
    articles: Vec<Article>,
    #[serde(default)]
    preferences: Vec<UserPreference>,
    #[serde(default)]
    rules: Vec<Rule>,
}

impl Snapshot {
    fn find_mut(&mut self, user: UserId, id: ArticleId) -> Result<&mut Article, StoreError> {
        let a = self
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::ArticleNotFound(id))?;
        if a.user_id != user {
            return Err(StoreError::WrongOwner { article: id, user });
        }
        Ok(a)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let snap = match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            inner: RwLock::new(snap),
        })
    }

    /// Writes a snapshot next to `path`, then renames it into place.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&*self.read()?)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Snapshot>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Snapshot>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl ArticleStore for MemoryStore {
    fn insert_article(&self, user: UserId, raw: RawArticle) -> Result<Article, StoreError> {
        let mut snap = self.write()?;
        if snap
            .articles
            .iter()
            .any(|a| a.user_id == user && a.link == raw.link)
        {
            return Err(StoreError::DuplicateLink(raw.link));
        }
        snap.next_article_id += 1;
        let article = Article {
            id: snap.next_article_id,
            user_id: user,
            title: raw.title,
            link: raw.link,
            description: raw.description,
            content: raw.content,
            author: raw.author,
            published: raw.published,
            enrichment: None,
            topics: None,
            is_read: false,
            is_bookmarked: false,
            rating: None,
            cluster: ClusterLabel::Unclustered,
        };
        snap.articles.push(article.clone());
        Ok(article)
    }

    fn article(&self, user: UserId, id: ArticleId) -> Result<Article, StoreError> {
        let snap = self.read()?;
        let a = snap
            .articles
            .iter()
            .find(|a| a.id == id)
            .ok_or(StoreError::ArticleNotFound(id))?;
        if a.user_id != user {
            return Err(StoreError::WrongOwner { article: id, user });
        }
        Ok(a.clone())
    }

    fn articles_for_user(&self, user: UserId) -> Result<Vec<Article>, StoreError> {
        Ok(self
            .read()?
            .articles
            .iter()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect())
    }

    fn save_features(
        &self,
        user: UserId,
        id: ArticleId,
        features: ArticleFeatures,
    ) -> Result<(), StoreError> {
        self.write()?.find_mut(user, id)?.apply_features(features);
        Ok(())
    }

    fn save_state(&self, user: UserId, id: ArticleId, state: &ArticleState) -> Result<(), StoreError> {
        let mut snap = self.write()?;
        let a = snap.find_mut(user, id)?;
        a.is_read = state.is_read;
        a.is_bookmarked = state.is_bookmarked;
        a.topics = state.topics.clone();
        Ok(())
    }

    fn save_rating(&self, user: UserId, id: ArticleId, rating: f32) -> Result<(), StoreError> {
        self.write()?.find_mut(user, id)?.rating = Some(rating);
        Ok(())
    }

    fn save_clusters(
        &self,
        user: UserId,
        assignments: &[(ArticleId, ClusterLabel)],
    ) -> Result<(), StoreError> {
        let mut snap = self.write()?;
        for (id, label) in assignments {
            snap.find_mut(user, *id)?.cluster = *label;
        }
        Ok(())
    }

    fn preferences(&self, user: UserId) -> Result<Option<UserPreference>, StoreError> {
        Ok(self
            .read()?
            .preferences
            .iter()
            .find(|p| p.user_id == user)
            .cloned())
    }

    fn save_preferences(&self, prefs: UserPreference) -> Result<(), StoreError> {
        let mut snap = self.write()?;
        match snap.preferences.iter_mut().find(|p| p.user_id == prefs.user_id) {
            Some(slot) => *slot = prefs,
            None => snap.preferences.push(prefs),
        }
        Ok(())
    }

    fn rules_for_user(&self, user: UserId) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .read()?
            .rules
            .iter()
            .filter(|r| r.user_id == user)
            .cloned()
            .collect())
    }

    fn put_rule(&self, mut rule: Rule) -> Result<Rule, StoreError> {
        let mut snap = self.write()?;
        if rule.id <= 0 {
            snap.next_rule_id += 1;
            rule.id = snap.next_rule_id;
        } else {
            snap.next_rule_id = snap.next_rule_id.max(rule.id);
        }
        match snap.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) if slot.user_id != rule.user_id => {
                return Err(StoreError::RuleOwner {
                    rule: rule.id,
                    user: rule.user_id,
                })
            }
            Some(slot) => *slot = rule.clone(),
            None => snap.rules.push(rule.clone()),
        }
        Ok(rule)
    }

    fn delete_rule(&self, user: UserId, id: RuleId) -> Result<bool, StoreError> {
        let mut snap = self.write()?;
        let before = snap.rules.len();
        snap.rules.retain(|r| !(r.id == id && r.user_id == user));
        Ok(snap.rules.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(link: &str) -> RawArticle {
        RawArticle {
            title: "Title".into(),
            link: link.into(),
            description: None,
            content: None,
            author: None,
            published: None,
        }
    }

    #[test]
    fn links_are_unique_per_user() {
        let s = MemoryStore::new();
        s.insert_article(1, raw("https://a")).unwrap();
        assert!(matches!(
            s.insert_article(1, raw("https://a")),
            Err(StoreError::DuplicateLink(_))
        ));
        assert!(s.insert_article(2, raw("https://a")).is_ok());
    }

    #[test]
    fn other_users_articles_are_off_limits() {
        let s = MemoryStore::new();
        let a = s.insert_article(1, raw("https://a")).unwrap();
        assert!(matches!(s.article(2, a.id), Err(StoreError::WrongOwner { .. })));
        assert!(matches!(s.article(1, 99), Err(StoreError::ArticleNotFound(99))));
        assert!(s.articles_for_user(2).unwrap().is_empty());
    }

    #[test]
    fn rules_get_ids_and_replace() {
        let s = MemoryStore::new();
        let r: Rule = serde_json::from_str(r#"{"id": 0, "user_id": 1, "name": "r"}"#).unwrap();
        let stored = s.put_rule(r).unwrap();
        assert_eq!(stored.id, 1);
        let mut renamed = stored.clone();
        renamed.name = "renamed".into();
        s.put_rule(renamed).unwrap();
        let rules = s.rules_for_user(1).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "renamed");
        assert!(s.delete_rule(1, 1).unwrap());
        assert!(!s.delete_rule(1, 1).unwrap());
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let s = MemoryStore::new();
        s.insert_article(1, raw("https://a")).unwrap();
        s.save_preferences(UserPreference::with_defaults(1, 0.4)).unwrap();
        s.save(&path).unwrap();

        let back = MemoryStore::load(&path).unwrap();
        assert_eq!(back.articles_for_user(1).unwrap().len(), 1);
        assert_eq!(back.preferences(1).unwrap().unwrap().relevance_threshold, 0.4);
        // ids keep counting after a reload
        assert_eq!(back.insert_article(1, raw("https://b")).unwrap().id, 2);
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let s = MemoryStore::load(&dir.path().join("none.json")).unwrap();
        assert!(s.articles_for_user(1).unwrap().is_empty());
    }
}
