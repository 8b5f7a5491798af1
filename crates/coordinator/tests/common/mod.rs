#![allow(dead_code)]

use async_trait::async_trait;
use buildcache_backend::BackendHandle;
use buildcache_backend::backend::MockBackend;
use buildcache_model::event::{BackendEvent, CacheProgress};
use buildcache_model::{CacheItem, CacheKind, Uuid, VersionEntry};
use buildcache_ops::{Confirm, Coordinator, Level, Notice, Notify, Prompt, Settings};
use buildcache_store::{Reconciled, Store};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Notices(Mutex<Vec<Notice>>);
impl Notices {
    pub fn levels(&self) -> Vec<Level> {
        self.0.lock().unwrap().iter().map(|n| n.level).collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.0.lock().unwrap().last().cloned()
    }
}
impl Notify for Notices {
    fn notify(&self, notice: Notice) {
        self.0.lock().unwrap().push(notice);
    }
}

pub struct Answer {
    accept: bool,
    asked: Mutex<Vec<Prompt>>,
}
impl Answer {
    pub fn asked(&self) -> Vec<Prompt> {
        self.asked.lock().unwrap().clone()
    }
}
#[async_trait]
impl Confirm for Answer {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        self.asked.lock().unwrap().push(prompt.clone());
        self.accept
    }
}

pub struct Harness {
    pub mock: Arc<MockBackend>,
    pub coordinator: Coordinator,
    pub notices: Arc<Notices>,
    pub answer: Arc<Answer>,
}

pub fn settings() -> Settings {
    Settings { validate_on_load: false, ..Settings::default() }
}

pub async fn harness(versions: impl IntoIterator<Item = VersionEntry>, settings: Settings, accept: bool) -> Harness {
    let mock = Arc::new(MockBackend::with_versions(versions));
    harness_with(mock.clone(), mock, settings, accept).await
}

pub async fn harness_with(mock: Arc<MockBackend>, backend: BackendHandle, settings: Settings, accept: bool) -> Harness {
    let notices = Arc::new(Notices::default());
    let answer = Arc::new(Answer { accept, asked: Mutex::new(Vec::new()) });
    let coordinator = Coordinator::new(backend, Store::new(), settings, answer.clone(), notices.clone());
    coordinator.load_versions().await.unwrap();
    Harness { mock, coordinator, notices, answer }
}

pub fn progress(uuid: Uuid, kind: CacheKind, items: &[(&str, CacheItem)], done: bool) -> BackendEvent {
    BackendEvent::Progress(CacheProgress {
        uuid,
        offline: kind.is_offline(),
        items: items.iter().map(|(n, i)| (n.to_string(), *i)).collect(),
        done,
    })
}

pub fn seed(coordinator: &Coordinator, uuid: Uuid, kind: CacheKind, items: &[(&str, CacheItem)], done: bool) {
    assert_eq!(coordinator.reconciler().apply(progress(uuid, kind, items, done)), Reconciled::Applied);
}
