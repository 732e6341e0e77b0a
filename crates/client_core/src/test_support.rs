//! In-memory collaborators for the unit tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Duty, DutyId, Page},
    protocol::DutyPage,
};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    fetch_state::FetchState, location::MemoryHistory, mutations::MutationCoordinator,
    orchestrator::ListOrchestrator, DutiesApi, Notifier, PaginationLocation, RequestError,
};

pub const START_URL: &str = "http://localhost/duties";

pub fn duty(name: &str) -> Duty {
    Duty {
        id: DutyId(Uuid::new_v4()),
        name: name.to_string(),
    }
}

pub fn paginate(duties: &[Duty], page: u32, page_size: u32) -> DutyPage {
    let total = duties.len() as u64;
    let size = u64::from(page_size.max(1));
    let start = u64::from(page.saturating_sub(1)) * size;
    Page {
        items: duties
            .iter()
            .skip(start as usize)
            .take(size as usize)
            .cloned()
            .collect(),
        total,
        page,
        page_size,
        total_pages: total.div_ceil(size) as u32,
    }
}

#[derive(Default)]
pub struct FakeDuties {
    duties: Mutex<Vec<Duty>>,
    list_calls: Mutex<Vec<(u32, u32)>>,
    mutation_calls: AtomicUsize,
    list_failure: Mutex<Option<RequestError>>,
    mutation_failure: Mutex<Option<RequestError>>,
    slow_page_sizes: Mutex<HashMap<u32, Duration>>,
}

impl FakeDuties {
    pub fn with_names(names: &[&str]) -> Self {
        let fake = Self::default();
        *fake.duties.lock().expect("duties") = names.iter().map(|name| duty(name)).collect();
        fake
    }

    pub fn fail_lists(&self, error: Option<RequestError>) {
        *self.list_failure.lock().expect("list failure") = error;
    }

    pub fn fail_mutations(&self, error: Option<RequestError>) {
        *self.mutation_failure.lock().expect("mutation failure") = error;
    }

    pub fn delay_page_size(&self, page_size: u32, delay: Duration) {
        self.slow_page_sizes
            .lock()
            .expect("delays")
            .insert(page_size, delay);
    }

    pub fn list_calls(&self) -> Vec<(u32, u32)> {
        self.list_calls.lock().expect("list calls").clone()
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub fn duties(&self) -> Vec<Duty> {
        self.duties.lock().expect("duties").clone()
    }

    fn begin_mutation(&self) -> Result<(), RequestError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        match self.mutation_failure.lock().expect("mutation failure").clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DutiesApi for FakeDuties {
    async fn list_duties(&self, page: u32, page_size: u32) -> Result<DutyPage, RequestError> {
        self.list_calls
            .lock()
            .expect("list calls")
            .push((page, page_size));
        let delay = self
            .slow_page_sizes
            .lock()
            .expect("delays")
            .get(&page_size)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.list_failure.lock().expect("list failure").clone();
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(paginate(&self.duties(), page, page_size))
    }

    async fn create_duty(&self, name: &str) -> Result<Duty, RequestError> {
        self.begin_mutation()?;
        let created = duty(name);
        self.duties
            .lock()
            .expect("duties")
            .push(created.clone());
        Ok(created)
    }

    async fn update_duty(&self, id: DutyId, name: &str) -> Result<Duty, RequestError> {
        self.begin_mutation()?;
        let mut duties = self.duties.lock().expect("duties");
        let existing = duties
            .iter_mut()
            .find(|duty| duty.id == id)
            .ok_or_else(|| RequestError::Status {
                status: 404,
                message: "duty not found".to_string(),
            })?;
        existing.name = name.to_string();
        Ok(existing.clone())
    }

    async fn delete_duty(&self, id: DutyId) -> Result<(), RequestError> {
        self.begin_mutation()?;
        self.duties
            .lock()
            .expect("duties")
            .retain(|duty| duty.id != id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.notices
            .lock()
            .expect("notices")
            .push(Notice::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.notices
            .lock()
            .expect("notices")
            .push(Notice::Error(message.to_string()));
    }
}

pub struct Harness {
    pub api: Arc<FakeDuties>,
    pub history: Arc<MemoryHistory>,
    pub location: PaginationLocation,
    pub notifier: Arc<RecordingNotifier>,
    pub list: Arc<ListOrchestrator>,
    pub mutations: MutationCoordinator,
}

impl Harness {
    pub fn new(api: FakeDuties, query: &str) -> Self {
        let api = Arc::new(api);
        let history = Arc::new(
            MemoryHistory::parse(&format!("{START_URL}{query}")).expect("start url"),
        );
        let location = PaginationLocation::new(history.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let list = ListOrchestrator::new(api.clone(), location.clone(), notifier.clone());
        let mutations = MutationCoordinator::new(api.clone(), list.clone(), notifier.clone());
        Self {
            api,
            history,
            location,
            notifier,
            list,
            mutations,
        }
    }
}

pub async fn wait_for_state(
    rx: &mut watch::Receiver<FetchState>,
    predicate: impl Fn(&FetchState) -> bool,
) -> FetchState {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            {
                let state = rx.borrow_and_update();
                if predicate(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.expect("state sender alive");
        }
    })
    .await
    .expect("state did not settle in time")
}
