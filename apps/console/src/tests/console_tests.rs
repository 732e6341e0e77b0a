use super::*;
use async_trait::async_trait;
use client_core::RequestError;
use shared::{domain::Page, protocol::DutyPage};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use uuid::Uuid;

#[derive(Default)]
struct InMemoryDuties {
    duties: Mutex<Vec<Duty>>,
    failing_lists: AtomicUsize,
}

impl InMemoryDuties {
    fn with_names(names: &[&str]) -> Arc<Self> {
        let api = Self::default();
        *api.duties.lock().expect("duties") = names
            .iter()
            .map(|name| Duty {
                id: DutyId(Uuid::new_v4()),
                name: name.to_string(),
            })
            .collect();
        Arc::new(api)
    }

    fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    fn names(&self) -> Vec<String> {
        self.duties
            .lock()
            .expect("duties")
            .iter()
            .map(|duty| duty.name.clone())
            .collect()
    }
}

#[async_trait]
impl DutiesApi for InMemoryDuties {
    async fn list_duties(&self, page: u32, page_size: u32) -> Result<DutyPage, RequestError> {
        let failing = self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RequestError::Transport("offline".to_string()));
        }
        let duties = self.duties.lock().expect("duties");
        let total = duties.len() as u64;
        let start = (page as usize - 1) * page_size as usize;
        Ok(Page {
            items: duties
                .iter()
                .skip(start)
                .take(page_size as usize)
                .cloned()
                .collect(),
            total,
            page,
            page_size,
            total_pages: total.div_ceil(u64::from(page_size)) as u32,
        })
    }

    async fn create_duty(&self, name: &str) -> Result<Duty, RequestError> {
        let duty = Duty {
            id: DutyId(Uuid::new_v4()),
            name: name.to_string(),
        };
        self.duties.lock().expect("duties").push(duty.clone());
        Ok(duty)
    }

    async fn update_duty(&self, id: DutyId, name: &str) -> Result<Duty, RequestError> {
        let mut duties = self.duties.lock().expect("duties");
        let duty = duties
            .iter_mut()
            .find(|duty| duty.id == id)
            .ok_or_else(|| RequestError::Status {
                status: 404,
                message: "Not Found".to_string(),
            })?;
        duty.name = name.to_string();
        Ok(duty.clone())
    }

    async fn delete_duty(&self, id: DutyId) -> Result<(), RequestError> {
        self.duties.lock().expect("duties").retain(|duty| duty.id != id);
        Ok(())
    }
}

struct Quiet;

impl Notifier for Quiet {
    fn success(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

fn console(api: Arc<InMemoryDuties>, page: Option<u32>, page_size: Option<u32>) -> Console {
    Console::new(
        api,
        start_url(page, page_size).expect("start url"),
        Arc::new(Quiet),
        Duration::from_secs(3),
    )
}

#[test]
fn start_url_only_writes_given_keys() {
    assert_eq!(start_url(None, None).expect("url").query(), None);
    assert_eq!(
        start_url(Some(2), None).expect("url").query(),
        Some("page=2")
    );
    assert_eq!(
        start_url(Some(3), Some(20)).expect("url").query(),
        Some("page=3&pageSize=20")
    );
}

#[tokio::test]
async fn one_shot_list_follows_the_clamp() {
    let console = console(InMemoryDuties::with_names(&["a", "b", "c"]), Some(9), Some(2));

    let outcome = console.load_current().await;

    assert_eq!(outcome, LoadOutcome::Loaded { clamped_to: None });
    assert_eq!(console.location().read().page, 2);
    assert!(console.render().contains("page 2 of 2, 3 total, 2 per page"));
}

#[tokio::test]
async fn row_commands_edit_the_visible_page() {
    let api = InMemoryDuties::with_names(&["Cleaning", "Cooking"]);
    let console = console(api.clone(), None, None);
    console.load_current().await;

    assert_eq!(
        console
            .execute(ShellCommand::New("Laundry".into()))
            .await
            .expect("new"),
        Flow::Redraw
    );
    console
        .execute(ShellCommand::Edit {
            row: 2,
            name: "Dinner".into(),
        })
        .await
        .expect("edit");
    console
        .execute(ShellCommand::Remove(1))
        .await
        .expect("rm");

    assert_eq!(api.names(), vec!["Dinner".to_string(), "Laundry".to_string()]);
    let rendered = console.render();
    assert!(rendered.contains("Dinner"));
    assert!(!rendered.contains("Cleaning"));
}

#[tokio::test]
async fn invalid_names_and_rows_are_reported() {
    let api = InMemoryDuties::with_names(&["Cleaning"]);
    let console = console(api.clone(), None, None);
    console.load_current().await;

    let err = console
        .execute(ShellCommand::New("   ".into()))
        .await
        .expect_err("blank name");
    assert!(err.to_string().contains("Name is required"));

    let err = console
        .execute(ShellCommand::Remove(4))
        .await
        .expect_err("missing row");
    assert_eq!(err.to_string(), "no row 4 on this page");
    assert_eq!(api.names(), vec!["Cleaning".to_string()]);
}

#[tokio::test]
async fn paging_stops_at_the_ends() {
    let console = console(InMemoryDuties::with_names(&["a", "b"]), None, Some(1));
    console.load_current().await;

    assert!(console.execute(ShellCommand::Prev).await.is_err());
    assert!(console.execute(ShellCommand::Back).await.is_err());

    console.execute(ShellCommand::Next).await.expect("next");
    assert_eq!(console.location().read().page, 2);
    console.list.load().await;
    assert!(console.execute(ShellCommand::Next).await.is_err());
}

#[tokio::test]
async fn shell_drives_the_list_from_input_lines() {
    let console = console(InMemoryDuties::with_names(&["a", "b", "c"]), None, None);
    let input: &[u8] = b"size 2\n\nbogus\nnext\nhelp\nquit\npage 1\n";

    console.run_shell(input).await.expect("shell");

    assert_eq!(console.location().read(), client_core::Location { page: 2, page_size: 2 });
    let state = console.list.state();
    let names: Vec<_> = state
        .data
        .expect("page")
        .items
        .into_iter()
        .map(|duty| duty.name)
        .collect();
    assert_eq!(names, vec!["c".to_string()]);
}

#[tokio::test]
async fn earlier_error_does_not_settle_a_new_page() {
    let api = InMemoryDuties::with_names(&["a", "b", "c"]);
    api.fail_next_lists(1);
    let console = console(api, None, Some(2));
    let driver = console.list.spawn();

    assert!(console.settle().await);
    assert!(console.render().ends_with("error: offline"));

    console.execute(ShellCommand::Page(2)).await.expect("page");
    assert!(console.settle().await);

    assert_eq!(console.list.settled_for(), Some(client_core::Location { page: 2, page_size: 2 }));
    let rendered = console.render();
    assert!(rendered.contains("page 2 of 2, 3 total, 2 per page, showing 3-3"), "{rendered}");
    assert!(!rendered.contains("error:"), "{rendered}");
    driver.abort();
}
