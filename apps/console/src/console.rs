//! The list page as a terminal session: one orchestrator, one mutation coordinator and an
//! in-memory history standing in for the browser URL.

use std::{io::Write, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context};
use client_core::{
    location::{PAGE_KEY, PAGE_SIZE_KEY},
    DutiesApi, ListOrchestrator, LoadOutcome, MemoryHistory, MutationCoordinator, MutationError,
    Notifier, PaginationLocation,
};
use shared::domain::{Duty, DutyDraft, DutyId};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    render::{self, render_page},
    shell::{ShellCommand, HELP},
};

pub const START_URL: &str = "http://localhost/duties";

/// The initial navigation URL; only the keys given on the command line are written.
pub fn start_url(page: Option<u32>, page_size: Option<u32>) -> anyhow::Result<Url> {
    let mut url = Url::parse(START_URL)?;
    let pairs: Vec<(&str, String)> = [(PAGE_KEY, page), (PAGE_SIZE_KEY, page_size)]
        .into_iter()
        .filter_map(|(key, value)| Some((key, value?.to_string())))
        .collect();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&self, message: &str) {
        println!("* {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("! {message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Redraw,
    Idle,
    Quit,
}

pub struct Console {
    history: Arc<MemoryHistory>,
    list: Arc<ListOrchestrator>,
    mutations: MutationCoordinator,
    settle_timeout: Duration,
}

impl Console {
    pub fn new(
        api: Arc<dyn DutiesApi>,
        start: Url,
        notifier: Arc<dyn Notifier>,
        settle_timeout: Duration,
    ) -> Self {
        let history = Arc::new(MemoryHistory::new(start));
        let location = PaginationLocation::new(history.clone());
        let list = ListOrchestrator::new(api.clone(), location, notifier.clone());
        let mutations = MutationCoordinator::new(api, list.clone(), notifier);
        Self {
            history,
            list,
            mutations,
            settle_timeout,
        }
    }

    pub fn location(&self) -> &PaginationLocation {
        self.list.location()
    }

    pub fn render(&self) -> String {
        render_page(&self.list.state(), self.location().read())
    }

    /// Loads the current page once, following a clamp back to the last page.
    pub async fn load_current(&self) -> LoadOutcome {
        match self.list.load().await {
            LoadOutcome::Loaded {
                clamped_to: Some(page),
            } => {
                debug!(page, "following clamped page");
                self.list.load().await
            }
            outcome => outcome,
        }
    }

    pub async fn create(&self, name: &str) -> Result<Duty, MutationError> {
        self.mutations
            .create(&DutyDraft::new(name))
            .await
            .into_result()
    }

    pub async fn rename(&self, id: DutyId, name: &str) -> Result<Duty, MutationError> {
        self.mutations
            .update(id, &DutyDraft::new(name))
            .await
            .into_result()
    }

    pub async fn delete(&self, id: DutyId) -> Result<(), MutationError> {
        self.mutations.delete(id).await.into_result()
    }

    /// Waits until the list reflects the live location. Returns `false` on timeout.
    pub async fn settle(&self) -> bool {
        let mut state = self.list.subscribe_state();
        let location = self.location().clone();
        let wait = async {
            loop {
                let settled = render::is_settled(
                    &state.borrow_and_update(),
                    location.read(),
                    self.list.settled_for(),
                );
                if settled {
                    return true;
                }
                if state.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(self.settle_timeout, wait)
            .await
            .unwrap_or(false)
    }

    pub async fn execute(&self, command: ShellCommand) -> anyhow::Result<Flow> {
        let location = self.location();
        match command {
            ShellCommand::Page(page) => location.set_page(page),
            ShellCommand::Size(size) => location.set_page_size(size),
            ShellCommand::Next => {
                let current = location.read();
                let last = self.list.state().data.map(|page| page.total_pages.max(1));
                if last.is_some_and(|last| current.page >= last) {
                    bail!("already on the last page");
                }
                location.set_page(current.page + 1);
            }
            ShellCommand::Prev => {
                let current = location.read();
                if current.page <= 1 {
                    bail!("already on the first page");
                }
                location.set_page(current.page - 1);
            }
            ShellCommand::Back => {
                if !self.history.back() {
                    bail!("no earlier page in history");
                }
            }
            ShellCommand::Forward => {
                if !self.history.forward() {
                    bail!("no later page in history");
                }
            }
            ShellCommand::Refresh => {
                self.list.reload().await;
            }
            ShellCommand::New(name) => {
                self.mutations.open_create();
                let outcome = self.mutations.submit(&DutyDraft::new(name)).await;
                self.mutations.close_editor();
                reported(outcome.result)?;
            }
            ShellCommand::Edit { row, name } => {
                let duty = self.duty_on_row(row)?;
                self.mutations.open_edit(duty);
                let outcome = self.mutations.submit(&DutyDraft::new(name)).await;
                self.mutations.close_editor();
                reported(outcome.result)?;
            }
            ShellCommand::Remove(row) => {
                let duty = self.duty_on_row(row)?;
                reported(self.mutations.delete(duty.id).await.result)?;
            }
            ShellCommand::Help => {
                println!("{HELP}");
                return Ok(Flow::Idle);
            }
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Redraw)
    }

    /// Runs the interactive loop until `quit` or end of input.
    pub async fn run_shell<R>(&self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let driver = self.list.spawn();
        self.redraw().await;
        println!("type 'help' for commands");

        let mut lines = input.lines();
        loop {
            prompt();
            let Some(line) = lines.next_line().await.context("failed to read command")? else {
                break;
            };
            let command = match ShellCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(error) => {
                    eprintln!("{error:#}");
                    continue;
                }
            };
            match self.execute(command).await {
                Ok(Flow::Redraw) => self.redraw().await,
                Ok(Flow::Idle) => {}
                Ok(Flow::Quit) => break,
                Err(error) => eprintln!("{error:#}"),
            }
        }

        driver.abort();
        info!("shell closed");
        Ok(())
    }

    async fn redraw(&self) {
        if !self.settle().await {
            warn!(timeout = ?self.settle_timeout, "duty list did not settle in time");
        }
        println!("{}", self.render());
    }

    fn duty_on_row(&self, row: usize) -> anyhow::Result<Duty> {
        render::row(&self.list.state(), row)
            .cloned()
            .ok_or_else(|| anyhow!("no row {row} on this page"))
    }
}

/// Request failures were already shown by the notifier; only validation needs reporting here.
fn reported<T>(result: Result<T, MutationError>) -> anyhow::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(MutationError::Validation(error)) => Err(anyhow!("invalid duty: {error}")),
        Err(error) => {
            debug!(%error, "mutation failed");
            Ok(())
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
