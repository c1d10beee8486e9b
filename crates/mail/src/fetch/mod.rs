//! Bulk download of Gmail messages into a record store
//!
//! [`fetch`] returns a lazy iterator: nothing touches the network until the
//! first item is pulled, and each message is retrieved and persisted as its
//! progress line is produced. Consumers can stream lines as they arrive.

mod progress;

pub use progress::FetchProgress;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::{HashSet, VecDeque};

use crate::config::DuplicatePolicy;
use crate::error::FetchError;
use crate::gmail::{MAX_PAGE_SIZE, MailApi, normalize_message};
use crate::storage::RecordStore;

/// Options for a download run
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Maximum number of messages to download (None = all)
    pub limit: Option<usize>,
    /// Log every downloaded message at info level
    pub emit_progress: bool,
    /// Handling of message IDs listed under several labels
    pub duplicate_policy: DuplicatePolicy,
}

impl FetchOptions {
    pub fn new(limit: Option<usize>, emit_progress: bool) -> Self {
        Self {
            limit,
            emit_progress,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    fn limit_reached(&self, collected: usize) -> bool {
        self.limit.is_some_and(|limit| collected >= limit)
    }
}

/// Start a download run
///
/// Labels are enumerated and every label's message IDs paged through before
/// any message is retrieved. Each retrieved message is written to `store`
/// before its progress line is yielded. The first error ends the run with a
/// single [`FetchProgress::Failed`] item; records already written stay.
pub fn fetch<'a, A, S>(api: &'a A, store: &'a S, options: FetchOptions) -> FetchRun<'a, A, S>
where
    A: MailApi + ?Sized,
    S: RecordStore + ?Sized,
{
    FetchRun {
        api,
        store,
        options,
        state: RunState::NotStarted,
        pending: VecDeque::new(),
        ids: Vec::new(),
        next_index: 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Downloading,
    Finished,
}

/// Iterator over the progress of one download run
pub struct FetchRun<'a, A: ?Sized, S: ?Sized> {
    api: &'a A,
    store: &'a S,
    options: FetchOptions,
    state: RunState,
    pending: VecDeque<FetchProgress>,
    ids: Vec<String>,
    next_index: usize,
}

impl<A, S> FetchRun<'_, A, S>
where
    A: MailApi + ?Sized,
    S: RecordStore + ?Sized,
{
    /// Walk every label and collect the message IDs to download
    fn enumerate(&mut self) -> Result<Vec<String>> {
        let labels = self.api.list_labels().context("Failed to list labels")?;

        let mut ids: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut duplicates = 0;
        let mut total = 0;

        for label in &labels {
            self.push(FetchProgress::LabelStarted {
                name: label.name.clone(),
            });

            let mut label_count = 0;
            // Page tokens are only meaningful within one label's listing
            let mut page_token: Option<String> = None;

            loop {
                let page_size = match self.options.limit {
                    Some(limit) => limit.saturating_sub(ids.len()).min(MAX_PAGE_SIZE),
                    None => MAX_PAGE_SIZE,
                };
                if page_size == 0 {
                    break;
                }

                let page = self
                    .api
                    .list_messages(&label.id, page_size, page_token.as_deref())
                    .with_context(|| format!("Failed to list messages for label {}", label.name))?;

                let refs = page.messages.unwrap_or_default();
                label_count += refs.len();

                for msg_ref in refs {
                    if !seen.insert(msg_ref.id.clone()) {
                        duplicates += 1;
                        if self.options.duplicate_policy == DuplicatePolicy::FirstOccurrence {
                            continue;
                        }
                    }
                    ids.push(msg_ref.id);
                }

                match page.next_page_token {
                    Some(token) if !token.is_empty() && !self.options.limit_reached(ids.len()) => {
                        page_token = Some(token);
                    }
                    _ => break,
                }
            }

            total += label_count;
            self.push(FetchProgress::LabelTotal {
                name: label.name.clone(),
                count: label_count,
            });

            if self.options.limit_reached(ids.len()) {
                break;
            }
        }

        if duplicates > 0 {
            warn!("{} message IDs are listed under more than one label", duplicates);
            self.push(FetchProgress::Duplicates {
                count: duplicates,
                policy: self.options.duplicate_policy,
            });
        }

        self.push(FetchProgress::GrandTotal {
            count: total,
            limit: self.options.limit,
        });

        if let Some(limit) = self.options.limit {
            ids.truncate(limit);
        }

        Ok(ids)
    }

    /// Retrieve, decode and persist one message
    fn download(&self, ordinal: usize, id: &str) -> Result<FetchProgress> {
        let message = self
            .api
            .get_message(id)
            .with_context(|| format!("Failed to fetch message {}", id))?;
        let record = normalize_message(message);

        self.store
            .put(ordinal, &record)
            .with_context(|| format!("Failed to save message {}", id))?;

        Ok(FetchProgress::Downloaded {
            ordinal,
            subject: record.subject,
            from: record.from,
            to: record.to,
        })
    }

    fn push(&mut self, progress: FetchProgress) {
        debug!("{}", progress);
        self.pending.push_back(progress);
    }
}

impl<A, S> Iterator for FetchRun<'_, A, S>
where
    A: MailApi + ?Sized,
    S: RecordStore + ?Sized,
{
    type Item = FetchProgress;

    fn next(&mut self) -> Option<FetchProgress> {
        loop {
            if let Some(progress) = self.pending.pop_front() {
                return Some(progress);
            }

            match self.state {
                RunState::NotStarted => {
                    self.state = RunState::Downloading;
                    match self.enumerate() {
                        Ok(ids) => self.ids = ids,
                        Err(e) => {
                            self.state = RunState::Finished;
                            self.push(FetchProgress::Failed(FetchError(e)));
                        }
                    }
                }
                RunState::Downloading => {
                    let Some(id) = self.ids.get(self.next_index).cloned() else {
                        self.state = RunState::Finished;
                        return None;
                    };
                    self.next_index += 1;

                    return match self.download(self.next_index, &id) {
                        Ok(progress) => {
                            if self.options.emit_progress {
                                info!("{}", progress);
                            } else {
                                debug!("{}", progress);
                            }
                            Some(progress)
                        }
                        Err(e) => {
                            self.state = RunState::Finished;
                            let progress = FetchProgress::Failed(FetchError(e));
                            warn!("{}", progress);
                            Some(progress)
                        }
                    };
                }
                RunState::Finished => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{
        GmailMessage, Header, ListMessagesResponse, MessageBody, MessagePayload, MessageRef,
    };
    use crate::models::Label;
    use crate::storage::InMemoryRecordStore;
    use std::cell::RefCell;

    /// Mailbox fake serving fixed label contents two IDs per page
    struct FakeMailbox {
        labels: Vec<(Label, Vec<String>)>,
        page_len: usize,
        fail_on: Option<String>,
        fetched: RefCell<Vec<String>>,
        page_sizes: RefCell<Vec<usize>>,
    }

    impl FakeMailbox {
        fn new(labels: &[(&str, &[&str])]) -> Self {
            Self {
                labels: labels
                    .iter()
                    .map(|(name, ids)| {
                        (
                            Label::new(format!("id-{name}"), *name),
                            ids.iter().map(|s| s.to_string()).collect(),
                        )
                    })
                    .collect(),
                page_len: 2,
                fail_on: None,
                fetched: RefCell::new(Vec::new()),
                page_sizes: RefCell::new(Vec::new()),
            }
        }

        fn failing_on(mut self, id: &str) -> Self {
            self.fail_on = Some(id.to_string());
            self
        }
    }

    impl MailApi for FakeMailbox {
        fn list_labels(&self) -> Result<Vec<Label>> {
            Ok(self.labels.iter().map(|(label, _)| label.clone()).collect())
        }

        fn list_messages(
            &self,
            label_id: &str,
            max_results: usize,
            page_token: Option<&str>,
        ) -> Result<ListMessagesResponse> {
            self.page_sizes.borrow_mut().push(max_results);
            let (_, ids) = self
                .labels
                .iter()
                .find(|(label, _)| label.id == label_id)
                .context("unknown label")?;

            // Tokens look like "<label_id>:<offset>"
            let offset = match page_token {
                Some(token) => {
                    let (token_label, offset) = token.split_once(':').context("bad token")?;
                    anyhow::ensure!(token_label == label_id, "token from another label");
                    offset.parse::<usize>()?
                }
                None => 0,
            };

            let end = (offset + self.page_len.min(max_results)).min(ids.len());
            let messages = ids[offset..end]
                .iter()
                .map(|id| MessageRef {
                    id: id.clone(),
                    thread_id: None,
                })
                .collect();

            Ok(ListMessagesResponse {
                messages: Some(messages),
                next_page_token: (end < ids.len()).then(|| format!("{label_id}:{end}")),
                result_size_estimate: None,
            })
        }

        fn get_message(&self, id: &str) -> Result<GmailMessage> {
            if self.fail_on.as_deref() == Some(id) {
                anyhow::bail!("server exploded");
            }
            self.fetched.borrow_mut().push(id.to_string());
            Ok(GmailMessage {
                id: id.to_string(),
                thread_id: None,
                snippet: format!("snippet {id}"),
                payload: Some(MessagePayload {
                    headers: Some(vec![Header {
                        name: "Subject".to_string(),
                        value: format!("Subject {id}"),
                    }]),
                    body: Some(MessageBody {
                        size: None,
                        data: Some("SGk".to_string()),
                    }),
                    ..Default::default()
                }),
            })
        }
    }

    fn downloaded(progress: &[FetchProgress]) -> usize {
        progress
            .iter()
            .filter(|p| matches!(p, FetchProgress::Downloaded { .. }))
            .count()
    }

    #[test]
    fn test_fetch_all_pages_every_label() {
        let mailbox = FakeMailbox::new(&[("INBOX", &["a", "b", "c"]), ("SENT", &["d", "e"])]);
        let store = InMemoryRecordStore::new();

        let progress: Vec<_> = fetch(&mailbox, &store, FetchOptions::new(None, false)).collect();

        assert_eq!(downloaded(&progress), 5);
        assert_eq!(store.len(), 5);
        assert_eq!(*mailbox.fetched.borrow(), vec!["a", "b", "c", "d", "e"]);
        assert!(progress.iter().any(|p| p.to_string() == "Total emails for label INBOX: 3"));
        assert!(progress.iter().any(|p| p.to_string() == "Grand total emails fetched: 5"));

        let record = &store.load_all().unwrap()[0];
        assert_eq!(record.subject, "Subject a");
        assert_eq!(record.body, "Hi");
    }

    #[test]
    fn test_limit_persists_exactly_limit_records() {
        let mailbox = FakeMailbox::new(&[
            ("INBOX", &["a", "b", "c", "d"]),
            ("SENT", &["e", "f", "g"]),
            ("WORK", &["h", "i", "j"]),
        ]);
        let store = InMemoryRecordStore::new();

        let progress: Vec<_> = fetch(&mailbox, &store, FetchOptions::new(Some(3), false)).collect();

        assert_eq!(downloaded(&progress), 3);
        assert_eq!(store.len(), 3);
        assert_eq!(*mailbox.fetched.borrow(), vec!["a", "b", "c"]);
        assert!(progress.iter().any(|p| p.to_string() == "Grand total emails fetched: 3/3"));
        // Labels after the limit was reached are never listed
        assert!(!progress.iter().any(|p| p.to_string().contains("SENT")));
    }

    #[test]
    fn test_page_size_shrinks_to_remaining_limit() {
        let mut mailbox = FakeMailbox::new(&[("INBOX", &["a", "b", "c", "d", "e"])]);
        mailbox.page_len = 10;
        let store = InMemoryRecordStore::new();

        let _: Vec<_> = fetch(&mailbox, &store, FetchOptions::new(Some(3), false)).collect();

        assert_eq!(*mailbox.page_sizes.borrow(), vec![3]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_unlimited_uses_provider_max_page_size() {
        let mailbox = FakeMailbox::new(&[("INBOX", &["a"])]);
        let store = InMemoryRecordStore::new();

        let _: Vec<_> = fetch(&mailbox, &store, FetchOptions::new(None, false)).collect();

        assert_eq!(*mailbox.page_sizes.borrow(), vec![MAX_PAGE_SIZE]);
    }

    #[test]
    fn test_duplicates_fetched_per_occurrence_by_default() {
        let mailbox = FakeMailbox::new(&[("INBOX", &["a", "b"]), ("IMPORTANT", &["a"])]);
        let store = InMemoryRecordStore::new();

        let progress: Vec<_> = fetch(&mailbox, &store, FetchOptions::new(None, false)).collect();

        assert_eq!(*mailbox.fetched.borrow(), vec!["a", "b", "a"]);
        assert_eq!(downloaded(&progress), 3);
        // Keyed by ID, so the second copy replaces the first
        assert_eq!(store.len(), 2);
        assert!(progress.iter().any(|p| matches!(
            p,
            FetchProgress::Duplicates {
                count: 1,
                policy: DuplicatePolicy::EveryOccurrence
            }
        )));
    }

    #[test]
    fn test_first_occurrence_policy_skips_duplicates() {
        let mailbox = FakeMailbox::new(&[("INBOX", &["a", "b"]), ("IMPORTANT", &["a", "c"])]);
        let store = InMemoryRecordStore::new();
        let options =
            FetchOptions::new(None, false).with_duplicate_policy(DuplicatePolicy::FirstOccurrence);

        let progress: Vec<_> = fetch(&mailbox, &store, options).collect();

        assert_eq!(*mailbox.fetched.borrow(), vec!["a", "b", "c"]);
        assert_eq!(downloaded(&progress), 3);
    }

    #[test]
    fn test_error_ends_run_and_keeps_written_records() {
        let mailbox = FakeMailbox::new(&[("INBOX", &["a", "b", "c"])]).failing_on("b");
        let store = InMemoryRecordStore::new();

        let progress: Vec<_> = fetch(&mailbox, &store, FetchOptions::new(None, false)).collect();

        let last = progress.last().unwrap();
        assert!(last.is_error());
        assert!(last.to_string().starts_with("An error occurred: Failed to fetch message b"));
        assert_eq!(progress.iter().filter(|p| p.is_error()).count(), 1);
        assert_eq!(downloaded(&progress), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(*mailbox.fetched.borrow(), vec!["a"]);
    }

    #[test]
    fn test_run_is_lazy() {
        let mailbox = FakeMailbox::new(&[("INBOX", &["a", "b"])]);
        let store = InMemoryRecordStore::new();

        let mut run = fetch(&mailbox, &store, FetchOptions::new(None, false));
        assert!(mailbox.page_sizes.borrow().is_empty());

        // Enumeration lines come first, before any message is retrieved
        assert!(matches!(run.next(), Some(FetchProgress::LabelStarted { .. })));
        assert!(mailbox.fetched.borrow().is_empty());

        let rest: Vec<_> = run.collect();
        assert_eq!(downloaded(&rest), 2);
    }

    #[test]
    fn test_empty_mailbox() {
        let mailbox = FakeMailbox::new(&[]);
        let store = InMemoryRecordStore::new();

        let progress: Vec<_> = fetch(&mailbox, &store, FetchOptions::new(Some(5), false)).collect();

        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].to_string(), "Grand total emails fetched: 0/5");
        assert!(store.is_empty());
    }
}
